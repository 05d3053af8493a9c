//! Schema definition and validation.
//!
//! A schema describes the attribute layout of the records of one remote
//! resource: which attribute carries the identity, what defaults a new record
//! starts with, and which fields are checked when a change asks for
//! validation.

use crate::{Attributes, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Timestamp,
    /// Arbitrary nested JSON
    Json,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Bool => write!(f, "Bool"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Json => write!(f, "Json"),
        }
    }
}

/// Definition of a field in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether this field is required
    pub required: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
        }
    }

    /// Validate a JSON value against this field definition.
    pub fn validate(&self, value: Option<&Value>) -> Result<(), ValidationError> {
        match value {
            None | Some(Value::Null) if self.required => {
                Err(ValidationError::MissingRequiredField(self.name.clone()))
            }
            None | Some(Value::Null) => Ok(()),
            Some(v) => self.validate_type(v),
        }
    }

    fn validate_type(&self, value: &Value) -> Result<(), ValidationError> {
        let valid = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Timestamp => value.is_u64() || value.is_i64(),
            FieldType::Json => true,
        };

        if valid {
            Ok(())
        } else {
            Err(ValidationError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type.to_string(),
                got: json_type_name(value).to_string(),
            })
        }
    }
}

pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Bool",
        Value::Number(n) if n.is_i64() || n.is_u64() => "Int",
        Value::Number(_) => "Float",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// Custom validation run after the field checks.
pub type Validator = Rc<dyn Fn(&Attributes) -> Result<(), ValidationError>>;

/// Converts a raw server representation into record attributes.
pub type Parser = Rc<dyn Fn(Value) -> Value>;

/// Attribute layout of the records of one resource.
#[derive(Clone)]
pub struct Schema {
    /// Attribute holding the persisted identity
    pub id_attribute: String,
    /// Attributes every new record starts with
    pub defaults: Attributes,
    /// Field definitions checked on validation
    pub fields: Vec<FieldDef>,
    validator: Option<Validator>,
    parser: Option<Parser>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id_attribute", &self.id_attribute)
            .field("defaults", &self.defaults)
            .field("fields", &self.fields)
            .field("validator", &self.validator.is_some())
            .field("parser", &self.parser.is_some())
            .finish()
    }
}

impl Schema {
    /// Create a schema keyed on `id` with no fields.
    pub fn new() -> Self {
        Self {
            id_attribute: "id".to_string(),
            defaults: Attributes::new(),
            fields: Vec::new(),
            validator: None,
            parser: None,
        }
    }

    /// Use a different identity attribute.
    pub fn with_id_attribute(mut self, name: impl Into<String>) -> Self {
        self.id_attribute = name.into();
        self
    }

    /// Builder-style method to add a field.
    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder-style method to set the default attributes.
    pub fn with_defaults(mut self, defaults: Attributes) -> Self {
        self.defaults = defaults;
        self
    }

    /// Attach a custom validator, run after the field checks pass.
    pub fn with_validator(
        mut self,
        validator: impl Fn(&Attributes) -> Result<(), ValidationError> + 'static,
    ) -> Self {
        self.validator = Some(Rc::new(validator));
        self
    }

    /// Attach a parse hook for raw record representations.
    pub fn with_parser(mut self, parser: impl Fn(Value) -> Value + 'static) -> Self {
        self.parser = Some(Rc::new(parser));
        self
    }

    /// Whether this schema checks anything at all.
    pub fn validates(&self) -> bool {
        !self.fields.is_empty() || self.validator.is_some()
    }

    /// Validate a full attribute set.
    pub fn validate(&self, attrs: &Attributes) -> Result<(), ValidationError> {
        for field in &self.fields {
            field.validate(attrs.get(&field.name))?;
        }
        match &self.validator {
            Some(validator) => validator(attrs),
            None => Ok(()),
        }
    }

    /// Run the parse hook and keep the result only if it is an object.
    pub fn parse(&self, raw: Value) -> Attributes {
        let parsed = match &self.parser {
            Some(parser) => parser(raw),
            None => raw,
        };
        match parsed {
            Value::Object(attrs) => attrs,
            other => {
                tracing::debug!(
                    got = json_type_name(&other),
                    "parsed record is not an object, using empty attributes"
                );
                Attributes::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Attributes {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn test_schema() -> Schema {
        Schema::new()
            .with_field(FieldDef::required("name", FieldType::String))
            .with_field(FieldDef::optional("age", FieldType::Int))
            .with_field(FieldDef::optional("score", FieldType::Float))
    }

    #[test]
    fn validate_valid_payload() {
        let schema = test_schema();
        assert!(schema
            .validate(&attrs(json!({"name": "Alice", "age": 30, "score": 1.5})))
            .is_ok());
        assert!(schema.validate(&attrs(json!({"name": "Bob"}))).is_ok());
    }

    #[test]
    fn validate_missing_required() {
        let schema = test_schema();
        let result = schema.validate(&attrs(json!({"age": 30})));
        assert_eq!(
            result,
            Err(ValidationError::MissingRequiredField("name".into()))
        );

        let result = schema.validate(&attrs(json!({"name": null})));
        assert_eq!(
            result,
            Err(ValidationError::MissingRequiredField("name".into()))
        );
    }

    #[test]
    fn validate_type_mismatch() {
        let schema = test_schema();
        let result = schema.validate(&attrs(json!({"name": "Alice", "age": "thirty"})));
        assert_eq!(
            result,
            Err(ValidationError::TypeMismatch {
                field: "age".into(),
                expected: "Int".into(),
                got: "String".into(),
            })
        );
    }

    #[test]
    fn custom_validator_runs_after_fields() {
        let schema = test_schema().with_validator(|attrs| {
            if attrs.get("name") == Some(&json!("root")) {
                Err(ValidationError::Rejected("reserved name".into()))
            } else {
                Ok(())
            }
        });
        assert!(schema.validates());
        assert_eq!(
            schema.validate(&attrs(json!({"name": "root"}))),
            Err(ValidationError::Rejected("reserved name".into()))
        );
        assert!(schema.validate(&attrs(json!({"name": "alice"}))).is_ok());
    }

    #[test]
    fn parse_unwraps_envelope() {
        let schema = Schema::new().with_parser(|raw| raw["data"].clone());
        let parsed = schema.parse(json!({"data": {"id": 1, "name": "x"}}));
        assert_eq!(parsed, attrs(json!({"id": 1, "name": "x"})));

        assert!(schema.parse(json!({"data": 3})).is_empty());
    }

    #[test]
    fn field_serialization_roundtrip() {
        let field = FieldDef::required("name", FieldType::String);
        let json = serde_json::to_string(&field).unwrap();
        assert_eq!(json, r#"{"name":"name","fieldType":"string","required":true}"#);
        let parsed: FieldDef = serde_json::from_str(&json).unwrap();
        assert_eq!(field, parsed);
    }
}
