//! Records: single entities with attribute change tracking.

use crate::collection::{Collection, CollectionInner};
use crate::event::{Event, EventChannel, EventKind, Source};
use crate::options::{DestroyOptions, SaveOptions, SetOptions};
use crate::transport::{self, Operation, Request, Status};
use crate::{Attributes, Error, Result, Store, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Process-local token assigned to a record at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn next() -> Self {
        Handle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Key of a persisted record.
///
/// Derived from the identity attribute: strings are kept as they are and
/// numbers use their decimal form, so `1` and `"1"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Identity carried by an attribute value. `Null` carries none.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Identity(s.clone())),
            Value::Number(n) => Some(Identity(n.to_string())),
            other => Some(Identity(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Identity(s)
    }
}

impl From<i64> for Identity {
    fn from(n: i64) -> Self {
        Identity(n.to_string())
    }
}

impl From<u64> for Identity {
    fn from(n: u64) -> Self {
        Identity(n.to_string())
    }
}

impl From<i32> for Identity {
    fn from(n: i32) -> Self {
        Identity(n.to_string())
    }
}

/// Convert a JSON value into an attribute map; anything but an object yields
/// an empty map.
pub(crate) fn into_attributes(value: Value) -> Attributes {
    match value {
        Value::Object(attrs) => attrs,
        Value::Null => Attributes::new(),
        other => {
            tracing::debug!(value = %other, "ignoring non-object attributes");
            Attributes::new()
        }
    }
}

#[derive(Default)]
struct RecordState {
    attributes: Attributes,
    /// Snapshot taken when the outermost change cycle started
    previous: Attributes,
    changed: Attributes,
    identity: Option<Identity>,
    changing: bool,
    pending: Option<SetOptions>,
    validation_error: Option<ValidationError>,
}

pub(crate) struct RecordInner {
    handle: Handle,
    store: Store,
    state: RefCell<RecordState>,
    events: EventChannel,
    collection: RefCell<Weak<CollectionInner>>,
    status: Cell<Status>,
}

/// A single entity mirrored from the remote resource.
///
/// `Record` is a shared handle: clones refer to the same entity, and
/// equality is identity of the entity, not of its attributes.
#[derive(Clone)]
pub struct Record(Rc<RecordInner>);

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Record {}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Record");
        debug.field("handle", &self.0.handle);
        match self.0.state.try_borrow() {
            Ok(state) => debug.field("attributes", &state.attributes),
            Err(_) => debug.field("attributes", &"<changing>"),
        };
        debug.finish()
    }
}

impl Record {
    fn empty(store: &Store) -> Self {
        Record(Rc::new(RecordInner {
            handle: Handle::next(),
            store: store.clone(),
            state: RefCell::new(RecordState::default()),
            events: EventChannel::new(),
            collection: RefCell::new(Weak::new()),
            status: Cell::new(Status::default()),
        }))
    }

    /// Materialize a record from raw attributes.
    ///
    /// Runs the schema parse hook when `options.parse` is set and layers the
    /// schema defaults under the given attributes. Fails only when
    /// `options.validate` is set and the result is rejected.
    pub(crate) fn build(
        store: &Store,
        attrs: Attributes,
        options: &SetOptions,
    ) -> std::result::Result<Record, ValidationError> {
        let attrs = if options.parse {
            store.schema().parse(Value::Object(attrs))
        } else {
            attrs
        };

        let mut initial = store.schema().defaults.clone();
        for (key, value) in attrs {
            initial.insert(key, value);
        }

        let record = Record::empty(store);
        record.set(initial, options)?;
        record.0.state.borrow_mut().changed.clear();
        Ok(record)
    }

    pub fn handle(&self) -> Handle {
        self.0.handle
    }

    pub fn identity(&self) -> Option<Identity> {
        self.0.state.borrow().identity.clone()
    }

    pub fn store(&self) -> &Store {
        &self.0.store
    }

    pub fn events(&self) -> &EventChannel {
        &self.0.events
    }

    /// The collection this record was first added to, while it is still a
    /// member.
    pub fn collection(&self) -> Option<Collection> {
        self.0.collection.borrow().upgrade().map(Collection)
    }

    pub fn status(&self) -> Status {
        self.0.status.get()
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.0.status.set(status);
    }

    pub(crate) fn link_collection(&self, collection: &Rc<CollectionInner>) {
        let mut link = self.0.collection.borrow_mut();
        if link.upgrade().is_none() {
            *link = Rc::downgrade(collection);
        }
    }

    pub(crate) fn unlink_collection(&self, collection: &Rc<CollectionInner>) {
        let mut link = self.0.collection.borrow_mut();
        if link.upgrade().is_some_and(|owner| Rc::ptr_eq(&owner, collection)) {
            *link = Weak::new();
        }
    }

    pub(crate) fn emit(&self, kind: EventKind, options: &SetOptions) {
        self.0.events.emit(Event {
            source: Source::Record(self.clone()),
            kind,
            options: options.clone(),
        });
    }

    // ========================================================================
    // Attribute access
    // ========================================================================

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.state.borrow().attributes.get(key).cloned()
    }

    /// Whether `key` holds a non-null value.
    pub fn has(&self, key: &str) -> bool {
        matches!(self.0.state.borrow().attributes.get(key), Some(v) if !v.is_null())
    }

    pub fn attributes(&self) -> Attributes {
        self.0.state.borrow().attributes.clone()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.attributes())
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.state.borrow().attributes.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.state.borrow().attributes.values().cloned().collect()
    }

    /// The attributes named in `keys`, in attribute order.
    pub fn pick(&self, keys: &[&str]) -> Attributes {
        self.0
            .state
            .borrow()
            .attributes
            .iter()
            .filter(|(key, _)| keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Every attribute except those named in `keys`.
    pub fn omit(&self, keys: &[&str]) -> Attributes {
        self.0
            .state
            .borrow()
            .attributes
            .iter()
            .filter(|(key, _)| !keys.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Whether every attribute in `attrs` has the same value here.
    pub fn matches(&self, attrs: &Attributes) -> bool {
        let state = self.0.state.borrow();
        attrs
            .iter()
            .all(|(key, value)| state.attributes.get(key) == Some(value))
    }

    pub fn is_new(&self) -> bool {
        self.0.state.borrow().identity.is_none()
    }

    /// A fresh record with the same attributes and a new handle.
    pub fn duplicate(&self) -> Record {
        let record = Record::empty(&self.0.store);
        record.assign(self.attributes(), &SetOptions::default().silent(true));
        record.0.state.borrow_mut().changed.clear();
        record
    }

    // ========================================================================
    // Change cycle
    // ========================================================================

    /// Apply `attrs` to this record.
    ///
    /// Emits one `AttributeChanged` per attribute whose value actually
    /// differs, then one `Changed` once the outermost cycle completes. A `set`
    /// made from inside a handler joins the running cycle and queues one more
    /// `Changed`.
    pub fn set(
        &self,
        attrs: Attributes,
        options: &SetOptions,
    ) -> std::result::Result<&Self, ValidationError> {
        if options.validate {
            self.run_validation(&attrs, options)?;
        }
        self.assign(attrs, options);
        Ok(self)
    }

    /// Set a single attribute.
    pub fn set_attr(
        &self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> std::result::Result<&Self, ValidationError> {
        let mut attrs = Attributes::new();
        attrs.insert(key.into(), value.into());
        self.set(attrs, &SetOptions::default())
    }

    /// Remove a single attribute.
    pub fn unset(
        &self,
        key: &str,
        options: &SetOptions,
    ) -> std::result::Result<&Self, ValidationError> {
        let mut attrs = Attributes::new();
        attrs.insert(key.to_string(), Value::Null);
        self.set(attrs, &options.clone().unset(true))
    }

    /// Remove every attribute.
    pub fn clear(&self, options: &SetOptions) -> std::result::Result<&Self, ValidationError> {
        let attrs = self
            .keys()
            .into_iter()
            .map(|key| (key, Value::Null))
            .collect();
        self.set(attrs, &options.clone().unset(true))
    }

    fn assign(&self, attrs: Attributes, options: &SetOptions) {
        let id_attribute = &self.0.store.schema().id_attribute;

        let (changes, outermost) = {
            let mut state = self.0.state.borrow_mut();
            let outermost = !state.changing;
            state.changing = true;
            if outermost {
                state.previous = state.attributes.clone();
                state.changed.clear();
            }

            let touches_identity = attrs.contains_key(id_attribute);
            let mut changes = Vec::new();
            for (key, value) in attrs {
                let proposed = (!options.unset).then_some(value);
                if state.attributes.get(&key) != proposed.as_ref() {
                    changes.push(key.clone());
                }
                if state.previous.get(&key) != proposed.as_ref() {
                    let marker = proposed.clone().unwrap_or(Value::Null);
                    state.changed.insert(key.clone(), marker);
                } else {
                    state.changed.shift_remove(&key);
                }
                match proposed {
                    Some(value) => {
                        state.attributes.insert(key, value);
                    }
                    None => {
                        state.attributes.shift_remove(&key);
                    }
                }
            }

            if touches_identity {
                state.identity = state
                    .attributes
                    .get(id_attribute)
                    .and_then(Identity::from_value);
            }
            if !options.silent && !changes.is_empty() {
                state.pending = Some(options.clone());
            }
            (changes, outermost)
        };

        if !options.silent {
            for key in changes {
                let value = self.get(&key).unwrap_or(Value::Null);
                self.emit(EventKind::AttributeChanged { key, value }, options);
            }
        }

        if !outermost {
            return;
        }

        loop {
            let pending = self.0.state.borrow_mut().pending.take();
            match pending {
                Some(pending) => self.emit(EventKind::Changed, &pending),
                None => break,
            }
        }
        self.0.state.borrow_mut().changing = false;
    }

    fn run_validation(
        &self,
        attrs: &Attributes,
        options: &SetOptions,
    ) -> std::result::Result<(), ValidationError> {
        let schema = self.0.store.schema();
        if !schema.validates() {
            return Ok(());
        }

        let mut candidate = self.attributes();
        for (key, value) in attrs {
            if options.unset {
                candidate.shift_remove(key);
            } else {
                candidate.insert(key.clone(), value.clone());
            }
        }

        let result = schema.validate(&candidate);
        self.0.state.borrow_mut().validation_error = result.clone().err();
        if let Err(err) = &result {
            tracing::debug!(handle = %self.0.handle, error = %err, "rejected attributes");
            self.emit(EventKind::Invalid(err.clone()), options);
        }
        result
    }

    /// Validate the current attributes, emitting `Invalid` on failure.
    pub fn is_valid(&self) -> bool {
        self.run_validation(&Attributes::new(), &SetOptions::default().validate(true))
            .is_ok()
    }

    pub fn validation_error(&self) -> Option<ValidationError> {
        self.0.state.borrow().validation_error.clone()
    }

    // ========================================================================
    // Change tracking
    // ========================================================================

    /// Whether the last change cycle touched `attr`, or anything at all.
    pub fn has_changed(&self, attr: Option<&str>) -> bool {
        let state = self.0.state.borrow();
        match attr {
            Some(attr) => state.changed.contains_key(attr),
            None => !state.changed.is_empty(),
        }
    }

    /// Attributes changed by the last cycle, or, given `diff`, the entries of
    /// `diff` that would change this record. `None` when nothing differs.
    pub fn changed_attributes(&self, diff: Option<&Attributes>) -> Option<Attributes> {
        let state = self.0.state.borrow();
        let Some(diff) = diff else {
            return (!state.changed.is_empty()).then(|| state.changed.clone());
        };

        let baseline = if state.changing {
            &state.previous
        } else {
            &state.attributes
        };
        let changed: Attributes = diff
            .iter()
            .filter(|(key, value)| baseline.get(*key) != Some(*value))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        (!changed.is_empty()).then_some(changed)
    }

    /// Value of `attr` before the last change cycle.
    pub fn previous(&self, attr: &str) -> Option<Value> {
        self.0.state.borrow().previous.get(attr).cloned()
    }

    pub fn previous_attributes(&self) -> Attributes {
        self.0.state.borrow().previous.clone()
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// The address of this record: the resource url, followed by the
    /// encoded identity once the record is persisted.
    pub fn url(&self) -> Result<String> {
        let base = match self.0.store.url() {
            Some(url) => url.to_string(),
            None => self
                .collection()
                .ok_or(Error::MissingUrl)
                .and_then(|collection| collection.url())?,
        };

        match self.identity() {
            None => Ok(base),
            Some(identity) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(identity.as_str().as_bytes()).collect();
                let separator = if base.ends_with('/') { "" } else { "/" };
                Ok(format!("{base}{separator}{encoded}"))
            }
        }
    }

    fn emit_sync(&self, body: Value, options: &SetOptions) {
        if !self.is_new() {
            self.emit(EventKind::Sync(body), options);
        }
    }

    /// Reload this record from the remote resource.
    ///
    /// The response goes through the schema parse hook and is applied with
    /// `options`.
    pub async fn fetch(&self, options: &SetOptions) -> Result<&Self> {
        let request = Request::new(Operation::Read, self.url()?);
        let source = Source::Record(self.clone());
        let response = transport::dispatch(&source, &self.0.store, request, options).await?;

        let attrs = self.0.store.schema().parse(response.body.clone());
        self.set(attrs, &options.clone().parse(false))?;
        self.emit_sync(response.body, options);
        Ok(self)
    }

    /// Persist this record, creating it when it is new.
    ///
    /// Without `wait` the attributes are applied before the request is sent;
    /// with it they are only validated, and applied together with the
    /// server's answer.
    pub async fn save(&self, attrs: Option<Attributes>, options: &SaveOptions) -> Result<&Self> {
        let set_options = options.set_options().parse(false);
        match (&attrs, options.wait) {
            (Some(attrs), false) => {
                self.set(attrs.clone(), &set_options)?;
            }
            _ if options.validate => {
                let proposed = attrs.clone().unwrap_or_default();
                self.run_validation(&proposed, &set_options)?;
            }
            _ => {}
        }

        let operation = if self.is_new() {
            Operation::Create
        } else if options.patch {
            Operation::Patch
        } else {
            Operation::Update
        };

        let body = match (&attrs, operation) {
            (Some(attrs), Operation::Patch) => Value::Object(attrs.clone()),
            _ => {
                let mut all = self.attributes();
                if let (Some(attrs), true) = (&attrs, options.wait) {
                    for (key, value) in attrs {
                        all.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(all)
            }
        };

        let request = Request::new(operation, self.url()?).with_body(body);
        let source = Source::Record(self.clone());
        let response = transport::dispatch(&source, &self.0.store, request, &set_options).await?;

        let mut server = if options.parse {
            self.0.store.schema().parse(response.body.clone())
        } else {
            into_attributes(response.body.clone())
        };
        if let (Some(attrs), true) = (attrs, options.wait) {
            let mut merged = attrs;
            merged.extend(server);
            server = merged;
        }
        if !server.is_empty() {
            self.set(server, &set_options)?;
        }

        self.emit_sync(response.body, &set_options);
        Ok(self)
    }

    /// Delete this record remotely and drop it from its collections.
    ///
    /// A record that was never persisted is dropped without a request.
    pub async fn destroy(&self, options: &DestroyOptions) -> Result<()> {
        let set_options = SetOptions::default();
        if self.is_new() {
            self.emit(EventKind::Destroy, &set_options);
            return Ok(());
        }

        let request = Request::new(Operation::Delete, self.url()?);
        if !options.wait {
            self.emit(EventKind::Destroy, &set_options);
        }

        let source = Source::Record(self.clone());
        let response = transport::dispatch(&source, &self.0.store, request, &set_options).await?;

        if options.wait {
            self.emit(EventKind::Destroy, &set_options);
        }
        self.emit_sync(response.body, &set_options);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FieldDef, FieldType, Schema, Topic};
    use serde_json::json;

    fn store() -> Store {
        Store::new(Schema::new())
    }

    fn attrs(value: Value) -> Attributes {
        into_attributes(value)
    }

    fn recorder(record: &Record) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        record.events().subscribe(move |event| {
            let entry = match &event.kind {
                EventKind::AttributeChanged { key, value } => format!("change:{key}={value}"),
                EventKind::Changed => "change".to_string(),
                EventKind::Invalid(err) => format!("invalid:{err}"),
                other => format!("{other:?}"),
            };
            sink.borrow_mut().push(entry);
        });
        log
    }

    #[test]
    fn handles_are_unique() {
        let store = store();
        let a = store.record(json!({})).unwrap();
        let b = store.record(json!({})).unwrap();
        assert_ne!(a.handle(), b.handle());
        assert!(a.handle().to_string().starts_with('c'));
    }

    #[test]
    fn identity_from_values() {
        assert_eq!(Identity::from_value(&json!(1)), Some(Identity::from(1)));
        assert_eq!(Identity::from_value(&json!("1")), Some(Identity::from("1")));
        assert_eq!(Identity::from_value(&Value::Null), None);
    }

    #[test]
    fn set_emits_only_differing_keys() {
        let record = store().record(json!({"a": 1, "b": 3})).unwrap();
        let log = recorder(&record);

        record
            .set(attrs(json!({"a": 1, "b": 2})), &SetOptions::default())
            .unwrap();

        assert_eq!(*log.borrow(), vec!["change:b=2", "change"]);
        assert!(record.has_changed(Some("b")));
        assert!(!record.has_changed(Some("a")));
        assert_eq!(record.previous("b"), Some(json!(3)));
    }

    #[test]
    fn second_identical_set_is_quiet() {
        let record = store().record(json!({"a": 1})).unwrap();
        record.set_attr("a", 2).unwrap();
        let log = recorder(&record);
        record.set_attr("a", 2).unwrap();
        assert!(log.borrow().is_empty());
        assert!(!record.has_changed(None));
    }

    #[test]
    fn silent_set_still_applies() {
        let record = store().record(json!({"a": 1})).unwrap();
        let log = recorder(&record);
        record
            .set(attrs(json!({"a": 5})), &SetOptions::default().silent(true))
            .unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(record.get("a"), Some(json!(5)));
    }

    #[test]
    fn unset_and_clear() {
        let record = store().record(json!({"id": 1, "a": 1, "b": 2})).unwrap();
        let log = recorder(&record);

        record.unset("a", &SetOptions::default()).unwrap();
        assert_eq!(record.get("a"), None);
        assert_eq!(record.keys(), vec!["id", "b"]);
        assert_eq!(*log.borrow(), vec!["change:a=null", "change"]);

        record.clear(&SetOptions::default()).unwrap();
        assert!(record.attributes().is_empty());
        assert!(record.is_new());
    }

    #[test]
    fn nested_set_queues_one_more_change() {
        let record = store().record(json!({"a": 1, "b": 1})).unwrap();
        let changes = Rc::new(Cell::new(0));

        let counter = Rc::clone(&changes);
        let inner = record.clone();
        record.events().subscribe_to([Topic::Changed], move |_| {
            counter.set(counter.get() + 1);
            if inner.get("b") == Some(json!(1)) {
                inner.set_attr("b", 2).unwrap();
            }
        });

        record.set_attr("a", 2).unwrap();
        assert_eq!(changes.get(), 2);
        assert_eq!(record.get("b"), Some(json!(2)));
        // both keys belong to the same cycle
        assert!(record.has_changed(Some("a")));
        assert!(record.has_changed(Some("b")));
    }

    #[test]
    fn key_returning_to_original_leaves_changed() {
        let record = store().record(json!({"a": 1})).unwrap();
        let inner = record.clone();
        record
            .events()
            .subscribe_to([Topic::Attribute("a".into())], move |event| {
                let back_to_one = matches!(
                    &event.kind,
                    EventKind::AttributeChanged { value, .. } if *value == json!(2)
                );
                if back_to_one {
                    inner.set_attr("a", 1).unwrap();
                }
            });

        record.set_attr("a", 2).unwrap();
        assert_eq!(record.get("a"), Some(json!(1)));
        assert!(!record.has_changed(Some("a")));
    }

    #[test]
    fn identity_tracks_id_attribute() {
        let store = Store::new(Schema::new().with_id_attribute("_id"));
        let record = store.record(json!({"name": "x"})).unwrap();
        assert!(record.is_new());

        record.set_attr("_id", "abc").unwrap();
        assert_eq!(record.identity(), Some(Identity::from("abc")));
        record.set_attr("_id", Value::Null).unwrap();
        assert!(record.is_new());
    }

    #[test]
    fn defaults_fill_missing_attributes() {
        let schema = Schema::new().with_defaults(attrs(json!({"done": false, "title": ""})));
        let record = Store::new(schema).record(json!({"title": "write"})).unwrap();
        assert_eq!(record.to_json(), json!({"done": false, "title": "write"}));
        assert!(!record.has_changed(None));
    }

    #[test]
    fn validation_rejects_and_emits_invalid() {
        let schema = Schema::new().with_field(FieldDef::required("name", FieldType::String));
        let record = Store::new(schema).record(json!({"name": "a"})).unwrap();
        let log = recorder(&record);

        let result = record.set(
            attrs(json!({"name": 3})),
            &SetOptions::default().validate(true),
        );
        assert!(result.is_err());
        assert_eq!(record.get("name"), Some(json!("a")));
        assert_eq!(
            *log.borrow(),
            vec!["invalid:type mismatch for field 'name': expected String, got Int"]
        );
        assert!(record.validation_error().is_some());

        // without the flag the change goes through
        record.set_attr("name", 3).unwrap();
        assert!(!record.is_valid());
    }

    #[test]
    fn changed_attributes_against_diff() {
        let record = store().record(json!({"a": 1, "b": 2})).unwrap();
        assert_eq!(record.changed_attributes(None), None);
        assert_eq!(
            record.changed_attributes(Some(&attrs(json!({"a": 1, "b": 3})))),
            Some(attrs(json!({"b": 3})))
        );
        assert_eq!(record.changed_attributes(Some(&attrs(json!({"a": 1})))), None);
    }

    #[test]
    fn pick_omit_matches() {
        let record = store().record(json!({"a": 1, "b": 2, "c": 3})).unwrap();
        assert_eq!(record.pick(&["c", "a"]), attrs(json!({"a": 1, "c": 3})));
        assert_eq!(record.omit(&["a"]), attrs(json!({"b": 2, "c": 3})));
        assert!(record.matches(&attrs(json!({"b": 2}))));
        assert!(!record.matches(&attrs(json!({"b": 2, "d": 1}))));
        assert!(record.has("a"));
        assert!(!record.has("d"));
    }

    #[test]
    fn duplicate_gets_fresh_handle() {
        let record = store().record(json!({"id": 9, "a": 1})).unwrap();
        let copy = record.duplicate();
        assert_ne!(copy.handle(), record.handle());
        assert_ne!(copy, record);
        assert_eq!(copy.attributes(), record.attributes());
        assert_eq!(copy.identity(), record.identity());
    }

    #[test]
    fn url_appends_encoded_identity() {
        let store = Store::new(Schema::new()).with_url("/users");
        let record = store.record(json!({"name": "x"})).unwrap();
        assert_eq!(record.url().unwrap(), "/users");

        record.set_attr("id", "a b/c").unwrap();
        assert_eq!(record.url().unwrap(), "/users/a+b%2Fc");

        let bare = Store::new(Schema::new()).record(json!({"id": 1})).unwrap();
        assert_eq!(bare.url(), Err(Error::MissingUrl));
    }
}
