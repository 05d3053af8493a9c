//! Store - the entry point for one remote resource.
//!
//! A Store bundles the [`Schema`] of the resource with its base url and the
//! [`Transport`] that reaches it, and creates the records, collections and
//! pagers that mirror it.

use crate::collection::Entry;
use crate::pager::{Pager, PagerOptions};
use crate::record::{into_attributes, Identity};
use crate::transport::Transport;
use crate::{Attributes, Collection, Record, Result, Schema, SetOptions, ValidationError};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
struct StoreInner {
    schema: Schema,
    url: Option<String>,
    transport: Option<Rc<dyn Transport>>,
}

/// Factory and shared configuration of one remote resource.
#[derive(Clone)]
pub struct Store(Rc<StoreInner>);

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("schema", &self.0.schema)
            .field("url", &self.0.url)
            .field("transport", &self.0.transport.is_some())
            .finish()
    }
}

impl Store {
    /// Create a store with no url and no transport.
    pub fn new(schema: Schema) -> Self {
        Store(Rc::new(StoreInner {
            schema,
            url: None,
            transport: None,
        }))
    }

    fn into_inner(self) -> StoreInner {
        Rc::try_unwrap(self.0).unwrap_or_else(|shared| (*shared).clone())
    }

    /// Builder-style method to set the resource url.
    pub fn with_url(self, url: impl Into<String>) -> Self {
        let mut inner = self.into_inner();
        inner.url = Some(url.into());
        Store(Rc::new(inner))
    }

    /// Builder-style method to set the transport.
    pub fn with_transport(self, transport: impl Transport + 'static) -> Self {
        let mut inner = self.into_inner();
        inner.transport = Some(Rc::new(transport));
        Store(Rc::new(inner))
    }

    pub fn schema(&self) -> &Schema {
        &self.0.schema
    }

    pub fn url(&self) -> Option<&str> {
        self.0.url.as_deref()
    }

    pub fn transport(&self) -> Option<Rc<dyn Transport>> {
        self.0.transport.clone()
    }

    /// Identity carried by raw attributes.
    pub fn identity_of(&self, attrs: &Attributes) -> Option<Identity> {
        attrs
            .get(&self.0.schema.id_attribute)
            .and_then(Identity::from_value)
    }

    /// Create a record from a JSON object.
    pub fn record(&self, attrs: Value) -> std::result::Result<Record, ValidationError> {
        self.build_record(into_attributes(attrs), &SetOptions::default())
    }

    /// Create a record, applying the parse and validate flags of `options`.
    pub fn build_record(
        &self,
        attrs: Attributes,
        options: &SetOptions,
    ) -> std::result::Result<Record, ValidationError> {
        Record::build(self, attrs, options)
    }

    /// Create an empty collection.
    pub fn collection(&self) -> Collection {
        Collection::new(self)
    }

    /// Create a collection holding `entries`.
    pub fn collection_of(&self, entries: Vec<Entry>) -> Collection {
        let collection = Collection::new(self);
        collection.reset(entries, &SetOptions::default().silent(true));
        collection
    }

    /// Create a pager over `entries`.
    pub fn pager(&self, entries: Vec<Entry>, options: PagerOptions) -> Result<Pager> {
        Pager::new(self, entries, options)
    }
}
