//! Dual-keyed record lookup.

use crate::record::{Handle, Identity, Record};
use crate::Attributes;
use std::collections::HashMap;

/// Anything a record can be looked up by.
#[derive(Debug, Clone, Copy)]
pub enum Key<'a> {
    Identity(&'a Identity),
    Handle(Handle),
    Record(&'a Record),
    /// Raw attributes, looked up by the identity they carry
    Attributes(&'a Attributes),
}

impl<'a> From<&'a Identity> for Key<'a> {
    fn from(identity: &'a Identity) -> Self {
        Key::Identity(identity)
    }
}

impl From<Handle> for Key<'_> {
    fn from(handle: Handle) -> Self {
        Key::Handle(handle)
    }
}

impl<'a> From<&'a Record> for Key<'a> {
    fn from(record: &'a Record) -> Self {
        Key::Record(record)
    }
}

impl<'a> From<&'a Attributes> for Key<'a> {
    fn from(attrs: &'a Attributes) -> Self {
        Key::Attributes(attrs)
    }
}

/// Records by identity and by handle.
#[derive(Debug, Default, Clone)]
pub struct Index {
    id_attribute: String,
    by_identity: HashMap<Identity, Record>,
    by_handle: HashMap<Handle, Record>,
}

impl Index {
    pub fn new(id_attribute: impl Into<String>) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            by_identity: HashMap::new(),
            by_handle: HashMap::new(),
        }
    }

    /// Identity first, then handle.
    pub fn lookup(&self, key: Key<'_>) -> Option<Record> {
        match key {
            Key::Identity(identity) => self.by_identity.get(identity).cloned(),
            Key::Handle(handle) => self.by_handle.get(&handle).cloned(),
            Key::Record(record) => record
                .identity()
                .and_then(|identity| self.by_identity.get(&identity).cloned())
                .or_else(|| self.by_handle.get(&record.handle()).cloned()),
            Key::Attributes(attrs) => attrs
                .get(&self.id_attribute)
                .and_then(Identity::from_value)
                .and_then(|identity| self.by_identity.get(&identity).cloned()),
        }
    }

    pub fn insert(&mut self, record: &Record) {
        self.by_handle.insert(record.handle(), record.clone());
        if let Some(identity) = record.identity() {
            self.by_identity.insert(identity, record.clone());
        }
    }

    /// Drop both keys of `record`. `identity` overrides the record's current
    /// identity, for records whose identity already moved.
    pub fn remove(&mut self, record: &Record, identity: Option<Identity>) {
        self.by_handle.remove(&record.handle());
        if let Some(identity) = identity.or_else(|| record.identity()) {
            if self
                .by_identity
                .get(&identity)
                .is_some_and(|indexed| indexed == record)
            {
                self.by_identity.remove(&identity);
            }
        }
    }

    /// Move `record` from identity `old` to identity `new`.
    pub fn reindex(&mut self, record: &Record, old: Option<&Identity>, new: Option<&Identity>) {
        if old == new {
            return;
        }
        if let Some(old) = old {
            if self.by_identity.get(old).is_some_and(|indexed| indexed == record) {
                self.by_identity.remove(old);
            }
        }
        if let Some(new) = new {
            self.by_identity.insert(new.clone(), record.clone());
        }
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_handle.is_empty()
    }

    pub fn identity_count(&self) -> usize {
        self.by_identity.len()
    }

    pub fn clear(&mut self) {
        self.by_identity.clear();
        self.by_handle.clear();
    }
}
