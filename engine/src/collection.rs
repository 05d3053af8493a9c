//! Ordered, uniquely indexed sets of records.
//!
//! Reconciliation (`set`, `add`, `remove`, `reset`) lives in
//! [`reconcile`](crate::reconcile); this module holds the collection itself
//! and its read and sequence operations.

use crate::comparator::Comparator;
use crate::event::{Event, EventChannel, EventKind, Source, SubscriptionId};
use crate::index::{Index, Key};
use crate::options::{FetchOptions, SaveOptions, SetOptions};
use crate::record::{into_attributes, Handle};
use crate::schema::Parser;
use crate::transport::{self, Operation, Request, Status};
use crate::{Attributes, Error, Record, Result, Store};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::rc::{Rc, Weak};

/// Input to reconciliation: an existing record or raw attributes.
#[derive(Debug, Clone)]
pub enum Entry {
    Record(Record),
    Attributes(Attributes),
}

impl From<Record> for Entry {
    fn from(record: Record) -> Self {
        Entry::Record(record)
    }
}

impl From<&Record> for Entry {
    fn from(record: &Record) -> Self {
        Entry::Record(record.clone())
    }
}

impl From<Attributes> for Entry {
    fn from(attrs: Attributes) -> Self {
        Entry::Attributes(attrs)
    }
}

impl From<Value> for Entry {
    fn from(value: Value) -> Self {
        Entry::Attributes(into_attributes(value))
    }
}

pub(crate) struct CollectionState {
    pub(crate) items: Vec<Record>,
    pub(crate) index: Index,
    pub(crate) comparator: Option<Comparator>,
    pub(crate) query: Attributes,
}

pub(crate) struct CollectionInner {
    pub(crate) store: Store,
    pub(crate) state: RefCell<CollectionState>,
    pub(crate) events: EventChannel,
    /// Relay subscription on each member record's channel
    pub(crate) relays: RefCell<HashMap<Handle, SubscriptionId>>,
    status: Cell<Status>,
    url: RefCell<Option<String>>,
    pub(crate) parser: RefCell<Option<Parser>>,
}

impl Drop for CollectionInner {
    fn drop(&mut self) {
        let relays = std::mem::take(self.relays.get_mut());
        for record in &self.state.get_mut().items {
            if let Some(id) = relays.get(&record.handle()) {
                record.events().unsubscribe(*id);
            }
        }
    }
}

/// An ordered set of records with unique identities.
///
/// `Collection` is a shared handle; clones refer to the same collection.
#[derive(Clone)]
pub struct Collection(pub(crate) Rc<CollectionInner>);

impl PartialEq for Collection {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for Collection {}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Collection");
        match self.0.state.try_borrow() {
            Ok(state) => debug
                .field("len", &state.items.len())
                .field("comparator", &state.comparator),
            Err(_) => debug.field("len", &"<busy>"),
        };
        debug.finish()
    }
}

impl Collection {
    pub(crate) fn new(store: &Store) -> Self {
        Collection(Rc::new(CollectionInner {
            store: store.clone(),
            state: RefCell::new(CollectionState {
                items: Vec::new(),
                index: Index::new(store.schema().id_attribute.clone()),
                comparator: None,
                query: Attributes::new(),
            }),
            events: EventChannel::new(),
            relays: RefCell::new(HashMap::new()),
            status: Cell::new(Status::default()),
            url: RefCell::new(None),
            parser: RefCell::new(None),
        }))
    }

    pub(crate) fn downgrade(&self) -> Weak<CollectionInner> {
        Rc::downgrade(&self.0)
    }

    pub fn store(&self) -> &Store {
        &self.0.store
    }

    pub fn events(&self) -> &EventChannel {
        &self.0.events
    }

    pub fn status(&self) -> Status {
        self.0.status.get()
    }

    pub(crate) fn set_status(&self, status: Status) {
        self.0.status.set(status);
    }

    pub(crate) fn emit(&self, kind: EventKind, options: &SetOptions) {
        self.0.events.emit(Event {
            source: Source::Collection(self.clone()),
            kind,
            options: options.clone(),
        });
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn comparator(&self) -> Option<Comparator> {
        self.0.state.borrow().comparator.clone()
    }

    /// Replace the comparator. Existing records are not re-sorted.
    pub fn set_comparator(&self, comparator: Option<Comparator>) {
        self.0.state.borrow_mut().comparator = comparator;
    }

    /// Use `url` instead of the store's url.
    pub fn set_url(&self, url: Option<String>) {
        *self.0.url.borrow_mut() = url;
    }

    pub fn url(&self) -> Result<String> {
        self.0
            .url
            .borrow()
            .clone()
            .or_else(|| self.0.store.url().map(str::to_string))
            .ok_or(Error::MissingUrl)
    }

    /// Hook converting a raw list response into a list of raw records.
    pub fn set_parser(&self, parser: impl Fn(Value) -> Value + 'static) {
        *self.0.parser.borrow_mut() = Some(Rc::new(parser));
    }

    /// Query value sent with every fetch.
    pub fn set_query_field(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.0
            .state
            .borrow_mut()
            .query
            .insert(key.into(), value.into());
    }

    pub fn unset_query_field(&self, key: &str) {
        self.0.state.borrow_mut().query.shift_remove(key);
    }

    pub fn query(&self) -> Attributes {
        self.0.state.borrow().query.clone()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get<'a>(&self, key: impl Into<Key<'a>>) -> Option<Record> {
        self.0.state.borrow().index.lookup(key.into())
    }

    pub fn has<'a>(&self, key: impl Into<Key<'a>>) -> bool {
        self.get(key).is_some()
    }

    /// Record at `index`; negative values count from the end.
    pub fn at(&self, index: isize) -> Option<Record> {
        let state = self.0.state.borrow();
        let index = if index < 0 {
            state.items.len().checked_sub(index.unsigned_abs())?
        } else {
            index.unsigned_abs()
        };
        state.items.get(index).cloned()
    }

    pub fn index_of(&self, record: &Record) -> Option<usize> {
        self.0.state.borrow().items.iter().position(|r| r == record)
    }

    pub fn contains(&self, record: &Record) -> bool {
        self.index_of(record).is_some()
    }

    pub fn len(&self) -> usize {
        self.0.state.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.state.borrow().items.is_empty()
    }

    pub fn first(&self) -> Option<Record> {
        self.0.state.borrow().items.first().cloned()
    }

    pub fn last(&self) -> Option<Record> {
        self.0.state.borrow().items.last().cloned()
    }

    /// Snapshot of the records in order.
    pub fn records(&self) -> Vec<Record> {
        self.0.state.borrow().items.clone()
    }

    /// Records in `range`, clamped to the collection bounds.
    pub fn slice(&self, range: Range<usize>) -> Vec<Record> {
        let state = self.0.state.borrow();
        let end = range.end.min(state.items.len());
        let start = range.start.min(end);
        state.items[start..end].to_vec()
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.records().iter().map(Record::to_json).collect())
    }

    // ========================================================================
    // Sequence operations
    //
    // These work on a snapshot, so the callbacks may mutate the collection.
    // ========================================================================

    pub fn map<T>(&self, f: impl FnMut(&Record) -> T) -> Vec<T> {
        self.records().iter().map(f).collect()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Record) -> bool) -> Vec<Record> {
        self.records()
            .into_iter()
            .filter(|record| predicate(record))
            .collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&Record) -> bool) -> Option<Record> {
        self.records().into_iter().find(|record| predicate(record))
    }

    pub fn fold<T>(&self, init: T, f: impl FnMut(T, &Record) -> T) -> T {
        self.records().iter().fold(init, f)
    }

    /// Records whose attributes include every entry of `attrs`.
    pub fn where_attrs(&self, attrs: &Attributes) -> Vec<Record> {
        self.filter(|record| record.matches(attrs))
    }

    pub fn find_where(&self, attrs: &Attributes) -> Option<Record> {
        self.find(|record| record.matches(attrs))
    }

    /// Value of `attr` for every record, `Null` where it is missing.
    pub fn pluck(&self, attr: &str) -> Vec<Value> {
        self.map(|record| record.get(attr).unwrap_or(Value::Null))
    }

    /// Re-order with the comparator.
    pub fn sort(&self, options: &SetOptions) -> Result<()> {
        let comparator = self.comparator().ok_or(Error::NoComparator)?;
        let mut items = self.records();
        comparator.sort(&mut items);
        self.0.state.borrow_mut().items = items;
        if !options.silent {
            self.emit(EventKind::Sort, options);
        }
        Ok(())
    }

    /// Append one entry.
    pub fn push(&self, entry: impl Into<Entry>, options: &SetOptions) -> Option<Record> {
        let at = self.len() as isize;
        self.add_one(entry, &options.clone().at(at))
    }

    /// Remove and return the last record.
    pub fn pop(&self, options: &SetOptions) -> Option<Record> {
        let last = self.last()?;
        self.remove_one(&last, options)
    }

    /// Prepend one entry.
    pub fn unshift(&self, entry: impl Into<Entry>, options: &SetOptions) -> Option<Record> {
        self.add_one(entry, &options.clone().at(0))
    }

    /// Remove and return the first record.
    pub fn shift(&self, options: &SetOptions) -> Option<Record> {
        let first = self.first()?;
        self.remove_one(&first, options)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Build a read request. Query values are layered, later sources winning:
    /// the collection's query fields, `derived`, `query`, and finally any
    /// query string embedded in the url.
    pub(crate) fn read_request(
        &self,
        url: Option<String>,
        derived: Attributes,
        query: &Attributes,
    ) -> Result<Request> {
        let url = match url {
            Some(url) => url,
            None => self.url()?,
        };

        let mut merged = self.query();
        merged.extend(derived);
        merged.extend(query.clone());

        let url = match url.split_once('?') {
            Some((base, query_string)) => {
                for (key, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
                    merged.insert(key.into_owned(), Value::String(value.into_owned()));
                }
                base.to_string()
            }
            None => url,
        };
        merged.retain(|_, value| !value.is_null());

        Ok(Request::new(Operation::Read, url).with_query(merged))
    }

    /// Load the collection from the remote resource and reconcile (or reset)
    /// with the response.
    pub async fn fetch(&self, options: &FetchOptions) -> Result<Vec<Record>> {
        let request = self.read_request(options.url.clone(), Attributes::new(), &options.query)?;
        let source = Source::Collection(self.clone());
        let response = transport::dispatch(&source, &self.0.store, request, &options.set).await?;

        let records = if options.reset {
            self.reset_value(response.body.clone(), &options.set)
        } else {
            self.set_value(response.body.clone(), &options.set)
        };
        tracing::debug!(count = records.len(), reset = options.reset, "fetched collection");
        self.emit(EventKind::Sync(response.body), &options.set);
        Ok(records)
    }

    /// Create a record in this collection and save it.
    ///
    /// Without `wait` the record joins the collection before the request is
    /// sent; with it, only once the server accepted it.
    pub async fn create(&self, entry: impl Into<Entry>, options: &SaveOptions) -> Result<Record> {
        let prepare_options = SetOptions::default().validate(options.validate);
        let record = self.prepare(entry.into(), &prepare_options)?;

        if !options.wait {
            self.add_one(&record, &SetOptions::add());
        }
        record.save(None, options).await?;
        if options.wait {
            self.add_one(&record, &SetOptions::add());
        }
        Ok(record)
    }
}
