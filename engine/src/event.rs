//! Synchronous notification channels.
//!
//! Every [`Record`] and [`Collection`] owns an [`EventChannel`]. Handlers run
//! in registration order, synchronously, while the emitting operation is
//! still on the stack. Dispatch iterates a snapshot of the subscriber list,
//! so a handler may subscribe, unsubscribe or emit again without disturbing
//! the dispatch in progress.
//!
//! A channel also keeps a queue of deferred actions. Work deferred while the
//! channel is dispatching runs once its outermost dispatch has finished, after
//! every handler has seen the event. Outside a dispatch it runs immediately.

use crate::options::SetOptions;
use crate::pager::PagerState;
use crate::{Collection, Record, TransportError, ValidationError};
use crate::transport::{Operation, Status};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

/// Identifies one subscription on one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// The entity an event was emitted by.
#[derive(Debug, Clone)]
pub enum Source {
    Record(Record),
    Collection(Collection),
}

impl Source {
    /// The record, if a record emitted the event.
    pub fn record(&self) -> Option<&Record> {
        match self {
            Source::Record(record) => Some(record),
            Source::Collection(_) => None,
        }
    }

    /// The collection, if a collection emitted the event.
    pub fn collection(&self) -> Option<&Collection> {
        match self {
            Source::Collection(collection) => Some(collection),
            Source::Record(_) => None,
        }
    }

    pub(crate) fn channel(&self) -> &EventChannel {
        match self {
            Source::Record(record) => record.events(),
            Source::Collection(collection) => collection.events(),
        }
    }

    pub(crate) fn set_status(&self, status: Status) {
        match self {
            Source::Record(record) => record.set_status(status),
            Source::Collection(collection) => collection.set_status(status),
        }
    }
}

/// Records touched by one collection update, in the order they were handled.
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub added: Vec<Record>,
    pub removed: Vec<Record>,
    pub merged: Vec<Record>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.merged.is_empty()
    }
}

/// What happened.
#[derive(Debug, Clone)]
pub enum EventKind {
    /// One attribute of a record took a new value. `value` is `Null` when the
    /// attribute was removed.
    AttributeChanged { key: String, value: Value },
    /// A record finished a change cycle that touched at least one attribute.
    Changed,
    /// A proposed change was rejected.
    Invalid(ValidationError),
    /// `record` joined `collection`, at `index` when the position was given.
    Add {
        record: Record,
        collection: Collection,
        index: Option<usize>,
    },
    /// `record` left `collection` from position `index`.
    Remove {
        record: Record,
        collection: Collection,
        index: usize,
    },
    /// Summary of one reconciliation pass.
    Update(Changes),
    /// The collection was emptied and refilled.
    Reset { previous: Vec<Record> },
    /// The collection order changed.
    Sort,
    /// A record was destroyed.
    Destroy,
    /// A request was handed to the transport.
    Request(Operation),
    /// A request completed and its response was applied.
    Sync(Value),
    /// A request failed.
    Error(TransportError),
    /// The pagination state moved.
    StateChanged(PagerState),
}

/// Subscription filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// Every event.
    All,
    /// Changes of one specific attribute.
    Attribute(String),
    /// Changes of any single attribute.
    AnyAttribute,
    Changed,
    Invalid,
    Add,
    Remove,
    Update,
    Reset,
    Sort,
    Destroy,
    Request,
    Sync,
    Error,
    StateChanged,
}

impl Topic {
    /// Whether an event of `kind` is delivered to this topic.
    pub fn matches(&self, kind: &EventKind) -> bool {
        match (self, kind) {
            (Topic::All, _) => true,
            (Topic::Attribute(name), EventKind::AttributeChanged { key, .. }) => name == key,
            (Topic::AnyAttribute, EventKind::AttributeChanged { .. }) => true,
            (Topic::Changed, EventKind::Changed) => true,
            (Topic::Invalid, EventKind::Invalid(_)) => true,
            (Topic::Add, EventKind::Add { .. }) => true,
            (Topic::Remove, EventKind::Remove { .. }) => true,
            (Topic::Update, EventKind::Update(_)) => true,
            (Topic::Reset, EventKind::Reset { .. }) => true,
            (Topic::Sort, EventKind::Sort) => true,
            (Topic::Destroy, EventKind::Destroy) => true,
            (Topic::Request, EventKind::Request(_)) => true,
            (Topic::Sync, EventKind::Sync(_)) => true,
            (Topic::Error, EventKind::Error(_)) => true,
            (Topic::StateChanged, EventKind::StateChanged(_)) => true,
            _ => false,
        }
    }
}

/// A notification delivered to subscribers.
#[derive(Debug, Clone)]
pub struct Event {
    /// Who emitted it
    pub source: Source,
    /// What happened
    pub kind: EventKind,
    /// Options of the operation that caused it
    pub options: SetOptions,
}

type Handler = Rc<dyn Fn(&Event)>;

struct Subscription {
    id: SubscriptionId,
    topics: Vec<Topic>,
    handler: Handler,
}

impl Subscription {
    fn wants(&self, kind: &EventKind) -> bool {
        self.topics.iter().any(|topic| topic.matches(kind))
    }
}

/// Ordered, re-entrant notification bus.
#[derive(Default)]
pub struct EventChannel {
    subscriptions: RefCell<Vec<Subscription>>,
    next_id: Cell<u64>,
    depth: Cell<usize>,
    deferred: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

impl fmt::Debug for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .field("depth", &self.depth.get())
            .finish()
    }
}

impl EventChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event.
    pub fn subscribe(&self, handler: impl Fn(&Event) + 'static) -> SubscriptionId {
        self.subscribe_to([Topic::All], handler)
    }

    /// Subscribe to the events matching any of `topics`.
    pub fn subscribe_to(
        &self,
        topics: impl IntoIterator<Item = Topic>,
        handler: impl Fn(&Event) + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.subscriptions.borrow_mut().push(Subscription {
            id,
            topics: topics.into_iter().collect(),
            handler: Rc::new(handler),
        });
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.borrow_mut();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Whether a dispatch is in progress on this channel.
    pub fn is_dispatching(&self) -> bool {
        self.depth.get() > 0
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Subscribers added during the dispatch do not see this event; those
    /// removed during it are skipped.
    pub fn emit(&self, event: Event) {
        let snapshot: Vec<(SubscriptionId, Handler)> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|s| s.wants(&event.kind))
            .map(|s| (s.id, Rc::clone(&s.handler)))
            .collect();

        self.depth.set(self.depth.get() + 1);
        for (id, handler) in snapshot {
            if self.is_live(id) {
                handler(&event);
            }
        }
        self.depth.set(self.depth.get() - 1);

        if self.depth.get() == 0 {
            self.drain();
        }
    }

    /// Run `action` after the outermost dispatch in progress, or right away
    /// when the channel is idle.
    pub fn defer(&self, action: impl FnOnce() + 'static) {
        if self.is_dispatching() {
            self.deferred.borrow_mut().push_back(Box::new(action));
        } else {
            action();
        }
    }

    fn is_live(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow().iter().any(|s| s.id == id)
    }

    fn drain(&self) {
        loop {
            let next = self.deferred.borrow_mut().pop_front();
            match next {
                Some(action) => action(),
                None => break,
            }
        }
    }
}
