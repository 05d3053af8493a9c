//! # Mirror Engine
//!
//! An in-memory, reactive record store that mirrors a remote resource.
//!
//! This crate keeps an ordered, uniquely indexed set of records in step with
//! the snapshots a server hands out. Incoming data is reconciled against the
//! current state with minimal mutation: records keep their identity across
//! updates, and only the notifications the change warrants are emitted.
//!
//! ## Design Principles
//!
//! - **Identity preserving**: a record that survives an update is the same object
//! - **Minimal deltas**: unchanged attributes and records produce no events
//! - **Re-entrant**: handlers may mutate the store while it notifies them
//! - **Transport agnostic**: IO happens behind the [`Transport`] trait only
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] holds an insertion-ordered attribute map with per-attribute
//! change tracking. Every record has a process-local [`Handle`]; once it is
//! persisted it also has an [`Identity`] taken from its id attribute.
//!
//! ### Collections
//!
//! A [`Collection`] is an ordered set of records with a dual-keyed [`Index`]
//! and an optional [`Comparator`]. [`Collection::set`] is the reconciliation
//! entry point: it merges, adds, removes and re-orders in one pass.
//!
//! ### Events
//!
//! Records and collections own an [`EventChannel`]. Collections relay the
//! events of their members, so a single subscription on a collection sees
//! every change of every record in it.
//!
//! ### Pagination
//!
//! A [`Pager`] keeps a page collection and, outside server mode, a full
//! collection consistent with each other and with its [`PagerState`], in
//! server, client or link-following infinite [`Mode`].
//!
//! ## Quick Start
//!
//! ```rust
//! use mirror_engine::{EventKind, Identity, Schema, SetOptions, Store, Topic};
//! use serde_json::json;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! // 1. Create a store and load a snapshot
//! let store = Store::new(Schema::new());
//! let users = store.collection_of(vec![
//!     json!({"id": 1, "name": "Ada"}).into(),
//!     json!({"id": 2, "name": "Linus"}).into(),
//! ]);
//! let ada = users.get(&Identity::from(1)).unwrap();
//!
//! // 2. Listen for membership changes
//! let log = Rc::new(RefCell::new(Vec::new()));
//! let sink = Rc::clone(&log);
//! users.events().subscribe_to([Topic::Add, Topic::Remove], move |event| {
//!     let kind = match &event.kind {
//!         EventKind::Add { .. } => "add",
//!         _ => "remove",
//!     };
//!     sink.borrow_mut().push(kind);
//! });
//!
//! // 3. Reconcile with a newer snapshot
//! users.set(
//!     vec![
//!         json!({"id": 1, "name": "Ada L."}).into(),
//!         json!({"id": 3, "name": "Grace"}).into(),
//!     ],
//!     &SetOptions::default(),
//! );
//!
//! // The surviving record is the same object, updated in place
//! assert_eq!(ada.get("name"), Some(json!("Ada L.")));
//! assert_eq!(users.get(&Identity::from(1)), Some(ada));
//! assert_eq!(*log.borrow(), vec!["remove", "add"]);
//! ```
//!
//! ## Remote Data
//!
//! [`Record::fetch`], [`Record::save`], [`Record::destroy`],
//! [`Collection::fetch`], [`Collection::create`] and the [`Pager`] navigation
//! methods go through the store's [`Transport`]. They are `async` and the
//! store is single threaded; drive them from a local executor.

pub mod collection;
pub mod comparator;
pub mod error;
pub mod event;
pub mod index;
pub mod options;
pub mod pager;
pub mod reconcile;
pub mod record;
pub mod schema;
pub mod store;
pub mod transport;

// Re-export main types at crate root
pub use collection::{Collection, Entry};
pub use comparator::{compare_values, Comparator};
pub use error::{Error, Result, TransportError, ValidationError};
pub use event::{Changes, Event, EventChannel, EventKind, Source, SubscriptionId, Topic};
pub use index::{Index, Key};
pub use options::{Cause, DestroyOptions, FetchOptions, SaveOptions, SetOptions};
pub use pager::{
    Directions, Mode, Order, Page, PageOptions, Pager, PagerOptions, PagerState, QueryParams,
    ResizeOptions, SortOptions, SortSide, SortValue, StateOptions, SwitchOptions,
};
pub use record::{Handle, Identity, Record};
pub use schema::{FieldDef, FieldType, Schema};
pub use store::Store;
pub use transport::{Operation, Request, Response, Status, Transport};

/// Attribute map of a record, in insertion order.
pub type Attributes = serde_json::Map<String, serde_json::Value>;
