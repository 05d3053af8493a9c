//! Shared helpers for the integration tests.

#![allow(dead_code)]

use futures::future::{FutureExt, LocalBoxFuture};
use mirror_engine::{
    Collection, Entry, EventKind, Record, Request, Response, Schema, Store, Transport,
    TransportError,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Default)]
struct Script {
    responses: RefCell<VecDeque<Result<Response, TransportError>>>,
    requests: RefCell<Vec<Request>>,
}

/// Transport answering from a queue of canned responses.
#[derive(Clone, Default)]
pub struct ScriptedTransport(Rc<Script>);

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, response: Response) -> &Self {
        self.0.responses.borrow_mut().push_back(Ok(response));
        self
    }

    pub fn respond_json(&self, body: Value) -> &Self {
        self.respond(Response::new(body))
    }

    pub fn fail(&self, error: TransportError) -> &Self {
        self.0.responses.borrow_mut().push_back(Err(error));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.0.requests.borrow().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.0.requests.borrow().last().cloned()
    }
}

impl Transport for ScriptedTransport {
    fn sync(&self, request: Request) -> LocalBoxFuture<'static, Result<Response, TransportError>> {
        self.0.requests.borrow_mut().push(request);
        let next = self
            .0
            .responses
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::new("no scripted response")));
        async move { next }.boxed_local()
    }
}

pub fn store() -> Store {
    Store::new(Schema::new())
}

pub fn remote_store(url: &str) -> (Store, ScriptedTransport) {
    let transport = ScriptedTransport::new();
    let store = Store::new(Schema::new())
        .with_url(url)
        .with_transport(transport.clone());
    (store, transport)
}

/// Records `{"id": n, "name": name}` numbered from 1.
pub fn lettered(store: &Store, names: &[&str]) -> Vec<Entry> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let record = store
                .record(json!({"id": i + 1, "name": name}))
                .expect("valid record");
            Entry::from(record)
        })
        .collect()
}

pub fn names(records: &[Record]) -> Vec<String> {
    records
        .iter()
        .map(|record| {
            record
                .get("name")
                .and_then(|name| name.as_str().map(str::to_string))
                .unwrap_or_default()
        })
        .collect()
}

pub fn collection_names(collection: &Collection) -> Vec<String> {
    names(&collection.records())
}

/// Short labels of every event delivered on `collection`'s channel.
pub fn record_events(collection: &Collection) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    collection.events().subscribe(move |event| {
        let label = match &event.kind {
            EventKind::AttributeChanged { key, .. } => format!("change:{key}"),
            EventKind::Changed => "change".to_string(),
            EventKind::Invalid(_) => "invalid".to_string(),
            EventKind::Add { record, .. } => format!("add:{}", label(record)),
            EventKind::Remove { record, .. } => format!("remove:{}", label(record)),
            EventKind::Update(_) => "update".to_string(),
            EventKind::Reset { .. } => "reset".to_string(),
            EventKind::Sort => "sort".to_string(),
            EventKind::Destroy => "destroy".to_string(),
            EventKind::Request(operation) => format!("request:{operation}"),
            EventKind::Sync(_) => "sync".to_string(),
            EventKind::Error(_) => "error".to_string(),
            EventKind::StateChanged(state) => format!("state:{}", state.current_page),
        };
        sink.borrow_mut().push(label);
    });
    log
}

fn label(record: &Record) -> String {
    match record.get("name") {
        Some(Value::String(name)) => name,
        _ => record
            .identity()
            .map(|identity| identity.to_string())
            .unwrap_or_else(|| record.handle().to_string()),
    }
}
