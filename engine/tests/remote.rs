//! Record and collection persistence through a scripted transport.

mod common;

use common::{collection_names, lettered, record_events, remote_store, ScriptedTransport};
use mirror_engine::{
    Attributes, DestroyOptions, Error, EventKind, FetchOptions, FieldDef, FieldType, Identity,
    Operation, SaveOptions, Schema, SetOptions, Store, TransportError,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn attrs(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn fetch_applies_the_response() {
    let (store, transport) = remote_store("/users");
    let record = store.record(json!({"id": 7})).unwrap();
    transport.respond_json(json!({"id": 7, "name": "Ada"}));

    record.fetch(&SetOptions::default()).await.unwrap();

    assert_eq!(record.get("name"), Some(json!("Ada")));
    let request = transport.last_request().unwrap();
    assert_eq!(request.operation, Operation::Read);
    assert_eq!(request.url, "/users/7");
    assert_eq!(request.body, None);
}

#[tokio::test]
async fn saving_a_new_record_creates_it() {
    let (store, transport) = remote_store("/users");
    let record = store.record(json!({"name": "Ada"})).unwrap();
    let kinds = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&kinds);
    record.events().subscribe(move |event| {
        let label = match &event.kind {
            EventKind::Request(operation) => format!("request:{operation}"),
            EventKind::AttributeChanged { key, .. } => format!("change:{key}"),
            EventKind::Changed => "change".to_string(),
            EventKind::Sync(_) => "sync".to_string(),
            other => format!("{other:?}"),
        };
        sink.borrow_mut().push(label);
    });
    transport.respond_json(json!({"id": 9}));

    assert!(record.is_new());
    record.save(None, &SaveOptions::default()).await.unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.operation, Operation::Create);
    assert_eq!(request.url, "/users");
    assert_eq!(request.body, Some(json!({"name": "Ada"})));
    assert_eq!(record.identity(), Some(Identity::from(9)));
    assert!(!record.is_new());
    assert_eq!(
        *kinds.borrow(),
        vec!["request:create", "change:id", "change", "sync"]
    );
}

#[tokio::test]
async fn update_sends_everything_and_patch_only_the_change() {
    let (store, transport) = remote_store("/users");
    let record = store
        .record(json!({"id": 1, "name": "A", "age": 3}))
        .unwrap();
    transport.respond_json(json!({})).respond_json(json!({}));

    record
        .save(Some(attrs(json!({"name": "B"}))), &SaveOptions::default())
        .await
        .unwrap();
    record
        .save(
            Some(attrs(json!({"age": 4}))),
            &SaveOptions::default().patch(true),
        )
        .await
        .unwrap();

    let requests = transport.requests();
    assert_eq!(requests[0].operation, Operation::Update);
    assert_eq!(requests[0].url, "/users/1");
    assert_eq!(
        requests[0].body,
        Some(json!({"id": 1, "name": "B", "age": 3}))
    );
    assert_eq!(requests[1].operation, Operation::Patch);
    assert_eq!(requests[1].body, Some(json!({"age": 4})));
    assert_eq!(record.get("age"), Some(json!(4)));
}

#[tokio::test]
async fn waiting_save_applies_only_what_the_server_accepted() {
    let (store, transport) = remote_store("/users");
    let record = store.record(json!({"id": 1, "name": "A"})).unwrap();
    transport.fail(TransportError::with_status(500, "boom"));

    let err = record
        .save(
            Some(attrs(json!({"name": "B"}))),
            &SaveOptions::default().wait(true),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Transport(ref e) if e.status == Some(500)));
    assert_eq!(record.get("name"), Some(json!("A")));
    assert_eq!(
        transport.last_request().and_then(|request| request.body),
        Some(json!({"id": 1, "name": "B"}))
    );

    transport.respond_json(json!({"id": 1, "name": "B", "updated": true}));
    record
        .save(
            Some(attrs(json!({"name": "B"}))),
            &SaveOptions::default().wait(true),
        )
        .await
        .unwrap();
    assert_eq!(record.get("name"), Some(json!("B")));
    assert_eq!(record.get("updated"), Some(json!(true)));
}

#[tokio::test]
async fn rejected_attributes_never_reach_the_transport() {
    let transport = ScriptedTransport::new();
    let schema = Schema::new().with_field(FieldDef::required("name", FieldType::String));
    let store = Store::new(schema)
        .with_url("/users")
        .with_transport(transport.clone());
    let record = store.record(json!({"id": 1, "name": "A"})).unwrap();

    let err = record
        .save(Some(attrs(json!({"name": 5}))), &SaveOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(transport.requests().is_empty());
    assert_eq!(record.get("name"), Some(json!("A")));
    assert!(record.validation_error().is_some());
}

#[tokio::test]
async fn status_reports_the_request_in_flight() {
    let (store, transport) = remote_store("/users");
    let record = store.record(json!({"id": 1})).unwrap();
    let seen = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&seen);
    let observed = record.clone();
    record.events().subscribe(move |event| {
        if matches!(event.kind, EventKind::Request(_)) {
            *sink.borrow_mut() = Some(observed.status());
        }
    });
    transport.respond_json(json!({}));

    record.save(None, &SaveOptions::default()).await.unwrap();

    let status = seen.borrow().unwrap();
    assert!(status.saving);
    assert!(status.is_busy());
    assert!(!record.status().is_busy());
}

#[tokio::test]
async fn missing_transport_and_url_are_errors() {
    let offline = Store::new(Schema::new()).with_url("/users");
    let record = offline.record(json!({"id": 1})).unwrap();
    assert!(matches!(
        record.fetch(&SetOptions::default()).await,
        Err(Error::NoTransport)
    ));

    let nowhere = Store::new(Schema::new());
    let record = nowhere.record(json!({"id": 1})).unwrap();
    assert!(matches!(record.url(), Err(Error::MissingUrl)));

    // a collection url stands in for the missing store url
    let users = nowhere.collection();
    users.set_url(Some("/people/".to_string()));
    users.push(record.clone(), &SetOptions::add());
    assert_eq!(record.url().unwrap(), "/people/1");
}

// ============================================================================
// Destroy
// ============================================================================

#[tokio::test]
async fn destroy_removes_the_record_everywhere() {
    let (store, transport) = remote_store("/users");
    let team = store.collection_of(lettered(&store, &["Ada", "Bob"]));
    let favourites = store.collection();
    let ada = team.at(0).unwrap();
    favourites.push(ada.clone(), &SetOptions::add());
    transport.respond_json(json!({}));

    ada.destroy(&DestroyOptions::default()).await.unwrap();

    assert_eq!(collection_names(&team), vec!["Bob"]);
    assert!(favourites.is_empty());
    let request = transport.last_request().unwrap();
    assert_eq!(request.operation, Operation::Delete);
    assert_eq!(request.url, "/users/1");
}

#[tokio::test]
async fn waiting_destroy_keeps_the_record_on_failure() {
    let (store, transport) = remote_store("/users");
    let team = store.collection_of(lettered(&store, &["Ada", "Bob"]));
    let log = record_events(&team);
    transport.fail(TransportError::with_status(409, "conflict"));

    let ada = team.at(0).unwrap();
    let result = ada.destroy(&DestroyOptions { wait: true }).await;

    assert!(result.is_err());
    assert_eq!(collection_names(&team), vec!["Ada", "Bob"]);
    assert_eq!(*log.borrow(), vec!["request:delete", "error"]);
}

// ============================================================================
// Collections
// ============================================================================

#[tokio::test]
async fn fetch_reconciles_the_collection() {
    let (store, transport) = remote_store("/users");
    let team = store.collection_of(lettered(&store, &["Ada", "Bob"]));
    let ada = team.at(0).unwrap();
    team.set_query_field("team", "core");
    let log = record_events(&team);
    transport.respond_json(json!([
        {"id": 1, "name": "Ada"},
        {"id": 3, "name": "Cy"}
    ]));

    let records = team
        .fetch(&FetchOptions::default().query("page", 2))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(collection_names(&team), vec!["Ada", "Cy"]);
    assert_eq!(team.at(0), Some(ada));
    assert_eq!(*log.borrow(), vec!["request:read", "remove:Bob", "add:Cy", "sync"]);

    let request = transport.last_request().unwrap();
    assert_eq!(request.url, "/users");
    assert_eq!(Value::Object(request.query), json!({"team": "core", "page": 2}));
}

#[tokio::test]
async fn fetch_with_reset_replaces_everything() {
    let (store, transport) = remote_store("/users");
    let team = store.collection_of(lettered(&store, &["Ada", "Bob"]));
    let log = record_events(&team);
    transport.respond_json(json!([{"id": 2, "name": "Bob"}]));

    team.fetch(&FetchOptions::default().reset(true))
        .await
        .unwrap();

    assert_eq!(collection_names(&team), vec!["Bob"]);
    assert_eq!(*log.borrow(), vec!["request:read", "reset", "sync"]);
}

#[tokio::test]
async fn url_query_string_wins() {
    let (store, transport) = remote_store("/users");
    let team = store.collection();
    team.set_query_field("sort", "name");
    transport.respond_json(json!([]));

    team.fetch(
        &FetchOptions::default()
            .url("/archive?sort=age&limit=5")
            .query("sort", "id"),
    )
    .await
    .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.url, "/archive");
    assert_eq!(
        Value::Object(request.query),
        json!({"sort": "age", "limit": "5"})
    );
}

#[tokio::test]
async fn create_adds_then_saves() {
    let (store, transport) = remote_store("/users");
    let team = store.collection();
    let log = record_events(&team);
    transport.respond_json(json!({"id": 10}));

    let eve = team
        .create(json!({"name": "Eve"}), &SaveOptions::default())
        .await
        .unwrap();

    assert_eq!(team.get(&Identity::from(10)), Some(eve));
    assert_eq!(
        *log.borrow(),
        vec!["add:Eve", "request:create", "change:id", "change", "sync"]
    );
}

#[tokio::test]
async fn waiting_create_adds_nothing_on_failure() {
    let (store, transport) = remote_store("/users");
    let team = store.collection();
    transport.fail(TransportError::new("offline"));

    let result = team
        .create(json!({"name": "Eve"}), &SaveOptions::default().wait(true))
        .await;

    assert!(result.is_err());
    assert!(team.is_empty());
}
