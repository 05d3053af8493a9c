//! Edge case tests for mirror-engine
//!
//! These tests cover boundary conditions and unusual inputs.

mod common;

use common::{collection_names, lettered, record_events, store};
use mirror_engine::{
    Entry, Error, EventKind, FieldDef, FieldType, Identity, Mode, PagerOptions, Record, Schema,
    SetOptions, Store, Topic,
};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::rc::Rc;

fn entries(values: Vec<Value>) -> Vec<Entry> {
    values.into_iter().map(Entry::from).collect()
}

fn change_count(record: &Record) -> Rc<RefCell<usize>> {
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    record.events().subscribe_to([Topic::Changed], move |_| {
        *sink.borrow_mut() += 1;
    });
    count
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn empty_string_attributes() {
    let record = store().record(json!({"id": 1, "name": ""})).unwrap();
    let changes = change_count(&record);

    record.set_attr("name", "").unwrap();
    assert_eq!(*changes.borrow(), 0);
    assert_eq!(record.get("name"), Some(json!("")));

    record.set_attr("name", "x").unwrap();
    assert_eq!(*changes.borrow(), 1);
    assert_eq!(record.previous("name"), Some(json!("")));
}

#[test]
fn unicode_attributes() {
    let store = store();
    let unicode_names = [
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];
    let collection = store.collection_of(lettered(&store, &unicode_names));

    assert_eq!(collection_names(&collection), unicode_names);
    for (i, name) in unicode_names.iter().enumerate() {
        let record = collection.get(&Identity::from(i as u64 + 1)).unwrap();
        assert_eq!(record.get("name"), Some(json!(name)), "lookup failed for {name}");
    }
}

#[test]
fn unicode_identity_is_percent_encoded() {
    let store = Store::new(Schema::new()).with_url("/items");
    let record = store.record(json!({"id": "日本 1"})).unwrap();
    assert_eq!(record.url().unwrap(), "/items/%E6%97%A5%E6%9C%AC+1");

    let record = store.record(json!({"id": "a/b?c=d&e"})).unwrap();
    assert_eq!(record.url().unwrap(), "/items/a%2Fb%3Fc%3Dd%26e");
}

#[test]
fn attribute_names_with_special_characters() {
    let record = store()
        .record(json!({"with space": 1, "dots.in.name": 2, "": 3, "ключ": 4}))
        .unwrap();

    assert_eq!(record.get("with space"), Some(json!(1)));
    assert_eq!(record.get(""), Some(json!(3)));
    assert_eq!(record.keys(), vec!["with space", "dots.in.name", "", "ключ"]);
    assert_eq!(
        Value::Object(record.omit(&["", "ключ"])),
        json!({"with space": 1, "dots.in.name": 2})
    );
}

// ============================================================================
// Identity Edge Cases
// ============================================================================

#[test]
fn numeric_and_string_identities_match() {
    let collection = store().collection_of(entries(vec![json!({"id": 1, "v": 1})]));
    let record = collection.at(0).unwrap();

    collection.set(
        entries(vec![json!({"id": "1", "v": 2})]),
        &SetOptions::default().remove(false),
    );

    assert_eq!(collection.len(), 1);
    assert_eq!(record.get("v"), Some(json!(2)));
    assert_eq!(collection.get(&Identity::from("1")), Some(record));
}

#[test]
fn integer_boundaries() {
    let collection = store().collection_of(entries(vec![
        json!({"id": u64::MAX}),
        json!({"id": i64::MIN}),
        json!({"id": 0}),
        json!({"id": 1.5}),
    ]));

    assert!(collection.has(&Identity::from(u64::MAX)));
    assert!(collection.has(&Identity::from(i64::MIN)));
    assert!(collection.has(&Identity::from(0)));
    assert!(collection.has(&Identity::from("1.5")));
    assert_eq!(collection.len(), 4);
}

#[test]
fn null_identity_is_new() {
    let collection = store().collection_of(entries(vec![
        json!({"id": null, "name": "a"}),
        json!({"id": null, "name": "b"}),
    ]));

    // neither carries an identity, so both are kept
    assert_eq!(collection.len(), 2);
    assert!(collection.records().iter().all(|record| record.is_new()));

    let first = collection.at(0).unwrap();
    first.set_attr("id", 8).unwrap();
    assert!(!first.is_new());
    assert_eq!(collection.get(&Identity::from(8)), Some(first));
}

// ============================================================================
// JSON Edge Cases
// ============================================================================

#[test]
fn deeply_nested_json() {
    let nested = |leaf: &str| {
        let mut value = json!(leaf);
        for depth in 0..64 {
            value = json!({"depth": depth, "child": value});
        }
        value
    };
    let record = store().record(json!({"id": 1, "tree": nested("leaf")})).unwrap();
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    record.events().subscribe(move |event| {
        if let EventKind::AttributeChanged { key, .. } = &event.kind {
            sink.borrow_mut().push(key.clone());
        }
    });

    record.set_attr("tree", nested("leaf")).unwrap();
    assert!(log.borrow().is_empty());

    record.set_attr("tree", nested("other")).unwrap();
    assert_eq!(*log.borrow(), vec!["tree"]);
}

#[test]
fn non_object_entries_are_skipped() {
    let collection = store().collection();
    collection.set_value(
        json!([{"id": 1}, 7, "x", null, [1, 2], {"id": 2}]),
        &SetOptions::default(),
    );
    assert_eq!(collection.pluck("id"), vec![json!(1), json!(2)]);

    // a single object is a one-record list
    collection.set_value(json!({"id": 3}), &SetOptions::default());
    assert_eq!(collection.pluck("id"), vec![json!(3)]);

    collection.set_value(json!(null), &SetOptions::default());
    assert!(collection.is_empty());
}

// ============================================================================
// Empty Inputs
// ============================================================================

#[test]
fn empty_set_on_empty_collection_is_quiet() {
    let collection = store().collection();
    let log = record_events(&collection);

    let result = collection.set(Vec::new(), &SetOptions::default());

    assert!(result.is_empty());
    assert!(log.borrow().is_empty());
    assert_eq!(collection.at(0), None);
    assert_eq!(collection.pop(&SetOptions::default()), None);
    assert_eq!(collection.shift(&SetOptions::default()), None);
}

#[test]
fn empty_reset_still_notifies() {
    let store = store();
    let collection = store.collection_of(lettered(&store, &["A", "B"]));
    let log = record_events(&collection);

    collection.reset(Vec::new(), &SetOptions::default());

    assert!(collection.is_empty());
    assert_eq!(*log.borrow(), vec!["reset"]);
}

#[test]
fn every_entry_rejected() {
    let schema = Schema::new().with_field(FieldDef::required("name", FieldType::String));
    let collection = Store::new(schema).collection();
    let log = record_events(&collection);

    let result = collection.set(
        entries(vec![json!({"id": 1}), json!({"id": 2, "name": 3})]),
        &SetOptions::default().validate(true),
    );

    assert!(result.is_empty());
    assert!(collection.is_empty());
    assert_eq!(*log.borrow(), vec!["invalid", "invalid"]);
}

#[test]
fn pager_rejects_bad_configuration() {
    let store = store();
    assert!(matches!(
        store.pager(Vec::new(), PagerOptions::default().page_size(0)),
        Err(Error::InvalidPageSize)
    ));
    assert!(matches!(
        store.pager(Vec::new(), PagerOptions::default().first_page(2)),
        Err(Error::InvalidFirstPage(2))
    ));
}

#[test]
fn empty_client_pager_has_one_empty_page() {
    let store = store();
    let pager = store
        .pager(Vec::new(), PagerOptions::default().mode(Mode::Client))
        .unwrap();

    let state = pager.state();
    assert_eq!(state.total_records, Some(0));
    assert_eq!(state.total_pages, Some(0));
    assert_eq!(state.last_page, Some(1));
    assert!(pager.records().is_empty());
    assert!(!pager.has_next_page());
}

// ============================================================================
// Large Collections
// ============================================================================

#[test]
fn large_collection_reorder() {
    let values: Vec<Value> = (0..10_000).map(|i| json!({"id": i, "n": i})).collect();
    let collection = store().collection_of(entries(values.clone()));
    let middle = collection.get(&Identity::from(5_000)).unwrap();
    let log = record_events(&collection);

    let reversed: Vec<Value> = values.into_iter().rev().collect();
    collection.set(entries(reversed), &SetOptions::default());

    assert_eq!(collection.len(), 10_000);
    assert_eq!(collection.at(0).and_then(|r| r.get("id")), Some(json!(9_999)));
    assert_eq!(collection.index_of(&middle), Some(4_999));
    assert_eq!(*log.borrow(), vec!["sort", "update"]);
}

// ============================================================================
// Re-entrancy
// ============================================================================

#[test]
fn handler_adding_during_add() {
    let store = store();
    let collection = store.collection_of(lettered(&store, &["Ada"]));
    let log = record_events(&collection);
    let inner = collection.clone();
    collection.events().subscribe_to([Topic::Add], move |event| {
        if let EventKind::Add { record, .. } = &event.kind {
            if record.get("name") == Some(json!("Bob")) {
                inner.push(json!({"id": 3, "name": "Cy"}), &SetOptions::add());
            }
        }
    });

    collection.push(json!({"id": 2, "name": "Bob"}), &SetOptions::add());

    assert_eq!(collection_names(&collection), vec!["Ada", "Bob", "Cy"]);
    assert_eq!(
        *log.borrow(),
        vec!["add:Bob", "add:Cy", "update", "update"]
    );
}

#[test]
fn handler_removing_the_record_being_changed() {
    let store = store();
    let collection = store.collection_of(lettered(&store, &["Ada", "Bob"]));
    let inner = collection.clone();
    collection.events().subscribe_to([Topic::Changed], move |event| {
        if let Some(record) = event.source.record() {
            inner.remove_one(record, &SetOptions::default());
        }
    });

    let ada = collection.at(0).unwrap();
    ada.set_attr("name", "Ada L.").unwrap();

    assert_eq!(collection_names(&collection), vec!["Bob"]);
    assert_eq!(ada.get("name"), Some(json!("Ada L.")));
    assert!(ada.collection().is_none());
}
