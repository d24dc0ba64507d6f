use json_backed::{memory, Store, StoreError};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

// ---- set / get ---------------------------------------------------------------

#[test]
fn set_then_get_round_trips_attributes() {
    let db = memory();
    db.set("k", json!({"a": 1})).unwrap();
    assert_eq!(db.get("k").unwrap().get("a"), Some(json!(1)));
}

#[test]
fn set_returns_a_live_handle() {
    let db = memory();
    let handle = db.set("1", json!({"id": 1})).unwrap();
    assert_eq!(handle.get("id"), Some(json!(1)));

    handle.set("assigned", "later").unwrap();
    assert_eq!(
        db.get("1").unwrap().get("assigned"),
        Some(json!("later"))
    );
}

#[test]
fn typed_values_serialize_into_the_store() {
    #[derive(Serialize)]
    struct Session {
        user: String,
        visits: u32,
    }

    let db = memory();
    db.set(
        "session",
        Session {
            user: "ada".into(),
            visits: 3,
        },
    )
    .unwrap();
    assert_eq!(db.get("session").unwrap().get("visits"), Some(json!(3)));
}

#[test]
fn get_missing_key_is_none() {
    let db = memory();
    assert!(db.get("nope").is_none());
}

// ---- dirty flag --------------------------------------------------------------

#[test]
fn mutating_a_got_handle_marks_dirty() {
    let db = memory();
    db.set("k", json!({"a": 1})).unwrap();
    db.save(true); // clear the flag set by `set`
    assert!(!db.is_dirty());

    let handle = db.get("k").unwrap();
    handle.set("a", 2).unwrap();
    assert!(db.is_dirty());
    assert_eq!(db.get("k").unwrap().get("a"), Some(json!(2)));
}

#[test]
fn set_and_remove_mark_dirty() {
    let db = memory();
    assert!(!db.is_dirty());
    db.set("k", json!({})).unwrap();
    assert!(db.is_dirty());

    db.save(true);
    assert!(!db.is_dirty());

    // conservative semantics: removing an absent key still marks dirty
    db.remove("never-existed");
    assert!(db.is_dirty());
}

#[test]
fn sync_save_clears_dirty_before_returning() {
    let db = memory();
    db.set("k", json!({"a": 1})).unwrap();
    db.save(true);
    assert!(!db.is_dirty());
}

// ---- invalid arguments -------------------------------------------------------

#[test]
fn unconvertible_value_is_rejected_whole() {
    let db = memory();
    let mut bad: HashMap<Vec<u8>, i32> = HashMap::new();
    bad.insert(vec![1, 2], 3);

    let err = db.set("k", bad).unwrap_err();
    assert!(matches!(err, StoreError::InvalidArgument(_)));

    // no partial write, no dirty flag change
    assert!(db.is_empty());
    assert!(!db.is_dirty());
    assert!(db.get("k").is_none());
}

// ---- remove ------------------------------------------------------------------

#[test]
fn remove_returns_previous_value() {
    let db = memory();
    db.set("k", json!({"a": 1})).unwrap();
    assert_eq!(db.remove("k"), Some(json!({"a": 1})));
    assert_eq!(db.remove("k"), None);
    assert!(db.get("k").is_none());
}

// ---- iteration ---------------------------------------------------------------

#[test]
fn for_each_hands_out_tracked_handles() {
    let db = memory();
    db.set("a", json!({"id": "a"})).unwrap();
    db.save(true);

    db.for_each(|handle, key| {
        assert_eq!(handle.get("id"), Some(json!(key)));
        handle.set("visited", true).unwrap();
    });

    assert!(db.is_dirty());
    assert_eq!(db.get("a").unwrap().get("visited"), Some(json!(true)));
}

#[test]
fn for_each_is_chainable() {
    let db = memory();
    db.set("a", json!({})).unwrap();
    db.set("b", json!({})).unwrap();

    let mut first = 0;
    let mut second = 0;
    db.for_each(|_, _| first += 1).for_each(|_, _| second += 1);
    assert_eq!((first, second), (2, 2));
}

#[test]
fn for_each_plain_reads_without_tracking() {
    let db = memory();
    db.set("a", json!({"n": 1})).unwrap();
    db.set("b", json!({"n": 2})).unwrap();
    db.save(true);

    let mut seen = Vec::new();
    db.for_each_plain(|value, key| {
        seen.push((key.to_string(), value.clone()));
    });
    seen.sort_by(|a, b| a.0.cmp(&b.0));

    assert_eq!(
        seen,
        vec![
            ("a".into(), json!({"n": 1})),
            ("b".into(), json!({"n": 2})),
        ]
    );
    // read-only pass: nothing got dirty
    assert!(!db.is_dirty());
}

// ---- unsupported value shapes ------------------------------------------------

#[test]
fn non_bag_values_are_stored_but_untracked() {
    let db = memory();
    let handle = db.set("list", json!([1, 2, 3])).unwrap();
    assert!(!handle.is_tracked());
    assert_eq!(handle.to_value(), json!([1, 2, 3]));

    let again = db.get("list").unwrap();
    assert!(!again.is_tracked());
    assert_eq!(again.to_value(), json!([1, 2, 3]));
}

// ---- snapshots ---------------------------------------------------------------

#[test]
fn len_keys_contains() {
    let db = memory();
    assert!(db.is_empty());
    db.set("x", json!({})).unwrap();
    db.set("y", json!({})).unwrap();

    assert_eq!(db.len(), 2);
    assert!(db.contains_key("x"));
    assert!(!db.contains_key("z"));

    let mut keys = db.keys();
    keys.sort();
    assert_eq!(keys, vec!["x".to_string(), "y".to_string()]);
}

// ---- memory backend ----------------------------------------------------------

#[test]
fn memory_load_is_a_defensive_reset() {
    let db = memory();
    db.set("a", json!({})).unwrap();
    db.load();
    assert!(db.is_empty());
}

#[test]
fn memory_store_has_no_path() {
    let db = memory();
    assert!(db.path().is_none());
}

// ---- debug -------------------------------------------------------------------

#[test]
fn debug_impls_dont_panic() {
    let db = memory();
    let dbg_store = format!("{:?}", *db);
    assert!(dbg_store.contains("Store"));
    assert!(dbg_store.contains("backend"));

    let dbg_handle = format!("{db:?}");
    assert!(dbg_handle.contains("Store"));

    let builder = Store::builder();
    assert!(format!("{builder:?}").contains("StoreBuilder"));
}
