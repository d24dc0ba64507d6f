use json_backed::{file, Store, StoreError};
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};

fn temp_path(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("json_backed_err_{}.json", name))
}

// ---- classification ----------------------------------------------------------

#[test]
fn missing_file_classifies_as_not_found_access() {
    let path = temp_path("classify_access");
    let _ = std::fs::remove_file(&path);

    {
        let db = file(&path);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        db.on_error(move |e| sink.lock().unwrap().push(e.clone()));
        db.load();

        let seen = seen.lock().unwrap();
        match &seen[0] {
            StoreError::Access { kind, op, code, .. } => {
                assert_eq!(*kind, io::ErrorKind::NotFound);
                assert_eq!(*op, "access");
                assert!(code.is_some());
            }
            other => panic!("expected Access, got {other:?}"),
        }
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unreachable_target_reports_on_load_and_on_save() {
    // a path under a directory that does not exist: unreadable and unwritable
    let path = std::env::temp_dir()
        .join("json_backed_missing_dir")
        .join("store.json");

    let db = file(&path);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    db.on_error(move |e| sink.lock().unwrap().push(e.clone()));

    db.load();
    db.set("1", json!({"a": 1})).unwrap();
    db.save(true);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(matches!(seen[0], StoreError::Access { .. }));
    assert!(matches!(seen[1], StoreError::Write { .. }));
}

#[test]
fn errors_display_without_panicking() {
    let path = temp_path("display");
    let _ = std::fs::remove_file(&path);

    {
        let db = file(&path);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        db.on_error(move |e| sink.lock().unwrap().push(e.to_string()));
        db.load();

        let seen = seen.lock().unwrap();
        assert!(seen[0].contains("cannot access"));
    }
    let _ = std::fs::remove_file(&path);
}

// ---- sink registration -------------------------------------------------------

#[test]
fn last_registered_sink_wins() {
    let path = temp_path("last_wins");
    let _ = std::fs::remove_file(&path);

    {
        let db = file(&path);
        let first = Arc::new(Mutex::new(0usize));
        let second = Arc::new(Mutex::new(0usize));

        let c = Arc::clone(&first);
        db.on_error(move |_| *c.lock().unwrap() += 1);
        let c = Arc::clone(&second);
        db.on_error(move |_| *c.lock().unwrap() += 1);

        db.load(); // missing file: one access error

        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn default_sink_swallows_failures_without_crashing() {
    let path = temp_path("default_sink");
    let _ = std::fs::remove_file(&path);

    {
        let db = file(&path);
        db.load(); // reported to the default logging sink; must not panic
        assert!(db.is_empty());
    }
    let _ = std::fs::remove_file(&path);
}

#[test]
fn builder_installs_the_sink_before_first_use() {
    let path = temp_path("builder_sink");
    let _ = std::fs::remove_file(&path);

    {
        let seen = Arc::new(Mutex::new(0usize));
        let sink = Arc::clone(&seen);
        let db = Store::builder()
            .path(&path)
            .on_error(move |_| *sink.lock().unwrap() += 1)
            .build();
        db.load();
        assert_eq!(*seen.lock().unwrap(), 1);
    }
    let _ = std::fs::remove_file(&path);
}

// ---- invalid argument is local, not sink-routed ------------------------------

#[test]
fn invalid_argument_does_not_reach_the_sink() {
    let db = json_backed::memory();
    let seen = Arc::new(Mutex::new(0usize));
    let sink = Arc::clone(&seen);
    db.on_error(move |_| *sink.lock().unwrap() += 1);

    let mut bad: std::collections::HashMap<Vec<u8>, i32> = std::collections::HashMap::new();
    bad.insert(vec![1], 1);
    assert!(db.set("k", bad).is_err());

    assert_eq!(*seen.lock().unwrap(), 0);
}
