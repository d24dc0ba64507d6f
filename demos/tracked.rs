use json_backed::{Store, StoreError};
use serde_json::json;
use std::time::Duration;

fn main() {
    let path = std::env::temp_dir().join("json_backed_example_tracked.json");

    // short flush interval + custom error sink
    let db = Store::builder()
        .path(&path)
        .interval(Duration::from_millis(200))
        .on_error(|e: &StoreError| eprintln!("storage error: {e}"))
        .build();
    db.load();

    let profile = db
        .set("profile", json!({"name": "ada", "prefs": {"theme": "dark"}}))
        .unwrap();

    // nested handles write through to the same underlying object
    let prefs = profile.child("prefs").unwrap();
    prefs.set("theme", "light").unwrap();
    println!("profile = {}", profile.to_value());

    // the timer picks the mutation up without an explicit save
    std::thread::sleep(Duration::from_millis(600));
    let on_disk = std::fs::read_to_string(&path).unwrap();
    println!("on disk:\n{on_disk}");

    drop(db);
    let _ = std::fs::remove_file(&path);
}
