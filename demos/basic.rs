use serde_json::json;

fn main() {
    let path = std::env::temp_dir().join("json_backed_example_basic.json");
    let db = json_backed::file(&path);
    db.load();

    // set / get / remove
    db.set("apples", json!({"count": 3})).unwrap();
    db.set("bananas", json!({"count": 5})).unwrap();
    println!("apples  = {:?}", db.get("apples").map(|h| h.to_value()));
    println!("bananas = {:?}", db.get("bananas").map(|h| h.to_value()));

    // mutate through the returned handle: the store marks itself dirty
    let apples = db.get("apples").unwrap();
    apples.set("count", 4).unwrap();
    println!("dirty after handle mutation = {}", db.is_dirty());

    // snapshots
    println!("keys = {:?}", db.keys());
    println!("len  = {}", db.len());
    db.for_each_plain(|value, key| println!("  {key} => {value}"));

    // persist now instead of waiting for the timer
    db.save(true);
    println!("dirty after save = {}", db.is_dirty());

    db.remove("bananas");
    drop(db); // close: flushes the removal too

    let _ = std::fs::remove_file(&path);
}
