//! Behavioral scenarios for put/get/has/delete/count across reopen

use crate::common::{cycle, disk_store, ExampleThing};
use std::collections::HashMap;
use stowdb::{Error, Store};

#[test]
fn name_survives_close_and_open() {
    let (_dir, mut store) = disk_store();
    store.put("name", "adam").unwrap();
    store.close().unwrap();
    store.open().unwrap();

    let out: String = store.get("name").unwrap();
    assert_eq!(out, "adam");
}

#[test]
fn count_and_delete_example_things() {
    let (_dir, mut store) = disk_store();
    store.open().unwrap();
    store.put("a", &ExampleThing::new("x", 1)).unwrap();
    store.put("b", &ExampleThing::new("y", 2)).unwrap();
    assert_eq!(store.count().unwrap(), 2);

    store.delete("a").unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert!(!store.has("a"));
    assert!(store.has("b"));
}

#[test]
fn deleting_absent_key_is_ok() {
    let mut store = Store::ephemeral();
    store.delete("missing").unwrap();
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn get_reports_not_found() {
    let (_dir, mut store) = disk_store();
    store.put("present", &1u8).unwrap();
    let err = store.get::<_, u8>("absent").unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn last_type_is_readable_right_after_reopen() {
    let (_dir, mut store) = disk_store();
    store.put("n", &1i64).unwrap();
    store.put("s", "text").unwrap();
    store.put("v", &vec![1.5f64, 2.5]).unwrap();
    store.put("t", &ExampleThing::new("last", 99)).unwrap();

    // string keys and values, int, seq, ExampleThing
    assert_eq!(cycle(&mut store), 4);
    assert_eq!(
        store.get::<_, ExampleThing>("t").unwrap(),
        ExampleThing::new("last", 99)
    );
    assert_eq!(store.get::<_, Vec<f64>>("v").unwrap(), vec![1.5, 2.5]);
}

#[test]
fn registration_is_written_once_per_type() {
    let (_dir, mut store) = disk_store();
    for i in 0..20u32 {
        store.put(&format!("k{}", i), &ExampleThing::new("x", i)).unwrap();
    }
    assert_eq!(store.registered_types().unwrap(), 2);

    cycle(&mut store);
    store.put("k20", &ExampleThing::new("x", 20)).unwrap();
    assert_eq!(store.registered_types().unwrap(), 2);
}

#[test]
fn structured_keys() {
    let (_dir, mut store) = disk_store();
    store.put(&("user", 7u32), "seven").unwrap();
    store.put(&ExampleThing::new("as-key", 1), &true).unwrap();
    cycle(&mut store);

    assert_eq!(store.get::<_, String>(&("user", 7u32)).unwrap(), "seven");
    assert!(store.get::<_, bool>(&ExampleThing::new("as-key", 1)).unwrap());
    assert!(!store.has(&("user", 8u32)));
}

#[test]
fn maps_and_options_roundtrip() {
    let (_dir, mut store) = disk_store();
    let mut scores = HashMap::new();
    scores.insert("adam".to_string(), 3u32);
    scores.insert("eve".to_string(), 5u32);
    store.put("scores", &scores).unwrap();
    store.put("maybe", &Some(ExampleThing::new("m", 2))).unwrap();
    store.put("nothing", &None::<u8>).unwrap();
    cycle(&mut store);

    assert_eq!(
        store.get::<_, HashMap<String, u32>>("scores").unwrap(),
        scores
    );
    assert_eq!(
        store.get::<_, Option<ExampleThing>>("maybe").unwrap(),
        Some(ExampleThing::new("m", 2))
    );
    assert_eq!(store.get::<_, Option<u8>>("nothing").unwrap(), None);
}

#[test]
fn wrong_destination_type_is_a_decode_error() {
    let (_dir, mut store) = disk_store();
    store.put("thing", &ExampleThing::new("x", 1)).unwrap();
    assert!(matches!(
        store.get::<_, Vec<u64>>("thing"),
        Err(Error::Decode(_))
    ));
}

#[test]
fn insert_new_keeps_first_value() {
    let (_dir, mut store) = disk_store();
    assert!(store.insert_new("once", "first").unwrap());
    assert!(!store.insert_new("once", "second").unwrap());
    cycle(&mut store);
    assert_eq!(store.get::<_, String>("once").unwrap(), "first");
}

#[test]
fn keys_lists_stored_keys() {
    let (_dir, mut store) = disk_store();
    for k in ["x", "y", "z"] {
        store.put(k, &0u8).unwrap();
    }
    store.delete("y").unwrap();
    cycle(&mut store);

    let mut keys: Vec<String> = store.keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec!["x".to_string(), "z".to_string()]);
}
