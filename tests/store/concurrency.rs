//! Sharing one store between threads behind a mutex

use crate::common::{disk_store, ExampleThing};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

#[test]
fn writers_serialized_by_a_mutex() {
    let (_dir, store) = disk_store();
    let store = Arc::new(Mutex::new(store));

    let handles: Vec<_> = (0..4u32)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..25u32 {
                    let key = format!("t{}-{}", t, i);
                    store
                        .lock()
                        .put(&key, &ExampleThing::new("worker", t * 100 + i))
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let mut store = store.lock();
    assert_eq!(store.count().unwrap(), 100);
    assert_eq!(store.registered_types().unwrap(), 2);
    assert_eq!(
        store.get::<_, ExampleThing>("t3-24").unwrap().age,
        324
    );
}
