//! Property tests: round-trips and descriptor deduplication

use crate::common::ExampleThing;
use proptest::prelude::*;
use stowdb::{DedupEncoder, Store};

fn example_thing() -> impl Strategy<Value = ExampleThing> {
    (".{0,24}", any::<u32>()).prop_map(|(name, age)| ExampleThing { name, age })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn one_descriptor_for_many_values(things in proptest::collection::vec(example_thing(), 1..32)) {
        let mut encoder = DedupEncoder::new();
        let sightings: Vec<bool> = things
            .iter()
            .map(|t| encoder.encode(t).unwrap().is_first_sighting())
            .collect();

        prop_assert!(sightings[0]);
        prop_assert!(sightings[1..].iter().all(|s| !s));
    }

    #[test]
    fn value_bytes_match_second_encoding(thing in example_thing()) {
        let mut encoder = DedupEncoder::new();
        let first = encoder.encode(&thing).unwrap();
        let second = encoder.encode(&thing).unwrap();
        prop_assert_eq!(first.value, second.value);
        prop_assert!(second.descriptor.is_empty());
    }

    #[test]
    fn put_get_roundtrip_across_reopen(
        entries in proptest::collection::btree_map(".{1,12}", example_thing(), 1..16)
    ) {
        let mut store = Store::ephemeral();
        for (key, thing) in &entries {
            store.put(key, thing).unwrap();
        }
        for (key, thing) in &entries {
            prop_assert_eq!(&store.get::<_, ExampleThing>(key).unwrap(), thing);
        }

        store.close().unwrap();
        store.open().unwrap();
        prop_assert_eq!(store.count().unwrap(), entries.len());
        for (key, thing) in &entries {
            prop_assert_eq!(&store.get::<_, ExampleThing>(key).unwrap(), thing);
        }
    }
}
