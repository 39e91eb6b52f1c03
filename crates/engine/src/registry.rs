//! Type registry
//!
//! A durable, ordered log of first sightings kept in the same byte store as
//! the values:
//!
//! - `prep#<sequence>`: `descriptor ++ example` for the sequence-th new type
//! - `prep:<descriptor>`: presence marker, empty value
//! - `prep-count`: sequence of the last record written
//!
//! A new registration writes all three keys in one `WriteBatch`. Replaying
//! the records in sequence order into a fresh encoder and decoder rebuilds
//! the type tables the store had before it was closed.

use stowdb_codec::{TypeDecoder, TypeEncoder};
use stowdb_core::{
    decode_counter, encode_counter, marker_key, parse_record_sequence, record_key, ByteStore,
    Error, Result, WriteBatch, COUNTER_KEY, RECORD_PREFIX,
};
use tracing::{debug, info, warn};

use crate::decoder::OrderedDecoder;
use crate::dedup::DedupEncoder;

/// Outcome of `TypeRegistry::register_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Registration {
    /// The descriptor already had a presence marker; nothing was written
    Existing,
    /// A new record was written under `sequence`
    Recorded {
        /// Sequence number of the new record
        sequence: u64,
    },
}

/// One persisted registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRecord {
    /// Position in the log, starting at 1
    pub sequence: u64,
    /// `descriptor ++ example value`
    pub payload: Vec<u8>,
}

/// What a replay fed into the encoder and decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayStats {
    /// Records replayed
    pub records: usize,
    /// Counter value found in the store
    pub counter: u64,
}

/// View of the registry entries in a byte store
#[derive(Debug)]
pub struct TypeRegistry<'a, S: ByteStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: ByteStore + ?Sized> TypeRegistry<'a, S> {
    /// Registry over `store`
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Sequence of the last record written (0 when the counter is absent)
    pub fn counter(&self) -> Result<u64> {
        match self.store.get(COUNTER_KEY)? {
            Some(bytes) => decode_counter(&bytes),
            None => Ok(0),
        }
    }

    /// True if `descriptor` has a presence marker
    pub fn is_registered(&self, descriptor: &[u8]) -> Result<bool> {
        self.store.contains(&marker_key(descriptor))
    }

    /// Every record in ascending sequence order
    ///
    /// # Errors
    ///
    /// Returns `Error::Corruption` for a `prep#` key without a sequence.
    pub fn records(&self) -> Result<Vec<RegistrationRecord>> {
        self.store
            .scan_prefix(RECORD_PREFIX)?
            .into_iter()
            .map(|(key, payload)| {
                let sequence = parse_record_sequence(&key).ok_or_else(|| {
                    Error::Corruption(format!(
                        "registration key without a sequence: {:?}",
                        String::from_utf8_lossy(&key)
                    ))
                })?;
                Ok(RegistrationRecord { sequence, payload })
            })
            .collect()
    }

    /// Sequence the next registration will be written under
    ///
    /// One past the highest of the counter and the last record, so an
    /// existing record is never reused even when the counter disagrees
    /// with the log.
    pub fn next_sequence(&self) -> Result<u64> {
        Ok(sequence_after(self.counter()?, &self.records()?))
    }

    /// Record the first sighting of `descriptor`
    ///
    /// No-op if the descriptor is already registered. Otherwise writes the
    /// record `prep#<next_sequence>`, the counter set to that sequence and
    /// the marker as one batch. If the batch fails, the three keys are
    /// rolled back on a best-effort basis and the original error is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Registry` for an empty descriptor, or the store error.
    pub fn register_type(&self, descriptor: &[u8], example: &[u8]) -> Result<Registration> {
        self.register(descriptor, example, None)
    }

    /// Like `register_type`, but only if the log holds exactly `known`
    /// records
    ///
    /// Callers whose type table was built from `known` records use this to
    /// make sure the new record lands right after the ones they replayed.
    /// Nothing is written on a mismatch.
    ///
    /// # Errors
    ///
    /// Returns `Error::Registry` if the record count differs from `known`.
    pub fn register_type_after(
        &self,
        descriptor: &[u8],
        example: &[u8],
        known: usize,
    ) -> Result<Registration> {
        self.register(descriptor, example, Some(known))
    }

    fn register(
        &self,
        descriptor: &[u8],
        example: &[u8],
        known: Option<usize>,
    ) -> Result<Registration> {
        if descriptor.is_empty() {
            return Err(Error::Registry("cannot register an empty descriptor".to_string()));
        }
        if self.is_registered(descriptor)? {
            return Ok(Registration::Existing);
        }

        let records = self.records()?;
        if let Some(known) = known {
            if records.len() != known {
                return Err(Error::Registry(format!(
                    "registry holds {} records, caller has replayed {}",
                    records.len(),
                    known
                )));
            }
        }

        let previous = self.counter()?;
        let sequence = sequence_after(previous, &records);

        let mut payload = Vec::with_capacity(descriptor.len() + example.len());
        payload.extend_from_slice(descriptor);
        payload.extend_from_slice(example);

        let mut batch = WriteBatch::new();
        batch
            .put(record_key(sequence), payload)
            .put(COUNTER_KEY, encode_counter(sequence))
            .put(marker_key(descriptor), Vec::new());

        if let Err(e) = self.store.write_batch(batch) {
            self.roll_back(descriptor, sequence, previous);
            return Err(e);
        }

        debug!(
            target: "stowdb::registry",
            sequence,
            descriptor_len = descriptor.len(),
            "Registered new type"
        );
        Ok(Registration::Recorded { sequence })
    }

    fn roll_back(&self, descriptor: &[u8], sequence: u64, previous: u64) {
        let mut undo = WriteBatch::new();
        undo.delete(marker_key(descriptor))
            .delete(record_key(sequence))
            .put(COUNTER_KEY, encode_counter(previous));

        match self.store.write_batch(undo) {
            Ok(()) => warn!(
                target: "stowdb::registry",
                sequence,
                "Registration failed, rolled back"
            ),
            Err(e) => warn!(
                target: "stowdb::registry",
                sequence,
                error = %e,
                "Registration failed and could not be rolled back"
            ),
        }
    }

    /// Feed every record, in order, to `encoder` and `decoder`
    ///
    /// Stops at the first record either side rejects; earlier records stay
    /// applied.
    pub fn replay_into<E, D>(
        &self,
        encoder: &mut DedupEncoder<E>,
        decoder: &OrderedDecoder<D>,
    ) -> Result<ReplayStats>
    where
        E: TypeEncoder,
        D: TypeDecoder,
    {
        let records = self.records()?;
        let counter = self.counter()?;

        if records.len() as u64 != counter {
            warn!(
                target: "stowdb::registry",
                records = records.len(),
                counter,
                "Registration count disagrees with counter"
            );
        }

        for record in &records {
            encoder
                .absorb(&record.payload)
                .and_then(|()| decoder.register(&record.payload))
                .map_err(|e| {
                    warn!(
                        target: "stowdb::registry",
                        sequence = record.sequence,
                        error = %e,
                        "Replay stopped at registration record"
                    );
                    e
                })?;
        }

        info!(
            target: "stowdb::registry",
            records = records.len(),
            counter,
            "Type registry replayed"
        );
        Ok(ReplayStats {
            records: records.len(),
            counter,
        })
    }
}

fn sequence_after(counter: u64, records: &[RegistrationRecord]) -> u64 {
    let highest = records.last().map_or(0, |r| r.sequence);
    counter.max(highest) + 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stowdb_core::MARKER_PREFIX;
    use stowdb_storage::MemoryStore;

    fn encode_first<T: serde::Serialize + ?Sized>(
        encoder: &mut DedupEncoder,
        value: &T,
    ) -> (Vec<u8>, Vec<u8>) {
        let encoded = encoder.encode(value).unwrap();
        assert!(encoded.is_first_sighting());
        (encoded.descriptor, encoded.value)
    }

    #[test]
    fn test_empty_registry() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        assert_eq!(registry.counter().unwrap(), 0);
        assert!(registry.records().unwrap().is_empty());
        assert!(!registry.is_registered(b"string").unwrap());
    }

    #[test]
    fn test_register_writes_record_counter_and_marker() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        let mut encoder = DedupEncoder::new();
        let (descriptor, example) = encode_first(&mut encoder, "adam");

        let outcome = registry.register_type(&descriptor, &example).unwrap();
        assert_eq!(outcome, Registration::Recorded { sequence: 1 });

        assert_eq!(registry.counter().unwrap(), 1);
        assert!(registry.is_registered(&descriptor).unwrap());
        let records = registry.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].sequence, 1);
        assert_eq!(records[0].payload, [descriptor, example].concat());
    }

    #[test]
    fn test_registration_is_idempotent() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        let mut encoder = DedupEncoder::new();
        let (descriptor, example) = encode_first(&mut encoder, "adam");

        registry.register_type(&descriptor, &example).unwrap();
        let again = registry.register_type(&descriptor, &example).unwrap();

        assert_eq!(again, Registration::Existing);
        assert_eq!(registry.counter().unwrap(), 1);
        assert_eq!(store.count_prefix(MARKER_PREFIX).unwrap(), 1);
        assert_eq!(registry.records().unwrap().len(), 1);
    }

    #[test]
    fn test_sequences_follow_registration_order() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        let mut encoder = DedupEncoder::new();

        for (i, (descriptor, example)) in [
            encode_first(&mut encoder, &1u8),
            encode_first(&mut encoder, "s"),
            encode_first(&mut encoder, &(1u8, 2u8)),
        ]
        .into_iter()
        .enumerate()
        {
            let outcome = registry.register_type(&descriptor, &example).unwrap();
            assert_eq!(
                outcome,
                Registration::Recorded {
                    sequence: i as u64 + 1
                }
            );
        }

        let sequences: Vec<u64> = registry
            .records()
            .unwrap()
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_descriptor_is_refused() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        assert!(matches!(
            registry.register_type(b"", b"value"),
            Err(Error::Registry(_))
        ));
        assert_eq!(registry.counter().unwrap(), 0);
    }

    #[test]
    fn test_replay_rebuilds_encoder_and_decoder() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        let mut encoder = DedupEncoder::new();

        let mut values = Vec::new();
        for name in ["a", "b"] {
            let encoded = encoder.encode(name).unwrap();
            if encoded.is_first_sighting() {
                registry
                    .register_type(&encoded.descriptor, &encoded.value)
                    .unwrap();
            }
            values.push(encoded.value);
        }
        let number = encoder.encode(&7u64).unwrap();
        registry
            .register_type(&number.descriptor, &number.value)
            .unwrap();

        let mut fresh_encoder = DedupEncoder::new();
        let fresh_decoder = OrderedDecoder::new();
        let stats = registry
            .replay_into(&mut fresh_encoder, &fresh_decoder)
            .unwrap();

        assert_eq!(
            stats,
            ReplayStats {
                records: 2,
                counter: 2
            }
        );
        assert_eq!(fresh_decoder.decode::<String>(&values[1]).unwrap(), "b");
        assert_eq!(fresh_decoder.decode::<u64>(&number.value).unwrap(), 7);
        assert!(!fresh_encoder.encode("c").unwrap().is_first_sighting());
        assert!(!fresh_encoder.encode(&8u64).unwrap().is_first_sighting());
    }

    #[test]
    fn test_replay_of_empty_store() {
        let store = MemoryStore::new();
        let stats = TypeRegistry::new(&store)
            .replay_into(&mut DedupEncoder::new(), &OrderedDecoder::new())
            .unwrap();
        assert_eq!(stats, ReplayStats::default());
    }

    #[test]
    fn test_replay_fails_on_malformed_record() {
        let store = MemoryStore::new();
        store.put(&record_key(1), b"not a registration").unwrap();
        store.put(COUNTER_KEY, b"1").unwrap();

        let result =
            TypeRegistry::new(&store).replay_into(&mut DedupEncoder::new(), &OrderedDecoder::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_corrupt_counter() {
        let store = MemoryStore::new();
        store.put(COUNTER_KEY, b"many").unwrap();
        assert!(matches!(
            TypeRegistry::new(&store).counter(),
            Err(Error::Corruption(_))
        ));
    }

    /// Registers "adam" then overwrites the counter with `counter`
    fn one_record_with_counter(
        store: &MemoryStore,
        encoder: &mut DedupEncoder,
        counter: &[u8],
    ) -> Vec<u8> {
        let registry = TypeRegistry::new(store);
        let (descriptor, example) = encode_first(encoder, "adam");
        registry.register_type(&descriptor, &example).unwrap();
        store.put(COUNTER_KEY, counter).unwrap();
        store.get(&record_key(1)).unwrap().unwrap()
    }

    #[test]
    fn test_counter_behind_records_never_overwrites() {
        let store = MemoryStore::new();
        let mut encoder = DedupEncoder::new();
        let first = one_record_with_counter(&store, &mut encoder, b"0");
        let registry = TypeRegistry::new(&store);
        assert_eq!(registry.next_sequence().unwrap(), 2);

        let number = encoder.encode(&7u64).unwrap();
        let outcome = registry
            .register_type_after(&number.descriptor, &number.value, 1)
            .unwrap();
        assert_eq!(outcome, Registration::Recorded { sequence: 2 });
        assert_eq!(store.get(&record_key(1)).unwrap(), Some(first));
        assert_eq!(registry.counter().unwrap(), 2);

        let decoder = OrderedDecoder::new();
        let stats = registry
            .replay_into(&mut DedupEncoder::new(), &decoder)
            .unwrap();
        assert_eq!(stats.records, 2);
        assert_eq!(decoder.decode::<u64>(&number.value).unwrap(), 7);
    }

    #[test]
    fn test_counter_ahead_of_records_skips_forward() {
        let store = MemoryStore::new();
        let mut encoder = DedupEncoder::new();
        let first = one_record_with_counter(&store, &mut encoder, b"5");
        let registry = TypeRegistry::new(&store);

        let number = encoder.encode(&7u64).unwrap();
        let outcome = registry
            .register_type_after(&number.descriptor, &number.value, 1)
            .unwrap();
        assert_eq!(outcome, Registration::Recorded { sequence: 6 });
        assert_eq!(store.get(&record_key(1)).unwrap(), Some(first));

        let sequences: Vec<u64> = registry
            .records()
            .unwrap()
            .iter()
            .map(|r| r.sequence)
            .collect();
        assert_eq!(sequences, vec![1, 6]);

        let decoder = OrderedDecoder::new();
        let stats = registry
            .replay_into(&mut DedupEncoder::new(), &decoder)
            .unwrap();
        assert_eq!(
            stats,
            ReplayStats {
                records: 2,
                counter: 6
            }
        );
        assert_eq!(decoder.decode::<u64>(&number.value).unwrap(), 7);
    }

    #[test]
    fn test_register_after_refuses_caller_behind_the_log() {
        let store = MemoryStore::new();
        let registry = TypeRegistry::new(&store);
        let (descriptor, example) = encode_first(&mut DedupEncoder::new(), "adam");
        registry.register_type(&descriptor, &example).unwrap();

        // A second encoder that never saw the first record
        let (number, value) = encode_first(&mut DedupEncoder::new(), &7u64);
        assert!(matches!(
            registry.register_type_after(&number, &value, 0),
            Err(Error::Registry(_))
        ));

        assert_eq!(registry.counter().unwrap(), 1);
        assert_eq!(registry.records().unwrap().len(), 1);
        assert!(!registry.is_registered(&number).unwrap());
    }

    /// Store whose batches are applied one op at a time and fail on the
    /// marker write, like a backend without atomic batches
    struct FailingMarker {
        inner: MemoryStore,
        failures: AtomicUsize,
    }

    impl ByteStore for FailingMarker {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
            if key.starts_with(MARKER_PREFIX) && self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::StoreUnavailable("marker write failed".to_string()));
            }
            self.inner.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<()> {
            self.inner.delete(key)
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
            self.inner.scan_prefix(prefix)
        }
    }

    #[test]
    fn test_failed_marker_write_is_rolled_back() {
        let store = FailingMarker {
            inner: MemoryStore::new(),
            failures: AtomicUsize::new(1),
        };
        let registry = TypeRegistry::new(&store);
        let mut encoder = DedupEncoder::new();
        let (descriptor, example) = encode_first(&mut encoder, "adam");

        let err = registry.register_type(&descriptor, &example).unwrap_err();
        assert!(err.is_store_unavailable());

        assert_eq!(registry.counter().unwrap(), 0);
        assert!(registry.records().unwrap().is_empty());
        assert!(!registry.is_registered(&descriptor).unwrap());

        // The next attempt reuses sequence 1
        let outcome = registry.register_type(&descriptor, &example).unwrap();
        assert_eq!(outcome, Registration::Recorded { sequence: 1 });
    }
}
