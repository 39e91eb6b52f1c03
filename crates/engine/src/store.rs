//! Store orchestrator
//!
//! `Store` ties a byte store to a deduplicating encoder, an ordered decoder
//! and the type registry. Keys and values are both encoded; any type seen
//! for the first time is recorded in the registry before the value that
//! introduced it is written, so the registry always covers every type a
//! stored value refers to.
//!
//! # Lifecycle
//!
//! A store starts closed. `open` (or the first operation) opens the
//! backend and replays the registry into a fresh encoder and decoder.
//! `close` drops them again, so the next `open` replays from scratch.
//!
//! # Example
//!
//! ```ignore
//! use stowdb_engine::Store;
//!
//! let mut store = Store::at("./data");
//! store.put("name", "adam")?;
//! store.close()?;
//!
//! store.open()?;
//! let name: String = store.get("name")?;
//! ```

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use stowdb_core::{
    strip_value_prefix, value_key, Backend, ByteStore, Error, Result, VALUE_PREFIX,
};
use stowdb_storage::MemoryBackend;
use tracing::{debug, info, warn};

use crate::backend::DiskBackend;
use crate::config::StoreConfig;
use crate::decoder::OrderedDecoder;
use crate::dedup::{DedupEncoder, Encoded};
use crate::registry::{Registration, ReplayStats, TypeRegistry};

/// State that exists only while the store is open
struct Session<S> {
    store: S,
    encoder: DedupEncoder,
    decoder: OrderedDecoder,
    replay: Result<ReplayStats>,
    /// In-memory type tables may be out of step with the registry
    stale: bool,
}

impl<S: ByteStore> Session<S> {
    fn start(store: S, location: &str) -> Self {
        let mut session = Self {
            store,
            encoder: DedupEncoder::new(),
            decoder: OrderedDecoder::new(),
            replay: Ok(ReplayStats::default()),
            stale: false,
        };
        session.replay(location);
        session
    }

    /// Rebuild encoder and decoder from the registry
    fn replay(&mut self, location: &str) {
        self.encoder = DedupEncoder::new();
        self.decoder = OrderedDecoder::new();
        self.replay = TypeRegistry::new(&self.store).replay_into(&mut self.encoder, &self.decoder);
        self.stale = false;

        if let Err(e) = &self.replay {
            warn!(
                target: "stowdb::store",
                location,
                error = %e,
                "Type registry replay failed; new types will be refused"
            );
        }
    }

    /// Encode `value`, recording its type first if it is new
    fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Vec<u8>> {
        let encoded = self.encoder.encode(value)?;
        if encoded.is_first_sighting() {
            if let Err(e) = self.record(&encoded) {
                // The encoder has already taken the type; only a replay can
                // bring it back in line with the registry
                self.stale = true;
                return Err(e);
            }
        }
        Ok(encoded.value)
    }

    fn record(&mut self, encoded: &Encoded) -> Result<()> {
        if let Err(e) = &self.replay {
            return Err(Error::Registry(format!(
                "refusing to register a new type after a failed replay: {}",
                e
            )));
        }

        // Types this encoder knew before the one being recorded
        let known = self.encoder.codec().known_types().saturating_sub(1);
        let registry = TypeRegistry::new(&self.store);
        match registry.register_type_after(&encoded.descriptor, &encoded.value, known)? {
            Registration::Recorded { .. } => {}
            Registration::Existing => {
                return Err(Error::Registry(
                    "registry already holds a type this encoder has not seen".to_string(),
                ));
            }
        }
        self.decoder.register(&encoded.registration_bytes())
    }

    fn key_bytes<K: Serialize + ?Sized>(&mut self, key: &K) -> Result<Vec<u8>> {
        Ok(value_key(&self.encode(key)?))
    }
}

/// Typed value store over an ordered byte store
///
/// Not safe for concurrent use: every operation takes `&mut self`. Wrap the
/// store in a mutex to share it between threads.
pub struct Store<B: Backend = DiskBackend> {
    backend: B,
    session: Option<Session<B::Store>>,
}

impl Store<DiskBackend> {
    /// Unopened store in directory `path`, configured by its `stowdb.toml`
    pub fn at<P: AsRef<Path>>(path: P) -> Self {
        Self::new(DiskBackend::new(path))
    }

    /// Unopened store in directory `path` with an explicit config
    pub fn with_config<P: AsRef<Path>>(path: P, config: StoreConfig) -> Self {
        Self::new(DiskBackend::with_config(path, config))
    }
}

impl Store<MemoryBackend> {
    /// Unopened in-memory store
    ///
    /// Data survives `close` and `open` on this instance but is lost when
    /// the store is dropped.
    pub fn ephemeral() -> Self {
        Self::new(MemoryBackend::new())
    }
}

impl<B: Backend> Store<B> {
    /// Unopened store over `backend`
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            session: None,
        }
    }

    /// The backend this store opens
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// True between `open` and `close`
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Open the backend and replay the type registry
    ///
    /// Does nothing if the store is already open. A failed replay does not
    /// fail `open`: it is logged and kept in `replay_error`, values of
    /// replayed types stay readable, and registering new types is refused.
    ///
    /// # Errors
    ///
    /// Returns the backend's error if it cannot be opened.
    pub fn open(&mut self) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let location = self.backend.location();
        let store = self.backend.open()?;
        let session = Session::start(store, &location);

        if let Ok(stats) = &session.replay {
            info!(
                target: "stowdb::store",
                location = %location,
                types = stats.records,
                "Store opened"
            );
        }
        self.session = Some(session);
        Ok(())
    }

    /// Flush and close the backend, dropping the in-memory type tables
    ///
    /// Does nothing if the store is already closed.
    ///
    /// # Errors
    ///
    /// Returns the backend's error from closing. The store counts as closed
    /// either way.
    pub fn close(&mut self) -> Result<()> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        session.store.close()?;
        info!(
            target: "stowdb::store",
            location = %self.backend.location(),
            "Store closed"
        );
        Ok(())
    }

    /// Open if needed and rebuild stale type tables
    fn session(&mut self) -> Result<&mut Session<B::Store>> {
        self.open()?;
        let location = self.backend.location();
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::StoreUnavailable("store is not open".to_string()))?;
        if session.stale {
            debug!(target: "stowdb::store", location = %location, "Rebuilding type tables");
            session.replay(&location);
        }
        Ok(session)
    }

    /// Store `value` under `key`, overwriting any previous value
    ///
    /// Opens the store if needed. New key or value types are recorded in
    /// the registry before the value is written.
    ///
    /// # Errors
    ///
    /// The first error from opening, encoding the key, encoding the value,
    /// or writing.
    pub fn put<K, V>(&mut self, key: &K, value: &V) -> Result<()>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let session = self.session()?;
        let key = session.key_bytes(key)?;
        let value = session.encode(value)?;
        session.store.put(&key, &value)
    }

    /// Store `value` under `key` only if the key is absent
    ///
    /// Returns `false`, writing nothing, if the key already holds a value.
    pub fn insert_new<K, V>(&mut self, key: &K, value: &V) -> Result<bool>
    where
        K: Serialize + ?Sized,
        V: Serialize + ?Sized,
    {
        let session = self.session()?;
        let key = session.key_bytes(key)?;
        if session.store.contains(&key)? {
            return Ok(false);
        }
        let value = session.encode(value)?;
        session.store.put(&key, &value)?;
        Ok(true)
    }

    /// Value stored under `key`
    ///
    /// # Errors
    ///
    /// `Error::NotFound` if the key is absent, `Error::Decode` if the stored
    /// value is not a `V` or its type was never registered.
    pub fn get<K, V>(&mut self, key: &K) -> Result<V>
    where
        K: Serialize + ?Sized,
        V: DeserializeOwned,
    {
        let session = self.session()?;
        let key = session.key_bytes(key)?;
        let bytes = session.store.get(&key)?.ok_or(Error::NotFound)?;
        session.decoder.decode(&bytes)
    }

    /// True if `key` holds a value
    ///
    /// Encoding the key may record its type in the registry. Any error,
    /// including a failure to open, is reported as `false`.
    pub fn has<K: Serialize + ?Sized>(&mut self, key: &K) -> bool {
        let found = self.session().and_then(|session| {
            let key = session.key_bytes(key)?;
            session.store.contains(&key)
        });
        match found {
            Ok(found) => found,
            Err(e) => {
                debug!(target: "stowdb::store", error = %e, "Existence check failed");
                false
            }
        }
    }

    /// Remove the value under `key`; an absent key is not an error
    pub fn delete<K: Serialize + ?Sized>(&mut self, key: &K) -> Result<()> {
        let session = self.session()?;
        let key = session.key_bytes(key)?;
        session.store.delete(&key)
    }

    /// Number of stored values
    ///
    /// Scans the value namespace, so this is linear in the number of values.
    pub fn count(&mut self) -> Result<usize> {
        self.session()?.store.count_prefix(VALUE_PREFIX)
    }

    /// Every stored key decoded as `K`, in key-byte order
    ///
    /// # Errors
    ///
    /// `Error::Decode` if any stored key is not a `K`.
    pub fn keys<K: DeserializeOwned>(&mut self) -> Result<Vec<K>> {
        let session = self.session()?;
        session
            .store
            .scan_prefix(VALUE_PREFIX)?
            .iter()
            .filter_map(|(key, _)| strip_value_prefix(key))
            .map(|bytes| session.decoder.decode(bytes))
            .collect()
    }

    /// Statistics of the last successful replay, None while closed or after
    /// a failed replay
    pub fn replay_stats(&self) -> Option<ReplayStats> {
        self.session.as_ref()?.replay.as_ref().ok().copied()
    }

    /// Error of the last replay, if it failed
    pub fn replay_error(&self) -> Option<&Error> {
        self.session.as_ref()?.replay.as_ref().err()
    }

    /// Registration counter: the sequence of the last type recorded
    pub fn registered_types(&mut self) -> Result<u64> {
        let session = self.session()?;
        TypeRegistry::new(&session.store).counter()
    }
}

impl<B: Backend> Drop for Store<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "stowdb::store", error = %e, "Failed to close store on drop");
        }
    }
}

impl<B: Backend + std::fmt::Debug> std::fmt::Debug for Store<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use stowdb_core::{record_key, WriteBatch, COUNTER_KEY, MARKER_PREFIX, RECORD_PREFIX};
    use stowdb_storage::MemoryStore;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ExampleThing {
        name: String,
        age: u32,
    }

    #[test]
    fn test_put_get_same_session() {
        let mut store = Store::ephemeral();
        store.put("name", "adam").unwrap();
        let name: String = store.get("name").unwrap();
        assert_eq!(name, "adam");
        assert!(store.is_open());
    }

    #[test]
    fn test_operations_open_implicitly() {
        let mut store = Store::ephemeral();
        assert!(!store.is_open());
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.is_open());
    }

    #[test]
    fn test_open_and_close_are_idempotent() {
        let mut store = Store::ephemeral();
        store.open().unwrap();
        store.open().unwrap();
        store.close().unwrap();
        store.close().unwrap();
        assert!(!store.is_open());
        assert!(store.replay_stats().is_none());
    }

    #[test]
    fn test_reopen_replays_registry() {
        let mut store = Store::ephemeral();
        store.put("name", "adam").unwrap();
        store.put(&1u32, &ExampleThing { name: "x".into(), age: 1 }).unwrap();
        store.close().unwrap();

        store.open().unwrap();
        assert_eq!(
            store.replay_stats(),
            Some(ReplayStats {
                records: 3,
                counter: 3
            })
        );
        let thing: ExampleThing = store.get(&1u32).unwrap();
        assert_eq!(thing.age, 1);
    }

    #[test]
    fn test_get_missing_key_is_not_found() {
        let mut store = Store::ephemeral();
        store.put("a", &1u8).unwrap();
        let result: Result<u8> = store.get("b");
        assert!(matches!(result, Err(Error::NotFound)));
    }

    #[test]
    fn test_get_with_wrong_type_is_decode_error() {
        let mut store = Store::ephemeral();
        store.put("a", "text").unwrap();
        let result: Result<ExampleThing> = store.get("a");
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn test_put_overwrites() {
        let mut store = Store::ephemeral();
        store.put("k", &1u64).unwrap();
        store.put("k", &2u64).unwrap();
        assert_eq!(store.get::<_, u64>("k").unwrap(), 2);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_insert_new_rejects_existing() {
        let mut store = Store::ephemeral();
        assert!(store.insert_new("k", &1u64).unwrap());
        assert!(!store.insert_new("k", &2u64).unwrap());
        assert_eq!(store.get::<_, u64>("k").unwrap(), 1);
    }

    #[test]
    fn test_has_and_delete() {
        let mut store = Store::ephemeral();
        store.put("a", &ExampleThing { name: "x".into(), age: 1 }).unwrap();
        assert!(store.has("a"));
        store.delete("a").unwrap();
        assert!(!store.has("a"));
        store.delete("a").unwrap();
        store.delete("never").unwrap();
    }

    #[test]
    fn test_has_registers_key_type() {
        let mut store = Store::ephemeral();
        assert!(!store.has(&(1u8, 2u8)));
        assert_eq!(store.registered_types().unwrap(), 1);
    }

    #[test]
    fn test_keys_decodes_every_key() {
        let mut store = Store::ephemeral();
        for name in ["b", "a", "c"] {
            store.put(name, &0u8).unwrap();
        }
        let mut keys: Vec<String> = store.keys().unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_values_never_contain_descriptors() {
        let backend = MemoryBackend::new();
        let table = Arc::clone(backend.store());
        let mut store = Store::new(backend);
        store.put("name", "adam").unwrap();

        let values = table.scan_prefix(VALUE_PREFIX).unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].1[0], stowdb_codec::VALUE_TAG);
        assert_eq!(table.count_prefix(RECORD_PREFIX).unwrap(), 1);
        assert_eq!(table.count_prefix(MARKER_PREFIX).unwrap(), 1);
    }

    #[test]
    fn test_failed_replay_keeps_known_types_and_refuses_new_ones() {
        let backend = MemoryBackend::new();
        let table = Arc::clone(backend.store());
        let mut store = Store::new(backend);
        store.put("name", "adam").unwrap();
        store.close().unwrap();

        // A record that cannot be replayed after the good one
        table.put(&record_key(2), b"garbage").unwrap();
        table.put(COUNTER_KEY, b"2").unwrap();

        store.open().unwrap();
        assert!(store.replay_error().is_some());
        assert!(store.replay_stats().is_none());
        assert_eq!(store.get::<_, String>("name").unwrap(), "adam");
        assert!(matches!(store.put("n", &5u64), Err(Error::Registry(_))));
    }

    #[test]
    fn test_counter_behind_log_keeps_existing_records() {
        let backend = MemoryBackend::new();
        let table = Arc::clone(backend.store());
        let mut store = Store::new(backend);
        store.put("name", "adam").unwrap();
        store.close().unwrap();

        let first = table.get(&record_key(1)).unwrap();
        table.put(COUNTER_KEY, b"0").unwrap();

        store.open().unwrap();
        store.put(&7u64, &1u64).unwrap();
        assert_eq!(table.get(&record_key(1)).unwrap(), first);
        store.close().unwrap();

        store.open().unwrap();
        assert!(store.replay_error().is_none());
        assert_eq!(store.get::<_, String>("name").unwrap(), "adam");
        assert_eq!(store.get::<_, u64>(&7u64).unwrap(), 1);
    }

    #[test]
    fn test_store_behind_the_log_writes_nothing_then_catches_up() {
        let backend = MemoryBackend::new();
        let table = Arc::clone(backend.store());
        let mut first = Store::new(backend.clone());
        let mut second = Store::new(backend.clone());
        second.open().unwrap();

        first.put(&(1u8, 2u8), &(3u8, 4u8)).unwrap();
        assert!(matches!(second.put("x", "y"), Err(Error::Registry(_))));
        assert_eq!(table.count_prefix(RECORD_PREFIX).unwrap(), 1);
        assert_eq!(table.count_prefix(VALUE_PREFIX).unwrap(), 1);

        // The failed attempt forces a replay that picks up the tuple type
        second.put("x", "y").unwrap();
        assert!(matches!(first.put(&true, &1.5f64), Err(Error::Registry(_))));
        first.put(&true, &1.5f64).unwrap();

        let mut fresh = Store::new(backend);
        fresh.open().unwrap();
        assert!(fresh.replay_error().is_none());
        assert_eq!(fresh.get::<_, (u8, u8)>(&(1u8, 2u8)).unwrap(), (3, 4));
        assert_eq!(fresh.get::<_, String>("x").unwrap(), "y");
        assert_eq!(fresh.get::<_, f64>(&true).unwrap(), 1.5);
        assert_eq!(fresh.registered_types().unwrap(), 4);
    }

    /// Backend whose store can be told to fail every batch
    #[derive(Clone, Default)]
    struct FlakyBackend {
        table: Arc<MemoryStore>,
        fail_batches: Arc<AtomicBool>,
    }

    struct FlakyStore {
        table: Arc<MemoryStore>,
        fail_batches: Arc<AtomicBool>,
    }

    impl ByteStore for FlakyStore {
        fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
            self.table.get(key)
        }

        fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
            self.table.put(key, value)
        }

        fn delete(&self, key: &[u8]) -> Result<()> {
            self.table.delete(key)
        }

        fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
            self.table.scan_prefix(prefix)
        }

        fn write_batch(&self, batch: WriteBatch) -> Result<()> {
            if self.fail_batches.load(Ordering::SeqCst) {
                return Err(Error::StoreUnavailable("batch refused".to_string()));
            }
            self.table.write_batch(batch)
        }
    }

    impl Backend for FlakyBackend {
        type Store = FlakyStore;

        fn open(&self) -> Result<FlakyStore> {
            Ok(FlakyStore {
                table: Arc::clone(&self.table),
                fail_batches: Arc::clone(&self.fail_batches),
            })
        }

        fn location(&self) -> String {
            "flaky".to_string()
        }
    }

    #[test]
    fn test_failed_registration_leaves_nothing_behind_and_recovers() {
        let backend = FlakyBackend::default();
        let fail = Arc::clone(&backend.fail_batches);
        let table = Arc::clone(&backend.table);
        let mut store = Store::new(backend);

        store.put("a", &1u64).unwrap();

        fail.store(true, Ordering::SeqCst);
        let err = store
            .put("b", &ExampleThing { name: "x".into(), age: 1 })
            .unwrap_err();
        assert!(err.is_store_unavailable());
        assert_eq!(table.count_prefix(VALUE_PREFIX).unwrap(), 1);
        assert_eq!(table.count_prefix(RECORD_PREFIX).unwrap(), 2);

        fail.store(false, Ordering::SeqCst);
        store
            .put("b", &ExampleThing { name: "x".into(), age: 1 })
            .unwrap();
        store.close().unwrap();

        store.open().unwrap();
        let thing: ExampleThing = store.get("b").unwrap();
        assert_eq!(thing.name, "x");
        assert_eq!(store.get::<_, u64>("a").unwrap(), 1);
    }

    #[test]
    fn test_drop_closes_store() {
        let backend = MemoryBackend::new();
        let table = Arc::clone(backend.store());
        {
            let mut store = Store::new(backend.clone());
            store.put("k", "v").unwrap();
        }
        let mut store = Store::new(backend);
        assert_eq!(store.get::<_, String>("k").unwrap(), "v");
        assert_eq!(table.count_prefix(VALUE_PREFIX).unwrap(), 1);
    }
}
