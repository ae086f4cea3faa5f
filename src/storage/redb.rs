//! redb store implementation.
//!
//! [`RedbStore`] implements [`ListingStore`] on
//! [redb](https://docs.rs/redb), a pure Rust embedded key-value store, with
//! bincode-encoded values. Pub/sub is served from process memory.
//!
//! # Features
//!
//! - ACID transactions with MVCC: every protocol call is one transaction
//! - Single-writer, multiple-reader concurrency
//! - Expiring values evicted lazily on read (see [`RedbStore::purge_expired`])
//! - Index queries evaluated over live hashes in a single read snapshot

use std::path::{Path, PathBuf};
use std::time::Duration;

use ::redb::{Database, Durability, ReadTransaction, ReadableTable, WriteTransaction};
use crossbeam_channel::Receiver;
use tracing::{debug, info, instrument, warn};

use super::pubsub::PubSub;
use super::schema::{
    DatabaseMetadata, ExpiringValue, StoredStreamEntry, EXPIRING_TABLE, HASHES_TABLE,
    INDEXES_TABLE, METADATA_KEY, METADATA_TABLE, RANKED_TABLE, SCHEMA_VERSION, STREAMS_TABLE,
};
use super::{ListingStore, StreamEntry, StreamEntryId};
use crate::config::{Config, SyncMode};
use crate::error::{LodgingError, Result, StorageError};
use crate::index::{eval, HashFields, IndexDefinition, IndexInfo, SearchHit};
use crate::types::Timestamp;

/// redb-backed store.
///
/// # Thread Safety
///
/// `RedbStore` is `Send + Sync`. redb handles internal synchronization
/// using MVCC for readers and exclusive locking for writers; the pub/sub
/// registry sits behind a mutex.
#[derive(Debug)]
pub struct RedbStore {
    /// The redb database handle.
    db: Database,

    /// Cached store metadata.
    metadata: DatabaseMetadata,

    /// Path to the database file.
    path: PathBuf,

    /// Durability applied to every write transaction.
    sync_mode: SyncMode,

    /// In-process subscribers.
    pubsub: PubSub,
}

impl RedbStore {
    /// Opens or creates a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - The database file is corrupted or locked by another process
    /// - The schema version doesn't match
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use lodgings::{Config, storage::RedbStore};
    ///
    /// let store = RedbStore::open("./lodgings.db", &Config::default())?;
    /// ```
    #[instrument(skip(config), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, config: &Config) -> Result<Self> {
        config.validate()?;

        let path = path.as_ref();
        let db_exists = path.exists();
        debug!(db_exists, "Opening store");

        let db = Database::builder().create(path).map_err(|e| {
            // redb has no typed lock-conflict variant
            if e.to_string().contains("locked") {
                StorageError::DatabaseLocked
            } else {
                StorageError::Redb(e.to_string())
            }
        })?;

        let metadata = if db_exists {
            Self::open_existing(&db)?
        } else {
            Self::initialize_new(&db)?
        };

        Ok(Self {
            db,
            metadata,
            path: path.to_path_buf(),
            sync_mode: config.sync_mode,
            pubsub: PubSub::new(config.subscriber_capacity),
        })
    }

    /// Creates every table and writes fresh metadata in one transaction.
    fn initialize_new(db: &Database) -> Result<DatabaseMetadata> {
        info!("Initializing new store");

        let metadata = DatabaseMetadata::new();
        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let bytes = bincode::serialize(&metadata)?;
            meta_table.insert(METADATA_KEY, bytes.as_slice())?;

            let _ = write_txn.open_table(HASHES_TABLE)?;
            let _ = write_txn.open_table(RANKED_TABLE)?;
            let _ = write_txn.open_table(STREAMS_TABLE)?;
            let _ = write_txn.open_table(EXPIRING_TABLE)?;
            let _ = write_txn.open_table(INDEXES_TABLE)?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(schema_version = SCHEMA_VERSION, "Store initialized");
        Ok(metadata)
    }

    /// Validates the stored metadata and bumps `last_opened_at`.
    fn open_existing(db: &Database) -> Result<DatabaseMetadata> {
        let read_txn = db.begin_read().map_err(StorageError::from)?;
        let mut metadata = {
            let meta_table = read_txn.open_table(METADATA_TABLE).map_err(|e| {
                StorageError::corrupted(format!("Cannot open metadata table: {}", e))
            })?;
            let bytes = meta_table
                .get(METADATA_KEY)
                .map_err(StorageError::from)?
                .ok_or_else(|| StorageError::corrupted("Missing store metadata"))?;
            bincode::deserialize::<DatabaseMetadata>(bytes.value())
                .map_err(|e| StorageError::corrupted(format!("Invalid metadata format: {}", e)))?
        };
        drop(read_txn);

        if !metadata.is_compatible() {
            warn!(
                expected = SCHEMA_VERSION,
                found = metadata.schema_version,
                "Schema version mismatch"
            );
            return Err(StorageError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found: metadata.schema_version,
            }
            .into());
        }

        metadata.touch();
        let write_txn = db.begin_write().map_err(StorageError::from)?;
        {
            let mut meta_table = write_txn.open_table(METADATA_TABLE)?;
            let bytes = bincode::serialize(&metadata)?;
            meta_table.insert(METADATA_KEY, bytes.as_slice())?;
        }
        write_txn.commit().map_err(StorageError::from)?;

        info!(schema_version = metadata.schema_version, "Store opened");
        Ok(metadata)
    }

    /// Returns the store metadata.
    pub fn metadata(&self) -> &DatabaseMetadata {
        &self.metadata
    }

    /// Returns the database file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the store.
    ///
    /// redb flushes on drop, which cannot fail; the `Result` leaves room for
    /// backends that can.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        drop(self.db);
        info!("Store closed");
        Ok(())
    }

    /// Removes every expired value. Returns how many were removed.
    ///
    /// Reads already ignore expired values; this reclaims their space.
    pub fn purge_expired(&self) -> Result<usize> {
        let now = Timestamp::now();
        let txn = self.begin_write()?;
        let removed;
        {
            let mut table = txn.open_table(EXPIRING_TABLE)?;
            let mut expired = Vec::new();
            for entry in table.iter()? {
                let (key, value) = entry?;
                let stored: ExpiringValue = bincode::deserialize(value.value())?;
                if stored.is_expired(now) {
                    expired.push(key.value().to_string());
                }
            }
            for key in &expired {
                table.remove(key.as_str())?;
            }
            removed = expired.len();
        }
        txn.commit().map_err(StorageError::from)?;

        if removed > 0 {
            debug!(removed, "Purged expired values");
        }
        Ok(removed)
    }

    fn begin_write(&self) -> Result<WriteTransaction> {
        let mut txn = self.db.begin_write().map_err(StorageError::from)?;
        match self.sync_mode {
            SyncMode::Normal => txn.set_durability(Durability::Immediate),
            SyncMode::Fast => txn.set_durability(Durability::Eventual),
            SyncMode::Paranoid => {
                txn.set_durability(Durability::Immediate);
                txn.set_two_phase_commit(true);
            }
        }
        Ok(txn)
    }

    fn begin_read(&self) -> Result<ReadTransaction> {
        Ok(self.db.begin_read().map_err(StorageError::from)?)
    }
}

/// Reads an index definition inside an existing read transaction.
fn load_index(txn: &ReadTransaction, name: &str) -> Result<Option<IndexDefinition>> {
    let table = txn.open_table(INDEXES_TABLE)?;
    match table.get(name)? {
        Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
        None => Ok(None),
    }
}

/// Loads every hash whose key starts with `prefix`, in key order.
fn scan_hashes(txn: &ReadTransaction, prefix: &str) -> Result<Vec<(String, HashFields)>> {
    let table = txn.open_table(HASHES_TABLE)?;
    let mut docs = Vec::new();
    for entry in table.range(prefix..)? {
        let (key, value) = entry?;
        let key = key.value();
        if !key.starts_with(prefix) {
            break;
        }
        let fields: HashFields = bincode::deserialize(value.value())?;
        docs.push((key.to_string(), fields));
    }
    Ok(docs)
}

fn unknown_index(name: &str) -> LodgingError {
    StorageError::UnknownIndex(name.to_string()).into()
}

impl ListingStore for RedbStore {
    // =========================================================================
    // Hashes
    // =========================================================================

    fn hash_set(&self, key: &str, fields: &HashFields) -> Result<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(HASHES_TABLE)?;
            let mut current: HashFields = match table.get(key)? {
                Some(value) => bincode::deserialize(value.value())?,
                None => HashFields::new(),
            };
            current.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            let bytes = bincode::serialize(&current)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;

        debug!(key, fields = fields.len(), "Hash written");
        Ok(())
    }

    fn hash_insert_new(&self, key: &str, fields: &HashFields) -> Result<bool> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(HASHES_TABLE)?;
            if table.get(key)?.is_some() {
                drop(table);
                txn.abort().map_err(StorageError::from)?;
                return Ok(false);
            }
            let bytes = bincode::serialize(fields)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;

        debug!(key, fields = fields.len(), "Hash inserted");
        Ok(true)
    }

    fn hash_update_existing(&self, key: &str, fields: &HashFields) -> Result<bool> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(HASHES_TABLE)?;
            let current = table
                .get(key)?
                .map(|value| bincode::deserialize::<HashFields>(value.value()))
                .transpose()?;
            let Some(mut current) = current else {
                drop(table);
                txn.abort().map_err(StorageError::from)?;
                return Ok(false);
            };
            current.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
            let bytes = bincode::serialize(&current)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;

        debug!(key, fields = fields.len(), "Hash updated");
        Ok(true)
    }

    fn hash_get_all(&self, key: &str) -> Result<Option<HashFields>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(HASHES_TABLE)?;
        match table.get(key)? {
            Some(value) => Ok(Some(bincode::deserialize(value.value())?)),
            None => Ok(None),
        }
    }

    fn hash_delete(&self, key: &str) -> Result<bool> {
        let txn = self.begin_write()?;
        let existed;
        {
            let mut table = txn.open_table(HASHES_TABLE)?;
            existed = table.remove(key)?.is_some();
        }
        txn.commit().map_err(StorageError::from)?;

        if existed {
            debug!(key, "Hash deleted");
        }
        Ok(existed)
    }

    fn hash_exists(&self, key: &str) -> Result<bool> {
        let txn = self.begin_read()?;
        let table = txn.open_table(HASHES_TABLE)?;
        let exists = table.get(key)?.is_some();
        Ok(exists)
    }

    fn hash_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(HASHES_TABLE)?;
        let mut keys = Vec::new();
        for entry in table.range(prefix..)? {
            let (key, _) = entry?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            keys.push(key.to_string());
        }
        Ok(keys)
    }

    // =========================================================================
    // Ranked sets
    // =========================================================================

    fn rank_set(&self, key: &str, member: &str, score: f64) -> Result<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(RANKED_TABLE)?;
            table.insert((key, member), score)?;
        }
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    fn rank_increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        let txn = self.begin_write()?;
        let score;
        {
            let mut table = txn.open_table(RANKED_TABLE)?;
            let current = table.get((key, member))?.map(|v| v.value()).unwrap_or(0.0);
            score = current + delta;
            table.insert((key, member), score)?;
        }
        txn.commit().map_err(StorageError::from)?;
        Ok(score)
    }

    fn rank_remove(&self, key: &str, member: &str) -> Result<bool> {
        let txn = self.begin_write()?;
        let existed;
        {
            let mut table = txn.open_table(RANKED_TABLE)?;
            existed = table.remove((key, member))?.is_some();
        }
        txn.commit().map_err(StorageError::from)?;
        Ok(existed)
    }

    fn rank_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(RANKED_TABLE)?;
        let score = table.get((key, member))?.map(|v| v.value());
        Ok(score)
    }

    fn rank_top(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(RANKED_TABLE)?;

        let mut members = Vec::new();
        for entry in table.range((key, "")..)? {
            let (k, score) = entry?;
            let (set, member) = k.value();
            if set != key {
                break;
            }
            members.push((member.to_string(), score.value()));
        }

        members.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
        members.truncate(limit);
        Ok(members)
    }

    fn rank_len(&self, key: &str) -> Result<usize> {
        let txn = self.begin_read()?;
        let table = txn.open_table(RANKED_TABLE)?;
        let mut count = 0;
        for entry in table.range((key, "")..)? {
            let (k, _) = entry?;
            if k.value().0 != key {
                break;
            }
            count += 1;
        }
        Ok(count)
    }

    // =========================================================================
    // Streams
    // =========================================================================

    fn stream_append(&self, key: &str, fields: &[(String, String)]) -> Result<StreamEntryId> {
        let entry = StoredStreamEntry {
            timestamp: Timestamp::now(),
            fields: fields.to_vec(),
        };
        let bytes = bincode::serialize(&entry)?;

        let txn = self.begin_write()?;
        let seq;
        {
            let mut table = txn.open_table(STREAMS_TABLE)?;
            seq = match table.range((key, 0u64)..=(key, u64::MAX))?.next_back() {
                Some(last) => last?.0.value().1 + 1,
                None => 1,
            };
            table.insert((key, seq), bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;

        Ok(StreamEntryId {
            timestamp: entry.timestamp,
            seq,
        })
    }

    fn stream_trim(&self, key: &str, max_len: usize) -> Result<usize> {
        let txn = self.begin_write()?;
        let removed;
        {
            let mut table = txn.open_table(STREAMS_TABLE)?;
            let seqs = table
                .range((key, 0u64)..=(key, u64::MAX))?
                .map(|entry| entry.map(|(k, _)| k.value().1))
                .collect::<std::result::Result<Vec<u64>, _>>()?;

            removed = seqs.len().saturating_sub(max_len);
            for seq in &seqs[..removed] {
                table.remove((key, *seq))?;
            }
        }
        txn.commit().map_err(StorageError::from)?;

        if removed > 0 {
            debug!(key, removed, "Stream trimmed");
        }
        Ok(removed)
    }

    fn stream_len(&self, key: &str) -> Result<usize> {
        let txn = self.begin_read()?;
        let table = txn.open_table(STREAMS_TABLE)?;
        let mut count = 0;
        for entry in table.range((key, 0u64)..=(key, u64::MAX))? {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    fn stream_recent(&self, key: &str, count: usize) -> Result<Vec<StreamEntry>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(STREAMS_TABLE)?;

        let mut entries = Vec::with_capacity(count.min(64));
        for entry in table.range((key, 0u64)..=(key, u64::MAX))?.rev().take(count) {
            let (k, value) = entry?;
            let stored: StoredStreamEntry = bincode::deserialize(value.value())?;
            entries.push(StreamEntry {
                id: StreamEntryId {
                    timestamp: stored.timestamp,
                    seq: k.value().1,
                },
                fields: stored.fields,
            });
        }
        Ok(entries)
    }

    // =========================================================================
    // Expiring values
    // =========================================================================

    fn get_expiring(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let txn = self.begin_read()?;
        let table = txn.open_table(EXPIRING_TABLE)?;
        let stored: ExpiringValue = match table.get(key)? {
            Some(value) => bincode::deserialize(value.value())?,
            None => return Ok(None),
        };

        if stored.is_expired(Timestamp::now()) {
            return Ok(None);
        }
        Ok(Some(stored.value))
    }

    fn set_expiring(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        let stored = ExpiringValue {
            expires_at: Timestamp::now().saturating_add(ttl),
            value: value.to_vec(),
        };
        let bytes = bincode::serialize(&stored)?;

        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(EXPIRING_TABLE)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;
        Ok(())
    }

    // =========================================================================
    // Pub/sub
    // =========================================================================

    fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        self.pubsub.publish(channel, message)
    }

    fn subscribe(&self, channel: &str) -> Result<Receiver<String>> {
        self.pubsub.subscribe(channel)
    }

    // =========================================================================
    // Secondary indexes
    // =========================================================================

    #[instrument(skip(self, definition), fields(index = %definition.name))]
    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        eval::validate_definition(definition)?;
        let bytes = bincode::serialize(definition)?;

        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(INDEXES_TABLE)?;
            if table.get(definition.name.as_str())?.is_some() {
                return Err(StorageError::IndexExists(definition.name.clone()).into());
            }
            table.insert(definition.name.as_str(), bytes.as_slice())?;
        }
        txn.commit().map_err(StorageError::from)?;

        debug!("Index definition stored");
        Ok(())
    }

    fn index_info(&self, name: &str) -> Result<Option<IndexInfo>> {
        let txn = self.begin_read()?;
        let Some(definition) = load_index(&txn, name)? else {
            return Ok(None);
        };
        let num_docs = scan_hashes(&txn, &definition.prefix)?.len();
        Ok(Some(IndexInfo {
            definition,
            num_docs,
        }))
    }

    fn search_text(&self, index: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let txn = self.begin_read()?;
        let definition = load_index(&txn, index)?.ok_or_else(|| unknown_index(index))?;
        let docs = scan_hashes(&txn, &definition.prefix)?;
        Ok(eval::match_text(&definition, docs, query, limit))
    }

    fn search_knn(
        &self,
        index: &str,
        field: &str,
        vector: &[u8],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let txn = self.begin_read()?;
        let definition = load_index(&txn, index)?.ok_or_else(|| unknown_index(index))?;
        let docs = scan_hashes(&txn, &definition.prefix)?;
        eval::knn(&definition, docs, field, vector, k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SchemaField;
    use crate::vector::pack_vector;
    use tempfile::tempdir;

    fn open_store() -> (RedbStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("test.db"), &Config::default()).unwrap();
        (store, dir)
    }

    fn fields(pairs: &[(&str, &str)]) -> HashFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.as_bytes().to_vec()))
            .collect()
    }

    fn test_index() -> IndexDefinition {
        IndexDefinition {
            name: "idx".into(),
            prefix: "doc:".into(),
            schema: vec![
                SchemaField::text("title"),
                SchemaField::flat_cosine_vector("vector", 2),
            ],
        }
    }

    #[test]
    fn test_open_creates_new_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");
        assert!(!path.exists());

        let store = RedbStore::open(&path, &Config::default()).unwrap();
        assert!(path.exists());
        assert_eq!(store.metadata().schema_version, SCHEMA_VERSION);
        assert_eq!(store.path(), path.as_path());
        store.close().unwrap();
    }

    #[test]
    fn test_reopen_preserves_data_and_created_at() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        let store = RedbStore::open(&path, &Config::default()).unwrap();
        let created_at = store.metadata().created_at;
        store.hash_set("doc:1", &fields(&[("title", "kept")])).unwrap();
        store.close().unwrap();

        std::thread::sleep(Duration::from_millis(10));
        let store = RedbStore::open(&path, &Config::default()).unwrap();
        assert_eq!(store.metadata().created_at, created_at);
        assert!(store.metadata().last_opened_at > created_at);
        assert!(store.hash_exists("doc:1").unwrap());
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let config = Config {
            stream_max_len: 0,
            ..Default::default()
        };
        let err = RedbStore::open(dir.path().join("test.db"), &config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_open_with_every_sync_mode() {
        for mode in [SyncMode::Normal, SyncMode::Fast, SyncMode::Paranoid] {
            let dir = tempdir().unwrap();
            let config = Config {
                sync_mode: mode,
                ..Default::default()
            };
            let store = RedbStore::open(dir.path().join("test.db"), &config).unwrap();
            store.hash_set("k", &fields(&[("a", "1")])).unwrap();
            assert!(store.hash_exists("k").unwrap());
        }
    }

    #[test]
    fn test_hash_set_merges_fields() {
        let (store, _dir) = open_store();
        store
            .hash_set("doc:1", &fields(&[("title", "a"), ("price", "1")]))
            .unwrap();
        store.hash_set("doc:1", &fields(&[("price", "2")])).unwrap();

        let stored = store.hash_get_all("doc:1").unwrap().unwrap();
        assert_eq!(stored.get("title").unwrap(), b"a");
        assert_eq!(stored.get("price").unwrap(), b"2");
    }

    #[test]
    fn test_hash_insert_new_refuses_taken_key() {
        let (store, _dir) = open_store();
        assert!(store
            .hash_insert_new("doc:1", &fields(&[("title", "first")]))
            .unwrap());
        assert!(!store
            .hash_insert_new("doc:1", &fields(&[("title", "second"), ("price", "9")]))
            .unwrap());

        let stored = store.hash_get_all("doc:1").unwrap().unwrap();
        assert_eq!(stored, fields(&[("title", "first")]));
    }

    #[test]
    fn test_hash_update_existing_never_creates() {
        let (store, _dir) = open_store();
        assert!(!store
            .hash_update_existing("doc:1", &fields(&[("title", "ghost")]))
            .unwrap());
        assert!(!store.hash_exists("doc:1").unwrap());

        store
            .hash_set("doc:1", &fields(&[("title", "a"), ("price", "1")]))
            .unwrap();
        assert!(store
            .hash_update_existing("doc:1", &fields(&[("price", "2")]))
            .unwrap());
        assert_eq!(
            store.hash_get_all("doc:1").unwrap().unwrap(),
            fields(&[("title", "a"), ("price", "2")])
        );
    }

    #[test]
    fn test_hash_delete_and_missing() {
        let (store, _dir) = open_store();
        assert!(store.hash_get_all("doc:1").unwrap().is_none());
        assert!(!store.hash_delete("doc:1").unwrap());

        store.hash_set("doc:1", &fields(&[("title", "a")])).unwrap();
        assert!(store.hash_delete("doc:1").unwrap());
        assert!(!store.hash_exists("doc:1").unwrap());
    }

    #[test]
    fn test_hash_keys_by_prefix() {
        let (store, _dir) = open_store();
        for key in ["doc:2", "doc:1", "other:1", "doc"] {
            store.hash_set(key, &fields(&[("title", "x")])).unwrap();
        }
        assert_eq!(store.hash_keys("doc:").unwrap(), vec!["doc:1", "doc:2"]);
    }

    #[test]
    fn test_rank_top_orders_ties_by_member_descending() {
        let (store, _dir) = open_store();
        store.rank_set("pop", "a", 1.0).unwrap();
        store.rank_set("pop", "b", 3.0).unwrap();
        store.rank_set("pop", "c", 1.0).unwrap();
        store.rank_set("other", "z", 10.0).unwrap();

        let top = store.rank_top("pop", 10).unwrap();
        assert_eq!(
            top,
            vec![
                ("b".to_string(), 3.0),
                ("c".to_string(), 1.0),
                ("a".to_string(), 1.0)
            ]
        );
        assert_eq!(store.rank_top("pop", 1).unwrap().len(), 1);
        assert_eq!(store.rank_len("pop").unwrap(), 3);
    }

    #[test]
    fn test_rank_increment_and_remove() {
        let (store, _dir) = open_store();
        assert_eq!(store.rank_increment("pop", "a", 1.0).unwrap(), 1.0);
        assert_eq!(store.rank_increment("pop", "a", 1.0).unwrap(), 2.0);
        assert_eq!(store.rank_score("pop", "a").unwrap(), Some(2.0));

        assert!(store.rank_remove("pop", "a").unwrap());
        assert!(!store.rank_remove("pop", "a").unwrap());
        assert_eq!(store.rank_score("pop", "a").unwrap(), None);
    }

    #[test]
    fn test_stream_append_trim_and_recent() {
        let (store, _dir) = open_store();
        for i in 0..5 {
            store
                .stream_append("log", &[("n".to_string(), i.to_string())])
                .unwrap();
        }
        assert_eq!(store.stream_len("log").unwrap(), 5);

        assert_eq!(store.stream_trim("log", 3).unwrap(), 2);
        assert_eq!(store.stream_len("log").unwrap(), 3);

        let recent = store.stream_recent("log", 2).unwrap();
        assert_eq!(recent[0].field("n"), Some("4"));
        assert_eq!(recent[1].field("n"), Some("3"));
        assert!(recent[0].id > recent[1].id);
    }

    #[test]
    fn test_stream_sequence_survives_trim() {
        let (store, _dir) = open_store();
        let first = store.stream_append("log", &[]).unwrap();
        store.stream_append("log", &[]).unwrap();
        store.stream_trim("log", 1).unwrap();
        let third = store.stream_append("log", &[]).unwrap();
        assert_eq!(first.seq, 1);
        assert_eq!(third.seq, 3);
    }

    #[test]
    fn test_expiring_values() {
        let (store, _dir) = open_store();
        store
            .set_expiring("short", b"v", Duration::from_millis(20))
            .unwrap();
        store
            .set_expiring("long", b"w", Duration::from_secs(60))
            .unwrap();
        assert_eq!(store.get_expiring("short").unwrap(), Some(b"v".to_vec()));

        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(store.get_expiring("short").unwrap(), None);
        assert_eq!(store.get_expiring("long").unwrap(), Some(b"w".to_vec()));

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.purge_expired().unwrap(), 0);
    }

    #[test]
    fn test_create_index_twice_reports_exists() {
        let (store, _dir) = open_store();
        store.create_index(&test_index()).unwrap();

        let err = store.create_index(&test_index()).unwrap_err();
        assert!(matches!(
            err,
            LodgingError::Storage(StorageError::IndexExists(ref name)) if name == "idx"
        ));
    }

    #[test]
    fn test_unknown_index_queries_fail() {
        let (store, _dir) = open_store();
        let err = store.search_text("missing", "*", 10).unwrap_err();
        assert!(matches!(
            err,
            LodgingError::Storage(StorageError::UnknownIndex(_))
        ));
        assert!(store.index_info("missing").unwrap().is_none());
    }

    #[test]
    fn test_index_follows_writes() {
        let (store, _dir) = open_store();
        store.create_index(&test_index()).unwrap();

        let mut doc = fields(&[("title", "Paris loft")]);
        doc.insert("vector".into(), pack_vector(&[1.0, 0.0]));
        store.hash_set("doc:1", &doc).unwrap();
        store
            .hash_set("unindexed:1", &fields(&[("title", "Paris")]))
            .unwrap();

        assert_eq!(store.index_info("idx").unwrap().unwrap().num_docs, 1);
        assert_eq!(store.search_text("idx", "paris", 10).unwrap().len(), 1);
        let knn = store
            .search_knn("idx", "vector", &pack_vector(&[1.0, 0.0]), 3)
            .unwrap();
        assert_eq!(knn[0].key, "doc:1");

        store
            .hash_set("doc:1", &fields(&[("title", "Lyon loft")]))
            .unwrap();
        assert!(store.search_text("idx", "paris", 10).unwrap().is_empty());

        store.hash_delete("doc:1").unwrap();
        assert!(store.search_text("idx", "lyon", 10).unwrap().is_empty());
        assert_eq!(store.index_info("idx").unwrap().unwrap().num_docs, 0);
    }

    #[test]
    fn test_pubsub_through_store() {
        let (store, _dir) = open_store();
        let rx = store.subscribe("chan").unwrap();
        assert_eq!(store.publish("chan", "hello").unwrap(), 1);
        assert_eq!(rx.try_recv().unwrap(), "hello");
    }
}
