//! Integration tests for writes interleaved with another writer.
//!
//! `InterleavingStore` wraps a `RedbStore` and runs one extra write right
//! after the next `hash_exists` call, which is the gap between a mutation's
//! early check and its commit.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;
use lodgings::index::{HashFields, IndexDefinition, IndexInfo, SearchHit};
use lodgings::{
    Config, ListingStore, ListingUpdate, LodgingError, LodgingService, NewListing, RedbStore,
    Result, StreamEntry, StreamEntryId, UpdateOutcome, ValidationError,
};
use tempfile::{tempdir, TempDir};

enum Interleave {
    Delete(String),
    Insert(String, HashFields),
}

struct InterleavingStore {
    inner: RedbStore,
    pending: Mutex<Option<Interleave>>,
}

impl InterleavingStore {
    fn arm(&self, step: Interleave) {
        *self.pending.lock().unwrap() = Some(step);
    }
}

impl ListingStore for InterleavingStore {
    fn hash_set(&self, key: &str, fields: &HashFields) -> Result<()> {
        self.inner.hash_set(key, fields)
    }

    fn hash_insert_new(&self, key: &str, fields: &HashFields) -> Result<bool> {
        self.inner.hash_insert_new(key, fields)
    }

    fn hash_update_existing(&self, key: &str, fields: &HashFields) -> Result<bool> {
        self.inner.hash_update_existing(key, fields)
    }

    fn hash_get_all(&self, key: &str) -> Result<Option<HashFields>> {
        self.inner.hash_get_all(key)
    }

    fn hash_delete(&self, key: &str) -> Result<bool> {
        self.inner.hash_delete(key)
    }

    fn hash_exists(&self, key: &str) -> Result<bool> {
        let exists = self.inner.hash_exists(key)?;
        match self.pending.lock().unwrap().take() {
            Some(Interleave::Delete(target)) => {
                self.inner.hash_delete(&target)?;
            }
            Some(Interleave::Insert(target, fields)) => {
                self.inner.hash_set(&target, &fields)?;
            }
            None => {}
        }
        Ok(exists)
    }

    fn hash_keys(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.hash_keys(prefix)
    }

    fn rank_set(&self, key: &str, member: &str, score: f64) -> Result<()> {
        self.inner.rank_set(key, member, score)
    }

    fn rank_increment(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.inner.rank_increment(key, member, delta)
    }

    fn rank_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.inner.rank_remove(key, member)
    }

    fn rank_score(&self, key: &str, member: &str) -> Result<Option<f64>> {
        self.inner.rank_score(key, member)
    }

    fn rank_top(&self, key: &str, limit: usize) -> Result<Vec<(String, f64)>> {
        self.inner.rank_top(key, limit)
    }

    fn rank_len(&self, key: &str) -> Result<usize> {
        self.inner.rank_len(key)
    }

    fn stream_append(&self, key: &str, fields: &[(String, String)]) -> Result<StreamEntryId> {
        self.inner.stream_append(key, fields)
    }

    fn stream_trim(&self, key: &str, max_len: usize) -> Result<usize> {
        self.inner.stream_trim(key, max_len)
    }

    fn stream_len(&self, key: &str) -> Result<usize> {
        self.inner.stream_len(key)
    }

    fn stream_recent(&self, key: &str, count: usize) -> Result<Vec<StreamEntry>> {
        self.inner.stream_recent(key, count)
    }

    fn get_expiring(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get_expiring(key)
    }

    fn set_expiring(&self, key: &str, value: &[u8], ttl: Duration) -> Result<()> {
        self.inner.set_expiring(key, value, ttl)
    }

    fn publish(&self, channel: &str, message: &str) -> Result<usize> {
        self.inner.publish(channel, message)
    }

    fn subscribe(&self, channel: &str) -> Result<Receiver<String>> {
        self.inner.subscribe(channel)
    }

    fn create_index(&self, definition: &IndexDefinition) -> Result<()> {
        self.inner.create_index(definition)
    }

    fn index_info(&self, name: &str) -> Result<Option<IndexInfo>> {
        self.inner.index_info(name)
    }

    fn search_text(&self, index: &str, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.inner.search_text(index, query, limit)
    }

    fn search_knn(
        &self,
        index: &str,
        field: &str,
        vector: &[u8],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.inner.search_knn(index, field, vector, k)
    }
}

fn open_interleaving() -> (LodgingService, Arc<InterleavingStore>, TempDir) {
    let dir = tempdir().unwrap();
    let config = Config::default();
    let store = Arc::new(InterleavingStore {
        inner: RedbStore::open(dir.path().join("lodgings.db"), &config).unwrap(),
        pending: Mutex::new(None),
    });
    let service = LodgingService::builder(store.clone(), config).build().unwrap();
    (service, store, dir)
}

fn retitle(title: &str) -> ListingUpdate {
    ListingUpdate {
        title: Some(title.into()),
        ..Default::default()
    }
}

#[test]
fn test_update_after_concurrent_delete_is_not_found() {
    let (service, store, _dir) = open_interleaving();
    service
        .create_listing(NewListing::new("1", "Old", "", 10.0))
        .unwrap();
    service
        .create_listing(NewListing::new("2", "Cabin", "", 20.0))
        .unwrap();

    store.arm(Interleave::Delete("lodging:1".into()));
    let outcome = service.update_listing("1", retitle("New")).unwrap();

    assert_eq!(outcome, UpdateOutcome::NotFound);
    assert!(store.hash_get_all("lodging:1").unwrap().is_none());
    assert!(service.find_listing("1").unwrap().is_none());

    let ids: Vec<String> = service
        .list_listings()
        .unwrap()
        .into_iter()
        .map(|l| l.id.to_string())
        .collect();
    assert_eq!(ids, vec!["2"]);

    let hits = service.text_search("*", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id.as_str(), "2");
    assert!(service.catalog_stats().is_ok());
}

#[test]
fn test_create_after_concurrent_create_is_duplicate() {
    let (service, store, _dir) = open_interleaving();

    let mut theirs = HashFields::new();
    theirs.insert("title".into(), b"Theirs".to_vec());
    theirs.insert("price".into(), b"5".to_vec());
    store.arm(Interleave::Insert("lodging:7".into(), theirs.clone()));

    let err = service
        .create_listing(NewListing::new("7", "Mine", "", 10.0))
        .unwrap_err();

    assert!(matches!(
        err,
        LodgingError::Validation(ValidationError::DuplicateId { .. })
    ));
    assert_eq!(store.hash_get_all("lodging:7").unwrap(), Some(theirs));
    assert_eq!(service.popularity_score("7").unwrap(), None);
    assert!(service.recent_events(10).unwrap().is_empty());
}
