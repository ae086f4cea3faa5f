//! Cached embedding lookup with mock fallback.
//!
//! ```text
//! embedding_for(text)
//!     ├── no provider           → mock vector
//!     ├── cache hit             → cached vector
//!     ├── provider ok           → cache for the TTL, return it
//!     └── provider failure      → warn!, mock vector
//! ```
//!
//! A failed cache read counts as a miss; a failed cache write is only
//! logged.
//!
//! Cache keys are `embedding:{sha256(text) as lowercase hex}`; values are
//! packed vector blobs.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument, warn};

use super::{mock_embedding, EmbeddingService};
use crate::error::{Result, ValidationError};
use crate::storage::ListingStore;
use crate::types::Embedding;
use crate::vector::{pack_vector, unpack_vector, EMBEDDING_DIMENSION};

/// Returns the store key caching the embedding of `text`.
pub fn embedding_cache_key(text: &str) -> String {
    format!("embedding:{:x}", Sha256::digest(text.as_bytes()))
}

/// Infallible embedding lookup in front of an optional provider.
pub struct EmbeddingCache {
    store: Arc<dyn ListingStore>,
    provider: Option<Box<dyn EmbeddingService>>,
    ttl: Duration,
}

impl EmbeddingCache {
    /// Creates a lookup. `provider = None` selects mock mode.
    pub fn new(
        store: Arc<dyn ListingStore>,
        provider: Option<Box<dyn EmbeddingService>>,
        ttl: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            ttl,
        }
    }

    /// Returns true if no provider is configured.
    pub fn is_mock(&self) -> bool {
        self.provider.is_none()
    }

    /// Returns a 1536-dimension embedding for `text`. Never fails.
    ///
    /// Provider and dimension errors are logged and answered with
    /// [`mock_embedding`]. Cache errors are logged and bypassed.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub fn embedding_for(&self, text: &str) -> Embedding {
        let Some(provider) = self.provider.as_deref() else {
            return mock_embedding(text);
        };

        match self.resolve(provider, text) {
            Ok(vector) => vector,
            Err(err) => {
                warn!(error = %err, "Embedding provider failed; using mock vector");
                mock_embedding(text)
            }
        }
    }

    fn resolve(&self, provider: &dyn EmbeddingService, text: &str) -> Result<Embedding> {
        let key = embedding_cache_key(text);
        if let Some(vector) = self.cached(&key) {
            return Ok(vector);
        }

        debug!("Embedding cache miss");
        let vector = provider.embed(text)?;
        if vector.len() != EMBEDDING_DIMENSION {
            return Err(ValidationError::dimension_mismatch(EMBEDDING_DIMENSION, vector.len()).into());
        }

        if let Err(err) = self.store.set_expiring(&key, &pack_vector(&vector), self.ttl) {
            warn!(error = %err, "Failed to cache embedding");
        }
        Ok(vector)
    }

    /// Cache lookup. Any failure reads as a miss.
    fn cached(&self, key: &str) -> Option<Embedding> {
        let blob = match self.store.get_expiring(key) {
            Ok(blob) => blob?,
            Err(err) => {
                warn!(error = %err, "Embedding cache read failed; treating as miss");
                return None;
            }
        };
        match unpack_vector(&blob) {
            Ok(vector) if vector.len() == EMBEDDING_DIMENSION => {
                debug!("Embedding cache hit");
                Some(vector)
            }
            Ok(vector) => {
                warn!(len = vector.len(), "Cached embedding has wrong dimension; recomputing");
                None
            }
            Err(err) => {
                warn!(error = %err, "Cached embedding unreadable; recomputing");
                None
            }
        }
    }
}

impl std::fmt::Debug for EmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingCache")
            .field("mock", &self.is_mock())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::{LodgingError, StorageError};
    use crate::index::{HashFields, IndexDefinition, IndexInfo, SearchHit};
    use crate::storage::{RedbStore, StreamEntry, StreamEntryId};
    use crossbeam_channel::Receiver;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        dimension: usize,
        fail: bool,
    }

    impl EmbeddingService for CountingProvider {
        fn embed(&self, _text: &str) -> Result<Embedding> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(LodgingError::embedding("provider down"));
            }
            Ok(vec![0.5; self.dimension])
        }

        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    /// Store whose expiring values are unreachable. Nothing else is used.
    struct OfflineCacheStore;

    impl ListingStore for OfflineCacheStore {
        fn get_expiring(&self, _key: &str) -> Result<Option<Vec<u8>>> {
            Err(StorageError::transaction("cache offline").into())
        }

        fn set_expiring(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<()> {
            Err(StorageError::transaction("cache offline").into())
        }

        fn hash_set(&self, _: &str, _: &HashFields) -> Result<()> {
            unimplemented!()
        }
        fn hash_insert_new(&self, _: &str, _: &HashFields) -> Result<bool> {
            unimplemented!()
        }
        fn hash_update_existing(&self, _: &str, _: &HashFields) -> Result<bool> {
            unimplemented!()
        }
        fn hash_get_all(&self, _: &str) -> Result<Option<HashFields>> {
            unimplemented!()
        }
        fn hash_delete(&self, _: &str) -> Result<bool> {
            unimplemented!()
        }
        fn hash_keys(&self, _: &str) -> Result<Vec<String>> {
            unimplemented!()
        }
        fn rank_set(&self, _: &str, _: &str, _: f64) -> Result<()> {
            unimplemented!()
        }
        fn rank_increment(&self, _: &str, _: &str, _: f64) -> Result<f64> {
            unimplemented!()
        }
        fn rank_remove(&self, _: &str, _: &str) -> Result<bool> {
            unimplemented!()
        }
        fn rank_score(&self, _: &str, _: &str) -> Result<Option<f64>> {
            unimplemented!()
        }
        fn rank_top(&self, _: &str, _: usize) -> Result<Vec<(String, f64)>> {
            unimplemented!()
        }
        fn rank_len(&self, _: &str) -> Result<usize> {
            unimplemented!()
        }
        fn stream_append(&self, _: &str, _: &[(String, String)]) -> Result<StreamEntryId> {
            unimplemented!()
        }
        fn stream_trim(&self, _: &str, _: usize) -> Result<usize> {
            unimplemented!()
        }
        fn stream_len(&self, _: &str) -> Result<usize> {
            unimplemented!()
        }
        fn stream_recent(&self, _: &str, _: usize) -> Result<Vec<StreamEntry>> {
            unimplemented!()
        }
        fn publish(&self, _: &str, _: &str) -> Result<usize> {
            unimplemented!()
        }
        fn subscribe(&self, _: &str) -> Result<Receiver<String>> {
            unimplemented!()
        }
        fn create_index(&self, _: &IndexDefinition) -> Result<()> {
            unimplemented!()
        }
        fn index_info(&self, _: &str) -> Result<Option<IndexInfo>> {
            unimplemented!()
        }
        fn search_text(&self, _: &str, _: &str, _: usize) -> Result<Vec<SearchHit>> {
            unimplemented!()
        }
        fn search_knn(&self, _: &str, _: &str, _: &[u8], _: usize) -> Result<Vec<SearchHit>> {
            unimplemented!()
        }
    }

    fn setup(
        dimension: usize,
        fail: bool,
    ) -> (EmbeddingCache, Arc<AtomicUsize>, Arc<RedbStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(RedbStore::open(dir.path().join("test.db"), &Config::default()).unwrap());
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            calls: calls.clone(),
            dimension,
            fail,
        };
        let cache = EmbeddingCache::new(
            store.clone(),
            Some(Box::new(provider)),
            Duration::from_secs(60),
        );
        (cache, calls, store, dir)
    }

    #[test]
    fn test_cache_key_is_sha256_hex() {
        assert_eq!(
            embedding_cache_key("abc"),
            "embedding:ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_mock_mode_skips_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(RedbStore::open(dir.path().join("test.db"), &Config::default()).unwrap());
        let cache = EmbeddingCache::new(store.clone(), None, Duration::from_secs(60));

        assert!(cache.is_mock());
        assert_eq!(cache.embedding_for("Paris"), mock_embedding("paris"));
        assert!(store
            .get_expiring(&embedding_cache_key("Paris"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_provider_result_is_cached() {
        let (cache, calls, store, _dir) = setup(EMBEDDING_DIMENSION, false);

        let first = cache.embedding_for("quiet studio");
        let second = cache.embedding_for("quiet studio");

        assert_eq!(first, vec![0.5; EMBEDDING_DIMENSION]);
        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store
            .get_expiring(&embedding_cache_key("quiet studio"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn test_provider_failure_falls_back_to_mock() {
        let (cache, calls, _store, _dir) = setup(EMBEDDING_DIMENSION, true);
        assert_eq!(cache.embedding_for("Paris flat"), mock_embedding("paris"));
        assert_eq!(cache.embedding_for("Paris flat"), mock_embedding("paris"));
        // Failures are not cached
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_wrong_dimension_falls_back_to_mock() {
        let (cache, _calls, store, _dir) = setup(3, false);
        assert_eq!(cache.embedding_for("loft"), mock_embedding("loft"));
        assert!(store
            .get_expiring(&embedding_cache_key("loft"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_cache_failure_keeps_provider_vector() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CountingProvider {
            calls: calls.clone(),
            dimension: EMBEDDING_DIMENSION,
            fail: false,
        };
        let cache = EmbeddingCache::new(
            Arc::new(OfflineCacheStore),
            Some(Box::new(provider)),
            Duration::from_secs(60),
        );

        assert_eq!(cache.embedding_for("Paris loft"), vec![0.5; EMBEDDING_DIMENSION]);
        assert_eq!(cache.embedding_for("Paris loft"), vec![0.5; EMBEDDING_DIMENSION]);
        // Nothing could be cached, so the provider answered both times
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
