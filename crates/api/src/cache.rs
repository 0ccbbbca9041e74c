use assemble::PortfolioDocument;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Finished portfolio documents keyed by request fingerprint. A fingerprint
/// covers the request body and the loaded archive digests, so reloading
/// different archives never serves a stale document.
pub struct PortfolioCache {
    documents: Arc<DashMap<String, PortfolioDocument>>,
    max_entries: usize,
}

impl PortfolioCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            documents: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn fingerprint(&self, request: &[u8], archive_digests: &[String]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request);
        for digest in archive_digests {
            hasher.update(digest.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    pub fn set(&self, key: String, document: PortfolioDocument) {
        if self.max_entries == 0 {
            return;
        }
        if self.documents.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .documents
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.documents.remove(&key);
            }
        }
        self.documents.insert(key, document);
    }

    pub fn get(&self, key: &str) -> Option<PortfolioDocument> {
        self.documents.get(key).map(|r| r.value().clone())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            documents_cached: self.documents.len(),
            max_entries: self.max_entries,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub documents_cached: usize,
    pub max_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assemble::OutputAssembler;

    fn empty_document() -> PortfolioDocument {
        OutputAssembler::default().assemble(Vec::new()).unwrap()
    }

    #[test]
    fn test_fingerprint_covers_archives() {
        let cache = PortfolioCache::new(10);
        let body = br#"{"patents":[]}"#;
        let a = cache.fingerprint(body, &["aa".to_string()]);
        let b = cache.fingerprint(body, &["bb".to_string()]);
        assert_ne!(a, b);
        assert_eq!(a, cache.fingerprint(body, &["aa".to_string()]));
    }

    #[test]
    fn test_eviction_keeps_bound() {
        let cache = PortfolioCache::new(4);
        for i in 0..10 {
            cache.set(format!("key-{}", i), empty_document());
        }
        assert!(cache.stats().documents_cached <= 4);
        assert!(cache.get("key-9").is_some());
    }

    #[test]
    fn test_disabled_cache_stores_nothing() {
        let cache = PortfolioCache::new(0);
        cache.set("key".to_string(), empty_document());
        assert!(cache.get("key").is_none());
    }
}
