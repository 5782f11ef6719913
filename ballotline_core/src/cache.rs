use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::models::{CacheEntry, FactDomain, Jurisdiction};
use crate::Result;

/// Logical cache key: jurisdiction plus fact domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub jurisdiction: String,
    pub domain: FactDomain,
}

impl CacheKey {
    pub fn new(jurisdiction: &Jurisdiction, domain: FactDomain) -> Self {
        Self {
            jurisdiction: jurisdiction.cache_key(),
            domain,
        }
    }

    /// Key for state-scoped facts that have no district granularity
    /// (instructional content).
    pub fn state_scoped(state: &str, scope: &str, domain: FactDomain) -> Self {
        Self {
            jurisdiction: format!("{}/{}", state.to_ascii_uppercase(), scope),
            domain,
        }
    }
}

/// Keyed store of resolved domain records.
///
/// Any storage technology satisfying point lookup, write, and TTL-aware
/// expiry suffices; expiry is evaluated by callers against the injected
/// clock, so backends need no timer of their own. Write coordination per
/// jurisdiction key lives in the engine's single-flight map, keeping
/// different jurisdictions free of contention.
#[async_trait]
pub trait ElectionCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Write-through with the supersede rule: an existing entry survives
    /// unless the incoming one is at least as fresh or carries strictly
    /// higher peak confidence.
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()>;

    async fn invalidate(&self, key: &CacheKey) -> Result<()>;

    /// Flag an entry conflicted so the next read re-resolves instead of
    /// serving it.
    async fn mark_conflicted(&self, key: &CacheKey) -> Result<()>;
}

/// In-memory cache over a read-write lock: concurrent readers, one writer at
/// a time. Suitable for single-process deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl InMemoryCache {
    #[tracing::instrument]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn superseded_by(existing: &CacheEntry, incoming: &CacheEntry) -> bool {
    incoming.resolved_at >= existing.resolved_at
        || incoming.facts.peak_confidence() > existing.facts.peak_confidence()
}

#[async_trait]
impl ElectionCache for InMemoryCache {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    #[tracing::instrument(level = "debug", skip(self, entry))]
    async fn put(&self, key: CacheKey, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.get(&key) {
            Some(existing) if !superseded_by(existing, &entry) => {
                tracing::debug!(?key, "keeping existing cache entry; incoming is neither fresher nor more confident");
            }
            _ => {
                entries.insert(key, entry);
            }
        }
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn invalidate(&self, key: &CacheKey) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn mark_conflicted(&self, key: &CacheKey) -> Result<()> {
        if let Some(entry) = self.entries.write().await.get_mut(key) {
            entry.conflicted = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ArbitratedField, DomainFacts, FactField, FactPayload, FieldProvenance,
    };
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use std::time::Duration;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
    }

    fn entry(resolved_at: DateTime<Utc>, confidence: f64, ttl_secs: u64) -> CacheEntry {
        let mut facts = DomainFacts::new(FactDomain::ElectionDates);
        facts.fields.insert(
            FactField::ElectionDay,
            ArbitratedField {
                payload: FactPayload::Date(NaiveDate::from_ymd_opt(2026, 11, 3).unwrap()),
                provenance: FieldProvenance {
                    source_id: "feed".to_string(),
                    fetched_at: resolved_at,
                    confidence,
                    trust_weight: 0.9,
                    conflicted: false,
                    alternatives: vec![],
                },
            },
        );
        CacheEntry::new(facts, resolved_at, Duration::from_secs(ttl_secs))
    }

    fn key() -> CacheKey {
        CacheKey {
            jurisdiction: "IL/SPRINGFIELD-07".to_string(),
            domain: FactDomain::ElectionDates,
        }
    }

    #[tokio::test]
    async fn put_get_invalidate_roundtrip() {
        let cache = InMemoryCache::new();
        let e = entry(t0(), 0.9, 3600);
        cache.put(key(), e.clone()).await.unwrap();
        assert_eq!(cache.get(&key()).await.unwrap(), Some(e));

        cache.invalidate(&key()).await.unwrap();
        assert_eq!(cache.get(&key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn stale_low_confidence_write_does_not_clobber() {
        let cache = InMemoryCache::new();
        let good = entry(t0(), 0.9, 3600);
        cache.put(key(), good.clone()).await.unwrap();

        // Older and less confident: rejected by the supersede rule.
        let straggler = entry(t0() - chrono::Duration::hours(2), 0.3, 3600);
        cache.put(key(), straggler).await.unwrap();
        assert_eq!(cache.get(&key()).await.unwrap(), Some(good.clone()));

        // Older but more confident: accepted.
        let better = entry(t0() - chrono::Duration::hours(1), 0.99, 3600);
        cache.put(key(), better.clone()).await.unwrap();
        assert_eq!(cache.get(&key()).await.unwrap(), Some(better));
    }

    #[tokio::test]
    async fn fresher_write_supersedes() {
        let cache = InMemoryCache::new();
        cache.put(key(), entry(t0(), 0.9, 3600)).await.unwrap();
        let fresher = entry(t0() + chrono::Duration::hours(1), 0.5, 3600);
        cache.put(key(), fresher.clone()).await.unwrap();
        assert_eq!(cache.get(&key()).await.unwrap(), Some(fresher));
    }

    #[tokio::test]
    async fn mark_conflicted_flags_entry_in_place() {
        let cache = InMemoryCache::new();
        cache.put(key(), entry(t0(), 0.9, 3600)).await.unwrap();
        cache.mark_conflicted(&key()).await.unwrap();
        let got = cache.get(&key()).await.unwrap().unwrap();
        assert!(got.conflicted);
    }
}
