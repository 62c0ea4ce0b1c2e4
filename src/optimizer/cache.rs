//! Competitor price cache with TTL and fallback chain.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::market_data::MarketDataClient;

/// A cached competitor quote for one item.
#[derive(Debug, Clone)]
struct CacheEntry {
    prices: Vec<f64>,
    fetched_at: Instant,
}

/// Per-item cache of competitor price quotes.
///
/// Lookup order: fresh cache entry, live fetch, stale cache entry, configured
/// defaults. [`CompetitorPriceCache::get`] never fails and never returns an
/// empty list; transient fetch failures stop here and are not visible to the
/// price adjuster.
///
/// Entries are keyed by item id behind a single mutex. Contention is
/// negligible next to network latency, and the lock is never held across a
/// fetch.
pub struct CompetitorPriceCache {
    client: Arc<dyn MarketDataClient>,
    entries: Mutex<HashMap<String, CacheEntry>>,
    ttl: Duration,
    fetch_timeout: Duration,
    default_prices: Vec<f64>,
}

impl CompetitorPriceCache {
    pub fn new(
        client: Arc<dyn MarketDataClient>,
        ttl: Duration,
        fetch_timeout: Duration,
        default_prices: Vec<f64>,
    ) -> Self {
        assert!(
            !default_prices.is_empty(),
            "default competitor prices must not be empty"
        );
        Self {
            client,
            entries: Mutex::new(HashMap::new()),
            ttl,
            fetch_timeout,
            default_prices,
        }
    }

    /// Get competitor prices for an item, fetching by brand when the cached
    /// entry is missing or older than the TTL.
    pub async fn get(&self, item_id: &str, brand: &str) -> Vec<f64> {
        {
            let entries = self.entries.lock().unwrap();
            if let Some(entry) = entries.get(item_id) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return entry.prices.clone();
                }
            }
        }

        match self.fetch_brand(brand).await {
            Some(prices) => {
                self.entries.lock().unwrap().insert(
                    item_id.to_string(),
                    CacheEntry {
                        prices: prices.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                prices
            }
            None => {
                // Fetch failed: prefer stale data over defaults.
                let entries = self.entries.lock().unwrap();
                if let Some(entry) = entries.get(item_id) {
                    debug!(
                        item_id,
                        age_secs = entry.fetched_at.elapsed().as_secs(),
                        "Live fetch failed, serving stale competitor quote"
                    );
                    entry.prices.clone()
                } else {
                    warn!(item_id, brand, "Live fetch failed with cold cache, serving defaults");
                    self.default_prices.clone()
                }
            }
        }
    }

    /// Seed or replace the cache entry for an item directly.
    ///
    /// Used by the engine's bulk market-data prefetch so per-item lookups in
    /// the same cycle hit fresh entries. Empty lists are rejected.
    pub fn insert(&self, item_id: &str, prices: Vec<f64>) {
        if prices.is_empty() {
            return;
        }
        self.entries.lock().unwrap().insert(
            item_id.to_string(),
            CacheEntry {
                prices,
                fetched_at: Instant::now(),
            },
        );
    }

    /// Number of cached entries. Diagnostic only.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    /// One timeout-bounded live fetch for a single brand.
    /// Returns None on timeout, missing brand, or empty price list.
    async fn fetch_brand(&self, brand: &str) -> Option<Vec<f64>> {
        let brands = vec![brand.to_string()];
        match tokio::time::timeout(
            self.fetch_timeout,
            self.client.collect_competitor_prices(&brands),
        )
        .await
        {
            Ok(mut quotes) => match quotes.remove(brand) {
                Some(prices) if !prices.is_empty() => Some(prices),
                _ => None,
            },
            Err(_) => {
                warn!(brand, timeout_secs = self.fetch_timeout.as_secs(), "Market data fetch timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Test client whose failure mode can be flipped at runtime.
    struct SwitchableClient {
        prices: Vec<f64>,
        failing: AtomicBool,
        calls: AtomicUsize,
    }

    impl SwitchableClient {
        fn new(prices: Vec<f64>) -> Self {
            Self {
                prices,
                failing: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
            }
        }

        fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl MarketDataClient for SwitchableClient {
        async fn collect_competitor_prices(&self, brands: &[String]) -> HashMap<String, Vec<f64>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return HashMap::new();
            }
            brands
                .iter()
                .map(|b| (b.clone(), self.prices.clone()))
                .collect()
        }
    }

    fn defaults() -> Vec<f64> {
        vec![48.50, 49.99, 47.95]
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_fetch() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        let cache = CompetitorPriceCache::new(
            client.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(5),
            defaults(),
        );

        assert_eq!(cache.get("id1", "Netflix").await, vec![45.0]);
        assert_eq!(cache.get("id1", "Netflix").await, vec![45.0]);
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cold_start_failure_returns_defaults() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        client.set_failing(true);
        let cache = CompetitorPriceCache::new(
            client,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            defaults(),
        );

        assert_eq!(cache.get("id1", "Netflix").await, defaults());
        assert!(cache.is_empty(), "defaults must not be cached as quotes");
    }

    #[tokio::test]
    async fn test_stale_entry_preferred_over_defaults() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        // Zero TTL: every entry is stale immediately.
        let cache = CompetitorPriceCache::new(
            client.clone(),
            Duration::from_secs(0),
            Duration::from_secs(5),
            defaults(),
        );

        assert_eq!(cache.get("id1", "Netflix").await, vec![45.0]);
        client.set_failing(true);
        // Stale entry wins over defaults on fetch failure.
        assert_eq!(cache.get("id1", "Netflix").await, vec![45.0]);
    }

    #[tokio::test]
    async fn test_expired_entry_refetched() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        let cache = CompetitorPriceCache::new(
            client.clone(),
            Duration::from_secs(0),
            Duration::from_secs(5),
            defaults(),
        );

        cache.get("id1", "Netflix").await;
        cache.get("id1", "Netflix").await;
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_insert_seeds_entry() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        client.set_failing(true);
        let cache = CompetitorPriceCache::new(
            client,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            defaults(),
        );

        cache.insert("id1", vec![42.0, 43.5]);
        assert_eq!(cache.get("id1", "Netflix").await, vec![42.0, 43.5]);
    }

    #[tokio::test]
    async fn test_insert_rejects_empty() {
        let client = Arc::new(SwitchableClient::new(vec![45.0]));
        let cache = CompetitorPriceCache::new(
            client,
            Duration::from_secs(3600),
            Duration::from_secs(5),
            defaults(),
        );
        cache.insert("id1", vec![]);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_hung_client_treated_as_failure() {
        struct HangingClient;

        #[async_trait]
        impl MarketDataClient for HangingClient {
            async fn collect_competitor_prices(
                &self,
                _brands: &[String],
            ) -> HashMap<String, Vec<f64>> {
                std::future::pending().await
            }
        }

        let cache = CompetitorPriceCache::new(
            Arc::new(HangingClient),
            Duration::from_secs(3600),
            Duration::from_millis(10),
            defaults(),
        );
        assert_eq!(cache.get("id1", "Netflix").await, defaults());
    }
}
