//! External market-data interface.
//!
//! The actual competitor-price collector (scraping, proxies, auth) lives
//! outside this crate. The engine only depends on the [`MarketDataClient`]
//! trait; per-brand failures are expressed as missing map entries rather
//! than call-level errors.

use std::collections::HashMap;

use async_trait::async_trait;

/// Client for collecting competitor prices, one list per brand.
///
/// Implementations must isolate per-brand failures: a brand that cannot be
/// fetched is simply absent from (or empty in) the returned map. The call as
/// a whole does not fail; transport-level stalls are bounded by the caller's
/// timeout.
#[async_trait]
pub trait MarketDataClient: Send + Sync {
    /// Collect current competitor prices for the given brands.
    async fn collect_competitor_prices(&self, brands: &[String]) -> HashMap<String, Vec<f64>>;
}
