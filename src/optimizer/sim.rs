//! Paper-mode collaborators.
//!
//! Seeded, in-process stand-ins for the external market-data collector and
//! order system so the full optimization loop can run end to end without
//! network access.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::inventory::{InventoryItem, InventoryProvider};
use super::market_data::MarketDataClient;
use super::model::{LinearModel, ModelRegistry};
use super::sales::{SaleEvent, SalesFeed};

/// Catalog used by paper runs: brand and typical face value.
const PAPER_CATALOG: [(&str, f64); 6] = [
    ("Netflix", 50.0),
    ("Amazon", 100.0),
    ("Steam", 20.0),
    ("iTunes", 25.0),
    ("Uber", 50.0),
    ("Starbucks", 15.0),
];

/// Competitor price source producing jittered quotes around a per-brand
/// anchor. Brand failures are injected at the configured rate to exercise
/// the cache fallback chain.
pub struct SimulatedMarketData {
    rng: Mutex<StdRng>,
    /// Anchor price per brand; unknown brands fail.
    anchors: HashMap<String, f64>,
    /// Probability that a brand's fetch fails this call.
    failure_rate: f64,
}

impl SimulatedMarketData {
    pub fn new(seed: u64, failure_rate: f64) -> Self {
        let anchors = PAPER_CATALOG
            .iter()
            .map(|(brand, face)| (brand.to_string(), face * 0.95))
            .collect();
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            anchors,
            failure_rate,
        }
    }

    /// Override the anchor price for a brand.
    pub fn set_anchor(&mut self, brand: impl Into<String>, price: f64) {
        self.anchors.insert(brand.into(), price);
    }
}

#[async_trait]
impl MarketDataClient for SimulatedMarketData {
    async fn collect_competitor_prices(&self, brands: &[String]) -> HashMap<String, Vec<f64>> {
        let mut rng = self.rng.lock().unwrap();
        let mut results = HashMap::new();
        for brand in brands {
            let Some(&anchor) = self.anchors.get(brand) else {
                continue;
            };
            if rng.gen_bool(self.failure_rate) {
                continue;
            }
            let count = rng.gen_range(3..=5);
            let prices = (0..count)
                .map(|_| anchor * rng.gen_range(0.92..1.06))
                .collect();
            results.insert(brand.clone(), prices);
        }
        results
    }
}

/// Sales feed synthesizing outcomes at the current listed prices.
pub struct SimulatedSales {
    inventory: Arc<dyn InventoryProvider>,
    rng: Mutex<StdRng>,
    /// Probability that an item sells between two cycles.
    sale_probability: f64,
}

impl SimulatedSales {
    pub fn new(inventory: Arc<dyn InventoryProvider>, seed: u64, sale_probability: f64) -> Self {
        Self {
            inventory,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
            sale_probability,
        }
    }
}

#[async_trait]
impl SalesFeed for SimulatedSales {
    async fn drain(&self) -> Vec<SaleEvent> {
        let items = self.inventory.snapshot().await.unwrap_or_default();
        let mut rng = self.rng.lock().unwrap();
        items
            .into_iter()
            .filter_map(|item| {
                if !rng.gen_bool(self.sale_probability) {
                    return None;
                }
                // Acquisition cost modeled as a fixed discount off face.
                let cost = item.face_value * rng.gen_range(0.88..0.93);
                Some(SaleEvent {
                    item_id: item.id,
                    price: item.current_price,
                    revenue: item.current_price,
                    profit: item.current_price - cost,
                })
            })
            .collect()
    }
}

/// Deterministic paper catalog: a few listings per brand.
pub fn paper_inventory(listings_per_brand: usize) -> Vec<InventoryItem> {
    let mut items = Vec::new();
    for (brand, face_value) in PAPER_CATALOG {
        for n in 0..listings_per_brand {
            items.push(InventoryItem {
                id: format!("{brand}-{}", 1000 + n),
                card_type: brand.to_string(),
                face_value,
                // Listed a little under face, staggered per listing.
                current_price: face_value * (0.96 - 0.005 * n as f64),
                brand: brand.to_string(),
            });
        }
    }
    items
}

/// Models for the paper catalog: price slightly under the competitor
/// average, nudged down on weekends.
pub fn paper_models() -> ModelRegistry {
    let models = PAPER_CATALOG
        .iter()
        .map(|(brand, _)| {
            (
                brand.to_string(),
                LinearModel::new([0.0, 0.97, 0.0, 0.0, 0.0, -0.25], 0.0),
            )
        })
        .collect();
    ModelRegistry::from_models(models)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::inventory::StaticInventory;

    #[tokio::test]
    async fn test_market_data_is_reproducible() {
        let brands = vec!["Netflix".to_string(), "Steam".to_string()];
        let a = SimulatedMarketData::new(7, 0.0)
            .collect_competitor_prices(&brands)
            .await;
        let b = SimulatedMarketData::new(7, 0.0)
            .collect_competitor_prices(&brands)
            .await;
        assert_eq!(a, b);
        assert!(!a["Netflix"].is_empty());
    }

    #[tokio::test]
    async fn test_unknown_brand_fails_per_brand() {
        let brands = vec!["Netflix".to_string(), "Unknown".to_string()];
        let quotes = SimulatedMarketData::new(7, 0.0)
            .collect_competitor_prices(&brands)
            .await;
        assert!(quotes.contains_key("Netflix"));
        assert!(!quotes.contains_key("Unknown"));
    }

    #[tokio::test]
    async fn test_total_failure_rate_yields_empty_map() {
        let brands = vec!["Netflix".to_string()];
        let quotes = SimulatedMarketData::new(7, 1.0)
            .collect_competitor_prices(&brands)
            .await;
        assert!(quotes.is_empty());
    }

    #[tokio::test]
    async fn test_simulated_sales_reference_inventory() {
        let inventory = Arc::new(StaticInventory::new(paper_inventory(2)));
        let sales = SimulatedSales::new(inventory, 11, 1.0);
        let events = sales.drain().await;
        assert_eq!(events.len(), 12);
        for event in &events {
            assert!(event.profit > 0.0, "paper sales should be profitable");
            assert_eq!(event.revenue, event.price);
        }
    }

    #[test]
    fn test_paper_models_cover_catalog() {
        let registry = paper_models();
        for item in paper_inventory(1) {
            assert!(registry.get(&item.card_type).is_some());
        }
    }
}
