//! Observed sale outcomes fed into the experiment.

use async_trait::async_trait;

/// One completed sale reported by the external order system.
#[derive(Debug, Clone, PartialEq)]
pub struct SaleEvent {
    pub item_id: String,
    pub price: f64,
    pub revenue: f64,
    pub profit: f64,
}

/// Source of sale outcomes, drained once per cycle.
///
/// Draining is destructive: events are returned exactly once. The engine
/// records every drained event into the active experiment.
#[async_trait]
pub trait SalesFeed: Send + Sync {
    async fn drain(&self) -> Vec<SaleEvent>;
}

/// Feed that never reports sales. Used when outcome data arrives through a
/// separate ingestion path.
pub struct NoopSales;

#[async_trait]
impl SalesFeed for NoopSales {
    async fn drain(&self) -> Vec<SaleEvent> {
        Vec::new()
    }
}
