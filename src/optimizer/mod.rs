//! Gift card repricing engine.
//!
//! Pluggable components wired together by the optimization loop:
//! - **CompetitorPriceCache**: TTL cache over the market-data client with a
//!   stale-then-defaults fallback chain
//! - **PriceAdjuster**: clamp, rate-limit and round model predictions
//! - **ExperimentAssigner**: deterministic control/test split and
//!   significance analysis
//! - **OptimizationLoop**: the cycle scheduler with failure containment

mod adjuster;
mod cache;
mod config;
mod dashboard;
mod engine;
mod experiment;
mod features;
mod history;
mod inventory;
mod logging;
mod market_data;
mod model;
mod sales;
mod sim;


pub use adjuster::{PriceAdjuster, PriceLimits};
pub use cache::CompetitorPriceCache;
pub use config::PricingConfig;
pub use dashboard::{DashboardSummary, DashboardWriter};
pub use engine::{
    shutdown_channel, CyclePhase, CycleSummary, OptimizationLoop, OptimizationLoopInput,
    ShutdownHandle, ShutdownSignal,
};
pub use experiment::{Bucket, ExperimentAssigner, ExperimentSample, ExperimentStats};
pub use features::{PriceFeatures, FEATURE_ORDER};
pub use history::{PriceHistoryLogger, PriceRecommendation};
pub use inventory::{InventoryItem, InventoryProvider, JsonInventory, StaticInventory};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use market_data::MarketDataClient;
pub use model::{LinearModel, ModelRegistry, PricingModel};
pub use sales::{NoopSales, SaleEvent, SalesFeed};
pub use sim::{paper_inventory, paper_models, SimulatedMarketData, SimulatedSales};
