#![deny(unreachable_pub)]

mod errors;
pub mod optimizer;

pub use errors::{Error, Result};
pub use optimizer::{
    init_logging, paper_inventory, paper_models, shutdown_channel, Bucket, CompetitorPriceCache,
    CyclePhase, CycleSummary, DashboardSummary, DashboardWriter, ExperimentAssigner,
    ExperimentSample, ExperimentStats, InventoryItem, InventoryProvider, JsonInventory, LinearModel,
    LogConfig, LogFormat, MarketDataClient, ModelRegistry, NoopSales, OptimizationLoop,
    OptimizationLoopInput, PriceAdjuster, PriceFeatures, PriceHistoryLogger, PriceLimits,
    PriceRecommendation, PricingConfig, PricingModel, SaleEvent, SalesFeed, ShutdownHandle,
    ShutdownSignal, SimulatedMarketData, SimulatedSales, StaticInventory,
};
