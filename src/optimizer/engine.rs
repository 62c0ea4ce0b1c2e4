//! The optimization loop: a cycle state machine with failure isolation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::errors::{Error, Result};

use super::adjuster::{PriceAdjuster, PriceLimits};
use super::cache::CompetitorPriceCache;
use super::config::PricingConfig;
use super::dashboard::{DashboardSummary, DashboardWriter};
use super::experiment::ExperimentAssigner;
use super::history::{PriceHistoryLogger, PriceRecommendation};
use super::inventory::{InventoryItem, InventoryProvider};
use super::market_data::MarketDataClient;
use super::model::ModelRegistry;
use super::sales::SalesFeed;

/// Create a linked shutdown handle/signal pair.
///
/// The handle side is given to whoever decides to stop (signal handler,
/// test); the signal side is injected into the loop.
pub fn shutdown_channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Sender half of the shutdown pair.
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// Request a graceful stop. Idempotent.
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiver half of the shutdown pair. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_shutdown(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Returns immediately if it
    /// already was. A dropped handle counts as shutdown.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Phase the loop is currently in. Observable for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    Idle,
    FetchMarket,
    ProcessItems,
    Persist,
    MaybeRefresh,
    Sleep,
    Stopped,
}

/// Outcome of one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleSummary {
    /// Items that received a price recommendation this cycle.
    pub processed: usize,
    /// Items omitted (no model, bad data, inference failure); their prices
    /// carry forward unchanged.
    pub skipped: usize,
    /// A persistence failure occurred; results may be incomplete on disk.
    pub degraded: bool,
    /// Mean recommended change in percent.
    pub avg_change_pct: f64,
}

/// Everything the loop needs, assembled by the caller.
pub struct OptimizationLoopInput {
    pub config: PricingConfig,
    pub registry: ModelRegistry,
    pub inventory: Arc<dyn InventoryProvider>,
    pub market_data: Arc<dyn MarketDataClient>,
    pub sales: Arc<dyn SalesFeed>,
    pub history_path: std::path::PathBuf,
    pub dashboard_path: std::path::PathBuf,
}

/// Scheduler driving the repricing cycle.
///
/// Owns the components and all shared state; nothing here is process-global.
/// Failure containment is layered: item failures are absorbed inside
/// `process_items`, fetch failures inside the cache, persistence failures
/// degrade the cycle, and anything else is caught at the top of `run` and
/// followed by a bounded backoff.
pub struct OptimizationLoop {
    config: PricingConfig,
    inventory: Arc<dyn InventoryProvider>,
    market_data: Arc<dyn MarketDataClient>,
    cache: Arc<CompetitorPriceCache>,
    adjusters: HashMap<String, Arc<PriceAdjuster>>,
    assigner: Arc<ExperimentAssigner>,
    sales: Arc<dyn SalesFeed>,
    history: PriceHistoryLogger,
    dashboard: DashboardWriter,
    shutdown: ShutdownSignal,
    phase: CyclePhase,
    cycles_completed: u64,
    items_repriced: u64,
}

impl OptimizationLoop {
    pub fn new(input: OptimizationLoopInput, shutdown: ShutdownSignal) -> Result<Self> {
        let OptimizationLoopInput {
            config,
            registry,
            inventory,
            market_data,
            sales,
            history_path,
            dashboard_path,
        } = input;

        config.validate().map_err(|e| Error::config(e))?;

        let limits = PriceLimits {
            min_price_ratio: config.min_price_ratio,
            max_price_ratio: config.max_price_ratio,
            max_adjustment_percentage: config.max_adjustment_percentage,
        };
        let adjusters: HashMap<String, Arc<PriceAdjuster>> = registry
            .into_models()
            .into_iter()
            .map(|(card_type, model)| {
                (
                    card_type,
                    Arc::new(PriceAdjuster::new(Arc::new(model), limits)),
                )
            })
            .collect();

        let cache = Arc::new(CompetitorPriceCache::new(
            Arc::clone(&market_data),
            config.cache_ttl(),
            config.fetch_timeout(),
            config.default_competitor_prices.clone(),
        ));
        let assigner = Arc::new(ExperimentAssigner::new(config.experiment_duration()));
        let history = PriceHistoryLogger::new(&history_path)?;
        let dashboard = DashboardWriter::new(dashboard_path, config.dashboard_interval());

        Ok(Self {
            config,
            inventory,
            market_data,
            cache,
            adjusters,
            assigner,
            sales,
            history,
            dashboard,
            shutdown,
            phase: CyclePhase::Idle,
            cycles_completed: 0,
            items_repriced: 0,
        })
    }

    /// Current loop phase.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Experiment state, shared with the item workers.
    pub fn assigner(&self) -> &Arc<ExperimentAssigner> {
        &self.assigner
    }

    /// Run cycles until shutdown is requested.
    ///
    /// A failed cycle is logged and followed by the fixed backoff; the loop
    /// itself never terminates on errors.
    pub async fn run(&mut self) -> Result<()> {
        info!(
            experiment = %self.config.experiment_name,
            models = self.adjusters.len(),
            interval_mins = self.config.update_interval_minutes,
            "Price optimization loop started"
        );

        loop {
            if self.shutdown.is_shutdown() {
                break;
            }

            match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        processed = summary.processed,
                        skipped = summary.skipped,
                        degraded = summary.degraded,
                        avg_change_pct = %format!("{:.2}", summary.avg_change_pct),
                        "Cycle complete"
                    );
                    self.phase = CyclePhase::Sleep;
                    self.sleep_interruptible(self.config.update_interval()).await;
                }
                Err(e) => {
                    error!(error = %e, backoff_secs = self.config.cycle_backoff_secs, "Cycle failed, backing off");
                    self.phase = CyclePhase::Sleep;
                    self.sleep_interruptible(self.config.cycle_backoff()).await;
                }
            }
        }

        self.phase = CyclePhase::Stopped;
        info!(cycles = self.cycles_completed, "Price optimization loop stopped");
        Ok(())
    }

    /// Execute one cycle: fetch, process, persist, record outcomes, refresh.
    pub async fn run_cycle(&mut self) -> Result<CycleSummary> {
        self.phase = CyclePhase::FetchMarket;
        let items = self.inventory.snapshot().await?;
        self.prefetch_market_data(&items).await;

        self.phase = CyclePhase::ProcessItems;
        let recommendations = self.process_items(&items).await;
        let skipped = items.len() - recommendations.len();

        self.phase = CyclePhase::Persist;
        let mut degraded = false;
        for rec in &recommendations {
            if let Err(e) = self.history.append(rec) {
                warn!(error = %e, "History append failed, marking cycle degraded");
                degraded = true;
                break;
            }
        }
        if let Err(e) = self.history.flush() {
            warn!(error = %e, "History flush failed, marking cycle degraded");
            degraded = true;
        }

        // Fold externally observed sales into the experiment before the
        // dashboard snapshot so the analysis reflects them.
        let sales = self.sales.drain().await;
        for sale in &sales {
            self.assigner.record_outcome(
                &self.config.experiment_name,
                &sale.item_id,
                sale.price,
                sale.revenue,
                sale.profit,
            );
        }
        if !sales.is_empty() {
            debug!(count = sales.len(), "Recorded sale outcomes");
        }

        let avg_change_pct = if recommendations.is_empty() {
            0.0
        } else {
            recommendations.iter().map(|r| r.change_pct).sum::<f64>()
                / recommendations.len() as f64
        };
        self.cycles_completed += 1;
        self.items_repriced += recommendations.len() as u64;

        self.phase = CyclePhase::MaybeRefresh;
        let summary = DashboardSummary {
            generated_at: Utc::now(),
            cycles_completed: self.cycles_completed,
            items_repriced: self.items_repriced,
            last_cycle_avg_change_pct: avg_change_pct,
            experiment: self.assigner.analyze(&self.config.experiment_name),
        };
        if let Err(e) = self.dashboard.maybe_refresh(&summary) {
            warn!(error = %e, "Dashboard refresh failed, marking cycle degraded");
            degraded = true;
        }

        Ok(CycleSummary {
            processed: recommendations.len(),
            skipped,
            degraded,
            avg_change_pct,
        })
    }

    /// One bulk market-data call covering every brand in the snapshot.
    ///
    /// Results seed the cache so per-item lookups in this cycle are fresh
    /// hits. A timeout or missing brand is not an error here; affected items
    /// fall back through the cache chain.
    async fn prefetch_market_data(&self, items: &[InventoryItem]) {
        let brands: Vec<String> = items
            .iter()
            .map(|i| i.brand.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if brands.is_empty() {
            return;
        }

        match tokio::time::timeout(
            self.config.fetch_timeout(),
            self.market_data.collect_competitor_prices(&brands),
        )
        .await
        {
            Ok(quotes) => {
                debug!(
                    brands = brands.len(),
                    fetched = quotes.len(),
                    "Market data prefetch complete"
                );
                for item in items {
                    if let Some(prices) = quotes.get(&item.brand) {
                        self.cache.insert(&item.id, prices.clone());
                    }
                }
            }
            Err(_) => {
                warn!(
                    brands = brands.len(),
                    "Bulk market data fetch timed out, relying on cache fallback"
                );
            }
        }
    }

    /// Reprice the snapshot through a bounded worker pool.
    ///
    /// Items are independent; a failure on one is logged and that item is
    /// omitted from the cycle's output, leaving its price unchanged.
    async fn process_items(&self, items: &[InventoryItem]) -> Vec<PriceRecommendation> {
        let futures = items.iter().cloned().map(|item| {
            let cache = Arc::clone(&self.cache);
            let adjuster = self.adjusters.get(&item.card_type).cloned();
            let assigner = Arc::clone(&self.assigner);
            let experiment = self.config.experiment_name.clone();

            async move {
                let Some(adjuster) = adjuster else {
                    debug!(
                        item_id = %item.id,
                        card_type = %item.card_type,
                        "No model for card type, skipping item"
                    );
                    return None;
                };

                let prices = cache.get(&item.id, &item.brand).await;
                let rec = match adjuster.adjust(&item, &prices, Utc::now()) {
                    Ok(rec) => rec,
                    Err(e) => {
                        warn!(
                            item_id = %item.id,
                            error = %e,
                            "Item adjustment failed, price carries forward"
                        );
                        return None;
                    }
                };

                let final_price = assigner.select_price(
                    &experiment,
                    &item.id,
                    rec.new_price,
                    item.current_price,
                );
                if final_price == rec.new_price {
                    Some(rec)
                } else {
                    Some(rec.with_new_price(final_price))
                }
            }
        });

        stream::iter(futures)
            .buffer_unordered(self.config.max_concurrent_items)
            .filter_map(|rec| async move { rec })
            .collect()
            .await
    }

    /// Sleep that yields early when shutdown is requested.
    async fn sleep_interruptible(&self, duration: Duration) {
        let mut signal = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = signal.wait() => {
                debug!("Sleep interrupted by shutdown signal");
            }
        }
    }
}
