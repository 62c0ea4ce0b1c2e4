//! Repricing engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the repricing engine.
///
/// Loaded once per process lifetime from TOML (with CLI overrides) and
/// validated before the optimization loop starts. All thresholds are
/// read-only afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Lower sale-price bound as a fraction of face value.
    #[serde(default = "default_min_price_ratio")]
    pub min_price_ratio: f64,

    /// Upper sale-price bound as a fraction of face value.
    #[serde(default = "default_max_price_ratio")]
    pub max_price_ratio: f64,

    /// Maximum per-cycle price movement as a fraction of the current price.
    /// Bounds volatility: one cycle can never move a price by more than this.
    #[serde(default = "default_max_adjustment_percentage")]
    pub max_adjustment_percentage: f64,

    /// Freshness window for cached competitor quotes, in seconds.
    #[serde(default = "default_competitor_cache_ttl_secs")]
    pub competitor_cache_ttl_secs: u64,

    /// Prices returned when a live fetch fails and no cache entry exists.
    /// Must be non-empty; the cache never yields an empty price list.
    #[serde(default = "default_competitor_prices")]
    pub default_competitor_prices: Vec<f64>,

    /// Timeout for a single market-data call, in seconds.
    /// A slow source is treated as a fetch failure, not a hang.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    /// Minutes between repricing cycles.
    #[serde(default = "default_update_interval_minutes")]
    pub update_interval_minutes: u64,

    /// Hours between dashboard snapshot refreshes.
    #[serde(default = "default_dashboard_update_interval_hours")]
    pub dashboard_update_interval_hours: u64,

    /// Fixed backoff after a failed cycle, in seconds.
    #[serde(default = "default_cycle_backoff_secs")]
    pub cycle_backoff_secs: u64,

    /// Bound on concurrently processed items within a cycle.
    #[serde(default = "default_max_concurrent_items")]
    pub max_concurrent_items: usize,

    /// Name of the active price experiment.
    #[serde(default = "default_experiment_name")]
    pub experiment_name: String,

    /// Days after which the experiment stops accepting new outcome samples.
    #[serde(default = "default_experiment_duration_days")]
    pub experiment_duration_days: u64,
}

fn default_min_price_ratio() -> f64 {
    0.7
}

fn default_max_price_ratio() -> f64 {
    1.2
}

fn default_max_adjustment_percentage() -> f64 {
    0.05
}

fn default_competitor_cache_ttl_secs() -> u64 {
    3600
}

fn default_competitor_prices() -> Vec<f64> {
    vec![48.50, 49.99, 47.95]
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

fn default_update_interval_minutes() -> u64 {
    15
}

fn default_dashboard_update_interval_hours() -> u64 {
    6
}

fn default_cycle_backoff_secs() -> u64 {
    60
}

fn default_max_concurrent_items() -> usize {
    8
}

fn default_experiment_name() -> String {
    "price_optimization_v1".to_string()
}

fn default_experiment_duration_days() -> u64 {
    14
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            min_price_ratio: default_min_price_ratio(),
            max_price_ratio: default_max_price_ratio(),
            max_adjustment_percentage: default_max_adjustment_percentage(),
            competitor_cache_ttl_secs: default_competitor_cache_ttl_secs(),
            default_competitor_prices: default_competitor_prices(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            update_interval_minutes: default_update_interval_minutes(),
            dashboard_update_interval_hours: default_dashboard_update_interval_hours(),
            cycle_backoff_secs: default_cycle_backoff_secs(),
            max_concurrent_items: default_max_concurrent_items(),
            experiment_name: default_experiment_name(),
            experiment_duration_days: default_experiment_duration_days(),
        }
    }
}

impl PricingConfig {
    /// Validate invariants that would cause runtime panics or nonsensical
    /// pricing. Must be called before constructing the engine. Returns a
    /// descriptive error for the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        if self.min_price_ratio <= 0.0 {
            return Err(format!(
                "min_price_ratio must be > 0.0, got {}",
                self.min_price_ratio
            ));
        }
        if self.max_price_ratio <= self.min_price_ratio {
            return Err(format!(
                "max_price_ratio must be > min_price_ratio ({} <= {})",
                self.max_price_ratio, self.min_price_ratio
            ));
        }
        if self.max_adjustment_percentage <= 0.0 || self.max_adjustment_percentage >= 1.0 {
            return Err(format!(
                "max_adjustment_percentage must be in (0.0, 1.0), got {}",
                self.max_adjustment_percentage
            ));
        }
        if self.default_competitor_prices.is_empty() {
            return Err("default_competitor_prices must not be empty".to_string());
        }
        if let Some(p) = self
            .default_competitor_prices
            .iter()
            .find(|p| !p.is_finite() || **p <= 0.0)
        {
            return Err(format!(
                "default_competitor_prices must all be positive and finite, got {p}"
            ));
        }
        if self.update_interval_minutes == 0 {
            return Err("update_interval_minutes must be > 0".to_string());
        }
        if self.max_concurrent_items == 0 {
            return Err("max_concurrent_items must be > 0".to_string());
        }
        if self.experiment_name.is_empty() {
            return Err("experiment_name must not be empty".to_string());
        }
        Ok(())
    }

    /// Cache TTL as a [`Duration`].
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.competitor_cache_ttl_secs)
    }

    /// Market-data call timeout as a [`Duration`].
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Inter-cycle sleep as a [`Duration`].
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_minutes * 60)
    }

    /// Dashboard refresh interval as a [`Duration`].
    pub fn dashboard_interval(&self) -> Duration {
        Duration::from_secs(self.dashboard_update_interval_hours * 3600)
    }

    /// Post-failure backoff as a [`Duration`].
    pub fn cycle_backoff(&self) -> Duration {
        Duration::from_secs(self.cycle_backoff_secs)
    }

    /// Experiment sample-acceptance window as a [`Duration`].
    pub fn experiment_duration(&self) -> Duration {
        Duration::from_secs(self.experiment_duration_days * 24 * 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PricingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_price_ratio, 0.7);
        assert_eq!(config.max_price_ratio, 1.2);
        assert_eq!(config.default_competitor_prices, vec![48.50, 49.99, 47.95]);
    }

    #[test]
    fn test_validate_rejects_inverted_ratios() {
        let config = PricingConfig {
            min_price_ratio: 1.2,
            max_price_ratio: 0.7,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_adjustment() {
        let config = PricingConfig {
            max_adjustment_percentage: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_defaults() {
        let config = PricingConfig {
            default_competitor_prices: vec![],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_nonpositive_default_price() {
        let config = PricingConfig {
            default_competitor_prices: vec![48.50, -1.0],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip_with_defaults() {
        let parsed: PricingConfig = toml::from_str("min_price_ratio = 0.8").unwrap();
        assert_eq!(parsed.min_price_ratio, 0.8);
        assert_eq!(parsed.max_price_ratio, 1.2);
        assert_eq!(parsed.experiment_name, "price_optimization_v1");
    }

    #[test]
    fn test_durations() {
        let config = PricingConfig::default();
        assert_eq!(config.update_interval(), Duration::from_secs(15 * 60));
        assert_eq!(config.dashboard_interval(), Duration::from_secs(6 * 3600));
        assert_eq!(config.fetch_timeout(), Duration::from_secs(5));
    }
}
