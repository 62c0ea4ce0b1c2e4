//! Interval-gated dashboard snapshot.
//!
//! The engine does not render anything; it periodically writes a JSON
//! summary that the external dashboard generator picks up.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::errors::{Error, Result};

use super::experiment::ExperimentStats;

/// Aggregate snapshot handed to the external dashboard generator.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    pub generated_at: DateTime<Utc>,
    pub cycles_completed: u64,
    pub items_repriced: u64,
    /// Mean price change of the most recent cycle, in percent.
    pub last_cycle_avg_change_pct: f64,
    pub experiment: ExperimentStats,
}

/// Writes the dashboard summary when the refresh interval has elapsed.
pub struct DashboardWriter {
    path: PathBuf,
    interval: Duration,
    last_refresh: Option<Instant>,
}

impl DashboardWriter {
    pub fn new(path: impl Into<PathBuf>, interval: Duration) -> Self {
        Self {
            path: path.into(),
            interval,
            last_refresh: None,
        }
    }

    /// Write the summary if due. Returns whether a refresh happened.
    ///
    /// The first call always refreshes; afterwards refreshes are gated on
    /// the configured interval.
    pub fn maybe_refresh(&mut self, summary: &DashboardSummary) -> Result<bool> {
        if let Some(last) = self.last_refresh {
            if last.elapsed() < self.interval {
                return Ok(false);
            }
        }
        self.write(summary)?;
        self.last_refresh = Some(Instant::now());
        info!(path = %self.path.display(), "Dashboard summary refreshed");
        Ok(true)
    }

    fn write(&self, summary: &DashboardSummary) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::persistence(format!("{}: {e}", parent.display())))?;
        }
        let json = serde_json::to_string_pretty(summary)?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::persistence(format!("{}: {e}", self.path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> DashboardSummary {
        DashboardSummary {
            generated_at: Utc::now(),
            cycles_completed: 3,
            items_repriced: 42,
            last_cycle_avg_change_pct: -0.8,
            experiment: ExperimentStats {
                experiment: "price_optimization_v1".to_string(),
                control_count: 10,
                test_count: 12,
                control_revenue: 480.0,
                test_revenue: 540.0,
                control_profit: 40.0,
                test_profit: 55.0,
                p_value: Some(0.03),
                is_significant: Some(true),
                lift_pct: Some(14.5),
            },
        }
    }

    fn test_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "dashboard_test_{}_{name}.json",
            std::process::id()
        ))
    }

    #[test]
    fn test_first_refresh_always_writes() {
        let path = test_path("first");
        let mut writer = DashboardWriter::new(&path, Duration::from_secs(3600));

        assert!(writer.maybe_refresh(&summary()).unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["items_repriced"], 42);
        assert_eq!(parsed["experiment"]["p_value"], 0.03);

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_refresh_gated_on_interval() {
        let path = test_path("gated");
        let mut writer = DashboardWriter::new(&path, Duration::from_secs(3600));

        assert!(writer.maybe_refresh(&summary()).unwrap());
        assert!(!writer.maybe_refresh(&summary()).unwrap());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_zero_interval_always_refreshes() {
        let path = test_path("zero_interval");
        let mut writer = DashboardWriter::new(&path, Duration::from_secs(0));

        assert!(writer.maybe_refresh(&summary()).unwrap());
        assert!(writer.maybe_refresh(&summary()).unwrap());

        let _ = std::fs::remove_file(&path);
    }
}
