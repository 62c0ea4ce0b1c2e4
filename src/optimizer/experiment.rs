//! Deterministic experiment assignment and significance analysis.
//!
//! Items are split into control and test buckets by a fixed, documented hash
//! so assignment survives restarts and is identical across processes. Outcome
//! samples accumulate per bucket and are compared with an unequal-variance
//! t-test.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Experiment bucket an item is assigned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    /// Baseline pricing.
    Control,
    /// Model-driven pricing.
    Test,
}

/// One recorded sale outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSample {
    pub price: f64,
    pub revenue: f64,
    pub profit: f64,
    pub timestamp: DateTime<Utc>,
}

/// Analysis snapshot for one experiment.
///
/// The statistical fields are present only when both buckets hold samples;
/// an empty bucket yields counts and sums but no p-value or lift.
#[derive(Debug, Clone, Serialize)]
pub struct ExperimentStats {
    pub experiment: String,
    pub control_count: usize,
    pub test_count: usize,
    pub control_revenue: f64,
    pub test_revenue: f64,
    pub control_profit: f64,
    pub test_profit: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_significant: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lift_pct: Option<f64>,
}

#[derive(Debug)]
struct ExperimentState {
    started_at: Instant,
    control: Vec<ExperimentSample>,
    test: Vec<ExperimentSample>,
}

impl ExperimentState {
    fn new() -> Self {
        Self {
            started_at: Instant::now(),
            control: Vec::new(),
            test: Vec::new(),
        }
    }
}

/// Assignment, outcome accumulation and analysis for named experiments.
///
/// Owned by the engine and shared by reference with the item workers; the
/// sample store sits behind a mutex so concurrent appends are safe.
pub struct ExperimentAssigner {
    experiments: Mutex<HashMap<String, ExperimentState>>,
    /// Window after which an experiment stops accepting new samples.
    duration: Duration,
}

impl ExperimentAssigner {
    pub fn new(duration: Duration) -> Self {
        Self {
            experiments: Mutex::new(HashMap::new()),
            duration,
        }
    }

    /// Assign an item to a bucket.
    ///
    /// Pure function of the inputs: the bucket is the parity of an FNV-1a
    /// 64-bit hash over the UTF-8 bytes of `"{experiment}_{item_id}"`. No
    /// dependence on wall clock, call order or process identity, so repeated
    /// calls and restarts always agree.
    pub fn assign(experiment: &str, item_id: &str) -> Bucket {
        let mut hash = fnv1a_64(experiment.as_bytes());
        hash = fnv1a_64_continue(hash, b"_");
        hash = fnv1a_64_continue(hash, item_id.as_bytes());
        if hash % 2 == 0 {
            Bucket::Test
        } else {
            Bucket::Control
        }
    }

    /// Route an item to its bucket's price: the model candidate for test,
    /// the baseline for control.
    pub fn select_price(
        &self,
        experiment: &str,
        item_id: &str,
        candidate_price: f64,
        baseline_price: f64,
    ) -> f64 {
        match Self::assign(experiment, item_id) {
            Bucket::Test => candidate_price,
            Bucket::Control => baseline_price,
        }
    }

    /// Record a sale outcome into the item's bucket.
    ///
    /// Not idempotent: two calls for the same sale record two samples.
    /// Outcomes arriving after the experiment window closes are dropped.
    pub fn record_outcome(
        &self,
        experiment: &str,
        item_id: &str,
        price: f64,
        revenue: f64,
        profit: f64,
    ) {
        let bucket = Self::assign(experiment, item_id);
        let mut experiments = self.experiments.lock().unwrap();
        let state = experiments
            .entry(experiment.to_string())
            .or_insert_with(ExperimentState::new);

        if state.started_at.elapsed() >= self.duration {
            debug!(
                experiment,
                item_id, "Experiment window closed, dropping outcome sample"
            );
            return;
        }

        let sample = ExperimentSample {
            price,
            revenue,
            profit,
            timestamp: Utc::now(),
        };
        match bucket {
            Bucket::Control => state.control.push(sample),
            Bucket::Test => state.test.push(sample),
        }
    }

    /// Analyze an experiment's accumulated outcomes.
    ///
    /// Counts and sums are always present. The p-value (two-sided Welch
    /// t-test on per-sample profit), significance flag (p < 0.05) and lift
    /// require both buckets to be non-empty; lift additionally requires a
    /// non-zero control mean.
    pub fn analyze(&self, experiment: &str) -> ExperimentStats {
        let experiments = self.experiments.lock().unwrap();
        let (control, test): (&[ExperimentSample], &[ExperimentSample]) =
            match experiments.get(experiment) {
                Some(state) => (state.control.as_slice(), state.test.as_slice()),
                None => (&[], &[]),
            };

        let control_profits: Vec<f64> = control.iter().map(|s| s.profit).collect();
        let test_profits: Vec<f64> = test.iter().map(|s| s.profit).collect();

        let mut stats = ExperimentStats {
            experiment: experiment.to_string(),
            control_count: control.len(),
            test_count: test.len(),
            control_revenue: control.iter().map(|s| s.revenue).sum(),
            test_revenue: test.iter().map(|s| s.revenue).sum(),
            control_profit: control_profits.iter().sum(),
            test_profit: test_profits.iter().sum(),
            p_value: None,
            is_significant: None,
            lift_pct: None,
        };

        if !control.is_empty() && !test.is_empty() {
            let p = welch_p_value(&test_profits, &control_profits);
            stats.p_value = Some(p);
            stats.is_significant = Some(p < 0.05);

            let control_mean = mean(&control_profits);
            if control_mean.abs() > 1e-12 {
                stats.lift_pct = Some((mean(&test_profits) / control_mean - 1.0) * 100.0);
            }
        }

        stats
    }
}

// === Assignment hash ===

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a 64-bit over a byte slice.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    fnv1a_64_continue(FNV_OFFSET_BASIS, bytes)
}

/// Continue an FNV-1a 64-bit hash with more bytes.
fn fnv1a_64_continue(mut hash: u64, bytes: &[u8]) -> u64 {
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// === Significance testing ===

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Unbiased sample variance; zero when fewer than two samples.
fn sample_variance(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let m = mean(samples);
    samples.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (samples.len() - 1) as f64
}

/// Two-sided p-value of the unequal-variance (Welch) t-test.
///
/// The tail probability uses the erf-based normal approximation; for the
/// sample counts an experiment accumulates the difference from the exact t
/// distribution is negligible.
fn welch_p_value(a: &[f64], b: &[f64]) -> f64 {
    let se = (sample_variance(a) / a.len() as f64 + sample_variance(b) / b.len() as f64).sqrt();
    let diff = mean(a) - mean(b);
    if se < 1e-12 {
        return if diff.abs() < 1e-12 { 1.0 } else { 0.0 };
    }
    let t = diff / se;
    2.0 * (1.0 - normal_cdf(t.abs()))
}

/// Normal CDF via the error function.
fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Abramowitz and Stegun error function approximation.
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0
        - (a1 * t + a2 * t.powi(2) + a3 * t.powi(3) + a4 * t.powi(4) + a5 * t.powi(5))
            * (-x * x).exp();

    sign * y
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assigner() -> ExperimentAssigner {
        ExperimentAssigner::new(Duration::from_secs(14 * 24 * 3600))
    }

    #[test]
    fn test_assignment_deterministic() {
        for id in ["A1", "B2", "item-37", ""] {
            let first = ExperimentAssigner::assign("exp1", id);
            for _ in 0..10 {
                assert_eq!(ExperimentAssigner::assign("exp1", id), first);
            }
        }
    }

    #[test]
    fn test_assignment_matches_documented_hash() {
        // Independent recomputation of FNV-1a over "exp1_A1".
        let mut hash: u64 = 0xcbf29ce484222325;
        for &b in b"exp1_A1" {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        let expected = if hash % 2 == 0 {
            Bucket::Test
        } else {
            Bucket::Control
        };
        assert_eq!(ExperimentAssigner::assign("exp1", "A1"), expected);
    }

    #[test]
    fn test_assignment_varies_with_experiment_name() {
        // The split must not collapse to one bucket when the experiment
        // name changes; over many ids both buckets appear.
        let mut differs = false;
        for i in 0..100 {
            let id = format!("item-{i}");
            if ExperimentAssigner::assign("exp1", &id)
                != ExperimentAssigner::assign("exp2", &id)
            {
                differs = true;
                break;
            }
        }
        assert!(differs);
    }

    #[test]
    fn test_assignment_balance() {
        let test_count = (0..10_000)
            .filter(|i| {
                ExperimentAssigner::assign("balance_check", &format!("item-{i}")) == Bucket::Test
            })
            .count();
        let fraction = test_count as f64 / 10_000.0;
        assert!(
            (0.45..=0.55).contains(&fraction),
            "test fraction {fraction} outside expected range"
        );
    }

    #[test]
    fn test_select_price_routes_by_bucket() {
        let assigner = assigner();
        // Find one id per bucket.
        let mut test_id = None;
        let mut control_id = None;
        for i in 0..100 {
            let id = format!("item-{i}");
            match ExperimentAssigner::assign("exp1", &id) {
                Bucket::Test if test_id.is_none() => test_id = Some(id),
                Bucket::Control if control_id.is_none() => control_id = Some(id),
                _ => {}
            }
        }
        let test_id = test_id.unwrap();
        let control_id = control_id.unwrap();

        assert_eq!(assigner.select_price("exp1", &test_id, 44.99, 48.0), 44.99);
        assert_eq!(assigner.select_price("exp1", &control_id, 44.99, 48.0), 48.0);
    }

    #[test]
    fn test_record_outcome_not_idempotent() {
        let assigner = assigner();
        assigner.record_outcome("exp1", "A1", 44.99, 44.99, 4.5);
        assigner.record_outcome("exp1", "A1", 44.99, 44.99, 4.5);
        let stats = assigner.analyze("exp1");
        assert_eq!(stats.control_count + stats.test_count, 2);
    }

    #[test]
    fn test_analyze_unknown_experiment() {
        let stats = assigner().analyze("never_started");
        assert_eq!(stats.control_count, 0);
        assert_eq!(stats.test_count, 0);
        assert!(stats.p_value.is_none());
        assert!(stats.lift_pct.is_none());
    }

    #[test]
    fn test_analyze_empty_bucket_omits_statistics() {
        let assigner = assigner();
        // Fill only one bucket.
        let mut recorded = 0;
        for i in 0..100 {
            let id = format!("item-{i}");
            if ExperimentAssigner::assign("exp1", &id) == Bucket::Test {
                assigner.record_outcome("exp1", &id, 45.0, 45.0, 4.0);
                recorded += 1;
            }
        }
        assert!(recorded > 0);

        let stats = assigner.analyze("exp1");
        assert_eq!(stats.control_count, 0);
        assert!(stats.test_count > 0);
        assert!(stats.p_value.is_none());
        assert!(stats.is_significant.is_none());
        assert!(stats.lift_pct.is_none());
    }

    #[test]
    fn test_analyze_sums_and_lift() {
        let assigner = assigner();
        let mut test_ids = Vec::new();
        let mut control_ids = Vec::new();
        for i in 0..200 {
            let id = format!("item-{i}");
            match ExperimentAssigner::assign("exp1", &id) {
                Bucket::Test => test_ids.push(id),
                Bucket::Control => control_ids.push(id),
            }
        }

        // Control profits around 4.0, test around 5.0 with slight spread so
        // variances are non-zero.
        for (i, id) in control_ids.iter().take(30).enumerate() {
            assigner.record_outcome("exp1", id, 48.0, 48.0, 4.0 + 0.01 * i as f64);
        }
        for (i, id) in test_ids.iter().take(30).enumerate() {
            assigner.record_outcome("exp1", id, 45.0, 45.0, 5.0 + 0.01 * i as f64);
        }

        let stats = assigner.analyze("exp1");
        assert_eq!(stats.control_count, 30);
        assert_eq!(stats.test_count, 30);

        let p = stats.p_value.unwrap();
        assert!(p < 0.05, "clearly separated buckets should be significant, p={p}");
        assert_eq!(stats.is_significant, Some(true));

        // Lift around +25% (5.145/4.145 - 1, using the shifted means).
        let lift = stats.lift_pct.unwrap();
        assert!(lift > 20.0 && lift < 30.0, "unexpected lift {lift}");
    }

    #[test]
    fn test_identical_buckets_not_significant() {
        let assigner = assigner();
        for i in 0..200 {
            let id = format!("item-{i}");
            // Identical constant profit in both buckets.
            assigner.record_outcome("exp1", &id, 45.0, 45.0, 4.2);
        }
        let stats = assigner.analyze("exp1");
        assert!(stats.control_count > 0 && stats.test_count > 0);
        assert_eq!(stats.is_significant, Some(false));
    }

    #[test]
    fn test_expired_experiment_drops_samples() {
        let assigner = ExperimentAssigner::new(Duration::from_secs(0));
        assigner.record_outcome("exp1", "A1", 45.0, 45.0, 4.0);
        let stats = assigner.analyze("exp1");
        assert_eq!(stats.control_count + stats.test_count, 0);
    }

    #[test]
    fn test_normal_cdf_known_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 0.01);
        assert!(normal_cdf(3.0) > 0.99);
        assert!(normal_cdf(-3.0) < 0.01);
    }

    #[test]
    fn test_welch_p_value_symmetry() {
        let a = [1.0, 1.1, 0.9, 1.05, 0.95];
        let b = [2.0, 2.1, 1.9, 2.05, 1.95];
        let p1 = welch_p_value(&a, &b);
        let p2 = welch_p_value(&b, &a);
        assert!((p1 - p2).abs() < 1e-12);
        assert!(p1 < 0.05);
    }
}
