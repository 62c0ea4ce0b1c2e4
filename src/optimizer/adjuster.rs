//! Bounded, rate-limited price adjustment.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::{Error, Result};

use super::features::PriceFeatures;
use super::history::PriceRecommendation;
use super::inventory::InventoryItem;
use super::model::PricingModel;

/// Business bounds applied to every model prediction.
#[derive(Debug, Clone, Copy)]
pub struct PriceLimits {
    /// Lower bound as a fraction of face value.
    pub min_price_ratio: f64,
    /// Upper bound as a fraction of face value.
    pub max_price_ratio: f64,
    /// Largest allowed per-cycle move as a fraction of the current price.
    pub max_adjustment_percentage: f64,
}

/// Turns model predictions into bounded price recommendations.
///
/// Pipeline: assemble features, predict, clamp to the face-value band,
/// rate-limit against the current price, apply psychological rounding.
/// One adjuster is built per card category, owning that category's model.
pub struct PriceAdjuster {
    model: Arc<dyn PricingModel>,
    limits: PriceLimits,
}

impl PriceAdjuster {
    pub fn new(model: Arc<dyn PricingModel>, limits: PriceLimits) -> Self {
        Self { model, limits }
    }

    /// Compute a bounded recommendation for one item.
    ///
    /// `competitor_prices` must be non-empty (the cache guarantees this).
    /// Model failures surface as [`Error::ModelInference`]; the caller treats
    /// them as per-item failures.
    pub fn adjust(
        &self,
        item: &InventoryItem,
        competitor_prices: &[f64],
        at: DateTime<Utc>,
    ) -> Result<PriceRecommendation> {
        if !(item.face_value > 0.0) || !(item.current_price > 0.0) {
            return Err(Error::inventory(format!(
                "item {} has non-positive face_value={} or current_price={}",
                item.id, item.face_value, item.current_price
            )));
        }

        let features = PriceFeatures::assemble(item.face_value, competitor_prices, at);
        let raw = self.model.predict(&features).map_err(|e| match e {
            Error::ModelInference { message, .. } => Error::model_inference(&item.id, message),
            other => other,
        })?;

        let clamped = self.clamp(raw, item.face_value);
        let limited = self.rate_limit(clamped, item.current_price);
        let rounded = apply_price_psychology(limited);

        debug!(
            item_id = %item.id,
            raw = %format!("{raw:.4}"),
            clamped = %format!("{clamped:.4}"),
            limited = %format!("{limited:.4}"),
            rounded = %format!("{rounded:.2}"),
            "Price adjustment pipeline"
        );

        Ok(PriceRecommendation::new(
            item.id.clone(),
            item.current_price,
            rounded,
            at,
        ))
    }

    /// Clamp a raw prediction into the allowed face-value band.
    fn clamp(&self, price: f64, face_value: f64) -> f64 {
        let lo = face_value * self.limits.min_price_ratio;
        let hi = face_value * self.limits.max_price_ratio;
        price.clamp(lo, hi)
    }

    /// Move from the current price toward the target by at most the
    /// per-cycle cap. Linear cap, not exponential smoothing: large target
    /// gaps close at a constant rate per cycle.
    fn rate_limit(&self, target: f64, current_price: f64) -> f64 {
        let max_delta = current_price * self.limits.max_adjustment_percentage;
        let delta = target - current_price;
        if delta.abs() > max_delta {
            current_price + max_delta * delta.signum()
        } else {
            target
        }
    }
}

/// Psychological price point: just below the next round number.
///
/// Applied after clamping, so a price sitting exactly on the lower bound can
/// end up to one cent below it. That is accepted rather than re-clamped; the
/// clamp invariant is defined on the pre-rounding value.
fn apply_price_psychology(price: f64) -> f64 {
    if price >= 10.0 {
        price.floor() - 0.01
    } else {
        (price * 10.0).floor() / 10.0 - 0.01
    }
}
