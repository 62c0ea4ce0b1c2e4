//! Pricing model seam and the metadata-driven model registry.
//!
//! Model training and selection happen in an external pipeline which emits a
//! metadata file mapping each card category to trained coefficients and the
//! feature ordering they were fit against. This module only loads and
//! evaluates those artifacts.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::{Error, Result};

use super::features::{PriceFeatures, FEATURE_ORDER};

/// A trained price-prediction function.
pub trait PricingModel: Send + Sync {
    /// Predict the revenue-optimal sale price for one feature vector.
    ///
    /// A non-finite prediction is an inference failure, not a price.
    fn predict(&self, features: &PriceFeatures) -> Result<f64>;
}

/// Linear model evaluated over [`FEATURE_ORDER`].
#[derive(Debug, Clone)]
pub struct LinearModel {
    weights: [f64; 6],
    bias: f64,
}

impl LinearModel {
    pub fn new(weights: [f64; 6], bias: f64) -> Self {
        Self { weights, bias }
    }
}

impl PricingModel for LinearModel {
    fn predict(&self, features: &PriceFeatures) -> Result<f64> {
        let v = features.as_vector();
        let price = self
            .weights
            .iter()
            .zip(v.iter())
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.bias;

        if !price.is_finite() {
            return Err(Error::model_inference(
                "<features>",
                format!("non-finite prediction {price}"),
            ));
        }
        Ok(price)
    }
}

/// One entry of the training pipeline's metadata file.
#[derive(Debug, Clone, Deserialize)]
struct ModelMetadata {
    /// Feature names in the order the coefficients were fit against.
    features: Vec<String>,
    weights: Vec<f64>,
    bias: f64,
}

/// Per-category registry of trained models.
pub struct ModelRegistry {
    models: HashMap<String, LinearModel>,
}

impl ModelRegistry {
    /// Load the registry from metadata JSON keyed by card category:
    ///
    /// ```json
    /// { "Netflix": { "features": [...], "weights": [...], "bias": 1.25 } }
    /// ```
    ///
    /// A model whose declared feature ordering differs from [`FEATURE_ORDER`]
    /// is a configuration error: evaluating it would silently misalign
    /// coefficients.
    pub fn from_json(raw: &str) -> Result<Self> {
        let metadata: HashMap<String, ModelMetadata> =
            serde_json::from_str(raw).map_err(|e| Error::config(format!("model metadata: {e}")))?;

        let mut models = HashMap::new();
        for (card_type, meta) in metadata {
            if meta.features != FEATURE_ORDER {
                return Err(Error::config(format!(
                    "model '{card_type}' feature order {:?} does not match expected {:?}",
                    meta.features, FEATURE_ORDER
                )));
            }
            let weights: [f64; 6] = meta.weights.as_slice().try_into().map_err(|_| {
                Error::config(format!(
                    "model '{card_type}' has {} weights, expected {}",
                    meta.weights.len(),
                    FEATURE_ORDER.len()
                ))
            })?;
            models.insert(card_type, LinearModel::new(weights, meta.bias));
        }
        Ok(Self { models })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Build a registry from already constructed models.
    pub fn from_models(models: HashMap<String, LinearModel>) -> Self {
        Self { models }
    }

    /// Model for a card category, if one was trained.
    pub fn get(&self, card_type: &str) -> Option<&LinearModel> {
        self.models.get(card_type)
    }

    /// Consume the registry, yielding the per-category models.
    pub fn into_models(self) -> HashMap<String, LinearModel> {
        self.models
    }

    /// Categories covered by this registry.
    pub fn card_types(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
