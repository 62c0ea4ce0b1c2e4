//! Feature assembly for the pricing model.

use chrono::{DateTime, Datelike, Utc};

/// Feature names in the order models consume them.
///
/// Model metadata declares this ordering explicitly; the registry rejects
/// models trained against a different layout.
pub const FEATURE_ORDER: [&str; 6] = [
    "face_value",
    "competitor_avg_price",
    "competitor_min_price",
    "day_of_week",
    "month",
    "is_weekend",
];

/// Inputs to one price prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFeatures {
    pub face_value: f64,
    pub competitor_avg_price: f64,
    pub competitor_min_price: f64,
    /// Monday = 0 .. Sunday = 6.
    pub day_of_week: u32,
    /// January = 1 .. December = 12.
    pub month: u32,
    pub is_weekend: bool,
}

impl PriceFeatures {
    /// Assemble features from an item's face value, its competitor quote and
    /// a point in time. Calendar attributes derive from `at` so predictions
    /// are reproducible in tests.
    pub fn assemble(face_value: f64, competitor_prices: &[f64], at: DateTime<Utc>) -> Self {
        debug_assert!(!competitor_prices.is_empty());
        let competitor_avg_price =
            competitor_prices.iter().sum::<f64>() / competitor_prices.len() as f64;
        let competitor_min_price = competitor_prices
            .iter()
            .copied()
            .fold(f64::INFINITY, f64::min);

        let day_of_week = at.weekday().num_days_from_monday();
        Self {
            face_value,
            competitor_avg_price,
            competitor_min_price,
            day_of_week,
            month: at.month(),
            is_weekend: day_of_week >= 5,
        }
    }

    /// Dense vector view in [`FEATURE_ORDER`] order.
    pub fn as_vector(&self) -> [f64; 6] {
        [
            self.face_value,
            self.competitor_avg_price,
            self.competitor_min_price,
            self.day_of_week as f64,
            self.month as f64,
            if self.is_weekend { 1.0 } else { 0.0 },
        ]
    }
}
