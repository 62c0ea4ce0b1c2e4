use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the repricing engine.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Transient market-data failure (network, timeout, missing brand).
    /// Absorbed by the competitor price cache fallback chain; callers above
    /// the cache should never observe this variant.
    #[error("market data fetch failed: {0}")]
    Fetch(String),

    /// Pricing model inference failed for a single item.
    /// Per-item: the item is skipped for the cycle, the loop continues.
    #[error("model inference failed for {item_id}: {message}")]
    ModelInference { item_id: String, message: String },

    /// Invalid or missing startup configuration. Fatal before the loop starts.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// History or snapshot write failure. The cycle is marked degraded but
    /// continues.
    #[error("persistence failed: {0}")]
    Persistence(String),

    /// Inventory snapshot unavailable or malformed. Cycle-level failure.
    #[error("inventory snapshot failed: {0}")]
    Inventory(String),

    /// Serialization or deserialization failure.
    #[error("parse error: {0}")]
    Parse(String),
}

// Convenience constructors for common error patterns
impl Error {
    /// Create a transient fetch error
    pub fn fetch(msg: impl Into<String>) -> Self {
        Error::Fetch(msg.into())
    }

    /// Create a per-item model inference error
    pub fn model_inference(item_id: impl Into<String>, msg: impl Into<String>) -> Self {
        Error::ModelInference {
            item_id: item_id.into(),
            message: msg.into(),
        }
    }

    /// Create a fatal configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Error::Persistence(msg.into())
    }

    /// Create an inventory snapshot error
    pub fn inventory(msg: impl Into<String>) -> Self {
        Error::Inventory(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
