//! Inventory snapshots consumed by the repricing cycle.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One sellable gift card listing.
///
/// Immutable per-cycle snapshot sourced externally; the engine never mutates
/// inventory, it only proposes new prices for it.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InventoryItem {
    /// Unique listing id (e.g. "Netflix-4821").
    pub id: String,
    /// Card category the pricing model is keyed by (e.g. "Netflix").
    pub card_type: String,
    /// Face value of the card in USD.
    pub face_value: f64,
    /// Price currently advertised for the card.
    pub current_price: f64,
    /// Brand used to look up competitor quotes.
    pub brand: String,
}

/// Source of the per-cycle inventory snapshot.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Return the current inventory. Called once at the start of each cycle.
    async fn snapshot(&self) -> Result<Vec<InventoryItem>>;
}

/// Inventory provider backed by a JSON file re-read every cycle.
///
/// The file holds a JSON array of [`InventoryItem`] records and is maintained
/// by the external listing system.
pub struct JsonInventory {
    path: PathBuf,
}

impl JsonInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventoryProvider for JsonInventory {
    async fn snapshot(&self) -> Result<Vec<InventoryItem>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::inventory(format!("{}: {e}", self.path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::inventory(format!("{}: {e}", self.path.display())))
    }
}

/// Fixed in-memory inventory, used by paper mode and tests.
pub struct StaticInventory {
    items: Vec<InventoryItem>,
}

impl StaticInventory {
    pub fn new(items: Vec<InventoryItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn snapshot(&self) -> Result<Vec<InventoryItem>> {
        Ok(self.items.clone())
    }
}
