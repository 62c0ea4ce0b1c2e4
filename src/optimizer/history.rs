//! Append-only JSONL price history.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// One audited price decision.
///
/// Records are append-only: once written they are never altered. The JSONL
/// history is the audit trail consumed by the external dashboard generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceRecommendation {
    pub item_id: String,
    pub old_price: f64,
    pub new_price: f64,
    pub change_pct: f64,
    pub timestamp: DateTime<Utc>,
}

impl PriceRecommendation {
    pub fn new(item_id: impl Into<String>, old_price: f64, new_price: f64, at: DateTime<Utc>) -> Self {
        let change_pct = if old_price != 0.0 {
            (new_price - old_price) / old_price * 100.0
        } else {
            0.0
        };
        Self {
            item_id: item_id.into(),
            old_price,
            new_price,
            change_pct,
            timestamp: at,
        }
    }

    /// Replace the recommended price, recomputing the change percentage.
    /// Used when the experiment routes an item to the baseline price.
    pub fn with_new_price(&self, new_price: f64) -> Self {
        Self::new(self.item_id.clone(), self.old_price, new_price, self.timestamp)
    }
}

/// JSONL writer for the price history, one record per line.
///
/// Opened in append mode for crash safety. The engine owns the single
/// instance, so writes are serialized by construction and interleaving
/// cannot corrupt the log.
pub struct PriceHistoryLogger {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl PriceHistoryLogger {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::persistence(format!("{}: {e}", parent.display())))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::persistence(format!("{}: {e}", path.display())))?;
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Append one recommendation as a JSONL line.
    pub fn append(&mut self, rec: &PriceRecommendation) -> Result<()> {
        let json = serde_json::to_string(rec)?;
        writeln!(self.writer, "{json}")
            .map_err(|e| Error::persistence(format!("{}: {e}", self.path.display())))
    }

    /// Flush buffered records to disk. Called once per cycle.
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::persistence(format!("{}: {e}", self.path.display())))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
