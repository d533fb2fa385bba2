//! # Storage Module - Trade Commit Persistence
//!
//! The trade commit step ends by writing both participants' inventory and
//! gold plus an audit [`TradeReceipt`] under one commit boundary. The trade
//! layer only sees the [`TradeJournalStore`] trait; [`TradeStore`] implements
//! it on sled.
//!
//! ```text
//! data/
//! └── trades.sled/
//!     ├── players   ← players:<actor id>  → PlayerRecord (bincode)
//!     └── trades    ← trades:<uuid>       → TradeReceipt (bincode)
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use realmkeep::storage::TradeStoreBuilder;
//!
//! let store = TradeStoreBuilder::new("./data/trades.sled").open()?;
//! for receipt in store.list_trades()? {
//!     println!("{} completed at {}", receipt.id, receipt.completed_at);
//! }
//! # Ok::<(), realmkeep::storage::StoreError>(())
//! ```

pub mod trade_store;

use thiserror::Error;

use crate::engine::InventorySnapshot;
use crate::trade::TradeReceipt;

pub use trade_store::{PlayerRecord, TradeStore, TradeStoreBuilder, PLAYER_SCHEMA_VERSION};

/// Errors raised by the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Wrapper around sled's error type.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// Wrapper around bincode serialization and deserialization errors.
    #[error("serialization error: {0}")]
    Bincode(#[from] bincode::Error),

    /// Wrapper around IO errors (directory creation, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Returned when fetching a record that is not present.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Returned when deserializing a record with an unexpected schema version.
    #[error("schema mismatch for {entity}: expected {expected}, got {found}")]
    SchemaMismatch {
        entity: &'static str,
        expected: u8,
        found: u8,
    },

    /// The multi-tree transaction was aborted.
    #[error("transaction aborted")]
    Aborted,
}

/// Durable sink for completed trades.
pub trait TradeJournalStore: Send + Sync {
    /// Write every participant snapshot and the receipt under one commit
    /// boundary: all of them land or none do.
    fn commit_trade(
        &self,
        receipt: &TradeReceipt,
        participants: &[InventorySnapshot],
    ) -> Result<(), StoreError>;
}
