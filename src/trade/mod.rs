//! Two-party trade sessions.
//!
//! A trade links two participants through one shared [`Trade`] record. Each
//! side offers gold, up to six items and optionally an enchant target in the
//! non-traded slot. Once both sides accept, the [`TradeManager`] re-validates
//! everything, moves items and gold under a [`TransferJournal`] and persists
//! both participants through a [`TradeJournalStore`](crate::storage::TradeJournalStore).
//!
//! ```text
//! Idle ──initiate──▶ Proposed ──accept──▶ OneSidedAccept ──accept──▶ Committing
//!                      ▲   any edit / unaccept  │                       │
//!                      └────────────────────────┘        ok ──▶ closed  │ fit/spell failure
//!                                                                        ▼
//!                                                                     Proposed
//! ```

pub mod error;
pub mod journal;
pub mod manager;
pub mod receipt;
pub mod session;
pub mod status;

pub use error::{ErrorClass, TradeError};
pub use journal::{JournalStep, TransferJournal};
pub use manager::{DeclineReason, TradeManager, TradeProgress};
pub use receipt::{ReceiptSide, TradeReceipt};
pub use session::{
    Trade, TradeSide, TradeState, NONTRADED_SLOT, TRADED_COUNT, TRADE_SLOT_COUNT,
};
pub use status::{TradeSlotView, TradeStatus, TradeStatusInfo, TradeWindow};
