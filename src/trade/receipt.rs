use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::{ActorId, ItemId, SpellId};

/// What one participant gave away in a completed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptSide {
    pub actor: ActorId,
    pub money: u64,
    pub items: Vec<ItemId>,
    pub spell: Option<SpellId>,
}

/// Audit record for a completed trade, persisted alongside both inventories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub schema_version: u8,
    pub id: Uuid,
    pub opened_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub sides: [ReceiptSide; 2],
}

impl TradeReceipt {
    pub const SCHEMA_VERSION: u8 = 1;

    pub fn involves(&self, actor: ActorId) -> bool {
        self.sides.iter().any(|s| s.actor == actor)
    }
}
