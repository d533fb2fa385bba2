//! Status codes and window payloads pushed to trade participants.

use serde::{Deserialize, Serialize};

use crate::engine::{ActorId, InventoryResult, ItemView, SpellId};

/// Trade status codes sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Busy,
    BeginTrade,
    OpenWindow,
    TradeCanceled,
    TradeAccept,
    BackToTrade,
    TradeComplete,
    CloseWindow,
    NoTarget,
    TargetTooFar,
    WrongFaction,
    IgnoreYou,
    YouStunned,
    TargetStunned,
    YouDead,
    TargetDead,
    YouLogout,
    TargetLogout,
    NotOnTaplist,
    NotEligible,
    /// Requester is below the realm's trade level requirement.
    LevelTooLow,
    /// A trade-window edit or accept that failed a precondition.
    Failed,
}

/// Status payload. Most codes carry only `status`; the rest is filled in
/// by the codes that need it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStatusInfo {
    pub status: TradeStatus,
    /// Who is proposing the trade (`BeginTrade`).
    pub trader: Option<ActorId>,
    /// Inventory result backing a `CloseWindow` or `Failed`.
    pub result: InventoryResult,
    /// `true` when `result` describes the counterpart's inventory.
    pub is_target_result: bool,
    /// Participant whose inventory or funds blocked the commit.
    pub blocker: Option<ActorId>,
    /// Offending trade slot (`NotOnTaplist`).
    pub slot: Option<u8>,
}

impl TradeStatusInfo {
    pub fn new(status: TradeStatus) -> Self {
        Self {
            status,
            trader: None,
            result: InventoryResult::Ok,
            is_target_result: false,
            blocker: None,
            slot: None,
        }
    }

    pub fn begin(trader: ActorId) -> Self {
        Self {
            trader: Some(trader),
            ..Self::new(TradeStatus::BeginTrade)
        }
    }

    pub fn with_result(mut self, result: InventoryResult) -> Self {
        self.result = result;
        self
    }

    pub fn with_blocker(mut self, blocker: ActorId, recipient: ActorId) -> Self {
        self.blocker = Some(blocker);
        self.is_target_result = blocker != recipient;
        self
    }

    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = Some(slot);
        self
    }
}

impl From<TradeStatus> for TradeStatusInfo {
    fn from(status: TradeStatus) -> Self {
        Self::new(status)
    }
}

/// One occupied slot as shown in the trade window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSlotView {
    pub slot: u8,
    pub item: ItemView,
}

/// Snapshot of one side's offer. Each participant receives two of these
/// after every change: their own side and the counterpart's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeWindow {
    /// `true` when the window describes the counterpart's offer.
    pub trader_data: bool,
    pub owner: ActorId,
    pub money: u64,
    pub spell: Option<SpellId>,
    pub accepted: bool,
    pub slots: Vec<TradeSlotView>,
}
