use thiserror::Error;

use super::status::{TradeStatus, TradeStatusInfo};
use crate::engine::{ActorId, CastResult, InventoryResult, ItemId, SpellId};

/// How a trade failure affects the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Precondition not met. Only the requester's own optimistic state is reverted.
    Validation,
    /// State became illegal between proposal and commit. Both acceptances
    /// are cleared and both sides are notified; the session stays open.
    ConcurrencyInvalidation,
    /// A participant vanished or the exchange was rolled back. The session
    /// is force-closed.
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("{0} has no open trade")]
    NoSession(ActorId),

    #[error("{0} is already trading")]
    AlreadyTrading(ActorId),

    #[error("initiator cannot trade: {0:?}")]
    InitiatorInvalid(TradeStatus),

    #[error("target cannot trade: {0:?}")]
    TargetInvalid(TradeStatus),

    #[error("cross-faction trade is not allowed")]
    FactionMismatch,

    #[error("level {level} is below the trade requirement of {required}")]
    LevelTooLow { level: u8, required: u8 },

    #[error("trade slot {0} is out of range")]
    SlotInvalid(u8),

    #[error("{0} is not in the trader's inventory")]
    ItemNotFound(ItemId),

    #[error("{0} cannot be traded")]
    ItemNotTradeable(ItemId),

    #[error("{item} is bound to another player")]
    ItemBound { item: ItemId, slot: Option<u8> },

    #[error("{0} is already offered in another slot")]
    DuplicateItem(ItemId),

    #[error("trade is being committed")]
    InAcceptProcess,

    #[error("trade partner is too far away")]
    TooFar,

    #[error("{actor} does not have enough money")]
    NotEnoughMoney { actor: ActorId },

    #[error("{actor} would exceed the gold limit")]
    TooMuchGold { actor: ActorId },

    #[error("{spell} cannot be cast: {result:?}")]
    SpellCastFailed { caster: ActorId, spell: SpellId, result: CastResult },

    #[error("{blocker} cannot receive the items: {result}")]
    InventoryRejected { blocker: ActorId, result: InventoryResult },

    #[error("{0} left the trade")]
    ParticipantGone(ActorId),

    #[error("item transfer aborted and rolled back")]
    TransferAborted,
}

impl TradeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            TradeError::TooFar
            | TradeError::SpellCastFailed { .. }
            | TradeError::InventoryRejected { .. } => ErrorClass::ConcurrencyInvalidation,
            TradeError::ParticipantGone(_) | TradeError::TransferAborted => ErrorClass::Fatal,
            _ => ErrorClass::Validation,
        }
    }

    /// The status the requester is told about. `None` for failures that
    /// stay silent (accept without a session).
    pub fn status_info(&self, recipient: ActorId) -> Option<TradeStatusInfo> {
        let info = match self {
            TradeError::NoSession(_) => return None,
            TradeError::AlreadyTrading(_) => TradeStatus::Busy.into(),
            TradeError::InitiatorInvalid(status) | TradeError::TargetInvalid(status) => {
                (*status).into()
            }
            TradeError::FactionMismatch => TradeStatus::WrongFaction.into(),
            TradeError::LevelTooLow { .. } => TradeStatus::LevelTooLow.into(),
            TradeError::ItemBound { slot: Some(slot), .. } => {
                TradeStatusInfo::new(TradeStatus::NotOnTaplist).with_slot(*slot)
            }
            TradeError::ItemBound { slot: None, .. } => TradeStatusInfo::new(TradeStatus::Failed)
                .with_result(InventoryResult::TradeBoundItem),
            TradeError::ItemNotFound(_) => {
                TradeStatusInfo::new(TradeStatus::Failed).with_result(InventoryResult::ItemNotFound)
            }
            TradeError::ItemNotTradeable(_) => TradeStatusInfo::new(TradeStatus::Failed)
                .with_result(InventoryResult::TradeBoundItem),
            TradeError::TooFar => TradeStatus::TargetTooFar.into(),
            TradeError::NotEnoughMoney { actor } => TradeStatusInfo::new(TradeStatus::Failed)
                .with_result(InventoryResult::NotEnoughMoney)
                .with_blocker(*actor, recipient),
            TradeError::TooMuchGold { actor } => TradeStatusInfo::new(TradeStatus::Failed)
                .with_result(InventoryResult::TooMuchGold)
                .with_blocker(*actor, recipient),
            TradeError::InventoryRejected { blocker, result } => {
                TradeStatusInfo::new(TradeStatus::CloseWindow)
                    .with_result(*result)
                    .with_blocker(*blocker, recipient)
            }
            TradeError::ParticipantGone(_) | TradeError::TransferAborted => {
                TradeStatus::TradeCanceled.into()
            }
            TradeError::SlotInvalid(_)
            | TradeError::DuplicateItem(_)
            | TradeError::InAcceptProcess
            | TradeError::SpellCastFailed { .. } => TradeStatus::Failed.into(),
        };
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_follow_failure_kind() {
        assert_eq!(TradeError::SlotInvalid(9).class(), ErrorClass::Validation);
        assert_eq!(
            TradeError::InventoryRejected {
                blocker: ActorId(1),
                result: InventoryResult::BagFull
            }
            .class(),
            ErrorClass::ConcurrencyInvalidation
        );
        assert_eq!(TradeError::TooFar.class(), ErrorClass::ConcurrencyInvalidation);
        assert_eq!(TradeError::ParticipantGone(ActorId(2)).class(), ErrorClass::Fatal);
        assert_eq!(TradeError::TransferAborted.class(), ErrorClass::Fatal);
    }

    #[test]
    fn missing_session_is_silent() {
        assert!(TradeError::NoSession(ActorId(1)).status_info(ActorId(1)).is_none());
    }

    #[test]
    fn inventory_rejection_names_the_blocker() {
        let err = TradeError::InventoryRejected {
            blocker: ActorId(1),
            result: InventoryResult::BagFull,
        };
        let own = err.status_info(ActorId(1)).expect("info");
        let other = err.status_info(ActorId(2)).expect("info");
        assert_eq!(own.status, TradeStatus::CloseWindow);
        assert_eq!(own.result, InventoryResult::BagFull);
        assert!(!own.is_target_result);
        assert!(other.is_target_result);
        assert_eq!(other.blocker, Some(ActorId(1)));
    }

    #[test]
    fn bound_item_in_slot_reports_taplist() {
        let err = TradeError::ItemBound {
            item: ItemId(3),
            slot: Some(2),
        };
        let info = err.status_info(ActorId(1)).expect("info");
        assert_eq!(info.status, TradeStatus::NotOnTaplist);
        assert_eq!(info.slot, Some(2));
    }
}
