//! Trade session data: two linked sides behind one lock.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::engine::{ActorId, ItemId, SpellId};

/// Slots `0..TRADED_COUNT` change hands; slot [`NONTRADED_SLOT`] is the
/// enchant target and never moves.
pub const TRADE_SLOT_COUNT: usize = 7;
pub const TRADED_COUNT: usize = 6;
pub const NONTRADED_SLOT: u8 = 6;

/// Externally visible trade state for one actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeState {
    Idle,
    Proposed,
    OneSidedAccept,
    Committing,
}

/// One participant's half of a trade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeSide {
    pub owner: ActorId,
    /// Weak link to the other side: resolved through the directory, never owned.
    pub counterpart: ActorId,
    pub money: u64,
    pub items: [Option<ItemId>; TRADE_SLOT_COUNT],
    pub accepted: bool,
    pub in_accept_process: bool,
    /// Enchant this side casts on the counterpart's non-traded item.
    pub spell: Option<SpellId>,
    pub spell_cast_item: Option<ItemId>,
}

impl TradeSide {
    pub fn new(owner: ActorId, counterpart: ActorId) -> Self {
        Self {
            owner,
            counterpart,
            money: 0,
            items: [None; TRADE_SLOT_COUNT],
            accepted: false,
            in_accept_process: false,
            spell: None,
            spell_cast_item: None,
        }
    }

    pub fn item(&self, slot: u8) -> Option<ItemId> {
        self.items.get(slot as usize).copied().flatten()
    }

    /// Slot already holding `item`, if any.
    pub fn slot_of(&self, item: ItemId) -> Option<u8> {
        self.items
            .iter()
            .position(|s| *s == Some(item))
            .map(|p| p as u8)
    }

    /// Items that change hands on commit.
    pub fn traded_items(&self) -> Vec<(u8, ItemId)> {
        self.items[..TRADED_COUNT]
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| item.map(|i| (slot as u8, i)))
            .collect()
    }

    /// Every placed item, including the non-traded slot.
    pub fn all_items(&self) -> Vec<ItemId> {
        self.items.iter().flatten().copied().collect()
    }

    pub fn clear_spell(&mut self) {
        self.spell = None;
        self.spell_cast_item = None;
    }
}

/// A trade between exactly two participants.
#[derive(Debug, Clone)]
pub struct Trade {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// `sides[0]` is the initiator.
    pub sides: [TradeSide; 2],
    /// Set once the trade is destroyed; stale handles see a closed trade.
    pub closed: bool,
}

impl Trade {
    pub fn new(initiator: ActorId, target: ActorId) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            last_activity: now,
            sides: [
                TradeSide::new(initiator, target),
                TradeSide::new(target, initiator),
            ],
            closed: false,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    pub fn index_of(&self, actor: ActorId) -> Option<usize> {
        self.sides.iter().position(|s| s.owner == actor)
    }

    pub fn participants(&self) -> [ActorId; 2] {
        [self.sides[0].owner, self.sides[1].owner]
    }

    pub fn side(&self, actor: ActorId) -> Option<&TradeSide> {
        self.index_of(actor).map(|i| &self.sides[i])
    }

    /// `(mine, theirs)` borrowed mutably at the same time.
    pub fn both_mut(&mut self, actor: ActorId) -> Option<(&mut TradeSide, &mut TradeSide)> {
        let index = self.index_of(actor)?;
        let (first, second) = self.sides.split_at_mut(1);
        Some(if index == 0 {
            (&mut first[0], &mut second[0])
        } else {
            (&mut second[0], &mut first[0])
        })
    }

    pub fn clear_acceptance(&mut self) {
        for side in &mut self.sides {
            side.accepted = false;
        }
    }

    pub fn state(&self) -> TradeState {
        if self.sides.iter().any(|s| s.in_accept_process) {
            return TradeState::Committing;
        }
        match self.sides.iter().filter(|s| s.accepted).count() {
            0 => TradeState::Proposed,
            1 => TradeState::OneSidedAccept,
            _ => TradeState::Committing,
        }
    }
}
