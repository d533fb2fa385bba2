//! Trade coordinator.
//!
//! One [`TradeManager`] serves every trade in a world. Each trade lives in its
//! own `Arc<Mutex<Trade>>`; both participants' index entries point at the
//! same handle, so every request against either side runs inside the same
//! critical section.
//!
//! Lock discipline: the actor index may be held while a trade is locked,
//! never the other way around. Closing a trade marks it `closed` under its
//! own lock and removes the index entries only after that lock is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use uuid::Uuid;

use super::error::{ErrorClass, TradeError};
use super::journal::{JournalStep, TransferJournal};
use super::receipt::{ReceiptSide, TradeReceipt};
use super::session::{Trade, TradeSide, TradeState, NONTRADED_SLOT, TRADE_SLOT_COUNT};
use super::status::{TradeSlotView, TradeStatus, TradeStatusInfo, TradeWindow};
use crate::config::TradeConfig;
use crate::engine::{
    ActorId, ActorSnapshot, CastRequest, CastResult, CastTarget, EngineError, EngineServices,
    InventoryResult, ItemId, SpellId,
};
use crate::storage::TradeJournalStore;

type TradeHandle = Arc<Mutex<Trade>>;

/// Why an invited player turned a trade down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclineReason {
    Busy,
    Ignored,
}

impl DeclineReason {
    fn status(self) -> TradeStatus {
        match self {
            DeclineReason::Busy => TradeStatus::Busy,
            DeclineReason::Ignored => TradeStatus::IgnoreYou,
        }
    }
}

/// Result of a successful `accept`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TradeProgress {
    /// This side accepted; waiting for the counterpart.
    AwaitingCounterpart,
    /// Both sides accepted and the exchange went through.
    Completed(TradeReceipt),
}

fn lock(handle: &TradeHandle) -> MutexGuard<'_, Trade> {
    handle.lock().unwrap_or_else(|p| p.into_inner())
}

pub struct TradeManager {
    services: EngineServices,
    config: TradeConfig,
    store: Option<Arc<dyn TradeJournalStore>>,
    by_actor: RwLock<HashMap<ActorId, TradeHandle>>,
}

impl TradeManager {
    pub fn new(services: EngineServices, config: TradeConfig) -> Self {
        Self {
            services,
            config,
            store: None,
            by_actor: RwLock::new(HashMap::new()),
        }
    }

    /// Persist completed trades through `store`.
    pub fn with_store(mut self, store: Arc<dyn TradeJournalStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &TradeConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Index helpers
    // ------------------------------------------------------------------

    fn index(&self) -> RwLockReadGuard<'_, HashMap<ActorId, TradeHandle>> {
        self.by_actor.read().unwrap_or_else(|p| p.into_inner())
    }

    fn index_mut(&self) -> RwLockWriteGuard<'_, HashMap<ActorId, TradeHandle>> {
        self.by_actor.write().unwrap_or_else(|p| p.into_inner())
    }

    fn handle_of(&self, actor: ActorId) -> Option<TradeHandle> {
        self.index().get(&actor).cloned()
    }

    /// Drop index entries that still point at `handle`.
    fn unregister(&self, handle: &TradeHandle, participants: [ActorId; 2]) {
        let mut index = self.index_mut();
        for actor in participants {
            if index.get(&actor).is_some_and(|h| Arc::ptr_eq(h, handle)) {
                index.remove(&actor);
            }
        }
    }

    /// Run `f` on `actor`'s live trade. Closing inside `f` is picked up and
    /// the index is cleaned once the trade lock is released.
    fn with_trade<R>(
        &self,
        actor: ActorId,
        f: impl FnOnce(&mut Trade) -> Result<R, TradeError>,
    ) -> Result<R, TradeError> {
        let handle = self.handle_of(actor).ok_or(TradeError::NoSession(actor))?;
        let (result, closed, participants) = {
            let mut trade = lock(&handle);
            if trade.closed {
                return Err(TradeError::NoSession(actor));
            }
            let result = f(&mut trade);
            (result, trade.closed, trade.participants())
        };
        if closed {
            self.unregister(&handle, participants);
        }
        result
    }

    /// Notify the requester of a rejected request.
    fn report<T>(&self, actor: ActorId, result: Result<T, TradeError>) -> Result<T, TradeError> {
        if let Err(err) = &result {
            if let Some(info) = err.status_info(actor) {
                self.services.notifier.trade_status(actor, &info);
            }
            debug!("trade request from {} rejected: {}", actor, err);
        }
        result
    }

    fn notify(&self, to: ActorId, info: impl Into<TradeStatusInfo>) {
        self.services.notifier.trade_status(to, &info.into());
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state_of(&self, actor: ActorId) -> TradeState {
        match self.handle_of(actor) {
            Some(handle) => {
                let trade = lock(&handle);
                if trade.closed {
                    TradeState::Idle
                } else {
                    trade.state()
                }
            }
            None => TradeState::Idle,
        }
    }

    pub fn is_trading(&self, actor: ActorId) -> bool {
        self.state_of(actor) != TradeState::Idle
    }

    /// Copy of `actor`'s own side.
    pub fn offer(&self, actor: ActorId) -> Option<TradeSide> {
        self.trade_of(actor)
            .and_then(|t| t.side(actor).cloned())
    }

    /// Copy of the whole trade `actor` takes part in.
    pub fn trade_of(&self, actor: ActorId) -> Option<Trade> {
        let handle = self.handle_of(actor)?;
        let trade = lock(&handle);
        (!trade.closed).then(|| trade.clone())
    }

    /// Number of live trades.
    pub fn active_trades(&self) -> usize {
        self.index().len() / 2
    }

    // ------------------------------------------------------------------
    // Opening
    // ------------------------------------------------------------------

    /// Propose a trade from `initiator` to `target`.
    pub fn initiate(&self, initiator: ActorId, target: ActorId) -> Result<Uuid, TradeError> {
        let result = self.try_initiate(initiator, target);
        self.report(initiator, result)
    }

    fn try_initiate(&self, initiator: ActorId, target: ActorId) -> Result<Uuid, TradeError> {
        let me = self
            .services
            .directory
            .actor(initiator)
            .map_err(|_| TradeError::ParticipantGone(initiator))?;
        if self.is_trading(initiator) {
            return Err(TradeError::AlreadyTrading(initiator));
        }
        if !me.alive {
            return Err(TradeError::InitiatorInvalid(TradeStatus::YouDead));
        }
        if me.stunned {
            return Err(TradeError::InitiatorInvalid(TradeStatus::YouStunned));
        }
        if me.logging_out {
            return Err(TradeError::InitiatorInvalid(TradeStatus::YouLogout));
        }
        if me.in_transit {
            return Err(TradeError::InitiatorInvalid(TradeStatus::TargetTooFar));
        }
        if me.level < self.config.trade_level_requirement {
            return Err(TradeError::LevelTooLow {
                level: me.level,
                required: self.config.trade_level_requirement,
            });
        }

        let other = self
            .services
            .directory
            .actor(target)
            .map_err(|_| TradeError::TargetInvalid(TradeStatus::NoTarget))?;
        if target == initiator || self.is_trading(target) {
            return Err(TradeError::TargetInvalid(TradeStatus::Busy));
        }
        if !other.alive {
            return Err(TradeError::TargetInvalid(TradeStatus::TargetDead));
        }
        if other.in_transit {
            return Err(TradeError::TargetInvalid(TradeStatus::TargetTooFar));
        }
        if other.stunned {
            return Err(TradeError::TargetInvalid(TradeStatus::TargetStunned));
        }
        if other.logging_out {
            return Err(TradeError::TargetInvalid(TradeStatus::TargetLogout));
        }
        if me.faction != other.faction
            && !self.config.allow_cross_faction
            && !me.cross_faction_exempt
        {
            return Err(TradeError::FactionMismatch);
        }
        if !self.in_range(&me, &other) {
            return Err(TradeError::TargetInvalid(TradeStatus::TargetTooFar));
        }
        if other.level < self.config.trade_level_requirement {
            return Err(TradeError::TargetInvalid(TradeStatus::NotEligible));
        }

        let trade = Trade::new(initiator, target);
        let id = trade.id;
        {
            let mut index = self.index_mut();
            // Re-check under the write lock; a closed trade may linger until
            // its closer unregisters it.
            for actor in [initiator, target] {
                if let Some(existing) = index.get(&actor) {
                    if !lock(existing).closed {
                        return Err(if actor == initiator {
                            TradeError::AlreadyTrading(initiator)
                        } else {
                            TradeError::TargetInvalid(TradeStatus::Busy)
                        });
                    }
                }
            }
            let handle = Arc::new(Mutex::new(trade));
            index.insert(initiator, handle.clone());
            index.insert(target, handle);
        }

        info!("trade {} proposed: {} -> {}", id, me.name, other.name);
        self.services
            .notifier
            .trade_status(target, &TradeStatusInfo::begin(initiator));
        Ok(id)
    }

    /// The invited player opens the trade window.
    pub fn begin(&self, actor: ActorId) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            trade.touch();
            for p in trade.participants() {
                self.notify(p, TradeStatus::OpenWindow);
            }
            Ok(())
        });
        self.report(actor, result)
    }

    // ------------------------------------------------------------------
    // Editing
    // ------------------------------------------------------------------

    pub fn set_money(&self, actor: ActorId, amount: u64) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            let holdings = self
                .services
                .inventory
                .gold(actor)
                .map_err(|_| TradeError::ParticipantGone(actor))?;
            if amount > holdings || amount > self.config.max_money {
                return Err(TradeError::NotEnoughMoney { actor });
            }
            let (mine, _) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            if mine.money == amount {
                return Ok(());
            }
            mine.money = amount;
            self.after_edit(trade, actor);
            Ok(())
        });
        self.report(actor, result)
    }

    pub fn set_item(&self, actor: ActorId, slot: u8, item: ItemId) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            if slot as usize >= TRADE_SLOT_COUNT {
                return Err(TradeError::SlotInvalid(slot));
            }
            let (mine, theirs) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            let view = self
                .services
                .inventory
                .item(actor, item)
                .ok_or(TradeError::ItemNotFound(item))?;
            if slot != NONTRADED_SLOT {
                if !view.tradeable {
                    return Err(TradeError::ItemNotTradeable(item));
                }
                if view.is_bound_not_with(theirs.owner) {
                    warn!(target: "security", "{} offered bound {} to {}", actor, item, theirs.owner);
                    return Err(TradeError::ItemBound {
                        item,
                        slot: Some(slot),
                    });
                }
            }
            if slot != NONTRADED_SLOT && mine.spell_cast_item == Some(item) {
                warn!(target: "security", "{} offered the reagent {} of its own enchant", actor, item);
                return Err(TradeError::DuplicateItem(item));
            }
            if let Some(existing) = mine.slot_of(item) {
                if existing != slot {
                    warn!(target: "security", "{} tried to place {} in two trade slots", actor, item);
                    return Err(TradeError::DuplicateItem(item));
                }
                return Ok(());
            }
            mine.items[slot as usize] = Some(item);
            if slot == NONTRADED_SLOT {
                theirs.clear_spell();
            }
            self.after_edit(trade, actor);
            Ok(())
        });
        self.report(actor, result)
    }

    pub fn clear_item(&self, actor: ActorId, slot: u8) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            if slot as usize >= TRADE_SLOT_COUNT {
                return Err(TradeError::SlotInvalid(slot));
            }
            let (mine, theirs) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            if mine.items[slot as usize].take().is_none() {
                return Ok(());
            }
            if slot == NONTRADED_SLOT {
                theirs.clear_spell();
            }
            self.after_edit(trade, actor);
            Ok(())
        });
        self.report(actor, result)
    }

    /// Register an enchant this side will cast on the counterpart's
    /// non-traded item when the trade completes.
    pub fn set_spell(
        &self,
        actor: ActorId,
        spell: SpellId,
        cast_item: Option<ItemId>,
    ) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            if let Some(item) = cast_item {
                if self.services.inventory.item(actor, item).is_none() {
                    return Err(TradeError::ItemNotFound(item));
                }
            }
            let (mine, _) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            if let Some(item) = cast_item {
                if mine.traded_items().iter().any(|(_, offered)| *offered == item) {
                    return Err(TradeError::DuplicateItem(item));
                }
            }
            mine.spell = Some(spell);
            mine.spell_cast_item = cast_item;
            self.after_edit(trade, actor);
            Ok(())
        });
        self.report(actor, result)
    }

    pub fn clear_spell(&self, actor: ActorId) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            let (mine, _) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            if mine.spell.is_none() {
                return Ok(());
            }
            mine.clear_spell();
            self.after_edit(trade, actor);
            Ok(())
        });
        self.report(actor, result)
    }

    /// Any offer change voids both acceptances and refreshes both windows.
    fn after_edit(&self, trade: &mut Trade, editor: ActorId) {
        trade.touch();
        for side in trade.sides.iter_mut() {
            if side.accepted {
                side.accepted = false;
                self.notify(side.owner, TradeStatus::BackToTrade);
            }
        }
        self.push_windows(trade, editor);
    }

    fn push_windows(&self, trade: &Trade, owner: ActorId) {
        let Some(side) = trade.side(owner) else {
            return;
        };
        let slots = side
            .items
            .iter()
            .enumerate()
            .filter_map(|(slot, item)| {
                let item = (*item)?;
                self.services.inventory.item(owner, item).map(|view| TradeSlotView {
                    slot: slot as u8,
                    item: view,
                })
            })
            .collect::<Vec<_>>();
        let mut window = TradeWindow {
            trader_data: false,
            owner,
            money: side.money,
            spell: side.spell,
            accepted: side.accepted,
            slots,
        };
        self.services.notifier.trade_window(owner, &window);
        window.trader_data = true;
        self.services.notifier.trade_window(side.counterpart, &window);
    }

    // ------------------------------------------------------------------
    // Acceptance and commit
    // ------------------------------------------------------------------

    /// Accept the current offers. Commits when the counterpart has already
    /// accepted. Without a session this is a silent no-op error.
    pub fn accept(&self, actor: ActorId) -> Result<TradeProgress, TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            let index = trade.index_of(actor).ok_or(TradeError::NoSession(actor))?;
            trade.sides[index].accepted = true;
            trade.touch();

            if let Err(err) = self.validate_accept(trade, actor) {
                self.settle_failure(trade, actor, &err);
                return Err(err);
            }

            let counterpart = trade.sides[index].counterpart;
            if !trade.sides[1 - index].accepted {
                self.notify(counterpart, TradeStatus::TradeAccept);
                debug!("trade {}: {} accepted, waiting for {}", trade.id, actor, counterpart);
                return Ok(TradeProgress::AwaitingCounterpart);
            }
            self.commit(trade, actor).map(TradeProgress::Completed)
        });
        self.report(actor, result)
    }

    pub fn unaccept(&self, actor: ActorId) -> Result<(), TradeError> {
        let result = self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            let (mine, theirs) = trade.both_mut(actor).ok_or(TradeError::NoSession(actor))?;
            if mine.accepted {
                mine.accepted = false;
                let counterpart = theirs.owner;
                self.notify(counterpart, TradeStatus::BackToTrade);
            }
            trade.touch();
            Ok(())
        });
        self.report(actor, result)
    }

    fn resolve(&self, actor: ActorId) -> Result<ActorSnapshot, TradeError> {
        self.services
            .directory
            .actor(actor)
            .map_err(|_| TradeError::ParticipantGone(actor))
    }

    fn in_range(&self, a: &ActorSnapshot, b: &ActorSnapshot) -> bool {
        a.position.within(&b.position, self.config.trade_distance)
    }

    fn validate_accept(&self, trade: &Trade, actor: ActorId) -> Result<(), TradeError> {
        let [a, b] = trade.participants();
        let first = self.resolve(a)?;
        let second = self.resolve(b)?;
        if !self.in_range(&first, &second) {
            return Err(TradeError::TooFar);
        }

        let inventory = &self.services.inventory;
        let mine = trade.side(actor).ok_or(TradeError::NoSession(actor))?;
        let theirs = trade
            .side(mine.counterpart)
            .ok_or(TradeError::NoSession(actor))?;
        for (side, other) in [(mine, theirs), (theirs, mine)] {
            let gold = inventory
                .gold(side.owner)
                .map_err(|_| TradeError::ParticipantGone(side.owner))?;
            if side.money > gold {
                return Err(TradeError::NotEnoughMoney { actor: side.owner });
            }
            let after = gold - side.money + other.money;
            if after > self.config.max_money {
                return Err(TradeError::TooMuchGold { actor: side.owner });
            }
        }

        for (side, other) in [(mine, theirs), (theirs, mine)] {
            for (slot, item) in side.items.iter().enumerate() {
                let Some(item) = *item else { continue };
                let Some(view) = inventory.item(side.owner, item) else {
                    warn!(target: "security", "{} vanished from {}'s trade offer", item, side.owner);
                    return Err(TradeError::ItemNotFound(item));
                };
                if slot as u8 == NONTRADED_SLOT {
                    continue;
                }
                if !view.tradeable {
                    return Err(TradeError::ItemNotTradeable(item));
                }
                if view.is_bound_not_with(other.owner) {
                    warn!(target: "security", "{} became bound while offered by {}", item, side.owner);
                    return Err(TradeError::ItemBound { item, slot: None });
                }
            }
        }
        Ok(())
    }

    /// Apply a failed accept or commit to the session. The requester hears
    /// about it through `report`; the counterpart is told here.
    fn settle_failure(&self, trade: &mut Trade, requester: ActorId, err: &TradeError) {
        let Some(index) = trade.index_of(requester) else {
            return;
        };
        let counterpart = trade.sides[index].counterpart;
        match err.class() {
            ErrorClass::Validation => trade.sides[index].accepted = false,
            ErrorClass::ConcurrencyInvalidation => {
                trade.clear_acceptance();
                if let Some(info) = err.status_info(counterpart) {
                    self.services.notifier.trade_status(counterpart, &info);
                }
            }
            ErrorClass::Fatal => {
                self.close(trade);
                if self.services.directory.actor(counterpart).is_ok() {
                    self.notify(counterpart, TradeStatus::TradeCanceled);
                }
            }
        }
    }

    fn set_locks(&self, trade: &mut Trade, locked: bool) {
        for side in trade.sides.iter_mut() {
            side.in_accept_process = locked;
            for item in side.all_items() {
                self.services.inventory.set_in_trade(item, locked);
            }
        }
    }

    /// Pending enchant casts for both sides, validated.
    fn validate_spells(&self, trade: &mut Trade) -> Result<Vec<CastRequest>, TradeError> {
        let mut casts = Vec::new();
        for index in 0..2 {
            let side = &trade.sides[index];
            let Some(spell) = side.spell else { continue };
            let target = trade.sides[1 - index].item(NONTRADED_SLOT);
            let request = target.map(|item| {
                CastRequest::new(
                    side.owner,
                    spell,
                    CastTarget::TradeItem {
                        owner: side.counterpart,
                        item,
                    },
                )
                .with_item(side.spell_cast_item)
            });
            let result = match &request {
                None => CastResult::BadTargets,
                Some(req) => self.services.spells.check_cast(req),
            };
            match (request, result) {
                (Some(req), CastResult::Ok) => casts.push(req),
                (_, result) => {
                    let caster = side.owner;
                    trade.sides[index].clear_spell();
                    self.services.notifier.cast_result(caster, spell, result);
                    return Err(TradeError::SpellCastFailed {
                        caster,
                        spell,
                        result,
                    });
                }
            }
        }
        Ok(casts)
    }

    fn commit(&self, trade: &mut Trade, requester: ActorId) -> Result<TradeReceipt, TradeError> {
        if trade.index_of(requester).is_none() {
            return Err(TradeError::NoSession(requester));
        }
        self.set_locks(trade, true);

        let casts = match self.validate_spells(trade) {
            Ok(casts) => casts,
            Err(err) => {
                self.set_locks(trade, false);
                self.settle_failure(trade, requester, &err);
                warn!("trade {} commit aborted: {}", trade.id, err);
                return Err(err);
            }
        };

        let inventory = &self.services.inventory;
        for index in 0..2 {
            let dest = trade.sides[index].owner;
            let incoming: Vec<ItemId> = trade.sides[1 - index]
                .traded_items()
                .into_iter()
                .map(|(_, item)| item)
                .collect();
            let fit = inventory.can_store_batch(dest, &incoming);
            if !fit.is_ok() {
                self.set_locks(trade, false);
                let err = TradeError::InventoryRejected {
                    blocker: dest,
                    result: fit,
                };
                self.settle_failure(trade, requester, &err);
                warn!("trade {} commit aborted: {}", trade.id, err);
                return Err(err);
            }
        }

        let mut journal = TransferJournal::new();
        if let Err(e) = self.transfer(trade, &mut journal) {
            let steps = journal.len();
            let unrecovered = journal.rollback(inventory.as_ref());
            error!(
                "trade {} transfer failed ({}); rolled back {} step(s), {} unrecovered",
                trade.id, e, steps, unrecovered
            );
            let err = TradeError::TransferAborted;
            self.settle_failure(trade, requester, &err);
            return Err(err);
        }

        for request in &casts {
            let result = self.services.spells.cast(request);
            if !result.is_ok() {
                warn!("trade {}: enchant {} failed after transfer: {:?}", trade.id, request.spell, result);
                self.services
                    .notifier
                    .cast_result(request.caster, request.spell, result);
            }
        }

        let receipt = TradeReceipt {
            schema_version: TradeReceipt::SCHEMA_VERSION,
            id: trade.id,
            opened_at: trade.created_at,
            completed_at: Utc::now(),
            sides: [receipt_side(&trade.sides[0]), receipt_side(&trade.sides[1])],
        };
        self.close(trade);
        self.persist(&receipt);

        for p in trade.participants() {
            self.notify(p, TradeStatus::TradeComplete);
        }
        info!(
            "trade {} complete: {} gave {} gold and {} item(s), {} gave {} gold and {} item(s)",
            receipt.id,
            receipt.sides[0].actor,
            receipt.sides[0].money,
            receipt.sides[0].items.len(),
            receipt.sides[1].actor,
            receipt.sides[1].money,
            receipt.sides[1].items.len()
        );
        Ok(receipt)
    }

    /// Move items and gold in both directions, recording each step.
    fn transfer(&self, trade: &Trade, journal: &mut TransferJournal) -> Result<(), EngineError> {
        let inventory = &self.services.inventory;
        let mut moving = Vec::new();
        for side in &trade.sides {
            for (_, item) in side.traded_items() {
                inventory.take_item(side.owner, item)?;
                journal.record(JournalStep::Took {
                    owner: side.owner,
                    item,
                });
                moving.push((side.counterpart, item));
            }
        }
        for (dest, item) in moving {
            inventory.store_item(dest, item)?;
            journal.record(JournalStep::Stored { owner: dest, item });
        }
        for side in &trade.sides {
            if side.money == 0 {
                continue;
            }
            let amount = i64::try_from(side.money)
                .map_err(|_| EngineError::Rejected(InventoryResult::TooMuchGold))?;
            inventory.modify_gold(side.owner, -amount)?;
            journal.record(JournalStep::Gold {
                actor: side.owner,
                delta: -amount,
            });
            inventory.modify_gold(side.counterpart, amount)?;
            journal.record(JournalStep::Gold {
                actor: side.counterpart,
                delta: amount,
            });
        }
        Ok(())
    }

    fn persist(&self, receipt: &TradeReceipt) {
        let Some(store) = &self.store else {
            return;
        };
        let mut snapshots = Vec::with_capacity(2);
        for side in &receipt.sides {
            match self.services.inventory.snapshot(side.actor) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => {
                    error!("trade {}: cannot snapshot {}: {}", receipt.id, side.actor, e);
                    return;
                }
            }
        }
        if let Err(e) = store.commit_trade(receipt, &snapshots) {
            error!("trade {}: persistence failed: {}", receipt.id, e);
        }
    }

    // ------------------------------------------------------------------
    // Closing
    // ------------------------------------------------------------------

    /// Unlock everything and mark the trade closed. Index cleanup happens
    /// once the caller releases the trade lock.
    fn close(&self, trade: &mut Trade) {
        self.set_locks(trade, false);
        trade.clear_acceptance();
        trade.closed = true;
    }

    /// Close `actor`'s trade and tell both participants `reason`.
    pub fn cancel(&self, actor: ActorId, reason: TradeStatus) -> Result<(), TradeError> {
        self.with_trade(actor, |trade| {
            ensure_editable(trade)?;
            self.close(trade);
            info!("trade {} cancelled by {}: {:?}", trade.id, actor, reason);
            for p in trade.participants() {
                self.notify(p, reason);
            }
            Ok(())
        })
    }

    /// The invited player turns the proposal down.
    pub fn decline(&self, actor: ActorId, reason: DeclineReason) -> Result<(), TradeError> {
        self.cancel(actor, reason.status())
    }

    /// Disconnect or death. Force-closes the trade and notifies whoever can
    /// still be reached.
    pub fn participant_gone(&self, actor: ActorId) -> Result<(), TradeError> {
        self.with_trade(actor, |trade| {
            self.close(trade);
            info!("trade {} closed: {} left", trade.id, actor);
            for p in trade.participants() {
                if self.services.directory.actor(p).is_ok() {
                    self.notify(p, TradeStatus::TradeCanceled);
                }
            }
            Ok(())
        })
    }

    /// Close trades idle past the configured timeout. Returns how many
    /// were closed.
    pub fn expire_idle(&self, now: DateTime<Utc>) -> usize {
        let Some(timeout) = self.config.idle_timeout() else {
            return 0;
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return 0;
        };
        let mut handles: Vec<TradeHandle> = Vec::new();
        for handle in self.index().values() {
            if !handles.iter().any(|h| Arc::ptr_eq(h, handle)) {
                handles.push(handle.clone());
            }
        }

        let mut expired = 0;
        for handle in handles {
            let participants = {
                let mut trade = lock(&handle);
                if trade.closed || now - trade.last_activity <= timeout {
                    continue;
                }
                self.close(&mut trade);
                info!("trade {} expired after {}s idle", trade.id, timeout.num_seconds());
                for p in trade.participants() {
                    self.notify(p, TradeStatus::TradeCanceled);
                }
                trade.participants()
            };
            self.unregister(&handle, participants);
            expired += 1;
        }
        expired
    }
}

fn ensure_editable(trade: &Trade) -> Result<(), TradeError> {
    if trade.sides.iter().any(|s| s.in_accept_process) {
        return Err(TradeError::InAcceptProcess);
    }
    Ok(())
}

fn receipt_side(side: &TradeSide) -> ReceiptSide {
    ReceiptSide {
        actor: side.owner,
        money: side.money,
        items: side.traded_items().into_iter().map(|(_, item)| item).collect(),
        spell: side.spell,
    }
}
