//! In-memory engine used by tests and the simulator.
//!
//! Holds actors, items and spells in `RwLock`ed maps and records every
//! outbound notification so callers can inspect what a client would have
//! seen. Bag capacity is counted in slots, one item per slot; items may carry
//! a limit category (at most `max` of that category per bag).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    ActorDirectory, ActorId, ActorSnapshot, CastRequest, CastResult, CastTarget, EngineError,
    Faction, InventoryResult, InventoryService, InventorySnapshot, ItemId, ItemView, Notifier,
    Position, SpellId, SpellService,
};
use crate::trade::{TradeStatusInfo, TradeWindow};

const DEFAULT_BAG_SLOTS: usize = 16;

/// Everything sent to a client, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    TradeStatus(TradeStatusInfo),
    TradeWindow(TradeWindow),
    CastResult { spell: SpellId, result: CastResult },
    Say(u8),
}

/// Template for [`MemoryWorld::give_item`].
#[derive(Debug, Clone)]
pub struct ItemSpec {
    pub entry: u32,
    pub name: String,
    pub count: u32,
    pub tradeable: bool,
    pub bound_to: Option<ActorId>,
    pub limit_category: Option<(u32, u32)>,
}

impl ItemSpec {
    pub fn new(entry: u32, name: &str) -> Self {
        Self {
            entry,
            name: name.to_string(),
            count: 1,
            tradeable: true,
            bound_to: None,
            limit_category: None,
        }
    }

    pub fn untradeable(mut self) -> Self {
        self.tradeable = false;
        self
    }

    pub fn bound_to(mut self, actor: ActorId) -> Self {
        self.bound_to = Some(actor);
        self
    }

    pub fn stack(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// At most `max` items of `category` per bag.
    pub fn limited(mut self, category: u32, max: u32) -> Self {
        self.limit_category = Some((category, max));
        self
    }
}

#[derive(Debug, Clone)]
struct MemoryActor {
    snapshot: ActorSnapshot,
    gold: u64,
    bag_slots: usize,
    bag: Vec<ItemId>,
}

#[derive(Debug, Clone)]
struct MemoryItem {
    view: ItemView,
    holder: Option<ActorId>,
    limit_category: Option<(u32, u32)>,
    enchant: Option<SpellId>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|p| p.into_inner())
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|p| p.into_inner())
}

/// Whenever both maps are held, `actors` is locked before `items`.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    actors: RwLock<HashMap<ActorId, MemoryActor>>,
    items: RwLock<HashMap<ItemId, MemoryItem>>,
    spells: RwLock<HashMap<SpellId, CastResult>>,
    fail_store_for: RwLock<HashSet<ActorId>>,
    casts: Mutex<Vec<CastRequest>>,
    outbox: Mutex<Vec<(ActorId, Notification)>>,
    next_actor: AtomicU64,
    next_item: AtomicU64,
}

impl MemoryWorld {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // World setup
    // ------------------------------------------------------------------

    /// Add a living level-80 alliance player at the origin of map 0.
    pub fn add_player(&self, name: &str) -> ActorId {
        let id = ActorId(self.next_actor.fetch_add(1, Ordering::Relaxed) + 1);
        let snapshot = ActorSnapshot {
            id,
            name: name.to_string(),
            level: 80,
            faction: Faction::Alliance,
            position: Position::new(0, 0.0, 0.0, 0.0),
            alive: true,
            stunned: false,
            logging_out: false,
            in_transit: false,
            cross_faction_exempt: false,
        };
        write(&self.actors).insert(
            id,
            MemoryActor {
                snapshot,
                gold: 0,
                bag_slots: DEFAULT_BAG_SLOTS,
                bag: Vec::new(),
            },
        );
        id
    }

    /// Mutate an actor's snapshot (position, alive, faction...).
    pub fn update_actor(&self, id: ActorId, f: impl FnOnce(&mut ActorSnapshot)) {
        if let Some(actor) = write(&self.actors).get_mut(&id) {
            f(&mut actor.snapshot);
        }
    }

    /// Remove an actor entirely (logout). Their items vanish with them.
    pub fn remove_actor(&self, id: ActorId) {
        if let Some(actor) = write(&self.actors).remove(&id) {
            let mut items = write(&self.items);
            for item in actor.bag {
                items.remove(&item);
            }
        }
    }

    pub fn set_position(&self, id: ActorId, position: Position) {
        self.update_actor(id, |s| s.position = position);
    }

    pub fn set_gold(&self, id: ActorId, gold: u64) {
        if let Some(actor) = write(&self.actors).get_mut(&id) {
            actor.gold = gold;
        }
    }

    pub fn set_bag_slots(&self, id: ActorId, slots: usize) {
        if let Some(actor) = write(&self.actors).get_mut(&id) {
            actor.bag_slots = slots;
        }
    }

    /// Fill every free bag slot with junk so the next store fails.
    pub fn fill_bags(&self, id: ActorId) {
        let free = {
            let actors = read(&self.actors);
            match actors.get(&id) {
                Some(a) => a.bag_slots.saturating_sub(a.bag.len()),
                None => return,
            }
        };
        for n in 0..free {
            self.give_item(id, ItemSpec::new(1, &format!("Linen Scrap {}", n + 1)));
        }
    }

    pub fn give_item(&self, owner: ActorId, spec: ItemSpec) -> ItemId {
        let id = ItemId(self.next_item.fetch_add(1, Ordering::Relaxed) + 1);
        let view = ItemView {
            id,
            entry: spec.entry,
            name: spec.name,
            owner,
            count: spec.count,
            tradeable: spec.tradeable,
            bound_to: spec.bound_to,
            in_trade: false,
        };
        write(&self.items).insert(
            id,
            MemoryItem {
                view,
                holder: Some(owner),
                limit_category: spec.limit_category,
                enchant: None,
            },
        );
        if let Some(actor) = write(&self.actors).get_mut(&owner) {
            actor.bag.push(id);
        }
        id
    }

    /// Change an item's tradeability after it was placed (e.g. it got bound).
    pub fn set_item_tradeable(&self, item: ItemId, tradeable: bool) {
        if let Some(record) = write(&self.items).get_mut(&item) {
            record.view.tradeable = tradeable;
        }
    }

    pub fn bind_item(&self, item: ItemId, to: ActorId) {
        if let Some(record) = write(&self.items).get_mut(&item) {
            record.view.bound_to = Some(to);
        }
    }

    /// Destroy an item wherever it is.
    pub fn destroy_item(&self, item: ItemId) {
        let mut actors = write(&self.actors);
        if let Some(record) = write(&self.items).remove(&item) {
            if let Some(actor) = record.holder.and_then(|h| actors.get_mut(&h)) {
                actor.bag.retain(|i| *i != item);
            }
        }
    }

    /// Register a spell; `check` is what `check_cast` will answer.
    pub fn learn_spell(&self, spell: SpellId, check: CastResult) {
        write(&self.spells).insert(spell, check);
    }

    /// Make every subsequent `store_item` into `actor`'s bags fail.
    pub fn fail_stores_for(&self, actor: ActorId) {
        write(&self.fail_store_for).insert(actor);
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn gold_of(&self, id: ActorId) -> u64 {
        read(&self.actors).get(&id).map(|a| a.gold).unwrap_or(0)
    }

    pub fn items_of(&self, id: ActorId) -> Vec<ItemId> {
        read(&self.actors)
            .get(&id)
            .map(|a| a.bag.clone())
            .unwrap_or_default()
    }

    pub fn holder_of(&self, item: ItemId) -> Option<ActorId> {
        read(&self.items).get(&item).and_then(|i| i.holder)
    }

    pub fn is_in_trade(&self, item: ItemId) -> bool {
        read(&self.items)
            .get(&item)
            .map(|i| i.view.in_trade)
            .unwrap_or(false)
    }

    pub fn enchant_of(&self, item: ItemId) -> Option<SpellId> {
        read(&self.items).get(&item).and_then(|i| i.enchant)
    }

    pub fn casts(&self) -> Vec<CastRequest> {
        self.casts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Notifications sent to `to`, oldest first, without draining.
    pub fn notifications_for(&self, to: ActorId) -> Vec<Notification> {
        self.outbox
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .filter(|(who, _)| *who == to)
            .map(|(_, n)| n.clone())
            .collect()
    }

    /// Drain every recorded notification.
    pub fn take_notifications(&self) -> Vec<(ActorId, Notification)> {
        std::mem::take(&mut *self.outbox.lock().unwrap_or_else(|p| p.into_inner()))
    }

    fn push(&self, to: ActorId, notification: Notification) {
        self.outbox
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((to, notification));
    }
}

impl ActorDirectory for MemoryWorld {
    fn actor(&self, id: ActorId) -> Result<ActorSnapshot, EngineError> {
        read(&self.actors)
            .get(&id)
            .map(|a| a.snapshot.clone())
            .ok_or(EngineError::NotFound(id))
    }

    fn actors_near(&self, around: ActorId, range: f32) -> Vec<ActorId> {
        let actors = read(&self.actors);
        let Some(center) = actors.get(&around).map(|a| a.snapshot.position) else {
            return Vec::new();
        };
        let mut near: Vec<ActorId> = actors
            .values()
            .filter(|a| a.snapshot.id != around && a.snapshot.alive)
            .filter(|a| a.snapshot.position.within(&center, range))
            .map(|a| a.snapshot.id)
            .collect();
        near.sort();
        near
    }
}

impl InventoryService for MemoryWorld {
    fn item(&self, owner: ActorId, item: ItemId) -> Option<ItemView> {
        read(&self.items)
            .get(&item)
            .filter(|i| i.holder == Some(owner))
            .map(|i| i.view.clone())
    }

    fn gold(&self, actor: ActorId) -> Result<u64, EngineError> {
        read(&self.actors)
            .get(&actor)
            .map(|a| a.gold)
            .ok_or(EngineError::NotFound(actor))
    }

    fn can_store_batch(&self, actor: ActorId, incoming: &[ItemId]) -> InventoryResult {
        let actors = read(&self.actors);
        let items = read(&self.items);
        let Some(dest) = actors.get(&actor) else {
            return InventoryResult::ItemNotFound;
        };
        let free = dest.bag_slots.saturating_sub(dest.bag.len());
        if incoming.len() > free {
            return InventoryResult::BagFull;
        }

        let mut per_category: HashMap<u32, (u32, u32)> = HashMap::new();
        for id in dest.bag.iter().chain(incoming.iter()) {
            let Some(record) = items.get(id) else {
                if incoming.contains(id) {
                    return InventoryResult::ItemNotFound;
                }
                continue;
            };
            if let Some((category, max)) = record.limit_category {
                let entry = per_category.entry(category).or_insert((0, max));
                entry.0 += record.view.count;
            }
        }
        for (category, (count, max)) in per_category {
            if count > max {
                return InventoryResult::ItemMaxLimitCategoryExceeded { category };
            }
        }
        InventoryResult::Ok
    }

    fn take_item(&self, owner: ActorId, item: ItemId) -> Result<ItemView, EngineError> {
        let mut actors = write(&self.actors);
        let mut items = write(&self.items);
        let record = items
            .get_mut(&item)
            .filter(|i| i.holder == Some(owner))
            .ok_or(EngineError::ItemMissing(item))?;
        record.holder = None;
        if let Some(actor) = actors.get_mut(&owner) {
            actor.bag.retain(|i| *i != item);
        }
        Ok(record.view.clone())
    }

    fn store_item(&self, owner: ActorId, item: ItemId) -> Result<(), EngineError> {
        if read(&self.fail_store_for).contains(&owner) {
            return Err(EngineError::Rejected(InventoryResult::BagFull));
        }
        let mut actors = write(&self.actors);
        let mut items = write(&self.items);
        let record = items
            .get_mut(&item)
            .filter(|i| i.holder.is_none())
            .ok_or(EngineError::ItemMissing(item))?;
        let actor = actors.get_mut(&owner).ok_or(EngineError::NotFound(owner))?;
        if actor.bag.len() >= actor.bag_slots {
            return Err(EngineError::Rejected(InventoryResult::BagFull));
        }
        actor.bag.push(item);
        record.holder = Some(owner);
        record.view.owner = owner;
        Ok(())
    }

    fn modify_gold(&self, actor: ActorId, delta: i64) -> Result<u64, EngineError> {
        let mut actors = write(&self.actors);
        let record = actors.get_mut(&actor).ok_or(EngineError::NotFound(actor))?;
        let updated = if delta >= 0 {
            record.gold.checked_add(delta.unsigned_abs())
        } else {
            record.gold.checked_sub(delta.unsigned_abs())
        };
        record.gold = updated.ok_or(EngineError::Rejected(if delta >= 0 {
            InventoryResult::TooMuchGold
        } else {
            InventoryResult::NotEnoughMoney
        }))?;
        Ok(record.gold)
    }

    fn set_in_trade(&self, item: ItemId, locked: bool) {
        if let Some(record) = write(&self.items).get_mut(&item) {
            record.view.in_trade = locked;
        }
    }

    fn snapshot(&self, actor: ActorId) -> Result<InventorySnapshot, EngineError> {
        let actors = read(&self.actors);
        let record = actors.get(&actor).ok_or(EngineError::NotFound(actor))?;
        let items = read(&self.items);
        Ok(InventorySnapshot {
            actor,
            gold: record.gold,
            items: record
                .bag
                .iter()
                .filter_map(|id| items.get(id).map(|i| i.view.clone()))
                .collect(),
        })
    }
}

impl SpellService for MemoryWorld {
    fn check_cast(&self, request: &CastRequest) -> CastResult {
        let Some(result) = read(&self.spells).get(&request.spell).copied() else {
            return CastResult::UnknownSpell;
        };
        let caster_alive = read(&self.actors)
            .get(&request.caster)
            .map(|a| a.snapshot.alive)
            .unwrap_or(false);
        if !caster_alive {
            return CastResult::CasterDead;
        }
        if let Some(item) = request.cast_item {
            if self.item(request.caster, item).is_none() {
                return CastResult::ItemGone;
            }
        }
        result
    }

    fn cast(&self, request: &CastRequest) -> CastResult {
        let result = self.check_cast(request);
        if !result.is_ok() {
            return result;
        }
        if let CastTarget::TradeItem { item, .. } = request.target {
            if let Some(record) = write(&self.items).get_mut(&item) {
                record.enchant = Some(request.spell);
            }
        }
        self.casts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(*request);
        result
    }
}

impl Notifier for MemoryWorld {
    fn trade_status(&self, to: ActorId, info: &TradeStatusInfo) {
        self.push(to, Notification::TradeStatus(info.clone()));
    }

    fn trade_window(&self, to: ActorId, window: &TradeWindow) {
        self.push(to, Notification::TradeWindow(window.clone()));
    }

    fn cast_result(&self, to: ActorId, spell: SpellId, result: CastResult) {
        self.push(to, Notification::CastResult { spell, result });
    }

    fn say(&self, actor: ActorId, line: u8) {
        self.push(actor, Notification::Say(line));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_store_respects_free_slots() {
        let world = MemoryWorld::new();
        let alice = world.add_player("Alice");
        let bob = world.add_player("Bob");
        world.set_bag_slots(alice, 2);
        let a = world.give_item(bob, ItemSpec::new(10, "Copper Bar"));
        let b = world.give_item(bob, ItemSpec::new(11, "Tin Bar"));
        let c = world.give_item(bob, ItemSpec::new(12, "Iron Bar"));
        assert_eq!(world.can_store_batch(alice, &[a, b]), InventoryResult::Ok);
        assert_eq!(world.can_store_batch(alice, &[a, b, c]), InventoryResult::BagFull);
    }

    #[test]
    fn batch_store_checks_limit_categories() {
        let world = MemoryWorld::new();
        let alice = world.add_player("Alice");
        let bob = world.add_player("Bob");
        world.give_item(alice, ItemSpec::new(20, "Healthstone").limited(7, 1));
        let second = world.give_item(bob, ItemSpec::new(20, "Healthstone").limited(7, 1));
        assert_eq!(
            world.can_store_batch(alice, &[second]),
            InventoryResult::ItemMaxLimitCategoryExceeded { category: 7 }
        );
    }

    #[test]
    fn take_then_store_moves_ownership() {
        let world = MemoryWorld::new();
        let alice = world.add_player("Alice");
        let bob = world.add_player("Bob");
        let item = world.give_item(alice, ItemSpec::new(30, "Runecloth"));
        world.take_item(alice, item).expect("take");
        assert_eq!(world.holder_of(item), None);
        assert!(world.item(alice, item).is_none());
        world.store_item(bob, item).expect("store");
        assert_eq!(world.holder_of(item), Some(bob));
        assert_eq!(world.item(bob, item).map(|v| v.owner), Some(bob));
    }

    #[test]
    fn gold_cannot_go_negative() {
        let world = MemoryWorld::new();
        let alice = world.add_player("Alice");
        world.set_gold(alice, 5);
        assert_eq!(
            world.modify_gold(alice, -6),
            Err(EngineError::Rejected(InventoryResult::NotEnoughMoney))
        );
        assert_eq!(world.modify_gold(alice, 10), Ok(15));
    }

    #[test]
    fn actors_near_filters_by_range_and_map() {
        let world = MemoryWorld::new();
        let boss = world.add_player("Boss");
        let near = world.add_player("Near");
        let far = world.add_player("Far");
        let other_map = world.add_player("Elsewhere");
        world.set_position(near, Position::new(0, 5.0, 0.0, 0.0));
        world.set_position(far, Position::new(0, 50.0, 0.0, 0.0));
        world.set_position(other_map, Position::new(1, 1.0, 0.0, 0.0));
        assert_eq!(world.actors_near(boss, 10.0), vec![near]);
    }
}
