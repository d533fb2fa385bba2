use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle to a live actor (player or creature). Resolve it through
/// [`ActorDirectory`](super::ActorDirectory); never hold references across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActorId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SpellId(pub u32);

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

impl fmt::Display for SpellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spell#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Faction {
    Alliance,
    Horde,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub map: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(map: u32, x: f32, y: f32, z: f32) -> Self {
        Self { map, x, y, z }
    }

    /// Straight-line distance, or `None` when the positions are on different maps.
    pub fn distance_to(&self, other: &Position) -> Option<f32> {
        if self.map != other.map {
            return None;
        }
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        Some((dx * dx + dy * dy + dz * dz).sqrt())
    }

    pub fn within(&self, other: &Position, range: f32) -> bool {
        self.distance_to(other).map(|d| d <= range).unwrap_or(false)
    }
}

/// Point-in-time view of an actor as the engine reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorSnapshot {
    pub id: ActorId,
    pub name: String,
    pub level: u8,
    pub faction: Faction,
    pub position: Position,
    pub alive: bool,
    pub stunned: bool,
    pub logging_out: bool,
    /// Riding a taxi, boat or similar; not interactable.
    pub in_transit: bool,
    /// Allowed to trade across factions regardless of realm settings.
    pub cross_faction_exempt: bool,
}

/// An item slot's engine-side state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemView {
    pub id: ItemId,
    /// Template entry.
    pub entry: u32,
    pub name: String,
    pub owner: ActorId,
    pub count: u32,
    pub tradeable: bool,
    pub bound_to: Option<ActorId>,
    pub in_trade: bool,
}

impl ItemView {
    /// Soulbound to someone other than `actor`.
    pub fn is_bound_not_with(&self, actor: ActorId) -> bool {
        matches!(self.bound_to, Some(bound) if bound != actor)
    }
}

/// Everything the commit step persists for one participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub actor: ActorId,
    pub gold: u64,
    pub items: Vec<ItemView>,
}

/// Inventory operation result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryResult {
    Ok,
    BagFull,
    NotEnoughMoney,
    TooMuchGold,
    CantCarryMoreOfThis,
    ItemMaxLimitCategoryExceeded { category: u32 },
    TradeBoundItem,
    ItemNotFound,
}

impl InventoryResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, InventoryResult::Ok)
    }
}

impl fmt::Display for InventoryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InventoryResult::Ok => write!(f, "ok"),
            InventoryResult::BagFull => write!(f, "inventory is full"),
            InventoryResult::NotEnoughMoney => write!(f, "not enough money"),
            InventoryResult::TooMuchGold => write!(f, "at gold limit"),
            InventoryResult::CantCarryMoreOfThis => write!(f, "cannot carry more of this item"),
            InventoryResult::ItemMaxLimitCategoryExceeded { category } => {
                write!(f, "item limit category {} exceeded", category)
            }
            InventoryResult::TradeBoundItem => write!(f, "cannot trade a bound item"),
            InventoryResult::ItemNotFound => write!(f, "item not found"),
        }
    }
}

/// Where a spell is aimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastTarget {
    Caster,
    Actor(ActorId),
    /// Item sitting in a trade window (enchant-on-trade).
    TradeItem { owner: ActorId, item: ItemId },
    /// Untargeted area effect around the caster.
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastRequest {
    pub caster: ActorId,
    pub spell: SpellId,
    pub target: CastTarget,
    /// Item consumed or used to cast (scrolls, enchant vellums).
    pub cast_item: Option<ItemId>,
}

impl CastRequest {
    pub fn new(caster: ActorId, spell: SpellId, target: CastTarget) -> Self {
        Self {
            caster,
            spell,
            target,
            cast_item: None,
        }
    }

    pub fn with_item(mut self, item: Option<ItemId>) -> Self {
        self.cast_item = item;
        self
    }
}

/// Spell validation / execution result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastResult {
    Ok,
    UnknownSpell,
    BadTargets,
    ItemGone,
    NotReady,
    OutOfRange,
    CasterDead,
}

impl CastResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, CastResult::Ok)
    }
}
