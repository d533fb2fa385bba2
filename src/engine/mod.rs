//! Narrow capability interfaces to the host engine.
//!
//! The trade and behavior layers never reach for global managers. Everything
//! they need from the world (actor lookup, inventory, spells, messaging) comes
//! in through these traits, bundled once at startup in [`EngineServices`] and
//! passed down. [`memory::MemoryWorld`] implements all of them for tests and
//! the CLI simulator.

pub mod memory;
pub mod types;

use std::sync::Arc;

use thiserror::Error;

use crate::trade::{TradeStatusInfo, TradeWindow};

pub use memory::{ItemSpec, MemoryWorld, Notification};
pub use types::*;

/// Errors reported by engine capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// The handle no longer resolves (logged out, despawned).
    #[error("{0} not found")]
    NotFound(ActorId),

    /// The item is not where the caller expected it.
    #[error("{0} is missing")]
    ItemMissing(ItemId),

    /// The inventory refused the operation.
    #[error("inventory rejected operation: {0}")]
    Rejected(InventoryResult),
}

/// Identity & lookup.
pub trait ActorDirectory: Send + Sync {
    fn actor(&self, id: ActorId) -> Result<ActorSnapshot, EngineError>;

    /// Living actors within `range` of `around`, excluding `around` itself.
    fn actors_near(&self, around: ActorId, range: f32) -> Vec<ActorId>;
}

/// Inventory and currency.
pub trait InventoryService: Send + Sync {
    /// The item, if `owner` currently holds it.
    fn item(&self, owner: ActorId, item: ItemId) -> Option<ItemView>;

    fn gold(&self, actor: ActorId) -> Result<u64, EngineError>;

    /// Whether `actor` can receive all of `items` at once.
    fn can_store_batch(&self, actor: ActorId, items: &[ItemId]) -> InventoryResult;

    /// Detach the item from `owner`'s bags. The item is ownerless until stored.
    fn take_item(&self, owner: ActorId, item: ItemId) -> Result<ItemView, EngineError>;

    fn store_item(&self, owner: ActorId, item: ItemId) -> Result<(), EngineError>;

    /// Apply a signed gold change, returning the new balance.
    fn modify_gold(&self, actor: ActorId, delta: i64) -> Result<u64, EngineError>;

    /// Mark an item as locked by an in-progress trade commit.
    fn set_in_trade(&self, item: ItemId, locked: bool);

    fn snapshot(&self, actor: ActorId) -> Result<InventorySnapshot, EngineError>;
}

/// Spell validation and execution.
pub trait SpellService: Send + Sync {
    fn check_cast(&self, request: &CastRequest) -> CastResult;
    fn cast(&self, request: &CastRequest) -> CastResult;
}

/// Outbound, fire-and-forget messages to clients.
pub trait Notifier: Send + Sync {
    fn trade_status(&self, to: ActorId, info: &TradeStatusInfo);
    fn trade_window(&self, to: ActorId, window: &TradeWindow);
    fn cast_result(&self, to: ActorId, spell: SpellId, result: CastResult);
    /// Scripted creature speech, by text line index.
    fn say(&self, actor: ActorId, line: u8);
}

/// Capability bundle built once at startup.
#[derive(Clone)]
pub struct EngineServices {
    pub directory: Arc<dyn ActorDirectory>,
    pub inventory: Arc<dyn InventoryService>,
    pub spells: Arc<dyn SpellService>,
    pub notifier: Arc<dyn Notifier>,
}

impl EngineServices {
    /// Use one object for every capability.
    pub fn from_world<W>(world: Arc<W>) -> Self
    where
        W: ActorDirectory + InventoryService + SpellService + Notifier + 'static,
    {
        Self {
            directory: world.clone(),
            inventory: world.clone(),
            spells: world.clone(),
            notifier: world,
        }
    }
}
