//! Undo log for the commit step.
//!
//! Every engine mutation performed while executing a trade is recorded here
//! first. If a later step fails, [`TransferJournal::rollback`] replays the
//! inverse of each completed step in reverse order so no item or gold is
//! lost in transit.

use log::{debug, error, warn};

use crate::engine::{ActorId, InventoryService, ItemId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStep {
    /// Item detached from `owner`'s bags.
    Took { owner: ActorId, item: ItemId },
    /// Item placed into `owner`'s bags.
    Stored { owner: ActorId, item: ItemId },
    /// Gold changed by `delta`.
    Gold { actor: ActorId, delta: i64 },
}

#[derive(Debug, Default)]
pub struct TransferJournal {
    steps: Vec<JournalStep>,
}

impl TransferJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: JournalStep) {
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[JournalStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Undo every recorded step, newest first. Returns the number of steps
    /// that could not be undone; each one is logged to the security target.
    pub fn rollback(self, inventory: &dyn InventoryService) -> usize {
        let mut failures = 0;
        for step in self.steps.into_iter().rev() {
            let outcome = match step {
                JournalStep::Stored { owner, item } => inventory.take_item(owner, item).map(|_| ()),
                JournalStep::Took { owner, item } => inventory.store_item(owner, item),
                JournalStep::Gold { actor, delta } => {
                    inventory.modify_gold(actor, -delta).map(|_| ())
                }
            };
            match outcome {
                Ok(()) => debug!("rolled back {:?}", step),
                Err(e) => {
                    failures += 1;
                    error!(target: "security", "rollback of {:?} failed: {}", step, e);
                }
            }
        }
        if failures > 0 {
            warn!("trade rollback finished with {} unrecoverable step(s)", failures);
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ItemSpec, MemoryWorld};

    #[test]
    fn rollback_restores_items_and_gold() {
        let world = MemoryWorld::new();
        let alice = world.add_player("Alice");
        let bob = world.add_player("Bob");
        world.set_gold(alice, 100);
        let sword = world.give_item(alice, ItemSpec::new(1, "Sword"));

        let mut journal = TransferJournal::new();
        world.take_item(alice, sword).expect("take");
        journal.record(JournalStep::Took { owner: alice, item: sword });
        world.store_item(bob, sword).expect("store");
        journal.record(JournalStep::Stored { owner: bob, item: sword });
        world.modify_gold(alice, -40).expect("debit");
        journal.record(JournalStep::Gold { actor: alice, delta: -40 });
        world.modify_gold(bob, 40).expect("credit");
        journal.record(JournalStep::Gold { actor: bob, delta: 40 });

        assert_eq!(journal.rollback(&world), 0);
        assert_eq!(world.holder_of(sword), Some(alice));
        assert_eq!(world.gold_of(alice), 100);
        assert_eq!(world.gold_of(bob), 0);
    }

    #[test]
    fn empty_journal_is_a_noop() {
        let world = MemoryWorld::new();
        let journal = TransferJournal::new();
        assert!(journal.is_empty());
        assert_eq!(journal.rollback(&world), 0);
    }
}
