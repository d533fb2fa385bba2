//! Plague abomination encounter.
//!
//! Mutated infection recurs on a cooldown that shrinks by 2 s each time the
//! infection hastens (every 90 s, at most four times: 14 s down to 6 s).
//! Slime spray is a channelled self-cast, so the script yields after it.
//! Vile gas only runs on heroic difficulty.

use std::time::Duration;

use crate::behavior::{Behavior, Flow, PhaseMachine, ScriptContext};
use crate::engine::SpellId;
use crate::events::{EventScheduler, FiredEvent};

pub const SPELL_SLIME_SPRAY: SpellId = SpellId(69508);
pub const SPELL_MUTATED_INFECTION: SpellId = SpellId(69674);
pub const SPELL_VILE_GAS_TRIGGER: SpellId = SpellId(72285);

pub const SPELLS: &[SpellId] = &[SPELL_SLIME_SPRAY, SPELL_MUTATED_INFECTION, SPELL_VILE_GAS_TRIGGER];

pub const SAY_PRECIOUS_DIES: u8 = 0;
pub const SAY_AGGRO: u8 = 1;
pub const EMOTE_SLIME_SPRAY: u8 = 2;
pub const SAY_DEATH: u8 = 8;

/// Sent by the abomination's pet when it dies.
pub const ACTION_PRECIOUS_DIED: i32 = 1;

pub const MAX_HASTE_STAGES: u8 = 4;
const BASE_INFECTION_COOLDOWN: Duration = Duration::from_secs(14);
const HASTE_STEP: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlagueEvent {
    SlimeSpray,
    HastenInfections,
    MutatedInfection,
    VileGas,
}

fn stages() -> PhaseMachine<u8> {
    (0..MAX_HASTE_STAGES).fold(PhaseMachine::new(0), |m, stage| m.allow(stage, stage + 1))
}

#[derive(Debug)]
pub struct PlagueAbomination {
    stage: PhaseMachine<u8>,
}

impl Default for PlagueAbomination {
    fn default() -> Self {
        Self::new()
    }
}

impl PlagueAbomination {
    pub fn new() -> Self {
        Self { stage: stages() }
    }

    /// Completed haste stages, `0..=MAX_HASTE_STAGES`.
    pub fn haste_stage(&self) -> u8 {
        self.stage.current()
    }

    pub fn infection_cooldown(&self) -> Duration {
        BASE_INFECTION_COOLDOWN - HASTE_STEP * u32::from(self.stage.current())
    }
}

impl Behavior for PlagueAbomination {
    type Event = PlagueEvent;

    fn reset(&mut self, _events: &mut EventScheduler<PlagueEvent>) {
        self.stage.reset();
    }

    fn engage(&mut self, ctx: &mut ScriptContext<'_, PlagueEvent>) {
        ctx.events.schedule(PlagueEvent::SlimeSpray, Duration::from_secs(20), 0);
        ctx.events
            .schedule(PlagueEvent::HastenInfections, Duration::from_secs(90), 0);
        ctx.events
            .schedule(PlagueEvent::MutatedInfection, self.infection_cooldown(), 0);
        if ctx.heroic() {
            ctx.events.schedule_range(
                PlagueEvent::VileGas,
                Duration::from_secs(22),
                Duration::from_secs(27),
                0,
            );
        }
        ctx.say(SAY_AGGRO);
    }

    fn handle(&mut self, fired: FiredEvent<PlagueEvent>, ctx: &mut ScriptContext<'_, PlagueEvent>) -> Flow {
        match fired.id {
            PlagueEvent::SlimeSpray => {
                ctx.say(EMOTE_SLIME_SPRAY);
                ctx.cast_self(SPELL_SLIME_SPRAY);
                ctx.events.schedule(PlagueEvent::SlimeSpray, Duration::from_secs(20), 0);
                return Flow::Yield;
            }
            PlagueEvent::HastenInfections => {
                let next = self.stage.current() + 1;
                if self.stage.transition(next).is_ok() {
                    ctx.events
                        .schedule(PlagueEvent::HastenInfections, Duration::from_secs(90), 0);
                }
            }
            PlagueEvent::MutatedInfection => {
                ctx.cast_aoe(SPELL_MUTATED_INFECTION);
                ctx.events
                    .schedule(PlagueEvent::MutatedInfection, self.infection_cooldown(), 0);
            }
            PlagueEvent::VileGas => {
                ctx.cast_aoe(SPELL_VILE_GAS_TRIGGER);
                ctx.events.schedule_range(
                    PlagueEvent::VileGas,
                    Duration::from_secs(30),
                    Duration::from_secs(35),
                    0,
                );
            }
        }
        Flow::Continue
    }

    fn on_action(&mut self, action: i32, ctx: &mut ScriptContext<'_, PlagueEvent>) {
        if action == ACTION_PRECIOUS_DIED {
            ctx.say(SAY_PRECIOUS_DIES);
        }
    }

    fn on_death(&mut self, ctx: &mut ScriptContext<'_, PlagueEvent>) {
        ctx.say(SAY_DEATH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::ScriptedActor;
    use crate::engine::{EngineServices, MemoryWorld, Notification};
    use std::sync::Arc;

    fn abomination(heroic: bool) -> (Arc<MemoryWorld>, ScriptedActor<PlagueAbomination>) {
        let world = Arc::new(MemoryWorld::new());
        let me = world.add_player("Abomination");
        let actor = ScriptedActor::with_seed(
            me,
            PlagueAbomination::new(),
            EngineServices::from_world(world.clone()),
            3,
        )
        .heroic(heroic);
        (world, actor)
    }

    #[test]
    fn infection_cooldown_bottoms_out_after_four_stages() {
        let (_world, mut boss) = abomination(false);
        boss.engage();
        assert_eq!(boss.behavior().infection_cooldown(), Duration::from_secs(14));
        for stage in 1..=MAX_HASTE_STAGES {
            boss.tick(Duration::from_secs(90));
            // slime spray may have yielded before the haste fired
            while !boss.tick(Duration::ZERO).fired.is_empty() {}
            assert_eq!(boss.behavior().haste_stage(), stage);
        }
        assert_eq!(boss.behavior().infection_cooldown(), Duration::from_secs(6));

        // one more haste is queued but changes nothing and is not renewed
        assert!(boss.events().is_scheduled(PlagueEvent::HastenInfections));
        boss.tick(Duration::from_secs(90));
        while !boss.tick(Duration::ZERO).fired.is_empty() {}
        assert_eq!(boss.behavior().haste_stage(), MAX_HASTE_STAGES);
        assert!(!boss.events().is_scheduled(PlagueEvent::HastenInfections));
    }

    #[test]
    fn slime_spray_yields_the_tick() {
        let (_world, mut boss) = abomination(false);
        boss.engage();
        // infection (14s) fires first, then spray (20s) yields
        let report = boss.tick(Duration::from_secs(20));
        assert_eq!(
            report.fired,
            vec![PlagueEvent::MutatedInfection, PlagueEvent::SlimeSpray]
        );
        assert!(report.yielded);
    }

    #[test]
    fn vile_gas_is_heroic_only() {
        let (_world, mut normal) = abomination(false);
        normal.engage();
        assert!(!normal.events().is_scheduled(PlagueEvent::VileGas));

        let (_world, mut heroic) = abomination(true);
        heroic.engage();
        let first = heroic.events().time_until(PlagueEvent::VileGas).expect("scheduled");
        assert!(first >= Duration::from_secs(22) && first < Duration::from_secs(27));
    }

    #[test]
    fn pet_death_triggers_line() {
        let (world, mut boss) = abomination(false);
        let id = boss.id();
        boss.engage();
        boss.notify(ACTION_PRECIOUS_DIED);
        assert!(world
            .notifications_for(id)
            .contains(&Notification::Say(SAY_PRECIOUS_DIES)));
    }
}
