//! Blood queen encounter.
//!
//! Ground phase abilities run in two groups: `NORMAL` abilities are pushed
//! back 10 s when the air phase starts, `CANCELLABLE` ones (blood mirror) are
//! dropped and restarted on landing. The air phase itself is a chain of
//! scripted moves: center, up, hover, back down.

use std::time::Duration;

use log::debug;

use crate::behavior::{Behavior, Flow, PhaseMachine, ScriptContext};
use crate::engine::{ActorId, SpellId};
use crate::events::{EventGroup, EventScheduler, FiredEvent};

pub const GROUP_NORMAL: EventGroup = 1;
pub const GROUP_CANCELLABLE: EventGroup = 2;

pub const POINT_CENTER: u32 = 1;
pub const POINT_AIR: u32 = 2;
pub const POINT_GROUND: u32 = 3;
pub const POINT_MINCHAR: u32 = 4;

/// A player left the arena; teleport them back by force.
pub const ACTION_KILL_MINCHAR: i32 = 1;

pub const SAY_AGGRO: u8 = 0;
pub const SAY_VAMPIRIC_BITE: u8 = 1;
pub const SAY_SWARMING_SHADOWS: u8 = 4;
pub const SAY_PACT_OF_THE_DARKFALLEN: u8 = 6;
pub const SAY_AIR_PHASE: u8 = 7;
pub const SAY_BERSERK: u8 = 10;
pub const SAY_DEATH: u8 = 11;

pub const SPELL_SHROUD_OF_SORROW: SpellId = SpellId(70986);
pub const SPELL_VAMPIRIC_BITE: SpellId = SpellId(71726);
pub const SPELL_BLOOD_MIRROR: SpellId = SpellId(71510);
pub const SPELL_DELIRIOUS_SLASH: SpellId = SpellId(71623);
pub const SPELL_PACT_OF_THE_DARKFALLEN: SpellId = SpellId(71340);
pub const SPELL_SWARMING_SHADOWS: SpellId = SpellId(71264);
pub const SPELL_TWILIGHT_BLOODBOLT_TARGET: SpellId = SpellId(71445);
pub const SPELL_TWILIGHT_BLOODBOLT: SpellId = SpellId(71446);
pub const SPELL_INCITE_TERROR: SpellId = SpellId(73070);
pub const SPELL_BLOODBOLT_WHIRL: SpellId = SpellId(71772);
pub const SPELL_ANNIHILATE: SpellId = SpellId(71322);
pub const SPELL_BERSERK: SpellId = SpellId(26662);

/// Every spell the queen casts.
pub const SPELLS: &[SpellId] = &[
    SPELL_SHROUD_OF_SORROW,
    SPELL_VAMPIRIC_BITE,
    SPELL_BLOOD_MIRROR,
    SPELL_DELIRIOUS_SLASH,
    SPELL_PACT_OF_THE_DARKFALLEN,
    SPELL_SWARMING_SHADOWS,
    SPELL_TWILIGHT_BLOODBOLT_TARGET,
    SPELL_TWILIGHT_BLOODBOLT,
    SPELL_INCITE_TERROR,
    SPELL_BLOODBOLT_WHIRL,
    SPELL_ANNIHILATE,
    SPELL_BERSERK,
];

const TARGET_RANGE: f32 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueenEvent {
    Berserk,
    VampiricBite,
    BloodMirror,
    DeliriousSlash,
    PactOfTheDarkfallen,
    SwarmingShadows,
    TwilightBloodbolt,
    AirPhase,
    AirStartFlying,
    AirFlyDown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueenPhase {
    Ground,
    MovingToCenter,
    Centered,
    Ascending,
    Airborne,
    Descending,
    /// Flying to a player who left the arena.
    Punishing,
}

fn phases() -> PhaseMachine<QueenPhase> {
    use QueenPhase::*;
    PhaseMachine::new(Ground)
        .allow(Ground, MovingToCenter)
        .allow(MovingToCenter, Centered)
        .allow(Centered, Ascending)
        .allow(Ascending, Airborne)
        .allow(Airborne, Descending)
        .allow(Descending, Ground)
        .allow(Ground, Punishing)
        .allow(MovingToCenter, Punishing)
        .allow(Centered, Punishing)
        .allow(Descending, Punishing)
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[derive(Debug)]
pub struct BloodQueen {
    phase: PhaseMachine<QueenPhase>,
    offtank: Option<ActorId>,
    vampires: Vec<ActorId>,
    evade: bool,
}

impl Default for BloodQueen {
    fn default() -> Self {
        Self::new()
    }
}

impl BloodQueen {
    pub fn new() -> Self {
        Self {
            phase: phases(),
            offtank: None,
            vampires: Vec::new(),
            evade: false,
        }
    }

    pub fn phase(&self) -> QueenPhase {
        self.phase.current()
    }

    pub fn offtank(&self) -> Option<ActorId> {
        self.offtank
    }

    /// Players bitten so far this attempt.
    pub fn vampires(&self) -> &[ActorId] {
        &self.vampires
    }

    fn enter(&mut self, to: QueenPhase) -> bool {
        match self.phase.transition(to) {
            Ok(_) => true,
            Err(e) => {
                debug!("blood queen: {}", e);
                false
            }
        }
    }
}

impl Behavior for BloodQueen {
    type Event = QueenEvent;

    fn reset(&mut self, _events: &mut EventScheduler<QueenEvent>) {
        self.phase.reset();
        self.offtank = None;
        self.vampires.clear();
        self.evade = false;
    }

    fn engage(&mut self, ctx: &mut ScriptContext<'_, QueenEvent>) {
        use QueenEvent::*;
        let ev = &mut *ctx.events;
        ev.schedule(Berserk, secs(330), 0);
        ev.schedule(VampiricBite, secs(15), 0);
        ev.schedule_repeating(BloodMirror, millis(2500), millis(2500), GROUP_CANCELLABLE);
        ev.schedule_repeating(DeliriousSlash, secs(20), secs(24), GROUP_NORMAL);
        ev.schedule(PactOfTheDarkfallen, secs(15), GROUP_NORMAL);
        ev.schedule(SwarmingShadows, millis(30_500), GROUP_NORMAL);
        ev.schedule_range(TwilightBloodbolt, secs(20), secs(25), GROUP_NORMAL);
        let air = if ctx.heroic() { secs(127) } else { secs(124) };
        ctx.events.schedule(AirPhase, air, 0);
        ctx.say(SAY_AGGRO);
        ctx.cast_self(SPELL_SHROUD_OF_SORROW);
    }

    fn handle(&mut self, fired: FiredEvent<QueenEvent>, ctx: &mut ScriptContext<'_, QueenEvent>) -> Flow {
        use QueenEvent::*;
        match fired.id {
            Berserk => {
                ctx.say(SAY_BERSERK);
                ctx.cast_self(SPELL_BERSERK);
            }
            VampiricBite => {
                if let Some(target) = ctx.random_target(TARGET_RANGE) {
                    ctx.cast_on(target, SPELL_VAMPIRIC_BITE);
                    ctx.say(SAY_VAMPIRIC_BITE);
                    self.vampires.push(target);
                }
            }
            BloodMirror => {
                match ctx.random_target(TARGET_RANGE) {
                    Some(target) if self.offtank != Some(target) => {
                        self.offtank = Some(target);
                        ctx.cast_on(target, SPELL_BLOOD_MIRROR);
                    }
                    Some(_) => {}
                    None => self.offtank = None,
                }
                ctx.events.repeat(&fired);
            }
            DeliriousSlash => {
                if let Some(offtank) = self.offtank {
                    if self.phase.is(QueenPhase::Ground) {
                        ctx.cast_on(offtank, SPELL_DELIRIOUS_SLASH);
                    }
                }
                ctx.events.repeat(&fired);
            }
            PactOfTheDarkfallen => {
                let count = if ctx.heroic() { 3 } else { 2 };
                let targets = ctx.random_targets(TARGET_RANGE, count);
                if targets.len() > 1 {
                    ctx.say(SAY_PACT_OF_THE_DARKFALLEN);
                    for target in targets {
                        ctx.cast_on(target, SPELL_PACT_OF_THE_DARKFALLEN);
                    }
                }
                ctx.events.schedule(PactOfTheDarkfallen, millis(30_500), GROUP_NORMAL);
            }
            SwarmingShadows => {
                if let Some(target) = ctx.random_target(TARGET_RANGE) {
                    ctx.say(SAY_SWARMING_SHADOWS);
                    ctx.cast_on(target, SPELL_SWARMING_SHADOWS);
                }
                ctx.events.schedule(SwarmingShadows, millis(30_500), GROUP_NORMAL);
            }
            TwilightBloodbolt => {
                let count = if ctx.heroic() { 4 } else { 2 };
                for target in ctx.random_targets(TARGET_RANGE, count) {
                    ctx.cast_on(target, SPELL_TWILIGHT_BLOODBOLT);
                }
                ctx.cast_self(SPELL_TWILIGHT_BLOODBOLT_TARGET);
                ctx.events.schedule_range(TwilightBloodbolt, secs(10), secs(15), GROUP_NORMAL);
            }
            AirPhase => {
                if self.enter(QueenPhase::MovingToCenter) {
                    ctx.events.delay_group(GROUP_NORMAL, secs(10));
                    ctx.events.cancel_group(GROUP_CANCELLABLE);
                    ctx.move_to(POINT_CENTER);
                } else {
                    // busy with a punishment; try again shortly
                    ctx.events.schedule(AirPhase, secs(1), 0);
                }
            }
            AirStartFlying => {
                if self.enter(QueenPhase::Ascending) {
                    ctx.move_to(POINT_AIR);
                }
            }
            AirFlyDown => {
                if self.enter(QueenPhase::Descending) {
                    ctx.move_to(POINT_GROUND);
                }
            }
        }
        Flow::Continue
    }

    fn on_action(&mut self, action: i32, ctx: &mut ScriptContext<'_, QueenEvent>) {
        if action == ACTION_KILL_MINCHAR && self.enter(QueenPhase::Punishing) {
            ctx.move_to(POINT_MINCHAR);
        }
    }

    fn on_movement_complete(&mut self, point: u32, ctx: &mut ScriptContext<'_, QueenEvent>) {
        use QueenEvent::*;
        match point {
            POINT_CENTER if self.enter(QueenPhase::Centered) => {
                ctx.cast_self(SPELL_INCITE_TERROR);
                let next = if ctx.heroic() { secs(100) } else { secs(120) };
                ctx.events.schedule(AirPhase, next, 0);
                ctx.events.reschedule(SwarmingShadows, millis(30_500), GROUP_NORMAL);
                ctx.events.reschedule(PactOfTheDarkfallen, millis(25_500), GROUP_NORMAL);
                ctx.events.schedule(AirStartFlying, secs(5), 0);
            }
            POINT_AIR if self.enter(QueenPhase::Airborne) => {
                ctx.cast_self(SPELL_BLOODBOLT_WHIRL);
                ctx.say(SAY_AIR_PHASE);
                ctx.events.schedule(AirFlyDown, secs(10), 0);
            }
            POINT_GROUND if self.enter(QueenPhase::Ground) => {
                ctx.events
                    .schedule_repeating(BloodMirror, millis(2500), millis(2500), GROUP_CANCELLABLE);
            }
            POINT_MINCHAR if self.phase.is(QueenPhase::Punishing) => {
                ctx.cast_self(SPELL_ANNIHILATE);
                self.evade = true;
            }
            _ => {}
        }
    }

    fn on_death(&mut self, ctx: &mut ScriptContext<'_, QueenEvent>) {
        ctx.say(SAY_DEATH);
    }

    fn wants_evade(&self) -> bool {
        self.evade
    }
}
