//! Scripted creature behaviors.
//!
//! A [`ScriptedActor`] owns one [`EventScheduler`] and one [`Behavior`]. The
//! host calls [`ScriptedActor::tick`] once per frame with the elapsed time;
//! the actor advances its scheduler and hands each ready event to the
//! behavior until the queue is drained or the behavior yields.
//!
//! Behaviors reach the world only through [`ScriptContext`], which wraps the
//! injected [`EngineServices`].

pub mod phase;
pub mod scripts;

use std::fmt::Debug;
use std::time::Duration;

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::engine::{ActorId, CastRequest, CastResult, CastTarget, EngineServices, SpellId};
use crate::events::{EventScheduler, FiredEvent};

pub use phase::{PhaseError, PhaseMachine};

/// What the runtime does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep draining ready events.
    Continue,
    /// Stop for this tick (e.g. the actor started casting). Remaining ready
    /// events fire on the next tick.
    Yield,
}

/// Narrow engine surface available to a behavior.
pub struct ScriptContext<'a, E> {
    pub events: &'a mut EventScheduler<E>,
    me: ActorId,
    heroic: bool,
    services: &'a EngineServices,
    rng: &'a mut StdRng,
    moves: &'a mut Vec<u32>,
}

impl<'a, E> ScriptContext<'a, E>
where
    E: Copy + Eq + Debug,
{
    pub fn me(&self) -> ActorId {
        self.me
    }

    pub fn heroic(&self) -> bool {
        self.heroic
    }

    pub fn cast(&self, spell: SpellId, target: CastTarget) -> CastResult {
        let result = self
            .services
            .spells
            .cast(&CastRequest::new(self.me, spell, target));
        trace!("{} casts {} on {:?}: {:?}", self.me, spell, target, result);
        result
    }

    pub fn cast_self(&self, spell: SpellId) -> CastResult {
        self.cast(spell, CastTarget::Caster)
    }

    pub fn cast_on(&self, target: ActorId, spell: SpellId) -> CastResult {
        self.cast(spell, CastTarget::Actor(target))
    }

    pub fn cast_aoe(&self, spell: SpellId) -> CastResult {
        self.cast(spell, CastTarget::Area)
    }

    pub fn say(&self, line: u8) {
        self.services.notifier.say(self.me, line);
    }

    /// One random living actor within `range`.
    pub fn random_target(&mut self, range: f32) -> Option<ActorId> {
        let near = self.services.directory.actors_near(self.me, range);
        near.choose(&mut *self.rng).copied()
    }

    /// Up to `count` distinct random actors within `range`.
    pub fn random_targets(&mut self, range: f32, count: usize) -> Vec<ActorId> {
        let near = self.services.directory.actors_near(self.me, range);
        near.choose_multiple(&mut *self.rng, count).copied().collect()
    }

    /// Ask the host to move this actor to a scripted point. The host reports
    /// arrival through [`ScriptedActor::movement_complete`].
    pub fn move_to(&mut self, point: u32) {
        self.moves.push(point);
    }
}

/// Per-creature script.
pub trait Behavior {
    type Event: Copy + Eq + Debug;

    /// Return to the spawn state. The scheduler has already been cleared.
    fn reset(&mut self, events: &mut EventScheduler<Self::Event>);

    /// Combat started: schedule the opening events.
    fn engage(&mut self, ctx: &mut ScriptContext<'_, Self::Event>);

    fn handle(
        &mut self,
        fired: FiredEvent<Self::Event>,
        ctx: &mut ScriptContext<'_, Self::Event>,
    ) -> Flow;

    /// Notification from another actor's script.
    fn on_action(&mut self, _action: i32, _ctx: &mut ScriptContext<'_, Self::Event>) {}

    fn on_movement_complete(&mut self, _point: u32, _ctx: &mut ScriptContext<'_, Self::Event>) {}

    fn on_death(&mut self, _ctx: &mut ScriptContext<'_, Self::Event>) {}

    /// Whether an action asked the runtime to evade (full reset).
    fn wants_evade(&self) -> bool {
        false
    }
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport<E> {
    pub fired: Vec<E>,
    pub yielded: bool,
}

impl<E> Default for TickReport<E> {
    fn default() -> Self {
        Self {
            fired: Vec::new(),
            yielded: false,
        }
    }
}

pub struct ScriptedActor<B: Behavior> {
    id: ActorId,
    behavior: B,
    events: EventScheduler<B::Event>,
    services: EngineServices,
    rng: StdRng,
    moves: Vec<u32>,
    heroic: bool,
    engaged: bool,
    dead: bool,
}

impl<B: Behavior> ScriptedActor<B> {
    pub fn new(id: ActorId, behavior: B, services: EngineServices) -> Self {
        Self::build(id, behavior, services, EventScheduler::new(), StdRng::from_entropy())
    }

    /// Deterministic actor: scheduler delays and target picks follow `seed`.
    pub fn with_seed(id: ActorId, behavior: B, services: EngineServices, seed: u64) -> Self {
        Self::build(
            id,
            behavior,
            services,
            EventScheduler::with_seed(seed),
            StdRng::seed_from_u64(seed.wrapping_add(1)),
        )
    }

    fn build(
        id: ActorId,
        mut behavior: B,
        services: EngineServices,
        mut events: EventScheduler<B::Event>,
        rng: StdRng,
    ) -> Self {
        behavior.reset(&mut events);
        Self {
            id,
            behavior,
            events,
            services,
            rng,
            moves: Vec::new(),
            heroic: false,
            engaged: false,
            dead: false,
        }
    }

    pub fn heroic(mut self, heroic: bool) -> Self {
        self.heroic = heroic;
        self
    }

    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn events(&self) -> &EventScheduler<B::Event> {
        &self.events
    }

    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Movement requests issued since the last call.
    pub fn take_movements(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.moves)
    }

    fn split(&mut self) -> (&mut B, ScriptContext<'_, B::Event>) {
        let Self {
            id,
            behavior,
            events,
            services,
            rng,
            moves,
            heroic,
            ..
        } = self;
        (
            behavior,
            ScriptContext {
                events,
                me: *id,
                heroic: *heroic,
                services,
                rng,
                moves,
            },
        )
    }

    pub fn engage(&mut self) {
        if self.engaged || self.dead {
            return;
        }
        self.engaged = true;
        debug!("{} engaged", self.id);
        let (behavior, mut ctx) = self.split();
        behavior.engage(&mut ctx);
    }

    /// Advance time and dispatch ready events. A no-op unless engaged.
    pub fn tick(&mut self, elapsed: Duration) -> TickReport<B::Event> {
        let mut report = TickReport::default();
        if !self.engaged {
            return report;
        }
        self.events.update(elapsed);
        let (behavior, mut ctx) = self.split();
        while let Some(fired) = ctx.events.poll() {
            report.fired.push(fired.id);
            if behavior.handle(fired, &mut ctx) == Flow::Yield {
                report.yielded = true;
                break;
            }
        }
        if self.behavior.wants_evade() {
            self.evade();
        }
        report
    }

    /// Deliver a cross-actor notification.
    pub fn notify(&mut self, action: i32) {
        if self.dead {
            return;
        }
        let (behavior, mut ctx) = self.split();
        behavior.on_action(action, &mut ctx);
        if self.behavior.wants_evade() {
            self.evade();
        }
    }

    pub fn movement_complete(&mut self, point: u32) {
        if !self.engaged {
            return;
        }
        let (behavior, mut ctx) = self.split();
        behavior.on_movement_complete(point, &mut ctx);
        if self.behavior.wants_evade() {
            self.evade();
        }
    }

    pub fn die(&mut self) {
        if self.dead {
            return;
        }
        let (behavior, mut ctx) = self.split();
        behavior.on_death(&mut ctx);
        self.events.reset();
        self.engaged = false;
        self.dead = true;
        debug!("{} died", self.id);
    }

    /// Leave combat and return to the spawn state.
    pub fn evade(&mut self) {
        self.events.reset();
        self.behavior.reset(&mut self.events);
        self.moves.clear();
        self.engaged = false;
        debug!("{} evaded", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MemoryWorld;
    use std::sync::Arc;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Ev {
        Ping,
        Block,
        After,
    }

    #[derive(Default)]
    struct Probe {
        resets: usize,
        handled: Vec<Ev>,
    }

    impl Behavior for Probe {
        type Event = Ev;

        fn reset(&mut self, _events: &mut EventScheduler<Ev>) {
            self.resets += 1;
            self.handled.clear();
        }

        fn engage(&mut self, ctx: &mut ScriptContext<'_, Ev>) {
            ctx.events.schedule(Ev::Ping, Duration::from_secs(1), 0);
            ctx.events.schedule(Ev::Block, Duration::from_secs(2), 0);
            ctx.events.schedule(Ev::After, Duration::from_secs(2), 0);
        }

        fn handle(&mut self, fired: FiredEvent<Ev>, _ctx: &mut ScriptContext<'_, Ev>) -> Flow {
            self.handled.push(fired.id);
            if fired.id == Ev::Block {
                Flow::Yield
            } else {
                Flow::Continue
            }
        }
    }

    fn actor() -> ScriptedActor<Probe> {
        let world = Arc::new(MemoryWorld::new());
        let me = world.add_player("Probe");
        ScriptedActor::with_seed(me, Probe::default(), EngineServices::from_world(world), 7)
    }

    #[test]
    fn tick_is_noop_until_engaged() {
        let mut a = actor();
        assert!(a.tick(Duration::from_secs(10)).fired.is_empty());
        assert!(a.events().is_empty());
    }

    #[test]
    fn yield_defers_remaining_ready_events() {
        let mut a = actor();
        a.engage();
        let first = a.tick(Duration::from_secs(3));
        assert_eq!(first.fired, vec![Ev::Ping, Ev::Block]);
        assert!(first.yielded);
        let second = a.tick(Duration::ZERO);
        assert_eq!(second.fired, vec![Ev::After]);
        assert!(!second.yielded);
    }

    #[test]
    fn evade_resets_behavior_and_queue() {
        let mut a = actor();
        a.engage();
        a.tick(Duration::from_secs(1));
        a.evade();
        assert!(!a.is_engaged());
        assert!(a.events().is_empty());
        assert_eq!(a.behavior().resets, 2);
        assert!(a.behavior().handled.is_empty());
    }

    #[test]
    fn dead_actor_ignores_engage() {
        let mut a = actor();
        a.engage();
        a.die();
        a.engage();
        assert!(a.is_dead());
        assert!(!a.is_engaged());
        assert!(a.tick(Duration::from_secs(5)).fired.is_empty());
    }
}
