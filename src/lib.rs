//! # Realmkeep - gameplay core for a multiplayer game server
//!
//! Realmkeep provides the two pieces of server logic that scripted content and
//! player commerce depend on, on top of a host engine that owns the world.
//!
//! ## Features
//!
//! - **Delayed Event Scheduler**: per-actor timed events with random delays,
//!   repeat intervals and group-wide cancel/delay.
//! - **Behavior Runtime**: ticks a scripted actor, dispatches fired events and
//!   tracks encounter phases in an explicit state machine.
//! - **Two-Party Trades**: offers, mutual acceptance and an all-or-nothing
//!   commit that rolls back when the engine refuses a step.
//! - **Trade Journal**: both inventories and an audit receipt persisted in one
//!   sled transaction.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use realmkeep::config::TradeConfig;
//! use realmkeep::engine::{EngineServices, ItemSpec, MemoryWorld};
//! use realmkeep::trade::TradeManager;
//!
//! let world = Arc::new(MemoryWorld::new());
//! let alice = world.add_player("Alice");
//! let bob = world.add_player("Bob");
//! world.set_gold(alice, 500);
//! let sword = world.give_item(bob, ItemSpec::new(2000, "Runed Sword"));
//!
//! let trades = TradeManager::new(EngineServices::from_world(world.clone()), TradeConfig::default());
//! trades.initiate(alice, bob)?;
//! trades.begin(bob)?;
//! trades.set_money(alice, 100)?;
//! trades.set_item(bob, 0, sword)?;
//! trades.accept(alice)?;
//! trades.accept(bob)?;
//! assert_eq!(world.holder_of(sword), Some(alice));
//! # Ok::<(), realmkeep::trade::TradeError>(())
//! ```
//!
//! ## Module Organization
//!
//! - [`events`] - Delayed event scheduler and clocks
//! - [`behavior`] - Scripted actor runtime, phase machine and encounter scripts
//! - [`trade`] - Trade sessions, commit journal and status codes
//! - [`engine`] - Capability traits for the host engine plus an in-memory world
//! - [`storage`] - Sled-backed trade journal store
//! - [`config`] - Configuration management and validation
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐
//! │  behavior    │   │    trade     │ ← Gameplay logic
//! └──────────────┘   └──────────────┘
//!        │                  │    │
//! ┌──────────────┐          │  ┌──────────────┐
//! │   events     │          │  │   storage    │ ← Persistence
//! └──────────────┘          │  └──────────────┘
//!        │                  │
//! ┌─────────────────────────────────┐
//! │    engine (injected services)   │ ← Host world
//! └─────────────────────────────────┘
//! ```

pub mod behavior;
pub mod config;
pub mod engine;
pub mod events;
pub mod storage;
pub mod trade;
