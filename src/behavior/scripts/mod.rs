//! Reference encounter scripts.

pub mod blood_queen;
pub mod plague_abomination;

pub use blood_queen::{BloodQueen, QueenEvent, QueenPhase};
pub use plague_abomination::{PlagueAbomination, PlagueEvent};
