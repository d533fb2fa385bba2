//! Timed-event scheduling for scripted actors.

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock, Ticker};
pub use scheduler::{EventGroup, EventScheduler, FiredEvent, RepeatInterval, NO_GROUP};
