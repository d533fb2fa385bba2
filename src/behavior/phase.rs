//! Explicit per-encounter phase state.

use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PhaseError {
    #[error("illegal phase transition {from} -> {to}")]
    IllegalTransition { from: String, to: String },
}

/// Named states plus an allowed-transition table. Anything not in the table
/// is rejected and leaves the current state untouched.
#[derive(Debug, Clone)]
pub struct PhaseMachine<P> {
    initial: P,
    current: P,
    allowed: HashSet<(P, P)>,
}

impl<P> PhaseMachine<P>
where
    P: Copy + Eq + Hash + Debug,
{
    pub fn new(initial: P) -> Self {
        Self {
            initial,
            current: initial,
            allowed: HashSet::new(),
        }
    }

    pub fn allow(mut self, from: P, to: P) -> Self {
        self.allowed.insert((from, to));
        self
    }

    pub fn current(&self) -> P {
        self.current
    }

    pub fn is(&self, phase: P) -> bool {
        self.current == phase
    }

    pub fn can(&self, to: P) -> bool {
        self.allowed.contains(&(self.current, to))
    }

    /// Move to `to`, returning the phase left behind.
    pub fn transition(&mut self, to: P) -> Result<P, PhaseError> {
        if !self.can(to) {
            return Err(PhaseError::IllegalTransition {
                from: format!("{:?}", self.current),
                to: format!("{:?}", to),
            });
        }
        let previous = self.current;
        self.current = to;
        Ok(previous)
    }

    /// Back to the initial phase, unconditionally.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Door {
        Closed,
        Open,
        Locked,
    }

    fn door() -> PhaseMachine<Door> {
        PhaseMachine::new(Door::Closed)
            .allow(Door::Closed, Door::Open)
            .allow(Door::Open, Door::Closed)
            .allow(Door::Closed, Door::Locked)
    }

    #[test]
    fn follows_allowed_edges() {
        let mut m = door();
        assert_eq!(m.transition(Door::Open), Ok(Door::Closed));
        assert!(m.is(Door::Open));
        assert_eq!(m.transition(Door::Closed), Ok(Door::Open));
    }

    #[test]
    fn rejects_and_keeps_state() {
        let mut m = door();
        m.transition(Door::Open).unwrap();
        let err = m.transition(Door::Locked).unwrap_err();
        assert_eq!(
            err,
            PhaseError::IllegalTransition {
                from: "Open".into(),
                to: "Locked".into()
            }
        );
        assert!(m.is(Door::Open));
        m.reset();
        assert!(m.is(Door::Closed));
    }
}
