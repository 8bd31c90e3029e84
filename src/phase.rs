//! Top-level session phases and the fixed transition graph between them.
//!
//! The graph is:
//!
//! ```text
//! idle      -> preparing | warmup | workout
//! preparing -> warmup | workout
//! warmup    -> workout | idle
//! workout   -> cooldown | finished | warmup
//! cooldown  -> finished | workout
//! finished  -> idle
//! ```
//!
//! [`transition`] is a pure function over that graph; [`PhaseStateMachine`]
//! wraps it with the current phase and turns rejected requests into no-ops.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Preparing,
    Warmup,
    Workout,
    Cooldown,
    Finished,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Idle,
        Phase::Preparing,
        Phase::Warmup,
        Phase::Workout,
        Phase::Cooldown,
        Phase::Finished,
    ];

    /// Phases reachable from `self` in one step
    pub fn allowed_next(self) -> &'static [Phase] {
        match self {
            Phase::Idle => &[Phase::Preparing, Phase::Warmup, Phase::Workout],
            Phase::Preparing => &[Phase::Warmup, Phase::Workout],
            Phase::Warmup => &[Phase::Workout, Phase::Idle],
            Phase::Workout => &[Phase::Cooldown, Phase::Finished, Phase::Warmup],
            Phase::Cooldown => &[Phase::Finished, Phase::Workout],
            Phase::Finished => &[Phase::Idle],
        }
    }

    pub fn can_transition_to(self, target: Phase) -> bool {
        self.allowed_next().contains(&target)
    }

    /// The phase one level back, if the graph has a backward edge.
    pub fn backward(self) -> Option<Phase> {
        match self {
            Phase::Warmup => Some(Phase::Idle),
            Phase::Workout => Some(Phase::Warmup),
            Phase::Cooldown => Some(Phase::Workout),
            _ => None,
        }
    }

    /// Phases in which a timer can be running
    pub fn is_timed(self) -> bool {
        matches!(
            self,
            Phase::Preparing | Phase::Warmup | Phase::Workout | Phase::Cooldown
        )
    }
}

/// Validate a single step of the graph.
pub fn transition(current: Phase, target: Phase) -> Result<Phase, EngineError> {
    if current.can_transition_to(target) {
        Ok(target)
    } else {
        Err(EngineError::InvalidTransition {
            from: current,
            to: target,
        })
    }
}

/// Shortest sequence of legal hops from `from` to `to`, excluding `from`.
///
/// Returns an empty path when `from == to` and `None` when `to` is unreachable.
pub fn route(from: Phase, to: Phase) -> Option<Vec<Phase>> {
    if from == to {
        return Some(Vec::new());
    }

    let mut queue = VecDeque::from([from]);
    let mut came_from: Vec<(Phase, Phase)> = Vec::new();
    let mut seen = vec![from];

    while let Some(phase) = queue.pop_front() {
        for &next in phase.allowed_next() {
            if seen.contains(&next) {
                continue;
            }
            seen.push(next);
            came_from.push((next, phase));
            if next == to {
                let mut path = vec![to];
                let mut cursor = to;
                while let Some(&(_, prev)) = came_from.iter().find(|(p, _)| *p == cursor) {
                    if prev == from {
                        break;
                    }
                    path.push(prev);
                    cursor = prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(next);
        }
    }

    None
}

#[derive(Debug, Clone, Default)]
pub struct PhaseStateMachine {
    current: Phase,
}

impl PhaseStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Apply one step. A non-adjacent target leaves the phase unchanged.
    pub fn transition(&mut self, target: Phase) -> Result<Phase, EngineError> {
        match transition(self.current, target) {
            Ok(next) => {
                tracing::info!(from = %self.current, to = %next, "phase transition");
                self.current = next;
                Ok(next)
            }
            Err(err) => {
                tracing::warn!(from = %self.current, to = %target, "rejected phase transition");
                Err(err)
            }
        }
    }

    /// Walk the shortest legal path to `target`, one validated hop at a time.
    ///
    /// Returns the phases entered, in order.
    pub fn advance_to(&mut self, target: Phase) -> Result<Vec<Phase>, EngineError> {
        let path = route(self.current, target).ok_or(EngineError::InvalidTransition {
            from: self.current,
            to: target,
        })?;
        for &hop in &path {
            self.transition(hop)?;
        }
        Ok(path)
    }

    pub fn can_go_back(&self) -> bool {
        !matches!(self.current, Phase::Finished | Phase::Idle)
    }

    /// Explicit reset. Not a graph transition: it is allowed from every phase.
    pub fn reset(&mut self) {
        self.current = Phase::Idle;
    }

    /// Reinstate a phase read back from a persisted snapshot.
    pub fn restore(&mut self, phase: Phase) {
        self.current = phase;
    }
}
