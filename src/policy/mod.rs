//! Discipline-specific timing policies.
//!
//! A policy owns the cursor through a plan and answers three questions for
//! the engine: what is the current segment, what comes next when the timer
//! expires or the user skips, and is this the last segment. Phase changes
//! are only *requested* here; the engine applies them through the
//! [`PhaseStateMachine`](crate::phase::PhaseStateMachine).

mod boxing;
mod gym;
mod running;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::phase::Phase;
use crate::plan::{Discipline, IntervalKind, TimedSegment, WorkoutPlan};

pub use boxing::{BoxingPolicy, BoxingStage, ExerciseSchedule};
pub use gym::{GymPolicy, GymStage};
pub use running::RunningPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SegmentKind {
    Warmup,
    RoundWork,
    RoundRest,
    Interval(IntervalKind),
    Set,
    SetRest,
    Cooldown,
}

/// A timed or action-gated unit within a phase
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub phase: Phase,
    pub kind: SegmentKind,
    /// Round, interval, exercise or block index
    pub index: usize,
    /// Derived exercise within a round, or the current set (1-based)
    pub sub_index: usize,
    /// `None` for segments completed by an explicit action
    pub duration: Option<u32>,
    pub title: String,
    pub detail: Option<String>,
}

impl Segment {
    fn timed_block(phase: Phase, kind: SegmentKind, index: usize, block: &TimedSegment) -> Self {
        Self {
            phase,
            kind,
            index,
            sub_index: 0,
            duration: Some(block.duration_seconds),
            title: block.name.clone(),
            detail: block.description.clone(),
        }
    }

    pub fn is_timed(&self) -> bool {
        self.duration.is_some()
    }

    /// Work segments get the tick loop near their end
    pub fn is_work(&self) -> bool {
        matches!(
            self.kind,
            SegmentKind::RoundWork
                | SegmentKind::Interval(IntervalKind::Run)
                | SegmentKind::Interval(IntervalKind::Sprint)
        )
    }
}

/// Why the cursor is moving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    Expired,
    Skipped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Segment(Segment),
    Finished,
}

/// Bookkeeping for the unit the cursor just left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRecord {
    Completed(usize),
    Failed(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub next: NextStep,
    pub record: Option<SegmentRecord>,
}

impl StepOutcome {
    fn to(segment: Segment) -> Self {
        Self {
            next: NextStep::Segment(segment),
            record: None,
        }
    }

    fn finished() -> Self {
        Self {
            next: NextStep::Finished,
            record: None,
        }
    }

    fn with_record(mut self, record: SegmentRecord) -> Self {
        self.record = Some(record);
        self
    }
}

/// Exercise derived from time elapsed within a boxing round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseCue {
    pub index: usize,
    pub name: String,
    /// Seconds until the next exercise starts, and its index
    pub switch_in: Option<(u32, usize)>,
}

/// Serializable position inside a plan, persisted with the session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "discipline", rename_all = "lowercase")]
pub enum PolicyCursor {
    Boxing {
        stage: BoxingStage,
    },
    Running {
        index: usize,
    },
    Gym {
        stage: GymStage,
        completed_sets: Vec<u32>,
    },
}

pub trait WorkoutTimingPolicy: Send + std::fmt::Debug {
    fn discipline(&self) -> Discipline;

    /// Rewind to the start of the plan and return its first segment
    fn first_segment(&mut self) -> Segment;

    fn current_segment(&self) -> Segment;

    fn compute_next(&mut self, advance: Advance) -> StepOutcome;

    fn is_last_segment(&self) -> bool;

    /// Reposition at the start of `phase` for backward navigation
    fn rewind_to(&mut self, phase: Phase) -> Option<Segment>;

    /// Jump to the position another device reported. `kind` is absent in
    /// state from peers that do not report it.
    fn seek(
        &mut self,
        phase: Phase,
        kind: Option<SegmentKind>,
        index: usize,
        sub_index: usize,
    ) -> Option<Segment>;

    /// Explicit set completion; only gym workouts are action-gated
    fn complete_set(&mut self) -> Option<StepOutcome> {
        None
    }

    fn exercise_cue(&self, _elapsed_in_segment: u32) -> Option<ExerciseCue> {
        None
    }

    /// Count of main-work units (rounds, intervals, exercises)
    fn unit_count(&self) -> usize;

    fn cursor(&self) -> PolicyCursor;

    fn restore(&mut self, cursor: &PolicyCursor) -> bool;
}

/// Build the policy for a plan, filling missing structure from `config`.
pub fn build_policy(plan: &WorkoutPlan, config: &Config) -> Box<dyn WorkoutTimingPolicy> {
    match plan.clone().with_defaults(config) {
        WorkoutPlan::Boxing(p) => Box::new(BoxingPolicy::new(&p)),
        WorkoutPlan::Running(p) => Box::new(RunningPolicy::new(&p)),
        WorkoutPlan::Gym(p) => Box::new(GymPolicy::new(&p, config.gym_rest_seconds)),
    }
}
