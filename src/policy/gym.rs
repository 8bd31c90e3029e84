use serde::{Deserialize, Serialize};

use super::{
    Advance, PolicyCursor, Segment, SegmentKind, SegmentRecord, StepOutcome, WorkoutTimingPolicy,
};
use crate::phase::Phase;
use crate::plan::{Discipline, GymExercise, GymPlan, TimedSegment};

/// Sets are 1-based. `Rest` is the timed break *before* the named set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum GymStage {
    Warmup { index: usize },
    Set { exercise: usize, set: u32 },
    Rest { exercise: usize, set: u32 },
    Cooldown { index: usize },
}

#[derive(Debug, Clone)]
pub struct GymPolicy {
    warmup: Vec<TimedSegment>,
    exercises: Vec<GymExercise>,
    cooldown: Vec<TimedSegment>,
    rest_seconds: u32,
    completed_sets: Vec<u32>,
    stage: GymStage,
}

impl GymPolicy {
    pub fn new(plan: &GymPlan, default_rest: u32) -> Self {
        let mut policy = Self {
            warmup: plan.warmup_segments.clone(),
            exercises: plan.exercises.clone(),
            cooldown: plan.cooldown_segments.clone(),
            rest_seconds: plan.rest_seconds.unwrap_or(default_rest),
            completed_sets: vec![0; plan.exercises.len()],
            stage: GymStage::Set {
                exercise: 0,
                set: 1,
            },
        };
        policy.stage = policy.start_stage();
        policy
    }

    pub fn stage(&self) -> GymStage {
        self.stage
    }

    pub fn completed_sets(&self) -> &[u32] {
        &self.completed_sets
    }

    fn start_stage(&self) -> GymStage {
        if self.warmup.is_empty() {
            GymStage::Set {
                exercise: 0,
                set: 1,
            }
        } else {
            GymStage::Warmup { index: 0 }
        }
    }

    fn rest_for(&self, exercise: usize) -> u32 {
        self.exercises[exercise]
            .rest_seconds
            .unwrap_or(self.rest_seconds)
    }

    fn after_exercises(&self) -> Option<GymStage> {
        if self.cooldown.is_empty() {
            None
        } else {
            Some(GymStage::Cooldown { index: 0 })
        }
    }

    fn segment_for(&self, stage: GymStage) -> Segment {
        match stage {
            GymStage::Warmup { index } => {
                Segment::timed_block(Phase::Warmup, SegmentKind::Warmup, index, &self.warmup[index])
            }
            GymStage::Cooldown { index } => Segment::timed_block(
                Phase::Cooldown,
                SegmentKind::Cooldown,
                index,
                &self.cooldown[index],
            ),
            GymStage::Set { exercise, set } => {
                let ex = &self.exercises[exercise];
                let load = ex
                    .weight
                    .map(|w| format!(" @ {w} kg"))
                    .unwrap_or_default();
                Segment {
                    phase: Phase::Workout,
                    kind: SegmentKind::Set,
                    index: exercise,
                    sub_index: set as usize,
                    duration: None,
                    title: ex.name.clone(),
                    detail: Some(format!("Set {set} of {}: {} reps{load}", ex.sets, ex.reps)),
                }
            }
            GymStage::Rest { exercise, set } => {
                // between exercises the break belongs to the one just finished
                let rest = if set == 1 && exercise > 0 {
                    self.rest_for(exercise - 1)
                } else {
                    self.rest_for(exercise)
                };
                Segment {
                    phase: Phase::Workout,
                    kind: SegmentKind::SetRest,
                    index: exercise,
                    sub_index: set as usize,
                    duration: Some(rest),
                    title: "Rest".to_string(),
                    detail: Some(format!("Next: {} set {set}", self.exercises[exercise].name)),
                }
            }
        }
    }

    /// Count a set for `exercise` and pick what follows it
    fn finish_set(&mut self, exercise: usize) -> StepOutcome {
        self.completed_sets[exercise] += 1;
        let done = self.completed_sets[exercise];
        let sets = self.exercises[exercise].sets;
        tracing::debug!(exercise, done, sets, "set completed");

        if done < sets {
            return self.move_to(GymStage::Rest {
                exercise,
                set: done + 1,
            });
        }
        let record = SegmentRecord::Completed(exercise);
        let outcome = if exercise + 1 < self.exercises.len() {
            self.move_to(GymStage::Rest {
                exercise: exercise + 1,
                set: 1,
            })
        } else {
            match self.after_exercises() {
                Some(stage) => self.move_to(stage),
                None => StepOutcome::finished(),
            }
        };
        outcome.with_record(record)
    }

    fn move_to(&mut self, stage: GymStage) -> StepOutcome {
        self.stage = stage;
        StepOutcome::to(self.segment_for(stage))
    }

    fn stage_is_valid(&self, stage: GymStage) -> bool {
        match stage {
            GymStage::Warmup { index } => index < self.warmup.len(),
            GymStage::Cooldown { index } => index < self.cooldown.len(),
            GymStage::Set { exercise, set } | GymStage::Rest { exercise, set } => self
                .exercises
                .get(exercise)
                .is_some_and(|ex| (1..=ex.sets).contains(&set)),
        }
    }
}

impl WorkoutTimingPolicy for GymPolicy {
    fn discipline(&self) -> Discipline {
        Discipline::Gym
    }

    fn first_segment(&mut self) -> Segment {
        self.completed_sets.iter_mut().for_each(|c| *c = 0);
        self.stage = self.start_stage();
        self.current_segment()
    }

    fn current_segment(&self) -> Segment {
        self.segment_for(self.stage)
    }

    fn compute_next(&mut self, advance: Advance) -> StepOutcome {
        match self.stage {
            GymStage::Warmup { index } if index + 1 < self.warmup.len() => {
                self.move_to(GymStage::Warmup { index: index + 1 })
            }
            GymStage::Warmup { .. } => self.move_to(GymStage::Set {
                exercise: 0,
                set: 1,
            }),
            GymStage::Rest { exercise, set } => self.move_to(GymStage::Set { exercise, set }),
            GymStage::Set { exercise, .. } => {
                if advance == Advance::Expired {
                    tracing::warn!(exercise, "untimed set expired, treating as completed");
                }
                self.finish_set(exercise)
            }
            GymStage::Cooldown { index } if index + 1 < self.cooldown.len() => {
                self.move_to(GymStage::Cooldown { index: index + 1 })
            }
            GymStage::Cooldown { .. } => StepOutcome::finished(),
        }
    }

    fn is_last_segment(&self) -> bool {
        match self.stage {
            GymStage::Cooldown { index } => index + 1 >= self.cooldown.len(),
            GymStage::Set { exercise, set } => {
                self.cooldown.is_empty()
                    && exercise + 1 >= self.exercises.len()
                    && set >= self.exercises[exercise].sets
            }
            _ => false,
        }
    }

    fn rewind_to(&mut self, phase: Phase) -> Option<Segment> {
        match phase {
            Phase::Warmup if !self.warmup.is_empty() => {
                self.completed_sets.iter_mut().for_each(|c| *c = 0);
                self.stage = GymStage::Warmup { index: 0 };
                Some(self.current_segment())
            }
            Phase::Workout => {
                let last = self.exercises.len().checked_sub(1)?;
                let sets = self.exercises[last].sets;
                self.completed_sets[last] = sets - 1;
                self.stage = GymStage::Set {
                    exercise: last,
                    set: sets,
                };
                Some(self.current_segment())
            }
            _ => None,
        }
    }

    fn seek(
        &mut self,
        phase: Phase,
        kind: Option<SegmentKind>,
        index: usize,
        sub_index: usize,
    ) -> Option<Segment> {
        let set = (sub_index as u32).max(1);
        let stage = match (phase, kind) {
            (Phase::Warmup, _) => GymStage::Warmup { index },
            (Phase::Cooldown, _) => GymStage::Cooldown { index },
            (Phase::Workout, Some(SegmentKind::SetRest)) => GymStage::Rest {
                exercise: index,
                set,
            },
            (Phase::Workout, _) => GymStage::Set {
                exercise: index,
                set,
            },
            _ => return None,
        };
        if !self.stage_is_valid(stage) {
            return None;
        }
        if let GymStage::Set { exercise, set } | GymStage::Rest { exercise, set } = stage {
            for (i, (done, ex)) in self
                .completed_sets
                .iter_mut()
                .zip(&self.exercises)
                .enumerate()
            {
                *done = match i.cmp(&exercise) {
                    std::cmp::Ordering::Less => ex.sets,
                    std::cmp::Ordering::Equal => set - 1,
                    std::cmp::Ordering::Greater => 0,
                };
            }
        }
        self.stage = stage;
        Some(self.current_segment())
    }

    /// Accepted during a set or the rest before one; finishing a rest early
    /// counts as doing the set it precedes.
    fn complete_set(&mut self) -> Option<StepOutcome> {
        match self.stage {
            GymStage::Set { exercise, .. } | GymStage::Rest { exercise, .. } => {
                Some(self.finish_set(exercise))
            }
            _ => None,
        }
    }

    fn unit_count(&self) -> usize {
        self.exercises.len()
    }

    fn cursor(&self) -> PolicyCursor {
        PolicyCursor::Gym {
            stage: self.stage,
            completed_sets: self.completed_sets.clone(),
        }
    }

    fn restore(&mut self, cursor: &PolicyCursor) -> bool {
        match cursor {
            PolicyCursor::Gym {
                stage,
                completed_sets,
            } if self.stage_is_valid(*stage) && completed_sets.len() == self.exercises.len() => {
                self.stage = *stage;
                self.completed_sets = completed_sets.clone();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::NextStep;

    fn plan(exercises: Vec<GymExercise>) -> GymPlan {
        GymPlan {
            name: "test".into(),
            exercises,
            rest_seconds: Some(60),
            ..GymPlan::default()
        }
    }

    fn expect_segment(step: StepOutcome) -> Segment {
        match step.next {
            NextStep::Segment(s) => s,
            NextStep::Finished => panic!("unexpected finish"),
        }
    }

    #[test]
    fn complete_set_walks_sets_then_next_exercise() {
        let mut policy = GymPolicy::new(
            &plan(vec![GymExercise::new("Squat", 3, 5), GymExercise::new("Row", 2, 8)]),
            60,
        );
        let first = policy.first_segment();
        assert_eq!(first.kind, SegmentKind::Set);
        assert_eq!(first.duration, None);

        let rest = expect_segment(policy.complete_set().unwrap());
        assert_eq!(rest.kind, SegmentKind::SetRest);
        assert_eq!(rest.sub_index, 2);

        let rest = expect_segment(policy.complete_set().unwrap());
        assert_eq!(rest.duration, Some(60));
        assert_eq!(rest.sub_index, 3);
        assert_eq!(policy.completed_sets()[0], 2);

        let step = policy.complete_set().unwrap();
        assert_eq!(step.record, Some(SegmentRecord::Completed(0)));
        let next = expect_segment(step);
        assert_eq!(next.index, 1);
        assert_eq!(next.sub_index, 1);
    }

    #[test]
    fn final_set_goes_to_cooldown() {
        let mut gym = plan(vec![GymExercise::new("Press", 1, 5)]);
        gym.cooldown_segments = vec![TimedSegment {
            name: "Stretch".into(),
            duration_seconds: 120,
            description: None,
        }];
        let mut policy = GymPolicy::new(&gym, 60);
        policy.first_segment();
        assert!(!policy.is_last_segment());
        let next = expect_segment(policy.complete_set().unwrap());
        assert_eq!(next.phase, Phase::Cooldown);
    }

    #[test]
    fn final_set_without_cooldown_finishes() {
        let mut policy = GymPolicy::new(&plan(vec![GymExercise::new("Press", 1, 5)]), 60);
        assert!(policy.is_last_segment());
        assert_eq!(policy.complete_set().unwrap().next, NextStep::Finished);
    }

    #[test]
    fn rest_expiry_returns_to_the_set() {
        let mut policy = GymPolicy::new(&plan(vec![GymExercise::new("Squat", 3, 5)]), 60);
        policy.complete_set();
        let set = expect_segment(policy.compute_next(Advance::Expired));
        assert_eq!(set.kind, SegmentKind::Set);
        assert_eq!(set.sub_index, 2);
    }

    #[test]
    fn per_exercise_rest_overrides_plan_rest() {
        let mut squat = GymExercise::new("Squat", 2, 5);
        squat.rest_seconds = Some(120);
        let mut policy = GymPolicy::new(&plan(vec![squat]), 60);
        let rest = expect_segment(policy.complete_set().unwrap());
        assert_eq!(rest.duration, Some(120));
    }

    #[test]
    fn complete_set_ignored_outside_workout() {
        let mut gym = plan(vec![GymExercise::new("Squat", 3, 5)]);
        gym.warmup_segments = vec![TimedSegment {
            name: "Bike".into(),
            duration_seconds: 300,
            description: None,
        }];
        let mut policy = GymPolicy::new(&gym, 60);
        assert_eq!(policy.first_segment().phase, Phase::Warmup);
        assert_eq!(policy.complete_set(), None);
    }

    #[test]
    fn rewind_to_workout_reopens_final_set() {
        let mut policy = GymPolicy::new(
            &plan(vec![GymExercise::new("Squat", 3, 5), GymExercise::new("Row", 2, 8)]),
            60,
        );
        let seg = policy.rewind_to(Phase::Workout).unwrap();
        assert_eq!((seg.index, seg.sub_index), (1, 2));
        assert_eq!(policy.completed_sets()[1], 1);
    }

    #[test]
    fn cursor_restores_completed_sets() {
        let exercises = vec![GymExercise::new("Squat", 3, 5)];
        let mut policy = GymPolicy::new(&plan(exercises.clone()), 60);
        policy.complete_set();
        let cursor = policy.cursor();

        let mut fresh = GymPolicy::new(&plan(exercises), 60);
        assert!(fresh.restore(&cursor));
        assert_eq!(fresh.completed_sets(), &[1]);
        assert_eq!(fresh.stage(), GymStage::Rest { exercise: 0, set: 2 });
    }
}
