use serde::{Deserialize, Serialize};

use super::{
    Advance, ExerciseCue, PolicyCursor, Segment, SegmentKind, SegmentRecord, StepOutcome,
    WorkoutTimingPolicy,
};
use crate::phase::Phase;
use crate::plan::{BoxingExercise, BoxingPlan, Discipline, TimedSegment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "index", rename_all = "lowercase")]
pub enum BoxingStage {
    Warmup(usize),
    Work(usize),
    Rest(usize),
    Cooldown(usize),
}

/// Cumulative exercise boundaries within one round's work time.
///
/// Exercises without an explicit duration share whatever the explicit ones
/// leave over. Past the final boundary the last exercise holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseSchedule {
    names: Vec<String>,
    ends: Vec<u32>,
}

impl ExerciseSchedule {
    pub fn new(exercises: &[BoxingExercise], work_seconds: u32) -> Self {
        let fixed = exercises
            .iter()
            .filter_map(|e| e.duration_seconds)
            .fold(0u32, u32::saturating_add);
        let unset = exercises
            .iter()
            .filter(|e| e.duration_seconds.is_none())
            .count() as u32;
        let leftover = work_seconds.saturating_sub(fixed);
        let share = if unset > 0 { leftover / unset } else { 0 };
        let mut spare = if unset > 0 { leftover % unset } else { 0 };

        let mut names = Vec::with_capacity(exercises.len());
        let mut ends = Vec::with_capacity(exercises.len());
        let mut acc = 0u32;
        for ex in exercises {
            let len = match ex.duration_seconds {
                Some(d) => d,
                None => {
                    // hand remainder seconds to the earliest shares
                    let extra = u32::from(spare > 0);
                    spare -= extra;
                    share + extra
                }
            };
            acc = acc.saturating_add(len);
            names.push(ex.name.clone());
            ends.push(acc);
        }
        Self { names, ends }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.names.get(index).map(String::as_str)
    }

    /// Exercise active `elapsed` seconds into the round
    pub fn index_at(&self, elapsed: u32) -> usize {
        let idx = self.ends.partition_point(|&end| end <= elapsed);
        idx.min(self.names.len().saturating_sub(1))
    }

    /// Seconds until the next exercise begins and its index, if one follows
    /// within the round's work time.
    pub fn next_switch(&self, elapsed: u32, work_seconds: u32) -> Option<(u32, usize)> {
        let idx = self.index_at(elapsed);
        if idx + 1 >= self.names.len() {
            return None;
        }
        let boundary = self.ends[idx];
        if boundary >= work_seconds || boundary <= elapsed {
            return None;
        }
        Some((boundary - elapsed, self.index_at(boundary)))
    }
}

#[derive(Debug, Clone)]
struct RoundSchedule {
    work_seconds: u32,
    rest_seconds: u32,
    exercises: ExerciseSchedule,
}

#[derive(Debug, Clone)]
pub struct BoxingPolicy {
    warmup: Vec<TimedSegment>,
    rounds: Vec<RoundSchedule>,
    cooldown: Vec<TimedSegment>,
    stage: BoxingStage,
}

impl BoxingPolicy {
    /// `plan` is expected to have its rounds expanded already.
    pub fn new(plan: &BoxingPlan) -> Self {
        let rounds: Vec<RoundSchedule> = plan
            .rounds
            .iter()
            .map(|r| RoundSchedule {
                work_seconds: r.work_seconds,
                rest_seconds: r.rest_seconds,
                exercises: ExerciseSchedule::new(&r.exercises, r.work_seconds),
            })
            .collect();
        let mut policy = Self {
            warmup: plan.warmup_segments.clone(),
            rounds,
            cooldown: plan.cooldown_segments.clone(),
            stage: BoxingStage::Work(0),
        };
        policy.stage = policy.start_stage();
        policy
    }

    pub fn stage(&self) -> BoxingStage {
        self.stage
    }

    fn start_stage(&self) -> BoxingStage {
        if self.warmup.is_empty() {
            BoxingStage::Work(0)
        } else {
            BoxingStage::Warmup(0)
        }
    }

    fn after_warmup(&self) -> BoxingStage {
        BoxingStage::Work(0)
    }

    /// Stage following `stage`, `None` past the end of the plan
    fn successor(&self, stage: BoxingStage) -> Option<BoxingStage> {
        match stage {
            BoxingStage::Warmup(i) if i + 1 < self.warmup.len() => Some(BoxingStage::Warmup(i + 1)),
            BoxingStage::Warmup(_) => Some(self.after_warmup()),
            BoxingStage::Work(r) => Some(BoxingStage::Rest(r)),
            BoxingStage::Rest(r) if r + 1 < self.rounds.len() => Some(BoxingStage::Work(r + 1)),
            BoxingStage::Rest(_) if !self.cooldown.is_empty() => Some(BoxingStage::Cooldown(0)),
            BoxingStage::Rest(_) => None,
            BoxingStage::Cooldown(i) if i + 1 < self.cooldown.len() => {
                Some(BoxingStage::Cooldown(i + 1))
            }
            BoxingStage::Cooldown(_) => None,
        }
    }

    fn segment_for(&self, stage: BoxingStage) -> Segment {
        let total = self.rounds.len();
        match stage {
            BoxingStage::Warmup(i) => {
                Segment::timed_block(Phase::Warmup, SegmentKind::Warmup, i, &self.warmup[i])
            }
            BoxingStage::Cooldown(i) => {
                Segment::timed_block(Phase::Cooldown, SegmentKind::Cooldown, i, &self.cooldown[i])
            }
            BoxingStage::Work(r) => {
                let round = &self.rounds[r];
                Segment {
                    phase: Phase::Workout,
                    kind: SegmentKind::RoundWork,
                    index: r,
                    sub_index: 0,
                    duration: Some(round.work_seconds),
                    title: format!("Round {} of {}", r + 1, total),
                    detail: round.exercises.name(0).map(str::to_string),
                }
            }
            BoxingStage::Rest(r) => {
                let detail = if r + 1 < total {
                    format!("Round {} next", r + 2)
                } else {
                    "Last round done".to_string()
                };
                Segment {
                    phase: Phase::Workout,
                    kind: SegmentKind::RoundRest,
                    index: r,
                    sub_index: 0,
                    duration: Some(self.rounds[r].rest_seconds),
                    title: "Rest".to_string(),
                    detail: Some(detail),
                }
            }
        }
    }

    fn stage_is_valid(&self, stage: BoxingStage) -> bool {
        match stage {
            BoxingStage::Warmup(i) => i < self.warmup.len(),
            BoxingStage::Work(r) | BoxingStage::Rest(r) => r < self.rounds.len(),
            BoxingStage::Cooldown(i) => i < self.cooldown.len(),
        }
    }
}

impl WorkoutTimingPolicy for BoxingPolicy {
    fn discipline(&self) -> Discipline {
        Discipline::Boxing
    }

    fn first_segment(&mut self) -> Segment {
        self.stage = self.start_stage();
        self.current_segment()
    }

    fn current_segment(&self) -> Segment {
        self.segment_for(self.stage)
    }

    fn compute_next(&mut self, _advance: Advance) -> StepOutcome {
        let record = match self.stage {
            BoxingStage::Rest(r) => Some(SegmentRecord::Completed(r)),
            _ => None,
        };
        let outcome = match self.successor(self.stage) {
            Some(next) => {
                self.stage = next;
                StepOutcome::to(self.segment_for(next))
            }
            None => StepOutcome::finished(),
        };
        match record {
            Some(r) => outcome.with_record(r),
            None => outcome,
        }
    }

    fn is_last_segment(&self) -> bool {
        self.successor(self.stage).is_none()
    }

    fn rewind_to(&mut self, phase: Phase) -> Option<Segment> {
        let stage = match phase {
            Phase::Warmup if !self.warmup.is_empty() => BoxingStage::Warmup(0),
            Phase::Workout => BoxingStage::Work(self.rounds.len().checked_sub(1)?),
            _ => return None,
        };
        self.stage = stage;
        Some(self.current_segment())
    }

    fn seek(
        &mut self,
        phase: Phase,
        kind: Option<SegmentKind>,
        index: usize,
        _sub_index: usize,
    ) -> Option<Segment> {
        let stage = match (phase, kind, self.stage) {
            (Phase::Warmup, _, _) => BoxingStage::Warmup(index),
            (Phase::Cooldown, _, _) => BoxingStage::Cooldown(index),
            (Phase::Workout, Some(SegmentKind::RoundRest), _) => BoxingStage::Rest(index),
            (Phase::Workout, Some(_), _) => BoxingStage::Work(index),
            // without a kind, keep our half of the round when the index agrees
            (Phase::Workout, None, BoxingStage::Rest(r)) if r == index => BoxingStage::Rest(r),
            (Phase::Workout, None, _) => BoxingStage::Work(index),
            _ => return None,
        };
        if !self.stage_is_valid(stage) {
            return None;
        }
        self.stage = stage;
        Some(self.current_segment())
    }

    fn exercise_cue(&self, elapsed_in_segment: u32) -> Option<ExerciseCue> {
        let BoxingStage::Work(r) = self.stage else {
            return None;
        };
        let round = &self.rounds[r];
        if round.exercises.is_empty() {
            return None;
        }
        let index = round.exercises.index_at(elapsed_in_segment);
        Some(ExerciseCue {
            index,
            name: round.exercises.name(index).unwrap_or_default().to_string(),
            switch_in: round
                .exercises
                .next_switch(elapsed_in_segment, round.work_seconds),
        })
    }

    fn unit_count(&self) -> usize {
        self.rounds.len()
    }

    fn cursor(&self) -> PolicyCursor {
        PolicyCursor::Boxing { stage: self.stage }
    }

    fn restore(&mut self, cursor: &PolicyCursor) -> bool {
        match cursor {
            PolicyCursor::Boxing { stage } if self.stage_is_valid(*stage) => {
                self.stage = *stage;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::plan::{BoxingRound, WorkoutPlan};
    use crate::policy::NextStep;

    fn policy_for(plan: BoxingPlan) -> BoxingPolicy {
        let WorkoutPlan::Boxing(plan) = WorkoutPlan::Boxing(plan).with_defaults(&Config::default())
        else {
            unreachable!()
        };
        BoxingPolicy::new(&plan)
    }

    fn ex(name: &str, secs: Option<u32>) -> BoxingExercise {
        BoxingExercise {
            name: name.to_string(),
            duration_seconds: secs,
        }
    }

    #[test]
    fn three_rounds_alternate_work_and_rest_then_finish() {
        let mut policy = policy_for(BoxingPlan::uniform(3, 180, 60));
        let first = policy.first_segment();
        assert_eq!(first.kind, SegmentKind::RoundWork);
        assert_eq!(first.duration, Some(180));

        let mut durations = vec![first.duration.unwrap()];
        let mut completed = vec![];
        loop {
            let step = policy.compute_next(Advance::Expired);
            if let Some(SegmentRecord::Completed(r)) = step.record {
                completed.push(r);
            }
            match step.next {
                NextStep::Segment(seg) => durations.push(seg.duration.unwrap()),
                NextStep::Finished => break,
            }
        }
        assert_eq!(durations, vec![180, 60, 180, 60, 180, 60]);
        assert_eq!(completed, vec![0, 1, 2]);
    }

    #[test]
    fn last_rest_is_last_segment_without_cooldown() {
        let mut policy = policy_for(BoxingPlan::uniform(1, 120, 30));
        assert!(!policy.is_last_segment());
        policy.compute_next(Advance::Expired);
        assert_eq!(policy.stage(), BoxingStage::Rest(0));
        assert!(policy.is_last_segment());
    }

    #[test]
    fn warmup_and_cooldown_bracket_rounds() {
        let block = |name: &str| TimedSegment {
            name: name.to_string(),
            duration_seconds: 60,
            description: None,
        };
        let mut policy = policy_for(BoxingPlan {
            warmup_segments: vec![block("Rope")],
            cooldown_segments: vec![block("Stretch")],
            ..BoxingPlan::uniform(1, 120, 30)
        });
        assert_eq!(policy.first_segment().phase, Phase::Warmup);
        let phases: Vec<Phase> = std::iter::from_fn(|| match policy.compute_next(Advance::Skipped).next {
            NextStep::Segment(s) => Some(s.phase),
            NextStep::Finished => None,
        })
        .collect();
        assert_eq!(phases, vec![Phase::Workout, Phase::Workout, Phase::Cooldown]);
    }

    #[test]
    fn exercises_without_duration_split_leftover_time() {
        let schedule = ExerciseSchedule::new(
            &[ex("Jab", Some(60)), ex("Hooks", None), ex("Slips", None)],
            180,
        );
        assert_eq!(schedule.index_at(0), 0);
        assert_eq!(schedule.index_at(59), 0);
        assert_eq!(schedule.index_at(60), 1);
        assert_eq!(schedule.index_at(119), 1);
        assert_eq!(schedule.index_at(120), 2);
        // holds on the last exercise past the end
        assert_eq!(schedule.index_at(500), 2);
    }

    #[test]
    fn next_switch_counts_down_to_boundary() {
        let schedule = ExerciseSchedule::new(&[ex("A", Some(30)), ex("B", Some(30))], 60);
        assert_eq!(schedule.next_switch(27, 60), Some((3, 1)));
        assert_eq!(schedule.next_switch(29, 60), Some((1, 1)));
        assert_eq!(schedule.next_switch(30, 60), None);
    }

    #[test]
    fn exercise_cue_only_during_work() {
        let mut policy = policy_for(BoxingPlan {
            rounds: vec![BoxingRound {
                work_seconds: 90,
                rest_seconds: 30,
                exercises: vec![ex("Jab", Some(30)), ex("Cross", Some(30)), ex("Hook", Some(30))],
            }],
            ..BoxingPlan::default()
        });
        let cue = policy.exercise_cue(31).unwrap();
        assert_eq!(cue.index, 1);
        assert_eq!(cue.name, "Cross");
        policy.compute_next(Advance::Expired);
        assert_eq!(policy.exercise_cue(5), None);
    }

    #[test]
    fn rewind_to_workout_reenters_final_round() {
        let mut policy = policy_for(BoxingPlan::uniform(3, 180, 60));
        let seg = policy.rewind_to(Phase::Workout).unwrap();
        assert_eq!(seg.index, 2);
        assert_eq!(seg.kind, SegmentKind::RoundWork);
        assert_eq!(policy.rewind_to(Phase::Warmup), None);
    }

    #[test]
    fn cursor_round_trip_restores_stage() {
        let mut policy = policy_for(BoxingPlan::uniform(3, 180, 60));
        policy.compute_next(Advance::Expired);
        policy.compute_next(Advance::Expired);
        let cursor = policy.cursor();

        let mut fresh = policy_for(BoxingPlan::uniform(3, 180, 60));
        assert!(fresh.restore(&cursor));
        assert_eq!(fresh.stage(), BoxingStage::Work(1));
        assert!(!fresh.restore(&PolicyCursor::Boxing {
            stage: BoxingStage::Work(9)
        }));
    }

    #[test]
    fn huge_exercise_durations_saturate() {
        let schedule = ExerciseSchedule::new(
            &[ex("A", Some(u32::MAX)), ex("B", Some(u32::MAX)), ex("C", None)],
            60,
        );
        assert_eq!(schedule.index_at(59), 0);
        assert_eq!(schedule.next_switch(10, 60), None);
    }
}
