use super::{
    Advance, PolicyCursor, Segment, SegmentKind, SegmentRecord, StepOutcome, WorkoutTimingPolicy,
};
use crate::phase::Phase;
use crate::plan::{Discipline, IntervalKind, RunInterval, RunningPlan};

/// Walks a flat interval list. Leading warm-up intervals run in the warmup
/// phase and trailing cool-down intervals in the cooldown phase.
#[derive(Debug, Clone)]
pub struct RunningPolicy {
    intervals: Vec<RunInterval>,
    phases: Vec<Phase>,
    index: usize,
}

impl RunningPolicy {
    pub fn new(plan: &RunningPlan) -> Self {
        Self {
            phases: phase_map(&plan.intervals),
            intervals: plan.intervals.clone(),
            index: 0,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn segment_for(&self, index: usize) -> Segment {
        let interval = &self.intervals[index];
        let detail = match (&interval.target_pace, &interval.description) {
            (Some(pace), Some(desc)) => Some(format!("{desc} @ {pace}")),
            (Some(pace), None) => Some(format!("Target {pace}")),
            (None, Some(desc)) => Some(desc.clone()),
            (None, None) => None,
        };
        Segment {
            phase: self.phases[index],
            kind: SegmentKind::Interval(interval.kind),
            index,
            sub_index: 0,
            duration: Some(interval.duration_seconds),
            title: interval_label(interval.kind).to_string(),
            detail,
        }
    }
}

fn interval_label(kind: IntervalKind) -> &'static str {
    match kind {
        IntervalKind::WarmUp => "Warm-up",
        IntervalKind::Run => "Run",
        IntervalKind::Sprint => "Sprint",
        IntervalKind::Recovery => "Recovery",
        IntervalKind::CoolDown => "Cool-down",
    }
}

fn phase_map(intervals: &[RunInterval]) -> Vec<Phase> {
    let leading = intervals
        .iter()
        .take_while(|iv| iv.kind == IntervalKind::WarmUp)
        .count();
    let trailing = intervals[leading..]
        .iter()
        .rev()
        .take_while(|iv| iv.kind == IntervalKind::CoolDown)
        .count();
    let cooldown_from = intervals.len() - trailing;
    (0..intervals.len())
        .map(|i| {
            if i < leading {
                Phase::Warmup
            } else if i >= cooldown_from {
                Phase::Cooldown
            } else {
                Phase::Workout
            }
        })
        .collect()
}

impl WorkoutTimingPolicy for RunningPolicy {
    fn discipline(&self) -> Discipline {
        Discipline::Running
    }

    fn first_segment(&mut self) -> Segment {
        self.index = 0;
        self.segment_for(0)
    }

    fn current_segment(&self) -> Segment {
        self.segment_for(self.index.min(self.intervals.len() - 1))
    }

    fn compute_next(&mut self, advance: Advance) -> StepOutcome {
        let left = self.index;
        let record = match advance {
            Advance::Expired => SegmentRecord::Completed(left),
            Advance::Skipped => SegmentRecord::Failed(left),
        };
        if left + 1 < self.intervals.len() {
            self.index = left + 1;
            StepOutcome::to(self.segment_for(self.index)).with_record(record)
        } else {
            StepOutcome::finished().with_record(record)
        }
    }

    fn is_last_segment(&self) -> bool {
        self.index + 1 >= self.intervals.len()
    }

    fn rewind_to(&mut self, phase: Phase) -> Option<Segment> {
        let index = match phase {
            Phase::Warmup => self.phases.iter().position(|p| *p == Phase::Warmup)?,
            Phase::Workout => self.phases.iter().rposition(|p| *p == Phase::Workout)?,
            _ => return None,
        };
        self.index = index;
        Some(self.segment_for(index))
    }

    fn seek(
        &mut self,
        phase: Phase,
        _kind: Option<SegmentKind>,
        index: usize,
        _sub_index: usize,
    ) -> Option<Segment> {
        if self.phases.get(index) != Some(&phase) {
            return None;
        }
        self.index = index;
        Some(self.segment_for(index))
    }

    fn unit_count(&self) -> usize {
        self.intervals.len()
    }

    fn cursor(&self) -> PolicyCursor {
        PolicyCursor::Running { index: self.index }
    }

    fn restore(&mut self, cursor: &PolicyCursor) -> bool {
        match cursor {
            PolicyCursor::Running { index } if *index < self.intervals.len() => {
                self.index = *index;
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

    fn plan(kinds: &[(IntervalKind, u32)]) -> RunningPlan {
        RunningPlan {
            name: "test".into(),
            intervals: kinds.iter().map(|(k, d)| RunInterval::new(*k, *d)).collect(),
        }
    }

    #[test]
    fn skip_marks_failed_and_moves_on() {
        let mut policy = RunningPolicy::new(&plan(&[
            (IntervalKind::Run, 300),
            (IntervalKind::Sprint, 60),
            (IntervalKind::CoolDown, 120),
        ]));
        assert_eq!(policy.first_segment().duration, Some(300));

        let step = policy.compute_next(Advance::Skipped);
        assert_eq!(step.record, Some(SegmentRecord::Failed(0)));
        let NextStep::Segment(seg) = step.next else {
            panic!("expected a segment");
        };
        assert_eq!(seg.index, 1);
        assert_eq!(seg.duration, Some(60));
        assert_eq!(seg.kind, SegmentKind::Interval(IntervalKind::Sprint));

        let step = policy.compute_next(Advance::Expired);
        assert_eq!(step.record, Some(SegmentRecord::Completed(1)));
        assert!(policy.is_last_segment());

        let step = policy.compute_next(Advance::Expired);
        assert_eq!(step.record, Some(SegmentRecord::Completed(2)));
        assert_eq!(step.next, NextStep::Finished);
    }

    #[test]
    fn leading_and_trailing_intervals_map_to_phases() {
        let policy = RunningPolicy::new(&plan(&[
            (IntervalKind::WarmUp, 300),
            (IntervalKind::Run, 600),
            (IntervalKind::CoolDown, 60),
            (IntervalKind::Run, 600),
            (IntervalKind::CoolDown, 300),
        ]));
        assert_eq!(
            policy.phases,
            vec![
                Phase::Warmup,
                Phase::Workout,
                Phase::Workout,
                Phase::Workout,
                Phase::Cooldown
            ]
        );
    }

    #[test]
    fn rewind_finds_phase_boundaries() {
        let mut policy = RunningPolicy::new(&plan(&[
            (IntervalKind::WarmUp, 300),
            (IntervalKind::Run, 600),
            (IntervalKind::Sprint, 60),
            (IntervalKind::CoolDown, 300),
        ]));
        assert_eq!(policy.rewind_to(Phase::Workout).unwrap().index, 2);
        assert_eq!(policy.rewind_to(Phase::Warmup).unwrap().index, 0);
        assert_eq!(policy.rewind_to(Phase::Cooldown), None);
    }

    #[test]
    fn seek_requires_matching_phase() {
        let mut policy = RunningPolicy::new(&plan(&[
            (IntervalKind::WarmUp, 300),
            (IntervalKind::Run, 600),
        ]));
        assert_eq!(policy.seek(Phase::Workout, None, 0, 0), None);
        assert_eq!(policy.seek(Phase::Workout, None, 1, 0).unwrap().index, 1);
        assert_eq!(policy.index(), 1);
    }

    #[test]
    fn pace_shows_in_detail() {
        let mut p = plan(&[(IntervalKind::Sprint, 60)]);
        p.intervals[0].target_pace = Some("4:00/km".into());
        let policy = RunningPolicy::new(&p);
        assert_eq!(
            policy.current_segment().detail.as_deref(),
            Some("Target 4:00/km")
        );
    }
}
