//! Session bookkeeping, the completion payload and the resumable snapshot.

use serde::{Deserialize, Serialize};

use crate::phase::Phase;
use crate::plan::{Discipline, WorkoutPlan};
use crate::policy::{PolicyCursor, Segment, SegmentKind, SegmentRecord};
use crate::timer::TimerSnapshot;

/// Store key of the resumable session
pub const SESSION_KEY: &str = "active_session";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub session_id: String,
    pub plan: WorkoutPlan,
    pub current_phase: Phase,
    pub current_segment_index: usize,
    pub current_sub_index: usize,
    /// Kind of the current segment; tells a round's work half from its rest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_kind: Option<SegmentKind>,
    pub completed_segment_indices: Vec<usize>,
    /// Running intervals ended by skip
    pub failed_segment_indices: Vec<usize>,
    pub total_elapsed_seconds: u64,
}

impl SessionState {
    pub fn new(session_id: impl Into<String>, plan: WorkoutPlan) -> Self {
        Self {
            session_id: session_id.into(),
            plan,
            current_phase: Phase::Idle,
            current_segment_index: 0,
            current_sub_index: 0,
            current_kind: None,
            completed_segment_indices: Vec::new(),
            failed_segment_indices: Vec::new(),
            total_elapsed_seconds: 0,
        }
    }

    pub fn discipline(&self) -> Discipline {
        self.plan.discipline()
    }

    pub fn enter(&mut self, segment: &Segment) {
        self.current_phase = segment.phase;
        self.current_segment_index = segment.index;
        self.current_sub_index = segment.sub_index;
        self.current_kind = Some(segment.kind);
    }

    /// An index lives in at most one of the two lists
    pub fn record(&mut self, record: SegmentRecord) {
        let (index, target, other) = match record {
            SegmentRecord::Completed(i) => (
                i,
                &mut self.completed_segment_indices,
                &mut self.failed_segment_indices,
            ),
            SegmentRecord::Failed(i) => (
                i,
                &mut self.failed_segment_indices,
                &mut self.completed_segment_indices,
            ),
        };
        other.retain(|&x| x != index);
        if !target.contains(&index) {
            target.push(index);
        }
    }

    /// Forget progress at or after `from_index`
    pub fn clear_progress_from(&mut self, from_index: usize) {
        self.completed_segment_indices.retain(|&i| i < from_index);
        self.failed_segment_indices.retain(|&i| i < from_index);
    }

    pub fn clear_progress(&mut self) {
        self.current_segment_index = 0;
        self.current_sub_index = 0;
        self.current_kind = None;
        self.completed_segment_indices.clear();
        self.failed_segment_indices.clear();
        self.total_elapsed_seconds = 0;
    }
}

/// Handed to the history collaborator once a session finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionPayload {
    pub discipline: Discipline,
    pub duration_seconds: u64,
    pub calories_estimate: u32,
    pub plan_snapshot: WorkoutPlan,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl CompletionPayload {
    pub fn from_session(state: &SessionState, body_weight_kg: f64, notes: Option<String>) -> Self {
        let discipline = state.discipline();
        Self {
            discipline,
            duration_seconds: state.total_elapsed_seconds,
            calories_estimate: estimate_calories(
                discipline,
                state.total_elapsed_seconds,
                body_weight_kg,
            ),
            plan_snapshot: state.plan.clone(),
            notes,
        }
    }
}

pub fn met_for(discipline: Discipline) -> f64 {
    match discipline {
        Discipline::Boxing => 9.0,
        Discipline::Running => 9.8,
        Discipline::Gym => 5.0,
    }
}

/// MET x kg x hours, rounded to whole kcal
pub fn estimate_calories(discipline: Discipline, duration_seconds: u64, body_weight_kg: f64) -> u32 {
    let hours = duration_seconds as f64 / 3600.0;
    (met_for(discipline) * body_weight_kg.max(0.0) * hours).round() as u32
}

/// Everything needed to rebuild a session after the process was killed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSnapshot {
    pub session: SessionState,
    pub timer: TimerSnapshot,
    pub cursor: PolicyCursor,
    #[serde(default)]
    pub paused: bool,
    pub saved_at_epoch_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{BoxingPlan, RunningPlan};

    #[test]
    fn calories_follow_met_table() {
        assert_eq!(estimate_calories(Discipline::Boxing, 3600, 70.0), 630);
        assert_eq!(estimate_calories(Discipline::Running, 1800, 70.0), 343);
        assert_eq!(estimate_calories(Discipline::Gym, 0, 70.0), 0);
    }

    #[test]
    fn record_moves_index_between_lists() {
        let mut state = SessionState::new("s", WorkoutPlan::Running(RunningPlan::default()));
        state.record(SegmentRecord::Failed(1));
        state.record(SegmentRecord::Failed(1));
        assert_eq!(state.failed_segment_indices, vec![1]);
        state.record(SegmentRecord::Completed(1));
        assert!(state.failed_segment_indices.is_empty());
        assert_eq!(state.completed_segment_indices, vec![1]);
    }

    #[test]
    fn payload_snapshots_plan() {
        let mut state = SessionState::new("s", WorkoutPlan::Boxing(BoxingPlan::uniform(3, 180, 60)));
        state.total_elapsed_seconds = 720;
        let payload = CompletionPayload::from_session(&state, 80.0, Some("felt good".into()));
        assert_eq!(payload.discipline, Discipline::Boxing);
        assert_eq!(payload.calories_estimate, 144);
        assert_eq!(payload.plan_snapshot, state.plan);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["durationSeconds"], 720);
        assert_eq!(json["planSnapshot"]["discipline"], "boxing");
    }
}
