//! Workout plans as they arrive from the routine generator.
//!
//! Plans are immutable once a session starts. Loading validates only that
//! explicit durations are positive; structure that is simply missing is
//! filled from defaults by [`WorkoutPlan::with_defaults`] so a sparse plan
//! still produces a runnable session.

use std::path::Path;

use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::PlanError;

static PLAN_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/plans");

const PLACEHOLDER_COMBOS: [&str; 3] = ["Jab, cross", "Hooks to the body", "Footwork and slips"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Discipline {
    Boxing,
    Running,
    Gym,
}

/// A timed warm-up or cool-down block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedSegment {
    pub name: String,
    pub duration_seconds: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxingExercise {
    pub name: String,
    /// Share of the round's work time; `None` splits the remainder evenly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxingRound {
    pub work_seconds: u32,
    pub rest_seconds: u32,
    #[serde(default)]
    pub exercises: Vec<BoxingExercise>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxingPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub warmup_segments: Vec<TimedSegment>,
    /// Per-round structure; takes precedence over the uniform fields
    #[serde(default)]
    pub rounds: Vec<BoxingRound>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_rounds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_duration: Option<u32>,
    #[serde(default)]
    pub cooldown_segments: Vec<TimedSegment>,
}

impl BoxingPlan {
    pub fn uniform(total_rounds: u32, round_duration: u32, rest_duration: u32) -> Self {
        Self {
            name: format!("{total_rounds} x {round_duration}s"),
            total_rounds: Some(total_rounds),
            round_duration: Some(round_duration),
            rest_duration: Some(rest_duration),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
pub enum IntervalKind {
    #[serde(rename = "warm-up")]
    #[strum(serialize = "warm-up")]
    WarmUp,
    #[serde(rename = "run")]
    #[strum(serialize = "run")]
    Run,
    #[serde(rename = "sprint")]
    #[strum(serialize = "sprint")]
    Sprint,
    #[serde(rename = "recovery")]
    #[strum(serialize = "recovery")]
    Recovery,
    #[serde(rename = "cool-down")]
    #[strum(serialize = "cool-down")]
    CoolDown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInterval {
    #[serde(rename = "type")]
    pub kind: IntervalKind,
    pub duration_seconds: u32,
    /// Informational only; never enforced by the timer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_pace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RunInterval {
    pub fn new(kind: IntervalKind, duration_seconds: u32) -> Self {
        Self {
            kind,
            duration_seconds,
            target_pace: None,
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub intervals: Vec<RunInterval>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymExercise {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f32>,
    /// Overrides the plan-wide rest between sets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
}

impl GymExercise {
    pub fn new(name: &str, sets: u32, reps: u32) -> Self {
        Self {
            name: name.to_string(),
            sets,
            reps,
            weight: None,
            rest_seconds: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GymPlan {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub warmup_segments: Vec<TimedSegment>,
    #[serde(default)]
    pub exercises: Vec<GymExercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<u32>,
    #[serde(default)]
    pub cooldown_segments: Vec<TimedSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "discipline", rename_all = "lowercase")]
pub enum WorkoutPlan {
    Boxing(BoxingPlan),
    Running(RunningPlan),
    Gym(GymPlan),
}

impl WorkoutPlan {
    pub fn discipline(&self) -> Discipline {
        match self {
            WorkoutPlan::Boxing(_) => Discipline::Boxing,
            WorkoutPlan::Running(_) => Discipline::Running,
            WorkoutPlan::Gym(_) => Discipline::Gym,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            WorkoutPlan::Boxing(p) => &p.name,
            WorkoutPlan::Running(p) => &p.name,
            WorkoutPlan::Gym(p) => &p.name,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, PlanError> {
        let plan: WorkoutPlan = serde_json::from_str(raw)?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, PlanError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| PlanError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// Reject explicit non-positive durations and empty set counts.
    pub fn validate(&self) -> Result<(), PlanError> {
        match self {
            WorkoutPlan::Boxing(plan) => {
                validate_segments(&plan.warmup_segments)?;
                validate_segments(&plan.cooldown_segments)?;
                for (what, value) in [
                    ("round count", plan.total_rounds),
                    ("round", plan.round_duration),
                    ("rest", plan.rest_duration),
                ] {
                    if value == Some(0) {
                        return Err(non_positive(what));
                    }
                }
                for (i, round) in plan.rounds.iter().enumerate() {
                    if round.work_seconds == 0 {
                        return Err(non_positive(&format!("round {} work", i + 1)));
                    }
                    if round.rest_seconds == 0 {
                        return Err(non_positive(&format!("round {} rest", i + 1)));
                    }
                    if let Some(ex) = round
                        .exercises
                        .iter()
                        .find(|ex| ex.duration_seconds == Some(0))
                    {
                        return Err(non_positive(&ex.name));
                    }
                }
            }
            WorkoutPlan::Running(plan) => {
                if let Some((i, _)) = plan
                    .intervals
                    .iter()
                    .enumerate()
                    .find(|(_, iv)| iv.duration_seconds == 0)
                {
                    return Err(non_positive(&format!("interval {}", i + 1)));
                }
            }
            WorkoutPlan::Gym(plan) => {
                validate_segments(&plan.warmup_segments)?;
                validate_segments(&plan.cooldown_segments)?;
                if plan.rest_seconds == Some(0) {
                    return Err(non_positive("rest between sets"));
                }
                for ex in &plan.exercises {
                    if ex.sets == 0 {
                        return Err(PlanError::NoSets {
                            exercise: ex.name.clone(),
                        });
                    }
                    if ex.rest_seconds == Some(0) {
                        return Err(non_positive(&format!("{} rest", ex.name)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Fill structure the plan left out so the session never stalls.
    pub fn with_defaults(mut self, config: &Config) -> Self {
        match &mut self {
            WorkoutPlan::Boxing(plan) => {
                if plan.rounds.is_empty() {
                    let total = plan.total_rounds.unwrap_or(config.default_rounds).max(1);
                    let work = plan.round_duration.unwrap_or(config.default_round_seconds);
                    let rest = plan.rest_duration.unwrap_or(config.default_rest_seconds);
                    tracing::debug!(total, work, rest, "expanding uniform boxing rounds");
                    plan.rounds = (0..total)
                        .map(|_| BoxingRound {
                            work_seconds: work,
                            rest_seconds: rest,
                            exercises: Vec::new(),
                        })
                        .collect();
                }
                plan.total_rounds = Some(plan.rounds.len() as u32);
                for round in &mut plan.rounds {
                    if round.exercises.is_empty() {
                        round.exercises = PLACEHOLDER_COMBOS
                            .iter()
                            .map(|name| BoxingExercise {
                                name: name.to_string(),
                                duration_seconds: None,
                            })
                            .collect();
                    }
                }
            }
            WorkoutPlan::Running(plan) => {
                if plan.intervals.is_empty() {
                    tracing::warn!("running plan has no intervals, using placeholder");
                    plan.intervals = vec![RunInterval {
                        description: Some("Steady run".to_string()),
                        ..RunInterval::new(IntervalKind::Run, 20 * 60)
                    }];
                }
            }
            WorkoutPlan::Gym(plan) => {
                if plan.exercises.is_empty() {
                    tracing::warn!("gym plan has no exercises, using placeholder");
                    plan.exercises = vec![
                        GymExercise::new("Push-ups", 3, 10),
                        GymExercise::new("Bodyweight squats", 3, 15),
                    ];
                }
                if plan.rest_seconds.is_none() {
                    plan.rest_seconds = Some(config.gym_rest_seconds);
                }
            }
        }
        self
    }

    /// Sum of all timed segments; gym sets count as zero
    pub fn planned_seconds(&self) -> u64 {
        match self {
            WorkoutPlan::Boxing(p) => {
                segments_total(&p.warmup_segments)
                    + p.rounds
                        .iter()
                        .map(|r| (r.work_seconds + r.rest_seconds) as u64)
                        .sum::<u64>()
                    + segments_total(&p.cooldown_segments)
            }
            WorkoutPlan::Running(p) => p.intervals.iter().map(|i| i.duration_seconds as u64).sum(),
            WorkoutPlan::Gym(p) => {
                segments_total(&p.warmup_segments) + segments_total(&p.cooldown_segments)
            }
        }
    }
}

fn non_positive(what: &str) -> PlanError {
    PlanError::NonPositiveDuration {
        what: what.to_string(),
    }
}

fn validate_segments(segments: &[TimedSegment]) -> Result<(), PlanError> {
    match segments.iter().find(|s| s.duration_seconds == 0) {
        Some(seg) => Err(non_positive(&seg.name)),
        None => Ok(()),
    }
}

fn segments_total(segments: &[TimedSegment]) -> u64 {
    segments.iter().map(|s| s.duration_seconds as u64).sum()
}

/// Names of the plans bundled into the binary
pub fn builtin_names() -> Vec<String> {
    let mut names: Vec<String> = PLAN_DIR
        .files()
        .filter_map(|f| f.path().file_stem())
        .filter_map(|stem| stem.to_str())
        .map(str::to_string)
        .collect();
    names.sort();
    names
}

pub fn builtin(name: &str) -> Result<WorkoutPlan, PlanError> {
    let file = PLAN_DIR
        .get_file(format!("{name}.json"))
        .ok_or_else(|| PlanError::UnknownBuiltin(name.to_string()))?;
    let raw = file
        .contents_utf8()
        .ok_or_else(|| PlanError::UnknownBuiltin(name.to_string()))?;
    WorkoutPlan::from_json(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn builtin_plans_load_and_validate() {
        let names = builtin_names();
        assert_eq!(names, vec!["boxing-basic", "full-body", "interval-run"]);
        for name in names {
            let plan = builtin(&name).unwrap();
            assert!(!plan.name().is_empty(), "{name} has a name");
        }
    }

    #[test]
    fn unknown_builtin_is_an_error() {
        assert_matches!(builtin("yoga"), Err(PlanError::UnknownBuiltin(_)));
    }

    #[test]
    fn running_plan_deserializes_interval_kinds() {
        let raw = r#"
        {
            "discipline": "running",
            "name": "Test",
            "intervals": [
                {"type": "warm-up", "durationSeconds": 300},
                {"type": "sprint", "durationSeconds": 60, "targetPace": "4:00/km"},
                {"type": "cool-down", "durationSeconds": 120}
            ]
        }
        "#;
        let plan = WorkoutPlan::from_json(raw).unwrap();
        let WorkoutPlan::Running(running) = plan else {
            panic!("expected running plan");
        };
        assert_eq!(running.intervals[0].kind, IntervalKind::WarmUp);
        assert_eq!(running.intervals[1].target_pace.as_deref(), Some("4:00/km"));
        assert_eq!(running.intervals[2].kind.to_string(), "cool-down");
    }

    #[test]
    fn zero_duration_is_rejected() {
        let raw = r#"{"discipline": "running", "intervals": [{"type": "run", "durationSeconds": 0}]}"#;
        assert_matches!(
            WorkoutPlan::from_json(raw),
            Err(PlanError::NonPositiveDuration { .. })
        );
    }

    #[test]
    fn zero_sets_is_rejected() {
        let plan = WorkoutPlan::Gym(GymPlan {
            exercises: vec![GymExercise::new("Row", 0, 10)],
            ..GymPlan::default()
        });
        assert_matches!(plan.validate(), Err(PlanError::NoSets { .. }));
    }

    #[test]
    fn sparse_boxing_plan_gets_default_rounds() {
        let plan = WorkoutPlan::Boxing(BoxingPlan::default()).with_defaults(&Config::default());
        let WorkoutPlan::Boxing(boxing) = plan else {
            panic!("expected boxing plan");
        };
        assert_eq!(boxing.rounds.len(), 3);
        assert_eq!(boxing.rounds[0].work_seconds, 180);
        assert_eq!(boxing.rounds[0].rest_seconds, 60);
        assert_eq!(boxing.rounds[0].exercises.len(), PLACEHOLDER_COMBOS.len());
        assert_eq!(boxing.total_rounds, Some(3));
    }

    #[test]
    fn uniform_boxing_plan_expands() {
        let plan = WorkoutPlan::Boxing(BoxingPlan::uniform(5, 120, 30)).with_defaults(&Config::default());
        assert_eq!(plan.planned_seconds(), 5 * 150);
    }

    #[test]
    fn empty_gym_plan_gets_placeholder_and_rest() {
        let plan = WorkoutPlan::Gym(GymPlan::default()).with_defaults(&Config::default());
        let WorkoutPlan::Gym(gym) = plan else {
            panic!("expected gym plan");
        };
        assert!(!gym.exercises.is_empty());
        assert_eq!(gym.rest_seconds, Some(60));
    }

    #[test]
    fn plan_json_is_tagged_by_discipline() {
        let plan = WorkoutPlan::Running(RunningPlan {
            name: "Easy".into(),
            intervals: vec![RunInterval::new(IntervalKind::Run, 600)],
        });
        let json = serde_json::to_value(&plan).unwrap();
        assert_eq!(json["discipline"], "running");
        assert_eq!(json["intervals"][0]["type"], "run");
        assert_eq!(json["intervals"][0]["durationSeconds"], 600);
    }
}
