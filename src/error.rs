use std::path::PathBuf;

use thiserror::Error;

use crate::audio::AudioError;
use crate::phase::Phase;

/// Errors surfaced by the workout engine and its collaborators.
///
/// Timing and state errors are recovered where they occur; only the
/// operations the host calls directly (attach, restore, history) return them.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid phase transition from {from} to {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("persisted snapshot is stale ({age_secs}s old)")]
    StaleSnapshot { age_secs: i64 },

    #[error("no workout plan attached")]
    NoPlan,

    #[error("operation not supported for a {discipline} workout")]
    Unsupported { discipline: String },

    #[error("invalid workout plan")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("snapshot store failure")]
    Store(#[from] StoreError),

    #[error("history database failure")]
    History(#[from] rusqlite::Error),

    #[error("broadcast channel for {topic} is closed")]
    BroadcastClosed { topic: String },

    #[error("failed to encode session state")]
    Encode(#[from] serde_json::Error),
}

/// Errors while loading or validating a workout plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("{what} must have a positive duration")]
    NonPositiveDuration { what: String },

    #[error("exercise {exercise} must have at least one set")]
    NoSets { exercise: String },

    #[error("unknown built-in plan {0}")]
    UnknownBuiltin(String),

    #[error("failed to read plan file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse plan JSON")]
    Parse(#[from] serde_json::Error),
}

/// Errors from the snapshot persistence collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access snapshot {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode or decode snapshot {key}")]
    Codec {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
