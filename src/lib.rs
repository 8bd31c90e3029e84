// Library surface for the terminal host and headless/integration tests.
pub mod app_dirs;
pub mod audio;
pub mod broadcast;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod logging;
pub mod motion;
pub mod phase;
pub mod plan;
pub mod policy;
pub mod reconciler;
pub mod runtime;
pub mod session;
pub mod store;
pub mod timer;
pub mod ui;

pub use engine::{Engine, EngineEvent};
pub use error::EngineError;

/// Host tick cadence; the timer itself resolves whole seconds
pub const TICK_RATE_MS: u64 = 250;
