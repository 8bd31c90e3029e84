//! Audio for the engine: speech cues, the tick loop and one-shot bells,
//! arbitrated against an external source that is ducked while we talk.

mod arbiter;
mod backend;
mod scripts;

use std::sync::mpsc;

pub use arbiter::{AudioArbiter, AudioChannelState};
pub use backend::{AudioBackend, AudioCall, BellSink, NullAudioBackend, SystemAudioBackend};
pub use scripts::{phase_script, spoken_duration};

pub type UtteranceId = u64;

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The underlying player was torn down under us
    #[error("audio resource already released")]
    ResourceReleased,

    #[error("speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("audio output unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    Bell,
    TickLoop,
}

/// Asynchronous completion of an utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Done(UtteranceId),
    Failed(UtteranceId, String),
}

pub fn speech_channel() -> (mpsc::Sender<SpeechEvent>, mpsc::Receiver<SpeechEvent>) {
    mpsc::channel()
}
