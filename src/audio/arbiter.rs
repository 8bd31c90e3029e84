use std::collections::HashSet;
use std::sync::mpsc::{Receiver, TryRecvError};

use super::backend::AudioBackend;
use super::scripts::{phase_script, spoken_duration};
use super::{speech_channel, AudioError, NullAudioBackend, Sound, SpeechEvent, UtteranceId};
use crate::config::SpeechOptions;
use crate::phase::Phase;

/// Invariant: `is_ducking == is_speaking || is_tick_looping`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AudioChannelState {
    pub is_ducking: bool,
    pub is_speaking: bool,
    pub is_tick_looping: bool,
}

/// Owns the audio backend for one session.
///
/// Speech and the tick loop both hold the ducking flag; it is released only
/// when neither does. The routing call on the backend is issued only when
/// the flag actually changes.
pub struct AudioArbiter {
    backend: Box<dyn AudioBackend>,
    events: Receiver<SpeechEvent>,
    state: AudioChannelState,
    applied_ducking: bool,
    pending: HashSet<UtteranceId>,
    next_id: UtteranceId,
    voice_enabled: bool,
    options: SpeechOptions,
    disposed: bool,
}

impl std::fmt::Debug for AudioArbiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArbiter")
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("voice_enabled", &self.voice_enabled)
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl AudioArbiter {
    pub fn new(
        backend: Box<dyn AudioBackend>,
        events: Receiver<SpeechEvent>,
        voice_enabled: bool,
        options: SpeechOptions,
    ) -> Self {
        Self {
            backend,
            events,
            state: AudioChannelState::default(),
            applied_ducking: false,
            pending: HashSet::new(),
            next_id: 1,
            voice_enabled,
            options,
            disposed: false,
        }
    }

    /// Arbiter over a silent backend
    pub fn silent() -> Self {
        let (tx, rx) = speech_channel();
        Self::new(
            Box::new(NullAudioBackend::new(tx)),
            rx,
            false,
            SpeechOptions::default(),
        )
    }

    pub fn state(&self) -> AudioChannelState {
        self.state
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice_enabled
    }

    pub fn set_voice_enabled(&mut self, enabled: bool) {
        self.voice_enabled = enabled;
        if !enabled {
            self.stop_speech();
        }
    }

    /// Speak `text`. Returns the utterance id, or `None` when nothing was
    /// queued (voice off, empty text, or the player already gone).
    pub fn speak(&mut self, text: &str) -> Result<Option<UtteranceId>, AudioError> {
        if self.disposed || !self.voice_enabled || text.trim().is_empty() {
            return Ok(None);
        }
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(id);
        self.state.is_speaking = true;
        self.apply_ducking();

        let options = self.options;
        match self.backend.speak(id, text, &options) {
            Ok(()) => {
                tracing::debug!(id, text, "speaking");
                Ok(Some(id))
            }
            Err(AudioError::ResourceReleased) => {
                tracing::debug!(id, "speech player already released");
                self.finish_utterance(id);
                Ok(None)
            }
            Err(e) => {
                self.finish_utterance(id);
                Err(e)
            }
        }
    }

    pub fn start_tick_sound(&mut self) {
        if self.disposed || self.state.is_tick_looping {
            return;
        }
        match self.backend.start_loop(Sound::TickLoop) {
            Ok(()) => {
                self.state.is_tick_looping = true;
                self.apply_ducking();
            }
            Err(AudioError::ResourceReleased) => {
                tracing::debug!("tick player already released");
            }
            Err(e) => tracing::warn!(error = %e, "failed to start tick loop"),
        }
    }

    pub fn stop_tick_sound(&mut self) {
        if !self.state.is_tick_looping {
            return;
        }
        if let Err(e) = self.backend.stop_loop(Sound::TickLoop) {
            swallow("stop tick loop", &e);
        }
        self.state.is_tick_looping = false;
        self.apply_ducking();
    }

    /// One-shot cue; never touches ducking
    pub fn play_bell(&mut self) {
        if self.disposed {
            return;
        }
        if let Err(e) = self.backend.play_once(Sound::Bell) {
            swallow("play bell", &e);
        }
    }

    pub fn stop_speech(&mut self) {
        if !self.state.is_speaking {
            return;
        }
        if let Err(e) = self.backend.stop_speech() {
            swallow("stop speech", &e);
        }
        self.pending.clear();
        self.state.is_speaking = false;
        self.apply_ducking();
    }

    /// Stop everything that is still sounding
    pub fn silence(&mut self) {
        self.stop_tick_sound();
        self.stop_speech();
    }

    /// Drain speech completions. Returns synthesis failures reported since
    /// the last call.
    pub fn pump(&mut self) -> Vec<AudioError> {
        let mut failures = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(SpeechEvent::Done(id)) => self.finish_utterance(id),
                Ok(SpeechEvent::Failed(id, reason)) => {
                    tracing::warn!(id, %reason, "speech failed");
                    self.finish_utterance(id);
                    failures.push(AudioError::Synthesis(reason));
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        failures
    }

    /// Stop all audio and release the external source
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.silence();
        if self.applied_ducking {
            if let Err(e) = self.backend.set_ducking(false) {
                swallow("release ducking", &e);
            }
            self.applied_ducking = false;
        }
        self.disposed = true;
        tracing::debug!("audio arbiter disposed");
    }

    pub fn announce_phase_transition(
        &mut self,
        from: Phase,
        to: Phase,
        fallback: Option<&str>,
    ) -> Result<Option<UtteranceId>, AudioError> {
        match phase_script(from, to).or(fallback) {
            Some(script) => self.speak(script),
            None => Ok(None),
        }
    }

    pub fn announce_round_start(
        &mut self,
        round: usize,
        total: usize,
        opener: Option<&str>,
    ) -> Result<Option<UtteranceId>, AudioError> {
        let head = if round + 1 == total && total > 1 {
            "Final round".to_string()
        } else {
            format!("Round {}", round + 1)
        };
        match opener {
            Some(name) => self.speak(&format!("{head}. {name}")),
            None => self.speak(&head),
        }
    }

    pub fn announce_exercise(&mut self, name: &str) -> Result<Option<UtteranceId>, AudioError> {
        self.speak(name)
    }

    pub fn announce_rest(&mut self, seconds: u32) -> Result<Option<UtteranceId>, AudioError> {
        self.speak(&format!("Rest. {}", spoken_duration(seconds)))
    }

    pub fn announce_countdown(&mut self, n: u32) -> Result<Option<UtteranceId>, AudioError> {
        self.speak(&n.to_string())
    }

    pub fn announce_segment(
        &mut self,
        title: &str,
        seconds: Option<u32>,
    ) -> Result<Option<UtteranceId>, AudioError> {
        match seconds {
            Some(s) => self.speak(&format!("{title}. {}", spoken_duration(s))),
            None => self.speak(title),
        }
    }

    fn finish_utterance(&mut self, id: UtteranceId) {
        self.pending.remove(&id);
        self.state.is_speaking = !self.pending.is_empty();
        self.apply_ducking();
    }

    fn apply_ducking(&mut self) {
        let wanted = self.state.is_speaking || self.state.is_tick_looping;
        self.state.is_ducking = wanted;
        if wanted == self.applied_ducking || self.disposed {
            return;
        }
        match self.backend.set_ducking(wanted) {
            Ok(()) => {}
            Err(e) => swallow("set ducking", &e),
        }
        self.applied_ducking = wanted;
    }
}

impl Drop for AudioArbiter {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn swallow(what: &str, e: &AudioError) {
    match e {
        AudioError::ResourceReleased => tracing::debug!(what, "audio resource already released"),
        other => tracing::warn!(what, error = %other, "audio call failed"),
    }
}
