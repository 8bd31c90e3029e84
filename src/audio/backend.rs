use std::io::Write;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::{AudioError, Sound, SpeechEvent, UtteranceId};
use crate::config::SpeechOptions;

/// The speech/audio collaborator the arbiter drives.
///
/// Speech completion is reported on the [`SpeechEvent`] channel handed to
/// the backend at construction, never by return value.
pub trait AudioBackend: Send {
    fn speak(
        &mut self,
        id: UtteranceId,
        text: &str,
        options: &SpeechOptions,
    ) -> Result<(), AudioError>;
    fn stop_speech(&mut self) -> Result<(), AudioError>;
    fn start_loop(&mut self, sound: Sound) -> Result<(), AudioError>;
    fn stop_loop(&mut self, sound: Sound) -> Result<(), AudioError>;
    fn play_once(&mut self, sound: Sound) -> Result<(), AudioError>;
    fn set_ducking(&mut self, duck: bool) -> Result<(), AudioError>;
}

type SharedChild = Arc<Mutex<Option<(UtteranceId, Child)>>>;

/// Stream the bell character is written to, shared with the tick-loop thread
pub type BellSink = Arc<Mutex<dyn Write + Send>>;

/// Speaks through an external TTS program and rings the terminal bell.
///
/// The bell goes to stderr by default so it never interleaves with frames
/// drawn on stdout.
pub struct SystemAudioBackend {
    command: Option<String>,
    events: Sender<SpeechEvent>,
    speaking: SharedChild,
    tick_stop: Option<Arc<AtomicBool>>,
    bell: BellSink,
}

impl SystemAudioBackend {
    pub fn new(command: Option<String>, events: Sender<SpeechEvent>) -> Self {
        Self {
            command,
            events,
            speaking: Arc::new(Mutex::new(None)),
            tick_stop: None,
            bell: Arc::new(Mutex::new(std::io::stderr())),
        }
    }

    pub fn with_bell_sink(mut self, bell: BellSink) -> Self {
        self.bell = bell;
        self
    }

    fn ring(bell: &BellSink) -> Result<(), AudioError> {
        let mut out = bell.lock().map_err(|_| AudioError::ResourceReleased)?;
        out.write_all(b"\x07")
            .and_then(|_| out.flush())
            .map_err(|e| AudioError::Unavailable(e.to_string()))
    }
}

impl AudioBackend for SystemAudioBackend {
    fn speak(
        &mut self,
        id: UtteranceId,
        text: &str,
        options: &SpeechOptions,
    ) -> Result<(), AudioError> {
        let Some(program) = self.command.as_deref() else {
            let _ = self.events.send(SpeechEvent::Done(id));
            return Ok(());
        };
        // espeak scales: pitch 0-99 (50 normal), speed wpm (175 normal), amplitude 0-200
        let child = Command::new(program)
            .arg("-p")
            .arg(((options.pitch * 50.0).round() as u32).min(99).to_string())
            .arg("-s")
            .arg(((options.rate * 175.0).round() as u32).max(80).to_string())
            .arg("-a")
            .arg(((options.volume * 100.0).round() as u32).min(200).to_string())
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| AudioError::Synthesis(format!("{program}: {e}")))?;

        {
            let mut slot = self
                .speaking
                .lock()
                .map_err(|_| AudioError::ResourceReleased)?;
            if let Some((prev, mut old)) = slot.take() {
                let _ = old.kill();
                let _ = self.events.send(SpeechEvent::Done(prev));
            }
            *slot = Some((id, child));
        }

        let slot = Arc::clone(&self.speaking);
        let events = self.events.clone();
        thread::spawn(move || loop {
            thread::sleep(Duration::from_millis(50));
            let Ok(mut guard) = slot.lock() else { return };
            let finished = match guard.as_mut() {
                Some((current, child)) if *current == id => match child.try_wait() {
                    Ok(Some(status)) if status.success() => Some(SpeechEvent::Done(id)),
                    Ok(Some(status)) => Some(SpeechEvent::Failed(id, format!("exited with {status}"))),
                    Ok(None) => None,
                    Err(e) => Some(SpeechEvent::Failed(id, e.to_string())),
                },
                // stopped or replaced; whoever did that reported it
                _ => return,
            };
            if let Some(event) = finished {
                guard.take();
                let _ = events.send(event);
                return;
            }
        });
        Ok(())
    }

    fn stop_speech(&mut self) -> Result<(), AudioError> {
        let mut slot = self
            .speaking
            .lock()
            .map_err(|_| AudioError::ResourceReleased)?;
        match slot.take() {
            Some((id, mut child)) => {
                let _ = child.kill();
                let _ = self.events.send(SpeechEvent::Done(id));
                Ok(())
            }
            None => Err(AudioError::ResourceReleased),
        }
    }

    fn start_loop(&mut self, sound: Sound) -> Result<(), AudioError> {
        if self.tick_stop.is_some() {
            return Ok(());
        }
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let bell = Arc::clone(&self.bell);
        thread::spawn(move || {
            while !flag.load(Ordering::Relaxed) {
                let _ = Self::ring(&bell);
                thread::sleep(Duration::from_secs(1));
            }
        });
        tracing::debug!(?sound, "loop started");
        self.tick_stop = Some(stop);
        Ok(())
    }

    fn stop_loop(&mut self, sound: Sound) -> Result<(), AudioError> {
        let stop = self.tick_stop.take().ok_or(AudioError::ResourceReleased)?;
        stop.store(true, Ordering::Relaxed);
        tracing::debug!(?sound, "loop stopped");
        Ok(())
    }

    fn play_once(&mut self, _sound: Sound) -> Result<(), AudioError> {
        Self::ring(&self.bell)
    }

    /// Ducking lowers other programs' audio. The terminal has no mixer to
    /// ask, and our own tick and bells are never ducked.
    fn set_ducking(&mut self, duck: bool) -> Result<(), AudioError> {
        tracing::debug!(duck, "ducking requested");
        Ok(())
    }
}

impl Drop for SystemAudioBackend {
    fn drop(&mut self) {
        if let Some(stop) = self.tick_stop.take() {
            stop.store(true, Ordering::Relaxed);
        }
        if let Ok(mut slot) = self.speaking.lock() {
            if let Some((_, mut child)) = slot.take() {
                let _ = child.kill();
            }
        }
    }
}

/// One recorded backend call
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Speak(UtteranceId, String),
    StopSpeech,
    StartLoop(Sound),
    StopLoop(Sound),
    PlayOnce(Sound),
    SetDucking(bool),
}

/// Silent backend that records calls.
///
/// By default each utterance completes immediately; [`NullAudioBackend::manual`]
/// leaves completion to the caller via the event sender.
#[derive(Clone)]
pub struct NullAudioBackend {
    events: Sender<SpeechEvent>,
    auto_complete: bool,
    calls: Arc<Mutex<Vec<AudioCall>>>,
    released: Arc<AtomicBool>,
}

impl NullAudioBackend {
    pub fn new(events: Sender<SpeechEvent>) -> Self {
        Self {
            events,
            auto_complete: true,
            calls: Arc::new(Mutex::new(Vec::new())),
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn manual(events: Sender<SpeechEvent>) -> Self {
        Self {
            auto_complete: false,
            ..Self::new(events)
        }
    }

    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                AudioCall::Speak(_, text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    /// Make every further call fail as if the player had been torn down
    pub fn release(&self) {
        self.released.store(true, Ordering::Relaxed);
    }

    fn record(&self, call: AudioCall) -> Result<(), AudioError> {
        if self.released.load(Ordering::Relaxed) {
            return Err(AudioError::ResourceReleased);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        Ok(())
    }
}

impl AudioBackend for NullAudioBackend {
    fn speak(
        &mut self,
        id: UtteranceId,
        text: &str,
        _options: &SpeechOptions,
    ) -> Result<(), AudioError> {
        self.record(AudioCall::Speak(id, text.to_string()))?;
        if self.auto_complete {
            let _ = self.events.send(SpeechEvent::Done(id));
        }
        Ok(())
    }

    fn stop_speech(&mut self) -> Result<(), AudioError> {
        self.record(AudioCall::StopSpeech)
    }

    fn start_loop(&mut self, sound: Sound) -> Result<(), AudioError> {
        self.record(AudioCall::StartLoop(sound))
    }

    fn stop_loop(&mut self, sound: Sound) -> Result<(), AudioError> {
        self.record(AudioCall::StopLoop(sound))
    }

    fn play_once(&mut self, sound: Sound) -> Result<(), AudioError> {
        self.record(AudioCall::PlayOnce(sound))
    }

    fn set_ducking(&mut self, duck: bool) -> Result<(), AudioError> {
        self.record(AudioCall::SetDucking(duck))
    }
}
