//! Host side of the engine: terminal events in, engine ticks out.
//!
//! [`HostLoop::drive`] waits at most one tick interval for an event. Time
//! and lifecycle changes go straight to the engine; keys and resizes are
//! handed back so the front end can map them to commands.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use crossterm::event::{self, Event as CtEvent, KeyEvent, KeyEventKind};

use crate::engine::Engine;
use crate::reconciler::LifecycleState;
use crate::TICK_RATE_MS;

#[derive(Clone, Debug)]
pub enum HostEvent {
    Key(KeyEvent),
    Resize,
    Tick,
    /// Terminal focus gained (`true`) or lost
    Focus(bool),
}

impl HostEvent {
    /// Focus changes stand in for app foreground/background transitions
    pub fn lifecycle(&self) -> Option<LifecycleState> {
        match self {
            HostEvent::Focus(true) => Some(LifecycleState::Active),
            HostEvent::Focus(false) => Some(LifecycleState::Background),
            _ => None,
        }
    }
}

pub trait EventSource: Send + 'static {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError>;
}

/// A plain channel is an event source; headless hosts and tests feed it.
impl EventSource for Receiver<HostEvent> {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        Receiver::recv_timeout(self, timeout)
    }
}

/// Reads crossterm events on a background thread.
///
/// Focus events only arrive when the terminal has focus reporting enabled.
pub struct CrosstermEventSource {
    rx: Receiver<HostEvent>,
}

impl CrosstermEventSource {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || loop {
            let ev = match event::read() {
                Ok(CtEvent::Key(key)) if key.kind != KeyEventKind::Release => HostEvent::Key(key),
                Ok(CtEvent::Resize(_, _)) => HostEvent::Resize,
                Ok(CtEvent::FocusGained) => HostEvent::Focus(true),
                Ok(CtEvent::FocusLost) => HostEvent::Focus(false),
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "terminal event reader stopped");
                    break;
                }
            };
            if tx.send(ev).is_err() {
                break;
            }
        });

        Self { rx }
    }
}

impl Default for CrosstermEventSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for CrosstermEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<HostEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

pub struct HostLoop<E: EventSource> {
    source: E,
    tick: Duration,
}

impl<E: EventSource> HostLoop<E> {
    pub fn new(source: E) -> Self {
        Self {
            source,
            tick: Duration::from_millis(TICK_RATE_MS),
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// The next event, or `Tick` once the interval passes quietly
    pub fn next_event(&self) -> HostEvent {
        match self.source.recv_timeout(self.tick) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => HostEvent::Tick,
            Err(RecvTimeoutError::Disconnected) => {
                // keep time moving at the same pace without a source
                std::thread::sleep(self.tick);
                HostEvent::Tick
            }
        }
    }

    /// Feed the next event to `engine` and return it. Ticks and focus
    /// changes are fully handled here.
    pub fn drive(&self, engine: &mut Engine) -> HostEvent {
        let ev = self.next_event();
        match &ev {
            HostEvent::Tick => engine.tick(),
            other => {
                if let Some(state) = other.lifecycle() {
                    engine.on_lifecycle(state);
                }
            }
        }
        ev
    }
}
