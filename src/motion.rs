//! Auto-pause for running sessions driven by a movement signal.

use crate::phase::Phase;

/// Reading from the location/motion collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionSample {
    pub is_moving: bool,
    /// Metres per second; informational
    pub current_speed: f64,
}

impl MotionSample {
    pub fn moving(speed: f64) -> Self {
        Self {
            is_moving: true,
            current_speed: speed,
        }
    }

    pub fn stopped() -> Self {
        Self {
            is_moving: false,
            current_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionAction {
    Pause,
    Resume,
}

/// Reacts to changes of `is_moving` only, never to repeated readings.
///
/// A resume is only ever issued for a pause this component caused; a pause
/// the user made stays in place until the user lifts it.
#[derive(Debug, Clone, Default)]
pub struct MotionAutoPause {
    enabled: bool,
    last_moving: Option<bool>,
    was_auto_paused: bool,
}

impl MotionAutoPause {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.was_auto_paused = false;
        }
    }

    pub fn was_auto_paused(&self) -> bool {
        self.was_auto_paused
    }

    /// Decide what a new reading means for a session in `phase`.
    pub fn observe(
        &mut self,
        sample: MotionSample,
        phase: Phase,
        timer_running: bool,
        user_paused: bool,
    ) -> Option<MotionAction> {
        if self.last_moving == Some(sample.is_moving) {
            return None;
        }
        self.last_moving = Some(sample.is_moving);
        tracing::debug!(
            moving = sample.is_moving,
            speed = sample.current_speed,
            "movement changed"
        );

        if !self.enabled || phase != Phase::Workout {
            self.was_auto_paused = false;
            return None;
        }

        match (sample.is_moving, self.was_auto_paused) {
            (false, false) if timer_running && !user_paused => {
                self.was_auto_paused = true;
                Some(MotionAction::Pause)
            }
            (true, true) => {
                self.was_auto_paused = false;
                if user_paused {
                    None
                } else {
                    Some(MotionAction::Resume)
                }
            }
            _ => None,
        }
    }

    /// An explicit pause or resume by the user takes ownership of the state
    pub fn on_user_command(&mut self) {
        self.was_auto_paused = false;
    }

    pub fn reset(&mut self) {
        self.last_moving = None;
        self.was_auto_paused = false;
    }
}
