//! Single-phase countdown timer anchored to wall-clock timestamps.
//!
//! The remaining time is never decremented in place. Every tick recomputes
//! `remaining = remaining_at_anchor - (now - anchor)`, so any stretch during
//! which the process was suspended is absorbed on the next tick.
//!
//! # Lifecycle
//!
//! 1. Phase entry calls [`PhaseTimer::set_time_and_start`]
//! 2. The host ticks; each tick may yield a 3/2/1 countdown value
//! 3. At zero the timer reports expiry once and deactivates

use serde::{Deserialize, Serialize};

use crate::phase::Phase;

/// Countdown values announced before expiry
pub const COUNTDOWN_FROM: u32 = 3;

/// Serializable view of the timer, owned by [`PhaseTimer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub remaining_seconds: u32,
    pub duration_seconds: u32,
    /// Epoch ms at the last start/resume, `None` while paused
    pub wall_clock_anchor: Option<i64>,
    pub is_running: bool,
}

/// Result of a single tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimerTick {
    pub remaining: u32,
    /// Set when this tick crossed into a countdown second not yet announced
    pub countdown: Option<u32>,
    /// Set on the tick that reached zero
    pub expired: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PhaseTimer {
    phase: Phase,
    duration: u32,
    remaining: u32,
    remaining_at_anchor: u32,
    anchor_ms: Option<i64>,
    active: bool,

    /// Index 0 = 1 second, index 2 = 3 seconds
    countdown_announced: [bool; COUNTDOWN_FROM as usize],
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reinitialize anchor, remaining time, active flag and countdown
    /// de-duplication in one step. This is the only entry path for a phase.
    pub fn set_time_and_start(&mut self, phase: Phase, seconds: u32, now_ms: i64) {
        self.phase = phase;
        self.duration = seconds;
        self.remaining = seconds;
        self.remaining_at_anchor = seconds;
        self.countdown_announced = [false; COUNTDOWN_FROM as usize];
        if seconds > 0 {
            self.anchor_ms = Some(now_ms);
            self.active = true;
        } else {
            self.anchor_ms = None;
            self.active = false;
        }
    }

    /// Load a segment without starting it (action-gated segments, paused restores)
    pub fn set_time(&mut self, phase: Phase, seconds: u32) {
        self.phase = phase;
        self.duration = seconds;
        self.remaining = seconds;
        self.remaining_at_anchor = seconds;
        self.anchor_ms = None;
        self.active = false;
        self.countdown_announced = [false; COUNTDOWN_FROM as usize];
    }

    /// Start or resume from the current remainder with a fresh anchor.
    pub fn resume(&mut self, now_ms: i64) -> bool {
        if self.active || self.remaining == 0 {
            return false;
        }
        self.remaining_at_anchor = self.remaining;
        self.anchor_ms = Some(now_ms);
        self.active = true;
        true
    }

    /// Freeze the remainder computed at `now_ms` and drop the anchor.
    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.active {
            return false;
        }
        self.remaining = self.compute_remaining(now_ms);
        self.remaining_at_anchor = self.remaining;
        self.anchor_ms = None;
        self.active = false;
        true
    }

    pub fn tick(&mut self, now_ms: i64) -> TimerTick {
        if !self.active {
            return TimerTick {
                remaining: self.remaining,
                ..TimerTick::default()
            };
        }

        self.remaining = self.compute_remaining(now_ms);

        let mut countdown = None;
        if self.remaining > COUNTDOWN_FROM {
            self.countdown_announced = [false; COUNTDOWN_FROM as usize];
        } else if self.remaining >= 1 {
            let index = (self.remaining - 1) as usize;
            if !self.countdown_announced[index] {
                self.countdown_announced[index] = true;
                countdown = Some(self.remaining);
            }
        }

        let expired = self.remaining == 0;
        if expired {
            self.active = false;
            self.anchor_ms = None;
            self.remaining_at_anchor = 0;
        }

        TimerTick {
            remaining: self.remaining,
            countdown,
            expired,
        }
    }

    fn compute_remaining(&self, now_ms: i64) -> u32 {
        let Some(anchor) = self.anchor_ms else {
            return self.remaining;
        };
        let elapsed_ms = now_ms - anchor;
        if elapsed_ms < 0 {
            tracing::debug!(elapsed_ms, "wall clock moved backwards, clamping to zero elapsed");
        }
        let elapsed_secs = (elapsed_ms.max(0) / 1000).min(u32::MAX as i64) as u32;
        // never climb back up between anchors, even if the clock jumped back
        self.remaining_at_anchor
            .saturating_sub(elapsed_secs)
            .min(self.remaining)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// Seconds elapsed in the current segment, as of the last tick
    pub fn elapsed(&self) -> u32 {
        self.duration.saturating_sub(self.remaining)
    }

    pub fn is_running(&self) -> bool {
        self.active
    }

    /// The anchor is rebased so that `remaining_seconds` is the remainder at
    /// `wall_clock_anchor`; restoring the pair reproduces the same countdown.
    pub fn snapshot(&self) -> TimerSnapshot {
        let consumed = self.remaining_at_anchor.saturating_sub(self.remaining) as i64;
        TimerSnapshot {
            phase: self.phase,
            remaining_seconds: self.remaining,
            duration_seconds: self.duration,
            wall_clock_anchor: self.anchor_ms.map(|anchor| anchor + consumed * 1000),
            is_running: self.active,
        }
    }

    /// Rebuild from a snapshot. A running snapshot keeps its anchor, so the
    /// time spent while the process was gone is counted on the next tick.
    pub fn restore(&mut self, snapshot: &TimerSnapshot) {
        self.phase = snapshot.phase;
        self.duration = snapshot.duration_seconds;
        self.remaining = snapshot.remaining_seconds;
        self.countdown_announced = [false; COUNTDOWN_FROM as usize];
        match (snapshot.is_running, snapshot.wall_clock_anchor) {
            (true, Some(anchor)) => {
                self.remaining_at_anchor = snapshot.remaining_seconds;
                self.anchor_ms = Some(anchor);
                self.active = snapshot.remaining_seconds > 0;
            }
            _ => {
                self.remaining_at_anchor = snapshot.remaining_seconds;
                self.anchor_ms = None;
                self.active = false;
            }
        }
    }
}
