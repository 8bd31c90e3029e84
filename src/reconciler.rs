//! Elapsed-time bookkeeping across process suspension and termination.
//!
//! [`PhaseTimer`](crate::timer::PhaseTimer) already absorbs a suspension on
//! its next tick. This component tracks the session-wide total separately,
//! persists it on every start/pause/stop so a killed process can resume,
//! and discards persisted state older than [`STALE_AFTER_MS`].

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, StoreError};
use crate::store::{load_json, save_json, SharedStore};

pub const CLOCK_KEY: &str = "timer_clock";

/// Persisted state older than this is dropped instead of resumed
pub const STALE_AFTER_MS: i64 = 30 * 60 * 1000;

/// Host process lifecycle as reported by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Active,
    Inactive,
    Background,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedClock {
    pub is_active: bool,
    pub start_epoch_ms: Option<i64>,
    pub paused_at_epoch_ms: Option<i64>,
    /// Seconds accumulated before `start_epoch_ms`
    pub total_elapsed_seconds: u64,
    pub saved_at_epoch_ms: i64,
}

pub struct BackgroundReconciler {
    store: SharedStore,
    is_active: bool,
    start_epoch_ms: Option<i64>,
    paused_at_epoch_ms: Option<i64>,
    accumulated_secs: u64,
    background_entered_at: Option<i64>,
}

impl std::fmt::Debug for BackgroundReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundReconciler")
            .field("is_active", &self.is_active)
            .field("start_epoch_ms", &self.start_epoch_ms)
            .field("accumulated_secs", &self.accumulated_secs)
            .field("background_entered_at", &self.background_entered_at)
            .finish()
    }
}

impl BackgroundReconciler {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            is_active: false,
            start_epoch_ms: None,
            paused_at_epoch_ms: None,
            accumulated_secs: 0,
            background_entered_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn start(&mut self, now_ms: i64) {
        if self.is_active {
            return;
        }
        self.is_active = true;
        self.start_epoch_ms = Some(now_ms);
        self.paused_at_epoch_ms = None;
        self.persist(now_ms);
    }

    pub fn pause(&mut self, now_ms: i64) {
        if !self.is_active {
            return;
        }
        self.accumulated_secs = self.total_elapsed_seconds(now_ms);
        self.is_active = false;
        self.start_epoch_ms = None;
        self.paused_at_epoch_ms = Some(now_ms);
        self.persist(now_ms);
    }

    /// Stop counting and persist the final total
    pub fn stop(&mut self, now_ms: i64) {
        self.pause(now_ms);
        self.background_entered_at = None;
    }

    /// Forget all bookkeeping and the persisted record
    pub fn clear(&mut self) {
        self.is_active = false;
        self.start_epoch_ms = None;
        self.paused_at_epoch_ms = None;
        self.accumulated_secs = 0;
        self.background_entered_at = None;
        if let Err(e) = self.store.remove(CLOCK_KEY) {
            tracing::warn!(error = %e, "failed to remove persisted clock");
        }
    }

    pub fn total_elapsed_seconds(&self, now_ms: i64) -> u64 {
        let running = match (self.is_active, self.start_epoch_ms) {
            (true, Some(start)) => ((now_ms - start).max(0) / 1000) as u64,
            _ => 0,
        };
        self.accumulated_secs + running
    }

    /// Handle a lifecycle change. Returns the suspension length in ms when
    /// returning to the foreground after a recorded background entry.
    pub fn on_lifecycle(&mut self, state: LifecycleState, now_ms: i64) -> Option<i64> {
        match state {
            LifecycleState::Background | LifecycleState::Inactive => {
                if self.is_active && self.background_entered_at.is_none() {
                    tracing::debug!(now_ms, "entering background");
                    self.background_entered_at = Some(now_ms);
                    self.persist(now_ms);
                }
                None
            }
            LifecycleState::Active => self.reconcile(now_ms),
        }
    }

    /// Without a preceding background entry this is a no-op.
    pub fn reconcile(&mut self, now_ms: i64) -> Option<i64> {
        let entered = self.background_entered_at.take()?;
        let background_ms = (now_ms - entered).max(0);
        tracing::info!(
            background_ms,
            total_elapsed = self.total_elapsed_seconds(now_ms),
            "returned from background"
        );
        self.persist(now_ms);
        Some(background_ms)
    }

    /// Load the persisted clock left behind by a previous process.
    ///
    /// A record older than [`STALE_AFTER_MS`] is removed and reported as
    /// [`EngineError::StaleSnapshot`].
    pub fn load_persisted(&self, now_ms: i64) -> Result<Option<PersistedClock>, EngineError> {
        let Some(clock) = load_json::<PersistedClock>(self.store.as_ref(), CLOCK_KEY)? else {
            return Ok(None);
        };
        let age_ms = now_ms - clock.saved_at_epoch_ms;
        if age_ms > STALE_AFTER_MS {
            self.store.remove(CLOCK_KEY)?;
            return Err(EngineError::StaleSnapshot {
                age_secs: age_ms / 1000,
            });
        }
        Ok(Some(clock))
    }

    /// Resume bookkeeping from a previous process, if a fresh record exists.
    pub fn restore(&mut self, now_ms: i64) -> Option<PersistedClock> {
        let clock = match self.load_persisted(now_ms) {
            Ok(Some(clock)) => clock,
            Ok(None) => return None,
            Err(EngineError::StaleSnapshot { age_secs }) => {
                tracing::warn!(age_secs, "discarding stale persisted clock");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load persisted clock");
                return None;
            }
        };

        self.is_active = clock.is_active && clock.start_epoch_ms.is_some();
        self.start_epoch_ms = if self.is_active {
            clock.start_epoch_ms
        } else {
            None
        };
        self.paused_at_epoch_ms = clock.paused_at_epoch_ms;
        self.accumulated_secs = clock.total_elapsed_seconds;
        self.background_entered_at = None;
        Some(clock)
    }

    fn persist(&self, now_ms: i64) {
        let clock = PersistedClock {
            is_active: self.is_active,
            start_epoch_ms: self.start_epoch_ms,
            paused_at_epoch_ms: self.paused_at_epoch_ms,
            total_elapsed_seconds: self.accumulated_secs,
            saved_at_epoch_ms: now_ms,
        };
        if let Err(e) = save_json(self.store.as_ref(), CLOCK_KEY, &clock) {
            log_store_error(&e);
        }
    }
}

fn log_store_error(e: &StoreError) {
    tracing::warn!(error = %e, "failed to persist clock");
}
