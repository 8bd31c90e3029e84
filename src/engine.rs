//! Composition root for one workout session.
//!
//! The engine owns the timer, the phase machine, the active timing policy and
//! the audio arbiter. The host drives it by calling [`Engine::tick`] on a
//! fixed cadence and forwarding user commands; everything the host needs to
//! react to comes back through [`Engine::poll_events`], so no callback ever
//! runs inside a tick.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::audio::{AudioArbiter, AudioChannelState, AudioError, UtteranceId};
use crate::broadcast::{RealtimeBroadcast, SyncMessage};
use crate::clock::Clock;
use crate::config::Config;
use crate::error::EngineError;
use crate::motion::{MotionAction, MotionAutoPause, MotionSample};
use crate::phase::{Phase, PhaseStateMachine};
use crate::plan::{Discipline, WorkoutPlan};
use crate::policy::{
    build_policy, Advance, NextStep, Segment, SegmentKind, StepOutcome, WorkoutTimingPolicy,
};
use crate::reconciler::{BackgroundReconciler, LifecycleState, STALE_AFTER_MS};
use crate::session::{CompletionPayload, ResumeSnapshot, SessionState, SESSION_KEY};
use crate::store::{load_json, save_json, SharedStore};
use crate::timer::{PhaseTimer, TimerSnapshot, COUNTDOWN_FROM};

/// Notifications for the host, drained with [`Engine::poll_events`]
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    PhaseChanged { from: Phase, to: Phase },
    SegmentStarted(Segment),
    ExerciseChanged { index: usize, name: String },
    TimeUpdate { total_elapsed_seconds: u64, remaining: u32 },
    Countdown(u32),
    Paused { auto: bool },
    Resumed { auto: bool },
    SpeechFailed(AudioError),
    /// Emitted once per session on reaching `finished`
    Completed(CompletionPayload),
    RemoteApplied,
    Reset,
}

pub struct Engine {
    config: Config,
    clock: Arc<dyn Clock>,
    store: SharedStore,
    machine: PhaseStateMachine,
    timer: PhaseTimer,
    policy: Option<Box<dyn WorkoutTimingPolicy>>,
    session: Option<SessionState>,
    segment: Option<Segment>,
    audio: AudioArbiter,
    reconciler: BackgroundReconciler,
    motion: MotionAutoPause,
    broadcast: Option<Box<dyn RealtimeBroadcast>>,
    events: VecDeque<EngineEvent>,
    paused: bool,
    user_paused: bool,
    completed: bool,
    notes: Option<String>,
    /// (round, next exercise, seconds) already counted down
    switch_cues: HashSet<(usize, usize, u32)>,
    last_persist_ms: Option<i64>,
    last_update: Option<(u64, u32)>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("phase", &self.machine.current())
            .field("segment", &self.segment)
            .field("timer", &self.timer)
            .field("paused", &self.paused)
            .field("user_paused", &self.user_paused)
            .field("completed", &self.completed)
            .field("audio", &self.audio)
            .finish()
    }
}

impl Engine {
    pub fn new(config: Config, clock: Arc<dyn Clock>, store: SharedStore, audio: AudioArbiter) -> Self {
        let config = config.sanitized();
        let motion = MotionAutoPause::new(config.auto_pause);
        Self {
            reconciler: BackgroundReconciler::new(Arc::clone(&store)),
            config,
            clock,
            store,
            machine: PhaseStateMachine::new(),
            timer: PhaseTimer::new(),
            policy: None,
            session: None,
            segment: None,
            audio,
            motion,
            broadcast: None,
            events: VecDeque::new(),
            paused: false,
            user_paused: false,
            completed: false,
            notes: None,
            switch_cues: HashSet::new(),
            last_persist_ms: None,
            last_update: None,
        }
    }

    pub fn with_broadcast(mut self, broadcast: Box<dyn RealtimeBroadcast>) -> Self {
        self.broadcast = Some(broadcast);
        self
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = notes;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.machine.current()
    }

    pub fn session(&self) -> Option<&SessionState> {
        self.session.as_ref()
    }

    pub fn discipline(&self) -> Option<Discipline> {
        self.session.as_ref().map(SessionState::discipline)
    }

    pub fn current_segment(&self) -> Option<&Segment> {
        self.segment.as_ref()
    }

    pub fn remaining(&self) -> u32 {
        self.timer.remaining()
    }

    pub fn timer_snapshot(&self) -> TimerSnapshot {
        self.timer.snapshot()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn was_auto_paused(&self) -> bool {
        self.paused && !self.user_paused
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn audio_state(&self) -> AudioChannelState {
        self.audio.state()
    }

    pub fn can_go_back(&self) -> bool {
        self.machine.can_go_back()
    }

    /// Rounds, intervals or exercises in the attached plan
    pub fn unit_count(&self) -> usize {
        self.policy.as_ref().map_or(0, |p| p.unit_count())
    }

    pub fn total_elapsed_seconds(&self) -> u64 {
        match (self.machine.current(), self.session.as_ref()) {
            (Phase::Idle | Phase::Finished, Some(s)) => s.total_elapsed_seconds,
            _ => self.reconciler.total_elapsed_seconds(self.clock.now_ms()),
        }
    }

    pub fn completion_payload(&self) -> Option<CompletionPayload> {
        self.session.as_ref().map(|s| {
            CompletionPayload::from_session(s, self.config.body_weight_kg, self.notes.clone())
        })
    }

    pub fn poll_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    /// Validate `plan` and make it the session's plan. Any running session
    /// is reset first.
    pub fn attach_plan(&mut self, plan: WorkoutPlan) -> Result<(), EngineError> {
        plan.validate()?;
        if self.session.is_some() {
            self.reset();
        }
        let plan = plan.with_defaults(&self.config);
        let discipline = plan.discipline();
        let session_id = format!("{}-{}", discipline, self.clock.now_ms());
        tracing::info!(session = %session_id, plan = plan.name(), %discipline, "plan attached");

        self.policy = Some(build_policy(&plan, &self.config));
        self.motion = MotionAutoPause::new(self.config.auto_pause && discipline == Discipline::Running);
        self.session = Some(SessionState::new(session_id, plan));
        Ok(())
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.session.is_none() {
            return Err(EngineError::NoPlan);
        }
        match self.machine.current() {
            Phase::Idle => {}
            Phase::Finished => {
                return Err(EngineError::InvalidTransition {
                    from: Phase::Finished,
                    to: Phase::Preparing,
                })
            }
            _ => return Ok(()),
        }

        let now = self.clock.now_ms();
        self.completed = false;
        self.reconciler.start(now);
        if self.config.prepare_seconds > 0 {
            self.change_phase(Phase::Preparing)?;
            self.segment = None;
            self.timer
                .set_time_and_start(Phase::Preparing, self.config.prepare_seconds, now);
            self.publish();
        } else {
            self.enter_first_segment()?;
        }
        self.persist(now);
        Ok(())
    }

    /// Advance time. Errors are logged and never escape a tick.
    pub fn tick(&mut self) {
        let now = self.clock.now_ms();
        for failure in self.audio.pump() {
            self.events.push_back(EngineEvent::SpeechFailed(failure));
        }
        self.apply_inbound();
        if matches!(self.machine.current(), Phase::Idle | Phase::Finished) {
            return;
        }

        let tick = self.timer.tick(now);
        let total = self.reconciler.total_elapsed_seconds(now);
        if let Some(session) = self.session.as_mut() {
            session.total_elapsed_seconds = total;
        }
        if self.last_update != Some((total, tick.remaining)) {
            self.last_update = Some((total, tick.remaining));
            self.events.push_back(EngineEvent::TimeUpdate {
                total_elapsed_seconds: total,
                remaining: tick.remaining,
            });
        }

        if let Some(n) = tick.countdown {
            let spoken = self.audio.announce_countdown(n);
            self.note_speech(spoken);
            self.events.push_back(EngineEvent::Countdown(n));
        }
        if self.timer.is_running() {
            self.follow_exercises(tick.remaining);
        }
        self.update_tick_loop(tick.remaining);

        if tick.expired {
            tracing::debug!(phase = %self.machine.current(), "segment expired");
            if let Err(e) = self.advance(Advance::Expired) {
                tracing::warn!(error = %e, "failed to advance after expiry");
            }
        }

        let interval_ms = i64::from(self.config.persist_interval_seconds) * 1000;
        if self
            .last_persist_ms
            .map_or(true, |last| now - last >= interval_ms)
        {
            self.persist(now);
            self.publish();
        }
    }

    pub fn pause(&mut self) {
        self.pause_with(false);
    }

    pub fn resume(&mut self) {
        self.resume_with(false);
    }

    pub fn toggle_pause(&mut self) {
        if self.paused {
            self.resume();
        } else {
            self.pause();
        }
    }

    /// End the current segment early. During `preparing` this enters the
    /// first segment of the plan.
    pub fn skip(&mut self) {
        let phase = self.machine.current();
        if matches!(phase, Phase::Idle | Phase::Finished) {
            return;
        }
        tracing::info!(%phase, "skip");
        self.audio.stop_tick_sound();
        if let Err(e) = self.advance(Advance::Skipped) {
            tracing::warn!(error = %e, "skip failed");
        }
        self.persist(self.clock.now_ms());
    }

    /// Mark the current gym set done. Returns `false` when there is no set
    /// to complete right now.
    pub fn complete_set(&mut self) -> Result<bool, EngineError> {
        let policy = self.policy.as_deref_mut().ok_or(EngineError::NoPlan)?;
        let discipline = policy.discipline();
        if discipline != Discipline::Gym {
            return Err(EngineError::Unsupported {
                discipline: discipline.to_string(),
            });
        }
        if self.machine.current() != Phase::Workout {
            return Ok(false);
        }
        let Some(outcome) = policy.complete_set() else {
            return Ok(false);
        };
        self.apply_outcome(outcome)?;
        self.persist(self.clock.now_ms());
        Ok(true)
    }

    /// Step one level back along the phase graph.
    pub fn go_back(&mut self) -> Result<(), EngineError> {
        let current = self.machine.current();
        if current == Phase::Preparing {
            self.reset();
            return Ok(());
        }
        if !self.machine.can_go_back() {
            return Ok(());
        }
        let Some(target) = current.backward() else {
            return Ok(());
        };
        if target == Phase::Idle {
            self.reset();
            return Ok(());
        }

        let policy = self.policy.as_deref_mut().ok_or(EngineError::NoPlan)?;
        let (segment, restarted) = match policy.rewind_to(target) {
            Some(seg) => (seg, false),
            None => {
                tracing::info!(from = %current, to = %target, "nothing to go back to, restarting plan");
                (policy.first_segment(), true)
            }
        };
        if let Some(session) = self.session.as_mut() {
            if restarted || target == Phase::Warmup {
                session.clear_progress_from(0);
            } else {
                session.clear_progress_from(segment.index);
            }
        }
        tracing::info!(from = %current, to = %segment.phase, "going back");
        self.enter_segment(segment)?;
        self.persist(self.clock.now_ms());
        Ok(())
    }

    /// Back to idle with every counter cleared. The plan stays attached.
    pub fn reset(&mut self) {
        let from = self.machine.current();
        self.audio.silence();
        self.timer.reset();
        self.machine.reset();
        self.segment = None;
        self.paused = false;
        self.user_paused = false;
        self.completed = false;
        self.switch_cues.clear();
        self.motion.reset();
        self.last_update = None;
        self.last_persist_ms = None;
        if let Some(policy) = self.policy.as_deref_mut() {
            policy.first_segment();
        }
        if let Some(session) = self.session.as_mut() {
            session.clear_progress();
            session.current_phase = Phase::Idle;
        }
        self.clear_persisted();
        tracing::info!(%from, "session reset");
        if from != Phase::Idle {
            self.events.push_back(EngineEvent::PhaseChanged {
                from,
                to: Phase::Idle,
            });
        }
        self.events.push_back(EngineEvent::Reset);
        self.publish();
    }

    pub fn on_lifecycle(&mut self, state: LifecycleState) {
        let now = self.clock.now_ms();
        match self.reconciler.on_lifecycle(state, now) {
            Some(away_ms) => {
                tracing::info!(away_ms, "back in the foreground");
                self.tick();
            }
            None if state != LifecycleState::Active => self.persist(now),
            None => {}
        }
    }

    pub fn on_motion(&mut self, sample: MotionSample) {
        let action = self.motion.observe(
            sample,
            self.machine.current(),
            self.timer.is_running(),
            self.user_paused,
        );
        match action {
            Some(MotionAction::Pause) => self.pause_with(true),
            Some(MotionAction::Resume) => self.resume_with(true),
            None => {}
        }
    }

    /// Overwrite local state with a session reported by another device.
    pub fn apply_remote(&mut self, state: SessionState) {
        let Some(local) = self.session.as_ref() else {
            tracing::debug!("ignoring remote state without a local session");
            return;
        };
        if local.session_id != state.session_id {
            tracing::debug!(remote = %state.session_id, "ignoring remote state for another session");
            return;
        }
        if state.current_phase == Phase::Finished && self.machine.current() != Phase::Finished {
            tracing::info!(session = %state.session_id, "remote session finished");
            let total = state.total_elapsed_seconds;
            self.session = Some(state);
            self.reconciler.stop(self.clock.now_ms());
            if let Err(e) = self.settle_finished(total) {
                tracing::warn!(error = %e, "failed to finish from remote state");
            }
            self.events.push_back(EngineEvent::RemoteApplied);
            return;
        }
        let moved = remote_position(local) != remote_position(&state);
        tracing::info!(phase = %state.current_phase, index = state.current_segment_index, moved, "applying remote state");

        self.machine.restore(state.current_phase);
        if moved {
            self.audio.stop_tick_sound();
            self.switch_cues.clear();
            let sought = self.policy.as_deref_mut().and_then(|p| {
                p.seek(
                    state.current_phase,
                    state.current_kind,
                    state.current_segment_index,
                    state.current_sub_index,
                )
            });
            match sought {
                Some(segment) => self.load_timer(&segment),
                None => {
                    self.timer.set_time(state.current_phase, 0);
                    self.segment = None;
                }
            }
        }
        self.session = Some(state);
        self.events.push_back(EngineEvent::RemoteApplied);
    }

    /// Rebuild the session persisted by a previous process. Returns whether
    /// a session was restored.
    pub fn restore(&mut self) -> Result<bool, EngineError> {
        let now = self.clock.now_ms();
        let Some(snapshot) = load_json::<ResumeSnapshot>(self.store.as_ref(), SESSION_KEY)? else {
            return Ok(false);
        };
        let age_ms = now - snapshot.saved_at_epoch_ms;
        if age_ms > STALE_AFTER_MS {
            let stale = EngineError::StaleSnapshot {
                age_secs: age_ms / 1000,
            };
            tracing::warn!(error = %stale, "discarding persisted session");
            self.clear_persisted();
            return Ok(false);
        }

        let ResumeSnapshot {
            session,
            timer,
            cursor,
            paused,
            ..
        } = snapshot;
        let mut policy = build_policy(&session.plan, &self.config);
        if !policy.restore(&cursor) {
            tracing::warn!(?cursor, "persisted cursor does not fit its plan, discarding");
            self.clear_persisted();
            return Ok(false);
        }

        self.audio.silence();
        self.machine.restore(session.current_phase);
        self.timer.restore(&timer);
        self.segment = match session.current_phase {
            Phase::Preparing => None,
            _ => Some(policy.current_segment()),
        };
        self.motion = MotionAutoPause::new(
            self.config.auto_pause && session.discipline() == Discipline::Running,
        );
        tracing::info!(
            session = %session.session_id,
            phase = %session.current_phase,
            remaining = timer.remaining_seconds,
            "session restored"
        );
        self.policy = Some(policy);
        self.session = Some(session);
        self.paused = paused;
        self.user_paused = paused;
        self.completed = false;
        self.switch_cues.clear();
        if self.reconciler.restore(now).is_none() && !paused {
            self.reconciler.start(now);
        }
        self.tick();
        Ok(true)
    }

    /// Stop all audio; the engine should not be ticked afterwards
    pub fn dispose(&mut self) {
        self.audio.dispose();
    }

    fn pause_with(&mut self, auto: bool) {
        if matches!(self.machine.current(), Phase::Idle | Phase::Finished) {
            return;
        }
        if self.paused {
            // a user pause on top of an auto-pause takes it over
            if !auto && !self.user_paused {
                self.user_paused = true;
                self.motion.on_user_command();
            }
            return;
        }
        let now = self.clock.now_ms();
        self.timer.pause(now);
        self.reconciler.pause(now);
        self.audio.silence();
        self.paused = true;
        self.user_paused = !auto;
        if !auto {
            self.motion.on_user_command();
        }
        tracing::info!(auto, remaining = self.timer.remaining(), "paused");
        self.events.push_back(EngineEvent::Paused { auto });
        self.persist(now);
    }

    fn resume_with(&mut self, auto: bool) {
        if !self.paused || (auto && self.user_paused) {
            return;
        }
        let now = self.clock.now_ms();
        self.paused = false;
        self.user_paused = false;
        if !auto {
            self.motion.on_user_command();
        }
        self.timer.resume(now);
        self.reconciler.start(now);
        tracing::info!(auto, remaining = self.timer.remaining(), "resumed");
        self.events.push_back(EngineEvent::Resumed { auto });
        self.persist(now);
    }

    fn advance(&mut self, advance: Advance) -> Result<(), EngineError> {
        if self.machine.current() == Phase::Preparing {
            return self.enter_first_segment();
        }
        let policy = self.policy.as_deref_mut().ok_or(EngineError::NoPlan)?;
        let outcome = policy.compute_next(advance);
        self.apply_outcome(outcome)
    }

    fn apply_outcome(&mut self, outcome: StepOutcome) -> Result<(), EngineError> {
        if let (Some(record), Some(session)) = (outcome.record, self.session.as_mut()) {
            session.record(record);
        }
        match outcome.next {
            NextStep::Segment(segment) => self.enter_segment(segment),
            NextStep::Finished => self.finish(),
        }
    }

    fn enter_first_segment(&mut self) -> Result<(), EngineError> {
        let policy = self.policy.as_deref_mut().ok_or(EngineError::NoPlan)?;
        let segment = policy.first_segment();
        self.enter_segment(segment)
    }

    fn enter_segment(&mut self, segment: Segment) -> Result<(), EngineError> {
        self.change_phase(segment.phase)?;
        self.audio.stop_tick_sound();
        self.switch_cues.clear();
        self.load_timer(&segment);
        if let Some(session) = self.session.as_mut() {
            session.enter(&segment);
        }
        self.announce_segment(&segment);
        tracing::info!(
            phase = %segment.phase,
            index = segment.index,
            sub = segment.sub_index,
            title = %segment.title,
            duration = ?segment.duration,
            "segment started"
        );
        self.events
            .push_back(EngineEvent::SegmentStarted(segment.clone()));
        self.segment = Some(segment);
        self.publish();
        Ok(())
    }

    /// Phase entry always goes through `set_time_and_start`; a paused
    /// session loads the segment without starting it.
    fn load_timer(&mut self, segment: &Segment) {
        match segment.duration {
            Some(secs) if !self.paused => {
                self.timer
                    .set_time_and_start(segment.phase, secs, self.clock.now_ms())
            }
            Some(secs) => self.timer.set_time(segment.phase, secs),
            None => self.timer.set_time(segment.phase, 0),
        }
        self.segment = Some(segment.clone());
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        let now = self.clock.now_ms();
        self.reconciler.stop(now);
        let total = self.reconciler.total_elapsed_seconds(now);
        self.settle_finished(total)?;
        self.publish();
        Ok(())
    }

    /// Enter `finished` and report the completion once. Does not publish.
    fn settle_finished(&mut self, total: u64) -> Result<(), EngineError> {
        self.audio.stop_tick_sound();
        self.change_phase(Phase::Finished)?;
        self.timer.set_time(Phase::Finished, 0);
        self.segment = None;
        self.paused = false;
        self.user_paused = false;
        self.audio.play_bell();
        if let Some(session) = self.session.as_mut() {
            session.total_elapsed_seconds = total;
        }

        if !self.completed {
            self.completed = true;
            if let Some(payload) = self.completion_payload() {
                tracing::info!(
                    discipline = %payload.discipline,
                    duration = payload.duration_seconds,
                    calories = payload.calories_estimate,
                    "workout complete"
                );
                self.events.push_back(EngineEvent::Completed(payload));
            }
        }
        self.clear_persisted();
        Ok(())
    }

    /// Walk the graph to `target`, announcing the change once.
    fn change_phase(&mut self, target: Phase) -> Result<(), EngineError> {
        let from = self.machine.current();
        if from == target {
            return Ok(());
        }
        let hops = self.machine.advance_to(target)?;
        if from == Phase::Workout {
            self.leave_workout(target);
        }
        let mut prev = from;
        for hop in hops {
            self.events
                .push_back(EngineEvent::PhaseChanged { from: prev, to: hop });
            prev = hop;
        }
        if let Some(session) = self.session.as_mut() {
            session.current_phase = target;
        }
        let spoken = self.audio.announce_phase_transition(from, target, None);
        self.note_speech(spoken);
        Ok(())
    }

    /// Motion only governs the workout phase; an auto-pause does not
    /// outlive it.
    fn leave_workout(&mut self, target: Phase) {
        self.motion.on_user_command();
        // finishing clears the pause on its own
        if self.paused && !self.user_paused && target != Phase::Finished {
            tracing::info!(%target, "leaving workout, lifting auto-pause");
            self.resume_with(true);
        }
    }

    fn announce_segment(&mut self, segment: &Segment) {
        let seconds = segment.duration.unwrap_or(0);
        let spoken = match segment.kind {
            SegmentKind::RoundWork => {
                self.audio.play_bell();
                let total = self.unit_count();
                self.audio
                    .announce_round_start(segment.index, total, segment.detail.as_deref())
            }
            SegmentKind::RoundRest => {
                self.audio.play_bell();
                self.audio.announce_rest(seconds)
            }
            SegmentKind::SetRest => self.audio.announce_rest(seconds),
            SegmentKind::Set => match &segment.detail {
                Some(detail) => self.audio.speak(&format!("{}. {detail}", segment.title)),
                None => self.audio.speak(&segment.title),
            },
            SegmentKind::Warmup | SegmentKind::Cooldown | SegmentKind::Interval(_) => self
                .audio
                .announce_segment(&segment.title, segment.duration),
        };
        self.note_speech(spoken);
    }

    /// Track the derived exercise within a boxing round and count down to
    /// each switch.
    ///
    /// The final seconds of the round belong to the timer's own countdown: a
    /// switch landing there is not counted down and its name is not spoken.
    /// A switch countdown only starts from the top, never mid-way.
    fn follow_exercises(&mut self, remaining: u32) {
        let round = match &self.segment {
            Some(seg) if seg.kind == SegmentKind::RoundWork => seg.index,
            _ => return,
        };
        let elapsed = self.timer.elapsed();
        let Some(cue) = self.policy.as_ref().and_then(|p| p.exercise_cue(elapsed)) else {
            return;
        };

        let current = self.session.as_ref().map(|s| s.current_sub_index);
        let switched = current != Some(cue.index);
        if switched {
            if let Some(session) = self.session.as_mut() {
                session.current_sub_index = cue.index;
            }
            if let Some(seg) = self.segment.as_mut() {
                seg.sub_index = cue.index;
            }
            tracing::debug!(round, exercise = cue.index, name = %cue.name, "exercise switch");
            if remaining > COUNTDOWN_FROM {
                let spoken = self.audio.announce_exercise(&cue.name);
                self.note_speech(spoken);
            }
            self.events.push_back(EngineEvent::ExerciseChanged {
                index: cue.index,
                name: cue.name.clone(),
            });
        }

        let Some((secs, next)) = cue.switch_in else {
            return;
        };
        let clear_of_round_end = remaining.saturating_sub(secs) > COUNTDOWN_FROM;
        let in_sequence = if secs == COUNTDOWN_FROM {
            !switched
        } else {
            self.switch_cues.contains(&(round, next, COUNTDOWN_FROM))
        };
        if (1..=COUNTDOWN_FROM).contains(&secs)
            && clear_of_round_end
            && in_sequence
            && self.switch_cues.insert((round, next, secs))
        {
            let spoken = self.audio.announce_countdown(secs);
            self.note_speech(spoken);
            self.events.push_back(EngineEvent::Countdown(secs));
        }
    }

    fn update_tick_loop(&mut self, remaining: u32) {
        let wanted = self.timer.is_running()
            && self.segment.as_ref().is_some_and(Segment::is_work)
            && remaining > 0
            && remaining <= self.config.tick_warning_seconds;
        if wanted {
            self.audio.start_tick_sound();
        } else {
            self.audio.stop_tick_sound();
        }
    }

    fn note_speech(&mut self, result: Result<Option<UtteranceId>, AudioError>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "announcement failed");
            self.events.push_back(EngineEvent::SpeechFailed(e));
        }
    }

    fn apply_inbound(&mut self) {
        let Some(broadcast) = self.broadcast.as_mut() else {
            return;
        };
        let mut latest = None;
        while let Some(message) = broadcast.try_recv() {
            latest = Some(message);
        }
        if let Some(message) = latest {
            self.apply_remote(message.payload);
        }
    }

    fn publish(&mut self) {
        let (Some(broadcast), Some(session)) = (self.broadcast.as_mut(), self.session.as_ref())
        else {
            return;
        };
        if let Err(e) = broadcast.publish(&SyncMessage::sync(session)) {
            tracing::warn!(topic = broadcast.topic(), error = %e, "broadcast failed");
        }
    }

    fn persist(&mut self, now: i64) {
        if matches!(self.machine.current(), Phase::Idle | Phase::Finished) {
            return;
        }
        let (Some(session), Some(policy)) = (self.session.as_ref(), self.policy.as_deref()) else {
            return;
        };
        let mut session = session.clone();
        session.total_elapsed_seconds = self.reconciler.total_elapsed_seconds(now);
        let snapshot = ResumeSnapshot {
            session,
            timer: self.timer.snapshot(),
            cursor: policy.cursor(),
            paused: self.paused,
            saved_at_epoch_ms: now,
        };
        match save_json(self.store.as_ref(), SESSION_KEY, &snapshot) {
            Ok(()) => self.last_persist_ms = Some(now),
            Err(e) => tracing::warn!(error = %e, "failed to persist session"),
        }
    }

    fn clear_persisted(&mut self) {
        if let Err(e) = self.store.remove(SESSION_KEY) {
            tracing::warn!(error = %e, "failed to remove persisted session");
        }
        self.reconciler.clear();
    }
}

/// Where a session stands, for deciding whether a remote state moved it.
/// The exercise within a boxing round follows from elapsed time and is left out.
fn remote_position(state: &SessionState) -> (Phase, Option<SegmentKind>, usize, usize) {
    let sub = match state.current_kind {
        Some(SegmentKind::RoundWork) => 0,
        _ => state.current_sub_index,
    };
    (
        state.current_phase,
        state.current_kind,
        state.current_segment_index,
        sub,
    )
}
