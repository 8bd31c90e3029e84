// Shared rig for headless engine tests.
#![allow(dead_code)]

use std::sync::Arc;

use bellwork::audio::{speech_channel, AudioArbiter, NullAudioBackend};
use bellwork::clock::ManualClock;
use bellwork::config::{Config, SpeechOptions};
use bellwork::engine::{Engine, EngineEvent};
use bellwork::plan::WorkoutPlan;
use bellwork::store::MemoryStore;

pub const T0: i64 = 1_700_000_000_000;

pub struct Rig {
    pub engine: Engine,
    pub clock: ManualClock,
    pub store: MemoryStore,
    pub audio: NullAudioBackend,
    pub events: Vec<EngineEvent>,
}

pub fn quick_config() -> Config {
    Config {
        prepare_seconds: 0,
        ..Config::default()
    }
}

pub fn rig_with(config: Config, clock: ManualClock, store: MemoryStore) -> Rig {
    let (tx, rx) = speech_channel();
    let audio = NullAudioBackend::new(tx);
    let arbiter = AudioArbiter::new(
        Box::new(audio.clone()),
        rx,
        config.voice_enabled,
        SpeechOptions::default(),
    );
    let engine = Engine::new(
        config,
        Arc::new(clock.clone()),
        Arc::new(store.clone()),
        arbiter,
    );
    Rig {
        engine,
        clock,
        store,
        audio,
        events: Vec::new(),
    }
}

pub fn rig(plan: WorkoutPlan) -> Rig {
    let mut rig = rig_with(quick_config(), ManualClock::new(T0), MemoryStore::new());
    rig.engine.attach_plan(plan).expect("plan attaches");
    rig
}

impl Rig {
    /// Advance the clock in host-sized steps, ticking after each
    pub fn run_secs(&mut self, secs: i64) {
        for _ in 0..secs * 4 {
            self.clock.advance_ms(250);
            self.tick();
        }
    }

    /// One jump followed by a single tick
    pub fn jump_secs(&mut self, secs: i64) {
        self.clock.advance_secs(secs);
        self.tick();
    }

    pub fn tick(&mut self) {
        self.engine.tick();
        self.collect();
    }

    pub fn collect(&mut self) {
        self.events.extend(self.engine.poll_events());
    }

    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        self.collect();
        std::mem::take(&mut self.events)
    }
}
