// Properties over the phase graph, the timer and the audio arbiter.

mod common;

use bellwork::audio::{
    speech_channel, AudioArbiter, AudioCall, NullAudioBackend, SpeechEvent,
};
use bellwork::config::SpeechOptions;
use bellwork::phase::{Phase, PhaseStateMachine};
use bellwork::plan::{BoxingExercise, BoxingPlan, BoxingRound, WorkoutPlan};
use bellwork::policy::SegmentKind;
use bellwork::reconciler::LifecycleState;
use bellwork::timer::PhaseTimer;
use bellwork::EngineEvent;
use common::rig;
use proptest::prelude::*;

fn phase() -> impl Strategy<Value = Phase> {
    prop::sample::select(Phase::ALL.to_vec())
}

proptest! {
    #[test]
    fn transition_changes_state_iff_allowed(from in phase(), to in phase()) {
        let mut machine = PhaseStateMachine::new();
        machine.restore(from);
        let result = machine.transition(to);
        if from.allowed_next().contains(&to) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(machine.current(), to);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(machine.current(), from);
        }
    }

    #[test]
    fn remaining_never_increases_while_active(
        seconds in 1u32..600,
        steps in prop::collection::vec(-2_000i64..5_000, 1..60),
    ) {
        let mut timer = PhaseTimer::new();
        let mut now = 1_000_000i64;
        timer.set_time_and_start(Phase::Workout, seconds, now);
        let mut last = seconds;
        for step in steps {
            // negative steps are a wall clock moving backwards
            now += step;
            let tick = timer.tick(now);
            prop_assert!(tick.remaining <= last);
            prop_assert!(tick.remaining <= seconds);
            last = tick.remaining;
            if tick.expired {
                break;
            }
        }
    }

    #[test]
    fn countdown_fires_once_per_value(seconds in 4u32..40, step_ms in 100i64..1_000) {
        let mut timer = PhaseTimer::new();
        let mut now = 0i64;
        timer.set_time_and_start(Phase::Workout, seconds, now);
        let mut seen = Vec::new();
        loop {
            now += step_ms;
            let tick = timer.tick(now);
            seen.extend(tick.countdown);
            if tick.expired {
                break;
            }
        }
        prop_assert_eq!(seen, vec![3, 2, 1]);
    }

    #[test]
    fn background_round_trip(n in 2u32..3_600, fraction in 0.0f64..1.0) {
        let d = ((n - 1) as f64 * fraction) as i64;
        let mut r = rig(WorkoutPlan::Boxing(BoxingPlan::uniform(1, n, 30)));
        r.engine.start().unwrap();
        r.engine.on_lifecycle(LifecycleState::Background);
        r.clock.advance_secs(d);
        r.engine.on_lifecycle(LifecycleState::Active);
        let expected = i64::from(n) - d;
        prop_assert!((i64::from(r.engine.remaining()) - expected).abs() <= 1);
    }

    #[test]
    fn ducking_tracks_speech_and_tick(ops in prop::collection::vec(0u8..6, 1..40)) {
        let (tx, rx) = speech_channel();
        let backend = NullAudioBackend::manual(tx.clone());
        let mut audio = AudioArbiter::new(
            Box::new(backend.clone()),
            rx,
            true,
            SpeechOptions::default(),
        );
        let mut next_done = 1u64;
        for op in ops {
            match op {
                0 => { audio.speak("go").unwrap(); }
                1 => {
                    // finish the oldest outstanding utterance
                    let _ = tx.send(SpeechEvent::Done(next_done));
                    next_done += 1;
                    audio.pump();
                }
                2 => audio.start_tick_sound(),
                3 => audio.stop_tick_sound(),
                4 => audio.stop_speech(),
                _ => audio.play_bell(),
            }
            let state = audio.state();
            prop_assert_eq!(state.is_ducking, state.is_speaking || state.is_tick_looping);
            let applied = backend
                .calls()
                .into_iter()
                .filter_map(|c| match c {
                    AudioCall::SetDucking(on) => Some(on),
                    _ => None,
                })
                .last()
                .unwrap_or(false);
            prop_assert_eq!(applied, state.is_ducking);
        }
    }
}

#[test]
fn countdown_rearms_on_new_segment() {
    let mut r = rig(WorkoutPlan::Boxing(BoxingPlan::uniform(2, 5, 5)));
    r.engine.start().unwrap();
    r.run_secs(10);
    let countdowns: Vec<u32> = r
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Countdown(n) => Some(n),
            _ => None,
        })
        .collect();
    // 3, 2, 1 for the work half and again for the rest half; switches this
    // close to the round end are not counted down
    assert_eq!(countdowns, vec![3, 2, 1, 3, 2, 1]);
    let spoken = r.audio.spoken();
    let numbers: Vec<&str> = spoken
        .iter()
        .map(String::as_str)
        .filter(|s| ["1", "2", "3"].contains(s))
        .collect();
    assert_eq!(numbers, vec!["3", "2", "1", "3", "2", "1"]);
}

#[test]
fn switch_countdown_stays_clear_of_the_round_end() {
    let mut plan = BoxingPlan::uniform(1, 12, 5);
    plan.rounds = vec![BoxingRound {
        work_seconds: 12,
        rest_seconds: 5,
        exercises: vec![
            BoxingExercise {
                name: "Jab".into(),
                duration_seconds: Some(6),
            },
            BoxingExercise {
                name: "Cross".into(),
                duration_seconds: Some(4),
            },
            BoxingExercise {
                name: "Hooks".into(),
                duration_seconds: Some(2),
            },
        ],
    }];
    let mut r = rig(WorkoutPlan::Boxing(plan));
    r.engine.start().unwrap();
    r.run_secs(12);
    let countdowns: Vec<u32> = r
        .take_events()
        .into_iter()
        .filter_map(|e| match e {
            EngineEvent::Countdown(n) => Some(n),
            _ => None,
        })
        .collect();
    // before Cross at 6s, then only the round end; the switch to Hooks at
    // 10s falls inside the final three seconds
    assert_eq!(countdowns, vec![3, 2, 1, 3, 2, 1]);
    assert!(!r.audio.spoken().iter().any(|s| s == "Hooks"));
    assert_eq!(r.engine.current_segment().unwrap().kind, SegmentKind::RoundRest);
}
