// Realtime mirroring between two engines and motion-driven auto-pause.

mod common;

use bellwork::broadcast::{topic_for, ChannelBroadcast, RealtimeBroadcast, SyncMessage};
use bellwork::clock::ManualClock;
use bellwork::engine::EngineEvent;
use bellwork::motion::MotionSample;
use bellwork::phase::Phase;
use bellwork::plan::{BoxingPlan, IntervalKind, RunInterval, RunningPlan, WorkoutPlan};
use bellwork::policy::SegmentKind;
use bellwork::store::MemoryStore;
use common::{quick_config, rig, rig_with, Rig, T0};

fn mirrored(plan: WorkoutPlan) -> (Rig, Rig) {
    let clock = ManualClock::new(T0);
    let mut a = rig_with(quick_config(), clock.clone(), MemoryStore::new());
    let mut b = rig_with(quick_config(), clock, MemoryStore::new());
    a.engine.attach_plan(plan.clone()).unwrap();
    b.engine.attach_plan(plan).unwrap();
    let id = a.engine.session().unwrap().session_id.clone();
    let (left, right) = ChannelBroadcast::pair(&topic_for(&id));
    a.engine = a.engine.with_broadcast(Box::new(left));
    b.engine = b.engine.with_broadcast(Box::new(right));
    (a, b)
}

fn run() -> WorkoutPlan {
    WorkoutPlan::Running(RunningPlan {
        name: "steady".into(),
        intervals: vec![
            RunInterval::new(IntervalKind::Run, 600),
            RunInterval::new(IntervalKind::Sprint, 60),
        ],
    })
}

#[test]
fn peer_follows_skips() {
    let (mut a, mut b) = mirrored(WorkoutPlan::Boxing(BoxingPlan::uniform(3, 180, 60)));
    assert_eq!(
        a.engine.session().unwrap().session_id,
        b.engine.session().unwrap().session_id
    );

    a.engine.start().unwrap();
    a.engine.skip();
    b.tick();

    assert_eq!(b.engine.phase(), Phase::Workout);
    let seg = b.engine.current_segment().unwrap();
    assert_eq!(seg.kind, SegmentKind::RoundRest);
    assert_eq!(b.engine.remaining(), 60);
    assert!(b.take_events().contains(&EngineEvent::RemoteApplied));
}

#[test]
fn foreign_session_is_ignored() {
    let mut r = rig(run());
    let (mut peer, local) = ChannelBroadcast::pair("workout:other");
    r.engine = r.engine.with_broadcast(Box::new(local));
    r.engine.start().unwrap();

    let mut state = r.engine.session().unwrap().clone();
    state.session_id = "someone-else".into();
    state.current_segment_index = 1;
    peer.publish(&SyncMessage::sync(&state)).unwrap();
    r.tick();

    assert_eq!(r.engine.current_segment().unwrap().index, 0);
    assert!(!r.take_events().contains(&EngineEvent::RemoteApplied));
}

#[test]
fn remote_state_overwrites_progress() {
    let mut r = rig(run());
    let (mut peer, local) = ChannelBroadcast::pair("workout:x");
    r.engine = r.engine.with_broadcast(Box::new(local));
    r.engine.start().unwrap();

    let mut state = r.engine.session().unwrap().clone();
    state.current_segment_index = 1;
    state.completed_segment_indices = vec![0];
    peer.publish(&SyncMessage::sync(&state)).unwrap();
    r.tick();

    let session = r.engine.session().unwrap();
    assert_eq!(session.completed_segment_indices, vec![0]);
    assert_eq!(r.engine.current_segment().unwrap().index, 1);
    assert_eq!(r.engine.remaining(), 60);

    // the engine keeps publishing its own state
    r.jump_secs(10);
    let echoed = std::iter::from_fn(|| peer.try_recv()).last().unwrap();
    assert_eq!(echoed.payload.current_segment_index, 1);
}

#[test]
fn stopping_auto_pauses_a_run() {
    let mut r = rig(run());
    r.engine.start().unwrap();
    r.engine.on_motion(MotionSample::moving(3.1));
    r.jump_secs(10);

    r.engine.on_motion(MotionSample::stopped());
    assert!(r.engine.is_paused());
    assert!(r.engine.was_auto_paused());
    r.jump_secs(30);
    assert_eq!(r.engine.remaining(), 590);

    r.engine.on_motion(MotionSample::moving(2.9));
    assert!(!r.engine.is_paused());
    r.jump_secs(10);
    assert_eq!(r.engine.remaining(), 580);

    let events = r.take_events();
    assert!(events.contains(&EngineEvent::Paused { auto: true }));
    assert!(events.contains(&EngineEvent::Resumed { auto: true }));
}

#[test]
fn user_pause_wins_over_motion() {
    let mut r = rig(run());
    r.engine.start().unwrap();
    r.engine.on_motion(MotionSample::moving(3.0));
    r.engine.on_motion(MotionSample::stopped());
    assert!(r.engine.was_auto_paused());

    r.engine.pause();
    assert!(!r.engine.was_auto_paused());
    r.engine.on_motion(MotionSample::moving(3.0));
    assert!(r.engine.is_paused());

    r.engine.resume();
    assert!(!r.engine.is_paused());
}

#[test]
fn motion_is_ignored_for_boxing() {
    let mut r = rig(WorkoutPlan::Boxing(BoxingPlan::uniform(2, 60, 30)));
    r.engine.start().unwrap();
    r.engine.on_motion(MotionSample::moving(1.0));
    r.engine.on_motion(MotionSample::stopped());
    assert!(!r.engine.is_paused());
}

#[test]
fn leaving_workout_lifts_an_auto_pause() {
    let mut r = rig(WorkoutPlan::Running(RunningPlan {
        name: "out and back".into(),
        intervals: vec![
            RunInterval::new(IntervalKind::Run, 600),
            RunInterval::new(IntervalKind::CoolDown, 300),
        ],
    }));
    r.engine.start().unwrap();
    r.engine.on_motion(MotionSample::moving(3.0));
    r.engine.on_motion(MotionSample::stopped());
    assert!(r.engine.was_auto_paused());

    r.engine.skip();
    assert_eq!(r.engine.phase(), Phase::Cooldown);
    assert!(!r.engine.is_paused());
    assert!(!r.engine.was_auto_paused());

    r.engine.on_motion(MotionSample::moving(3.0));
    r.jump_secs(5);
    assert_eq!(r.engine.remaining(), 295);
    assert!(r.take_events().contains(&EngineEvent::Resumed { auto: true }));
}

#[test]
fn user_pause_survives_leaving_workout() {
    let mut r = rig(WorkoutPlan::Running(RunningPlan {
        name: "out and back".into(),
        intervals: vec![
            RunInterval::new(IntervalKind::Run, 600),
            RunInterval::new(IntervalKind::CoolDown, 300),
        ],
    }));
    r.engine.start().unwrap();
    r.engine.pause();
    r.engine.skip();
    assert_eq!(r.engine.phase(), Phase::Cooldown);
    assert!(r.engine.is_paused());
    r.jump_secs(5);
    assert_eq!(r.engine.remaining(), 300);
}

#[test]
fn peer_finishing_completes_the_mirror() {
    let (mut a, mut b) = mirrored(WorkoutPlan::Boxing(BoxingPlan::uniform(1, 60, 30)));
    a.engine.start().unwrap();
    b.tick();
    assert_eq!(b.engine.phase(), Phase::Workout);
    b.take_events();

    a.engine.skip();
    a.engine.skip();
    assert_eq!(a.engine.phase(), Phase::Finished);
    b.jump_secs(2);

    assert_eq!(b.engine.phase(), Phase::Finished);
    assert!(b.engine.is_complete());
    let events = b.take_events();
    let completed = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Completed(_)))
        .count();
    assert_eq!(completed, 1);
    assert!(events.contains(&EngineEvent::RemoteApplied));
    assert!(!b.store.contains(bellwork::session::SESSION_KEY));

    // a repeat of the same state does not complete twice
    b.engine.apply_remote(a.engine.session().unwrap().clone());
    b.collect();
    assert!(!b
        .take_events()
        .iter()
        .any(|e| matches!(e, EngineEvent::Completed(_))));
}
