use crate::phase::Phase;

const PHASE_SCRIPTS: &[(Phase, Phase, &str)] = &[
    (Phase::Idle, Phase::Preparing, "Get ready"),
    (Phase::Idle, Phase::Warmup, "Let's warm up"),
    (Phase::Idle, Phase::Workout, "Let's go"),
    (Phase::Preparing, Phase::Warmup, "Warm-up. Get loose"),
    (Phase::Preparing, Phase::Workout, "Let's go"),
    (Phase::Warmup, Phase::Workout, "Warm-up done. Time to work"),
    (Phase::Warmup, Phase::Idle, "Workout stopped"),
    (Phase::Workout, Phase::Warmup, "Back to the warm-up"),
    (Phase::Workout, Phase::Cooldown, "Great work. Time to cool down"),
    (Phase::Workout, Phase::Finished, "Workout complete. Great job"),
    (Phase::Cooldown, Phase::Workout, "Back to work"),
    (Phase::Cooldown, Phase::Finished, "Cool-down done. Workout complete"),
];

/// Fixed announcement for a phase change, if one is defined
pub fn phase_script(from: Phase, to: Phase) -> Option<&'static str> {
    PHASE_SCRIPTS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, script)| *script)
}

/// Duration phrased for speech, e.g. "1 minute 30 seconds"
pub fn spoken_duration(seconds: u32) -> String {
    let (minutes, secs) = (seconds / 60, seconds % 60);
    let unit = |n: u32, word: &str| {
        if n == 1 {
            format!("1 {word}")
        } else {
            format!("{n} {word}s")
        }
    };
    match (minutes, secs) {
        (0, s) => unit(s, "second"),
        (m, 0) => unit(m, "minute"),
        (m, s) => format!("{} {}", unit(m, "minute"), unit(s, "second")),
    }
}
