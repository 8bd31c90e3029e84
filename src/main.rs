use bellwork::{
    audio::{speech_channel, AudioArbiter, SystemAudioBackend},
    clock::SystemClock,
    config::{Config, ConfigStore, FileConfigStore},
    engine::{Engine, EngineEvent},
    history::{HistoryDb, HistorySink},
    logging,
    motion::MotionSample,
    phase::Phase,
    plan::{self, Discipline, WorkoutPlan},
    runtime::{CrosstermEventSource, HostEvent, HostLoop},
    session::CompletionPayload,
    store::FileSnapshotStore,
    ui::{format_clock, WorkoutView},
    EngineError,
};
use clap::{error::ErrorKind, CommandFactory, Parser};
use crossterm::{
    event::{DisableFocusChange, EnableFocusChange, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use itertools::Itertools;
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Frame, Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    sync::Arc,
};
use time_humanize::{Accuracy, HumanTime, Tense};

const DEFAULT_PLAN: &str = "boxing-basic";
const HISTORY_LIMIT: usize = 10;
/// Simulated pace while the movement toggle is on
const SIMULATED_SPEED: f64 = 2.8;

/// timed workout runner with spoken cues for boxing rounds, running intervals and gym sets
#[derive(Parser, Debug, Clone)]
#[clap(version, about)]
pub struct Cli {
    /// workout plan JSON file
    #[clap(short = 'p', long, conflicts_with = "builtin")]
    plan: Option<PathBuf>,

    /// name of a bundled plan
    #[clap(short = 'b', long)]
    builtin: Option<String>,

    /// list bundled plans and exit
    #[clap(long)]
    list_plans: bool,

    /// show recent workouts and exit
    #[clap(long)]
    history: bool,

    /// disable spoken cues
    #[clap(long)]
    no_voice: bool,

    /// seconds of countdown before the first segment
    #[clap(long)]
    prepare_secs: Option<u32>,

    /// continue the session left by a previous run
    #[clap(short = 'r', long)]
    resume: bool,

    /// notes stored with the finished workout
    #[clap(short = 'n', long)]
    notes: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if self.no_voice {
            config.voice_enabled = false;
        }
        if let Some(secs) = self.prepare_secs {
            config.prepare_seconds = secs;
        }
    }

    fn load_plan(&self) -> Result<WorkoutPlan, EngineError> {
        let plan = match (&self.plan, &self.builtin) {
            (Some(path), _) => WorkoutPlan::from_file(path)?,
            (None, Some(name)) => plan::builtin(name)?,
            (None, None) => plan::builtin(DEFAULT_PLAN)?,
        };
        Ok(plan)
    }
}

pub struct App {
    pub engine: Engine,
    pub history: Option<Box<dyn HistorySink>>,
    pub summary: Option<CompletionPayload>,
    /// Simulated movement, `None` unless the plan is a running plan
    pub moving: Option<bool>,
}

impl App {
    pub fn new(engine: Engine, history: Option<Box<dyn HistorySink>>) -> Self {
        let moving = (engine.discipline() == Some(Discipline::Running)).then_some(true);
        Self {
            engine,
            history,
            summary: None,
            moving,
        }
    }

    /// Returns `true` when the app should quit
    pub fn on_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => return true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char(' ') => {
                if self.engine.phase() == Phase::Idle {
                    self.start();
                } else {
                    self.engine.toggle_pause();
                }
            }
            KeyCode::Char('s') => self.engine.skip(),
            KeyCode::Char('n') | KeyCode::Enter => {
                if let Err(e) = self.engine.complete_set() {
                    tracing::debug!(error = %e, "complete set ignored");
                }
            }
            KeyCode::Char('b') => {
                if let Err(e) = self.engine.go_back() {
                    tracing::warn!(error = %e, "go back failed");
                }
            }
            KeyCode::Char('r') => {
                self.engine.reset();
                self.summary = None;
            }
            KeyCode::Char('w') => {
                if let Some(moving) = self.moving.as_mut() {
                    *moving = !*moving;
                    let sample = if *moving {
                        MotionSample::moving(SIMULATED_SPEED)
                    } else {
                        MotionSample::stopped()
                    };
                    self.engine.on_motion(sample);
                }
            }
            _ => {}
        }
        self.drain_events();
        false
    }

    /// Follow up on an event the host loop already fed to the engine.
    /// Returns `true` when the app should quit.
    pub fn on_host_event(&mut self, event: HostEvent) -> bool {
        match event {
            HostEvent::Key(key) => self.on_key(key),
            _ => {
                self.drain_events();
                false
            }
        }
    }

    fn start(&mut self) {
        if let Err(e) = self.engine.start() {
            tracing::warn!(error = %e, "failed to start workout");
            return;
        }
        if self.moving == Some(true) {
            self.engine.on_motion(MotionSample::moving(SIMULATED_SPEED));
        }
    }

    fn drain_events(&mut self) {
        for event in self.engine.poll_events() {
            match event {
                EngineEvent::Completed(payload) => {
                    if let Some(history) = self.history.as_mut() {
                        if let Err(e) = history.record(&payload) {
                            tracing::warn!(error = %e, "failed to record workout");
                        }
                    }
                    self.summary = Some(payload);
                }
                EngineEvent::SpeechFailed(e) => tracing::warn!(error = %e, "speech failed"),
                _ => {}
            }
        }
    }
}

fn build_engine(config: Config) -> Engine {
    let (tx, rx) = speech_channel();
    let command = config.speech_command.clone();
    let audio = AudioArbiter::new(
        Box::new(SystemAudioBackend::new(command, tx)),
        rx,
        config.voice_enabled,
        config.speech,
    );
    Engine::new(
        config,
        Arc::new(SystemClock),
        Arc::new(FileSnapshotStore::new()),
        audio,
    )
}

fn print_plans() {
    println!("{}", plan::builtin_names().iter().join("\n"));
}

fn print_history() -> Result<(), Box<dyn Error>> {
    let db = HistoryDb::open_default()?;
    let entries = db.recent(HISTORY_LIMIT)?;
    if entries.is_empty() {
        println!("no workouts recorded yet");
        return Ok(());
    }
    let now = chrono::Local::now();
    for entry in entries {
        let age = (now - entry.completed_at).num_seconds();
        let when = HumanTime::from_seconds(-age).to_text_en(Accuracy::Rough, Tense::Present);
        println!(
            "{:<16} {:<8} {}  {:>4} kcal  {}{}",
            when,
            entry.discipline,
            format_clock(entry.duration_seconds),
            entry.calories_estimate,
            entry.plan.name(),
            entry
                .notes
                .map(|n| format!("  ({n})"))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    if cli.list_plans {
        print_plans();
        return Ok(());
    }
    if cli.history {
        return print_history();
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let _log_guard = logging::init_default();

    let mut config = FileConfigStore::new().load();
    cli.apply(&mut config);
    let mut engine = build_engine(config);
    engine.set_notes(cli.notes.clone());

    let restored = cli.resume && engine.restore()?;
    if !restored {
        if cli.resume {
            tracing::info!("no session to resume, starting fresh");
        }
        let plan = match cli.load_plan() {
            Ok(plan) => plan,
            Err(e) => {
                let mut cmd = Cli::command();
                cmd.error(ErrorKind::InvalidValue, e.to_string()).exit();
            }
        };
        engine.attach_plan(plan)?;
    }

    let history = match HistoryDb::open_default() {
        Ok(db) => Some(Box::new(db) as Box<dyn HistorySink>),
        Err(e) => {
            tracing::warn!(error = %e, "workout history unavailable");
            None
        }
    };

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(engine, history);
    let result = start_tui(&mut terminal, &mut app);
    app.engine.dispose();

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}

fn start_tui<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> Result<(), Box<dyn Error>> {
    let host = HostLoop::new(CrosstermEventSource::new());

    loop {
        terminal.draw(|f| ui(app, f))?;
        let event = host.drive(&mut app.engine);
        if app.on_host_event(event) {
            break;
        }
    }
    Ok(())
}

fn ui(app: &App, f: &mut Frame) {
    let view = WorkoutView {
        engine: &app.engine,
        moving: app.moving,
        summary: app.summary.as_ref(),
    };
    f.render_widget(&view, f.area());
}
