use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Widget, Wrap},
};

use crate::engine::Engine;
use crate::phase::Phase;
use crate::plan::Discipline;
use crate::policy::SegmentKind;
use crate::session::CompletionPayload;

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

/// `mm:ss`, hours folded into minutes
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// What the terminal shows for one engine state
pub struct WorkoutView<'a> {
    pub engine: &'a Engine,
    /// Simulated movement signal, shown for running plans
    pub moving: Option<bool>,
    pub summary: Option<&'a CompletionPayload>,
}

impl<'a> WorkoutView<'a> {
    pub fn new(engine: &'a Engine) -> Self {
        Self {
            engine,
            moving: None,
            summary: None,
        }
    }

    pub fn phase_title(&self) -> &'static str {
        match self.engine.phase() {
            Phase::Idle => "READY",
            Phase::Preparing => "GET READY",
            Phase::Warmup => "WARM-UP",
            Phase::Workout => "WORKOUT",
            Phase::Cooldown => "COOL-DOWN",
            Phase::Finished => "FINISHED",
        }
    }

    pub fn status(&self) -> Option<&'static str> {
        if self.engine.was_auto_paused() {
            Some("AUTO-PAUSED (not moving)")
        } else if self.engine.is_paused() {
            Some("PAUSED")
        } else {
            None
        }
    }

    /// Round, interval or exercise position, e.g. `Round 2/3`
    pub fn counter(&self) -> Option<String> {
        let segment = self.engine.current_segment()?;
        let total = self.engine.unit_count();
        match segment.kind {
            SegmentKind::RoundWork | SegmentKind::RoundRest => {
                Some(format!("Round {}/{}", segment.index + 1, total))
            }
            SegmentKind::Interval(_) => Some(format!("Interval {}/{}", segment.index + 1, total)),
            SegmentKind::Set | SegmentKind::SetRest => {
                Some(format!("Exercise {}/{}", segment.index + 1, total))
            }
            SegmentKind::Warmup | SegmentKind::Cooldown => None,
        }
    }

    pub fn key_help(&self) -> &'static str {
        match (self.engine.phase(), self.engine.discipline()) {
            (Phase::Idle, _) => "(space) start / (q)uit",
            (Phase::Finished, _) => "(r)eset / (q)uit",
            (_, Some(Discipline::Gym)) => {
                "(space) pause / (n) set done / (s)kip / (b)ack / (r)eset / (q)uit"
            }
            (_, Some(Discipline::Running)) => {
                "(space) pause / (s)kip / (b)ack / (w) moving / (r)eset / (q)uit"
            }
            _ => "(space) pause / (s)kip / (b)ack / (r)eset / (q)uit",
        }
    }

    fn progress(&self) -> f64 {
        let duration = self.engine.timer_snapshot().duration_seconds;
        if duration == 0 {
            return 0.0;
        }
        let remaining = self.engine.remaining().min(duration);
        f64::from(duration - remaining) / f64::from(duration)
    }
}

impl Widget for &WorkoutView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let italic_style = Style::default().add_modifier(Modifier::ITALIC);
        let phase_color = match self.engine.phase() {
            Phase::Preparing => Color::Yellow,
            Phase::Warmup | Phase::Cooldown => Color::Cyan,
            Phase::Workout => Color::Red,
            Phase::Finished => Color::Green,
            Phase::Idle => Color::Gray,
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // phase
                Constraint::Length(1), // counter
                Constraint::Min(3),    // clock + segment
                Constraint::Length(3), // gauge
                Constraint::Length(1), // status
                Constraint::Length(1), // total
                Constraint::Length(1), // keys
            ])
            .split(area);

        Paragraph::new(Span::styled(
            self.phase_title(),
            Style::default().patch(bold_style).fg(phase_color),
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        if let Some(counter) = self.counter() {
            Paragraph::new(Span::styled(counter, dim_style))
                .alignment(Alignment::Center)
                .render(chunks[1], buf);
        }

        let mut lines = Vec::new();
        if let Some(summary) = self.summary.filter(|_| self.engine.phase() == Phase::Finished) {
            lines.push(Line::from(Span::styled(
                format!(
                    "{} in {}  ~{} kcal",
                    summary.plan_snapshot.name(),
                    format_clock(summary.duration_seconds),
                    summary.calories_estimate
                ),
                bold_style,
            )));
        } else {
            let untimed = self
                .engine
                .current_segment()
                .is_some_and(|seg| !seg.is_timed());
            let clock = if untimed {
                "--:--".to_string()
            } else {
                format_clock(u64::from(self.engine.remaining()))
            };
            lines.push(Line::from(Span::styled(
                clock,
                Style::default().patch(bold_style).fg(phase_color),
            )));
            if let Some(segment) = self.engine.current_segment() {
                lines.push(Line::from(Span::styled(segment.title.clone(), bold_style)));
                if let Some(detail) = &segment.detail {
                    lines.push(Line::from(Span::styled(detail.clone(), italic_style)));
                }
            }
        }
        Paragraph::new(lines)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(chunks[2], buf);

        Gauge::default()
            .block(Block::default().borders(Borders::ALL))
            .gauge_style(Style::default().fg(phase_color))
            .ratio(self.progress().clamp(0.0, 1.0))
            .render(chunks[3], buf);

        let mut status = Vec::new();
        if let Some(text) = self.status() {
            status.push(Span::styled(text, Style::default().fg(Color::Yellow)));
        }
        if let Some(moving) = self.moving {
            if !status.is_empty() {
                status.push(Span::raw("  "));
            }
            status.push(Span::styled(
                if moving { "moving" } else { "stopped" },
                dim_style,
            ));
        }
        Paragraph::new(Line::from(status))
            .alignment(Alignment::Center)
            .render(chunks[4], buf);

        Paragraph::new(Span::styled(
            format!(
                "total {}",
                format_clock(self.engine.total_elapsed_seconds())
            ),
            dim_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[5], buf);

        Paragraph::new(Span::styled(self.key_help(), italic_style))
            .alignment(Alignment::Center)
            .render(chunks[6], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioArbiter;
    use crate::clock::ManualClock;
    use crate::config::Config;
    use crate::plan::{BoxingPlan, WorkoutPlan};
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn engine() -> Engine {
        let config = Config {
            prepare_seconds: 0,
            voice_enabled: false,
            ..Config::default()
        };
        let mut engine = Engine::new(
            config,
            Arc::new(ManualClock::new(0)),
            Arc::new(MemoryStore::new()),
            AudioArbiter::silent(),
        );
        engine
            .attach_plan(WorkoutPlan::Boxing(BoxingPlan::uniform(3, 90, 30)))
            .unwrap();
        engine
    }

    fn text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn clock_format() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(95), "01:35");
        assert_eq!(format_clock(3600), "60:00");
    }

    #[test]
    fn idle_screen_shows_ready() {
        let engine = engine();
        let view = WorkoutView::new(&engine);
        let area = Rect::new(0, 0, 80, 20);
        let mut buf = Buffer::empty(area);
        (&view).render(area, &mut buf);
        let out = text(&buf);
        assert!(out.contains("READY"));
        assert!(out.contains("(space) start"));
    }

    #[test]
    fn running_round_shows_counter_and_clock() {
        let mut engine = engine();
        engine.start().unwrap();
        let view = WorkoutView::new(&engine);
        assert_eq!(view.counter().as_deref(), Some("Round 1/3"));

        let area = Rect::new(0, 0, 80, 20);
        let mut buf = Buffer::empty(area);
        (&view).render(area, &mut buf);
        let out = text(&buf);
        assert!(out.contains("WORKOUT"));
        assert!(out.contains("01:30"));
        assert!(out.contains("Round 1 of 3"));
    }

    #[test]
    fn paused_status() {
        let mut engine = engine();
        engine.start().unwrap();
        engine.pause();
        assert_eq!(WorkoutView::new(&engine).status(), Some("PAUSED"));
    }
}
