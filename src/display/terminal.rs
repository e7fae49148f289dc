// src/display/terminal.rs
//! Terminal-based live session display

use crate::{
    error::Result,
    history::{format_duration, format_pace},
    location::PositionSample,
    recorder::RecorderStatus,
    route::RouteProgress,
    session::SessionState,
};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::warn;

const KEY_POLL: Duration = Duration::from_millis(100);

/// What a key press asks the recorder to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    TogglePause,
    End,
    Abandon,
}

pub fn map_key(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyAction::Abandon)
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => Some(KeyAction::TogglePause),
        KeyCode::Char('e') => Some(KeyAction::End),
        KeyCode::Char('q') | KeyCode::Esc => Some(KeyAction::Abandon),
        _ => None,
    }
}

/// Read keys on a blocking thread until `stop` is set or the receiver goes away
pub fn spawn_key_reader(tx: mpsc::Sender<KeyAction>, stop: Arc<AtomicBool>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        while !stop.load(Ordering::Relaxed) {
            match event::poll(KEY_POLL) {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!("key polling failed: {}", e);
                    break;
                }
            }
            let action = match event::read() {
                Ok(Event::Key(key)) => map_key(&key),
                Ok(_) => None,
                Err(e) => {
                    warn!("key read failed: {}", e);
                    break;
                }
            };
            if let Some(action) = action {
                if tx.blocking_send(action).is_err() {
                    break;
                }
            }
        }
    })
}

pub struct TerminalDisplay {
    source: String,
}

impl TerminalDisplay {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// Switch the terminal to raw mode with a hidden cursor
    pub fn enter(&self) -> Result<()> {
        terminal::enable_raw_mode()?;
        execute!(io::stdout(), Hide, DisableLineWrap)?;
        Ok(())
    }

    pub fn leave(&self) -> Result<()> {
        execute!(io::stdout(), Show, EnableLineWrap)?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub fn draw(&self, status: &RecorderStatus, route: Option<&RouteProgress>) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;
        self.render(&mut stdout, status, route)?;
        stdout.flush()?;
        Ok(())
    }

    /// Render the session status. Lines end in `\r\n` for raw mode.
    pub fn render(
        &self,
        out: &mut impl Write,
        status: &RecorderStatus,
        route: Option<&RouteProgress>,
    ) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(50)),
            Print("\r\n"),
            Print(format!("Exercise Tracker ({})", self.source)),
            Print("\r\n"),
            Print("=".repeat(50)),
            Print("\r\n"),
            ResetColor
        )?;

        let (state_color, state_label) = match status.state {
            SessionState::Idle => (Color::DarkGrey, "IDLE"),
            SessionState::Running => (Color::Green, "RUNNING"),
            SessionState::Paused => (Color::Yellow, "PAUSED"),
            SessionState::Ended => (Color::Cyan, "ENDED"),
        };
        execute!(
            out,
            Print("State:    "),
            SetForegroundColor(state_color),
            Print(state_label),
            ResetColor,
            Print("\r\n\r\n")
        )?;

        let snapshot = &status.snapshot;
        execute!(
            out,
            SetForegroundColor(Color::Cyan),
            Print("SESSION:\r\n"),
            ResetColor,
            Print(format!("  Distance: {:>10.2} km\r\n", snapshot.distance_km())),
            Print(format!(
                "  Duration: {:>10}\r\n",
                format_duration(snapshot.elapsed_seconds)
            )),
            Print(format!(
                "  Avg speed:{:>10}\r\n",
                snapshot
                    .average_speed_kmh()
                    .map_or("--".to_string(), |s| format!("{:.1} km/h", s))
            )),
            Print(format!(
                "  Pace:     {:>10}\r\n",
                format_pace(pace(snapshot.distance_km(), snapshot.elapsed_seconds))
            )),
            Print(format!(
                "  Points:   {:>10} ({} rejected)\r\n\r\n",
                snapshot.points.len(),
                status.rejected_samples
            ))
        )?;

        self.render_position(out, snapshot.last_point())?;

        if let Some(route) = route {
            execute!(
                out,
                SetForegroundColor(Color::Magenta),
                Print("ROUTE:\r\n"),
                ResetColor,
                Print(format!(
                    "  Passed {} of {} checkpoints\r\n\r\n",
                    route.passed(),
                    route.total()
                ))
            )?;
        }

        if status.source_finished {
            execute!(
                out,
                SetForegroundColor(Color::Red),
                Print("Location source stopped\r\n\r\n"),
                ResetColor
            )?;
        }

        execute!(
            out,
            SetForegroundColor(Color::Green),
            Print("=".repeat(50)),
            Print("\r\n"),
            Print("[p] pause/resume  [e] end and save  [q] discard"),
            Print("\r\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_position(&self, out: &mut impl Write, last: Option<&PositionSample>) -> Result<()> {
        execute!(
            out,
            SetForegroundColor(Color::Yellow),
            Print("POSITION:\r\n"),
            ResetColor
        )?;

        match last {
            Some(sample) => {
                execute!(
                    out,
                    Print(format!(
                        "  Latitude:  {}\r\n",
                        PositionSample::format_coordinate(sample.latitude)
                    )),
                    Print(format!(
                        "  Longitude: {}\r\n",
                        PositionSample::format_coordinate(sample.longitude)
                    ))
                )?;
                if let Some(acc) = sample.accuracy {
                    execute!(out, Print(format!("  Accuracy:  {:>12.1} m\r\n", acc)))?;
                }
                execute!(
                    out,
                    Print(format!(
                        "  Fix time:  {}\r\n\r\n",
                        sample.timestamp.format("%H:%M:%S UTC")
                    ))
                )?;
            }
            None => execute!(out, Print("  Waiting for first fix...\r\n\r\n"))?,
        }
        Ok(())
    }
}

fn pace(distance_km: f64, seconds: u64) -> Option<f64> {
    if distance_km > 0.0 {
        Some((seconds as f64 / 60.0) / distance_km)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{session::RoutePoint, track::TrackSnapshot};
    use chrono::Utc;

    fn render_to_string(status: &RecorderStatus, route: Option<&RouteProgress>) -> String {
        let mut buf = Vec::new();
        TerminalDisplay::new("replay")
            .render(&mut buf, status, route)
            .unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_map_key() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(map_key(&key(KeyCode::Char('p'))), Some(KeyAction::TogglePause));
        assert_eq!(map_key(&key(KeyCode::Char('e'))), Some(KeyAction::End));
        assert_eq!(map_key(&key(KeyCode::Esc)), Some(KeyAction::Abandon));
        assert_eq!(map_key(&key(KeyCode::Char('x'))), None);
        assert_eq!(
            map_key(&KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Abandon)
        );
    }

    #[test]
    fn test_render_idle() {
        let text = render_to_string(&RecorderStatus::default(), None);
        assert!(text.contains("IDLE"));
        assert!(text.contains("0.00 km"));
        assert!(text.contains("Waiting for first fix"));
        assert!(!text.contains("ROUTE"));
    }

    #[test]
    fn test_render_running_with_route() {
        let sample = PositionSample::new(31.2304, 121.4737, Utc::now()).with_accuracy(4.0);
        let status = RecorderStatus {
            state: SessionState::Running,
            started_at: Some(Utc::now()),
            snapshot: TrackSnapshot {
                cumulative_distance_m: 1_250.0,
                elapsed_seconds: 425,
                points: vec![sample],
            },
            rejected_samples: 2,
            source_finished: false,
        };
        let route = RouteProgress::new(
            vec![RoutePoint { latitude: 31.2304, longitude: 121.4737 }],
            10.0,
        );

        let text = render_to_string(&status, Some(&route));
        assert!(text.contains("RUNNING"));
        assert!(text.contains("1.25 km"));
        assert!(text.contains("7m 5s"));
        assert!(text.contains("(2 rejected)"));
        assert!(text.contains("Passed 0 of 1 checkpoints"));
    }
}
