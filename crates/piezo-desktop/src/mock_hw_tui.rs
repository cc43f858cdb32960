use std::io;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::Level;
use piezo_core::consts::MORSE_LENGTH;
use piezo_core::input::Request;
use piezo_core::morse::Symbol;
use piezo_core::protocol::{Message, MessageHeader};
use piezo_core::PlaybackState;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};

use crate::buzzer::Speaker;
use crate::log_capture;
use crate::sim::{Received, Simulator};

/// Function id no driver implements, for exercising the error path.
const UNSUPPORTED_FUNCTION_ID: u8 = 0x7f;

const HELP_TEXT: &str =
    "b: beep 1s | s: SOS | e: invalid morse | x: unsupported call | c: toggle bus congestion | q/Esc: quit";

/// Longest catch-up burst after the UI stalled.
const MAX_TICKS_PER_FRAME: u64 = 500;

// Extension trait for log::Level to provide UI rendering methods
trait LevelExt {
    fn color(&self) -> Color;
    fn prefix(&self) -> &str;
}

impl LevelExt for Level {
    fn color(&self) -> Color {
        match *self {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Cyan,
            Level::Debug => Color::Gray,
            Level::Trace => Color::DarkGray,
        }
    }

    fn prefix(&self) -> &str {
        match *self {
            Level::Error => "[ERROR]",
            Level::Warn => "[WARN] ",
            Level::Info => "[INFO] ",
            Level::Debug => "[DEBUG]",
            Level::Trace => "[TRACE]",
        }
    }
}

struct TuiState {
    sim: Simulator,
    speaker: Speaker,
    tick_hz: u32,
    started: Instant,
    should_quit: bool,
}

impl TuiState {
    /// Catches the simulation up with wall-clock time.
    fn advance(&mut self) {
        let due = (self.started.elapsed().as_secs_f64() * f64::from(self.tick_hz)) as u64;
        let behind = due.saturating_sub(self.sim.ticks());
        if behind > MAX_TICKS_PER_FRAME {
            let skipped = behind - MAX_TICKS_PER_FRAME;
            log::warn!("simulation {} ticks behind, skipping ahead", skipped);
            self.started += Duration::from_secs_f64(skipped as f64 / f64::from(self.tick_hz));
        }

        let mut pulsed = false;
        for _ in 0..behind.min(MAX_TICKS_PER_FRAME) {
            pulsed |= self.sim.tick();
        }
        self.speaker.set_active(pulsed);
    }

    fn send(&mut self, request: Request) {
        if let Err(e) = self.sim.send(&request) {
            log::error!("request failed: {}", e);
        }
    }

    fn handle_key(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true
            }
            KeyCode::Char('b') => self.send(Request::Beep {
                duration: self.tick_hz,
            }),
            KeyCode::Char('s') => match Request::morse_text("SOS") {
                Ok(request) => self.send(request),
                Err(e) => log::error!("{}", e),
            },
            KeyCode::Char('e') => match Request::morse_code(".-x") {
                Ok(request) => self.send(request),
                Err(e) => log::error!("{}", e),
            },
            KeyCode::Char('x') => {
                let header = MessageHeader::new(self.sim.uid(), UNSUPPORTED_FUNCTION_ID, 1, true);
                if let Err(e) = self.sim.send_raw(&header.to_bytes()) {
                    log::error!("request failed: {}", e);
                }
            }
            KeyCode::Char('c') => {
                let congested = !self.sim.bus().is_congested();
                self.sim.bus_mut().set_congested(congested);
                log::info!("bus congestion {}", if congested { "on" } else { "off" });
            }
            _ => {}
        }
    }
}

pub fn run_tui(sim: Simulator, speaker: Speaker, tick_hz: u32) -> anyhow::Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut state = TuiState {
        sim,
        speaker,
        tick_hz,
        started: Instant::now(),
        should_quit: false,
    };
    log::info!("simulator running at {} ticks/s", tick_hz);

    let result = run_loop(&mut terminal, &mut state);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    state: &mut TuiState,
) -> anyhow::Result<()> {
    while !state.should_quit {
        state.advance();
        terminal.draw(|f| ui(f, state))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                state.handle_key(key.code, key.modifiers);
            }
        }
    }
    state.speaker.set_active(false);
    Ok(())
}

fn ui(f: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // Title
            Constraint::Length(9),  // Playback state
            Constraint::Min(6),     // Messages + logs
            Constraint::Length(3),  // Help
        ])
        .split(f.area());

    let title = Paragraph::new("Piezo Buzzer Simulator")
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    render_state(f, chunks[1], state);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(chunks[2]);
    render_messages(f, bottom[0], state.sim.received());
    render_logs(f, bottom[1]);

    let help = Paragraph::new(HELP_TEXT)
        .style(Style::default().fg(Color::Gray))
        .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, chunks[3]);
}

fn mode(state: &PlaybackState) -> (&'static str, Color) {
    if state.beep_remaining() > 0 {
        ("BEEP", Color::Yellow)
    } else if state.morse_active() && state.morse_tone_active() {
        ("MORSE tone", Color::Green)
    } else if state.morse_active() {
        ("MORSE pause", Color::DarkGray)
    } else {
        ("IDLE", Color::Gray)
    }
}

fn render_state(f: &mut Frame, area: Rect, state: &TuiState) {
    let sim = &state.sim;
    let playback = sim.state();
    let (mode_label, mode_color) = mode(playback);

    let speaker = if state.speaker.is_active() { "♪" } else { " " };
    let lines = vec![
        Line::from(vec![
            Span::raw("Mode:        "),
            Span::styled(mode_label, Style::default().fg(mode_color).add_modifier(Modifier::BOLD)),
            Span::raw(format!(" {}", speaker)),
        ]),
        Line::from(format!("Beep left:   {} ticks", playback.beep_remaining())),
        Line::from(format!(
            "Morse:       cursor {}/{}  remaining {}  tone {}",
            playback.morse_cursor(),
            MORSE_LENGTH,
            playback.morse_remaining(),
            playback.morse_tone_active()
        )),
        sequence_line(playback),
        Line::from(format!(
            "Ticks:       {}  pulses {}  dit {} ticks",
            sim.ticks(),
            sim.pulses(),
            sim.config().dit_ticks
        )),
        Line::from(format!(
            "Bus:         {}  dropped notifications {}",
            if sim.bus().is_congested() { "congested" } else { "ok" },
            sim.bus().dropped()
        )),
    ];

    let block = Block::default().borders(Borders::ALL).title("Playback");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn sequence_line(playback: &PlaybackState) -> Line<'static> {
    let playing = if playback.morse_active() {
        playback.morse_cursor().checked_sub(1)
    } else {
        None
    };

    let mut spans = vec![Span::raw("Sequence:    ")];
    for (index, symbol) in playback.morse_sequence().symbols().iter().enumerate() {
        if *symbol == Symbol::Empty {
            continue;
        }
        let c = match symbol {
            Symbol::Space => "␣".to_string(),
            other => (other.as_byte() as char).to_string(),
        };
        let style = if Some(index) == playing {
            Style::default().fg(Color::Black).bg(Color::Green)
        } else if symbol.is_tone() {
            Style::default().fg(Color::White)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(c, style));
    }
    Line::from(spans)
}

fn render_messages(f: &mut Frame, area: Rect, received: &[Received]) {
    let block = Block::default().borders(Borders::ALL).title("Client inbox");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let skip = received.len().saturating_sub(inner.height as usize);
    let items: Vec<ListItem> = received[skip..]
        .iter()
        .map(|r| {
            let (text, color) = match r.message {
                Message::BeepFinished => ("BeepFinished".to_string(), Color::Green),
                Message::MorseCodeFinished => ("MorseCodeFinished".to_string(), Color::Green),
                Message::Response {
                    function_id,
                    sequence_number,
                    error,
                } => (
                    format!("fid {} seq {} -> {:?}", function_id, sequence_number, error),
                    Color::White,
                ),
            };
            ListItem::new(Line::from(vec![
                Span::styled(format!("{:>8} ", r.tick), Style::default().fg(Color::DarkGray)),
                Span::styled(text, Style::default().fg(color)),
            ]))
        })
        .collect();

    f.render_widget(List::new(items), inner);
}

fn render_logs(f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title("Logs (scrolls automatically)");

    let inner = block.inner(area);
    f.render_widget(block, area);

    let log_items: Vec<ListItem> = log_capture::recent(inner.height as usize)
        .into_iter()
        .map(|log| {
            let content = Line::from(vec![
                Span::styled(
                    log.level.prefix().to_string(),
                    Style::default().fg(log.level.color()),
                ),
                Span::raw(" "),
                Span::raw(log.message),
            ]);
            ListItem::new(content)
        })
        .collect();

    f.render_widget(List::new(log_items), inner);
}
