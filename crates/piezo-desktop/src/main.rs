use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::LevelFilter;
use piezo_core::consts;
use piezo_core::input::Request;
use piezo_core::protocol::{ErrorCode, Message};
use piezo_core::BuzzerConfig;

mod buzzer;
mod log_capture;
mod mock_hw_tui;
mod sim;

use buzzer::Speaker;
use sim::Simulator;

#[derive(Parser, Debug)]
#[command(name = "piezo-desktop", about = "Desktop simulator for the piezo buzzer driver")]
struct Cli {
    /// Dit length in calculation ticks.
    #[arg(long, default_value_t = consts::DEFAULT_DIT_TICKS)]
    dit_ticks: u32,

    /// Calculation ticks per second.
    #[arg(long, default_value_t = consts::CALCULATION_TICK_HZ)]
    tick_hz: u32,

    /// High time of one pin pulse.
    #[arg(long, default_value_t = consts::DEFAULT_PULSE_WIDTH_NS)]
    pulse_width_ns: u32,

    /// How long a completion notification may wait for the bus.
    #[arg(long, default_value_t = consts::DEFAULT_NOTIFICATION_TIMEOUT_MS)]
    notification_timeout_ms: u32,

    /// Device uid used in frames.
    #[arg(long, default_value_t = 0x00c0_ffee)]
    uid: u32,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Interactive control panel (default).
    Tui,
    /// Beep for the given number of ticks.
    Beep { ticks: u32 },
    /// Play raw symbols, e.g. "... --- ...".
    Morse { symbols: String },
    /// Encode text to Morse and play it.
    Text { message: String },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.tick_hz == 0 {
        bail!("--tick-hz must be at least 1");
    }

    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let command = cli.command.unwrap_or(Command::Tui);
    log_capture::init(level, !matches!(command, Command::Tui));

    let config = BuzzerConfig::new()
        .with_dit_ticks(cli.dit_ticks)
        .with_pulse_width_ns(cli.pulse_width_ns)
        .with_notification_timeout_ms(cli.notification_timeout_ms);
    let sim = Simulator::new(cli.uid, config).context("failed to start driver")?;
    let speaker = Speaker::new(cli.tick_hz);

    match command {
        Command::Tui => mock_hw_tui::run_tui(sim, speaker, cli.tick_hz),
        Command::Beep { ticks } => {
            let request = Request::Beep { duration: ticks };
            play(sim, speaker, cli.tick_hz, request, Message::BeepFinished)
        }
        Command::Morse { symbols } => {
            let request = Request::morse_code(&symbols)?;
            play(sim, speaker, cli.tick_hz, request, Message::MorseCodeFinished)
        }
        Command::Text { message } => {
            let request = Request::morse_text(&message)?;
            if let Some(Ok(sequence)) = request.morse_sequence() {
                log::info!(
                    "\"{}\" encodes to \"{}\" ({} symbols)",
                    message,
                    sequence,
                    sequence.playable_len()
                );
            }
            play(sim, speaker, cli.tick_hz, request, Message::MorseCodeFinished)
        }
    }
}

/// Sends one request and ticks in real time until `finished` arrives.
fn play(
    mut sim: Simulator,
    mut speaker: Speaker,
    tick_hz: u32,
    request: Request,
    finished: Message,
) -> anyhow::Result<()> {
    match sim.send(&request)? {
        Some(Message::Response { error: ErrorCode::Ok, .. }) => {}
        Some(Message::Response { error, .. }) => bail!("driver rejected the request: {:?}", error),
        other => bail!("unexpected response: {:?}", other),
    }

    let budget = match request {
        Request::Beep { duration } => u64::from(duration),
        Request::MorseCode { .. } => match request.morse_sequence() {
            Some(Ok(sequence)) => u64::from(sequence.duration_ticks(sim.config())),
            _ => 0,
        },
    } + 2;
    if budget == 2 && matches!(request, Request::Beep { .. }) {
        log::info!("zero-length beep, nothing to play");
        return Ok(());
    }

    let started = Instant::now();
    let mut pulsed = false;
    let mut done = None;
    // A full buffer reports completion while its last symbol still plays.
    let mut idle = false;
    while !idle && sim.ticks() < budget {
        let due = (started.elapsed().as_secs_f64() * f64::from(tick_hz)) as u64;
        while sim.ticks() < due.min(budget) {
            pulsed |= sim.tick();
            if done.is_none() && sim.received().last().is_some_and(|r| r.message == finished) {
                done = Some(sim.ticks());
            }
            idle = done.is_some() && sim.state().is_idle();
            if idle {
                break;
            }
        }
        speaker.set_active(std::mem::take(&mut pulsed));
        thread::sleep(Duration::from_millis(5));
    }
    speaker.set_active(false);

    match done {
        Some(ticks) => {
            log::info!("{:?} after {} ticks, {} pulses", finished, ticks, sim.pulses());
            Ok(())
        }
        None => bail!("no {:?} within {} ticks", finished, budget),
    }
}
