//! Log capture module - keeps recent log lines for the TUI log pane.
//!
//! In headless mode lines are echoed to stdout as well.

use std::collections::VecDeque;
use std::sync::Mutex;

use log::{Level, LevelFilter, Log, Metadata, Record};

/// Maximum number of log lines kept.
pub const LOG_CAPACITY: usize = 200;

#[derive(Clone, Debug)]
pub struct LogLine {
    pub level: Level,
    pub target: String,
    pub message: String,
}

static LOG_LINES: Mutex<VecDeque<LogLine>> = Mutex::new(VecDeque::new());

pub struct CaptureLogger {
    echo: bool,
}

impl Log for CaptureLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let line = LogLine {
            level: record.level(),
            target: record.target().to_string(),
            message: format!("{}", record.args()),
        };

        if self.echo {
            println!("[{:<5}] {}: {}", line.level, line.target, line.message);
        }

        if let Ok(mut lines) = LOG_LINES.lock() {
            if lines.len() == LOG_CAPACITY {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn flush(&self) {}
}

static QUIET_LOGGER: CaptureLogger = CaptureLogger { echo: false };
static ECHO_LOGGER: CaptureLogger = CaptureLogger { echo: true };

/// Installs the capture logger. Calling it twice keeps the first logger.
pub fn init(max_level: LevelFilter, echo: bool) {
    let logger = if echo { &ECHO_LOGGER } else { &QUIET_LOGGER };
    if log::set_logger(logger).is_ok() {
        log::set_max_level(max_level);
    }
}

/// Up to `count` most recent lines, oldest first.
pub fn recent(count: usize) -> Vec<LogLine> {
    LOG_LINES
        .lock()
        .map(|lines| {
            let skip = lines.len().saturating_sub(count);
            lines.iter().skip(skip).cloned().collect()
        })
        .unwrap_or_default()
}
