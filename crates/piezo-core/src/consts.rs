//! Protocol and timing constants shared by the driver and its hosts.

/// Number of symbol slots in a Morse request.
pub const MORSE_LENGTH: usize = 60;

/// Default dit length in calculation ticks (1 kHz calculation tick = 100 ms).
pub const DEFAULT_DIT_TICKS: u32 = 100;

/// A dah lasts this many dits.
pub const DAH_UNITS: u32 = 3;

/// Pause after a tone, and the length of a Space symbol, in dits.
pub const SPACE_UNITS: u32 = 1;

/// High time of a single pin pulse.
pub const DEFAULT_PULSE_WIDTH_NS: u32 = 1_000;

/// Upper bound for the blocking send of an unsolicited notification.
pub const DEFAULT_NOTIFICATION_TIMEOUT_MS: u32 = 10;

/// Rate at which hosts are expected to issue calculation ticks.
pub const CALCULATION_TICK_HZ: u32 = 1_000;

pub const HEADER_LEN: usize = 8;
pub const MAX_FRAME_LEN: usize = 80;

pub const FID_BEEP: u8 = 1;
pub const FID_MORSE_CODE: u8 = 2;
pub const FID_BEEP_FINISHED: u8 = 3;
pub const FID_MORSE_CODE_FINISHED: u8 = 4;
