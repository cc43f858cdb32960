//! Driver configuration.
//!
//! Durations are expressed in calculation ticks, so the audible length of a
//! dit depends on how fast the host issues ticks (see
//! [`consts::CALCULATION_TICK_HZ`](crate::consts::CALCULATION_TICK_HZ)).

use crate::consts;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BuzzerConfig {
    /// Length of a dit in calculation ticks.
    pub dit_ticks: u32,
    /// High time of one pin pulse.
    pub pulse_width_ns: u32,
    /// Timeout handed to [`Transport::send_with_timeout`](crate::Transport::send_with_timeout).
    pub notification_timeout_ms: u32,
}

impl BuzzerConfig {
    pub const fn new() -> Self {
        Self {
            dit_ticks: consts::DEFAULT_DIT_TICKS,
            pulse_width_ns: consts::DEFAULT_PULSE_WIDTH_NS,
            notification_timeout_ms: consts::DEFAULT_NOTIFICATION_TIMEOUT_MS,
        }
    }

    pub const fn with_dit_ticks(mut self, dit_ticks: u32) -> Self {
        self.dit_ticks = dit_ticks;
        self
    }

    pub const fn with_pulse_width_ns(mut self, pulse_width_ns: u32) -> Self {
        self.pulse_width_ns = pulse_width_ns;
        self
    }

    pub const fn with_notification_timeout_ms(mut self, timeout_ms: u32) -> Self {
        self.notification_timeout_ms = timeout_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.dit_ticks == 0 {
            return Err(Error::ZeroDitLength);
        }
        Ok(())
    }

    pub fn dah_ticks(&self) -> u32 {
        self.dit_ticks.saturating_mul(consts::DAH_UNITS)
    }

    pub fn space_ticks(&self) -> u32 {
        self.dit_ticks.saturating_mul(consts::SPACE_UNITS)
    }
}

impl Default for BuzzerConfig {
    fn default() -> Self {
        Self::new()
    }
}
