use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

/// The piezo output line.
///
/// A pulse drives the pin high, busy-waits for the configured width and
/// drives it low again. Repeating one pulse per calculation tick yields a
/// tone at the tick frequency.
pub struct Output<P, D> {
    pin: P,
    delay: D,
    pulse_width_ns: u32,
}

impl<P, D> Output<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    pub fn new(mut pin: P, delay: D, pulse_width_ns: u32) -> Self {
        if pin.set_low().is_err() {
            log::warn!("piezo pin could not be driven low at start");
        }
        Self {
            pin,
            delay,
            pulse_width_ns,
        }
    }

    pub fn pulse(&mut self) {
        // Pin errors are not recoverable mid-tone; the next tick tries again.
        let _ = self.pin.set_high();
        self.delay.delay_ns(self.pulse_width_ns);
        let _ = self.pin.set_low();
    }

    /// Leaves the pin low and hands it back to the host.
    pub fn release(mut self) -> (P, D) {
        let _ = self.pin.set_low();
        (self.pin, self.delay)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use core::convert::Infallible;

    use embedded_hal::delay::DelayNs;
    use embedded_hal::digital::{ErrorType, OutputPin};

    /// Records every level change so tests can count pulses.
    #[derive(Debug, Default)]
    pub struct RecordingPin {
        pub high: bool,
        pub levels: std::vec::Vec<bool>,
    }

    impl RecordingPin {
        /// Number of completed low-high-low pulses.
        pub fn pulses(&self) -> usize {
            self.levels.windows(2).filter(|w| w[0] && !w[1]).count()
        }
    }

    impl ErrorType for RecordingPin {
        type Error = Infallible;
    }

    impl OutputPin for RecordingPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            self.high = false;
            self.levels.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            self.high = true;
            self.levels.push(true);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingDelay {
        pub total_ns: u64,
    }

    impl DelayNs for RecordingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{RecordingDelay, RecordingPin};
    use super::*;

    #[test]
    fn test_pulse_shape() {
        let mut output = Output::new(RecordingPin::default(), RecordingDelay::default(), 1_000);
        output.pulse();
        output.pulse();

        let (pin, delay) = output.release();
        assert_eq!(pin.levels, [false, true, false, true, false, false]);
        assert_eq!(pin.pulses(), 2);
        assert!(!pin.high);
        assert_eq!(delay.total_ns, 2_000);
    }
}
