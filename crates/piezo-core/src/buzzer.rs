use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::BuzzerConfig;
use crate::engine::{Engine, PlaybackState, TickType};
use crate::error::{Error, Result};
use crate::input::{request_len, Request};
use crate::morse::MorseSequence;
use crate::output::Output;
use crate::protocol::{ErrorCode, MessageHeader};

/// Outbound half of the host's message layer.
pub trait Transport {
    type Error;

    /// Sends a reply to the request currently being handled.
    fn reply(&mut self, frame: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Sends an unsolicited frame, giving up after `timeout_ms`.
    fn send_with_timeout(
        &mut self,
        frame: &[u8],
        timeout_ms: u32,
    ) -> core::result::Result<(), Self::Error>;
}

/// Piezo buzzer driver.
///
/// Requests arrive through [`invocation`](Self::invocation); the host calls
/// [`tick`](Self::tick) periodically to advance playback and flush
/// notifications. Both take `&mut self`, so the host serializes them.
pub struct PiezoBuzzer<P, D> {
    uid: u32,
    engine: Engine,
    output: Output<P, D>,
    pulses: u64,
}

impl<P, D> PiezoBuzzer<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Takes a pin already configured as output and drives it low.
    pub fn new(uid: u32, pin: P, delay: D, config: BuzzerConfig) -> Result<Self> {
        config.validate()?;
        log::info!("piezo buzzer {:#x} ready, dit = {} ticks", uid, config.dit_ticks);
        Ok(Self {
            uid,
            engine: Engine::new(config),
            output: Output::new(pin, delay, config.pulse_width_ns),
            pulses: 0,
        })
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    pub fn state(&self) -> &PlaybackState {
        self.engine.state()
    }

    pub fn config(&self) -> &BuzzerConfig {
        self.engine.config()
    }

    /// Pulses emitted since start.
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    /// Handles one request frame and answers it through `transport`.
    ///
    /// Setter acknowledgements are only sent when the request asked for a
    /// response; error reports are always sent. Frames too short to carry a
    /// header are dropped.
    pub fn invocation<T: Transport>(
        &mut self,
        frame: &[u8],
        transport: &mut T,
    ) -> core::result::Result<(), T::Error> {
        let header = match MessageHeader::read(frame) {
            Ok(header) => header,
            Err(err) => {
                log::warn!("dropping frame: {}", err);
                return Ok(());
            }
        };

        match self.handle(&header, frame) {
            Ok(()) if header.response_expected() => {
                transport.reply(&header.reply(ErrorCode::Ok).to_bytes())
            }
            Ok(()) => Ok(()),
            Err(err) => {
                log::warn!("request {} rejected: {}", header.function_id, err);
                transport.reply(&header.reply(err.code()).to_bytes())
            }
        }
    }

    fn handle(&mut self, header: &MessageHeader, frame: &[u8]) -> Result<()> {
        // Unknown operations are NotSupported whatever their length.
        if request_len(header.function_id).is_none() {
            return Err(Error::NotSupported(header.function_id));
        }
        header.check_length(frame.len())?;
        match Request::decode(header, frame)? {
            Request::Beep { duration } => self.beep(duration),
            Request::MorseCode { morse } => self.morse_code(&morse)?,
        }
        Ok(())
    }

    /// Beeps for `duration` calculation ticks, cancelling Morse playback.
    pub fn beep(&mut self, duration: u32) {
        log::debug!("beep for {} ticks", duration);
        self.engine.beep(duration);
    }

    /// Validates `morse` and starts playing it, cancelling a running beep.
    /// Nothing changes if validation fails.
    pub fn morse_code(&mut self, morse: &[u8]) -> Result<()> {
        let sequence = MorseSequence::parse(morse)?;
        log::debug!("morse \"{}\"", sequence);
        self.engine.play_morse(sequence);
        Ok(())
    }

    /// Scheduler entry point.
    pub fn tick<T: Transport>(&mut self, tick_type: TickType, transport: &mut T) {
        if tick_type.contains(TickType::MESSAGE) {
            for function_id in self.engine.take_finished() {
                log::debug!("{:?}", function_id);
                let frame = MessageHeader::notification(self.uid, function_id).to_bytes();
                // Best effort: a notification that cannot be sent is dropped.
                let timeout_ms = self.engine.config().notification_timeout_ms;
                let _ = transport.send_with_timeout(&frame, timeout_ms);
            }
        }

        if tick_type.contains(TickType::CALCULATION) && self.engine.calculate() {
            self.output.pulse();
            self.pulses += 1;
        }
    }

    /// Stops the driver and returns the pin, left low, for reconfiguration.
    pub fn release(self) -> (P, D) {
        log::info!("piezo buzzer {:#x} released", self.uid);
        self.output.release()
    }
}
