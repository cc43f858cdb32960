//! In-process stand-in for the host framework: a loopback message bus, a
//! simulated output pin and a client that speaks the request protocol.

use std::collections::VecDeque;
use std::convert::Infallible;
use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};
use piezo_core::input::Request;
use piezo_core::protocol::{Frame, Message};
use piezo_core::{BuzzerConfig, PiezoBuzzer, PlaybackState, TickType, Transport};

/// Output pin that only remembers its level.
#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high = true;
        Ok(())
    }
}

/// Busy-wait delay, like the firmware's pulse wait.
#[derive(Debug, Default)]
pub struct SpinDelay;

impl DelayNs for SpinDelay {
    fn delay_ns(&mut self, ns: u32) {
        let start = Instant::now();
        let wait = Duration::from_nanos(u64::from(ns));
        while start.elapsed() < wait {
            std::hint::spin_loop();
        }
    }
}

/// Loopback bus carrying frames from the driver to the client.
#[derive(Debug, Default)]
pub struct SimBus {
    inbox: VecDeque<Vec<u8>>,
    congested: bool,
    dropped: usize,
}

impl SimBus {
    /// While congested, every notification send times out.
    pub fn set_congested(&mut self, congested: bool) {
        self.congested = congested;
    }

    pub fn is_congested(&self) -> bool {
        self.congested
    }

    /// Notifications lost to congestion.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn pop(&mut self) -> Option<Vec<u8>> {
        self.inbox.pop_front()
    }
}

impl Transport for SimBus {
    type Error = anyhow::Error;

    fn reply(&mut self, frame: &[u8]) -> anyhow::Result<()> {
        self.inbox.push_back(frame.to_vec());
        Ok(())
    }

    fn send_with_timeout(&mut self, frame: &[u8], timeout_ms: u32) -> anyhow::Result<()> {
        if self.congested {
            self.dropped += 1;
            anyhow::bail!("bus busy, send timed out after {} ms", timeout_ms);
        }
        self.inbox.push_back(frame.to_vec());
        Ok(())
    }
}

/// Client side of the protocol: numbers requests and always asks for a response.
#[derive(Debug)]
pub struct Client {
    uid: u32,
    sequence_number: u8,
}

impl Client {
    pub fn new(uid: u32) -> Self {
        Self {
            uid,
            sequence_number: 0,
        }
    }

    pub fn frame(&mut self, request: &Request) -> Frame {
        // Sequence numbers 1..=15; 0 is reserved for notifications.
        self.sequence_number = self.sequence_number % 15 + 1;
        request.encode(self.uid, self.sequence_number, true)
    }
}

/// Most recent messages kept for display.
pub const RECEIVED_CAPACITY: usize = 200;

/// One frame that reached the client, stamped with the tick it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    pub tick: u64,
    pub message: Message,
}

pub struct Simulator {
    buzzer: PiezoBuzzer<SimPin, SpinDelay>,
    bus: SimBus,
    client: Client,
    ticks: u64,
    received: Vec<Received>,
}

impl Simulator {
    pub fn new(uid: u32, config: BuzzerConfig) -> anyhow::Result<Self> {
        let buzzer = PiezoBuzzer::new(uid, SimPin::default(), SpinDelay, config)?;
        Ok(Self {
            buzzer,
            bus: SimBus::default(),
            client: Client::new(uid),
            ticks: 0,
            received: Vec::new(),
        })
    }

    pub fn uid(&self) -> u32 {
        self.buzzer.uid()
    }

    pub fn state(&self) -> &PlaybackState {
        self.buzzer.state()
    }

    pub fn config(&self) -> &BuzzerConfig {
        self.buzzer.config()
    }

    pub fn pulses(&self) -> u64 {
        self.buzzer.pulses()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn bus(&self) -> &SimBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SimBus {
        &mut self.bus
    }

    /// Up to [`RECEIVED_CAPACITY`] most recent messages, oldest first.
    pub fn received(&self) -> &[Received] {
        &self.received
    }

    /// Sends a request and returns the driver's synchronous response.
    pub fn send(&mut self, request: &Request) -> anyhow::Result<Option<Message>> {
        let frame = self.client.frame(request);
        self.send_raw(&frame)
    }

    /// Sends an arbitrary frame, e.g. one with an unsupported function id.
    pub fn send_raw(&mut self, frame: &[u8]) -> anyhow::Result<Option<Message>> {
        self.buzzer.invocation(frame, &mut self.bus)?;
        Ok(self.collect().last().copied())
    }

    /// Runs one scheduler tick. Returns `true` if the pin pulsed.
    pub fn tick(&mut self) -> bool {
        self.step().0
    }

    /// Ticks until `message` arrives, giving up after `max_ticks`.
    /// Returns the number of ticks it took.
    pub fn run_until(&mut self, message: Message, max_ticks: u64) -> Option<u64> {
        let start = self.ticks;
        while self.ticks - start < max_ticks {
            if self.step().1.contains(&message) {
                return Some(self.ticks - start);
            }
        }
        None
    }

    fn step(&mut self) -> (bool, Vec<Message>) {
        let before = self.buzzer.pulses();
        self.buzzer
            .tick(TickType::MESSAGE | TickType::CALCULATION, &mut self.bus);
        self.ticks += 1;
        let messages = self.collect();
        (self.buzzer.pulses() > before, messages)
    }

    /// Decodes everything on the bus and returns the new messages.
    fn collect(&mut self) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(frame) = self.bus.pop() {
            match Message::decode(&frame) {
                Ok((_, message)) => {
                    log::info!("client <- {:?}", message);
                    messages.push(message);
                }
                Err(err) => log::error!("client could not decode frame: {}", err),
            }
        }

        let tick = self.ticks;
        self.received
            .extend(messages.iter().map(|&message| Received { tick, message }));
        let excess = self.received.len().saturating_sub(RECEIVED_CAPACITY);
        self.received.drain(..excess);
        messages
    }
}

#[cfg(test)]
mod tests {
    use piezo_core::consts;
    use piezo_core::protocol::{ErrorCode, MessageHeader};

    use super::*;

    fn simulator() -> Simulator {
        Simulator::new(42, BuzzerConfig::new().with_dit_ticks(2)).unwrap()
    }

    fn ack(function_id: u8, sequence_number: u8) -> Option<Message> {
        Some(Message::Response {
            function_id,
            sequence_number,
            error: ErrorCode::Ok,
        })
    }

    #[test]
    fn test_beep_round_trip() {
        let mut sim = simulator();
        let response = sim.send(&Request::Beep { duration: 50 }).unwrap();
        assert_eq!(response, ack(consts::FID_BEEP, 1));

        // 50 pulsing ticks, then the notification on the following tick.
        assert_eq!(sim.run_until(Message::BeepFinished, 1_000), Some(51));
        assert_eq!(sim.pulses(), 50);
    }

    #[test]
    fn test_text_request_plays_expected_duration() {
        let mut sim = simulator();
        let request = Request::morse_text("SOS").unwrap();
        let Some(Ok(sequence)) = request.morse_sequence() else {
            panic!("SOS must encode to a valid sequence");
        };
        let expected = u64::from(sequence.duration_ticks(sim.config()));

        assert_eq!(sim.send(&request).unwrap(), ack(consts::FID_MORSE_CODE, 1));
        // Load tick + playback + notification tick.
        assert_eq!(sim.run_until(Message::MorseCodeFinished, 10_000), Some(expected + 2));
        assert_eq!(sim.pulses(), 2 * 15);
    }

    #[test]
    fn test_invalid_and_unsupported_requests() {
        let mut sim = simulator();
        let response = sim.send(&Request::morse_code("..a").unwrap()).unwrap();
        assert_eq!(
            response,
            Some(Message::Response {
                function_id: consts::FID_MORSE_CODE,
                sequence_number: 1,
                error: ErrorCode::InvalidParameter,
            })
        );

        let frame = MessageHeader::new(42, 17, 2, true).to_bytes();
        let response = sim.send_raw(&frame).unwrap();
        assert_eq!(
            response,
            Some(Message::Response {
                function_id: 17,
                sequence_number: 2,
                error: ErrorCode::NotSupported,
            })
        );
        assert!(sim.state().is_idle());
    }

    #[test]
    fn test_congested_bus_drops_notification() {
        let mut sim = simulator();
        sim.bus_mut().set_congested(true);
        sim.send(&Request::Beep { duration: 3 }).unwrap();
        assert_eq!(sim.run_until(Message::BeepFinished, 20), None);
        assert_eq!(sim.bus().dropped(), 1);
    }

    #[test]
    fn test_received_history_is_capped() {
        let mut sim = simulator();
        for _ in 0..RECEIVED_CAPACITY + 50 {
            sim.send(&Request::Beep { duration: 0 }).unwrap();
        }
        assert_eq!(sim.received().len(), RECEIVED_CAPACITY);

        // Oldest entries go first; the newest ack is still the last one.
        let newest = sim.send(&Request::Beep { duration: 0 }).unwrap();
        assert_eq!(sim.received().last().map(|r| r.message), newest);
        assert_eq!(sim.received().len(), RECEIVED_CAPACITY);
    }

    #[test]
    fn test_sequence_numbers_wrap_and_skip_zero() {
        let mut client = Client::new(1);
        let numbers: Vec<u8> = (0..16)
            .map(|_| {
                let frame = client.frame(&Request::Beep { duration: 0 });
                MessageHeader::parse(&frame).unwrap().sequence_number()
            })
            .collect();
        assert_eq!(numbers[0], 1);
        assert_eq!(numbers[14], 15);
        assert_eq!(numbers[15], 1);
    }
}
