//! Playback engine.
//!
//! The engine owns the playback state and advances it one calculation tick
//! at a time. It never touches hardware: [`Engine::calculate`] only reports
//! whether the pin should pulse on this tick, and finished playbacks are
//! collected with [`Engine::take_finished`].

use bitflags::bitflags;

use crate::config::BuzzerConfig;
use crate::consts::MORSE_LENGTH;
use crate::morse::{MorseSequence, Symbol};
use crate::protocol::FunctionId;

bitflags! {
    /// Which parts of the driver a scheduler tick is due for.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TickType: u8 {
        /// Flush pending notifications.
        const MESSAGE = 0x01;
        /// Advance playback by one tick.
        const CALCULATION = 0x02;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PlaybackState {
    beep_remaining: u32,
    morse_sequence: MorseSequence,
    morse_cursor: usize,
    morse_remaining: u32,
    morse_tone_active: bool,
    beep_finished: bool,
    morse_finished: bool,
}

impl PlaybackState {
    pub const fn new() -> Self {
        Self {
            beep_remaining: 0,
            morse_sequence: MorseSequence::empty(),
            morse_cursor: MORSE_LENGTH,
            morse_remaining: 0,
            morse_tone_active: false,
            beep_finished: false,
            morse_finished: false,
        }
    }

    pub fn beep_remaining(&self) -> u32 {
        self.beep_remaining
    }

    pub fn morse_sequence(&self) -> &MorseSequence {
        &self.morse_sequence
    }

    pub fn morse_cursor(&self) -> usize {
        self.morse_cursor
    }

    pub fn morse_remaining(&self) -> u32 {
        self.morse_remaining
    }

    pub fn morse_tone_active(&self) -> bool {
        self.morse_tone_active
    }

    /// A Morse symbol or pause is still playing, or symbols are left.
    pub fn morse_active(&self) -> bool {
        !self.morse_parked() || self.morse_remaining > 0
    }

    pub fn beep_finished(&self) -> bool {
        self.beep_finished
    }

    pub fn morse_finished(&self) -> bool {
        self.morse_finished
    }

    /// The cursor sits at the end of the buffer.
    pub fn morse_parked(&self) -> bool {
        self.morse_cursor == MORSE_LENGTH
    }

    pub fn is_idle(&self) -> bool {
        self.beep_remaining == 0 && !self.morse_active()
    }

    fn cancel_morse(&mut self) {
        self.morse_cursor = MORSE_LENGTH;
        self.morse_remaining = 0;
        self.morse_tone_active = false;
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Engine {
    state: PlaybackState,
    config: BuzzerConfig,
}

impl Engine {
    pub fn new(config: BuzzerConfig) -> Self {
        Self {
            state: PlaybackState::new(),
            config,
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn config(&self) -> &BuzzerConfig {
        &self.config
    }

    /// Starts a beep of `duration` ticks, cancelling any Morse playback.
    pub fn beep(&mut self, duration: u32) {
        self.state.cancel_morse();
        self.state.beep_remaining = duration;
    }

    /// Starts playing `sequence` from the beginning, cancelling any beep.
    pub fn play_morse(&mut self, sequence: MorseSequence) {
        self.state.beep_remaining = 0;
        self.state.morse_sequence = sequence;
        self.state.morse_cursor = 0;
        self.state.morse_remaining = 0;
        self.state.morse_tone_active = false;
    }

    /// Advances playback by one calculation tick. Returns `true` if the pin
    /// must pulse on this tick.
    pub fn calculate(&mut self) -> bool {
        let state = &mut self.state;
        let mut pulse = false;

        if state.beep_remaining > 0 {
            state.beep_remaining -= 1;
            pulse = true;
            if state.beep_remaining == 0 {
                state.beep_finished = true;
            }
        } else if state.morse_remaining > 0 {
            state.morse_remaining -= 1;
            if state.morse_tone_active {
                pulse = true;
                // Gap after every dit and dah.
                if state.morse_remaining == 0 {
                    state.morse_tone_active = false;
                    state.morse_remaining = self.config.space_ticks();
                }
            }
        }

        while state.morse_cursor < MORSE_LENGTH && state.morse_remaining == 0 {
            let symbol = state.morse_sequence.get(state.morse_cursor).unwrap_or(Symbol::Empty);
            match symbol {
                Symbol::Dot => {
                    state.morse_tone_active = true;
                    state.morse_remaining = self.config.dit_ticks;
                }
                Symbol::Dash => {
                    state.morse_tone_active = true;
                    state.morse_remaining = self.config.dah_ticks();
                }
                Symbol::Space => {
                    state.morse_tone_active = false;
                    state.morse_remaining = self.config.space_ticks();
                }
                Symbol::Empty => {}
            }
            state.morse_cursor += 1;
            // The last symbol may still be sounding.
            if state.morse_parked() {
                state.morse_finished = true;
            }
        }

        pulse
    }

    /// Clears the latched completion flags, beep first.
    pub fn take_finished(&mut self) -> heapless::Vec<FunctionId, 2> {
        let mut finished = heapless::Vec::new();
        if core::mem::take(&mut self.state.beep_finished) {
            let _ = finished.push(FunctionId::BeepFinished);
        }
        if core::mem::take(&mut self.state.morse_finished) {
            let _ = finished.push(FunctionId::MorseCodeFinished);
        }
        finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(dit_ticks: u32) -> Engine {
        Engine::new(BuzzerConfig::new().with_dit_ticks(dit_ticks))
    }

    /// Runs calculation ticks until the engine goes idle, recording one
    /// character per tick: `#` pulse, `_` silence.
    fn trace(engine: &mut Engine, max_ticks: usize) -> std::string::String {
        let mut out = std::string::String::new();
        for _ in 0..max_ticks {
            out.push(if engine.calculate() { '#' } else { '_' });
            if engine.state().is_idle() {
                break;
            }
        }
        out
    }

    #[test]
    fn test_initial_state_is_parked() {
        let state = PlaybackState::new();
        assert_eq!(state.beep_remaining(), 0);
        assert_eq!(state.morse_cursor(), MORSE_LENGTH);
        assert!(state.morse_parked());
        assert!(state.is_idle());
    }

    #[test]
    fn test_beep_counts_down() {
        let mut engine = engine(1);
        engine.beep(3);

        let mut remaining = std::vec![engine.state().beep_remaining()];
        for _ in 0..3 {
            assert!(engine.calculate());
            remaining.push(engine.state().beep_remaining());
        }
        assert_eq!(remaining, [3, 2, 1, 0]);
        assert!(engine.state().beep_finished());
        assert!(!engine.calculate());

        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::BeepFinished]);
        assert!(engine.take_finished().is_empty());
    }

    #[test]
    fn test_beep_one_tick_short_has_no_completion() {
        let mut engine = engine(1);
        engine.beep(5);
        for _ in 0..4 {
            engine.calculate();
        }
        assert_eq!(engine.state().beep_remaining(), 1);
        assert!(engine.take_finished().is_empty());
    }

    #[test]
    fn test_zero_beep_is_noop() {
        let mut engine = engine(1);
        engine.beep(0);
        assert!(!engine.calculate());
        assert!(engine.take_finished().is_empty());
    }

    #[test]
    fn test_single_dot() {
        let mut engine = engine(1);
        engine.play_morse(MorseSequence::parse(b".").unwrap());

        // Load tick.
        assert!(!engine.calculate());
        assert_eq!(engine.state().morse_cursor(), 1);
        assert!(engine.state().morse_tone_active());
        assert_eq!(engine.state().morse_remaining(), 1);

        // Tone, then the inserted pause.
        assert!(engine.calculate());
        assert!(!engine.state().morse_tone_active());
        assert_eq!(engine.state().morse_remaining(), 1);
        assert!(!engine.state().morse_finished());

        assert!(!engine.calculate());
        assert!(engine.state().morse_parked());
        assert!(engine.state().morse_finished());
        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::MorseCodeFinished]);
    }

    #[test]
    fn test_sos_timing() {
        let mut engine = engine(1);
        engine.play_morse(MorseSequence::parse(b"... --- ...").unwrap());
        let trace = trace(&mut engine, 100);
        assert_eq!(trace, "_#_#_#__###_###_###__#_#_#_");
        assert_eq!(trace.matches('#').count(), 3 + 9 + 3);
        assert!(engine.state().morse_finished());
    }

    #[test]
    fn test_morse_duration_matches_sequence() {
        let mut engine = engine(4);
        let sequence = MorseSequence::parse(b"-. .- ").unwrap();
        let expected = sequence.duration_ticks(engine.config());
        engine.play_morse(sequence);
        let trace = trace(&mut engine, 1_000);
        // One extra tick loads the first symbol.
        assert_eq!(trace.len() as u32, expected + 1);
        assert_eq!(trace.matches('#').count(), 12 + 4 + 4 + 12);
    }

    #[test]
    fn test_full_buffer_finishes_when_last_symbol_loads() {
        let mut engine = engine(1);
        engine.play_morse(MorseSequence::parse(&[b'.'; MORSE_LENGTH]).unwrap());

        let mut finished_at = None;
        let mut idle_at = None;
        for tick in 1..=1_000 {
            engine.calculate();
            if finished_at.is_none() && engine.state().morse_finished() {
                finished_at = Some(tick);
                assert!(engine.state().morse_parked());
                assert!(engine.state().morse_tone_active());
                assert!(engine.state().morse_active());
            }
            if engine.state().is_idle() {
                idle_at = Some(tick);
                break;
            }
        }

        // Load tick, then a tone and a pause per dot; dot 59 loads on the
        // pause tick of dot 58.
        assert_eq!(finished_at, Some(1 + 2 * (MORSE_LENGTH - 1)));
        assert_eq!(idle_at, Some(1 + 2 * MORSE_LENGTH));
        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::MorseCodeFinished]);
    }

    #[test]
    fn test_empty_sequence_finishes_immediately() {
        let mut engine = engine(1);
        engine.play_morse(MorseSequence::empty());
        assert!(!engine.calculate());
        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::MorseCodeFinished]);
    }

    #[test]
    fn test_beep_cancels_morse() {
        let mut engine = engine(2);
        engine.play_morse(MorseSequence::parse(b"---").unwrap());
        for _ in 0..3 {
            engine.calculate();
        }
        assert!(engine.state().morse_tone_active());

        engine.beep(2);
        assert_eq!(engine.state().morse_remaining(), 0);
        assert!(!engine.state().morse_tone_active());
        assert!(engine.state().morse_parked());

        assert_eq!(trace(&mut engine, 10), "##");
        for _ in 0..10 {
            assert!(!engine.calculate());
        }
        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::BeepFinished]);
    }

    #[test]
    fn test_morse_cancels_beep() {
        let mut engine = engine(1);
        engine.beep(100);
        engine.calculate();
        engine.play_morse(MorseSequence::parse(b" ").unwrap());
        assert_eq!(engine.state().beep_remaining(), 0);

        assert_eq!(trace(&mut engine, 10), "__");
        assert_eq!(engine.take_finished().as_slice(), &[FunctionId::MorseCodeFinished]);
    }

    #[test]
    fn test_both_finished_beep_first() {
        let mut engine = engine(1);
        engine.play_morse(MorseSequence::empty());
        engine.calculate();
        engine.beep(1);
        engine.calculate();
        assert_eq!(
            engine.take_finished().as_slice(),
            &[FunctionId::BeepFinished, FunctionId::MorseCodeFinished]
        );
    }

    #[test]
    fn test_tick_type_bits() {
        let both = TickType::MESSAGE | TickType::CALCULATION;
        assert!(both.contains(TickType::MESSAGE));
        assert!(both.contains(TickType::CALCULATION));
        assert_eq!(TickType::from_bits_truncate(0xff), both);
    }
}
