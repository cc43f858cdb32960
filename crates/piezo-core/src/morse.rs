//! Morse symbols and sequences.
//!
//! A request carries a fixed buffer of [`MORSE_LENGTH`] bytes. Every byte is
//! one of `.` (dit), `-` (dah), ` ` (silent pause) or `0x00`, which pads the
//! buffer after the last meaningful symbol and plays for zero ticks.

use core::fmt;

use crate::config::BuzzerConfig;
use crate::consts::MORSE_LENGTH;
use crate::error::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Symbol {
    Dot,
    Dash,
    Space,
    Empty,
}

impl Symbol {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'.' => Some(Symbol::Dot),
            b'-' => Some(Symbol::Dash),
            b' ' => Some(Symbol::Space),
            0 => Some(Symbol::Empty),
            _ => None,
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Symbol::Dot => b'.',
            Symbol::Dash => b'-',
            Symbol::Space => b' ',
            Symbol::Empty => 0,
        }
    }

    /// Whether the symbol produces pulses.
    pub const fn is_tone(self) -> bool {
        matches!(self, Symbol::Dot | Symbol::Dash)
    }

    /// Ticks this symbol occupies, including the pause that follows a tone.
    pub fn ticks(self, config: &BuzzerConfig) -> u32 {
        match self {
            Symbol::Dot => config.dit_ticks.saturating_add(config.space_ticks()),
            Symbol::Dash => config.dah_ticks().saturating_add(config.space_ticks()),
            Symbol::Space => config.space_ticks(),
            Symbol::Empty => 0,
        }
    }
}

/// A validated, padded Morse buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MorseSequence {
    symbols: [Symbol; MORSE_LENGTH],
}

impl MorseSequence {
    pub const fn empty() -> Self {
        Self {
            symbols: [Symbol::Empty; MORSE_LENGTH],
        }
    }

    /// Validates the whole buffer before building the sequence, so a bad byte
    /// anywhere leaves nothing half-applied.
    ///
    /// Buffers shorter than [`MORSE_LENGTH`] are padded with [`Symbol::Empty`].
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MORSE_LENGTH {
            return Err(Error::SequenceTooLong(bytes.len()));
        }

        if let Some((position, &byte)) = bytes
            .iter()
            .enumerate()
            .find(|(_, byte)| Symbol::from_byte(**byte).is_none())
        {
            return Err(Error::InvalidSymbol { position, byte });
        }

        let mut sequence = Self::empty();
        for (slot, &byte) in sequence.symbols.iter_mut().zip(bytes) {
            *slot = Symbol::from_byte(byte).unwrap_or(Symbol::Empty);
        }
        Ok(sequence)
    }

    pub fn get(&self, index: usize) -> Option<Symbol> {
        self.symbols.get(index).copied()
    }

    pub fn symbols(&self) -> &[Symbol; MORSE_LENGTH] {
        &self.symbols
    }

    /// Number of symbols that are not padding.
    pub fn playable_len(&self) -> usize {
        self.symbols.iter().filter(|s| **s != Symbol::Empty).count()
    }

    /// Calculation ticks needed to play the whole sequence, not counting the
    /// tick that loads the first symbol.
    pub fn duration_ticks(&self, config: &BuzzerConfig) -> u32 {
        self.symbols
            .iter()
            .fold(0u32, |total, symbol| total.saturating_add(symbol.ticks(config)))
    }

    /// The request buffer for this sequence.
    pub fn to_bytes(&self) -> [u8; MORSE_LENGTH] {
        let mut bytes = [0u8; MORSE_LENGTH];
        for (byte, symbol) in bytes.iter_mut().zip(self.symbols.iter()) {
            *byte = symbol.as_byte();
        }
        bytes
    }
}

impl Default for MorseSequence {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Display for MorseSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in self.symbols.iter().filter(|s| **s != Symbol::Empty) {
            fmt::Write::write_char(f, symbol.as_byte() as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MorseSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MorseSequence")
            .field(&format_args!("\"{}\"", self))
            .finish()
    }
}

fn letter(c: char) -> Option<&'static str> {
    let code = match c.to_ascii_uppercase() {
        'A' => ".-",
        'B' => "-...",
        'C' => "-.-.",
        'D' => "-..",
        'E' => ".",
        'F' => "..-.",
        'G' => "--.",
        'H' => "....",
        'I' => "..",
        'J' => ".---",
        'K' => "-.-",
        'L' => ".-..",
        'M' => "--",
        'N' => "-.",
        'O' => "---",
        'P' => ".--.",
        'Q' => "--.-",
        'R' => ".-.",
        'S' => "...",
        'T' => "-",
        'U' => "..-",
        'V' => "...-",
        'W' => ".--",
        'X' => "-..-",
        'Y' => "-.--",
        'Z' => "--..",
        '0' => "-----",
        '1' => ".----",
        '2' => "..---",
        '3' => "...--",
        '4' => "....-",
        '5' => ".....",
        '6' => "-....",
        '7' => "--...",
        '8' => "---..",
        '9' => "----.",
        _ => return None,
    };
    Some(code)
}

/// Encodes plain text into request symbols.
///
/// Letters are separated by one space symbol and words by three, so `"SOS"`
/// becomes `"... --- ..."`.
pub fn encode_text(text: &str) -> Result<heapless::String<MORSE_LENGTH>> {
    let mut encoded = heapless::String::new();
    let mut needed = 0usize;

    for (word_index, word) in text.split_whitespace().enumerate() {
        if word_index > 0 {
            needed += push_str(&mut encoded, "   ");
        }
        for (char_index, c) in word.chars().enumerate() {
            let code = letter(c).ok_or(Error::Unencodable(c))?;
            if char_index > 0 {
                needed += push_str(&mut encoded, " ");
            }
            needed += push_str(&mut encoded, code);
        }
    }

    if needed > MORSE_LENGTH {
        return Err(Error::SequenceTooLong(needed));
    }
    Ok(encoded)
}

fn push_str(out: &mut heapless::String<MORSE_LENGTH>, s: &str) -> usize {
    // Overflow is detected by the caller from the returned length.
    let _ = out.push_str(s);
    s.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pads_with_empty() {
        let sequence = MorseSequence::parse(b".- ").unwrap();
        assert_eq!(sequence.get(0), Some(Symbol::Dot));
        assert_eq!(sequence.get(1), Some(Symbol::Dash));
        assert_eq!(sequence.get(2), Some(Symbol::Space));
        assert_eq!(sequence.get(3), Some(Symbol::Empty));
        assert_eq!(sequence.get(MORSE_LENGTH - 1), Some(Symbol::Empty));
        assert_eq!(sequence.get(MORSE_LENGTH), None);
        assert_eq!(sequence.playable_len(), 3);
    }

    #[test]
    fn test_parse_reports_first_invalid_byte() {
        let err = MorseSequence::parse(b"..x.y").unwrap_err();
        assert_eq!(err, Error::InvalidSymbol { position: 2, byte: b'x' });
    }

    #[test]
    fn test_parse_accepts_nul_padding_in_full_buffer() {
        let mut buffer = [0u8; MORSE_LENGTH];
        buffer[..3].copy_from_slice(b"...");
        let sequence = MorseSequence::parse(&buffer).unwrap();
        assert_eq!(sequence.playable_len(), 3);
        assert_eq!(sequence.to_bytes(), buffer);
    }

    #[test]
    fn test_parse_rejects_oversized_buffer() {
        let buffer = [b'.'; MORSE_LENGTH + 1];
        assert_eq!(
            MorseSequence::parse(&buffer),
            Err(Error::SequenceTooLong(MORSE_LENGTH + 1))
        );
    }

    #[test]
    fn test_display_skips_padding() {
        let sequence = MorseSequence::parse(b"... --- ...").unwrap();
        assert_eq!(std::format!("{}", sequence), "... --- ...");
    }

    #[test]
    fn test_duration_ticks() {
        let config = BuzzerConfig::new().with_dit_ticks(1);
        // dot 1+1, space 1, dash 3+1
        let sequence = MorseSequence::parse(b". -").unwrap();
        assert_eq!(sequence.duration_ticks(&config), 7);
        assert_eq!(MorseSequence::empty().duration_ticks(&config), 0);
    }

    #[test]
    fn test_encode_sos() {
        assert_eq!(encode_text("SOS").unwrap().as_str(), "... --- ...");
        assert_eq!(encode_text("sos").unwrap().as_str(), "... --- ...");
    }

    #[test]
    fn test_encode_words_and_digits() {
        assert_eq!(encode_text("e t").unwrap().as_str(), ".   -");
        assert_eq!(encode_text("73").unwrap().as_str(), "--... ...--");
        assert_eq!(encode_text("   ").unwrap().as_str(), "");
    }

    #[test]
    fn test_encode_errors() {
        assert_eq!(encode_text("a?"), Err(Error::Unencodable('?')));
        // 12 zeros: 12 * 5 + 11 separators
        assert_eq!(encode_text("000000000000"), Err(Error::SequenceTooLong(71)));
    }
}
