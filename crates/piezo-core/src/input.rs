//! Inbound requests.

use crate::consts::{self, HEADER_LEN, MORSE_LENGTH};
use crate::error::{Error, Result};
use crate::morse::{self, MorseSequence};
use crate::protocol::{self, Frame, FunctionId, MessageHeader};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Request {
    /// Beep for `duration` calculation ticks.
    Beep { duration: u32 },
    /// Play a Morse buffer. The raw bytes are kept so the driver decides
    /// when to validate them.
    MorseCode { morse: [u8; MORSE_LENGTH] },
}

impl Request {
    /// Builds a Morse request from symbol text such as `"... --- ..."`,
    /// padding the rest of the buffer with zeros.
    pub fn morse_code(symbols: &str) -> Result<Self> {
        let bytes = symbols.as_bytes();
        if bytes.len() > MORSE_LENGTH {
            return Err(Error::SequenceTooLong(bytes.len()));
        }
        let mut morse = [0u8; MORSE_LENGTH];
        morse[..bytes.len()].copy_from_slice(bytes);
        Ok(Request::MorseCode { morse })
    }

    /// Builds a Morse request from plain text, e.g. `"SOS"`.
    pub fn morse_text(text: &str) -> Result<Self> {
        let encoded = morse::encode_text(text)?;
        Self::morse_code(&encoded)
    }

    pub fn function_id(&self) -> FunctionId {
        match self {
            Request::Beep { .. } => FunctionId::Beep,
            Request::MorseCode { .. } => FunctionId::MorseCode,
        }
    }

    /// Decodes the payload following an already parsed header.
    pub fn decode(header: &MessageHeader, frame: &[u8]) -> Result<Self> {
        let payload = frame.get(HEADER_LEN..).unwrap_or(&[]);
        match FunctionId::try_from(header.function_id)? {
            FunctionId::Beep => {
                let bytes: [u8; 4] = payload
                    .get(..4)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(Error::Truncated {
                        expected: HEADER_LEN + 4,
                        actual: frame.len(),
                    })?;
                Ok(Request::Beep {
                    duration: u32::from_le_bytes(bytes),
                })
            }
            FunctionId::MorseCode => {
                let morse: [u8; MORSE_LENGTH] = payload
                    .get(..MORSE_LENGTH)
                    .and_then(|b| b.try_into().ok())
                    .ok_or(Error::Truncated {
                        expected: HEADER_LEN + MORSE_LENGTH,
                        actual: frame.len(),
                    })?;
                Ok(Request::MorseCode { morse })
            }
            // Notifications flow from the driver to the client only.
            FunctionId::BeepFinished | FunctionId::MorseCodeFinished => {
                Err(Error::NotSupported(header.function_id))
            }
        }
    }

    /// Validated Morse sequence carried by a [`Request::MorseCode`].
    pub fn morse_sequence(&self) -> Option<Result<MorseSequence>> {
        match self {
            Request::MorseCode { morse } => Some(MorseSequence::parse(morse)),
            Request::Beep { .. } => None,
        }
    }

    /// Encodes the request as a client would send it.
    pub fn encode(&self, uid: u32, sequence_number: u8, response_expected: bool) -> Frame {
        let header = MessageHeader::new(
            uid,
            self.function_id() as u8,
            sequence_number,
            response_expected,
        );
        let framed = match self {
            Request::Beep { duration } => protocol::frame(header, &duration.to_le_bytes()),
            Request::MorseCode { morse } => protocol::frame(header, morse),
        };
        // Both payloads fit in MAX_FRAME_LEN.
        framed.unwrap_or_default()
    }
}

/// Length of a well-formed request frame for `function_id`, if it is one.
pub fn request_len(function_id: u8) -> Option<usize> {
    match function_id {
        consts::FID_BEEP => Some(HEADER_LEN + 4),
        consts::FID_MORSE_CODE => Some(HEADER_LEN + MORSE_LENGTH),
        _ => None,
    }
}
