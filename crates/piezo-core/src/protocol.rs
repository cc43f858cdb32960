//! Message framing.
//!
//! Every frame starts with an 8 byte little-endian header:
//!
//! | offset | field |
//! |--------|-------|
//! | 0..4   | device uid |
//! | 4      | frame length, header included |
//! | 5      | function id |
//! | 6      | options: sequence number (bits 4..7), response expected (bit 3) |
//! | 7      | flags: error code (bits 6..7) |

use crate::consts::{self, HEADER_LEN, MAX_FRAME_LEN};
use crate::error::{Error, Result};

pub type Frame = heapless::Vec<u8, MAX_FRAME_LEN>;

const RESPONSE_EXPECTED: u8 = 0x08;
const SEQUENCE_SHIFT: u8 = 4;
const ERROR_CODE_SHIFT: u8 = 6;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FunctionId {
    Beep = consts::FID_BEEP,
    MorseCode = consts::FID_MORSE_CODE,
    BeepFinished = consts::FID_BEEP_FINISHED,
    MorseCodeFinished = consts::FID_MORSE_CODE_FINISHED,
}

impl TryFrom<u8> for FunctionId {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            consts::FID_BEEP => Ok(FunctionId::Beep),
            consts::FID_MORSE_CODE => Ok(FunctionId::MorseCode),
            consts::FID_BEEP_FINISHED => Ok(FunctionId::BeepFinished),
            consts::FID_MORSE_CODE_FINISHED => Ok(FunctionId::MorseCodeFinished),
            other => Err(Error::NotSupported(other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    InvalidParameter = 1,
    NotSupported = 2,
    Unknown = 3,
}

impl ErrorCode {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => ErrorCode::Ok,
            1 => ErrorCode::InvalidParameter,
            2 => ErrorCode::NotSupported,
            _ => ErrorCode::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MessageHeader {
    pub uid: u32,
    pub length: u8,
    pub function_id: u8,
    pub options: u8,
    pub flags: u8,
}

impl MessageHeader {
    pub fn new(uid: u32, function_id: u8, sequence_number: u8, response_expected: bool) -> Self {
        let mut options = (sequence_number & 0x0f) << SEQUENCE_SHIFT;
        if response_expected {
            options |= RESPONSE_EXPECTED;
        }
        Self {
            uid,
            length: HEADER_LEN as u8,
            function_id,
            options,
            flags: 0,
        }
    }

    /// Header of an unsolicited notification. Notifications use sequence number 0.
    pub fn notification(uid: u32, function_id: FunctionId) -> Self {
        Self::new(uid, function_id as u8, 0, false)
    }

    /// Reads the header fields without looking at the rest of the frame.
    pub fn read(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_LEN {
            return Err(Error::Truncated {
                expected: HEADER_LEN,
                actual: frame.len(),
            });
        }

        Ok(Self {
            uid: u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]),
            length: frame[4],
            function_id: frame[5],
            options: frame[6],
            flags: frame[7],
        })
    }

    /// Reads the header and checks the announced length against the frame.
    pub fn parse(frame: &[u8]) -> Result<Self> {
        let header = Self::read(frame)?;
        header.check_length(frame.len())?;
        Ok(header)
    }

    pub fn check_length(&self, frame_len: usize) -> Result<()> {
        if usize::from(self.length) != frame_len {
            return Err(Error::LengthMismatch {
                announced: usize::from(self.length),
                actual: frame_len,
            });
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let uid = self.uid.to_le_bytes();
        [
            uid[0],
            uid[1],
            uid[2],
            uid[3],
            self.length,
            self.function_id,
            self.options,
            self.flags,
        ]
    }

    pub fn sequence_number(&self) -> u8 {
        self.options >> SEQUENCE_SHIFT
    }

    pub fn response_expected(&self) -> bool {
        self.options & RESPONSE_EXPECTED != 0
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from_bits(self.flags >> ERROR_CODE_SHIFT)
    }

    pub fn with_error_code(mut self, code: ErrorCode) -> Self {
        self.flags =
            (self.flags & !(0x03 << ERROR_CODE_SHIFT)) | ((code as u8) << ERROR_CODE_SHIFT);
        self
    }

    /// Header-only reply echoing this request's uid, function id and sequence number.
    pub fn reply(&self, code: ErrorCode) -> Self {
        Self {
            uid: self.uid,
            length: HEADER_LEN as u8,
            function_id: self.function_id,
            options: self.options,
            flags: 0,
        }
        .with_error_code(code)
    }
}

/// Assembles a frame from a header and payload, fixing up the length field.
pub fn frame(header: MessageHeader, payload: &[u8]) -> Result<Frame> {
    let total = HEADER_LEN + payload.len();
    if total > MAX_FRAME_LEN {
        return Err(Error::SequenceTooLong(payload.len()));
    }

    let header = MessageHeader {
        length: total as u8,
        ..header
    };
    let mut frame = Frame::new();
    // Capacity checked above.
    let _ = frame.extend_from_slice(&header.to_bytes());
    let _ = frame.extend_from_slice(payload);
    Ok(frame)
}

/// Cuts a byte stream into frames using the header's length field.
#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Frame,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self { buffer: Frame::new() }
    }

    /// Feeds one byte. Returns the frame it completes, if any.
    ///
    /// A length byte outside `HEADER_LEN..=MAX_FRAME_LEN` cannot start a
    /// valid frame; the partial frame is discarded and the stream resyncs
    /// on the next byte.
    pub fn push(&mut self, byte: u8) -> Option<Frame> {
        if self.buffer.push(byte).is_err() {
            self.buffer.clear();
            return None;
        }
        if self.buffer.len() <= 4 {
            return None;
        }

        let length = usize::from(self.buffer[4]);
        if !(HEADER_LEN..=MAX_FRAME_LEN).contains(&length) {
            log::warn!("discarding partial frame, bad length {}", length);
            self.buffer.clear();
            return None;
        }
        if self.buffer.len() == length {
            return Some(core::mem::take(&mut self.buffer));
        }
        None
    }

}

/// Frames sent from the driver back to a client.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Message {
    /// Setter acknowledgement or error report for a request.
    Response {
        function_id: u8,
        sequence_number: u8,
        error: ErrorCode,
    },
    BeepFinished,
    MorseCodeFinished,
}

impl Message {
    /// Decodes a frame received by a client.
    ///
    /// Frames with sequence number 0 are notifications; everything else is a
    /// response to an earlier request.
    pub fn decode(frame: &[u8]) -> Result<(u32, Self)> {
        let header = MessageHeader::parse(frame)?;
        let message = if header.sequence_number() == 0 {
            match FunctionId::try_from(header.function_id)? {
                FunctionId::BeepFinished => Message::BeepFinished,
                FunctionId::MorseCodeFinished => Message::MorseCodeFinished,
                other => return Err(Error::NotSupported(other as u8)),
            }
        } else {
            Message::Response {
                function_id: header.function_id,
                sequence_number: header.sequence_number(),
                error: header.error_code(),
            }
        };
        Ok((header.uid, message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = MessageHeader::new(0x0403_0201, consts::FID_BEEP, 5, true);
        let bytes = header.to_bytes();
        assert_eq!(bytes, [0x01, 0x02, 0x03, 0x04, 8, 1, 0x58, 0x00]);
        assert_eq!(MessageHeader::parse(&bytes).unwrap(), header);
        assert_eq!(header.sequence_number(), 5);
        assert!(header.response_expected());
    }

    #[test]
    fn test_parse_rejects_short_and_mismatched_frames() {
        assert_eq!(
            MessageHeader::parse(&[0u8; 5]),
            Err(Error::Truncated { expected: 8, actual: 5 })
        );
        let mut bytes = MessageHeader::new(1, 1, 1, false).to_bytes();
        bytes[4] = 12;
        assert_eq!(
            MessageHeader::parse(&bytes),
            Err(Error::LengthMismatch { announced: 12, actual: 8 })
        );
    }

    #[test]
    fn test_reply_echoes_request() {
        let request = MessageHeader::new(77, 42, 3, true);
        let reply = request.reply(ErrorCode::NotSupported);
        assert_eq!(reply.uid, 77);
        assert_eq!(reply.function_id, 42);
        assert_eq!(reply.sequence_number(), 3);
        assert_eq!(reply.length, 8);
        assert_eq!(reply.error_code(), ErrorCode::NotSupported);
        assert_eq!(reply.flags, 0x80);
    }

    #[test]
    fn test_frame_sets_length() {
        let frame = frame(MessageHeader::new(1, consts::FID_BEEP, 1, true), &[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.len(), 12);
        assert_eq!(frame[4], 12);
        assert_eq!(&frame[8..], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_assembler_splits_stream() {
        let header = MessageHeader::new(5, consts::FID_BEEP, 1, true);
        let beep = frame(header, &100u32.to_le_bytes()).unwrap();
        let notification = MessageHeader::notification(5, FunctionId::BeepFinished).to_bytes();

        let mut assembler = FrameAssembler::new();
        let mut frames = std::vec::Vec::new();
        for byte in beep.iter().chain(notification.iter()) {
            if let Some(frame) = assembler.push(*byte) {
                frames.push(frame);
            }
        }
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], beep);
        assert_eq!(&frames[1][..], &notification[..]);
    }

    #[test]
    fn test_assembler_drops_bad_length() {
        let mut assembler = FrameAssembler::new();
        for byte in [1, 2, 3, 4, 3] {
            assert!(assembler.push(byte).is_none());
        }

        let header = MessageHeader::new(1, 0x7f, 1, false).to_bytes();
        let complete: std::vec::Vec<_> = header.iter().filter_map(|b| assembler.push(*b)).collect();
        assert_eq!(complete.len(), 1);
        assert_eq!(MessageHeader::parse(&complete[0]).unwrap().function_id, 0x7f);
    }

    #[test]
    fn test_decode_notification_and_response() {
        let notification = MessageHeader::notification(9, FunctionId::MorseCodeFinished).to_bytes();
        assert_eq!(Message::decode(&notification).unwrap(), (9, Message::MorseCodeFinished));

        let response = MessageHeader::new(9, consts::FID_MORSE_CODE, 2, true)
            .reply(ErrorCode::InvalidParameter)
            .to_bytes();
        assert_eq!(
            Message::decode(&response).unwrap(),
            (
                9,
                Message::Response {
                    function_id: consts::FID_MORSE_CODE,
                    sequence_number: 2,
                    error: ErrorCode::InvalidParameter,
                }
            )
        );
    }
}
