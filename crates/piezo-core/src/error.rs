use crate::protocol::ErrorCode;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    #[error("invalid morse symbol {byte:#04x} at position {position}")]
    InvalidSymbol { position: usize, byte: u8 },
    #[error("morse sequence of {0} symbols does not fit the request")]
    SequenceTooLong(usize),
    #[error("character {0:?} has no morse encoding")]
    Unencodable(char),
    #[error("function id {0} is not supported")]
    NotSupported(u8),
    #[error("frame too short: need {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("header announces {announced} bytes but frame has {actual}")]
    LengthMismatch { announced: usize, actual: usize },
    #[error("dit length must be at least one tick")]
    ZeroDitLength,
}

impl Error {
    /// Error code reported on the wire for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::NotSupported(_) => ErrorCode::NotSupported,
            _ => ErrorCode::InvalidParameter,
        }
    }
}
