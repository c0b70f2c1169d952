//! Error types for the framing layer.

use crate::private::*;

/// A specialized `Result` type for framing operations.
pub type Result<T> = StdResult<T, Error>;

///
/// # Error types for frame encoding and decoding.
///
/// Variants that point into a buffer carry the offset they refer to:
///
/// - `Error::UnexpectedEnd`: `need` is the number of missing bytes.
/// - `Error::MalformedPayload`: `at` is the offset where decoding failed
///   (for a missing NUL terminator, the end of the searched region).
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Frame body exceeds the maximum encodable size.
    InputTooLarge { max: usize },
    /// Input ended before a fixed-size field was complete.
    UnexpectedEnd { need: usize },
    /// A variable-length field failed a structural check.
    MalformedPayload { at: usize },
    /// Checksum validation failed for the frame.
    CrcMismatch { expected: u8, found: u8 },
    /// A typed parse was attempted on a frame of the wrong type.
    WrongFrameType { found: u8 },
}

impl StdError for Error {}
impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::InputTooLarge { max } => {
                write!(f, "Input exceeds maximum frame body of {max} bytes")
            }
            Self::UnexpectedEnd { need } => {
                write!(f, "Unexpected end of input, {need} more bytes needed")
            }
            Self::MalformedPayload { at } => {
                write!(f, "Malformed payload at offset {at}")
            }
            Self::CrcMismatch { expected, found } => {
                write!(f, "Checksum mismatch, expected {expected:02x} found {found:02x}")
            }
            Self::WrongFrameType { found } => {
                write!(f, "Cannot parse frame of type {found:02x}")
            }
        }
    }
}
