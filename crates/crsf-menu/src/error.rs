//! Error types for the menu protocol.

use thiserror::Error;

/// A specialized `Result` type for menu operations.
pub type Result<T> = std::result::Result<T, MenuError>;

#[derive(Debug, Error)]
pub enum MenuError {
    /// A chunked entry arrived out of order, duplicated a slot, or mixed
    /// parameter indices. The reassembly buffer has been cleared.
    #[error("chunk sequence violation for parameter {param}")]
    ChunkSequence { param: u8 },

    /// A parameter entry payload failed a structural check.
    #[error("malformed parameter entry at offset {at}")]
    MalformedEntry { at: usize },

    /// An entry expected to be a folder decoded as something else.
    #[error("parameter {param} is not a folder")]
    InvalidType { param: u8 },

    /// A write value does not fit the parameter's declared range.
    #[error("value {value} outside {min}..={max}")]
    ValueOutOfRange { value: i64, min: i64, max: i64 },

    /// The write value variant does not match the parameter kind.
    #[error("write value does not match the parameter kind")]
    KindMismatch,

    /// The parameter has not been fully received yet.
    #[error("parameter {param} not loaded")]
    NotLoaded { param: u8 },

    #[error(transparent)]
    Frame(#[from] crsf_frame::Error),
}
