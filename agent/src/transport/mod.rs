//!
//! Carriers that move CRSF frames on and off the bus.
//!
//! Each carrier owns its byte-stream handle and a stream parser, and
//! hands the event loop whole, validated frames. "Nothing arrived yet"
//! is an `Ok(None)`; a hard failure means the connection must be rebuilt
//! from scratch.
//!

use crsf_frame::Frame;
use thiserror::Error;

pub use memory::MemoryConnection;
pub use serial::SerialConnection;
pub use tcp::TcpConnection;

mod memory;
mod serial;
mod tcp;

/// Fusion endpoint exposed by the Crossfire WiFi module.
pub const TCP_HOST: &str = "192.168.4.1";
pub const TCP_PORT: u16 = 60950;

/// UART line rate; framing is 8-N-1.
pub const SERIAL_BAUD: u32 = 416_666;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port failure: {0}")]
    Serial(#[from] serialport::Error),

    #[error("peer closed the connection")]
    Disconnected,

    #[error("reader thread exited")]
    ReaderGone,

    #[error(transparent)]
    Frame(#[from] crsf_frame::Error),
}

/// A carrier exchanging whole CRSF frames.
pub trait Connection: Send {
    /// The next frame, if one is available within the carrier's own read
    /// timeout.
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError>;

    /// Put one frame on the wire.
    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError>;
}

impl<T: Connection + ?Sized> Connection for Box<T> {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        (**self).read_frame()
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        (**self).write_frame(frame)
    }
}
