//! CRSF over a TCP socket.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use tracing::{info, trace};

use crsf_frame::{Frame, Parser};

use super::{Connection, TCP_HOST, TCP_PORT, TransportError};

const READ_TIMEOUT: Duration = Duration::from_millis(1000);
const RECV_CHUNK: usize = 2048;

///
/// A connection to the Fusion TCP endpoint of a Crossfire WiFi module.
///
/// Reads block up to one second; a timeout surfaces as "no frame yet",
/// while a zero-length read means the module dropped the session.
///
pub struct TcpConnection {
    stream: TcpStream,
    parser: Parser,
    pending: VecDeque<Frame>,
}

impl TcpConnection {
    /// Connect to the default Fusion endpoint.
    pub fn connect() -> Result<Self, TransportError> {
        Self::connect_to(TCP_HOST, TCP_PORT)
    }

    pub fn connect_to(host: &str, port: u16) -> Result<Self, TransportError> {
        let stream = TcpStream::connect((host, port))?;
        stream.set_read_timeout(Some(READ_TIMEOUT))?;
        info!(host, port, "tcp connected");
        Ok(Self { stream, parser: Parser::new(), pending: VecDeque::new() })
    }
}

impl Connection for TcpConnection {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        if let Some(frame) = self.pending.pop_front() {
            return Ok(Some(frame));
        }
        let mut buf = [0u8; RECV_CHUNK];
        match self.stream.read(&mut buf) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(count) => {
                self.pending.extend(self.parser.feed(&buf[..count]));
                Ok(self.pending.pop_front())
            }
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                trace!("tcp read timeout");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.stream.write_all(frame.as_bytes())?;
        Ok(())
    }
}
