//! CRSF over a UART.

use std::io::{ErrorKind, Read, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tracing::{error, info, warn};

use crsf_frame::{Frame, Parser};

use super::{Connection, SERIAL_BAUD, TransportError};

/// Frames buffered between the reader thread and the event loop.
const QUEUE_DEPTH: usize = 256;

/// The reader wakes at least this often to check the liveness flag.
const READ_TIMEOUT: Duration = Duration::from_millis(100);

const READ_CHUNK: usize = 1024;

///
/// A connection over a serial port at the Crossfire line rate.
///
/// A dedicated thread performs the blocking reads: one byte to wake up,
/// then a drain of whatever else the port has buffered. Parsed frames
/// cross to the event loop through a bounded channel whose producer side
/// never blocks.
///
pub struct SerialConnection {
    port: Box<dyn SerialPort>,
    frames: Receiver<Frame>,
    alive: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl SerialConnection {
    pub fn open(path: &str) -> Result<Self, TransportError> {
        let port = serialport::new(path, SERIAL_BAUD)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()?;
        let reader_port = port.try_clone()?;
        let (tx, rx) = bounded(QUEUE_DEPTH);
        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);
        let reader = std::thread::spawn(move || read_loop(reader_port, tx, flag));
        info!(path, baud = SERIAL_BAUD, "serial port open");
        Ok(Self { port, frames: rx, alive, reader: Some(reader) })
    }
}

fn read_loop(mut port: Box<dyn SerialPort>, tx: Sender<Frame>, alive: Arc<AtomicBool>) {
    let mut parser = Parser::new();
    let mut buf = [0u8; READ_CHUNK];
    while alive.load(Ordering::Relaxed) {
        // block for one byte, then drain whatever else has arrived
        let mut filled = match port.read(&mut buf[..1]) {
            Ok(count) => count,
            Err(e) if e.kind() == ErrorKind::TimedOut => continue,
            Err(e) => {
                error!("serial read failed: {e}");
                break;
            }
        };
        if filled > 0 {
            let waiting = port.bytes_to_read().unwrap_or(0) as usize;
            let extra = waiting.min(buf.len() - filled);
            if extra > 0 {
                match port.read(&mut buf[filled..filled + extra]) {
                    Ok(count) => filled += count,
                    Err(e) if e.kind() == ErrorKind::TimedOut => {}
                    Err(e) => {
                        error!("serial read failed: {e}");
                        break;
                    }
                }
            }
        }
        for frame in parser.feed(&buf[..filled]) {
            match tx.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("inbound frame queue full; frame dropped"),
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
    alive.store(false, Ordering::Relaxed);
}

impl Connection for SerialConnection {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        match self.frames.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => {
                if self.alive.load(Ordering::Relaxed) {
                    Ok(None)
                } else {
                    Err(TransportError::ReaderGone)
                }
            }
            Err(TryRecvError::Disconnected) => Err(TransportError::ReaderGone),
        }
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        self.port.write_all(frame.as_bytes())?;
        Ok(())
    }
}

impl Drop for SerialConnection {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}
