//! An in-memory carrier for tests and the simulated mode.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crsf_frame::{DeviceIdentity, Frame, Parser, addr, msg_type};

use super::{Connection, TransportError};

/// Interval between synthetic LINK_STATS frames in simulated mode.
const STATS_PERIOD: Duration = Duration::from_millis(100);

///
/// A carrier with no wire behind it.
///
/// Frames written to it are recorded for inspection, and a PING is
/// answered with a canned DEVICE_INFO the way a Crossfire transmitter
/// would answer one. In simulated mode it also emits link statistics at
/// the usual broadcast rate, which gives the log mode something to show
/// without hardware.
///
pub struct MemoryConnection {
    inbound: VecDeque<Frame>,
    sent: Vec<Frame>,
    parser: Parser,
    simulate: bool,
    last_stats: Option<Instant>,
}

impl MemoryConnection {
    pub fn new() -> Self {
        Self {
            inbound: VecDeque::new(),
            sent: Vec::new(),
            parser: Parser::silent(),
            simulate: false,
            last_stats: None,
        }
    }

    /// A connection that also generates periodic telemetry.
    pub fn simulated() -> Self {
        Self { simulate: true, ..Self::new() }
    }

    /// Queue a frame as if it had arrived from the bus.
    pub fn push_frame(&mut self, frame: Frame) {
        self.inbound.push_back(frame);
    }

    /// Feed raw bytes through the same parser a real carrier uses.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        let frames: Vec<Frame> = self.parser.feed(bytes).collect();
        self.inbound.extend(frames);
    }

    /// Every frame written so far, in order.
    pub fn sent(&self) -> &[Frame] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Frame> {
        std::mem::take(&mut self.sent)
    }

    fn device_info_reply(dest: u8) -> Result<Frame, TransportError> {
        let identity = DeviceIdentity {
            name: "Test Device",
            serial: 0x01020304,
            hardware_id: 0x05060708,
            firmware_id: 0x090A0B0C,
            param_count: 5,
            param_version: 1,
        };
        Ok(Frame::device_info(dest, addr::TX, &identity)?)
    }

    fn link_stats() -> Result<Frame, TransportError> {
        Ok(Frame::new(&[msg_type::LINK_STATS, 50, 60, 95, 10, 1, 2, 25, 45, 92, 8])?)
    }
}

impl Default for MemoryConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl Connection for MemoryConnection {
    fn read_frame(&mut self) -> Result<Option<Frame>, TransportError> {
        if let Some(frame) = self.inbound.pop_front() {
            return Ok(Some(frame));
        }
        if self.simulate {
            let now = Instant::now();
            let due = self.last_stats.is_none_or(|at| now.duration_since(at) >= STATS_PERIOD);
            if due {
                self.last_stats = Some(now);
                return Ok(Some(Self::link_stats()?));
            }
        }
        Ok(None)
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<(), TransportError> {
        if frame.frame_type() == msg_type::PING {
            let dest = frame.origin().unwrap_or(addr::BROADCAST);
            self.inbound.push_back(Self::device_info_reply(dest)?);
        }
        self.sent.push(frame.clone());
        Ok(())
    }
}
