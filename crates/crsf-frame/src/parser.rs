//!
//! Byte-stream re-synchronisation.
//!
//! Carriers hand the parser whatever the wire produced; the parser buffers
//! it and yields validated frames. Recovery is always one byte at a time:
//! a missing sync marker, an implausible length byte or a checksum failure
//! each shed a single byte, so a spurious sync inside another frame cannot
//! swallow the frame that follows it.
//!

use heapless::Vec;

use crate::crc8::Crc8;
use crate::frame::{Frame, MAX_FRAME_LEN, SYNC};
#[allow(unused_imports)]
use crate::private::*;

/// Bytes buffered while waiting for a frame to complete.
const BUFFER_LEN: usize = 512;

/// The LEN byte counts type, payload and CRC; below 2 nothing fits.
const MIN_LEN_BYTE: u8 = 2;
const MAX_LEN_BYTE: u8 = (MAX_FRAME_LEN - 2) as u8;

///
/// A restartable frame extractor over an unreliable byte stream.
///
/// `feed` appends bytes and returns a lazy iterator of the frames they
/// complete. Partial frames persist across `feed` calls; no frame is lost
/// at a feed boundary.
///
#[derive(Debug)]
pub struct Parser {
    buf: Vec<u8, BUFFER_LEN>,
    silent: bool,
    discarded: u64,
}

impl Parser {
    pub const fn new() -> Self {
        Self { buf: Vec::new(), silent: false, discarded: 0 }
    }

    /// A parser that does not log the bytes it sheds.
    pub const fn silent() -> Self {
        Self { buf: Vec::new(), silent: true, discarded: 0 }
    }

    /// Digest `input`, yielding every frame it completes.
    pub fn feed<'p, 'i>(&'p mut self, input: &'i [u8]) -> Frames<'p, 'i> {
        Frames { parser: self, input }
    }

    /// Bytes shed during resynchronisation since construction.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Bytes currently buffered, waiting for a frame to complete.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Drop any partial frame, e.g. after the carrier disconnected.
    pub fn reset(&mut self) {
        self.buf.clear();
    }

    fn try_extract(&mut self) -> Option<Frame> {
        loop {
            let skip = self.buf.iter().position(|&b| b == SYNC).unwrap_or(self.buf.len());
            if skip > 0 {
                self.discard(skip);
            }
            if self.buf.len() < 2 {
                return None;
            }
            let len_byte = self.buf[1];
            if !(MIN_LEN_BYTE..=MAX_LEN_BYTE).contains(&len_byte) {
                // length from a spurious sync marker
                self.discard(1);
                continue;
            }
            let expected = len_byte as usize + 2;
            if self.buf.len() < expected {
                return None;
            }
            let mut crc = Crc8::new();
            crc.digest(&self.buf[2..expected - 1]);
            if crc.finish() == self.buf[expected - 1] {
                let frame = Frame::from_wire(&self.buf[..expected]);
                self.consume(expected);
                if let Some(frame) = frame {
                    return Some(frame);
                }
            } else {
                #[cfg(feature = "log")]
                if !self.silent {
                    trace!("crc mismatch; byte discarded");
                }
                self.discard(1);
            }
        }
    }

    fn discard(&mut self, count: usize) {
        #[cfg(feature = "log")]
        if !self.silent {
            for &byte in &self.buf[..count] {
                trace!("byte {:02x} discarded", byte);
            }
        }
        self.consume(count);
        self.discarded += count as u64;
    }

    fn consume(&mut self, count: usize) {
        let rest = self.buf.len() - count;
        self.buf.copy_within(count.., 0);
        self.buf.truncate(rest);
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy frame sequence returned by [`Parser::feed`].
pub struct Frames<'p, 'i> {
    parser: &'p mut Parser,
    input: &'i [u8],
}

impl Iterator for Frames<'_, '_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.parser.try_extract() {
                return Some(frame);
            }
            if self.input.is_empty() {
                return None;
            }
            let space = BUFFER_LEN - self.parser.buf.len();
            if space == 0 {
                // cannot happen while BUFFER_LEN exceeds the largest frame,
                // but shedding a byte keeps the stream live regardless
                self.parser.discard(1);
                continue;
            }
            let take = space.min(self.input.len());
            let (head, rest) = self.input.split_at(take);
            let _ = self.parser.buf.extend_from_slice(head);
            self.input = rest;
        }
    }
}
