//!
//! Streaming CRC8 engine for CRSF frames and commands.
//!
//! The residue is folded MSB-first from a zero initial value, and one
//! extra zero byte is folded when the digest is finished. That final zero
//! byte is part of the checksum definition, not an implementation detail:
//! omitting it changes every residue.
//!

/// CRC8 polynomial validating CRSF frames (DVB-S2).
pub const POLY_FRAME: u8 = 0xD5;
/// CRC8 polynomial validating CRSF command payloads.
pub const POLY_COMMAND: u8 = 0xBA;

///
/// Incremental CRC8 state.
///
/// Bytes are folded with `digest`; `finish` folds the trailing zero byte
/// and consumes the engine, returning the 8-bit residue.
///
#[derive(Debug, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Crc8 {
    value: u8,
    poly: u8,
}

impl Crc8 {
    /// Engine for the frame polynomial.
    pub const fn new() -> Self {
        Self::with_poly(POLY_FRAME)
    }

    /// Engine for an arbitrary polynomial.
    pub const fn with_poly(poly: u8) -> Self {
        Self { value: 0, poly }
    }

    fn fold(&mut self, mut byte: u8) {
        for _ in 0..8 {
            let msb = self.value & 0x80 != 0;
            self.value <<= 1;
            self.value |= byte >> 7;
            byte <<= 1;
            if msb {
                self.value ^= self.poly;
            }
        }
    }

    /// Fold a run of bytes into the residue.
    pub fn digest(&mut self, data: &[u8]) {
        for &byte in data {
            self.fold(byte);
        }
    }

    /// Fold the final zero byte and return the residue.
    pub fn finish(mut self) -> u8 {
        self.fold(0);
        self.value
    }
}

impl Default for Crc8 {
    fn default() -> Self {
        Self::new()
    }
}

/// One-shot frame checksum over `data`.
pub fn checksum(data: &[u8]) -> u8 {
    let mut crc = Crc8::new();
    crc.digest(data);
    crc.finish()
}
