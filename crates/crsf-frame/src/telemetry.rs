//!
//! Typed views of broadcast telemetry payloads.
//!
//! Each view decodes the payload slice of one frame type; none of them
//! retain framing details. Decoders follow the same unmarshal shape: a
//! structural length check, then plain field extraction.
//!

use crate::error::{Error, Result};

/// RC channels carried by a PPM frame.
pub const PPM_CHANNELS: usize = 16;

/// Packed size of 16 channels of 11 bits.
const PPM_PAYLOAD_LEN: usize = PPM_CHANNELS * 11 / 8;

/// Device ticks per microsecond in LOG frame timestamps.
pub const LOG_TICKS_PER_US: u32 = 20;

/// Link statistics broadcast by the receiver (LINK_STATS payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkStats {
    /// Uplink RSSI of antenna 1, in -dBm.
    pub uplink_rssi_1: u8,
    /// Uplink RSSI of antenna 2, in -dBm.
    pub uplink_rssi_2: u8,
    /// Uplink link quality, 0..100.
    pub uplink_lqi: u8,
    pub uplink_snr: i8,
    pub antenna: u8,
    pub rf_mode: u8,
    pub tx_power: u8,
    /// Downlink RSSI, in -dBm.
    pub downlink_rssi: u8,
    /// Downlink link quality, 0..100.
    pub downlink_lqi: u8,
    pub downlink_snr: i8,
}

impl LinkStats {
    pub const SIZE: usize = 10;

    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::SIZE {
            return Err(Error::UnexpectedEnd { need: Self::SIZE - raw.len() });
        }
        Ok(Self {
            uplink_rssi_1: raw[0],
            uplink_rssi_2: raw[1],
            uplink_lqi: raw[2],
            uplink_snr: raw[3] as i8,
            antenna: raw[4],
            rf_mode: raw[5],
            tx_power: raw[6],
            downlink_rssi: raw[7],
            downlink_lqi: raw[8],
            downlink_snr: raw[9] as i8,
        })
    }
}

///
/// RC channel values from a PPM frame, as raw 11-bit ticks.
///
/// Channels are packed little-endian: channel 1 occupies the low 11 bits
/// of the first two bytes, and each subsequent channel continues from the
/// next bit.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RcChannels {
    pub ticks: [u16; PPM_CHANNELS],
}

impl RcChannels {
    pub fn unmarshal(raw: &[u8]) -> Result<Self> {
        if raw.len() < PPM_PAYLOAD_LEN {
            return Err(Error::UnexpectedEnd { need: PPM_PAYLOAD_LEN - raw.len() });
        }
        let mut ticks = [0u16; PPM_CHANNELS];
        let mut acc: u32 = 0;
        let mut bits: u32 = 0;
        let mut channel = 0;
        for &byte in &raw[..PPM_PAYLOAD_LEN] {
            acc |= (byte as u32) << bits;
            bits += 8;
            while bits >= 11 && channel < PPM_CHANNELS {
                ticks[channel] = (acc & 0x7FF) as u16;
                acc >>= 11;
                bits -= 11;
                channel += 1;
            }
        }
        Ok(Self { ticks })
    }

    /// All channels converted to microseconds.
    pub fn microseconds(&self) -> [i32; PPM_CHANNELS] {
        self.ticks.map(ticks_to_us)
    }
}

///
/// Convert a raw 11-bit channel value to microseconds.
///
/// Division is floored so values below the 992-tick centre land on the
/// same microsecond grid as values above it.
///
pub fn ticks_to_us(ticks: u16) -> i32 {
    ((ticks as i32 - 992) * 5).div_euclid(8) + 1500
}

///
/// A LOG frame body: a big-endian 32-bit device tick count followed by a
/// NUL-terminated message, or raw bytes for non-textual records.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LogRecord<'t> {
    pub ticks: u32,
    /// The decoded message, when the record carries terminated UTF-8.
    pub text: Option<&'t str>,
    /// Everything after the tick count, NUL included if present.
    pub raw: &'t [u8],
}

impl<'t> LogRecord<'t> {
    pub fn unmarshal(payload: &'t [u8]) -> Result<Self> {
        if payload.len() < 4 {
            return Err(Error::UnexpectedEnd { need: 4 - payload.len() });
        }
        let ticks = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let raw = &payload[4..];
        let text = match raw.split_last() {
            Some((0, head)) => core::str::from_utf8(head).ok(),
            _ => None,
        };
        Ok(Self { ticks, text, raw })
    }

    /// Tick count converted to milliseconds of device uptime.
    pub fn millis(&self) -> u32 {
        self.ticks / (LOG_TICKS_PER_US * 1000)
    }
}
