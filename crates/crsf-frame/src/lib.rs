//! A codec for the Crossfire Serial Protocol (CRSF) wire format.
//!
//! This crate provides the allocation-free framing layer shared by every
//! CRSF carrier: checksum validation, frame construction, byte-stream
//! re-synchronisation and typed views of selected payloads. It performs
//! no I/O; carriers feed it bytes and take frames.
//!
//! # Architecture Overview
//!
//! - **`Crc8`**
//!   Streaming CRC8 engine with a selectable polynomial. CRSF frames are
//!   validated with the DVB-S2 polynomial, command payloads with a second
//!   one.
//!
//! - **`Frame`**
//!   An owned, immutable wire frame with typed accessors for the frame
//!   type, the addresses of extended frames and the payload, plus
//!   constructors for the frames a client emits.
//!
//! - **`Parser`**
//!   A restartable byte-stream re-synchroniser. Feeding it bytes yields a
//!   lazy sequence of validated frames; garbage between frames is shed one
//!   byte at a time.
//!
//! - **`DeviceIdentity`**
//!   A zero-copy view of a DEVICE_INFO payload.
//!
//! - **`telemetry`**
//!   Typed decoders for broadcast payloads (link statistics, packed RC
//!   channels, log records).
//!
//! # Frame Layout
//!
//! ```text
//! +--------+--------+--------+-----------------+---------+--------+
//! |  SYNC  |  LEN   |  TYPE  | (DEST) (ORIG)   |  DATA   |  CRC8  |
//! +--------+--------+--------+-----------------+---------+--------+
//! | 1 byte | 1 byte | 1 byte | 2 bytes if ext. | N bytes | 1 byte |
//! +--------+--------+--------+-----------------+---------+--------+
//! ```
//!
//! `LEN` counts everything after itself: type, addresses, data and the CRC
//! byte. Extended frames (types `0x28..=0x96` and `0xAA`) carry the
//! destination and origin bus addresses between the type and the data.
//!
#![cfg_attr(not(test), no_std)]

pub use crc8::{Crc8, POLY_COMMAND, POLY_FRAME, checksum};
pub use error::{Error, Result};
pub use frame::{DeviceIdentity, Frame, MAX_FRAME_LEN, SYNC, addr, msg_type};
pub use parser::Parser;

pub mod telemetry;

mod crc8;
mod error;
mod frame;
mod parser;

mod private {
    #[allow(unused_imports)]
    #[cfg(feature = "defmt")]
    pub use ::defmt::{debug, error, info, trace, warn};

    pub use core::error::Error as StdError;
    pub use core::fmt::{Display, Formatter, Result as FmtResult};
    pub use core::result::Result as StdResult;
}
