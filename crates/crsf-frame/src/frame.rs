//!
//! Frame construction and typed access.
//!
//! A [`Frame`] owns its wire bytes in a fixed-capacity buffer; accessors
//! expose the type byte, the addresses of extended frames and the payload
//! slice. Constructors exist for every frame a client emits: PING,
//! PARAM_READ, PARAM_WRITE and DEVICE_INFO.
//!

use heapless::Vec;

use crate::crc8::{Crc8, checksum};
use crate::error::{Error, Result};
use crate::private::*;

/// Start-of-frame marker.
pub const SYNC: u8 = 0xC8;

/// Largest frame on the wire: the LEN byte tops out at 62.
pub const MAX_FRAME_LEN: usize = 64;

/// Largest frame body (type byte, addresses and data) a frame can carry.
pub const MAX_BODY_LEN: usize = MAX_FRAME_LEN - 3;

/// CRSF bus device addresses.
pub mod addr {
    pub const BROADCAST: u8 = 0x00;
    /// MQTT bridge.
    pub const CLOUD: u8 = 0x0E;
    pub const WIFI: u8 = 0x12;
    /// The radio handset.
    pub const REMOTE: u8 = 0xEA;
    pub const RX: u8 = 0xEC;
    pub const TX: u8 = 0xEE;
    /// Flight controller; also the default origin of this client.
    pub const FC: u8 = 0xC8;
    pub const VTX: u8 = 0xCE;

    /// Symbolic name of a bus address, if known.
    pub fn name(addr: u8) -> Option<&'static str> {
        Some(match addr {
            BROADCAST => "BROADCAST",
            CLOUD => "CLOUD",
            WIFI => "WIFI",
            REMOTE => "REMOTE",
            RX => "RX",
            TX => "TX",
            FC => "FC",
            VTX => "VTX",
            _ => return None,
        })
    }
}

/// CRSF frame types.
pub mod msg_type {
    pub const GPS: u8 = 0x02;
    pub const GPST: u8 = 0x03;
    pub const BATT: u8 = 0x08;
    pub const VTX_TEL: u8 = 0x10;
    pub const LINK_STATS: u8 = 0x14;
    /// Packed RC channel values.
    pub const PPM: u8 = 0x16;
    /// CRSF v3 packed channel values.
    pub const PPM3: u8 = 0x17;
    pub const LINK_STATS_RX: u8 = 0x1C;
    pub const LINK_STATS_TX: u8 = 0x1D;
    pub const ATTD: u8 = 0x1E;
    pub const MADD: u8 = 0x1F;
    pub const PING: u8 = 0x28;
    pub const DEVICE_INFO: u8 = 0x29;
    pub const PARAM_ENTRY: u8 = 0x2B;
    pub const PARAM_READ: u8 = 0x2C;
    pub const PARAM_WRITE: u8 = 0x2D;
    pub const CMD: u8 = 0x32;
    pub const LOG: u8 = 0x34;
    pub const REMOTE: u8 = 0x3A;
    pub const MAVLINK_ENV: u8 = 0xAA;

    /// Symbolic name of a frame type, if known.
    pub fn name(frame_type: u8) -> Option<&'static str> {
        Some(match frame_type {
            GPS => "GPS",
            GPST => "GPST",
            BATT => "BATT",
            VTX_TEL => "VTX_TEL",
            LINK_STATS => "LINK_STATS",
            PPM => "PPM",
            PPM3 => "PPM3",
            LINK_STATS_RX => "LINK_STATS_RX",
            LINK_STATS_TX => "LINK_STATS_TX",
            ATTD => "ATTD",
            MADD => "MADD",
            PING => "PING",
            DEVICE_INFO => "DEVICE_INFO",
            PARAM_ENTRY => "PARAM_ENTRY",
            PARAM_READ => "PARAM_READ",
            PARAM_WRITE => "PARAM_WRITE",
            CMD => "CMD",
            LOG => "LOG",
            REMOTE => "REMOTE",
            MAVLINK_ENV => "MAVLINK_ENV",
            _ => return None,
        })
    }
}

///
/// A validated CRSF wire frame.
///
/// Frames are value types: producers build or parse them, consumers take
/// them whole. The byte buffer is never modified after construction, so
/// every accessor is a cheap view.
///
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    raw: Vec<u8, MAX_FRAME_LEN>,
}

impl Frame {
    ///
    /// Build a frame around `body`, which starts with the type byte and
    /// carries the addresses and data but neither LEN nor the CRC. Both
    /// are computed here.
    ///
    pub fn new(body: &[u8]) -> Result<Self> {
        if body.len() > MAX_BODY_LEN {
            return Err(Error::InputTooLarge { max: MAX_BODY_LEN });
        }
        let mut raw = Vec::new();
        // Length checked above, the pushes below cannot overflow.
        let _ = raw.push(SYNC);
        let _ = raw.push(body.len() as u8 + 1);
        let _ = raw.extend_from_slice(body);
        let mut crc = Crc8::new();
        crc.digest(&raw[2..]);
        let _ = raw.push(crc.finish());
        Ok(Self { raw })
    }

    /// Wrap already-validated wire bytes. Used by the stream parser.
    pub(crate) fn from_wire(bytes: &[u8]) -> Option<Self> {
        let mut raw = Vec::new();
        raw.extend_from_slice(bytes).ok()?;
        Some(Self { raw })
    }

    ///
    /// Validate exactly one serialised frame: sync marker, length byte and
    /// checksum. The stream parser is the tool for unreliable input; this
    /// is for callers that already hold one whole frame.
    ///
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::UnexpectedEnd { need: 4 - bytes.len() });
        }
        if bytes[0] != SYNC {
            return Err(Error::MalformedPayload { at: 0 });
        }
        let wire_len = bytes[1] as usize + 2;
        if wire_len > MAX_FRAME_LEN {
            return Err(Error::InputTooLarge { max: MAX_FRAME_LEN });
        }
        if bytes.len() < wire_len {
            return Err(Error::UnexpectedEnd { need: wire_len - bytes.len() });
        }
        let expected = checksum(&bytes[2..wire_len - 1]);
        let found = bytes[wire_len - 1];
        if expected != found {
            return Err(Error::CrcMismatch { expected, found });
        }
        Self::from_wire(&bytes[..wire_len]).ok_or(Error::InputTooLarge { max: MAX_FRAME_LEN })
    }

    /// A broadcast-capable PING.
    pub fn ping(dest: u8, orig: u8) -> Result<Self> {
        Self::new(&[msg_type::PING, dest, orig])
    }

    /// Request one chunk of one parameter entry from `dest`.
    pub fn param_read(dest: u8, orig: u8, param: u8, chunk: u8) -> Result<Self> {
        Self::new(&[msg_type::PARAM_READ, dest, orig, param, chunk])
    }

    /// Write `value` (already wire-encoded) to a parameter of `dest`.
    pub fn param_write(dest: u8, orig: u8, param: u8, value: &[u8]) -> Result<Self> {
        let mut body = Vec::<u8, MAX_BODY_LEN>::new();
        body.extend_from_slice(&[msg_type::PARAM_WRITE, dest, orig, param])
            .and_then(|()| body.extend_from_slice(value))
            .map_err(|_| Error::InputTooLarge { max: MAX_BODY_LEN })?;
        Self::new(&body)
    }

    /// Advertise `identity` in a DEVICE_INFO frame.
    pub fn device_info(dest: u8, orig: u8, identity: &DeviceIdentity) -> Result<Self> {
        const OVERFLOW: Error = Error::InputTooLarge { max: MAX_BODY_LEN };
        let mut body = Vec::<u8, MAX_BODY_LEN>::new();
        body.extend_from_slice(&[msg_type::DEVICE_INFO, dest, orig]).map_err(|_| OVERFLOW)?;
        body.extend_from_slice(identity.name.as_bytes()).map_err(|_| OVERFLOW)?;
        body.push(0).map_err(|_| OVERFLOW)?;
        body.extend_from_slice(&identity.serial.to_be_bytes()).map_err(|_| OVERFLOW)?;
        body.extend_from_slice(&identity.hardware_id.to_be_bytes()).map_err(|_| OVERFLOW)?;
        body.extend_from_slice(&identity.firmware_id.to_be_bytes()).map_err(|_| OVERFLOW)?;
        body.extend_from_slice(&[identity.param_count, identity.param_version])
            .map_err(|_| OVERFLOW)?;
        Self::new(&body)
    }

    /// The full wire bytes, SYNC through CRC.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }

    /// Total size on the wire.
    #[inline]
    pub fn wire_len(&self) -> usize {
        self.raw.len()
    }

    /// The frame type byte.
    #[inline]
    pub fn frame_type(&self) -> u8 {
        self.raw[2]
    }

    /// Extended frames carry their destination and origin addresses.
    pub fn is_extended(&self) -> bool {
        matches!(self.frame_type(), 0x28..=0x96) || self.frame_type() == msg_type::MAVLINK_ENV
    }

    /// Destination address of an extended frame.
    pub fn destination(&self) -> Option<u8> {
        if self.is_extended() && self.raw.len() >= 6 { Some(self.raw[3]) } else { None }
    }

    /// Origin address of an extended frame.
    pub fn origin(&self) -> Option<u8> {
        if self.is_extended() && self.raw.len() >= 6 { Some(self.raw[4]) } else { None }
    }

    ///
    /// The data between the addresses (or the type byte for non-extended
    /// frames) and the CRC.
    ///
    pub fn payload(&self) -> &[u8] {
        let start = if self.is_extended() { 5 } else { 3 };
        let end = self.raw.len() - 1;
        if start >= end { &[] } else { &self.raw[start..end] }
    }

    ///
    /// Parse a DEVICE_INFO payload: a NUL-terminated device name followed
    /// by three big-endian 32-bit identifiers, the parameter count and the
    /// parameter protocol version.
    ///
    /// # Errors
    ///
    /// `WrongFrameType` for other frame types, `MalformedPayload` when the
    /// name is unterminated or not UTF-8, `UnexpectedEnd` when the fixed
    /// tail is short.
    ///
    pub fn device_identity(&self) -> Result<DeviceIdentity<'_>> {
        if self.frame_type() != msg_type::DEVICE_INFO {
            return Err(Error::WrongFrameType { found: self.frame_type() });
        }
        let payload = self.payload();
        let nul = payload
            .iter()
            .position(|&b| b == 0)
            .ok_or(Error::MalformedPayload { at: payload.len() })?;
        let name = core::str::from_utf8(&payload[..nul])
            .map_err(|e| Error::MalformedPayload { at: e.valid_up_to() })?;
        let tail = &payload[nul + 1..];
        if tail.len() < 14 {
            return Err(Error::UnexpectedEnd { need: 14 - tail.len() });
        }
        let word = |r: &[u8]| u32::from_be_bytes([r[0], r[1], r[2], r[3]]);
        Ok(DeviceIdentity {
            name,
            serial: word(&tail[0..4]),
            hardware_id: word(&tail[4..8]),
            firmware_id: word(&tail[8..12]),
            param_count: tail[12],
            param_version: tail[13],
        })
    }
}

impl Display for Frame {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        if self.raw[0] == SYNC {
            f.write_str("SYNC ")?;
        } else {
            write!(f, "{:02x} ", self.raw[0])?;
        }
        write!(f, "L={} ", self.raw.len())?;
        match msg_type::name(self.frame_type()) {
            Some(name) => write!(f, "({name}) ")?,
            None => write!(f, "(t={:02x}) ", self.frame_type())?,
        }
        let mut body = &self.raw[3..];
        if let (Some(dest), Some(orig)) = (self.destination(), self.origin()) {
            fmt_addr(f, orig)?;
            f.write_str("->")?;
            fmt_addr(f, dest)?;
            f.write_str(" ")?;
            body = &self.raw[5..];
        }
        for (i, byte) in body.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

fn fmt_addr(f: &mut Formatter, addr: u8) -> FmtResult {
    match addr::name(addr) {
        Some(name) => f.write_str(name),
        None => write!(f, "{addr:02x}"),
    }
}

///
/// A zero-copy view of a DEVICE_INFO payload.
///
/// # Lifetime
///
/// The name borrows from the frame it was parsed out of.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DeviceIdentity<'t> {
    pub name: &'t str,
    pub serial: u32,
    pub hardware_id: u32,
    pub firmware_id: u32,
    /// Number of menu parameters, excluding the root folder.
    pub param_count: u8,
    pub param_version: u8,
}
