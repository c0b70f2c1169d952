//!
//! The registry of devices observed on the bus.
//!
//! Keyed by origin address. A device is created on its first valid
//! DEVICE_INFO, re-bound when a later announcement changes any identity
//! field, and evicted once it has been quiet past the idle timeout. Pings
//! are answered on behalf of the local pseudo-device so intermediaries see
//! the client as a live bus participant.
//!

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crsf_frame::{DeviceIdentity, Frame, addr, msg_type};

use crate::device::{Device, IDLE_TIMEOUT};
use crate::error::Result;

/// Identity advertised when a PING arrives.
pub const LOCAL_NAME: &str = "Agent Python";
pub const LOCAL_SERIAL: u32 = 0x1234_5678;
pub const LOCAL_HARDWARE_ID: u32 = 0x0123_4502;
pub const LOCAL_FIRMWARE_ID: u32 = 0x0000_1111;

/// Every device currently alive on the bus.
#[derive(Debug)]
pub struct Registry {
    local: u8,
    devices: HashMap<u8, Device>,
}

impl Registry {
    /// A registry speaking from `local`, the client's own bus address.
    pub fn new(local: u8) -> Self {
        Self { local, devices: HashMap::new() }
    }

    pub fn local_addr(&self) -> u8 {
        self.local
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn device(&self, origin: u8) -> Option<&Device> {
        self.devices.get(&origin)
    }

    pub fn device_mut(&mut self, origin: u8) -> Option<&mut Device> {
        self.devices.get_mut(&origin)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    ///
    /// Dispatch one inbound frame. PING produces the DEVICE_INFO reply to
    /// send; DEVICE_INFO and PARAM_ENTRY update registry state; everything
    /// else is ignored.
    ///
    pub fn handle_frame(&mut self, frame: &Frame, now: Instant) -> Result<Option<Frame>> {
        match frame.frame_type() {
            msg_type::PING => {
                let dest = frame.origin().unwrap_or(addr::BROADCAST);
                Ok(Some(self.local_device_info(dest)?))
            }
            msg_type::DEVICE_INFO => {
                self.upsert(frame, now)?;
                Ok(None)
            }
            msg_type::PARAM_ENTRY => {
                let Some(origin) = frame.origin() else { return Ok(None) };
                match self.devices.get_mut(&origin) {
                    Some(device) => device.handle_param_entry(frame, now)?,
                    None => debug!(origin, "parameter entry from unknown device"),
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn upsert(&mut self, frame: &Frame, now: Instant) -> Result<()> {
        let wire = frame.device_identity()?;
        let Some(origin) = frame.origin() else {
            warn!("device info without an origin address");
            return Ok(());
        };
        if let Some(existing) = self.devices.get_mut(&origin) {
            if existing.identity().matches(&wire) {
                existing.touch(now);
                return Ok(());
            }
            info!(origin, name = wire.name, "device identity changed; rebinding");
        } else {
            info!(origin, name = wire.name, "device registered");
        }
        self.devices.insert(origin, Device::from_frame(frame, now)?);
        Ok(())
    }

    /// Drop devices that have been quiet past the idle timeout.
    pub fn tick(&mut self, now: Instant) {
        self.devices.retain(|origin, device| {
            let keep = now.duration_since(device.last_seen()) < IDLE_TIMEOUT;
            if !keep {
                info!(origin = *origin, name = device.name(), "device evicted");
            }
            keep
        });
    }

    /// The DEVICE_INFO frame advertising this client to `dest`.
    pub fn local_device_info(&self, dest: u8) -> Result<Frame> {
        let identity = DeviceIdentity {
            name: LOCAL_NAME,
            serial: LOCAL_SERIAL,
            hardware_id: LOCAL_HARDWARE_ID,
            firmware_id: LOCAL_FIRMWARE_ID,
            param_count: 0,
            param_version: 1,
        };
        Ok(Frame::device_info(dest, self.local, &identity)?)
    }
}
