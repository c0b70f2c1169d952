//!
//! A bus peer and its parameter poll scheduler.
//!
//! The bus is half-duplex and devices answer slowly, so the scheduler
//! emits at most one PARAM_READ per poll period and credits most of the
//! period back when the request is answered. Selection order: the focused
//! folder itself when stale, then the first child that needs creating or
//! has chunks outstanding, then the child that has gone longest without a
//! refresh.
//!

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crsf_frame::{Frame, msg_type};

use crate::error::{MenuError, Result};
use crate::param::Parameter;
use crate::value::ParamValue;

/// Gap between PARAM_READ polls towards one device.
pub const POLL_PERIOD: Duration = Duration::from_millis(2000);
/// Fraction of the poll period credited back when a poll is answered.
pub const RESPONSE_SPEEDUP: f64 = 0.95;
/// Re-read interval for the focused folder entry itself.
pub const FOLDER_REFRESH: Duration = Duration::from_secs(10);
/// An incomplete parameter older than this is recreated from scratch.
pub const PARAM_TIMEOUT: Duration = Duration::from_secs(120);
/// A device seen within this window counts as online.
pub const ONLINE_THRESHOLD: Duration = Duration::from_secs(30);
/// Devices quiet for longer than this are evicted from the registry.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Identity parsed out of a DEVICE_INFO frame, owned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub serial: u32,
    pub hardware_id: u32,
    pub firmware_id: u32,
    pub param_count: u8,
    pub param_version: u8,
}

impl Identity {
    /// Field-wise comparison against a freshly parsed DEVICE_INFO.
    pub fn matches(&self, wire: &crsf_frame::DeviceIdentity<'_>) -> bool {
        self.name == wire.name
            && self.serial == wire.serial
            && self.hardware_id == wire.hardware_id
            && self.firmware_id == wire.firmware_id
            && self.param_count == wire.param_count
            && self.param_version == wire.param_version
    }
}

impl From<crsf_frame::DeviceIdentity<'_>> for Identity {
    fn from(wire: crsf_frame::DeviceIdentity<'_>) -> Self {
        Self {
            name: wire.name.to_owned(),
            serial: wire.serial,
            hardware_id: wire.hardware_id,
            firmware_id: wire.firmware_id,
            param_count: wire.param_count,
            param_version: wire.param_version,
        }
    }
}

///
/// Everything known about one device on the bus: identity, liveness and
/// the mirrored parameter menu. Slot 0 of the menu is the root folder.
///
#[derive(Debug)]
pub struct Device {
    origin: u8,
    identity: Identity,
    last_seen: Instant,
    last_read_at: Option<Instant>,
    last_read_index: Option<u8>,
    menu: Vec<Option<Parameter>>,
}

impl Device {
    /// Create a device from the DEVICE_INFO frame that announced it.
    pub fn from_frame(frame: &Frame, now: Instant) -> Result<Self> {
        let wire = frame.device_identity()?;
        let origin = frame
            .origin()
            .ok_or(crsf_frame::Error::WrongFrameType { found: frame.frame_type() })?;
        let identity = Identity::from(wire);
        let menu = (0..identity.param_count as usize + 1).map(|_| None).collect();
        Ok(Self {
            origin,
            identity,
            last_seen: now,
            last_read_at: None,
            last_read_index: None,
            menu,
        })
    }

    pub fn origin(&self) -> u8 {
        self.origin
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn param_count(&self) -> u8 {
        self.identity.param_count
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn is_online(&self, now: Instant) -> bool {
        now.duration_since(self.last_seen) <= ONLINE_THRESHOLD
    }

    /// Record a fresh DEVICE_INFO sighting.
    pub fn touch(&mut self, now: Instant) {
        self.last_seen = now;
    }

    pub fn param(&self, index: u8) -> Option<&Parameter> {
        self.menu.get(index as usize).and_then(Option::as_ref)
    }

    /// Every parameter slot that currently holds an entry.
    pub fn params(&self) -> impl Iterator<Item = &Parameter> {
        self.menu.iter().flatten()
    }

    ///
    /// Emit at most one PARAM_READ towards this device, aimed at whatever
    /// entry under `folder` most needs refreshing. Returns `Ok(None)` when
    /// the poll period has not elapsed or nothing needs asking.
    ///
    /// # Errors
    ///
    /// `InvalidType` when the focused entry decoded as something other
    /// than a folder; the caller is expected to fall back to the root.
    ///
    pub fn poll(&mut self, folder: u8, now: Instant, local: u8) -> Result<Option<Frame>> {
        let slot = folder as usize;
        if slot >= self.menu.len() {
            warn!(device = self.origin, folder, "poll outside menu bounds");
            return Ok(None);
        }
        if let Some(last) = self.last_read_at {
            if now.duration_since(last) < POLL_PERIOD {
                return Ok(None);
            }
        }
        self.last_read_at = Some(now);

        if self.menu[slot].is_none() {
            self.menu[slot] = Some(Parameter::new(folder, now));
        }
        let (refresh_due, children) = {
            let Some(focused) = self.menu[slot].as_ref() else { return Ok(None) };
            if focused.is_complete() && !focused.is_folder() {
                return Err(MenuError::InvalidType { param: folder });
            }
            let due = focused
                .obtained_at()
                .is_none_or(|at| now.duration_since(at) > FOLDER_REFRESH);
            let children = match focused.value() {
                Some(ParamValue::Folder { children }) => children.clone(),
                _ => Vec::new(),
            };
            (due, children)
        };

        let target = if refresh_due { Some(folder) } else { self.select_child(&children, now) };
        let Some(target) = target else { return Ok(None) };

        let frame = match &self.menu[target as usize] {
            Some(param) => param.read_frame(self.origin, local)?,
            None => return Ok(None),
        };
        self.last_read_index = Some(target);
        debug!(device = self.origin, param = target, "requesting parameter");
        Ok(Some(frame))
    }

    ///
    /// Pick the child most in need of a read: first one without a slot or
    /// expired without completing (recreated on the spot), then one with
    /// chunks outstanding, then the one refreshed longest ago. Entries
    /// never obtained at all sort before any obtained one.
    ///
    fn select_child(&mut self, children: &[u8], now: Instant) -> Option<u8> {
        let mut oldest: Option<(u8, Option<Instant>)> = None;
        for &child in children {
            let slot = child as usize;
            if slot >= self.menu.len() {
                continue;
            }
            match &self.menu[slot] {
                None => {
                    self.menu[slot] = Some(Parameter::new(child, now));
                    return Some(child);
                }
                Some(param)
                    if !param.is_complete()
                        && now.duration_since(param.created_at()) > PARAM_TIMEOUT =>
                {
                    self.menu[slot] = Some(Parameter::new(child, now));
                    return Some(child);
                }
                Some(param) if param.has_missing_chunks() => {
                    return Some(child);
                }
                Some(param) => {
                    let freshness = param.obtained_at();
                    if oldest.as_ref().is_none_or(|(_, best)| freshness < *best) {
                        oldest = Some((child, freshness));
                    }
                }
            }
        }
        oldest.map(|(child, _)| child)
    }

    ///
    /// Route a PARAM_ENTRY frame from this device to its parameter. A
    /// reply to the outstanding request compresses the poll period so the
    /// next read goes out almost immediately. Indices without a slot are
    /// ignored.
    ///
    pub fn handle_param_entry(&mut self, frame: &Frame, now: Instant) -> Result<()> {
        let payload = frame.payload();
        if frame.frame_type() != msg_type::PARAM_ENTRY || payload.len() < 2 {
            return Err(MenuError::MalformedEntry { at: payload.len() });
        }
        let index = payload[0];
        if self.last_read_index == Some(index) {
            if let Some(last) = self.last_read_at {
                let credit = POLL_PERIOD.mul_f64(RESPONSE_SPEEDUP);
                self.last_read_at = last.checked_sub(credit).or(Some(last));
            }
        }
        match self.menu.get_mut(index as usize) {
            Some(slot) => {
                let param = slot.get_or_insert_with(|| Parameter::new(index, now));
                param.process_entry(payload, now).map(|_| ())
            }
            // indices outside the advertised table are ignored
            None => Ok(()),
        }
    }
}
