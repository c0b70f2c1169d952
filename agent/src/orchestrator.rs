//!
//! The event loop wiring a carrier to the device registry.
//!
//! One logical thread serialises everything: frames are drained from the
//! carrier and dispatched, eviction runs, the poll scheduler of the
//! focused device gets its turn, and a keep-alive PING goes out every few
//! seconds. Transport failures propagate to the caller, whose job is to
//! reconnect from scratch.
//!

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crsf_frame::{Frame, addr};
use crsf_menu::{MenuError, Registry};

use crate::transport::{Connection, TransportError};

/// Keep-alive interval; intermediaries reset links that stay quiet.
pub const PING_PERIOD: Duration = Duration::from_secs(5);

/// Event-loop nap when the bus produced nothing.
const IDLE_SLEEP: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy)]
struct Focus {
    device: u8,
    folder: u8,
}

pub struct Orchestrator<C> {
    conn: C,
    registry: Registry,
    last_ping: Option<Instant>,
    focus: Option<Focus>,
}

impl<C: Connection> Orchestrator<C> {
    pub fn new(conn: C, local: u8) -> Self {
        Self { conn, registry: Registry::new(local), last_ping: None, focus: None }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn connection_mut(&mut self) -> &mut C {
        &mut self.conn
    }

    /// Point the poll scheduler at one folder of one device.
    pub fn focus(&mut self, device: u8, folder: u8) {
        self.focus = Some(Focus { device, folder });
    }

    pub fn clear_focus(&mut self) {
        self.focus = None;
    }

    pub fn focused(&self) -> Option<(u8, u8)> {
        self.focus.map(|f| (f.device, f.folder))
    }

    ///
    /// One pass of the event loop: drain the carrier, dispatch every
    /// frame, evict idle devices, poll the focused folder and keep the
    /// link alive. Returns the frames received during the pass.
    ///
    pub fn run_once(&mut self, now: Instant) -> Result<Vec<Frame>, TransportError> {
        let mut seen = Vec::new();
        while let Some(frame) = self.conn.read_frame()? {
            match self.registry.handle_frame(&frame, now) {
                Ok(Some(reply)) => self.conn.write_frame(&reply)?,
                Ok(None) => {}
                Err(e) => warn!("frame dropped: {e}"),
            }
            seen.push(frame);
        }

        self.registry.tick(now);

        if let Some(Focus { device, folder }) = self.focus {
            let local = self.registry.local_addr();
            match self.registry.device_mut(device) {
                None => {
                    // the device fell off the bus; back to the top level
                    self.focus = None;
                }
                Some(dev) => match dev.poll(folder, now, local) {
                    Ok(Some(frame)) => self.conn.write_frame(&frame)?,
                    Ok(None) => {}
                    Err(MenuError::InvalidType { param }) => {
                        warn!(param, "focused entry is not a folder; dropping focus");
                        self.focus = None;
                    }
                    Err(e) => warn!("poll failed: {e}"),
                },
            }
        }

        let ping_due = self.last_ping.is_none_or(|at| now.duration_since(at) >= PING_PERIOD);
        if ping_due {
            self.last_ping = Some(now);
            let ping = Frame::ping(addr::BROADCAST, self.registry.local_addr())?;
            debug!("sending {ping}");
            self.conn.write_frame(&ping)?;
        }

        Ok(seen)
    }

    ///
    /// Run until the carrier fails, handing every received frame to
    /// `on_frame`. Sleeps briefly whenever a pass produced nothing.
    ///
    pub fn run(&mut self, mut on_frame: impl FnMut(&Frame)) -> Result<(), TransportError> {
        loop {
            let frames = self.run_once(Instant::now())?;
            for frame in &frames {
                on_frame(frame);
            }
            if frames.is_empty() {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryConnection;
    use crsf_frame::{DeviceIdentity, msg_type};

    // the same identity the in-memory carrier answers pings with, so the
    // canned replies refresh the device instead of rebinding it
    fn device_info(origin: u8) -> Frame {
        let identity = DeviceIdentity {
            name: "Test Device",
            serial: 0x01020304,
            hardware_id: 0x05060708,
            firmware_id: 0x090A0B0C,
            param_count: 5,
            param_version: 1,
        };
        Frame::device_info(addr::BROADCAST, origin, &identity).unwrap()
    }

    #[test]
    fn registers_devices_and_pings() {
        let mut conn = MemoryConnection::new();
        conn.push_frame(device_info(addr::TX));
        let mut orchestrator = Orchestrator::new(conn, addr::FC);

        let t0 = Instant::now() + Duration::from_secs(3600);
        let seen = orchestrator.run_once(t0).unwrap();
        assert_eq!(seen.len(), 1);
        assert!(orchestrator.registry().device(addr::TX).is_some());

        // the first pass broadcasts a keep-alive ping
        let sent = orchestrator.connection().sent();
        assert_eq!(sent.last().map(Frame::frame_type), Some(msg_type::PING));

        // within the ping period no second ping goes out, but the canned
        // reply to the first one is read back and refreshes the device
        let seen = orchestrator.run_once(t0 + Duration::from_secs(1)).unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].frame_type(), msg_type::DEVICE_INFO);
        assert_eq!(orchestrator.connection().sent().len(), 1);
    }

    #[test]
    fn answers_ping_with_local_identity() {
        let mut conn = MemoryConnection::new();
        conn.push_frame(Frame::ping(addr::BROADCAST, addr::REMOTE).unwrap());
        let mut orchestrator = Orchestrator::new(conn, addr::FC);

        let t0 = Instant::now() + Duration::from_secs(3600);
        orchestrator.run_once(t0).unwrap();

        let sent = orchestrator.connection().sent();
        let reply = &sent[0];
        assert_eq!(reply.frame_type(), msg_type::DEVICE_INFO);
        assert_eq!(reply.destination(), Some(addr::REMOTE));
        assert_eq!(reply.device_identity().unwrap().name, crsf_menu::LOCAL_NAME);
    }

    #[test]
    fn focused_device_gets_polled() {
        let mut conn = MemoryConnection::new();
        conn.push_frame(device_info(addr::TX));
        let mut orchestrator = Orchestrator::new(conn, addr::FC);
        orchestrator.focus(addr::TX, 0);

        let t0 = Instant::now() + Duration::from_secs(3600);
        orchestrator.run_once(t0).unwrap();

        let sent = orchestrator.connection().sent();
        assert!(sent.iter().any(|f| f.frame_type() == msg_type::PARAM_READ));
        assert_eq!(orchestrator.focused(), Some((addr::TX, 0)));
    }

    #[test]
    fn focus_drops_when_entry_is_not_a_folder() {
        let mut conn = MemoryConnection::new();
        conn.push_frame(device_info(addr::TX));
        let mut orchestrator = Orchestrator::new(conn, addr::FC);
        orchestrator.focus(addr::TX, 1);

        let t0 = Instant::now() + Duration::from_secs(3600);
        orchestrator.run_once(t0).unwrap();

        // the device answers the read with an INFO entry, not a folder
        let mut body = vec![msg_type::PARAM_ENTRY, addr::FC, addr::TX, 1, 0, 0, 0x0C];
        body.extend_from_slice(b"Version\00.1\0");
        orchestrator.connection_mut().push_frame(Frame::new(&body).unwrap());

        orchestrator.run_once(t0 + Duration::from_millis(200)).unwrap();
        orchestrator.run_once(t0 + Duration::from_millis(400)).unwrap();
        assert_eq!(orchestrator.focused(), None);
    }

    #[test]
    fn focus_drops_when_device_is_evicted() {
        let mut conn = MemoryConnection::new();
        conn.push_frame(device_info(addr::TX));
        let mut orchestrator = Orchestrator::new(conn, addr::FC);
        orchestrator.focus(addr::TX, 0);

        let t0 = Instant::now() + Duration::from_secs(3600);
        orchestrator.run_once(t0).unwrap();
        // drain the canned ping reply so the final pass sees a quiet bus
        orchestrator.run_once(t0 + Duration::from_secs(1)).unwrap();
        orchestrator.run_once(t0 + Duration::from_secs(120)).unwrap();
        assert!(orchestrator.registry().is_empty());
        assert_eq!(orchestrator.focused(), None);
    }
}
