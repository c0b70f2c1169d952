//!
//! Human-readable explanations of selected frame types.
//!
//! Pure rendering over the frame plus a little rolling state: LQI history
//! for the link quality averages and arrival times for PPM pacing. The
//! menu engine is not involved; the INFO peek here decodes just enough of
//! a parameter entry to print it.
//!

use std::collections::VecDeque;
use std::fmt::Write;
use std::time::Instant;

use crsf_frame::telemetry::{LinkStats, LogRecord, RcChannels};
use crsf_frame::{Frame, msg_type};

/// Samples in the short LQI window, roughly 90 s of LINK_STATS.
const SHORT_HIST: usize = 451;
/// Samples in the long LQI window.
const LONG_HIST: usize = 10 * SHORT_HIST;
/// PPM arrivals kept for pacing statistics.
const PPM_HIST: usize = 500;

/// Rolling context for frame explanations.
pub struct Explainer {
    uplink_lqi: VecDeque<(Instant, u8)>,
    downlink_lqi: VecDeque<(Instant, u8)>,
    ppm_times: VecDeque<Instant>,
}

impl Explainer {
    pub fn new() -> Self {
        Self {
            uplink_lqi: VecDeque::new(),
            downlink_lqi: VecDeque::new(),
            ppm_times: VecDeque::new(),
        }
    }

    ///
    /// Extra explanatory text for `frame`, or an empty string for frame
    /// types that need none. The text starts with a newline so it can be
    /// appended directly to a log line.
    ///
    pub fn explain(&mut self, frame: &Frame, now: Instant) -> String {
        let mut text = String::new();
        match frame.frame_type() {
            msg_type::PPM => self.explain_ppm(frame, now, &mut text),
            msg_type::PPM3 => text.push_str("\n  packed v3 channels (not decoded)"),
            msg_type::LINK_STATS => self.explain_link_stats(frame, now, &mut text),
            msg_type::DEVICE_INFO => explain_device_info(frame, &mut text),
            msg_type::PARAM_ENTRY => explain_info_entry(frame, &mut text),
            msg_type::LOG => explain_log(frame, &mut text),
            _ => {}
        }
        text
    }

    fn explain_ppm(&mut self, frame: &Frame, now: Instant, text: &mut String) {
        let Ok(channels) = RcChannels::unmarshal(frame.payload()) else { return };
        let us = channels.microseconds();
        let list = us.map(|v| v.to_string()).join(", ");
        let _ = write!(text, "\n  CH1..16: {list}");

        if let Some(&last) = self.ppm_times.back() {
            let gap = now.duration_since(last).as_secs_f64() * 1000.0;
            let _ = write!(text, " (+{gap:.2} ms");
            if let Some(&first) = self.ppm_times.front() {
                let span = now.duration_since(first).as_secs_f64() * 1000.0;
                let mean = span / self.ppm_times.len() as f64;
                let _ = write!(text, ", mean {mean:.2} ms");
            }
            text.push(')');
        }
        self.ppm_times.push_back(now);
        while self.ppm_times.len() > PPM_HIST {
            self.ppm_times.pop_front();
        }
    }

    fn explain_link_stats(&mut self, frame: &Frame, now: Instant, text: &mut String) {
        let Ok(stats) = LinkStats::unmarshal(frame.payload()) else { return };

        self.uplink_lqi.push_back((now, stats.uplink_lqi));
        self.downlink_lqi.push_back((now, stats.downlink_lqi));
        while self.uplink_lqi.len() > LONG_HIST {
            self.uplink_lqi.pop_front();
        }
        while self.downlink_lqi.len() > LONG_HIST {
            self.downlink_lqi.pop_front();
        }

        let _ = write!(
            text,
            "\n    Uplink: RSSI=-{}/-{}, LQI={:3}%, SNR={}, Ant.={}, RFmode={}, RFpwr={}; \
             Downlink: RSSI=-{}, LQI={:3}%, SNR={}",
            stats.uplink_rssi_1,
            stats.uplink_rssi_2,
            stats.uplink_lqi,
            stats.uplink_snr,
            stats.antenna,
            stats.rf_mode,
            stats.tx_power,
            stats.downlink_rssi,
            stats.downlink_lqi,
            stats.downlink_snr,
        );

        if self.uplink_lqi.len() > 1 && self.downlink_lqi.len() > 1 {
            let _ = write!(
                text,
                "\n    History: Uplink LQI={}, {}; Downlink LQI={}, {}",
                window_summary(&self.uplink_lqi, SHORT_HIST),
                window_summary(&self.uplink_lqi, LONG_HIST),
                window_summary(&self.downlink_lqi, SHORT_HIST),
                window_summary(&self.downlink_lqi, LONG_HIST),
            );
        }
    }
}

impl Default for Explainer {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean LQI and time span over the most recent `window` samples.
fn window_summary(history: &VecDeque<(Instant, u8)>, window: usize) -> String {
    let start = history.len().saturating_sub(window);
    let count = history.len() - start;
    let sum: u32 = history.iter().skip(start).map(|&(_, lqi)| lqi as u32).sum();
    let mean = sum as f64 / count as f64;
    let span = match (history.get(start), history.back()) {
        (Some(&(first, _)), Some(&(last, _))) => last.duration_since(first).as_secs_f64(),
        _ => 0.0,
    };
    if mean >= 100.0 {
        format!("100/{span:.1}")
    } else {
        format!("{mean:.2}/{span:.1}")
    }
}

fn explain_device_info(frame: &Frame, text: &mut String) {
    let Ok(identity) = frame.device_identity() else { return };
    let _ = write!(
        text,
        "\n  Device: {}, S/N=0x{:x}, HW_ID=0x{:x}, SW_ID=0x{:x}, param count={}, v={}",
        identity.name,
        identity.serial,
        identity.hardware_id,
        identity.firmware_id,
        identity.param_count,
        identity.param_version,
    );
}

///
/// Peek into a PARAM_ENTRY and print it when it is a single-frame INFO
/// entry: two NUL-terminated strings after the parent and type bytes.
///
fn explain_info_entry(frame: &Frame, text: &mut String) {
    let payload = frame.payload();
    if payload.len() < 4 || payload[1] != 0 || payload[3] & 0x7F != 0x0C {
        return;
    }
    let mut fields = payload[4..].split(|&b| b == 0);
    let name = fields.next().and_then(|f| std::str::from_utf8(f).ok());
    let value = fields.next().and_then(|f| std::str::from_utf8(f).ok());
    if let (Some(name), Some(value)) = (name, value) {
        let _ = write!(text, "\n  {name}: {value}");
    }
}

fn explain_log(frame: &Frame, text: &mut String) {
    let Ok(record) = LogRecord::unmarshal(frame.payload()) else { return };
    let _ = write!(text, "\n    tick {} ({} ms): ", record.ticks, record.millis());
    match record.text {
        Some(message) => text.push_str(message),
        None => {
            for (i, byte) in record.raw.iter().enumerate() {
                if i > 0 {
                    text.push(' ');
                }
                let _ = write!(text, "{byte:02x}");
            }
        }
    }
}

/// Print one received or sent frame with its explanation.
pub fn log_frame(header: &str, frame: &Frame, explainer: &mut Explainer) {
    println!("{header}: {frame}{}", explainer.explain(frame, Instant::now()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crsf_frame::addr;
    use std::time::Duration;

    #[test]
    fn explains_link_stats_with_history() {
        let mut explainer = Explainer::new();
        let frame =
            Frame::new(&[msg_type::LINK_STATS, 50, 60, 95, 10, 1, 2, 25, 45, 92, 8]).unwrap();

        let t0 = Instant::now();
        let first = explainer.explain(&frame, t0);
        assert!(first.contains("Uplink: RSSI=-50/-60"));
        assert!(first.contains("LQI= 95%"));
        assert!(!first.contains("History"));

        let second = explainer.explain(&frame, t0 + Duration::from_millis(200));
        assert!(second.contains("History: Uplink LQI=95.00/0.2"));
    }

    #[test]
    fn explains_ppm_channels_and_pacing() {
        let mut explainer = Explainer::new();
        let mut body = vec![msg_type::PPM];
        body.extend_from_slice(&[
            0xE0, 0x63, 0xC5, 0xC4, 0xB9, 0x0B, 0x3E, 0xF0, 0x81, 0x0F, 0x7C, 0xE8, 0xFB, 0x1F,
            0x7D, 0xA0, 0x0F, 0x80, 0x00, 0xFC, 0x1F, 0x80,
        ]);
        let frame = Frame::new(&body).unwrap();

        let t0 = Instant::now();
        let first = explainer.explain(&frame, t0);
        assert!(first.starts_with("\n  CH1..16: 1500, 987, 2011"));
        assert!(!first.contains("ms"));

        let second = explainer.explain(&frame, t0 + Duration::from_millis(20));
        assert!(second.contains("+20.00 ms"));
    }

    #[test]
    fn explains_info_param_entry() {
        let mut explainer = Explainer::new();
        let mut body = vec![msg_type::PARAM_ENTRY, addr::FC, addr::TX, 3, 0, 0, 0x0C];
        body.extend_from_slice(b"Firmware\01.23\0");
        let frame = Frame::new(&body).unwrap();
        assert_eq!(explainer.explain(&frame, Instant::now()), "\n  Firmware: 1.23");
    }

    #[test]
    fn explains_log_frames() {
        let mut explainer = Explainer::new();
        let mut body = vec![msg_type::LOG, addr::BROADCAST, addr::TX];
        body.extend_from_slice(&1_000_000u32.to_be_bytes());
        body.extend_from_slice(b"armed\0");
        let frame = Frame::new(&body).unwrap();
        let text = explainer.explain(&frame, Instant::now());
        assert_eq!(text, "\n    tick 1000000 (50 ms): armed");
    }

    #[test]
    fn explains_device_info() {
        let mut explainer = Explainer::new();
        let identity = crsf_frame::DeviceIdentity {
            name: "Micro TX",
            serial: 0x123,
            hardware_id: 0x456,
            firmware_id: 0x789,
            param_count: 9,
            param_version: 1,
        };
        let frame = Frame::device_info(addr::BROADCAST, addr::TX, &identity).unwrap();
        let text = explainer.explain(&frame, Instant::now());
        assert!(text.contains("Device: Micro TX, S/N=0x123"));
        assert!(text.contains("param count=9"));
    }

    #[test]
    fn stays_quiet_for_plain_frames() {
        let mut explainer = Explainer::new();
        let ping = Frame::ping(addr::BROADCAST, addr::FC).unwrap();
        assert_eq!(explainer.explain(&ping, Instant::now()), "");
    }
}
