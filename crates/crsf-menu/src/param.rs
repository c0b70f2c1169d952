//!
//! A single menu parameter: chunk reassembly and kind-specific decoding.
//!
//! Entries larger than one frame arrive as a run of PARAM_ENTRY frames
//! with a decreasing `chunks_remaining` counter. The reassembly buffer is
//! sized by the first chunk and invalidated the moment the run misbehaves:
//! a duplicated counter, a stale slot or a foreign parameter index all
//! clear the buffer so the scheduler can start the read over.
//!

use std::time::Instant;

use tracing::{debug, warn};

use crsf_frame::Frame;

use crate::error::{MenuError, Result};
use crate::value::{CommandStatus, ParamKind, ParamValue, WriteValue};

/// A single named, typed entry in a device's configuration menu.
#[derive(Debug, Clone)]
pub struct Parameter {
    index: u8,
    parent_folder: u8,
    name: String,
    hidden: bool,
    value: Option<ParamValue>,
    chunks: Vec<Option<Vec<u8>>>,
    created_at: Instant,
    obtained_at: Option<Instant>,
}

impl Parameter {
    pub fn new(index: u8, now: Instant) -> Self {
        Self {
            index,
            parent_folder: 0,
            name: String::new(),
            hidden: false,
            value: None,
            chunks: Vec::new(),
            created_at: now,
            obtained_at: None,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// The entry name, once decoded.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent_folder(&self) -> u8 {
        self.parent_folder
    }

    /// Top bit of the wire type byte: hidden from ordinary menus.
    pub fn hidden(&self) -> bool {
        self.hidden
    }

    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    pub fn kind(&self) -> Option<ParamKind> {
        self.value.as_ref().map(ParamValue::kind)
    }

    pub fn is_folder(&self) -> bool {
        self.kind() == Some(ParamKind::Folder)
    }

    /// Whether a complete entry has been decoded.
    pub fn is_complete(&self) -> bool {
        self.obtained_at.is_some()
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// When the entry was last decoded in full.
    pub fn obtained_at(&self) -> Option<Instant> {
        self.obtained_at
    }

    /// Whether a reassembly is underway with slots still unfilled.
    pub fn has_missing_chunks(&self) -> bool {
        self.chunks.iter().any(Option::is_none)
    }

    /// The chunk to request next: the first unfilled slot, else the start.
    pub fn next_chunk(&self) -> u8 {
        self.chunks.iter().position(Option::is_none).unwrap_or(0) as u8
    }

    /// A PARAM_READ requesting this entry's next missing chunk.
    pub fn read_frame(&self, device: u8, local: u8) -> Result<Frame> {
        Ok(Frame::param_read(device, local, self.index, self.next_chunk())?)
    }

    ///
    /// Ingest one PARAM_ENTRY payload addressed to this parameter.
    ///
    /// Returns `Ok(true)` once a complete entry has been decoded, and
    /// `Ok(false)` while more chunks are expected.
    ///
    /// # Errors
    ///
    /// `ChunkSequence` when the chunk run misbehaves (the buffer is
    /// cleared), `MalformedEntry` when the assembled entry fails a
    /// structural check. Both leave the previously decoded value intact.
    ///
    pub fn process_entry(&mut self, payload: &[u8], now: Instant) -> Result<bool> {
        if payload.len() < 2 {
            return Err(MenuError::MalformedEntry { at: payload.len() });
        }
        let remaining = payload[1] as usize;

        if remaining > 0 {
            if self.chunks.is_empty() {
                self.chunks = vec![None; remaining + 1];
            }
            // counting up towards the terminal chunk
            let slot = self.chunks.len().checked_sub(remaining + 1);
            match slot {
                Some(slot) if self.chunks[slot].is_none() => {
                    self.chunks[slot] = Some(payload.to_vec());
                    Ok(false)
                }
                _ => {
                    self.chunks.clear();
                    Err(MenuError::ChunkSequence { param: self.index })
                }
            }
        } else if self.chunks.is_empty() {
            // the whole entry fits one frame
            self.decode(payload, false, now)?;
            Ok(true)
        } else {
            match self.chunks.last_mut() {
                Some(slot) if slot.is_none() => *slot = Some(payload.to_vec()),
                _ => {
                    self.chunks.clear();
                    return Err(MenuError::ChunkSequence { param: self.index });
                }
            }
            let assembled = self.reassemble()?;
            self.decode(&assembled, true, now)?;
            Ok(true)
        }
    }

    ///
    /// Join the buffered chunks, verifying that every slot is filled, the
    /// recorded counters descend strictly to zero and every chunk names
    /// this parameter. The buffer is consumed either way.
    ///
    fn reassemble(&mut self) -> Result<Vec<u8>> {
        let count = self.chunks.len();
        let consistent = self.chunks.iter().enumerate().all(|(i, chunk)| match chunk {
            Some(chunk) => {
                chunk.len() >= 2 && chunk[0] == self.index && chunk[1] as usize == count - 1 - i
            }
            None => false,
        });
        if !consistent {
            self.chunks.clear();
            return Err(MenuError::ChunkSequence { param: self.index });
        }
        let mut entry = vec![self.index, 0];
        for chunk in self.chunks.drain(..).flatten() {
            entry.extend_from_slice(&chunk[2..]);
        }
        Ok(entry)
    }

    fn decode(&mut self, entry: &[u8], chunked: bool, now: Instant) -> Result<()> {
        if entry.len() < 4 {
            return Err(MenuError::MalformedEntry { at: entry.len() });
        }
        let parent_folder = entry[2];
        let type_byte = entry[3];
        let hidden = type_byte & 0x80 != 0;
        let kind = ParamKind::try_from(type_byte & 0x7F)
            .map_err(|_| MenuError::MalformedEntry { at: 3 })?;

        let nul = 4 + find_nul(&entry[4..])?;
        let name = utf8_field(&entry[4..nul])?;
        let tail = &entry[nul + 1..];

        let value = match kind {
            ParamKind::Folder => {
                if chunked {
                    // child lists never span frames; devices that try are broken
                    warn!(param = self.index, "multi-chunk folder entry rejected");
                    return Err(MenuError::MalformedEntry { at: nul + 1 });
                }
                let end = tail
                    .iter()
                    .position(|&b| b == 0xFF)
                    .ok_or(MenuError::MalformedEntry { at: entry.len() })?;
                ParamValue::Folder { children: tail[..end].to_vec() }
            }
            ParamKind::Command => {
                if tail.len() < 2 {
                    return Err(MenuError::MalformedEntry { at: entry.len() });
                }
                let status = CommandStatus::try_from(tail[0])
                    .map_err(|_| MenuError::MalformedEntry { at: nul + 1 })?;
                let timeout = tail[1] as f32 / 10.0;
                let info = utf8_field(&tail[2..2 + find_nul(&tail[2..])?])?;
                ParamValue::Command { status, timeout, info }
            }
            ParamKind::Float => {
                if tail.len() < 21 {
                    return Err(MenuError::MalformedEntry { at: entry.len() });
                }
                let word = |r: &[u8]| i32::from_be_bytes([r[0], r[1], r[2], r[3]]);
                let unit = utf8_field(&tail[21..21 + find_nul(&tail[21..])?])?;
                ParamValue::Float {
                    value: word(&tail[0..4]),
                    min: word(&tail[4..8]),
                    max: word(&tail[8..12]),
                    default: word(&tail[12..16]),
                    decimal_point: tail[16],
                    step_size: word(&tail[17..21]),
                    unit,
                }
            }
            ParamKind::String => {
                let end = find_nul(tail)?;
                let value = utf8_field(&tail[..end])?;
                let max_length =
                    *tail.get(end + 1).ok_or(MenuError::MalformedEntry { at: entry.len() })?;
                ParamValue::StringInput { value, max_length }
            }
            ParamKind::Info => {
                let value = utf8_field(&tail[..find_nul(tail)?])?;
                ParamValue::Info { value }
            }
            ParamKind::TextSelection => {
                let end = find_nul(tail)?;
                let options =
                    utf8_field(&tail[..end])?.split(';').map(str::to_owned).collect();
                let rest = &tail[end + 1..];
                if rest.len() < 4 {
                    return Err(MenuError::MalformedEntry { at: entry.len() });
                }
                ParamValue::Selection {
                    options,
                    value: rest[0],
                    min: rest[1],
                    max: rest[2],
                    default: rest[3],
                }
            }
            _ => ParamValue::Numeric { kind },
        };

        self.parent_folder = parent_folder;
        self.hidden = hidden;
        self.name = name;
        self.value = Some(value);
        self.obtained_at = Some(now);
        debug!(param = self.index, name = %self.name, ?kind, "parameter decoded");
        Ok(())
    }

    ///
    /// Encode a user-supplied value into PARAM_WRITE payload bytes. The
    /// parameter must be fully decoded: FLOAT quantisation and range
    /// checking need the entry's metadata.
    ///
    pub fn encode_write(&self, value: WriteValue<'_>) -> Result<Vec<u8>> {
        let Some(decoded) = &self.value else {
            return Err(MenuError::NotLoaded { param: self.index });
        };
        match (decoded, value) {
            (ParamValue::Float { min, max, decimal_point, .. }, WriteValue::Float(input)) => {
                let scaled = (input * 10f64.powi(*decimal_point as i32)).round() as i64;
                if scaled < *min as i64 || scaled > *max as i64 {
                    return Err(MenuError::ValueOutOfRange {
                        value: scaled,
                        min: *min as i64,
                        max: *max as i64,
                    });
                }
                Ok((scaled as i32).to_be_bytes().to_vec())
            }
            (ParamValue::StringInput { .. }, WriteValue::Text(text)) => {
                let mut bytes = text.as_bytes().to_vec();
                bytes.push(0);
                Ok(bytes)
            }
            (ParamValue::Selection { .. }, WriteValue::Selection(index)) => Ok(vec![index]),
            (ParamValue::Command { .. }, WriteValue::Command(status)) => {
                Ok(vec![u8::from(status)])
            }
            _ => Err(MenuError::KindMismatch),
        }
    }

    /// A PARAM_WRITE carrying `value` for this entry.
    pub fn write_frame(&self, device: u8, local: u8, value: WriteValue<'_>) -> Result<Frame> {
        let bytes = self.encode_write(value)?;
        Ok(Frame::param_write(device, local, self.index, &bytes)?)
    }

    /// A FLOAT entry's raw value scaled into engineering units.
    pub fn float_value(&self) -> Option<f64> {
        match &self.value {
            Some(ParamValue::Float { value, decimal_point, .. }) => {
                Some(*value as f64 / 10f64.powi(*decimal_point as i32))
            }
            _ => None,
        }
    }
}

fn find_nul(raw: &[u8]) -> Result<usize> {
    raw.iter().position(|&b| b == 0).ok_or(MenuError::MalformedEntry { at: raw.len() })
}

fn utf8_field(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| MenuError::MalformedEntry { at: e.valid_up_to() })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(now: Instant) -> Parameter {
        Parameter::new(5, now)
    }

    /// `[param, 0, parent, type, name, NUL, tail...]`
    fn entry(param: u8, parent: u8, type_byte: u8, name: &str, tail: &[u8]) -> Vec<u8> {
        let mut payload = vec![param, 0, parent, type_byte];
        payload.extend_from_slice(name.as_bytes());
        payload.push(0);
        payload.extend_from_slice(tail);
        payload
    }

    fn float_tail() -> Vec<u8> {
        let mut tail = Vec::new();
        tail.extend_from_slice(&314i32.to_be_bytes()); // value
        tail.extend_from_slice(&0i32.to_be_bytes()); // min
        tail.extend_from_slice(&1000i32.to_be_bytes()); // max
        tail.extend_from_slice(&100i32.to_be_bytes()); // default
        tail.push(2); // decimal point
        tail.extend_from_slice(&5i32.to_be_bytes()); // step size
        tail.extend_from_slice(b"V\0");
        tail
    }

    fn float_param(now: Instant) -> Parameter {
        let mut param = base(now);
        param.process_entry(&entry(5, 0, 0x08, "Voltage", &float_tail()), now).unwrap();
        param
    }

    #[test]
    fn decodes_float_entry() {
        let now = Instant::now();
        let param = float_param(now);
        assert_eq!(param.name(), "Voltage");
        assert_eq!(param.kind(), Some(ParamKind::Float));
        assert_eq!(param.parent_folder(), 0);
        assert!(!param.hidden());
        assert_eq!(param.obtained_at(), Some(now));
        assert_eq!(
            param.value(),
            Some(&ParamValue::Float {
                value: 314,
                min: 0,
                max: 1000,
                default: 100,
                decimal_point: 2,
                step_size: 5,
                unit: "V".into(),
            })
        );
        assert_eq!(param.float_value(), Some(3.14));
    }

    #[test]
    fn decodes_folder_entry() {
        let now = Instant::now();
        let mut param = base(now);
        param.process_entry(&entry(5, 0, 0x0B, "Setup", &[1, 2, 3, 0xFF]), now).unwrap();
        assert!(param.is_folder());
        assert_eq!(param.value(), Some(&ParamValue::Folder { children: vec![1, 2, 3] }));
    }

    #[test]
    fn decodes_selection_entry() {
        let now = Instant::now();
        let mut param = base(now);
        let mut tail = b"Off;On;Auto\0".to_vec();
        tail.extend_from_slice(&[1, 0, 2, 0]);
        param.process_entry(&entry(5, 1, 0x09, "Mode", &tail), now).unwrap();
        assert_eq!(
            param.value(),
            Some(&ParamValue::Selection {
                options: vec!["Off".into(), "On".into(), "Auto".into()],
                value: 1,
                min: 0,
                max: 2,
                default: 0,
            })
        );
    }

    #[test]
    fn decodes_string_info_and_command() {
        let now = Instant::now();

        let mut string = base(now);
        string.process_entry(&entry(5, 0, 0x0A, "Callsign", b"N0CALL\0\x10"), now).unwrap();
        assert_eq!(
            string.value(),
            Some(&ParamValue::StringInput { value: "N0CALL".into(), max_length: 0x10 })
        );

        let mut info = base(now);
        info.process_entry(&entry(5, 0, 0x0C, "Firmware", b"1.23\0"), now).unwrap();
        assert_eq!(info.value(), Some(&ParamValue::Info { value: "1.23".into() }));

        let mut command = base(now);
        command.process_entry(&entry(5, 0, 0x0D, "Bind", b"\x00\x32Press to bind\0"), now).unwrap();
        assert_eq!(
            command.value(),
            Some(&ParamValue::Command {
                status: CommandStatus::Ready,
                timeout: 5.0,
                info: "Press to bind".into(),
            })
        );
    }

    #[test]
    fn records_hidden_flag_and_numeric_stub() {
        let now = Instant::now();
        let mut param = base(now);
        param.process_entry(&entry(5, 2, 0x80 | 0x02, "Spare", &[]), now).unwrap();
        assert!(param.hidden());
        assert_eq!(param.value(), Some(&ParamValue::Numeric { kind: ParamKind::Uint16 }));
        assert_eq!(param.parent_folder(), 2);
        assert!(param.is_complete());
    }

    #[test]
    fn chunked_entry_matches_single_frame_decode() {
        let now = Instant::now();
        let whole = entry(5, 0, 0x08, "Voltage", &float_tail());
        let content = &whole[2..];
        let third = content.len() / 3;

        let mut chunk0 = vec![5, 2];
        chunk0.extend_from_slice(&content[..third]);
        let mut chunk1 = vec![5, 1];
        chunk1.extend_from_slice(&content[third..2 * third]);
        let mut chunk2 = vec![5, 0];
        chunk2.extend_from_slice(&content[2 * third..]);

        let mut param = base(now);
        assert_eq!(param.process_entry(&chunk0, now).unwrap(), false);
        assert!(param.has_missing_chunks());
        assert_eq!(param.next_chunk(), 1);
        assert_eq!(param.process_entry(&chunk1, now).unwrap(), false);
        assert_eq!(param.next_chunk(), 2);
        assert_eq!(param.process_entry(&chunk2, now).unwrap(), true);

        let reference = float_param(now);
        assert_eq!(param.value(), reference.value());
        assert!(param.obtained_at().is_some());
        assert!(!param.has_missing_chunks());
    }

    #[test]
    fn duplicate_chunk_counter_clears_buffer() {
        let now = Instant::now();
        let whole = entry(5, 0, 0x08, "Voltage", &float_tail());
        let content = &whole[2..];
        let half = content.len() / 2;

        let mut chunk0 = vec![5, 1];
        chunk0.extend_from_slice(&content[..half]);
        let mut chunk1 = vec![5, 0];
        chunk1.extend_from_slice(&content[half..]);

        let mut param = base(now);
        param.process_entry(&chunk0, now).unwrap();
        // the same counter again duplicates a slot
        assert!(matches!(
            param.process_entry(&chunk0, now),
            Err(MenuError::ChunkSequence { param: 5 })
        ));
        assert!(param.chunks.is_empty());
        assert!(param.value().is_none());

        // a well-ordered run still decodes afterwards
        param.process_entry(&chunk0, now).unwrap();
        param.process_entry(&chunk1, now).unwrap();
        assert_eq!(param.kind(), Some(ParamKind::Float));
    }

    #[test]
    fn foreign_param_index_clears_buffer() {
        let now = Instant::now();
        let whole = entry(5, 0, 0x08, "Voltage", &float_tail());
        let content = &whole[2..];
        let half = content.len() / 2;

        let mut chunk0 = vec![6, 1]; // wrong parameter number
        chunk0.extend_from_slice(&content[..half]);
        let mut chunk1 = vec![5, 0];
        chunk1.extend_from_slice(&content[half..]);

        let mut param = base(now);
        param.process_entry(&chunk0, now).unwrap();
        assert!(matches!(
            param.process_entry(&chunk1, now),
            Err(MenuError::ChunkSequence { param: 5 })
        ));
        assert!(param.chunks.is_empty());
        assert!(param.value().is_none());
    }

    #[test]
    fn multi_chunk_folder_is_rejected() {
        let now = Instant::now();
        let whole = entry(5, 0, 0x0B, "Setup", &[1, 2, 0xFF]);
        let content = &whole[2..];
        let half = content.len() / 2;

        let mut chunk0 = vec![5, 1];
        chunk0.extend_from_slice(&content[..half]);
        let mut chunk1 = vec![5, 0];
        chunk1.extend_from_slice(&content[half..]);

        let mut param = base(now);
        param.process_entry(&chunk0, now).unwrap();
        assert!(matches!(
            param.process_entry(&chunk1, now),
            Err(MenuError::MalformedEntry { .. })
        ));
        assert!(param.value().is_none());
    }

    #[test]
    fn malformed_entries_are_reported() {
        let now = Instant::now();
        let mut param = base(now);
        // name missing its terminator
        assert!(param.process_entry(&[5, 0, 0, 0x0B, b'x'], now).is_err());
        // unknown kind byte
        assert!(param.process_entry(&[5, 0, 0, 0x06, b'x', 0], now).is_err());
        assert!(param.value().is_none());
    }

    #[test]
    fn write_encodes_quantised_float() {
        let now = Instant::now();
        let param = float_param(now);
        let bytes = param.encode_write(WriteValue::Float(3.14)).unwrap();
        assert_eq!(bytes, vec![0x00, 0x00, 0x01, 0x3A]);

        let frame = param.write_frame(0xEE, 0xC8, WriteValue::Float(3.14)).unwrap();
        assert_eq!(frame.frame_type(), crsf_frame::msg_type::PARAM_WRITE);
        assert_eq!(frame.payload(), &[5, 0x00, 0x00, 0x01, 0x3A]);
    }

    #[test]
    fn write_refuses_out_of_range_float() {
        let now = Instant::now();
        let param = float_param(now);
        assert!(matches!(
            param.encode_write(WriteValue::Float(20.0)),
            Err(MenuError::ValueOutOfRange { value: 2000, min: 0, max: 1000 })
        ));
    }

    #[test]
    fn write_encodes_other_kinds() {
        let now = Instant::now();

        let mut selection = base(now);
        let mut tail = b"Off;On\0".to_vec();
        tail.extend_from_slice(&[0, 0, 1, 0]);
        selection.process_entry(&entry(5, 0, 0x09, "Mode", &tail), now).unwrap();
        assert_eq!(selection.encode_write(WriteValue::Selection(1)).unwrap(), vec![1]);

        let mut command = base(now);
        command.process_entry(&entry(5, 0, 0x0D, "Bind", b"\x00\x0APress\0"), now).unwrap();
        assert_eq!(
            command.encode_write(WriteValue::Command(CommandStatus::Start)).unwrap(),
            vec![1]
        );

        let mut text = base(now);
        text.process_entry(&entry(5, 0, 0x0A, "Callsign", b"old\0\x08"), now).unwrap();
        assert_eq!(text.encode_write(WriteValue::Text("new")).unwrap(), b"new\0".to_vec());

        // kind and value variant must agree
        assert!(matches!(
            selection.encode_write(WriteValue::Float(1.0)),
            Err(MenuError::KindMismatch)
        ));
    }

    #[test]
    fn write_requires_loaded_entry() {
        let param = base(Instant::now());
        assert!(matches!(
            param.encode_write(WriteValue::Selection(0)),
            Err(MenuError::NotLoaded { param: 5 })
        ));
    }
}
