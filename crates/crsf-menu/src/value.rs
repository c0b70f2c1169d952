//! Parameter kinds and their decoded values.

use num_enum::{IntoPrimitive, TryFromPrimitive};

///
/// Parameter kind, the low 7 bits of the wire type byte. The top bit is
/// the hidden flag and is stripped before conversion.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ParamKind {
    Uint8 = 0x00,
    Int8 = 0x01,
    Uint16 = 0x02,
    Int16 = 0x03,
    Uint32 = 0x04,
    Int32 = 0x05,
    Float = 0x08,
    TextSelection = 0x09,
    String = 0x0A,
    Folder = 0x0B,
    Info = 0x0C,
    Command = 0x0D,
    OutOfRange = 0x7F,
}

impl ParamKind {
    /// Integer kinds share a stubbed decode path.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Uint8 | Self::Int8 | Self::Uint16 | Self::Int16 | Self::Uint32 | Self::Int32
        )
    }
}

///
/// Sub-states exchanged through COMMAND parameters: the device reports
/// `Ready`, `Progress` and `ConfirmationNeeded`; the client sends `Start`,
/// `Confirm`, `Cancel` and `Poll`.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum CommandStatus {
    Ready = 0,
    Start = 1,
    Progress = 2,
    ConfirmationNeeded = 3,
    Confirm = 4,
    Cancel = 5,
    Poll = 6,
}

///
/// The decoded, kind-specific body of a parameter entry. Fields that only
/// exist for one kind live inside its variant.
///
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Ordered child indices of a folder.
    Folder { children: Vec<u8> },
    /// A read-only text line.
    Info { value: String },
    /// Free-form text entered by the operator.
    StringInput { value: String, max_length: u8 },
    /// One choice out of a `;`-separated option list.
    Selection { options: Vec<String>, value: u8, min: u8, max: u8, default: u8 },
    /// A fixed-point number scaled by `10^decimal_point`.
    Float {
        value: i32,
        min: i32,
        max: i32,
        default: i32,
        decimal_point: u8,
        step_size: i32,
        unit: String,
    },
    /// A remotely executable action and its progress state.
    Command { status: CommandStatus, timeout: f32, info: String },
    /// Integer kinds are tracked but their payloads are not decoded.
    Numeric { kind: ParamKind },
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Folder { .. } => ParamKind::Folder,
            Self::Info { .. } => ParamKind::Info,
            Self::StringInput { .. } => ParamKind::String,
            Self::Selection { .. } => ParamKind::TextSelection,
            Self::Float { .. } => ParamKind::Float,
            Self::Command { .. } => ParamKind::Command,
            Self::Numeric { kind } => *kind,
        }
    }
}

/// A value to be written to a parameter, matched against its kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WriteValue<'t> {
    Float(f64),
    Text(&'t str),
    Selection(u8),
    Command(CommandStatus),
}
