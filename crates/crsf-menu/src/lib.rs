//! The CRSF device menu protocol.
//!
//! Every CRSF device exposes a tree of named, typed parameters that remote
//! peers read chunk by chunk and write back over the bus. This crate keeps
//! a local mirror of that tree fresh:
//!
//! - **`Parameter`**
//!   One menu entry: chunk reassembly, kind-specific decoding and
//!   write-frame encoding.
//!
//! - **`Device`**
//!   One bus peer: identity, liveness, the parameter table and the poll
//!   scheduler that decides which entry to request next.
//!
//! - **`Registry`**
//!   Every device seen on the bus, keyed by origin address; answers pings
//!   on behalf of the local client and evicts devices that fall silent.
//!
//! All state lives on whatever event loop drives the bus; nothing here
//! spawns threads or performs I/O. Time is passed in explicitly, which
//! keeps scheduling decisions deterministic under test.

pub use device::{
    Device, FOLDER_REFRESH, IDLE_TIMEOUT, Identity, ONLINE_THRESHOLD, PARAM_TIMEOUT, POLL_PERIOD,
    RESPONSE_SPEEDUP,
};
pub use error::{MenuError, Result};
pub use param::Parameter;
pub use registry::{LOCAL_NAME, Registry};
pub use value::{CommandStatus, ParamKind, ParamValue, WriteValue};

mod device;
mod error;
mod param;
mod registry;
mod value;
