//! Host-side CRSF client: carriers, the bus event loop and the frame
//! explainers behind the `crsf-agent` binary.

pub mod explain;
pub mod orchestrator;
pub mod transport;
