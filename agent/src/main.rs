//!
//! CRSF bus sniffer and menu client.
//!
//! Log mode: connect to the bus over TCP, UART or the built-in simulator,
//! print every frame with its explanation, answer pings on behalf of the
//! local pseudo-device and reconnect from scratch whenever the carrier
//! fails.
//!

use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crsf_frame::addr;

use crsf_agent::explain::{self, Explainer};
use crsf_agent::orchestrator::Orchestrator;
use crsf_agent::transport::{
    Connection, MemoryConnection, SerialConnection, TcpConnection, TransportError,
};

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How the client reaches the bus.
enum Carrier {
    Tcp,
    Serial(String),
    Sim,
}

fn parse_args() -> Option<Carrier> {
    let mut args = std::env::args().skip(1);
    match args.next().as_deref() {
        Some("--tcp") => Some(Carrier::Tcp),
        Some("--sim") => Some(Carrier::Sim),
        Some("--serial") => args.next().map(Carrier::Serial),
        Some(path) if !path.starts_with('-') => Some(Carrier::Serial(path.to_owned())),
        _ => None,
    }
}

fn connect(carrier: &Carrier) -> Result<Box<dyn Connection>, TransportError> {
    Ok(match carrier {
        Carrier::Tcp => Box::new(TcpConnection::connect()?),
        Carrier::Serial(path) => Box::new(SerialConnection::open(path)?),
        Carrier::Sim => Box::new(MemoryConnection::simulated()),
    })
}

fn main() {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let Some(carrier) = parse_args() else {
        eprintln!("usage: crsf-agent [--tcp | --sim | --serial <port> | <port>]");
        std::process::exit(2);
    };

    info!("press Ctrl+C to exit");
    loop {
        let conn = match connect(&carrier) {
            Ok(conn) => conn,
            Err(e) => {
                error!("connect failed: {e}");
                std::thread::sleep(RECONNECT_DELAY);
                continue;
            }
        };

        let mut orchestrator = Orchestrator::new(conn, addr::FC);
        let mut explainer = Explainer::new();
        if let Err(e) =
            orchestrator.run(|frame| explain::log_frame("Received", frame, &mut explainer))
        {
            error!("connection lost: {e}; reconnecting");
        }
    }
}
