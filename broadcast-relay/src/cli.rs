use std::{net::SocketAddr, num::NonZeroUsize};

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Relay text from each TCP client to every other client", long_about = None)]
pub struct RelayArgs {
    /// Socket address the relay should bind to. Use port 0 for an ephemeral port.
    #[arg(long, default_value = "0.0.0.0:4200")]
    pub listen: SocketAddr,

    /// Bytes read per call on each connection; longer messages are relayed in chunks.
    #[arg(long, default_value = "64")]
    pub read_buffer: NonZeroUsize,
}
