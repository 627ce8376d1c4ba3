use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use broadcast_relay::{cli::RelayArgs, relay::Relay};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

fn main() -> Result<()> {
    init_tracing();

    let args = RelayArgs::parse();
    let relay = Relay::bind(args.listen, args.read_buffer)?;
    let addr = relay.local_addr()?;
    info!("relay listening on {}", addr);
    if let Err(err) = relay.run() {
        warn!("relay exited with error: {err:?}");
        return Err(err);
    }

    Ok(())
}
