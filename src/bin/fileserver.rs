//! `fileserver` binary: stand up the `LIST`/`PULL`/`PUSH` TCP server.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use syncfabric::error::FabricError;

/// Serve `LIST`/`PULL`/`PUSH` on a TCP port.
#[derive(Parser, Debug)]
#[command(name = "fileserver", about = "Serve LIST/PULL/PUSH over TCP")]
struct Args {
    /// Port to listen on.
    #[arg(short = 'p')]
    port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.port == 0 {
        return Err(FabricError::Startup("-p port must be positive".to_string()).into());
    }

    syncfabric::fileserver::run(args.port).await?;
    Ok(())
}
