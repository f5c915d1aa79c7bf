//! `manager` binary: owns the mapping registry, job queue, worker pool, and
//! control listener.
//!
//! Startup order: workers are spawned first (idle until jobs arrive), then
//! the config file's mappings are registered (each spawning its own
//! enumerator), then the control listener runs until a `shutdown` command
//! closes it, at which point every worker is joined before the process
//! exits.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use syncfabric::error::FabricError;
use syncfabric::{config, control, log::LogWriter, queue::JobQueue, registry::MappingRegistry, worker};

/// Run the sync fabric manager.
#[derive(Parser, Debug)]
#[command(name = "manager", about = "Distributed sync fabric manager")]
struct Args {
    /// Path to the append-only job log.
    #[arg(short = 'l')]
    log: PathBuf,

    /// Path to the config file of initial sync mappings.
    #[arg(short = 'c')]
    config: PathBuf,

    /// Number of worker tasks.
    #[arg(short = 'n')]
    workers: u32,

    /// Control listener port.
    #[arg(short = 'p')]
    port: u16,

    /// Job queue capacity.
    #[arg(short = 'b')]
    capacity: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    if args.workers == 0 {
        return Err(FabricError::Startup("-n workers must be positive".to_string()).into());
    }
    if args.port == 0 {
        return Err(FabricError::Startup("-p port must be positive".to_string()).into());
    }
    if args.capacity == 0 {
        return Err(FabricError::Startup("-b queue capacity must be positive".to_string()).into());
    }

    let log = Arc::new(
        LogWriter::open(&args.log)
            .await
            .with_context(|| format!("opening log file {}", args.log.display()))?,
    );
    let registry = Arc::new(MappingRegistry::new());
    let queue = Arc::new(JobQueue::new(args.capacity));

    let mappings = config::load(&args.config)
        .await
        .with_context(|| format!("loading config file {}", args.config.display()))?;
    for mapping in mappings {
        control::register(mapping, &registry, &queue).await;
    }

    let mut workers = Vec::with_capacity(args.workers as usize);
    for id in 0..args.workers as usize {
        workers.push(tokio::spawn(worker::run(id, queue.clone(), log.clone())));
    }

    control::run(args.port, registry, queue).await?;

    for handle in workers {
        handle.await?;
    }

    Ok(())
}
