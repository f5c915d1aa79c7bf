//! `console` binary: a thin interactive client that forwards typed commands
//! to the manager's control port and prints the response.
//!
//! Deliberately a small, undocumented-in-depth CLI shell rather than a
//! tested library module: it is an interface contract, not a place where
//! the fabric's own logic lives.

use std::path::PathBuf;

use clap::Parser;
use tokio::fs::OpenOptions;
use tokio::io::{self, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing_subscriber::EnvFilter;

use syncfabric::error::FabricError;

/// Interactive client for the sync fabric manager's control port.
#[derive(Parser, Debug)]
#[command(name = "console", about = "Drive the sync fabric manager interactively")]
struct Args {
    /// Path to the session log.
    #[arg(short = 'l')]
    log: PathBuf,

    /// Manager host.
    #[arg(short = 'h')]
    host: String,

    /// Manager control port.
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

    let mut session_log = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&args.log)
        .await?;

    let addr = format!("{}:{}", args.host, args.port);
    let mut stdin = BufReader::new(io::stdin());
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush().await?;

        line.clear();
        if stdin.read_line(&mut line).await? == 0 {
            break; // EOF on stdin
        }
        let command = line.trim_end_matches(['\r', '\n']);
        if command.is_empty() {
            continue;
        }

        session_log
            .write_all(format!("> {}\n", command).as_bytes())
            .await?;
        session_log.flush().await?;

        let mut stream = TcpStream::connect(&addr).await?;
        stream.write_all(command.as_bytes()).await?;
        stream.write_all(b"\n").await?;

        let mut response = String::new();
        stream.read_to_string(&mut response).await?;
        print!("{}", response);
        io::stdout().flush().await?;

        session_log.write_all(response.as_bytes()).await?;
        session_log.flush().await?;

        if command == "shutdown" {
            break;
        }
    }

    Ok(())
}
