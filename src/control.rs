//! The control listener: accepts one-shot operator commands
//! (`add`/`cancel`/`shutdown`) and drives the shutdown protocol.
//!
//! Connections are handled serially, one at a time, on the listener task
//! itself — a deliberate choice, not an oversight: operator commands are
//! infrequent and ordering them removes any need to serialize registry
//! mutation against concurrent connection handlers.

use std::io;
use std::sync::Arc;

use chrono::Local;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::enumerator;
use crate::error::FabricError;
use crate::queue::JobQueue;
use crate::registry::{parse_spec, AddOutcome, CancelOutcome, MappingRegistry, SyncMapping};

/// Commands are capped at roughly 1 KiB.
const MAX_COMMAND_BYTES: usize = 1024;

fn timestamp() -> String {
    Local::now().format("[%Y-%m-%d %H:%M:%S]").to_string()
}

/// Build the `Unknown command: ...` reply and log the rejection.
fn unknown(ts: &str, line: &str) -> String {
    let err = FabricError::UnknownCommand(line.to_string());
    debug!(%err, "rejecting control command");
    format!("{ts} Unknown command: {line}\n")
}

/// Register `mapping` with `registry` and, if it is new, spawn its
/// enumerator. Shared by the control listener's `add` command and the
/// manager's config-file startup loading, so both paths produce identical
/// registry and enumeration behaviour.
pub async fn register(
    mapping: SyncMapping,
    registry: &MappingRegistry,
    queue: &Arc<JobQueue>,
) -> AddOutcome {
    let outcome = registry.add(mapping).await;
    if let AddOutcome::Registered(ref mapping) = outcome {
        tokio::spawn(enumerator::run(mapping.clone(), queue.clone()));
    }
    outcome
}

async fn dispatch(line: &str, registry: &MappingRegistry, queue: &Arc<JobQueue>) -> (String, bool) {
    let ts = timestamp();

    if line == "shutdown" {
        let body = format!(
            "{ts} shutdown received\n{ts} queued jobs will finish\n{ts} no new jobs will be accepted\n{ts} closing\n",
        );
        return (body, true);
    }

    if let Some(rest) = line.strip_prefix("add ") {
        let mut specs = rest.split_whitespace();
        let (Some(src_spec), Some(dst_spec)) = (specs.next(), specs.next()) else {
            return (unknown(&ts, line), false);
        };
        let (Some((src_path, src_host, src_port)), Some((dst_path, dst_host, dst_port))) =
            (parse_spec(src_spec), parse_spec(dst_spec))
        else {
            return (unknown(&ts, line), false);
        };
        let mapping = SyncMapping {
            src_path,
            src_host,
            src_port,
            dst_path,
            dst_host,
            dst_port,
        };
        let src = mapping.src_spec();
        let dst = mapping.dst_spec();
        let reply = match register(mapping, registry, queue).await {
            AddOutcome::Registered(_) => format!("{ts} Sync task registered: {src} => {dst}\n"),
            AddOutcome::AlreadyExists(_) => format!("{ts} Sync task already exists: {src} => {dst}\n"),
        };
        return (reply, false);
    }

    if let Some(src_spec) = line.strip_prefix("cancel ") {
        let reply = match registry.cancel(src_spec.trim()).await {
            CancelOutcome::Removed(_) => format!("{ts} Sync task cancelled: {}\n", src_spec.trim()),
            CancelOutcome::NotFound => format!("{ts} No such sync task: {}\n", src_spec.trim()),
        };
        return (reply, false);
    }

    (unknown(&ts, line), false)
}

/// Run the control listener until a `shutdown` command is processed.
/// Returns once the listener socket itself has been closed.
pub async fn run(port: u16, registry: Arc<MappingRegistry>, queue: Arc<JobQueue>) -> io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    serve(listener, registry, queue).await
}

/// Same as [`run`], but takes an already-bound listener so callers (tests
/// wanting the OS-assigned port from `:0`) can read `local_addr()` first.
pub async fn serve(
    listener: TcpListener,
    registry: Arc<MappingRegistry>,
    queue: Arc<JobQueue>,
) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "control listener bound");

    loop {
        let (mut stream, peer) = listener.accept().await?;

        let mut buf = vec![0u8; MAX_COMMAND_BYTES];
        let n = match stream.read(&mut buf).await {
            Ok(n) => n,
            Err(err) => {
                info!(%peer, %err, "control connection read error");
                continue;
            }
        };
        if n == 0 {
            continue;
        }
        let line = String::from_utf8_lossy(&buf[..n]);
        let line = line.trim_end_matches(['\r', '\n']).to_string();

        let (reply, shutting_down) = dispatch(&line, &registry, &queue).await;
        let _ = stream.write_all(reply.as_bytes()).await;
        drop(stream);

        if shutting_down {
            queue.shut_down();
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn add_then_duplicate_add_reports_already_exists() {
        let registry = MappingRegistry::new();
        let queue = Arc::new(JobQueue::new(4));

        let (reply, shutdown) = dispatch("add src@S:1 dst@D:2", &registry, &queue).await;
        assert!(reply.contains("Sync task registered"));
        assert!(!shutdown);

        let (reply, _) = dispatch("add src@S:1 dst@D:2", &registry, &queue).await;
        assert!(reply.contains("already exists"));
    }

    #[tokio::test]
    async fn cancel_unknown_reports_not_found() {
        let registry = MappingRegistry::new();
        let queue = Arc::new(JobQueue::new(4));
        let (reply, _) = dispatch("cancel src@S:1", &registry, &queue).await;
        assert!(reply.contains("No such sync task"));
    }

    #[tokio::test]
    async fn cancel_after_add_reports_removal() {
        let registry = MappingRegistry::new();
        let queue = Arc::new(JobQueue::new(4));
        dispatch("add src@S:1 dst@D:2", &registry, &queue).await;
        let (reply, _) = dispatch("cancel src@S:1", &registry, &queue).await;
        assert!(reply.contains("cancelled"));
    }

    #[tokio::test]
    async fn shutdown_yields_four_lines_and_flags_shutdown() {
        let registry = MappingRegistry::new();
        let queue = Arc::new(JobQueue::new(4));
        let (reply, shutdown) = dispatch("shutdown", &registry, &queue).await;
        assert!(shutdown);
        assert_eq!(reply.lines().count(), 4);
    }

    #[tokio::test]
    async fn unknown_command_is_reported_and_does_not_shut_down() {
        let registry = MappingRegistry::new();
        let queue = Arc::new(JobQueue::new(4));
        let (reply, shutdown) = dispatch("frobnicate", &registry, &queue).await;
        assert!(reply.contains("Unknown command: frobnicate"));
        assert!(!shutdown);
    }
}
