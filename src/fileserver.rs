//! The file server: accepts connections and dispatches `LIST`/`PULL`/`PUSH`.
//!
//! Each connection owns its `PUSH` destination handle as a plain local
//! `Option<File>` on the connection task's stack, not a process-global, so
//! concurrent connections to different destination files never interfere.

use std::io;

use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::FabricError;
use crate::protocol::{self, Request};

/// Bind the listening socket. Split out from [`run`] so callers (tests, or a
/// supervisor wanting the OS-assigned port from `:0`) can read
/// `local_addr()` before serving.
pub async fn bind(port: u16) -> io::Result<TcpListener> {
    TcpListener::bind(("0.0.0.0", port)).await
}

/// Accept connections on `listener` forever, spawning one task per
/// connection.
pub async fn serve(listener: TcpListener) -> io::Result<()> {
    info!(addr = %listener.local_addr()?, "file server listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream).await {
                warn!(%peer, %err, "connection handler error");
            }
        });
    }
}

/// Bind `port` and serve forever. Thin composition of [`bind`] + [`serve`]
/// for the `fileserver` binary.
pub async fn run(port: u16) -> io::Result<()> {
    serve(bind(port).await?).await
}

/// Serve one accepted connection. `LIST` and `PULL` are single request/
/// response pairs; `PUSH` is a sequence of frames sharing one open file
/// handle, scoped to this connection.
async fn handle_connection(stream: TcpStream) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut push_file: Option<fs::File> = None;

    loop {
        let line = match protocol::read_line(&mut reader).await? {
            Some(line) => line,
            None => break,
        };

        match protocol::parse_request(&line) {
            Some(Request::List(dir)) => {
                handle_list(&mut write_half, &dir).await?;
                break;
            }
            Some(Request::Pull(path)) => {
                handle_pull(&mut write_half, &path).await?;
                break;
            }
            Some(Request::Push { path, n, chunk }) => {
                handle_push(&mut push_file, &path, n, &chunk).await?;
                if n == 0 {
                    break;
                }
            }
            None => {
                let err = FabricError::Protocol(format!("unparseable request: {}", String::from_utf8_lossy(&line)));
                debug!(%err, "rejecting request");
                write_half.write_all(b"ERR: Unknown command\n").await?;
                break;
            }
        }
    }

    Ok(())
}

async fn handle_list(writer: &mut (impl tokio::io::AsyncWrite + Unpin), dir: &str) -> io::Result<()> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(_) => {
            writer
                .write_all(format!("ERR: cannot open {}\n.\n", dir).as_bytes())
                .await?;
            return Ok(());
        }
    };

    while let Some(entry) = entries.next_entry().await? {
        let file_type = entry.file_type().await?;
        if !file_type.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        writer.write_all(format!("{}\n", name).as_bytes()).await?;
    }
    writer.write_all(b".\n").await
}

async fn handle_pull(writer: &mut (impl tokio::io::AsyncWrite + Unpin), path: &str) -> io::Result<()> {
    let mut file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(err) => {
            writer
                .write_all(format!("-1 {}\n", err).as_bytes())
                .await?;
            return Ok(());
        }
    };

    let len = file.metadata().await?.len();
    writer.write_all(format!("{} ", len).as_bytes()).await?;
    tokio::io::copy(&mut file, writer).await?;
    Ok(())
}

/// Apply one `PUSH` frame to `handle`: `-1` truncates (or creates), `>0`
/// appends and flushes (opening the file in append mode first if no handle
/// is open yet, so a data frame arriving without a preceding `begin` still
/// lands somewhere instead of erroring), `0` closes.
async fn handle_push(
    handle: &mut Option<fs::File>,
    path: &str,
    n: i64,
    chunk: &[u8],
) -> io::Result<()> {
    if n < 0 {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .await?;
        *handle = Some(file);
        return Ok(());
    }

    if n == 0 {
        *handle = None; // dropping the File closes it
        return Ok(());
    }

    if handle.is_none() {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)
            .await?;
        *handle = Some(file);
    }
    let file = handle.as_mut().expect("just opened above");
    file.write_all(chunk).await?;
    file.flush().await
}
