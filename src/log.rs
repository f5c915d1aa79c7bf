//! The manager's structured per-job log stream.
//!
//! One record per `PULL`/`PUSH` stage outcome, serialised to disk with a
//! `write + flush` per record. A single [`LogWriter`] instance, shared
//! behind a `tokio::sync::Mutex`, keeps concurrent workers' writes from
//! interleaving mid-line.

use std::io;
use std::path::Path;

use chrono::Local;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::Mutex;

/// Pipeline stage a log record reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pull,
    Push,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::Pull => "PULL",
            Stage::Push => "PUSH",
        }
    }
}

/// Outcome of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Fail,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Fail => "FAIL",
        }
    }
}

/// One line of the job log: `[<ts>] [<src>] [<dst>] [<worker>] [<stage>] [<status>] [<msg>]`.
pub struct LogRecord {
    pub src_desc: String,
    pub dst_desc: String,
    pub worker_id: usize,
    pub stage: Stage,
    pub status: Status,
    pub message: String,
}

impl LogRecord {
    fn render(&self) -> String {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        format!(
            "[{}] [{}] [{}] [{}] [{}] [{}] [{}]\n",
            ts,
            self.src_desc,
            self.dst_desc,
            self.worker_id,
            self.stage.as_str(),
            self.status.as_str(),
            self.message,
        )
    }
}

/// The manager's append-only log sink, flushed after each record.
pub struct LogWriter {
    file: Mutex<BufWriter<tokio::fs::File>>,
}

impl LogWriter {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            file: Mutex::new(BufWriter::new(file)),
        })
    }

    pub async fn write(&self, record: LogRecord) -> io::Result<()> {
        let line = record.render();
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

/// Build the `src_dir/filename@host:port` descriptor used in log records.
pub fn descriptor(dir: &str, filename: &str, host: &str, port: u16) -> String {
    format!("{}/{}@{}:{}", dir, filename, host, port)
}
