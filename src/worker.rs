//! The worker pool: a fixed set of tasks that drain the job queue and
//! perform the two-stage pull-then-push transfer for each job.
//!
//! Each worker loops popping the shared queue and running a job to
//! completion: pull from the source file server, then push to the
//! destination, with one log record emitted per stage outcome.

use std::sync::Arc;

use tokio::io::AsyncReadExt;

use crate::error::FabricError;
use crate::log::{descriptor, LogRecord, LogWriter, Stage, Status};
use crate::protocol::{self, PullOutcome, PushSession};
use crate::queue::{Job, JobQueue, PopResult};

/// Run worker `id` until the queue is drained and shutdown has begun.
pub async fn run(id: usize, queue: Arc<JobQueue>, log: Arc<LogWriter>) {
    loop {
        match queue.pop().await {
            PopResult::Drained => break,
            PopResult::Job(job) => process_job(id, &job, &log).await,
        }
    }
}

async fn process_job(worker_id: usize, job: &Job, log: &LogWriter) {
    let src_desc = descriptor(&job.src_dir, &job.filename, &job.src_host, job.src_port);
    let dst_desc = descriptor(&job.dst_dir, &job.filename, &job.dst_host, job.dst_port);

    let src_addr = format!("{}:{}", job.src_host, job.src_port);
    let src_path = format!("{}/{}", job.src_dir, job.filename);

    let pull_outcome = protocol::pull(&src_addr, &src_path).await;

    let (mut body, expected_len) = match pull_outcome {
        Ok(PullOutcome::Ok { body, len }) => (body, len),
        Ok(PullOutcome::Err(message)) => {
            log_record(log, worker_id, &src_desc, &dst_desc, Stage::Pull, Status::Fail, message).await;
            return;
        }
        Err(err) => {
            let failed = FabricError::JobFailed {
                stage: "pull",
                message: err.to_string(),
            };
            log_record(log, worker_id, &src_desc, &dst_desc, Stage::Pull, Status::Fail, failed.to_string()).await;
            return;
        }
    };

    log_record(
        log,
        worker_id,
        &src_desc,
        &dst_desc,
        Stage::Pull,
        Status::Ok,
        format!("{} bytes", expected_len),
    )
    .await;

    let dst_addr = format!("{}:{}", job.dst_host, job.dst_port);
    let dst_path = format!("{}/{}", job.dst_dir, job.filename);

    let result = push_file(&dst_addr, &dst_path, &mut body, expected_len).await;
    match result {
        Ok(forwarded) if forwarded == expected_len => {
            log_record(
                log,
                worker_id,
                &src_desc,
                &dst_desc,
                Stage::Push,
                Status::Ok,
                format!("{} bytes", forwarded),
            )
            .await;
        }
        Ok(forwarded) => {
            log_record(
                log,
                worker_id,
                &src_desc,
                &dst_desc,
                Stage::Push,
                Status::Fail,
                format!("short transfer: {} of {} bytes", forwarded, expected_len),
            )
            .await;
        }
        Err(err) => {
            let failed = FabricError::JobFailed {
                stage: "push",
                message: err.to_string(),
            };
            log_record(log, worker_id, &src_desc, &dst_desc, Stage::Push, Status::Fail, failed.to_string()).await;
        }
    }
}

async fn push_file<R: tokio::io::AsyncRead + Unpin>(
    dst_addr: &str,
    dst_path: &str,
    body: &mut R,
    expected_len: u64,
) -> std::io::Result<u64> {
    let mut session = PushSession::connect(dst_addr, dst_path).await?;
    session.begin().await?;

    let mut buf = bytes::BytesMut::zeroed(protocol::CHUNK_SIZE);
    let mut forwarded = 0u64;
    loop {
        let r = body.read(&mut buf).await?;
        if r == 0 {
            break;
        }
        session.send_chunk(&buf[..r]).await?;
        forwarded += r as u64;
        if forwarded >= expected_len {
            break;
        }
    }
    session.finish().await?;
    Ok(forwarded)
}

async fn log_record(
    log: &LogWriter,
    worker_id: usize,
    src_desc: &str,
    dst_desc: &str,
    stage: Stage,
    status: Status,
    message: String,
) {
    let _ = log
        .write(LogRecord {
            src_desc: src_desc.to_string(),
            dst_desc: dst_desc.to_string(),
            worker_id,
            stage,
            status,
            message,
        })
        .await;
}
