//! The enumerator: a short-lived task, one per registered mapping, that
//! lists the source directory and feeds one job per filename into the
//! queue.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::protocol;
use crate::queue::{Job, JobQueue};
use crate::registry::SyncMapping;

/// Enumerate `mapping`'s source directory and push one job per listed name.
///
/// A failure to connect to the source is silent: the task simply returns
/// without logging, a known gap rather than an oversight. A `push` that is
/// discarded because the queue has already drained past shutdown is
/// likewise not an error.
pub async fn run(mapping: SyncMapping, queue: Arc<JobQueue>) {
    let src_addr = format!("{}:{}", mapping.src_host, mapping.src_port);

    let names = match protocol::list(&src_addr, &mapping.src_path).await {
        Ok(names) => names,
        Err(_) => return,
    };

    debug!(
        src = %mapping.src_spec(),
        count = names.len(),
        "enumerated source directory"
    );

    for filename in names {
        let job = Job {
            filename,
            src_dir: mapping.src_path.clone(),
            src_host: mapping.src_host.clone(),
            src_port: mapping.src_port,
            dst_dir: mapping.dst_path.clone(),
            dst_host: mapping.dst_host.clone(),
            dst_port: mapping.dst_port,
        };
        if queue.push(job).await.is_err() {
            warn!(src = %mapping.src_spec(), "job discarded, queue already drained");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::PopResult;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    async fn fake_list_server(entries: &'static [&'static str]) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let _ = stream.read(&mut buf).await.unwrap();
            for e in entries {
                stream.write_all(format!("{}\n", e).as_bytes()).await.unwrap();
            }
            stream.write_all(b".\n").await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn enumerates_and_queues_one_job_per_file() {
        let addr = fake_list_server(&["a.txt", "b.txt"]).await;
        let mapping = SyncMapping {
            src_path: "src".to_string(),
            src_host: addr.ip().to_string(),
            src_port: addr.port(),
            dst_path: "dst".to_string(),
            dst_host: "D".to_string(),
            dst_port: 9002,
        };
        let queue = Arc::new(JobQueue::new(8));
        run(mapping, queue.clone()).await;

        let mut names = Vec::new();
        for _ in 0..2 {
            match queue.pop().await {
                PopResult::Job(j) => names.push(j.filename),
                PopResult::Drained => panic!("expected a job"),
            }
        }
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn empty_directory_queues_nothing() {
        let addr = fake_list_server(&[]).await;
        let mapping = SyncMapping {
            src_path: "src".to_string(),
            src_host: addr.ip().to_string(),
            src_port: addr.port(),
            dst_path: "dst".to_string(),
            dst_host: "D".to_string(),
            dst_port: 9002,
        };
        let queue = Arc::new(JobQueue::new(8));
        run(mapping, queue.clone()).await;
        assert_eq!(queue.capacity(), 8);
    }

    #[tokio::test]
    async fn connect_failure_exits_silently() {
        let mapping = SyncMapping {
            src_path: "src".to_string(),
            src_host: "127.0.0.1".to_string(),
            src_port: 1, // nothing listening
            dst_path: "dst".to_string(),
            dst_host: "D".to_string(),
            dst_port: 9002,
        };
        let queue = Arc::new(JobQueue::new(8));
        run(mapping, queue.clone()).await;
        assert_eq!(queue.capacity(), 8);
    }
}
