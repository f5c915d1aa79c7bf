//! The bounded job queue: the backpressure channel between enumerators and
//! the worker pool.
//!
//! A bounded `tokio::sync::mpsc::channel` provides the FIFO and the
//! backpressure: `push` is `Sender::send(job).await`, which blocks while the
//! channel is at capacity. `pop` is built from `Receiver::recv()` raced
//! against a shutdown `Notify`, giving the "blocks while empty, or returns
//! drained once shutdown and empty" predicate without a second condvar.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, Notify};

/// One file to copy, produced by an enumerator and consumed by a worker.
#[derive(Debug, Clone)]
pub struct Job {
    pub filename: String,
    pub src_dir: String,
    pub src_host: String,
    pub src_port: u16,
    pub dst_dir: String,
    pub dst_host: String,
    pub dst_port: u16,
}

/// What a blocked producer gets back once the queue has been drained and
/// shutdown: there is no one left to serve the job.
#[derive(Debug, PartialEq, Eq)]
pub struct Discarded;

/// What `pop` returns: either a job, or the drained sentinel that tells a
/// worker to exit its loop.
pub enum PopResult {
    Job(Job),
    Drained,
}

struct Shared {
    shutdown: AtomicBool,
    notify: Notify,
}

/// A bounded FIFO of jobs with capacity `B`, shared between every
/// enumerator (producer) and every worker (consumer).
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
    shared: Arc<Shared>,
}

impl JobQueue {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            tx,
            rx: Mutex::new(rx),
            shared: Arc::new(Shared {
                shutdown: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// Enqueue `job`, blocking while the queue is at capacity. Returns
    /// `Err(Discarded)` once the queue has been drained and closed after
    /// shutdown: a closed queue must unblock producers rather than deadlock
    /// them.
    pub async fn push(&self, job: Job) -> Result<(), Discarded> {
        self.tx.send(job).await.map_err(|_| Discarded)
    }

    /// Dequeue one job, blocking while the queue is empty and the fabric is
    /// not shutting down. Once the shutdown flag is set and no job is
    /// immediately available, returns [`PopResult::Drained`].
    pub async fn pop(&self) -> PopResult {
        loop {
            let mut rx = self.rx.lock().await;

            // Check the predicate before registering a new wait: shutdown may
            // already have been signalled, and `Notify::notify_waiters` only
            // wakes tasks already waiting at the time it is called, not ones
            // that start waiting afterwards.
            if self.shared.shutdown.load(Ordering::SeqCst) {
                return match rx.try_recv() {
                    Ok(job) => PopResult::Job(job),
                    Err(_) => {
                        // Close the channel so any producer currently
                        // blocked in `push` (waiting for capacity that will
                        // now never free, since every consumer is about to
                        // exit) is woken with a discarded result instead of
                        // deadlocking.
                        rx.close();
                        PopResult::Drained
                    }
                };
            }

            tokio::select! {
                biased;
                received = rx.recv() => {
                    return match received {
                        Some(job) => PopResult::Job(job),
                        None => PopResult::Drained,
                    };
                }
                _ = self.shared.notify.notified() => {
                    // shutdown (or a spurious wakeup); loop back to re-check.
                }
            }
        }
    }

    /// Set the shutdown flag and wake every task blocked in `pop` so each
    /// re-evaluates the predicate and sees the drained sentinel.
    pub fn shut_down(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.notify.notify_waiters();
    }

    /// Free slots currently available to a producer. Useful for tests and
    /// diagnostics; not part of the core push/pop protocol.
    pub fn capacity(&self) -> usize {
        self.tx.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn job(filename: &str) -> Job {
        Job {
            filename: filename.to_string(),
            src_dir: "src".to_string(),
            src_host: "S".to_string(),
            src_port: 9001,
            dst_dir: "dst".to_string(),
            dst_host: "D".to_string(),
            dst_port: 9002,
        }
    }

    #[tokio::test]
    async fn push_then_pop_preserves_order() {
        let queue = JobQueue::new(4);
        queue.push(job("a")).await.unwrap();
        queue.push(job("b")).await.unwrap();

        match queue.pop().await {
            PopResult::Job(j) => assert_eq!(j.filename, "a"),
            PopResult::Drained => panic!("expected a job"),
        }
        match queue.pop().await {
            PopResult::Job(j) => assert_eq!(j.filename, "b"),
            PopResult::Drained => panic!("expected a job"),
        }
    }

    #[tokio::test]
    async fn push_blocks_at_capacity() {
        let queue = Arc::new(JobQueue::new(1));
        queue.push(job("a")).await.unwrap();
        assert_eq!(queue.capacity(), 0);

        let queue2 = queue.clone();
        let blocked = tokio::spawn(async move { queue2.push(job("b")).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        match queue.pop().await {
            PopResult::Job(j) => assert_eq!(j.filename, "a"),
            PopResult::Drained => panic!("expected a job"),
        }
        blocked.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn pop_drains_then_returns_sentinel_after_shutdown() {
        let queue = Arc::new(JobQueue::new(4));
        queue.push(job("a")).await.unwrap();
        queue.shut_down();

        match queue.pop().await {
            PopResult::Job(j) => assert_eq!(j.filename, "a"),
            PopResult::Drained => panic!("queued job must be served before drain"),
        }
        match queue.pop().await {
            PopResult::Drained => {}
            PopResult::Job(_) => panic!("expected drained sentinel"),
        }
    }

    #[tokio::test]
    async fn shutdown_wakes_a_blocked_pop() {
        let queue = Arc::new(JobQueue::new(4));
        let queue2 = queue.clone();
        let popper = tokio::spawn(async move { queue2.pop().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.shut_down();

        let result = tokio::time::timeout(Duration::from_millis(500), popper)
            .await
            .expect("pop should return promptly after shutdown")
            .unwrap();
        assert!(matches!(result, PopResult::Drained));
    }
}
