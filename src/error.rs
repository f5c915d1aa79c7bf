//! Error taxonomy for the fabric.
//!
//! Mirrors the four error kinds of the design: startup errors (fatal, reported
//! by binaries and turned into a non-zero exit), per-job transient errors
//! (logged as a `FAIL` record and discarded), file-server protocol errors
//! (reported on the wire as `ERR: ...`), and unknown control commands.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FabricError {
    #[error("{0}")]
    Startup(String),

    #[error("job failed at {stage} stage: {message}")]
    JobFailed { stage: &'static str, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),
}
