//! Error taxonomy for ensemble runs
//!
//! Configuration problems are always raised synchronously before any
//! trajectory is computed; compute failures are fatal to the whole run and
//! may surface only when results are awaited in the streaming strategies.

use thiserror::Error;

use crate::physics::SolverError;

/// Errors produced by the ensemble engine.
#[derive(Debug, Error)]
pub enum EnsembleError {
    /// Invalid run request: no output channel, bad worker/capacity counts,
    /// bad persistence target, inconsistent problem definition. Raised
    /// before dispatch; recoverable by fixing the request and retrying.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Unrecognized execution-mode name. Raised before any work begins.
    #[error(
        "unrecognized execution mode '{0}' \
         (expected serial, shared-pool, worker-map, worker-distributed or hybrid)"
    )]
    InvalidMode(String),

    /// A trajectory compute unit failed. Fatal to the entire run in every
    /// strategy; other workers may already have produced and persisted
    /// partial output.
    #[error("trajectory {index} failed: {source}")]
    Compute {
        /// 1-based index of the failing trajectory.
        index: usize,
        #[source]
        source: SolverError,
    },

    /// The completion channel disconnected before all trajectories arrived,
    /// which means a worker died without reporting a result.
    #[error("completion channel closed after {received} of {expected} trajectories")]
    ChannelClosed {
        /// Items consumed before the disconnect.
        received: usize,
        /// Items the run was supposed to deliver.
        expected: usize,
    },

    /// Dataset file I/O failed.
    #[error("dataset I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset record (de)serialization failed.
    #[error("dataset serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
