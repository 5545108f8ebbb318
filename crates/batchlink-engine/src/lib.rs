//! Batchlink Engine - Resumable batch transfer engine
//!
//! Provides:
//! - A work loop that drives a batch through uploads or deletes in order
//! - Bounded retry with a cancellable backoff countdown
//! - Session lifecycle: create, prepare, run, reconcile, discard
//! - A `tokio::fs` adapter for reading selected files
//!
//! ## Modules
//!
//! - [`scheduler`] - The work loop state machine and its handles
//! - [`engine`] - Batch engine façade tying the ports together
//! - [`filesystem`] - Local file adapter
//! - [`logging`] - Tracing subscriber setup

pub mod engine;
pub mod filesystem;
pub mod logging;
pub mod scheduler;

use std::path::PathBuf;

use thiserror::Error;

use batchlink_core::domain::{SessionId, SessionStatus};

pub use engine::{BatchEngine, EnginePorts, PrepareReport, RunningBatch};
pub use filesystem::LocalFileReader;
pub use scheduler::{
    BatchCheckpoint, LoopCommand, LoopHandle, LoopSettings, LoopSnapshot, LoopState, LoopTask,
    WorkLoop,
};

/// Errors raised by the engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// No session with that id is stored
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    /// The session has a run in progress or awaiting reconciliation
    #[error("Session {id} is {status}, expected idle")]
    SessionBusy {
        /// The session
        id: SessionId,
        /// Its current status
        status: SessionStatus,
    },

    /// A work loop of this process still owns the session's batch
    #[error("Session {0} has a live work loop")]
    LoopActive(SessionId),

    /// The work loop has ended and no longer accepts commands
    #[error("Work loop is no longer running")]
    LoopClosed,

    /// The work loop task panicked
    #[error("Work loop failed: {0}")]
    LoopFailed(String),

    /// A selected path is not a regular file
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// An I/O error occurred while inspecting local files
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
