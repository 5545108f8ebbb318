//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (validation failures, invalid state transitions, disambiguation misuse)
//! and the classified failures reported by collaborator services.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Invalid asset location
    #[error("Invalid asset location: {0}")]
    InvalidLocation(String),

    /// Invalid upload token
    #[error("Invalid upload token: {0}")]
    InvalidToken(String),

    /// Invalid state transition attempt
    #[error("Invalid state transition from {from} to {to}")]
    InvalidState {
        /// The current state
        from: String,
        /// The attempted target state
        to: String,
    },

    /// A work item index outside the batch
    #[error("Item index {index} out of range (batch has {len} items)")]
    IndexOutOfRange {
        /// The requested index
        index: usize,
        /// Number of items in the batch
        len: usize,
    },

    /// The chosen record is not one of the item's match candidates
    #[error("Record {0} is not a match candidate for this item")]
    NotACandidate(String),

    /// An upload token was already reserved for the item
    #[error("Upload token already reserved for {0}")]
    TokenAlreadyReserved(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

/// Classified failure reported by a collaborator service
///
/// Port implementations map their transport-specific errors onto these
/// classes; the Transfer Operation and the scheduler only ever branch on
/// the class, never on the underlying message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service could not be reached or failed transiently (retryable)
    #[error("Transport unavailable: {0}")]
    Transport(String),

    /// Optimistic-concurrency version conflict on save
    #[error("Version conflict: {0}")]
    Conflict(String),

    /// The request/response contract was violated
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// The addressed resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The service refused the request (non-retryable)
    #[error("Rejected: {0}")]
    Rejected(String),
}

impl ServiceError {
    /// Returns true for the only retryable class of failure
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transport(_))
    }

    /// Returns true if this is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServiceError::Conflict(_))
    }
}
