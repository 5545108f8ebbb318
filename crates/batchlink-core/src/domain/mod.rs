//! Domain entities and business logic
//!
//! This module contains the core domain types for Batchlink:
//! - Newtypes for type-safe identifiers and validated values
//! - File-name identifier parsing
//! - Work items, their status taxonomy and the work batch
//! - Batch sessions as persisted by session stores
//! - Base records and attachment links
//! - Domain-specific error types

pub mod batch;
pub mod errors;
pub mod identifier;
pub mod newtypes;
pub mod record;
pub mod session;
pub mod work_item;

// Re-export commonly used types
pub use batch::{BatchSummary, WorkBatch};
pub use errors::{DomainError, ServiceError};
pub use identifier::IdentifierFormat;
pub use newtypes::*;
pub use record::{AttachmentLink, BaseRecord};
pub use session::{BatchSession, SessionMeta, SessionStatus};
pub use work_item::{
    CancelReason, IneligibleReason, ItemStatus, SourceFile, SucceededKind, TransferKind, WorkItem,
};
