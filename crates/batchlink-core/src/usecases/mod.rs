//! Use cases (interactors) for Batchlink
//!
//! This module contains the application use cases that orchestrate
//! domain entities and port interfaces. Use cases are thin coordinators
//! that delegate business rules to domain methods and I/O to ports.
//!
//! ## Use Cases
//!
//! - [`Matcher`] - Batched matching of file identifiers to base records
//! - [`TokenReservation`] - Bulk reservation of upload credentials
//! - [`UploadOperation`] / [`DeleteOperation`] - Per-item transfers
//! - [`Reconciler`] - Rebuilding item state after an interrupted run

pub mod matcher;
pub mod reconcile;
pub mod token_reservation;
pub mod transfer;

#[cfg(test)]
pub(crate) mod test_support;

pub use matcher::{disambiguate, MatchReport, MatchTarget, Matcher};
pub use reconcile::{AttachmentLookup, ReconcileReport, Reconciler};
pub use token_reservation::{ReservationError, TokenReservation};
pub use transfer::{
    resolve_new_attachment, DeleteOperation, TransferOperation, TransferOutcome, UploadOperation,
};
