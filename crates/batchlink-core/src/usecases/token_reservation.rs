//! Upload token reservation use case
//!
//! Fetches asset-store credentials for every eligible item that lacks one,
//! in a single batched request. The token service must answer with exactly
//! one credential per requested file; anything else is a protocol violation
//! that fails the whole reservation.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::domain::{DomainError, IneligibleReason, ItemStatus, ServiceError, WorkBatch};
use crate::ports::ITokenService;

/// Errors that abort a reservation
#[derive(Debug, Error)]
pub enum ReservationError {
    /// The token service could not be used
    #[error("Token service failed: {0}")]
    Service(#[from] ServiceError),

    /// The token service returned the wrong number of credentials
    #[error("Token service returned {received} tokens for {requested} files")]
    CountMismatch {
        /// Number of files sent
        requested: usize,
        /// Number of tokens received
        received: usize,
    },

    /// A token could not be stored on its item
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Use case reserving upload tokens
pub struct TokenReservation {
    token_service: Arc<dyn ITokenService + Send + Sync>,
}

impl TokenReservation {
    /// Creates a new TokenReservation
    pub fn new(token_service: Arc<dyn ITokenService + Send + Sync>) -> Self {
        Self { token_service }
    }

    /// Reserves a token for each eligible item without one
    ///
    /// # Returns
    ///
    /// The number of tokens assigned (zero when no item needed one, in which
    /// case no request is made)
    ///
    /// # Errors
    ///
    /// - `ReservationError::Service` on a failed request; items are untouched
    /// - `ReservationError::CountMismatch` when the response length differs;
    ///   every requested item is marked `Ineligible{protocolError}` and no
    ///   token is assigned
    #[tracing::instrument(skip(self, batch), fields(items = batch.len()))]
    pub async fn reserve(&self, batch: &mut WorkBatch) -> Result<usize, ReservationError> {
        let pending: Vec<usize> = batch
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status().is_eligible() && item.upload_token().is_none())
            .map(|(index, _)| index)
            .collect();

        if pending.is_empty() {
            debug!("No items need an upload token");
            return Ok(0);
        }

        let file_names: Vec<String> = pending
            .iter()
            .map(|&index| batch.items()[index].file_name().to_string())
            .collect();

        let tokens = self.token_service.reserve_tokens(&file_names).await?;

        if tokens.len() != pending.len() {
            error!(
                requested = pending.len(),
                received = tokens.len(),
                "Token service broke the one-token-per-file contract"
            );
            for &index in &pending {
                batch
                    .item_mut(index)?
                    .set_status(ItemStatus::Ineligible(IneligibleReason::ProtocolError));
            }
            return Err(ReservationError::CountMismatch {
                requested: pending.len(),
                received: tokens.len(),
            });
        }

        for (index, token) in pending.iter().zip(tokens) {
            batch.item_mut(*index)?.assign_upload_token(token)?;
        }

        info!(reserved = pending.len(), "Upload tokens reserved");
        Ok(pending.len())
    }
}
