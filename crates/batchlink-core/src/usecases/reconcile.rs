//! Reconciliation use case
//!
//! After a run was interrupted (crash, reload, closed window) the stored
//! statuses of unfinished items cannot be trusted: the last transfer may
//! have completed server-side without the result being recorded. The
//! reconciler asks the backend which attachment sub-records actually exist
//! and rewrites those items accordingly. Running it twice yields the same
//! batch.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::domain::{
    AttachmentId, CancelReason, ItemStatus, RecordId, SucceededKind, TransferKind, WorkBatch,
};
use crate::ports::{IMatchQueryService, MatchQuery};

/// Where attachment sub-records are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentLookup {
    /// Attachment table
    pub table: String,
    /// Field holding the asset location
    pub location_field: String,
    /// Field holding the attachment id
    pub id_field: String,
    /// Field referencing the owning base record
    pub owner_field: String,
}

/// Outcome of a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Unfinished items examined
    pub examined: usize,
    /// Items found completed server-side
    pub recovered: usize,
    /// Items marked `Cancelled{frontendInterrupted}`
    pub interrupted: usize,
}

/// Use case rebuilding item state from server truth
pub struct Reconciler {
    query_service: Arc<dyn IMatchQueryService + Send + Sync>,
    lookup: AttachmentLookup,
}

impl Reconciler {
    /// Creates a new Reconciler
    pub fn new(
        query_service: Arc<dyn IMatchQueryService + Send + Sync>,
        lookup: AttachmentLookup,
    ) -> Self {
        Self {
            query_service,
            lookup,
        }
    }

    /// Reconciles the unfinished items of an interrupted run of `kind`
    ///
    /// Items with a definite outcome are left as they are.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup query fails; the batch is untouched.
    #[tracing::instrument(skip(self, batch), fields(items = batch.len()))]
    pub async fn reconcile(&self, batch: &mut WorkBatch, kind: TransferKind) -> Result<ReconcileReport> {
        let report = match kind {
            TransferKind::Upload => self.reconcile_uploads(batch).await?,
            TransferKind::Delete => self.reconcile_deletes(batch).await?,
        };
        info!(
            kind = %kind,
            examined = report.examined,
            recovered = report.recovered,
            interrupted = report.interrupted,
            "Reconciliation complete"
        );
        Ok(report)
    }

    async fn reconcile_uploads(&self, batch: &mut WorkBatch) -> Result<ReconcileReport> {
        let pending: Vec<usize> = batch
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status().is_unfinished() && item.linked_attachment_id().is_none())
            .map(|(index, _)| index)
            .collect();

        let mut report = ReconcileReport {
            examined: pending.len(),
            ..ReconcileReport::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let mut locations: Vec<String> = Vec::new();
        for &index in &pending {
            if let Some(token) = batch.items()[index].upload_token() {
                let location = token.location().to_string();
                if !locations.contains(&location) {
                    locations.push(location);
                }
            }
        }

        // location -> (attachment id, owning record)
        let mut found: HashMap<String, Vec<(AttachmentId, Option<RecordId>)>> = HashMap::new();
        if !locations.is_empty() {
            let query = MatchQuery::new(
                self.lookup.table.clone(),
                self.lookup.location_field.clone(),
                locations,
            )
            .with_display_paths(vec![self.lookup.owner_field.clone()]);
            let rows = self
                .query_service
                .query(&query)
                .await
                .context("Failed to look up uploaded attachments")?;
            for row in rows {
                let owner = row
                    .display_values
                    .first()
                    .and_then(|v| v.as_deref())
                    .and_then(|v| v.parse::<RecordId>().ok());
                found
                    .entry(row.key_value)
                    .or_default()
                    .push((AttachmentId::new(row.record_id.as_i64()), owner));
            }
        }

        let mut claimed: HashSet<AttachmentId> = batch
            .items()
            .iter()
            .filter_map(|item| item.linked_attachment_id())
            .collect();

        for index in pending {
            let item = batch.item_mut(index)?;
            let target = item.resolved_target();
            let hit = item.upload_token().and_then(|token| {
                found
                    .get(token.location().as_str())
                    .into_iter()
                    .flatten()
                    .find(|(id, owner)| *owner == target && target.is_some() && !claimed.contains(id))
                    .map(|(id, _)| *id)
            });

            match hit {
                Some(id) => {
                    debug!(index, attachment = %id, "Upload found on server");
                    claimed.insert(id);
                    item.link_attachment(id);
                    item.set_status(ItemStatus::Succeeded(SucceededKind::Uploaded));
                    report.recovered += 1;
                }
                None => {
                    item.set_status(ItemStatus::Cancelled(CancelReason::FrontendInterrupted));
                    report.interrupted += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_deletes(&self, batch: &mut WorkBatch) -> Result<ReconcileReport> {
        let pending: Vec<(usize, AttachmentId)> = batch
            .items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.status().is_unfinished())
            .filter_map(|(index, item)| item.linked_attachment_id().map(|id| (index, id)))
            .collect();

        let mut report = ReconcileReport {
            examined: pending.len(),
            ..ReconcileReport::default()
        };
        if pending.is_empty() {
            return Ok(report);
        }

        let ids: Vec<String> = pending.iter().map(|(_, id)| id.to_string()).collect();
        let query = MatchQuery::new(self.lookup.table.clone(), self.lookup.id_field.clone(), ids);
        let rows = self
            .query_service
            .query(&query)
            .await
            .context("Failed to look up deleted attachments")?;
        let still_present: HashSet<String> = rows.into_iter().map(|row| row.key_value).collect();

        for (index, id) in pending {
            let item = batch.item_mut(index)?;
            if still_present.contains(&id.to_string()) {
                item.set_status(ItemStatus::Cancelled(CancelReason::FrontendInterrupted));
                report.interrupted += 1;
            } else {
                debug!(index, attachment = %id, "Delete found confirmed on server");
                item.clear_attachment();
                item.set_status(ItemStatus::Succeeded(SucceededKind::Deleted));
                report.recovered += 1;
            }
        }

        Ok(report)
    }
}
