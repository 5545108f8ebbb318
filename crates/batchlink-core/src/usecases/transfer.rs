//! Transfer operations
//!
//! A transfer takes one work item and its resolved target record and
//! either finishes it (successfully or with a terminal reason) or asks the
//! scheduler to retry it later. Only transient transport failures produce a
//! retry request; every other collaborator failure is terminal for the item.
//!
//! Upload: read bytes, store them, fetch the target, append a link at
//! ordinal = current count, save, then recover the new link's id.
//!
//! Delete: fetch the target, remove the linked sub-record, save.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{
    AssetLocation, AttachmentId, BaseRecord, CancelReason, IneligibleReason, ItemStatus,
    RecordId, ServiceError, SucceededKind, TransferKind, WorkItem,
};
use crate::ports::{IAssetStore, ILocalFiles, IRecordService};

// ============================================================================
// Outcome and trait
// ============================================================================

/// Result of one transfer attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransferOutcome {
    /// The item reached a status the scheduler records as final for this run
    Completed(WorkItem),
    /// A transient failure; the item should be retried after a backoff
    RetryRequested {
        /// The item, with any progress made so far
        item: WorkItem,
        /// The failure that triggered the request
        reason: ServiceError,
    },
}

impl TransferOutcome {
    /// Returns the carried item
    pub fn item(&self) -> &WorkItem {
        match self {
            TransferOutcome::Completed(item) => item,
            TransferOutcome::RetryRequested { item, .. } => item,
        }
    }

    /// Consumes the outcome and returns the carried item
    pub fn into_item(self) -> WorkItem {
        match self {
            TransferOutcome::Completed(item) => item,
            TransferOutcome::RetryRequested { item, .. } => item,
        }
    }

    /// Returns true for a retry request
    pub fn is_retry(&self) -> bool {
        matches!(self, TransferOutcome::RetryRequested { .. })
    }
}

/// One direction of transfer, driven by the work loop
#[async_trait::async_trait]
pub trait TransferOperation: Send + Sync {
    /// The kind of run this operation performs
    fn kind(&self) -> TransferKind;

    /// Processes one item against its resolved target record
    async fn transfer(&self, item: WorkItem, target: RecordId) -> TransferOutcome;
}

/// What a collaborator failure means for the item
enum Failure {
    Retry(ServiceError),
    Final(ItemStatus),
}

impl Failure {
    /// Classifies a failure of a fetch, save or store call
    fn classify(err: ServiceError) -> Self {
        match err {
            e if e.is_transient() => Failure::Retry(e),
            ServiceError::Conflict(_) => {
                Failure::Final(ItemStatus::Cancelled(CancelReason::SaveConflict))
            }
            _ => Failure::Final(ItemStatus::Cancelled(CancelReason::TransportUnavailable)),
        }
    }

    fn into_outcome(self, mut item: WorkItem) -> TransferOutcome {
        match self {
            Failure::Retry(reason) => TransferOutcome::RetryRequested { item, reason },
            Failure::Final(status) => {
                item.set_status(status);
                TransferOutcome::Completed(item)
            }
        }
    }
}

// ============================================================================
// Identity resolution
// ============================================================================

/// Finds the id the backend assigned to a freshly appended link
///
/// Links matching both `ordinal` and `location` are considered first; when
/// none match, links matching `location` alone are. Exactly one match is
/// required; zero or several yield `None`, never a guess.
pub fn resolve_new_attachment(
    saved: &BaseRecord,
    ordinal: u32,
    location: &AssetLocation,
) -> Option<AttachmentId> {
    let at_location = saved.attachments_at(location);

    let by_ordinal: Vec<_> = at_location
        .iter()
        .filter(|link| link.ordinal == ordinal)
        .collect();

    let chosen = match by_ordinal.as_slice() {
        [only] => Some(**only),
        [] => match at_location.as_slice() {
            [only] => Some(*only),
            _ => None,
        },
        _ => None,
    };

    chosen.and_then(|link| link.id)
}

// ============================================================================
// Upload
// ============================================================================

/// Uploads a file and links it to its target record
pub struct UploadOperation {
    files: Arc<dyn ILocalFiles + Send + Sync>,
    assets: Arc<dyn IAssetStore + Send + Sync>,
    records: Arc<dyn IRecordService + Send + Sync>,
    table: String,
}

impl UploadOperation {
    /// Creates a new UploadOperation
    ///
    /// # Arguments
    ///
    /// * `files` - Source of the file bytes
    /// * `assets` - Asset store receiving the bytes
    /// * `records` - Base record service holding the links
    /// * `table` - Base table of the target records
    pub fn new(
        files: Arc<dyn ILocalFiles + Send + Sync>,
        assets: Arc<dyn IAssetStore + Send + Sync>,
        records: Arc<dyn IRecordService + Send + Sync>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            files,
            assets,
            records,
            table: table.into(),
        }
    }

    async fn upload(&self, mut item: WorkItem, target: RecordId) -> Result<WorkItem, (WorkItem, Failure)> {
        if item.linked_attachment_id().is_some() {
            item.set_status(ItemStatus::Ineligible(IneligibleReason::AlreadyProcessed));
            return Ok(item);
        }
        let Some(token) = item.upload_token().cloned() else {
            item.set_status(ItemStatus::Ineligible(IneligibleReason::ProtocolError));
            return Ok(item);
        };
        let Some(source) = item.source_file().cloned() else {
            item.set_status(ItemStatus::Ineligible(IneligibleReason::NoFile));
            return Ok(item);
        };

        let bytes = match self.files.read(&source).await {
            Ok(bytes) => bytes,
            Err(ServiceError::NotFound(_)) => {
                item.set_status(ItemStatus::Ineligible(IneligibleReason::NoFile));
                return Ok(item);
            }
            Err(e) => return Err((item, Failure::classify(e))),
        };

        let location = match self.assets.upload(bytes, item.file_name(), &token).await {
            Ok(location) => location,
            Err(e) => return Err((item, Failure::classify(e))),
        };
        debug!(file = item.file_name(), location = %location, "Asset stored");

        let mut record = match self.records.fetch(&self.table, target).await {
            Ok(record) => record,
            Err(e) => return Err((item, Failure::classify(e))),
        };

        // A retry after a save whose response was lost finds its link already
        // present; resolve it instead of appending a duplicate.
        if record.attachments_at(&location).is_empty() {
            let ordinal = record.append_attachment(location.clone(), item.file_name());
            record = match self.records.save(&self.table, &record).await {
                Ok(saved) => saved,
                Err(e) => return Err((item, Failure::classify(e))),
            };
            self.finish_link(item, &record, ordinal, &location)
        } else {
            let ordinal = record
                .attachments_at(&location)
                .first()
                .map(|link| link.ordinal)
                .unwrap_or_default();
            self.finish_link(item, &record, ordinal, &location)
        }
    }

    fn finish_link(
        &self,
        mut item: WorkItem,
        saved: &BaseRecord,
        ordinal: u32,
        location: &AssetLocation,
    ) -> Result<WorkItem, (WorkItem, Failure)> {
        match resolve_new_attachment(saved, ordinal, location) {
            Some(id) => {
                item.link_attachment(id);
                item.set_status(ItemStatus::Succeeded(SucceededKind::Uploaded));
            }
            None => {
                warn!(
                    file = item.file_name(),
                    record = %saved.id(),
                    ordinal,
                    "Could not identify the new attachment after save"
                );
                item.set_status(ItemStatus::Cancelled(CancelReason::UnresolvedIdentity));
            }
        }
        Ok(item)
    }
}

#[async_trait::async_trait]
impl TransferOperation for UploadOperation {
    fn kind(&self) -> TransferKind {
        TransferKind::Upload
    }

    async fn transfer(&self, item: WorkItem, target: RecordId) -> TransferOutcome {
        match self.upload(item, target).await {
            Ok(item) => TransferOutcome::Completed(item),
            Err((item, failure)) => failure.into_outcome(item),
        }
    }
}

// ============================================================================
// Delete
// ============================================================================

/// Unlinks an attachment from its target record
pub struct DeleteOperation {
    records: Arc<dyn IRecordService + Send + Sync>,
    table: String,
}

impl DeleteOperation {
    /// Creates a new DeleteOperation
    pub fn new(records: Arc<dyn IRecordService + Send + Sync>, table: impl Into<String>) -> Self {
        Self {
            records,
            table: table.into(),
        }
    }

    async fn delete(&self, mut item: WorkItem, target: RecordId) -> Result<WorkItem, (WorkItem, Failure)> {
        let Some(attachment) = item.linked_attachment_id() else {
            item.set_status(ItemStatus::Ineligible(IneligibleReason::AlreadyProcessed));
            return Ok(item);
        };

        let mut record = match self.records.fetch(&self.table, target).await {
            Ok(record) => record,
            Err(e) => return Err((item, Failure::classify(e))),
        };

        if record.remove_attachment(attachment) {
            if let Err(e) = self.records.save(&self.table, &record).await {
                return Err((item, Failure::classify(e)));
            }
        } else {
            debug!(attachment = %attachment, record = %target, "Attachment already gone");
        }

        item.clear_attachment();
        item.set_status(ItemStatus::Succeeded(SucceededKind::Deleted));
        Ok(item)
    }
}

#[async_trait::async_trait]
impl TransferOperation for DeleteOperation {
    fn kind(&self) -> TransferKind {
        TransferKind::Delete
    }

    async fn transfer(&self, item: WorkItem, target: RecordId) -> TransferOutcome {
        match self.delete(item, target).await {
            Ok(item) => TransferOutcome::Completed(item),
            Err((item, failure)) => failure.into_outcome(item),
        }
    }
}
