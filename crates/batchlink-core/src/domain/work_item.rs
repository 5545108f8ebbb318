//! WorkItem domain entity
//!
//! A WorkItem describes one selected file on its way through matching,
//! token reservation and transfer. Items are created from raw file
//! selections, mutated in place while a batch runs and kept afterwards as
//! audit records until their session is discarded.
//!
//! ## Status taxonomy
//!
//! ```text
//!   Ineligible{reason} ◄── evaluate ──► Eligible ── dispatch ──► InFlight
//!                                                                  │
//!                         ┌──────────────────────┬─────────────────┤
//!                         ▼                      ▼                 ▼
//!              Succeeded{uploaded|deleted}  Cancelled{reason}  Ineligible{noFile}
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::identifier::IdentifierFormat;
use super::newtypes::{AttachmentId, RecordId, UploadToken};

// ============================================================================
// Transfer kind
// ============================================================================

/// Direction of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferKind {
    /// Upload files and link them to their records
    Upload,
    /// Unlink attachments and delete them
    Delete,
}

impl fmt::Display for TransferKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferKind::Upload => write!(f, "upload"),
            TransferKind::Delete => write!(f, "delete"),
        }
    }
}

// ============================================================================
// Status taxonomy
// ============================================================================

/// Why an item cannot be processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum IneligibleReason {
    /// Already linked (upload) or not linked at all (delete)
    AlreadyProcessed,
    /// No local file is available for the item
    NoFile,
    /// The file name does not conform to the identifier format
    UnparseableName,
    /// No record carries the parsed identifier
    NoMatch,
    /// Several records match and none was chosen
    AmbiguousUnresolved,
    /// The token service broke its response contract
    ProtocolError,
}

/// Why a started item did not complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CancelReason {
    /// A collaborator refused the request
    TransportUnavailable,
    /// The base record changed underneath the save
    SaveConflict,
    /// The new attachment could not be identified after save
    UnresolvedIdentity,
    /// The run stopped before reaching the item
    Aborted,
    /// The run was interrupted and reconciliation found no server trace
    FrontendInterrupted,
}

/// Which transfer an item finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SucceededKind {
    /// Uploaded and linked
    Uploaded,
    /// Unlinked and deleted
    Deleted,
}

impl fmt::Display for SucceededKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SucceededKind::Uploaded => write!(f, "uploaded"),
            SucceededKind::Deleted => write!(f, "deleted"),
        }
    }
}

/// Status of a single work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "camelCase")]
pub enum ItemStatus {
    /// Ready to be transferred
    #[default]
    Eligible,
    /// Will be skipped by the scheduler
    Ineligible(IneligibleReason),
    /// Handed to the transfer operation
    InFlight,
    /// Transfer finished
    Succeeded(SucceededKind),
    /// Transfer did not finish
    Cancelled(CancelReason),
}

impl ItemStatus {
    /// Returns true if the scheduler may dispatch the item
    pub fn is_eligible(&self) -> bool {
        matches!(self, ItemStatus::Eligible)
    }

    /// Returns true if the item has a definite outcome from a run
    pub fn is_settled(&self) -> bool {
        !self.is_unfinished()
    }

    /// Returns true for statuses whose server-side outcome is unknown
    ///
    /// These are the statuses reconciliation reconsiders after an
    /// interrupted run.
    pub fn is_unfinished(&self) -> bool {
        matches!(
            self,
            ItemStatus::Eligible
                | ItemStatus::InFlight
                | ItemStatus::Cancelled(CancelReason::Aborted)
                | ItemStatus::Cancelled(CancelReason::FrontendInterrupted)
        )
    }

    /// Returns true for a definite outcome of an earlier run
    ///
    /// Such items are kept as audit records; preparing the batch again does
    /// not re-evaluate them.
    pub fn is_outcome(&self) -> bool {
        matches!(self, ItemStatus::Succeeded(_) | ItemStatus::Cancelled(_)) && self.is_settled()
    }

    /// Returns the status name as a string (without reason)
    pub fn name(&self) -> &'static str {
        match self {
            ItemStatus::Eligible => "Eligible",
            ItemStatus::Ineligible(_) => "Ineligible",
            ItemStatus::InFlight => "InFlight",
            ItemStatus::Succeeded(_) => "Succeeded",
            ItemStatus::Cancelled(_) => "Cancelled",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemStatus::Eligible => write!(f, "eligible"),
            ItemStatus::Ineligible(reason) => write!(f, "ineligible: {reason:?}"),
            ItemStatus::InFlight => write!(f, "in flight"),
            ItemStatus::Succeeded(kind) => write!(f, "succeeded: {kind}"),
            ItemStatus::Cancelled(reason) => write!(f, "cancelled: {reason:?}"),
        }
    }
}

// ============================================================================
// Source file
// ============================================================================

/// Reference to a local file selected for attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    path: PathBuf,
    size_bytes: u64,
}

impl SourceFile {
    /// Creates a new SourceFile
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
        }
    }

    /// Returns the byte source path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the size in bytes at selection time
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Returns the final path component, if it is valid UTF-8
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

// ============================================================================
// WorkItem
// ============================================================================

/// One file's matching, upload and delete state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    /// Display name of the file, kept when the file itself is detached
    file_name: String,
    source_file: Option<SourceFile>,
    parsed_identifier: Option<String>,
    #[serde(default)]
    match_candidates: Vec<RecordId>,
    disambiguated_id: Option<RecordId>,
    linked_attachment_id: Option<AttachmentId>,
    upload_token: Option<UploadToken>,
    #[serde(default)]
    status: ItemStatus,
}

impl WorkItem {
    /// Creates a WorkItem from a selected file
    ///
    /// The identifier is parsed from the file name with `format`.
    pub fn new(
        file_name: impl Into<String>,
        source_file: Option<SourceFile>,
        format: &IdentifierFormat,
    ) -> Self {
        let file_name = file_name.into();
        let parsed_identifier = format.parse_file_name(&file_name);
        let mut item = Self {
            file_name,
            source_file,
            parsed_identifier,
            match_candidates: Vec::new(),
            disambiguated_id: None,
            linked_attachment_id: None,
            upload_token: None,
            status: ItemStatus::Eligible,
        };
        item.refresh_status(TransferKind::Upload);
        item
    }

    /// Creates a WorkItem for a local file, named after its last path component
    pub fn from_source(source: SourceFile, format: &IdentifierFormat) -> Self {
        let name = source
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| source.path().display().to_string());
        Self::new(name, Some(source), format)
    }

    // --- Getters ---

    /// Returns the file name
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the local file reference, if still attached
    pub fn source_file(&self) -> Option<&SourceFile> {
        self.source_file.as_ref()
    }

    /// Returns the identifier parsed from the file name
    pub fn parsed_identifier(&self) -> Option<&str> {
        self.parsed_identifier.as_deref()
    }

    /// Returns the ordered candidate record ids
    pub fn match_candidates(&self) -> &[RecordId] {
        &self.match_candidates
    }

    /// Returns the user-chosen record id
    pub fn disambiguated_id(&self) -> Option<RecordId> {
        self.disambiguated_id
    }

    /// Returns the id of the linked attachment sub-record
    pub fn linked_attachment_id(&self) -> Option<AttachmentId> {
        self.linked_attachment_id
    }

    /// Returns the reserved upload credential
    pub fn upload_token(&self) -> Option<&UploadToken> {
        self.upload_token.as_ref()
    }

    /// Returns the current status
    pub fn status(&self) -> ItemStatus {
        self.status
    }

    // --- Matching ---

    /// Returns the single record the item would be attached to
    ///
    /// This is the disambiguated id when one was chosen, otherwise the sole
    /// candidate. Several candidates without a choice yield `None`.
    pub fn resolved_target(&self) -> Option<RecordId> {
        if let Some(chosen) = self.disambiguated_id {
            return Some(chosen);
        }
        match self.match_candidates.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Returns true when several candidates exist and none was chosen
    pub fn is_ambiguous(&self) -> bool {
        self.match_candidates.len() > 1 && self.disambiguated_id.is_none()
    }

    /// Replaces the candidate set with a fresh match result
    ///
    /// Duplicates are removed keeping first occurrence order. A previous
    /// disambiguation that is no longer a candidate is dropped.
    pub fn set_match_candidates(&mut self, candidates: Vec<RecordId>) {
        let mut unique: Vec<RecordId> = Vec::with_capacity(candidates.len());
        for id in candidates {
            if !unique.contains(&id) {
                unique.push(id);
            }
        }
        self.match_candidates = unique;

        if let Some(chosen) = self.disambiguated_id {
            if !self.match_candidates.contains(&chosen) {
                self.disambiguated_id = None;
            }
        }
    }

    /// Records the user's choice among the candidates
    ///
    /// # Errors
    ///
    /// Returns `DomainError::NotACandidate` if `chosen` is not a candidate.
    pub fn disambiguate(&mut self, chosen: RecordId) -> Result<(), DomainError> {
        if !self.match_candidates.contains(&chosen) {
            return Err(DomainError::NotACandidate(chosen.to_string()));
        }
        self.disambiguated_id = Some(chosen);
        Ok(())
    }

    // --- Transfer bookkeeping ---

    /// Stores the reserved upload credential
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TokenAlreadyReserved` if a token is already set;
    /// a reserved token is never replaced.
    pub fn assign_upload_token(&mut self, token: UploadToken) -> Result<(), DomainError> {
        if self.upload_token.is_some() {
            return Err(DomainError::TokenAlreadyReserved(self.file_name.clone()));
        }
        self.upload_token = Some(token);
        Ok(())
    }

    /// Records the attachment sub-record the file was linked as
    pub fn link_attachment(&mut self, id: AttachmentId) {
        self.linked_attachment_id = Some(id);
    }

    /// Forgets the linked attachment after a confirmed delete
    pub fn clear_attachment(&mut self) {
        self.linked_attachment_id = None;
    }

    /// Drops the local file reference
    pub fn detach_source_file(&mut self) {
        self.source_file = None;
    }

    /// Sets the status directly
    pub fn set_status(&mut self, status: ItemStatus) {
        self.status = status;
    }

    // --- Eligibility ---

    /// Computes the eligibility status for a run of the given kind
    ///
    /// Precedence: alreadyProcessed, noFile, unparseableName, noMatch,
    /// ambiguousUnresolved, then Eligible. Delete runs do not need the
    /// local file.
    pub fn evaluate(&self, kind: TransferKind) -> ItemStatus {
        match kind {
            TransferKind::Upload => {
                if self.linked_attachment_id.is_some() {
                    return ItemStatus::Ineligible(IneligibleReason::AlreadyProcessed);
                }
                if self.source_file.is_none() {
                    return ItemStatus::Ineligible(IneligibleReason::NoFile);
                }
            }
            TransferKind::Delete => {
                if self.linked_attachment_id.is_none() {
                    return ItemStatus::Ineligible(IneligibleReason::AlreadyProcessed);
                }
            }
        }

        if self.parsed_identifier.is_none() {
            return ItemStatus::Ineligible(IneligibleReason::UnparseableName);
        }
        if self.match_candidates.is_empty() {
            return ItemStatus::Ineligible(IneligibleReason::NoMatch);
        }
        if self.resolved_target().is_none() {
            return ItemStatus::Ineligible(IneligibleReason::AmbiguousUnresolved);
        }
        ItemStatus::Eligible
    }

    /// Re-evaluates and stores the eligibility status
    pub fn refresh_status(&mut self, kind: TransferKind) {
        self.status = self.evaluate(kind);
    }
}
