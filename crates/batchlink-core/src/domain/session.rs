//! BatchSession domain entity
//!
//! A BatchSession is the persisted document a host keeps for one batch: the
//! work items, the status of the most recent run and bookkeeping
//! timestamps. Its status tag is what lets a reopened session detect that a
//! run was interrupted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::batch::WorkBatch;
use super::errors::DomainError;
use super::newtypes::SessionId;
use super::work_item::TransferKind;

/// Status tag of a batch session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    /// No run is active
    #[default]
    Idle,
    /// An upload run is active
    Uploading,
    /// A delete run is active
    Deleting,
    /// An upload run was found interrupted
    UploadInterrupted,
    /// A delete run was found interrupted
    DeletingInterrupted,
}

impl SessionStatus {
    /// Returns true while a run is marked active
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Uploading | SessionStatus::Deleting)
    }

    /// Returns true if the session is idle
    pub fn is_idle(&self) -> bool {
        matches!(self, SessionStatus::Idle)
    }

    /// Returns the kind of run that was interrupted, if any
    ///
    /// A stored `uploading`/`deleting` tag means the run never finished, so
    /// it counts as interrupted as well.
    pub fn interrupted_kind(&self) -> Option<TransferKind> {
        match self {
            SessionStatus::Uploading | SessionStatus::UploadInterrupted => {
                Some(TransferKind::Upload)
            }
            SessionStatus::Deleting | SessionStatus::DeletingInterrupted => {
                Some(TransferKind::Delete)
            }
            SessionStatus::Idle => None,
        }
    }

    /// Returns the tag as stored by session stores
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Uploading => "uploading",
            SessionStatus::Deleting => "deleting",
            SessionStatus::UploadInterrupted => "uploadInterrupted",
            SessionStatus::DeletingInterrupted => "deletingInterrupted",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(SessionStatus::Idle),
            "uploading" => Ok(SessionStatus::Uploading),
            "deleting" => Ok(SessionStatus::Deleting),
            "uploadInterrupted" => Ok(SessionStatus::UploadInterrupted),
            "deletingInterrupted" => Ok(SessionStatus::DeletingInterrupted),
            other => Err(DomainError::ValidationFailed(format!(
                "Unknown session status: {other}"
            ))),
        }
    }
}

/// A persisted batch of work items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSession {
    id: SessionId,
    name: String,
    /// Kind of the most recent run
    kind: Option<TransferKind>,
    status: SessionStatus,
    batch: WorkBatch,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BatchSession {
    /// Creates a new idle session around a batch
    ///
    /// # Arguments
    /// * `name` - Display name of the session
    /// * `batch` - The work items selected for it
    pub fn new(name: impl Into<String>, batch: WorkBatch) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            name: name.into(),
            kind: None,
            status: SessionStatus::Idle,
            batch,
            created_at: now,
            updated_at: now,
        }
    }

    // --- Getters ---

    /// Returns the session's unique identifier
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of the most recent run
    pub fn kind(&self) -> Option<TransferKind> {
        self.kind
    }

    /// Returns the status tag
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns the work batch
    pub fn batch(&self) -> &WorkBatch {
        &self.batch
    }

    /// Returns the work batch mutably
    pub fn batch_mut(&mut self) -> &mut WorkBatch {
        &mut self.batch
    }

    /// Returns when the session was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the session was last changed
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // --- Lifecycle ---

    /// Marks a run of `kind` as active
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` unless the session is idle.
    pub fn begin_run(&mut self, kind: TransferKind) -> Result<(), DomainError> {
        if !self.status.is_idle() {
            return Err(DomainError::InvalidState {
                from: self.status.to_string(),
                to: kind.to_string(),
            });
        }
        self.kind = Some(kind);
        self.status = match kind {
            TransferKind::Upload => SessionStatus::Uploading,
            TransferKind::Delete => SessionStatus::Deleting,
        };
        self.touch();
        Ok(())
    }

    /// Marks an active run as interrupted
    ///
    /// Returns the kind of the interrupted run, or `None` if the session was
    /// not running.
    pub fn mark_interrupted(&mut self) -> Option<TransferKind> {
        let kind = match self.status {
            SessionStatus::Uploading => SessionStatus::UploadInterrupted,
            SessionStatus::Deleting => SessionStatus::DeletingInterrupted,
            _ => return None,
        };
        self.status = kind;
        self.touch();
        self.status.interrupted_kind()
    }

    /// Returns the session to idle
    pub fn mark_idle(&mut self) {
        self.status = SessionStatus::Idle;
        self.touch();
    }

    /// Replaces the batch with the one handed back by a finished run
    pub fn replace_batch(&mut self, batch: WorkBatch) {
        self.batch = batch;
        self.touch();
    }

    /// Renames the session
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    /// Updates the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Returns the listing summary of this session
    pub fn meta(&self) -> SessionMeta {
        SessionMeta {
            id: self.id,
            name: self.name.clone(),
            status: self.status,
            item_count: self.batch.len(),
            updated_at: self.updated_at,
        }
    }
}

/// Listing summary of a stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    /// Session identifier
    pub id: SessionId,
    /// Display name
    pub name: String,
    /// Status tag
    pub status: SessionStatus,
    /// Number of work items
    pub item_count: usize,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}
