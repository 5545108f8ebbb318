//! Batch engine façade
//!
//! The [`BatchEngine`] ties the ports and use cases together for a host
//! (desktop UI, service, test harness). Every session lives in the session
//! store and is handed to the caller by value.
//!
//! ## Session Flow
//!
//! 1. **Create**: turn selected files into work items and store an idle session
//! 2. **Prepare**: match items to base records, reserve upload tokens
//! 3. **Run**: mark the session running, spawn a [`WorkLoop`], checkpoint
//!    the batch after each finished item
//! 4. **Finish**: take the batch back from the loop and store the idle session
//!
//! A session found running or interrupted when opened is reconciled against
//! the backend before it is returned; it is never resumed automatically.
//!
//! Loops spawned by this engine are tracked by session id until they end.
//! While one is alive its session cannot be opened or started again; a host
//! that dropped its [`RunningBatch`] gets the loop back through
//! [`BatchEngine::attach`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use batchlink_core::config::Config;
use batchlink_core::domain::{
    BatchSession, BatchSummary, IdentifierFormat, RecordId, SessionId, SessionMeta, SourceFile,
    TransferKind, WorkBatch, WorkItem,
};
use batchlink_core::ports::{
    IAssetStore, ILocalFiles, IMatchQueryService, IRecordService, ISessionStore, ITokenService,
};
use batchlink_core::usecases::{
    disambiguate, AttachmentLookup, DeleteOperation, MatchReport, MatchTarget, Matcher,
    Reconciler, TokenReservation, TransferOperation, UploadOperation,
};

use crate::scheduler::{BatchCheckpoint, LoopHandle, LoopSettings, LoopSnapshot, LoopTask, WorkLoop};
use crate::EngineError;

// ============================================================================
// Wiring
// ============================================================================

/// The collaborators a [`BatchEngine`] needs
#[derive(Clone)]
pub struct EnginePorts {
    /// Where sessions are persisted
    pub sessions: Arc<dyn ISessionStore + Send + Sync>,
    /// Batched lookups for matching and reconciliation
    pub query: Arc<dyn IMatchQueryService + Send + Sync>,
    /// Upload credential reservation
    pub tokens: Arc<dyn ITokenService + Send + Sync>,
    /// File byte storage
    pub assets: Arc<dyn IAssetStore + Send + Sync>,
    /// Base record fetch/save
    pub records: Arc<dyn IRecordService + Send + Sync>,
    /// Reading the selected files
    pub files: Arc<dyn ILocalFiles + Send + Sync>,
}

/// Result of preparing a session for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareReport {
    /// Matching outcome
    pub matching: MatchReport,
    /// Tokens reserved by this call
    pub tokens_reserved: usize,
    /// Item counts after preparation
    pub summary: BatchSummary,
}

/// Batch session lifecycle over the configured ports
pub struct BatchEngine {
    sessions: Arc<dyn ISessionStore + Send + Sync>,
    matcher: Matcher,
    reservation: TokenReservation,
    reconciler: Reconciler,
    upload: Arc<dyn TransferOperation>,
    delete: Arc<dyn TransferOperation>,
    settings: LoopSettings,
    identifier_format: IdentifierFormat,
    live: LiveLoops,
}

impl BatchEngine {
    /// Creates a new `BatchEngine`
    ///
    /// # Arguments
    /// * `ports` - Adapters for every collaborator
    /// * `config` - Matching targets and scheduler tunables
    pub fn new(ports: EnginePorts, config: &Config) -> Self {
        let matching = &config.matching;
        let matcher = Matcher::new(
            ports.query.clone(),
            MatchTarget {
                table: matching.base_table.clone(),
                field_path: matching.match_field.clone(),
                display_paths: matching.display_fields.clone(),
            },
        );
        let reconciler = Reconciler::new(
            ports.query.clone(),
            AttachmentLookup {
                table: matching.attachment_table.clone(),
                location_field: matching.attachment_location_field.clone(),
                id_field: matching.attachment_id_field.clone(),
                owner_field: matching.attachment_owner_field.clone(),
            },
        );
        let upload = Arc::new(UploadOperation::new(
            ports.files.clone(),
            ports.assets.clone(),
            ports.records.clone(),
            matching.base_table.clone(),
        ));
        let delete = Arc::new(DeleteOperation::new(
            ports.records.clone(),
            matching.base_table.clone(),
        ));

        Self {
            sessions: ports.sessions,
            matcher,
            reservation: TokenReservation::new(ports.tokens),
            reconciler,
            upload,
            delete,
            settings: LoopSettings::from(&config.scheduler),
            identifier_format: matching.identifier_format(),
            live: LiveLoops::default(),
        }
    }

    // ========================================================================
    // Session management
    // ========================================================================

    /// Creates and stores a new idle session for the selected files
    #[tracing::instrument(skip(self, files), fields(files = files.len()))]
    pub async fn create_session(&self, name: &str, files: Vec<SourceFile>) -> Result<BatchSession> {
        let items = files
            .into_iter()
            .map(|file| WorkItem::from_source(file, &self.identifier_format))
            .collect();
        let session = BatchSession::new(name, WorkBatch::new(items));
        self.sessions
            .put(&session)
            .await
            .context("Failed to store new session")?;
        info!(session_id = %session.id(), items = session.batch().len(), "Session created");
        Ok(session)
    }

    /// Loads a session, reconciling it first if a run was interrupted
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LoopActive` while a loop of this engine still
    /// runs the session, `EngineError::SessionNotFound` for an unknown id, or
    /// the store/query failure. A failed reconciliation leaves the session
    /// stored as interrupted so the next open retries it.
    #[tracing::instrument(skip(self))]
    pub async fn open_session(&self, id: &SessionId) -> Result<BatchSession> {
        self.live.ensure_vacant(id)?;
        let mut session = self
            .sessions
            .get(id)
            .await
            .context("Failed to load session")?
            .ok_or(EngineError::SessionNotFound(*id))?;

        if session.status().is_running() {
            session.mark_interrupted();
            self.sessions
                .put(&session)
                .await
                .context("Failed to mark session interrupted")?;
            warn!(session_id = %id, status = %session.status(), "Found an interrupted run");
        }

        if let Some(kind) = session.status().interrupted_kind() {
            let report = self
                .reconciler
                .reconcile(session.batch_mut(), kind)
                .await
                .context("Failed to reconcile interrupted session")?;
            session.mark_idle();
            self.sessions
                .put(&session)
                .await
                .context("Failed to store reconciled session")?;
            info!(
                session_id = %id,
                recovered = report.recovered,
                interrupted = report.interrupted,
                "Session reconciled"
            );
        }

        Ok(session)
    }

    /// Returns a handle to the session's loop if it is still alive
    pub fn attach(&self, id: &SessionId) -> Option<LoopHandle> {
        self.live.get(id)
    }

    /// Lists stored sessions, most recently updated first
    pub async fn list_sessions(&self) -> Result<Vec<SessionMeta>> {
        self.sessions.list().await.context("Failed to list sessions")
    }

    /// Deletes a session and its audit trail
    #[tracing::instrument(skip(self))]
    pub async fn discard_session(&self, id: &SessionId) -> Result<()> {
        self.sessions
            .delete(id)
            .await
            .context("Failed to delete session")?;
        info!(session_id = %id, "Session discarded");
        Ok(())
    }

    // ========================================================================
    // Preparation
    // ========================================================================

    /// Matches the session's items and reserves their upload tokens
    ///
    /// The session is stored afterwards, also when token reservation fails,
    /// so items marked `Ineligible{protocolError}` are kept.
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id()))]
    pub async fn prepare_upload(&self, session: &mut BatchSession) -> Result<PrepareReport> {
        ensure_idle(session)?;

        let matching = self
            .matcher
            .match_items(session.batch_mut())
            .await
            .context("Matching failed")?;

        let reserved = self.reservation.reserve(session.batch_mut()).await;
        session.touch();
        self.sessions
            .put(session)
            .await
            .context("Failed to store prepared session")?;
        let tokens_reserved = reserved.context("Upload token reservation failed")?;

        let summary = session.batch().summary();
        info!(
            eligible = summary.eligible,
            ambiguous = matching.ambiguous,
            unmatched = matching.unmatched,
            tokens_reserved,
            "Session prepared for upload"
        );
        Ok(PrepareReport {
            matching,
            tokens_reserved,
            summary,
        })
    }

    /// Applies a disambiguation choice and stores the session
    ///
    /// Returns the number of items updated.
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id()))]
    pub async fn disambiguate(
        &self,
        session: &mut BatchSession,
        index: usize,
        chosen: RecordId,
        apply_to_all: bool,
    ) -> Result<usize> {
        ensure_idle(session)?;
        let updated = disambiguate(session.batch_mut(), index, chosen, apply_to_all)?;
        session.touch();
        self.sessions
            .put(session)
            .await
            .context("Failed to store session")?;
        Ok(updated)
    }

    // ========================================================================
    // Runs
    // ========================================================================

    /// Starts uploading the session's eligible items
    ///
    /// Item statuses from [`prepare_upload`](Self::prepare_upload) are kept.
    pub async fn start_upload(&self, session: BatchSession) -> Result<RunningBatch> {
        self.start_run(session, TransferKind::Upload).await
    }

    /// Starts unlinking the session's linked items
    pub async fn start_delete(&self, session: BatchSession) -> Result<RunningBatch> {
        self.start_run(session, TransferKind::Delete).await
    }

    #[tracing::instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn start_run(&self, mut session: BatchSession, kind: TransferKind) -> Result<RunningBatch> {
        self.live.ensure_vacant(session.id())?;
        ensure_idle(&session)?;
        session
            .batch_mut()
            .begin_run(kind, kind == TransferKind::Upload);
        session.begin_run(kind)?;
        self.sessions
            .put(&session)
            .await
            .context("Failed to store session before run")?;

        let operation = match kind {
            TransferKind::Upload => self.upload.clone(),
            TransferKind::Delete => self.delete.clone(),
        };
        let checkpoint = Arc::new(SessionCheckpoint {
            sessions: self.sessions.clone(),
            session: Mutex::new(session.clone()),
        });
        let task = WorkLoop::new(operation, self.settings)
            .with_checkpoint(checkpoint)
            .spawn(session.batch().clone());
        self.live.insert(*session.id(), task.handle());

        info!(kind = %kind, items = session.batch().len(), "Run started");
        Ok(RunningBatch {
            session,
            task,
            sessions: self.sessions.clone(),
            live: self.live.clone(),
        })
    }
}

fn ensure_idle(session: &BatchSession) -> Result<(), EngineError> {
    if session.status().is_idle() {
        Ok(())
    } else {
        Err(EngineError::SessionBusy {
            id: *session.id(),
            status: session.status(),
        })
    }
}

/// Handles of the loops spawned by one engine, by session
#[derive(Clone, Default)]
struct LiveLoops {
    loops: Arc<std::sync::Mutex<HashMap<SessionId, LoopHandle>>>,
}

impl LiveLoops {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SessionId, LoopHandle>> {
        self.loops.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the handle of a live loop, forgetting one that has ended
    fn get(&self, id: &SessionId) -> Option<LoopHandle> {
        let mut loops = self.lock();
        let handle = loops.get(id)?.clone();
        if handle.is_closed() {
            debug!(session_id = %id, "Forgetting ended work loop");
            loops.remove(id);
            return None;
        }
        Some(handle)
    }

    fn ensure_vacant(&self, id: &SessionId) -> Result<(), EngineError> {
        match self.get(id) {
            Some(_) => Err(EngineError::LoopActive(*id)),
            None => Ok(()),
        }
    }

    fn insert(&self, id: SessionId, handle: LoopHandle) {
        self.lock().insert(id, handle);
    }

    fn remove(&self, id: &SessionId) {
        self.lock().remove(id);
    }
}

// ============================================================================
// Running batch
// ============================================================================

/// A session whose batch is owned by a running work loop
///
/// Dropping it leaves the loop running; the engine keeps its handle until
/// the loop ends.
pub struct RunningBatch {
    session: BatchSession,
    task: LoopTask,
    sessions: Arc<dyn ISessionStore + Send + Sync>,
    live: LiveLoops,
}

impl RunningBatch {
    /// Returns the id of the running session
    pub fn session_id(&self) -> &SessionId {
        self.session.id()
    }

    /// Returns a new handle to the loop
    pub fn handle(&self) -> LoopHandle {
        self.task.handle()
    }

    /// Returns the latest progress snapshot
    pub fn snapshot(&self) -> LoopSnapshot {
        self.task.handle().snapshot()
    }

    /// Waits for the loop to end and stores the session as idle
    ///
    /// Returns the session with the final per-item statuses.
    #[tracing::instrument(skip(self), fields(session_id = %self.session.id()))]
    pub async fn finish(self) -> Result<BatchSession> {
        let Self {
            mut session,
            task,
            sessions,
            live,
        } = self;

        let joined = task.join().await;
        live.remove(session.id());
        let batch = joined?;
        session.replace_batch(batch);
        session.mark_idle();
        sessions
            .put(&session)
            .await
            .context("Failed to store finished session")?;

        let summary = session.batch().summary();
        info!(
            succeeded = summary.succeeded,
            cancelled = summary.cancelled,
            ineligible = summary.ineligible,
            "Run finished"
        );
        Ok(session)
    }
}

/// Stores the session with the loop's latest batch
struct SessionCheckpoint {
    sessions: Arc<dyn ISessionStore + Send + Sync>,
    session: Mutex<BatchSession>,
}

#[async_trait]
impl BatchCheckpoint for SessionCheckpoint {
    async fn checkpoint(&self, batch: &WorkBatch) -> anyhow::Result<()> {
        let mut session = self.session.lock().await;
        session.replace_batch(batch.clone());
        debug!(session_id = %session.id(), cursor = batch.cursor(), "Checkpointing session");
        self.sessions
            .put(&session)
            .await
            .context("Failed to checkpoint session")
    }
}

// ============================================================================
// Unit tests
// ============================================================================
