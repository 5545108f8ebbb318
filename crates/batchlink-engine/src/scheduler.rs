//! Work loop scheduler - drives a batch through a transfer operation
//!
//! The [`WorkLoop`] owns a [`WorkBatch`] for the duration of a run and feeds
//! its eligible items, strictly in index order, to a [`TransferOperation`].
//! Hosts talk to the running loop through a detachable [`LoopHandle`].
//!
//! ## Flow
//!
//! ```text
//! LoopHandle ──→ Command ──┐
//! countdown task ──→ Tick ─┼──→ mpsc::Receiver ──→ WorkLoop ──→ watch::Sender<LoopSnapshot>
//! transfer task ──→ Done ──┘                          │
//!                                               BatchCheckpoint
//! ```
//!
//! ## States
//!
//! `AwaitingConfirmation` → `Running` → {`Interrupted` ⇄ `Running`} →
//! `Stopping` → `Stopped` | `Completed`.
//!
//! A transient failure parks the loop in `Interrupted` for the backoff
//! period, counted down by a cancellable tick task. Once an index exhausts
//! its retry budget the loop stops and every remaining dispatchable item is
//! cancelled as aborted. An in-flight transfer always finishes before the
//! loop acts on a stop request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use batchlink_core::config::SchedulerConfig;
use batchlink_core::domain::{
    CancelReason, IneligibleReason, ItemStatus, RecordId, WorkBatch, WorkItem,
};
use batchlink_core::usecases::{TransferOperation, TransferOutcome};

use crate::EngineError;

/// Capacity of the loop's event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Public state and commands
// ============================================================================

/// Visible state of the work loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Spawned, waiting for the host to confirm the run
    AwaitingConfirmation,
    /// Dispatching items
    Running,
    /// Waiting out the backoff before retrying the item at the cursor
    Interrupted {
        /// Time left until the retry
        remaining: Duration,
    },
    /// Stop requested; waiting for the in-flight transfer, if any
    Stopping,
    /// Stopped before the end of the batch
    Stopped,
    /// Every item was handled
    Completed,
}

impl LoopState {
    /// Returns true once the loop has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoopState::Stopped | LoopState::Completed)
    }
}

/// Commands a host can send to a running loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopCommand {
    /// Leave `AwaitingConfirmation` and start dispatching
    Confirm,
    /// Skip the rest of the backoff
    TryNow,
    /// Stop after the in-flight transfer, if any
    Stop,
}

/// Progress as published to hosts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSnapshot {
    /// Current state
    pub state: LoopState,
    /// Items the transfer operation has finished during this run
    pub processed: usize,
    /// Items that were eligible when the run began
    pub total: usize,
    /// Index of the next unprocessed item
    pub cursor: usize,
}

/// Tunables of the work loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopSettings {
    /// Transfer attempts per index before the batch stops
    pub retry_budget: u32,
    /// Wait before retrying a transient failure
    pub backoff: Duration,
    /// Countdown granularity
    pub tick: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            retry_budget: 2,
            backoff: Duration::from_secs(12),
            tick: Duration::from_secs(1),
        }
    }
}

impl From<&SchedulerConfig> for LoopSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            retry_budget: config.retry_budget,
            backoff: config.backoff(),
            tick: config.tick(),
        }
    }
}

/// Sink receiving the batch after every finished item
#[async_trait]
pub trait BatchCheckpoint: Send + Sync {
    /// Persists the current state of the batch
    async fn checkpoint(&self, batch: &WorkBatch) -> anyhow::Result<()>;
}

// ============================================================================
// Handles
// ============================================================================

/// Detachable handle to a running loop
///
/// Dropping every handle does not stop the loop; a handle obtained later
/// from the [`LoopTask`] observes the loop wherever it is.
#[derive(Debug, Clone)]
pub struct LoopHandle {
    events: mpsc::Sender<LoopEvent>,
    snapshots: watch::Receiver<LoopSnapshot>,
}

impl LoopHandle {
    /// Sends a command to the loop
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LoopClosed` if the loop has ended.
    pub async fn send(&self, command: LoopCommand) -> Result<(), EngineError> {
        self.events
            .send(LoopEvent::Command(command))
            .await
            .map_err(|_| EngineError::LoopClosed)
    }

    /// Confirms the run
    pub async fn confirm(&self) -> Result<(), EngineError> {
        self.send(LoopCommand::Confirm).await
    }

    /// Retries immediately instead of waiting out the backoff
    pub async fn try_now(&self) -> Result<(), EngineError> {
        self.send(LoopCommand::TryNow).await
    }

    /// Requests a stop
    pub async fn stop(&self) -> Result<(), EngineError> {
        self.send(LoopCommand::Stop).await
    }

    /// Returns the latest published snapshot
    pub fn snapshot(&self) -> LoopSnapshot {
        *self.snapshots.borrow()
    }

    /// Returns a receiver notified on every transition
    pub fn subscribe(&self) -> watch::Receiver<LoopSnapshot> {
        self.snapshots.clone()
    }

    /// Returns true once the loop task has returned its batch
    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }
}

/// A spawned loop: its handle and the task returning the batch
pub struct LoopTask {
    handle: LoopHandle,
    join: JoinHandle<WorkBatch>,
}

impl LoopTask {
    /// Returns a new handle to the loop
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Waits for the loop to end and takes the batch back
    ///
    /// # Errors
    ///
    /// Returns `EngineError::LoopFailed` if the loop task panicked.
    pub async fn join(self) -> Result<WorkBatch, EngineError> {
        self.join
            .await
            .map_err(|e| EngineError::LoopFailed(e.to_string()))
    }
}

// ============================================================================
// The loop
// ============================================================================

#[derive(Debug)]
enum LoopEvent {
    Command(LoopCommand),
    Tick(u64),
    TransferDone {
        index: usize,
        outcome: Result<TransferOutcome, String>,
    },
}

/// Resumable, retrying, cancellable driver of one batch run
pub struct WorkLoop {
    operation: Arc<dyn TransferOperation>,
    settings: LoopSettings,
    checkpoint: Option<Arc<dyn BatchCheckpoint>>,
}

impl WorkLoop {
    /// Creates a new WorkLoop
    ///
    /// # Arguments
    /// * `operation` - The transfer applied to each eligible item
    /// * `settings` - Retry budget, backoff and tick
    pub fn new(operation: Arc<dyn TransferOperation>, settings: LoopSettings) -> Self {
        Self {
            operation,
            settings,
            checkpoint: None,
        }
    }

    /// Adds a sink receiving the batch after every finished item
    #[must_use]
    pub fn with_checkpoint(mut self, checkpoint: Arc<dyn BatchCheckpoint>) -> Self {
        self.checkpoint = Some(checkpoint);
        self
    }

    /// Spawns the loop on the current runtime
    ///
    /// The loop starts in `AwaitingConfirmation` at the batch's cursor and
    /// owns `batch` until it ends.
    pub fn spawn(self, batch: WorkBatch) -> LoopTask {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let total = batch
            .items()
            .iter()
            .skip(batch.cursor())
            .filter(|item| item.status().is_eligible())
            .count();
        let initial = LoopSnapshot {
            state: LoopState::AwaitingConfirmation,
            processed: 0,
            total,
            cursor: batch.cursor(),
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        info!(
            kind = %self.operation.kind(),
            items = batch.len(),
            eligible = total,
            "Spawning work loop"
        );

        let runner = Runner {
            operation: self.operation,
            settings: self.settings,
            checkpoint: self.checkpoint,
            batch,
            state: LoopState::AwaitingConfirmation,
            processed: 0,
            total,
            in_flight: None,
            countdown: None,
            generation: 0,
            events_tx: events_tx.clone(),
            events_rx,
            snapshots: snapshot_tx,
        };
        let join = tokio::spawn(runner.run());

        LoopTask {
            handle: LoopHandle {
                events: events_tx,
                snapshots: snapshot_rx,
            },
            join,
        }
    }
}

/// State owned by the loop task
struct Runner {
    operation: Arc<dyn TransferOperation>,
    settings: LoopSettings,
    checkpoint: Option<Arc<dyn BatchCheckpoint>>,
    batch: WorkBatch,
    state: LoopState,
    processed: usize,
    total: usize,
    /// Index of the item whose transfer task is running
    in_flight: Option<usize>,
    countdown: Option<CancellationToken>,
    /// Ticks carrying an older generation belong to a cancelled countdown
    generation: u64,
    events_tx: mpsc::Sender<LoopEvent>,
    events_rx: mpsc::Receiver<LoopEvent>,
    snapshots: watch::Sender<LoopSnapshot>,
}

impl Runner {
    async fn run(mut self) -> WorkBatch {
        loop {
            if self.in_flight.is_none() {
                match self.state {
                    LoopState::Running => {
                        self.dispatch_next();
                        continue;
                    }
                    LoopState::Stopping => {
                        self.finish_stop().await;
                        break;
                    }
                    LoopState::Completed | LoopState::Stopped => break,
                    LoopState::AwaitingConfirmation | LoopState::Interrupted { .. } => {}
                }
            }

            // The loop holds a sender itself, so the channel never closes.
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            match event {
                LoopEvent::Command(command) => self.on_command(command),
                LoopEvent::Tick(generation) => self.on_tick(generation),
                LoopEvent::TransferDone { index, outcome } => {
                    self.on_transfer_done(index, outcome).await
                }
            }
        }

        self.cancel_countdown();
        info!(
            state = ?self.state,
            processed = self.processed,
            total = self.total,
            "Work loop ended"
        );
        self.batch
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Starts the next eligible item, or completes the run
    fn dispatch_next(&mut self) {
        let mut index = self.batch.cursor();
        while index < self.batch.len() {
            let item = &self.batch.items()[index];
            if !item.status().is_eligible() {
                debug!(index, status = %item.status(), "Skipping item");
                index += 1;
                continue;
            }
            match item.resolved_target() {
                Some(target) => {
                    self.batch.advance_to(index);
                    self.start_transfer(index, target);
                    return;
                }
                None => {
                    warn!(index, file = item.file_name(), "Eligible item has no single target");
                    self.set_item_status(
                        index,
                        ItemStatus::Ineligible(IneligibleReason::AmbiguousUnresolved),
                    );
                    index += 1;
                }
            }
        }

        self.batch.advance_to(self.batch.len());
        self.set_state(LoopState::Completed);
    }

    fn start_transfer(&mut self, index: usize, target: RecordId) {
        self.set_item_status(index, ItemStatus::InFlight);
        let item: WorkItem = self.batch.items()[index].clone();
        debug!(index, file = item.file_name(), target = %target, "Dispatching transfer");

        let operation = self.operation.clone();
        let events = self.events_tx.clone();
        self.in_flight = Some(index);
        tokio::spawn(async move {
            let transfer = tokio::spawn(async move { operation.transfer(item, target).await });
            let outcome = transfer.await.map_err(|e| e.to_string());
            if events
                .send(LoopEvent::TransferDone { index, outcome })
                .await
                .is_err()
            {
                debug!(index, "Work loop gone before transfer finished");
            }
        });
        self.publish();
    }

    async fn on_transfer_done(&mut self, index: usize, outcome: Result<TransferOutcome, String>) {
        self.in_flight = None;

        match outcome {
            Ok(TransferOutcome::Completed(item)) => {
                debug!(index, status = %item.status(), "Transfer finished");
                self.store_item(index, item);
                self.processed += 1;
                self.batch.advance_to(index + 1);
                self.save_checkpoint().await;
            }
            Ok(TransferOutcome::RetryRequested { mut item, reason }) => {
                item.set_status(ItemStatus::Eligible);
                self.store_item(index, item);
                let attempts = self.batch.record_retry(index);
                warn!(index, attempts, error = %reason, "Transfer requested a retry");

                if self.state == LoopState::Stopping {
                    // Stop was requested while the transfer ran.
                } else if attempts < self.settings.retry_budget {
                    self.start_countdown();
                } else {
                    warn!(index, attempts, "Retry budget exhausted, stopping batch");
                    self.set_state(LoopState::Stopping);
                }
            }
            Err(panic) => {
                error!(index, error = %panic, "Transfer task failed");
                self.set_item_status(
                    index,
                    ItemStatus::Cancelled(CancelReason::TransportUnavailable),
                );
                self.processed += 1;
                self.batch.advance_to(index + 1);
                self.save_checkpoint().await;
            }
        }
        self.publish();
    }

    // ------------------------------------------------------------------------
    // Commands and countdown
    // ------------------------------------------------------------------------

    fn on_command(&mut self, command: LoopCommand) {
        debug!(command = ?command, state = ?self.state, "Work loop command");
        match (command, self.state) {
            (LoopCommand::Confirm, LoopState::AwaitingConfirmation) => {
                self.set_state(LoopState::Running);
            }
            (LoopCommand::TryNow, LoopState::Interrupted { .. }) => {
                info!("Retrying without waiting for the backoff");
                self.resume();
            }
            (
                LoopCommand::Stop,
                LoopState::AwaitingConfirmation | LoopState::Running | LoopState::Interrupted { .. },
            ) => {
                self.cancel_countdown();
                self.set_state(LoopState::Stopping);
            }
            _ => debug!(command = ?command, "Command ignored in current state"),
        }
    }

    fn on_tick(&mut self, generation: u64) {
        if generation != self.generation {
            return;
        }
        let LoopState::Interrupted { remaining } = self.state else {
            return;
        };
        let remaining = remaining.saturating_sub(self.settings.tick);
        if remaining.is_zero() {
            self.resume();
        } else {
            self.set_state(LoopState::Interrupted { remaining });
        }
    }

    fn start_countdown(&mut self) {
        self.cancel_countdown();
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.countdown = Some(token.clone());

        let events = self.events_tx.clone();
        let tick = self.settings.tick;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + tick, tick);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if events.send(LoopEvent::Tick(generation)).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        self.set_state(LoopState::Interrupted {
            remaining: self.settings.backoff,
        });
    }

    fn resume(&mut self) {
        self.cancel_countdown();
        self.set_state(LoopState::Running);
    }

    fn cancel_countdown(&mut self) {
        if let Some(token) = self.countdown.take() {
            token.cancel();
        }
    }

    // ------------------------------------------------------------------------
    // Termination and bookkeeping
    // ------------------------------------------------------------------------

    async fn finish_stop(&mut self) {
        let from = self.batch.cursor();
        info!(index = from, "Stopping work loop");
        self.batch.abort_from(from);
        self.set_state(LoopState::Stopped);
        self.save_checkpoint().await;
    }

    fn store_item(&mut self, index: usize, item: WorkItem) {
        if let Err(e) = self.batch.replace_item(index, item) {
            error!(index, error = %e, "Could not store transferred item");
        }
    }

    fn set_item_status(&mut self, index: usize, status: ItemStatus) {
        match self.batch.item_mut(index) {
            Ok(item) => item.set_status(status),
            Err(e) => error!(index, error = %e, "Could not update item status"),
        }
    }

    async fn save_checkpoint(&self) {
        if let Some(checkpoint) = &self.checkpoint {
            if let Err(e) = checkpoint.checkpoint(&self.batch).await {
                warn!(error = %e, "Batch checkpoint failed");
            }
        }
    }

    fn set_state(&mut self, state: LoopState) {
        if !matches!(
            (self.state, state),
            (LoopState::Interrupted { .. }, LoopState::Interrupted { .. })
        ) {
            info!(from = ?self.state, to = ?state, "Work loop state changed");
        }
        self.state = state;
        self.publish();
    }

    fn publish(&self) {
        self.snapshots.send_replace(LoopSnapshot {
            state: self.state,
            processed: self.processed,
            total: self.total,
            cursor: self.batch.cursor(),
        });
    }
}

// ============================================================================
// Unit tests
// ============================================================================
