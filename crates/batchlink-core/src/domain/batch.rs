//! WorkBatch domain entity
//!
//! An ordered list of work items plus the scheduler's position in it.
//! While a run is active the batch is owned by the work loop; it is handed
//! back when the loop terminates.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::work_item::{CancelReason, ItemStatus, TransferKind, WorkItem};

/// Ordered work items, cursor and per-index retry counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkBatch {
    items: Vec<WorkItem>,
    /// Index of the next unprocessed item
    cursor: usize,
    #[serde(default)]
    retries: BTreeMap<usize, u32>,
}

impl WorkBatch {
    /// Creates a batch positioned at the first item
    pub fn new(items: Vec<WorkItem>) -> Self {
        Self {
            items,
            cursor: 0,
            retries: BTreeMap::new(),
        }
    }

    // --- Getters ---

    /// Returns all items in order
    pub fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Returns mutable access to all items
    pub fn items_mut(&mut self) -> &mut [WorkItem] {
        &mut self.items
    }

    /// Returns the number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the batch holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the index of the next unprocessed item
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns true once the cursor has passed the last item
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.items.len()
    }

    /// Returns the item at `index`
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IndexOutOfRange` if `index` is past the end.
    pub fn item(&self, index: usize) -> Result<&WorkItem, DomainError> {
        let len = self.items.len();
        self.items
            .get(index)
            .ok_or(DomainError::IndexOutOfRange { index, len })
    }

    /// Returns the item at `index` mutably
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IndexOutOfRange` if `index` is past the end.
    pub fn item_mut(&mut self, index: usize) -> Result<&mut WorkItem, DomainError> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(DomainError::IndexOutOfRange { index, len })
    }

    /// Replaces the item at `index` with its updated copy
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IndexOutOfRange` if `index` is past the end.
    pub fn replace_item(&mut self, index: usize, item: WorkItem) -> Result<(), DomainError> {
        *self.item_mut(index)? = item;
        Ok(())
    }

    // --- Cursor and retries ---

    /// Moves the cursor forward to `index`
    ///
    /// A target behind the current cursor is ignored; the cursor never
    /// moves backward within a run.
    pub fn advance_to(&mut self, index: usize) {
        self.cursor = self.cursor.max(index.min(self.items.len()));
    }

    /// Returns the number of retries recorded for `index`
    pub fn retries_at(&self, index: usize) -> u32 {
        self.retries.get(&index).copied().unwrap_or(0)
    }

    /// Increments the retry counter for `index` and returns the new count
    pub fn record_retry(&mut self, index: usize) -> u32 {
        let count = self.retries.entry(index).or_insert(0);
        *count += 1;
        *count
    }

    /// Rewinds the batch for a new run
    ///
    /// Resets the cursor and retry counters. Item statuses are
    /// re-evaluated for `kind` unless `keep_statuses` is set (an upload run
    /// keeps the statuses its preparation step produced).
    pub fn begin_run(&mut self, kind: TransferKind, keep_statuses: bool) {
        self.cursor = 0;
        self.retries.clear();
        if !keep_statuses {
            for item in &mut self.items {
                item.refresh_status(kind);
            }
        }
    }

    /// Applies the stopping rule from `index` onward
    ///
    /// Every dispatchable item at or after `index` becomes
    /// `Cancelled{aborted}`; items already ineligible keep their reason.
    pub fn abort_from(&mut self, index: usize) {
        for item in self.items.iter_mut().skip(index) {
            if matches!(item.status(), ItemStatus::Eligible | ItemStatus::InFlight) {
                item.set_status(ItemStatus::Cancelled(CancelReason::Aborted));
            }
        }
        self.advance_to(self.items.len());
    }

    /// Drops every item's local file reference
    pub fn detach_files(&mut self) {
        for item in &mut self.items {
            item.detach_source_file();
        }
    }

    /// Counts items per status family
    pub fn summary(&self) -> BatchSummary {
        let mut summary = BatchSummary {
            total: self.items.len(),
            ..BatchSummary::default()
        };
        for item in &self.items {
            match item.status() {
                ItemStatus::Eligible => summary.eligible += 1,
                ItemStatus::Ineligible(_) => summary.ineligible += 1,
                ItemStatus::InFlight => summary.in_flight += 1,
                ItemStatus::Succeeded(_) => summary.succeeded += 1,
                ItemStatus::Cancelled(_) => summary.cancelled += 1,
            }
        }
        summary
    }
}

/// Per-status item counts of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    /// Number of items
    pub total: usize,
    /// Items ready to transfer
    pub eligible: usize,
    /// Items that will be skipped
    pub ineligible: usize,
    /// Items currently transferring
    pub in_flight: usize,
    /// Items transferred
    pub succeeded: usize,
    /// Items whose transfer did not finish
    pub cancelled: usize,
}
