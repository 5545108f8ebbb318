//! Record matching use case
//!
//! Resolves the identifiers parsed from file names to candidate base
//! records with a single batched query, and applies the user's choice when
//! an identifier matches several records.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::domain::{DomainError, RecordId, TransferKind, WorkBatch};
use crate::ports::{IMatchQueryService, MatchQuery};

/// Where identifiers are looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchTarget {
    /// Base table
    pub table: String,
    /// Identifying field of the base table
    pub field_path: String,
    /// Extra fields returned for disambiguation
    pub display_paths: Vec<String>,
}

/// Outcome of a matching pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    /// Distinct identifiers sent to the query
    pub identifiers_queried: usize,
    /// Items left with exactly one target
    pub resolved: usize,
    /// Items with several candidates and no choice
    pub ambiguous: usize,
    /// Items without any candidate
    pub unmatched: usize,
    /// Display values per candidate record, for disambiguation prompts
    pub display_values: BTreeMap<RecordId, Vec<Option<String>>>,
}

/// Use case matching work items to base records
pub struct Matcher {
    query_service: Arc<dyn IMatchQueryService + Send + Sync>,
    target: MatchTarget,
}

impl Matcher {
    /// Creates a new Matcher
    ///
    /// # Arguments
    ///
    /// * `query_service` - Batched lookup service
    /// * `target` - Table and field the identifiers are compared against
    pub fn new(query_service: Arc<dyn IMatchQueryService + Send + Sync>, target: MatchTarget) -> Self {
        Self {
            query_service,
            target,
        }
    }

    /// Matches every unlinked item of `batch` against the base table
    ///
    /// This method:
    /// 1. Collects the distinct parsed identifiers of items not yet linked
    /// 2. Issues one batched query for them (none when the set is empty)
    /// 3. Replaces each item's candidates with the rows sharing its identifier
    /// 4. Re-evaluates each item's status for an upload run
    ///
    /// Items carrying the outcome of an earlier run are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if the query service fails; items are left untouched.
    #[tracing::instrument(skip(self, batch), fields(items = batch.len()))]
    pub async fn match_items(&self, batch: &mut WorkBatch) -> Result<MatchReport> {
        let mut seen = HashSet::new();
        let identifiers: Vec<String> = batch
            .items()
            .iter()
            .filter(|item| !item.status().is_outcome())
            .filter(|item| item.linked_attachment_id().is_none())
            .filter_map(|item| item.parsed_identifier())
            .filter(|id| seen.insert(id.to_string()))
            .map(str::to_string)
            .collect();

        let mut report = MatchReport {
            identifiers_queried: identifiers.len(),
            ..MatchReport::default()
        };

        let mut candidates: HashMap<String, Vec<RecordId>> = HashMap::new();
        if !identifiers.is_empty() {
            let query = MatchQuery::new(
                self.target.table.clone(),
                self.target.field_path.clone(),
                identifiers,
            )
            .with_display_paths(self.target.display_paths.clone());

            let rows = self
                .query_service
                .query(&query)
                .await
                .context("Failed to query match candidates")?;
            debug!(rows = rows.len(), "Match query returned");

            for row in rows {
                candidates
                    .entry(row.key_value)
                    .or_default()
                    .push(row.record_id);
                report
                    .display_values
                    .entry(row.record_id)
                    .or_insert(row.display_values);
            }
        }

        for item in batch.items_mut() {
            if item.status().is_outcome() {
                continue;
            }
            if item.linked_attachment_id().is_none() {
                if let Some(identifier) = item.parsed_identifier() {
                    let found = candidates.get(identifier).cloned().unwrap_or_default();
                    item.set_match_candidates(found);
                }
            }
            item.refresh_status(TransferKind::Upload);

            if item.linked_attachment_id().is_none() && item.parsed_identifier().is_some() {
                if item.match_candidates().is_empty() {
                    report.unmatched += 1;
                } else if item.is_ambiguous() {
                    report.ambiguous += 1;
                } else {
                    report.resolved += 1;
                }
            }
        }

        info!(
            identifiers = report.identifiers_queried,
            resolved = report.resolved,
            ambiguous = report.ambiguous,
            unmatched = report.unmatched,
            "Matching complete"
        );
        Ok(report)
    }
}

/// Applies a disambiguation choice
///
/// The chosen record is applied to the item at `index`. With
/// `apply_to_all`, it is also applied to every other item that is still
/// ambiguous, shares the item's parsed identifier and has `chosen` among
/// its candidates.
///
/// # Returns
///
/// The number of items updated
///
/// # Errors
///
/// Returns `DomainError::IndexOutOfRange` for a bad index and
/// `DomainError::NotACandidate` if `chosen` is not a candidate of that item.
pub fn disambiguate(
    batch: &mut WorkBatch,
    index: usize,
    chosen: RecordId,
    apply_to_all: bool,
) -> Result<usize, DomainError> {
    let item = batch.item_mut(index)?;
    item.disambiguate(chosen)?;
    item.refresh_status(TransferKind::Upload);
    let identifier = item.parsed_identifier().map(str::to_string);

    let mut updated = 1;
    if apply_to_all {
        if let Some(identifier) = identifier {
            for (i, other) in batch.items_mut().iter_mut().enumerate() {
                if i == index
                    || !other.is_ambiguous()
                    || other.parsed_identifier() != Some(identifier.as_str())
                {
                    continue;
                }
                if other.disambiguate(chosen).is_ok() {
                    other.refresh_status(TransferKind::Upload);
                    updated += 1;
                }
            }
        }
    }

    debug!(index, record = %chosen, updated, "Disambiguation applied");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AttachmentId, CancelReason, IneligibleReason, ItemStatus, SucceededKind};
    use crate::usecases::test_support::{file_item, FakeBackend, BASE_TABLE, MATCH_FIELD};

    fn matcher(backend: Arc<FakeBackend>) -> Matcher {
        Matcher::new(
            backend,
            MatchTarget {
                table: BASE_TABLE.to_string(),
                field_path: MATCH_FIELD.to_string(),
                display_paths: vec!["taxon".to_string()],
            },
        )
    }

    #[tokio::test]
    async fn test_duplicate_identifiers_fan_out() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(1, "100");
        backend.add_record(2, "200");
        let mut batch = WorkBatch::new(vec![
            file_item("100.jpg"),
            file_item("200.jpg"),
            file_item("200.png"),
        ]);

        let report = matcher(backend.clone())
            .match_items(&mut batch)
            .await
            .unwrap();

        assert_eq!(report.identifiers_queried, 2);
        assert_eq!(report.resolved, 3);
        assert_eq!(batch.items()[0].match_candidates(), &[RecordId::new(1)]);
        assert_eq!(batch.items()[1].match_candidates(), &[RecordId::new(2)]);
        assert_eq!(batch.items()[2].match_candidates(), &[RecordId::new(2)]);
        assert!(batch.items().iter().all(|i| i.status() == ItemStatus::Eligible));

        let state = backend.state.lock().unwrap();
        assert_eq!(state.queries.len(), 1);
        assert_eq!(state.queries[0].values, vec!["100", "200"]);
    }

    #[tokio::test]
    async fn test_zero_matches_is_no_match() {
        let backend = Arc::new(FakeBackend::new());
        let mut batch = WorkBatch::new(vec![file_item("999.jpg")]);

        let report = matcher(backend).match_items(&mut batch).await.unwrap();

        assert_eq!(report.unmatched, 1);
        assert_eq!(
            batch.items()[0].status(),
            ItemStatus::Ineligible(IneligibleReason::NoMatch)
        );
    }

    #[tokio::test]
    async fn test_several_records_make_item_ambiguous() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(5, "300");
        backend.add_record(6, "300");
        let mut batch = WorkBatch::new(vec![file_item("300.jpg")]);

        let report = matcher(backend).match_items(&mut batch).await.unwrap();

        assert_eq!(report.ambiguous, 1);
        assert_eq!(report.display_values.len(), 2);
        assert_eq!(
            batch.items()[0].status(),
            ItemStatus::Ineligible(IneligibleReason::AmbiguousUnresolved)
        );
    }

    #[tokio::test]
    async fn test_linked_items_are_not_rematched() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(1, "100");
        let mut linked = file_item("100.jpg");
        linked.link_attachment(AttachmentId::new(7));
        let mut batch = WorkBatch::new(vec![linked]);

        let report = matcher(backend.clone())
            .match_items(&mut batch)
            .await
            .unwrap();

        assert_eq!(report.identifiers_queried, 0);
        assert!(backend.state.lock().unwrap().queries.is_empty());
        assert!(batch.items()[0].match_candidates().is_empty());
        assert_eq!(
            batch.items()[0].status(),
            ItemStatus::Ineligible(IneligibleReason::AlreadyProcessed)
        );
    }

    #[tokio::test]
    async fn test_rematch_keeps_earlier_outcomes() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(1, "100");
        backend.add_record(2, "200");
        backend.add_record(3, "300");
        backend.add_record(4, "400");
        let mut batch = WorkBatch::new(vec![
            file_item("100.jpg"),
            file_item("200.jpg"),
            file_item("300.jpg"),
            file_item("400.jpg"),
        ]);
        let m = matcher(backend.clone());
        m.match_items(&mut batch).await.unwrap();

        let items = batch.items_mut();
        items[0].link_attachment(AttachmentId::new(70));
        items[0].set_status(ItemStatus::Succeeded(SucceededKind::Uploaded));
        items[1].set_status(ItemStatus::Cancelled(CancelReason::SaveConflict));
        items[2].set_status(ItemStatus::Cancelled(CancelReason::UnresolvedIdentity));
        items[3].set_status(ItemStatus::Cancelled(CancelReason::Aborted));

        let report = m.match_items(&mut batch).await.unwrap();

        assert_eq!(report.identifiers_queried, 1);
        assert_eq!(backend.state.lock().unwrap().queries[1].values, vec!["400"]);
        let statuses: Vec<_> = batch.items().iter().map(|i| i.status()).collect();
        assert_eq!(
            statuses,
            vec![
                ItemStatus::Succeeded(SucceededKind::Uploaded),
                ItemStatus::Cancelled(CancelReason::SaveConflict),
                ItemStatus::Cancelled(CancelReason::UnresolvedIdentity),
                ItemStatus::Eligible,
            ]
        );
    }

    #[tokio::test]
    async fn test_rematch_drops_stale_disambiguation() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(5, "300");
        backend.add_record(6, "300");
        let mut batch = WorkBatch::new(vec![file_item("300.jpg")]);
        let m = matcher(backend.clone());
        m.match_items(&mut batch).await.unwrap();
        disambiguate(&mut batch, 0, RecordId::new(6), false).unwrap();

        backend
            .state
            .lock()
            .unwrap()
            .records
            .remove(&RecordId::new(6));
        backend.add_record(7, "300");
        m.match_items(&mut batch).await.unwrap();

        assert_eq!(batch.items()[0].disambiguated_id(), None);
        assert_eq!(
            batch.items()[0].status(),
            ItemStatus::Ineligible(IneligibleReason::AmbiguousUnresolved)
        );
    }

    #[tokio::test]
    async fn test_disambiguate_apply_to_all() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(5, "300");
        backend.add_record(6, "300");
        backend.add_record(8, "400");
        backend.add_record(9, "400");
        let mut batch = WorkBatch::new(vec![
            file_item("300.jpg"),
            file_item("300.png"),
            file_item("400.jpg"),
        ]);
        matcher(backend).match_items(&mut batch).await.unwrap();

        let updated = disambiguate(&mut batch, 0, RecordId::new(5), true).unwrap();

        assert_eq!(updated, 2);
        assert_eq!(batch.items()[1].resolved_target(), Some(RecordId::new(5)));
        assert_eq!(batch.items()[1].status(), ItemStatus::Eligible);
        assert!(batch.items()[2].is_ambiguous());
    }

    #[tokio::test]
    async fn test_disambiguate_single_item_only() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(5, "300");
        backend.add_record(6, "300");
        let mut batch = WorkBatch::new(vec![file_item("300.jpg"), file_item("300.png")]);
        matcher(backend).match_items(&mut batch).await.unwrap();

        let updated = disambiguate(&mut batch, 1, RecordId::new(6), false).unwrap();

        assert_eq!(updated, 1);
        assert!(batch.items()[0].is_ambiguous());
        assert_eq!(batch.items()[1].resolved_target(), Some(RecordId::new(6)));
    }

    #[tokio::test]
    async fn test_disambiguate_rejects_foreign_record() {
        let backend = Arc::new(FakeBackend::new());
        backend.add_record(5, "300");
        backend.add_record(6, "300");
        let mut batch = WorkBatch::new(vec![file_item("300.jpg")]);
        matcher(backend).match_items(&mut batch).await.unwrap();

        let err = disambiguate(&mut batch, 0, RecordId::new(42), true).unwrap_err();
        assert!(matches!(err, DomainError::NotACandidate(_)));

        let err = disambiguate(&mut batch, 3, RecordId::new(5), false).unwrap_err();
        assert!(matches!(err, DomainError::IndexOutOfRange { .. }));
    }
}
