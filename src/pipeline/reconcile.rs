//! Reconciliation — merging fresh results into prior state
//!
//! Pure functions: set deltas for new cases and documents, the harvest
//! decision, and the merge of one worker outcome into the previously
//! persisted case record. Field precedence on merge: operator-owned
//! fields (nickname, category, categorization) keep the prior value;
//! portal-derived fields (authority, link states) take the fresh
//! observation; access type and download status only move forward.

use super::types::{
    CaseCategory, CaseOutcome, CaseRecord, CategorizationStatus, DocumentRecord, LinkState,
    LinkStatus,
};
use crate::adapter::{AccessType, DiscoveredCase};
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

/// Cases present in this run's discovery but absent from prior state.
/// On a first run every discovered case is new.
pub fn new_case_delta(
    discovered: &[DiscoveredCase],
    existing: &HashMap<String, CaseRecord>,
) -> BTreeSet<String> {
    discovered
        .iter()
        .filter(|case| !existing.contains_key(&case.case_number))
        .map(|case| case.case_number.clone())
        .collect()
}

/// Whether a validated case should have its documents harvested.
///
/// Integral access always harvests. Partial access harvests only for
/// cases the operator has already categorized as restricted; a pending
/// categorization skips regardless of category.
pub fn should_harvest(
    access: AccessType,
    category: CaseCategory,
    categorization: CategorizationStatus,
) -> bool {
    match access {
        AccessType::Integral => true,
        AccessType::Partial => {
            category == CaseCategory::Restricted
                && categorization != CategorizationStatus::Pending
        }
        AccessType::Unknown | AccessType::Error => false,
    }
}

/// Merge one worker outcome into the prior record (or a blank record
/// for a case seen for the first time).
///
/// Returns the merged record and the new-document delta: document
/// numbers present in the fresh harvest but absent from the prior
/// record. Document identity is the document number, stable across runs.
pub fn merge_outcome(
    prior: Option<&CaseRecord>,
    outcome: &CaseOutcome,
    now: DateTime<Utc>,
) -> (CaseRecord, BTreeSet<String>) {
    let mut record = prior
        .cloned()
        .unwrap_or_else(|| CaseRecord::new(&outcome.case_number));

    if let Some(link_id) = &outcome.link_id {
        let status = if outcome.link_valid {
            LinkStatus::Active
        } else {
            LinkStatus::Inactive
        };
        record
            .access_links
            .entry(link_id.clone())
            .and_modify(|link| link.observe(status, outcome.access_type, now))
            .or_insert_with(|| LinkState::new(status, outcome.access_type, now));

        if outcome.link_valid {
            record.promote_best_link(link_id);
        }
    }

    if outcome.link_valid {
        record.raise_access(outcome.access_type);
        if outcome.authority.is_some() {
            record.authority = outcome.authority.clone();
        }
    }

    record.no_valid_links = !record
        .access_links
        .values()
        .any(|link| link.status == LinkStatus::Active);

    let mut new_documents = BTreeSet::new();
    for (number, meta) in &outcome.documents {
        match record.documents.get_mut(number) {
            Some(existing) => {
                // Refresh portal-derived metadata; the download marker
                // belongs to the download collaborator and stays.
                existing.document_type = meta.document_type.clone();
                existing.document_date = meta.document_date;
                if meta.signatory.is_some() {
                    existing.signatory = meta.signatory.clone();
                }
            }
            None => {
                record
                    .documents
                    .insert(number.clone(), DocumentRecord::from_meta(number, meta));
                new_documents.insert(number.clone());
            }
        }
    }

    (record, new_documents)
}
