//! Run-scoped data model
//!
//! Domain vocabulary for one extraction run:
//! - CaseRecord: one tracked case, merged against prior persisted state
//! - LinkState: lifecycle of one access link, with its observation history
//! - DocumentRecord: one harvested document; download status never regresses
//! - RunResult / RunReport: what a finished run hands back
//! - CaseOutcome: what one parallel worker produced for one case

use crate::adapter::{AccessType, DocumentMeta};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Whether a link answered on its last check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Active,
    Inactive,
}

/// One past check of a link, kept in the link's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkObservation {
    pub status: LinkStatus,
    pub access_type: AccessType,
    pub checked_at: DateTime<Utc>,
}

/// Current state of one access link, plus its ordered past states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkState {
    pub status: LinkStatus,
    pub access_type: AccessType,
    pub last_checked_at: DateTime<Utc>,
    pub history: Vec<LinkObservation>,
}

impl LinkState {
    pub fn new(status: LinkStatus, access_type: AccessType, checked_at: DateTime<Utc>) -> Self {
        Self {
            status,
            access_type,
            last_checked_at: checked_at,
            history: Vec::new(),
        }
    }

    /// Record a fresh check, pushing the previous state into history.
    pub fn observe(&mut self, status: LinkStatus, access_type: AccessType, at: DateTime<Utc>) {
        self.history.push(LinkObservation {
            status: self.status,
            access_type: self.access_type,
            checked_at: self.last_checked_at,
        });
        self.status = status;
        self.access_type = access_type;
        self.last_checked_at = at;
    }
}

/// Advances through the download collaborator only; merging never moves
/// it backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DownloadStatus {
    #[default]
    NotDownloaded,
    Downloaded,
}

/// One document observed in a case's document table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub document_number: String,
    pub document_type: String,
    pub document_date: Option<NaiveDate>,
    pub download_status: DownloadStatus,
    pub signatory: Option<String>,
}

impl DocumentRecord {
    pub fn from_meta(document_number: impl Into<String>, meta: &DocumentMeta) -> Self {
        Self {
            document_number: document_number.into(),
            document_type: meta.document_type.clone(),
            document_date: meta.document_date,
            download_status: DownloadStatus::NotDownloaded,
            signatory: meta.signatory.clone(),
        }
    }

    pub fn mark_downloaded(&mut self) {
        self.download_status = DownloadStatus::Downloaded;
    }
}

/// Operator-assigned confidentiality category. Drives the harvest
/// decision for partial-access cases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaseCategory {
    #[default]
    Uncategorized,
    Public,
    Restricted,
}

/// Whether the operator finished categorizing the case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategorizationStatus {
    #[default]
    Pending,
    Categorized,
}

/// One tracked case. Created by discovery, mutated by validation and
/// harvest, then merged with the prior persisted record.
///
/// Invariants: `best_link`, when set, is a key of `access_links`;
/// `access_type` only moves toward `Integral` within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_number: String,
    pub access_links: BTreeMap<String, LinkState>,
    pub best_link: Option<String>,
    pub access_type: AccessType,
    pub category: CaseCategory,
    pub categorization: CategorizationStatus,
    pub authority: Option<String>,
    /// Operator-assigned label, never derived by the pipeline.
    pub nickname: Option<String>,
    pub documents: BTreeMap<String, DocumentRecord>,
    pub no_valid_links: bool,
}

impl CaseRecord {
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            access_links: BTreeMap::new(),
            best_link: None,
            access_type: AccessType::Unknown,
            category: CaseCategory::default(),
            categorization: CategorizationStatus::default(),
            authority: None,
            nickname: None,
            documents: BTreeMap::new(),
            no_valid_links: false,
        }
    }

    /// Raise the case access type; never lowers it.
    pub fn raise_access(&mut self, access: AccessType) {
        self.access_type = self.access_type.max(access);
    }

    /// Promote a link to best. Refused when the id is not a known link,
    /// keeping the best-link invariant.
    pub fn promote_best_link(&mut self, link_id: &str) -> bool {
        if self.access_links.contains_key(link_id) {
            self.best_link = Some(link_id.to_string());
            true
        } else {
            false
        }
    }
}

/// What one parallel worker produced for one case. Worker failures land
/// in `error`; they never escape the pool.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub case_number: String,
    pub link_id: Option<String>,
    pub link_url: Option<String>,
    pub link_valid: bool,
    pub access_type: AccessType,
    pub authority: Option<String>,
    pub documents: BTreeMap<String, DocumentMeta>,
    pub harvest_skipped: bool,
    pub error: Option<String>,
}

impl CaseOutcome {
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            link_id: None,
            link_url: None,
            link_valid: false,
            access_type: AccessType::Unknown,
            authority: None,
            documents: BTreeMap::new(),
            harvest_skipped: false,
            error: None,
        }
    }
}

/// Deltas computed by one run, handed to notification and discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub total_cases: usize,
    pub new_case_numbers: BTreeSet<String>,
    pub new_documents_by_case: BTreeMap<String, BTreeSet<String>>,
}

impl RunResult {
    pub fn has_new_cases(&self) -> bool {
        !self.new_case_numbers.is_empty()
    }

    pub fn has_new_documents(&self) -> bool {
        !self.new_documents_by_case.is_empty()
    }
}

/// The pipeline's finite states.
///
/// `Failed` is reachable only from `Discovering`; per-case failures in
/// the parallel stage never fail the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Discovering,
    ExtractingParallel,
    Reconciling,
    Notifying,
    Done,
    Failed,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Discovering => "discovering",
            Self::ExtractingParallel => "extracting_parallel",
            Self::Reconciling => "reconciling",
            Self::Notifying => "notifying",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Aggregate view of a finished run. Always produced, even when every
/// case failed: nothing is silently dropped.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub result: RunResult,
    /// Cases whose worker finished without a recorded error.
    pub succeeded: usize,
    /// Cases whose worker recorded an error.
    pub failed: usize,
    pub case_errors: BTreeMap<String, String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
