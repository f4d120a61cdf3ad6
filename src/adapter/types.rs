//! Core adapter-layer types
//!
//! Shared vocabulary between the adapter contract, the registry, and the
//! extraction pipeline:
//! - AdapterDescriptor: self-identification of one portal-version adapter
//! - DiscoveredCase / CandidateLink: stage-1 output, raw and unopened
//! - LinkValidation: stage-2 verdict for one candidate link
//! - DocumentMeta: stage-3 per-document metadata

use crate::browser::BrowserError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How much of a case the validated link exposes.
///
/// Ordered: a case's access type only ever moves up (toward `Integral`)
/// within a run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AccessType {
    #[default]
    Unknown,
    Error,
    Partial,
    Integral,
}

/// Self-identification of one adapter: exact release version, the version
/// prefix it is compatible with, and its generation family.
///
/// Registered once at startup and immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterDescriptor {
    pub version: String,
    pub version_range: String,
    pub family: String,
    pub description: String,
}

impl AdapterDescriptor {
    pub fn new(
        version: impl Into<String>,
        version_range: impl Into<String>,
        family: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            version_range: version_range.into(),
            family: family.into(),
            description: String::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether a version string falls inside this adapter's declared range.
    /// Ranges are dotted prefixes: range "5.1" covers "5.1.3".
    pub fn covers(&self, version: &str) -> bool {
        version.starts_with(&self.version_range)
    }
}

/// One access link found on the list view, not yet opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateLink {
    /// Stable identifier for the link within the case (anchor label when
    /// the portal provides one, the href otherwise).
    pub id: String,
    pub url: String,
}

impl CandidateLink {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// One case as seen on the list view during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredCase {
    pub case_number: String,
    pub links: Vec<CandidateLink>,
}

impl DiscoveredCase {
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            links: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: CandidateLink) -> Self {
        self.links.push(link);
        self
    }
}

/// The verdict for one candidate link after opening it.
///
/// Authority is extracted opportunistically during the same navigation —
/// the case page is already open, so reading one more banner is free.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkValidation {
    pub valid: bool,
    pub access_type: AccessType,
    pub authority: Option<String>,
    pub error: Option<String>,
}

impl LinkValidation {
    pub fn valid(access_type: AccessType) -> Self {
        Self {
            valid: true,
            access_type,
            authority: None,
            error: None,
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            access_type: AccessType::Error,
            authority: None,
            error: Some(reason.into()),
        }
    }

    pub fn with_authority(mut self, authority: impl Into<String>) -> Self {
        self.authority = Some(authority.into());
        self
    }
}

/// Metadata for one document row in a case's document table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub document_type: String,
    pub document_date: Option<NaiveDate>,
    pub signatory: Option<String>,
}

impl DocumentMeta {
    pub fn new(document_type: impl Into<String>) -> Self {
        Self {
            document_type: document_type.into(),
            document_date: None,
            signatory: None,
        }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.document_date = Some(date);
        self
    }

    pub fn with_signatory(mut self, signatory: impl Into<String>) -> Self {
        self.signatory = Some(signatory.into());
        self
    }
}

/// Errors from adapter operations.
///
/// `CredentialsRejected` is the portal saying no; transport failures stay
/// `Browser`. `Unsupported` is the typed form of "this generation cannot
/// promise that behavior" — family bases return it where only a concrete
/// release adapter knows the layout.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("credentials rejected by the portal")]
    CredentialsRejected,

    #[error("not supported by this portal generation: {0}")]
    Unsupported(&'static str),

    #[error("page did not match the expected layout: {0}")]
    Parse(String),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}
