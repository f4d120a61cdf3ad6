//! External collaborator seams
//!
//! Storage, credential, and notification collaborators consumed by the
//! extraction pipeline. The engine owns only the traits; deployments
//! bring their own backends. An in-memory store and a log-only notifier
//! ship for tests and demos.

use crate::pipeline::{CaseRecord, DocumentRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::info;

/// A tenant's portal login pair. Resolution is all-or-nothing: a
/// provider never returns a partial pair.
#[derive(Clone)]
pub struct Credentials {
    pub identity: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            secret: secret.into(),
        }
    }
}

// Secrets stay out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("no credentials registered for tenant '{0}'")]
    NotFound(String),

    #[error("credential backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// Persisted case state, keyed by tenant and case number.
#[async_trait]
pub trait CaseStore: Send + Sync {
    /// Every case previously known for the tenant.
    async fn cases_for_tenant(
        &self,
        tenant: &str,
    ) -> Result<HashMap<String, CaseRecord>, StoreError>;

    /// Upsert one case by case number.
    async fn save_case(&self, tenant: &str, case: &CaseRecord) -> Result<(), StoreError>;
}

/// Resolves tenant login credentials.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn resolve(&self, tenant: &str) -> Result<Credentials, CredentialError>;
}

/// One newly discovered case, as handed to the cases channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCaseAlert {
    pub case_number: String,
    pub link: Option<String>,
}

/// Newly appeared documents for one case, grouped by signatory, as
/// handed to the documents channel. Unsigned documents group under "".
#[derive(Debug, Clone, Default)]
pub struct NewDocumentsAlert {
    pub nickname: Option<String>,
    pub by_signatory: BTreeMap<String, Vec<DocumentRecord>>,
}

/// Delivery of run deltas. Both channels are fire-and-forget from the
/// pipeline's point of view: failures are logged, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_new_cases(&self, cases: Vec<NewCaseAlert>) -> Result<(), NotifyError>;

    async fn notify_new_documents(
        &self,
        by_case: BTreeMap<String, NewDocumentsAlert>,
    ) -> Result<(), NotifyError>;
}

/// In-memory case store, keyed tenant → case number.
#[derive(Debug, Default)]
pub struct MemoryCaseStore {
    cases: DashMap<String, HashMap<String, CaseRecord>>,
}

impl MemoryCaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a case directly (test setup).
    pub fn seed(&self, tenant: &str, case: CaseRecord) {
        self.cases
            .entry(tenant.to_string())
            .or_default()
            .insert(case.case_number.clone(), case);
    }

    pub fn get(&self, tenant: &str, case_number: &str) -> Option<CaseRecord> {
        self.cases
            .get(tenant)
            .and_then(|t| t.get(case_number).cloned())
    }
}

#[async_trait]
impl CaseStore for MemoryCaseStore {
    async fn cases_for_tenant(
        &self,
        tenant: &str,
    ) -> Result<HashMap<String, CaseRecord>, StoreError> {
        Ok(self.cases.get(tenant).map(|t| t.clone()).unwrap_or_default())
    }

    async fn save_case(&self, tenant: &str, case: &CaseRecord) -> Result<(), StoreError> {
        self.cases
            .entry(tenant.to_string())
            .or_default()
            .insert(case.case_number.clone(), case.clone());
        Ok(())
    }
}

/// Credential provider over a fixed map.
#[derive(Debug, Default)]
pub struct StaticCredentials {
    by_tenant: HashMap<String, Credentials>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>, credentials: Credentials) -> Self {
        self.by_tenant.insert(tenant.into(), credentials);
        self
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn resolve(&self, tenant: &str) -> Result<Credentials, CredentialError> {
        self.by_tenant
            .get(tenant)
            .cloned()
            .ok_or_else(|| CredentialError::NotFound(tenant.to_string()))
    }
}

/// Notifier that only logs. Useful for demos and dry runs.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_new_cases(&self, cases: Vec<NewCaseAlert>) -> Result<(), NotifyError> {
        for alert in cases {
            info!(case = %alert.case_number, link = ?alert.link, "new case");
        }
        Ok(())
    }

    async fn notify_new_documents(
        &self,
        by_case: BTreeMap<String, NewDocumentsAlert>,
    ) -> Result<(), NotifyError> {
        for (case_number, alert) in by_case {
            let total: usize = alert.by_signatory.values().map(Vec::len).sum();
            info!(
                case = %case_number,
                nickname = ?alert.nickname,
                documents = total,
                "new documents"
            );
        }
        Ok(())
    }
}
