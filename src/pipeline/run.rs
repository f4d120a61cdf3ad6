//! The three-stage extraction pipeline
//!
//! One run: a sequential discovery pass over the list view, a bounded
//! parallel stage validating links and harvesting documents per case,
//! then reconciliation against prior state and delta notification.
//! Session bootstrap, authentication, and discovery failures are fatal;
//! everything per-case is caught at the worker boundary.

use super::cancel::CancellationToken;
use super::reconcile;
use super::types::{
    CaseCategory, CaseOutcome, CaseRecord, CategorizationStatus, RunReport, RunResult, RunState,
};
use crate::adapter::{AdapterError, DiscoveredCase, PortalAdapter};
use crate::browser::{Browser, BrowserError};
use crate::collab::{
    CaseStore, CredentialError, CredentialProvider, Credentials, NewCaseAlert, NewDocumentsAlert,
    Notifier, StoreError,
};
use crate::config::EngineConfig;
use crate::registry::RegistryError;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fatal run errors. Only these stop a run; per-case errors are folded
/// into the report.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("credential resolution failed: {0}")]
    Credentials(#[from] CredentialError),

    #[error("browsing session bootstrap failed: {0}")]
    Bootstrap(#[from] BrowserError),

    #[error("portal rejected the tenant credentials")]
    Authentication,

    #[error("adapter resolution failed: {0}")]
    AdapterResolution(#[from] RegistryError),

    #[error("case discovery failed: {0}")]
    Discovery(AdapterError),

    #[error("storage collaborator failed: {0}")]
    Store(#[from] StoreError),

    #[error("run cancelled before discovery completed")]
    Cancelled,

    #[error("pipeline task failed: {0}")]
    Internal(String),
}

/// One configured extraction run over a single tenant.
pub struct ExtractionPipeline {
    adapter: Arc<dyn PortalAdapter>,
    browser: Arc<dyn Browser>,
    store: Arc<dyn CaseStore>,
    credentials: Arc<dyn CredentialProvider>,
    notifier: Arc<dyn Notifier>,
    config: EngineConfig,
    tenant: String,
    run_id: Uuid,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
}

impl ExtractionPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        adapter: Arc<dyn PortalAdapter>,
        browser: Arc<dyn Browser>,
        store: Arc<dyn CaseStore>,
        credentials: Arc<dyn CredentialProvider>,
        notifier: Arc<dyn Notifier>,
        config: EngineConfig,
        tenant: impl Into<String>,
    ) -> Self {
        Self {
            adapter,
            browser,
            store,
            credentials,
            notifier,
            config,
            tenant: tenant.into(),
            run_id: Uuid::new_v4(),
            state: Arc::new(Mutex::new(RunState::Idle)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Snapshot of the current run state.
    pub fn status(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    /// Token the caller can use to withdraw the run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn set_state(&self, next: RunState) {
        *self.state.lock().unwrap() = next;
        info!(run = %self.run_id, tenant = %self.tenant, state = %next, "run state");
    }

    /// Spawn the run as a background task, returning a handle with a
    /// snapshot-able status and a completion future.
    pub fn spawn(self) -> RunHandle {
        let pipeline = Arc::new(self);
        let run_id = pipeline.run_id;
        let state = pipeline.state.clone();
        let cancel = pipeline.cancel.clone();
        let join = tokio::spawn({
            let pipeline = pipeline.clone();
            async move { pipeline.run().await }
        });
        RunHandle {
            run_id,
            state,
            cancel,
            join,
        }
    }

    /// Execute the run to completion.
    pub async fn run(&self) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();

        // --- Stage 1: discovery over one shared, sequential session ---
        self.set_state(RunState::Discovering);
        let discovering = self.discover().await;
        let (credentials, discovered) = match discovering {
            Ok(parts) => parts,
            Err(err) => {
                self.set_state(RunState::Failed);
                return Err(err);
            }
        };
        info!(
            run = %self.run_id,
            cases = discovered.len(),
            "discovery finished"
        );

        let existing = match self.store.cases_for_tenant(&self.tenant).await {
            Ok(existing) => existing,
            Err(err) => {
                self.set_state(RunState::Failed);
                return Err(err.into());
            }
        };
        let new_case_numbers = reconcile::new_case_delta(&discovered, &existing);

        // --- Stage 2: bounded parallel validation + harvest ---
        self.set_state(RunState::ExtractingParallel);
        let outcomes = self
            .extract_parallel(&credentials, &discovered, &existing)
            .await;

        // --- Stage 3: reconcile against prior state ---
        self.set_state(RunState::Reconciling);
        let now = Utc::now();
        let mut case_errors: BTreeMap<String, String> = BTreeMap::new();
        let mut merged_cases: BTreeMap<String, CaseRecord> = BTreeMap::new();
        let mut new_documents_by_case = BTreeMap::new();

        let mut succeeded = 0usize;
        let mut failed = 0usize;
        for outcome in &outcomes {
            match &outcome.error {
                Some(err) => {
                    failed += 1;
                    case_errors.insert(outcome.case_number.clone(), err.clone());
                }
                None => succeeded += 1,
            }

            let prior = existing.get(&outcome.case_number);
            let (merged, new_docs) = reconcile::merge_outcome(prior, outcome, now);
            if !new_docs.is_empty() {
                new_documents_by_case.insert(outcome.case_number.clone(), new_docs);
            }
            if let Err(err) = self.store.save_case(&self.tenant, &merged).await {
                warn!(
                    run = %self.run_id,
                    case = %outcome.case_number,
                    error = %err,
                    "failed to persist merged case"
                );
                case_errors
                    .entry(outcome.case_number.clone())
                    .or_insert_with(|| format!("persist: {err}"));
            }
            merged_cases.insert(merged.case_number.clone(), merged);
        }

        let result = RunResult {
            total_cases: discovered.len(),
            new_case_numbers,
            new_documents_by_case,
        };

        // --- Notification: independent channels, failures logged only ---
        self.set_state(RunState::Notifying);
        self.notify(&result, &discovered, &merged_cases).await;

        self.set_state(RunState::Done);
        Ok(RunReport {
            run_id: self.run_id,
            result,
            succeeded,
            failed,
            case_errors,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Bootstrap the shared session and walk the list view.
    async fn discover(&self) -> Result<(Credentials, Vec<DiscoveredCase>), PipelineError> {
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let credentials = self.credentials.resolve(&self.tenant).await?;
        let page = self.browser.new_context().await?;
        self.adapter
            .authenticate(page.as_ref(), &credentials)
            .await
            .map_err(|err| match err {
                AdapterError::CredentialsRejected => PipelineError::Authentication,
                AdapterError::Browser(b) => PipelineError::Bootstrap(b),
                other => PipelineError::Discovery(other),
            })?;
        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let discovered = self
            .adapter
            .discover_case_list(page.as_ref())
            .await
            .map_err(PipelineError::Discovery)?;
        Ok((credentials, discovered))
    }

    /// One task per discovered case on a semaphore-bounded pool. Each
    /// worker owns an isolated context; results are collected as they
    /// complete with no cross-case ordering.
    async fn extract_parallel(
        &self,
        credentials: &Credentials,
        discovered: &[DiscoveredCase],
        existing: &HashMap<String, CaseRecord>,
    ) -> Vec<CaseOutcome> {
        let permits = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks: JoinSet<CaseOutcome> = JoinSet::new();

        for case in discovered {
            if self.cancel.is_cancelled() {
                warn!(run = %self.run_id, "run withdrawn, not dispatching further cases");
                break;
            }
            let permits = permits.clone();
            let adapter = self.adapter.clone();
            let browser = self.browser.clone();
            let credentials = credentials.clone();
            let case = case.clone();
            let (category, categorization) = existing
                .get(&case.case_number)
                .map(|prior| (prior.category, prior.categorization))
                .unwrap_or_default();

            tasks.spawn(async move {
                let _permit = match permits.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let mut outcome = CaseOutcome::new(&case.case_number);
                        outcome.error = Some("worker pool closed".into());
                        return outcome;
                    }
                };
                process_case(adapter, browser, credentials, case, category, categorization)
                    .await
            });
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                // A panicked worker loses its case for this run; the
                // next run rediscovers it.
                Err(err) => warn!(run = %self.run_id, error = %err, "case worker panicked"),
            }
        }
        outcomes
    }

    async fn notify(
        &self,
        result: &RunResult,
        discovered: &[DiscoveredCase],
        merged: &BTreeMap<String, CaseRecord>,
    ) {
        if result.has_new_cases() {
            let alerts: Vec<NewCaseAlert> = result
                .new_case_numbers
                .iter()
                .map(|number| NewCaseAlert {
                    case_number: number.clone(),
                    link: discovered
                        .iter()
                        .find(|case| &case.case_number == number)
                        .and_then(|case| case.links.first())
                        .map(|link| link.url.clone()),
                })
                .collect();
            if let Err(err) = self.notifier.notify_new_cases(alerts).await {
                warn!(run = %self.run_id, error = %err, "new-case notification failed");
            }
        }

        if result.has_new_documents() {
            let mut by_case = BTreeMap::new();
            for (case_number, new_docs) in &result.new_documents_by_case {
                let mut alert = NewDocumentsAlert::default();
                if let Some(record) = merged.get(case_number) {
                    alert.nickname = record.nickname.clone();
                    for number in new_docs {
                        if let Some(doc) = record.documents.get(number) {
                            alert
                                .by_signatory
                                .entry(doc.signatory.clone().unwrap_or_default())
                                .or_insert_with(Vec::new)
                                .push(doc.clone());
                        }
                    }
                }
                by_case.insert(case_number.clone(), alert);
            }
            if let Err(err) = self.notifier.notify_new_documents(by_case).await {
                warn!(run = %self.run_id, error = %err, "new-document notification failed");
            }
        }
    }
}

/// Handle to a spawned run: a snapshot-able status, the cancellation
/// token, and the completion future.
pub struct RunHandle {
    run_id: Uuid,
    state: Arc<Mutex<RunState>>,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<Result<RunReport, PipelineError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn status(&self) -> RunState {
        *self.state.lock().unwrap()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the run to finish.
    pub async fn join(self) -> Result<RunReport, PipelineError> {
        self.join
            .await
            .map_err(|err| PipelineError::Internal(err.to_string()))?
    }
}

/// Process one case in an isolated context. Infallible by construction:
/// every failure is folded into the outcome.
async fn process_case(
    adapter: Arc<dyn PortalAdapter>,
    browser: Arc<dyn Browser>,
    credentials: Credentials,
    case: DiscoveredCase,
    category: CaseCategory,
    categorization: CategorizationStatus,
) -> CaseOutcome {
    let mut outcome = CaseOutcome::new(&case.case_number);

    let Some(link) = case.links.first() else {
        outcome.error = Some("no candidate links on the list view".into());
        return outcome;
    };
    outcome.link_id = Some(link.id.clone());
    outcome.link_url = Some(link.url.clone());

    let page = match browser.new_context().await {
        Ok(page) => page,
        Err(err) => {
            outcome.error = Some(format!("context: {err}"));
            return outcome;
        }
    };
    // The portal holds no session beyond an authenticated context, so
    // every worker logs its own context in.
    if let Err(err) = adapter.authenticate(page.as_ref(), &credentials).await {
        outcome.error = Some(format!("worker authentication: {err}"));
        return outcome;
    }

    let validation = match adapter.validate_link(page.as_ref(), link).await {
        Ok(validation) => validation,
        Err(err) => {
            outcome.error = Some(format!("link validation: {err}"));
            return outcome;
        }
    };
    outcome.link_valid = validation.valid;
    outcome.access_type = validation.access_type;
    outcome.authority = validation.authority.clone();

    if !validation.valid {
        debug!(
            case = %outcome.case_number,
            reason = ?validation.error,
            "link invalid, skipping harvest"
        );
        return outcome;
    }

    if reconcile::should_harvest(validation.access_type, category, categorization) {
        match adapter.extract_documents(page.as_ref()).await {
            Ok(documents) => outcome.documents = documents,
            Err(err) => {
                // Harvest failure after a valid link: keep the case,
                // leave the documents empty.
                warn!(case = %outcome.case_number, error = %err, "harvest failed");
                outcome.error = Some(format!("harvest: {err}"));
            }
        }
    } else {
        outcome.harvest_skipped = true;
    }
    outcome
}
