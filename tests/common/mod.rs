//! Common test utilities for pipeline integration tests
//!
//! A scripted v4 portal with two cases, a recording notifier, and a
//! pipeline builder wired to in-memory collaborators.

use docketwatch::browser::scripted::{row, PageScript, ScriptedBrowser, SiteModel};
use docketwatch::browser::DomNode;
use docketwatch::collab::{
    CaseStore, MemoryCaseStore, NewCaseAlert, NewDocumentsAlert, Notifier, NotifyError,
    StaticCredentials, StoreError,
};
use docketwatch::pipeline::{CancellationToken, CaseRecord};
use docketwatch::{Credentials, EngineConfig, ExtractionPipeline};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

pub const TENANT: &str = "tenant-a";
pub const IDENTITY: &str = "tenant-a-user";
pub const SECRET: &str = "hunter2";

/// Knobs for the scripted portal.
#[derive(Default)]
pub struct PortalOptions {
    /// Make P2's case page unreachable.
    pub p2_unreachable: bool,
    /// Serve P1 with a partial-access banner instead of full access.
    pub p1_partial: bool,
}

/// A v4-generation portal listing cases P1 and P2.
///
/// P1 carries documents D1 and D9, P2 carries D2.
pub fn portal(options: PortalOptions) -> Arc<SiteModel> {
    let p1_banner = if options.p1_partial {
        "Partial view only"
    } else {
        "Full access granted"
    };
    let p2 = if options.p2_unreachable {
        PageScript::new().unreachable()
    } else {
        PageScript::new()
            .node(".access-banner", DomNode::new("Full access granted"))
            .node(".case-authority", DomNode::new("2nd Federal Court"))
            .nodes(
                ".doc-grid tr.doc-row",
                vec![row(&["D2", "Petition", "05/06/2024"], &[])],
            )
    };

    SiteModel::builder("/")
        .page(
            "/",
            PageScript::new().node("footer .app-version", DomNode::new("versão 4.2.0")),
        )
        .page(
            "/auth/login",
            PageScript::new()
                .node("#login-usuario", DomNode::new(""))
                .login(
                    "#login-entrar",
                    [("#login-usuario", IDENTITY), ("#login-senha", SECRET)],
                    "/cases",
                    "/auth/denied",
                ),
        )
        .page(
            "/auth/denied",
            PageScript::new().node(".alert-login", DomNode::new("invalid credentials")),
        )
        .page(
            "/cases",
            PageScript::new()
                .node("#menu-sair", DomNode::new("sair"))
                .nodes(
                    ".case-grid tr.case-row",
                    vec![
                        row(&["P1"], &[("/case/p1", "L1")]),
                        row(&["P2"], &[("/case/p2", "L2")]),
                    ],
                ),
        )
        .page(
            "/case/p1",
            PageScript::new()
                .node(".access-banner", DomNode::new(p1_banner))
                .node(".case-authority", DomNode::new("1st Federal Court"))
                .nodes(
                    ".doc-grid tr.doc-row",
                    vec![
                        row(&["D1", "Petition", "02/03/2024"], &[]),
                        row(&["D9", "Ruling", "10/07/2024"], &[]),
                    ],
                ),
        )
        .page("/case/p2", p2)
        .build()
}

/// Notifier that records every delivery, optionally failing them all.
#[derive(Default)]
pub struct RecordingNotifier {
    pub new_cases: Mutex<Vec<NewCaseAlert>>,
    pub new_documents: Mutex<Vec<BTreeMap<String, NewDocumentsAlert>>>,
    pub fail_deliveries: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_deliveries: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_new_cases(&self, cases: Vec<NewCaseAlert>) -> Result<(), NotifyError> {
        if self.fail_deliveries {
            return Err(NotifyError::Delivery("webhook 502".into()));
        }
        self.new_cases.lock().unwrap().extend(cases);
        Ok(())
    }

    async fn notify_new_documents(
        &self,
        by_case: BTreeMap<String, NewDocumentsAlert>,
    ) -> Result<(), NotifyError> {
        if self.fail_deliveries {
            return Err(NotifyError::Delivery("webhook 502".into()));
        }
        self.new_documents.lock().unwrap().push(by_case);
        Ok(())
    }
}

/// Store whose backend is down, for fatal-path tests.
pub struct BrokenCaseStore;

#[async_trait]
impl CaseStore for BrokenCaseStore {
    async fn cases_for_tenant(
        &self,
        _tenant: &str,
    ) -> Result<HashMap<String, CaseRecord>, StoreError> {
        Err(StoreError::Backend("db down".into()))
    }

    async fn save_case(&self, _tenant: &str, _case: &CaseRecord) -> Result<(), StoreError> {
        Err(StoreError::Backend("db down".into()))
    }
}

/// Store that withdraws the run on its first lookup, landing the
/// cancellation between discovery and the parallel stage.
pub struct WithdrawingStore {
    pub inner: MemoryCaseStore,
    token: Mutex<Option<CancellationToken>>,
}

impl WithdrawingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryCaseStore::new(),
            token: Mutex::new(None),
        }
    }

    pub fn arm(&self, token: CancellationToken) {
        *self.token.lock().unwrap() = Some(token);
    }
}

#[async_trait]
impl CaseStore for WithdrawingStore {
    async fn cases_for_tenant(
        &self,
        tenant: &str,
    ) -> Result<HashMap<String, CaseRecord>, StoreError> {
        if let Some(token) = self.token.lock().unwrap().as_ref() {
            token.cancel();
        }
        self.inner.cases_for_tenant(tenant).await
    }

    async fn save_case(&self, tenant: &str, case: &CaseRecord) -> Result<(), StoreError> {
        self.inner.save_case(tenant, case).await
    }
}

/// Pipeline over the scripted portal with in-memory collaborators.
pub fn pipeline(
    site: Arc<SiteModel>,
    store: Arc<MemoryCaseStore>,
    notifier: Arc<RecordingNotifier>,
) -> ExtractionPipeline {
    pipeline_with_store(site, store, notifier)
}

/// Same wiring with any store implementation.
pub fn pipeline_with_store(
    site: Arc<SiteModel>,
    store: Arc<dyn CaseStore>,
    notifier: Arc<RecordingNotifier>,
) -> ExtractionPipeline {
    let credentials =
        StaticCredentials::new().with_tenant(TENANT, Credentials::new(IDENTITY, SECRET));
    ExtractionPipeline::new(
        Arc::new(docketwatch::adapter::family_v4()),
        Arc::new(ScriptedBrowser::new(site)),
        store,
        Arc::new(credentials),
        notifier,
        EngineConfig::default(),
        TENANT,
    )
}
