//! Scripted in-memory browser
//!
//! A deterministic [`Browser`]/[`PortalPage`] implementation driven by a
//! declarative site model: pages keyed by URL, each holding selector →
//! node tables, click transitions, and an optional login rule. Used by
//! the test suite and demos; production deployments plug in a real
//! driver instead.

use super::{Anchor, Browser, BrowserError, DomNode, PortalPage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// A login gate on one page: clicking `submit_selector` routes to
/// `on_success` when every expected field was filled with the expected
/// value, `on_failure` otherwise.
#[derive(Debug, Clone)]
pub struct LoginRule {
    pub submit_selector: String,
    pub expected_fields: HashMap<String, String>,
    pub on_success: String,
    pub on_failure: String,
}

/// The scripted content of one URL.
#[derive(Debug, Clone, Default)]
pub struct PageScript {
    nodes: HashMap<String, Vec<DomNode>>,
    click_targets: HashMap<String, String>,
    login: Option<LoginRule>,
    unreachable: bool,
}

impl PageScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a single node for a selector.
    pub fn node(self, selector: impl Into<String>, node: DomNode) -> Self {
        self.nodes(selector, vec![node])
    }

    /// Script the full node list for a selector.
    pub fn nodes(mut self, selector: impl Into<String>, nodes: Vec<DomNode>) -> Self {
        self.nodes.insert(selector.into(), nodes);
        self
    }

    /// Clicking `selector` navigates to `url`.
    pub fn click_to(mut self, selector: impl Into<String>, url: impl Into<String>) -> Self {
        self.click_targets.insert(selector.into(), url.into());
        self
    }

    /// Install a login gate on this page.
    pub fn login<I, K, V>(
        mut self,
        submit_selector: impl Into<String>,
        expected_fields: I,
        on_success: impl Into<String>,
        on_failure: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.login = Some(LoginRule {
            submit_selector: submit_selector.into(),
            expected_fields: expected_fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            on_success: on_success.into(),
            on_failure: on_failure.into(),
        });
        self
    }

    /// Navigation to this URL fails.
    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }
}

/// The declarative model of a scripted portal.
#[derive(Debug, Default)]
pub struct SiteModel {
    start_url: String,
    pages: HashMap<String, PageScript>,
}

impl SiteModel {
    pub fn builder(start_url: impl Into<String>) -> SiteBuilder {
        SiteBuilder {
            model: SiteModel {
                start_url: start_url.into(),
                pages: HashMap::new(),
            },
        }
    }

    fn script(&self, url: &str) -> Option<&PageScript> {
        self.pages.get(url)
    }
}

/// Builder for [`SiteModel`].
pub struct SiteBuilder {
    model: SiteModel,
}

impl SiteBuilder {
    pub fn page(mut self, url: impl Into<String>, script: PageScript) -> Self {
        self.model.pages.insert(url.into(), script);
        self
    }

    pub fn build(self) -> Arc<SiteModel> {
        Arc::new(self.model)
    }
}

/// A scripted browsing session over a shared [`SiteModel`].
pub struct ScriptedBrowser {
    site: Arc<SiteModel>,
    fail_contexts: AtomicBool,
}

impl ScriptedBrowser {
    pub fn new(site: Arc<SiteModel>) -> Self {
        Self {
            site,
            fail_contexts: AtomicBool::new(false),
        }
    }

    /// Make every subsequent `new_context` call fail (bootstrap-failure
    /// scenarios).
    pub fn fail_contexts(&self) {
        self.fail_contexts.store(true, Ordering::Relaxed);
    }
}

#[async_trait]
impl Browser for ScriptedBrowser {
    async fn new_context(&self) -> Result<Box<dyn PortalPage>, BrowserError> {
        if self.fail_contexts.load(Ordering::Relaxed) {
            return Err(BrowserError::ContextCreation(
                "scripted session refused a new context".into(),
            ));
        }
        Ok(Box::new(ScriptedPage {
            site: self.site.clone(),
            current: Mutex::new(self.site.start_url.clone()),
            filled: Mutex::new(HashMap::new()),
        }))
    }
}

/// One scripted context. Each context tracks its own URL and form state.
pub struct ScriptedPage {
    site: Arc<SiteModel>,
    current: Mutex<String>,
    filled: Mutex<HashMap<String, String>>,
}

impl ScriptedPage {
    /// Open a standalone page directly on a site (detection probes and
    /// adapter-level tests that bypass the session).
    pub fn open(site: Arc<SiteModel>) -> Self {
        let start = site.start_url.clone();
        Self {
            site,
            current: Mutex::new(start),
            filled: Mutex::new(HashMap::new()),
        }
    }

    fn current_script(&self) -> Option<&PageScript> {
        let url = self.current.lock().unwrap().clone();
        self.site.script(&url)
    }

    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        match self.site.script(url) {
            Some(script) if script.unreachable => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "address unreachable".into(),
            }),
            Some(_) => {
                *self.current.lock().unwrap() = url.to_string();
                self.filled.lock().unwrap().clear();
                Ok(())
            }
            None => Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "no such address in site model".into(),
            }),
        }
    }
}

#[async_trait]
impl PortalPage for ScriptedPage {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.goto(url)
    }

    async fn wait_for(&self, selector: &str) -> Result<(), BrowserError> {
        match self.current_script() {
            Some(script) if script.nodes.contains_key(selector) => Ok(()),
            _ => Err(BrowserError::Timeout(selector.to_string())),
        }
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError> {
        self.filled
            .lock()
            .unwrap()
            .insert(selector.to_string(), value.to_string());
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), BrowserError> {
        let (login, target) = match self.current_script() {
            Some(script) => (
                script.login.clone(),
                script.click_targets.get(selector).cloned(),
            ),
            None => (None, None),
        };

        if let Some(rule) = login {
            if rule.submit_selector == selector {
                let filled = self.filled.lock().unwrap().clone();
                let ok = rule
                    .expected_fields
                    .iter()
                    .all(|(sel, value)| filled.get(sel) == Some(value));
                let dest = if ok { rule.on_success } else { rule.on_failure };
                return self.goto(&dest);
            }
        }
        match target {
            Some(url) => self.goto(&url),
            // Clicks with no scripted effect are inert, like clicking a
            // dead control on a real page.
            None => Ok(()),
        }
    }

    async fn query_one(&self, selector: &str) -> Result<Option<DomNode>, BrowserError> {
        Ok(self
            .current_script()
            .and_then(|s| s.nodes.get(selector))
            .and_then(|nodes| nodes.first().cloned()))
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<DomNode>, BrowserError> {
        Ok(self
            .current_script()
            .and_then(|s| s.nodes.get(selector))
            .cloned()
            .unwrap_or_default())
    }

    fn current_url(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

/// Row node helper: a table row with cells and optional access anchors.
pub fn row(cells: &[&str], anchors: &[(&str, &str)]) -> DomNode {
    let mut node = DomNode::new(cells.join(" ")).with_cells(cells.iter().copied());
    for (href, text) in anchors {
        node = node.with_anchor(Anchor::new(*href, *text));
    }
    node
}
