//! Browser-automation collaborator seam
//!
//! The engine drives portals through opaque primitives: open a browsing
//! context, navigate, wait for load, query elements, read content. Real
//! deployments back these traits with a headless-browser driver; the
//! crate ships a scripted in-memory implementation for the test suite
//! (same role as an in-memory storage backend).

pub mod scripted;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the browsing collaborator.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to create browsing context: {0}")]
    ContextCreation(String),

    #[error("navigation to '{url}' failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("timed out waiting for '{0}'")]
    Timeout(String),

    #[error("browsing session closed")]
    SessionClosed,
}

/// A hyperlink read from the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

impl Anchor {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }
}

/// A detached snapshot of a queried element.
///
/// Adapters never hold live element handles; they read text, attributes,
/// table cells and anchors from the snapshot and navigate again for more.
#[derive(Debug, Clone, Default)]
pub struct DomNode {
    pub text: String,
    pub attributes: HashMap<String, String>,
    /// Cell texts when the element is a table row.
    pub cells: Vec<String>,
    /// Anchors contained in the element.
    pub anchors: Vec<Anchor>,
}

impl DomNode {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_cells<I, S>(mut self, cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cells = cells.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_anchor(mut self, anchor: Anchor) -> Self {
        self.anchors.push(anchor);
        self
    }

    /// Attribute lookup by name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// One isolated browsing context (page) inside a shared session.
///
/// Methods take `&self`; implementations use interior mutability so a
/// context can be shared across await points without exclusive borrows.
#[async_trait]
pub trait PortalPage: Send + Sync {
    /// Navigate the context to a URL and wait for the load to settle.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Wait until an element matching the selector is present.
    async fn wait_for(&self, selector: &str) -> Result<(), BrowserError>;

    /// Type a value into the element matching the selector.
    async fn fill(&self, selector: &str, value: &str) -> Result<(), BrowserError>;

    /// Click the element matching the selector.
    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    /// Snapshot the first element matching the selector, if any.
    async fn query_one(&self, selector: &str) -> Result<Option<DomNode>, BrowserError>;

    /// Snapshot every element matching the selector.
    async fn query_all(&self, selector: &str) -> Result<Vec<DomNode>, BrowserError>;

    /// The context's current URL.
    fn current_url(&self) -> String;
}

/// The shared browser session.
///
/// Context creation must tolerate concurrent callers; the parallel
/// extraction stage opens one context per worker.
#[async_trait]
pub trait Browser: Send + Sync {
    async fn new_context(&self) -> Result<Box<dyn PortalPage>, BrowserError>;
}
