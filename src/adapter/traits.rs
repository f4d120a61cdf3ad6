//! Adapter trait — the contract portal-version adapters implement
//!
//! All portal-version-specific knowledge lives behind this trait: how to
//! log in, how the list view paginates, what a valid case link looks
//! like, and how the document table is laid out. The pipeline and the
//! registry only ever see the contract.

use super::types::{
    AdapterDescriptor, AdapterError, CandidateLink, DiscoveredCase, DocumentMeta, LinkValidation,
};
use crate::browser::PortalPage;
use crate::collab::Credentials;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// The contract every portal-version adapter satisfies.
///
/// Family bases implement it once with generation defaults; a concrete
/// release adapter wraps its family base and overrides only the methods
/// whose behavior changed in that release (delegation, not
/// re-implementation).
#[async_trait]
pub trait PortalAdapter: Send + Sync {
    /// Self-identification. Pure — no I/O, no page access.
    fn identify(&self) -> AdapterDescriptor;

    /// Probe a live page for the portal version this adapter recognizes.
    ///
    /// An inconclusive probe is `Ok(None)`, not an error; only transport
    /// failure is an `Err`.
    async fn detect_version(&self, page: &dyn PortalPage)
        -> Result<Option<String>, AdapterError>;

    /// Log the browsing context in.
    ///
    /// Rejected credentials are `AdapterError::CredentialsRejected`,
    /// distinct from transport-level `AdapterError::Browser`.
    async fn authenticate(
        &self,
        page: &dyn PortalPage,
        credentials: &Credentials,
    ) -> Result<(), AdapterError>;

    /// Whether the context currently holds an authenticated session.
    /// Side-effect-free.
    async fn is_authenticated(&self, page: &dyn PortalPage) -> Result<bool, AdapterError>;

    /// Walk the list view and return every visible case with its raw
    /// candidate links, in list order. Handles pagination internally and
    /// never opens an individual case page.
    async fn discover_case_list(
        &self,
        page: &dyn PortalPage,
    ) -> Result<Vec<DiscoveredCase>, AdapterError>;

    /// Open one candidate link and judge it, opportunistically reading
    /// the issuing authority from the same navigation.
    async fn validate_link(
        &self,
        page: &dyn PortalPage,
        link: &CandidateLink,
    ) -> Result<LinkValidation, AdapterError>;

    /// Read the document table of the case page the context is currently
    /// on. Assumes a prior `validate_link` left the case page open.
    async fn extract_documents(
        &self,
        page: &dyn PortalPage,
    ) -> Result<BTreeMap<String, DocumentMeta>, AdapterError>;
}

impl std::fmt::Debug for dyn PortalAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PortalAdapter").field(&self.identify()).finish()
    }
}
