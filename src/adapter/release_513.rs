//! Release 5.1.3 adapter
//!
//! The 5.1.x line reworked the document grid (signatory column moved,
//! ISO dates) and pinned the exact version in the app banner. Everything
//! else is stock v5, so this adapter delegates to the family base and
//! overrides only identification, detection, and document extraction.

use super::family::{family_v5, FamilyBase};
use super::traits::PortalAdapter;
use super::types::{
    AdapterDescriptor, AdapterError, CandidateLink, DiscoveredCase, DocumentMeta, LinkValidation,
};
use crate::browser::PortalPage;
use crate::collab::Credentials;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::debug;

const VERSION: &str = "5.1.3";

/// Concrete adapter for portal release 5.1.3.
pub struct Release513 {
    base: FamilyBase,
}

impl Release513 {
    pub fn new() -> Self {
        Self { base: family_v5() }
    }
}

impl Default for Release513 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PortalAdapter for Release513 {
    fn identify(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(VERSION, "5.1", "v5")
            .with_description("release 5.1.3: reworked document grid, pinned version banner")
    }

    async fn detect_version(
        &self,
        page: &dyn PortalPage,
    ) -> Result<Option<String>, AdapterError> {
        // The banner pins the exact release; anything else in the v5
        // range belongs to the family default.
        Ok(self
            .base
            .detect_version(page)
            .await?
            .filter(|v| v == VERSION))
    }

    async fn authenticate(
        &self,
        page: &dyn PortalPage,
        credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        self.base.authenticate(page, credentials).await
    }

    async fn is_authenticated(&self, page: &dyn PortalPage) -> Result<bool, AdapterError> {
        self.base.is_authenticated(page).await
    }

    async fn discover_case_list(
        &self,
        page: &dyn PortalPage,
    ) -> Result<Vec<DiscoveredCase>, AdapterError> {
        self.base.discover_case_list(page).await
    }

    async fn validate_link(
        &self,
        page: &dyn PortalPage,
        link: &CandidateLink,
    ) -> Result<LinkValidation, AdapterError> {
        self.base.validate_link(page, link).await
    }

    async fn extract_documents(
        &self,
        page: &dyn PortalPage,
    ) -> Result<BTreeMap<String, DocumentMeta>, AdapterError> {
        let mut documents = BTreeMap::new();
        for row in page.query_all("[data-testid=document-row]").await? {
            // 5.1.x grid: number | signatory | type | ISO date
            let number = match row.cells.first().map(|c| c.trim()) {
                Some(n) if !n.is_empty() => n.to_string(),
                _ => {
                    debug!("skipped malformed 5.1.x document row");
                    continue;
                }
            };
            let signatory = row
                .cells
                .get(1)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
            let doc_type = row
                .cells
                .get(2)
                .map(|c| c.trim().to_string())
                .unwrap_or_default();
            let mut meta = DocumentMeta::new(doc_type);
            meta.signatory = signatory;
            if let Some(raw) = row.cells.get(3) {
                meta.document_date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok();
            }
            documents.insert(number, meta);
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{row, PageScript, ScriptedPage, SiteModel};
    use crate::browser::DomNode;

    #[tokio::test]
    async fn detection_requires_the_exact_release() {
        let exact = SiteModel::builder("/")
            .page(
                "/",
                PageScript::new().node("[data-testid=app-version]", DomNode::new("v5.1.3")),
            )
            .build();
        let page = ScriptedPage::open(exact);
        let adapter = Release513::new();
        assert_eq!(
            adapter.detect_version(&page).await.unwrap().as_deref(),
            Some("5.1.3")
        );

        let other = SiteModel::builder("/")
            .page(
                "/",
                PageScript::new().node("[data-testid=app-version]", DomNode::new("v5.0.4")),
            )
            .build();
        let page = ScriptedPage::open(other);
        assert_eq!(adapter.detect_version(&page).await.unwrap(), None);
        // The family base still recognizes it as v5.
        assert_eq!(
            family_v5().detect_version(&page).await.unwrap().as_deref(),
            Some("5.0.4")
        );
    }

    #[tokio::test]
    async fn document_grid_parses_signatory_and_iso_dates() {
        let site = SiteModel::builder("/case/1")
            .page(
                "/case/1",
                PageScript::new().nodes(
                    "[data-testid=document-row]",
                    vec![
                        row(&["D1", "J. Silva", "Ruling", "2024-05-17"], &[]),
                        row(&["D2", "", "Petition", "2024-05-02"], &[]),
                    ],
                ),
            )
            .build();
        let page = ScriptedPage::open(site);
        let docs = Release513::new().extract_documents(&page).await.unwrap();
        assert_eq!(docs["D1"].signatory.as_deref(), Some("J. Silva"));
        assert_eq!(docs["D1"].document_type, "Ruling");
        assert_eq!(
            docs["D1"].document_date,
            NaiveDate::from_ymd_opt(2024, 5, 17)
        );
        assert_eq!(docs["D2"].signatory, None);
    }

    #[test]
    fn identity_stays_inside_its_declared_range() {
        let desc = Release513::new().identify();
        assert_eq!(desc.version, "5.1.3");
        assert!(desc.covers(&desc.version));
        assert_eq!(desc.family, "v5");
    }
}
