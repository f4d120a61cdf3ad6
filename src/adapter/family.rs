//! Family base adapters — per-generation portal defaults
//!
//! Each portal generation (v2–v5) shares markup conventions across its
//! point releases. A [`FamilySpec`] captures those conventions as data
//! (selectors, access-banner keywords, date format, pagination style)
//! and [`FamilyBase`] implements the whole contract once over that table.
//! Concrete release adapters wrap a family base and override only what
//! their release changed.

use super::traits::PortalAdapter;
use super::types::{
    AccessType, AdapterDescriptor, AdapterError, CandidateLink, DiscoveredCase, DocumentMeta,
    LinkValidation,
};
use crate::browser::{BrowserError, DomNode, PortalPage};
use crate::collab::Credentials;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Pagination safety valve: no known deployment lists this many pages.
const MAX_LIST_PAGES: usize = 200;

/// Selector table for one portal generation.
#[derive(Debug, Clone)]
pub struct Selectors {
    pub version_banner: &'static str,
    pub login_identity: &'static str,
    pub login_secret: &'static str,
    pub login_submit: &'static str,
    pub login_error: &'static str,
    /// Present on every page iff the session is authenticated.
    pub session_marker: &'static str,
    pub case_row: &'static str,
    pub next_page: &'static str,
    pub access_banner: &'static str,
    pub access_denied: &'static str,
    pub authority: &'static str,
    pub document_row: &'static str,
}

/// Lower-cased phrases the access banner uses per access level.
#[derive(Debug, Clone)]
pub struct AccessKeywords {
    pub integral: &'static [&'static str],
    pub partial: &'static [&'static str],
}

/// Everything one generation's releases have in common, as data.
#[derive(Debug, Clone)]
pub struct FamilySpec {
    pub family: &'static str,
    /// Version the family default itself registers under.
    pub default_version: &'static str,
    /// Dotted version prefix the generation covers.
    pub version_range: &'static str,
    pub login_url: &'static str,
    pub case_list_url: &'static str,
    pub selectors: Selectors,
    pub access_keywords: AccessKeywords,
    pub date_format: &'static str,
    /// Whether the list view paginates with a next-page control.
    pub paginated: bool,
    /// Whether document rows carry a signatory column.
    pub has_signatory_column: bool,
    /// Whether case pages show an issuing-authority banner.
    pub has_authority_banner: bool,
    /// Whether the document-table layout is stable across the
    /// generation's releases. When false the base declines
    /// `extract_documents` with a typed `Unsupported`.
    pub stable_document_table: bool,
}

/// Generic contract implementation over a [`FamilySpec`].
pub struct FamilyBase {
    spec: FamilySpec,
}

impl FamilyBase {
    pub fn new(spec: FamilySpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &FamilySpec {
        &self.spec
    }

    /// Pull the first dotted-number token out of a banner text.
    fn version_token(text: &str) -> Option<String> {
        let start = text.find(|c: char| c.is_ascii_digit())?;
        let token: String = text[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();
        let token = token.trim_end_matches('.').to_string();
        if token.contains('.') {
            Some(token)
        } else {
            None
        }
    }

    fn classify_access(&self, banner: &str) -> AccessType {
        let text = banner.to_lowercase();
        if self
            .spec
            .access_keywords
            .integral
            .iter()
            .any(|kw| text.contains(kw))
        {
            AccessType::Integral
        } else if self
            .spec
            .access_keywords
            .partial
            .iter()
            .any(|kw| text.contains(kw))
        {
            AccessType::Partial
        } else {
            AccessType::Unknown
        }
    }

    fn case_from_row(&self, row: &DomNode) -> Option<DiscoveredCase> {
        let number = row
            .cells
            .first()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())?;
        let mut case = DiscoveredCase::new(number);
        for anchor in &row.anchors {
            let id = if anchor.text.trim().is_empty() {
                anchor.href.clone()
            } else {
                anchor.text.trim().to_string()
            };
            case.links.push(CandidateLink::new(id, anchor.href.clone()));
        }
        Some(case)
    }

    /// Parse one document row into (number, meta). Malformed rows are
    /// skipped by the caller, not fatal.
    fn document_from_row(&self, row: &DomNode) -> Option<(String, DocumentMeta)> {
        let number = row
            .cells
            .first()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())?
            .to_string();
        let doc_type = row
            .cells
            .get(1)
            .map(|c| c.trim().to_string())
            .unwrap_or_default();
        let mut meta = DocumentMeta::new(doc_type);
        if let Some(raw) = row.cells.get(2) {
            meta.document_date = NaiveDate::parse_from_str(raw.trim(), self.spec.date_format).ok();
        }
        if self.spec.has_signatory_column {
            meta.signatory = row
                .cells
                .get(3)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());
        }
        Some((number, meta))
    }
}

#[async_trait]
impl PortalAdapter for FamilyBase {
    fn identify(&self) -> AdapterDescriptor {
        AdapterDescriptor::new(
            self.spec.default_version,
            self.spec.version_range,
            self.spec.family,
        )
        .with_description(format!("{} generation defaults", self.spec.family))
    }

    async fn detect_version(
        &self,
        page: &dyn PortalPage,
    ) -> Result<Option<String>, AdapterError> {
        let banner = match page.query_one(self.spec.selectors.version_banner).await? {
            Some(node) => node,
            None => return Ok(None),
        };
        let token = match Self::version_token(&banner.text) {
            Some(token) => token,
            None => return Ok(None),
        };
        if token.starts_with(self.spec.version_range) {
            debug!(family = self.spec.family, version = %token, "version banner matched");
            Ok(Some(token))
        } else {
            Ok(None)
        }
    }

    async fn authenticate(
        &self,
        page: &dyn PortalPage,
        credentials: &Credentials,
    ) -> Result<(), AdapterError> {
        let sel = &self.spec.selectors;
        page.navigate(self.spec.login_url).await?;
        page.fill(sel.login_identity, &credentials.identity).await?;
        page.fill(sel.login_secret, &credentials.secret).await?;
        page.click(sel.login_submit).await?;

        if page.query_one(sel.login_error).await?.is_some() {
            return Err(AdapterError::CredentialsRejected);
        }
        if page.query_one(sel.session_marker).await?.is_some() {
            return Ok(());
        }
        // Neither an error banner nor a session marker: the portal never
        // finished the login round-trip.
        Err(AdapterError::Browser(BrowserError::Timeout(
            sel.session_marker.to_string(),
        )))
    }

    async fn is_authenticated(&self, page: &dyn PortalPage) -> Result<bool, AdapterError> {
        Ok(page
            .query_one(self.spec.selectors.session_marker)
            .await?
            .is_some())
    }

    async fn discover_case_list(
        &self,
        page: &dyn PortalPage,
    ) -> Result<Vec<DiscoveredCase>, AdapterError> {
        let sel = &self.spec.selectors;
        page.navigate(self.spec.case_list_url).await?;

        let mut cases: Vec<DiscoveredCase> = Vec::new();
        let mut seen_pages = 0usize;
        loop {
            seen_pages += 1;
            for row in page.query_all(sel.case_row).await? {
                match self.case_from_row(&row) {
                    // List views repeat a case across pages after
                    // concurrent filings; keep the first sighting.
                    Some(case) if !cases.iter().any(|c| c.case_number == case.case_number) => {
                        cases.push(case)
                    }
                    Some(_) => {}
                    None => debug!(family = self.spec.family, "skipped malformed list row"),
                }
            }

            if !self.spec.paginated {
                break;
            }
            match page.query_one(sel.next_page).await? {
                Some(next) if next.attr("disabled").is_none() => {
                    page.click(sel.next_page).await?;
                }
                _ => break,
            }
            if seen_pages >= MAX_LIST_PAGES {
                warn!(
                    family = self.spec.family,
                    pages = seen_pages,
                    "list pagination did not terminate, stopping"
                );
                break;
            }
        }
        Ok(cases)
    }

    async fn validate_link(
        &self,
        page: &dyn PortalPage,
        link: &CandidateLink,
    ) -> Result<LinkValidation, AdapterError> {
        let sel = &self.spec.selectors;
        if let Err(err) = page.navigate(&link.url).await {
            // An unreachable link is a verdict, not a transport failure.
            return Ok(LinkValidation::invalid(err.to_string()));
        }
        if page.query_one(sel.access_denied).await?.is_some() {
            return Ok(LinkValidation::invalid("portal denied access"));
        }

        let access = match page.query_one(sel.access_banner).await? {
            Some(banner) => self.classify_access(&banner.text),
            None => AccessType::Unknown,
        };
        let mut validation = LinkValidation::valid(access);
        if self.spec.has_authority_banner {
            if let Some(node) = page.query_one(sel.authority).await? {
                let authority = node.text.trim();
                if !authority.is_empty() {
                    validation = validation.with_authority(authority);
                }
            }
        }
        Ok(validation)
    }

    async fn extract_documents(
        &self,
        page: &dyn PortalPage,
    ) -> Result<BTreeMap<String, DocumentMeta>, AdapterError> {
        if !self.spec.stable_document_table {
            return Err(AdapterError::Unsupported(
                "document-table layout varies per release in this generation",
            ));
        }
        let mut documents = BTreeMap::new();
        for row in page.query_all(self.spec.selectors.document_row).await? {
            match self.document_from_row(&row) {
                Some((number, meta)) => {
                    documents.insert(number, meta);
                }
                None => debug!(family = self.spec.family, "skipped malformed document row"),
            }
        }
        Ok(documents)
    }
}

/// v2 — legacy WebForms generation: single-page lists, no authority
/// banner, two-digit years.
pub fn family_v2() -> FamilyBase {
    FamilyBase::new(FamilySpec {
        family: "v2",
        default_version: "2.8.0",
        version_range: "2.",
        login_url: "/principal/login.aspx",
        case_list_url: "/principal/processos.aspx",
        selectors: Selectors {
            version_banner: "#rodape .versao",
            login_identity: "#txtUsuario",
            login_secret: "#txtSenha",
            login_submit: "#btnEntrar",
            login_error: "#lblErro",
            session_marker: "#lnkSair",
            case_row: "#tblProcessos tr.linha",
            next_page: "#lnkProxima",
            access_banner: "#painelAcesso",
            access_denied: "#painelNegado",
            authority: "#lblOrgao",
            document_row: "#tblDocumentos tr.linha",
        },
        access_keywords: AccessKeywords {
            integral: &["integral", "full access"],
            partial: &["partial", "cover sheet"],
        },
        date_format: "%d/%m/%y",
        paginated: false,
        has_signatory_column: false,
        has_authority_banner: false,
        stable_document_table: true,
    })
}

/// v3 — first server-rendered redesign: paginated lists, authority
/// banner appears.
pub fn family_v3() -> FamilyBase {
    FamilyBase::new(FamilySpec {
        family: "v3",
        default_version: "3.5.2",
        version_range: "3.",
        login_url: "/login",
        case_list_url: "/processos",
        selectors: Selectors {
            version_banner: ".versao-sistema",
            login_identity: "input[name=usuario]",
            login_secret: "input[name=senha]",
            login_submit: "button[name=entrar]",
            login_error: ".mensagem-erro",
            session_marker: "a.sair",
            case_row: "table.processos tbody tr",
            next_page: "a.proxima-pagina",
            access_banner: ".painel-acesso",
            access_denied: ".painel-negado",
            authority: ".orgao-julgador",
            document_row: "table.documentos tbody tr",
        },
        access_keywords: AccessKeywords {
            integral: &["integral", "full access"],
            partial: &["partial", "case summary"],
        },
        date_format: "%d/%m/%Y",
        paginated: true,
        has_signatory_column: false,
        has_authority_banner: true,
        stable_document_table: true,
    })
}

/// v4 — grid-based UI refresh.
pub fn family_v4() -> FamilyBase {
    FamilyBase::new(FamilySpec {
        family: "v4",
        default_version: "4.2.0",
        version_range: "4.",
        login_url: "/auth/login",
        case_list_url: "/cases",
        selectors: Selectors {
            version_banner: "footer .app-version",
            login_identity: "#login-usuario",
            login_secret: "#login-senha",
            login_submit: "#login-entrar",
            login_error: ".alert-login",
            session_marker: "#menu-sair",
            case_row: ".case-grid tr.case-row",
            next_page: ".paginator-next",
            access_banner: ".access-banner",
            access_denied: ".access-denied",
            authority: ".case-authority",
            document_row: ".doc-grid tr.doc-row",
        },
        access_keywords: AccessKeywords {
            integral: &["integral", "full access"],
            partial: &["partial", "restricted view"],
        },
        date_format: "%d/%m/%Y",
        paginated: true,
        has_signatory_column: false,
        has_authority_banner: true,
        stable_document_table: true,
    })
}

/// v5 — SPA generation with testid markup. Point releases keep changing
/// the document grid, so the base declines `extract_documents` and the
/// per-release adapters own it.
pub fn family_v5() -> FamilyBase {
    FamilyBase::new(FamilySpec {
        family: "v5",
        default_version: "5.0.0",
        version_range: "5.",
        login_url: "/app/login",
        case_list_url: "/app/cases",
        selectors: Selectors {
            version_banner: "[data-testid=app-version]",
            login_identity: "[data-testid=login-user]",
            login_secret: "[data-testid=login-secret]",
            login_submit: "[data-testid=login-submit]",
            login_error: "[data-testid=login-error]",
            session_marker: "[data-testid=logout]",
            case_row: "[data-testid=case-row]",
            next_page: "[data-testid=page-next]",
            access_banner: "[data-testid=access-banner]",
            access_denied: "[data-testid=access-denied]",
            authority: "[data-testid=authority]",
            document_row: "[data-testid=document-row]",
        },
        access_keywords: AccessKeywords {
            integral: &["integral", "full access"],
            partial: &["partial", "restricted view"],
        },
        date_format: "%Y-%m-%d",
        paginated: true,
        has_signatory_column: true,
        has_authority_banner: true,
        stable_document_table: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::scripted::{row, PageScript, ScriptedPage, SiteModel};
    use crate::browser::DomNode;
    use std::sync::Arc;

    fn v4_site() -> Arc<SiteModel> {
        SiteModel::builder("/")
            .page(
                "/",
                PageScript::new().node("footer .app-version", DomNode::new("versão 4.2.7")),
            )
            .page(
                "/auth/login",
                PageScript::new()
                    .node("#login-usuario", DomNode::new(""))
                    .login(
                        "#login-entrar",
                        [("#login-usuario", "tenant"), ("#login-senha", "s3cret")],
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
                            row(&["0001234-55.2024.1.00.0001"], &[("/case/1234", "L1")]),
                            row(&["0005678-90.2024.1.00.0002"], &[("/case/5678", "L2")]),
                        ],
                    )
                    .node(".paginator-next", DomNode::new("next"))
                    .click_to(".paginator-next", "/cases?page=2"),
            )
            .page(
                "/cases?page=2",
                PageScript::new().node("#menu-sair", DomNode::new("sair")).nodes(
                    ".case-grid tr.case-row",
                    vec![row(&["0009999-11.2024.1.00.0003"], &[("/case/9999", "L1")])],
                ),
            )
            .page(
                "/case/1234",
                PageScript::new()
                    .node(".access-banner", DomNode::new("Full access granted"))
                    .node(".case-authority", DomNode::new("1st Federal Court"))
                    .nodes(
                        ".doc-grid tr.doc-row",
                        vec![
                            row(&["D1", "Petition", "02/03/2024"], &[]),
                            row(&["D2", "Ruling", "not-a-date"], &[]),
                        ],
                    ),
            )
            .page(
                "/case/5678",
                PageScript::new().node(".access-denied", DomNode::new("restricted")),
            )
            .build()
    }

    #[tokio::test]
    async fn detects_version_inside_its_generation() {
        let page = ScriptedPage::open(v4_site());
        let detected = family_v4().detect_version(&page).await.unwrap();
        assert_eq!(detected.as_deref(), Some("4.2.7"));
        // Another family's probe on the same page is inconclusive.
        assert_eq!(family_v3().detect_version(&page).await.unwrap(), None);
    }

    #[tokio::test]
    async fn authenticate_distinguishes_rejection_from_success() {
        let site = v4_site();
        let adapter = family_v4();

        let page = ScriptedPage::open(site.clone());
        let good = Credentials::new("tenant", "s3cret");
        adapter.authenticate(&page, &good).await.unwrap();
        assert!(adapter.is_authenticated(&page).await.unwrap());

        let page = ScriptedPage::open(site);
        let bad = Credentials::new("tenant", "wrong");
        let err = adapter.authenticate(&page, &bad).await.unwrap_err();
        assert!(matches!(err, AdapterError::CredentialsRejected));
    }

    #[tokio::test]
    async fn discovery_walks_pagination_without_opening_cases() {
        let page = ScriptedPage::open(v4_site());
        let cases = family_v4().discover_case_list(&page).await.unwrap();
        let numbers: Vec<_> = cases.iter().map(|c| c.case_number.as_str()).collect();
        assert_eq!(
            numbers,
            vec![
                "0001234-55.2024.1.00.0001",
                "0005678-90.2024.1.00.0002",
                "0009999-11.2024.1.00.0003",
            ]
        );
        assert_eq!(cases[0].links[0].id, "L1");
        assert_eq!(cases[0].links[0].url, "/case/1234");
        // Discovery finishes on the last list page, never on a case page.
        assert_eq!(page.current_url(), "/cases?page=2");
    }

    #[tokio::test]
    async fn validate_link_reads_access_and_authority_in_one_navigation() {
        let site = v4_site();
        let adapter = family_v4();

        let page = ScriptedPage::open(site.clone());
        let ok = adapter
            .validate_link(&page, &CandidateLink::new("L1", "/case/1234"))
            .await
            .unwrap();
        assert!(ok.valid);
        assert_eq!(ok.access_type, AccessType::Integral);
        assert_eq!(ok.authority.as_deref(), Some("1st Federal Court"));

        let denied = adapter
            .validate_link(&page, &CandidateLink::new("L2", "/case/5678"))
            .await
            .unwrap();
        assert!(!denied.valid);

        let dead = adapter
            .validate_link(&page, &CandidateLink::new("LX", "/case/nowhere"))
            .await
            .unwrap();
        assert!(!dead.valid);
        assert_eq!(dead.access_type, AccessType::Error);
        assert!(dead.error.is_some());
    }

    #[tokio::test]
    async fn extract_documents_parses_rows_and_tolerates_bad_dates() {
        let page = ScriptedPage::open(v4_site());
        page.navigate("/case/1234").await.unwrap();
        let docs = family_v4().extract_documents(&page).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs["D1"].document_type, "Petition");
        assert_eq!(
            docs["D1"].document_date,
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
        assert_eq!(docs["D2"].document_date, None);
    }

    #[tokio::test]
    async fn v5_base_declines_document_extraction() {
        let site = SiteModel::builder("/").page("/", PageScript::new()).build();
        let page = ScriptedPage::open(site);
        let err = family_v5().extract_documents(&page).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unsupported(_)));
    }

    #[test]
    fn version_token_parsing() {
        assert_eq!(
            FamilyBase::version_token("versão 4.2.7 — build 991"),
            Some("4.2.7".into())
        );
        assert_eq!(FamilyBase::version_token("v5.1.3"), Some("5.1.3".into()));
        assert_eq!(FamilyBase::version_token("maintenance window"), None);
        assert_eq!(FamilyBase::version_token("build 7"), None);
    }
}
