//! Adapter selection strategies
//!
//! Stateless, layered resolution over a registry: exact version,
//! family-latest, compatible prefix, live auto-detection, fallback
//! chain, and detection with retry. No strategy mutates the registry.

use super::{AdapterRegistry, RegistryError};
use crate::adapter::PortalAdapter;
use crate::browser::PortalPage;
use crate::config::EngineConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves "which adapter" for a run.
pub struct AdapterFactory<'r> {
    registry: &'r AdapterRegistry,
}

impl<'r> AdapterFactory<'r> {
    pub fn new(registry: &'r AdapterRegistry) -> Self {
        Self { registry }
    }

    /// Factory over the process-wide registry.
    pub fn global() -> AdapterFactory<'static> {
        AdapterFactory::new(AdapterRegistry::global())
    }

    /// Strategy 1: exact version.
    pub fn create(&self, version: &str) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        self.registry
            .get(version)
            .map(|entry| entry.adapter)
            .ok_or_else(|| RegistryError::NoMatch(version.to_string()))
    }

    /// Strategy 2: newest adapter in a family.
    pub fn create_by_family(
        &self,
        family: &str,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        let version = self
            .registry
            .latest(Some(family))
            .ok_or_else(|| RegistryError::UnknownFamily(family.to_string()))?;
        self.create(&version)
    }

    /// Strategy 3: newest adapter whose version matches a dotted prefix.
    pub fn create_compatible(
        &self,
        prefix: &str,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        let version = self
            .registry
            .find_compatible(prefix)
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NoMatch(prefix.to_string()))?;
        self.create(&version)
    }

    /// Strategy 4: probe the live page with every candidate, newest
    /// first, short-circuiting on the first conclusive probe.
    ///
    /// A probe's transport error counts as inconclusive: portals under
    /// load answer some probes and drop others. The detected version is
    /// resolved exact-then-compatible so the result agrees with
    /// `create_compatible` when both would match.
    pub async fn auto_detect(
        &self,
        page: &dyn PortalPage,
        family_filter: Option<&str>,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        let candidates = match family_filter {
            Some(family) => self.registry.versions_in_family(family),
            None => self.registry.versions(),
        };
        if candidates.is_empty() {
            return Err(RegistryError::Empty);
        }

        for version in candidates {
            let Some(entry) = self.registry.get(&version) else {
                continue;
            };
            match entry.adapter.detect_version(page).await {
                Ok(Some(detected)) => {
                    debug!(candidate = %version, detected = %detected, "live probe matched");
                    return self
                        .create(&detected)
                        .or_else(|_| self.create_compatible(&detected))
                        .or(Ok(entry.adapter));
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(candidate = %version, error = %err, "probe failed, continuing");
                }
            }
        }
        Err(RegistryError::DetectionFailed)
    }

    /// Strategy 5: exact version, then live detection, then the newest
    /// adapter of a fallback family.
    pub async fn create_with_fallback(
        &self,
        page: &dyn PortalPage,
        version: &str,
        fallback_family: &str,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        if let Ok(adapter) = self.create(version) {
            return Ok(adapter);
        }
        match self.auto_detect(page, None).await {
            Ok(adapter) => Ok(adapter),
            Err(err) => {
                warn!(
                    requested = %version,
                    error = %err,
                    fallback = %fallback_family,
                    "detection failed, falling back to family default"
                );
                self.create_by_family(fallback_family)
            }
        }
    }

    /// Strategy 6: repeat auto-detection up to `attempts` times with a
    /// pause between rounds, riding out transient portal flakiness.
    pub async fn create_with_retry(
        &self,
        page: &dyn PortalPage,
        family_filter: Option<&str>,
        attempts: u32,
        pause: Duration,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        let attempts = attempts.max(1);
        let mut last = RegistryError::DetectionFailed;
        for attempt in 1..=attempts {
            match self.auto_detect(page, family_filter).await {
                Ok(adapter) => return Ok(adapter),
                Err(err) => {
                    debug!(attempt, error = %err, "detection attempt failed");
                    last = err;
                }
            }
            if attempt < attempts {
                tokio::time::sleep(pause).await;
            }
        }
        Err(last)
    }

    /// Resolve an adapter the way a deployment configures it.
    ///
    /// A pinned version goes through the fallback chain; otherwise live
    /// detection runs with the configured retry budget, landing on the
    /// fallback family when detection exhausts.
    pub async fn resolve_from_config(
        &self,
        page: &dyn PortalPage,
        config: &EngineConfig,
    ) -> Result<Arc<dyn PortalAdapter>, RegistryError> {
        if let Some(version) = &config.portal_version {
            if let Some(family) = &config.fallback_family {
                return self.create_with_fallback(page, version, family).await;
            }
            return match self.create(version) {
                Ok(adapter) => Ok(adapter),
                Err(_) => self.auto_detect(page, None).await,
            };
        }
        match self
            .create_with_retry(page, None, config.detect_attempts, config.detect_pause())
            .await
        {
            Ok(adapter) => Ok(adapter),
            Err(err) => match &config.fallback_family {
                Some(family) => {
                    warn!(
                        error = %err,
                        family = %family,
                        "detection exhausted, using fallback family"
                    );
                    self.create_by_family(family)
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::StubAdapter;
    use super::*;
    use crate::adapter::{family_v4, Release513};
    use crate::browser::scripted::{PageScript, ScriptedPage, SiteModel};
    use crate::browser::DomNode;
    use std::sync::Arc;

    fn registry_with(versions: &[(&str, &str, &str)]) -> AdapterRegistry {
        let registry = AdapterRegistry::new();
        for (version, range, family) in versions {
            registry
                .register(Arc::new(StubAdapter::new(version, range, family)), None)
                .unwrap();
        }
        registry
    }

    fn blank_page() -> ScriptedPage {
        ScriptedPage::open(SiteModel::builder("/").page("/", PageScript::new()).build())
    }

    #[test]
    fn exact_create_misses_cleanly() {
        let registry = registry_with(&[("4.2.0", "4.2", "v4")]);
        let factory = AdapterFactory::new(&registry);
        assert!(factory.create("4.2.0").is_ok());
        assert!(matches!(
            factory.create("9.9.9"),
            Err(RegistryError::NoMatch(_))
        ));
    }

    #[test]
    fn family_selection_prefers_newest() {
        let registry = registry_with(&[
            ("4.1.0", "4.1", "v4"),
            ("4.2.0", "4.2", "v4"),
            ("3.5.2", "3.5", "v3"),
        ]);
        let factory = AdapterFactory::new(&registry);
        let adapter = factory.create_by_family("v4").unwrap();
        assert_eq!(adapter.identify().version, "4.2.0");
        assert!(matches!(
            factory.create_by_family("v9"),
            Err(RegistryError::UnknownFamily(_))
        ));
    }

    #[test]
    fn compatible_prefix_prefers_newest_match() {
        let registry = registry_with(&[
            ("4.2.0", "4.2", "v4"),
            ("4.2.5", "4.2", "v4"),
            ("4.3.0", "4.3", "v4"),
        ]);
        let factory = AdapterFactory::new(&registry);
        let adapter = factory.create_compatible("4.2").unwrap();
        assert_eq!(adapter.identify().version, "4.2.5");
    }

    #[tokio::test]
    async fn auto_detect_probes_newest_first_and_short_circuits() {
        let registry = AdapterRegistry::new();
        registry
            .register(Arc::new(StubAdapter::new("4.1.0", "4.1", "v4")), None)
            .unwrap();
        registry
            .register(
                Arc::new(StubAdapter::new("4.2.0", "4.2", "v4").detecting("4.2.0")),
                None,
            )
            .unwrap();

        let factory = AdapterFactory::new(&registry);
        let page = blank_page();
        let adapter = factory.auto_detect(&page, None).await.unwrap();
        assert_eq!(adapter.identify().version, "4.2.0");
    }

    #[tokio::test]
    async fn auto_detect_agrees_with_create_compatible() {
        // A live v4 page and a prefix both resolve to the same adapter.
        let registry = AdapterRegistry::new();
        registry.register(Arc::new(family_v4()), None).unwrap();
        registry.register(Arc::new(Release513::new()), None).unwrap();

        let site = SiteModel::builder("/")
            .page(
                "/",
                PageScript::new().node("footer .app-version", DomNode::new("versão 4.2.0")),
            )
            .build();
        let page = ScriptedPage::open(site);

        let factory = AdapterFactory::new(&registry);
        let detected = factory.auto_detect(&page, None).await.unwrap();
        let compatible = factory.create_compatible("4.2").unwrap();
        assert_eq!(detected.identify(), compatible.identify());
    }

    #[tokio::test]
    async fn auto_detect_reports_failure_when_nothing_matches() {
        let registry = registry_with(&[("4.2.0", "4.2", "v4")]);
        let factory = AdapterFactory::new(&registry);
        let page = blank_page();
        assert!(matches!(
            factory.auto_detect(&page, None).await,
            Err(RegistryError::DetectionFailed)
        ));

        let empty = AdapterRegistry::new();
        let factory = AdapterFactory::new(&empty);
        assert!(matches!(
            factory.auto_detect(&page, None).await,
            Err(RegistryError::Empty)
        ));
    }

    #[tokio::test]
    async fn fallback_chain_lands_on_family_default() {
        let registry = registry_with(&[("3.5.2", "3.5", "v3")]);
        let factory = AdapterFactory::new(&registry);
        let page = blank_page();
        // Unknown exact version, no live match — fall back to v3 latest.
        let adapter = factory
            .create_with_fallback(&page, "4.9.0", "v3")
            .await
            .unwrap();
        assert_eq!(adapter.identify().version, "3.5.2");
    }

    #[tokio::test]
    async fn retry_surfaces_the_last_detection_error() {
        let registry = registry_with(&[("4.2.0", "4.2", "v4")]);
        let factory = AdapterFactory::new(&registry);
        let page = blank_page();
        let err = factory
            .create_with_retry(&page, None, 3, Duration::from_millis(1))
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::DetectionFailed));
    }

    #[tokio::test]
    async fn retry_succeeds_once_a_probe_matches() {
        let registry = AdapterRegistry::new();
        registry
            .register(
                Arc::new(StubAdapter::new("4.2.0", "4.2", "v4").detecting("4.2.0")),
                None,
            )
            .unwrap();
        let factory = AdapterFactory::new(&registry);
        let page = blank_page();
        let adapter = factory
            .create_with_retry(&page, Some("v4"), 2, Duration::from_millis(1))
            .await
            .unwrap();
        assert_eq!(adapter.identify().version, "4.2.0");
    }

    #[tokio::test]
    async fn config_resolution_honors_pin_and_fallback() {
        let registry = registry_with(&[("4.2.0", "4.2", "v4"), ("3.5.2", "3.5", "v3")]);
        let factory = AdapterFactory::new(&registry);
        let page = blank_page();

        // Pinned version resolves directly.
        let pinned = EngineConfig {
            portal_version: Some("4.2.0".into()),
            ..EngineConfig::default()
        };
        let adapter = factory.resolve_from_config(&page, &pinned).await.unwrap();
        assert_eq!(adapter.identify().version, "4.2.0");

        // No pin, blank page: detection exhausts into the fallback family.
        let fallback = EngineConfig {
            detect_attempts: 1,
            detect_pause_ms: 1,
            fallback_family: Some("v3".into()),
            ..EngineConfig::default()
        };
        let adapter = factory.resolve_from_config(&page, &fallback).await.unwrap();
        assert_eq!(adapter.identify().version, "3.5.2");
    }
}
