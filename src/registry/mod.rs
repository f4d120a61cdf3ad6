//! Process-wide adapter registry
//!
//! Version → adapter catalogue, initialized once at startup and read
//! concurrently by every run afterwards. Backed by a single concurrent
//! map so a reader can never observe a partially-registered adapter;
//! family views are derived from descriptors at query time.

mod factory;

pub use factory::AdapterFactory;

use crate::adapter::{
    family_v2, family_v3, family_v4, family_v5, AdapterDescriptor, PortalAdapter, Release513,
};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::{info, warn};

/// Errors from registration and adapter selection.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("adapter contract violation: {0}")]
    ContractViolation(String),

    #[error("no adapter registered for version '{0}'")]
    NoMatch(String),

    #[error("no adapter registered for family '{0}'")]
    UnknownFamily(String),

    #[error("no registered adapter matched the live page")]
    DetectionFailed,

    #[error("adapter registry is empty")]
    Empty,
}

/// One catalogue entry: the immutable descriptor plus the shared
/// adapter instance handed out by the factory.
#[derive(Clone)]
pub struct RegisteredAdapter {
    pub descriptor: AdapterDescriptor,
    pub adapter: Arc<dyn PortalAdapter>,
}

/// The version → adapter catalogue.
#[derive(Default)]
pub struct AdapterRegistry {
    entries: DashMap<String, RegisteredAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under its self-identified version, or under
    /// `version_override` when given.
    ///
    /// Fails on contract violations; a duplicate version overwrites the
    /// previous registration with a warning.
    pub fn register(
        &self,
        adapter: Arc<dyn PortalAdapter>,
        version_override: Option<&str>,
    ) -> Result<String, RegistryError> {
        let descriptor = adapter.identify();
        let version = version_override
            .map(str::to_string)
            .unwrap_or_else(|| descriptor.version.clone());

        if version.trim().is_empty() {
            return Err(RegistryError::ContractViolation(
                "adapter version must not be empty".into(),
            ));
        }
        if descriptor.family.trim().is_empty() {
            return Err(RegistryError::ContractViolation(format!(
                "adapter '{version}' declares no family"
            )));
        }
        if !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(RegistryError::ContractViolation(format!(
                "version '{version}' is not a dotted version string"
            )));
        }
        if !descriptor.covers(&version) {
            return Err(RegistryError::ContractViolation(format!(
                "version '{}' is outside the adapter's declared range '{}'",
                version, descriptor.version_range
            )));
        }

        let entry = RegisteredAdapter {
            descriptor: descriptor.clone(),
            adapter,
        };
        if self.entries.insert(version.clone(), entry).is_some() {
            warn!(version = %version, "duplicate adapter registration overwritten");
        } else {
            info!(version = %version, family = %descriptor.family, "adapter registered");
        }
        Ok(version)
    }

    pub fn unregister(&self, version: &str) -> bool {
        self.entries.remove(version).is_some()
    }

    pub fn get(&self, version: &str) -> Option<RegisteredAdapter> {
        self.entries.get(version).map(|e| e.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All registered versions, newest first.
    ///
    /// Ordering is lexical on the version string: multi-digit components
    /// misorder ("10.0.0" sorts before "9.0.0"). Kept as-is for parity
    /// with the deployed selection behavior.
    pub fn versions(&self) -> Vec<String> {
        let mut versions: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// All families with at least one registered adapter.
    pub fn families(&self) -> BTreeSet<String> {
        self.entries
            .iter()
            .map(|e| e.value().descriptor.family.clone())
            .collect()
    }

    /// Versions registered under one family, newest first.
    pub fn versions_in_family(&self, family: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().descriptor.family == family)
            .map(|e| e.key().clone())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Registered versions matching a dotted prefix, newest first.
    pub fn find_compatible(&self, prefix: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        versions
    }

    /// Newest registered version, optionally within one family.
    pub fn latest(&self, family: Option<&str>) -> Option<String> {
        match family {
            Some(family) => self.versions_in_family(family).into_iter().next(),
            None => self.versions().into_iter().next(),
        }
    }

    /// The process-wide registry, populated with the built-in adapters
    /// on first access.
    pub fn global() -> &'static AdapterRegistry {
        static GLOBAL: OnceLock<AdapterRegistry> = OnceLock::new();
        GLOBAL.get_or_init(|| {
            let registry = AdapterRegistry::new();
            install_builtin_adapters(&registry);
            registry
        })
    }
}

/// Register every adapter this crate ships: one family default per
/// generation plus the concrete release adapters.
pub fn install_builtin_adapters(registry: &AdapterRegistry) {
    let builtins: Vec<Arc<dyn PortalAdapter>> = vec![
        Arc::new(family_v2()),
        Arc::new(family_v3()),
        Arc::new(family_v4()),
        Arc::new(family_v5()),
        Arc::new(Release513::new()),
    ];
    for adapter in builtins {
        if let Err(err) = registry.register(adapter, None) {
            // Built-ins are static; a violation here is a packaging bug.
            warn!(error = %err, "built-in adapter failed to register");
        }
    }
}
