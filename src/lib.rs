//! Docketwatch: versioned-adapter extraction engine for case portals
//!
//! Extracts case and document metadata from electronic-process portals
//! whose markup changes across releases, and reconciles each run against
//! previously known state.
//!
//! # Core Concepts
//!
//! - **Adapters**: all portal-version-specific knowledge behind one
//!   contract; family bases per generation, concrete release overrides.
//! - **Registry**: process-wide version → adapter catalogue with exact,
//!   prefix, family, and live-detection selection.
//! - **Pipeline**: one run = sequential discovery, bounded-parallel link
//!   validation and document harvest, reconciliation, delta notification.
//!
//! # Example
//!
//! ```
//! use docketwatch::registry::{AdapterFactory, AdapterRegistry};
//!
//! let registry = AdapterRegistry::global();
//! let factory = AdapterFactory::new(registry);
//! let adapter = factory.create_compatible("5.1").expect("built-in adapter");
//! assert_eq!(adapter.identify().version, "5.1.3");
//! ```

pub mod adapter;
pub mod browser;
pub mod collab;
pub mod config;
pub mod pipeline;
pub mod registry;

pub use adapter::{AccessType, AdapterDescriptor, AdapterError, PortalAdapter};
pub use browser::{Browser, BrowserError, DomNode, PortalPage};
pub use collab::{CaseStore, CredentialProvider, Credentials, Notifier};
pub use config::EngineConfig;
pub use pipeline::{
    CancellationToken, CaseRecord, DocumentRecord, ExtractionPipeline, PipelineError, RunHandle,
    RunReport, RunResult, RunState,
};
pub use registry::{AdapterFactory, AdapterRegistry, RegistryError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
