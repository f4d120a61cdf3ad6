//! Versioned portal adapter layer
//!
//! Adapters encapsulate all portal-version-specific knowledge behind one
//! contract. Family bases carry per-generation defaults; concrete release
//! adapters override only what their release changed.

pub mod family;
pub mod release_513;
mod traits;
mod types;

pub use family::{family_v2, family_v3, family_v4, family_v5, FamilyBase, FamilySpec};
pub use release_513::Release513;
pub use traits::PortalAdapter;
pub use types::{
    AccessType, AdapterDescriptor, AdapterError, CandidateLink, DiscoveredCase, DocumentMeta,
    LinkValidation,
};
