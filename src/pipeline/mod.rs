//! Extraction pipeline
//!
//! Drives one full run: sequential case discovery, bounded-parallel link
//! validation and document harvest, reconciliation against prior state,
//! and delta notification.

mod cancel;
pub mod reconcile;
mod run;
mod types;

pub use cancel::CancellationToken;
pub use run::{ExtractionPipeline, PipelineError, RunHandle};
pub use types::{
    CaseCategory, CaseOutcome, CaseRecord, CategorizationStatus, DocumentRecord, DownloadStatus,
    LinkObservation, LinkState, LinkStatus, RunReport, RunResult, RunState,
};
