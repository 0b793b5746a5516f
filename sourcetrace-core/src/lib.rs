//! SourceTrace core library.
//!
//! Provenance triage for user-generated media: collect embedded-metadata,
//! content-credentials, and reverse-search signals, aggregate them into a
//! bundle, and synthesize a confidence verdict through a reasoning backend.
//! A separate generator drafts rights-clearance outreach messages.
//!
//! The design principle throughout is graceful degradation: external
//! failures (backend, network, parsers) are absorbed into typed markers and
//! deterministic fallbacks, while caller contract violations surface as
//! errors. [`TriagePipeline`] is the main entry point.

pub mod aggregator;
pub mod backend;
pub mod config;
pub mod error;
pub mod outreach;
pub mod pipeline;
pub mod signals;
pub mod synthesis;
pub mod types;

pub use config::{load_config, TriageConfig};
pub use error::{Result, SourceTraceError};
pub use pipeline::TriagePipeline;
pub use types::{
    AnalysisInput, AnalysisReport, LicenseParams, OutreachDraft, OutreachReport, OwnerInfo,
    Recommendation, SignalBundle, Verdict,
};
