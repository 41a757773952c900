// Aadhaar Clean - Core Library
// Exposes all modules for use in the CLI, API server, and tests

pub mod error;
pub mod schema;      // Column layout per dataset kind
pub mod geography;   // Reference set of states / union territories
pub mod normalizer;  // Per-row cleaning stages
pub mod merger;      // Concatenate, dedup, derive, sort
pub mod canonical;   // Canonical table persistence
pub mod report;      // Cleaning report (JSON + Markdown)
pub mod config;
pub mod logging;
pub mod pipeline;    // End-to-end orchestration
pub mod query;       // Aggregate views over canonical tables

// Re-export commonly used types
pub use error::{PipelineError, Result};
pub use schema::DatasetKind;
pub use geography::{GeographyValidator, VALID_STATES};
pub use normalizer::{
    Defect, DefectTally, FileOutcome, NormalizedRecord, Normalizer, RawRecord,
};
pub use merger::{CanonicalRecord, DatasetMerger, FileTally, MergeOutcome};
pub use canonical::{failure_marker_path, mark_failed, read_canonical, write_canonical, Artifact};
pub use report::{CleaningReport, DatasetStats, ReportBuilder};
pub use config::PipelineConfig;
pub use logging::init_logging;
pub use pipeline::{discover_files, Pipeline, PipelineRun};
pub use query::{CanonicalStore, CanonicalTables, QueryError};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
