// ⚠️ Pipeline Errors - structural failures only
//
// Row-level defects (bad date, unknown state, bad pincode, negative count,
// missing value) are never errors: they are filtered and tallied by the
// normalizer. Everything here aborts the dataset kind it occurred in.

use crate::schema::DatasetKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// File could not be opened, read, or written
    #[error("[{kind}] I/O error on {}: {source}", .path.display())]
    Io {
        kind: DatasetKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV framing is broken (unbalanced quotes, unreadable header, ...)
    #[error("[{kind}] malformed CSV in {}: {source}", .path.display())]
    Csv {
        kind: DatasetKind,
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// An expected column is absent from the header row
    #[error("[{kind}] column '{column}' missing from {}", .path.display())]
    MissingColumn {
        kind: DatasetKind,
        path: PathBuf,
        column: String,
    },

    /// The kind's input directory has no CSV files
    #[error("[{kind}] no CSV files found in {}", .path.display())]
    EmptyDirectory { kind: DatasetKind, path: PathBuf },

    /// A canonical table holds a value its own writer could not have produced
    #[error("[{kind}] invalid canonical row at line {line} of {}: {message}", .path.display())]
    InvalidCanonical {
        kind: DatasetKind,
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The last run for this kind failed; the table on disk predates it
    #[error("[{kind}] canonical table {} is stale, last run failed: {reason}", .path.display())]
    StaleCanonical {
        kind: DatasetKind,
        path: PathBuf,
        reason: String,
    },

    /// Report or output directory could not be written
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Report serialization failed
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    pub fn io(kind: DatasetKind, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            kind,
            path: path.into(),
            source,
        }
    }

    pub fn csv(kind: DatasetKind, path: impl Into<PathBuf>, source: csv::Error) -> Self {
        PipelineError::Csv {
            kind,
            path: path.into(),
            source,
        }
    }

    /// Dataset kind the failure belongs to, if any
    pub fn kind(&self) -> Option<DatasetKind> {
        match self {
            PipelineError::Io { kind, .. }
            | PipelineError::Csv { kind, .. }
            | PipelineError::MissingColumn { kind, .. }
            | PipelineError::EmptyDirectory { kind, .. }
            | PipelineError::InvalidCanonical { kind, .. }
            | PipelineError::StaleCanonical { kind, .. } => Some(*kind),
            PipelineError::Write { .. } | PipelineError::Json(_) | PipelineError::Config(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_kind_and_file() {
        let err = PipelineError::MissingColumn {
            kind: DatasetKind::Biometric,
            path: PathBuf::from("data/api_data_aadhar_biometric/part_1.csv"),
            column: "bio_age_17_".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("biometric"));
        assert!(msg.contains("part_1.csv"));
        assert!(msg.contains("bio_age_17_"));
        assert_eq!(err.kind(), Some(DatasetKind::Biometric));
    }

    #[test]
    fn test_config_error_has_no_kind() {
        let err = PipelineError::Config("bad".to_string());
        assert_eq!(err.kind(), None);
    }
}
