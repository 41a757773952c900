// ⚙️ Pipeline Configuration
//
// Defaults mirror the conventional layout: raw files under `data/`,
// canonical tables under `data_clean/`, reports under `outputs/`.
// A TOML file can override any field; CLI flags override the file.

use crate::error::{PipelineError, Result};
use crate::schema::DatasetKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root holding one sub-directory per dataset kind
    pub data_dir: PathBuf,

    /// Where canonical tables are written
    pub output_dir: PathBuf,

    /// Where the JSON and Markdown reports are written
    pub report_dir: PathBuf,

    /// Normalize files and kinds on the rayon pool
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("data_clean"),
            report_dir: PathBuf::from("outputs"),
            parallel: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| PipelineError::Config(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Input directory for one dataset kind
    pub fn source_dir(&self, kind: DatasetKind) -> PathBuf {
        self.data_dir.join(kind.source_dir())
    }

    /// Canonical table path for one dataset kind
    pub fn output_path(&self, kind: DatasetKind) -> PathBuf {
        self.output_dir.join(kind.output_file())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();

        assert_eq!(
            config.source_dir(DatasetKind::Biometric),
            PathBuf::from("data/api_data_aadhar_biometric")
        );
        assert_eq!(
            config.output_path(DatasetKind::Enrolment),
            PathBuf::from("data_clean/enrolment_clean.csv")
        );
        assert!(config.parallel);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
            data_dir = "/srv/raw"
            parallel = false
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/raw"));
        assert_eq!(config.output_dir, PathBuf::from("data_clean"));
        assert!(!config.parallel);
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("parallel = \"sometimes\"").unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }
}
