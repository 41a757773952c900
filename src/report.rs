// 📋 Cleaning Report - per-dataset tallies + cross-dataset summary
//
// Pure aggregation over already-validated tables. Every figure is a plain
// u64/f64/String so the report serializes as-is. A kind with zero rows
// reports zero totals and an empty date range; a kind that failed
// structurally appears under `failures` and contributes nothing else.

use crate::canonical::Artifact;
use crate::error::{PipelineError, Result};
use crate::merger::{FileTally, MergeOutcome};
use crate::normalizer::DefectTally;
use crate::schema::DatasetKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

pub const JSON_REPORT_FILE: &str = "data_cleaning_report.json";
pub const MARKDOWN_REPORT_FILE: &str = "data_cleaning_report.md";

// ============================================================================
// REPORT TYPES
// ============================================================================

/// DatasetStats - everything the run learned about one dataset kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetStats {
    #[serde(flatten)]
    pub tally: DefectTally,
    pub duplicates_removed: u64,
    /// Canonical rows after deduplication
    pub rows_cleaned: u64,
    /// rows_out / rows_in over all files, 0.0 when nothing came in
    pub data_quality: f64,
    /// rows_cleaned / rows_in, i.e. after duplicate removal
    #[serde(default)]
    pub retained_ratio: f64,
    pub files: Vec<FileTally>,
}

impl DatasetStats {
    pub fn quality_percent(&self) -> f64 {
        self.data_quality * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueLocations {
    pub states: u64,
    pub districts: u64,
    pub pincodes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_records_cleaned: BTreeMap<DatasetKind, u64>,
    pub date_range: BTreeMap<DatasetKind, DateRange>,
    /// Set union across all kinds, not per kind
    pub unique_locations: UniqueLocations,
    /// Keyed by the derived total column name
    pub grand_totals: BTreeMap<String, u64>,
}

/// CleaningReport - terminal artifact of a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub datasets: BTreeMap<DatasetKind, DatasetStats>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub failures: BTreeMap<DatasetKind, String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
}

// ============================================================================
// REPORT BUILDER
// ============================================================================

#[derive(Default)]
pub struct ReportBuilder {
    datasets: BTreeMap<DatasetKind, DatasetStats>,
    summary: Summary,
    states: HashSet<String>,
    districts: HashSet<String>,
    pincodes: HashSet<String>,
    failures: BTreeMap<DatasetKind, String>,
    artifacts: Vec<Artifact>,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one kind's merged table and tallies into the report
    pub fn add_outcome(&mut self, outcome: &MergeOutcome) -> &mut Self {
        let kind = outcome.kind;
        let rows_cleaned = outcome.rows_cleaned();

        let ratio = |part: u64| {
            if outcome.tally.rows_in == 0 {
                0.0
            } else {
                part as f64 / outcome.tally.rows_in as f64
            }
        };
        let data_quality = ratio(outcome.tally.rows_out);
        let retained_ratio = ratio(rows_cleaned);

        self.datasets.insert(
            kind,
            DatasetStats {
                tally: outcome.tally.clone(),
                duplicates_removed: outcome.duplicates_removed,
                rows_cleaned,
                data_quality,
                retained_ratio,
                files: outcome.files.clone(),
            },
        );

        // Table is sorted by date, so the ends are the range
        let range = DateRange {
            start: outcome.table.first().map(|r| r.date),
            end: outcome.table.last().map(|r| r.date),
        };

        self.summary.total_records_cleaned.insert(kind, rows_cleaned);
        self.summary.date_range.insert(kind, range);
        self.summary.grand_totals.insert(
            kind.total_column().to_string(),
            outcome.table.iter().map(|r| r.total).sum(),
        );

        for row in &outcome.table {
            if !self.states.contains(&row.state) {
                self.states.insert(row.state.clone());
            }
            if !self.districts.contains(&row.district) {
                self.districts.insert(row.district.clone());
            }
            if !self.pincodes.contains(&row.pincode) {
                self.pincodes.insert(row.pincode.clone());
            }
        }
        self.summary.unique_locations = UniqueLocations {
            states: self.states.len() as u64,
            districts: self.districts.len() as u64,
            pincodes: self.pincodes.len() as u64,
        };

        self
    }

    /// Record a kind whose pipeline aborted on a structural error
    pub fn add_failure(&mut self, kind: DatasetKind, error: &PipelineError) -> &mut Self {
        self.failures.insert(kind, error.to_string());
        self
    }

    pub fn add_artifact(&mut self, artifact: Artifact) -> &mut Self {
        self.artifacts.push(artifact);
        self
    }

    /// Current union sizes, as they would appear in the built report
    pub fn unique_locations(&self) -> &UniqueLocations {
        &self.summary.unique_locations
    }

    pub fn build(self) -> CleaningReport {
        CleaningReport {
            run_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            datasets: self.datasets,
            summary: self.summary,
            failures: self.failures,
            artifacts: self.artifacts,
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

impl CleaningReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Human-readable rendering of the same figures
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        let s = &self.summary;

        let _ = writeln!(md, "# UIDAI Aadhaar Data Cleaning Report\n");
        let _ = writeln!(md, "**Generated:** {}\n", self.timestamp.to_rfc3339());
        let _ = writeln!(md, "**Run:** `{}`\n", self.run_id);

        let _ = writeln!(md, "## Summary\n");
        for (kind, count) in &s.total_records_cleaned {
            let _ = writeln!(md, "- **Total {} Records:** {}", kind.name(), with_commas(*count));
        }
        let _ = writeln!(md, "- **Unique States:** {}", s.unique_locations.states);
        let _ = writeln!(md, "- **Unique Districts:** {}", with_commas(s.unique_locations.districts));
        let _ = writeln!(md, "- **Unique Pincodes:** {}", with_commas(s.unique_locations.pincodes));
        for (column, total) in &s.grand_totals {
            let _ = writeln!(md, "- **{}:** {}", column, with_commas(*total));
        }
        let _ = writeln!(md);

        let _ = writeln!(md, "## Cleaning Statistics by Dataset\n");
        for (kind, stats) in &self.datasets {
            let t = &stats.tally;
            let _ = writeln!(md, "### {} Data\n", kind.name());
            let _ = writeln!(md, "- Total rows processed: {}", with_commas(t.rows_in));
            let _ = writeln!(md, "- Rows passing validation: {}", with_commas(t.rows_out));
            let _ = writeln!(md, "- Rows after cleaning: {}", with_commas(stats.rows_cleaned));
            let _ = writeln!(md, "- Duplicates removed: {}", with_commas(stats.duplicates_removed));
            let _ = writeln!(md, "- Invalid dates: {}", with_commas(t.invalid_dates));
            let _ = writeln!(md, "- Invalid states: {}", with_commas(t.invalid_states));
            let _ = writeln!(md, "- Invalid pincodes: {}", with_commas(t.invalid_pincodes));
            let _ = writeln!(md, "- Negative values: {}", with_commas(t.negative_values));
            let _ = writeln!(md, "- Missing values: {}", with_commas(t.missing_values));
            if let Some(range) = s.date_range.get(kind) {
                if let (Some(start), Some(end)) = (range.start, range.end) {
                    let _ = writeln!(md, "- Date range: {} to {}", start, end);
                }
            }
            let _ = writeln!(md, "- Retained after deduplication: {:.2}%", stats.retained_ratio * 100.0);
            let _ = writeln!(md, "- **Data quality: {:.2}%**\n", stats.quality_percent());
        }

        if !self.failures.is_empty() {
            let _ = writeln!(md, "## Failed Datasets\n");
            for (kind, message) in &self.failures {
                let _ = writeln!(md, "- **{}:** {}", kind.name(), message);
            }
            let _ = writeln!(
                md,
                "\nAny earlier canonical table for these datasets is left in place next to a \
                 `.failed` marker and is refused by readers until a successful run replaces it.\n"
            );
        }

        if !self.artifacts.is_empty() {
            let _ = writeln!(md, "## Data Files Generated\n");
            for artifact in &self.artifacts {
                let _ = writeln!(
                    md,
                    "- `{}` ({} rows, sha256 `{}`)",
                    artifact.path,
                    with_commas(artifact.rows),
                    artifact.sha256
                );
            }
            let _ = writeln!(md);
        }

        let _ = writeln!(md, "## Cleaning Steps Applied\n");
        for step in [
            "1. ✓ Date validation and conversion",
            "2. ✓ State name standardization",
            "3. ✓ Pincode validation (6-digit format)",
            "4. ✓ District name standardization",
            "5. ✓ Negative value removal",
            "6. ✓ Missing value handling",
            "7. ✓ Duplicate record removal",
            "8. ✓ Derived columns added (year, month, day_of_week, totals)",
        ] {
            let _ = writeln!(md, "{}", step);
        }

        md
    }

    /// Write JSON and Markdown renderings into `dir`
    pub fn write(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).map_err(|source| PipelineError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

        let json_path = dir.join(JSON_REPORT_FILE);
        let md_path = dir.join(MARKDOWN_REPORT_FILE);

        fs::write(&json_path, self.to_json()?).map_err(|source| PipelineError::Write {
            path: json_path.clone(),
            source,
        })?;
        fs::write(&md_path, self.to_markdown()).map_err(|source| PipelineError::Write {
            path: md_path.clone(),
            source,
        })?;

        Ok((json_path, md_path))
    }
}

/// 1234567 → "1,234,567"
pub fn with_commas(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
