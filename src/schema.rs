// 📐 Dataset Schemas - fixed column layout per dataset kind
//
// All three kinds share date/state/district/pincode and differ only in their
// age-bracket count columns and in the name of the derived total. Every
// stage of the pipeline is driven by this table instead of per-kind code.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// SHARED COLUMNS
// ============================================================================

pub const DATE_COLUMN: &str = "date";
pub const STATE_COLUMN: &str = "state";
pub const DISTRICT_COLUMN: &str = "district";
pub const PINCODE_COLUMN: &str = "pincode";

pub const YEAR_COLUMN: &str = "year";
pub const MONTH_COLUMN: &str = "month";
pub const DAY_OF_WEEK_COLUMN: &str = "day_of_week";

/// Date format used by the source files
pub const SOURCE_DATE_FORMAT: &str = "%d-%m-%Y";

/// Date format written to canonical tables and reports
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

// ============================================================================
// DATASET KIND
// ============================================================================

/// DatasetKind - which registration-event stream a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    Enrolment,
    Demographic,
    Biometric,
}

impl DatasetKind {
    pub const ALL: [DatasetKind; 3] = [
        DatasetKind::Enrolment,
        DatasetKind::Demographic,
        DatasetKind::Biometric,
    ];

    /// Key used for the per-dataset sections of the report
    pub fn key(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "enrolment",
            DatasetKind::Demographic => "demographic",
            DatasetKind::Biometric => "biometric",
        }
    }

    /// Human-readable name for display
    pub fn name(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "Enrollment",
            DatasetKind::Demographic => "Demographic",
            DatasetKind::Biometric => "Biometric",
        }
    }

    /// Directory (under the data dir) holding this kind's source files
    pub fn source_dir(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "api_data_aadhar_enrolment",
            DatasetKind::Demographic => "api_data_aadhar_demographic",
            DatasetKind::Biometric => "api_data_aadhar_biometric",
        }
    }

    /// Canonical output file name
    pub fn output_file(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "enrolment_clean.csv",
            DatasetKind::Demographic => "demographic_clean.csv",
            DatasetKind::Biometric => "biometric_clean.csv",
        }
    }

    /// Kind-specific age-bracket count columns, in file order
    pub fn count_columns(&self) -> &'static [&'static str] {
        match self {
            DatasetKind::Enrolment => &["age_0_5", "age_5_17", "age_18_greater"],
            DatasetKind::Demographic => &["demo_age_5_17", "demo_age_17_"],
            DatasetKind::Biometric => &["bio_age_5_17", "bio_age_17_"],
        }
    }

    /// Name of the derived total column
    pub fn total_column(&self) -> &'static str {
        match self {
            DatasetKind::Enrolment => "total_enrollments",
            DatasetKind::Demographic => "total_demographic_updates",
            DatasetKind::Biometric => "total_biometric_updates",
        }
    }

    /// Columns every source file of this kind must carry
    pub fn input_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![DATE_COLUMN, STATE_COLUMN, DISTRICT_COLUMN, PINCODE_COLUMN];
        columns.extend_from_slice(self.count_columns());
        columns
    }

    /// Header of the canonical table: input columns + derived columns
    pub fn output_columns(&self) -> Vec<&'static str> {
        let mut columns = self.input_columns();
        columns.extend_from_slice(&[
            self.total_column(),
            YEAR_COLUMN,
            MONTH_COLUMN,
            DAY_OF_WEEK_COLUMN,
        ]);
        columns
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
