// 🧹 Record Normalizer - staged per-file cleaning
//
// One algorithm for every dataset kind, parameterized by the kind's count
// columns. A row is removed at the first stage it fails and is never seen by
// later stages, so the per-stage tallies partition the rejected rows:
//
//   1. date       DD-MM-YYYY parse            → invalid_dates
//   2. state      trim + reference set        → invalid_states
//   3. pincode    trim + exactly 6 digits     → invalid_pincodes
//   4. district   trim + title case           (no rejection)
//   5. counts     any negative, column order  → negative_values
//   6. anything   still missing               → missing_values
//
// Row-level defects are counted, never raised. Only structural problems
// (unreadable file, missing column, broken CSV framing) produce an error.

use crate::error::{PipelineError, Result};
use crate::geography::GeographyValidator;
use crate::schema::{
    DatasetKind, DATE_COLUMN, DISTRICT_COLUMN, PINCODE_COLUMN, SOURCE_DATE_FORMAT, STATE_COLUMN,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, Trim};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::debug;

static PINCODE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{6}$").expect("pincode pattern is valid"));

// ============================================================================
// RECORD TYPES
// ============================================================================

/// RawRecord - one source row exactly as read, before any stage runs
///
/// `None` means the cell was absent or empty in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub line_number: usize,
    pub date: Option<String>,
    pub state: Option<String>,
    pub district: Option<String>,
    pub pincode: Option<String>,
    /// One entry per kind count column, in schema order. Signed and wider
    /// than u64 so negatives stay detectable and no count is clamped.
    pub counts: Vec<Option<i128>>,
}

/// NormalizedRecord - a row that survived all six stages
///
/// Equality covers every column, which is what the merger deduplicates on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub counts: Vec<u64>,
}

// ============================================================================
// DEFECT TALLY
// ============================================================================

/// Why a row was dropped; variant order is stage order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Defect {
    InvalidDate,
    InvalidState,
    InvalidPincode,
    NegativeValue { column: &'static str },
    MissingValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefectTally {
    pub rows_in: u64,
    pub rows_out: u64,
    pub invalid_dates: u64,
    pub invalid_states: u64,
    pub invalid_pincodes: u64,
    pub negative_values: u64,
    pub missing_values: u64,
}

impl DefectTally {
    pub fn record(&mut self, defect: &Defect) {
        match defect {
            Defect::InvalidDate => self.invalid_dates += 1,
            Defect::InvalidState => self.invalid_states += 1,
            Defect::InvalidPincode => self.invalid_pincodes += 1,
            Defect::NegativeValue { .. } => self.negative_values += 1,
            Defect::MissingValue => self.missing_values += 1,
        }
    }

    /// Rows removed across all stages
    pub fn rejected(&self) -> u64 {
        self.invalid_dates
            + self.invalid_states
            + self.invalid_pincodes
            + self.negative_values
            + self.missing_values
    }

    /// Fold another file's tally into this one
    pub fn absorb(&mut self, other: &DefectTally) {
        self.rows_in += other.rows_in;
        self.rows_out += other.rows_out;
        self.invalid_dates += other.invalid_dates;
        self.invalid_states += other.invalid_states;
        self.invalid_pincodes += other.invalid_pincodes;
        self.negative_values += other.negative_values;
        self.missing_values += other.missing_values;
    }
}

/// FileOutcome - filtered table and tally for one source file
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub file_name: String,
    pub records: Vec<NormalizedRecord>,
    pub tally: DefectTally,
}

// ============================================================================
// NORMALIZER
// ============================================================================

pub struct Normalizer {
    kind: DatasetKind,
    geography: &'static GeographyValidator,
}

impl Normalizer {
    pub fn new(kind: DatasetKind) -> Self {
        Normalizer {
            kind,
            geography: GeographyValidator::shared(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    /// Read and clean one source file
    pub fn normalize_file(&self, path: &Path) -> Result<FileOutcome> {
        let rows = read_raw_file(path, self.kind)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown.csv")
            .to_string();

        Ok(self.normalize_rows(file_name, rows))
    }

    /// Run the six stages over already-read rows
    pub fn normalize_rows(&self, file_name: String, rows: Vec<RawRecord>) -> FileOutcome {
        let mut tally = DefectTally {
            rows_in: rows.len() as u64,
            ..Default::default()
        };
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            match self.normalize_row(row) {
                Ok(record) => records.push(record),
                Err(defect) => tally.record(&defect),
            }
        }
        tally.rows_out = records.len() as u64;

        debug!(
            kind = %self.kind,
            file = %file_name,
            rows_in = tally.rows_in,
            rows_out = tally.rows_out,
            removed = tally.rejected(),
            "normalized file"
        );

        FileOutcome {
            file_name,
            records,
            tally,
        }
    }

    /// Apply the stages to a single row; the error is the first failed stage
    pub fn normalize_row(&self, row: RawRecord) -> std::result::Result<NormalizedRecord, Defect> {
        // 1. Date
        let date = row
            .date
            .as_deref()
            .and_then(parse_source_date)
            .ok_or(Defect::InvalidDate)?;

        // 2. State
        let state = row.state.as_deref().map(str::trim).unwrap_or("");
        if !self.geography.is_valid(state) {
            return Err(Defect::InvalidState);
        }
        let state = state.to_string();

        // 3. Pincode
        let pincode = row.pincode.as_deref().map(str::trim).unwrap_or("");
        if !is_valid_pincode(pincode) {
            return Err(Defect::InvalidPincode);
        }
        let pincode = pincode.to_string();

        // 4. District
        let district = row
            .district
            .as_deref()
            .map(|d| title_case(d.trim()))
            .filter(|d| !d.is_empty());

        // 5. Negative counts
        for (column, value) in self.kind.count_columns().iter().zip(&row.counts) {
            if matches!(value, Some(v) if *v < 0) {
                return Err(Defect::NegativeValue { column: *column });
            }
        }

        // 6. Missing values; a count or row total beyond u64 is unusable too
        let district = district.ok_or(Defect::MissingValue)?;
        if row.counts.len() != self.kind.count_columns().len() {
            return Err(Defect::MissingValue);
        }
        let counts = row
            .counts
            .iter()
            .map(|v| v.and_then(|v| u64::try_from(v).ok()))
            .collect::<Option<Vec<u64>>>()
            .ok_or(Defect::MissingValue)?;
        checked_total(&counts).ok_or(Defect::MissingValue)?;

        Ok(NormalizedRecord {
            date,
            state,
            district,
            pincode,
            counts,
        })
    }
}

// ============================================================================
// FIELD RULES
// ============================================================================

pub fn parse_source_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), SOURCE_DATE_FORMAT).ok()
}

pub fn is_valid_pincode(pincode: &str) -> bool {
    PINCODE_PATTERN.is_match(pincode)
}

/// Title case the way district names are published: first letter of every
/// alphabetic run upper, the rest lower ("NORTH-EAST delhi" → "North-East Delhi")
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_word = false;

    for c in text.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }

    out
}

/// Parse a count cell; unparseable or fractional values count as missing
pub fn parse_count(raw: &str) -> Option<i128> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(value) = raw.parse::<i128>() {
        return Some(value);
    }

    // Exports sometimes carry "12.0" or "1e6" for integer columns. Anything
    // past 2^100 is out of u64 range either way; the bound keeps `as` exact.
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 && value.abs() < 2f64.powi(100) => {
            Some(value as i128)
        }
        _ => None,
    }
}

/// Sum of a row's counts, `None` if it does not fit in u64
pub fn checked_total(counts: &[u64]) -> Option<u64> {
    counts.iter().try_fold(0u64, |acc, &c| acc.checked_add(c))
}

// ============================================================================
// RAW FILE READING
// ============================================================================

/// Read a source CSV for `kind`; fails if any expected column is absent
pub fn read_raw_file(path: &Path, kind: DatasetKind) -> Result<Vec<RawRecord>> {
    let file = File::open(path).map_err(|e| PipelineError::io(kind, path, e))?;

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::Headers)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::csv(kind, path, e))?
        .clone();

    let column_index = |column: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                kind,
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };

    let date_idx = column_index(DATE_COLUMN)?;
    let state_idx = column_index(STATE_COLUMN)?;
    let district_idx = column_index(DISTRICT_COLUMN)?;
    let pincode_idx = column_index(PINCODE_COLUMN)?;
    let count_idx = kind
        .count_columns()
        .iter()
        .map(|c| column_index(c))
        .collect::<Result<Vec<usize>>>()?;

    let mut rows = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result.map_err(|e| PipelineError::csv(kind, path, e))?;

        rows.push(RawRecord {
            line_number: line_num + 2, // 1-indexed + header row
            date: cell(&record, date_idx),
            state: cell(&record, state_idx),
            district: cell(&record, district_idx),
            pincode: cell(&record, pincode_idx),
            counts: count_idx
                .iter()
                .map(|&i| record.get(i).and_then(parse_count))
                .collect(),
        });
    }

    Ok(rows)
}

fn cell(record: &StringRecord, idx: usize) -> Option<String> {
    record
        .get(idx)
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

// ============================================================================
// TESTS
// ============================================================================
