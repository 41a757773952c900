// 🔗 Dataset Merger - concatenate, deduplicate, derive, sort
//
// Order matters: duplicates are detected on the normalized columns only,
// before total/year/month/day_of_week exist, so "same observation reported
// in two files" collapses to one canonical row.

use crate::normalizer::{checked_total, DefectTally, FileOutcome, NormalizedRecord};
use crate::schema::DatasetKind;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::info;

// ============================================================================
// CANONICAL RECORD
// ============================================================================

/// CanonicalRecord - normalized row plus derived columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub date: NaiveDate,
    pub state: String,
    pub district: String,
    pub pincode: String,
    pub counts: Vec<u64>,
    pub total: u64,
    pub year: i32,
    pub month: u32,
    pub day_of_week: String,
}

impl CanonicalRecord {
    /// Compute total, year, month and weekday name
    ///
    /// The normalizer drops rows whose total overflows u64; anything else
    /// saturates rather than panicking.
    pub fn derive(record: NormalizedRecord) -> Self {
        let total = checked_total(&record.counts).unwrap_or(u64::MAX);
        let date = record.date;

        CanonicalRecord {
            date,
            state: record.state,
            district: record.district,
            pincode: record.pincode,
            counts: record.counts,
            total,
            year: date.year(),
            month: date.month(),
            day_of_week: date.format("%A").to_string(),
        }
    }
}

impl NormalizedRecord {
    /// Content fingerprint over every column, used for exact-duplicate removal
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.date.to_string());
        for field in [&self.state, &self.district, &self.pincode] {
            hasher.update([0x1f]);
            hasher.update(field.as_bytes());
        }
        for count in &self.counts {
            hasher.update([0x1f]);
            hasher.update(count.to_le_bytes());
        }
        hasher.finalize().into()
    }
}

// ============================================================================
// MERGE OUTCOME
// ============================================================================

/// Per-file tally kept for the report's file breakdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTally {
    pub file: String,
    #[serde(flatten)]
    pub tally: DefectTally,
}

/// MergeOutcome - canonical table plus bookkeeping for one dataset kind
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub kind: DatasetKind,
    pub table: Vec<CanonicalRecord>,
    /// Tallies of every file folded together
    pub tally: DefectTally,
    pub duplicates_removed: u64,
    pub files: Vec<FileTally>,
}

impl MergeOutcome {
    pub fn rows_cleaned(&self) -> u64 {
        self.table.len() as u64
    }
}

// ============================================================================
// DATASET MERGER
// ============================================================================

pub struct DatasetMerger;

impl DatasetMerger {
    /// Reduce all per-file results for one kind into its canonical table
    pub fn merge(kind: DatasetKind, outcomes: Vec<FileOutcome>) -> MergeOutcome {
        let mut tally = DefectTally::default();
        let mut files = Vec::with_capacity(outcomes.len());
        let mut combined = Vec::new();

        // (a) concatenate
        for outcome in outcomes {
            tally.absorb(&outcome.tally);
            files.push(FileTally {
                file: outcome.file_name,
                tally: outcome.tally,
            });
            combined.extend(outcome.records);
        }

        // (b) exact duplicates
        let (unique, duplicates_removed) = Self::deduplicate(combined);

        // (c) derived columns, (d) stable sort by date
        let mut table: Vec<CanonicalRecord> =
            unique.into_iter().map(CanonicalRecord::derive).collect();
        table.sort_by_key(|r| r.date);

        info!(
            kind = %kind,
            files = files.len(),
            rows = table.len(),
            duplicates_removed,
            "merged dataset"
        );

        MergeOutcome {
            kind,
            table,
            tally,
            duplicates_removed,
            files,
        }
    }

    /// Keep the first occurrence of every distinct row
    pub fn deduplicate(records: Vec<NormalizedRecord>) -> (Vec<NormalizedRecord>, u64) {
        let before = records.len();
        let mut seen = HashSet::with_capacity(before);

        let unique: Vec<NormalizedRecord> = records
            .into_iter()
            .filter(|r| seen.insert(r.fingerprint()))
            .collect();

        let removed = (before - unique.len()) as u64;
        (unique, removed)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: (i32, u32, u32), state: &str, district: &str, counts: &[u64]) -> NormalizedRecord {
        NormalizedRecord {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            state: state.to_string(),
            district: district.to_string(),
            pincode: "110001".to_string(),
            counts: counts.to_vec(),
        }
    }

    fn file(name: &str, records: Vec<NormalizedRecord>) -> FileOutcome {
        let n = records.len() as u64;
        FileOutcome {
            file_name: name.to_string(),
            records,
            tally: DefectTally {
                rows_in: n,
                rows_out: n,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_duplicate_across_files_collapses() {
        let row = record((2025, 3, 1), "Delhi", "South", &[5, 3, 2]);

        let outcome = DatasetMerger::merge(
            DatasetKind::Enrolment,
            vec![file("a.csv", vec![row.clone()]), file("b.csv", vec![row])],
        );

        assert_eq!(outcome.table.len(), 1);
        assert_eq!(outcome.duplicates_removed, 1);
        assert_eq!(outcome.table[0].total, 10);
        assert_eq!(outcome.tally.rows_in, 2);
        assert_eq!(
            outcome.files,
            vec![
                FileTally {
                    file: "a.csv".to_string(),
                    tally: DefectTally { rows_in: 1, rows_out: 1, ..Default::default() },
                },
                FileTally {
                    file: "b.csv".to_string(),
                    tally: DefectTally { rows_in: 1, rows_out: 1, ..Default::default() },
                },
            ]
        );
    }

    #[test]
    fn test_derive_does_not_panic_on_overflowing_total() {
        let row = CanonicalRecord::derive(record((2025, 3, 1), "Delhi", "South", &[u64::MAX, 1, 0]));
        assert_eq!(row.total, u64::MAX);
    }

    #[test]
    fn test_rows_differing_in_one_count_are_kept() {
        let (unique, removed) = DatasetMerger::deduplicate(vec![
            record((2025, 3, 1), "Delhi", "South", &[5, 3, 2]),
            record((2025, 3, 1), "Delhi", "South", &[5, 3, 1]),
            record((2025, 3, 1), "Delhi", "South", &[53, 2]),
        ]);

        assert_eq!(unique.len(), 3);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_deduplicate_is_idempotent() {
        let rows = vec![
            record((2025, 3, 2), "Delhi", "South", &[1, 1, 1]),
            record((2025, 3, 1), "Kerala", "Ernakulam", &[2, 0, 0]),
            record((2025, 3, 2), "Delhi", "South", &[1, 1, 1]),
        ];

        let (once, _) = DatasetMerger::deduplicate(rows);
        let (twice, removed) = DatasetMerger::deduplicate(once.clone());

        assert_eq!(once, twice);
        assert_eq!(removed, 0);
    }

    #[test]
    fn test_sorted_by_date_with_derived_columns() {
        let outcome = DatasetMerger::merge(
            DatasetKind::Demographic,
            vec![
                file("b.csv", vec![record((2025, 3, 9), "Goa", "North Goa", &[4, 6])]),
                file(
                    "a.csv",
                    vec![
                        record((2025, 3, 3), "Delhi", "South", &[1, 2]),
                        record((2025, 3, 1), "Assam", "Kamrup", &[0, 7]),
                    ],
                ),
            ],
        );

        let dates: Vec<NaiveDate> = outcome.table.iter().map(|r| r.date).collect();
        assert!(dates.windows(2).all(|w| w[0] <= w[1]));

        for row in &outcome.table {
            assert_eq!(row.total, row.counts.iter().sum::<u64>());
        }

        let first = &outcome.table[0];
        assert_eq!(first.state, "Assam");
        assert_eq!(first.year, 2025);
        assert_eq!(first.month, 3);
        assert_eq!(first.day_of_week, "Saturday");
    }

    #[test]
    fn test_empty_input_yields_empty_table() {
        let outcome = DatasetMerger::merge(DatasetKind::Biometric, vec![file("empty.csv", vec![])]);

        assert!(outcome.table.is_empty());
        assert_eq!(outcome.duplicates_removed, 0);
        assert_eq!(outcome.rows_cleaned(), 0);
    }
}
