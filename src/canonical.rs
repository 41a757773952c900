// 💾 Canonical Tables - CSV persistence of merged datasets
//
// Writes go to a sibling ".tmp" file that is renamed into place only after
// the last row is flushed, so readers never see a truncated table.

use crate::error::{PipelineError, Result};
use crate::merger::CanonicalRecord;
use crate::schema::{
    DatasetKind, CANONICAL_DATE_FORMAT, DATE_COLUMN, DAY_OF_WEEK_COLUMN, DISTRICT_COLUMN,
    MONTH_COLUMN, PINCODE_COLUMN, STATE_COLUMN, YEAR_COLUMN,
};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Written canonical file, as listed in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub kind: DatasetKind,
    pub path: String,
    pub rows: u64,
    pub sha256: String,
}

/// Forwards writes and hashes the bytes on the way through
struct DigestWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

// ============================================================================
// WRITE
// ============================================================================

pub fn write_canonical(path: &Path, kind: DatasetKind, table: &[CanonicalRecord]) -> Result<Artifact> {
    let tmp_path = tmp_path_for(path);
    let file = File::create(&tmp_path).map_err(|e| PipelineError::io(kind, &tmp_path, e))?;

    let mut writer = WriterBuilder::new().from_writer(DigestWriter {
        inner: file,
        hasher: Sha256::new(),
    });

    let written = write_rows(&mut writer, kind, table).and_then(|_| {
        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    });

    let digest_writer = match written {
        Ok(w) => w,
        Err(e) => {
            let _ = fs::remove_file(&tmp_path);
            return Err(PipelineError::csv(kind, path, e));
        }
    };

    let installed = digest_writer
        .inner
        .sync_all()
        .map_err(|e| PipelineError::io(kind, &tmp_path, e))
        .and_then(|_| fs::rename(&tmp_path, path).map_err(|e| PipelineError::io(kind, path, e)));

    if let Err(e) = installed {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // A fresh table supersedes any failure recorded against the old one
    clear_failure_marker(path, kind)?;

    Ok(Artifact {
        kind,
        path: path.display().to_string(),
        rows: table.len() as u64,
        sha256: format!("{:x}", digest_writer.hasher.finalize()),
    })
}

fn write_rows<W: Write>(
    writer: &mut csv::Writer<W>,
    kind: DatasetKind,
    table: &[CanonicalRecord],
) -> std::result::Result<(), csv::Error> {
    writer.write_record(kind.output_columns())?;

    for row in table {
        let mut fields: Vec<String> = Vec::with_capacity(kind.output_columns().len());
        fields.push(row.date.format(CANONICAL_DATE_FORMAT).to_string());
        fields.push(row.state.clone());
        fields.push(row.district.clone());
        fields.push(row.pincode.clone());
        fields.extend(row.counts.iter().map(u64::to_string));
        fields.push(row.total.to_string());
        fields.push(row.year.to_string());
        fields.push(row.month.to_string());
        fields.push(row.day_of_week.clone());
        writer.write_record(&fields)?;
    }

    writer.flush()?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".tmp")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

// ============================================================================
// FAILURE MARKERS
// ============================================================================

/// `<table>.failed`, present while the table on disk predates a failed run
pub fn failure_marker_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".failed")
}

/// Flag the table at `path` as stale; the marker holds the failure message
pub fn mark_failed(path: &Path, kind: DatasetKind, reason: &str) -> Result<PathBuf> {
    let marker = failure_marker_path(path);
    fs::write(&marker, reason).map_err(|e| PipelineError::io(kind, &marker, e))?;
    Ok(marker)
}

fn clear_failure_marker(path: &Path, kind: DatasetKind) -> Result<()> {
    let marker = failure_marker_path(path);
    match fs::remove_file(&marker) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(PipelineError::io(kind, &marker, e)),
    }
}

// ============================================================================
// READ
// ============================================================================

/// Load a canonical table written by `write_canonical`
///
/// Refuses a table flagged by `mark_failed`, so stale data is never served
/// next to fresh tables of other kinds.
pub fn read_canonical(path: &Path, kind: DatasetKind) -> Result<Vec<CanonicalRecord>> {
    let marker = failure_marker_path(path);
    if marker.exists() {
        let reason = fs::read_to_string(&marker).map_err(|e| PipelineError::io(kind, &marker, e))?;
        return Err(PipelineError::StaleCanonical {
            kind,
            path: path.to_path_buf(),
            reason: reason.trim().to_string(),
        });
    }

    let file = File::open(path).map_err(|e| PipelineError::io(kind, path, e))?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| PipelineError::csv(kind, path, e))?
        .clone();

    let index_of = |column: &str| -> Result<usize> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PipelineError::MissingColumn {
                kind,
                path: path.to_path_buf(),
                column: column.to_string(),
            })
    };

    let layout = Layout {
        date: index_of(DATE_COLUMN)?,
        state: index_of(STATE_COLUMN)?,
        district: index_of(DISTRICT_COLUMN)?,
        pincode: index_of(PINCODE_COLUMN)?,
        counts: kind
            .count_columns()
            .iter()
            .map(|c| index_of(c))
            .collect::<Result<Vec<usize>>>()?,
        total: index_of(kind.total_column())?,
        year: index_of(YEAR_COLUMN)?,
        month: index_of(MONTH_COLUMN)?,
        day_of_week: index_of(DAY_OF_WEEK_COLUMN)?,
    };

    let mut table = Vec::new();
    for (line_num, result) in reader.records().enumerate() {
        let record = result.map_err(|e| PipelineError::csv(kind, path, e))?;
        let row = layout
            .parse(&record)
            .map_err(|message| PipelineError::InvalidCanonical {
                kind,
                path: path.to_path_buf(),
                line: line_num + 2,
                message,
            })?;
        table.push(row);
    }

    Ok(table)
}

struct Layout {
    date: usize,
    state: usize,
    district: usize,
    pincode: usize,
    counts: Vec<usize>,
    total: usize,
    year: usize,
    month: usize,
    day_of_week: usize,
}

impl Layout {
    fn parse(&self, record: &StringRecord) -> std::result::Result<CanonicalRecord, String> {
        let field = |idx: usize| record.get(idx).ok_or_else(|| format!("missing field {}", idx));
        let number = |idx: usize| -> std::result::Result<u64, String> {
            let raw = field(idx)?;
            raw.parse::<u64>()
                .map_err(|_| format!("'{}' is not a non-negative integer", raw))
        };

        let raw_date = field(self.date)?;
        let date = NaiveDate::parse_from_str(raw_date, CANONICAL_DATE_FORMAT)
            .map_err(|_| format!("'{}' is not a YYYY-MM-DD date", raw_date))?;

        Ok(CanonicalRecord {
            date,
            state: field(self.state)?.to_string(),
            district: field(self.district)?.to_string(),
            pincode: field(self.pincode)?.to_string(),
            counts: self
                .counts
                .iter()
                .map(|&i| number(i))
                .collect::<std::result::Result<Vec<u64>, String>>()?,
            total: number(self.total)?,
            year: i32::try_from(number(self.year)?)
                .map_err(|_| format!("year '{}' is out of range", field(self.year).unwrap_or_default()))?,
            month: u32::try_from(number(self.month)?)
                .map_err(|_| format!("month '{}' is out of range", field(self.month).unwrap_or_default()))?,
            day_of_week: field(self.day_of_week)?.to_string(),
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::NormalizedRecord;

    fn sample_table() -> Vec<CanonicalRecord> {
        vec![
            CanonicalRecord::derive(NormalizedRecord {
                date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                state: "Delhi".to_string(),
                district: "South".to_string(),
                pincode: "110001".to_string(),
                counts: vec![5, 3, 2],
            }),
            CanonicalRecord::derive(NormalizedRecord {
                date: NaiveDate::from_ymd_opt(2025, 3, 4).unwrap(),
                state: "Tamil Nadu".to_string(),
                district: "Chennai, Central".to_string(),
                pincode: "600001".to_string(),
                counts: vec![0, 1, 9],
            }),
        ]
    }

    #[test]
    fn test_write_then_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrolment_clean.csv");
        let table = sample_table();

        let artifact = write_canonical(&path, DatasetKind::Enrolment, &table).unwrap();
        let loaded = read_canonical(&path, DatasetKind::Enrolment).unwrap();

        assert_eq!(loaded, table);
        assert_eq!(artifact.rows, 2);
        assert_eq!(artifact.sha256.len(), 64);
        assert!(!dir.path().join("enrolment_clean.csv.tmp").exists());
    }

    #[test]
    fn test_header_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrolment_clean.csv");

        write_canonical(&path, DatasetKind::Enrolment, &sample_table()).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next().unwrap(),
            "date,state,district,pincode,age_0_5,age_5_17,age_18_greater,total_enrollments,year,month,day_of_week"
        );
        assert_eq!(lines.next().unwrap(), "2025-03-01,Delhi,South,110001,5,3,2,10,2025,3,Saturday");
    }

    #[test]
    fn test_digest_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_canonical(&dir.path().join("a.csv"), DatasetKind::Enrolment, &sample_table()).unwrap();
        let b = write_canonical(&dir.path().join("b.csv"), DatasetKind::Enrolment, &sample_table()).unwrap();

        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn test_empty_table_has_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("biometric_clean.csv");

        write_canonical(&path, DatasetKind::Biometric, &[]).unwrap();

        assert!(read_canonical(&path, DatasetKind::Biometric).unwrap().is_empty());
    }

    #[test]
    fn test_read_rejects_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrolment_clean.csv");
        write_canonical(&path, DatasetKind::Enrolment, &sample_table()).unwrap();

        let err = read_canonical(&path, DatasetKind::Demographic).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { .. }));
    }

    #[test]
    fn test_read_rejects_bad_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demographic_clean.csv");
        fs::write(
            &path,
            "date,state,district,pincode,demo_age_5_17,demo_age_17_,total_demographic_updates,year,month,day_of_week\n\
             2025-03-01,Delhi,South,110001,-1,3,2,2025,3,Saturday\n",
        )
        .unwrap();

        let err = read_canonical(&path, DatasetKind::Demographic).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCanonical { line: 2, .. }));
    }

    #[test]
    fn test_read_rejects_out_of_range_year_and_month() {
        let dir = tempfile::tempdir().unwrap();
        let header = "date,state,district,pincode,demo_age_5_17,demo_age_17_,total_demographic_updates,year,month,day_of_week";

        let year_path = dir.path().join("year.csv");
        fs::write(&year_path, format!("{}\n2025-03-01,Delhi,South,110001,1,2,3,4294967296,3,Saturday\n", header)).unwrap();
        let err = read_canonical(&year_path, DatasetKind::Demographic).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCanonical { ref message, .. } if message.contains("year")));

        // 2^32 + 3 must not wrap around to March
        let month_path = dir.path().join("month.csv");
        fs::write(&month_path, format!("{}\n2025-03-01,Delhi,South,110001,1,2,3,2025,4294967299,Saturday\n", header)).unwrap();
        let err = read_canonical(&month_path, DatasetKind::Demographic).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidCanonical { ref message, .. } if message.contains("month")));
    }

    #[test]
    fn test_failed_install_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in the way makes the final rename fail
        let path = dir.path().join("enrolment_clean.csv");
        fs::create_dir(&path).unwrap();

        let err = write_canonical(&path, DatasetKind::Enrolment, &sample_table()).unwrap_err();

        assert!(matches!(err, PipelineError::Io { .. }));
        assert!(!dir.path().join("enrolment_clean.csv.tmp").exists());
    }

    #[test]
    fn test_marked_table_is_refused_until_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enrolment_clean.csv");
        write_canonical(&path, DatasetKind::Enrolment, &sample_table()).unwrap();

        let marker = mark_failed(&path, DatasetKind::Enrolment, "column 'age_0_5' missing").unwrap();
        assert_eq!(marker, dir.path().join("enrolment_clean.csv.failed"));

        let err = read_canonical(&path, DatasetKind::Enrolment).unwrap_err();
        assert!(matches!(err, PipelineError::StaleCanonical { ref reason, .. } if reason.contains("age_0_5")));

        write_canonical(&path, DatasetKind::Enrolment, &sample_table()).unwrap();
        assert!(!marker.exists());
        assert_eq!(read_canonical(&path, DatasetKind::Enrolment).unwrap().len(), 2);
    }
}
