// 🚰 Cleaning Pipeline - normalize → merge → persist, per kind, then report
//
// Per kind: {normalize file}* → merge → write canonical table. Kinds share
// nothing, so they run side by side; the report is built once all three have
// finished. A structural failure aborts only its own kind.

use crate::canonical::{mark_failed, write_canonical, Artifact};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::merger::{DatasetMerger, MergeOutcome};
use crate::normalizer::{FileOutcome, Normalizer};
use crate::report::{CleaningReport, ReportBuilder};
use crate::schema::DatasetKind;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Result of a full run: the report and where it was written
#[derive(Debug)]
pub struct PipelineRun {
    pub report: CleaningReport,
    pub json_report: PathBuf,
    pub markdown_report: PathBuf,
}

impl PipelineRun {
    pub fn has_failures(&self) -> bool {
        self.report.has_failures()
    }
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Pipeline { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every kind, then build and persist the report
    ///
    /// Errors only when the output or report location itself is unusable;
    /// per-kind failures land in the report's `failures` section.
    pub fn run(&self) -> Result<PipelineRun> {
        fs::create_dir_all(&self.config.output_dir).map_err(|source| PipelineError::Write {
            path: self.config.output_dir.clone(),
            source,
        })?;

        info!(
            data_dir = %self.config.data_dir.display(),
            output_dir = %self.config.output_dir.display(),
            parallel = self.config.parallel,
            "starting cleaning pipeline"
        );

        let results: Vec<(DatasetKind, Result<(MergeOutcome, Artifact)>)> = if self.config.parallel {
            DatasetKind::ALL
                .par_iter()
                .map(|&kind| (kind, self.process_kind(kind)))
                .collect()
        } else {
            DatasetKind::ALL
                .iter()
                .map(|&kind| (kind, self.process_kind(kind)))
                .collect()
        };

        // Fan-in: only this thread touches the builder
        let mut builder = ReportBuilder::new();
        for (kind, result) in results {
            match result {
                Ok((outcome, artifact)) => {
                    builder.add_outcome(&outcome).add_artifact(artifact);
                }
                Err(e) => {
                    error!(kind = %kind, error = %e, "dataset aborted");
                    let output = self.config.output_path(kind);
                    if let Err(mark_err) = mark_failed(&output, kind, &e.to_string()) {
                        error!(kind = %kind, error = %mark_err, "could not flag stale canonical table");
                    }
                    builder.add_failure(kind, &e);
                }
            }
        }

        let report = builder.build();
        let (json_report, markdown_report) = report.write(&self.config.report_dir)?;

        info!(
            run_id = %report.run_id,
            failures = report.failures.len(),
            report = %json_report.display(),
            "cleaning pipeline finished"
        );

        Ok(PipelineRun {
            report,
            json_report,
            markdown_report,
        })
    }

    /// Clean one kind and write its canonical table
    ///
    /// Work for several kinds interleaves on the rayon pool, so every event
    /// carries `kind` as a field instead of relying on an entered span.
    pub fn process_kind(&self, kind: DatasetKind) -> Result<(MergeOutcome, Artifact)> {
        let outcome = self.clean_kind(kind)?;
        let path = self.config.output_path(kind);
        let artifact = write_canonical(&path, kind, &outcome.table)?;

        info!(
            kind = %kind,
            rows = artifact.rows,
            path = %path.display(),
            "wrote canonical table"
        );

        Ok((outcome, artifact))
    }

    /// Normalize every source file of `kind` and merge the results
    pub fn clean_kind(&self, kind: DatasetKind) -> Result<MergeOutcome> {
        let files = discover_files(&self.config.source_dir(kind), kind)?;
        info!(kind = %kind, files = files.len(), "cleaning dataset");

        let normalizer = Normalizer::new(kind);
        let outcomes: Vec<FileOutcome> = if self.config.parallel {
            files
                .par_iter()
                .map(|path| normalizer.normalize_file(path))
                .collect::<Result<Vec<_>>>()?
        } else {
            files
                .iter()
                .map(|path| normalizer.normalize_file(path))
                .collect::<Result<Vec<_>>>()?
        };

        for outcome in &outcomes {
            info!(
                kind = %kind,
                file = %outcome.file_name,
                original = outcome.tally.rows_in,
                cleaned = outcome.tally.rows_out,
                removed = outcome.tally.rows_in - outcome.tally.rows_out,
                "processed file"
            );
        }

        Ok(DatasetMerger::merge(kind, outcomes))
    }
}

/// `*.csv` files directly under `dir`, sorted by name
pub fn discover_files(dir: &Path, kind: DatasetKind) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir).map_err(|e| PipelineError::io(kind, dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| PipelineError::io(kind, dir, e))?.path();
        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("csv"));

        if is_csv && path.is_file() {
            files.push(path);
        }
    }

    if files.is_empty() {
        return Err(PipelineError::EmptyDirectory {
            kind,
            path: dir.to_path_buf(),
        });
    }

    files.sort();
    Ok(files)
}
