// Aadhaar Clean - batch cleaning CLI
//
// Reads the three raw dataset directories, writes canonical tables and the
// cleaning report. Exits with status 1 when any dataset kind failed.

use aadhaar_clean::report::with_commas;
use aadhaar_clean::{init_logging, DatasetKind, Pipeline, PipelineConfig};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aadhaar-clean")]
#[command(about = "Clean enrolment, demographic and biometric update datasets")]
#[command(version)]
struct Cli {
    /// TOML file with pipeline settings
    #[arg(short, long, env = "AADHAAR_CLEAN_CONFIG")]
    config: Option<PathBuf>,

    /// Root holding the raw dataset directories
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Where canonical tables are written
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Where the cleaning report is written
    #[arg(long)]
    report_dir: Option<PathBuf>,

    /// Process files and kinds one at a time
    #[arg(long)]
    sequential: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(dir) = self.data_dir {
            config.data_dir = dir;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(dir) = self.report_dir {
            config.report_dir = dir;
        }
        if self.sequential {
            config.parallel = false;
        }

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.into_config()?;

    println!("🧹 Aadhaar Data Cleaning Pipeline");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let run = Pipeline::new(config).run().context("cleaning pipeline failed")?;
    let report = &run.report;

    for kind in DatasetKind::ALL {
        if let Some(stats) = report.datasets.get(&kind) {
            println!(
                "✓ {}: {} → {} rows ({:.2}% quality, {} duplicates removed)",
                kind.name(),
                with_commas(stats.tally.rows_in),
                with_commas(stats.rows_cleaned),
                stats.quality_percent(),
                with_commas(stats.duplicates_removed)
            );
        }
        if let Some(reason) = report.failures.get(&kind) {
            println!("❌ {}: {}", kind.name(), reason);
        }
    }

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!(
        "📊 Unique locations: {} states, {} districts, {} pincodes",
        report.summary.unique_locations.states,
        report.summary.unique_locations.districts,
        report.summary.unique_locations.pincodes
    );
    println!("📄 Report: {}", run.json_report.display());
    println!("📄 Report: {}", run.markdown_report.display());

    if run.has_failures() {
        eprintln!("\n❌ {} dataset(s) failed", report.failures.len());
        std::process::exit(1);
    }

    println!("\n✅ All datasets cleaned");
    Ok(())
}
