pub mod documents;
pub mod folders;
pub mod inspect;
pub mod photos;
pub mod run;

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::BatchArgs;
use crate::layout::LayoutProfile;
use crate::loader::{LoadedTable, load_records};
use crate::pipeline::RunReport;

#[derive(Debug)]
pub struct Batch {
    pub root: PathBuf,
    pub csv: PathBuf,
    pub layout: LayoutProfile,
    pub table: LoadedTable,
}

pub fn load_layout(args: &BatchArgs) -> Result<LayoutProfile> {
    let mut layout = LayoutProfile::load_or_default(args.layout.as_deref())?;
    if let Some(banner_rows) = args.banner_rows {
        layout.banner_rows = banner_rows;
    }
    Ok(layout)
}

pub fn open_batch(args: &BatchArgs) -> Result<Batch> {
    if !args.root.is_dir() {
        bail!("root directory does not exist: {}", args.root.display());
    }

    let layout = load_layout(args)?;
    let csv = args.csv_path();
    let table = load_records(&csv, &layout)
        .with_context(|| format!("failed to load quality-control table {}", csv.display()))?;

    info!(
        root = %args.root.display(),
        layout = %layout.name,
        columns = table.headers.len(),
        records = table.records.len(),
        "batch ready"
    );

    Ok(Batch {
        root: args.root.clone(),
        csv,
        layout,
        table,
    })
}

pub fn finish(step: &str, report: &RunReport) -> Result<()> {
    let counts = &report.counts;
    if counts.relocate_failures > 0 {
        warn!(step, failures = counts.relocate_failures, "some files were not moved");
    }
    if counts.records_failed > 0 {
        bail!("{step}: {} record(s) failed", counts.records_failed);
    }
    Ok(())
}
