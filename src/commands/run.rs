use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::cli::RunArgs;
use crate::commands::{Batch, finish, open_batch};
use crate::model::{RunManifest, SourceEntry};
use crate::pipeline::{Pipeline, RunOptions, RunReport};
use crate::resolver::LocalMover;
use crate::util::{describe_source, now_utc_string, utc_compact_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: RunArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let batch = open_batch(&args.batch)?;
    let source = describe_source(&batch.csv)?;
    info!(run_id = %run_id, sha256 = %source.sha256, dry_run = args.dry_run, "run started");

    let mut pipeline = Pipeline::new(&batch.root, &batch.layout, &batch.table.records, &LocalMover);
    pipeline.run(RunOptions {
        dry_run: args.dry_run,
        restore_photos: args.restore_photos,
    });
    let report = pipeline.into_report();

    let manifest = build_manifest(&batch, &report, source, run_id, started_at, args.dry_run);

    if args.dry_run {
        info!(
            records = manifest.counts.records,
            failed = manifest.counts.records_failed,
            missing = manifest.counts.missing_references,
            "run dry-run complete"
        );
    } else {
        let manifest_path = args.manifest_path.unwrap_or_else(|| {
            default_manifest_path(&batch, &manifest.run_id)
        });
        write_json_pretty(&manifest_path, &manifest)?;
        info!(path = %manifest_path.display(), status = %manifest.status, "wrote run manifest");
    }

    finish("run", &report)
}

fn default_manifest_path(batch: &Batch, run_id: &str) -> PathBuf {
    let stamp = run_id.trim_start_matches("run-");
    batch.root.join(".qcdoc").join(format!("run_{stamp}.json"))
}

fn build_manifest(
    batch: &Batch,
    report: &RunReport,
    source: SourceEntry,
    run_id: String,
    started_at: String,
    dry_run: bool,
) -> RunManifest {
    let mut counts = report.counts.clone();
    counts.rows_read = batch.table.rows_read;
    counts.rows_dropped = batch.table.rows_dropped;

    let status = if report.has_failures() {
        "completed_with_errors"
    } else {
        "completed"
    };

    let mut warnings = batch.table.warnings.clone();
    warnings.extend(report.warnings.iter().cloned());

    RunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        layout: batch.layout.name.clone(),
        status: status.to_string(),
        dry_run,
        started_at,
        updated_at: now_utc_string(),
        command: std::env::args().collect::<Vec<_>>().join(" "),
        root: batch.root.display().to_string(),
        source,
        counts,
        units: report.units.clone(),
        warnings,
    }
}
