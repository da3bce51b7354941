use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::error::{QcError, ResolutionWarning};
use crate::layout::LayoutProfile;
use crate::model::{Record, RunCounts, UnitOutcome};
use crate::organizer::{check_record, check_unit_id, ensure_unit_folder};
use crate::render::{RenderContext, render};
use crate::resolver::{FileMover, FileResolver, Location, Resolution, relocate};
use crate::util::sha256_file;
use crate::writer::{place, write_document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    IntoUnitFolders,
    BackToRoot,
}

impl Direction {
    fn source(self) -> Location {
        match self {
            Self::IntoUnitFolders => Location::Root,
            Self::BackToRoot => Location::UnitFolder,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dry_run: bool,
    pub restore_photos: bool,
}

#[derive(Debug, Default)]
pub struct RunReport {
    pub counts: RunCounts,
    pub units: Vec<UnitOutcome>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn has_failures(&self) -> bool {
        self.counts.records_failed > 0 || self.counts.relocate_failures > 0
    }
}

#[derive(Debug, Default)]
struct PhotoMoves {
    moved: usize,
    failures: Vec<QcError>,
    missing: Vec<ResolutionWarning>,
}

pub struct Pipeline<'a> {
    layout: &'a LayoutProfile,
    records: &'a [Record],
    mover: &'a dyn FileMover,
    resolver: FileResolver,
    report: RunReport,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        root: &Path,
        layout: &'a LayoutProfile,
        records: &'a [Record],
        mover: &'a dyn FileMover,
    ) -> Self {
        Self {
            layout,
            records,
            mover,
            resolver: FileResolver::new(root),
            report: RunReport::default(),
        }
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    pub fn ensure_folders(&mut self) {
        for record in self.records {
            match ensure_unit_folder(self.resolver.root(), &record.unit_id) {
                Ok(_) => self.report.counts.folders_ensured += 1,
                Err(err) => {
                    error!(unit_id = %record.unit_id, error = %err, "failed to create unit folder");
                    self.report.counts.records_failed += 1;
                    self.report.warnings.push(format!("{}: {err}", record.unit_id));
                }
            }
        }
        info!(folders = self.report.counts.folders_ensured, "unit folders ready");
    }

    pub fn move_photos(&mut self, direction: Direction) {
        for record in self.records {
            if let Err(err) = check_unit_id(&record.unit_id) {
                self.record_rejected(record, &err);
                continue;
            }
            let moves = self.move_photos_for(record, direction);
            self.report.counts.missing_references += moves.missing.len();
            for warning in &moves.missing {
                warn!(unit_id = %warning.unit_id, file = %warning.name, "{warning}");
                self.report.warnings.push(warning.to_string());
            }
            self.absorb_moves(direction, moves, None);
        }
        info!(
            moved = self.report.counts.photos_moved,
            restored = self.report.counts.photos_restored,
            missing = self.report.counts.missing_references,
            failures = self.report.counts.relocate_failures,
            "photo pass complete"
        );
    }

    pub fn render_documents(&mut self) {
        for record in self.records {
            let mut outcome = outcome_for(record);
            if let Err(err) = check_record(record) {
                self.record_rejected(record, &err);
                outcome.status = "failed".to_string();
                outcome.warnings.push(err.to_string());
                self.report.units.push(outcome);
                continue;
            }
            if let Some(path) = self.render_one(record, &mut outcome, false) {
                outcome.document = Some(path.display().to_string());
                outcome.status = "written".to_string();
            }
            self.report.units.push(outcome);
        }
        info!(
            written = self.report.counts.documents_written,
            failed = self.report.counts.records_failed,
            "documents rendered"
        );
    }

    pub fn place_documents(&mut self) {
        for record in self.records {
            if let Err(err) = check_record(record) {
                self.record_rejected(record, &err);
                continue;
            }
            let name = record.document_name();
            if !self.resolver.root().join(&name).is_file() {
                debug!(unit_id = %record.unit_id, document = %name, "no document at root");
                continue;
            }
            match ensure_unit_folder(self.resolver.root(), &record.unit_id) {
                Ok(folder) => {
                    self.place_one(record, &folder, None);
                }
                Err(err) => {
                    error!(unit_id = %record.unit_id, error = %err, "failed to create unit folder");
                    self.report.counts.records_failed += 1;
                    self.report.warnings.push(format!("{}: {err}", record.unit_id));
                }
            }
        }
        info!(placed = self.report.counts.documents_placed, "documents placed");
    }

    pub fn run(&mut self, options: RunOptions) {
        for record in self.records {
            let outcome = self.process(record, options.dry_run);
            self.report.units.push(outcome);
        }

        if options.restore_photos && !options.dry_run {
            for record in self.records {
                if check_unit_id(&record.unit_id).is_ok() {
                    let moves = self.move_photos_for(record, Direction::BackToRoot);
                    self.absorb_moves(Direction::BackToRoot, moves, None);
                }
            }
            info!(restored = self.report.counts.photos_restored, "photos moved back to root");
        }

        let counts = &self.report.counts;
        info!(
            records = counts.records,
            written = counts.documents_written,
            placed = counts.documents_placed,
            failed = counts.records_failed,
            missing = counts.missing_references,
            dry_run = options.dry_run,
            "run complete"
        );
    }

    fn process(&mut self, record: &Record, dry_run: bool) -> UnitOutcome {
        self.report.counts.records += 1;
        let mut outcome = outcome_for(record);

        if let Err(err) = check_record(record) {
            self.record_rejected(record, &err);
            outcome.status = "failed".to_string();
            outcome.warnings.push(err.to_string());
            return outcome;
        }

        if !dry_run {
            match ensure_unit_folder(self.resolver.root(), &record.unit_id) {
                Ok(_) => self.report.counts.folders_ensured += 1,
                Err(err) => {
                    error!(unit_id = %record.unit_id, error = %err, "failed to create unit folder");
                    self.report.counts.records_failed += 1;
                    outcome.status = "failed".to_string();
                    outcome.warnings.push(format!("{err:#}"));
                    return outcome;
                }
            }

            let moves = self.move_photos_for(record, Direction::IntoUnitFolders);
            self.absorb_moves(Direction::IntoUnitFolders, moves, Some(&mut outcome));
        }

        let Some(path) = self.render_one(record, &mut outcome, dry_run) else {
            return outcome;
        };
        if dry_run {
            outcome.status = "rendered".to_string();
            return outcome;
        }

        outcome.status = "written".to_string();
        outcome.document = Some(path.display().to_string());
        let folder = self.resolver.unit_folder(&record.unit_id);
        if let Some(placed) = self.place_one(record, &folder, Some(&mut outcome)) {
            outcome.status = "placed".to_string();
            outcome.document_sha256 = sha256_file(&placed).ok();
            outcome.document = Some(placed.display().to_string());
        }

        outcome
    }

    fn render_one(
        &mut self,
        record: &Record,
        outcome: &mut UnitOutcome,
        dry_run: bool,
    ) -> Option<PathBuf> {
        let ctx = RenderContext::prepare(record, self.layout, &self.resolver);
        self.report.counts.missing_references += ctx.warnings().len();
        self.report.counts.image_errors += ctx.image_errors().len();
        outcome
            .warnings
            .extend(ctx.warnings().iter().map(ToString::to_string));
        outcome.warnings.extend(ctx.image_errors().iter().cloned());

        let document = match render(&ctx, self.layout) {
            Ok(document) => document,
            Err(err) => {
                error!(unit_id = %record.unit_id, row = record.row_number, error = %err, "render failed");
                self.report.counts.records_failed += 1;
                outcome.status = "failed".to_string();
                outcome.warnings.push(err.to_string());
                return None;
            }
        };

        let path = self.resolver.root().join(record.document_name());
        if dry_run {
            debug!(
                unit_id = %record.unit_id,
                blocks = document.blocks.len(),
                characters = document.plain_text().chars().count(),
                "rendered in memory"
            );
            return Some(path);
        }

        if let Err(err) = write_document(&document, &path) {
            error!(unit_id = %record.unit_id, error = %format!("{err:#}"), "write failed");
            self.report.counts.records_failed += 1;
            outcome.status = "failed".to_string();
            outcome.warnings.push(format!("{err:#}"));
            return None;
        }

        self.report.counts.documents_written += 1;
        info!(unit_id = %record.unit_id, path = %path.display(), "document saved");
        Some(path)
    }

    fn place_one(
        &mut self,
        record: &Record,
        folder: &Path,
        outcome: Option<&mut UnitOutcome>,
    ) -> Option<PathBuf> {
        let name = record.document_name();
        match place(self.mover, &name, self.resolver.root(), folder) {
            Ok(placed) => {
                self.report.counts.documents_placed += 1;
                Some(placed)
            }
            Err(err) => {
                warn!(unit_id = %record.unit_id, error = %err, "document not placed");
                self.report.counts.relocate_failures += 1;
                self.report.warnings.push(err.to_string());
                if let Some(outcome) = outcome {
                    outcome.warnings.push(err.to_string());
                }
                None
            }
        }
    }

    fn move_photos_for(&self, record: &Record, direction: Direction) -> PhotoMoves {
        let mut moves = PhotoMoves::default();
        let root = self.resolver.root();
        let folder = self.resolver.unit_folder(&record.unit_id);
        let (from, to) = match direction {
            Direction::IntoUnitFolders => (root, folder.as_path()),
            Direction::BackToRoot => (folder.as_path(), root),
        };

        for name in record.photo_references(&self.layout.photo_fields) {
            let resolution = self.resolver.resolve(&record.unit_id, name);
            if resolution == Resolution::Missing {
                moves.missing.push(ResolutionWarning {
                    unit_id: record.unit_id.clone(),
                    name: name.to_string(),
                });
                continue;
            }
            if resolution.location() != Some(direction.source()) {
                continue;
            }
            match relocate(self.mover, from, to, name) {
                Ok(_) => moves.moved += 1,
                Err(err) => moves.failures.push(err),
            }
        }

        moves
    }

    fn absorb_moves(
        &mut self,
        direction: Direction,
        moves: PhotoMoves,
        mut outcome: Option<&mut UnitOutcome>,
    ) {
        match direction {
            Direction::IntoUnitFolders => self.report.counts.photos_moved += moves.moved,
            Direction::BackToRoot => self.report.counts.photos_restored += moves.moved,
        }
        for err in moves.failures {
            warn!(error = %err, "photo not moved");
            self.report.counts.relocate_failures += 1;
            self.report.warnings.push(err.to_string());
            if let Some(outcome) = outcome.as_deref_mut() {
                outcome.warnings.push(err.to_string());
            }
        }
    }

    fn record_rejected(&mut self, record: &Record, err: &QcError) {
        error!(unit_id = %record.unit_id, row = record.row_number, error = %err, "skipping unit");
        self.report.counts.records_failed += 1;
        self.report.warnings.push(err.to_string());
    }
}

fn outcome_for(record: &Record) -> UnitOutcome {
    UnitOutcome {
        unit_id: record.unit_id.clone(),
        row_number: record.row_number,
        operator: record.operator.clone(),
        date: record.date.clone(),
        version: record.version.clone(),
        manufacturer: record.manufacturer.clone(),
        batch: record.batch.clone(),
        status: "pending".to_string(),
        document: None,
        document_sha256: None,
        warnings: Vec::new(),
    }
}
