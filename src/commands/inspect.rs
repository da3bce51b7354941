use std::fs;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use crate::cli::InspectArgs;
use crate::commands::load_layout;
use crate::layout::{LayoutProfile, field};
use crate::loader::{DataRows, claimed_columns, find_column, open_table};
use crate::util::describe_source;

const ACCEPT_FIELD: &str = "accept";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCheck {
    pub field: String,
    pub keyword: String,
    pub optional: bool,
    pub index: Option<usize>,
}

impl ColumnCheck {
    fn is_missing(&self) -> bool {
        self.index.is_none() && !self.optional
    }
}

pub fn run(args: InspectArgs) -> Result<()> {
    let batch = &args.batch;
    if !batch.root.is_dir() {
        bail!("root directory does not exist: {}", batch.root.display());
    }
    let entries = fs::read_dir(&batch.root)
        .with_context(|| format!("failed to read {}", batch.root.display()))?
        .count();
    info!(root = %batch.root.display(), entries, "found root");

    let csv = batch.csv_path();
    if !csv.is_file() {
        bail!("table not found: {}", csv.display());
    }
    let source = describe_source(&csv)?;
    info!(
        path = %source.path,
        size_bytes = source.size_bytes,
        sha256 = %source.sha256,
        "found table"
    );

    let layout = load_layout(batch)?;
    let (headers, rows) = open_table(&csv, layout.banner_rows)?;
    for (index, header) in headers.iter().enumerate() {
        info!(index, header = %header, "column");
    }

    let checks = check_columns(&headers, &layout);
    for check in &checks {
        match check.index {
            Some(index) => info!(
                field = %check.field,
                keyword = %check.keyword,
                index,
                header = %headers[index],
                "mapped"
            ),
            None if check.optional => {
                info!(field = %check.field, keyword = %check.keyword, "optional column absent")
            }
            None => warn!(field = %check.field, keyword = %check.keyword, "required column missing"),
        }
    }

    let fields = preview_fields(&layout);
    for (row_number, values) in preview_rows(rows, &checks, &fields, args.preview_rows)? {
        let line = fields
            .iter()
            .zip(&values)
            .map(|(field, value)| format!("{field}={value}"))
            .collect::<Vec<_>>()
            .join(" | ");
        info!(row = row_number, "{line}");
    }

    let missing = checks.iter().filter(|check| check.is_missing()).count();
    if missing > 0 {
        bail!("{missing} required column(s) missing from {}", csv.display());
    }
    Ok(())
}

pub fn check_columns(headers: &[String], layout: &LayoutProfile) -> Vec<ColumnCheck> {
    let claimed = claimed_columns(&layout.fields);
    layout
        .fields
        .iter()
        .map(|mapping| ColumnCheck {
            field: mapping.field.clone(),
            keyword: mapping.column.clone(),
            optional: mapping.optional,
            index: find_column(headers, &mapping.column, &claimed),
        })
        .collect()
}

pub fn preview_fields(layout: &LayoutProfile) -> Vec<String> {
    let mut fields: Vec<String> = [field::UNIT_ID, field::DOCUMENT_STEM, ACCEPT_FIELD]
        .into_iter()
        .map(str::to_string)
        .collect();
    fields.extend(layout.photo_fields.iter().cloned());
    fields.retain(|name| layout.mapping(name).is_some());
    fields
}

pub fn preview_rows(
    rows: DataRows,
    checks: &[ColumnCheck],
    fields: &[String],
    limit: usize,
) -> Result<Vec<(usize, Vec<String>)>> {
    let mut preview = Vec::new();
    for (offset, row) in rows.take(limit).enumerate() {
        let row = row.context("failed to read data row")?;
        let values = fields
            .iter()
            .map(|name| {
                checks
                    .iter()
                    .find(|check| &check.field == name)
                    .and_then(|check| check.index)
                    .and_then(|index| row.get(index))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        preview.push((offset + 1, values));
    }
    Ok(preview)
}
