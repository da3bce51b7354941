use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Cursor;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{QcError, QcResult};
use crate::layout::{FieldMapping, LayoutProfile, field};
use crate::model::Record;
use crate::util::is_blank;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone)]
struct ResolvedColumn {
    field: String,
    index: Option<usize>,
}

#[derive(Debug)]
pub struct LoadedTable {
    pub headers: Vec<String>,
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub records: Vec<Record>,
    pub warnings: Vec<String>,
}

pub type DataRows = csv::StringRecordsIntoIter<Cursor<Vec<u8>>>;

pub fn load_records(path: &Path, layout: &LayoutProfile) -> QcResult<LoadedTable> {
    let (headers, rows) = open_table(path, layout.banner_rows)?;

    let mut warnings = Vec::new();
    report_duplicate_headers(&headers, &mut warnings);

    let columns = resolve_columns(path, &headers, &layout.fields)?;

    let mut records = Vec::new();
    let mut rows_read = 0;
    let mut rows_dropped = 0;

    for (offset, row) in rows.enumerate() {
        let row = row.map_err(|err| QcError::load(path, err))?;
        let row_number = offset + 1;
        rows_read += 1;

        let fields = extract_fields(&row, &columns);
        if fields.get(field::OPERATOR).is_none_or(|value| is_blank(value)) {
            debug!(row = row_number, "dropping row without operator");
            rows_dropped += 1;
            continue;
        }

        let missing_key = [field::UNIT_ID, field::DOCUMENT_STEM]
            .into_iter()
            .find(|name| fields.get(*name).is_none_or(|value| is_blank(value)));
        if let Some(name) = missing_key {
            warn!(row = row_number, field = name, "dropping row with blank key field");
            warnings.push(format!("row {row_number} dropped: blank {name}"));
            rows_dropped += 1;
            continue;
        }

        records.push(Record::from_fields(row_number, fields)?);
    }

    report_duplicate_units(&records, &mut warnings);

    info!(
        path = %path.display(),
        columns = headers.len(),
        rows = rows_read,
        records = records.len(),
        dropped = rows_dropped,
        "loaded quality-control table"
    );

    Ok(LoadedTable {
        headers,
        rows_read,
        rows_dropped,
        records,
        warnings,
    })
}

pub fn open_table(path: &Path, banner_rows: usize) -> QcResult<(Vec<String>, DataRows)> {
    if !path.is_file() {
        return Err(QcError::load(path, "file does not exist"));
    }

    let mut raw = fs::read(path).map_err(|err| QcError::load(path, err))?;
    if raw.starts_with(UTF8_BOM) {
        raw.drain(..UTF8_BOM.len());
    }

    let mut rows = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(Cursor::new(raw))
        .into_records();

    for banner in 0..banner_rows {
        match rows.next() {
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(QcError::load(path, err)),
            None => {
                return Err(QcError::load(
                    path,
                    format!("ended inside banner rows (after {banner})"),
                ));
            }
        }
    }

    let header_row = match rows.next() {
        Some(Ok(row)) => row,
        Some(Err(err)) => return Err(QcError::load(path, err)),
        None => {
            return Err(QcError::load(
                path,
                format!("no header row after {banner_rows} banner rows"),
            ));
        }
    };

    let newline_runs = Regex::new(r"\s*[\r\n]+\s*").map_err(|err| QcError::load(path, err))?;
    let headers = header_row
        .iter()
        .map(|cell| normalize_header(cell, &newline_runs))
        .collect();

    Ok((headers, rows))
}

pub fn normalize_header(raw: &str, newline_runs: &Regex) -> String {
    newline_runs.replace_all(raw.trim(), " ").into_owned()
}

/// Exact header match wins. Otherwise the keyword must appear, ignoring
/// case, in exactly one header that no other keyword names exactly.
pub fn find_column(headers: &[String], keyword: &str, claimed: &[&str]) -> Option<usize> {
    let keyword = keyword.trim();
    if let Some(index) = headers.iter().position(|header| header == keyword) {
        return Some(index);
    }

    let needle = keyword.to_lowercase();
    let mut candidates = headers.iter().enumerate().filter(|(_, header)| {
        !claimed.contains(&header.as_str()) && header.to_lowercase().contains(&needle)
    });
    match (candidates.next(), candidates.next()) {
        (Some((index, _)), None) => Some(index),
        (Some((first, _)), Some((second, _))) => {
            debug!(keyword, first, second, "keyword matches several headers");
            None
        }
        _ => None,
    }
}

pub fn claimed_columns(mappings: &[FieldMapping]) -> Vec<&str> {
    mappings.iter().map(|mapping| mapping.column.trim()).collect()
}

fn resolve_columns(
    path: &Path,
    headers: &[String],
    mappings: &[FieldMapping],
) -> QcResult<Vec<ResolvedColumn>> {
    let mut columns = Vec::with_capacity(mappings.len());
    let claimed = claimed_columns(mappings);

    for mapping in mappings {
        let index = find_column(headers, &mapping.column, &claimed);
        match index {
            Some(index) if headers[index] != mapping.column.trim() => {
                debug!(
                    field = %mapping.field,
                    keyword = %mapping.column,
                    header = %headers[index],
                    "column matched by keyword"
                );
            }
            Some(_) => {}
            None if mapping.optional => {
                debug!(field = %mapping.field, keyword = %mapping.column, "optional column absent");
            }
            None => {
                return Err(QcError::missing_field(
                    format!("header of {}", path.display()),
                    mapping.column.clone(),
                ));
            }
        }

        columns.push(ResolvedColumn {
            field: mapping.field.clone(),
            index,
        });
    }

    Ok(columns)
}

fn extract_fields(row: &StringRecord, columns: &[ResolvedColumn]) -> BTreeMap<String, String> {
    columns
        .iter()
        .filter_map(|column| {
            let index = column.index?;
            let value = row.get(index).unwrap_or_default().to_string();
            Some((column.field.clone(), value))
        })
        .collect()
}

fn report_duplicate_headers(headers: &[String], warnings: &mut Vec<String>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for (index, header) in headers.iter().enumerate() {
        if header.is_empty() {
            continue;
        }
        if let Some(first) = seen.insert(header.as_str(), index) {
            warn!(header = %header, first, duplicate = index, "duplicate column header");
            warnings.push(format!("column `{header}` appears more than once"));
        }
    }
}

fn report_duplicate_units(records: &[Record], warnings: &mut Vec<String>) {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for record in records {
        if let Some(first_row) = seen.insert(record.unit_id.as_str(), record.row_number) {
            warn!(
                unit_id = %record.unit_id,
                first_row,
                row = record.row_number,
                "duplicate unit id"
            );
            warnings.push(format!(
                "unit {} appears on rows {first_row} and {}",
                record.unit_id, record.row_number
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn core_layout() -> LayoutProfile {
        let mut layout = LayoutProfile::default();
        layout.fields = [
            ("unit_id", "ID", false),
            ("operator", "User", false),
            ("date", "Date", false),
            ("version", "Version", false),
            ("manufacturer", "Manufacturer", false),
            ("batch", "Batch number", false),
            ("document_stem", "filename+ID", false),
            ("primary_image", "image link", false),
            ("assembled_unit_id", "p2_ID", true),
        ]
        .into_iter()
        .map(|(field, column, optional)| FieldMapping {
            field: field.to_string(),
            column: column.to_string(),
            optional,
        })
        .collect();
        layout
    }

    fn write_csv(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("qc.csv");
        fs::write(&path, body).expect("write csv");
        path
    }

    const BANNER: &str = "Quality control,,,,,,,\nexported,2024-05-02,,,,,,\n";
    const HEADER: &str =
        "ID,User,Date,Version,Manufacturer,\"Batch\nnumber\",filename+ID,image link\n";

    #[test]
    fn skips_banner_rows_and_collapses_multiline_headers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{BANNER}{HEADER}U-001,Alice,2024-05-01,v3,ACME,B7,QC_U-001,photo1.jpg\n"
        );
        let table = load_records(&write_csv(dir.path(), &body), &core_layout()).expect("load");

        assert!(table.headers.iter().any(|header| header == "Batch number"));
        assert_eq!(table.records.len(), 1);
        let record = &table.records[0];
        assert_eq!(record.unit_id, "U-001");
        assert_eq!(record.operator, "Alice");
        assert_eq!(record.batch, "B7");
        assert_eq!(record.reference("primary_image"), "photo1.jpg");
        assert_eq!(record.row_number, 1);
    }

    #[test]
    fn retained_records_always_have_operator_unit_and_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{BANNER}{HEADER}\
             U-001,Alice,d,v,m,b,QC_U-001,\n\
             U-002,,d,v,m,b,QC_U-002,\n\
             U-003,   ,d,v,m,b,QC_U-003,\n\
             ,Bob,d,v,m,b,QC_X,\n\
             U-005,Carol,d,v,m,b,,\n\
             U-006,Dave,d,v,m,b,QC_U-006,p.jpg\n"
        );
        let table = load_records(&write_csv(dir.path(), &body), &core_layout()).expect("load");

        assert_eq!(table.rows_read, 6);
        assert_eq!(table.rows_dropped, 4);
        let ids: Vec<&str> = table.records.iter().map(|r| r.unit_id.as_str()).collect();
        assert_eq!(ids, vec!["U-001", "U-006"]);
        for record in &table.records {
            assert!(!record.operator.trim().is_empty());
            assert!(!record.unit_id.trim().is_empty());
            assert!(!record.document_stem.trim().is_empty());
        }
        assert_eq!(table.warnings.len(), 2);
    }

    #[test]
    fn short_rows_fill_missing_cells_with_empty_strings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!("{BANNER}{HEADER}U-001,Alice,d,v,m,b,QC_U-001\n");
        let table = load_records(&write_csv(dir.path(), &body), &core_layout()).expect("load");

        assert_eq!(table.records[0].field("primary_image"), Some(""));
    }

    #[test]
    fn missing_required_column_fails_at_load_time() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!("{BANNER}ID,User,Date,Version,Manufacturer,Batch number,filename+ID\n");
        let err = load_records(&write_csv(dir.path(), &body), &core_layout())
            .expect_err("image link column is required");

        assert!(matches!(err, QcError::MissingField { ref field, .. } if field == "image link"));
    }

    #[test]
    fn optional_column_absent_leaves_field_unset() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!("{BANNER}{HEADER}U-001,Alice,d,v,m,b,QC_U-001,\n");
        let table = load_records(&write_csv(dir.path(), &body), &core_layout()).expect("load");

        assert_eq!(find_column(&table.headers, "p2_ID", &[]), None);
        assert_eq!(table.records[0].field("assembled_unit_id"), None);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_records(&dir.path().join("absent.csv"), &core_layout())
            .expect_err("missing file");
        assert!(matches!(err, QcError::Load { .. }));
    }

    #[test]
    fn file_shorter_than_banner_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_records(&write_csv(dir.path(), "only one line\n"), &core_layout())
            .expect_err("no header");
        assert!(matches!(err, QcError::Load { .. }));
    }

    #[test]
    fn invalid_utf8_is_a_load_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("qc.csv");
        let mut body = format!("{BANNER}{HEADER}").into_bytes();
        body.extend_from_slice(b"U-001,\xff\xfe,d,v,m,b,QC,\n");
        fs::write(&path, body).expect("write csv");

        let err = load_records(&path, &core_layout()).expect_err("bad encoding");
        assert!(matches!(err, QcError::Load { .. }));
    }

    #[test]
    fn byte_order_mark_does_not_leak_into_first_header() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut layout = core_layout();
        layout.banner_rows = 0;
        let body = format!("\u{feff}{HEADER}U-001,Alice,d,v,m,b,QC_U-001,\n");
        let table = load_records(&write_csv(dir.path(), &body), &layout).expect("load");

        assert_eq!(table.headers[0], "ID");
        assert_eq!(table.records[0].unit_id, "U-001");
    }

    #[test]
    fn find_column_prefers_exact_then_keyword() {
        let headers = vec![
            "filename+ID".to_string(),
            "ID".to_string(),
            "Glue problems?".to_string(),
        ];
        assert_eq!(find_column(&headers, "ID", &[]), Some(1));
        assert_eq!(find_column(&headers, "glue", &[]), Some(2));
        assert_eq!(find_column(&headers, "Thickness", &[]), None);
    }

    #[test]
    fn keyword_fallback_skips_headers_claimed_by_other_fields() {
        let headers = vec![
            "filename+ID".to_string(),
            "General comments".to_string(),
            "p2_Flatness".to_string(),
        ];
        let claimed = ["filename+ID", "General comments", "p2_Flatness"];
        assert_eq!(find_column(&headers, "ID", &claimed), None);
        assert_eq!(find_column(&headers, "Comments", &claimed), None);
        assert_eq!(find_column(&headers, "Flatness", &claimed), None);
    }

    #[test]
    fn keyword_fallback_refuses_ambiguous_matches() {
        let headers = vec!["Top flatness".to_string(), "Bottom flatness".to_string()];
        assert_eq!(find_column(&headers, "flatness", &[]), None);
    }

    #[test]
    fn renamed_comments_column_is_missing_not_borrowed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut layout = core_layout();
        for (field, column) in [("general_comments", "General comments"), ("comments", "Comments")] {
            layout.fields.push(FieldMapping {
                field: field.to_string(),
                column: column.to_string(),
                optional: false,
            });
        }
        let body = format!(
            "{BANNER}ID,User,Date,Version,Manufacturer,Batch number,filename+ID,image link,\
             General comments,Remarks\n\
             U-001,Alice,d,v,m,b,QC_U-001,,GENERAL,specific\n"
        );
        let err = load_records(&write_csv(dir.path(), &body), &layout)
            .expect_err("Comments column was renamed");

        assert!(matches!(err, QcError::MissingField { ref field, .. } if field == "Comments"));
    }

    #[test]
    fn duplicate_unit_ids_are_reported_but_kept() {
        let dir = tempfile::tempdir().expect("tempdir");
        let body = format!(
            "{BANNER}{HEADER}U-001,Alice,d,v,m,b,QC_A,\nU-001,Bob,d,v,m,b,QC_B,\n"
        );
        let table = load_records(&write_csv(dir.path(), &body), &core_layout()).expect("load");

        assert_eq!(table.records.len(), 2);
        assert!(table.warnings.iter().any(|w| w.contains("U-001")));
    }

    #[test]
    fn normalize_header_trims_and_joins_lines() {
        let newline_runs = Regex::new(r"\s*[\r\n]+\s*").expect("regex");
        assert_eq!(
            normalize_header("  Test coupons\r\n (observations)  ", &newline_runs),
            "Test coupons (observations)"
        );
    }
}
