use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{QcError, QcResult};
use crate::layout::field;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub row_number: usize,
    pub unit_id: String,
    pub operator: String,
    pub date: String,
    pub version: String,
    pub manufacturer: String,
    pub batch: String,
    pub document_stem: String,
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn from_fields(row_number: usize, fields: BTreeMap<String, String>) -> QcResult<Self> {
        let scope = format!("row {row_number}");
        let core = |name: &str| -> QcResult<String> {
            fields
                .get(name)
                .cloned()
                .ok_or_else(|| QcError::missing_field(scope.clone(), name))
        };

        Ok(Self {
            row_number,
            unit_id: core(field::UNIT_ID)?,
            operator: core(field::OPERATOR)?,
            date: core(field::DATE)?,
            version: core(field::VERSION)?,
            manufacturer: core(field::MANUFACTURER)?,
            batch: core(field::BATCH)?,
            document_stem: core(field::DOCUMENT_STEM)?,
            fields,
        })
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> QcResult<&str> {
        self.field(name)
            .ok_or_else(|| QcError::missing_field(format!("unit {}", self.unit_id), name))
    }

    pub fn require_or(&self, name: &str, fallback: Option<&str>) -> QcResult<&str> {
        match (self.field(name), fallback) {
            (Some(value), _) => Ok(value),
            (None, Some(fallback)) => self.require(fallback),
            (None, None) => self.require(name),
        }
    }

    pub fn reference(&self, name: &str) -> &str {
        self.field(name).unwrap_or_default()
    }

    pub fn document_name(&self) -> String {
        format!("{}.docx", self.document_stem)
    }

    pub fn photo_references<'a>(
        &'a self,
        photo_fields: &'a [String],
    ) -> impl Iterator<Item = &'a str> + 'a {
        photo_fields
            .iter()
            .map(|name| self.reference(name))
            .filter(|reference| !reference.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "" | "0" | "no" => Self::Fail,
            _ => Self::Pass,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub path: String,
    pub size_bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunCounts {
    pub rows_read: usize,
    pub rows_dropped: usize,
    pub records: usize,
    pub folders_ensured: usize,
    pub photos_moved: usize,
    pub photos_restored: usize,
    pub documents_written: usize,
    pub documents_placed: usize,
    pub records_failed: usize,
    pub missing_references: usize,
    pub relocate_failures: usize,
    pub image_errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub unit_id: String,
    pub row_number: usize,
    pub operator: String,
    pub date: String,
    pub version: String,
    pub manufacturer: String,
    pub batch: String,
    pub status: String,
    pub document: Option<String>,
    pub document_sha256: Option<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub layout: String,
    pub status: String,
    pub dry_run: bool,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub root: String,
    pub source: SourceEntry,
    pub counts: RunCounts,
    pub units: Vec<UnitOutcome>,
    pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn core_fields() -> BTreeMap<String, String> {
        fields(&[
            ("unit_id", "U-001"),
            ("operator", "Alice"),
            ("date", "2024-05-02"),
            ("version", "v3"),
            ("manufacturer", "ACME"),
            ("batch", "B7"),
            ("document_stem", "QC_U-001"),
            ("primary_image", "photo1.jpg"),
            ("assembled_image", " "),
        ])
    }

    #[test]
    fn verdict_parses_boolean_like_cells() {
        assert_eq!(Verdict::parse(""), Verdict::Fail);
        assert_eq!(Verdict::parse("  0 "), Verdict::Fail);
        assert_eq!(Verdict::parse("No"), Verdict::Fail);
        assert_eq!(Verdict::parse("yes"), Verdict::Pass);
        assert_eq!(Verdict::parse("1"), Verdict::Pass);
        assert_eq!(Verdict::parse("OK, minor scratch"), Verdict::Pass);
    }

    #[test]
    fn record_exposes_core_fields_and_document_name() {
        let record = Record::from_fields(1, core_fields()).expect("record");
        assert_eq!(record.unit_id, "U-001");
        assert_eq!(record.operator, "Alice");
        assert_eq!(record.document_name(), "QC_U-001.docx");
    }

    #[test]
    fn record_without_core_field_is_rejected() {
        let mut map = core_fields();
        map.remove("batch");
        let err = Record::from_fields(4, map).expect_err("missing batch");
        assert!(matches!(err, QcError::MissingField { ref field, .. } if field == "batch"));
    }

    #[test]
    fn require_or_uses_fallback_only_when_primary_absent() {
        let mut map = core_fields();
        map.insert("assembled_unit_id".to_string(), String::new());
        let record = Record::from_fields(1, map).expect("record");

        assert_eq!(record.require_or("assembled_unit_id", Some("unit_id")).unwrap(), "");
        assert_eq!(record.require_or("title_page2", Some("unit_id")).unwrap(), "U-001");
        assert!(record.require_or("title_page2", None).is_err());
    }

    #[test]
    fn photo_references_skip_blank_and_absent_fields() {
        let record = Record::from_fields(1, core_fields()).expect("record");
        let photo_fields = vec![
            "primary_image".to_string(),
            "assembled_image".to_string(),
            "chip_map_image".to_string(),
        ];
        let refs: Vec<&str> = record.photo_references(&photo_fields).collect();
        assert_eq!(refs, vec!["photo1.jpg"]);
    }
}
