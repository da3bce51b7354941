use std::collections::HashSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LAYOUT_NAME: &str = "bare-and-assembled-v1";

pub mod field {
    pub const UNIT_ID: &str = "unit_id";
    pub const OPERATOR: &str = "operator";
    pub const DATE: &str = "date";
    pub const VERSION: &str = "version";
    pub const MANUFACTURER: &str = "manufacturer";
    pub const BATCH: &str = "batch";
    pub const DOCUMENT_STEM: &str = "document_stem";

    pub const CORE: [&str; 7] = [
        UNIT_ID,
        OPERATOR,
        DATE,
        VERSION,
        MANUFACTURER,
        BATCH,
        DOCUMENT_STEM,
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayoutProfile {
    pub name: String,
    #[serde(default = "default_banner_rows")]
    pub banner_rows: usize,
    pub fields: Vec<FieldMapping>,
    pub photo_fields: Vec<String>,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default)]
    pub image: ImageSizing,
    #[serde(default)]
    pub mark_missing_images: bool,
    #[serde(default)]
    pub markers: ImageMarkers,
    pub bare_board: SectionLayout,
    pub assembled_board: SectionLayout,
    pub component_table: ComponentTableLayout,
    pub functional_tests: FunctionalLayout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldMapping {
    pub field: String,
    pub column: String,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Palette {
    pub text: String,
    pub accent: String,
    pub error: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: "000000".to_string(),
            accent: "0000FF".to_string(),
            error: "FF0000".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageMarkers {
    pub no_image: String,
    pub not_found: String,
    pub unreadable: String,
}

impl Default for ImageMarkers {
    fn default() -> Self {
        Self {
            no_image: "no image".to_string(),
            not_found: "not found".to_string(),
            unreadable: "image error".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "fit", rename_all = "snake_case")]
pub enum ImageSizing {
    Width { inches: f64 },
    Height { inches: f64 },
}

impl Default for ImageSizing {
    fn default() -> Self {
        Self::Width { inches: 3.5 }
    }
}

impl ImageSizing {
    pub fn fit(self, width_px: u32, height_px: u32) -> (f64, f64) {
        let width_px = f64::from(width_px.max(1));
        let height_px = f64::from(height_px.max(1));
        match self {
            Self::Width { inches } => (inches, inches * height_px / width_px),
            Self::Height { inches } => (inches * width_px / height_px, inches),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionLayout {
    pub title: TitleBlock,
    pub heading: String,
    pub items: Vec<ChecklistItem>,
    #[serde(default)]
    pub photo: Option<PhotoSlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TitleBlock {
    pub title_field: String,
    #[serde(default)]
    pub title_fallback: Option<String>,
    #[serde(default = "default_title_size")]
    pub size_pt: usize,
    #[serde(default = "default_per_paragraph")]
    pub per_paragraph: usize,
    pub entries: Vec<TitleEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TitleEntry {
    pub label: String,
    pub field: String,
    #[serde(default)]
    pub fallback: Option<String>,
    pub pad: Padding,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistItem {
    pub label: String,
    pub field: String,
    #[serde(default)]
    pub kind: ValueKind,
    pub lines: u8,
    pub pad: Padding,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ValueKind {
    #[default]
    Text,
    PassFail,
    Measurement {
        unit: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Padding {
    pub before: usize,
    pub after: usize,
    #[serde(default)]
    pub trailing: usize,
}

impl Padding {
    pub const fn new(before: usize, after: usize) -> Self {
        Self {
            before,
            after,
            trailing: 0,
        }
    }

    pub const fn with_trailing(before: usize, after: usize, trailing: usize) -> Self {
        Self {
            before,
            after,
            trailing,
        }
    }

    pub fn is_blank(self) -> bool {
        self.before == 0 && self.after == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PhotoSlot {
    pub field: String,
    #[serde(default)]
    pub before_item: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentTableLayout {
    pub label_field: String,
    pub image_field: String,
    pub column_widths_in: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionalLayout {
    pub heading: String,
    #[serde(default = "default_per_paragraph")]
    pub per_paragraph: usize,
    pub items: Vec<FunctionalItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FunctionalItem {
    pub label: String,
    pub field: String,
    #[serde(default)]
    pub kind: ValueKind,
    pub pad: Padding,
}

fn default_banner_rows() -> usize {
    2
}

fn default_title_size() -> usize {
    14
}

fn default_per_paragraph() -> usize {
    3
}

impl LayoutProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let layout: Self = serde_json::from_slice(&raw)
            .with_context(|| format!("failed to parse layout profile {}", path.display()))?;
        layout
            .validate()
            .with_context(|| format!("invalid layout profile {}", path.display()))?;
        Ok(layout)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn mapping(&self, field: &str) -> Option<&FieldMapping> {
        self.fields.iter().find(|mapping| mapping.field == field)
    }

    pub fn validate(&self) -> Result<()> {
        let mut mapped = HashSet::new();
        for mapping in &self.fields {
            if mapping.column.trim().is_empty() {
                bail!("field `{}` maps to an empty column keyword", mapping.field);
            }
            if !mapped.insert(mapping.field.as_str()) {
                bail!("field `{}` is mapped more than once", mapping.field);
            }
        }

        for core in field::CORE {
            match self.mapping(core) {
                Some(mapping) if mapping.optional => {
                    bail!("core field `{core}` cannot be optional")
                }
                Some(_) => {}
                None => bail!("core field `{core}` is not mapped"),
            }
        }

        for referenced in self.referenced_fields() {
            if !mapped.contains(referenced) {
                bail!("layout references unmapped field `{referenced}`");
            }
        }

        for section in [&self.bare_board, &self.assembled_board] {
            if section.title.per_paragraph == 0 {
                bail!("title block `{}` groups zero entries per paragraph", section.heading);
            }
            if let Some(item) = section.items.iter().find(|item| item.lines > 2) {
                bail!("item `{}` has line count {} (expected 0..=2)", item.label, item.lines);
            }
            let before_item = section
                .photo
                .as_ref()
                .and_then(|photo| photo.before_item.as_deref());
            if let Some(before) = before_item {
                if !section.items.iter().any(|item| item.label == before) {
                    bail!("photo slot precedes unknown item `{before}`");
                }
            }
        }

        if self.functional_tests.per_paragraph == 0 {
            bail!("functional tests group zero entries per paragraph");
        }

        let sizing_inches = match self.image {
            ImageSizing::Width { inches } | ImageSizing::Height { inches } => inches,
        };
        if !(sizing_inches.is_finite() && sizing_inches > 0.0) {
            bail!("image sizing must be a positive number of inches");
        }

        Ok(())
    }

    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut fields: Vec<&str> = self.photo_fields.iter().map(String::as_str).collect();

        for section in [&self.bare_board, &self.assembled_board] {
            fields.push(&section.title.title_field);
            fields.extend(section.title.title_fallback.as_deref());
            for entry in &section.title.entries {
                fields.push(&entry.field);
                fields.extend(entry.fallback.as_deref());
            }
            fields.extend(section.items.iter().map(|item| item.field.as_str()));
            fields.extend(section.photo.as_ref().map(|photo| photo.field.as_str()));
        }

        fields.push(&self.component_table.label_field);
        fields.push(&self.component_table.image_field);
        fields.extend(
            self.functional_tests
                .items
                .iter()
                .map(|item| item.field.as_str()),
        );

        let mut seen = HashSet::new();
        fields.retain(|name| seen.insert(*name));
        fields
    }
}

impl Default for LayoutProfile {
    fn default() -> Self {
        Self {
            name: DEFAULT_LAYOUT_NAME.to_string(),
            banner_rows: default_banner_rows(),
            fields: default_fields(),
            photo_fields: vec!["primary_image".to_string(), "assembled_image".to_string()],
            palette: Palette::default(),
            image: ImageSizing::default(),
            mark_missing_images: false,
            markers: ImageMarkers::default(),
            bare_board: SectionLayout {
                title: title_block("title_page1", None, "unit_id", None),
                heading: "1st Visual Inspection – Bare PCB".to_string(),
                items: vec![
                    item("General comments:", "general_comments", 2, Padding::with_trailing(34, 0, 42)),
                    item("Flatness:", "flatness", 1, Padding::new(2, 2)),
                    item("Comments:", "comments", 0, Padding::new(25, 0)),
                    item("Thickness measurements:", "thickness", 1, Padding::new(4, 22)),
                    item("Plating (BGA):", "plating_bga", 1, Padding::new(4, 8)),
                    item("Plating (Holes):", "plating_holes", 0, Padding::new(4, 8)),
                    item("Soldermask alignment:", "soldermask_alignment", 1, Padding::new(4, 26)),
                    item("Glue problems?", "glue_problems", 1, Padding::new(7, 26)),
                    item(
                        "Test coupons (observations, continuity measurements etc.):",
                        "test_coupons",
                        2,
                        Padding::with_trailing(4, 10, 42),
                    ),
                    ChecklistItem {
                        kind: ValueKind::PassFail,
                        ..item("Accept?", "accept", 1, Padding::new(4, 12))
                    },
                ],
                photo: Some(PhotoSlot {
                    field: "primary_image".to_string(),
                    before_item: Some("Accept?".to_string()),
                }),
            },
            assembled_board: SectionLayout {
                title: title_block(
                    "title_page2",
                    Some("title_page1"),
                    "assembled_unit_id",
                    Some("unit_id"),
                ),
                heading: "2nd Visual Inspection – Assembled PCB".to_string(),
                items: vec![
                    item("General comments:", "assembled_general_comments", 1, Padding::new(4, 29)),
                    item("Flatness:", "assembled_flatness", 1, Padding::new(4, 30)),
                    item("HGCROC type:", "chip_type", 1, Padding::new(4, 8)),
                    item("HGCROC rotation:", "chip_rotation", 0, Padding::new(4, 8)),
                    item("Connectors:", "connectors", 1, Padding::new(4, 8)),
                    item("Resistors/capacitors:", "passives", 0, Padding::new(4, 8)),
                ],
                photo: Some(PhotoSlot {
                    field: "assembled_image".to_string(),
                    before_item: None,
                }),
            },
            component_table: ComponentTableLayout {
                label_field: "chip_id".to_string(),
                image_field: "chip_map_image".to_string(),
                column_widths_in: [2.0, 4.0],
            },
            functional_tests: FunctionalLayout {
                heading: "Functional Tests".to_string(),
                per_paragraph: default_per_paragraph(),
                items: vec![
                    FunctionalItem {
                        label: "Power-on current:".to_string(),
                        field: "power_on_current".to_string(),
                        kind: ValueKind::Measurement {
                            unit: "mA".to_string(),
                        },
                        pad: Padding::new(2, 2),
                    },
                    FunctionalItem {
                        label: "Configured OK:".to_string(),
                        field: "configured_ok".to_string(),
                        kind: ValueKind::PassFail,
                        pad: Padding::new(0, 0),
                    },
                    FunctionalItem {
                        label: "Operating current:".to_string(),
                        field: "operating_current".to_string(),
                        kind: ValueKind::Measurement {
                            unit: "mA".to_string(),
                        },
                        pad: Padding::new(2, 2),
                    },
                    FunctionalItem {
                        label: "DAQ lines OK:".to_string(),
                        field: "daq_lines_ok".to_string(),
                        kind: ValueKind::PassFail,
                        pad: Padding::new(0, 0),
                    },
                ],
            },
        }
    }
}

fn default_fields() -> Vec<FieldMapping> {
    let required = [
        (field::UNIT_ID, "ID"),
        (field::OPERATOR, "User"),
        (field::DATE, "Date"),
        (field::VERSION, "Version"),
        (field::MANUFACTURER, "Manufacturer"),
        (field::BATCH, "Batch number"),
        (field::DOCUMENT_STEM, "filename+ID"),
        ("title_page1", "title page1"),
        ("primary_image", "image link"),
        ("general_comments", "General comments"),
        ("flatness", "Flatness"),
        ("comments", "Comments"),
        ("thickness", "Thickness measurements"),
        ("plating_bga", "Plating (BGA)"),
        ("plating_holes", "Plating (Holes)"),
        ("soldermask_alignment", "Soldermask alignment"),
        ("glue_problems", "Glue problems?"),
        (
            "test_coupons",
            "Test coupons (observations, continuity measurements etc.)",
        ),
        ("accept", "Accept?"),
        ("assembled_general_comments", "p2_General comments"),
        ("assembled_flatness", "p2_Flatness"),
        ("chip_type", "p2_HGCROC type"),
        ("chip_rotation", "p2_HGCROC rotation"),
        ("connectors", "p2_Connectors"),
        ("passives", "p2_Resistors/capacitors"),
        ("chip_id", "p2_Chip ID"),
        ("assembled_image", "p2_image link"),
        ("power_on_current", "p2_Power-on current"),
        ("configured_ok", "p2_Configured OK"),
        ("operating_current", "p2_Operating current"),
        ("daq_lines_ok", "p2_DAQ lines OK"),
    ];
    let optional = [
        ("title_page2", "title page2"),
        ("assembled_unit_id", "p2_ID"),
        ("chip_map_image", "p2_Chip location map link"),
    ];

    required
        .into_iter()
        .map(|(field, column)| (field, column, false))
        .chain(optional.into_iter().map(|(field, column)| (field, column, true)))
        .map(|(field, column, optional)| FieldMapping {
            field: field.to_string(),
            column: column.to_string(),
            optional,
        })
        .collect()
}

fn title_block(
    title_field: &str,
    title_fallback: Option<&str>,
    id_field: &str,
    id_fallback: Option<&str>,
) -> TitleBlock {
    let mut entries: Vec<TitleEntry> = [
        ("User:", field::OPERATOR),
        ("Date:", field::DATE),
        ("Version:", field::VERSION),
        ("Manufacturer:", field::MANUFACTURER),
        ("Batch:", field::BATCH),
    ]
    .into_iter()
    .map(|(label, field)| TitleEntry {
        label: label.to_string(),
        field: field.to_string(),
        fallback: None,
        pad: Padding::new(2, 2),
    })
    .collect();
    entries.push(TitleEntry {
        label: "ID:".to_string(),
        field: id_field.to_string(),
        fallback: id_fallback.map(ToOwned::to_owned),
        pad: Padding::new(2, 2),
    });

    TitleBlock {
        title_field: title_field.to_string(),
        title_fallback: title_fallback.map(ToOwned::to_owned),
        size_pt: default_title_size(),
        per_paragraph: default_per_paragraph(),
        entries,
    }
}

fn item(label: &str, field: &str, lines: u8, pad: Padding) -> ChecklistItem {
    ChecklistItem {
        label: label.to_string(),
        field: field.to_string(),
        kind: ValueKind::Text,
        lines,
        pad,
    }
}
