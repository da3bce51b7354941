use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};

use crate::layout::LayoutProfile;
use crate::model::Record;

const MULTILINE_HEADER: &str = "Test coupons (observations, continuity measurements etc.)";

pub fn sample_fields(unit_id: &str) -> BTreeMap<String, String> {
    let pairs = [
        ("unit_id", unit_id.to_string()),
        ("operator", "Alice".to_string()),
        ("date", "2024-05-02".to_string()),
        ("version", "v3".to_string()),
        ("manufacturer", "ACME Boards".to_string()),
        ("batch", "B7".to_string()),
        ("document_stem", format!("QC_{unit_id}")),
        ("title_page1", "Bare PCB inspection".to_string()),
        ("title_page2", "Assembled PCB inspection".to_string()),
        ("assembled_unit_id", format!("{unit_id}-A")),
        ("primary_image", String::new()),
        ("general_comments", "clean".to_string()),
        ("flatness", "0.2 mm".to_string()),
        ("comments", "none".to_string()),
        ("thickness", "1.60".to_string()),
        ("plating_bga", "ok".to_string()),
        ("plating_holes", "ok".to_string()),
        ("soldermask_alignment", "aligned".to_string()),
        ("glue_problems", "no".to_string()),
        ("test_coupons", "continuity fine".to_string()),
        ("accept", "yes".to_string()),
        ("assembled_general_comments", "solder joints good".to_string()),
        ("assembled_flatness", "0.3 mm".to_string()),
        ("chip_type", "HGCROC3".to_string()),
        ("chip_rotation", "0".to_string()),
        ("connectors", "ok".to_string()),
        ("passives", "ok".to_string()),
        ("chip_id", "0x1F2E".to_string()),
        ("chip_map_image", String::new()),
        ("assembled_image", String::new()),
        ("power_on_current", "120".to_string()),
        ("configured_ok", "1".to_string()),
        ("operating_current", "340 mA".to_string()),
        ("daq_lines_ok", "0".to_string()),
    ];
    pairs
        .into_iter()
        .map(|(field, value)| (field.to_string(), value))
        .collect()
}

pub fn sample_record(unit_id: &str) -> Record {
    Record::from_fields(1, sample_fields(unit_id)).expect("sample record")
}

pub fn record_with(unit_id: &str, overrides: &[(&str, &str)]) -> Record {
    let mut fields = sample_fields(unit_id);
    for (field, value) in overrides {
        fields.insert(field.to_string(), value.to_string());
    }
    Record::from_fields(1, fields).expect("sample record")
}

pub fn write_jpeg(path: &Path) {
    let image = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 30) as u8, (y * 40) as u8, 128]));
    image.save(path).expect("write jpeg");
}

pub fn write_png(path: &Path) {
    let image = RgbImage::from_pixel(4, 4, Rgb([10, 200, 30]));
    image.save(path).expect("write png");
}

pub fn write_sample_csv(root: &Path, name: &str, rows: &[BTreeMap<String, String>]) -> PathBuf {
    let layout = LayoutProfile::default();
    let path = root.join(name);
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_path(&path)
        .expect("open csv");

    writer
        .write_record(["HGCROC board quality control"])
        .expect("banner");
    writer
        .write_record(["exported from shared sheet", "2024-05-02"])
        .expect("banner");

    let header: Vec<String> = layout
        .fields
        .iter()
        .map(|mapping| {
            if mapping.column == MULTILINE_HEADER {
                "Test coupons (observations,\ncontinuity measurements etc.)".to_string()
            } else {
                mapping.column.clone()
            }
        })
        .collect();
    writer.write_record(&header).expect("header");

    for row in rows {
        let cells: Vec<&str> = layout
            .fields
            .iter()
            .map(|mapping| row.get(&mapping.field).map(String::as_str).unwrap_or(""))
            .collect();
        writer.write_record(&cells).expect("row");
    }
    writer.flush().expect("flush csv");

    path
}
