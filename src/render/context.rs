use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;
use tracing::{debug, warn};

use crate::document::ImageRun;
use crate::error::{QcError, QcResult, ResolutionWarning};
use crate::layout::{ImageSizing, LayoutProfile};
use crate::model::Record;
use crate::resolver::{FileResolver, PathProbe, Resolution};

static BLANK_SLOT: ImageSlot = ImageSlot::Blank;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageSlot {
    Blank,
    Missing,
    Unreadable(String),
    Ready(ImageRun),
}

#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub record: &'a Record,
    images: BTreeMap<String, ImageSlot>,
    warnings: Vec<ResolutionWarning>,
    image_errors: Vec<String>,
}

impl<'a> RenderContext<'a> {
    pub fn prepare<P: PathProbe>(
        record: &'a Record,
        layout: &LayoutProfile,
        resolver: &FileResolver<P>,
    ) -> Self {
        let mut images = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut image_errors = Vec::new();

        for field in image_fields(layout) {
            let reference = record.reference(field);
            let (resolution, warning) = resolver.resolve_reported(&record.unit_id, reference);
            warnings.extend(warning);

            let slot = match resolution {
                Resolution::Unresolved => ImageSlot::Blank,
                Resolution::Missing => ImageSlot::Missing,
                Resolution::Found { path, .. } => match load_image(&path, layout.image) {
                    Ok(image) => {
                        debug!(unit_id = %record.unit_id, path = %path.display(), "image ready");
                        ImageSlot::Ready(image)
                    }
                    Err(err) => {
                        warn!(unit_id = %record.unit_id, error = %err, "image insert failed");
                        image_errors.push(err.to_string());
                        ImageSlot::Unreadable(reference.to_string())
                    }
                },
            };
            images.insert(field.to_string(), slot);
        }

        Self {
            record,
            images,
            warnings,
            image_errors,
        }
    }

    pub fn image(&self, field: &str) -> &ImageSlot {
        self.images.get(field).unwrap_or(&BLANK_SLOT)
    }

    pub fn warnings(&self) -> &[ResolutionWarning] {
        &self.warnings
    }

    pub fn image_errors(&self) -> &[String] {
        &self.image_errors
    }
}

fn image_fields(layout: &LayoutProfile) -> Vec<&str> {
    let mut fields: Vec<&str> = [&layout.bare_board, &layout.assembled_board]
        .into_iter()
        .filter_map(|section| section.photo.as_ref())
        .map(|photo| photo.field.as_str())
        .collect();
    fields.push(&layout.component_table.image_field);
    fields.sort_unstable();
    fields.dedup();
    fields
}

pub fn load_image(path: &Path, sizing: ImageSizing) -> QcResult<ImageRun> {
    let failure = |reason: String| QcError::ImageInsert {
        path: path.to_path_buf(),
        reason,
    };

    let raw = fs::read(path).map_err(|err| failure(err.to_string()))?;
    let decoded = image::load_from_memory(&raw).map_err(|err| failure(err.to_string()))?;

    let mut png = Vec::new();
    decoded
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|err| failure(err.to_string()))?;

    let (width_in, height_in) = sizing.fit(decoded.width(), decoded.height());
    Ok(ImageRun {
        source: path.to_path_buf(),
        png,
        width_in,
        height_in,
    })
}
