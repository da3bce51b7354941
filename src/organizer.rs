use std::path::{Component, Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::error::QcError;
use crate::model::Record;
use crate::util::ensure_directory;

pub fn ensure_unit_folder(root: &Path, unit_id: &str) -> Result<PathBuf> {
    check_unit_id(unit_id)?;

    let folder = root.join(unit_id);
    ensure_directory(&folder)?;
    debug!(unit_id = %unit_id, path = %folder.display(), "unit folder ready");
    Ok(folder)
}

pub fn check_unit_id(unit_id: &str) -> Result<(), QcError> {
    if !is_plain_name(unit_id) {
        return Err(QcError::InvalidUnitId(unit_id.to_string()));
    }
    Ok(())
}

pub fn check_document_stem(stem: &str) -> Result<(), QcError> {
    if !is_plain_name(stem) {
        return Err(QcError::InvalidDocumentStem(stem.to_string()));
    }
    Ok(())
}

pub fn check_record(record: &Record) -> Result<(), QcError> {
    check_unit_id(&record.unit_id)?;
    check_document_stem(&record.document_stem)
}

fn is_plain_name(name: &str) -> bool {
    let trimmed = name.trim();
    let mut components = Path::new(trimmed).components();
    let single_normal = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    !trimmed.is_empty() && trimmed == name && single_normal && !name.contains('\\')
}
