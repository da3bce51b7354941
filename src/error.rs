use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type QcResult<T> = Result<T, QcError>;

#[derive(Debug, Error)]
pub enum QcError {
    #[error("failed to load `{}`: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    #[error("{scope} is missing field `{field}`")]
    MissingField { scope: String, field: String },

    #[error("failed to relocate `{name}` from `{}` to `{}`: {reason}", from.display(), to.display())]
    Relocate {
        name: String,
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    #[error("failed to insert image `{}`: {reason}", path.display())]
    ImageInsert { path: PathBuf, reason: String },

    #[error("unit id `{0}` cannot be used as a folder name")]
    InvalidUnitId(String),

    #[error("document name `{0}` cannot be used as a file name at the root")]
    InvalidDocumentStem(String),
}

impl QcError {
    pub fn load(path: impl Into<PathBuf>, reason: impl fmt::Display) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_field(scope: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingField {
            scope: scope.into(),
            field: field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub unit_id: String,
    pub name: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} not found for {}", self.name, self.unit_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_warning_names_unit_and_file() {
        let warning = ResolutionWarning {
            unit_id: "U-001".to_string(),
            name: "photo1.jpg".to_string(),
        };
        assert_eq!(warning.to_string(), "photo1.jpg not found for U-001");
    }

    #[test]
    fn missing_field_message_carries_scope() {
        let err = QcError::missing_field("unit U-001", "p2_flatness");
        assert_eq!(err.to_string(), "unit U-001 is missing field `p2_flatness`");
    }
}
