use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{QcError, QcResult, ResolutionWarning};
use crate::util::is_blank;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Root,
    UnitFolder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Unresolved,
    Found { location: Location, path: PathBuf },
    Missing,
}

impl Resolution {
    pub fn location(&self) -> Option<Location> {
        match self {
            Self::Found { location, .. } => Some(*location),
            Self::Unresolved | Self::Missing => None,
        }
    }
}

pub trait PathProbe {
    fn exists(&self, path: &Path) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

pub trait FileMover {
    fn move_file(&self, source: &Path, destination: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMover;

impl FileMover for LocalMover {
    fn move_file(&self, source: &Path, destination: &Path) -> std::io::Result<()> {
        fs::rename(source, destination)
    }
}

#[derive(Debug, Clone)]
pub struct FileResolver<P = FsProbe> {
    root: PathBuf,
    probe: P,
}

impl FileResolver<FsProbe> {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_probe(root, FsProbe)
    }
}

impl<P: PathProbe> FileResolver<P> {
    pub fn with_probe(root: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            root: root.into(),
            probe,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn unit_folder(&self, unit_id: &str) -> PathBuf {
        self.root.join(unit_id)
    }

    pub fn resolve(&self, unit_id: &str, name: &str) -> Resolution {
        if is_blank(name) {
            return Resolution::Unresolved;
        }

        let candidates = [
            (Location::Root, self.root.join(name)),
            (Location::UnitFolder, self.unit_folder(unit_id).join(name)),
        ];
        for (location, path) in candidates {
            if self.probe.exists(&path) {
                return Resolution::Found { location, path };
            }
        }

        Resolution::Missing
    }

    pub fn resolve_reported(
        &self,
        unit_id: &str,
        name: &str,
    ) -> (Resolution, Option<ResolutionWarning>) {
        let resolution = self.resolve(unit_id, name);
        if resolution != Resolution::Missing {
            return (resolution, None);
        }

        let warning = ResolutionWarning {
            unit_id: unit_id.to_string(),
            name: name.to_string(),
        };
        warn!(unit_id = %unit_id, file = %name, "{warning}");
        (resolution, Some(warning))
    }
}

pub fn relocate(
    mover: &dyn FileMover,
    from_dir: &Path,
    to_dir: &Path,
    name: &str,
) -> QcResult<PathBuf> {
    let source = from_dir.join(name);
    let destination = to_dir.join(name);
    let failure = |reason: String| QcError::Relocate {
        name: name.to_string(),
        from: from_dir.to_path_buf(),
        to: to_dir.to_path_buf(),
        reason,
    };

    if !source.is_file() {
        return Err(failure("source does not exist".to_string()));
    }
    if destination.exists() {
        return Err(failure("destination already exists".to_string()));
    }

    mover
        .move_file(&source, &destination)
        .map_err(|err| failure(err.to_string()))?;

    info!(from = %source.display(), to = %destination.display(), "moved file");
    Ok(destination)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    #[derive(Default)]
    struct CountingProbe {
        calls: Cell<usize>,
    }

    impl PathProbe for CountingProbe {
        fn exists(&self, path: &Path) -> bool {
            self.calls.set(self.calls.get() + 1);
            path.exists()
        }
    }

    #[test]
    fn blank_reference_is_unresolved_without_probing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = FileResolver::with_probe(dir.path(), CountingProbe::default());

        for blank in ["", "   ", "\t"] {
            assert_eq!(resolver.resolve("U-001", blank), Resolution::Unresolved);
        }
        assert_eq!(resolver.probe.calls.get(), 0);
    }

    #[test]
    fn root_candidate_wins_over_unit_folder() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("U-001")).expect("unit folder");
        fs::write(dir.path().join("photo.jpg"), b"root").expect("root copy");
        fs::write(dir.path().join("U-001").join("photo.jpg"), b"unit").expect("unit copy");

        let resolver = FileResolver::new(dir.path());
        let resolution = resolver.resolve("U-001", "photo.jpg");
        assert_eq!(
            resolution,
            Resolution::Found {
                location: Location::Root,
                path: dir.path().join("photo.jpg"),
            }
        );
    }

    #[test]
    fn unit_folder_candidate_is_second() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir(dir.path().join("U-001")).expect("unit folder");
        fs::write(dir.path().join("U-001").join("photo.jpg"), b"unit").expect("unit copy");

        let resolution = FileResolver::new(dir.path()).resolve("U-001", "photo.jpg");
        assert_eq!(resolution.location(), Some(Location::UnitFolder));
    }

    #[test]
    fn missing_reference_reports_warning() {
        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = FileResolver::new(dir.path());

        let (resolution, warning) = resolver.resolve_reported("U-001", "ghost.jpg");
        assert_eq!(resolution, Resolution::Missing);
        assert_eq!(
            warning,
            Some(ResolutionWarning {
                unit_id: "U-001".to_string(),
                name: "ghost.jpg".to_string(),
            })
        );

        let (resolution, warning) = resolver.resolve_reported("U-001", "");
        assert_eq!(resolution, Resolution::Unresolved);
        assert!(warning.is_none());
    }

    #[test]
    fn relocate_round_trip_restores_path_and_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let unit = root.join("U-001");
        fs::create_dir(&unit).expect("unit folder");
        let original = root.join("photo1.jpg");
        let bytes = vec![0xFF_u8, 0xD8, 0x00, 0x42, 0x13];
        fs::write(&original, &bytes).expect("photo");

        let moved = relocate(&LocalMover, root, &unit, "photo1.jpg").expect("move in");
        assert_eq!(moved, unit.join("photo1.jpg"));
        assert!(!original.exists());

        let restored = relocate(&LocalMover, &unit, root, "photo1.jpg").expect("move back");
        assert_eq!(restored, original);
        assert_eq!(fs::read(&original).expect("read"), bytes);
    }

    #[test]
    fn relocate_refuses_occupied_destination() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path();
        let unit = root.join("U-001");
        fs::create_dir(&unit).expect("unit folder");
        fs::write(root.join("photo1.jpg"), b"new").expect("root photo");
        fs::write(unit.join("photo1.jpg"), b"old").expect("unit photo");

        let err = relocate(&LocalMover, root, &unit, "photo1.jpg").expect_err("occupied");
        assert!(matches!(err, QcError::Relocate { .. }));
        assert_eq!(fs::read(unit.join("photo1.jpg")).expect("read"), b"old");
        assert!(root.join("photo1.jpg").exists());
    }

    #[test]
    fn relocate_reports_absent_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let unit = dir.path().join("U-001");
        fs::create_dir(&unit).expect("unit folder");

        let err = relocate(&LocalMover, dir.path(), &unit, "ghost.jpg").expect_err("absent");
        assert!(err.to_string().contains("source does not exist"));
    }
}
