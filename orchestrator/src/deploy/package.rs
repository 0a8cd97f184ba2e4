// File: orchestrator/src/deploy/package.rs
//! Local inspection of upload packages.
//!
//! A package is accepted when its listing holds the marker file at the
//! archive root or one directory below it, the same places the remote
//! extract step looks. Unreadable archives are rejected here so that no
//! server is touched for a package that could never go live.

use super::backup::ArchiveKind;
use crate::errors::DeployError;
use std::fs::File;
use std::io;
use std::path::Path;

/// Reads the archive listing and checks for `marker`. Blocking; callers on
/// the runtime go through `spawn_blocking`.
pub fn inspect_package(path: &Path, kind: ArchiveKind, marker: &str) -> Result<(), DeployError> {
    let invalid = |reason: String| DeployError::InvalidPackage {
        path: path.display().to_string(),
        reason,
    };

    let names = list_entries(path, kind).map_err(|e| invalid(format!("unreadable archive: {}", e)))?;

    if names.iter().any(|name| marker_at_package_root(name, marker)) {
        Ok(())
    } else {
        Err(invalid(format!("package does not contain {}", marker)))
    }
}

fn list_entries(path: &Path, kind: ArchiveKind) -> io::Result<Vec<String>> {
    let file = File::open(path)?;
    match kind {
        ArchiveKind::Zip => {
            let archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;
            Ok(archive.file_names().map(str::to_string).collect())
        }
        ArchiveKind::TarGz => {
            let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(file));
            let mut names = Vec::new();
            for entry in archive.entries()? {
                let entry = entry?;
                names.push(entry.path()?.to_string_lossy().into_owned());
            }
            Ok(names)
        }
    }
}

/// `marker`, `./marker` and `dir/marker` qualify; deeper paths do not.
fn marker_at_package_root(name: &str, marker: &str) -> bool {
    let name = name.strip_prefix("./").unwrap_or(name);
    match name.split('/').collect::<Vec<_>>().as_slice() {
        [file] => *file == marker,
        [dir, file] => !dir.is_empty() && *file == marker,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_positions() {
        assert!(marker_at_package_root("index.html", "index.html"));
        assert!(marker_at_package_root("./index.html", "index.html"));
        assert!(marker_at_package_root("dist/index.html", "index.html"));
        assert!(!marker_at_package_root("dist/app/index.html", "index.html"));
        assert!(!marker_at_package_root("dist/index.html.bak", "index.html"));
        assert!(!marker_at_package_root("/index.html", "index.html"));
    }

    #[test]
    fn test_garbage_archive_is_invalid() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dist.zip");
        std::fs::write(&path, b"not an archive").unwrap();

        assert!(matches!(
            inspect_package(&path, ArchiveKind::Zip, "index.html"),
            Err(DeployError::InvalidPackage { ref reason, .. }) if reason.starts_with("unreadable archive")
        ));
    }
}
