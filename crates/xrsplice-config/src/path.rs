//! Path helpers for layer manifests and config discovery.
//!
//! The OpenXR loader resolves a relative `library_path` against the
//! directory holding the manifest, so manifest generation needs to know
//! both locations before either file necessarily exists.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::Config;

/// Normalize a path where the target file may not exist yet.
///
/// Canonicalizes the parent directory and appends the filename.
/// Useful for output paths like manifest files that will be created.
pub fn normalize_nonexistent(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let filename = path.file_name().context("Path has no filename")?;

    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            let canonical_parent = parent.canonicalize().with_context(|| {
                format!("Failed to resolve parent directory: {}", parent.display())
            })?;
            Ok(canonical_parent.join(filename))
        }
        _ => {
            let cwd = std::env::current_dir().context("Failed to get current directory")?;
            Ok(cwd.join(filename))
        }
    }
}

/// Compute the `library_path` value to write into a manifest stored at
/// `manifest`.
///
/// With `relative` set and the library living under the manifest's
/// directory, the result is relative to that directory. Otherwise the
/// absolute library path is returned.
pub fn library_path_for_manifest(
    library: impl AsRef<Path>,
    manifest: impl AsRef<Path>,
    relative: bool,
) -> Result<PathBuf> {
    let library = library.as_ref();
    let absolute = normalize_nonexistent(library)
        .with_context(|| format!("Cannot resolve library path: {}", library.display()))?;

    if !relative {
        return Ok(absolute);
    }

    let manifest = normalize_nonexistent(manifest.as_ref())?;
    let Some(manifest_dir) = manifest.parent() else {
        return Ok(absolute);
    };

    Ok(match absolute.strip_prefix(manifest_dir) {
        Ok(rel) => PathBuf::from(".").join(rel),
        Err(_) => absolute,
    })
}

/// Config files consulted by `Config::load`, in load order.
pub fn config_search_paths() -> Vec<PathBuf> {
    Config::global_config_path()
        .into_iter()
        .chain(Config::explicit_config_path())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_normalize_nonexistent_creates_valid_path() {
        let temp = tempdir().unwrap();
        let new_file = temp.path().join("XrApiLayer_xrsplice.json");

        let normalized = normalize_nonexistent(&new_file).unwrap();
        assert!(normalized.is_absolute());
        assert_eq!(normalized.file_name().unwrap(), "XrApiLayer_xrsplice.json");
    }

    #[test]
    fn test_normalize_nonexistent_rejects_missing_parent() {
        let result = normalize_nonexistent("/nonexistent/dir/manifest.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_library_path_relative_to_manifest() {
        let temp = tempdir().unwrap();
        let lib_dir = temp.path().join("bin");
        fs::create_dir(&lib_dir).unwrap();
        let library = lib_dir.join("libxrsplice_layer.so");
        fs::write(&library, b"").unwrap();
        let manifest = temp.path().join("XrApiLayer_xrsplice.json");

        let rel = library_path_for_manifest(&library, &manifest, true).unwrap();
        assert_eq!(rel, PathBuf::from("./bin/libxrsplice_layer.so"));

        let abs = library_path_for_manifest(&library, &manifest, false).unwrap();
        assert!(abs.is_absolute());
        assert!(abs.ends_with("bin/libxrsplice_layer.so"));
    }

    #[test]
    fn test_library_outside_manifest_dir_stays_absolute() {
        let lib_root = tempdir().unwrap();
        let manifest_root = tempdir().unwrap();
        let library = lib_root.path().join("libxrsplice_layer.so");
        fs::write(&library, b"").unwrap();
        let manifest = manifest_root.path().join("layer.json");

        let path = library_path_for_manifest(&library, &manifest, true).unwrap();
        assert!(path.is_absolute());
    }
}
