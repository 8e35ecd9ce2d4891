#![allow(clippy::module_name_repetitions)]
//! Output path helpers.
//!
//! Outputs are written next to their final location as `<name>.tmp` and
//! renamed into place, so readers never see a half-written file.

use std::path::{Path, PathBuf};

/// Returns the temporary path used while writing `path`.
#[must_use]
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Ensures the parent directory of `path` exists, creating it if necessary.
fn ensure_parent_dir(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

fn discard_tmp(tmp: &Path) {
    match std::fs::remove_file(tmp) {
        Ok(()) => log::debug!("Removed {}", tmp.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {e}", tmp.display()),
    }
}

/// Writes `path` through `write`, which receives the temporary path to
/// fill. The temporary file is renamed over `path` once `write` succeeds.
///
/// If `write` or the rename fails, the temporary file is removed and
/// `path` is left as it was.
///
/// # Errors
///
/// Returns the error of `write`, or an I/O error if the directory cannot be
/// created or the rename fails.
pub fn write_atomic<E: From<std::io::Error>>(
    path: &Path,
    write: impl FnOnce(&Path) -> Result<(), E>,
) -> Result<(), E> {
    ensure_parent_dir(path)?;
    let tmp = tmp_path(path);

    let result = write(&tmp).and_then(|()| std::fs::rename(&tmp, path).map_err(E::from));
    match &result {
        Ok(()) => log::info!("Wrote {}", path.display()),
        Err(_) => discard_tmp(&tmp),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tmp_path_appends_suffix() {
        assert_eq!(
            tmp_path(Path::new("data/out.csv")),
            PathBuf::from("data/out.csv.tmp")
        );
    }

    fn scratch(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    fn write_text(path: &Path, text: &str) -> std::io::Result<()> {
        write_atomic(path, |tmp| std::fs::write(tmp, text))
    }

    #[test]
    fn write_atomic_creates_dirs_and_leaves_no_tmp() {
        let dir = scratch("covid_map_paths_test");

        let path = dir.join("nested").join("out.txt");
        write_text(&path, "first").unwrap();
        write_text(&path, "second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        assert!(!tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_write_removes_tmp_and_keeps_old_file() {
        let dir = scratch("covid_map_paths_failed_write");
        let path = dir.join("out.txt");
        write_text(&path, "old").unwrap();

        let err = write_atomic(&path, |tmp| -> std::io::Result<()> {
            std::fs::write(tmp, "half")?;
            Err(std::io::Error::other("serialization failed"))
        })
        .unwrap_err();

        assert_eq!(err.to_string(), "serialization failed");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "old");
        assert!(!tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_rename_removes_tmp() {
        let dir = scratch("covid_map_paths_failed_rename");
        // A non-empty directory cannot be replaced by a file.
        let path = dir.join("occupied");
        std::fs::create_dir_all(path.join("child")).unwrap();

        assert!(write_text(&path, "data").is_err());
        assert!(path.is_dir());
        assert!(!tmp_path(&path).exists());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
