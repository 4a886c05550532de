//! I/O for raster artifacts

mod geotiff;

pub use geotiff::{read_geotiff, write_geotiff};

use crate::error::Result;
use std::path::{Path, PathBuf};

/// Temporary sibling path used for write-then-rename durability.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write bytes to a temporary sibling and rename into place, so a crash
/// mid-write never leaves a truncated artifact at the destination.
pub fn temp_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = temp_sibling(path);
    match std::fs::write(&tmp, bytes) {
        Ok(()) => {
            std::fs::rename(&tmp, path)?;
            Ok(())
        }
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_write_replaces_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact.txt");

        temp_write(&path, b"first").unwrap();
        temp_write(&path, b"second").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second");
        let entries: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }
}
