//! Atomic file writes: write to a temp file in the same directory, then
//! rename. Used by the cache's filesystem fallback tier (spec §4.A) and by
//! output-artifact writers (spec §6).

use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `contents` to `path` atomically. The temp file lives alongside
/// `path` so the rename is same-filesystem and therefore atomic on POSIX.
pub fn write_file_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    let tmp_path = dir.join(format!(".{file_name}.tmp-{}", std::process::id()));

    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(contents)?;
        tmp.sync_all()?;
    }

    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn writes_and_overwrites_atomically() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("entry.json");

        write_file_atomic(&path, b"{\"a\":1}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"a\":1}");

        write_file_atomic(&path, b"{\"a\":2}").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"{\"a\":2}");

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty(), "no temp files should remain");
    }
}
