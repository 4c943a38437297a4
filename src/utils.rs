//! Filesystem helpers.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `content` to a sibling temp file, sync it, then rename over `path`.
///
/// Readers see either the old or the new file, never a partial one.
/// Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let temp_path = sibling_with_suffix(path, ".tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(content)?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&temp_path);
    })
}

/// `path` with `suffix` appended to its file name (`mcp.json` -> `mcp.json.backup`).
pub fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn atomic_write_creates_parents_and_replaces() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a/b/.mcp.json");

        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
        assert!(!sibling_with_suffix(&path, ".tmp").exists());
    }

    #[test]
    fn suffix_keeps_dotfile_name() {
        assert_eq!(
            sibling_with_suffix(Path::new("/w/.mcp.json"), ".backup"),
            PathBuf::from("/w/.mcp.json.backup")
        );
    }
}
