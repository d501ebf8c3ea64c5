//! Atomic file operations with crash-recovery backups

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Workspace-local directory holding timestamped pre-state snapshots.
pub const BACKUP_DIR: &str = ".maeum_backups";

/// Null-byte probe window for binary detection.
const BINARY_PROBE_BYTES: usize = 8 * 1024;

/// True when the existing file looks binary (null byte in the first 8 KiB).
pub fn is_binary(path: &Path) -> bool {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(_) => return false,
    };
    bytes[..bytes.len().min(BINARY_PROBE_BYTES)].contains(&0)
}

/// Write `content` to `<path>.tmp` in the same directory, then rename over
/// `path`. Parent directories are created as needed.
pub fn atomic_write(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = tmp_path(path);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// Snapshot the current content of `path` into the backup mirror before a
/// destructive operation. Complements the in-memory undo stack for crash
/// recovery; missing source files are not an error.
pub fn snapshot(workspace_root: &Path, path: &Path) -> io::Result<Option<PathBuf>> {
    let content = match std::fs::read(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let rel = path.strip_prefix(workspace_root).unwrap_or(path);
    let stamp = Utc::now().format("%Y%m%d-%H%M%S-%f");
    let mut backup = workspace_root.join(BACKUP_DIR).join(rel);
    let name = backup
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    backup.set_file_name(format!("{}.{}", name, stamp));

    if let Some(parent) = backup.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&backup, content)?;
    debug!("backup: {} -> {}", path.display(), backup.display());
    Ok(Some(backup))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::fs;

    fn test_dir() -> PathBuf {
        let id = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let dir = temp_dir().join(format!("maeum-fileops-test-{}-{}", std::process::id(), id));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = test_dir();
        let path = dir.join("deep/nested/file.txt");
        atomic_write(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");
        assert!(!path.with_file_name("file.txt.tmp").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn binary_probe_detects_null_bytes() {
        let dir = test_dir();
        let text = dir.join("text.txt");
        let binary = dir.join("blob.bin");
        fs::write(&text, "plain text").unwrap();
        fs::write(&binary, [1u8, 0, 2, 3]).unwrap();
        assert!(!is_binary(&text));
        assert!(is_binary(&binary));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_mirrors_into_backup_dir() {
        let dir = test_dir();
        let path = dir.join("src/app.py");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "v1").unwrap();

        let backup = snapshot(&dir, &path).unwrap().unwrap();
        assert!(backup.starts_with(dir.join(BACKUP_DIR).join("src")));
        assert_eq!(fs::read_to_string(&backup).unwrap(), "v1");

        // Missing source is not an error.
        assert!(snapshot(&dir, &dir.join("absent.txt")).unwrap().is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
