//! Document file access.
//!
//! Saving never writes into the target directly: the new content goes to a
//! temporary file next to it, is flushed and synced, the previous version is
//! optionally copied to `<name>.bak`, and only then is the temporary file
//! renamed over the target. Any failure before the rename leaves the
//! original untouched.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;

use crate::config::BACKUP_SUFFIX;
use crate::error::{Error, Result};

/// Reads a whole document along with its modification time.
pub async fn read_document(path: &Path) -> Result<(Vec<u8>, Option<SystemTime>)> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::FileDoesNotExist(path.to_path_buf())),
        Err(source) => return Err(Error::CannotLoadFile { path: path.to_path_buf(), source }),
    };

    let content = tokio::fs::read(path).await.map_err(|source| Error::CannotLoadFile { path: path.to_path_buf(), source })?;
    Ok((content, metadata.modified().ok()))
}

/// Modification time, or `None` when the file does not exist.
pub async fn modified(path: &Path) -> Result<Option<SystemTime>> {
    match tokio::fs::metadata(path).await {
        Ok(metadata) => Ok(metadata.modified().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(Error::CannotLoadFile { path: path.to_path_buf(), source }),
    }
}

#[inline]
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Replaces `path` with `content` atomically. Returns the new modification time.
pub async fn write_atomic(path: &Path, content: Vec<u8>, backup: bool) -> Result<Option<SystemTime>> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomic_blocking(&target, &content, backup))
        .await
        .map_err(|e| Error::CannotSaveFile { path: path.to_path_buf(), source: std::io::Error::other(e) })?
}

fn write_atomic_blocking(path: &Path, content: &[u8], backup: bool) -> Result<Option<SystemTime>> {
    let save_error = |source| Error::CannotSaveFile { path: path.to_path_buf(), source };
    let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));

    let mut temp = NamedTempFile::new_in(dir).map_err(save_error)?;
    temp.write_all(content).map_err(save_error)?;
    temp.flush().map_err(save_error)?;
    temp.as_file().sync_all().map_err(save_error)?;

    let existing = match fs::metadata(path) {
        Ok(metadata) => Some(metadata),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(save_error(e)),
    };

    if let Some(metadata) = &existing {
        // Keep the permissions the user gave the document.
        fs::set_permissions(temp.path(), metadata.permissions()).map_err(save_error)?;

        if backup {
            let backup = backup_path(path);
            fs::copy(path, &backup).map_err(|source| Error::CannotCreateBackupFile { path: backup.clone(), source })?;
            tracing::debug!(backup = %backup.display(), "previous version kept");
        }
    }

    temp.persist(path).map_err(|e| save_error(e.error))?;
    tracing::debug!(path = %path.display(), size = content.len(), "document replaced");

    Ok(fs::metadata(path).and_then(|metadata| metadata.modified()).ok())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");

        let modified = write_atomic(&path, b"first".to_vec(), false).await.unwrap();
        let (content, read_modified) = read_document(&path).await.unwrap();
        assert_eq!(content, b"first");
        assert_eq!(modified, read_modified);
        assert!(!backup_path(&path).exists());
    }

    #[tokio::test]
    async fn test_backup_keeps_previous_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.epd");

        write_atomic(&path, b"old".to_vec(), true).await.unwrap();
        assert!(!backup_path(&path).exists());

        write_atomic(&path, b"new".to_vec(), true).await.unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");
        assert_eq!(fs::read(backup_path(&path)).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.epd");
        assert!(matches!(read_document(&path).await, Err(Error::FileDoesNotExist(_))));
        assert_eq!(modified(&path).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_original() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        fs::write(&path, b"original").unwrap();

        // A directory where the backup should go makes the backup copy fail.
        fs::create_dir(backup_path(&path)).unwrap();
        let result = write_atomic(&path, b"replacement".to_vec(), true).await;

        assert!(matches!(result, Err(Error::CannotCreateBackupFile { .. })));
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_backup_path() {
        assert_eq!(backup_path(Path::new("/a/notes.epd")), PathBuf::from("/a/notes.epd.bak"));
    }
}
