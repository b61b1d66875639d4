//! # File Operations Module
//!
//! Interfaccia `FileOps` con le sole operazioni sul filesystem di cui ha
//! bisogno la pubblicazione di un file convertito: copia di permessi e
//! timestamp, spostamento/rinomina e cancellazione. L'orchestratore usa solo questa
//! interfaccia, mai comandi di shell.

use async_trait::async_trait;
use filetime::FileTime;
use std::io;
use std::path::Path;
use tracing::debug;

/// Filesystem capabilities used when publishing a converted file
#[async_trait]
pub trait FileOps: Send + Sync {
    /// Give `target` the permission bits of `reference`
    async fn copy_permissions(&self, reference: &Path, target: &Path) -> io::Result<()>;

    /// Copy creation (where supported), access and modification times
    async fn copy_timestamps(&self, reference: &Path, target: &Path) -> io::Result<()>;

    /// Move `from` to `to`, replacing `to` if it exists
    async fn move_or_rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn delete(&self, path: &Path) -> io::Result<()>;
}

/// `FileOps` on the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileOps;

#[async_trait]
impl FileOps for LocalFileOps {
    async fn copy_permissions(&self, reference: &Path, target: &Path) -> io::Result<()> {
        let permissions = tokio::fs::metadata(reference).await?.permissions();
        debug!("Copying permissions {} -> {}", reference.display(), target.display());
        tokio::fs::set_permissions(target, permissions).await
    }

    async fn copy_timestamps(&self, reference: &Path, target: &Path) -> io::Result<()> {
        let metadata = tokio::fs::metadata(reference).await?;
        let atime = FileTime::from_last_access_time(&metadata);
        let mtime = FileTime::from_last_modification_time(&metadata);

        let target_owned = target.to_path_buf();
        tokio::task::spawn_blocking(move || {
            filetime::set_file_times(&target_owned, atime, mtime)?;
            set_creation_time(&target_owned, &metadata);
            Ok::<_, io::Error>(())
        })
        .await
        .map_err(io::Error::other)??;

        debug!("Copied timestamps {} -> {}", reference.display(), target.display());
        Ok(())
    }

    async fn move_or_rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        debug!("Moving {} -> {}", from.display(), to.display());
        tokio::fs::rename(from, to).await
    }

    async fn delete(&self, path: &Path) -> io::Result<()> {
        debug!("Deleting {}", path.display());
        tokio::fs::remove_file(path).await
    }
}

#[cfg(windows)]
fn set_creation_time(target: &Path, metadata: &std::fs::Metadata) {
    use std::fs::{FileTimes, OpenOptions};
    use std::os::windows::fs::FileTimesExt;

    let Ok(created) = metadata.created() else {
        return;
    };
    let result = OpenOptions::new()
        .write(true)
        .open(target)
        .and_then(|file| file.set_times(FileTimes::new().set_created(created)));
    if let Err(e) = result {
        tracing::warn!("Failed to set creation time for {}: {}", target.display(), e);
    }
}

// Creation time is not settable through std on Linux and macOS
#[cfg(not(windows))]
fn set_creation_time(_target: &Path, _metadata: &std::fs::Metadata) {}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_copy_timestamps() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.avi");
        let target = dir.path().join("target.mp4");
        std::fs::write(&source, b"source").unwrap();
        std::fs::write(&target, b"target").unwrap();

        let old = FileTime::from_unix_time(1_500_000_000, 0);
        filetime::set_file_times(&source, old, old).unwrap();

        LocalFileOps.copy_timestamps(&source, &target).await.unwrap();

        let meta = std::fs::metadata(&target).unwrap();
        assert_eq!(FileTime::from_last_modification_time(&meta), old);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.avi");
        let target = tempfile::Builder::new()
            .suffix(".transcode.mp4")
            .tempfile_in(dir.path())
            .unwrap()
            .into_temp_path();
        std::fs::write(&source, b"source").unwrap();
        std::fs::set_permissions(&source, std::fs::Permissions::from_mode(0o644)).unwrap();
        assert_eq!(std::fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o600);

        LocalFileOps.copy_permissions(&source, &target).await.unwrap();

        assert_eq!(std::fs::metadata(&target).unwrap().permissions().mode() & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_move_replaces_destination() {
        let dir = TempDir::new().unwrap();
        let from = dir.path().join("a.tmp");
        let to = dir.path().join("b.mp4");
        std::fs::write(&from, b"new").unwrap();
        std::fs::write(&to, b"old").unwrap();

        LocalFileOps.move_or_rename(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"new");
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.mp4");
        std::fs::write(&path, b"x").unwrap();

        LocalFileOps.delete(&path).await.unwrap();
        assert!(!path.exists());
        assert!(LocalFileOps.delete(&path).await.is_err());
    }
}
