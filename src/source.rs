use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use walkdir::WalkDir;

/// Handles per batch sent through a [`FileSource`] channel.
pub const BATCH_SIZE: usize = 256;

/// An opaque reference to one candidate file: identity plus byte access.
/// The relative path is slash-separated on every platform so cluster
/// ordering is reproducible across runs and operating systems.
#[derive(Debug, Clone, Serialize)]
pub struct FileHandle {
    pub path: PathBuf,
    pub rel_path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

impl FileHandle {
    /// Build a handle for a standalone file (e.g. an anchor image); the
    /// relative path is just the file name.
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let meta = std::fs::metadata(path)?;
        let rel_path = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            rel_path,
            size: meta.len(),
            modified: modified_or_epoch(&meta),
        })
    }

    pub async fn read_all(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }

    /// Read at most `limit` bytes from the start of the file.
    pub async fn read_prefix(&self, limit: usize) -> io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut buf = Vec::with_capacity(limit.min(self.size as usize));
        file.take(limit as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

fn modified_or_epoch(meta: &std::fs::Metadata) -> DateTime<Utc> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| DateTime::<Utc>::from(UNIX_EPOCH))
}

/// A producer of candidate files, delivered as an ordered sequence of
/// batches. Directory walking, pickers and drag-drop adapters all sit
/// behind this seam; the scan pipeline only ever sees handles.
pub trait FileSource {
    fn batches(self) -> mpsc::Receiver<Vec<FileHandle>>;
}

/// Recursive directory walk. Entries are collected, sorted by relative
/// path, then streamed in batches from a blocking task.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl FileSource for DirectorySource {
    fn batches(self) -> mpsc::Receiver<Vec<FileHandle>> {
        let (tx, rx) = mpsc::channel(4);
        tokio::task::spawn_blocking(move || {
            let mut handles = Vec::new();
            for entry in WalkDir::new(&self.root)
                .follow_links(false)
                .into_iter()
                .filter_map(|e| e.ok())
            {
                if !entry.file_type().is_file() {
                    continue;
                }
                let meta = match entry.metadata() {
                    Ok(meta) => meta,
                    Err(err) => {
                        log::debug!("skipping {}: {err}", entry.path().display());
                        continue;
                    }
                };
                let rel = entry
                    .path()
                    .strip_prefix(&self.root)
                    .unwrap_or(entry.path());
                let rel_path = rel.to_string_lossy().replace('\\', "/");
                handles.push(FileHandle {
                    path: entry.into_path(),
                    rel_path,
                    size: meta.len(),
                    modified: modified_or_epoch(&meta),
                });
            }
            handles.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
            for chunk in handles.chunks(BATCH_SIZE) {
                if tx.blocking_send(chunk.to_vec()).is_err() {
                    break;
                }
            }
        });
        rx
    }
}

/// Pre-enumerated handles, e.g. from a picker adapter or a test.
impl FileSource for Vec<FileHandle> {
    fn batches(self) -> mpsc::Receiver<Vec<FileHandle>> {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for chunk in self.chunks(BATCH_SIZE) {
                if tx.send(chunk.to_vec()).await.is_err() {
                    break;
                }
            }
        });
        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn directory_source_sorts_by_relative_path() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("sub")).unwrap();
        fs::write(temp_dir.path().join("zebra.png"), b"z").unwrap();
        fs::write(temp_dir.path().join("apple.png"), b"a").unwrap();
        fs::write(temp_dir.path().join("sub").join("middle.png"), b"m").unwrap();

        let mut rx = DirectorySource::new(temp_dir.path()).batches();
        let mut all = Vec::new();
        while let Some(batch) = rx.recv().await {
            all.extend(batch);
        }

        let rel: Vec<&str> = all.iter().map(|h| h.rel_path.as_str()).collect();
        assert_eq!(rel, vec!["apple.png", "sub/middle.png", "zebra.png"]);
        assert!(all.iter().all(|h| h.size > 0));
    }

    #[tokio::test]
    async fn read_prefix_is_bounded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        fs::write(&path, vec![7u8; 1024]).unwrap();

        let handle = FileHandle::from_path(&path).unwrap();
        assert_eq!(handle.size, 1024);
        assert_eq!(handle.read_prefix(100).await.unwrap().len(), 100);
        assert_eq!(handle.read_prefix(4096).await.unwrap().len(), 1024);
        assert_eq!(handle.read_all().await.unwrap().len(), 1024);
    }
}
