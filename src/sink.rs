//! The storage collaborator: `Sink` is the two-method contract spec.md §6 asks for
//! from "external storage collaborator" implementations (object stores, metadata
//! stores), plus [`LocalSink`], a filesystem reference implementation used by
//! `--skip-upload` and by the crate's own tests.
//!
//! `put` is required to be atomic on success: a half-written file must never be
//! observable at `path`. [`LocalSink`] gets this by writing to a sibling temp file
//! and renaming it over the destination, which is atomic on the same filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{IngestError, Result};

/// Storage collaborator required by the orchestrator: commits artifact bytes under a
/// canonical path, checks whether a path is already committed, and records per-filing
/// metadata keyed by `filing_id`.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Commits `bytes` at `path`, atomically: callers never observe a partial write.
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()>;

    /// Whether `path` has already been committed by a previous `put`.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Upserts metadata for `filing_id` (`"{ticker}-{filing_type}-{fiscal_year}-{fiscal_period}"`).
    async fn record_metadata(&self, filing_id: &str, attrs: HashMap<String, String>) -> Result<()>;
}

/// A [`Sink`] backed by a local directory tree, mirroring the canonical artifact path
/// layout 1:1 below `root`. Used for `--skip-upload` runs and as this crate's own test
/// double, since no real object store is reachable from a unit test.
pub struct LocalSink {
    root: PathBuf,
    metadata: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata: Mutex::new(HashMap::new()),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl Sink for LocalSink {
    async fn put(&self, path: &str, bytes: &[u8]) -> Result<()> {
        let dest = self.resolve(path);
        let dir = dest.parent().ok_or_else(|| {
            IngestError::SerializeError(format!("artifact path has no parent directory: {path}"))
        })?;
        tokio::fs::create_dir_all(dir).await?;

        let tmp = sibling_tmp_path(&dest);
        {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
        }
        tokio::fs::rename(&tmp, &dest).await?;
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.resolve(path)).await?)
    }

    async fn record_metadata(&self, filing_id: &str, attrs: HashMap<String, String>) -> Result<()> {
        let mut guard = self
            .metadata
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.entry(filing_id.to_string()).or_default().extend(attrs);
        Ok(())
    }
}

fn sibling_tmp_path(dest: &Path) -> PathBuf {
    let file_name = dest.file_name().and_then(|n| n.to_str()).unwrap_or("artifact");
    let unique = fastrand::u64(..);
    dest.with_file_name(format!(".{file_name}.{unique}.tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_exists_round_trips() {
        let dir = tempdir();
        let sink = LocalSink::new(dir.path());
        let path = "companies/MSFT/10-Q/2024/Q1/text.txt";

        assert!(!sink.exists(path).await.unwrap());
        sink.put(path, b"hello world").await.unwrap();
        assert!(sink.exists(path).await.unwrap());

        let bytes = tokio::fs::read(dir.path().join(path)).await.unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn put_never_leaves_a_temp_file_behind() {
        let dir = tempdir();
        let sink = LocalSink::new(dir.path());
        let path = "companies/AAPL/10-K/2023/annual/llm.txt";
        sink.put(path, b"data").await.unwrap();

        let parent = dir.path().join("companies/AAPL/10-K/2023/annual");
        let mut entries = tokio::fs::read_dir(&parent).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().to_string());
        }
        assert_eq!(names, vec!["llm.txt".to_string()]);
    }

    #[tokio::test]
    async fn record_metadata_upserts_rather_than_overwrites() {
        let dir = tempdir();
        let sink = LocalSink::new(dir.path());
        let filing_id = "MSFT-10-Q-2024-Q1";

        let mut first = HashMap::new();
        first.insert("fiscal_year".to_string(), "2024".to_string());
        sink.record_metadata(filing_id, first).await.unwrap();

        let mut second = HashMap::new();
        second.insert("source".to_string(), "registry".to_string());
        sink.record_metadata(filing_id, second).await.unwrap();

        let guard = sink.metadata.lock().unwrap();
        let stored = guard.get(filing_id).unwrap();
        assert_eq!(stored.get("fiscal_year").map(String::as_str), Some("2024"));
        assert_eq!(stored.get("source").map(String::as_str), Some("registry"));
    }

    struct TempDir(PathBuf);
    impl TempDir {
        fn path(&self) -> &Path {
            &self.0
        }
    }
    impl Drop for TempDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    fn tempdir() -> TempDir {
        let unique = fastrand::u64(..);
        let dir = std::env::temp_dir().join(format!("edgar-ingest-sink-test-{unique}"));
        std::fs::create_dir_all(&dir).unwrap();
        TempDir(dir)
    }
}
