//! Persistence collaborator: append-only inference records.
//!
//! `JsonlStore` appends one JSON object per line; `MemoryStore` keeps a capped
//! in-process history. Append failures are reported, never escalated.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;

use crate::record::InferenceRecord;

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn append(&self, record: &InferenceRecord) -> Result<()>;
    /// Records for `user_id`, oldest first.
    async fn for_user(&self, user_id: &str) -> Result<Vec<InferenceRecord>>;
}

#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<Vec<InferenceRecord>>,
    cap: usize,
}

impl MemoryStore {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|v| v.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryStore {
    async fn append(&self, record: &InferenceRecord) -> Result<()> {
        let mut v = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("record store mutex poisoned"))?;
        v.push(record.clone());
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
        Ok(())
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<InferenceRecord>> {
        let v = self
            .inner
            .lock()
            .map_err(|_| anyhow::anyhow!("record store mutex poisoned"))?;
        Ok(v.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }
}

#[derive(Debug)]
pub struct JsonlStore {
    path: PathBuf,
    // Serializes appends so concurrent lines never interleave.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonlStore {
    async fn append(&self, record: &InferenceRecord) -> Result<()> {
        let mut line = serde_json::to_string(record).context("serialize record")?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let mut f = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("opening {}", self.path.display()))?;
        f.write_all(line.as_bytes()).await.context("append record")?;
        f.flush().await.context("flush record")?;
        Ok(())
    }

    async fn for_user(&self, user_id: &str) -> Result<Vec<InferenceRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading {}", self.path.display()))
            }
        };
        let mut out = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<InferenceRecord>(line) {
                Ok(r) if r.user_id == user_id => out.push(r),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(target: "persist", line = n + 1, error = %e, "skipping unreadable record")
                }
            }
        }
        Ok(out)
    }
}
