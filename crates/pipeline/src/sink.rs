//! Blob sinks for exported artifacts.
//!
//! A sink only has to store a named blob of bytes. Writing the same name
//! twice replaces the previous content. Transports live behind [`BlobSink`]
//! so the exporter never depends on a concrete backend.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::errors::SinkError;

/// Trait for artifact storage backends.
#[async_trait]
pub trait BlobSink: Send + Sync {
    /// Short transport label for logs.
    fn kind(&self) -> &'static str;

    /// Store `bytes` under `name`, replacing any previous blob.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError>;
}

/// Names are relative, `/`-separated and must not escape the sink root.
fn validate_name(name: &str) -> Result<(), SinkError> {
    let path = Path::new(name);
    let valid = !name.is_empty()
        && !name.ends_with('/')
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(SinkError::InvalidName(name.to_string()))
    }
}

/// Local filesystem sink rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

#[async_trait]
impl BlobSink for FsSink {
    fn kind(&self) -> &'static str {
        "fs"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError> {
        validate_name(name)?;
        let path = self.path_for(name);
        let io_err = |source| SinkError::Io {
            name: name.to_string(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        // Write then rename so readers never observe a partial blob
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, bytes).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &path).await.map_err(io_err)?;

        debug!(path = %path.display(), bytes = bytes.len(), "Stored blob");
        Ok(())
    }
}

/// HTTP PUT sink for S3-compatible gateways that accept pre-authorized PUTs.
#[derive(Debug, Clone)]
pub struct HttpSink {
    endpoint: url::Url,
    client: reqwest::Client,
}

impl HttpSink {
    pub fn new(endpoint: &str) -> Result<Self, SinkError> {
        let mut endpoint = url::Url::parse(endpoint).map_err(|e| SinkError::Rejected {
            name: endpoint.to_string(),
            reason: format!("invalid endpoint: {e}"),
        })?;
        // Ensure joins append rather than replace the last segment
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        Ok(Self {
            endpoint,
            client: reqwest::Client::new(),
        })
    }

    pub fn url_for(&self, name: &str) -> Result<url::Url, SinkError> {
        validate_name(name)?;
        self.endpoint
            .join(name)
            .map_err(|_| SinkError::InvalidName(name.to_string()))
    }
}

#[async_trait]
impl BlobSink for HttpSink {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError> {
        let url = self.url_for(name)?;
        let response = self
            .client
            .put(url.clone())
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| SinkError::Transport {
                name: name.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SinkError::Http {
                name: name.to_string(),
                status: status.as_u16(),
            });
        }

        debug!(%url, bytes = bytes.len(), "Uploaded blob");
        Ok(())
    }
}

/// In-memory sink with failure and latency injection.
#[derive(Clone, Default)]
pub struct MemorySink {
    inner: Arc<MemorySinkInner>,
}

#[derive(Default)]
struct MemorySinkInner {
    blobs: Mutex<BTreeMap<String, Vec<u8>>>,
    /// Remaining puts that fail before succeeding
    failures: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    attempts: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` puts.
    pub fn failing(count: usize) -> Self {
        let sink = Self::new();
        sink.inner.failures.store(count, Ordering::SeqCst);
        sink
    }

    /// Sleep before each put.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock() = Some(delay);
        self
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.blobs.lock().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.inner.blobs.lock().keys().cloned().collect()
    }

    /// Total puts attempted, including failed ones.
    pub fn attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobSink for MemorySink {
    fn kind(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<(), SinkError> {
        validate_name(name)?;
        self.inner.attempts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.inner.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let should_fail = self
            .inner
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(SinkError::Rejected {
                name: name.to_string(),
                reason: "injected failure".into(),
            });
        }

        self.inner
            .blobs
            .lock()
            .insert(name.to_string(), bytes.to_vec());
        Ok(())
    }
}
