//! Object containers.
//!
//! A container hands out objects by path and plain JSON documents
//! (manifests, menu indexes). A missing object is `Ok(None)`; `Err` is kept
//! for transport and decoding failures so callers can log them, but both end
//! up as "not found" on the page.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use url::Url;

use crate::error::{DashboardError, Result};
use crate::object::{parse_folder_listing, RemoteObject};

#[async_trait]
pub trait ObjectSource: Send + Sync {
    /// Short name used in log records.
    fn label(&self) -> &str;
    async fn fetch(&self, path: &str) -> Result<Option<RemoteObject>>;
    async fn fetch_document(&self, path: &str) -> Result<Option<Value>>;
    /// Names of the objects directly under `dir`.
    async fn list(&self, dir: &str) -> Result<Option<Vec<String>>>;
}

// =============================================================================
// HTTP (monitoring server)
// =============================================================================

/// Monitoring HTTP server: objects at `<base>/<prefix><path>/root.json`,
/// documents at `<base>/<path>`.
pub struct HttpObjectSource {
    label: String,
    client: Client,
    base: Url,
    object_prefix: String,
    timeout: Duration,
}

/// Per-request limit when none is configured.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

impl HttpObjectSource {
    pub fn new(label: &str, base: &str, object_prefix: &str) -> Result<Self> {
        Self::with_timeout(label, base, object_prefix, DEFAULT_FETCH_TIMEOUT)
    }

    /// A request that takes longer than `timeout` fails with `Fetch`, so a
    /// server that accepts but never answers cannot pile up passes.
    pub fn with_timeout(
        label: &str,
        base: &str,
        object_prefix: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base = base.to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| DashboardError::Config(format!("bad base url '{}': {}", base, e)))?;
        let mut object_prefix = object_prefix.trim_matches('/').to_string();
        if !object_prefix.is_empty() {
            object_prefix.push('/');
        }
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| DashboardError::Config(format!("http client: {}", e)))?;
        Ok(Self {
            label: label.to_string(),
            client,
            base,
            object_prefix,
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn object_url(&self, path: &str) -> Result<Url> {
        let rel = format!("{}{}/root.json", self.object_prefix, path.trim_matches('/'));
        self.base.join(&rel).map_err(|e| DashboardError::fetch(path, e))
    }

    pub fn document_url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| DashboardError::fetch(path, e))
    }

    async fn get_json(&self, url: Url, path: &str) -> Result<Option<Value>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DashboardError::fetch(path, e))?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(DashboardError::fetch(path, format!("http status {}", resp.status())));
        }
        let value: Value = resp
            .json()
            .await
            .map_err(|e| DashboardError::parse(path, e.to_string()))?;
        Ok(if value.is_null() { None } else { Some(value) })
    }
}

#[async_trait]
impl ObjectSource for HttpObjectSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, path: &str) -> Result<Option<RemoteObject>> {
        let url = self.object_url(path)?;
        match self.get_json(url, path).await? {
            Some(v) => RemoteObject::from_json(&v).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_document(&self, path: &str) -> Result<Option<Value>> {
        let url = self.document_url(path)?;
        self.get_json(url, path).await
    }

    async fn list(&self, dir: &str) -> Result<Option<Vec<String>>> {
        let url = self.object_url(dir)?;
        match self.get_json(url, dir).await? {
            Some(v) => parse_folder_listing(&v).map(Some),
            None => Ok(None),
        }
    }
}

// =============================================================================
// Directory (archived run exported as JSON files)
// =============================================================================

/// Archived container on disk: object `DIR/name` lives in `<root>/DIR/name.json`.
pub struct DirObjectSource {
    label: String,
    root: PathBuf,
}

impl DirObjectSource {
    pub fn new(label: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.to_string(),
            root: root.into(),
        }
    }

    fn object_file(&self, path: &str) -> PathBuf {
        self.root.join(format!("{}.json", path.trim_matches('/')))
    }

    async fn read_json(&self, file: PathBuf, path: &str) -> Result<Option<Value>> {
        let text = match tokio::fs::read_to_string(&file).await {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DashboardError::fetch(path, e)),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DashboardError::parse(path, e.to_string()))
    }
}

#[async_trait]
impl ObjectSource for DirObjectSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, path: &str) -> Result<Option<RemoteObject>> {
        match self.read_json(self.object_file(path), path).await? {
            Some(v) => RemoteObject::from_json(&v).map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_document(&self, path: &str) -> Result<Option<Value>> {
        let file = self.root.join(path.trim_start_matches('/'));
        self.read_json(file, path).await
    }

    async fn list(&self, dir: &str) -> Result<Option<Vec<String>>> {
        let dir_path = self.root.join(dir.trim_matches('/'));
        let mut rd = match tokio::fs::read_dir(&dir_path).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DashboardError::fetch(dir, e)),
        };
        let mut names = Vec::new();
        while let Some(item) = rd.next_entry().await.map_err(|e| DashboardError::fetch(dir, e))? {
            let file_name = item.file_name();
            let file_name = file_name.to_string_lossy();
            if let Some(stem) = file_name.strip_suffix(".json") {
                names.push(stem.to_string());
            }
        }
        // read_dir order is platform dependent
        names.sort();
        Ok(Some(names))
    }
}

// =============================================================================
// In-memory
// =============================================================================

#[derive(Default)]
pub struct MemoryObjectSource {
    label: String,
    objects: Mutex<HashMap<String, RemoteObject>>,
    documents: Mutex<HashMap<String, Value>>,
}

impl MemoryObjectSource {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn insert(&self, path: &str, object: RemoteObject) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(path.to_string(), object);
        }
    }

    pub fn remove(&self, path: &str) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.remove(path);
        }
    }

    pub fn insert_document(&self, path: &str, doc: Value) {
        if let Ok(mut documents) = self.documents.lock() {
            documents.insert(path.to_string(), doc);
        }
    }
}

#[async_trait]
impl ObjectSource for MemoryObjectSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn fetch(&self, path: &str) -> Result<Option<RemoteObject>> {
        Ok(self.objects.lock().ok().and_then(|o| o.get(path).cloned()))
    }

    async fn fetch_document(&self, path: &str) -> Result<Option<Value>> {
        Ok(self.documents.lock().ok().and_then(|d| d.get(path).cloned()))
    }

    async fn list(&self, dir: &str) -> Result<Option<Vec<String>>> {
        let prefix = format!("{}/", dir.trim_matches('/'));
        let Ok(objects) = self.objects.lock() else {
            return Ok(None);
        };
        let mut names: Vec<String> = objects
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter(|rest| !rest.contains('/'))
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            return Ok(None);
        }
        names.sort();
        Ok(Some(names))
    }
}
