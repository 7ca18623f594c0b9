use crate::preload::{Asset, Fetcher, Resource};
use crate::runtime::operation::spawn_operation;
use crate::runtime::Operation;
use anyhow::{Context as AnyhowContext, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;

/// Raw byte access for a resource location.
#[async_trait]
pub trait ByteSource: Send + Sync + Debug {
    async fn read(&self, location: &str) -> Result<Vec<u8>>;
}

/// Reads locations as paths relative to a base directory.
#[derive(Debug)]
pub struct FileSource {
    base_dir: PathBuf,
}

impl FileSource {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        let path = self.base_dir.join(location);
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read resource from {}", path.display()))
    }
}

#[derive(Debug)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ByteSource for HttpSource {
    async fn read(&self, location: &str) -> Result<Vec<u8>> {
        let response = self.client.get(location).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {} returned {}", location, status));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

/// Fetches resources on a tokio runtime: `http(s)://` URLs over HTTP,
/// anything else from disk.
#[derive(Debug)]
pub struct IoFetcher {
    handle: Handle,
    files: Arc<dyn ByteSource>,
    http: Arc<dyn ByteSource>,
}

impl IoFetcher {
    pub fn new(handle: Handle, base_dir: impl Into<PathBuf>) -> Self {
        Self::with_sources(handle, Arc::new(FileSource::new(base_dir)), Arc::new(HttpSource::new()))
    }

    pub fn with_sources(handle: Handle, files: Arc<dyn ByteSource>, http: Arc<dyn ByteSource>) -> Self {
        Self { handle, files, http }
    }
}

fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Fetcher for IoFetcher {
    fn fetch(&self, resource: &Resource) -> Box<dyn Operation<Asset>> {
        let source = if is_remote(&resource.url) {
            self.http.clone()
        } else {
            self.files.clone()
        };
        let url = resource.url.clone();
        let kind = resource.kind;
        Box::new(spawn_operation(&self.handle, async move {
            let bytes = source.read(&url).await?;
            Asset::decode(kind, bytes).with_context(|| format!("Failed to decode {}", url))
        }))
    }
}
