pub mod fetch;
pub mod manifest;

use crate::runtime::{
    Awaitable, DriveStats, Operation, Resume, Step, TaskBody, TaskError, TaskHandle,
    TaskScheduler,
};
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Audio,
    Data,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Image => "image",
            ResourceKind::Audio => "audio",
            ResourceKind::Data => "data",
        };
        f.pad(s)
    }
}

/// A named resource to preload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub url: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl Resource {
    pub fn new(name: &str, url: &str, kind: ResourceKind) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
            kind,
        }
    }
}

/// A loaded resource. Images and audio are kept as raw encoded bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Asset {
    Image(Arc<[u8]>),
    Audio(Arc<[u8]>),
    Data(Value),
}

impl Asset {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Asset::Image(_) => ResourceKind::Image,
            Asset::Audio(_) => ResourceKind::Audio,
            Asset::Data(_) => ResourceKind::Data,
        }
    }

    /// Turn fetched bytes into an asset; data resources must be JSON.
    pub fn decode(kind: ResourceKind, bytes: Vec<u8>) -> Result<Asset> {
        match kind {
            ResourceKind::Image => Ok(Asset::Image(bytes.into())),
            ResourceKind::Audio => Ok(Asset::Audio(bytes.into())),
            ResourceKind::Data => {
                let value = serde_json::from_slice(&bytes)
                    .context("Failed to parse data resource as JSON")?;
                Ok(Asset::Data(value))
            }
        }
    }
}

/// Per-kind caches keyed by resource name.
#[derive(Debug, Default)]
pub struct AssetCache {
    images: HashMap<String, Arc<[u8]>>,
    audio: HashMap<String, Arc<[u8]>>,
    data: HashMap<String, Value>,
}

impl AssetCache {
    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<Asset> {
        match kind {
            ResourceKind::Image => self.images.get(name).cloned().map(Asset::Image),
            ResourceKind::Audio => self.audio.get(name).cloned().map(Asset::Audio),
            ResourceKind::Data => self.data.get(name).cloned().map(Asset::Data),
        }
    }

    pub fn insert(&mut self, name: &str, asset: Asset) {
        let name = name.to_string();
        match asset {
            Asset::Image(bytes) => {
                self.images.insert(name, bytes);
            }
            Asset::Audio(bytes) => {
                self.audio.insert(name, bytes);
            }
            Asset::Data(value) => {
                self.data.insert(name, value);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.images.len() + self.audio.len() + self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Source of fetch operations, one per resource.
pub trait Fetcher {
    fn fetch(&self, resource: &Resource) -> Box<dyn Operation<Asset>>;
}

// --- Load task ---

enum Stage {
    Start,
    Fetching,
    Finished,
}

/// Fetch one resource unless it is cached already, store it, count it.
struct LoadResource {
    resource: Resource,
    fetcher: Rc<dyn Fetcher>,
    cache: Rc<RefCell<AssetCache>>,
    loaded: Rc<Cell<usize>>,
    stage: Stage,
}

impl LoadResource {
    fn finish(&mut self, asset: Asset) -> Step<Asset> {
        self.stage = Stage::Finished;
        self.loaded.set(self.loaded.get() + 1);
        Step::Done(asset)
    }
}

impl TaskBody<Asset> for LoadResource {
    fn resume(&mut self, input: Resume<Asset>) -> Result<Step<Asset>, TaskError> {
        match self.stage {
            Stage::Start => {
                let cached = self.cache.borrow().get(self.resource.kind, &self.resource.name);
                if let Some(asset) = cached {
                    trace!(name = %self.resource.name, "resource already cached");
                    return Ok(self.finish(asset));
                }
                self.stage = Stage::Fetching;
                Ok(Step::Yield(Awaitable::Single(self.fetcher.fetch(&self.resource))))
            }
            Stage::Fetching => {
                let asset = input.into_required("fetched asset")?;
                if asset.kind() != self.resource.kind {
                    return Err(TaskError::fault(format!(
                        "{} fetched as {}, expected {}",
                        self.resource.name,
                        asset.kind(),
                        self.resource.kind
                    )));
                }
                self.cache.borrow_mut().insert(&self.resource.name, asset.clone());
                Ok(self.finish(asset))
            }
            Stage::Finished => Err(TaskError::fault("resource load resumed after finishing")),
        }
    }
}

// --- Preloader ---

/// Loads resources through its own scheduler and tracks progress.
///
/// A failed load leaves its resource out of the cache and never counts as
/// loaded, so `progress()` stays below 1.0. It is counted in `failed()`
/// instead, and `loading()` drops once every started load has settled.
pub struct Preloader {
    scheduler: TaskScheduler<Asset>,
    fetcher: Rc<dyn Fetcher>,
    cache: Rc<RefCell<AssetCache>>,
    loaded: Rc<Cell<usize>>,
    started: usize,
    in_flight: Vec<(String, TaskHandle<Asset>)>,
    failed: Vec<String>,
    loading: bool,
}

impl Preloader {
    pub fn new(fetcher: Rc<dyn Fetcher>) -> Self {
        Self {
            scheduler: TaskScheduler::new(),
            fetcher,
            cache: Rc::new(RefCell::new(AssetCache::default())),
            loaded: Rc::new(Cell::new(0)),
            started: 0,
            in_flight: Vec::new(),
            failed: Vec::new(),
            loading: false,
        }
    }

    pub fn load(&mut self, resource: Resource) -> TaskHandle<Asset> {
        debug!(name = %resource.name, kind = %resource.kind, url = %resource.url, "queueing resource");
        self.loading = true;
        self.started += 1;
        let name = resource.name.clone();
        let handle = self.scheduler.submit(LoadResource {
            resource,
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
            loaded: self.loaded.clone(),
            stage: Stage::Start,
        });
        self.in_flight.push((name, handle.clone()));
        handle
    }

    pub fn load_all(&mut self, resources: impl IntoIterator<Item = Resource>) {
        for resource in resources {
            self.load(resource);
        }
    }

    pub fn load_image(&mut self, name: &str, url: &str) -> TaskHandle<Asset> {
        self.load(Resource::new(name, url, ResourceKind::Image))
    }

    pub fn load_audio(&mut self, name: &str, url: &str) -> TaskHandle<Asset> {
        self.load(Resource::new(name, url, ResourceKind::Audio))
    }

    pub fn load_data(&mut self, name: &str, url: &str) -> TaskHandle<Asset> {
        self.load(Resource::new(name, url, ResourceKind::Data))
    }

    /// One preloader tick.
    pub fn update(&mut self) -> DriveStats {
        let stats = self.scheduler.drive();

        let failed = &mut self.failed;
        self.in_flight.retain(|(name, handle)| {
            if let Some(e) = handle.error() {
                warn!(name = %name, error = %e, "resource failed to load");
                failed.push(name.clone());
                return false;
            }
            !handle.is_finished()
        });

        if self.loading && (self.progress() >= 1.0 || self.is_settled()) {
            self.loading = false;
            info!(
                loaded = self.loaded(),
                failed = self.failed.len(),
                "preload finished"
            );
        }
        stats
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    /// Loaded over started; 1.0 when nothing was started.
    pub fn progress(&self) -> f64 {
        if self.started == 0 {
            return 1.0;
        }
        self.loaded() as f64 / self.started as f64
    }

    /// True once every started load either loaded or failed.
    pub fn is_settled(&self) -> bool {
        self.loaded() + self.failed.len() >= self.started
    }

    pub fn started(&self) -> usize {
        self.started
    }

    pub fn loaded(&self) -> usize {
        self.loaded.get()
    }

    pub fn failed(&self) -> &[String] {
        &self.failed
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn image(&self, name: &str) -> Option<Arc<[u8]>> {
        self.cache.borrow().images.get(name).cloned()
    }

    pub fn audio(&self, name: &str) -> Option<Arc<[u8]>> {
        self.cache.borrow().audio.get(name).cloned()
    }

    pub fn data(&self, name: &str) -> Option<Value> {
        self.cache.borrow().data.get(name).cloned()
    }

    pub fn get(&self, kind: ResourceKind, name: &str) -> Option<Asset> {
        self.cache.borrow().get(kind, name)
    }

    pub fn cached(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn clear_images(&mut self) {
        self.cache.borrow_mut().images.clear();
    }

    pub fn clear_audio(&mut self) {
        self.cache.borrow_mut().audio.clear();
    }

    pub fn clear_data(&mut self) {
        self.cache.borrow_mut().data.clear();
    }

    pub fn clear_all(&mut self) {
        self.clear_images();
        self.clear_audio();
        self.clear_data();
    }
}
