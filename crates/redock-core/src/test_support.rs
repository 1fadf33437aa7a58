//! Test support utilities for redock-core
//!
//! Provides FakeEngine and helpers for unit testing the LifecycleManager
//! without requiring a real Docker/Podman runtime. The fake keeps an
//! in-memory image/container namespace so tests can assert on the end
//! state the converge sequence leaves behind.

use async_trait::async_trait;
use redock_engine::*;
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;

/// Records which methods were called on the fake
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    Build { tag: String },
    List { name_filter: Option<String>, all: bool },
    Stop { id: String },
    Remove { id: String, force: bool },
    Run { image: String, name: String },
    Attach { id: String },
    Ping,
}

/// A container held by the fake engine
#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: ContainerId,
    pub name: String,
    pub image: String,
    pub status: ContainerStatus,
    pub labels: HashMap<String, String>,
}

/// Configurable in-memory container engine for testing
pub struct FakeEngine {
    pub engine_type: EngineType,
    pub calls: Arc<Mutex<Vec<FakeCall>>>,
    /// Containers keyed by name (the runtime namespace is name-unique)
    pub containers: Arc<Mutex<HashMap<String, FakeContainer>>>,
    /// Tags of images that have been built
    pub images: Arc<Mutex<HashSet<String>>>,
    /// If set, build calls fail with this error
    pub build_error: Arc<Mutex<Option<EngineError>>>,
    /// If set, run calls fail with this error
    pub run_error: Arc<Mutex<Option<EngineError>>>,
    /// If set, stop calls fail with this error
    pub stop_error: Arc<Mutex<Option<EngineError>>>,
    /// If set, remove calls fail with this error
    pub remove_error: Arc<Mutex<Option<EngineError>>>,
    /// If set, list calls fail with this error
    pub list_error: Arc<Mutex<Option<EngineError>>>,
    /// If set, attach calls fail with this error
    pub attach_error: Arc<Mutex<Option<EngineError>>>,
    next_id: Arc<Mutex<u64>>,
}

impl FakeEngine {
    /// Create a new fake engine with an empty namespace
    pub fn new() -> Self {
        Self {
            engine_type: EngineType::Docker,
            calls: Arc::new(Mutex::new(Vec::new())),
            containers: Arc::new(Mutex::new(HashMap::new())),
            images: Arc::new(Mutex::new(HashSet::new())),
            build_error: Arc::new(Mutex::new(None)),
            run_error: Arc::new(Mutex::new(None)),
            stop_error: Arc::new(Mutex::new(None)),
            remove_error: Arc::new(Mutex::new(None)),
            list_error: Arc::new(Mutex::new(None)),
            attach_error: Arc::new(Mutex::new(None)),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    /// Pre-register a built image
    pub fn with_image(self, tag: &str) -> Self {
        self.images.lock().unwrap().insert(tag.to_string());
        self
    }

    /// Pre-populate a container in the namespace
    pub fn with_container(self, name: &str, image: &str, status: ContainerStatus) -> Self {
        let id = self.alloc_id();
        self.containers.lock().unwrap().insert(
            name.to_string(),
            FakeContainer {
                id,
                name: name.to_string(),
                image: image.to_string(),
                status,
                labels: HashMap::new(),
            },
        );
        self
    }

    fn alloc_id(&self) -> ContainerId {
        let mut next = self.next_id.lock().unwrap();
        let id = ContainerId::new(format!("fake-container-{:04}", *next));
        *next += 1;
        id
    }

    fn record(&self, call: FakeCall) {
        self.calls.lock().unwrap().push(call);
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Get the container currently registered under a name, if any
    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.containers.lock().unwrap().get(name).cloned()
    }

    /// Number of containers in the namespace
    pub fn container_count(&self) -> usize {
        self.containers.lock().unwrap().len()
    }
}

impl Default for FakeEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Take a configured error out of a slot, if present
fn take_error(slot: &Arc<Mutex<Option<EngineError>>>) -> Option<EngineError> {
    slot.lock().unwrap().take()
}

fn info_for(c: &FakeContainer) -> ContainerInfo {
    ContainerInfo {
        id: c.id.clone(),
        name: c.name.clone(),
        image: c.image.clone(),
        status: c.status,
        created: 0,
        labels: c.labels.clone(),
    }
}

/// A no-op async reader for fake attach streams
struct EmptyReader;

impl AsyncRead for EmptyReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        _buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::task::Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn build(&self, config: &BuildConfig) -> Result<ImageId> {
        self.record(FakeCall::Build {
            tag: config.tag.clone(),
        });
        if let Some(err) = take_error(&self.build_error) {
            return Err(err);
        }
        self.images.lock().unwrap().insert(config.tag.clone());
        Ok(ImageId::new(format!("sha256:fake-{}", config.tag)))
    }

    async fn list(&self, name_filter: Option<&str>, all: bool) -> Result<Vec<ContainerInfo>> {
        self.record(FakeCall::List {
            name_filter: name_filter.map(|s| s.to_string()),
            all,
        });
        if let Some(err) = take_error(&self.list_error) {
            return Err(err);
        }
        let containers = self.containers.lock().unwrap();
        Ok(containers
            .values()
            .filter(|c| name_filter.map(|f| c.name.contains(f)).unwrap_or(true))
            .filter(|c| all || c.status.is_running())
            .map(info_for)
            .collect())
    }

    async fn stop(&self, id: &ContainerId, _timeout: Option<u32>) -> Result<()> {
        self.record(FakeCall::Stop { id: id.0.clone() });
        if let Some(err) = take_error(&self.stop_error) {
            return Err(err);
        }
        let mut containers = self.containers.lock().unwrap();
        match containers.values_mut().find(|c| &c.id == id) {
            Some(c) => {
                // Stopping an already-stopped container is a no-op engine-side
                c.status = ContainerStatus::Exited;
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound(id.0.clone())),
        }
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        self.record(FakeCall::Remove {
            id: id.0.clone(),
            force,
        });
        if let Some(err) = take_error(&self.remove_error) {
            return Err(err);
        }
        let mut containers = self.containers.lock().unwrap();
        let name = containers
            .values()
            .find(|c| &c.id == id)
            .map(|c| c.name.clone());
        match name {
            Some(name) => {
                containers.remove(&name);
                Ok(())
            }
            None => Err(EngineError::ContainerNotFound(id.0.clone())),
        }
    }

    async fn run(&self, config: &RunConfig) -> Result<ContainerId> {
        self.record(FakeCall::Run {
            image: config.image.clone(),
            name: config.name.clone(),
        });
        if let Some(err) = take_error(&self.run_error) {
            return Err(err);
        }
        if !self.images.lock().unwrap().contains(&config.image) {
            return Err(EngineError::ImageNotFound(config.image.clone()));
        }
        let mut containers = self.containers.lock().unwrap();
        if containers.contains_key(&config.name) {
            return Err(EngineError::RuntimeError(format!(
                "container name '{}' is already in use",
                config.name
            )));
        }
        let id = self.alloc_id();
        containers.insert(
            config.name.clone(),
            FakeContainer {
                id: id.clone(),
                name: config.name.clone(),
                image: config.image.clone(),
                status: ContainerStatus::Running,
                labels: config.labels.clone(),
            },
        );
        Ok(id)
    }

    async fn attach(&self, id: &ContainerId) -> Result<AttachStream> {
        self.record(FakeCall::Attach { id: id.0.clone() });
        if let Some(err) = take_error(&self.attach_error) {
            return Err(err);
        }
        let containers = self.containers.lock().unwrap();
        if !containers.values().any(|c| &c.id == id) {
            return Err(EngineError::ContainerNotFound(id.0.clone()));
        }
        Ok(AttachStream {
            input: None,
            output: Box::pin(EmptyReader),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.record(FakeCall::Ping);
        Ok(())
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            engine_type: self.engine_type,
            api_version: "fake".to_string(),
            os: "test".to_string(),
            arch: "test".to_string(),
        }
    }
}
