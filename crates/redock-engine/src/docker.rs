//! Docker engine implementation using bollard

use crate::{
    AttachStream, BuildConfig, ContainerEngine, ContainerId, ContainerInfo, ContainerStatus,
    EngineError, EngineInfo, EngineType, ImageId, Result, RunConfig,
};
use async_trait::async_trait;
use bollard::container::{
    AttachContainerOptions, Config, CreateContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::image::BuildImageOptions;
use bollard::Docker;
use futures::StreamExt;
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Docker engine using the bollard crate
///
/// Also serves Podman through its Docker-compatible API.
pub struct DockerEngine {
    client: Docker,
    engine_type: EngineType,
}

impl DockerEngine {
    /// Create a new Docker engine
    pub async fn new(socket_path: &str) -> Result<Self> {
        let client = if socket_path.starts_with("unix://") || socket_path.starts_with('/') {
            let path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::ConnectionError(e.to_string()))?
        } else if socket_path.starts_with("http://") || socket_path.starts_with("https://") {
            Docker::connect_with_http(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::ConnectionError(e.to_string()))?
        } else {
            // Assume it's a unix socket path
            Docker::connect_with_socket(socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| EngineError::ConnectionError(e.to_string()))?
        };

        // Test connection
        client
            .ping()
            .await
            .map_err(|e| EngineError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            engine_type: EngineType::Docker,
        })
    }

    /// Create a new engine for Podman (uses Docker-compatible API)
    pub async fn new_podman(socket_path: &str) -> Result<Self> {
        let mut engine = Self::new(socket_path).await?;
        engine.engine_type = EngineType::Podman;
        Ok(engine)
    }

    /// Get the underlying Docker client
    pub fn client(&self) -> &Docker {
        &self.client
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn build(&self, config: &BuildConfig) -> Result<ImageId> {
        // Create a tarball of the build context
        let tar_data = create_build_context(&config.context, &config.dockerfile)?;

        let options = BuildImageOptions {
            dockerfile: config.dockerfile.clone(),
            t: config.tag.clone(),
            buildargs: config.build_args.clone(),
            nocache: config.no_cache,
            pull: config.pull,
            labels: config.labels.clone(),
            ..Default::default()
        };

        let mut stream = self.client.build_image(options, None, Some(tar_data.into()));

        let mut image_id = None;
        while let Some(result) = stream.next().await {
            match result {
                Ok(output) => {
                    if let Some(error) = output.error {
                        return Err(EngineError::BuildError(error));
                    }
                    if let Some(aux) = output.aux {
                        if let Some(id) = aux.id {
                            image_id = Some(id);
                        }
                    }
                    if let Some(stream) = output.stream {
                        tracing::debug!("{}", stream.trim());
                    }
                }
                Err(e) => return Err(EngineError::BuildError(e.to_string())),
            }
        }

        image_id
            .map(ImageId::new)
            .ok_or_else(|| EngineError::BuildError("No image ID returned".to_string()))
    }

    async fn list(&self, name_filter: Option<&str>, all: bool) -> Result<Vec<ContainerInfo>> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some(name) = name_filter {
            filters.insert("name".to_string(), vec![name.to_string()]);
        }

        let options = ListContainersOptions {
            all,
            filters,
            ..Default::default()
        };

        let containers = self.client.list_containers(Some(options)).await?;

        Ok(containers
            .into_iter()
            .map(|c| ContainerInfo {
                id: ContainerId::new(c.id.unwrap_or_default()),
                name: c
                    .names
                    .and_then(|n| n.first().cloned())
                    .unwrap_or_default()
                    .trim_start_matches('/')
                    .to_string(),
                image: c.image.unwrap_or_default(),
                status: c
                    .state
                    .as_deref()
                    .map(ContainerStatus::from)
                    .unwrap_or(ContainerStatus::Unknown),
                created: c.created.unwrap_or(0),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()> {
        let options = StopContainerOptions {
            t: timeout.unwrap_or(10) as i64,
        };
        self.client.stop_container(&id.0, Some(options)).await?;
        Ok(())
    }

    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.client.remove_container(&id.0, Some(options)).await?;
        Ok(())
    }

    async fn run(&self, config: &RunConfig) -> Result<ContainerId> {
        let options = Some(CreateContainerOptions {
            name: config.name.as_str(),
            platform: None,
        });

        let env: Vec<String> = config
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let container_config = Config {
            image: Some(config.image.clone()),
            cmd: config.cmd.clone(),
            env: if env.is_empty() { None } else { Some(env) },
            tty: Some(config.tty),
            open_stdin: Some(config.stdin_open),
            labels: if config.labels.is_empty() {
                None
            } else {
                Some(config.labels.clone())
            },
            ..Default::default()
        };

        let response = self
            .client
            .create_container(options, container_config)
            .await?;

        let id = ContainerId::new(response.id);

        self.client
            .start_container(&id.0, None::<StartContainerOptions<String>>)
            .await?;

        Ok(id)
    }

    async fn attach(&self, id: &ContainerId) -> Result<AttachStream> {
        let options = AttachContainerOptions::<String> {
            stdin: Some(true),
            stdout: Some(true),
            stderr: Some(true),
            stream: Some(true),
            logs: Some(false),
            detach_keys: None,
        };

        let results = self
            .client
            .attach_container(&id.0, Some(options))
            .await
            .map_err(|e| EngineError::AttachError(e.to_string()))?;

        let reader = LogOutputReader::new(results.output);

        Ok(AttachStream {
            input: Some(results.input),
            output: Box::pin(reader),
        })
    }

    async fn ping(&self) -> Result<()> {
        self.client
            .ping()
            .await
            .map_err(|e| EngineError::ConnectionError(e.to_string()))?;
        Ok(())
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            engine_type: self.engine_type,
            api_version: bollard::API_DEFAULT_VERSION.to_string(),
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Create a tar archive from the build context
fn create_build_context(context: &Path, dockerfile: &str) -> Result<Vec<u8>> {
    use std::io::Cursor;
    use tar::Builder;

    let dockerfile_path = context.join(dockerfile);
    if !dockerfile_path.is_file() {
        return Err(EngineError::BuildError(format!(
            "Build definition '{}' not found in context {:?}",
            dockerfile, context
        )));
    }

    let mut tar_data = Vec::new();
    {
        let cursor = Cursor::new(&mut tar_data);
        let mut builder = Builder::new(cursor);

        add_dir_to_tar(&mut builder, context, Path::new(""))?;

        builder.finish().map_err(EngineError::IoError)?;
    }

    Ok(tar_data)
}

/// Recursively add directory contents to tar
fn add_dir_to_tar<W: Write>(
    builder: &mut tar::Builder<W>,
    base: &Path,
    prefix: &Path,
) -> Result<()> {
    let entries = std::fs::read_dir(base).map_err(EngineError::IoError)?;

    for entry in entries {
        let entry = entry.map_err(EngineError::IoError)?;
        let path = entry.path();
        let name = prefix.join(entry.file_name());

        // Skip common excludes
        let file_name = entry.file_name();
        let file_name_str = file_name.to_string_lossy();
        if file_name_str == ".git"
            || file_name_str == "node_modules"
            || file_name_str == "target"
            || file_name_str == ".dockerignore"
        {
            continue;
        }

        if path.is_dir() {
            add_dir_to_tar(builder, &path, &name)?;
        } else if path.is_file() {
            builder
                .append_path_with_name(&path, &name)
                .map_err(EngineError::IoError)?;
        }
    }

    Ok(())
}

/// Reader that converts the attach output stream to AsyncRead
struct LogOutputReader<S> {
    stream: S,
    buffer: Vec<u8>,
    pos: usize,
}

impl<S> LogOutputReader<S> {
    fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: Vec::new(),
            pos: 0,
        }
    }
}

impl<S> AsyncRead for LogOutputReader<S>
where
    S: futures::Stream<
            Item = std::result::Result<bollard::container::LogOutput, bollard::errors::Error>,
        > + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        // If we have buffered data, return it first
        if self.pos < self.buffer.len() {
            let remaining = &self.buffer[self.pos..];
            let to_copy = std::cmp::min(remaining.len(), buf.remaining());
            buf.put_slice(&remaining[..to_copy]);
            self.pos += to_copy;
            return std::task::Poll::Ready(Ok(()));
        }

        // Clear buffer and try to get more data
        self.buffer.clear();
        self.pos = 0;

        match Pin::new(&mut self.stream).poll_next(cx) {
            std::task::Poll::Ready(Some(Ok(output))) => {
                let data = match output {
                    bollard::container::LogOutput::StdOut { message } => message,
                    bollard::container::LogOutput::StdErr { message } => message,
                    bollard::container::LogOutput::StdIn { message } => message,
                    bollard::container::LogOutput::Console { message } => message,
                };
                self.buffer = data.to_vec();

                let to_copy = std::cmp::min(self.buffer.len(), buf.remaining());
                buf.put_slice(&self.buffer[..to_copy]);
                self.pos = to_copy;
                std::task::Poll::Ready(Ok(()))
            }
            std::task::Poll::Ready(Some(Err(e))) => std::task::Poll::Ready(Err(
                std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
            )),
            std::task::Poll::Ready(None) => std::task::Poll::Ready(Ok(())),
            std::task::Poll::Pending => std::task::Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_context_requires_dockerfile() {
        let tmp = tempfile::tempdir().unwrap();
        let err = create_build_context(tmp.path(), "Dockerfile").unwrap_err();
        assert!(matches!(err, EngineError::BuildError(_)));
    }

    #[test]
    fn test_build_context_packs_files() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
        std::fs::write(tmp.path().join("app.py"), "print('hi')\n").unwrap();

        let tar_data = create_build_context(tmp.path(), "Dockerfile").unwrap();

        let mut archive = tar::Archive::new(std::io::Cursor::new(tar_data));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"Dockerfile".to_string()));
        assert!(names.contains(&"app.py".to_string()));
    }
}
