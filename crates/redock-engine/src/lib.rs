//! Container engine trait and implementations for redock
//!
//! This crate provides an abstraction over container runtimes (Docker, Podman)
//! with the small set of operations the converge sequence needs.

mod docker;
mod error;
mod types;

pub use docker::DockerEngine;
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite};

/// Trait for container engines (Docker, Podman, etc.)
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Build an image from a build context
    async fn build(&self, config: &BuildConfig) -> Result<ImageId>;

    /// List containers, optionally filtered by name
    ///
    /// The name filter is a substring match on the engine side; callers that
    /// need exact-name identity must compare the returned names themselves.
    async fn list(&self, name_filter: Option<&str>, all: bool) -> Result<Vec<ContainerInfo>>;

    /// Stop a container
    async fn stop(&self, id: &ContainerId, timeout: Option<u32>) -> Result<()>;

    /// Remove a container
    async fn remove(&self, id: &ContainerId, force: bool) -> Result<()>;

    /// Create and start a detached container
    async fn run(&self, config: &RunConfig) -> Result<ContainerId>;

    /// Attach to the primary process of a running container
    async fn attach(&self, id: &ContainerId) -> Result<AttachStream>;

    /// Check if the engine is available/connected
    async fn ping(&self) -> Result<()>;

    /// Get engine information
    fn info(&self) -> EngineInfo;
}

/// Interactive attach stream with stdin/stdout
pub struct AttachStream {
    pub input: Option<Pin<Box<dyn AsyncWrite + Send>>>,
    pub output: Pin<Box<dyn AsyncRead + Send>>,
}

/// Factory function to create an engine based on type
pub async fn create_engine(
    engine_type: EngineType,
    config: &redock_config::GlobalConfig,
) -> Result<Box<dyn ContainerEngine>> {
    match engine_type {
        EngineType::Docker => {
            let socket = &config.engines.docker.socket;
            let engine = DockerEngine::new(socket).await?;
            Ok(Box::new(engine))
        }
        EngineType::Podman => {
            // Podman uses the Docker-compatible API
            let socket = &config.engines.podman.socket;
            let engine = DockerEngine::new_podman(socket).await?;
            Ok(Box::new(engine))
        }
    }
}

/// Test if a specific engine is available and responsive
/// Returns Ok(true) if connected, Ok(false) if not available
pub async fn test_engine_connectivity(
    engine_type: EngineType,
    config: &redock_config::GlobalConfig,
) -> bool {
    match create_engine(engine_type, config).await {
        Ok(engine) => engine.ping().await.is_ok(),
        Err(_) => false,
    }
}

/// Detect which engines are available on the system
/// Returns a list of (EngineType, is_available) pairs, Docker first
pub async fn detect_available_engines(
    config: &redock_config::GlobalConfig,
) -> Vec<(EngineType, bool)> {
    let (docker_ok, podman_ok) = tokio::join!(
        test_engine_connectivity(EngineType::Docker, config),
        test_engine_connectivity(EngineType::Podman, config)
    );

    vec![
        (EngineType::Docker, docker_ok),
        (EngineType::Podman, podman_ok),
    ]
}

/// Create the default engine based on global config
/// If no engine is configured (empty), auto-detects by trying Docker first, then Podman
pub async fn create_default_engine(
    config: &redock_config::GlobalConfig,
) -> Result<Box<dyn ContainerEngine>> {
    let engine_type = match config.defaults.engine.as_str() {
        "podman" => EngineType::Podman,
        "docker" => EngineType::Docker,
        "" => {
            tracing::info!("No engine configured, auto-detecting...");
            let available = detect_available_engines(config).await;

            let detected = available.iter().find(|(_, available)| *available);

            match detected {
                Some((engine_type, _)) => {
                    tracing::info!("Auto-detected engine: {}", engine_type);
                    *engine_type
                }
                None => {
                    // Neither available, default to Docker for better error messages
                    tracing::warn!("No engines detected, defaulting to Docker");
                    EngineType::Docker
                }
            }
        }
        other => {
            return Err(EngineError::ConnectionError(format!(
                "Unknown engine '{}' in config (expected 'docker' or 'podman')",
                other
            )))
        }
    };

    let socket_path = match engine_type {
        EngineType::Podman => &config.engines.podman.socket,
        EngineType::Docker => &config.engines.docker.socket,
    };

    match create_engine(engine_type, config).await {
        Ok(engine) => Ok(engine),
        Err(e) => {
            let socket_exists = std::path::Path::new(socket_path).exists();
            Err(EngineError::ConnectionError(format_connection_error(
                engine_type,
                socket_path,
                socket_exists,
                &e,
            )))
        }
    }
}

/// Explain a failed engine connection, including how to get a socket back
fn format_connection_error(
    engine: EngineType,
    socket_path: &str,
    socket_exists: bool,
    underlying: &EngineError,
) -> String {
    if !socket_exists {
        let start_hint = match engine {
            EngineType::Docker => "sudo systemctl start docker",
            EngineType::Podman => "systemctl --user enable --now podman.socket",
        };
        format!(
            "{} is not reachable: no API socket at {}.\n\
             Either start the daemon (`{}`), or point redock at the right\n\
             socket with `redock config --edit` ([engines.{}], socket = \"...\").",
            engine, socket_path, start_hint, engine
        )
    } else {
        format!(
            "The {} socket at {} exists but the daemon did not answer: {}",
            engine, socket_path, underlying
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_type_parsing() {
        assert_eq!("docker".parse::<EngineType>().unwrap(), EngineType::Docker);
        assert_eq!("Podman".parse::<EngineType>().unwrap(), EngineType::Podman);
        assert!("containerd".parse::<EngineType>().is_err());
    }

    #[test]
    fn test_connection_error_mentions_socket() {
        let msg = format_connection_error(
            EngineType::Docker,
            "/var/run/docker.sock",
            false,
            &EngineError::ConnectionError("refused".to_string()),
        );
        assert!(msg.contains("/var/run/docker.sock"));
        assert!(msg.contains("systemctl"));
        assert!(msg.contains("redock config --edit"));
    }

    #[test]
    fn test_container_status_roundtrip() {
        assert_eq!(ContainerStatus::from("running"), ContainerStatus::Running);
        assert_eq!(ContainerStatus::from("EXITED"), ContainerStatus::Exited);
        assert_eq!(ContainerStatus::from("weird"), ContainerStatus::Unknown);
        assert!(ContainerStatus::Running.is_running());
        assert!(!ContainerStatus::Exited.is_running());
    }
}
