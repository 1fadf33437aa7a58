//! Lifecycle manager - drives the converge sequence
//!
//! Sequence: Build -> Stop -> Remove -> Run -> [Attach]. Stop and Remove
//! treat an absent container as success; Build and Run failures abort the
//! sequence immediately with the failing step. Nothing is rolled back: a
//! built image survives a failed Run, and re-invoking converge is safe
//! because every step is idempotent given the same inputs.

use crate::{LifecycleError, Result, Step};
use redock_config::GlobalConfig;
use redock_engine::{
    BuildConfig, ContainerEngine, ContainerId, ContainerInfo, EngineError, ImageId, RunConfig,
};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Label applied to every container created by redock
pub const MANAGED_LABEL: &str = "redock.managed";
/// Label recording the image name a container was converged onto
pub const IMAGE_LABEL: &str = "redock.image";

/// What a converge call should do
#[derive(Debug, Clone)]
pub struct ConvergeRequest {
    /// Image name (tag) to build
    pub image_name: String,
    /// Container name to (re)create from the image
    pub container_name: String,
    /// Directory containing the build definition
    pub build_context: PathBuf,
    /// Attach an interactive session after the container starts
    pub attach: bool,
    /// Allocate a TTY and keep stdin open on the new container, for callers
    /// that drive the attach session themselves
    pub tty: bool,
    /// Build without using the layer cache
    pub no_cache: bool,
}

impl ConvergeRequest {
    pub fn new(
        image_name: impl Into<String>,
        container_name: impl Into<String>,
        build_context: impl Into<PathBuf>,
    ) -> Self {
        Self {
            image_name: image_name.into(),
            container_name: container_name.into(),
            build_context: build_context.into(),
            attach: false,
            tty: false,
            no_cache: false,
        }
    }
}

/// IDs of the artifacts a successful converge produced
#[derive(Debug, Clone)]
pub struct ConvergeOutcome {
    pub image_id: ImageId,
    pub container_id: ContainerId,
}

/// Drives a named container to a fresh state from its build definition
pub struct LifecycleManager {
    engine: Box<dyn ContainerEngine>,
    config: GlobalConfig,
}

impl LifecycleManager {
    /// Create a manager with a specific global config
    pub fn with_config(engine: Box<dyn ContainerEngine>, config: GlobalConfig) -> Self {
        Self { engine, config }
    }

    /// Converge the container onto a freshly built image
    pub async fn converge(&self, request: &ConvergeRequest) -> Result<ConvergeOutcome> {
        self.converge_with_progress(request, None).await
    }

    /// Converge with step-by-step progress updates
    pub async fn converge_with_progress(
        &self,
        request: &ConvergeRequest,
        progress: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<ConvergeOutcome> {
        validate_request(request)?;

        // Build
        send_progress(
            progress,
            format!("Building image '{}'...", request.image_name),
        );
        let image_id = self.build_image(request).await?;
        tracing::info!("Built image '{}' ({})", request.image_name, image_id);

        // Resolve the prior container once; the name is the sole identity
        // key, so a container backed by a different image is still ours to
        // replace. The lookup opens the stop step: if the engine cannot
        // answer it, no stop was attempted and the failure is reported
        // against stop.
        let prior = self
            .find_container(&request.container_name)
            .await
            .map_err(|source| LifecycleError::EngineUnavailable {
                step: Step::Stop,
                source,
            })?;

        match prior {
            Some(ref info) => {
                if info.image != request.image_name {
                    tracing::info!(
                        "Container '{}' currently backed by '{}', replacing with '{}'",
                        info.name,
                        info.image,
                        request.image_name
                    );
                }
                self.stop_prior(info, progress).await?;
                self.remove_prior(info, progress).await?;
            }
            None => {
                tracing::debug!(
                    "No prior container named '{}', skipping stop/remove",
                    request.container_name
                );
            }
        }

        // Run
        send_progress(
            progress,
            format!("Starting container '{}'...", request.container_name),
        );
        let container_id = self.run_container(request).await?;
        tracing::info!(
            "Container '{}' running ({})",
            request.container_name,
            container_id.short()
        );

        // Attach - never fails the converge and never rolls back steps 1-4
        if request.attach {
            send_progress(
                progress,
                format!("Attaching to '{}'...", request.container_name),
            );
            if let Err(e) = self.attach(&container_id).await {
                tracing::warn!(
                    "Attach to '{}' failed (container left running): {}",
                    request.container_name,
                    e
                );
            }
        }

        Ok(ConvergeOutcome {
            image_id,
            container_id,
        })
    }

    async fn build_image(&self, request: &ConvergeRequest) -> Result<ImageId> {
        let build = BuildConfig {
            context: request.build_context.clone(),
            dockerfile: self.config.defaults.dockerfile.clone(),
            tag: request.image_name.clone(),
            build_args: HashMap::new(),
            labels: HashMap::from([(MANAGED_LABEL.to_string(), "true".to_string())]),
            no_cache: request.no_cache,
            pull: false,
        };

        self.engine.build(&build).await.map_err(|source| match source {
            EngineError::ConnectionError(_) => LifecycleError::EngineUnavailable {
                step: Step::Build,
                source,
            },
            source => LifecycleError::Build { source },
        })
    }

    /// Look up a container by exact name (the engine filter is a substring match)
    async fn find_container(
        &self,
        name: &str,
    ) -> std::result::Result<Option<ContainerInfo>, EngineError> {
        let containers = self.engine.list(Some(name), true).await?;
        Ok(containers.into_iter().find(|c| c.name == name))
    }

    async fn stop_prior(
        &self,
        info: &ContainerInfo,
        progress: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<()> {
        if !info.status.is_running() {
            tracing::debug!(
                "Container '{}' is {}, skipping stop",
                info.name,
                info.status
            );
            return Ok(());
        }

        send_progress(progress, format!("Stopping container '{}'...", info.name));
        match self
            .engine
            .stop(&info.id, Some(self.config.defaults.stop_timeout))
            .await
        {
            Ok(()) => Ok(()),
            // Absence is success: something else removed it between list and stop
            Err(EngineError::ContainerNotFound(_)) => {
                tracing::debug!("Container '{}' already gone during stop", info.name);
                Ok(())
            }
            Err(source) => Err(LifecycleError::EngineUnavailable {
                step: Step::Stop,
                source,
            }),
        }
    }

    async fn remove_prior(
        &self,
        info: &ContainerInfo,
        progress: Option<&mpsc::UnboundedSender<String>>,
    ) -> Result<()> {
        send_progress(progress, format!("Removing container '{}'...", info.name));
        match self.engine.remove(&info.id, true).await {
            Ok(()) => Ok(()),
            Err(EngineError::ContainerNotFound(_)) => {
                tracing::debug!("Container '{}' already gone during remove", info.name);
                Ok(())
            }
            Err(source) => Err(LifecycleError::EngineUnavailable {
                step: Step::Remove,
                source,
            }),
        }
    }

    async fn run_container(&self, request: &ConvergeRequest) -> Result<ContainerId> {
        let run = RunConfig {
            image: request.image_name.clone(),
            name: request.container_name.clone(),
            cmd: None,
            env: HashMap::new(),
            labels: HashMap::from([
                (MANAGED_LABEL.to_string(), "true".to_string()),
                (IMAGE_LABEL.to_string(), request.image_name.clone()),
            ]),
            tty: request.attach || request.tty,
            stdin_open: request.attach || request.tty,
        };

        self.engine.run(&run).await.map_err(|source| match source {
            EngineError::ConnectionError(_) => LifecycleError::EngineUnavailable {
                step: Step::Run,
                source,
            },
            source => LifecycleError::Run { source },
        })
    }

    /// Attach to the container's primary process and pump the session until
    /// it ends. User-driven termination of the session ends the call; the
    /// container keeps running either way.
    pub async fn attach(&self, id: &ContainerId) -> std::result::Result<(), EngineError> {
        let stream = self.engine.attach(id).await?;
        let mut output = stream.output;
        let mut stdout = tokio::io::stdout();

        match stream.input {
            Some(mut input) => {
                let mut stdin = tokio::io::stdin();
                tokio::select! {
                    result = tokio::io::copy(&mut output, &mut stdout) => {
                        result?;
                    }
                    _ = tokio::io::copy(&mut stdin, &mut input) => {}
                }
            }
            None => {
                tokio::io::copy(&mut output, &mut stdout).await?;
            }
        }

        Ok(())
    }
}

fn validate_request(request: &ConvergeRequest) -> Result<()> {
    if request.image_name.trim().is_empty() {
        return Err(LifecycleError::InvalidRequest(
            "image name must not be empty".to_string(),
        ));
    }
    if request.container_name.trim().is_empty() {
        return Err(LifecycleError::InvalidRequest(
            "container name must not be empty".to_string(),
        ));
    }
    // A missing context is a build-definition problem, reported as a Build
    // failure before any engine call is made.
    if !request.build_context.is_dir() {
        return Err(LifecycleError::Build {
            source: EngineError::BuildError(format!(
                "Build context {:?} does not exist or is not a directory",
                request.build_context
            )),
        });
    }
    Ok(())
}

fn send_progress(progress: Option<&mpsc::UnboundedSender<String>>, msg: impl Into<String>) {
    if let Some(tx) = progress {
        let _ = tx.send(msg.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_display() {
        assert_eq!(Step::Build.to_string(), "build");
        assert_eq!(Step::Attach.to_string(), "attach");
    }

    #[test]
    fn test_validate_rejects_empty_names() {
        let tmp = tempfile::tempdir().unwrap();
        let request = ConvergeRequest::new("", "demo_container", tmp.path());
        assert!(matches!(
            validate_request(&request),
            Err(LifecycleError::InvalidRequest(_))
        ));

        let request = ConvergeRequest::new("demo_image", "  ", tmp.path());
        assert!(matches!(
            validate_request(&request),
            Err(LifecycleError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_missing_context_is_build_error() {
        let request = ConvergeRequest::new("demo_image", "demo_container", "/no/such/dir");
        let err = validate_request(&request).unwrap_err();
        assert_eq!(err.step(), Some(Step::Build));
    }
}
