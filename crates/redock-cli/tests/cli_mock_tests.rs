//! Mock-based command tests.
//!
//! These call command functions directly with a `LifecycleManager` backed
//! by a `FakeEngine`, avoiding any real container runtime.

use redock_cli::commands;
use redock_config::GlobalConfig;
use redock_core::test_support::{FakeCall, FakeEngine};
use redock_core::LifecycleManager;
use redock_engine::{ContainerStatus, EngineError};

fn test_manager(engine: FakeEngine) -> LifecycleManager {
    LifecycleManager::with_config(Box::new(engine), GlobalConfig::default())
}

fn build_context() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("Dockerfile"), "FROM scratch\n").unwrap();
    tmp
}

// ---- tests ----

#[tokio::test]
async fn test_converge_command_success() {
    let ctx = build_context();
    let engine = FakeEngine::new();
    let containers = engine.containers.clone();
    let manager = test_manager(engine);

    let result = commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        ctx.path().to_path_buf(),
        false,
        false,
    )
    .await;

    assert!(result.is_ok());
    let containers = containers.lock().unwrap();
    assert_eq!(containers.len(), 1);
    assert_eq!(
        containers.get("demo_container").unwrap().status,
        ContainerStatus::Running
    );
}

#[tokio::test]
async fn test_converge_command_replaces_prior_container() {
    let ctx = build_context();
    let engine =
        FakeEngine::new().with_container("demo_container", "old_image", ContainerStatus::Running);
    let containers = engine.containers.clone();
    let manager = test_manager(engine);

    commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        ctx.path().to_path_buf(),
        false,
        false,
    )
    .await
    .unwrap();

    let containers = containers.lock().unwrap();
    assert_eq!(containers.get("demo_container").unwrap().image, "demo_image");
}

#[tokio::test]
async fn test_converge_command_build_failure_surfaces() {
    let ctx = build_context();
    let engine = FakeEngine::new();
    *engine.build_error.lock().unwrap() =
        Some(EngineError::BuildError("step 3/5 failed".to_string()));
    let manager = test_manager(engine);

    let err = commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        ctx.path().to_path_buf(),
        false,
        false,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("Build step failed"));
}

#[tokio::test]
async fn test_converge_command_attach_runs_after_start() {
    let ctx = build_context();
    let engine = FakeEngine::new();
    let calls = engine.calls.clone();
    let manager = test_manager(engine);

    commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        ctx.path().to_path_buf(),
        true,
        false,
    )
    .await
    .unwrap();

    let calls = calls.lock().unwrap();
    assert!(matches!(calls.last(), Some(FakeCall::Attach { .. })));
}

#[tokio::test]
async fn test_converge_command_attach_failure_is_not_fatal() {
    let ctx = build_context();
    let engine = FakeEngine::new();
    *engine.attach_error.lock().unwrap() =
        Some(EngineError::AttachError("stream closed".to_string()));
    let containers = engine.containers.clone();
    let manager = test_manager(engine);

    let result = commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        ctx.path().to_path_buf(),
        true,
        false,
    )
    .await;

    // The session failing must not undo or fail the converge
    assert!(result.is_ok());
    assert_eq!(
        containers.lock().unwrap().get("demo_container").unwrap().status,
        ContainerStatus::Running
    );
}

#[tokio::test]
async fn test_converge_command_missing_context_fails() {
    let engine = FakeEngine::new();
    let calls = engine.calls.clone();
    let manager = test_manager(engine);

    let err = commands::converge(
        &manager,
        "demo_image",
        "demo_container",
        std::path::PathBuf::from("/no/such/context"),
        false,
        false,
    )
    .await
    .unwrap_err();

    assert!(err.to_string().contains("Build step failed"));
    assert!(calls.lock().unwrap().is_empty());
}
