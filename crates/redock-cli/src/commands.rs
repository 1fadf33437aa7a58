//! CLI command implementations

use anyhow::{Context, Result};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use redock_config::GlobalConfig;
use redock_core::{ConvergeRequest, LifecycleManager};
use std::io::IsTerminal;
use std::path::PathBuf;

/// Build the image and replace the running container with a fresh one
pub async fn converge(
    manager: &LifecycleManager,
    image: &str,
    container: &str,
    context: PathBuf,
    attach: bool,
    no_cache: bool,
) -> Result<()> {
    let mut request = ConvergeRequest::new(image, container, context);
    request.no_cache = no_cache;
    // The session is driven below rather than inside converge so raw mode
    // wraps only the attach; build/stop/remove output keeps the normal line
    // discipline. The new container still gets a TTY and an open stdin.
    request.tty = attach;

    let outcome = manager.converge(&request).await?;
    println!(
        "Container '{}' running from image '{}' ({})",
        container,
        image,
        outcome.container_id.short()
    );

    if attach {
        // Raw mode lets control characters reach the container's primary
        // process instead of being interpreted by the host terminal.
        let raw = std::io::stdin().is_terminal();
        if raw {
            enable_raw_mode().context("Failed to enable raw terminal mode")?;
        }
        let session = manager.attach(&outcome.container_id).await;
        if raw {
            let _ = disable_raw_mode();
        }
        if let Err(e) = session {
            eprintln!(
                "Warning: attach to '{}' failed (container left running): {}",
                container, e
            );
        }
    }

    Ok(())
}

/// Show or edit the global configuration
pub async fn config(edit: bool) -> Result<()> {
    let path = GlobalConfig::config_path()?;

    if edit {
        if !path.exists() {
            // Write out the defaults so the editor has something to start from
            GlobalConfig::default().save_to(&path)?;
        }
        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
        let status = std::process::Command::new(&editor)
            .arg(&path)
            .status()
            .with_context(|| format!("Failed to launch editor '{}'", editor))?;
        if !status.success() {
            anyhow::bail!("Editor exited with {}", status);
        }
        // Validate what was written
        GlobalConfig::load_from(&path)?;
        return Ok(());
    }

    println!("Config file: {}", path.display());
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        println!("\n{}", content);
    } else {
        let defaults = toml::to_string_pretty(&GlobalConfig::default())?;
        println!("(not created yet; defaults shown)\n\n{}", defaults);
    }
    Ok(())
}
