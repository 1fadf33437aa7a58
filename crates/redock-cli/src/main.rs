//! redock - rebuild an image and restart its container

use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Select};
use redock_cli::commands;
use redock_config::GlobalConfig;
use redock_core::LifecycleManager;
use redock_engine::{
    create_default_engine, create_engine, detect_available_engines, EngineType,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "redock")]
#[command(author, version, about = "Rebuild an image and restart its container", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override default engine (docker or podman)
    #[arg(long, global = true, value_parser = ["docker", "podman"])]
    engine: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the image, then stop, remove, and rerun the named container from it
    Converge {
        /// Image name (tag) to build
        image: String,

        /// Container name to (re)create from the image
        container: String,

        /// Build context directory
        #[arg(short, long, default_value = ".")]
        context: PathBuf,

        /// Attach an interactive session after the container starts
        #[arg(short, long)]
        attach: bool,

        /// Don't use cache when building the image
        #[arg(long)]
        no_cache: bool,
    },

    /// Show or edit global configuration
    Config {
        /// Open config in editor
        #[arg(short, long)]
        edit: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Load global config
    let mut config = GlobalConfig::load().unwrap_or_default();

    // Handle config command separately (doesn't need an engine)
    if let Commands::Config { edit } = &cli.command {
        commands::config(*edit).await?;
        return Ok(());
    }

    // First-run engine detection
    if config.is_first_run() && cli.engine.is_none() {
        if let Some(selected) = detect_and_select_engine(&config).await? {
            config.defaults.engine = selected.to_string();
            if let Err(e) = config.save() {
                eprintln!("Warning: Could not save engine selection: {}", e);
            } else {
                eprintln!("Engine '{}' saved to config", config.defaults.engine);
            }
        }
    }

    let engine = match cli.engine.as_deref() {
        Some("docker") => create_engine(EngineType::Docker, &config).await?,
        Some("podman") => create_engine(EngineType::Podman, &config).await?,
        _ => create_default_engine(&config).await?,
    };

    let manager = LifecycleManager::with_config(engine, config);

    match cli.command {
        Commands::Converge {
            image,
            container,
            context,
            attach,
            no_cache,
        } => {
            commands::converge(&manager, &image, &container, context, attach, no_cache).await?;
        }
        Commands::Config { .. } => unreachable!(), // Handled above
    }

    Ok(())
}

/// Check which engine sockets answer on first run; ask only when both do
async fn detect_and_select_engine(config: &GlobalConfig) -> anyhow::Result<Option<EngineType>> {
    eprintln!("No engine configured yet; checking the Docker and Podman sockets...");

    let reachable: Vec<EngineType> = detect_available_engines(config)
        .await
        .into_iter()
        .filter(|(_, ok)| *ok)
        .map(|(engine, _)| engine)
        .collect();

    match reachable.as_slice() {
        [] => {
            eprintln!("Neither engine answered. Install Docker or Podman, or set the");
            eprintln!("socket path with `redock config --edit`, then rerun.");
            Ok(None)
        }
        [only] => {
            eprintln!("Using {} (the only engine that answered)", only);
            Ok(Some(*only))
        }
        both => {
            if std::io::IsTerminal::is_terminal(&std::io::stdin()) {
                let labels: Vec<String> = both.iter().map(|engine| engine.to_string()).collect();
                let picked = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Both engines answered; which should redock use?")
                    .items(&labels)
                    .default(0)
                    .interact()?;
                Ok(Some(both[picked]))
            } else {
                eprintln!(
                    "Both engines answered; stdin is not a terminal, keeping {}",
                    both[0]
                );
                Ok(Some(both[0]))
            }
        }
    }
}
