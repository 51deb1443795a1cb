//! Spectral - runtime-generated UI host
//!
//! Opens a window on a UI spec (or blueprint), replays interactions against
//! an in-memory calculator backend, and prints the rendered tree.
//!
//! ## Usage
//!
//! ```bash
//! # Render a spec once
//! spectral render --spec calculator.json
//!
//! # Replay a script of interactions, then print tree and state
//! spectral run --spec calculator.json --script clicks.json --window W1
//!
//! # Expand a blueprint and check it
//! spectral validate --spec notes.blueprint.json --blueprint
//! ```

mod script;
mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use spectral_logging::{LogConfig, SpectralSubscriberBuilder};
use spectral_runtime::{InMemoryTransport, RuntimeConfig, WindowHost};

use script::{load_script, run_script};
use source::{LoadedSpec, load_config, load_spec};

/// Spectral - host for runtime-generated UIs
#[derive(Parser)]
#[command(name = "spectral")]
#[command(about = "Render runtime-generated UI specs and route their events to tools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Runtime config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log preset: default, development, testing, calls
    #[arg(long, global = true, default_value = "testing")]
    log: String,
}

#[derive(Args)]
struct SpecArgs {
    /// UI spec file (JSON)
    #[arg(short, long)]
    spec: PathBuf,

    /// Treat the file as an app blueprint
    #[arg(short, long)]
    blueprint: bool,

    /// Window id to open
    #[arg(short, long, default_value = "W1")]
    window: String,

    /// App id; defaults to the blueprint's id, else "app"
    #[arg(short, long)]
    app: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a spec once and print the tree
    Render {
        #[command(flatten)]
        target: SpecArgs,
    },
    /// Replay a script of interactions and print the final tree and state
    Run {
        #[command(flatten)]
        target: SpecArgs,

        /// Script file (JSON array of steps)
        #[arg(long)]
        script: Option<PathBuf>,
    },
    /// Report advisory problems in a spec
    Validate {
        #[command(flatten)]
        target: SpecArgs,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let Some(log_config) = LogConfig::preset(&cli.log) else {
        bail!("Unknown log preset '{}'", cli.log);
    };
    let _log_guard = SpectralSubscriberBuilder::new()
        .with_config(log_config)
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Render { target } => render(&target, config, None).await,
        Commands::Run { target, script } => render(&target, config, script.as_deref()).await,
        Commands::Validate { target } => validate(&target, &config),
    }
}

fn load_target(target: &SpecArgs) -> Result<(LoadedSpec, String)> {
    let loaded = load_spec(&target.spec, target.blueprint)?;
    let app_id = target
        .app
        .clone()
        .or_else(|| loaded.app_id.clone())
        .unwrap_or_else(|| "app".to_string());
    Ok((loaded, app_id))
}

async fn render(target: &SpecArgs, config: RuntimeConfig, script: Option<&Path>) -> Result<()> {
    let (loaded, app_id) = load_target(target)?;
    let steps = match script {
        Some(path) => load_script(path)?,
        None => Vec::new(),
    };

    let mut host = WindowHost::new(Arc::new(InMemoryTransport::with_calculator()), config);
    let session = host
        .open(&target.window, &app_id, loaded.spec)
        .with_context(|| format!("Failed to open window {}", target.window))?;

    session.render();
    let report = run_script(session, &steps).await;
    let tree = session.render();

    let output = json!({
        "window": target.window,
        "app": app_id,
        "script": script.map(|_| &report),
        "tree": tree,
        "state": session.state().snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    host.shutdown();
    Ok(())
}

fn validate(target: &SpecArgs, config: &RuntimeConfig) -> Result<()> {
    let (loaded, app_id) = load_target(target)?;
    let issues = spectral_core::validate(&loaded.spec, config.render.max_depth);

    let output = json!({
        "app": app_id,
        "title": loaded.spec.title,
        "nodes": loaded.spec.node_count(),
        "issues": issues,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);

    if !issues.is_empty() {
        bail!("{} issue(s) found", issues.len());
    }
    Ok(())
}
