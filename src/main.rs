//! Bruno Mock Server - CLI Entry Point

use anyhow::{Context, Result};
use bru_mock_server::{server, App, ServerConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "bru-mock-server",
    about = "Mock HTTP server for Bruno collections, with an optional browser editor",
    version
)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "bru-mock-server.yaml")]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Collection directory (overrides the config file)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Environment name (overrides the config file)
    #[arg(short, long)]
    env: Option<String>,

    /// Serve the browser editor
    #[arg(long)]
    ui: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print default configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Args {
    fn apply(&self, config: &mut ServerConfig) {
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = &self.dir {
            config.dir = dir.clone();
        }
        if let Some(env) = &self.env {
            config.env = env.clone();
        }
        if self.ui {
            config.ui = true;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if args.print_config {
        print!("{}", serde_yaml::to_string(&ServerConfig::default())?);
        return Ok(());
    }

    let mut config = if args.config.exists() {
        info!(path = ?args.config, "Loading configuration");
        ServerConfig::from_file(&args.config)
            .with_context(|| format!("Invalid configuration file {}", args.config.display()))?
    } else if args.validate {
        anyhow::bail!("Configuration file not found: {:?}", args.config);
    } else {
        info!("Using default configuration");
        ServerConfig::default()
    };
    args.apply(&mut config);
    config.validate()?;

    if args.validate {
        println!("Configuration is valid (collection: {})", config.dir.display());
        return Ok(());
    }

    let app = App::build(&config)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = Arc::new(server::bind(addr)?);

    info!(
        address = %addr,
        routes = app.route_count(),
        editor = app.has_editor(),
        "Mock server listening"
    );

    let worker = {
        let listener = Arc::clone(&listener);
        tokio::task::spawn_blocking(move || server::serve(&app, &listener))
    };

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Shutting down");
    listener.unblock();
    worker.await.context("Listener task panicked")?;

    Ok(())
}
