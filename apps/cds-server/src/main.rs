use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use runtime::{AppConfig, CliArgs};

use cds_auth::{AuthConfig, Environment};
use cds_model::{Model, PageConfig};
use odata_service::{AppState, MemoryStore, ServiceSettings};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

mod shutdown;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// CDS OData Server - serves CDS models over OData v4 and v2
#[derive(Parser)]
#[command(name = "cds-server")]
#[command(about = "CDS OData Server - serves CDS models over OData v4 and v2")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for HTTP server (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Print current configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Check configuration and model
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        config: cli.config.as_ref().map(|p| p.to_string_lossy().to_string()),
        port: cli.port,
        print_config: cli.print_config,
        verbose: cli.verbose,
    };

    // Load configuration (normalized home_dir is applied inside)
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    runtime::logging::init_logging_from_config(&logging_config, Path::new(&config.server.home_dir));
    tracing::info!("CDS OData Server starting");

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => check_config(config),
    }
}

fn load_model(config: &AppConfig) -> Result<Arc<Model>> {
    let path = config.project_path(&config.cds.model);
    let model = Model::load(&path)
        .with_context(|| format!("failed to load CDS model from {}", path.display()))?;
    tracing::info!(
        model = %path.display(),
        services = model.services().count(),
        "CDS model loaded"
    );
    Ok(Arc::new(model))
}

fn environment(config: &AppConfig) -> Environment {
    Environment {
        multi_tenant: config.environment.multi_tenant,
        production: config.environment.production,
    }
}

fn settings(config: &AppConfig) -> ServiceSettings {
    let page_defaults = PageConfig::new(config.odata.default_page_size, config.odata.max_page_size);
    let static_dir = config
        .server
        .static_dir
        .as_deref()
        .map(|dir| config.project_path(dir))
        .filter(|dir| {
            let exists = dir.is_dir();
            if !exists {
                tracing::debug!(dir = %dir.display(), "static folder not found, not serving assets");
            }
            exists
        });

    let mut settings = ServiceSettings::default()
        .with_page_defaults(page_defaults)
        .with_static_dir(static_dir);
    if config.server.timeout_sec > 0 {
        settings = settings.with_timeout(Duration::from_secs(config.server.timeout_sec));
    }
    settings
}

fn build_state(config: &AppConfig) -> Result<AppState> {
    let model = load_model(config)?;

    let store = Arc::new(MemoryStore::new(model.clone()));
    if let Some(dir) = config.cds.data_dir.as_deref() {
        let dir = config.project_path(dir);
        let rows = store
            .seed_from_dir(&dir)
            .with_context(|| format!("failed to seed data from {}", dir.display()))?;
        tracing::info!(dir = %dir.display(), rows, "seed data loaded");
    }

    let auth = AuthConfig::from_value(config.auth.clone()).context("invalid auth section")?;
    let state = AppState::new(model, settings(config), store)
        .with_auth(&auth, environment(config), None)
        .context("failed to set up authentication")?;
    Ok(state)
}

async fn run_server(config: AppConfig) -> Result<()> {
    let state = build_state(&config)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid listen address {}:{}",
                config.server.host, config.server.port
            )
        })?;
    tracing::info!("server listening on http://{}", addr);

    odata_service::serve(Arc::new(state), addr, async {
        if let Err(e) = shutdown::wait_for_shutdown().await {
            tracing::warn!(error = %e, "shutdown: signal waiter failed; falling back to ctrl_c()");
            let _ = tokio::signal::ctrl_c().await;
        }
        tracing::info!("shutdown signal received");
    })
    .await
}

fn check_config(config: AppConfig) -> Result<()> {
    tracing::info!("Checking configuration...");

    let state = build_state(&config)?;
    println!("Configuration check passed");
    for mounted in state.mounted_services() {
        println!("  service {} (restricted: {})", mounted.name, mounted.restricted);
    }
    println!("Server config:");
    println!("{}", config.to_yaml()?);

    Ok(())
}
