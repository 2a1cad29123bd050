//! pcat-server - Product catalog service and CLI
//!
//! `serve` (default) runs the HTTP API; `import`, `validate` and `export`
//! run one CSV transfer against the configured store and exit.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pcat_common::config::{CatalogConfig, ConfigOverrides};
use pcat_common::Catalog;
use pcat_server::{build_router, AppState};
use tracing::{error, info};

/// Command-line arguments for pcat-server
#[derive(Parser, Debug)]
#[command(name = "pcat-server")]
#[command(about = "Product catalog taxonomy service")]
#[command(version)]
struct Args {
    /// TOML config file (default: ~/.config/pcat/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Listen address, e.g. 127.0.0.1:5740
        #[arg(long, value_name = "ADDR")]
        bind: Option<String>,
    },
    /// Import items from a CSV file
    Import {
        file: PathBuf,
    },
    /// Check a CSV file without writing anything
    Validate {
        file: PathBuf,
    },
    /// Write the whole catalog as CSV
    Export {
        /// Output file (default: stdout)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        "Starting pcat-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let command = args.command.unwrap_or(Command::Serve { bind: None });

    let bind = match &command {
        Command::Serve { bind } => bind.clone(),
        _ => None,
    };
    let overrides = ConfigOverrides {
        config_file: args.config,
        database_path: args.database,
        bind,
    };
    let config = CatalogConfig::load(&overrides).context("Failed to load configuration")?;

    // Validate files before touching the store
    if let Command::Validate { file } = &command {
        return validate(file);
    }

    let catalog = match Catalog::from_config(&config).await {
        Ok(catalog) => catalog,
        Err(e) => {
            error!("Failed to open catalog store: {}", e);
            return Err(e.into());
        }
    };

    match command {
        Command::Serve { .. } => serve(catalog, &config.bind).await,
        Command::Import { file } => import(&catalog, &file).await,
        Command::Export { output } => export(&catalog, output).await,
        Command::Validate { .. } => Ok(()),
    }
}

async fn serve(catalog: Catalog, bind: &str) -> Result<()> {
    let app = build_router(AppState::new(catalog));

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind to {}", bind))?;
    info!("pcat-server listening on http://{}", bind);
    info!("Health check: http://{}/health", bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn read_csv(file: &Path) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}

async fn import(catalog: &Catalog, file: &Path) -> Result<()> {
    let text = read_csv(file)?;
    let result = catalog.import_csv(&text).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if result.has_errors() {
        bail!(
            "{} row(s) failed, {} imported",
            result.errors.len(),
            result.success
        );
    }
    Ok(())
}

fn validate(file: &Path) -> Result<()> {
    let text = read_csv(file)?;
    let report = pcat_common::csv::validate_csv(&text);
    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.valid {
        bail!("{} is not importable", file.display());
    }
    Ok(())
}

async fn export(catalog: &Catalog, output: Option<PathBuf>) -> Result<()> {
    let csv = catalog.export_csv().await?;
    match output {
        Some(path) => {
            std::fs::write(&path, csv)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Catalog exported to {}", path.display());
        }
        None => print!("{}", csv),
    }
    Ok(())
}
