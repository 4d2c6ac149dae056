use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::app_state::AppState;
use crate::backup::BackupService;
use crate::config::{load_config, NavConfig};
use crate::db::open_pool;
use crate::snapshot::SnapshotGenerator;

/// Navigation site admin backend
#[derive(Parser)]
#[command(name = "nav_admin", version, about = "Navigation site admin backend")]
pub struct Cli {
    /// Configuration file (defaults to ./nav.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the admin API, uploads and the nav.json snapshot
    Serve {
        /// Host/IP to bind (overrides the configuration)
        #[arg(long)]
        host: Option<String>,
        /// Port to bind (overrides the configuration)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Regenerate the nav.json snapshot once
    Snapshot,

    /// Write a full backup archive
    ExportBackup {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace all data from a backup archive
    ImportBackup {
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Write the plain JSON manifest
    ExportJson {
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace all data from a plain JSON manifest
    ImportJson {
        #[arg(short, long)]
        input: PathBuf,
    },
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await,
        Commands::Snapshot => {
            blocking(move || {
                let pool = open_pool(&config.database.path, config.database.pool_size)?;
                SnapshotGenerator::new(pool, config.snapshot.json_path.clone()).regenerate()?;
                println!("Snapshot written to {}", config.snapshot.json_path.display());
                Ok(())
            })
            .await
        }
        Commands::ExportBackup { output } => {
            blocking(move || {
                let archive = backup_service(&config)?.export_archive()?;
                write_output(&output, &archive)?;
                println!("Backup written to {} ({} bytes)", output.display(), archive.len());
                Ok(())
            })
            .await
        }
        Commands::ImportBackup { input } => {
            blocking(move || {
                let bytes = std::fs::read(&input)
                    .with_context(|| format!("reading {}", input.display()))?;
                let report = backup_service(&config)?.import_archive(bytes)?;
                regenerate(&config)?;
                println!(
                    "Imported {} categories, {} sites, {} announcements; {} files written, {} skipped",
                    report.summary.categories,
                    report.summary.sites,
                    report.summary.announcements,
                    report.extraction.written.len(),
                    report.extraction.skipped.len()
                );
                Ok(())
            })
            .await
        }
        Commands::ExportJson { output } => {
            blocking(move || {
                let entries = backup_service(&config)?.export_json()?;
                let json = serde_json::to_vec_pretty(&entries)?;
                write_output(&output, &json)?;
                println!("Manifest written to {}", output.display());
                Ok(())
            })
            .await
        }
        Commands::ImportJson { input } => {
            blocking(move || {
                let bytes = std::fs::read(&input)
                    .with_context(|| format!("reading {}", input.display()))?;
                let summary = backup_service(&config)?.import_json(&bytes)?;
                regenerate(&config)?;
                println!(
                    "Imported {} categories, {} sites, {} announcements",
                    summary.categories, summary.sites, summary.announcements
                );
                Ok(())
            })
            .await
        }
    }
}

async fn serve(mut config: NavConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let (state, _worker) = AppState::open(config).await?;
    let app = crate::web::build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("HTTP server listening on http://{}", addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

async fn blocking<F>(f: F) -> anyhow::Result<()>
where
    F: FnOnce() -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn backup_service(config: &NavConfig) -> anyhow::Result<BackupService> {
    let pool = open_pool(&config.database.path, config.database.pool_size)?;
    Ok(BackupService::new(pool, config))
}

fn regenerate(config: &NavConfig) -> anyhow::Result<()> {
    let pool = open_pool(&config.database.path, config.database.pool_size)?;
    SnapshotGenerator::new(pool, config.snapshot.json_path.clone()).regenerate()?;
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}
