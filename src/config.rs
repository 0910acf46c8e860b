use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub session: SessionConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Staging area for uploaded chunks, one directory per (recorder, session).
    pub chunk_root: PathBuf,

    /// Published sealed sessions, served statically.
    pub session_root: PathBuf,

    /// Final rendered recordings; never auto-deleted.
    pub recordings_root: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Hours a sealed session is kept before the reaper deletes it.
    pub ttl_hours: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Cap on simultaneously running trim/tag jobs.
    pub max_parallel_jobs: usize,

    /// Fixed prefix for rendered file names.
    pub file_prefix: String,

    pub artist: String,
    pub title: String,
    pub album: String,

    /// Front-cover image embedded into rendered files; skipped if unreadable.
    pub cover_image: PathBuf,
}

/// Chunk ingestion and session rendering server
#[derive(Debug, Parser)]
#[command(name = "fieldtape", version)]
pub struct Cli {
    /// Config file base name (without extension)
    #[arg(long, default_value = "config/fieldtape")]
    pub config: String,

    /// Directory to store chunks
    #[arg(long)]
    pub chunk_dir: Option<PathBuf>,

    /// Directory to store sealed sessions
    #[arg(long)]
    pub session_dir: Option<PathBuf>,

    /// Directory to store rendered recordings
    #[arg(long)]
    pub recordings_dir: Option<PathBuf>,

    /// Hours to keep sessions before they are deleted
    #[arg(long)]
    pub ttl_hours: Option<f64>,

    /// HTTP listen port
    #[arg(long)]
    pub port: Option<u16>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Load the config file and apply CLI overrides on top.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::load(&cli.config)?;

        if let Some(dir) = &cli.chunk_dir {
            cfg.storage.chunk_root = dir.clone();
        }
        if let Some(dir) = &cli.session_dir {
            cfg.storage.session_root = dir.clone();
        }
        if let Some(dir) = &cli.recordings_dir {
            cfg.storage.recordings_root = dir.clone();
        }
        if let Some(hours) = cli.ttl_hours {
            cfg.session.ttl_hours = hours;
        }
        if let Some(port) = cli.port {
            cfg.service.http.port = port;
        }

        Ok(cfg)
    }
}
