use anyhow::{Context, Result};
use clap::Parser;
use fieldtape::chunk::ChunkReceiver;
use fieldtape::config::{Cli, Config};
use fieldtape::http::{create_router, AppState};
use fieldtape::registry::{spawn_registry_watcher, SessionRegistry};
use fieldtape::render::{spawn_render_worker, RenderCoordinator};
use fieldtape::seal::{spawn_seal_worker, Sealer};
use fieldtape::tools::{AudiowaveformRenderer, Id3TagWriter, SoxTranscoder};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Render requests waiting for the render worker.
const RENDER_QUEUE_DEPTH: usize = 16;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::from_cli(&cli)?;

    info!("{} starting", cfg.service.name);
    info!(
        "chunks={} sessions={} recordings={} ttl={}h",
        cfg.storage.chunk_root.display(),
        cfg.storage.session_root.display(),
        cfg.storage.recordings_root.display(),
        cfg.session.ttl_hours
    );

    let work_root = cfg.storage.session_root.join(".work");
    for dir in [
        &cfg.storage.chunk_root,
        &cfg.storage.session_root,
        &cfg.storage.recordings_root,
        &work_root,
    ] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("cannot create directory: {}", dir.display()))?;
    }

    let transcoder = Arc::new(SoxTranscoder::new());
    let waveform = Arc::new(AudiowaveformRenderer::new());

    let sealer = Arc::new(Sealer::new(
        cfg.storage.chunk_root.clone(),
        cfg.storage.session_root.clone(),
        work_root,
        transcoder.clone(),
        waveform,
    ));

    let (seal_tx, seal_rx) = mpsc::unbounded_channel();
    spawn_seal_worker(Arc::clone(&sealer), seal_rx);

    // Finish any sessions left behind in staging by a previous run.
    info!("Cleaning up old chunks...");
    sealer.sweep().await;

    let receiver = Arc::new(ChunkReceiver::new(
        cfg.storage.chunk_root.clone(),
        cfg.storage.session_root.clone(),
        seal_tx,
    ));

    let registry = Arc::new(SessionRegistry::new(
        cfg.storage.session_root.clone(),
        cfg.session.ttl_hours,
    ));
    spawn_registry_watcher(Arc::clone(&registry), cfg.storage.session_root.clone())
        .context("cannot watch session root")?;

    let render = Arc::new(RenderCoordinator::new(
        cfg.storage.session_root.clone(),
        cfg.storage.recordings_root.clone(),
        cfg.render.clone(),
        transcoder,
        Arc::new(Id3TagWriter),
    ));
    let (render_tx, render_rx) = mpsc::channel(RENDER_QUEUE_DEPTH);
    spawn_render_worker(Arc::clone(&render), render_rx);

    let state = AppState {
        receiver,
        registry,
        render,
        render_tx,
    };
    let app = create_router(state, &cfg.storage.session_root);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
