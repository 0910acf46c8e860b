use crate::chunk::ChunkReceiver;
use crate::registry::SessionRegistry;
use crate::render::{RenderCoordinator, RenderRequest};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub receiver: Arc<ChunkReceiver>,
    pub registry: Arc<SessionRegistry>,
    pub render: Arc<RenderCoordinator>,
    /// Bounded intake queue; sending awaits until the render worker has
    /// room, which serializes request acceptance.
    pub render_tx: mpsc::Sender<RenderRequest>,
}
