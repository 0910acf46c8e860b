pub mod chunk;
pub mod config;
pub mod error;
pub mod http;
pub mod registry;
pub mod render;
pub mod seal;
pub mod tools;

pub use chunk::{ChunkMeta, ChunkReceiver, SealRequest};
pub use config::{Cli, Config};
pub use error::ServerError;
pub use http::{create_router, AppState};
pub use registry::{RegistrySnapshot, SessionRegistry};
pub use render::{RenderCoordinator, RenderRequest, Segment};
pub use seal::Sealer;
pub use tools::{
    AudiowaveformRenderer, Id3TagWriter, SoxTranscoder, TagWriter, TrackTags, Transcoder,
    WaveformRenderer,
};
