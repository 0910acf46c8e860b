//! Chunk ingestion: upload metadata parsing, on-disk staging, and
//! session-switch detection.

mod meta;
mod receiver;

pub use meta::{decode_session_epoch, ChunkMeta};
pub use receiver::{ChunkReceiver, SealRequest};
