//! burrow-core — wire format, chunking, and configuration shared by the
//! sender and receiver halves of a burrow transfer.

pub mod chunk;
pub mod config;
pub mod wire;

pub use chunk::{chunk_payload, Chunk, ChunkError};
pub use wire::{
    decode, encode, max_wire_len, FrameError, WireFrame, CLIPBOARD_FILENAME, DELIMITER,
    MAX_FILENAME_LEN,
};

/// BLAKE3 hex digest of a payload. Logged on both ends so operators can
/// compare a finished transfer out-of-band; never sent over the wire.
pub fn digest(data: &[u8]) -> String {
    hex::encode(blake3::hash(data).as_bytes())
}
