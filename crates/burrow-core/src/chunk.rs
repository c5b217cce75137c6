//! Chunking — split a payload into fixed-size, index-addressed slices.

use bytes::Bytes;

/// Default chunk payload size in bytes, before base64 expansion.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// One index-addressed slice of a payload. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: u32,
    pub bytes: Bytes,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be positive")]
    ZeroChunkSize,
    #[error("payload needs {0} chunks, more than a frame index can address")]
    TooManyChunks(usize),
}

/// Number of chunks a payload of `len` bytes splits into.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        return 0;
    }
    len.div_ceil(chunk_size)
}

/// Split `payload` into consecutive slices of at most `chunk_size` bytes.
///
/// Slices share the payload's buffer. An empty payload yields no chunks.
pub fn chunk_payload(payload: &Bytes, chunk_size: usize) -> Result<Vec<Chunk>, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    let count = chunk_count(payload.len(), chunk_size);
    if count > u32::MAX as usize {
        return Err(ChunkError::TooManyChunks(count));
    }

    Ok((0..count)
        .map(|i| {
            let start = i * chunk_size;
            let end = (start + chunk_size).min(payload.len());
            Chunk {
                index: i as u32,
                bytes: payload.slice(start..end),
            }
        })
        .collect())
}
