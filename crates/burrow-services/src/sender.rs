//! Sender session — the chunk table and generation cache for one payload.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use dashmap::DashMap;

use burrow_core::{
    chunk_payload, ChunkError, FrameError, CLIPBOARD_FILENAME, DELIMITER, MAX_FILENAME_LEN,
};

use crate::symbol::GeneratedFrame;

/// Rendered frames kept when the caller doesn't size the cache.
pub const DEFAULT_CACHE_CAPACITY: usize = 32;

pub type GenerationCache = Arc<FrameCache>;

/// Frames already rendered, keyed by chunk index. Encoding is a pure
/// function of (filename, index, total, payload), all fixed per session,
/// so any entry can be dropped and rebuilt later.
///
/// Holds at most `capacity` rasters; the oldest insertion goes first.
pub struct FrameCache {
    frames: DashMap<u32, GeneratedFrame>,
    order: Mutex<VecDeque<u32>>,
    capacity: usize,
}

impl FrameCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: DashMap::with_capacity(capacity),
            order: Mutex::new(VecDeque::with_capacity(capacity + 1)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: u32) -> Option<GeneratedFrame> {
        self.frames.get(&index).map(|frame| frame.clone())
    }

    pub fn insert(&self, index: u32, frame: GeneratedFrame) {
        let Ok(mut order) = self.order.lock() else {
            return;
        };
        if self.frames.insert(index, frame).is_none() {
            order.push_back(index);
        }
        while order.len() > self.capacity {
            if let Some(oldest) = order.pop_front() {
                self.frames.remove(&oldest);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Every chunk of the loaded payload, addressed by index.
#[derive(Debug)]
pub struct ChunkTable {
    filename: String,
    chunks: Vec<Bytes>,
}

impl ChunkTable {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn total(&self) -> u32 {
        self.chunks.len() as u32
    }

    pub fn get(&self, index: u32) -> Option<&Bytes> {
        self.chunks.get(index as usize)
    }

    /// Wire text for one chunk.
    pub fn wire(&self, index: u32) -> Result<String, FrameError> {
        let payload = self.get(index).ok_or(FrameError::IndexOutOfRange {
            index,
            total: self.total(),
        })?;
        burrow_core::encode(&self.filename, index, self.total(), payload)
    }

    /// Every index in ascending order: the default send-id list.
    pub fn all_indices(&self) -> Vec<u32> {
        (0..self.total()).collect()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to read {0}: {1}")]
    Read(String, std::io::Error),
    #[error("payload is empty; nothing to send")]
    Empty,
    #[error(transparent)]
    Chunk(#[from] ChunkError),
}

/// A loaded payload. Discarded and rebuilt when a new payload is loaded.
pub struct SenderSession {
    table: Arc<ChunkTable>,
    cache: GenerationCache,
    payload_len: usize,
    digest: String,
}

impl SenderSession {
    /// Chunk `payload` under `filename`.
    ///
    /// Empty payloads are refused: a zero-frame transfer has nothing to put
    /// on screen and no frame from which a receiver could learn it exists.
    pub fn load(filename: &str, payload: Bytes, chunk_size: usize) -> Result<Self, SessionError> {
        if payload.is_empty() {
            return Err(SessionError::Empty);
        }
        let chunks = chunk_payload(&payload, chunk_size)?;
        let filename = sanitize_filename(filename);
        let digest = burrow_core::digest(&payload);

        tracing::info!(
            filename,
            bytes = payload.len(),
            total = chunks.len(),
            digest = &digest[..16],
            "payload loaded"
        );

        Ok(Self {
            table: Arc::new(ChunkTable {
                filename,
                chunks: chunks.into_iter().map(|c| c.bytes).collect(),
            }),
            cache: Arc::new(FrameCache::new(DEFAULT_CACHE_CAPACITY)),
            payload_len: payload.len(),
            digest,
        })
    }

    /// Load a file; the frame filename is the path's final component.
    pub fn from_file(path: &Path, chunk_size: usize) -> Result<Self, SessionError> {
        let data = std::fs::read(path).map_err(|e| SessionError::Read(path.display().to_string(), e))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");
        Self::load(filename, Bytes::from(data), chunk_size)
    }

    /// Load clipboard text under the reserved clipboard filename.
    pub fn from_text(text: &str, chunk_size: usize) -> Result<Self, SessionError> {
        Self::load(
            CLIPBOARD_FILENAME,
            Bytes::copy_from_slice(text.as_bytes()),
            chunk_size,
        )
    }

    /// Bound the generation cache to `capacity` rendered frames. Callers
    /// tie this to the playback queue bound.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = Arc::new(FrameCache::new(capacity));
        self
    }

    pub fn table(&self) -> Arc<ChunkTable> {
        self.table.clone()
    }

    pub fn cache(&self) -> GenerationCache {
        self.cache.clone()
    }

    pub fn filename(&self) -> &str {
        self.table.filename()
    }

    pub fn total(&self) -> u32 {
        self.table.total()
    }

    /// Payload size in bytes. Never zero: empty payloads are refused.
    pub fn payload_len(&self) -> usize {
        self.payload_len
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }
}

/// Replace the wire delimiter so every frame of the session decodes, and
/// cap the length so the header fits `max_wire_len`.
fn sanitize_filename(name: &str) -> String {
    let delimiter = char::from(DELIMITER);
    if name.is_empty() {
        return "unknown".to_string();
    }
    let mut end = name.len().min(MAX_FILENAME_LEN);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].replace(delimiter, "_")
}
