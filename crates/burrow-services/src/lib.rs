//! burrow-services — the sender and receiver pipelines.
//!
//! Sender: `SenderSession` → `FrameGeneratorPool` (parallel) → bounded
//! queue → `PlaybackScheduler` → displays, retargeted by the
//! `ResendCoordinator`. Receiver: candidate payloads → `ReceiverSession`
//! (`AssemblyTracker`) → `Persistence`.

pub mod assembly;
pub mod generator;
pub mod persist;
pub mod playback;
pub mod rate;
pub mod receiver;
pub mod resend;
pub mod sender;
pub mod symbol;

pub use assembly::{Assembled, AssemblyTracker, Ingest, Progress};
pub use generator::{assigned_positions, FrameGeneratorPool, FrameQueue};
pub use persist::{ClipboardSink, Delivered, DirectoryPersistence, Persistence};
pub use playback::{FpsMeter, PlaybackScheduler, PlaybackStats};
pub use rate::{format_duration, format_eta, format_rate, RateWindow};
pub use receiver::{ReceiverSession, StopOutcome};
pub use resend::{format_missing, parse_targets, ResendCoordinator, ResendError, Targets};
pub use sender::{
    ChunkTable, FrameCache, GenerationCache, SenderSession, SessionError, DEFAULT_CACHE_CAPACITY,
};
pub use symbol::{BitmapEncoder, GeneratedFrame, Raster, Renderer, SymbolEncoder, SymbolError};
