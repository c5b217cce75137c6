//! Assembly tracker — deduplicates decoded frames, tracks the missing set,
//! and reassembles the payload in index order once every chunk is present.
//!
//! The first accepted frame binds the transfer descriptor (filename and
//! total). Frames that disagree with it afterwards are treated as noise,
//! the same as malformed ones. Each index is write-once: the sender cycles
//! forever, so duplicates are the common case and must be cheap no-ops.
//!
//! The bound total comes off an untrusted channel, so nothing here is sized
//! by it: the missing set is derived from `captured` on demand.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Serialize;

use burrow_core::{FrameError, WireFrame};

use crate::rate::RateWindow;

/// What happened to one decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// New chunk stored.
    Accepted { complete: bool },
    /// Index already captured.
    Duplicate,
    /// Filename or total disagrees with the bound descriptor.
    Conflict,
    /// The session already produced its output.
    Closed,
}

/// Read-only snapshot for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Progress {
    pub filename: Option<String>,
    pub received: usize,
    pub total: Option<u32>,
    pub missing_count: usize,
    /// Seconds until completion at the average rate so far.
    pub eta_secs: Option<f64>,
    /// Rolling byte-rate over the recent-history window.
    pub bytes_per_sec: f64,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|t| self.received == t as usize)
    }

    pub fn eta(&self) -> Option<Duration> {
        self.eta_secs.map(Duration::from_secs_f64)
    }
}

/// Reassembled payload, handed out exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembled {
    pub filename: String,
    pub data: Vec<u8>,
}

pub struct AssemblyTracker {
    captured: BTreeMap<u32, Bytes>,
    total: Option<u32>,
    filename: Option<String>,
    history: RateWindow,
    started_at: Instant,
    closed: bool,
}

impl AssemblyTracker {
    pub fn new(history_len: usize, now: Instant) -> Self {
        Self {
            captured: BTreeMap::new(),
            total: None,
            filename: None,
            history: RateWindow::new(history_len),
            started_at: now,
            closed: false,
        }
    }

    /// Forget everything and start a fresh session.
    pub fn reset(&mut self, now: Instant) {
        self.captured.clear();
        self.total = None;
        self.filename = None;
        self.history.clear();
        self.started_at = now;
        self.closed = false;
    }

    /// Decode one candidate payload from the optical channel and ingest it.
    pub fn ingest_wire(&mut self, wire: &[u8], now: Instant) -> Result<Ingest, FrameError> {
        let frame = burrow_core::decode(wire)?;
        Ok(self.ingest(frame, now))
    }

    pub fn ingest(&mut self, frame: WireFrame, now: Instant) -> Ingest {
        if self.closed {
            return Ingest::Closed;
        }

        if let Some(total) = self.total {
            if total != frame.total {
                tracing::debug!(bound = total, got = frame.total, "frame total conflicts, dropped");
                return Ingest::Conflict;
            }
        }
        if let Some(name) = &self.filename {
            if *name != frame.filename {
                tracing::debug!(bound = %name, got = %frame.filename, "frame filename conflicts, dropped");
                return Ingest::Conflict;
            }
        }
        if frame.index >= frame.total {
            return Ingest::Conflict;
        }

        if self.total.is_none() {
            tracing::info!(filename = %frame.filename, total = frame.total, "transfer descriptor bound");
            self.total = Some(frame.total);
        }
        if self.filename.is_none() {
            self.filename = Some(frame.filename.clone());
        }

        if self.captured.contains_key(&frame.index) {
            return Ingest::Duplicate;
        }

        self.history.record(now, frame.payload.len());
        self.captured.insert(frame.index, frame.payload);
        tracing::trace!(index = frame.index, received = self.captured.len(), "chunk accepted");

        Ingest::Accepted {
            complete: self.is_complete(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.total.is_some_and(|t| self.captured.len() == t as usize)
    }

    pub fn received(&self) -> usize {
        self.captured.len()
    }

    pub fn total(&self) -> Option<u32> {
        self.total
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Indices not yet captured, ascending. Empty until the total is known.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.total.unwrap_or(0)).filter(move |i| !self.captured.contains_key(i))
    }

    pub fn missing_count(&self) -> usize {
        (self.total.unwrap_or(0) as usize).saturating_sub(self.captured.len())
    }

    /// True once the output has been delivered.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn progress(&self, now: Instant) -> Progress {
        let received = self.captured.len();
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let rate = if elapsed > 0.0 {
            received as f64 / elapsed
        } else {
            0.0
        };
        let missing_count = self.missing_count();
        let eta_secs = match self.total {
            Some(_) if rate > 0.0 => Some(missing_count as f64 / rate),
            _ => None,
        };

        Progress {
            filename: self.filename.clone(),
            received,
            total: self.total,
            missing_count,
            eta_secs,
            bytes_per_sec: self.history.bytes_per_sec(),
        }
    }

    /// Concatenate every chunk in ascending index order. Returns `None`
    /// unless complete, or once the session is closed.
    pub fn assemble(&self) -> Option<Assembled> {
        if self.closed || !self.is_complete() {
            return None;
        }
        let filename = self.filename.clone()?;

        let size = self.captured.values().map(Bytes::len).sum();
        let mut data = Vec::with_capacity(size);
        for chunk in self.captured.values() {
            data.extend_from_slice(chunk);
        }
        Some(Assembled { filename, data })
    }

    /// Mark the output delivered. Later frames are `Closed`.
    pub fn close(&mut self) {
        self.closed = true;
    }
}
