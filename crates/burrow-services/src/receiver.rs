//! Receiver session — consumes candidate payloads from the optical channel
//! until the transfer completes or the operator stops it.
//!
//! All tracker state is owned by the session task; other tasks observe it
//! through the progress watch channel.

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, watch};

use burrow_core::config::ReceiverConfig;

use crate::assembly::{AssemblyTracker, Ingest, Progress};
use crate::persist::{Delivered, Persistence};
use crate::rate::{format_eta, format_rate};

/// How a receive session ended.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// Every chunk arrived and the payload was handed to persistence.
    Persisted {
        filename: String,
        bytes: usize,
        digest: String,
        delivered: Delivered,
    },
    /// Stopped early. Nothing was persisted; `ReceiverSession::missing`
    /// lists what the sender still has to show.
    Incomplete(Progress),
}

pub struct ReceiverSession {
    tracker: AssemblyTracker,
    persistence: Arc<dyn Persistence>,
    config: ReceiverConfig,
    progress_tx: watch::Sender<Progress>,
    last_report: Option<Instant>,
    malformed: u64,
}

impl ReceiverSession {
    pub fn new(config: ReceiverConfig, persistence: Arc<dyn Persistence>) -> Self {
        let (progress_tx, _) = watch::channel(Progress::default());
        Self {
            tracker: AssemblyTracker::new(config.history_len, Instant::now()),
            persistence,
            config,
            progress_tx,
            last_report: None,
            malformed: 0,
        }
    }

    /// Live progress, updated after every accepted frame.
    pub fn progress(&self) -> watch::Receiver<Progress> {
        self.progress_tx.subscribe()
    }

    pub fn snapshot(&self) -> Progress {
        self.tracker.progress(Instant::now())
    }

    /// Indices not yet captured, ascending.
    pub fn missing(&self) -> impl Iterator<Item = u32> + '_ {
        self.tracker.missing()
    }

    /// Clear all state and start a new session.
    pub fn start(&mut self) {
        let now = Instant::now();
        self.tracker.reset(now);
        self.last_report = None;
        self.malformed = 0;
        self.progress_tx.send_replace(self.tracker.progress(now));
        tracing::info!("receive session started");
    }

    /// Feed one candidate payload. Returns true once the transfer is complete.
    pub fn accept(&mut self, candidate: &[u8]) -> bool {
        let now = Instant::now();
        match self.tracker.ingest_wire(candidate, now) {
            Ok(Ingest::Accepted { complete }) => {
                self.progress_tx.send_replace(self.tracker.progress(now));
                self.report(now, complete);
                complete
            }
            Ok(Ingest::Duplicate | Ingest::Conflict) => false,
            Ok(Ingest::Closed) => true,
            Err(e) => {
                self.malformed += 1;
                tracing::trace!(error = %e, "candidate dropped");
                false
            }
        }
    }

    fn report(&mut self, now: Instant, force: bool) {
        let due = self
            .last_report
            .map_or(true, |last| now.duration_since(last) >= self.config.progress_interval());
        if !(due || force) {
            return;
        }
        self.last_report = Some(now);
        let p = self.tracker.progress(now);
        tracing::info!(
            received = p.received,
            total = p.total.unwrap_or(0),
            missing = p.missing_count,
            speed = %format_rate(p.bytes_per_sec),
            eta = %format_eta(p.eta()),
            "receive progress"
        );
    }

    /// Consume candidates until completion, channel close, or shutdown,
    /// then stop.
    pub async fn run(
        &mut self,
        mut candidates: mpsc::Receiver<Bytes>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<StopOutcome> {
        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("receive session interrupted");
                    break;
                }
                candidate = candidates.recv() => {
                    let Some(candidate) = candidate else {
                        tracing::info!("candidate source closed");
                        break;
                    };
                    if self.accept(&candidate) {
                        break;
                    }
                }
            }
        }
        self.stop()
    }

    /// Stop listening. Persists only when every chunk is present. If
    /// persistence fails the assembled chunks are kept and `stop` may be
    /// called again.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        let Some(assembled) = self.tracker.assemble() else {
            let progress = self.snapshot();
            if !progress.is_complete() {
                tracing::warn!(
                    received = progress.received,
                    total = progress.total.unwrap_or(0),
                    malformed = self.malformed,
                    "receive stopped before completion, nothing persisted"
                );
            }
            return Ok(StopOutcome::Incomplete(progress));
        };

        let digest = burrow_core::digest(&assembled.data);
        tracing::info!(
            filename = %assembled.filename,
            bytes = assembled.data.len(),
            digest = &digest[..16],
            "transfer complete"
        );
        let delivered = match self.persistence.persist(&assembled.filename, &assembled.data) {
            Ok(delivered) => delivered,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    filename = %assembled.filename,
                    "persist failed, transfer kept for retry"
                );
                return Err(e);
            }
        };
        self.tracker.close();

        Ok(StopOutcome::Persisted {
            filename: assembled.filename,
            bytes: assembled.data.len(),
            digest,
            delivered,
        })
    }
}
