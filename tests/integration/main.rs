//! Burrow integration test harness.
//!
//! Tests here run a real sender pipeline (session, generator pool, resend
//! coordinator) against a real receiver session. The optical channel in
//! between is an in-memory relay that can lose chosen frames.
//!
//!   cargo test --test integration

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use burrow_core::config::ReceiverConfig;
use burrow_services::{
    BitmapEncoder, FrameGeneratorPool, FrameQueue, Persistence, ReceiverSession,
    ResendCoordinator, SenderSession, StopOutcome, Targets,
};

mod clipboard;
mod recovery;
mod transfer;

// ── Harness ───────────────────────────────────────────────────────────────────

pub const WORKERS: usize = 4;
pub const QUEUE_CAPACITY: usize = 8;
const POP_TIMEOUT: Duration = Duration::from_secs(5);

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh, not-yet-created directory under the system temp dir.
pub fn temp_dir(tag: &str) -> PathBuf {
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!("burrow-it-{tag}-{}-{id}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

/// Deterministic, non-repeating test content.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Start generating every frame of `session`.
pub async fn start_sender(session: &SenderSession) -> ResendCoordinator {
    let pool = FrameGeneratorPool::new(
        session.table(),
        Arc::new(BitmapEncoder::new(400)),
        session.cache(),
        WORKERS,
        QUEUE_CAPACITY,
    );
    let coordinator = ResendCoordinator::new(pool, 5);
    coordinator
        .set_targets(Targets::All)
        .await
        .expect("all targets are valid");
    coordinator
}

/// Stand-in for the optical channel: pops frames off the sender's queue and
/// forwards their wire text, silently losing any index in `lost`.
///
/// Stops once `until_distinct` different indices have been forwarded, when
/// the receiving end goes away, or when the sender stalls. Returns the set
/// of indices that went through.
pub fn spawn_relay(
    queue: FrameQueue,
    tx: mpsc::Sender<Bytes>,
    lost: BTreeSet<u32>,
    until_distinct: Option<usize>,
) -> JoinHandle<BTreeSet<u32>> {
    tokio::spawn(async move {
        let mut forwarded = BTreeSet::new();
        while let Some(frame) = queue.pop(POP_TIMEOUT).await {
            if lost.contains(&frame.index) {
                continue;
            }
            if tx.send(Bytes::copy_from_slice(frame.wire.as_bytes())).await.is_err() {
                break;
            }
            forwarded.insert(frame.index);
            if until_distinct.is_some_and(|n| forwarded.len() >= n) {
                break;
            }
        }
        forwarded
    })
}

/// Run `session` on its own task until the candidate stream ends.
pub fn spawn_receiver(
    mut session: ReceiverSession,
    rx: mpsc::Receiver<Bytes>,
) -> JoinHandle<(ReceiverSession, Result<StopOutcome>)> {
    tokio::spawn(async move {
        // Held for the task's lifetime so the shutdown channel stays open.
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let outcome = session.run(rx, shutdown_rx).await;
        (session, outcome)
    })
}

pub fn receiver(persistence: Arc<dyn Persistence>) -> ReceiverSession {
    let mut session = ReceiverSession::new(ReceiverConfig::default(), persistence);
    session.start();
    session
}
