//! Resend coordination — the operator narrows (or widens) the sender's
//! cycle to the indices the receiver reports missing.
//!
//! The missing list travels out-of-band: the receiver prints it, the
//! operator pastes it into the sender. Retargets are serialized behind the
//! pool lock, so a second request waits for the first to finish draining.

use std::fmt::Write as _;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::generator::{FrameGeneratorPool, FrameQueue};

/// The send-id list requested by the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Targets {
    All,
    /// Exact cycle order; duplicates repeat a frame within each pass.
    Indices(Vec<u32>),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResendError {
    #[error("no valid frame indices in {0:?}")]
    NoTargets(String),
    #[error("frame index {index} out of range for {total} frames")]
    OutOfRange { index: u32, total: u32 },
}

/// Parse operator text such as `"3, 17, 42"`. Blank text means all frames.
/// Tokens that are not plain decimal numbers are skipped.
pub fn parse_targets(text: &str) -> Result<Targets, ResendError> {
    if text.trim().is_empty() {
        return Ok(Targets::All);
    }
    let indices: Vec<u32> = text
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|t| t.parse().ok())
        .collect();
    if indices.is_empty() {
        return Err(ResendError::NoTargets(text.to_string()));
    }
    Ok(Targets::Indices(indices))
}

/// The receiver-side rendering of a missing set: `"1, 4, 9"`.
pub fn format_missing(missing: impl IntoIterator<Item = u32>) -> String {
    let mut text = String::new();
    for (n, index) in missing.into_iter().enumerate() {
        if n > 0 {
            text.push_str(", ");
        }
        let _ = write!(text, "{index}");
    }
    text
}

pub struct ResendCoordinator {
    pool: Mutex<FrameGeneratorPool>,
    queue: FrameQueue,
    total: u32,
    fps: u32,
}

impl ResendCoordinator {
    pub fn new(pool: FrameGeneratorPool, fps: u32) -> Self {
        let queue = pool.queue();
        let total = pool.table().total();
        Self {
            pool: Mutex::new(pool),
            queue,
            total,
            fps: fps.max(1),
        }
    }

    /// Consumer end of the pool's queue, for the playback scheduler.
    pub fn queue(&self) -> FrameQueue {
        self.queue.clone()
    }

    /// Replace the active send-id list and restart production. Returns the
    /// new list length. Invalid requests leave the current cycle running.
    pub async fn set_targets(&self, targets: Targets) -> Result<usize, ResendError> {
        let ids = match targets {
            Targets::All => (0..self.total).collect::<Vec<u32>>(),
            Targets::Indices(ids) => {
                if let Some(&index) = ids.iter().find(|&&i| i >= self.total) {
                    return Err(ResendError::OutOfRange {
                        index,
                        total: self.total,
                    });
                }
                ids
            }
        };
        let count = ids.len();

        let mut pool = self.pool.lock().await;
        pool.start(ids).await;
        tracing::info!(
            targets = count,
            total = self.total,
            cycle = %crate::rate::format_duration(cycle_time(count, self.fps)),
            "resend targets applied"
        );
        Ok(count)
    }

    /// The active send-id list, in cycle order.
    pub async fn targets(&self) -> Vec<u32> {
        self.pool.lock().await.targets().to_vec()
    }

    /// Time for one full pass over the active send-id list.
    pub async fn cycle_estimate(&self) -> Duration {
        let count = self.pool.lock().await.targets().len();
        cycle_time(count, self.fps)
    }

    /// Stop every generator and release the queue.
    pub async fn shutdown(self) {
        self.pool.into_inner().shutdown().await;
    }
}

fn cycle_time(frames: usize, fps: u32) -> Duration {
    Duration::from_secs_f64(frames as f64 / f64::from(fps.max(1)))
}
