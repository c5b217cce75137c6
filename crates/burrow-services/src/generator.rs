//! Frame generator pool — parallel workers keeping the playback queue full.
//!
//! Each worker owns the positions `w, w+W, w+2W, ...` of the active send-id
//! list and cycles over them forever, pushing rendered frames into one
//! bounded queue. A full queue blocks the workers; that is the only flow
//! control. A frame lost on the optical channel reappears on the next pass.
//!
//! Retargeting is stop-the-world on the producer side: the queue is locked
//! against the consumer, every worker is signalled and joined, leftover
//! frames are drained, and only then do new workers start. Nothing from
//! the old target list can reach playback once `start` returns.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::sender::{ChunkTable, GenerationCache};
use crate::symbol::{GeneratedFrame, SymbolEncoder};

/// Positions of the send-id list a worker is responsible for.
pub fn assigned_positions(
    list_len: usize,
    worker: usize,
    worker_count: usize,
) -> impl Iterator<Item = usize> {
    (worker..list_len).step_by(worker_count.max(1))
}

/// Consumer end of the pool's bounded queue.
#[derive(Clone)]
pub struct FrameQueue {
    rx: Arc<Mutex<mpsc::Receiver<GeneratedFrame>>>,
}

impl FrameQueue {
    /// Wait up to `timeout` for the next frame. `None` means producers are
    /// behind (or stopped); callers treat it as a skipped tick.
    pub async fn pop(&self, timeout: Duration) -> Option<GeneratedFrame> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut rx = tokio::time::timeout_at(deadline, self.rx.lock()).await.ok()?;
        tokio::time::timeout_at(deadline, rx.recv()).await.ok().flatten()
    }
}

pub struct FrameGeneratorPool {
    table: Arc<ChunkTable>,
    encoder: Arc<dyn SymbolEncoder>,
    cache: GenerationCache,
    worker_count: usize,
    frame_tx: mpsc::Sender<GeneratedFrame>,
    frame_rx: Arc<Mutex<mpsc::Receiver<GeneratedFrame>>>,
    stop_tx: Option<broadcast::Sender<()>>,
    workers: Vec<JoinHandle<()>>,
    targets: Arc<[u32]>,
}

impl FrameGeneratorPool {
    /// Create an idle pool. Nothing is produced until `start`.
    pub fn new(
        table: Arc<ChunkTable>,
        encoder: Arc<dyn SymbolEncoder>,
        cache: GenerationCache,
        worker_count: usize,
        queue_capacity: usize,
    ) -> Self {
        let (frame_tx, frame_rx) = mpsc::channel(queue_capacity.max(1));
        Self {
            table,
            encoder,
            cache,
            worker_count: worker_count.max(1),
            frame_tx,
            frame_rx: Arc::new(Mutex::new(frame_rx)),
            stop_tx: None,
            workers: Vec::new(),
            targets: Arc::from(Vec::new()),
        }
    }

    pub fn queue(&self) -> FrameQueue {
        FrameQueue {
            rx: self.frame_rx.clone(),
        }
    }

    pub fn table(&self) -> &Arc<ChunkTable> {
        &self.table
    }

    /// The active send-id list, in cycle order.
    pub fn targets(&self) -> Arc<[u32]> {
        self.targets.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.workers.is_empty()
    }

    /// Replace the active send-id list and restart production. Returns the
    /// number of stale frames discarded from the queue.
    pub async fn start(&mut self, targets: Vec<u32>) -> usize {
        let mut rx = self.frame_rx.clone().lock_owned().await;
        self.halt().await;
        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }

        self.targets = Arc::from(targets);
        let (stop_tx, _) = broadcast::channel::<()>(1);
        for worker in 0..self.worker_count {
            let ctx = WorkerContext {
                worker,
                worker_count: self.worker_count,
                targets: self.targets.clone(),
                table: self.table.clone(),
                encoder: self.encoder.clone(),
                cache: self.cache.clone(),
                frame_tx: self.frame_tx.clone(),
            };
            self.workers.push(tokio::spawn(ctx.run(stop_tx.subscribe())));
        }
        self.stop_tx = Some(stop_tx);
        drop(rx);

        tracing::info!(
            targets = self.targets.len(),
            workers = self.worker_count,
            drained,
            "frame generators started"
        );
        drained
    }

    /// Stop and join every worker. Frames already queued stay queued.
    async fn halt(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        for handle in self.workers.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "frame generator exited abnormally");
            }
        }
    }

    /// Stop all workers and discard everything queued.
    pub async fn shutdown(mut self) {
        let mut rx = self.frame_rx.clone().lock_owned().await;
        self.halt().await;
        rx.close();
        while rx.try_recv().is_ok() {}
        tracing::info!("frame generators stopped");
    }
}

struct WorkerContext {
    worker: usize,
    worker_count: usize,
    targets: Arc<[u32]>,
    table: Arc<ChunkTable>,
    encoder: Arc<dyn SymbolEncoder>,
    cache: GenerationCache,
    frame_tx: mpsc::Sender<GeneratedFrame>,
}

impl WorkerContext {
    async fn run(self, mut stop: broadcast::Receiver<()>) {
        let positions: Vec<usize> =
            assigned_positions(self.targets.len(), self.worker, self.worker_count).collect();
        if positions.is_empty() {
            let _ = stop.recv().await;
            return;
        }

        // Encoding is deterministic: a position that failed once fails
        // every time, so it leaves this worker's cycle.
        let mut failed = vec![false; positions.len()];
        loop {
            for (slot, &pos) in positions.iter().enumerate() {
                if failed[slot] {
                    continue;
                }
                let index = self.targets[pos];
                let frame = tokio::select! {
                    _ = stop.recv() => return,
                    frame = self.generate(index) => frame,
                };
                let Some(frame) = frame else {
                    failed[slot] = true;
                    continue;
                };

                tokio::select! {
                    _ = stop.recv() => return,
                    sent = self.frame_tx.send(frame) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            if failed.iter().all(|&f| f) {
                tracing::error!(
                    worker = self.worker,
                    positions = positions.len(),
                    "no assigned frame can be rendered, worker idle"
                );
                let _ = stop.recv().await;
                return;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Cached frame for `index`, or a freshly rendered one.
    async fn generate(&self, index: u32) -> Option<GeneratedFrame> {
        if let Some(frame) = self.cache.get(index) {
            return Some(frame);
        }

        let table = self.table.clone();
        let encoder = self.encoder.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            let wire = table.wire(index).map_err(|e| e.to_string())?;
            let symbol = encoder.encode(&wire).map_err(|e| e.to_string())?;
            Ok::<_, String>(GeneratedFrame {
                index,
                wire: Arc::from(wire),
                symbol: Arc::new(symbol),
            })
        })
        .await;

        match rendered {
            Ok(Ok(frame)) => {
                self.cache.insert(index, frame.clone());
                Some(frame)
            }
            Ok(Err(e)) => {
                tracing::warn!(index, error = %e, "frame generation failed, dropped from cycle");
                None
            }
            Err(e) => {
                tracing::warn!(index, error = %e, "frame generation task failed");
                None
            }
        }
    }
}
