//! Playback scheduler — pulls frames off the queue at a fixed cadence and
//! hands them to the displays.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};

use crate::generator::FrameQueue;
use crate::symbol::Renderer;

/// Realized frame rate, from the gap between consecutive frames shown.
#[derive(Debug, Default, Clone, Copy)]
pub struct FpsMeter {
    last: Option<Instant>,
    fps: f64,
}

impl FpsMeter {
    pub fn record(&mut self, now: Instant) {
        if let Some(last) = self.last {
            let delta = now.saturating_duration_since(last).as_secs_f64();
            self.fps = if delta > 0.0 { 1.0 / delta } else { 0.0 };
        }
        self.last = Some(now);
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }
}

#[derive(Debug, Default, Clone)]
pub struct PlaybackStats {
    pub shown: u64,
    pub underruns: u64,
    /// Realized FPS per display, in registration order.
    pub fps: Vec<f64>,
}

struct Display {
    renderer: Arc<dyn Renderer>,
    meter: FpsMeter,
}

pub struct PlaybackScheduler {
    queue: FrameQueue,
    displays: Vec<Display>,
    period: Duration,
    pop_timeout: Duration,
    stats: Arc<Mutex<PlaybackStats>>,
}

impl PlaybackScheduler {
    pub fn new(queue: FrameQueue, period: Duration, pop_timeout: Duration) -> Self {
        Self {
            queue,
            displays: Vec::new(),
            period,
            pop_timeout,
            stats: Arc::new(Mutex::new(PlaybackStats::default())),
        }
    }

    /// Add a display. Each display gets its own frame per tick, so extra
    /// displays raise throughput rather than mirror the first.
    pub fn add_display(&mut self, renderer: Arc<dyn Renderer>) {
        self.displays.push(Display {
            renderer,
            meter: FpsMeter::default(),
        });
        if let Ok(mut stats) = self.stats.lock() {
            stats.fps.push(0.0);
        }
    }

    /// Shared view of the running counters.
    pub fn stats(&self) -> Arc<Mutex<PlaybackStats>> {
        self.stats.clone()
    }

    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            period_ms = self.period.as_millis() as u64,
            displays = self.displays.len(),
            "playback started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("playback shutting down");
                    return;
                }
                _ = interval.tick() => {
                    tokio::select! {
                        _ = shutdown.recv() => {
                            tracing::info!("playback shutting down");
                            return;
                        }
                        _ = self.tick() => {}
                    }
                }
            }
        }
    }

    /// Show one frame on every display. A display whose pop times out keeps
    /// its previous frame for this tick.
    pub async fn tick(&mut self) {
        for (slot, display) in self.displays.iter_mut().enumerate() {
            let Some(frame) = self.queue.pop(self.pop_timeout).await else {
                tracing::debug!(display = slot, "playback underrun, tick skipped");
                if let Ok(mut stats) = self.stats.lock() {
                    stats.underruns += 1;
                }
                continue;
            };

            display.renderer.render(&frame);
            display.meter.record(Instant::now());
            tracing::trace!(display = slot, index = frame.index, "frame shown");

            if let Ok(mut stats) = self.stats.lock() {
                stats.shown += 1;
                if let Some(fps) = stats.fps.get_mut(slot) {
                    *fps = display.meter.fps();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FrameGeneratorPool;
    use crate::sender::SenderSession;
    use crate::symbol::{BitmapEncoder, GeneratedFrame};
    use bytes::Bytes;

    #[derive(Default)]
    struct Recorder {
        shown: Mutex<Vec<u32>>,
    }

    impl Renderer for Recorder {
        fn render(&self, frame: &GeneratedFrame) {
            self.shown.lock().unwrap().push(frame.index);
        }
    }

    fn idle_pool() -> FrameGeneratorPool {
        let session = SenderSession::load("p.bin", Bytes::from(vec![0u8; 40]), 10).unwrap();
        FrameGeneratorPool::new(
            session.table(),
            Arc::new(BitmapEncoder::new(400)),
            session.cache(),
            2,
            4,
        )
    }

    #[test]
    fn fps_meter_uses_inter_frame_gap() {
        let mut meter = FpsMeter::default();
        let t0 = Instant::now();
        meter.record(t0);
        assert_eq!(meter.fps(), 0.0);
        meter.record(t0 + Duration::from_millis(200));
        assert!((meter.fps() - 5.0).abs() < 1e-9);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stalled_queue_skips_tick() {
        let pool = idle_pool();
        let mut scheduler = PlaybackScheduler::new(
            pool.queue(),
            Duration::from_millis(10),
            Duration::from_millis(20),
        );
        let recorder = Arc::new(Recorder::default());
        scheduler.add_display(recorder.clone());

        scheduler.tick().await;
        assert!(recorder.shown.lock().unwrap().is_empty());
        let stats = scheduler.stats();
        assert_eq!(stats.lock().unwrap().underruns, 1);
        assert_eq!(stats.lock().unwrap().shown, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn each_display_gets_its_own_frame() {
        let mut pool = idle_pool();
        let mut scheduler = PlaybackScheduler::new(
            pool.queue(),
            Duration::from_millis(10),
            Duration::from_secs(5),
        );
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        scheduler.add_display(first.clone());
        scheduler.add_display(second.clone());
        pool.start(vec![0, 1, 2, 3]).await;

        for _ in 0..4 {
            scheduler.tick().await;
        }
        assert_eq!(first.shown.lock().unwrap().len(), 4);
        assert_eq!(second.shown.lock().unwrap().len(), 4);
        assert_eq!(scheduler.stats().lock().unwrap().shown, 8);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn run_stops_on_shutdown() {
        let mut pool = idle_pool();
        let mut scheduler = PlaybackScheduler::new(
            pool.queue(),
            Duration::from_millis(5),
            Duration::from_millis(50),
        );
        let recorder = Arc::new(Recorder::default());
        scheduler.add_display(recorder.clone());
        let stats = scheduler.stats();
        pool.start(vec![0, 1, 2, 3]).await;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(scheduler.run(shutdown_rx));
        tokio::time::sleep(Duration::from_millis(100)).await;
        let _ = shutdown_tx.send(());
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("scheduler exits")
            .unwrap();

        assert!(stats.lock().unwrap().shown > 0);
        assert!(!recorder.shown.lock().unwrap().is_empty());
        pool.shutdown().await;
    }
}
