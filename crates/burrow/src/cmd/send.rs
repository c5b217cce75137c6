//! `burrow send` — loop a payload's frames until the operator quits.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};

use burrow_core::config::BurrowConfig;
use burrow_services::{
    format_duration, parse_targets, BitmapEncoder, FrameGeneratorPool, GeneratedFrame,
    PlaybackScheduler, Renderer, ResendCoordinator, SenderSession, Targets,
};

pub enum Source {
    File(PathBuf),
    Text(String),
}

/// Writes each shown frame's wire text as one stdout line, for a symbol
/// renderer (or a test harness) at the other end of the pipe.
struct StdoutRenderer;

impl Renderer for StdoutRenderer {
    fn render(&self, frame: &GeneratedFrame) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = writeln!(out, "{}", frame.wire).and_then(|_| out.flush()) {
            tracing::debug!(error = %e, index = frame.index, "stdout write failed");
        }
    }
}

pub async fn run(config: BurrowConfig, source: Source, displays: usize) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let sender = &config.sender;

    let session = match &source {
        Source::File(path) => SenderSession::from_file(path, sender.chunk_size),
        Source::Text(text) => SenderSession::from_text(text, sender.chunk_size),
    }
    .context("failed to load payload")?
    .with_cache_capacity(sender.queue_capacity);

    let pool = FrameGeneratorPool::new(
        session.table(),
        Arc::new(BitmapEncoder::new(sender.image_size)),
        session.cache(),
        sender.worker_count,
        sender.queue_capacity,
    );
    let coordinator = ResendCoordinator::new(pool, sender.fps);
    coordinator.set_targets(Targets::All).await?;
    eprintln!(
        "sending {} ({} bytes, {} frames, one pass ≈ {})",
        session.filename(),
        session.payload_len(),
        session.total(),
        format_duration(coordinator.cycle_estimate().await)
    );

    let mut scheduler =
        PlaybackScheduler::new(coordinator.queue(), sender.frame_period(), sender.pop_timeout());
    for _ in 0..displays.max(1) {
        scheduler.add_display(Arc::new(StdoutRenderer));
    }
    let stats = scheduler.stats();

    let shutdown_tx = super::shutdown_on_ctrl_c();
    let playback = tokio::spawn(scheduler.run(shutdown_tx.subscribe()));

    let mut shutdown = shutdown_tx.subscribe();
    let mut lines = super::stdin_lines();
    loop {
        let line = tokio::select! {
            _ = shutdown.recv() => break,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            // No more operator input; keep looping until interrupted.
            tracing::info!("stdin closed, sending until interrupted");
            let _ = shutdown.recv().await;
            break;
        };
        if line.trim() == "quit" {
            break;
        }

        let targets = match parse_targets(&line) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(error = %e, "resend request ignored");
                continue;
            }
        };
        match coordinator.set_targets(targets).await {
            Ok(count) => eprintln!(
                "now sending {} frame(s), one pass ≈ {}",
                count,
                format_duration(coordinator.cycle_estimate().await)
            ),
            Err(e) => tracing::warn!(error = %e, "resend request rejected"),
        }
    }

    let _ = shutdown_tx.send(());
    if let Err(e) = playback.await {
        tracing::warn!(error = %e, "playback task failed");
    }
    coordinator.shutdown().await;

    if let Ok(stats) = stats.lock() {
        tracing::info!(
            shown = stats.shown,
            underruns = stats.underruns,
            "send stopped"
        );
    }
    Ok(())
}
