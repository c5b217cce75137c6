//! `burrow receive` — assemble a transfer from scanned wire payloads.

use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tokio::sync::mpsc;

use burrow_core::config::BurrowConfig;
use burrow_services::{
    format_missing, ClipboardSink, Delivered, DirectoryPersistence, ReceiverSession, StopOutcome,
};

/// Clipboard transfers are written to stdout; the terminal (or a pipe into
/// a clipboard tool) takes it from there.
struct StdoutClipboard;

impl ClipboardSink for StdoutClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(())
    }
}

pub async fn run(config: BurrowConfig) -> Result<()> {
    config.validate().context("invalid configuration")?;

    let persistence = DirectoryPersistence::new(&config.receiver.output_dir)
        .with_clipboard(Arc::new(StdoutClipboard));
    let mut session = ReceiverSession::new(config.receiver.clone(), Arc::new(persistence));
    session.start();
    eprintln!(
        "receiving into {} (Ctrl-C to stop)",
        config.receiver.output_dir.display()
    );

    let (tx, rx) = mpsc::channel::<Bytes>(256);
    let mut lines = super::stdin_lines();
    tokio::spawn(async move {
        while let Some(line) = lines.recv().await {
            if tx.send(Bytes::from(line.into_bytes())).await.is_err() {
                break;
            }
        }
    });

    let shutdown_tx = super::shutdown_on_ctrl_c();
    let outcome = session.run(rx, shutdown_tx.subscribe()).await?;
    match outcome {
        StopOutcome::Persisted {
            filename,
            bytes,
            digest,
            delivered,
        } => {
            match delivered {
                Delivered::File(path) => {
                    eprintln!("saved {} ({} bytes) to {}", filename, bytes, path.display())
                }
                Delivered::Clipboard => eprintln!("\nreceived clipboard text ({} bytes)", bytes),
            }
            eprintln!("blake3 {}", digest);
        }
        StopOutcome::Incomplete(progress) => match progress.total {
            Some(total) => {
                eprintln!(
                    "stopped with {}/{} frames of {}; missing:",
                    progress.received,
                    total,
                    progress.filename.as_deref().unwrap_or("?")
                );
                // The missing list is the sender's resend input.
                println!("{}", format_missing(session.missing()));
            }
            None => eprintln!("stopped before any frame arrived"),
        },
    }
    Ok(())
}
