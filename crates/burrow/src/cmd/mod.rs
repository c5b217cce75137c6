//! CLI command modules.

pub mod receive;
pub mod send;

/// Resolves once SIGINT arrives, then fans the stop out to every task.
pub fn shutdown_on_ctrl_c() -> tokio::sync::broadcast::Sender<()> {
    let (tx, _) = tokio::sync::broadcast::channel::<()>(1);
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            let _ = signal_tx.send(());
        }
    });
    tx
}

/// Stdin lines, read on a plain thread so a pending read never holds the
/// runtime open at exit. The channel closes on EOF.
pub fn stdin_lines() -> tokio::sync::mpsc::Receiver<String> {
    let (tx, rx) = tokio::sync::mpsc::channel(64);
    std::thread::spawn(move || {
        use std::io::BufRead;
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
    rx
}
