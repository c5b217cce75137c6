use crate::*;

use std::sync::Mutex;

use burrow_core::CLIPBOARD_FILENAME;
use burrow_services::{ClipboardSink, Delivered, DirectoryPersistence};

#[derive(Default)]
struct MemoryClipboard {
    text: Mutex<Option<String>>,
}

impl ClipboardSink for MemoryClipboard {
    fn set_text(&self, text: &str) -> Result<()> {
        *self.text.lock().unwrap() = Some(text.to_string());
        Ok(())
    }
}

/// Clipboard text travels under the reserved filename and comes out on the
/// receiver's clipboard, not as a file. Multi-byte characters split across
/// chunk boundaries and `|` in the payload survive.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_clipboard_text_round_trip() {
    let out_dir = temp_dir("clip");
    let text = "grüße | ünïcødé | 日本語 | a|b|c";
    let session = SenderSession::from_text(text, 5).unwrap();
    assert_eq!(session.filename(), CLIPBOARD_FILENAME);
    let coordinator = start_sender(&session).await;

    let clipboard = Arc::new(MemoryClipboard::default());
    let persistence = DirectoryPersistence::new(&out_dir).with_clipboard(clipboard.clone());
    let (tx, rx) = mpsc::channel(64);
    let rx_task = spawn_receiver(receiver(Arc::new(persistence)), rx);
    let relay = spawn_relay(coordinator.queue(), tx, BTreeSet::new(), None);

    let (_, outcome) = rx_task.await.unwrap();
    assert!(matches!(
        outcome.unwrap(),
        StopOutcome::Persisted { delivered: Delivered::Clipboard, .. }
    ));
    assert_eq!(clipboard.text.lock().unwrap().as_deref(), Some(text));
    assert!(!out_dir.exists());

    relay.await.unwrap();
    coordinator.shutdown().await;
}
