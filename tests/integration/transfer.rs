use crate::*;

use burrow_core::config::ReceiverConfig;
use burrow_services::{Delivered, DirectoryPersistence};

/// A file goes through the whole pipeline over a clean channel and lands in
/// the output directory byte for byte.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_file_transfer_lossless() {
    let src_dir = temp_dir("src");
    let out_dir = temp_dir("out");
    std::fs::create_dir_all(&src_dir).unwrap();
    let data = pattern(10_000);
    let src = src_dir.join("report.bin");
    std::fs::write(&src, &data).unwrap();

    let session = SenderSession::from_file(&src, 1024).unwrap();
    assert_eq!(session.total(), 10);
    let coordinator = start_sender(&session).await;

    let (tx, rx) = mpsc::channel(64);
    let receiver = spawn_receiver(
        receiver(Arc::new(DirectoryPersistence::new(&out_dir))),
        rx,
    );
    let relay = spawn_relay(coordinator.queue(), tx, BTreeSet::new(), None);

    let (_, outcome) = receiver.await.unwrap();
    match outcome.unwrap() {
        StopOutcome::Persisted {
            filename,
            bytes,
            digest,
            delivered,
        } => {
            assert_eq!(filename, "report.bin");
            assert_eq!(bytes, data.len());
            assert_eq!(digest, session.digest());
            assert_eq!(delivered, Delivered::File(out_dir.join("report.bin")));
        }
        other => panic!("expected Persisted, got {other:?}"),
    }
    assert_eq!(std::fs::read(out_dir.join("report.bin")).unwrap(), data);

    relay.await.unwrap();
    coordinator.shutdown().await;
    let _ = std::fs::remove_dir_all(&src_dir);
    let _ = std::fs::remove_dir_all(&out_dir);
}

/// 5000 bytes at 2048 per chunk: frames 0 and 2 leave exactly frame 1
/// missing, and frame 1 then completes the original payload.
#[test]
fn test_five_thousand_bytes_missing_middle_chunk() {
    let out_dir = temp_dir("5000");
    let data = pattern(5000);
    let session = SenderSession::load("five.bin", Bytes::from(data.clone()), 2048).unwrap();
    let table = session.table();
    assert_eq!(table.total(), 3);
    let sizes: Vec<usize> = (0..3).map(|i| table.get(i).unwrap().len()).collect();
    assert_eq!(sizes, vec![2048, 2048, 904]);

    let mut rx = ReceiverSession::new(
        ReceiverConfig::default(),
        Arc::new(DirectoryPersistence::new(&out_dir)),
    );
    rx.start();
    assert!(!rx.accept(table.wire(0).unwrap().as_bytes()));
    assert!(!rx.accept(table.wire(2).unwrap().as_bytes()));
    assert_eq!(rx.missing().collect::<Vec<_>>(), vec![1]);
    assert_eq!(rx.snapshot().missing_count, 1);

    assert!(rx.accept(table.wire(1).unwrap().as_bytes()));
    assert!(matches!(rx.stop().unwrap(), StopOutcome::Persisted { bytes: 5000, .. }));
    assert_eq!(std::fs::read(out_dir.join("five.bin")).unwrap(), data);
    let _ = std::fs::remove_dir_all(&out_dir);
}

/// Channel noise and a stray frame from another transfer neither break
/// nor pollute the session.
#[test]
fn test_noise_and_foreign_frames_are_ignored() {
    let out_dir = temp_dir("noise");
    let data = pattern(300);
    let ours = SenderSession::load("ours.txt", Bytes::from(data.clone()), 100).unwrap();
    let theirs = SenderSession::load("theirs.txt", Bytes::from(vec![0u8; 300]), 100).unwrap();

    let mut rx = receiver(Arc::new(DirectoryPersistence::new(&out_dir)));
    rx.accept(ours.table().wire(2).unwrap().as_bytes());
    rx.accept(b"not base64 at all!");
    rx.accept(b"aGVsbG8=");
    rx.accept(theirs.table().wire(0).unwrap().as_bytes());
    rx.accept(ours.table().wire(2).unwrap().as_bytes());
    assert_eq!(rx.snapshot().received, 1);
    assert_eq!(rx.snapshot().filename.as_deref(), Some("ours.txt"));

    rx.accept(ours.table().wire(1).unwrap().as_bytes());
    assert!(rx.accept(ours.table().wire(0).unwrap().as_bytes()));
    rx.stop().unwrap();
    assert_eq!(std::fs::read(out_dir.join("ours.txt")).unwrap(), data);
    let _ = std::fs::remove_dir_all(&out_dir);
}
