use crate::*;

use burrow_services::{format_missing, parse_targets, DirectoryPersistence};

// ══════════════════════════════════════════════════════════════════════════════
//  Resend: operator-driven recovery of frames the channel keeps losing
// ══════════════════════════════════════════════════════════════════════════════

/// Three frames never make it across on the first pass. The receiver's
/// missing list, pasted into the sender, narrows the cycle to exactly those
/// frames and the transfer completes.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_resend_missing_completes_transfer() {
    let out_dir = temp_dir("resend");
    let data = pattern(20 * 64);
    let session = SenderSession::load("burst.bin", Bytes::from(data.clone()), 64).unwrap();
    assert_eq!(session.total(), 20);
    let coordinator = start_sender(&session).await;
    let lost = BTreeSet::from([3, 11, 17]);

    // First pass: everything except the lost frames gets through.
    let (tx, rx) = mpsc::channel(64);
    let rx_task = spawn_receiver(
        receiver(Arc::new(DirectoryPersistence::new(&out_dir))),
        rx,
    );
    let forwarded = spawn_relay(coordinator.queue(), tx, lost.clone(), Some(17))
        .await
        .unwrap();
    assert!(forwarded.is_disjoint(&lost));

    let (rx_session, outcome) = rx_task.await.unwrap();
    let progress = match outcome.unwrap() {
        StopOutcome::Incomplete(p) => p,
        other => panic!("expected Incomplete, got {other:?}"),
    };
    assert_eq!(progress.received, 17);
    assert_eq!(progress.missing_count, 3);
    let text = format_missing(rx_session.missing());
    assert_eq!(text, "3, 11, 17");
    assert!(!out_dir.exists(), "nothing may be persisted before completion");

    // Operator pastes the list into the sender.
    let count = coordinator
        .set_targets(parse_targets(&text).unwrap())
        .await
        .unwrap();
    assert_eq!(count, 3);

    let (tx, rx) = mpsc::channel(64);
    let rx_task = spawn_receiver(rx_session, rx);
    let relay = spawn_relay(coordinator.queue(), tx, BTreeSet::new(), None);

    let (_, outcome) = rx_task.await.unwrap();
    assert!(matches!(outcome.unwrap(), StopOutcome::Persisted { bytes, .. } if bytes == data.len()));
    assert_eq!(std::fs::read(out_dir.join("burst.bin")).unwrap(), data);

    // Only the requested frames were on the channel after the retarget.
    let resent = relay.await.unwrap();
    assert!(resent.is_subset(&lost), "stale frames after retarget: {resent:?}");

    coordinator.shutdown().await;
    let _ = std::fs::remove_dir_all(&out_dir);
}

/// After narrowing, an empty resend request puts every frame back in the
/// cycle.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_blank_request_widens_to_all_frames() {
    let session = SenderSession::load("wide.bin", Bytes::from(pattern(12 * 16)), 16).unwrap();
    let coordinator = start_sender(&session).await;

    coordinator
        .set_targets(parse_targets("5, 7").unwrap())
        .await
        .unwrap();
    let queue = coordinator.queue();
    let mut seen = BTreeSet::new();
    for _ in 0..100 {
        seen.insert(queue.pop(Duration::from_secs(5)).await.expect("frame").index);
    }
    assert_eq!(seen, BTreeSet::from([5, 7]));

    assert_eq!(coordinator.set_targets(parse_targets("").unwrap()).await, Ok(12));
    let mut seen = BTreeSet::new();
    while seen.len() < 12 {
        seen.insert(queue.pop(Duration::from_secs(5)).await.expect("frame").index);
    }
    assert_eq!(seen, (0..12).collect::<BTreeSet<u32>>());

    coordinator.shutdown().await;
}

/// A request naming a frame the payload doesn't have is refused and the
/// sender keeps cycling what it had.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_out_of_range_request_keeps_cycle() {
    let session = SenderSession::load("small.bin", Bytes::from(pattern(4 * 16)), 16).unwrap();
    let coordinator = start_sender(&session).await;

    assert!(coordinator
        .set_targets(parse_targets("1, 9").unwrap())
        .await
        .is_err());
    assert_eq!(coordinator.targets().await, vec![0, 1, 2, 3]);

    let queue = coordinator.queue();
    for _ in 0..20 {
        let frame = queue.pop(Duration::from_secs(5)).await.expect("frame");
        assert!(frame.index < 4);
    }
    coordinator.shutdown().await;
}
