//! Torrent queue behaviour across many polls.
//!
//! These tests drive the queue directly, the way the dispatcher does after
//! each poll, and inspect the job queues it feeds.

use std::sync::Arc;

use chrono::{Duration, Utc};

use qbunpack_core::{
    queue::{JobReceivers, QueueStatus, TorrentQueue},
    testing::{fixtures, RecordingObserver},
    JobKind,
};

fn drain(jobs: &mut JobReceivers) -> (usize, usize) {
    let mut unpack = 0;
    while jobs.unpack.try_recv().is_ok() {
        unpack += 1;
    }
    let mut check = 0;
    while jobs.check.try_recv().is_ok() {
        check += 1;
    }
    (unpack, check)
}

#[test]
fn test_rapid_polls_queue_one_job_per_torrent() {
    let (queue, mut jobs) = TorrentQueue::new("Unpack");

    for _ in 0..1000 {
        queue.update(vec![
            fixtures::completed_torrent("check-me", ""),
            fixtures::completed_torrent("unpack-me", "Unpack"),
            fixtures::completed_torrent("done", "Completed"),
        ]);
    }

    assert_eq!(drain(&mut jobs), (1, 1));
    assert_eq!(queue.get("check-me").unwrap().status, QueueStatus::Queued);
    assert_eq!(queue.get("unpack-me").unwrap().status, QueueStatus::Queued);
    assert_eq!(queue.get("done").unwrap().status, QueueStatus::Idle);
}

#[test]
fn test_job_done_allows_exactly_one_new_job() {
    let (queue, mut jobs) = TorrentQueue::new("Unpack");
    let snapshot = || vec![fixtures::completed_torrent("h1", "")];

    queue.update(snapshot());
    let job = jobs.check.try_recv().unwrap();
    assert_eq!(job.kind, JobKind::Check);
    assert_eq!(job.hash(), "h1");

    queue.job_done("h1");
    queue.job_done("h1");
    queue.job_done("never-seen");
    assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Idle);
    assert!(queue.get("never-seen").is_none());

    for _ in 0..10 {
        queue.update(snapshot());
    }
    assert_eq!(drain(&mut jobs), (0, 1));
}

#[test]
fn test_full_job_queue_drops_and_retries_next_poll() {
    let observer = Arc::new(RecordingObserver::default());
    let (queue, mut jobs) = TorrentQueue::with_capacity("Unpack", 1);
    let queue = queue.with_observer(observer.clone());
    let snapshot = || {
        vec![
            fixtures::completed_torrent("a", "Unpack"),
            fixtures::completed_torrent("b", "Unpack"),
        ]
    };

    queue.update(snapshot());

    assert_eq!(observer.queue_full(), 1);
    let first = jobs.unpack.try_recv().unwrap();
    assert!(jobs.unpack.try_recv().is_err());

    let dropped = observer.full_hashes().remove(0);
    assert_ne!(dropped, first.hash());
    assert_eq!(queue.get(first.hash()).unwrap().status, QueueStatus::Queued);
    assert_eq!(queue.get(&dropped).unwrap().status, QueueStatus::Idle);

    queue.update(snapshot());

    let second = jobs.unpack.try_recv().unwrap();
    assert_eq!(second.hash(), dropped);
    assert_eq!(observer.queue_full(), 1);
}

#[test]
fn test_identical_polls_only_fire_updated() {
    let observer = Arc::new(RecordingObserver::default());
    let (queue, _jobs) = TorrentQueue::new("Unpack");
    let queue = queue.with_observer(observer.clone());
    let snapshot = || vec![fixtures::completed_torrent("h1", "Completed")];

    queue.update(snapshot());
    assert_eq!(observer.added(), 1);

    for _ in 0..3 {
        queue.update(snapshot());
    }

    assert_eq!(observer.updated(), 3);
    assert_eq!(observer.added(), 1);
    assert_eq!(observer.removed(), 0);
}

#[test]
fn test_vanished_torrent_is_kept_for_retention_window() {
    let observer = Arc::new(RecordingObserver::default());
    let (queue, _jobs) = TorrentQueue::new("Unpack");
    let queue = queue.with_observer(observer.clone());
    let start = Utc::now();

    queue.update_at(vec![fixtures::completed_torrent("h1", "Completed")], start);

    queue.update_at(Vec::new(), start + Duration::minutes(30));
    queue.update_at(Vec::new(), start + Duration::minutes(59));
    let entry = queue.get("h1").unwrap();
    assert!(entry.status.is_removed());
    assert_eq!(observer.removed(), 1);

    queue.update_at(Vec::new(), start + Duration::minutes(61));
    assert!(queue.get("h1").is_none());
    assert!(queue.is_empty());
    assert_eq!(observer.removed(), 1);
}

#[test]
fn test_reappearing_torrent_keeps_its_outstanding_job() {
    let (queue, mut jobs) = TorrentQueue::new("Unpack");
    let start = Utc::now();
    let snapshot = || vec![fixtures::completed_torrent("h1", "Unpack")];

    queue.update_at(snapshot(), start);
    assert_eq!(drain(&mut jobs), (1, 0));

    queue.update_at(Vec::new(), start + Duration::minutes(5));
    assert_eq!(
        queue.get("h1").unwrap().status,
        QueueStatus::Removed {
            job_outstanding: true
        }
    );

    queue.update_at(snapshot(), start + Duration::minutes(10));
    assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Queued);
    assert_eq!(drain(&mut jobs), (0, 0));

    queue.job_done("h1");
    queue.update_at(snapshot(), start + Duration::minutes(11));
    assert_eq!(drain(&mut jobs), (1, 0));
}

#[test]
fn test_incomplete_torrents_are_never_queued() {
    let (queue, mut jobs) = TorrentQueue::new("Unpack");
    let mut unpacking = fixtures::downloading_torrent("h2");
    unpacking.category = "Unpack".to_string();

    for _ in 0..5 {
        queue.update(vec![fixtures::downloading_torrent("h1"), unpacking.clone()]);
    }

    assert_eq!(drain(&mut jobs), (0, 0));
    assert_eq!(queue.len(), 2);
}
