//! The torrent state table and its eligibility pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, trace};

use crate::torrent_client::Torrent;

use super::types::{JobKind, QueueEntry, QueueObserver, QueueStatus, TorrentJob};

/// Capacity of each job queue.
pub const JOB_QUEUE_CAPACITY: usize = 100;

/// How long a vanished torrent is remembered.
pub const REMOVAL_RETENTION_MINUTES: i64 = 60;

/// Receiving ends of the two job queues, one per worker pool.
pub struct JobReceivers {
    pub unpack: mpsc::Receiver<TorrentJob>,
    pub check: mpsc::Receiver<TorrentJob>,
}

/// Concurrent table of observed torrents.
///
/// Every operation takes one exclusive lock, so readers never observe a
/// half-applied update. Each update ends with an eligibility pass that
/// pushes jobs to the unpack and check queues without blocking.
pub struct TorrentQueue {
    entries: Mutex<HashMap<String, QueueEntry>>,
    unpack_label: String,
    unpack_tx: mpsc::Sender<TorrentJob>,
    check_tx: mpsc::Sender<TorrentJob>,
    observer: Option<Arc<dyn QueueObserver>>,
}

impl TorrentQueue {
    /// Create a queue with job queues of the default capacity.
    ///
    /// `unpack_label` is the category that promotes a torrent to unpacking.
    pub fn new(unpack_label: impl Into<String>) -> (Self, JobReceivers) {
        Self::with_capacity(unpack_label, JOB_QUEUE_CAPACITY)
    }

    /// Create a queue whose unpack and check queues hold `capacity` jobs each.
    pub fn with_capacity(unpack_label: impl Into<String>, capacity: usize) -> (Self, JobReceivers) {
        let (unpack_tx, unpack) = mpsc::channel(capacity.max(1));
        let (check_tx, check) = mpsc::channel(capacity.max(1));

        let queue = Self {
            entries: Mutex::new(HashMap::new()),
            unpack_label: unpack_label.into(),
            unpack_tx,
            check_tx,
            observer: None,
        };
        (queue, JobReceivers { unpack, check })
    }

    pub fn with_observer(mut self, observer: Arc<dyn QueueObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, QueueEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Merge the torrent list of one poll.
    pub fn update(&self, snapshots: Vec<Torrent>) {
        self.update_at(snapshots, Utc::now());
    }

    /// Merge the torrent list of one poll taken at `now`.
    pub fn update_at(&self, snapshots: Vec<Torrent>, now: DateTime<Utc>) {
        let mut entries = self.lock();
        let mut seen = HashSet::with_capacity(snapshots.len());

        for torrent in snapshots {
            let torrent = Arc::new(torrent);
            seen.insert(torrent.hash.clone());

            match entries.get_mut(&torrent.hash) {
                Some(entry) => {
                    entry.torrent = Arc::clone(&torrent);
                    entry.last_seen = now;
                    if let QueueStatus::Removed { job_outstanding } = entry.status {
                        entry.status = if job_outstanding {
                            QueueStatus::Queued
                        } else {
                            QueueStatus::Idle
                        };
                    }
                    if let Some(observer) = &self.observer {
                        observer.on_updated(&torrent);
                    }
                }
                None => {
                    entries.insert(
                        torrent.hash.clone(),
                        QueueEntry {
                            torrent: Arc::clone(&torrent),
                            status: QueueStatus::Idle,
                            last_seen: now,
                        },
                    );
                    if let Some(observer) = &self.observer {
                        observer.on_added(&torrent);
                    }
                }
            }
        }

        let retention = Duration::minutes(REMOVAL_RETENTION_MINUTES);
        let observer = self.observer.as_ref();
        entries.retain(|hash, entry| {
            if seen.contains(hash) {
                return true;
            }
            if !entry.status.is_removed() {
                entry.status = QueueStatus::Removed {
                    job_outstanding: entry.status.has_job(),
                };
                if let Some(observer) = observer {
                    observer.on_removed(&entry.torrent);
                }
            }
            let keep = now - entry.last_seen <= retention;
            if !keep {
                trace!(hash = %hash, "Forgetting torrent");
            }
            keep
        });

        self.enqueue_eligible(&mut entries);
    }

    /// Push a job for every idle, completed torrent that needs one.
    fn enqueue_eligible(&self, entries: &mut HashMap<String, QueueEntry>) {
        for entry in entries.values_mut() {
            if entry.status != QueueStatus::Idle || !entry.torrent.is_completed() {
                continue;
            }

            let (kind, tx) = if !entry.torrent.has_category() {
                (JobKind::Check, &self.check_tx)
            } else if entry.torrent.category == self.unpack_label {
                (JobKind::Unpack, &self.unpack_tx)
            } else {
                continue;
            };

            match tx.try_send(TorrentJob::new(kind, Arc::clone(&entry.torrent))) {
                Ok(()) => {
                    debug!(
                        hash = %entry.torrent.hash,
                        name = %entry.torrent.name,
                        kind = %kind,
                        "Queued job"
                    );
                    entry.status = QueueStatus::Queued;
                }
                Err(TrySendError::Full(job)) => {
                    if let Some(observer) = &self.observer {
                        observer.on_queue_full(&job);
                    }
                }
                Err(TrySendError::Closed(_)) => {
                    trace!(hash = %entry.torrent.hash, kind = %kind, "No workers for job kind");
                }
            }
        }
    }

    /// Mark the job for `hash` as finished.
    ///
    /// Unknown hashes and entries without a job are left untouched.
    pub fn job_done(&self, hash: &str) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(hash) {
            entry.status = match entry.status {
                QueueStatus::Queued => QueueStatus::Idle,
                QueueStatus::Removed { .. } => QueueStatus::Removed {
                    job_outstanding: false,
                },
                QueueStatus::Idle => QueueStatus::Idle,
            };
        }
    }

    pub fn get(&self, hash: &str) -> Option<QueueEntry> {
        self.lock().get(hash).cloned()
    }

    pub fn remove(&self, hash: &str) -> Option<QueueEntry> {
        self.lock().remove(hash)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures::completed_torrent, RecordingObserver};

    #[test]
    fn test_new_torrent_is_added_and_checked() {
        let observer = Arc::new(RecordingObserver::default());
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        let queue = queue.with_observer(observer.clone());

        queue.update(vec![completed_torrent("h1", "")]);

        assert_eq!(observer.added(), 1);
        let job = jobs.check.try_recv().unwrap();
        assert_eq!(job.kind, JobKind::Check);
        assert_eq!(job.hash(), "h1");
        assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Queued);
        assert!(jobs.unpack.try_recv().is_err());
    }

    #[test]
    fn test_unpack_label_routes_to_unpack_queue() {
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        queue.update(vec![completed_torrent("h1", "Unpack")]);

        assert_eq!(jobs.unpack.try_recv().unwrap().kind, JobKind::Unpack);
        assert!(jobs.check.try_recv().is_err());
    }

    #[test]
    fn test_other_categories_are_skipped() {
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        queue.update(vec![
            completed_torrent("h1", "Completed"),
            completed_torrent("h2", "Unpacked"),
        ]);

        assert!(jobs.check.try_recv().is_err());
        assert!(jobs.unpack.try_recv().is_err());
        assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Idle);
    }

    #[test]
    fn test_incomplete_torrent_is_not_queued() {
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        let mut torrent = completed_torrent("h1", "");
        torrent.progress = 0.5;
        torrent.state = "downloading".to_string();
        queue.update(vec![torrent]);

        assert!(jobs.check.try_recv().is_err());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_job_done_makes_entry_eligible_again() {
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        queue.update(vec![completed_torrent("h1", "")]);
        jobs.check.try_recv().unwrap();

        queue.update(vec![completed_torrent("h1", "")]);
        assert!(jobs.check.try_recv().is_err());

        queue.job_done("h1");
        assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Idle);
        queue.update(vec![completed_torrent("h1", "")]);
        assert!(jobs.check.try_recv().is_ok());
    }

    #[test]
    fn test_removed_entry_keeps_outstanding_job() {
        let (queue, mut jobs) = TorrentQueue::new("Unpack");
        let t0 = Utc::now();
        queue.update_at(vec![completed_torrent("h1", "")], t0);
        jobs.check.try_recv().unwrap();

        queue.update_at(vec![], t0 + Duration::minutes(1));
        assert_eq!(
            queue.get("h1").unwrap().status,
            QueueStatus::Removed {
                job_outstanding: true
            }
        );

        // Reappearing while the worker still holds the job must not queue a duplicate
        queue.update_at(vec![completed_torrent("h1", "")], t0 + Duration::minutes(2));
        assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Queued);
        assert!(jobs.check.try_recv().is_err());
    }

    #[test]
    fn test_job_done_on_removed_entry() {
        let (queue, _jobs) = TorrentQueue::new("Unpack");
        let t0 = Utc::now();
        queue.update_at(vec![completed_torrent("h1", "")], t0);
        queue.update_at(vec![], t0 + Duration::minutes(1));

        queue.job_done("h1");
        assert_eq!(
            queue.get("h1").unwrap().status,
            QueueStatus::Removed {
                job_outstanding: false
            }
        );
    }

    #[test]
    fn test_remove_deletes_entry() {
        let (queue, _jobs) = TorrentQueue::new("Unpack");
        queue.update(vec![completed_torrent("h1", "Completed")]);

        assert!(queue.remove("h1").is_some());
        assert!(queue.get("h1").is_none());
        assert!(queue.is_empty());
        assert!(queue.remove("h1").is_none());
    }

    #[test]
    fn test_closed_queue_leaves_entry_idle() {
        let (queue, jobs) = TorrentQueue::new("Unpack");
        drop(jobs);
        queue.update(vec![completed_torrent("h1", "")]);
        assert_eq!(queue.get("h1").unwrap().status, QueueStatus::Idle);
    }
}
