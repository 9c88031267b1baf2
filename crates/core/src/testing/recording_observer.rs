//! Queue observer that counts lifecycle events.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::queue::{QueueObserver, TorrentJob};
use crate::torrent_client::Torrent;

/// Counts every callback and remembers the hashes of dropped jobs.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    added: AtomicUsize,
    updated: AtomicUsize,
    removed: AtomicUsize,
    queue_full: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn added(&self) -> usize {
        self.added.load(Ordering::SeqCst)
    }

    pub fn updated(&self) -> usize {
        self.updated.load(Ordering::SeqCst)
    }

    pub fn removed(&self) -> usize {
        self.removed.load(Ordering::SeqCst)
    }

    pub fn queue_full(&self) -> usize {
        self.full_hashes().len()
    }

    /// Hashes of jobs dropped on a full queue, in order.
    pub fn full_hashes(&self) -> Vec<String> {
        self.queue_full
            .lock()
            .map(|hashes| hashes.clone())
            .unwrap_or_default()
    }
}

impl QueueObserver for RecordingObserver {
    fn on_added(&self, _torrent: &Torrent) {
        self.added.fetch_add(1, Ordering::SeqCst);
    }

    fn on_updated(&self, _torrent: &Torrent) {
        self.updated.fetch_add(1, Ordering::SeqCst);
    }

    fn on_removed(&self, _torrent: &Torrent) {
        self.removed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_queue_full(&self, job: &TorrentJob) {
        if let Ok(mut hashes) = self.queue_full.lock() {
            hashes.push(job.torrent.hash.clone());
        }
    }
}
