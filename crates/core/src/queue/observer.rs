use tracing::{debug, info, warn};

use crate::torrent_client::Torrent;

use super::types::{QueueObserver, TorrentJob};

/// Observer that reports queue lifecycle events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl QueueObserver for LoggingObserver {
    fn on_added(&self, torrent: &Torrent) {
        info!(
            hash = %torrent.hash,
            category = %torrent.category,
            "Torrent added: {}",
            torrent.name
        );
    }

    fn on_updated(&self, torrent: &Torrent) {
        debug!(
            hash = %torrent.hash,
            category = %torrent.category,
            state = %torrent.state,
            "Torrent updated: {}",
            torrent.name
        );
    }

    fn on_removed(&self, torrent: &Torrent) {
        info!(hash = %torrent.hash, "Torrent removed: {}", torrent.name);
    }

    fn on_queue_full(&self, job: &TorrentJob) {
        warn!(
            hash = %job.torrent.hash,
            kind = %job.kind,
            "Job queue full, will retry on next poll: {}",
            job.torrent.name
        );
    }
}
