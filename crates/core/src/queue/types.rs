//! Types for the torrent queue.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::torrent_client::Torrent;

/// Processing stage a job is destined for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    /// Look for archives in a freshly completed torrent.
    Check,
    /// Extract the archives of a torrent an operator promoted.
    Unpack,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Check => "check",
            JobKind::Unpack => "unpack",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of work handed to exactly one worker.
///
/// Completion is reported by hash through `TorrentQueue::job_done`, never by
/// handing the job back.
#[derive(Debug, Clone)]
pub struct TorrentJob {
    pub kind: JobKind,
    pub torrent: Arc<Torrent>,
}

impl TorrentJob {
    pub fn new(kind: JobKind, torrent: Arc<Torrent>) -> Self {
        Self { kind, torrent }
    }

    pub fn hash(&self) -> &str {
        &self.torrent.hash
    }
}

/// Processing status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum QueueStatus {
    /// Eligible for evaluation on the next update.
    Idle,
    /// A worker holds a job for this hash.
    Queued,
    /// Missing from the latest poll; deleted once the retention window passes.
    Removed {
        /// A worker still held a job for this hash when it disappeared.
        job_outstanding: bool,
    },
}

impl QueueStatus {
    pub fn is_removed(&self) -> bool {
        matches!(self, QueueStatus::Removed { .. })
    }

    /// Whether a worker currently holds a job for the entry.
    pub fn has_job(&self) -> bool {
        matches!(
            self,
            QueueStatus::Queued
                | QueueStatus::Removed {
                    job_outstanding: true
                }
        )
    }
}

/// Latest known state of one torrent.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub torrent: Arc<Torrent>,
    pub status: QueueStatus,
    /// Time of the last poll that reported the hash.
    pub last_seen: DateTime<Utc>,
}

/// Lifecycle hooks fired by the queue.
///
/// Called synchronously while the queue lock is held: implementations must
/// not block and must not call back into the queue.
pub trait QueueObserver: Send + Sync {
    /// A hash was seen for the first time.
    fn on_added(&self, _torrent: &Torrent) {}

    /// A known hash was reported again.
    fn on_updated(&self, _torrent: &Torrent) {}

    /// A known hash went missing from a poll.
    fn on_removed(&self, _torrent: &Torrent) {}

    /// An eligible job was dropped because its queue was full.
    fn on_queue_full(&self, _job: &TorrentJob) {}
}
