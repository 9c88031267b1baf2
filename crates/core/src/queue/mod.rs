//! Torrent state table feeding the worker pools.
//!
//! `TorrentQueue` remembers every torrent reported by the client and decides,
//! after each poll, which ones need a check or an unpack job:
//! - completed and without a category: **Check**
//! - completed and labelled with the unpack-start category: **Unpack**
//!
//! At most one job per hash is outstanding at any time. Jobs that do not fit
//! into a full queue are dropped and retried on the next poll.

mod observer;
mod torrent_queue;
mod types;

pub use observer::LoggingObserver;
pub use torrent_queue::{JobReceivers, TorrentQueue, JOB_QUEUE_CAPACITY, REMOVAL_RETENTION_MINUTES};
pub use types::{JobKind, QueueEntry, QueueObserver, QueueStatus, TorrentJob};
