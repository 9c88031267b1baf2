//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of the collaborator traits, so
//! the queue and dispatcher can be exercised without a qBittorrent instance
//! or extraction tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use qbunpack_core::testing::{fixtures, MockTorrentClient, MockUnpacker};
//!
//! let client = MockTorrentClient::new();
//! client.add_torrent(fixtures::completed_torrent("abc", "")).await;
//!
//! let unpacker = MockUnpacker::new();
//! unpacker.set_targets("/downloads/torrent-abc", vec![/* targets */]).await;
//! ```

mod mock_torrent_client;
mod mock_unpacker;
mod recording_observer;

pub use mock_torrent_client::{MockOperation, MockTorrentClient, RecordedCategoryChange};
pub use mock_unpacker::{MockUnpacker, RecordedExtraction};
pub use recording_observer::RecordingObserver;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::torrent_client::Torrent;

    /// A finished, seeding torrent saved under `/downloads`.
    pub fn completed_torrent(hash: &str, category: &str) -> Torrent {
        torrent_in(hash, category, "/downloads")
    }

    /// A finished, seeding torrent saved under `save_path`.
    pub fn torrent_in(hash: &str, category: &str, save_path: &str) -> Torrent {
        Torrent {
            hash: hash.to_string(),
            name: format!("torrent-{}", hash),
            save_path: save_path.to_string(),
            category: category.to_string(),
            size: 1024 * 1024 * 700,
            completed: 1024 * 1024 * 700,
            progress: 1.0,
            state: "stalledUP".to_string(),
            added_at: None,
            completed_at: None,
        }
    }

    /// A torrent that is still downloading.
    pub fn downloading_torrent(hash: &str) -> Torrent {
        let mut torrent = completed_torrent(hash, "");
        torrent.completed = torrent.size / 2;
        torrent.progress = 0.5;
        torrent.state = "downloading".to_string();
        torrent
    }
}
