//! Torrent client abstraction.
//!
//! This module provides a `TorrentClient` trait covering the remote
//! operations the dispatcher performs, and the qBittorrent Web API backend.

mod qbittorrent;
mod types;

pub use qbittorrent::QBittorrentClient;
pub use types::*;
