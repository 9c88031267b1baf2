//! Types for torrent client operations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during torrent client operations.
#[derive(Debug, Clone, Error)]
pub enum TorrentClientError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Login refused, client IP is banned")]
    Banned,

    #[error("403 Forbidden")]
    Forbidden,

    #[error("Category name is empty")]
    CategoryEmpty,

    /// Returned by category creation for invalid names and for names that
    /// already exist.
    #[error("Category name is invalid: {0}")]
    CategoryInvalid(String),

    #[error("Category does not exist: {0}")]
    CategoryUnknown(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TorrentClientError {
    /// Whether the error is a timeout, the only retryable outcome.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Whether the remote session is unusable (credentials rejected or banned).
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_) | Self::Banned)
    }
}

/// qBittorrent states in which a torrent has finished downloading.
const COMPLETED_STATES: &[&str] = &[
    "pausedUP",
    "stoppedUP",
    "queuedUP",
    "uploading",
    "stalledUP",
    "checkingUP",
    "forcedUP",
];

/// Snapshot of a torrent as reported by the download client.
///
/// Immutable once received; the hash identifies it across polls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Torrent {
    /// Info hash (lowercase hex).
    pub hash: String,
    pub name: String,
    /// Directory the torrent content is saved under.
    pub save_path: String,
    /// Category label, empty when unassigned.
    pub category: String,
    /// Total size in bytes.
    pub size: u64,
    /// Completed bytes.
    pub completed: u64,
    /// Download progress (0.0 - 1.0).
    pub progress: f64,
    /// Raw lifecycle state reported by the client (e.g. `stalledUP`).
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Torrent {
    /// True when every byte is present and the client is seeding or done.
    pub fn is_completed(&self) -> bool {
        self.size == self.completed
            && self.progress == 1.0
            && COMPLETED_STATES.contains(&self.state.as_str())
    }

    pub fn has_category(&self) -> bool {
        !self.category.is_empty()
    }
}

/// Filter for listing torrents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TorrentFilter {
    categories: Vec<String>,
    hashes: Vec<String>,
    state: Option<String>,
    sort: Option<String>,
    limit: usize,
    offset: i64,
}

impl TorrentFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hashes.push(hash.into());
        self
    }

    /// State filter understood by the client (`completed`, `seeding`, ...).
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn sorted_on(mut self, key: impl Into<String>) -> Self {
        self.sort = Some(key.into());
        self
    }

    /// Maximum number of results; negative values mean no limit.
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = usize::try_from(limit).unwrap_or(0);
        self
    }

    /// Result offset; negative values count from the end.
    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Encode as a URL query string (without the leading `?`).
    pub fn to_query(&self) -> String {
        let mut parts = Vec::new();
        for category in &self.categories {
            parts.push(format!("category={}", urlencoding::encode(category)));
        }
        if !self.hashes.is_empty() {
            parts.push(format!(
                "hashes={}",
                urlencoding::encode(&self.hashes.join("|"))
            ));
        }
        if let Some(state) = &self.state {
            parts.push(format!("filter={}", urlencoding::encode(state)));
        }
        if let Some(sort) = &self.sort {
            parts.push(format!("sort={}", urlencoding::encode(sort)));
        }
        if self.limit > 0 {
            parts.push(format!("limit={}", self.limit));
        }
        if self.offset != 0 {
            parts.push(format!("offset={}", self.offset));
        }
        parts.join("&")
    }
}

/// Trait for torrent client backends.
///
/// Only the operations the dispatcher needs: list, create category, set
/// category. Implementations re-authenticate transparently.
#[async_trait]
pub trait TorrentClient: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// List all torrents, optionally filtered.
    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<Torrent>, TorrentClientError>;

    /// Create a category. Fails with `CategoryInvalid` if it already exists.
    async fn create_category(&self, name: &str) -> Result<(), TorrentClientError>;

    /// Assign a category to one torrent.
    async fn set_category(&self, hash: &str, category: &str) -> Result<(), TorrentClientError>;
}
