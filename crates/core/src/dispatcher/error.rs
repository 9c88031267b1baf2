use thiserror::Error;

use crate::torrent_client::TorrentClientError;

/// Errors that stop the dispatcher.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The torrent client failed in a way that is not retried.
    #[error("Torrent client error: {0}")]
    Remote(#[from] TorrentClientError),

    /// The run scope was cancelled while a remote call was pending.
    #[error("Dispatcher cancelled")]
    Cancelled,

    /// The dispatcher is no longer running.
    #[error("Dispatcher stopped")]
    Stopped,
}

impl DispatchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
