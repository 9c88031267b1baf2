//! Trait definitions for the archive module.

use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::{ExtractError, ScanError};
use super::types::ArchiveTarget;

/// Finds and extracts archives inside completed downloads.
#[async_trait]
pub trait Unpacker: Send + Sync {
    /// Returns the name of this unpacker implementation.
    fn name(&self) -> &str;

    /// Recursively search `path` (a file or a directory) for archives.
    ///
    /// Returns one target per extraction unit, sorted by path. An empty
    /// result means the download holds no archive.
    async fn scan(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveTarget>, ScanError>;

    /// Extract one target into `dest`, writing tool output to `log`.
    async fn extract(
        &self,
        target: &ArchiveTarget,
        dest: &Path,
        log: &File,
        cancel: &CancellationToken,
    ) -> Result<(), ExtractError>;
}
