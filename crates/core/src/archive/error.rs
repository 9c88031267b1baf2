//! Error types for the archive module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while searching a download for archives.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Walking the directory tree failed.
    #[error("Failed to scan {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan was interrupted by shutdown.
    #[error("Scan cancelled")]
    Cancelled,
}

impl ScanError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Errors while extracting a single archive.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// None of the supported extraction tools is on the PATH.
    #[error("No extraction tools installed (looked for unrar, unzip, 7z)")]
    NoToolsInstalled,

    /// The tool required by this archive format is not available.
    #[error("Extraction tool not found: {tool}")]
    ToolMissing { tool: String },

    /// The tool ran but reported failure.
    #[error("{tool} failed with exit code {code:?}")]
    ToolFailed { tool: String, code: Option<i32> },

    /// The extraction was interrupted by shutdown.
    #[error("Extraction cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
