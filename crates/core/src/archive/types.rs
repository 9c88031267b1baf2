//! Types for the archive module.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::format::ArchiveFormat;

/// One extraction unit found in a download.
///
/// For multi-volume sets `path` is the first volume; the tool picks up the
/// remaining volumes itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveTarget {
    pub format: ArchiveFormat,
    pub path: PathBuf,
}

impl ArchiveTarget {
    pub fn new(format: ArchiveFormat, path: impl Into<PathBuf>) -> Self {
        Self {
            format,
            path: path.into(),
        }
    }
}

impl fmt::Display for ArchiveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.path.display(), self.format)
    }
}
