//! Unpacker backed by the unrar, unzip and 7z command line tools.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use walkdir::WalkDir;

use super::error::{ExtractError, ScanError};
use super::format::{ArchiveFormat, Volume, VolumeKey};
use super::traits::Unpacker;
use super::types::ArchiveTarget;

/// Extracts archives by spawning external tools.
///
/// Only formats whose tool was found are scanned for, so a download holding
/// nothing but unsupported archives is reported as having none.
#[derive(Debug, Clone)]
pub struct CommandUnpacker {
    tools: BTreeMap<ArchiveFormat, PathBuf>,
}

impl CommandUnpacker {
    /// Look up the extraction tools on the PATH.
    pub fn detect() -> Result<Self, ExtractError> {
        let mut tools = BTreeMap::new();
        for format in ArchiveFormat::ALL {
            match which::which(format.command()) {
                Ok(path) => {
                    debug!(format = %format, tool = %path.display(), "Found extraction tool");
                    tools.insert(format, path);
                }
                Err(_) => debug!(
                    format = %format,
                    tool = format.command(),
                    "Extraction tool not found"
                ),
            }
        }
        Self::with_tools(tools)
    }

    /// Use an explicit tool per format.
    pub fn with_tools(
        tools: impl IntoIterator<Item = (ArchiveFormat, PathBuf)>,
    ) -> Result<Self, ExtractError> {
        let tools: BTreeMap<_, _> = tools.into_iter().collect();
        if tools.is_empty() {
            return Err(ExtractError::NoToolsInstalled);
        }
        Ok(Self { tools })
    }

    /// Formats this unpacker can handle.
    pub fn formats(&self) -> Vec<ArchiveFormat> {
        self.tools.keys().copied().collect()
    }
}

/// Walk `root` and group matching files into extraction units.
fn scan_tree(
    root: &Path,
    formats: &[ArchiveFormat],
    cancel: &CancellationToken,
) -> Result<Vec<ArchiveTarget>, ScanError> {
    let mut units: HashMap<VolumeKey, Volume> = HashMap::new();

    for entry in WalkDir::new(root).follow_links(true) {
        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        let entry = entry.map_err(|e| ScanError::Io {
            path: e.path().unwrap_or(root).to_path_buf(),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(volume) = ArchiveFormat::identify(entry.path()) else {
            continue;
        };
        if !formats.contains(&volume.key.format) {
            continue;
        }

        let better = units
            .get(&volume.key)
            .map_or(true, |best| volume.rank < best.rank);
        if better {
            units.insert(volume.key.clone(), volume);
        }
    }

    let mut targets: Vec<ArchiveTarget> = units
        .into_values()
        .map(|v| ArchiveTarget::new(v.key.format, v.path))
        .collect();
    targets.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(targets)
}

#[async_trait]
impl Unpacker for CommandUnpacker {
    fn name(&self) -> &str {
        "command"
    }

    async fn scan(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveTarget>, ScanError> {
        let root = path.to_path_buf();
        let formats = self.formats();
        let token = cancel.clone();

        tokio::task::spawn_blocking(move || scan_tree(&root, &formats, &token))
            .await
            .map_err(|e| ScanError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(e),
            })?
    }

    async fn extract(
        &self,
        target: &ArchiveTarget,
        dest: &Path,
        log: &File,
        cancel: &CancellationToken,
    ) -> Result<(), ExtractError> {
        let tool = self
            .tools
            .get(&target.format)
            .ok_or_else(|| ExtractError::ToolMissing {
                tool: target.format.command().to_string(),
            })?;
        let args = target.format.extract_args(&target.path, dest);

        info!(
            archive = %target.path.display(),
            dest = %dest.display(),
            tool = %tool.display(),
            "Extracting"
        );

        let mut child = Command::new(tool)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log.try_clone()?))
            .stderr(Stdio::from(log.try_clone()?))
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractError::ToolMissing {
                        tool: tool.display().to_string(),
                    }
                } else {
                    ExtractError::Io(e)
                }
            })?;

        let status = tokio::select! {
            _ = cancel.cancelled() => None,
            status = child.wait() => Some(status),
        };

        let Some(status) = status else {
            let _ = child.kill().await;
            return Err(ExtractError::Cancelled);
        };
        let status = status?;

        if status.success() || target.format.is_benign_exit(status.code()) {
            debug!(archive = %target.path.display(), code = ?status.code(), "Extraction finished");
            Ok(())
        } else {
            Err(ExtractError::ToolFailed {
                tool: target.format.command().to_string(),
                code: status.code(),
            })
        }
    }
}
