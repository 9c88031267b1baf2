//! Mock unpacker for testing.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::archive::{ArchiveTarget, ExtractError, ScanError, Unpacker};

/// A recorded extraction for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedExtraction {
    pub target: ArchiveTarget,
    pub dest: PathBuf,
    pub success: bool,
}

#[derive(Debug, Clone)]
enum ScanOutcome {
    Targets(Vec<ArchiveTarget>),
    Fail(String),
}

/// Mock implementation of the Unpacker trait.
///
/// Scans answer from a per-path table (unknown paths hold no archives);
/// extractions are recorded and write one line to the log.
///
/// # Example
///
/// ```rust,ignore
/// let unpacker = MockUnpacker::new();
/// let target = ArchiveTarget::new(ArchiveFormat::Zip, "/downloads/show/a.zip");
/// unpacker.set_targets("/downloads/show", vec![target]).await;
/// unpacker.fail_target("/downloads/show/a.zip").await;
/// ```
#[derive(Debug, Default)]
pub struct MockUnpacker {
    scans: Arc<RwLock<HashMap<PathBuf, ScanOutcome>>>,
    failing: Arc<RwLock<HashSet<PathBuf>>>,
    extractions: Arc<RwLock<Vec<RecordedExtraction>>>,
    scanned: Arc<RwLock<Vec<PathBuf>>>,
    scan_delay: Arc<RwLock<Option<Duration>>>,
    extract_delay: Arc<RwLock<Option<Duration>>>,
}

impl MockUnpacker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Targets reported when `path` is scanned.
    pub async fn set_targets(&self, path: impl Into<PathBuf>, targets: Vec<ArchiveTarget>) {
        self.scans
            .write()
            .await
            .insert(path.into(), ScanOutcome::Targets(targets));
    }

    /// Make scanning `path` fail.
    pub async fn fail_scan(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        self.scans
            .write()
            .await
            .insert(path.into(), ScanOutcome::Fail(reason.into()));
    }

    /// Make extracting the target at `path` fail.
    pub async fn fail_target(&self, path: impl Into<PathBuf>) {
        self.failing.write().await.insert(path.into());
    }

    /// Delay every scan; cancellation during the delay yields `Cancelled`.
    pub async fn set_scan_delay(&self, delay: Duration) {
        *self.scan_delay.write().await = Some(delay);
    }

    /// Delay every extraction; cancellation during the delay yields `Cancelled`.
    pub async fn set_extract_delay(&self, delay: Duration) {
        *self.extract_delay.write().await = Some(delay);
    }

    pub async fn extractions(&self) -> Vec<RecordedExtraction> {
        self.extractions.read().await.clone()
    }

    /// Paths scanned so far, in order.
    pub async fn scanned(&self) -> Vec<PathBuf> {
        self.scanned.read().await.clone()
    }

    async fn pause(delay: Option<Duration>, cancel: &CancellationToken) -> bool {
        let Some(delay) = delay else {
            return !cancel.is_cancelled();
        };
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

#[async_trait]
impl Unpacker for MockUnpacker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn scan(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<ArchiveTarget>, ScanError> {
        self.scanned.write().await.push(path.to_path_buf());

        let delay = *self.scan_delay.read().await;
        if !Self::pause(delay, cancel).await {
            return Err(ScanError::Cancelled);
        }

        match self.scans.read().await.get(path) {
            Some(ScanOutcome::Targets(targets)) => Ok(targets.clone()),
            Some(ScanOutcome::Fail(reason)) => Err(ScanError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::other(reason.clone()),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn extract(
        &self,
        target: &ArchiveTarget,
        dest: &Path,
        log: &File,
        cancel: &CancellationToken,
    ) -> Result<(), ExtractError> {
        let delay = *self.extract_delay.read().await;
        if !Self::pause(delay, cancel).await {
            return Err(ExtractError::Cancelled);
        }

        let success = !self.failing.read().await.contains(&target.path);
        let mut log = log;
        writeln!(
            log,
            "{} {} -> {}",
            if success { "extracted" } else { "failed" },
            target.path.display(),
            dest.display()
        )?;

        self.extractions.write().await.push(RecordedExtraction {
            target: target.clone(),
            dest: dest.to_path_buf(),
            success,
        });

        if success {
            Ok(())
        } else {
            Err(ExtractError::ToolFailed {
                tool: target.format.command().to_string(),
                code: Some(2),
            })
        }
    }
}
