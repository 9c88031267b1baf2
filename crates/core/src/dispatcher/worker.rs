//! Check and unpack workers.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::Unpacker;
use crate::config::Categories;
use crate::queue::{JobKind, TorrentJob, TorrentQueue};
use crate::torrent_client::Torrent;

use super::action::Action;

/// Name of the per-torrent extraction log inside the destination directory.
pub const UNPACK_LOG_FILE: &str = "unpack.log";

/// Job receiver shared by all workers of one pool.
pub(crate) type SharedJobs = Arc<Mutex<mpsc::Receiver<TorrentJob>>>;

/// Everything a worker needs, shared by both pools.
pub(crate) struct WorkerContext {
    pub queue: Arc<TorrentQueue>,
    pub unpacker: Arc<dyn Unpacker>,
    pub actions: mpsc::Sender<Action>,
    pub categories: Categories,
    pub dest_path: PathBuf,
    pub cancel: CancellationToken,
}

/// How a job ended.
#[derive(Debug, PartialEq, Eq)]
enum Outcome {
    /// Move the torrent to this category.
    Finished(String),
    /// Shutdown interrupted the job.
    Cancelled,
}

/// Directory a torrent's content lives in.
pub fn content_path(torrent: &Torrent) -> PathBuf {
    Path::new(&torrent.save_path).join(&torrent.name)
}

/// Directory a torrent's archives are extracted into.
pub fn unpack_dest(dest_path: &Path, torrent: &Torrent) -> PathBuf {
    dest_path.join(&torrent.name)
}

impl WorkerContext {
    /// Post a category change. Returns false if shutdown interrupted the send.
    async fn request_category(&self, hash: &str, category: &str) -> bool {
        let action = Action::set_category(hash, category);
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.actions.send(action) => sent.is_ok(),
        }
    }

    async fn check(&self, torrent: &Torrent) -> Outcome {
        let path = content_path(torrent);
        match self.unpacker.scan(&path, &self.cancel).await {
            Ok(targets) if targets.is_empty() => {
                debug!(hash = %torrent.hash, path = %path.display(), "No archives found");
                Outcome::Finished(self.categories.no_archive.clone())
            }
            Ok(targets) => {
                info!(
                    hash = %torrent.hash,
                    archives = targets.len(),
                    "Found archives in {}",
                    torrent.name
                );
                Outcome::Finished(self.categories.default.clone())
            }
            Err(e) if e.is_cancelled() => Outcome::Cancelled,
            Err(e) => {
                error!(hash = %torrent.hash, error = %e, "Scan failed for {}", torrent.name);
                Outcome::Finished(self.categories.error.clone())
            }
        }
    }

    async fn unpack(&self, torrent: &Torrent) -> Outcome {
        let path = content_path(torrent);
        let targets = match self.unpacker.scan(&path, &self.cancel).await {
            Ok(targets) => targets,
            Err(e) if e.is_cancelled() => return Outcome::Cancelled,
            Err(e) => {
                error!(hash = %torrent.hash, error = %e, "Scan failed for {}", torrent.name);
                return Outcome::Finished(self.categories.error.clone());
            }
        };
        if targets.is_empty() {
            info!(hash = %torrent.hash, "Nothing to unpack in {}", torrent.name);
            return Outcome::Finished(self.categories.no_archive.clone());
        }

        let dest = unpack_dest(&self.dest_path, torrent);
        let log = match open_log(&dest).await {
            Ok(log) => log,
            Err(e) => {
                error!(
                    hash = %torrent.hash,
                    dest = %dest.display(),
                    error = %e,
                    "Failed to prepare destination"
                );
                return Outcome::Finished(self.categories.error.clone());
            }
        };

        if !self
            .request_category(&torrent.hash, &self.categories.unpack_busy)
            .await
        {
            return Outcome::Cancelled;
        }

        // Sequential so the log reads in order
        let mut failed = 0;
        for target in &targets {
            match self
                .unpacker
                .extract(target, &dest, &log, &self.cancel)
                .await
            {
                Ok(()) => {
                    info!(hash = %torrent.hash, archive = %target.path.display(), "Extracted")
                }
                Err(e) if e.is_cancelled() => return Outcome::Cancelled,
                Err(e) => {
                    warn!(
                        hash = %torrent.hash,
                        archive = %target.path.display(),
                        error = %e,
                        "Extraction failed"
                    );
                    failed += 1;
                }
            }
        }

        if failed == 0 {
            info!(
                hash = %torrent.hash,
                archives = targets.len(),
                dest = %dest.display(),
                "Unpacked {}",
                torrent.name
            );
            Outcome::Finished(self.categories.unpack_done.clone())
        } else {
            warn!(
                hash = %torrent.hash,
                failed,
                total = targets.len(),
                "Unpack failed for {}",
                torrent.name
            );
            Outcome::Finished(self.categories.error.clone())
        }
    }
}

/// Create the destination directory and open its log for appending.
async fn open_log(dest: &Path) -> std::io::Result<File> {
    tokio::fs::create_dir_all(dest).await?;
    let log = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dest.join(UNPACK_LOG_FILE))
        .await?;
    Ok(log.into_std().await)
}

/// Pull jobs until shutdown.
pub(crate) async fn run(ctx: Arc<WorkerContext>, kind: JobKind, id: usize, jobs: SharedJobs) {
    debug!(worker = id, kind = %kind, "Worker started");

    loop {
        let job = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            job = async { jobs.lock().await.recv().await } => match job {
                Some(job) => job,
                None => break,
            },
        };

        let torrent = Arc::clone(&job.torrent);
        debug!(worker = id, kind = %kind, hash = %torrent.hash, "Processing {}", torrent.name);

        let outcome = match job.kind {
            JobKind::Check => ctx.check(&torrent).await,
            JobKind::Unpack => ctx.unpack(&torrent).await,
        };

        let category = match outcome {
            Outcome::Finished(category) => category,
            Outcome::Cancelled => {
                debug!(worker = id, hash = %torrent.hash, "Job interrupted by shutdown");
                break;
            }
        };

        if !ctx.request_category(&torrent.hash, &category).await {
            break;
        }
        ctx.queue.job_done(&torrent.hash);
    }

    debug!(worker = id, kind = %kind, "Worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveFormat, ArchiveTarget};
    use crate::queue::{JobReceivers, QueueStatus};
    use crate::testing::{fixtures::torrent_in, MockUnpacker};
    use tempfile::TempDir;

    struct Harness {
        ctx: Arc<WorkerContext>,
        unpacker: Arc<MockUnpacker>,
        actions: mpsc::Receiver<Action>,
        jobs: JobReceivers,
        _dest: TempDir,
    }

    fn harness() -> Harness {
        let dest = TempDir::new().unwrap();
        let unpacker = Arc::new(MockUnpacker::new());
        let (queue, jobs) = TorrentQueue::new("Unpack");
        let (tx, actions) = mpsc::channel(10);
        let ctx = Arc::new(WorkerContext {
            queue: Arc::new(queue),
            unpacker: unpacker.clone(),
            actions: tx,
            categories: Categories::default(),
            dest_path: dest.path().to_path_buf(),
            cancel: CancellationToken::new(),
        });
        Harness {
            ctx,
            unpacker,
            actions,
            jobs,
            _dest: dest,
        }
    }

    /// Queue `torrent` and hand its job to a single-job pool.
    async fn single_job(h: &mut Harness, torrent: Torrent) -> SharedJobs {
        h.ctx.queue.update(vec![torrent]);
        let job = h.jobs.check.recv().await.unwrap();
        let (tx, rx) = mpsc::channel(1);
        tx.send(job).await.unwrap();
        Arc::new(Mutex::new(rx))
    }

    fn zip(path: &str) -> ArchiveTarget {
        ArchiveTarget::new(ArchiveFormat::Zip, path)
    }

    #[test]
    fn test_paths() {
        let torrent = torrent_in("h1", "", "/downloads/");
        assert_eq!(content_path(&torrent), PathBuf::from("/downloads/torrent-h1"));
        assert_eq!(
            unpack_dest(Path::new("/unpacked"), &torrent),
            PathBuf::from("/unpacked/torrent-h1")
        );
    }

    #[tokio::test]
    async fn test_check_without_archives() {
        let h = harness();
        let torrent = torrent_in("h1", "", "/dl");
        assert_eq!(h.ctx.check(&torrent).await, Outcome::Finished("NoArchive".into()));
        assert_eq!(h.unpacker.scanned().await, vec![PathBuf::from("/dl/torrent-h1")]);
    }

    #[tokio::test]
    async fn test_check_with_archives() {
        let h = harness();
        h.unpacker
            .set_targets("/dl/torrent-h1", vec![zip("/dl/torrent-h1/a.zip")])
            .await;
        let torrent = torrent_in("h1", "", "/dl");
        assert_eq!(h.ctx.check(&torrent).await, Outcome::Finished("Completed".into()));
    }

    #[tokio::test]
    async fn test_check_scan_error() {
        let h = harness();
        h.unpacker.fail_scan("/dl/torrent-h1", "boom").await;
        let torrent = torrent_in("h1", "", "/dl");
        assert_eq!(h.ctx.check(&torrent).await, Outcome::Finished("Error".into()));
    }

    #[tokio::test]
    async fn test_unpack_success_sets_busy_first() {
        let mut h = harness();
        h.unpacker
            .set_targets(
                "/dl/torrent-h1",
                vec![zip("/dl/torrent-h1/a.zip"), zip("/dl/torrent-h1/b.zip")],
            )
            .await;
        let torrent = torrent_in("h1", "Unpack", "/dl");

        assert_eq!(h.ctx.unpack(&torrent).await, Outcome::Finished("Unpacked".into()));
        assert_eq!(
            h.actions.try_recv().unwrap(),
            Action::set_category("h1", "Unpacking")
        );

        let extractions = h.unpacker.extractions().await;
        assert_eq!(extractions.len(), 2);
        assert_eq!(extractions[0].dest, h.ctx.dest_path.join("torrent-h1"));

        let log_path = h.ctx.dest_path.join("torrent-h1").join(UNPACK_LOG_FILE);
        let log = std::fs::read_to_string(log_path).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_unpack_attempts_all_targets_after_failure() {
        let h = harness();
        h.unpacker
            .set_targets(
                "/dl/torrent-h1",
                vec![zip("/dl/torrent-h1/a.zip"), zip("/dl/torrent-h1/b.zip")],
            )
            .await;
        h.unpacker.fail_target("/dl/torrent-h1/a.zip").await;
        let torrent = torrent_in("h1", "Unpack", "/dl");

        assert_eq!(h.ctx.unpack(&torrent).await, Outcome::Finished("Error".into()));
        let extractions = h.unpacker.extractions().await;
        assert_eq!(extractions.len(), 2);
        assert!(!extractions[0].success);
        assert!(extractions[1].success);
    }

    #[tokio::test]
    async fn test_unpack_without_archives() {
        let mut h = harness();
        let torrent = torrent_in("h1", "Unpack", "/dl");

        assert_eq!(h.ctx.unpack(&torrent).await, Outcome::Finished("NoArchive".into()));
        assert!(h.actions.try_recv().is_err());
        assert!(!h.ctx.dest_path.join("torrent-h1").exists());
    }

    #[tokio::test]
    async fn test_unpack_log_error() {
        let h = harness();
        h.unpacker
            .set_targets("/dl/torrent-h1", vec![zip("/dl/torrent-h1/a.zip")])
            .await;
        // A file where the destination directory should go
        std::fs::write(h.ctx.dest_path.join("torrent-h1"), b"x").unwrap();
        let torrent = torrent_in("h1", "Unpack", "/dl");

        assert_eq!(h.ctx.unpack(&torrent).await, Outcome::Finished("Error".into()));
        assert!(h.unpacker.extractions().await.is_empty());
    }

    #[tokio::test]
    async fn test_worker_cancelled_mid_job_reports_nothing() {
        let mut h = harness();
        h.unpacker.set_scan_delay(std::time::Duration::from_secs(30)).await;
        let jobs = single_job(&mut h, torrent_in("h1", "", "/dl")).await;

        let worker = tokio::spawn(run(Arc::clone(&h.ctx), JobKind::Check, 0, jobs));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        h.ctx.cancel.cancel();
        worker.await.unwrap();

        assert!(h.actions.try_recv().is_err());
        assert_eq!(h.ctx.queue.get("h1").unwrap().status, QueueStatus::Queued);
    }

    #[tokio::test]
    async fn test_worker_reports_and_marks_done() {
        let mut h = harness();
        let jobs = single_job(&mut h, torrent_in("h1", "", "/dl")).await;
        assert_eq!(h.ctx.queue.get("h1").unwrap().status, QueueStatus::Queued);

        let worker = tokio::spawn(run(Arc::clone(&h.ctx), JobKind::Check, 0, jobs));
        assert_eq!(
            h.actions.recv().await.unwrap(),
            Action::set_category("h1", "NoArchive")
        );
        // job_done follows the post
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(h.ctx.queue.get("h1").unwrap().status, QueueStatus::Idle);

        h.ctx.cancel.cancel();
        worker.await.unwrap();
    }
}
