//! The serialized action loop.

use std::collections::VecDeque;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::archive::Unpacker;
use crate::config::{Categories, Config};
use crate::queue::{
    JobKind, JobReceivers, QueueObserver, TorrentJob, TorrentQueue, JOB_QUEUE_CAPACITY,
};
use crate::torrent_client::{TorrentClient, TorrentClientError, TorrentFilter};

use super::action::{Action, DispatcherHandle, ACTION_QUEUE_CAPACITY};
use super::error::DispatchError;
use super::retry::RetryPolicy;
use super::worker::{self, SharedJobs, WorkerContext};

/// Runtime settings of the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Root directory unpacked torrents are written under.
    pub dest_path: PathBuf,
    pub categories: Categories,
    /// Time allowed for each remote call attempt.
    pub poll_timeout: Duration,
    /// Delay between successful polls.
    pub poll_delay: Duration,
    pub unpack_workers: usize,
    pub check_workers: usize,
    /// Capacity of each job queue.
    pub job_capacity: usize,
    pub retry: RetryPolicy,
}

impl DispatcherConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dest_path: config.dest_path.clone(),
            categories: config.categories.clone(),
            poll_timeout: config.polling.timeout(),
            poll_delay: config.polling.delay(),
            unpack_workers: config.workers.unpack,
            check_workers: config.workers.check,
            job_capacity: JOB_QUEUE_CAPACITY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Owns the torrent queue, the worker pools and the only connection to the
/// torrent client.
///
/// All remote calls go through one loop, one action at a time. Workers never
/// talk to the client; they post `SetCategory` actions instead.
pub struct Dispatcher {
    config: DispatcherConfig,
    client: Arc<dyn TorrentClient>,
    unpacker: Arc<dyn Unpacker>,
    queue: Arc<TorrentQueue>,
    jobs: JobReceivers,
    actions_tx: mpsc::Sender<Action>,
    actions_rx: mpsc::Receiver<Action>,
}

impl Dispatcher {
    /// `observer`, when given, receives the queue lifecycle hooks.
    pub fn new(
        config: DispatcherConfig,
        client: Arc<dyn TorrentClient>,
        unpacker: Arc<dyn Unpacker>,
        observer: Option<Arc<dyn QueueObserver>>,
    ) -> Self {
        let (queue, jobs) = TorrentQueue::with_capacity(
            config.categories.unpack_start.clone(),
            config.job_capacity,
        );
        let queue = match observer {
            Some(observer) => queue.with_observer(observer),
            None => queue,
        };
        let (actions_tx, actions_rx) = mpsc::channel(ACTION_QUEUE_CAPACITY);

        Self {
            config,
            client,
            unpacker,
            queue: Arc::new(queue),
            jobs,
            actions_tx,
            actions_rx,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        DispatcherHandle::new(self.actions_tx.clone())
    }

    pub fn queue(&self) -> Arc<TorrentQueue> {
        Arc::clone(&self.queue)
    }

    /// Run until `cancel` fires or a fatal error occurs.
    ///
    /// Returns `Ok(())` when cancelled between actions. Workers are stopped
    /// and joined before this returns.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), DispatchError> {
        let Dispatcher {
            config,
            client,
            unpacker,
            queue,
            jobs,
            actions_tx,
            mut actions_rx,
        } = self;

        info!(
            client = client.name(),
            unpacker = unpacker.name(),
            unpack_workers = config.unpack_workers,
            check_workers = config.check_workers,
            "Dispatcher starting"
        );

        // Keeps the inbox open while both worker pools are disabled
        let inbox_guard = actions_tx.clone();

        let worker_cancel = cancel.child_token();
        let ctx = Arc::new(WorkerContext {
            queue: Arc::clone(&queue),
            unpacker,
            actions: actions_tx,
            categories: config.categories.clone(),
            dest_path: config.dest_path.clone(),
            cancel: worker_cancel.clone(),
        });

        let mut workers = JoinSet::new();
        spawn_pool(&mut workers, &ctx, JobKind::Unpack, config.unpack_workers, jobs.unpack);
        spawn_pool(&mut workers, &ctx, JobKind::Check, config.check_workers, jobs.check);
        drop(ctx);

        let actions = ActionLoop {
            config: &config,
            client: client.as_ref(),
            queue: &queue,
            cancel: &cancel,
        };
        let result = actions.run(&mut actions_rx).await;

        match &result {
            Ok(()) => info!("Dispatcher stopping"),
            Err(DispatchError::Cancelled) => info!("Dispatcher cancelled during a remote call"),
            Err(DispatchError::Remote(e)) if e.is_auth_failure() => {
                error!(error = %e, "qBittorrent rejected the session, check the credentials")
            }
            Err(e) => error!(error = %e, "Dispatcher stopped on fatal error"),
        }

        drop(inbox_guard);
        drop(actions_rx);
        worker_cancel.cancel();
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                warn!("Worker task failed: {}", e);
            }
        }
        debug!("All workers stopped");

        result
    }
}

fn spawn_pool(
    workers: &mut JoinSet<()>,
    ctx: &Arc<WorkerContext>,
    kind: JobKind,
    size: usize,
    jobs: mpsc::Receiver<TorrentJob>,
) {
    if size == 0 {
        // Dropping the receiver closes the queue, so no jobs of this kind are created
        info!(kind = %kind, "Worker pool disabled");
        return;
    }
    let jobs: SharedJobs = Arc::new(Mutex::new(jobs));
    for id in 0..size {
        workers.spawn(worker::run(Arc::clone(ctx), kind, id, Arc::clone(&jobs)));
    }
}

/// Sleep until `at`, or forever when no poll is scheduled.
async fn poll_due(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

struct ActionLoop<'a> {
    config: &'a DispatcherConfig,
    client: &'a dyn TorrentClient,
    queue: &'a TorrentQueue,
    cancel: &'a CancellationToken,
}

impl ActionLoop<'_> {
    async fn run(&self, inbox: &mut mpsc::Receiver<Action>) -> Result<(), DispatchError> {
        let mut startup: VecDeque<Action> = self
            .config
            .categories
            .all()
            .iter()
            .map(|name| Action::AddCategory(name.to_string()))
            .collect();
        startup.push_back(Action::GetTorrents);

        let mut next_poll: Option<Instant> = None;

        loop {
            let action = match startup.pop_front() {
                Some(action) => action,
                None => tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return Ok(()),
                    action = inbox.recv() => match action {
                        Some(action) => action,
                        None => return Ok(()),
                    },
                    _ = poll_due(next_poll) => {
                        next_poll = None;
                        Action::GetTorrents
                    }
                },
            };

            debug!(action = action.name(), "Processing action: {}", action);

            match action {
                Action::GetTorrents => {
                    let filter = TorrentFilter::new();
                    let torrents = self
                        .call("get torrents", || self.client.list_torrents(&filter))
                        .await?;
                    debug!(count = torrents.len(), "Polled torrents");
                    self.queue.update(torrents);
                    next_poll = Some(Instant::now() + self.config.poll_delay);
                }
                Action::AddCategory(name) => {
                    match self
                        .call("add category", || self.client.create_category(&name))
                        .await
                    {
                        Ok(()) => info!(category = %name, "Category created"),
                        Err(DispatchError::Remote(TorrentClientError::CategoryInvalid(_))) => {
                            debug!(category = %name, "Category already exists")
                        }
                        Err(e) => return Err(e),
                    }
                }
                Action::SetCategory { hash, category } => {
                    self.call("set category", || self.client.set_category(&hash, &category))
                        .await?;
                    info!(hash = %hash, category = %category, "Category set");
                }
                Action::DeQueue(hash) => {
                    debug!(hash = %hash, "Dequeue");
                    self.queue.job_done(&hash);
                }
            }
        }
    }

    /// Run one remote call, retrying timeouts per the retry policy.
    async fn call<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TorrentClientError>>,
    {
        let retry = self.config.retry;
        let mut timeouts = 0u32;

        loop {
            let attempt = tokio::select! {
                _ = self.cancel.cancelled() => return Err(DispatchError::Cancelled),
                attempt = tokio::time::timeout(self.config.poll_timeout, op()) => attempt,
            };

            match attempt {
                Ok(Ok(value)) => return Ok(value),
                Ok(Err(e)) if !e.is_timeout() => return Err(DispatchError::Remote(e)),
                Ok(Err(_)) | Err(_) => {}
            }

            timeouts += 1;
            if retry.should_log(timeouts) {
                warn!(attempt = timeouts, "Timeout during {}, retrying", what);
            }
            if !retry.should_retry(timeouts) {
                return Err(DispatchError::Remote(TorrentClientError::Timeout));
            }
        }
    }
}
