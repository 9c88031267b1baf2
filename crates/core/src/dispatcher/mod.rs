//! Job dispatch: the action loop and the worker pools.
//!
//! The `Dispatcher` is the only component that talks to the torrent client.
//! Everything it does arrives as an [`Action`] on one bounded inbox and is
//! handled strictly one at a time:
//! - **GetTorrents**: poll the client, feed the queue, schedule the next poll
//! - **AddCategory**: create a category (existing ones are fine)
//! - **SetCategory**: move a torrent to a category, posted by the workers
//! - **DeQueue**: reset a hash in the queue
//!
//! Remote calls that time out are retried according to [`RetryPolicy`]; any
//! other remote error stops the loop and is returned from [`Dispatcher::run`].
//!
//! # Example
//!
//! ```rust,ignore
//! let observer: Arc<dyn QueueObserver> = Arc::new(LoggingObserver);
//! let dispatcher = Dispatcher::new(
//!     DispatcherConfig::from_config(&config),
//!     client,
//!     unpacker,
//!     Some(observer),
//! );
//! let handle = dispatcher.handle();
//!
//! let cancel = CancellationToken::new();
//! tokio::spawn(dispatcher.run(cancel.clone()));
//! handle.trigger_poll().await?;
//! ```

mod action;
mod error;
mod retry;
mod runner;
mod worker;

pub use action::{Action, DispatcherHandle, ACTION_QUEUE_CAPACITY};
pub use error::DispatchError;
pub use retry::RetryPolicy;
pub use runner::{Dispatcher, DispatcherConfig};
pub use worker::{content_path, unpack_dest, UNPACK_LOG_FILE};
