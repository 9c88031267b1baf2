pub mod archive;
pub mod config;
pub mod dispatcher;
pub mod queue;
pub mod testing;
pub mod torrent_client;

pub use archive::{ArchiveFormat, ArchiveTarget, CommandUnpacker, ExtractError, ScanError, Unpacker};
pub use config::{
    load_config, load_config_from_str, validate_config, write_default_config, Categories, Config,
    ConfigError,
};
pub use dispatcher::{
    Action, DispatchError, Dispatcher, DispatcherConfig, DispatcherHandle, RetryPolicy,
};
pub use queue::{JobKind, LoggingObserver, QueueObserver, QueueStatus, TorrentJob, TorrentQueue};
pub use torrent_client::{QBittorrentClient, Torrent, TorrentClient, TorrentClientError};
