use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Root directory that receives extracted torrents.
    #[serde(default)]
    pub dest_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temp_path: Option<PathBuf>,
    /// Log file; logs go to stderr when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    #[serde(default)]
    pub qbittorrent: QBittorrentConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub workers: WorkersConfig,
    #[serde(default)]
    pub categories: Categories,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dest_path: PathBuf::new(),
            temp_path: None,
            log_path: None,
            qbittorrent: QBittorrentConfig::default(),
            polling: PollingConfig::default(),
            workers: WorkersConfig::default(),
            categories: Categories::default(),
        }
    }
}

impl Config {
    /// Apply command line path overrides. Empty values are ignored.
    pub fn apply_overrides(&mut self, dest: Option<PathBuf>, temp: Option<PathBuf>) {
        if let Some(dest) = dest.filter(|p| !p.as_os_str().is_empty()) {
            self.dest_path = dest;
        }
        if let Some(temp) = temp.filter(|p| !p.as_os_str().is_empty()) {
            self.temp_path = Some(temp);
        }
    }
}

/// qBittorrent Web API connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QBittorrentConfig {
    /// Web UI URL (e.g., "http://localhost:8080")
    #[serde(default = "default_url")]
    pub url: String,
    /// Empty username disables authentication.
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// HTTP client timeout in seconds (default: 30)
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u32,
}

impl QBittorrentConfig {
    pub fn has_user(&self) -> bool {
        !self.username.is_empty()
    }
}

impl Default for QBittorrentConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_http_timeout(),
        }
    }
}

fn default_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

fn default_http_timeout() -> u32 {
    30
}

/// Poll cadence and per-call timeout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PollingConfig {
    /// Timeout applied to each remote call attempt, in seconds.
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u64,
    /// Delay between two torrent list polls, in seconds.
    #[serde(default = "default_poll_delay")]
    pub delay_secs: u64,
}

impl PollingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            delay_secs: default_poll_delay(),
        }
    }
}

fn default_poll_timeout() -> u64 {
    5
}

fn default_poll_delay() -> u64 {
    10
}

/// Worker pool sizes. Zero disables a stage.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkersConfig {
    #[serde(default = "default_workers")]
    pub unpack: usize,
    #[serde(default = "default_workers")]
    pub check: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            unpack: default_workers(),
            check: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    1
}

/// Category labels assigned by the daemon.
///
/// The category of a torrent is both its status display and the cursor of
/// the post-processing state machine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Categories {
    /// Check found at least one archive; waiting for promotion to `unpack_start`.
    #[serde(default = "default_category")]
    pub default: String,
    #[serde(default = "default_error")]
    pub error: String,
    #[serde(default = "default_no_archive")]
    pub no_archive: String,
    /// Set by a human or an external tool to request extraction.
    #[serde(default = "default_unpack_start")]
    pub unpack_start: String,
    #[serde(default = "default_unpack_busy")]
    pub unpack_busy: String,
    #[serde(default = "default_unpack_done")]
    pub unpack_done: String,
}

impl Categories {
    /// Every label, in the order they are created on the remote client.
    pub fn all(&self) -> [&str; 6] {
        [
            &self.default,
            &self.error,
            &self.no_archive,
            &self.unpack_busy,
            &self.unpack_done,
            &self.unpack_start,
        ]
    }
}

impl Default for Categories {
    fn default() -> Self {
        Self {
            default: default_category(),
            error: default_error(),
            no_archive: default_no_archive(),
            unpack_start: default_unpack_start(),
            unpack_busy: default_unpack_busy(),
            unpack_done: default_unpack_done(),
        }
    }
}

fn default_category() -> String {
    "Completed".to_string()
}

fn default_error() -> String {
    "Error".to_string()
}

fn default_no_archive() -> String {
    "NoArchive".to_string()
}

fn default_unpack_start() -> String {
    "Unpack".to_string()
}

fn default_unpack_busy() -> String {
    "Unpacking".to_string()
}

fn default_unpack_done() -> String {
    "Unpacked".to_string()
}
