//! qBittorrent torrent client implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::QBittorrentConfig;

use super::{Torrent, TorrentClient, TorrentClientError, TorrentFilter};

/// qBittorrent client implementation.
pub struct QBittorrentClient {
    client: Client,
    config: QBittorrentConfig,
    /// Whether the cookie jar currently holds a valid session (refreshed on 403).
    session: Arc<RwLock<bool>>,
}

impl QBittorrentClient {
    /// Create a new qBittorrent client.
    pub fn new(config: QBittorrentConfig) -> Result<Self, TorrentClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .cookie_store(true)
            .build()
            .map_err(|e| TorrentClientError::Internal(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            session: Arc::new(RwLock::new(false)),
        })
    }

    /// Get the base URL without trailing slash.
    fn base_url(&self) -> &str {
        self.config.url.trim_end_matches('/')
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url(), endpoint)
    }

    /// Login and store session cookie.
    async fn login(&self) -> Result<(), TorrentClientError> {
        let params = [
            ("username", self.config.username.as_str()),
            ("password", self.config.password.as_str()),
        ];

        let response = self
            .client
            .post(self.url("/api/v2/auth/login"))
            .header(REFERER, self.base_url())
            .form(&params)
            .send()
            .await
            .map_err(map_transport_error)?;

        // qBittorrent answers a login from a banned IP with 403
        if response.status() == StatusCode::FORBIDDEN {
            return Err(TorrentClientError::Banned);
        }

        let body = response.text().await.unwrap_or_default();
        if body.contains("Ok.") {
            debug!("qBittorrent login successful");
            // Session cookie is stored by the cookie jar
            *self.session.write().await = true;
            Ok(())
        } else if body.contains("Fails.") {
            Err(TorrentClientError::AuthenticationFailed(
                "Invalid credentials".to_string(),
            ))
        } else {
            Err(TorrentClientError::AuthenticationFailed(format!(
                "Unexpected response: {}",
                body.chars().take(100).collect::<String>()
            )))
        }
    }

    /// Ensure we have a valid session, logging in if needed.
    async fn ensure_authenticated(&self) -> Result<(), TorrentClientError> {
        if !self.config.has_user() || *self.session.read().await {
            return Ok(());
        }
        self.login().await
    }

    /// Send a request, re-authenticating once if the session expired.
    async fn send<F>(&self, build: F) -> Result<Response, TorrentClientError>
    where
        F: Fn() -> RequestBuilder,
    {
        self.ensure_authenticated().await?;

        let response = build().send().await.map_err(map_transport_error)?;
        if response.status() != StatusCode::FORBIDDEN {
            return Ok(response);
        }
        if !self.config.has_user() {
            return Err(TorrentClientError::Forbidden);
        }

        warn!("qBittorrent session expired, re-authenticating");
        *self.session.write().await = false;
        self.login().await?;

        let response = build().send().await.map_err(map_transport_error)?;
        if response.status() == StatusCode::FORBIDDEN {
            *self.session.write().await = false;
            return Err(TorrentClientError::Forbidden);
        }
        Ok(response)
    }

    /// POST a form to an endpoint.
    async fn post_form(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<Response, TorrentClientError> {
        let url = self.url(endpoint);
        self.send(|| {
            self.client
                .post(&url)
                .header(REFERER, self.base_url())
                .form(params)
        })
        .await
    }
}

fn map_transport_error(e: reqwest::Error) -> TorrentClientError {
    if e.is_timeout() {
        TorrentClientError::Timeout
    } else if e.is_connect() {
        TorrentClientError::ConnectionFailed(e.to_string())
    } else {
        TorrentClientError::ApiError(e.to_string())
    }
}

/// qBittorrent torrent info response.
#[derive(Debug, Deserialize)]
struct QBTorrentInfo {
    hash: String,
    name: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    progress: f64,
    #[serde(default)]
    size: i64,
    #[serde(default)]
    completed: i64,
    #[serde(default)]
    added_on: i64,
    #[serde(default)]
    completion_on: i64,
    #[serde(default)]
    save_path: String,
    #[serde(default)]
    category: String,
}

impl QBTorrentInfo {
    fn into_torrent(self) -> Torrent {
        Torrent {
            hash: self.hash.to_lowercase(),
            name: self.name,
            save_path: self.save_path,
            category: self.category,
            size: self.size.max(0) as u64,
            completed: self.completed.max(0) as u64,
            progress: self.progress,
            state: self.state,
            added_at: timestamp_to_datetime(self.added_on),
            completed_at: timestamp_to_datetime(self.completion_on),
        }
    }
}

/// Convert Unix timestamp to DateTime<Utc>.
fn timestamp_to_datetime(ts: i64) -> Option<DateTime<Utc>> {
    if ts > 0 {
        Utc.timestamp_opt(ts, 0).single()
    } else {
        None
    }
}

fn parse_torrent_list(body: &str) -> Result<Vec<Torrent>, TorrentClientError> {
    let torrents: Vec<QBTorrentInfo> = serde_json::from_str(body)
        .map_err(|e| TorrentClientError::ApiError(format!("Failed to parse response: {}", e)))?;
    Ok(torrents.into_iter().map(QBTorrentInfo::into_torrent).collect())
}

#[async_trait]
impl TorrentClient for QBittorrentClient {
    fn name(&self) -> &str {
        "qbittorrent"
    }

    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<Torrent>, TorrentClientError> {
        let mut url = self.url("/api/v2/torrents/info");
        if !filter.is_empty() {
            url.push('?');
            url.push_str(&filter.to_query());
        }

        let response = self
            .send(|| self.client.get(&url).header(REFERER, self.base_url()))
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TorrentClientError::ApiError(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(map_transport_error)?;
        parse_torrent_list(&body)
    }

    async fn create_category(&self, name: &str) -> Result<(), TorrentClientError> {
        let response = self
            .post_form("/api/v2/torrents/createCategory", &[("category", name)])
            .await?;

        match response.status() {
            StatusCode::BAD_REQUEST => Err(TorrentClientError::CategoryEmpty),
            StatusCode::CONFLICT => Err(TorrentClientError::CategoryInvalid(name.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(TorrentClientError::ApiError(format!("HTTP {}", status))),
        }
    }

    async fn set_category(&self, hash: &str, category: &str) -> Result<(), TorrentClientError> {
        let hash_lower = hash.to_lowercase();
        let response = self
            .post_form(
                "/api/v2/torrents/setCategory",
                &[("hashes", hash_lower.as_str()), ("category", category)],
            )
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Err(TorrentClientError::CategoryUnknown(category.to_string())),
            status if status.is_success() => Ok(()),
            status => Err(TorrentClientError::ApiError(format!("HTTP {}", status))),
        }
    }
}
