//! Mock torrent client for testing.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::torrent_client::{Torrent, TorrentClient, TorrentClientError, TorrentFilter};

/// Remote operations that can be scripted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    ListTorrents,
    CreateCategory,
    SetCategory,
}

/// One scripted reaction, consumed by the next call of its operation.
#[derive(Debug, Clone)]
enum Scripted {
    Fail(TorrentClientError),
    Delay(Duration),
}

/// A recorded set_category call for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCategoryChange {
    pub hash: String,
    pub category: String,
}

/// Mock implementation of the TorrentClient trait.
///
/// Behaves like a small in-memory qBittorrent:
/// - `set_category` changes the stored torrent, so the next poll sees it
/// - creating an existing category fails with `CategoryInvalid`
/// - errors and delays can be scripted per operation
///
/// # Example
///
/// ```rust,ignore
/// let client = MockTorrentClient::new();
/// client.add_torrent(fixtures::completed_torrent("abc", "")).await;
///
/// // Make the next poll time out once
/// client.push_delay(MockOperation::ListTorrents, Duration::from_secs(10)).await;
///
/// let changes = client.category_changes().await;
/// ```
#[derive(Debug, Default)]
pub struct MockTorrentClient {
    torrents: Arc<RwLock<BTreeMap<String, Torrent>>>,
    categories: Arc<RwLock<Vec<String>>>,
    changes: Arc<RwLock<Vec<RecordedCategoryChange>>>,
    scripted: Arc<RwLock<HashMap<MockOperation, VecDeque<Scripted>>>>,
    calls: Arc<RwLock<HashMap<MockOperation, usize>>>,
    list_count: AtomicUsize,
}

impl MockTorrentClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a torrent.
    pub async fn add_torrent(&self, torrent: Torrent) {
        self.torrents
            .write()
            .await
            .insert(torrent.hash.clone(), torrent);
    }

    /// Drop a torrent, as if it was deleted in the client.
    pub async fn remove_torrent(&self, hash: &str) {
        self.torrents.write().await.remove(hash);
    }

    /// Change a torrent's category without recording it (simulates an operator).
    pub async fn set_torrent_category(&self, hash: &str, category: &str) {
        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.category = category.to_string();
        }
    }

    pub async fn torrent(&self, hash: &str) -> Option<Torrent> {
        self.torrents.read().await.get(hash).cloned()
    }

    /// Categories created so far, in creation order.
    pub async fn categories(&self) -> Vec<String> {
        self.categories.read().await.clone()
    }

    /// Pre-create categories, as if they survived from an earlier run.
    pub async fn add_categories(&self, names: &[&str]) {
        let mut categories = self.categories.write().await;
        categories.extend(names.iter().map(|n| n.to_string()));
    }

    /// Every recorded set_category call, in order.
    pub async fn category_changes(&self) -> Vec<RecordedCategoryChange> {
        self.changes.read().await.clone()
    }

    /// Categories applied to one torrent, in order.
    pub async fn categories_of(&self, hash: &str) -> Vec<String> {
        self.changes
            .read()
            .await
            .iter()
            .filter(|c| c.hash == hash)
            .map(|c| c.category.clone())
            .collect()
    }

    /// Wait until `hash` has been moved to `category`.
    pub async fn wait_for_category(&self, hash: &str, category: &str, within: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            if self.categories_of(hash).await.iter().any(|c| c == category) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Number of calls made to one operation, including failed attempts.
    pub async fn call_count(&self, operation: MockOperation) -> usize {
        self.calls
            .read()
            .await
            .get(&operation)
            .copied()
            .unwrap_or(0)
    }

    /// Number of list_torrents calls (lock-free, usable from sync code).
    pub fn list_count(&self) -> usize {
        self.list_count.load(Ordering::SeqCst)
    }

    /// Fail the next call of `operation` with `error`.
    pub async fn push_error(&self, operation: MockOperation, error: TorrentClientError) {
        self.push(operation, Scripted::Fail(error)).await;
    }

    /// Delay the next call of `operation` before it answers.
    pub async fn push_delay(&self, operation: MockOperation, delay: Duration) {
        self.push(operation, Scripted::Delay(delay)).await;
    }

    async fn push(&self, operation: MockOperation, scripted: Scripted) {
        self.scripted
            .write()
            .await
            .entry(operation)
            .or_default()
            .push_back(scripted);
    }

    /// Record the call and apply the next scripted reaction, if any.
    async fn begin(&self, operation: MockOperation) -> Result<(), TorrentClientError> {
        *self.calls.write().await.entry(operation).or_insert(0) += 1;
        if operation == MockOperation::ListTorrents {
            self.list_count.fetch_add(1, Ordering::SeqCst);
        }

        let next = self
            .scripted
            .write()
            .await
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);

        match next {
            Some(Scripted::Fail(error)) => Err(error),
            Some(Scripted::Delay(delay)) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TorrentClient for MockTorrentClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn list_torrents(
        &self,
        filter: &TorrentFilter,
    ) -> Result<Vec<Torrent>, TorrentClientError> {
        self.begin(MockOperation::ListTorrents).await?;

        let torrents: Vec<Torrent> = self.torrents.read().await.values().cloned().collect();
        if filter.is_empty() {
            return Ok(torrents);
        }
        // Only hash filtering is meaningful for the mock
        let query = filter.to_query();
        Ok(torrents
            .into_iter()
            .filter(|t| query.contains(&t.hash))
            .collect())
    }

    async fn create_category(&self, name: &str) -> Result<(), TorrentClientError> {
        self.begin(MockOperation::CreateCategory).await?;

        if name.is_empty() {
            return Err(TorrentClientError::CategoryEmpty);
        }
        let mut categories = self.categories.write().await;
        if categories.iter().any(|c| c == name) {
            return Err(TorrentClientError::CategoryInvalid(name.to_string()));
        }
        categories.push(name.to_string());
        Ok(())
    }

    async fn set_category(&self, hash: &str, category: &str) -> Result<(), TorrentClientError> {
        self.begin(MockOperation::SetCategory).await?;

        if !category.is_empty() && !self.categories.read().await.iter().any(|c| c == category) {
            return Err(TorrentClientError::CategoryUnknown(category.to_string()));
        }

        if let Some(torrent) = self.torrents.write().await.get_mut(hash) {
            torrent.category = category.to_string();
        }
        self.changes.write().await.push(RecordedCategoryChange {
            hash: hash.to_string(),
            category: category.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::completed_torrent;

    #[tokio::test]
    async fn test_set_category_updates_torrent() {
        let client = MockTorrentClient::new();
        client.add_torrent(completed_torrent("h1", "")).await;
        client.create_category("Completed").await.unwrap();

        client.set_category("h1", "Completed").await.unwrap();

        let listed = client.list_torrents(&TorrentFilter::new()).await.unwrap();
        assert_eq!(listed[0].category, "Completed");
        assert_eq!(client.categories_of("h1").await, vec!["Completed"]);
    }

    #[tokio::test]
    async fn test_unknown_category_rejected() {
        let client = MockTorrentClient::new();
        client.add_torrent(completed_torrent("h1", "")).await;

        let result = client.set_category("h1", "Nope").await;
        assert!(matches!(result, Err(TorrentClientError::CategoryUnknown(_))));
    }

    #[tokio::test]
    async fn test_duplicate_category_is_invalid() {
        let client = MockTorrentClient::new();
        client.create_category("Error").await.unwrap();

        let result = client.create_category("Error").await;
        assert!(matches!(result, Err(TorrentClientError::CategoryInvalid(_))));
        assert_eq!(client.categories().await, vec!["Error"]);
    }

    #[tokio::test]
    async fn test_scripted_error_consumed_once() {
        let client = MockTorrentClient::new();
        client
            .push_error(MockOperation::ListTorrents, TorrentClientError::Forbidden)
            .await;

        assert!(client.list_torrents(&TorrentFilter::new()).await.is_err());
        assert!(client.list_torrents(&TorrentFilter::new()).await.is_ok());
        assert_eq!(client.call_count(MockOperation::ListTorrents).await, 2);
        assert_eq!(client.list_count(), 2);
    }

    #[tokio::test]
    async fn test_hash_filter() {
        let client = MockTorrentClient::new();
        client.add_torrent(completed_torrent("aaa", "")).await;
        client.add_torrent(completed_torrent("bbb", "")).await;

        let listed = client
            .list_torrents(&TorrentFilter::new().with_hash("bbb"))
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].hash, "bbb");
    }
}
