use std::fmt;

use tokio::sync::mpsc;

use super::error::DispatchError;

/// Capacity of the action inbox.
pub const ACTION_QUEUE_CAPACITY: usize = 100;

/// Requests serialized through the dispatcher's action loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Poll the client and feed the queue.
    GetTorrents,
    /// Create a category, treating "already exists" as success.
    AddCategory(String),
    /// Move one torrent to a category.
    SetCategory { hash: String, category: String },
    /// Reset the queue status of one hash.
    DeQueue(String),
}

impl Action {
    pub fn set_category(hash: impl Into<String>, category: impl Into<String>) -> Self {
        Action::SetCategory {
            hash: hash.into(),
            category: category.into(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::GetTorrents => "get_torrents",
            Action::AddCategory(_) => "add_category",
            Action::SetCategory { .. } => "set_category",
            Action::DeQueue(_) => "dequeue",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::GetTorrents => f.write_str("get torrents"),
            Action::AddCategory(name) => write!(f, "add category '{}'", name),
            Action::SetCategory { hash, category } => {
                write!(f, "set category '{}' on {}", category, hash)
            }
            Action::DeQueue(hash) => write!(f, "dequeue {}", hash),
        }
    }
}

/// Handle for posting actions to a dispatcher.
///
/// This is cheaply cloneable and can be shared across tasks.
#[derive(Debug, Clone)]
pub struct DispatcherHandle {
    tx: mpsc::Sender<Action>,
}

impl DispatcherHandle {
    pub(crate) fn new(tx: mpsc::Sender<Action>) -> Self {
        Self { tx }
    }

    /// Post an action, waiting for room in the inbox.
    pub async fn send(&self, action: Action) -> Result<(), DispatchError> {
        self.tx.send(action).await.map_err(|_| DispatchError::Stopped)
    }

    /// Request an immediate poll.
    pub async fn trigger_poll(&self) -> Result<(), DispatchError> {
        self.send(Action::GetTorrents).await
    }

    /// Reset the queue status of `hash` so it is evaluated again.
    pub async fn dequeue(&self, hash: impl Into<String>) -> Result<(), DispatchError> {
        self.send(Action::DeQueue(hash.into())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_display() {
        assert_eq!(Action::GetTorrents.to_string(), "get torrents");
        assert_eq!(
            Action::set_category("abc", "Unpacked").to_string(),
            "set category 'Unpacked' on abc"
        );
        assert_eq!(Action::DeQueue("abc".into()).name(), "dequeue");
    }

    #[tokio::test]
    async fn test_handle_send() {
        let (tx, mut rx) = mpsc::channel(10);
        let handle = DispatcherHandle::new(tx);

        handle.trigger_poll().await.unwrap();
        handle.dequeue("abc").await.unwrap();

        assert_eq!(rx.recv().await, Some(Action::GetTorrents));
        assert_eq!(rx.recv().await, Some(Action::DeQueue("abc".to_string())));
    }

    #[tokio::test]
    async fn test_send_after_stop() {
        let (tx, rx) = mpsc::channel::<Action>(10);
        let handle = DispatcherHandle::new(tx);
        drop(rx);

        let result = handle.trigger_poll().await;
        assert!(matches!(result, Err(DispatchError::Stopped)));
    }
}
