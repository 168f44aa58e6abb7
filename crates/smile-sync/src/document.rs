//! Remote document store client.
//!
//! The whole portfolio lives in one logical document whose `items` field
//! holds the full ordered sequence. Writes replace that field wholesale;
//! reads arrive through a live subscription that fires on every content
//! change, including the echo of one's own writes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use smile_portfolio::PortfolioItem;

use crate::identity::Identity;

/// Errors from document reads and writes.
///
/// Permission failures are surfaced distinctly from generic transport
/// failures so the admin banner can point at the store's access rules.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("Permission Denied (Check Firestore Rules)")]
    PermissionDenied,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed document: {0}")]
    Malformed(String),
}

/// A change delivered by a live subscription.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    /// The remote document's full item sequence after a content change.
    Snapshot(Vec<PortfolioItem>),
    /// The backend reported a listener failure; the feed stays attached.
    Error(DocumentError),
}

/// A live listener on the portfolio document.
///
/// Dropping the subscription (or calling [`unsubscribe`](Self::unsubscribe))
/// detaches the listener; no event is delivered after teardown.
pub struct DocumentSubscription {
    receiver: mpsc::Receiver<DocumentEvent>,
    feed: Option<JoinHandle<()>>,
}

impl DocumentSubscription {
    pub fn new(receiver: mpsc::Receiver<DocumentEvent>, feed: Option<JoinHandle<()>>) -> Self {
        Self { receiver, feed }
    }

    /// Wait for the next remote event. Returns `None` once detached.
    pub async fn recv(&mut self) -> Option<DocumentEvent> {
        self.receiver.recv().await
    }

    /// Detach the listener.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.abort();
        }
        self.receiver.close();
    }
}

impl Drop for DocumentSubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

/// Client for the single shared portfolio document.
///
/// Both operations require the identity obtained by the bootstrap; callers
/// must not invoke them before one exists.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Register a live listener. The subscription delivers the parsed item
    /// sequence on every content change, including the immediate first read.
    /// A document that does not exist yet delivers nothing.
    async fn subscribe(&self, identity: &Identity) -> Result<DocumentSubscription, DocumentError>;

    /// Replace the document's `items` field with the given sequence in full.
    async fn write(
        &self,
        identity: &Identity,
        items: &[PortfolioItem],
    ) -> Result<(), DocumentError>;
}

/// In-process document store.
///
/// Backs tests and local demos with the same contract as the hosted store:
/// full-sequence writes, a change feed that echoes every write to all
/// subscribers, and absence semantics for a document never written.
pub struct MemoryDocumentStore {
    document: Mutex<Option<Vec<PortfolioItem>>>,
    changes: broadcast::Sender<Vec<PortfolioItem>>,
    writes: Mutex<Vec<Vec<PortfolioItem>>>,
    deny_writes: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(32);
        Self {
            document: Mutex::new(None),
            changes,
            writes: Mutex::new(Vec::new()),
            deny_writes: AtomicBool::new(false),
        }
    }

    /// Start with an existing remote document.
    pub fn with_document(items: Vec<PortfolioItem>) -> Self {
        let store = Self::new();
        *lock(&store.document) = Some(items);
        store
    }

    /// Make subsequent writes fail with a permission error.
    pub fn deny_writes(&self) {
        self.deny_writes.store(true, Ordering::SeqCst);
    }

    /// Every full-sequence write accepted so far, in order.
    pub fn write_log(&self) -> Vec<Vec<PortfolioItem>> {
        lock(&self.writes).clone()
    }

    /// Simulate a change made by another session.
    pub fn apply_remote_change(&self, items: Vec<PortfolioItem>) {
        *lock(&self.document) = Some(items.clone());
        let _ = self.changes.send(items);
    }
}

// Document and log values are replaced whole; a poisoned guard still holds a
// complete value.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn subscribe(
        &self,
        _identity: &Identity,
    ) -> Result<DocumentSubscription, DocumentError> {
        let (tx, rx) = mpsc::channel(32);
        let initial = lock(&self.document).clone();
        let mut changes = self.changes.subscribe();

        let feed = tokio::spawn(async move {
            // Immediate first read, unless the document does not exist.
            if let Some(items) = initial {
                if tx.send(DocumentEvent::Snapshot(items)).await.is_err() {
                    return;
                }
            }
            loop {
                match changes.recv().await {
                    Ok(items) => {
                        if tx.send(DocumentEvent::Snapshot(items)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(DocumentSubscription::new(rx, Some(feed)))
    }

    async fn write(
        &self,
        _identity: &Identity,
        items: &[PortfolioItem],
    ) -> Result<(), DocumentError> {
        if self.deny_writes.load(Ordering::SeqCst) {
            return Err(DocumentError::PermissionDenied);
        }
        let items = items.to_vec();
        *lock(&self.document) = Some(items.clone());
        lock(&self.writes).push(items.clone());
        let _ = self.changes.send(items);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smile_portfolio::default_portfolio;

    fn identity() -> Identity {
        Identity {
            uid: "anon".into(),
            token: "token-anon".into(),
        }
    }

    #[tokio::test]
    async fn missing_document_delivers_nothing_at_first() {
        let store = MemoryDocumentStore::new();
        let mut sub = store.subscribe(&identity()).await.unwrap();

        store.write(&identity(), &default_portfolio()).await.unwrap();
        match sub.recv().await {
            Some(DocumentEvent::Snapshot(items)) => assert_eq!(items.len(), 6),
            other => panic!("expected the write echo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn existing_document_fires_immediately() {
        let store = MemoryDocumentStore::with_document(default_portfolio());
        let mut sub = store.subscribe(&identity()).await.unwrap();
        match sub.recv().await {
            Some(DocumentEvent::Snapshot(items)) => assert_eq!(items.len(), 6),
            other => panic!("expected the initial snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn denied_write_is_a_permission_error() {
        let store = MemoryDocumentStore::new();
        store.deny_writes();
        let err = store
            .write(&identity(), &default_portfolio())
            .await
            .unwrap_err();
        assert_eq!(err, DocumentError::PermissionDenied);
        assert!(store.write_log().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let store = MemoryDocumentStore::new();
        let sub = store.subscribe(&identity()).await.unwrap();
        sub.unsubscribe();

        // A write after teardown must not reach anyone; nothing to assert
        // beyond the send not panicking on a closed feed.
        store.write(&identity(), &default_portfolio()).await.unwrap();
        assert_eq!(store.write_log().len(), 1);
    }
}
