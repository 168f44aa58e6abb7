//! Sync reconciler between the local portfolio store and the remote
//! document.
//!
//! One-way and last-writer-wins: every remote change overwrites the local
//! store wholesale (echoes of our own writes included), and local saves
//! apply optimistically before the remote write resolves. The reconciler
//! performs no merge or conflict detection; the admin tool assumes a single
//! simultaneous operator.

use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::task::JoinHandle;

use smile_portfolio::{PortfolioItem, PortfolioStore};

use crate::config::RemoteConfig;
use crate::document::{DocumentEvent, DocumentStore};
use crate::firestore::FirestoreDocumentStore;
use crate::identity::{Identity, IdentityService, RestIdentityService};
use crate::status::{ConnectionState, ConnectionStatus};

/// Result of a [`SyncReconciler::save`] call.
///
/// The local store is updated in every case; the variants describe what
/// happened upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Written through to the remote document.
    Synced,
    /// No remote connection; the change lives only in process memory and is
    /// lost on reload. Expected in demo mode, not an error.
    LocalOnly,
    /// The remote write failed; the optimistic local change is kept and the
    /// message is surfaced to the operator. No retry is queued.
    WriteFailed(String),
}

impl SaveOutcome {
    pub fn is_synced(&self) -> bool {
        matches!(self, SaveOutcome::Synced)
    }

    pub fn is_local_only(&self) -> bool {
        matches!(self, SaveOutcome::LocalOnly)
    }
}

/// Owns the remote side of the portfolio store.
///
/// The reconciler is the only writer to the store from the remote side; the
/// admin editor is the only local-mutation writer, through [`save`](Self::save).
pub struct SyncReconciler {
    store: Arc<PortfolioStore>,
    documents: Option<Arc<dyn DocumentStore>>,
    status: Arc<RwLock<ConnectionStatus>>,
    identity: RwLock<Option<Identity>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncReconciler {
    /// Local-only reconciler for when no remote configuration exists.
    pub fn local_only(store: Arc<PortfolioStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            documents: None,
            status: Arc::new(RwLock::new(ConnectionStatus::default())),
            identity: RwLock::new(None),
            listener: Mutex::new(None),
        })
    }

    /// Reconciler wired to a document store, not yet connected.
    pub fn new(store: Arc<PortfolioStore>, documents: Arc<dyn DocumentStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            documents: Some(documents),
            status: Arc::new(RwLock::new(ConnectionStatus::default())),
            identity: RwLock::new(None),
            listener: Mutex::new(None),
        })
    }

    /// One-shot startup path.
    ///
    /// With no usable configuration the site runs on local data with no
    /// error; otherwise sign in anonymously against the hosted backend and
    /// attach the live subscription.
    pub async fn bootstrap(
        store: Arc<PortfolioStore>,
        config: Option<RemoteConfig>,
    ) -> Arc<Self> {
        let Some(config) = config.filter(RemoteConfig::is_usable) else {
            tracing::warn!("No valid remote configuration found; portfolio is local-only");
            return Self::local_only(store);
        };

        let identity_service = RestIdentityService::new(&config);
        let documents = Arc::new(FirestoreDocumentStore::new(&config));
        let reconciler = Self::new(store, documents);
        reconciler.connect(&identity_service).await;
        reconciler
    }

    /// Run the anonymous sign-in and attach the document subscription.
    ///
    /// Runs at most once per process lifetime: any state other than
    /// `Disconnected` returns the current status untouched, so a failed
    /// bootstrap is never retried automatically. The admin view is the
    /// manual remediation path.
    pub async fn connect(&self, identity_service: &dyn IdentityService) -> ConnectionStatus {
        let Some(documents) = self.documents.clone() else {
            return self.status();
        };

        {
            let mut status = write_lock(&self.status);
            if status.state != ConnectionState::Disconnected {
                return status.clone();
            }
            status.state = ConnectionState::Connecting;
        }

        let identity = match identity_service.sign_in_anonymously().await {
            Ok(identity) => identity,
            Err(err) => {
                tracing::warn!("Auth failed: {err}");
                return self.fail(err.to_string());
            }
        };

        let mut subscription = match documents.subscribe(&identity).await {
            Ok(subscription) => subscription,
            Err(err) => {
                tracing::warn!("Failed to attach document subscription: {err}");
                return self.fail(err.to_string());
            }
        };

        let store = Arc::clone(&self.store);
        let status = Arc::clone(&self.status);
        let listener = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                match event {
                    DocumentEvent::Snapshot(items) => {
                        tracing::debug!(count = items.len(), "Applying remote snapshot");
                        store.replace(items);
                    }
                    DocumentEvent::Error(err) => {
                        tracing::error!("Data sync error: {err}");
                        write_lock(&status).last_error = Some(err.to_string());
                    }
                }
            }
        });

        *write_lock(&self.identity) = Some(identity);
        if let Some(previous) = lock_listener(&self.listener).replace(listener) {
            previous.abort();
        }

        let mut status = write_lock(&self.status);
        status.state = ConnectionState::Live;
        status.last_error = None;
        status.clone()
    }

    /// Apply a full new sequence locally, then push it upstream.
    ///
    /// The local apply happens first and is never rolled back; when the
    /// connection is not live the change is local-only and may be lost on
    /// reload. Failed writes are simply lost unless the operator repeats
    /// the action.
    pub async fn save(&self, items: Vec<PortfolioItem>) -> SaveOutcome {
        self.store.replace(items.clone());

        if !self.status().is_configured() {
            return SaveOutcome::LocalOnly;
        }
        let identity = read_lock(&self.identity).clone();
        let (Some(documents), Some(identity)) = (self.documents.clone(), identity) else {
            // Not reachable while Live, but a missing identity degrades to
            // the same demo-mode answer rather than panicking.
            return SaveOutcome::LocalOnly;
        };

        match documents.write(&identity, &items).await {
            Ok(()) => SaveOutcome::Synced,
            Err(err) => {
                tracing::error!("Save error: {err}");
                SaveOutcome::WriteFailed(err.to_string())
            }
        }
    }

    /// Current connection status snapshot.
    pub fn status(&self) -> ConnectionStatus {
        read_lock(&self.status).clone()
    }

    /// The store this reconciler feeds.
    pub fn store(&self) -> Arc<PortfolioStore> {
        Arc::clone(&self.store)
    }

    /// Detach the remote subscription; no remote change lands after this.
    pub fn shutdown(&self) {
        if let Some(listener) = lock_listener(&self.listener).take() {
            listener.abort();
        }
    }

    fn fail(&self, message: String) -> ConnectionStatus {
        let mut status = write_lock(&self.status);
        status.state = ConnectionState::Error;
        status.last_error = Some(message);
        status.clone()
    }
}

impl Drop for SyncReconciler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// Status, identity, and listener slots are replaced whole; a poisoned guard
// still holds a complete value.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn lock_listener<'a>(
    lock: &'a Mutex<Option<JoinHandle<()>>>,
) -> std::sync::MutexGuard<'a, Option<JoinHandle<()>>> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
