use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, info};
use uuid::Uuid;

use crate::error::AppError;
use crate::replicator::remote::RemoteStore;
use crate::replicator::types::{SyncStatus, WorkspaceDocument};

/// Handle the rest of the application uses to talk to the replicator.
///
/// `mark_dirty` is deliberately synchronous and infallible: handlers call it
/// after every local write and must never block or fail on it. When no
/// remote store is configured the notifier swallows marks and the status
/// reads disabled.
#[derive(Clone)]
pub struct SyncNotifier {
    tx: Option<mpsc::UnboundedSender<Uuid>>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncNotifier {
    /// A notifier with no replicator behind it, for local-only operation.
    pub fn disabled() -> Self {
        SyncNotifier {
            tx: None,
            status: Arc::new(RwLock::new(SyncStatus::disabled())),
        }
    }

    /// Creates a live notifier plus the receiving end for a [`Replicator`].
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Uuid>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let notifier = SyncNotifier {
            tx: Some(tx),
            status: Arc::new(RwLock::new(SyncStatus::idle())),
        };
        (notifier, rx)
    }

    /// Records that the user's workspace changed and should be pushed once
    /// the debounce window closes.
    pub fn mark_dirty(&self, user_id: Uuid) {
        let Some(tx) = &self.tx else { return };
        self.write_status(|status| status.pending = true);
        // The replicator outlives everything but shutdown; a closed channel
        // just means the marks no longer matter.
        let _ = tx.send(user_id);
    }

    /// Current replication state for the status endpoint.
    pub fn status(&self) -> SyncStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn write_status(&self, apply: impl FnOnce(&mut SyncStatus)) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        apply(&mut status);
    }

    fn record_success(&self, at: DateTime<Utc>) {
        self.write_status(|status| {
            status.last_synced_at = Some(at);
            status.last_error = None;
        });
    }

    fn record_failure(&self, message: String) {
        self.write_status(|status| status.last_error = Some(message));
    }

    fn set_idle(&self) {
        self.write_status(|status| status.pending = false);
    }
}

/// Background task pushing dirty workspaces to a remote store.
///
/// Marks from [`SyncNotifier::mark_dirty`] land here; each one (re)arms a
/// per-user deadline `debounce` in the future, so a burst of edits collapses
/// into a single push. A push failure is recorded and otherwise dropped; the
/// next local edit schedules the retry.
pub struct Replicator<S> {
    db: SqlitePool,
    store: S,
    notifier: SyncNotifier,
    rx: mpsc::UnboundedReceiver<Uuid>,
    debounce: Duration,
}

impl<S: RemoteStore> Replicator<S> {
    pub fn new(
        db: SqlitePool,
        store: S,
        notifier: SyncNotifier,
        rx: mpsc::UnboundedReceiver<Uuid>,
        debounce: Duration,
    ) -> Self {
        Replicator {
            db,
            store,
            notifier,
            rx,
            debounce,
        }
    }

    /// Runs until every notifier handle is dropped, then flushes whatever is
    /// still queued and returns.
    pub async fn run(mut self) {
        let mut deadlines: HashMap<Uuid, Instant> = HashMap::new();

        loop {
            let next = deadlines.values().min().copied();
            tokio::select! {
                mark = self.rx.recv() => match mark {
                    Some(user_id) => {
                        deadlines.insert(user_id, Instant::now() + self.debounce);
                    }
                    None => break,
                },
                _ = sleep_until_next(next) => {
                    let now = Instant::now();
                    let due: Vec<Uuid> = deadlines
                        .iter()
                        .filter(|(_, at)| **at <= now)
                        .map(|(user_id, _)| *user_id)
                        .collect();
                    for user_id in due {
                        deadlines.remove(&user_id);
                        push_workspace(&self.db, &self.store, &self.notifier, user_id).await;
                    }
                    if deadlines.is_empty() {
                        self.notifier.set_idle();
                    }
                }
            }
        }

        for user_id in deadlines.into_keys() {
            push_workspace(&self.db, &self.store, &self.notifier, user_id).await;
        }
        self.notifier.set_idle();
        info!("Replicator stopped");
    }
}

async fn sleep_until_next(next: Option<Instant>) {
    match next {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Reads the user's whole workspace from the local store.
pub async fn build_document(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<WorkspaceDocument, AppError> {
    let clients = crate::clients::list_clients(pool, user_id).await?;
    let sessions = crate::ledger::store::list_sessions(pool, user_id).await?;
    Ok(WorkspaceDocument {
        user_id,
        clients,
        sessions,
        pushed_at: Utc::now(),
    })
}

async fn push_workspace<S: RemoteStore>(
    db: &SqlitePool,
    store: &S,
    notifier: &SyncNotifier,
    user_id: Uuid,
) {
    let result = async {
        let document = build_document(db, user_id).await?;
        store.store_workspace(&document).await?;
        Ok::<_, anyhow::Error>(())
    }
    .await;

    match result {
        Ok(()) => {
            notifier.record_success(Utc::now());
            info!("Pushed workspace for user {}", user_id);
        }
        Err(e) => {
            notifier.record_failure(e.to_string());
            error!("Workspace push for user {} failed: {}", user_id, e);
        }
    }
}
