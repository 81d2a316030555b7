use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Client, Session};

/// One user's workspace as pushed to the remote store.
///
/// The document is the whole of the user's clients and sessions in a single
/// value; the remote side stores it as-is and the last write wins. Invoices,
/// funnels and leads stay local and are never part of the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceDocument {
    /// Owner of the workspace
    pub user_id: Uuid,

    /// Every client of the user
    pub clients: Vec<Client>,

    /// Every session of the user
    pub sessions: Vec<Session>,

    /// When this document was assembled
    pub pushed_at: DateTime<Utc>,
}

/// Replication state surfaced to the UI.
///
/// `last_error` is sticky: it stays set across quiet periods and clears only
/// when a later push succeeds, so the banner does not flicker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    /// Whether a remote store is configured at all
    pub enabled: bool,

    /// Whether local changes are waiting to be pushed
    pub pending: bool,

    /// Timestamp of the last successful push
    pub last_synced_at: Option<DateTime<Utc>>,

    /// Message of the most recent failed push
    pub last_error: Option<String>,
}

impl SyncStatus {
    pub fn disabled() -> Self {
        SyncStatus {
            enabled: false,
            pending: false,
            last_synced_at: None,
            last_error: None,
        }
    }

    pub fn idle() -> Self {
        SyncStatus {
            enabled: true,
            pending: false,
            last_synced_at: None,
            last_error: None,
        }
    }
}
