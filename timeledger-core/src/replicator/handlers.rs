use axum::extract::State;
use axum::Json;

use crate::replicator::types::SyncStatus;
use crate::AppState;

/// GET /api/sync/status
///
/// Replication state for the UI banner: whether a remote is configured,
/// whether pushes are pending and the last outcome.
pub async fn sync_status(State(state): State<AppState>) -> Json<SyncStatus> {
    Json(state.sync.status())
}
