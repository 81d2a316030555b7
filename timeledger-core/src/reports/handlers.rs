use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::clients;
use crate::error::AppError;
use crate::ledger::store;
use crate::reports::csv::export_csv;
use crate::reports::filter::{visible_sessions, DateFilter, SessionFilter};
use crate::reports::stats::{ledger_stats, LedgerStats};
use crate::AppState;

/// Query parameters shared by the stats and export endpoints. The client is
/// mandatory: reports are always scoped to one selected client.
#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    /// all | week | month | custom
    pub range: Option<String>,
    /// YYYY-MM, used when `range=custom`
    pub month: Option<String>,
}

impl ReportQuery {
    pub fn into_filter(self) -> Result<SessionFilter, AppError> {
        Ok(SessionFilter {
            client_id: self.client_id,
            project_id: self.project_id,
            date: DateFilter::from_query(self.range.as_deref(), self.month.as_deref())?,
        })
    }
}

/// `GET /api/sessions/stats` - aggregates for the filtered view.
pub async fn session_stats(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<LedgerStats>, AppError> {
    let filter = query.into_filter()?;
    let sessions = store::list_sessions(&state.db, user_id).await?;
    let visible = visible_sessions(&sessions, &filter, Utc::now());
    Ok(Json(ledger_stats(&visible, &state.config.pricing)))
}

/// `GET /api/sessions/export` - the filtered view as a CSV download.
pub async fn export_sessions(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let filter = query.into_filter()?;
    let sessions = store::list_sessions(&state.db, user_id).await?;
    let clients = clients::list_clients(&state.db, user_id).await?;
    let visible = visible_sessions(&sessions, &filter, Utc::now());

    let body = export_csv(&visible, &clients);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sessions.csv\"",
            ),
        ],
        body,
    ))
}
