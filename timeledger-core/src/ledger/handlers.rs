use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::ledger::timer::TimerSnapshot;
use crate::ledger::{sessions, store};
use crate::models::session::{
    CreateSessionRequest, SessionResponse, StartTimerRequest, UpdateSessionRequest,
};
use crate::reports::filter::{visible_sessions, DateFilter, SessionFilter};
use crate::AppState;

/// Optional view parameters for the ledger listing. Without a client the
/// endpoint returns the whole ledger; with one it returns the same filtered
/// view the reports run on.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub range: Option<String>,
    pub month: Option<String>,
}

/// `GET /api/sessions` - the ledger, newest first, optionally filtered.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    let sessions = store::list_sessions(&state.db, user_id).await?;

    let sessions = match query.client_id {
        Some(client_id) => {
            let filter = SessionFilter {
                client_id,
                project_id: query.project_id,
                date: DateFilter::from_query(query.range.as_deref(), query.month.as_deref())?,
            };
            visible_sessions(&sessions, &filter, Utc::now())
        }
        None => sessions,
    };

    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// `POST /api/sessions` - manual entry creation.
pub async fn create_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session =
        sessions::create_manual(&state.db, state.config.workday_hours, user_id, req).await?;
    state.sync.mark_dirty(user_id);
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// `GET /api/sessions/:id`
pub async fn get_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = store::get_session(&state.db, user_id, id).await?;
    Ok(Json(SessionResponse::from(session)))
}

/// `PATCH /api/sessions/:id` - partial edit.
pub async fn update_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateSessionRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let session =
        sessions::edit_session(&state.db, state.config.workday_hours, user_id, id, req).await?;
    state.sync.mark_dirty(user_id);
    Ok(Json(SessionResponse::from(session)))
}

/// `DELETE /api/sessions/:id`
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    sessions::remove_session(&state.db, &state.timers, user_id, id).await?;
    state.sync.mark_dirty(user_id);
    Ok(StatusCode::NO_CONTENT)
}

/// Timer state for `GET /api/timer`.
#[derive(Debug, Serialize)]
pub struct TimerStatusResponse {
    pub active: Option<TimerSnapshot>,
}

/// `GET /api/timer` - current timer, if one is running.
pub async fn timer_status(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Json<TimerStatusResponse> {
    Json(TimerStatusResponse {
        active: state.timers.snapshot(user_id).await,
    })
}

/// `POST /api/timer/start` - start timing a brand new session.
pub async fn start_timer(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<StartTimerRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), AppError> {
    let session = sessions::start_timer(&state.db, &state.timers, user_id, req).await?;
    state.sync.mark_dirty(user_id);
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

/// `POST /api/timer/start/:session_id` - start timing a pending session.
pub async fn start_pending(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = sessions::start_pending(&state.db, &state.timers, user_id, session_id).await?;
    state.sync.mark_dirty(user_id);
    Ok(Json(SessionResponse::from(session)))
}

/// `POST /api/timer/pause`
pub async fn pause_timer(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<TimerSnapshot>, AppError> {
    let snapshot = state.timers.pause(user_id).await?;
    Ok(Json(snapshot))
}

/// `POST /api/timer/resume`
pub async fn resume_timer(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<TimerSnapshot>, AppError> {
    let snapshot = state.timers.resume(user_id).await?;
    Ok(Json(snapshot))
}

/// `POST /api/timer/stop` - finish the running session.
pub async fn stop_timer(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = sessions::stop_timer(&state.db, &state.timers, user_id).await?;
    state.sync.mark_dirty(user_id);
    Ok(Json(SessionResponse::from(session)))
}
