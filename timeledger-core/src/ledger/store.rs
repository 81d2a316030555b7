use anyhow::anyhow;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction};
use uuid::Uuid;

use crate::db::{decimal_col, json_col, uuid_col};
use crate::error::AppError;
use crate::models::session::{Billing, PaymentStatus, Session, SessionStatus};

/// Raw `sessions` row. Uuids, decimals and the billing payload come back as
/// TEXT and are decoded into domain types by the `TryFrom` below.
#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    user_id: String,
    client_id: String,
    project_id: Option<String>,
    name: String,
    notes: Option<String>,
    billing: String,
    duration_secs: i64,
    earned: String,
    occurred_at: DateTime<Utc>,
    status: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for Session {
    type Error = anyhow::Error;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Session {
            id: uuid_col(&row.id)?,
            user_id: uuid_col(&row.user_id)?,
            client_id: uuid_col(&row.client_id)?,
            project_id: row.project_id.as_deref().map(uuid_col).transpose()?,
            name: row.name,
            notes: row.notes,
            billing: json_col::<Billing>(&row.billing)?,
            duration_secs: row.duration_secs,
            earned: decimal_col(&row.earned)?,
            occurred_at: row.occurred_at,
            status: SessionStatus::parse(&row.status)
                .ok_or_else(|| anyhow!("unknown session status: {}", row.status))?,
            payment_status: PaymentStatus::parse(&row.payment_status)
                .ok_or_else(|| anyhow!("unknown payment status: {}", row.payment_status))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const SESSION_COLUMNS: &str = "id, user_id, client_id, project_id, name, notes, billing, \
     duration_secs, earned, occurred_at, status, payment_status, created_at, updated_at";

/// Inserts a new session row.
pub async fn insert_session(pool: &SqlitePool, session: &Session) -> Result<(), AppError> {
    let billing = serde_json::to_string(&session.billing)
        .map_err(|e| anyhow!("failed to serialize billing: {e}"))?;

    sqlx::query(
        "INSERT INTO sessions (id, user_id, client_id, project_id, name, notes, billing, \
         duration_secs, earned, occurred_at, status, payment_status, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .bind(session.client_id.to_string())
    .bind(session.project_id.map(|id| id.to_string()))
    .bind(&session.name)
    .bind(&session.notes)
    .bind(billing)
    .bind(session.duration_secs)
    .bind(session.earned.to_string())
    .bind(session.occurred_at)
    .bind(session.status.as_str())
    .bind(session.payment_status.as_str())
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrites the mutable columns of an existing session row.
pub async fn update_session(pool: &SqlitePool, session: &Session) -> Result<(), AppError> {
    let billing = serde_json::to_string(&session.billing)
        .map_err(|e| anyhow!("failed to serialize billing: {e}"))?;

    let result = sqlx::query(
        "UPDATE sessions SET client_id = ?, project_id = ?, name = ?, notes = ?, billing = ?, \
         duration_secs = ?, earned = ?, occurred_at = ?, status = ?, payment_status = ?, \
         updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(session.client_id.to_string())
    .bind(session.project_id.map(|id| id.to_string()))
    .bind(&session.name)
    .bind(&session.notes)
    .bind(billing)
    .bind(session.duration_secs)
    .bind(session.earned.to_string())
    .bind(session.occurred_at)
    .bind(session.status.as_str())
    .bind(session.payment_status.as_str())
    .bind(session.updated_at)
    .bind(session.id.to_string())
    .bind(session.user_id.to_string())
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("session"));
    }
    Ok(())
}

/// Fetches one of the user's sessions.
pub async fn get_session(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Session, AppError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ? AND user_id = ?"
    ))
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("session"))?;

    Ok(Session::try_from(row)?)
}

/// All of the user's sessions, newest first.
pub async fn list_sessions(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ? \
         ORDER BY occurred_at DESC, created_at DESC"
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Session::try_from(row).map_err(AppError::from))
        .collect()
}

/// Finished, not-yet-paid sessions of one client, oldest first. These are
/// the sessions an invoice may bill.
pub async fn billable_candidates(
    pool: &SqlitePool,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<Vec<Session>, AppError> {
    let rows = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions \
         WHERE user_id = ? AND client_id = ? AND status = 'DONE' AND payment_status = 'UNPAID' \
         ORDER BY occurred_at ASC, created_at ASC"
    ))
    .bind(user_id.to_string())
    .bind(client_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Session::try_from(row).map_err(AppError::from))
        .collect()
}

/// Deletes one of the user's sessions.
pub async fn delete_session(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("session"));
    }
    Ok(())
}

/// Deletes every session of a client inside an open transaction, as part of
/// a client cascade delete.
pub async fn delete_sessions_for_client(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: Uuid,
    client_id: Uuid,
) -> Result<u64, AppError> {
    let result = sqlx::query("DELETE FROM sessions WHERE client_id = ? AND user_id = ?")
        .bind(client_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut **tx)
        .await?;
    Ok(result.rows_affected())
}

/// Flips the given sessions to paid inside an open transaction, so the flip
/// commits atomically with the invoice status change that caused it.
pub async fn mark_sessions_paid(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: Uuid,
    session_ids: &[Uuid],
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    for session_id in session_ids {
        sqlx::query(
            "UPDATE sessions SET payment_status = 'PAID', updated_at = ? \
             WHERE id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(session_id.to_string())
        .bind(user_id.to_string())
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Demotes sessions left `ACTIVE` by a previous run back to `PENDING`.
///
/// Runs once at startup: the in-memory timer that made them active is gone,
/// and their stored duration is whatever the last stop wrote, so pending is
/// the only honest status for them.
pub async fn recover_orphaned_active(pool: &SqlitePool) -> Result<u64, AppError> {
    let result = sqlx::query("UPDATE sessions SET status = 'PENDING', updated_at = ? WHERE status = 'ACTIVE'")
        .bind(Utc::now())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
