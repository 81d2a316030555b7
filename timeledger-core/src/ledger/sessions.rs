use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::ledger::store;
use crate::ledger::timer::TimerEngine;
use crate::models::session::{
    Billing, CreateSessionRequest, PaymentStatus, Session, SessionStatus, StartTimerRequest,
    UpdateSessionRequest,
};
use crate::money;

fn validated_name(name: &str) -> Result<String, AppError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("name", "a task name is required"));
    }
    Ok(trimmed.to_string())
}

fn validate_billing(billing: &Billing) -> Result<(), AppError> {
    match billing {
        Billing::Hourly { rate } if *rate <= Decimal::ZERO => Err(AppError::validation(
            "rate",
            "the hourly rate must be greater than zero",
        )),
        Billing::FixedProject { fixed_amount } if *fixed_amount < Decimal::ZERO => Err(
            AppError::validation("fixed_amount", "the fixed amount cannot be negative"),
        ),
        _ => Ok(()),
    }
}

/// Amount a session has earned given its billing, duration and status.
/// Fixed-price sessions carry no earned value of their own; their project
/// amount is attributed at aggregation time.
fn computed_earned(billing: &Billing, duration_secs: i64) -> Decimal {
    match billing {
        Billing::Hourly { rate } => money::earned_from_duration(duration_secs, *rate),
        Billing::FixedProject { .. } => Decimal::ZERO,
    }
}

/// Creates a manual ledger entry, either a `PENDING` backlog item or an
/// already finished `DONE` session.
///
/// # Errors
///
/// Validation failures for a blank name, a missing or unknown client, an
/// `ACTIVE` target status, a non-positive hourly rate, or a `DONE` entry
/// without any duration.
pub async fn create_manual(
    pool: &SqlitePool,
    workday_hours: u32,
    user_id: Uuid,
    req: CreateSessionRequest,
) -> Result<Session, AppError> {
    let name = validated_name(&req.name)?;
    let client_id = req
        .client_id
        .ok_or_else(|| AppError::validation("client_id", "a client is required"))?;
    crate::clients::get_client(pool, user_id, client_id).await?;

    if req.status == SessionStatus::Active {
        return Err(AppError::validation(
            "status",
            "sessions cannot be created as active; start the timer instead",
        ));
    }
    validate_billing(&req.billing)?;

    let duration_secs = money::duration_from_parts(
        req.days.unwrap_or(0),
        req.hours.unwrap_or(0),
        req.minutes.unwrap_or(0),
        workday_hours,
    );
    if req.status == SessionStatus::Done && duration_secs == 0 {
        return Err(AppError::validation(
            "duration",
            "a completed session requires a duration",
        ));
    }

    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        client_id,
        project_id: req.project_id,
        name,
        notes: req.notes,
        billing: req.billing,
        duration_secs,
        earned: computed_earned(&req.billing, duration_secs),
        occurred_at: req.occurred_at.unwrap_or(now),
        status: req.status,
        payment_status: PaymentStatus::Unpaid,
        created_at: now,
        updated_at: now,
    };
    store::insert_session(pool, &session).await?;

    Ok(session)
}

/// Applies a partial edit to a session.
///
/// Earned is recomputed only when the duration or the billing actually
/// changed; a rename never reprices an entry. Editing a `DONE` session in
/// place is allowed and does not change its status.
pub async fn edit_session(
    pool: &SqlitePool,
    workday_hours: u32,
    user_id: Uuid,
    session_id: Uuid,
    req: UpdateSessionRequest,
) -> Result<Session, AppError> {
    let mut session = store::get_session(pool, user_id, session_id).await?;
    let old_duration = session.duration_secs;
    let old_billing = session.billing;

    if let Some(name) = &req.name {
        session.name = validated_name(name)?;
    }
    if let Some(notes) = &req.notes {
        session.notes = Some(notes.clone());
    }
    if let Some(project_id) = req.project_id {
        session.project_id = Some(project_id);
    }
    if let Some(billing) = req.billing {
        validate_billing(&billing)?;
        if session.status == SessionStatus::Active && billing.is_fixed() {
            return Err(AppError::validation(
                "billing",
                "an active session cannot switch to fixed billing",
            ));
        }
        session.billing = billing;
    }
    if req.touches_duration() {
        session.duration_secs = money::duration_from_parts(
            req.days.unwrap_or(0),
            req.hours.unwrap_or(0),
            req.minutes.unwrap_or(0),
            workday_hours,
        );
    }

    if session.duration_secs != old_duration || session.billing != old_billing {
        session.earned = computed_earned(&session.billing, session.duration_secs);
    }
    session.updated_at = Utc::now();
    store::update_session(pool, &session).await?;

    Ok(session)
}

/// Deletes a session. Deleting the session a timer is currently counting
/// also discards that timer.
pub async fn remove_session(
    pool: &SqlitePool,
    engine: &TimerEngine,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<(), AppError> {
    store::delete_session(pool, user_id, session_id).await?;
    if engine.discard_session(user_id, session_id).await {
        info!("Discarded running timer for deleted session {}", session_id);
    }
    Ok(())
}

/// Starts the timer on a brand new session.
///
/// The session row is written immediately as `ACTIVE` with a zero duration;
/// the live count stays in the engine until stop.
pub async fn start_timer(
    pool: &SqlitePool,
    engine: &TimerEngine,
    user_id: Uuid,
    req: StartTimerRequest,
) -> Result<Session, AppError> {
    let name = validated_name(&req.name)?;
    let client_id = req
        .client_id
        .ok_or_else(|| AppError::validation("client_id", "a client is required"))?;
    crate::clients::get_client(pool, user_id, client_id).await?;

    let rate = req
        .rate
        .ok_or_else(|| AppError::validation("rate", "an hourly rate is required"))?;
    let billing = Billing::Hourly { rate };
    validate_billing(&billing)?;

    let now = Utc::now();
    let session = Session {
        id: Uuid::new_v4(),
        user_id,
        client_id,
        project_id: req.project_id,
        name,
        notes: req.notes,
        billing,
        duration_secs: 0,
        earned: Decimal::ZERO,
        occurred_at: now,
        status: SessionStatus::Active,
        payment_status: PaymentStatus::Unpaid,
        created_at: now,
        updated_at: now,
    };

    // Reserve the single timer slot before touching the database, and give
    // it back if the insert fails.
    engine.begin(user_id, session.id, 0).await?;
    if let Err(err) = store::insert_session(pool, &session).await {
        engine.take(user_id).await;
        return Err(err);
    }

    info!("Timer started for session {}", session.id);
    Ok(session)
}

/// Promotes a `PENDING` session to `ACTIVE` and starts timing it, seeded
/// with whatever duration the entry already recorded.
pub async fn start_pending(
    pool: &SqlitePool,
    engine: &TimerEngine,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<Session, AppError> {
    let mut session = store::get_session(pool, user_id, session_id).await?;

    if session.status != SessionStatus::Pending {
        return Err(AppError::validation(
            "status",
            "only pending sessions can be started",
        ));
    }
    if session.billing.is_fixed() {
        return Err(AppError::validation(
            "billing",
            "fixed-price sessions cannot be timed",
        ));
    }

    engine.begin(user_id, session.id, session.duration_secs).await?;

    session.status = SessionStatus::Active;
    session.updated_at = Utc::now();
    if let Err(err) = store::update_session(pool, &session).await {
        engine.take(user_id).await;
        return Err(err);
    }

    info!("Timer started for pending session {}", session.id);
    Ok(session)
}

/// Stops the running timer, writing the elapsed count and the earned amount
/// back into the session row and marking it `DONE`. The timer slot is freed
/// only once the row is written; a failed write leaves the timer running.
pub async fn stop_timer(
    pool: &SqlitePool,
    engine: &TimerEngine,
    user_id: Uuid,
) -> Result<Session, AppError> {
    let timer = engine
        .snapshot(user_id)
        .await
        .ok_or(AppError::NotFound("timer"))?;

    let mut session = store::get_session(pool, user_id, timer.session_id).await?;
    session.duration_secs = timer.elapsed_secs;
    session.earned = computed_earned(&session.billing, session.duration_secs);
    session.status = SessionStatus::Done;
    session.updated_at = Utc::now();
    store::update_session(pool, &session).await?;
    engine.take(user_id).await;

    info!(
        "Timer stopped for session {} after {}s, earned {}",
        session.id, session.duration_secs, session.earned
    );
    Ok(session)
}
