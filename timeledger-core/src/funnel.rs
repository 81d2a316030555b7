//! Sales funnel board: each funnel owns an ordered stage list by value and
//! leads move between stages by direct assignment. The only rule a move has
//! to satisfy is that the target stage key belongs to the lead's funnel.

use std::collections::{HashMap, HashSet};

use anyhow::anyhow;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::{decimal_col, json_col, uuid_col};
use crate::error::AppError;
use crate::models::lead::{
    CreateFunnelRequest, CreateLeadRequest, Funnel, FunnelStage, FunnelStatsResponse, Lead,
    StageConversion, UpdateLeadRequest,
};
use crate::AppState;

#[derive(Debug, FromRow)]
struct FunnelRow {
    id: String,
    user_id: String,
    name: String,
    stages: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FunnelRow> for Funnel {
    type Error = anyhow::Error;

    fn try_from(row: FunnelRow) -> Result<Self, Self::Error> {
        Ok(Funnel {
            id: uuid_col(&row.id)?,
            user_id: uuid_col(&row.user_id)?,
            name: row.name,
            stages: json_col::<Vec<FunnelStage>>(&row.stages)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct LeadRow {
    id: String,
    user_id: String,
    funnel_id: String,
    name: String,
    company: Option<String>,
    stage: String,
    estimated_value: Option<String>,
    currency: String,
    tags: String,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LeadRow> for Lead {
    type Error = anyhow::Error;

    fn try_from(row: LeadRow) -> Result<Self, Self::Error> {
        Ok(Lead {
            id: uuid_col(&row.id)?,
            user_id: uuid_col(&row.user_id)?,
            funnel_id: uuid_col(&row.funnel_id)?,
            name: row.name,
            company: row.company,
            stage: row.stage,
            estimated_value: row.estimated_value.as_deref().map(decimal_col).transpose()?,
            currency: row.currency,
            tags: json_col::<Vec<String>>(&row.tags)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const LEAD_COLUMNS: &str = "id, user_id, funnel_id, name, company, stage, estimated_value, \
                            currency, tags, notes, created_at, updated_at";

/// Fetches one of the user's funnels.
pub async fn get_funnel(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Funnel, AppError> {
    let row = sqlx::query_as::<_, FunnelRow>(
        "SELECT id, user_id, name, stages, created_at, updated_at FROM funnels \
         WHERE id = ? AND user_id = ?",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("funnel"))?;

    Ok(Funnel::try_from(row)?)
}

/// All of the user's funnels, oldest first.
pub async fn list_funnels(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Funnel>, AppError> {
    let rows = sqlx::query_as::<_, FunnelRow>(
        "SELECT id, user_id, name, stages, created_at, updated_at FROM funnels \
         WHERE user_id = ? ORDER BY created_at ASC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Funnel::try_from(row).map_err(AppError::from))
        .collect()
}

/// Creates a funnel with its stage list. Stage positions follow the order of
/// the request; keys must be non-blank and unique within the funnel.
pub async fn create_funnel(
    pool: &SqlitePool,
    user_id: Uuid,
    req: CreateFunnelRequest,
) -> Result<Funnel, AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name", "a funnel name is required"));
    }
    if req.stages.is_empty() {
        return Err(AppError::validation("stages", "at least one stage is required"));
    }

    let mut seen = HashSet::new();
    let mut stages = Vec::with_capacity(req.stages.len());
    for (position, input) in req.stages.into_iter().enumerate() {
        let key = input.key.trim().to_string();
        if key.is_empty() {
            return Err(AppError::validation("stages", "stage keys must not be blank"));
        }
        if !seen.insert(key.clone()) {
            return Err(AppError::validation("stages", "stage keys must be unique"));
        }
        stages.push(FunnelStage {
            key,
            title: input.title,
            position: position as i64,
        });
    }

    let now = Utc::now();
    let funnel = Funnel {
        id: Uuid::new_v4(),
        user_id,
        name,
        stages,
        created_at: now,
        updated_at: now,
    };

    let stages = serde_json::to_string(&funnel.stages)
        .map_err(|e| anyhow!("failed to serialize stages: {e}"))?;
    sqlx::query(
        "INSERT INTO funnels (id, user_id, name, stages, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(funnel.id.to_string())
    .bind(funnel.user_id.to_string())
    .bind(&funnel.name)
    .bind(stages)
    .bind(funnel.created_at)
    .bind(funnel.updated_at)
    .execute(pool)
    .await?;

    Ok(funnel)
}

async fn get_lead(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Lead, AppError> {
    let row = sqlx::query_as::<_, LeadRow>(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads WHERE id = ? AND user_id = ?"
    ))
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("lead"))?;

    Ok(Lead::try_from(row)?)
}

/// Leads of one funnel in creation order; the board groups them by stage.
pub async fn list_leads(
    pool: &SqlitePool,
    user_id: Uuid,
    funnel_id: Uuid,
) -> Result<Vec<Lead>, AppError> {
    let rows = sqlx::query_as::<_, LeadRow>(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads WHERE funnel_id = ? AND user_id = ? \
         ORDER BY created_at ASC"
    ))
    .bind(funnel_id.to_string())
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Lead::try_from(row).map_err(AppError::from))
        .collect()
}

/// Creates a lead inside a funnel. Without an explicit stage the lead lands
/// on the funnel's first stage; an explicit stage must be one of the
/// funnel's keys.
pub async fn create_lead(
    pool: &SqlitePool,
    user_id: Uuid,
    funnel_id: Uuid,
    req: CreateLeadRequest,
) -> Result<Lead, AppError> {
    let funnel = get_funnel(pool, user_id, funnel_id).await?;

    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name", "a lead name is required"));
    }

    let stage = match req.stage {
        Some(stage) => {
            if !funnel.has_stage(&stage) {
                return Err(AppError::UnknownStage(stage));
            }
            stage
        }
        None => funnel
            .first_stage_key()
            .ok_or_else(|| AppError::validation("stage", "funnel has no stages"))?
            .to_string(),
    };

    let now = Utc::now();
    let lead = Lead {
        id: Uuid::new_v4(),
        user_id,
        funnel_id,
        name,
        company: req.company,
        stage,
        estimated_value: req.estimated_value,
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        tags: req.tags.unwrap_or_default(),
        notes: req.notes,
        created_at: now,
        updated_at: now,
    };

    insert_lead(pool, &lead).await?;
    Ok(lead)
}

async fn insert_lead(pool: &SqlitePool, lead: &Lead) -> Result<(), AppError> {
    let tags = serde_json::to_string(&lead.tags)
        .map_err(|e| anyhow!("failed to serialize tags: {e}"))?;
    sqlx::query(&format!(
        "INSERT INTO leads ({LEAD_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(lead.id.to_string())
    .bind(lead.user_id.to_string())
    .bind(lead.funnel_id.to_string())
    .bind(&lead.name)
    .bind(&lead.company)
    .bind(&lead.stage)
    .bind(lead.estimated_value.map(|v| v.to_string()))
    .bind(&lead.currency)
    .bind(tags)
    .bind(&lead.notes)
    .bind(lead.created_at)
    .bind(lead.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Edits a lead. A `stage` in the request is the board move and is checked
/// against the owning funnel's keys; everything else is a plain field update.
pub async fn update_lead(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
    req: UpdateLeadRequest,
) -> Result<Lead, AppError> {
    let mut lead = get_lead(pool, user_id, id).await?;

    if let Some(stage) = req.stage {
        let funnel = get_funnel(pool, user_id, lead.funnel_id).await?;
        if !funnel.has_stage(&stage) {
            return Err(AppError::UnknownStage(stage));
        }
        lead.stage = stage;
    }
    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "a lead name is required"));
        }
        lead.name = name;
    }
    if let Some(company) = req.company {
        lead.company = Some(company);
    }
    if let Some(value) = req.estimated_value {
        lead.estimated_value = Some(value);
    }
    if let Some(currency) = req.currency {
        lead.currency = currency;
    }
    if let Some(tags) = req.tags {
        lead.tags = tags;
    }
    if let Some(notes) = req.notes {
        lead.notes = Some(notes);
    }
    lead.updated_at = Utc::now();

    let tags = serde_json::to_string(&lead.tags)
        .map_err(|e| anyhow!("failed to serialize tags: {e}"))?;
    sqlx::query(
        "UPDATE leads SET name = ?, company = ?, stage = ?, estimated_value = ?, currency = ?, \
         tags = ?, notes = ?, updated_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(&lead.name)
    .bind(&lead.company)
    .bind(&lead.stage)
    .bind(lead.estimated_value.map(|v| v.to_string()))
    .bind(&lead.currency)
    .bind(tags)
    .bind(&lead.notes)
    .bind(lead.updated_at)
    .bind(lead.id.to_string())
    .bind(lead.user_id.to_string())
    .execute(pool)
    .await?;

    Ok(lead)
}

pub async fn delete_lead(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM leads WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("lead"));
    }
    info!("Deleted lead {}", id);
    Ok(())
}

/// Per-stage conversion report over the funnel's current board.
///
/// Each stage's rate is its population as a percentage of the previous
/// stage's. The first stage reads 100 by definition, and so does any stage
/// following an empty one: an empty predecessor says nothing about drop-off.
pub fn funnel_stats(funnel: &Funnel, leads: &[Lead]) -> FunnelStatsResponse {
    let mut counts: HashMap<&str, i64> = HashMap::new();
    for lead in leads {
        *counts.entry(lead.stage.as_str()).or_insert(0) += 1;
    }

    let mut stages = Vec::new();
    let mut previous: Option<i64> = None;
    for stage in funnel.ordered_stages() {
        let count = counts.get(stage.key.as_str()).copied().unwrap_or(0);
        let conversion_rate = match previous {
            None | Some(0) => Decimal::from(100),
            Some(prev) => ((Decimal::from(count) / Decimal::from(prev)) * Decimal::from(100))
                .round_dp_with_strategy(1, rust_decimal::RoundingStrategy::MidpointAwayFromZero),
        };
        stages.push(StageConversion {
            key: stage.key.clone(),
            title: stage.title.clone(),
            count,
            conversion_rate,
        });
        previous = Some(count);
    }

    FunnelStatsResponse {
        funnel_id: funnel.id,
        total_leads: leads.len() as i64,
        stages,
    }
}

// HTTP handlers

pub async fn list_funnels_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<Funnel>>, AppError> {
    let funnels = list_funnels(&state.db, user_id).await?;
    Ok(Json(funnels))
}

pub async fn create_funnel_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateFunnelRequest>,
) -> Result<(StatusCode, Json<Funnel>), AppError> {
    let funnel = create_funnel(&state.db, user_id, req).await?;
    Ok((StatusCode::CREATED, Json(funnel)))
}

pub async fn funnel_stats_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<FunnelStatsResponse>, AppError> {
    let funnel = get_funnel(&state.db, user_id, id).await?;
    let leads = list_leads(&state.db, user_id, id).await?;
    Ok(Json(funnel_stats(&funnel, &leads)))
}

pub async fn list_leads_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Lead>>, AppError> {
    // Listing an unknown funnel should read as not found, not as empty.
    get_funnel(&state.db, user_id, id).await?;
    let leads = list_leads(&state.db, user_id, id).await?;
    Ok(Json(leads))
}

pub async fn create_lead_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<Lead>), AppError> {
    let lead = create_lead(&state.db, user_id, id, req).await?;
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn update_lead_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, AppError> {
    let lead = update_lead(&state.db, user_id, id, req).await?;
    Ok(Json(lead))
}

pub async fn delete_lead_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_lead(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::lead::FunnelStageInput;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn stage_inputs(keys: &[(&str, &str)]) -> Vec<FunnelStageInput> {
        keys.iter()
            .map(|(key, title)| FunnelStageInput {
                key: key.to_string(),
                title: title.to_string(),
            })
            .collect()
    }

    async fn seed_funnel(pool: &SqlitePool, user_id: Uuid) -> Funnel {
        create_funnel(
            pool,
            user_id,
            CreateFunnelRequest {
                name: "Outbound".to_string(),
                stages: stage_inputs(&[
                    ("new", "New"),
                    ("contacted", "Contacted"),
                    ("won", "Won"),
                ]),
            },
        )
        .await
        .unwrap()
    }

    fn lead_request(name: &str, stage: Option<&str>) -> CreateLeadRequest {
        CreateLeadRequest {
            name: name.to_string(),
            company: None,
            stage: stage.map(|s| s.to_string()),
            estimated_value: None,
            currency: None,
            tags: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn stage_positions_follow_request_order() {
        let pool = test_pool().await;
        let funnel = seed_funnel(&pool, Uuid::new_v4()).await;

        let keys: Vec<&str> = funnel.ordered_stages().iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["new", "contacted", "won"]);
        assert_eq!(funnel.stages[2].position, 2);
    }

    #[tokio::test]
    async fn funnels_need_stages_with_unique_keys() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();

        let empty = create_funnel(
            &pool,
            user,
            CreateFunnelRequest {
                name: "Outbound".to_string(),
                stages: vec![],
            },
        )
        .await;
        assert!(matches!(empty, Err(AppError::Validation { field: "stages", .. })));

        let duplicated = create_funnel(
            &pool,
            user,
            CreateFunnelRequest {
                name: "Outbound".to_string(),
                stages: stage_inputs(&[("new", "New"), ("new", "Also new")]),
            },
        )
        .await;
        assert!(matches!(duplicated, Err(AppError::Validation { field: "stages", .. })));
    }

    #[tokio::test]
    async fn leads_default_to_the_first_stage() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let funnel = seed_funnel(&pool, user).await;

        let lead = create_lead(&pool, user, funnel.id, lead_request("Jess", None))
            .await
            .unwrap();
        assert_eq!(lead.stage, "new");
        assert_eq!(lead.currency, "USD");

        let explicit = create_lead(&pool, user, funnel.id, lead_request("Sam", Some("won")))
            .await
            .unwrap();
        assert_eq!(explicit.stage, "won");
    }

    #[tokio::test]
    async fn moves_reject_stage_keys_outside_the_funnel() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let funnel = seed_funnel(&pool, user).await;

        let unknown = create_lead(&pool, user, funnel.id, lead_request("Jess", Some("lost")))
            .await;
        assert!(matches!(unknown, Err(AppError::UnknownStage(s)) if s == "lost"));

        let lead = create_lead(&pool, user, funnel.id, lead_request("Jess", None))
            .await
            .unwrap();
        let moved = update_lead(
            &pool,
            user,
            lead.id,
            UpdateLeadRequest {
                name: None,
                company: None,
                stage: Some("archived".to_string()),
                estimated_value: None,
                currency: None,
                tags: None,
                notes: None,
            },
        )
        .await;
        assert!(matches!(moved, Err(AppError::UnknownStage(s)) if s == "archived"));

        // A valid move is a plain assignment.
        let moved = update_lead(
            &pool,
            user,
            lead.id,
            UpdateLeadRequest {
                name: None,
                company: None,
                stage: Some("contacted".to_string()),
                estimated_value: None,
                currency: None,
                tags: None,
                notes: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(moved.stage, "contacted");
    }

    #[tokio::test]
    async fn conversion_rates_compare_neighbouring_stages() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();
        let funnel = create_funnel(
            &pool,
            user,
            CreateFunnelRequest {
                name: "Outbound".to_string(),
                stages: stage_inputs(&[
                    ("new", "New"),
                    ("contacted", "Contacted"),
                    ("won", "Won"),
                    ("retained", "Retained"),
                ]),
            },
        )
        .await
        .unwrap();

        for name in ["a", "b", "c", "d"] {
            create_lead(&pool, user, funnel.id, lead_request(name, Some("new")))
                .await
                .unwrap();
        }
        for name in ["e", "f", "g"] {
            create_lead(&pool, user, funnel.id, lead_request(name, Some("contacted")))
                .await
                .unwrap();
        }
        create_lead(&pool, user, funnel.id, lead_request("h", Some("retained")))
            .await
            .unwrap();

        let leads = list_leads(&pool, user, funnel.id).await.unwrap();
        let stats = funnel_stats(&funnel, &leads);

        assert_eq!(stats.total_leads, 8);
        let rates: Vec<Decimal> = stats.stages.iter().map(|s| s.conversion_rate).collect();
        // First stage is 100 by definition; 3 of 4 reached "contacted";
        // nobody reached "won"; "retained" follows an empty stage and also
        // reads 100.
        assert_eq!(rates, vec![d("100"), d("75.0"), d("0.0"), d("100")]);
        assert_eq!(stats.stages[3].count, 1);
    }

    #[tokio::test]
    async fn boards_are_scoped_to_their_owner() {
        let pool = test_pool().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let funnel = seed_funnel(&pool, owner).await;

        let lead = create_lead(&pool, owner, funnel.id, lead_request("Jess", None))
            .await
            .unwrap();

        let foreign_create = create_lead(&pool, stranger, funnel.id, lead_request("Eve", None)).await;
        assert!(matches!(foreign_create, Err(AppError::NotFound("funnel"))));
        let foreign_delete = delete_lead(&pool, stranger, lead.id).await;
        assert!(matches!(foreign_delete, Err(AppError::NotFound("lead"))));
    }
}
