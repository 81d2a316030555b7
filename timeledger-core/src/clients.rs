//! Client directory: the people the user bills, each owning a list of
//! projects by value. Sessions reference clients, so deleting a client
//! cascades to its sessions. Invoices are deliberately left alone: they are
//! immutable billing records even when their client goes away.

use anyhow::anyhow;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::db::{json_col, uuid_col};
use crate::error::AppError;
use crate::models::client::{
    Client, ClientResponse, CreateClientRequest, Project, ProjectInput, UpdateClientRequest,
};
use crate::AppState;

#[derive(Debug, FromRow)]
struct ClientRow {
    id: String,
    user_id: String,
    name: String,
    projects: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ClientRow> for Client {
    type Error = anyhow::Error;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(Client {
            id: uuid_col(&row.id)?,
            user_id: uuid_col(&row.user_id)?,
            name: row.name,
            projects: json_col::<Vec<Project>>(&row.projects)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Fetches one of the user's clients.
pub async fn get_client(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Client, AppError> {
    let row = sqlx::query_as::<_, ClientRow>(
        "SELECT id, user_id, name, projects, created_at, updated_at FROM clients \
         WHERE id = ? AND user_id = ?",
    )
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("client"))?;

    Ok(Client::try_from(row)?)
}

/// All of the user's clients, alphabetical.
pub async fn list_clients(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Client>, AppError> {
    let rows = sqlx::query_as::<_, ClientRow>(
        "SELECT id, user_id, name, projects, created_at, updated_at FROM clients \
         WHERE user_id = ? ORDER BY name ASC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Client::try_from(row).map_err(AppError::from))
        .collect()
}

fn materialize_projects(inputs: Vec<ProjectInput>) -> Vec<Project> {
    inputs
        .into_iter()
        .map(|input| Project {
            id: input.id.unwrap_or_else(Uuid::new_v4),
            name: input.name,
            billing: input.billing,
            rate: input.rate,
            budget: input.budget,
        })
        .collect()
}

/// Creates a client with an optional initial project list.
pub async fn create_client(
    pool: &SqlitePool,
    user_id: Uuid,
    req: CreateClientRequest,
) -> Result<Client, AppError> {
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err(AppError::validation("name", "a client name is required"));
    }

    let now = Utc::now();
    let client = Client {
        id: Uuid::new_v4(),
        user_id,
        name,
        projects: materialize_projects(req.projects.unwrap_or_default()),
        created_at: now,
        updated_at: now,
    };

    let projects = serde_json::to_string(&client.projects)
        .map_err(|e| anyhow!("failed to serialize projects: {e}"))?;
    sqlx::query(
        "INSERT INTO clients (id, user_id, name, projects, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(client.id.to_string())
    .bind(client.user_id.to_string())
    .bind(&client.name)
    .bind(projects)
    .bind(client.created_at)
    .bind(client.updated_at)
    .execute(pool)
    .await?;

    Ok(client)
}

/// Updates a client's name or replaces its project list.
pub async fn update_client(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
    req: UpdateClientRequest,
) -> Result<Client, AppError> {
    let mut client = get_client(pool, user_id, id).await?;

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::validation("name", "a client name is required"));
        }
        client.name = name;
    }
    if let Some(projects) = req.projects {
        client.projects = materialize_projects(projects);
    }
    client.updated_at = Utc::now();

    let projects = serde_json::to_string(&client.projects)
        .map_err(|e| anyhow!("failed to serialize projects: {e}"))?;
    sqlx::query("UPDATE clients SET name = ?, projects = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(&client.name)
        .bind(projects)
        .bind(client.updated_at)
        .bind(client.id.to_string())
        .bind(client.user_id.to_string())
        .execute(pool)
        .await?;

    Ok(client)
}

/// Deletes a client and all of its sessions in one transaction. Existing
/// invoices keep their snapshots and are not touched.
pub async fn delete_client(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    // Ownership check up front so a foreign id reads as not found.
    get_client(pool, user_id, id).await?;

    let mut tx = pool.begin().await?;
    let removed = crate::ledger::store::delete_sessions_for_client(&mut tx, user_id, id).await?;
    sqlx::query("DELETE FROM clients WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    info!("Deleted client {} and {} of its sessions", id, removed);
    Ok(())
}

// HTTP handlers

pub async fn list_clients_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<ClientResponse>>, AppError> {
    let clients = list_clients(&state.db, user_id).await?;
    Ok(Json(clients.into_iter().map(ClientResponse::from).collect()))
}

pub async fn create_client_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>), AppError> {
    let client = create_client(&state.db, user_id, req).await?;
    state.sync.mark_dirty(user_id);
    Ok((StatusCode::CREATED, Json(ClientResponse::from(client))))
}

pub async fn get_client_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<ClientResponse>, AppError> {
    let client = get_client(&state.db, user_id, id).await?;
    Ok(Json(ClientResponse::from(client)))
}

pub async fn update_client_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<ClientResponse>, AppError> {
    let client = update_client(&state.db, user_id, id, req).await?;
    state.sync.mark_dirty(user_id);
    Ok(Json(ClientResponse::from(client)))
}

pub async fn delete_client_handler(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    delete_client(&state.db, user_id, id).await?;
    state.sync.mark_dirty(user_id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::models::client::ProjectBilling;

    #[tokio::test]
    async fn create_and_fetch_round_trip() {
        let pool = test_pool().await;
        let user = Uuid::new_v4();

        let created = create_client(
            &pool,
            user,
            CreateClientRequest {
                name: "  Acme LLC  ".to_string(),
                projects: Some(vec![ProjectInput {
                    id: None,
                    name: "Website".to_string(),
                    billing: ProjectBilling::Hourly,
                    rate: Some("75".parse().unwrap()),
                    budget: None,
                }]),
            },
        )
        .await
        .unwrap();
        assert_eq!(created.name, "Acme LLC");

        let fetched = get_client(&pool, user, created.id).await.unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.projects.len(), 1);
    }

    #[tokio::test]
    async fn clients_are_scoped_to_their_owner() {
        let pool = test_pool().await;
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();

        let client = create_client(
            &pool,
            owner,
            CreateClientRequest {
                name: "Acme".to_string(),
                projects: None,
            },
        )
        .await
        .unwrap();

        let result = get_client(&pool, stranger, client.id).await;
        assert!(matches!(result, Err(AppError::NotFound("client"))));
    }

    #[tokio::test]
    async fn blank_names_are_rejected() {
        let pool = test_pool().await;
        let result = create_client(
            &pool,
            Uuid::new_v4(),
            CreateClientRequest {
                name: "   ".to_string(),
                projects: None,
            },
        )
        .await;
        assert!(matches!(result, Err(AppError::Validation { field: "name", .. })));
    }
}
