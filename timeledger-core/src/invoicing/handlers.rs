use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::clients;
use crate::error::AppError;
use crate::invoicing::derive::{derive_invoice, InvoiceDetails};
use crate::invoicing::document::render_document;
use crate::invoicing::store;
use crate::ledger::store::billable_candidates;
use crate::models::invoice::{CreateInvoiceRequest, InvoiceResponse, InvoiceStatus};
use crate::models::session::SessionResponse;
use crate::AppState;

/// `GET /api/invoices` - all invoices, newest first.
pub async fn list_invoices(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
) -> Result<Json<Vec<InvoiceResponse>>, AppError> {
    let today = Utc::now().date_naive();
    let invoices = store::list_invoices(&state.db, user_id).await?;
    Ok(Json(
        invoices
            .into_iter()
            .map(|invoice| InvoiceResponse::from_invoice(invoice, today))
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct CandidatesQuery {
    pub client_id: Uuid,
}

/// `GET /api/invoices/candidates` - finished, unpaid sessions of a client,
/// the only sessions an invoice may bill.
pub async fn invoice_candidates(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Query(query): Query<CandidatesQuery>,
) -> Result<Json<Vec<SessionResponse>>, AppError> {
    clients::get_client(&state.db, user_id, query.client_id).await?;
    let candidates = billable_candidates(&state.db, user_id, query.client_id).await?;
    Ok(Json(candidates.into_iter().map(SessionResponse::from).collect()))
}

/// `POST /api/invoices` - derive a draft invoice from selected sessions.
pub async fn create_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Json(req): Json<CreateInvoiceRequest>,
) -> Result<(StatusCode, Json<InvoiceResponse>), AppError> {
    let client_id = req
        .client_id
        .ok_or_else(|| AppError::validation("client_id", "a client is required"))?;
    clients::get_client(&state.db, user_id, client_id).await?;

    // Each requested session must currently be billable for this client.
    let candidates = billable_candidates(&state.db, user_id, client_id).await?;
    let candidate_ids: HashSet<Uuid> = candidates.iter().map(|s| s.id).collect();
    for id in &req.session_ids {
        if !candidate_ids.contains(id) {
            return Err(AppError::validation(
                "session_ids",
                format!("session {id} is not billable for this client"),
            ));
        }
    }
    let requested: HashSet<Uuid> = req.session_ids.iter().copied().collect();
    let selected: Vec<_> = candidates
        .into_iter()
        .filter(|s| requested.contains(&s.id))
        .collect();

    let invoice_number = match req.invoice_number.as_deref().map(str::trim) {
        Some(number) if !number.is_empty() => number.to_string(),
        _ => {
            let count = store::count_invoices(&state.db, user_id).await?;
            format!("INV-{:04}", count + 1)
        }
    };

    let today = Utc::now().date_naive();
    let details = InvoiceDetails {
        invoice_number,
        issue_date: req.issue_date.unwrap_or(today),
        due_date: req.due_date,
        currency: req.currency.unwrap_or_else(|| "USD".to_string()),
        tax_rate: req.tax_rate.unwrap_or(Decimal::ZERO),
    };

    let invoice = derive_invoice(user_id, client_id, &selected, details)?;
    store::insert_invoice(&state.db, &invoice).await?;

    Ok((
        StatusCode::CREATED,
        Json(InvoiceResponse::from_invoice(invoice, today)),
    ))
}

/// `GET /api/invoices/:id`
pub async fn get_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = store::get_invoice(&state.db, user_id, id).await?;
    Ok(Json(InvoiceResponse::from_invoice(invoice, Utc::now().date_naive())))
}

/// `POST /api/invoices/:id/advance` - one step along the status cycle.
pub async fn advance_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = store::advance_invoice(&state.db, user_id, id).await?;
    if invoice.status == InvoiceStatus::Paid {
        // The payment write-through changed session rows.
        state.sync.mark_dirty(user_id);
    }
    Ok(Json(InvoiceResponse::from_invoice(invoice, Utc::now().date_naive())))
}

/// `POST /api/invoices/:id/cancel`
pub async fn cancel_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<InvoiceResponse>, AppError> {
    let invoice = store::cancel_invoice(&state.db, user_id, id).await?;
    Ok(Json(InvoiceResponse::from_invoice(invoice, Utc::now().date_naive())))
}

/// `DELETE /api/invoices/:id` - drafts only.
pub async fn delete_invoice(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    store::delete_draft(&state.db, user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/invoices/:id/document` - the invoice as plain text.
pub async fn invoice_document(
    State(state): State<AppState>,
    Extension(CurrentUser(user_id)): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = store::get_invoice(&state.db, user_id, id).await?;
    let client_name = match clients::get_client(&state.db, user_id, invoice.client_id).await {
        Ok(client) => client.name,
        // The client may have been deleted since; the invoice outlives it.
        Err(AppError::NotFound(_)) => "(deleted client)".to_string(),
        Err(err) => return Err(err),
    };

    let body = render_document(&invoice, &client_name);
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body))
}
