use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::info;
use uuid::Uuid;

use crate::db::{decimal_col, json_col, uuid_col};
use crate::error::AppError;
use crate::ledger::store::mark_sessions_paid;
use crate::models::invoice::{Invoice, InvoiceItem, InvoiceStatus};

#[derive(Debug, FromRow)]
struct InvoiceRow {
    id: String,
    user_id: String,
    client_id: String,
    invoice_number: String,
    issue_date: NaiveDate,
    due_date: Option<NaiveDate>,
    currency: String,
    items: String,
    subtotal: String,
    tax_rate: String,
    tax_amount: String,
    total: String,
    status: String,
    session_ids: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = anyhow::Error;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: uuid_col(&row.id)?,
            user_id: uuid_col(&row.user_id)?,
            client_id: uuid_col(&row.client_id)?,
            invoice_number: row.invoice_number,
            issue_date: row.issue_date,
            due_date: row.due_date,
            currency: row.currency,
            items: json_col::<Vec<InvoiceItem>>(&row.items)?,
            subtotal: decimal_col(&row.subtotal)?,
            tax_rate: decimal_col(&row.tax_rate)?,
            tax_amount: decimal_col(&row.tax_amount)?,
            total: decimal_col(&row.total)?,
            status: InvoiceStatus::parse(&row.status)
                .ok_or_else(|| anyhow!("unknown invoice status: {}", row.status))?,
            session_ids: json_col::<Vec<Uuid>>(&row.session_ids)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const INVOICE_COLUMNS: &str = "id, user_id, client_id, invoice_number, issue_date, due_date, \
     currency, items, subtotal, tax_rate, tax_amount, total, status, session_ids, \
     created_at, updated_at";

/// Persists a freshly derived invoice.
pub async fn insert_invoice(pool: &SqlitePool, invoice: &Invoice) -> Result<(), AppError> {
    let items = serde_json::to_string(&invoice.items)
        .map_err(|e| anyhow!("failed to serialize invoice items: {e}"))?;
    let session_ids = serde_json::to_string(&invoice.session_ids)
        .map_err(|e| anyhow!("failed to serialize session ids: {e}"))?;

    sqlx::query(
        "INSERT INTO invoices (id, user_id, client_id, invoice_number, issue_date, due_date, \
         currency, items, subtotal, tax_rate, tax_amount, total, status, session_ids, \
         created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(invoice.id.to_string())
    .bind(invoice.user_id.to_string())
    .bind(invoice.client_id.to_string())
    .bind(&invoice.invoice_number)
    .bind(invoice.issue_date)
    .bind(invoice.due_date)
    .bind(&invoice.currency)
    .bind(items)
    .bind(invoice.subtotal.to_string())
    .bind(invoice.tax_rate.to_string())
    .bind(invoice.tax_amount.to_string())
    .bind(invoice.total.to_string())
    .bind(invoice.status.as_str())
    .bind(session_ids)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Fetches one of the user's invoices.
pub async fn get_invoice(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<Invoice, AppError> {
    let row = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ? AND user_id = ?"
    ))
    .bind(id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::NotFound("invoice"))?;

    Ok(Invoice::try_from(row)?)
}

/// All of the user's invoices, newest first.
pub async fn list_invoices(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Invoice>, AppError> {
    let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE user_id = ? ORDER BY created_at DESC"
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| Invoice::try_from(row).map_err(AppError::from))
        .collect()
}

/// Number of invoices the user has ever created, used for default numbering.
pub async fn count_invoices(pool: &SqlitePool, user_id: Uuid) -> Result<i64, AppError> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM invoices WHERE user_id = ?")
        .bind(user_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count.0)
}

/// Moves an invoice one step along its cycle: draft to sent, sent to paid,
/// paid back to draft.
///
/// Reaching paid flips every source session to `PAID` in the same
/// transaction as the status write, so the ledger can never show an invoice
/// paid while its sessions still read unpaid. Cycling a paid invoice back to
/// draft leaves the sessions paid; correcting them is a deliberate separate
/// step.
///
/// # Errors
///
/// `AppError::InvoiceCancelled` when the invoice is cancelled.
pub async fn advance_invoice(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Invoice, AppError> {
    let mut invoice = get_invoice(pool, user_id, id).await?;
    let next = invoice.status.next_in_cycle().ok_or(AppError::InvoiceCancelled)?;
    let now = Utc::now();

    let mut tx = pool.begin().await?;
    sqlx::query("UPDATE invoices SET status = ?, updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(next.as_str())
        .bind(now)
        .bind(invoice.id.to_string())
        .bind(invoice.user_id.to_string())
        .execute(&mut *tx)
        .await?;
    if next == InvoiceStatus::Paid {
        mark_sessions_paid(&mut tx, user_id, &invoice.session_ids, now).await?;
    }
    tx.commit().await?;

    if next == InvoiceStatus::Paid {
        info!(
            "Invoice {} paid; {} sessions marked paid",
            invoice.invoice_number,
            invoice.session_ids.len()
        );
    }

    invoice.status = next;
    invoice.updated_at = now;
    Ok(invoice)
}

/// Cancels an invoice from any status. Cancellation is terminal.
pub async fn cancel_invoice(
    pool: &SqlitePool,
    user_id: Uuid,
    id: Uuid,
) -> Result<Invoice, AppError> {
    let mut invoice = get_invoice(pool, user_id, id).await?;
    if invoice.status == InvoiceStatus::Cancelled {
        return Err(AppError::InvoiceCancelled);
    }

    let now = Utc::now();
    sqlx::query("UPDATE invoices SET status = 'cancelled', updated_at = ? WHERE id = ? AND user_id = ?")
        .bind(now)
        .bind(invoice.id.to_string())
        .bind(invoice.user_id.to_string())
        .execute(pool)
        .await?;

    invoice.status = InvoiceStatus::Cancelled;
    invoice.updated_at = now;
    Ok(invoice)
}

/// Deletes an invoice, which is only allowed while it is still a draft.
pub async fn delete_draft(pool: &SqlitePool, user_id: Uuid, id: Uuid) -> Result<(), AppError> {
    let invoice = get_invoice(pool, user_id, id).await?;
    if invoice.status != InvoiceStatus::Draft {
        return Err(AppError::InvoiceNotDraft);
    }

    sqlx::query("DELETE FROM invoices WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
