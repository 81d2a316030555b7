use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stored invoice status.
///
/// The cycle is `draft -> sent -> paid -> draft`; `cancelled` is a terminal
/// state reachable from anywhere. Overdue is deliberately not a stored
/// status: it is derived from the due date at read time so an invoice never
/// flips state by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(InvoiceStatus::Draft),
            "sent" => Some(InvoiceStatus::Sent),
            "paid" => Some(InvoiceStatus::Paid),
            "cancelled" => Some(InvoiceStatus::Cancelled),
            _ => None,
        }
    }

    /// Next status in the cycle, or `None` for cancelled invoices.
    pub fn next_in_cycle(&self) -> Option<InvoiceStatus> {
        match self {
            InvoiceStatus::Draft => Some(InvoiceStatus::Sent),
            InvoiceStatus::Sent => Some(InvoiceStatus::Paid),
            InvoiceStatus::Paid => Some(InvoiceStatus::Draft),
            InvoiceStatus::Cancelled => None,
        }
    }
}

/// One line of an invoice, snapshotted from a session at derivation time.
///
/// Later edits or deletion of the source session never touch these values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    /// Session this line was derived from
    pub session_id: Uuid,

    /// Line description (the session name)
    pub description: String,

    /// Day the work happened
    pub date: NaiveDate,

    /// Billed hours (hourly lines only)
    pub hours: Option<Decimal>,

    /// Hourly rate (hourly lines only)
    pub rate: Option<Decimal>,

    /// Whether this line bills a fixed-price project
    pub fixed: bool,

    /// Line amount; zero for a fixed line whose project amount was already
    /// billed by an earlier line on the same invoice
    pub amount: Decimal,
}

/// Invoice model representing a billing document derived from sessions.
///
/// This struct maps to the `invoices` table. Items and totals are immutable
/// snapshots; only `status` changes after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier for the invoice
    pub id: Uuid,

    /// ID of the user who owns this invoice
    pub user_id: Uuid,

    /// Client this invoice bills
    pub client_id: Uuid,

    /// Invoice number (unique per user)
    pub invoice_number: String,

    /// Date when invoice was issued
    pub issue_date: NaiveDate,

    /// Due date for payment
    pub due_date: Option<NaiveDate>,

    /// Currency code (ISO 4217)
    pub currency: String,

    /// Snapshotted line items
    pub items: Vec<InvoiceItem>,

    /// Sum of line amounts
    pub subtotal: Decimal,

    /// Tax percentage applied on top of the subtotal
    pub tax_rate: Decimal,

    /// Tax amount in currency units
    pub tax_amount: Decimal,

    /// Grand total (subtotal + tax)
    pub total: Decimal,

    /// Stored status
    pub status: InvoiceStatus,

    /// Sessions this invoice was derived from
    pub session_ids: Vec<Uuid>,

    /// Timestamp when the invoice was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the invoice was last updated
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Status string for display, with overdue derived on the fly: a sent
    /// invoice whose due date has passed reads as "overdue" without its
    /// stored status changing.
    pub fn display_status(&self, today: NaiveDate) -> &'static str {
        match (self.status, self.due_date) {
            (InvoiceStatus::Sent, Some(due)) if due < today => "overdue",
            _ => self.status.as_str(),
        }
    }
}

/// Invoice derivation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client_id: Option<Uuid>,
    /// Sessions to bill; each must be a billable candidate for the client
    pub session_ids: Vec<Uuid>,
    pub invoice_number: Option<String>,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub currency: Option<String>,
    /// Tax percentage, 0 to 100
    pub tax_rate: Option<Decimal>,
}

/// Invoice response (public representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub items: Vec<InvoiceItem>,
    pub subtotal: Decimal,
    pub tax_rate: Decimal,
    pub tax_amount: Decimal,
    pub total: Decimal,
    pub status: InvoiceStatus,
    /// Stored status with overdue derived from the due date
    pub display_status: String,
    pub session_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceResponse {
    /// Builds the public representation, deriving the display status against
    /// the given day.
    pub fn from_invoice(invoice: Invoice, today: NaiveDate) -> Self {
        let display_status = invoice.display_status(today).to_string();
        InvoiceResponse {
            id: invoice.id,
            user_id: invoice.user_id,
            client_id: invoice.client_id,
            invoice_number: invoice.invoice_number,
            issue_date: invoice.issue_date,
            due_date: invoice.due_date,
            currency: invoice.currency,
            items: invoice.items,
            subtotal: invoice.subtotal,
            tax_rate: invoice.tax_rate,
            tax_amount: invoice.tax_amount,
            total: invoice.total,
            status: invoice.status,
            display_status,
            session_ids: invoice.session_ids,
            created_at: invoice.created_at,
            updated_at: invoice.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_cycle_wraps_from_paid_back_to_draft() {
        assert_eq!(InvoiceStatus::Draft.next_in_cycle(), Some(InvoiceStatus::Sent));
        assert_eq!(InvoiceStatus::Sent.next_in_cycle(), Some(InvoiceStatus::Paid));
        assert_eq!(InvoiceStatus::Paid.next_in_cycle(), Some(InvoiceStatus::Draft));
        assert_eq!(InvoiceStatus::Cancelled.next_in_cycle(), None);
    }

    fn invoice_with(status: InvoiceStatus, due_date: Option<NaiveDate>) -> Invoice {
        Invoice {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_id: Uuid::new_v4(),
            invoice_number: "INV-0001".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date,
            currency: "USD".to_string(),
            items: Vec::new(),
            subtotal: Decimal::ZERO,
            tax_rate: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total: Decimal::ZERO,
            status,
            session_ids: Vec::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sent_invoice_past_due_displays_as_overdue() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let invoice = invoice_with(InvoiceStatus::Sent, Some(due));

        let after = NaiveDate::from_ymd_opt(2024, 3, 16).unwrap();
        assert_eq!(invoice.display_status(after), "overdue");

        // On the due date itself it is still just sent.
        assert_eq!(invoice.display_status(due), "sent");
    }

    #[test]
    fn overdue_is_never_derived_for_other_statuses() {
        let due = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let after = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();

        let paid = invoice_with(InvoiceStatus::Paid, Some(due));
        assert_eq!(paid.display_status(after), "paid");

        let draft = invoice_with(InvoiceStatus::Draft, Some(due));
        assert_eq!(draft.display_status(after), "draft");

        let no_due = invoice_with(InvoiceStatus::Sent, None);
        assert_eq!(no_due.display_status(after), "sent");
    }
}
