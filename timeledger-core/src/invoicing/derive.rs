use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::invoice::{Invoice, InvoiceItem, InvoiceStatus};
use crate::models::session::{Billing, Session};
use crate::money;

/// Everything the caller decides about a new invoice beyond which sessions
/// it bills.
#[derive(Debug, Clone)]
pub struct InvoiceDetails {
    pub invoice_number: String,
    pub issue_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub currency: String,
    pub tax_rate: Decimal,
}

/// Derives a draft invoice from the selected sessions.
///
/// Every session becomes one line item with its description, date and
/// amounts snapshotted; nothing on the invoice changes when the sessions
/// later change. Fixed-price projects bill their amount on the first of
/// their sessions only, the same de-duplication the dashboard applies.
///
/// # Errors
///
/// Validation failures for an empty selection or a tax rate outside 0..=100.
pub fn derive_invoice(
    user_id: Uuid,
    client_id: Uuid,
    selected: &[Session],
    details: InvoiceDetails,
) -> Result<Invoice, AppError> {
    if selected.is_empty() {
        return Err(AppError::validation(
            "session_ids",
            "select at least one session to invoice",
        ));
    }
    if details.tax_rate < Decimal::ZERO || details.tax_rate > Decimal::from(100) {
        return Err(AppError::validation(
            "tax_rate",
            "the tax rate must be between 0 and 100",
        ));
    }

    let items = build_items(selected);
    let (subtotal, tax_amount, total) = compute_totals(&items, details.tax_rate);

    let now = Utc::now();
    Ok(Invoice {
        id: Uuid::new_v4(),
        user_id,
        client_id,
        invoice_number: details.invoice_number,
        issue_date: details.issue_date,
        due_date: details.due_date,
        currency: details.currency,
        items,
        subtotal,
        tax_rate: details.tax_rate,
        tax_amount,
        total,
        status: InvoiceStatus::Draft,
        session_ids: selected.iter().map(|s| s.id).collect(),
        created_at: now,
        updated_at: now,
    })
}

fn build_items(selected: &[Session]) -> Vec<InvoiceItem> {
    let mut seen_fixed: HashSet<(Uuid, Option<Uuid>)> = HashSet::new();

    selected
        .iter()
        .map(|session| match session.billing {
            Billing::Hourly { rate } => InvoiceItem {
                session_id: session.id,
                description: session.name.clone(),
                date: session.occurred_at.date_naive(),
                hours: Some(money::round_money(money::hours_from_secs(session.duration_secs))),
                rate: Some(rate),
                fixed: false,
                amount: session.earned,
            },
            Billing::FixedProject { fixed_amount } => {
                let first = seen_fixed.insert((session.client_id, session.project_id));
                InvoiceItem {
                    session_id: session.id,
                    description: session.name.clone(),
                    date: session.occurred_at.date_naive(),
                    hours: None,
                    rate: None,
                    fixed: true,
                    amount: if first { fixed_amount } else { Decimal::ZERO },
                }
            }
        })
        .collect()
}

fn compute_totals(items: &[InvoiceItem], tax_rate: Decimal) -> (Decimal, Decimal, Decimal) {
    let subtotal: Decimal = items.iter().map(|item| item.amount).sum();
    let tax_amount = money::round_money(subtotal * tax_rate / Decimal::from(100));
    let total = subtotal + tax_amount;
    (subtotal, tax_amount, total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::session::{PaymentStatus, SessionStatus};
    use chrono::TimeZone;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn details() -> InvoiceDetails {
        InvoiceDetails {
            invoice_number: "INV-0001".to_string(),
            issue_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            due_date: None,
            currency: "USD".to_string(),
            tax_rate: Decimal::ZERO,
        }
    }

    fn done_session(client: Uuid, name: &str, secs: i64, billing: Billing) -> Session {
        let earned = match billing {
            Billing::Hourly { rate } => money::earned_from_duration(secs, rate),
            Billing::FixedProject { .. } => Decimal::ZERO,
        };
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_id: client,
            project_id: None,
            name: name.to_string(),
            notes: None,
            billing,
            duration_secs: secs,
            earned,
            occurred_at: Utc.with_ymd_and_hms(2024, 2, 12, 10, 0, 0).single().unwrap(),
            status: SessionStatus::Done,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn hourly_lines_snapshot_hours_rate_and_earned() {
        let client = Uuid::new_v4();
        let sessions = vec![done_session(
            client,
            "Design review",
            5400,
            Billing::Hourly { rate: d("50") },
        )];

        let invoice = derive_invoice(Uuid::new_v4(), client, &sessions, details()).unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Draft);
        assert_eq!(invoice.items.len(), 1);

        let item = &invoice.items[0];
        assert_eq!(item.description, "Design review");
        assert_eq!(item.hours, Some(d("1.50")));
        assert_eq!(item.rate, Some(d("50")));
        assert_eq!(item.amount, d("75.00"));
        assert_eq!(invoice.subtotal, d("75.00"));
        assert_eq!(invoice.total, d("75.00"));
    }

    #[test]
    fn fixed_projects_bill_once_across_items() {
        let client = Uuid::new_v4();
        let project = Uuid::new_v4();
        let mut first = done_session(
            client,
            "Logo",
            3600,
            Billing::FixedProject { fixed_amount: d("200") },
        );
        first.project_id = Some(project);
        let mut second = done_session(
            client,
            "Revisions",
            1800,
            Billing::FixedProject { fixed_amount: d("200") },
        );
        second.project_id = Some(project);

        let invoice =
            derive_invoice(Uuid::new_v4(), client, &[first, second], details()).unwrap();
        assert_eq!(invoice.items[0].amount, d("200"));
        assert_eq!(invoice.items[1].amount, Decimal::ZERO);
        assert!(invoice.items[1].fixed);
        assert_eq!(invoice.subtotal, d("200"));
    }

    #[test]
    fn tax_is_applied_on_top_of_the_subtotal() {
        let client = Uuid::new_v4();
        let sessions = vec![done_session(
            client,
            "Build",
            7200,
            Billing::Hourly { rate: d("150") },
        )];

        let mut with_tax = details();
        with_tax.tax_rate = d("8.5");
        let invoice = derive_invoice(Uuid::new_v4(), client, &sessions, with_tax).unwrap();
        assert_eq!(invoice.subtotal, d("300.00"));
        assert_eq!(invoice.tax_amount, d("25.50"));
        assert_eq!(invoice.total, d("325.50"));
    }

    #[test]
    fn tax_rate_is_bounded() {
        let client = Uuid::new_v4();
        let sessions = vec![done_session(client, "Build", 3600, Billing::Hourly { rate: d("50") })];

        for bad in ["-1", "100.5"] {
            let mut bad_details = details();
            bad_details.tax_rate = d(bad);
            let result = derive_invoice(Uuid::new_v4(), client, &sessions, bad_details);
            assert!(matches!(result, Err(AppError::Validation { field: "tax_rate", .. })));
        }
    }

    #[test]
    fn an_empty_selection_is_rejected() {
        let result = derive_invoice(Uuid::new_v4(), Uuid::new_v4(), &[], details());
        assert!(matches!(
            result,
            Err(AppError::Validation { field: "session_ids", .. })
        ));
    }
}
