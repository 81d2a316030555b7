use rust_decimal::Decimal;

use crate::models::invoice::Invoice;
use crate::money;

/// Renders an invoice as a plain-text document suitable for pasting into an
/// email. Everything comes from the invoice's own snapshot; the sessions it
/// was derived from are not consulted.
pub fn render_document(invoice: &Invoice, client_name: &str) -> String {
    let mut out = String::new();

    out.push_str(&format!("INVOICE {}\n", invoice.invoice_number));
    out.push_str(&format!("Issue date: {}\n", invoice.issue_date.format("%Y-%m-%d")));
    if let Some(due) = invoice.due_date {
        out.push_str(&format!("Due date:   {}\n", due.format("%Y-%m-%d")));
    }
    out.push_str(&format!("Billed to:  {}\n", client_name));
    out.push_str(&format!("Currency:   {}\n", invoice.currency));
    out.push('\n');

    out.push_str(&format!(
        "{:<12}{:<32}{:>8}{:>10}{:>12}\n",
        "Date", "Description", "Hours", "Rate", "Amount"
    ));
    out.push_str(&format!("{}\n", "-".repeat(74)));

    for item in &invoice.items {
        let description = if item.fixed {
            format!("{} (fixed)", item.description)
        } else {
            item.description.clone()
        };
        let hours = item.hours.map(amount_cell).unwrap_or_else(|| "-".to_string());
        let rate = item.rate.map(amount_cell).unwrap_or_else(|| "-".to_string());

        out.push_str(&format!(
            "{:<12}{:<32}{:>8}{:>10}{:>12}\n",
            item.date.format("%Y-%m-%d").to_string(),
            description,
            hours,
            rate,
            amount_cell(item.amount),
        ));
    }

    out.push('\n');
    out.push_str(&format!("{:<64}{:>10}\n", "Subtotal", amount_cell(invoice.subtotal)));
    if invoice.tax_rate > Decimal::ZERO {
        out.push_str(&format!(
            "{:<64}{:>10}\n",
            format!("Tax ({}%)", invoice.tax_rate),
            amount_cell(invoice.tax_amount),
        ));
    }
    out.push_str(&format!("{:<64}{:>10}\n", "Total", amount_cell(invoice.total)));

    out
}

fn amount_cell(value: Decimal) -> String {
    format!("{:.2}", money::round_money(value))
}
