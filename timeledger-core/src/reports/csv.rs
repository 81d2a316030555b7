use std::collections::HashMap;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::client::Client;
use crate::models::session::{Billing, Session, SessionStatus};
use crate::money;
use crate::reports::stats::earning_figures;

const HEADER: &str = "Date,Client,Project,Task,Notes,Hours,Rate,Earned";

/// Renders the finished sessions of the visible list as CSV, one row per
/// `DONE` session; pending and active entries are not exported.
///
/// Free-text cells are always quoted (with embedded quotes doubled), dates
/// are plain `YYYY-MM-DD`, and numeric cells carry two decimals. The Earned
/// column uses the same per-session figures as the dashboard aggregates, so
/// fixed-price de-duplication applies here too.
pub fn export_csv(sessions: &[Session], clients: &[Client]) -> String {
    let client_names: HashMap<Uuid, &str> =
        clients.iter().map(|c| (c.id, c.name.as_str())).collect();
    let project_names: HashMap<Uuid, &str> = clients
        .iter()
        .flat_map(|c| c.projects.iter().map(|p| (p.id, p.name.as_str())))
        .collect();

    let figures = earning_figures(sessions);

    let mut out = String::from(HEADER);
    out.push('\n');
    for (session, figure) in sessions.iter().zip(&figures) {
        if session.status != SessionStatus::Done {
            continue;
        }
        let client = client_names.get(&session.client_id).copied().unwrap_or("");
        let project = session
            .project_id
            .and_then(|id| project_names.get(&id).copied())
            .unwrap_or("");
        let rate = match &session.billing {
            Billing::Hourly { rate } => number_cell(*rate),
            Billing::FixedProject { .. } => String::new(),
        };

        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}\n",
            session.occurred_at.format("%Y-%m-%d"),
            quoted(client),
            quoted(project),
            quoted(&session.name),
            quoted(session.notes.as_deref().unwrap_or("")),
            number_cell(money::hours_from_secs(session.duration_secs)),
            rate,
            number_cell(*figure),
        ));
    }
    out
}

fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Two-decimal numeric cell. Rounding happens before formatting so the
/// format specifier only ever pads.
fn number_cell(value: Decimal) -> String {
    format!("{:.2}", money::round_money(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::client::{Project, ProjectBilling};
    use crate::models::session::{PaymentStatus, SessionStatus};
    use chrono::{TimeZone, Utc};

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn client_with_project(name: &str, project: &str) -> Client {
        Client {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: name.to_string(),
            projects: vec![Project {
                id: Uuid::new_v4(),
                name: project.to_string(),
                billing: ProjectBilling::Hourly,
                rate: None,
                budget: None,
            }],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn session(client: &Client, name: &str, secs: i64, rate: &str) -> Session {
        let rate = d(rate);
        Session {
            id: Uuid::new_v4(),
            user_id: client.user_id,
            client_id: client.id,
            project_id: Some(client.projects[0].id),
            name: name.to_string(),
            notes: None,
            billing: Billing::Hourly { rate },
            duration_secs: secs,
            earned: money::earned_from_duration(secs, rate),
            occurred_at: Utc.with_ymd_and_hms(2024, 2, 12, 9, 30, 0).single().unwrap(),
            status: SessionStatus::Done,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn rows_carry_names_dates_and_two_decimal_numbers() {
        let client = client_with_project("Acme", "Website");
        let sessions = vec![session(&client, "Design review", 5400, "50")];

        let csv = export_csv(&sessions, &[client]);
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "Date,Client,Project,Task,Notes,Hours,Rate,Earned");
        assert_eq!(
            lines.next().unwrap(),
            "2024-02-12,\"Acme\",\"Website\",\"Design review\",\"\",1.50,50.00,75.00"
        );
        assert!(lines.next().is_none());
    }

    #[test]
    fn embedded_quotes_are_doubled() {
        let client = client_with_project("Acme \"North\"", "Web");
        let mut s = session(&client, "Fix \"login\" flow", 3600, "60");
        s.notes = Some("left,comma".to_string());

        let csv = export_csv(&[s], &[client]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.contains("\"Acme \"\"North\"\"\""));
        assert!(row.contains("\"Fix \"\"login\"\" flow\""));
        assert!(row.contains("\"left,comma\""));
    }

    /// The exported Earned column must agree with the aggregates: a second
    /// session on the same fixed project exports as zero.
    #[test]
    fn fixed_deduplication_applies_to_the_earned_column() {
        let client = client_with_project("Acme", "Brand");
        let mut first = session(&client, "Logo", 3600, "1");
        first.billing = Billing::FixedProject { fixed_amount: d("200") };
        first.earned = Decimal::ZERO;
        let mut second = session(&client, "Revisions", 1800, "1");
        second.billing = Billing::FixedProject { fixed_amount: d("200") };
        second.earned = Decimal::ZERO;

        let csv = export_csv(&[first, second], &[client]);
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert!(rows[0].ends_with(",1.00,,200.00"));
        assert!(rows[1].ends_with(",0.50,,0.00"));
    }

    #[test]
    fn only_finished_sessions_are_exported() {
        let client = client_with_project("Acme", "Web");
        let done = session(&client, "Shipped", 3600, "40");
        let mut pending = session(&client, "Backlog", 3600, "40");
        pending.status = SessionStatus::Pending;
        let mut active = session(&client, "Running", 600, "40");
        active.status = SessionStatus::Active;

        let csv = export_csv(&[pending, done, active], &[client]);
        let rows: Vec<&str> = csv.lines().skip(1).collect();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains("\"Shipped\""));
    }

    #[test]
    fn unknown_references_fall_back_to_empty_cells() {
        let client = client_with_project("Acme", "Web");
        let mut s = session(&client, "Stray", 3600, "40");
        s.client_id = Uuid::new_v4();
        s.project_id = None;

        let csv = export_csv(&[s], &[client]);
        let row = csv.lines().nth(1).unwrap();
        assert!(row.starts_with("2024-02-12,\"\",\"\",\"Stray\""));
    }
}
