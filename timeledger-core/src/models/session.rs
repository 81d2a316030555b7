use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Work-session lifecycle status.
///
/// `PENDING -> ACTIVE -> DONE` is the only forward path; `DONE` is terminal.
/// Manual entries may be created directly as `PENDING` or `DONE`, never as
/// `ACTIVE` (only the timer produces active sessions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SessionStatus {
    Pending,
    Active,
    Done,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "PENDING",
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Done => "DONE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(SessionStatus::Pending),
            "ACTIVE" => Some(SessionStatus::Active),
            "DONE" => Some(SessionStatus::Done),
            _ => None,
        }
    }
}

/// Whether a finished session has been paid out yet.
///
/// Flips to `PAID` only through an invoice reaching its paid status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "UNPAID",
            PaymentStatus::Paid => "PAID",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "UNPAID" => Some(PaymentStatus::Unpaid),
            "PAID" => Some(PaymentStatus::Paid),
            _ => None,
        }
    }
}

/// How a session bills: by the hour at a rate, or as part of a fixed-price
/// project whose amount is independent of time spent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "billing_type", rename_all = "snake_case")]
pub enum Billing {
    Hourly { rate: Decimal },
    FixedProject { fixed_amount: Decimal },
}

impl Billing {
    pub fn is_fixed(&self) -> bool {
        matches!(self, Billing::FixedProject { .. })
    }

    /// Hourly rate, when this is hourly billing.
    pub fn rate(&self) -> Option<Decimal> {
        match self {
            Billing::Hourly { rate } => Some(*rate),
            Billing::FixedProject { .. } => None,
        }
    }

    /// Fixed project amount, when this is fixed billing.
    pub fn fixed_amount(&self) -> Option<Decimal> {
        match self {
            Billing::Hourly { .. } => None,
            Billing::FixedProject { fixed_amount } => Some(*fixed_amount),
        }
    }
}

/// Work session model, the central record of the earnings ledger.
///
/// This struct maps to the `sessions` table. `duration_secs` and `earned`
/// hold the stored truth; while a timer runs, the live elapsed count lives in
/// the in-memory timer engine and is written back here only on stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Unique identifier for the session
    pub id: Uuid,

    /// ID of the user who owns this session
    pub user_id: Uuid,

    /// Client the work was done for
    pub client_id: Uuid,

    /// Optional project within the client
    pub project_id: Option<Uuid>,

    /// Short task description shown in the ledger
    pub name: String,

    /// Free-form notes
    pub notes: Option<String>,

    /// Billing mode and its rate or fixed amount
    pub billing: Billing,

    /// Total recorded duration in seconds
    pub duration_secs: i64,

    /// Amount earned, rounded to cents at write time
    pub earned: Decimal,

    /// When the work happened (defaults to creation time)
    pub occurred_at: DateTime<Utc>,

    /// Lifecycle status
    pub status: SessionStatus,

    /// Payment status, driven by invoicing
    pub payment_status: PaymentStatus,

    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,

    /// Timestamp when the session was last updated
    pub updated_at: DateTime<Utc>,
}

/// Manual session creation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    pub name: String,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub notes: Option<String>,
    pub billing: Billing,
    /// Target status, `PENDING` or `DONE`
    pub status: SessionStatus,
    pub days: Option<i64>,
    pub hours: Option<i64>,
    pub minutes: Option<i64>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Session edit request; absent fields stay untouched
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSessionRequest {
    pub name: Option<String>,
    pub notes: Option<String>,
    pub project_id: Option<Uuid>,
    pub billing: Option<Billing>,
    pub days: Option<i64>,
    pub hours: Option<i64>,
    pub minutes: Option<i64>,
}

impl UpdateSessionRequest {
    /// True when any duration part was supplied, meaning the duration is
    /// being overwritten (absent parts then count as zero).
    pub fn touches_duration(&self) -> bool {
        self.days.is_some() || self.hours.is_some() || self.minutes.is_some()
    }
}

/// Timer start request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartTimerRequest {
    pub name: String,
    pub client_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub rate: Option<Decimal>,
    pub notes: Option<String>,
}

/// Session response (public representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub notes: Option<String>,
    pub billing: Billing,
    pub duration_secs: i64,
    pub earned: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        SessionResponse {
            id: session.id,
            user_id: session.user_id,
            client_id: session.client_id,
            project_id: session.project_id,
            name: session.name,
            notes: session.notes,
            billing: session.billing,
            duration_secs: session.duration_secs,
            earned: session.earned,
            occurred_at: session.occurred_at,
            status: session.status,
            payment_status: session.payment_status,
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_serializes_with_a_type_tag() {
        let hourly = serde_json::to_value(Billing::Hourly {
            rate: Decimal::from(50),
        })
        .unwrap();
        assert_eq!(hourly["billing_type"], "hourly");
        assert_eq!(hourly["rate"], 50.0);

        let fixed = serde_json::to_value(Billing::FixedProject {
            fixed_amount: Decimal::from(200),
        })
        .unwrap();
        assert_eq!(fixed["billing_type"], "fixed_project");
        assert_eq!(fixed["fixed_amount"], 200.0);
    }

    #[test]
    fn status_round_trips_through_storage_strings() {
        for status in [SessionStatus::Pending, SessionStatus::Active, SessionStatus::Done] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("RUNNING"), None);
    }
}
