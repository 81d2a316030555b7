use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::config::PricingConfig;
use crate::models::session::{Billing, PaymentStatus, Session, SessionStatus};
use crate::money;

/// Severity of the fixed-price earnings shortfall.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PricingSeverity {
    Healthy,
    Watch,
    Risk,
}

/// Fixed-price health indicator: how much less than the target hourly rate
/// the user is effectively earning across fixed projects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricingHealth {
    pub under_earned: Decimal,
    pub severity: PricingSeverity,
}

/// Aggregates over a filtered session list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerStats {
    /// Hours across finished sessions, one decimal
    pub total_hours: Decimal,
    /// Earnings across finished sessions
    pub total_earned: Decimal,
    /// Earnings already paid out
    pub paid_total: Decimal,
    /// Earnings still outstanding
    pub unpaid_total: Decimal,
    /// Paid share of all finished earnings, as a percentage
    pub collection_rate: Decimal,
    pub pricing: PricingHealth,
}

/// Identity of a fixed-price pot: one project bills its amount once, however
/// many sessions were logged against it. Sessions without a project share a
/// per-client pot.
fn fixed_key(session: &Session) -> (Uuid, Option<Uuid>) {
    (session.client_id, session.project_id)
}

/// The amount each session contributes to earnings totals, parallel to the
/// input list.
///
/// Hourly sessions contribute their stored earned value. A finished
/// fixed-price session contributes its project amount only if it is the
/// first finished session of that project in the list; every later one
/// contributes zero, so a project's amount is never counted twice. The
/// exported CSV uses these same figures, which keeps it consistent with the
/// dashboard aggregates.
pub fn earning_figures(sessions: &[Session]) -> Vec<Decimal> {
    let mut seen_fixed: HashSet<(Uuid, Option<Uuid>)> = HashSet::new();
    sessions
        .iter()
        .map(|session| match &session.billing {
            Billing::Hourly { .. } => session.earned,
            Billing::FixedProject { fixed_amount } => {
                if session.status == SessionStatus::Done && seen_fixed.insert(fixed_key(session)) {
                    *fixed_amount
                } else {
                    Decimal::ZERO
                }
            }
        })
        .collect()
}

/// Computes the dashboard aggregates for an already filtered session list.
///
/// Only `DONE` sessions count; pending and active ones are visible in the
/// list but contribute nothing here.
pub fn ledger_stats(sessions: &[Session], pricing: &PricingConfig) -> LedgerStats {
    let figures = earning_figures(sessions);

    let mut total_secs: i64 = 0;
    let mut paid_total = Decimal::ZERO;
    let mut unpaid_total = Decimal::ZERO;

    for (session, figure) in sessions.iter().zip(&figures) {
        if session.status != SessionStatus::Done {
            continue;
        }
        total_secs += session.duration_secs;
        match session.payment_status {
            PaymentStatus::Paid => paid_total += *figure,
            PaymentStatus::Unpaid => unpaid_total += *figure,
        }
    }

    let total_earned = paid_total + unpaid_total;
    let collection_rate = if total_earned > Decimal::ZERO {
        ((paid_total / total_earned) * Decimal::from(100))
            .round_dp_with_strategy(1, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
    } else {
        Decimal::ZERO
    };

    LedgerStats {
        total_hours: money::round_hours(money::hours_from_secs(total_secs)),
        total_earned,
        paid_total,
        unpaid_total,
        collection_rate,
        pricing: pricing_health(sessions, pricing),
    }
}

/// Effective-rate check across fixed-price projects.
///
/// For every fixed project with finished work, the hours of all its finished
/// sessions are priced at the target rate; whatever the fixed amount falls
/// short of that is the project's shortfall. Shortfalls add up into
/// `under_earned`, and the severity compares the sum against the target rate
/// scaled by the configured watch multiple.
fn pricing_health(sessions: &[Session], pricing: &PricingConfig) -> PricingHealth {
    let target = match pricing.target_rate {
        Some(target) => target,
        None => {
            return PricingHealth {
                under_earned: Decimal::ZERO,
                severity: PricingSeverity::Healthy,
            }
        }
    };

    // amount billed once per pot, hours accumulated across all its sessions
    let mut pots: HashMap<(Uuid, Option<Uuid>), (Decimal, i64)> = HashMap::new();
    for session in sessions {
        if session.status != SessionStatus::Done {
            continue;
        }
        if let Billing::FixedProject { fixed_amount } = session.billing {
            let entry = pots.entry(fixed_key(session)).or_insert((fixed_amount, 0));
            entry.1 += session.duration_secs;
        }
    }

    let mut under_earned = Decimal::ZERO;
    for (amount, secs) in pots.values() {
        if *secs == 0 {
            continue;
        }
        let at_target = money::hours_from_secs(*secs) * target;
        if at_target > *amount {
            under_earned += at_target - *amount;
        }
    }
    let under_earned = money::round_money(under_earned);

    let severity = if under_earned <= Decimal::ZERO {
        PricingSeverity::Healthy
    } else if under_earned <= target * pricing.watch_multiple {
        PricingSeverity::Watch
    } else {
        PricingSeverity::Risk
    };

    PricingHealth {
        under_earned,
        severity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn hourly_done(client: Uuid, secs: i64, rate: &str, paid: bool) -> Session {
        let rate = d(rate);
        Session {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            client_id: client,
            project_id: None,
            name: "work".to_string(),
            notes: None,
            billing: Billing::Hourly { rate },
            duration_secs: secs,
            earned: money::earned_from_duration(secs, rate),
            occurred_at: Utc::now(),
            status: SessionStatus::Done,
            payment_status: if paid { PaymentStatus::Paid } else { PaymentStatus::Unpaid },
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fixed_done(client: Uuid, project: Option<Uuid>, secs: i64, amount: &str) -> Session {
        let mut session = hourly_done(client, secs, "0.01", false);
        session.project_id = project;
        session.billing = Billing::FixedProject { fixed_amount: d(amount) };
        session.earned = Decimal::ZERO;
        session
    }

    fn no_pricing() -> PricingConfig {
        PricingConfig { target_rate: None, watch_multiple: Decimal::from(4) }
    }

    #[test]
    fn hourly_sessions_sum_hours_and_earnings() {
        let client = Uuid::new_v4();
        let sessions = vec![
            hourly_done(client, 3600, "50", false),
            hourly_done(client, 5400, "40", true),
        ];

        let stats = ledger_stats(&sessions, &no_pricing());
        assert_eq!(stats.total_hours, d("2.5"));
        assert_eq!(stats.total_earned, d("110.00"));
        assert_eq!(stats.paid_total, d("60.00"));
        assert_eq!(stats.unpaid_total, d("50.00"));
    }

    /// Two finished sessions on the same fixed project must bill the
    /// project's amount exactly once.
    #[test]
    fn fixed_amount_counts_once_per_project() {
        let client = Uuid::new_v4();
        let project = Uuid::new_v4();
        let sessions = vec![
            fixed_done(client, Some(project), 3600, "300"),
            fixed_done(client, Some(project), 7200, "300"),
        ];

        let figures = earning_figures(&sessions);
        assert_eq!(figures, vec![d("300"), d("0")]);

        let stats = ledger_stats(&sessions, &no_pricing());
        assert_eq!(stats.total_earned, d("300"));
        // Hours still accumulate across both sessions.
        assert_eq!(stats.total_hours, d("3.0"));
    }

    #[test]
    fn distinct_fixed_projects_each_bill_their_amount() {
        let client = Uuid::new_v4();
        let sessions = vec![
            fixed_done(client, Some(Uuid::new_v4()), 3600, "300"),
            fixed_done(client, Some(Uuid::new_v4()), 3600, "200"),
            // Without a project, fixed sessions share one per-client pot.
            fixed_done(client, None, 3600, "100"),
            fixed_done(client, None, 3600, "100"),
        ];

        let stats = ledger_stats(&sessions, &no_pricing());
        assert_eq!(stats.total_earned, d("600"));
    }

    #[test]
    fn pending_sessions_contribute_nothing() {
        let client = Uuid::new_v4();
        let mut pending = hourly_done(client, 3600, "50", false);
        pending.status = SessionStatus::Pending;
        let mut pending_fixed = fixed_done(client, Some(Uuid::new_v4()), 3600, "400");
        pending_fixed.status = SessionStatus::Pending;

        let stats = ledger_stats(&[pending, pending_fixed], &no_pricing());
        assert_eq!(stats.total_hours, Decimal::ZERO);
        assert_eq!(stats.total_earned, Decimal::ZERO);
        // A pending fixed session must not consume the project's one slot.
        assert_eq!(stats.collection_rate, Decimal::ZERO);
    }

    #[test]
    fn collection_rate_is_the_paid_share() {
        let client = Uuid::new_v4();
        let sessions = vec![
            hourly_done(client, 3600, "75", true),
            hourly_done(client, 3600, "25", false),
        ];
        let stats = ledger_stats(&sessions, &no_pricing());
        assert_eq!(stats.collection_rate, d("75.0"));

        // No finished earnings at all: rate reads zero instead of dividing.
        let empty = ledger_stats(&[], &no_pricing());
        assert_eq!(empty.collection_rate, Decimal::ZERO);
    }

    #[test]
    fn pricing_health_flags_underpriced_fixed_work() {
        let client = Uuid::new_v4();
        let pricing = PricingConfig {
            target_rate: Some(d("60")),
            watch_multiple: Decimal::from(4),
        };

        // 10 hours on a 500 project at a 60 target: 100 short -> watch.
        let sessions = vec![fixed_done(client, Some(Uuid::new_v4()), 36000, "500")];
        let health = ledger_stats(&sessions, &pricing).pricing;
        assert_eq!(health.under_earned, d("100.00"));
        assert_eq!(health.severity, PricingSeverity::Watch);

        // 20 hours on the same amount: 700 short, beyond 4x the target -> risk.
        let sessions = vec![fixed_done(client, Some(Uuid::new_v4()), 72000, "500")];
        let health = ledger_stats(&sessions, &pricing).pricing;
        assert_eq!(health.under_earned, d("700.00"));
        assert_eq!(health.severity, PricingSeverity::Risk);

        // Fixed work above target is simply healthy.
        let sessions = vec![fixed_done(client, Some(Uuid::new_v4()), 3600, "500")];
        let health = ledger_stats(&sessions, &pricing).pricing;
        assert_eq!(health.under_earned, Decimal::ZERO);
        assert_eq!(health.severity, PricingSeverity::Healthy);
    }

    #[test]
    fn pricing_health_is_silent_without_a_target() {
        let client = Uuid::new_v4();
        let sessions = vec![fixed_done(client, Some(Uuid::new_v4()), 72000, "1")];
        let health = ledger_stats(&sessions, &no_pricing()).pricing;
        assert_eq!(health.under_earned, Decimal::ZERO);
        assert_eq!(health.severity, PricingSeverity::Healthy);
    }
}
