use rust_decimal::{Decimal, RoundingStrategy};

/// Seconds in one billable hour.
pub const SECS_PER_HOUR: i64 = 3600;

/// Expands a days/hours/minutes entry form into whole seconds.
///
/// Days are working days, not calendar days, so one day contributes
/// `workday_hours` hours. Negative parts are treated as zero rather than
/// producing a negative duration.
///
/// # Arguments
///
/// * `days` - Number of working days
/// * `hours` - Additional hours
/// * `minutes` - Additional minutes
/// * `workday_hours` - How many hours one working day represents
///
/// # Returns
///
/// The total duration in seconds.
pub fn duration_from_parts(days: i64, hours: i64, minutes: i64, workday_hours: u32) -> i64 {
    let days = days.max(0);
    let hours = hours.max(0);
    let minutes = minutes.max(0);
    days * i64::from(workday_hours) * SECS_PER_HOUR + hours * SECS_PER_HOUR + minutes * 60
}

/// Computes the amount earned by an hourly session.
///
/// The duration is converted to fractional hours without intermediate
/// rounding; only the final monetary amount is rounded, so a 90-minute
/// session at 55.55/h earns 83.33 rather than 83.32.
///
/// # Arguments
///
/// * `duration_secs` - Elapsed seconds of the session
/// * `rate` - Hourly rate
///
/// # Returns
///
/// The earned amount rounded to cents.
pub fn earned_from_duration(duration_secs: i64, rate: Decimal) -> Decimal {
    round_money(hours_from_secs(duration_secs) * rate)
}

/// Exact fractional hours for a second count, without rounding.
pub fn hours_from_secs(duration_secs: i64) -> Decimal {
    Decimal::from(duration_secs) / Decimal::from(SECS_PER_HOUR)
}

/// Rounds a monetary amount to two decimal places, half away from zero.
///
/// This is the single rounding boundary for stored money: amounts are rounded
/// here when written and never re-rounded when aggregated.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds an hour total to one decimal place for display aggregates.
pub fn round_hours(hours: Decimal) -> Decimal {
    hours.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn expands_parts_using_the_workday_length() {
        assert_eq!(duration_from_parts(1, 2, 30, 8), 8 * 3600 + 2 * 3600 + 30 * 60);
        assert_eq!(duration_from_parts(2, 0, 0, 6), 2 * 6 * 3600);
        assert_eq!(duration_from_parts(0, 0, 1, 8), 60);
    }

    #[test]
    fn negative_parts_clamp_to_zero() {
        assert_eq!(duration_from_parts(-3, -1, -30, 8), 0);
        assert_eq!(duration_from_parts(-1, 2, 0, 8), 2 * 3600);
    }

    #[test]
    fn one_hour_earns_exactly_the_rate() {
        assert_eq!(earned_from_duration(3600, d("52.50")), d("52.50"));
    }

    #[test]
    fn earnings_round_only_at_the_end() {
        // 90 minutes at 55.55/h is 83.325 exactly; half-up gives 83.33.
        assert_eq!(earned_from_duration(5400, d("55.55")), d("83.33"));
        // 30 minutes at 55.555/h -> 27.7775 -> 27.78.
        assert_eq!(earned_from_duration(1800, d("55.555")), d("27.78"));
    }

    #[test]
    fn midpoints_round_away_from_zero() {
        assert_eq!(round_money(d("2.675")), d("2.68"));
        assert_eq!(round_money(d("-2.675")), d("-2.68"));
        assert_eq!(round_money(d("0.005")), d("0.01"));
    }

    #[test]
    fn zero_duration_earns_zero() {
        assert_eq!(earned_from_duration(0, d("120")), d("0.00"));
    }

    #[test]
    fn parts_and_duration_agree_on_earnings() {
        // 1h 7m at 61.13/h, once through the seconds representation and
        // once straight from the parts.
        let rate = d("61.13");
        let duration = duration_from_parts(0, 1, 7, 8);
        let direct = round_money((Decimal::from(1) + Decimal::from(7) / Decimal::from(60)) * rate);
        assert_eq!(earned_from_duration(duration, rate), direct);
    }

    #[test]
    fn hour_totals_round_to_one_decimal() {
        assert_eq!(round_hours(hours_from_secs(5400)), d("1.5"));
        assert_eq!(round_hours(hours_from_secs(4530)), d("1.3"));
    }
}
