//! Cutoff-day period bounds and settlement dates
//!
//! A contract's `cutoff_day` splits each month into collection periods. Given
//! a reference date the active period is:
//!
//! - after this month's cutoff: cutoff through the end of the current month
//! - at or before it: the previous month's cutoff through this month's cutoff
//!
//! Cutoff days past a month's end clamp to the month's last day, so a day-31
//! cutoff lands on Feb 28/29, Apr 30, and so on. The previous-month cutoff
//! borrows the year across January, which matters for December cycles.
//!
//! `period_start` is exclusive, `period_end` inclusive: a cycle's collections
//! window is `(start, end]`.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// One collection period's bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Period {
    /// Exclusive lower bound
    pub start: NaiveDate,

    /// Inclusive upper bound
    pub end: NaiveDate,
}

/// Cutoff date for a given month, clamped to the month's last day
pub fn cutoff_date(year: i32, month: u32, cutoff_day: u32) -> NaiveDate {
    let day = cutoff_day.min(last_day_of_month(year, month));
    // Clamped day always exists for a valid (year, month)
    NaiveDate::from_ymd_opt(year, month, day)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, month, 1).expect("valid month"))
}

/// The active collection period for a contract at `today`
pub fn active_period(cutoff_day: u32, today: NaiveDate) -> Period {
    let this_cutoff = cutoff_date(today.year(), today.month(), cutoff_day);

    if today > this_cutoff {
        Period {
            start: this_cutoff,
            end: end_of_month(today.year(), today.month()),
        }
    } else {
        let (prev_year, prev_month) = if today.month() == 1 {
            (today.year() - 1, 12)
        } else {
            (today.year(), today.month() - 1)
        };
        Period {
            start: cutoff_date(prev_year, prev_month, cutoff_day),
            end: this_cutoff,
        }
    }
}

/// Settlement date: `period_end` plus `business_days` business days,
/// skipping Saturdays and Sundays
pub fn settlement_date(period_end: NaiveDate, business_days: u32) -> NaiveDate {
    let mut date = period_end;
    for _ in 0..business_days {
        date = next_business_day(date);
    }
    date
}

fn next_business_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Days::new(1);
    while matches!(next.weekday(), Weekday::Sat | Weekday::Sun) {
        next = next + Days::new(1);
    }
    next
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let first_of_next = NaiveDate::from_ymd_opt(next_year, next_month, 1).expect("valid month");
    (first_of_next - Days::new(1)).day()
}

fn end_of_month(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, last_day_of_month(year, month)).expect("valid month")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cutoff_clamps_to_month_end() {
        assert_eq!(cutoff_date(2025, 2, 31), date(2025, 2, 28));
        assert_eq!(cutoff_date(2024, 2, 31), date(2024, 2, 29)); // leap year
        assert_eq!(cutoff_date(2025, 4, 31), date(2025, 4, 30));
        assert_eq!(cutoff_date(2025, 7, 15), date(2025, 7, 15));
    }

    #[test]
    fn test_period_after_cutoff() {
        // Cutoff day 15, today the 20th: period runs cutoff -> month end
        let period = active_period(15, date(2025, 6, 20));
        assert_eq!(period.start, date(2025, 6, 15));
        assert_eq!(period.end, date(2025, 6, 30));
    }

    #[test]
    fn test_period_at_or_before_cutoff() {
        // Today the 10th: previous month's cutoff -> this month's cutoff
        let period = active_period(15, date(2025, 6, 10));
        assert_eq!(period.start, date(2025, 5, 15));
        assert_eq!(period.end, date(2025, 6, 15));

        // Exactly on the cutoff counts as before
        let period = active_period(15, date(2025, 6, 15));
        assert_eq!(period.start, date(2025, 5, 15));
        assert_eq!(period.end, date(2025, 6, 15));
    }

    #[test]
    fn test_december_to_january_rollover() {
        // Early January, before the cutoff: the period reaches back into
        // December of the prior year
        let period = active_period(20, date(2026, 1, 10));
        assert_eq!(period.start, date(2025, 12, 20));
        assert_eq!(period.end, date(2026, 1, 20));
    }

    #[test]
    fn test_late_december_period_ends_at_year_boundary() {
        let period = active_period(20, date(2025, 12, 28));
        assert_eq!(period.start, date(2025, 12, 20));
        assert_eq!(period.end, date(2025, 12, 31));
    }

    #[test]
    fn test_clamped_cutoff_in_previous_month() {
        // Day-31 cutoff, today March 10: previous cutoff clamps to Feb 28
        let period = active_period(31, date(2025, 3, 10));
        assert_eq!(period.start, date(2025, 2, 28));
        assert_eq!(period.end, date(2025, 3, 31));
    }

    #[test]
    fn test_settlement_date_skips_weekends() {
        // Friday + 1 business day = Monday
        let friday = date(2025, 6, 6);
        assert_eq!(settlement_date(friday, 1), date(2025, 6, 9));

        // Thursday + 2 business days = Monday
        let thursday = date(2025, 6, 5);
        assert_eq!(settlement_date(thursday, 2), date(2025, 6, 9));

        // Zero business days is the period end itself
        assert_eq!(settlement_date(friday, 0), friday);
    }

    #[test]
    fn test_settlement_date_from_weekend_period_end() {
        // Saturday month end + 1 business day = Monday
        let saturday = date(2025, 5, 31);
        assert_eq!(settlement_date(saturday, 1), date(2025, 6, 2));
    }
}
