use chrono::{Datelike, Duration, NaiveDate};
use shared::Frequency;

/// Period start used for one-time tasks: any completion ever recorded counts.
///
/// `NaiveDate::MIN` does not survive the round trip through SQLite, so the
/// epoch stands in for the beginning of time.
pub fn beginning_of_time() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// First day of the period that contains `today`
pub fn period_start(today: NaiveDate, frequency: Frequency, reset_day: Option<u32>) -> NaiveDate {
    match frequency {
        Frequency::Daily => today,

        Frequency::Weekly => {
            let reset = weekly_anchor(reset_day);
            let current = today.weekday().num_days_from_sunday() as i64;
            let days_since_reset = (current - reset as i64 + 7) % 7;
            today - Duration::days(days_since_reset)
        }

        Frequency::Monthly => {
            let reset = monthly_anchor(reset_day);
            let this_month = anchor_in_month(today.year(), today.month(), reset);

            match this_month {
                Some(start) if today >= start => start,
                _ => {
                    let (year, month) = previous_month(today.year(), today.month());
                    anchor_in_month(year, month, reset).unwrap_or(today)
                }
            }
        }

        Frequency::OneTime => beginning_of_time(),
    }
}

/// First day after the period that contains `today`, `None` for one-time tasks
pub fn next_period_start(
    today: NaiveDate,
    frequency: Frequency,
    reset_day: Option<u32>,
) -> Option<NaiveDate> {
    let start = period_start(today, frequency, reset_day);

    match frequency {
        Frequency::Daily => today.succ_opt(),
        Frequency::Weekly => Some(start + Duration::days(7)),
        Frequency::Monthly => {
            let (year, month) = next_month(start.year(), start.month());
            anchor_in_month(year, month, monthly_anchor(reset_day))
        }
        Frequency::OneTime => None,
    }
}

pub fn last_day_of_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = next_month(year, month);

    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// The reset day within a given month, clamped to the month's last day
fn anchor_in_month(year: i32, month: u32, reset: u32) -> Option<NaiveDate> {
    let day = reset.min(last_day_of_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day)
}

fn weekly_anchor(reset_day: Option<u32>) -> u32 {
    reset_day.unwrap_or(0) % 7
}

fn monthly_anchor(reset_day: Option<u32>) -> u32 {
    reset_day.unwrap_or(1).clamp(1, 31)
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}
