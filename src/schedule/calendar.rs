//! calendar-month arithmetic with day clamping.
//!
//! Card days (due day, billing day) are configured as 1..=31 and resolved
//! against the actual length of each month: day 31 in April becomes April 30,
//! day 30 in a non-leap February becomes February 28.

use chrono::{Days, Months, NaiveDate};

use crate::types::ReferenceMonth;

pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

/// resolve `day` inside `month`, clamped to the month length
pub fn clamp_day(month: ReferenceMonth, day: u32) -> Option<NaiveDate> {
    let last = days_in_month(month.year(), month.month());
    let target = day.clamp(1, last);
    NaiveDate::from_ymd_opt(month.year(), month.month(), target)
}

/// step a month forward (positive) or backward (negative)
pub fn shift_months(month: ReferenceMonth, months: i32) -> Option<ReferenceMonth> {
    let first = month.first_day();
    let shifted = if months >= 0 {
        first.checked_add_months(Months::new(months.unsigned_abs()))
    } else {
        first.checked_sub_months(Months::new(months.unsigned_abs()))
    }?;
    Some(ReferenceMonth::containing(shifted))
}

/// `date` stepped by whole calendar months, then re-anchored on `day`
pub fn step_anchored(date: NaiveDate, months: i32, day: u32) -> Option<NaiveDate> {
    let month = shift_months(ReferenceMonth::containing(date), months)?;
    clamp_day(month, day)
}

pub fn days_before(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_sub_days(Days::new(days as u64))
}

pub fn days_after(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    date.checked_add_days(Days::new(days as u64))
}
