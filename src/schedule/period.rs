use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, Result};
use crate::schedule::calendar;
use crate::schedule::BillingCycle;

/// accrual window of a statement, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementPeriod {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

impl StatementPeriod {
    /// window of the statement due on `due_date`: it starts the day after the
    /// previous cycle closed and ends on this cycle's closing date
    pub fn for_due_date(due_date: NaiveDate, cycle: BillingCycle) -> Result<Self> {
        let period_end = cycle.closing_date(due_date)?;
        let previous_due = cycle.step_due_date(due_date, -1)?;
        let previous_closing = cycle.closing_date(previous_due)?;
        let period_start = calendar::days_after(previous_closing, 1).ok_or_else(|| {
            BillingError::InvalidDate {
                message: format!("calendar arithmetic out of range near {previous_closing}"),
            }
        })?;

        Ok(Self {
            period_start,
            period_end,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.period_start <= date && date <= self.period_end
    }

    pub fn length_in_days(&self) -> i64 {
        (self.period_end - self.period_start).num_days() + 1
    }
}
