//! installment schedule generation.
//!
//! A purchase is split into `N` cent-exact installments, each anchored on the
//! card's due day in consecutive calendar months. The first due date is the
//! earliest one whose cycle closes strictly after the purchase date.

pub mod calendar;
pub mod period;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::types::ReferenceMonth;

pub use period::StatementPeriod;

/// billing parameters of a card that drive due dates and cycle windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    /// configured due day, 1..=31, clamped per month
    pub due_day: u32,
    /// days before the due date at which the cycle closes
    pub closing_offset_days: u32,
}

impl BillingCycle {
    pub fn new(due_day: u32, closing_offset_days: u32) -> Self {
        Self {
            due_day,
            closing_offset_days,
        }
    }

    /// due date inside `month`
    pub fn due_date_in(&self, month: ReferenceMonth) -> Result<NaiveDate> {
        calendar::clamp_day(month, self.due_day).ok_or_else(|| out_of_range(month.first_day()))
    }

    /// due date `months` calendar months after (or before) `due_date`
    pub fn step_due_date(&self, due_date: NaiveDate, months: i32) -> Result<NaiveDate> {
        calendar::step_anchored(due_date, months, self.due_day).ok_or_else(|| out_of_range(due_date))
    }

    /// last day a purchase is accepted into the cycle due on `due_date`
    pub fn closing_date(&self, due_date: NaiveDate) -> Result<NaiveDate> {
        calendar::days_before(due_date, self.closing_offset_days).ok_or_else(|| out_of_range(due_date))
    }

    /// earliest due date whose cycle closes strictly after `purchase_date`
    pub fn first_due_date(&self, purchase_date: NaiveDate) -> Result<NaiveDate> {
        let mut due_date = self.due_date_in(ReferenceMonth::containing(purchase_date))?;
        if due_date <= purchase_date {
            due_date = self.step_due_date(purchase_date, 1)?;
        }

        // a purchase on the closing date itself belongs to the next cycle
        while self.closing_date(due_date)? <= purchase_date {
            due_date = self.step_due_date(due_date, 1)?;
        }

        Ok(due_date)
    }
}

fn out_of_range(date: NaiveDate) -> BillingError {
    BillingError::InvalidDate {
        message: format!("calendar arithmetic out of range near {date}"),
    }
}

/// one slice of a purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInstallment {
    pub installment_number: u32,
    pub amount: Money,
    pub due_date: NaiveDate,
    pub competence_month: ReferenceMonth,
}

/// installment schedule for a single purchase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentSchedule {
    pub first_due_date: NaiveDate,
    pub first_installment_month: ReferenceMonth,
    pub installments: Vec<ScheduledInstallment>,
}

impl InstallmentSchedule {
    /// generate the schedule for a purchase
    pub fn generate(
        purchase_date: NaiveDate,
        total_amount: Money,
        installment_count: u32,
        cycle: BillingCycle,
    ) -> Result<Self> {
        if !total_amount.is_positive() {
            return Err(BillingError::InvalidPurchaseAmount {
                amount: total_amount,
            });
        }

        let amounts = split_amount(total_amount, installment_count)?;
        let first_due_date = cycle.first_due_date(purchase_date)?;

        let mut installments = Vec::with_capacity(amounts.len());
        for (index, amount) in amounts.into_iter().enumerate() {
            let due_date = cycle.step_due_date(first_due_date, index as i32)?;
            installments.push(ScheduledInstallment {
                installment_number: index as u32 + 1,
                amount,
                due_date,
                competence_month: ReferenceMonth::containing(due_date),
            });
        }

        Ok(Self {
            first_due_date,
            first_installment_month: ReferenceMonth::containing(first_due_date),
            installments,
        })
    }

    /// sum of all installment amounts
    pub fn total(&self) -> Money {
        self.installments.iter().map(|i| i.amount).sum()
    }

    /// distinct competence months in schedule order
    pub fn competence_months(&self) -> Vec<ReferenceMonth> {
        let mut months: Vec<ReferenceMonth> = Vec::new();
        for installment in &self.installments {
            if !months.contains(&installment.competence_month) {
                months.push(installment.competence_month);
            }
        }
        months
    }

    /// get installment by its 1-based number
    pub fn get(&self, installment_number: u32) -> Option<&ScheduledInstallment> {
        installment_number
            .checked_sub(1)
            .and_then(|index| self.installments.get(index as usize))
    }
}

/// split `total` into `parts` cent-exact amounts; the first
/// `total_cents % parts` slices carry the extra cent
pub fn split_amount(total: Money, parts: u32) -> Result<Vec<Money>> {
    if parts == 0 {
        return Err(BillingError::InvalidInstallmentCount {
            count: parts,
            min: 1,
            max: u32::MAX,
        });
    }

    let cents = total.to_cents();
    let divisor = parts as i128;
    let base = cents.div_euclid(divisor);
    let remainder = cents - base * divisor;

    (0..divisor)
        .map(|index| {
            let slice = base + if index < remainder { 1 } else { 0 };
            i64::try_from(slice)
                .map(Money::from_cents)
                .map_err(|_| BillingError::InvalidPurchaseAmount { amount: total })
        })
        .collect()
}
