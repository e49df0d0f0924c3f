use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a card
pub type CardId = Uuid;
/// unique identifier for a family (household)
pub type FamilyId = Uuid;
/// unique identifier for a family member profile
pub type MemberId = Uuid;
pub type CategoryId = Uuid;
pub type PurchaseId = Uuid;
pub type InstallmentId = Uuid;
pub type StatementId = Uuid;

/// statement status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementStatus {
    /// accepting installments, not yet closed
    Open,
    /// cycle closed, awaiting payment
    Closed,
    /// settled in full
    Paid,
    /// manually flagged as past due
    Overdue,
}

impl StatementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementStatus::Open => "open",
            StatementStatus::Closed => "closed",
            StatementStatus::Paid => "paid",
            StatementStatus::Overdue => "overdue",
        }
    }

    /// statement still expects a payment
    pub fn is_outstanding(&self) -> bool {
        matches!(self, StatementStatus::Open | StatementStatus::Closed)
    }
}

impl fmt::Display for StatementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// installment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallmentStatus {
    /// scheduled, statement not yet closed
    Pending,
    /// statement closed, awaiting payment
    Billed,
    /// payment recorded
    Paid,
    /// permanently excluded from totals
    Cancelled,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::Billed => "billed",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Cancelled => "cancelled",
        }
    }

    /// counts toward credit-limit usage
    pub fn is_outstanding(&self) -> bool {
        matches!(self, InstallmentStatus::Pending | InstallmentStatus::Billed)
    }
}

impl fmt::Display for InstallmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// role of a member inside a family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Member,
}

/// calendar month an installment is attributed to, always the first day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "NaiveDate", into = "NaiveDate")]
pub struct ReferenceMonth(NaiveDate);

impl ReferenceMonth {
    /// month containing `date`
    pub fn containing(date: NaiveDate) -> Self {
        // day 1 exists in every month
        ReferenceMonth(date.with_day(1).unwrap_or(date))
    }

    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(ReferenceMonth)
    }

    pub fn first_day(&self) -> NaiveDate {
        self.0
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }
}

impl TryFrom<NaiveDate> for ReferenceMonth {
    type Error = String;

    fn try_from(date: NaiveDate) -> Result<Self, Self::Error> {
        if date.day() != 1 {
            return Err(format!("reference month must be the first day of a month, got {date}"));
        }
        Ok(ReferenceMonth(date))
    }
}

impl From<ReferenceMonth> for NaiveDate {
    fn from(month: ReferenceMonth) -> Self {
        month.0
    }
}

impl fmt::Display for ReferenceMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}
