use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::schedule::StatementPeriod;
use crate::types::{
    CardId, CategoryId, FamilyId, InstallmentId, InstallmentStatus, MemberId, MemberRole,
    PurchaseId, ReferenceMonth, StatementId, StatementStatus,
};

/// optional purchase metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseDetails {
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub category_id: Option<CategoryId>,
    /// member who made the purchase
    pub member_id: Option<MemberId>,
}

/// purchase row as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub card_id: CardId,
    pub total_amount: Money,
    pub installment_count: u32,
    pub purchase_date: NaiveDate,
    pub first_installment_month: ReferenceMonth,
    /// statement holding the first installment
    pub statement_id: Option<StatementId>,
    pub details: PurchaseDetails,
}

/// purchase row before the store assigns an id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPurchase {
    pub card_id: CardId,
    pub total_amount: Money,
    pub installment_count: u32,
    pub purchase_date: NaiveDate,
    pub first_installment_month: ReferenceMonth,
    pub statement_id: Option<StatementId>,
    pub details: PurchaseDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub purchase_id: PurchaseId,
    pub card_id: CardId,
    pub statement_id: Option<StatementId>,
    pub installment_number: u32,
    pub amount: Money,
    pub competence_month: ReferenceMonth,
    pub due_date: NaiveDate,
    pub status: InstallmentStatus,
    /// set only while the installment is paid
    pub paid_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInstallment {
    pub purchase_id: PurchaseId,
    pub card_id: CardId,
    pub statement_id: Option<StatementId>,
    pub installment_number: u32,
    pub amount: Money,
    pub competence_month: ReferenceMonth,
    pub due_date: NaiveDate,
}

/// monthly aggregate of a card's installments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub id: StatementId,
    pub card_id: CardId,
    pub reference_month: ReferenceMonth,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub status: StatementStatus,
    pub total_amount: Money,
    pub paid_amount: Money,
}

impl Statement {
    pub fn period(&self) -> StatementPeriod {
        StatementPeriod {
            period_start: self.period_start,
            period_end: self.period_end,
        }
    }

    pub fn outstanding_amount(&self) -> Money {
        (self.total_amount - self.paid_amount).max(Money::ZERO)
    }
}

/// statement insert keyed on (card, reference month)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStatement {
    pub card_id: CardId,
    pub reference_month: ReferenceMonth,
    pub due_date: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementTotals {
    pub total: Money,
    pub paid: Money,
}

impl StatementTotals {
    /// recompute from installment rows, cancelled ones excluded
    pub fn from_installments<'a, I>(installments: I) -> Self
    where
        I: IntoIterator<Item = &'a Installment>,
    {
        let mut total = Money::ZERO;
        let mut paid = Money::ZERO;
        for installment in installments {
            match installment.status {
                InstallmentStatus::Cancelled => {}
                InstallmentStatus::Paid => {
                    total += installment.amount;
                    paid += installment.amount;
                }
                InstallmentStatus::Pending | InstallmentStatus::Billed => {
                    total += installment.amount;
                }
            }
        }
        Self { total, paid }
    }
}

/// outstanding usage of a card, paid and cancelled installments excluded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardUsage {
    pub pending: Money,
    pub billed: Money,
    pub total_outstanding: Money,
}

impl CardUsage {
    pub fn from_installments<'a, I>(installments: I) -> Self
    where
        I: IntoIterator<Item = &'a Installment>,
    {
        let mut usage = CardUsage::default();
        for installment in installments {
            match installment.status {
                InstallmentStatus::Pending => usage.pending += installment.amount,
                InstallmentStatus::Billed => usage.billed += installment.amount,
                InstallmentStatus::Paid | InstallmentStatus::Cancelled => {}
            }
        }
        usage.total_outstanding = usage.pending + usage.billed;
        usage
    }
}

/// family member profile as seen by notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub family_id: FamilyId,
    pub display_name: String,
    pub email: Option<String>,
    pub role: MemberRole,
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn installment(amount: i64, status: InstallmentStatus) -> Installment {
        let month = ReferenceMonth::new(2024, 2).unwrap();
        Installment {
            id: Uuid::new_v4(),
            purchase_id: Uuid::new_v4(),
            card_id: Uuid::nil(),
            statement_id: None,
            installment_number: 1,
            amount: Money::from_cents(amount),
            competence_month: month,
            due_date: month.first_day(),
            status,
            paid_at: None,
        }
    }

    #[test]
    fn test_totals_exclude_cancelled() {
        let rows = vec![
            installment(10_000, InstallmentStatus::Pending),
            installment(2_550, InstallmentStatus::Paid),
            installment(999, InstallmentStatus::Cancelled),
            installment(1, InstallmentStatus::Billed),
        ];
        let totals = StatementTotals::from_installments(&rows);
        assert_eq!(totals.total, Money::from_cents(12_551));
        assert_eq!(totals.paid, Money::from_cents(2_550));
    }

    #[test]
    fn test_usage_counts_pending_and_billed_only() {
        let rows = vec![
            installment(75_000, InstallmentStatus::Billed),
            installment(10_000, InstallmentStatus::Pending),
            installment(5_000, InstallmentStatus::Paid),
            installment(5_000, InstallmentStatus::Cancelled),
        ];
        let usage = CardUsage::from_installments(&rows);
        assert_eq!(usage.billed, Money::from_major(750));
        assert_eq!(usage.pending, Money::from_major(100));
        assert_eq!(usage.total_outstanding, Money::from_major(850));
    }
}
