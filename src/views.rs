//! serializable views over cards and statements
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::card::Card;
use crate::decimal::{Money, Percent};
use crate::state::{CardUsage, Statement};
use crate::types::{CardId, StatementId, StatementStatus};

/// card with its outstanding usage and next statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardSummary {
    pub card: Card,
    pub usage: CardUsage,
    /// earliest open or closed statement by due date
    pub next_statement: Option<StatementView>,
    /// absent when the card has no limit
    pub limit_available: Option<Money>,
    pub usage_percent: Option<Percent>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementView {
    pub id: StatementId,
    pub card_id: CardId,
    pub reference_month: NaiveDate,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub due_date: NaiveDate,
    pub status: StatementStatus,
    pub total_amount: Money,
    pub paid_amount: Money,
    pub outstanding_amount: Money,
}

impl StatementView {
    pub fn from_statement(statement: &Statement) -> Self {
        StatementView {
            id: statement.id,
            card_id: statement.card_id,
            reference_month: statement.reference_month.first_day(),
            period_start: statement.period_start,
            period_end: statement.period_end,
            due_date: statement.due_date,
            status: statement.status,
            total_amount: statement.total_amount,
            paid_amount: statement.paid_amount,
            outstanding_amount: statement.outstanding_amount(),
        }
    }
}

impl CardSummary {
    /// `statements` in any order; the next one is picked by due date
    pub fn build(card: Card, usage: CardUsage, statements: &[Statement]) -> Self {
        let next_statement = statements
            .iter()
            .filter(|s| s.status.is_outstanding())
            .min_by_key(|s| s.due_date)
            .map(StatementView::from_statement);

        let used = usage.total_outstanding;
        let limit_available = card.limit_available(used);
        let usage_percent = card
            .credit_limit
            .and_then(|limit| used.percent_of(limit))
            .map(|p| p.round_dp(2));

        CardSummary {
            card,
            usage,
            next_statement,
            limit_available,
            usage_percent,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ReferenceMonth;
    use uuid::Uuid;

    fn statement(month: u32, status: StatementStatus) -> Statement {
        Statement {
            id: Uuid::new_v4(),
            card_id: Uuid::nil(),
            reference_month: ReferenceMonth::new(2024, month).unwrap(),
            period_start: NaiveDate::from_ymd_opt(2024, month - 1, 4).unwrap(),
            period_end: NaiveDate::from_ymd_opt(2024, month, 3).unwrap(),
            due_date: NaiveDate::from_ymd_opt(2024, month, 10).unwrap(),
            status,
            total_amount: Money::from_major(100),
            paid_amount: Money::ZERO,
        }
    }

    #[test]
    fn test_next_statement_skips_settled() {
        let card = Card::builder()
            .family(Uuid::new_v4())
            .name("C6 Carbon")
            .due_day(10)
            .credit_limit(Money::from_major(2_000))
            .build()
            .unwrap();
        let usage = CardUsage {
            pending: Money::from_major(300),
            billed: Money::from_decimal(rust_decimal_macros::dec!(200.555)),
            total_outstanding: Money::from_decimal(rust_decimal_macros::dec!(500.555)),
        };
        let statements = vec![
            statement(5, StatementStatus::Open),
            statement(2, StatementStatus::Paid),
            statement(3, StatementStatus::Overdue),
            statement(4, StatementStatus::Closed),
        ];

        let summary = CardSummary::build(card, usage, &statements);
        let next = summary.next_statement.as_ref().unwrap();
        assert_eq!(next.due_date, NaiveDate::from_ymd_opt(2024, 4, 10).unwrap());
        assert_eq!(next.status, StatementStatus::Closed);
        assert_eq!(summary.limit_available, Some(Money::from_cents(149_944)));
        assert!(summary.to_json().unwrap().contains("\"limit_available\": \"1499.44\""));
    }
}
