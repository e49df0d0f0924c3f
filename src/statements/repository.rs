use chrono::NaiveDate;
use tracing::debug;

use crate::card::Card;
use crate::errors::Result;
use crate::schedule::StatementPeriod;
use crate::state::{NewStatement, Statement};
use crate::store::BillingStore;
use crate::types::ReferenceMonth;

/// create-or-fetch of the one statement per (card, reference month)
pub struct StatementRepository<'a> {
    store: &'a dyn BillingStore,
}

impl<'a> StatementRepository<'a> {
    pub fn new(store: &'a dyn BillingStore) -> Self {
        Self { store }
    }

    /// idempotent on (card, reference month); the window of an existing
    /// statement is never re-derived
    pub fn ensure_statement(&self, statement: NewStatement) -> Result<Statement> {
        let row = self.store.upsert_statement(statement)?;
        debug!(
            statement_id = %row.id,
            card_id = %row.card_id,
            reference_month = %row.reference_month,
            status = %row.status,
            "statement ensured"
        );
        Ok(row)
    }

    /// statement for the cycle due on `due_date`, window derived from the card
    pub fn ensure_for_due_date(&self, card: &Card, due_date: NaiveDate) -> Result<Statement> {
        let period = StatementPeriod::for_due_date(due_date, card.cycle())?;
        self.ensure_statement(NewStatement {
            card_id: card.id,
            reference_month: ReferenceMonth::containing(due_date),
            due_date,
            period_start: period.period_start,
            period_end: period.period_end,
        })
    }
}
