//! persistence collaborators consumed by the billing core.
//!
//! The core never talks to a database directly. It goes through these
//! traits, which a host implements over its relational store;
//! [`MemoryStore`] is the in-process implementation used by tests and demos.

pub mod memory;

use chrono::NaiveDate;

use crate::card::Card;
use crate::errors::StoreResult;
use crate::state::{
    CardUsage, Installment, Member, NewInstallment, NewPurchase, NewStatement, Purchase,
    Statement, StatementTotals,
};
use crate::types::{
    CardId, FamilyId, InstallmentStatus, MemberId, PurchaseId, StatementId, StatementStatus,
};

pub use memory::MemoryStore;

/// how a bulk status update treats `paid_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaidAtChange {
    Keep,
    Set(NaiveDate),
    Clear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallmentStatusUpdate {
    pub status: InstallmentStatus,
    pub paid_at: PaidAtChange,
}

impl InstallmentStatusUpdate {
    pub fn billed() -> Self {
        Self {
            status: InstallmentStatus::Billed,
            paid_at: PaidAtChange::Keep,
        }
    }

    pub fn paid(on: NaiveDate) -> Self {
        Self {
            status: InstallmentStatus::Paid,
            paid_at: PaidAtChange::Set(on),
        }
    }

    pub fn pending() -> Self {
        Self {
            status: InstallmentStatus::Pending,
            paid_at: PaidAtChange::Clear,
        }
    }
}

pub trait BillingStore: Send + Sync {
    fn card(&self, id: CardId) -> StoreResult<Option<Card>>;

    /// insert keyed on (card, reference month); an existing row is returned unchanged
    fn upsert_statement(&self, statement: NewStatement) -> StoreResult<Statement>;

    fn statement(&self, id: StatementId) -> StoreResult<Option<Statement>>;

    /// statements of a card ordered by due date
    fn list_statements(&self, card_id: CardId) -> StoreResult<Vec<Statement>>;

    fn update_statement_totals(
        &self,
        id: StatementId,
        totals: StatementTotals,
    ) -> StoreResult<Statement>;

    fn update_statement_status(
        &self,
        id: StatementId,
        status: StatementStatus,
    ) -> StoreResult<Statement>;

    fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase>;

    /// compensation only; removes a purchase that has no installments
    fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()>;

    /// all-or-nothing batch insert
    fn insert_installments(&self, batch: Vec<NewInstallment>) -> StoreResult<Vec<Installment>>;

    fn query_installments(&self, statement_id: StatementId) -> StoreResult<Vec<Installment>>;

    /// bulk update of every non-cancelled installment in a statement,
    /// returns the number of rows touched
    fn update_installments_status(
        &self,
        statement_id: StatementId,
        update: InstallmentStatusUpdate,
    ) -> StoreResult<usize>;
}

pub trait UsageAggregator: Send + Sync {
    fn aggregate_usage(&self, card_id: CardId) -> StoreResult<CardUsage>;
}

pub trait MemberDirectory: Send + Sync {
    fn member(&self, id: MemberId) -> StoreResult<Option<Member>>;

    fn family_members(&self, family_id: FamilyId) -> StoreResult<Vec<Member>>;
}
