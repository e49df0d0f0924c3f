use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use uuid::Uuid;

use crate::card::Card;
use crate::errors::{StoreError, StoreResult};
use crate::state::{
    CardUsage, Installment, Member, NewInstallment, NewPurchase, NewStatement, Purchase,
    Statement, StatementTotals,
};
use crate::store::{
    BillingStore, InstallmentStatusUpdate, MemberDirectory, PaidAtChange, UsageAggregator,
};
use crate::types::{
    CardId, FamilyId, InstallmentId, InstallmentStatus, MemberId, PurchaseId, ReferenceMonth,
    StatementId, StatementStatus,
};
use crate::decimal::Money;

#[derive(Default)]
struct Tables {
    cards: HashMap<CardId, Card>,
    members: Vec<Member>,
    statements: HashMap<StatementId, Statement>,
    /// unique index on (card, reference month)
    statement_keys: HashMap<(CardId, ReferenceMonth), StatementId>,
    purchases: HashMap<PurchaseId, Purchase>,
    installments: Vec<Installment>,
}

/// in-process store; every call holds the table lock for its whole duration
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Unavailable {
            message: "memory store lock poisoned".to_string(),
        })
    }

    pub fn insert_card(&self, card: Card) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.cards.contains_key(&card.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "cards_pkey".to_string(),
            });
        }
        tables.cards.insert(card.id, card);
        Ok(())
    }

    pub fn insert_member(&self, member: Member) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if tables.members.iter().any(|m| m.id == member.id) {
            return Err(StoreError::UniqueViolation {
                constraint: "members_pkey".to_string(),
            });
        }
        tables.members.push(member);
        Ok(())
    }

    pub fn purchase(&self, id: PurchaseId) -> StoreResult<Option<Purchase>> {
        Ok(self.tables()?.purchases.get(&id).cloned())
    }

    pub fn purchase_installments(&self, purchase_id: PurchaseId) -> StoreResult<Vec<Installment>> {
        let tables = self.tables()?;
        let mut rows: Vec<Installment> = tables
            .installments
            .iter()
            .filter(|i| i.purchase_id == purchase_id)
            .cloned()
            .collect();
        rows.sort_by_key(|i| i.installment_number);
        Ok(rows)
    }

    /// out-of-band edit of a single installment status; totals are left
    /// stale until the owning statement is reconciled
    pub fn correct_installment(
        &self,
        id: InstallmentId,
        status: InstallmentStatus,
    ) -> StoreResult<Installment> {
        let mut tables = self.tables()?;
        let row = tables
            .installments
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(StoreError::NotFound {
                entity: "installment",
                id,
            })?;
        row.status = status;
        if status != InstallmentStatus::Paid {
            row.paid_at = None;
        }
        Ok(row.clone())
    }
}

impl BillingStore for MemoryStore {
    fn card(&self, id: CardId) -> StoreResult<Option<Card>> {
        Ok(self.tables()?.cards.get(&id).cloned())
    }

    fn upsert_statement(&self, statement: NewStatement) -> StoreResult<Statement> {
        let mut tables = self.tables()?;
        if !tables.cards.contains_key(&statement.card_id) {
            return Err(StoreError::ForeignKey {
                entity: "card",
                id: statement.card_id,
            });
        }

        let key = (statement.card_id, statement.reference_month);
        if let Some(existing) = tables
            .statement_keys
            .get(&key)
            .and_then(|id| tables.statements.get(id))
        {
            return Ok(existing.clone());
        }

        let row = Statement {
            id: Uuid::new_v4(),
            card_id: statement.card_id,
            reference_month: statement.reference_month,
            period_start: statement.period_start,
            period_end: statement.period_end,
            due_date: statement.due_date,
            status: StatementStatus::Open,
            total_amount: Money::ZERO,
            paid_amount: Money::ZERO,
        };
        debug!(
            statement_id = %row.id,
            card_id = %row.card_id,
            reference_month = %row.reference_month,
            "statement row created"
        );
        tables.statement_keys.insert(key, row.id);
        tables.statements.insert(row.id, row.clone());
        Ok(row)
    }

    fn statement(&self, id: StatementId) -> StoreResult<Option<Statement>> {
        Ok(self.tables()?.statements.get(&id).cloned())
    }

    fn list_statements(&self, card_id: CardId) -> StoreResult<Vec<Statement>> {
        let tables = self.tables()?;
        let mut rows: Vec<Statement> = tables
            .statements
            .values()
            .filter(|s| s.card_id == card_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| (s.due_date, s.reference_month));
        Ok(rows)
    }

    fn update_statement_totals(
        &self,
        id: StatementId,
        totals: StatementTotals,
    ) -> StoreResult<Statement> {
        let mut tables = self.tables()?;
        let row = tables.statements.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "statement",
            id,
        })?;
        row.total_amount = totals.total;
        row.paid_amount = totals.paid;
        Ok(row.clone())
    }

    fn update_statement_status(
        &self,
        id: StatementId,
        status: StatementStatus,
    ) -> StoreResult<Statement> {
        let mut tables = self.tables()?;
        let row = tables.statements.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "statement",
            id,
        })?;
        row.status = status;
        Ok(row.clone())
    }

    fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase> {
        let mut tables = self.tables()?;
        if !tables.cards.contains_key(&purchase.card_id) {
            return Err(StoreError::ForeignKey {
                entity: "card",
                id: purchase.card_id,
            });
        }
        if let Some(statement_id) = purchase.statement_id {
            if !tables.statements.contains_key(&statement_id) {
                return Err(StoreError::ForeignKey {
                    entity: "statement",
                    id: statement_id,
                });
            }
        }

        let row = Purchase {
            id: Uuid::new_v4(),
            card_id: purchase.card_id,
            total_amount: purchase.total_amount,
            installment_count: purchase.installment_count,
            purchase_date: purchase.purchase_date,
            first_installment_month: purchase.first_installment_month,
            statement_id: purchase.statement_id,
            details: purchase.details,
        };
        tables.purchases.insert(row.id, row.clone());
        Ok(row)
    }

    fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()> {
        let mut tables = self.tables()?;
        if let Some(child) = tables.installments.iter().find(|i| i.purchase_id == id) {
            return Err(StoreError::ForeignKey {
                entity: "installment",
                id: child.id,
            });
        }
        tables
            .purchases
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound {
                entity: "purchase",
                id,
            })
    }

    fn insert_installments(&self, batch: Vec<NewInstallment>) -> StoreResult<Vec<Installment>> {
        let mut tables = self.tables()?;

        // validate the whole batch before writing any row
        let mut seen: Vec<(PurchaseId, u32)> = Vec::with_capacity(batch.len());
        for new in &batch {
            if !tables.purchases.contains_key(&new.purchase_id) {
                return Err(StoreError::ForeignKey {
                    entity: "purchase",
                    id: new.purchase_id,
                });
            }
            if let Some(statement_id) = new.statement_id {
                if !tables.statements.contains_key(&statement_id) {
                    return Err(StoreError::ForeignKey {
                        entity: "statement",
                        id: statement_id,
                    });
                }
            }
            let key = (new.purchase_id, new.installment_number);
            let duplicate = seen.contains(&key)
                || tables
                    .installments
                    .iter()
                    .any(|i| (i.purchase_id, i.installment_number) == key);
            if duplicate {
                return Err(StoreError::UniqueViolation {
                    constraint: "installments_purchase_number_key".to_string(),
                });
            }
            seen.push(key);
        }

        let rows: Vec<Installment> = batch
            .into_iter()
            .map(|new| Installment {
                id: Uuid::new_v4(),
                purchase_id: new.purchase_id,
                card_id: new.card_id,
                statement_id: new.statement_id,
                installment_number: new.installment_number,
                amount: new.amount,
                competence_month: new.competence_month,
                due_date: new.due_date,
                status: InstallmentStatus::Pending,
                paid_at: None,
            })
            .collect();
        tables.installments.extend(rows.iter().cloned());
        Ok(rows)
    }

    fn query_installments(&self, statement_id: StatementId) -> StoreResult<Vec<Installment>> {
        let tables = self.tables()?;
        Ok(tables
            .installments
            .iter()
            .filter(|i| i.statement_id == Some(statement_id))
            .cloned()
            .collect())
    }

    fn update_installments_status(
        &self,
        statement_id: StatementId,
        update: InstallmentStatusUpdate,
    ) -> StoreResult<usize> {
        let mut tables = self.tables()?;
        if !tables.statements.contains_key(&statement_id) {
            return Err(StoreError::NotFound {
                entity: "statement",
                id: statement_id,
            });
        }

        let mut touched = 0;
        for row in tables.installments.iter_mut().filter(|i| {
            i.statement_id == Some(statement_id) && i.status != InstallmentStatus::Cancelled
        }) {
            row.status = update.status;
            match update.paid_at {
                PaidAtChange::Keep => {}
                PaidAtChange::Set(date) => row.paid_at = Some(date),
                PaidAtChange::Clear => row.paid_at = None,
            }
            touched += 1;
        }
        Ok(touched)
    }
}

impl UsageAggregator for MemoryStore {
    fn aggregate_usage(&self, card_id: CardId) -> StoreResult<CardUsage> {
        let tables = self.tables()?;
        Ok(CardUsage::from_installments(
            tables.installments.iter().filter(|i| i.card_id == card_id),
        ))
    }
}

impl MemberDirectory for MemoryStore {
    fn member(&self, id: MemberId) -> StoreResult<Option<Member>> {
        Ok(self.tables()?.members.iter().find(|m| m.id == id).cloned())
    }

    fn family_members(&self, family_id: FamilyId) -> StoreResult<Vec<Member>> {
        Ok(self
            .tables()?
            .members
            .iter()
            .filter(|m| m.family_id == family_id)
            .cloned()
            .collect())
    }
}
