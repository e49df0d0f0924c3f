//! statement state machine.
//!
//! ```text
//! open    --close-->   closed
//! closed  --pay-->     paid
//! closed  --overdue--> overdue
//! overdue --pay-->     paid
//! paid    --reopen-->  open
//! ```
//!
//! close, pay and reopen cascade to every non-cancelled installment of the
//! statement. Overdue is a manual flag with no cascade; the only way out is
//! paying it.
//!
//! The installment cascade is written before the statement status. If the
//! status write fails the installments are already moved while the statement
//! keeps its old status; repeating the same transition re-applies the
//! cascade (a no-op) and then writes the status.

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::state::Statement;
use crate::statements::TotalsReconciler;
use crate::store::{BillingStore, InstallmentStatusUpdate};
use crate::types::{StatementId, StatementStatus};

/// caller-provided details for a status change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdateOptions {
    /// amount the caller declares as paid; the statement is settled in full regardless
    pub paid_amount: Option<Money>,
    /// payment date, defaults to today
    pub payment_date: Option<NaiveDate>,
}

pub struct LifecycleManager<'a> {
    store: &'a dyn BillingStore,
}

impl<'a> LifecycleManager<'a> {
    pub fn new(store: &'a dyn BillingStore) -> Self {
        Self { store }
    }

    /// cascade applied to installments when moving `from -> to`, or None if
    /// the transition is not allowed
    pub fn cascade_for(
        from: StatementStatus,
        to: StatementStatus,
        payment_date: NaiveDate,
    ) -> Option<Option<InstallmentStatusUpdate>> {
        match (from, to) {
            (StatementStatus::Open, StatementStatus::Closed) => {
                Some(Some(InstallmentStatusUpdate::billed()))
            }
            (StatementStatus::Closed | StatementStatus::Overdue, StatementStatus::Paid) => {
                Some(Some(InstallmentStatusUpdate::paid(payment_date)))
            }
            (StatementStatus::Paid, StatementStatus::Open) => {
                Some(Some(InstallmentStatusUpdate::pending()))
            }
            (StatementStatus::Closed, StatementStatus::Overdue) => Some(None),
            _ => None,
        }
    }

    pub fn update_status(
        &self,
        statement_id: StatementId,
        target: StatementStatus,
        options: StatusUpdateOptions,
        time_provider: &SafeTimeProvider,
        events: &mut EventStore,
    ) -> Result<Statement> {
        let statement = self
            .store
            .statement(statement_id)?
            .ok_or(BillingError::StatementNotFound { id: statement_id })?;

        let payment_date = options
            .payment_date
            .unwrap_or_else(|| time_provider.now().date_naive());

        let cascade = Self::cascade_for(statement.status, target, payment_date).ok_or(
            BillingError::InvalidTransition {
                id: statement_id,
                current: statement.status,
                target,
            },
        )?;

        let installments_affected = match cascade {
            Some(update) => self.store.update_installments_status(statement_id, update)?,
            None => 0,
        };
        self.store.update_statement_status(statement_id, target)?;

        let reconciled = TotalsReconciler::new(self.store).reconcile(statement_id, events)?;

        let is_payment = target == StatementStatus::Paid;
        if is_payment {
            if let Some(declared) = options.paid_amount {
                if declared != reconciled.paid_amount {
                    warn!(
                        statement_id = %statement_id,
                        declared = %declared,
                        settled = %reconciled.paid_amount,
                        "declared payment differs from statement total, settling in full"
                    );
                }
            }
        }

        info!(
            statement_id = %statement_id,
            card_id = %statement.card_id,
            from = %statement.status,
            to = %target,
            installments_affected,
            total = %reconciled.total_amount,
            paid = %reconciled.paid_amount,
            "statement status changed"
        );
        events.emit(BillingEvent::StatementStatusChanged {
            statement_id,
            card_id: statement.card_id,
            reference_month: statement.reference_month,
            from: statement.status,
            to: target,
            installments_affected,
            declared_payment: if is_payment { options.paid_amount } else { None },
            payment_date: if is_payment { Some(payment_date) } else { None },
            timestamp: time_provider.now(),
        });

        Ok(reconciled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::errors::{StoreError, StoreResult};
    use crate::state::{
        Installment, NewInstallment, NewPurchase, NewStatement, Purchase, PurchaseDetails,
        StatementTotals,
    };
    use crate::statements::StatementRepository;
    use crate::store::MemoryStore;
    use crate::types::{CardId, InstallmentId, InstallmentStatus, PurchaseId, ReferenceMonth};
    use chrono::{TimeZone, Utc};
    use hourglass_rs::TimeSource;
    use std::sync::atomic::{AtomicBool, Ordering};
    use uuid::Uuid;

    struct Fixture {
        store: MemoryStore,
        statement_id: StatementId,
        installment_ids: Vec<InstallmentId>,
    }

    fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let card = Card::builder()
            .family(Uuid::new_v4())
            .name("Santander Free")
            .due_day(10)
            .build()
            .unwrap();
        store.insert_card(card.clone()).unwrap();

        let due = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let statement = StatementRepository::new(&store)
            .ensure_for_due_date(&card, due)
            .unwrap();
        let month = ReferenceMonth::containing(due);

        let purchase = store
            .insert_purchase(NewPurchase {
                card_id: card.id,
                total_amount: Money::from_major(300),
                installment_count: 3,
                purchase_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
                first_installment_month: month,
                statement_id: Some(statement.id),
                details: PurchaseDetails::default(),
            })
            .unwrap();
        // three rows in the same statement to exercise the bulk cascade
        let rows = store
            .insert_installments(
                (1..=3)
                    .map(|n| NewInstallment {
                        purchase_id: purchase.id,
                        card_id: card.id,
                        statement_id: Some(statement.id),
                        installment_number: n,
                        amount: Money::from_major(100),
                        competence_month: month,
                        due_date: due,
                    })
                    .collect(),
            )
            .unwrap();

        Fixture {
            store,
            statement_id: statement.id,
            installment_ids: rows.iter().map(|r| r.id).collect(),
        }
    }

    fn time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(Utc.with_ymd_and_hms(2024, 2, 8, 12, 0, 0).unwrap()))
    }

    fn statuses(store: &MemoryStore, id: StatementId) -> Vec<InstallmentStatus> {
        store.query_installments(id).unwrap().iter().map(|i| i.status).collect()
    }

    #[test]
    fn test_close_pay_reopen_cascade() {
        let f = fixture();
        let manager = LifecycleManager::new(&f.store);
        let time = time();
        let mut events = EventStore::new();
        f.store
            .correct_installment(f.installment_ids[2], InstallmentStatus::Cancelled)
            .unwrap();

        let closed = manager
            .update_status(f.statement_id, StatementStatus::Closed, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(closed.status, StatementStatus::Closed);
        assert_eq!(closed.total_amount, Money::from_major(200));
        assert_eq!(
            statuses(&f.store, f.statement_id),
            vec![InstallmentStatus::Billed, InstallmentStatus::Billed, InstallmentStatus::Cancelled]
        );

        let paid = manager
            .update_status(f.statement_id, StatementStatus::Paid, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(paid.status, StatementStatus::Paid);
        assert_eq!(paid.paid_amount, paid.total_amount);
        let rows = f.store.query_installments(f.statement_id).unwrap();
        assert_eq!(rows[0].paid_at, NaiveDate::from_ymd_opt(2024, 2, 8));
        assert_eq!(rows[2].status, InstallmentStatus::Cancelled);
        assert_eq!(rows[2].paid_at, None);

        let reopened = manager
            .update_status(f.statement_id, StatementStatus::Open, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(reopened.status, StatementStatus::Open);
        assert_eq!(reopened.paid_amount, Money::ZERO);
        let rows = f.store.query_installments(f.statement_id).unwrap();
        assert!(rows[..2].iter().all(|r| r.status == InstallmentStatus::Pending && r.paid_at.is_none()));

        let changes = events
            .events()
            .iter()
            .filter(|e| matches!(e, BillingEvent::StatementStatusChanged { .. }))
            .count();
        assert_eq!(changes, 3);
    }

    #[test]
    fn test_pay_uses_given_payment_date_and_declared_amount() {
        let f = fixture();
        let manager = LifecycleManager::new(&f.store);
        let time = time();
        let mut events = EventStore::new();
        manager
            .update_status(f.statement_id, StatementStatus::Closed, Default::default(), &time, &mut events)
            .unwrap();

        let options = StatusUpdateOptions {
            paid_amount: Some(Money::from_major(250)),
            payment_date: NaiveDate::from_ymd_opt(2024, 2, 9),
        };
        let paid = manager
            .update_status(f.statement_id, StatementStatus::Paid, options, &time, &mut events)
            .unwrap();

        assert_eq!(paid.paid_amount, Money::from_major(300));
        let rows = f.store.query_installments(f.statement_id).unwrap();
        assert!(rows.iter().all(|r| r.paid_at == NaiveDate::from_ymd_opt(2024, 2, 9)));
        assert!(events.events().iter().any(|e| matches!(
            e,
            BillingEvent::StatementStatusChanged { declared_payment: Some(amount), .. }
                if *amount == Money::from_major(250)
        )));
    }

    #[test]
    fn test_invalid_transitions_are_rejected() {
        let f = fixture();
        let manager = LifecycleManager::new(&f.store);
        let time = time();
        let mut events = EventStore::new();

        for target in [StatementStatus::Paid, StatementStatus::Open, StatementStatus::Overdue] {
            let err = manager
                .update_status(f.statement_id, target, Default::default(), &time, &mut events)
                .unwrap_err();
            assert!(matches!(
                err,
                BillingError::InvalidTransition { current: StatementStatus::Open, .. }
            ));
        }
        assert_eq!(statuses(&f.store, f.statement_id), vec![InstallmentStatus::Pending; 3]);
        assert!(events.events().is_empty());
    }

    #[test]
    fn test_overdue_only_from_closed_and_left_by_paying() {
        let f = fixture();
        let manager = LifecycleManager::new(&f.store);
        let time = time();
        let mut events = EventStore::new();
        manager
            .update_status(f.statement_id, StatementStatus::Closed, Default::default(), &time, &mut events)
            .unwrap();

        let overdue = manager
            .update_status(f.statement_id, StatementStatus::Overdue, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(overdue.status, StatementStatus::Overdue);
        assert_eq!(statuses(&f.store, f.statement_id), vec![InstallmentStatus::Billed; 3]);

        for target in [StatementStatus::Open, StatementStatus::Closed, StatementStatus::Overdue] {
            assert!(manager
                .update_status(f.statement_id, target, Default::default(), &time, &mut events)
                .is_err());
        }

        let paid = manager
            .update_status(f.statement_id, StatementStatus::Paid, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(paid.status, StatementStatus::Paid);
        assert_eq!(paid.paid_amount, Money::from_major(300));
        let rows = f.store.query_installments(f.statement_id).unwrap();
        assert!(rows
            .iter()
            .all(|r| r.status == InstallmentStatus::Paid && r.paid_at == NaiveDate::from_ymd_opt(2024, 2, 8)));
    }

    /// store whose next statement status write fails once
    struct FlakyStatusStore<'s> {
        inner: &'s MemoryStore,
        fail_next: AtomicBool,
    }

    impl BillingStore for FlakyStatusStore<'_> {
        fn card(&self, id: CardId) -> StoreResult<Option<Card>> {
            self.inner.card(id)
        }
        fn upsert_statement(&self, statement: NewStatement) -> StoreResult<Statement> {
            self.inner.upsert_statement(statement)
        }
        fn statement(&self, id: StatementId) -> StoreResult<Option<Statement>> {
            self.inner.statement(id)
        }
        fn list_statements(&self, card_id: CardId) -> StoreResult<Vec<Statement>> {
            self.inner.list_statements(card_id)
        }
        fn update_statement_totals(&self, id: StatementId, totals: StatementTotals) -> StoreResult<Statement> {
            self.inner.update_statement_totals(id, totals)
        }
        fn update_statement_status(&self, id: StatementId, status: StatementStatus) -> StoreResult<Statement> {
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(StoreError::Unavailable {
                    message: "deadlock detected".to_string(),
                });
            }
            self.inner.update_statement_status(id, status)
        }
        fn insert_purchase(&self, purchase: NewPurchase) -> StoreResult<Purchase> {
            self.inner.insert_purchase(purchase)
        }
        fn delete_purchase(&self, id: PurchaseId) -> StoreResult<()> {
            self.inner.delete_purchase(id)
        }
        fn insert_installments(&self, batch: Vec<NewInstallment>) -> StoreResult<Vec<Installment>> {
            self.inner.insert_installments(batch)
        }
        fn query_installments(&self, statement_id: StatementId) -> StoreResult<Vec<Installment>> {
            self.inner.query_installments(statement_id)
        }
        fn update_installments_status(
            &self,
            statement_id: StatementId,
            update: InstallmentStatusUpdate,
        ) -> StoreResult<usize> {
            self.inner.update_installments_status(statement_id, update)
        }
    }

    #[test]
    fn test_failed_status_write_converges_on_retry() {
        let f = fixture();
        let flaky = FlakyStatusStore {
            inner: &f.store,
            fail_next: AtomicBool::new(true),
        };
        let manager = LifecycleManager::new(&flaky);
        let time = time();
        let mut events = EventStore::new();

        let err = manager
            .update_status(f.statement_id, StatementStatus::Closed, Default::default(), &time, &mut events)
            .unwrap_err();
        assert!(matches!(err, BillingError::Store(StoreError::Unavailable { .. })));
        // cascade already applied, status unchanged
        assert_eq!(statuses(&f.store, f.statement_id), vec![InstallmentStatus::Billed; 3]);
        assert_eq!(f.store.statement(f.statement_id).unwrap().unwrap().status, StatementStatus::Open);
        assert!(events.events().is_empty());

        let closed = manager
            .update_status(f.statement_id, StatementStatus::Closed, Default::default(), &time, &mut events)
            .unwrap();
        assert_eq!(closed.status, StatementStatus::Closed);
        assert_eq!(closed.total_amount, Money::from_major(300));
        assert_eq!(statuses(&f.store, f.statement_id), vec![InstallmentStatus::Billed; 3]);
    }

    #[test]
    fn test_unknown_statement() {
        let store = MemoryStore::new();
        let err = LifecycleManager::new(&store)
            .update_status(
                Uuid::new_v4(),
                StatementStatus::Closed,
                Default::default(),
                &time(),
                &mut EventStore::new(),
            )
            .unwrap_err();
        assert!(matches!(err, BillingError::StatementNotFound { .. }));
    }
}
