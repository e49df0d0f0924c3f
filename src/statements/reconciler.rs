use tracing::debug;

use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::state::{Statement, StatementTotals};
use crate::store::BillingStore;
use crate::types::StatementId;

/// recomputes statement totals from the installment rows
pub struct TotalsReconciler<'a> {
    store: &'a dyn BillingStore,
}

impl<'a> TotalsReconciler<'a> {
    pub fn new(store: &'a dyn BillingStore) -> Self {
        Self { store }
    }

    /// total excludes cancelled installments, paid counts paid ones only.
    /// Always a full recompute, so out-of-band edits heal on the next call.
    pub fn reconcile(&self, statement_id: StatementId, events: &mut EventStore) -> Result<Statement> {
        if self.store.statement(statement_id)?.is_none() {
            return Err(BillingError::StatementNotFound { id: statement_id });
        }

        let installments = self.store.query_installments(statement_id)?;
        let totals = StatementTotals::from_installments(&installments);
        let statement = self.store.update_statement_totals(statement_id, totals)?;

        debug!(
            statement_id = %statement_id,
            installments = installments.len(),
            total = %totals.total,
            paid = %totals.paid,
            "statement totals reconciled"
        );
        events.emit(BillingEvent::TotalsReconciled {
            statement_id,
            total: totals.total,
            paid: totals.paid,
        });

        Ok(statement)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::card::Card;
    use crate::decimal::Money;
    use crate::state::{NewInstallment, NewPurchase, PurchaseDetails};
    use crate::statements::StatementRepository;
    use crate::store::MemoryStore;
    use crate::types::{InstallmentStatus, ReferenceMonth};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn seeded() -> (MemoryStore, StatementId, Vec<Uuid>) {
        let store = MemoryStore::new();
        let card = Card::builder()
            .family(Uuid::new_v4())
            .name("Itau Click")
            .due_day(10)
            .build()
            .unwrap();
        store.insert_card(card.clone()).unwrap();

        let due = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let statement = StatementRepository::new(&store)
            .ensure_for_due_date(&card, due)
            .unwrap();
        let month = ReferenceMonth::containing(due);

        let mut ids = Vec::new();
        for cents in [12_000, 4_550, 999] {
            let purchase = store
                .insert_purchase(NewPurchase {
                    card_id: card.id,
                    total_amount: Money::from_cents(cents),
                    installment_count: 1,
                    purchase_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
                    first_installment_month: month,
                    statement_id: Some(statement.id),
                    details: PurchaseDetails::default(),
                })
                .unwrap();
            let rows = store
                .insert_installments(vec![NewInstallment {
                    purchase_id: purchase.id,
                    card_id: card.id,
                    statement_id: Some(statement.id),
                    installment_number: 1,
                    amount: Money::from_cents(cents),
                    competence_month: month,
                    due_date: due,
                }])
                .unwrap();
            ids.push(rows[0].id);
        }
        (store, statement.id, ids)
    }

    #[test]
    fn test_reconcile_is_idempotent() {
        let (store, statement_id, _) = seeded();
        let reconciler = TotalsReconciler::new(&store);
        let mut events = EventStore::new();

        let first = reconciler.reconcile(statement_id, &mut events).unwrap();
        let second = reconciler.reconcile(statement_id, &mut events).unwrap();

        assert_eq!(first.total_amount, Money::from_cents(17_549));
        assert_eq!(first.paid_amount, Money::ZERO);
        assert_eq!(first, second);
        assert_eq!(events.events().len(), 2);
    }

    #[test]
    fn test_out_of_band_corrections_heal() {
        let (store, statement_id, ids) = seeded();
        let reconciler = TotalsReconciler::new(&store);
        let mut events = EventStore::new();
        reconciler.reconcile(statement_id, &mut events).unwrap();

        store.correct_installment(ids[2], InstallmentStatus::Cancelled).unwrap();
        store.correct_installment(ids[1], InstallmentStatus::Paid).unwrap();

        let healed = reconciler.reconcile(statement_id, &mut events).unwrap();
        assert_eq!(healed.total_amount, Money::from_cents(16_550));
        assert_eq!(healed.paid_amount, Money::from_cents(4_550));
    }

    #[test]
    fn test_unknown_statement() {
        let store = MemoryStore::new();
        let err = TotalsReconciler::new(&store)
            .reconcile(Uuid::new_v4(), &mut EventStore::new())
            .unwrap_err();
        assert!(matches!(err, BillingError::StatementNotFound { .. }));
    }
}
