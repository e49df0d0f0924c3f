use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Percent};
use crate::types::{CardId, PurchaseId, ReferenceMonth, StatementId, StatementStatus};

/// all events that can be emitted by the billing engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BillingEvent {
    // purchase events
    PurchaseRecorded {
        purchase_id: PurchaseId,
        card_id: CardId,
        amount: Money,
        installment_count: u32,
        first_due_date: NaiveDate,
        statements: Vec<StatementId>,
        timestamp: DateTime<Utc>,
    },
    PurchaseCompensated {
        purchase_id: PurchaseId,
        card_id: CardId,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    // statement events
    TotalsReconciled {
        statement_id: StatementId,
        total: Money,
        paid: Money,
    },
    StatementStatusChanged {
        statement_id: StatementId,
        card_id: CardId,
        reference_month: ReferenceMonth,
        from: StatementStatus,
        to: StatementStatus,
        installments_affected: usize,
        /// amount declared by the caller on payment, if any
        declared_payment: Option<Money>,
        payment_date: Option<NaiveDate>,
        timestamp: DateTime<Utc>,
    },

    // notification events
    CreditLimitAlertSent {
        card_id: CardId,
        usage: Percent,
        threshold: Percent,
        recipients: usize,
    },
    StatementReminderSent {
        statement_id: StatementId,
        card_id: CardId,
        due_date: NaiveDate,
        recipients: usize,
    },
    NotificationFailed {
        card_id: CardId,
        kind: String,
        reason: String,
    },
}

/// event collector, drained by the caller
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<BillingEvent>,
}

impl EventStore {
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
        }
    }

    pub fn emit(&mut self, event: BillingEvent) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[BillingEvent] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_take_events_drains() {
        let mut store = EventStore::new();
        store.emit(BillingEvent::TotalsReconciled {
            statement_id: Uuid::nil(),
            total: Money::from_major(10),
            paid: Money::ZERO,
        });
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.take_events().len(), 1);
        assert!(store.events().is_empty());
    }
}
