//! billing engine: the operations exposed to calling code.
//!
//! `create_purchase` writes in saga order: statements are ensured first
//! (idempotent, safe to leave behind), then the purchase row, then the
//! installment batch. If the batch fails the purchase row is deleted again
//! and the original error is returned.
//!
//! Status updates have no compensation: the installment cascade is written
//! before the statement status, and a failed status write is repaired by
//! repeating the same update (see [`crate::statements::lifecycle`]).

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::card::Card;
use crate::config::{BillingConfig, NotificationConfig, PurchaseLimits};
use crate::decimal::Money;
use crate::errors::{BillingError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::notifications::{Messenger, NotificationOutcome, NotificationTrigger, ReminderOptions};
use crate::schedule::{calendar, InstallmentSchedule};
use crate::state::{Installment, NewInstallment, NewPurchase, Purchase, PurchaseDetails, Statement};
use crate::statements::{LifecycleManager, StatementRepository, StatusUpdateOptions, TotalsReconciler};
use crate::store::{BillingStore, MemberDirectory, MemoryStore, UsageAggregator};
use crate::types::{CardId, ReferenceMonth, StatementId, StatementStatus};
use crate::views::CardSummary;

/// collaborators injected into the engine
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn BillingStore>,
    pub usage: Arc<dyn UsageAggregator>,
    pub directory: Arc<dyn MemberDirectory>,
    pub messenger: Arc<dyn Messenger>,
}

impl Collaborators {
    /// every persistence role served by one in-memory store
    pub fn in_memory(store: Arc<MemoryStore>, messenger: Arc<dyn Messenger>) -> Self {
        Self {
            store: store.clone(),
            usage: store.clone(),
            directory: store,
            messenger,
        }
    }

    fn trigger<'a>(&'a self, config: &'a NotificationConfig) -> NotificationTrigger<'a> {
        NotificationTrigger::new(
            self.store.as_ref(),
            self.usage.as_ref(),
            self.directory.as_ref(),
            self.messenger.as_ref(),
            config,
        )
    }
}

/// purchase as submitted by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub amount: Money,
    pub installments: u32,
    pub purchase_date: NaiveDate,
    #[serde(default)]
    pub details: PurchaseDetails,
}

impl PurchaseRequest {
    pub fn new(amount: Money, installments: u32, purchase_date: NaiveDate) -> Self {
        Self {
            amount,
            installments,
            purchase_date,
            details: PurchaseDetails::default(),
        }
    }

    pub fn with_details(mut self, details: PurchaseDetails) -> Self {
        self.details = details;
        self
    }
}

/// everything written by a purchase
#[derive(Debug, Clone, PartialEq)]
pub struct CreatedPurchase {
    pub purchase: Purchase,
    pub installments: Vec<Installment>,
    /// touched statements after reconciliation, by reference month
    pub statements: Vec<Statement>,
    pub credit_limit: NotificationOutcome,
}

pub struct BillingEngine {
    collaborators: Collaborators,
    config: BillingConfig,
    events: EventStore,
}

impl BillingEngine {
    pub fn new(collaborators: Collaborators, config: BillingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            collaborators,
            config,
            events: EventStore::new(),
        })
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<BillingEvent> {
        self.events.take_events()
    }

    fn store(&self) -> &dyn BillingStore {
        self.collaborators.store.as_ref()
    }

    fn load_card(&self, card_id: CardId) -> Result<Card> {
        self.store()
            .card(card_id)?
            .ok_or(BillingError::CardNotFound { id: card_id })
    }

    /// split a purchase into installments, link them to their statements and
    /// re-evaluate the card's credit-limit alert
    pub fn create_purchase(
        &mut self,
        card_id: CardId,
        request: PurchaseRequest,
        time_provider: &SafeTimeProvider,
    ) -> Result<CreatedPurchase> {
        let details = validate_request(&self.config.purchase_limits, &request)?;
        let card = self.load_card(card_id)?;
        let schedule = InstallmentSchedule::generate(
            request.purchase_date,
            request.amount,
            request.installments,
            card.cycle(),
        )?;

        let store = self.collaborators.store.as_ref();

        // one statement per competence month
        let repository = StatementRepository::new(store);
        let mut statements: BTreeMap<ReferenceMonth, Statement> = BTreeMap::new();
        for scheduled in &schedule.installments {
            if statements.contains_key(&scheduled.competence_month) {
                continue;
            }
            let statement = repository.ensure_for_due_date(&card, scheduled.due_date)?;
            if statement.status != StatementStatus::Open {
                warn!(
                    statement_id = %statement.id,
                    status = %statement.status,
                    reference_month = %statement.reference_month,
                    "installment linked to a statement that is no longer open"
                );
            }
            statements.insert(scheduled.competence_month, statement);
        }
        let statement_for = |month: &ReferenceMonth| statements.get(month).map(|s| s.id);

        let purchase = store.insert_purchase(NewPurchase {
            card_id: card.id,
            total_amount: request.amount,
            installment_count: request.installments,
            purchase_date: request.purchase_date,
            first_installment_month: schedule.first_installment_month,
            statement_id: statement_for(&schedule.first_installment_month),
            details,
        })?;

        let batch: Vec<NewInstallment> = schedule
            .installments
            .iter()
            .map(|scheduled| NewInstallment {
                purchase_id: purchase.id,
                card_id: card.id,
                statement_id: statement_for(&scheduled.competence_month),
                installment_number: scheduled.installment_number,
                amount: scheduled.amount,
                competence_month: scheduled.competence_month,
                due_date: scheduled.due_date,
            })
            .collect();

        let installments = match store.insert_installments(batch) {
            Ok(rows) => rows,
            Err(err) => {
                match store.delete_purchase(purchase.id) {
                    Ok(()) => {
                        warn!(
                            purchase_id = %purchase.id,
                            card_id = %card.id,
                            error = %err,
                            "installment insert failed, purchase removed"
                        );
                        self.events.emit(BillingEvent::PurchaseCompensated {
                            purchase_id: purchase.id,
                            card_id: card.id,
                            reason: err.to_string(),
                            timestamp: time_provider.now(),
                        });
                    }
                    Err(cleanup) => error!(
                        purchase_id = %purchase.id,
                        card_id = %card.id,
                        error = %err,
                        cleanup_error = %cleanup,
                        "installment insert failed and purchase could not be removed"
                    ),
                }
                return Err(err.into());
            }
        };

        let reconciler = TotalsReconciler::new(store);
        let mut touched = Vec::with_capacity(statements.len());
        for statement in statements.values() {
            touched.push(reconciler.reconcile(statement.id, &mut self.events)?);
        }

        info!(
            purchase_id = %purchase.id,
            card_id = %card.id,
            amount = %purchase.total_amount,
            installments = installments.len(),
            first_due_date = %schedule.first_due_date,
            statements = touched.len(),
            "purchase recorded"
        );
        self.events.emit(BillingEvent::PurchaseRecorded {
            purchase_id: purchase.id,
            card_id: card.id,
            amount: purchase.total_amount,
            installment_count: purchase.installment_count,
            first_due_date: schedule.first_due_date,
            statements: touched.iter().map(|s| s.id).collect(),
            timestamp: time_provider.now(),
        });

        let credit_limit = self
            .collaborators
            .trigger(&self.config.notifications)
            .notify_credit_limit(&card, &mut self.events);

        Ok(CreatedPurchase {
            purchase,
            installments,
            statements: touched,
            credit_limit,
        })
    }

    /// update statement status with system time
    pub fn update_statement_status_now(
        &mut self,
        statement_id: StatementId,
        target: StatementStatus,
        options: StatusUpdateOptions,
    ) -> Result<Statement> {
        let time = SafeTimeProvider::new(hourglass_rs::TimeSource::System);
        self.update_statement_status(statement_id, target, options, &time)
    }

    pub fn update_statement_status(
        &mut self,
        statement_id: StatementId,
        target: StatementStatus,
        options: StatusUpdateOptions,
        time_provider: &SafeTimeProvider,
    ) -> Result<Statement> {
        LifecycleManager::new(self.collaborators.store.as_ref()).update_status(
            statement_id,
            target,
            options,
            time_provider,
            &mut self.events,
        )
    }

    /// statements of a card ordered by due date
    pub fn list_statements(&self, card_id: CardId) -> Result<Vec<Statement>> {
        self.load_card(card_id)?;
        Ok(self.store().list_statements(card_id)?)
    }

    pub fn notify_credit_limit(&mut self, card: &Card) -> NotificationOutcome {
        self.collaborators
            .trigger(&self.config.notifications)
            .notify_credit_limit(card, &mut self.events)
    }

    pub fn notify_statement_reminder(
        &mut self,
        statement_id: StatementId,
        options: ReminderOptions,
    ) -> Result<NotificationOutcome> {
        self.collaborators
            .trigger(&self.config.notifications)
            .notify_statement_reminder(statement_id, options, &mut self.events)
    }

    pub fn card_summary(&self, card_id: CardId) -> Result<CardSummary> {
        let card = self.load_card(card_id)?;
        let usage = self.collaborators.usage.aggregate_usage(card_id)?;
        let statements = self.store().list_statements(card_id)?;
        Ok(CardSummary::build(card, usage, &statements))
    }

    /// open or closed statements due between `today` and the card's
    /// reminder horizon, both inclusive
    pub fn statements_due_for_reminder(
        &self,
        card_id: CardId,
        today: NaiveDate,
    ) -> Result<Vec<Statement>> {
        let card = self.load_card(card_id)?;
        let horizon = calendar::days_after(today, card.notify_days_before).ok_or_else(|| {
            BillingError::InvalidDate {
                message: format!("reminder horizon out of range from {today}"),
            }
        })?;

        Ok(self
            .store()
            .list_statements(card_id)?
            .into_iter()
            .filter(|s| s.status.is_outstanding() && s.due_date >= today && s.due_date <= horizon)
            .collect())
    }
}

/// parse a `YYYY-MM-DD` purchase date
pub fn parse_purchase_date(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|e| BillingError::InvalidDate {
        message: format!("{input:?} is not a YYYY-MM-DD date: {e}"),
    })
}

/// reject a request before anything is written; returns normalized details
fn validate_request(limits: &PurchaseLimits, request: &PurchaseRequest) -> Result<PurchaseDetails> {
    if !request.amount.is_positive() {
        return Err(BillingError::InvalidPurchaseAmount {
            amount: request.amount,
        });
    }
    limits.check_installments(request.installments)?;

    let description = normalize_text("description", &request.details.description, limits.max_description_len)?;
    let merchant = normalize_text("merchant", &request.details.merchant, limits.max_merchant_len)?;

    Ok(PurchaseDetails {
        description,
        merchant,
        category_id: request.details.category_id,
        member_id: request.details.member_id,
    })
}

fn normalize_text(field: &str, value: &Option<String>, max_len: usize) -> Result<Option<String>> {
    let Some(text) = value.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        return Ok(None);
    };
    let len = text.chars().count();
    if len > max_len {
        return Err(BillingError::InvalidPurchaseDetails {
            message: format!("{field} has {len} characters, at most {max_len} allowed"),
        });
    }
    Ok(Some(text.to_string()))
}
