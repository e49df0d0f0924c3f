use tracing::{error, info};

use crate::card::Card;
use crate::config::NotificationConfig;
use crate::decimal::Percent;
use crate::errors::{BillingError, NotifyError, Result};
use crate::events::{BillingEvent, EventStore};
use crate::notifications::{Messenger, Notification, RecipientResolver};
use crate::store::{BillingStore, MemberDirectory, UsageAggregator};
use crate::types::StatementId;

/// result of a notification check; delivery problems are reported here
/// instead of being raised
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    Sent { recipients: usize },
    BelowThreshold { usage: Percent },
    /// card has no positive limit or no threshold
    NotConfigured,
    NoRecipients,
    Failed { reason: String },
}

impl NotificationOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, NotificationOutcome::Sent { .. })
    }
}

/// per-reminder options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReminderOptions {
    /// link to the statement; derived from the app base url when absent
    pub statement_url: Option<String>,
}

pub struct NotificationTrigger<'a> {
    store: &'a dyn BillingStore,
    usage: &'a dyn UsageAggregator,
    directory: &'a dyn MemberDirectory,
    messenger: &'a dyn Messenger,
    config: &'a NotificationConfig,
}

impl<'a> NotificationTrigger<'a> {
    pub fn new(
        store: &'a dyn BillingStore,
        usage: &'a dyn UsageAggregator,
        directory: &'a dyn MemberDirectory,
        messenger: &'a dyn Messenger,
        config: &'a NotificationConfig,
    ) -> Self {
        Self {
            store,
            usage,
            directory,
            messenger,
            config,
        }
    }

    /// alert when outstanding usage reaches the card's threshold. Never fails:
    /// lookup and delivery errors are logged and reported as `Failed`.
    pub fn notify_credit_limit(&self, card: &Card, events: &mut EventStore) -> NotificationOutcome {
        let Some((limit, threshold)) = card.alert_settings() else {
            return NotificationOutcome::NotConfigured;
        };

        let usage = match self.usage.aggregate_usage(card.id) {
            Ok(usage) => usage,
            Err(err) => return self.failed(card, "credit_limit_alert", err.into(), events),
        };
        let used = usage.total_outstanding;
        let Some(percent) = used.percent_of(limit) else {
            return NotificationOutcome::NotConfigured;
        };

        if percent < threshold {
            return NotificationOutcome::BelowThreshold { usage: percent };
        }

        let recipients = match RecipientResolver::new(self.directory).resolve(card) {
            Ok(recipients) => recipients,
            Err(err) => return self.failed(card, "credit_limit_alert", err.into(), events),
        };
        if recipients.is_empty() {
            info!(card_id = %card.id, "no recipients for credit limit alert");
            return NotificationOutcome::NoRecipients;
        }

        let count = recipients.len();
        let notification = Notification::CreditLimitAlert {
            to: recipients,
            card_id: card.id,
            card_name: card.name.clone(),
            limit,
            used,
            available: card.limit_available(used).unwrap_or_default(),
            usage_percent: percent.round_dp(2),
        };

        if let Err(err) = self.messenger.deliver(&notification) {
            return self.failed(card, notification.kind(), err, events);
        }

        info!(
            card_id = %card.id,
            usage = %percent.round_dp(2),
            threshold = %threshold,
            recipients = count,
            "credit limit alert sent"
        );
        events.emit(BillingEvent::CreditLimitAlertSent {
            card_id: card.id,
            usage: percent.round_dp(2),
            threshold,
            recipients: count,
        });
        NotificationOutcome::Sent { recipients: count }
    }

    /// remind the card's recipients of a statement. Missing rows, store errors
    /// and an unusable date format are returned; delivery errors are logged and
    /// reported as `Failed`.
    pub fn notify_statement_reminder(
        &self,
        statement_id: StatementId,
        options: ReminderOptions,
        events: &mut EventStore,
    ) -> Result<NotificationOutcome> {
        let statement = self
            .store
            .statement(statement_id)?
            .ok_or(BillingError::StatementNotFound { id: statement_id })?;
        let card = self
            .store
            .card(statement.card_id)?
            .ok_or(BillingError::CardNotFound {
                id: statement.card_id,
            })?;

        let recipients = RecipientResolver::new(self.directory).resolve(&card)?;
        if recipients.is_empty() {
            info!(
                statement_id = %statement_id,
                card_id = %card.id,
                "no recipients for statement reminder"
            );
            return Ok(NotificationOutcome::NoRecipients);
        }

        let count = recipients.len();
        let statement_url = options
            .statement_url
            .unwrap_or_else(|| self.config.statement_url(card.id, statement_id));
        let notification = Notification::StatementReminder {
            to: recipients,
            card_id: card.id,
            statement_id,
            card_name: card.name.clone(),
            due_date: statement.due_date,
            due_date_display: self.config.format_date(statement.due_date)?,
            total: statement.total_amount,
            statement_url,
        };

        if let Err(err) = self.messenger.deliver(&notification) {
            return Ok(self.failed(&card, notification.kind(), err, events));
        }

        info!(
            statement_id = %statement_id,
            card_id = %card.id,
            due_date = %statement.due_date,
            total = %statement.total_amount,
            recipients = count,
            "statement reminder sent"
        );
        events.emit(BillingEvent::StatementReminderSent {
            statement_id,
            card_id: card.id,
            due_date: statement.due_date,
            recipients: count,
        });
        Ok(NotificationOutcome::Sent { recipients: count })
    }

    fn failed(
        &self,
        card: &Card,
        kind: &str,
        err: NotifyError,
        events: &mut EventStore,
    ) -> NotificationOutcome {
        error!(card_id = %card.id, kind, error = %err, "notification failed");
        events.emit(BillingEvent::NotificationFailed {
            card_id: card.id,
            kind: kind.to_string(),
            reason: err.to_string(),
        });
        NotificationOutcome::Failed {
            reason: err.to_string(),
        }
    }
}
