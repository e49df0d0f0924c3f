//! outbound notifications: credit-limit alerts and statement reminders.
//!
//! Delivery goes through the [`Messenger`] collaborator. Nothing in this
//! module retries; a failed delivery is reported to the caller of the
//! messenger and the trigger decides whether it is swallowed.

pub mod recipients;
pub mod trigger;

use std::sync::Mutex;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decimal::{Money, Percent};
use crate::errors::NotifyError;
use crate::types::{CardId, StatementId};

pub use recipients::RecipientResolver;
pub use trigger::{NotificationOutcome, NotificationTrigger, ReminderOptions};

/// message handed to the messenger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    CreditLimitAlert {
        to: Vec<String>,
        card_id: CardId,
        card_name: String,
        limit: Money,
        used: Money,
        available: Money,
        usage_percent: Percent,
    },
    StatementReminder {
        to: Vec<String>,
        card_id: CardId,
        statement_id: StatementId,
        card_name: String,
        due_date: NaiveDate,
        /// due date rendered with the configured date format
        due_date_display: String,
        total: Money,
        statement_url: String,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::CreditLimitAlert { .. } => "credit_limit_alert",
            Notification::StatementReminder { .. } => "statement_reminder",
        }
    }

    pub fn recipients(&self) -> &[String] {
        match self {
            Notification::CreditLimitAlert { to, .. } => to,
            Notification::StatementReminder { to, .. } => to,
        }
    }

    pub fn card_id(&self) -> CardId {
        match self {
            Notification::CreditLimitAlert { card_id, .. } => *card_id,
            Notification::StatementReminder { card_id, .. } => *card_id,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Notification::CreditLimitAlert {
                card_name,
                usage_percent,
                ..
            } => format!("{card_name}: {} of the credit limit used", usage_percent.round_dp(2)),
            Notification::StatementReminder {
                card_name,
                due_date_display,
                ..
            } => format!("{card_name}: statement due on {due_date_display}"),
        }
    }

    pub fn to_json(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// outbound delivery collaborator
pub trait Messenger: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// messenger that keeps every delivered message in memory
#[derive(Default)]
pub struct Outbox {
    sent: Mutex<Vec<Notification>>,
    failure: Option<String>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// outbox whose every delivery fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.into()),
        }
    }

    pub fn messages(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }
}

impl Messenger for Outbox {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        if let Some(reason) = &self.failure {
            return Err(NotifyError::Delivery {
                message: reason.clone(),
            });
        }
        let mut sent = self.sent.lock().map_err(|_| NotifyError::Delivery {
            message: "outbox lock poisoned".to_string(),
        })?;
        sent.push(notification.clone());
        Ok(())
    }
}

/// messenger used when no delivery backend is configured; logs the payload
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessenger;

impl Messenger for LogMessenger {
    fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = notification.to_json()?;
        info!(
            kind = notification.kind(),
            card_id = %notification.card_id(),
            recipients = notification.recipients().len(),
            subject = %notification.subject(),
            payload = %payload,
            "notification not delivered, no messenger configured"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn reminder() -> Notification {
        Notification::StatementReminder {
            to: vec!["ana@example.com".to_string()],
            card_id: Uuid::nil(),
            statement_id: Uuid::nil(),
            card_name: "Nubank".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
            due_date_display: "10/02/2024".to_string(),
            total: Money::from_cents(33_334),
            statement_url: "http://localhost:3000/cards/x/statements/y".to_string(),
        }
    }

    #[test]
    fn test_payload_is_tagged_json() {
        let json = reminder().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "statement_reminder");
        assert_eq!(value["total"], "333.34");
        assert_eq!(value["due_date"], "2024-02-10");
        assert_eq!(reminder().subject(), "Nubank: statement due on 10/02/2024");
    }

    #[test]
    fn test_outbox_records_and_fails() {
        let outbox = Outbox::new();
        outbox.deliver(&reminder()).unwrap();
        assert_eq!(outbox.messages(), vec![reminder()]);

        let broken = Outbox::failing("smtp down");
        assert!(matches!(broken.deliver(&reminder()), Err(NotifyError::Delivery { .. })));
        assert!(broken.messages().is_empty());

        assert!(LogMessenger.deliver(&reminder()).is_ok());
    }
}
