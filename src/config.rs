use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::ops::RangeInclusive;

use crate::decimal::Percent;
use crate::errors::{BillingError, Result};
use crate::types::{CardId, StatementId};

/// billing engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    pub purchase_limits: PurchaseLimits,
    pub card_policy: CardPolicy,
    pub notifications: NotificationConfig,
}

/// bounds applied to every purchase before any persistence call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchaseLimits {
    pub min_installments: u32,
    pub max_installments: u32,
    pub max_description_len: usize,
    pub max_merchant_len: usize,
}

/// defaults and allowed ranges for card billing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CardPolicy {
    pub default_closing_offset_days: u32,
    pub min_closing_offset_days: u32,
    pub max_closing_offset_days: u32,
    pub default_notify_threshold: Percent,
    pub default_notify_days_before: u32,
    pub min_notify_days_before: u32,
    pub max_notify_days_before: u32,
}

/// outbound notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// base url used to build statement links in reminders
    pub app_base_url: String,
    /// strftime pattern used for due dates in message bodies
    pub date_format: String,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            purchase_limits: PurchaseLimits::default(),
            card_policy: CardPolicy::default(),
            notifications: NotificationConfig::default(),
        }
    }
}

impl Default for PurchaseLimits {
    fn default() -> Self {
        Self {
            min_installments: 1,
            max_installments: 48,
            max_description_len: 180,
            max_merchant_len: 120,
        }
    }
}

impl Default for CardPolicy {
    fn default() -> Self {
        Self {
            default_closing_offset_days: 7,
            min_closing_offset_days: 1,
            max_closing_offset_days: 20,
            default_notify_threshold: Percent::from_whole(80),
            default_notify_days_before: 5,
            min_notify_days_before: 1,
            max_notify_days_before: 15,
        }
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            app_base_url: "http://localhost:3000".to_string(),
            date_format: "%d/%m/%Y".to_string(),
        }
    }
}

impl PurchaseLimits {
    pub fn installment_range(&self) -> RangeInclusive<u32> {
        self.min_installments..=self.max_installments
    }

    /// check an installment count against the configured range
    pub fn check_installments(&self, count: u32) -> Result<()> {
        if !self.installment_range().contains(&count) {
            return Err(BillingError::InvalidInstallmentCount {
                count,
                min: self.min_installments,
                max: self.max_installments,
            });
        }
        Ok(())
    }
}

impl CardPolicy {
    pub fn closing_offset_range(&self) -> RangeInclusive<u32> {
        self.min_closing_offset_days..=self.max_closing_offset_days
    }

    pub fn notify_days_range(&self) -> RangeInclusive<u32> {
        self.min_notify_days_before..=self.max_notify_days_before
    }
}

impl NotificationConfig {
    /// statement link used when the caller does not provide one
    pub fn statement_url(&self, card_id: CardId, statement_id: StatementId) -> String {
        format!(
            "{}/cards/{}/statements/{}",
            self.app_base_url.trim_end_matches('/'),
            card_id,
            statement_id
        )
    }

    /// render a date with `date_format`; patterns with time fields or unknown
    /// specifiers are rejected instead of producing a partial string
    pub fn format_date(&self, date: NaiveDate) -> Result<String> {
        let mut rendered = String::new();
        write!(rendered, "{}", date.format(&self.date_format)).map_err(|_| {
            invalid(format!(
                "date format {:?} cannot render a calendar date",
                self.date_format
            ))
        })?;
        Ok(rendered)
    }
}

impl BillingConfig {
    /// load from a json document; missing sections fall back to defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: BillingConfig =
            serde_json::from_str(json).map_err(|e| BillingError::InvalidConfiguration {
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// check internal consistency
    pub fn validate(&self) -> Result<()> {
        let limits = &self.purchase_limits;
        if limits.min_installments == 0 || limits.min_installments > limits.max_installments {
            return Err(invalid(format!(
                "installment range {}..={} is empty or starts at zero",
                limits.min_installments, limits.max_installments
            )));
        }

        let policy = &self.card_policy;
        if policy.min_closing_offset_days > policy.max_closing_offset_days
            || !policy.closing_offset_range().contains(&policy.default_closing_offset_days)
        {
            return Err(invalid(format!(
                "default closing offset {} outside {}..={}",
                policy.default_closing_offset_days,
                policy.min_closing_offset_days,
                policy.max_closing_offset_days
            )));
        }

        if !policy.notify_days_range().contains(&policy.default_notify_days_before) {
            return Err(invalid(format!(
                "default notify days {} outside {}..={}",
                policy.default_notify_days_before,
                policy.min_notify_days_before,
                policy.max_notify_days_before
            )));
        }

        if !policy.default_notify_threshold.is_within_bounds() {
            return Err(invalid(format!(
                "default notify threshold {} outside 0..=100",
                policy.default_notify_threshold
            )));
        }

        if self.notifications.app_base_url.trim().is_empty() {
            return Err(invalid("app base url must not be empty".to_string()));
        }
        self.notifications.format_date(NaiveDate::default())?;

        Ok(())
    }
}

fn invalid(message: String) -> BillingError {
    BillingError::InvalidConfiguration { message }
}
