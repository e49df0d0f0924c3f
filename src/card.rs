use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::CardPolicy;
use crate::decimal::{Money, Percent};
use crate::errors::{BillingError, Result};
use crate::schedule::{calendar, BillingCycle};
use crate::types::{CardId, FamilyId, MemberId, ReferenceMonth};

/// credit card and its billing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub family_id: FamilyId,
    /// member the card belongs to, if any
    pub owner_member_id: Option<MemberId>,
    pub name: String,
    pub nickname: Option<String>,
    pub brand: Option<String>,
    pub due_day: u32,
    pub closing_offset_days: u32,
    /// optional fixed billing day, informational only
    pub billing_day: Option<u32>,
    pub credit_limit: Option<Money>,
    pub notify_threshold: Option<Percent>,
    pub notify_days_before: u32,
}

impl Card {
    pub fn builder() -> CardBuilder {
        CardBuilder::new()
    }

    pub fn cycle(&self) -> BillingCycle {
        BillingCycle::new(self.due_day, self.closing_offset_days)
    }

    /// configured billing day resolved inside `month`
    pub fn billing_date_in(&self, month: ReferenceMonth) -> Option<NaiveDate> {
        self.billing_day.and_then(|day| calendar::clamp_day(month, day))
    }

    /// limit usage alerts need both a positive limit and a threshold
    pub fn alert_settings(&self) -> Option<(Money, Percent)> {
        match (self.credit_limit, self.notify_threshold) {
            (Some(limit), Some(threshold)) if limit.is_positive() => Some((limit, threshold)),
            _ => None,
        }
    }

    /// remaining limit for a given outstanding usage, never negative
    pub fn limit_available(&self, outstanding: Money) -> Option<Money> {
        self.credit_limit
            .map(|limit| (limit - outstanding).max(Money::ZERO))
    }
}

pub struct CardBuilder {
    id: Option<CardId>,
    family_id: Option<FamilyId>,
    owner_member_id: Option<MemberId>,
    name: Option<String>,
    nickname: Option<String>,
    brand: Option<String>,
    due_day: Option<u32>,
    closing_offset_days: Option<u32>,
    billing_day: Option<u32>,
    credit_limit: Option<Money>,
    notify_threshold: Option<Option<Percent>>,
    notify_days_before: Option<u32>,
    policy: CardPolicy,
}

impl CardBuilder {
    pub fn new() -> Self {
        Self {
            id: None,
            family_id: None,
            owner_member_id: None,
            name: None,
            nickname: None,
            brand: None,
            due_day: None,
            closing_offset_days: None,
            billing_day: None,
            credit_limit: None,
            notify_threshold: None,
            notify_days_before: None,
            policy: CardPolicy::default(),
        }
    }

    pub fn id(mut self, id: CardId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn family(mut self, family_id: FamilyId) -> Self {
        self.family_id = Some(family_id);
        self
    }

    pub fn owner(mut self, member_id: MemberId) -> Self {
        self.owner_member_id = Some(member_id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }

    pub fn brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn due_day(mut self, day: u32) -> Self {
        self.due_day = Some(day);
        self
    }

    pub fn closing_offset_days(mut self, days: u32) -> Self {
        self.closing_offset_days = Some(days);
        self
    }

    pub fn billing_day(mut self, day: u32) -> Self {
        self.billing_day = Some(day);
        self
    }

    pub fn credit_limit(mut self, limit: Money) -> Self {
        self.credit_limit = Some(limit);
        self
    }

    pub fn notify_threshold(mut self, threshold: Percent) -> Self {
        self.notify_threshold = Some(Some(threshold));
        self
    }

    /// turn limit alerts off for this card
    pub fn without_limit_alerts(mut self) -> Self {
        self.notify_threshold = Some(None);
        self
    }

    pub fn notify_days_before(mut self, days: u32) -> Self {
        self.notify_days_before = Some(days);
        self
    }

    /// defaults and ranges to apply
    pub fn policy(mut self, policy: &CardPolicy) -> Self {
        self.policy = policy.clone();
        self
    }

    pub fn build(self) -> Result<Card> {
        let family_id = self.family_id.ok_or_else(|| invalid("family required"))?;

        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| n.chars().count() >= 2)
            .ok_or_else(|| invalid("card name must have at least 2 characters"))?;

        let due_day = self.due_day.ok_or_else(|| invalid("due day required"))?;
        check_day("due day", due_day)?;

        if let Some(day) = self.billing_day {
            check_day("billing day", day)?;
        }

        let closing_offset_days = self
            .closing_offset_days
            .unwrap_or(self.policy.default_closing_offset_days);
        if !self.policy.closing_offset_range().contains(&closing_offset_days) {
            return Err(invalid(&format!(
                "closing offset {} outside {}..={}",
                closing_offset_days,
                self.policy.min_closing_offset_days,
                self.policy.max_closing_offset_days
            )));
        }

        let notify_threshold = self
            .notify_threshold
            .unwrap_or(Some(self.policy.default_notify_threshold));
        if let Some(threshold) = notify_threshold {
            if !threshold.is_within_bounds() {
                return Err(invalid(&format!("notify threshold {threshold} outside 0..=100")));
            }
        }

        let notify_days_before = self
            .notify_days_before
            .unwrap_or(self.policy.default_notify_days_before);
        if !self.policy.notify_days_range().contains(&notify_days_before) {
            return Err(invalid(&format!(
                "notify days before {} outside {}..={}",
                notify_days_before,
                self.policy.min_notify_days_before,
                self.policy.max_notify_days_before
            )));
        }

        if let Some(limit) = self.credit_limit {
            if limit.is_negative() {
                return Err(invalid(&format!("credit limit {limit} must not be negative")));
            }
        }

        Ok(Card {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            family_id,
            owner_member_id: self.owner_member_id,
            name,
            nickname: self.nickname.filter(|n| !n.trim().is_empty()),
            brand: self.brand.filter(|b| !b.trim().is_empty()),
            due_day,
            closing_offset_days,
            billing_day: self.billing_day,
            credit_limit: self.credit_limit,
            notify_threshold,
            notify_days_before,
        })
    }
}

impl Default for CardBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn check_day(label: &str, day: u32) -> Result<()> {
    if !(1..=31).contains(&day) {
        return Err(invalid(&format!("{label} {day} outside 1..=31")));
    }
    Ok(())
}

fn invalid(message: &str) -> BillingError {
    BillingError::InvalidConfiguration {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> CardBuilder {
        Card::builder().family(Uuid::new_v4()).name("Nubank Roxinho").due_day(10)
    }

    #[test]
    fn test_builder_applies_policy_defaults() {
        let card = base().credit_limit(Money::from_major(5_000)).build().unwrap();
        assert_eq!(card.closing_offset_days, 7);
        assert_eq!(card.notify_threshold, Some(Percent::from_whole(80)));
        assert_eq!(card.notify_days_before, 5);
        assert_eq!(card.cycle(), BillingCycle::new(10, 7));
        assert_eq!(
            card.alert_settings(),
            Some((Money::from_major(5_000), Percent::from_whole(80)))
        );
    }

    #[test]
    fn test_builder_rejects_out_of_range_values() {
        assert!(base().due_day(0).build().is_err());
        assert!(base().due_day(32).build().is_err());
        assert!(base().billing_day(40).build().is_err());
        assert!(base().closing_offset_days(21).build().is_err());
        assert!(base().notify_days_before(16).build().is_err());
        assert!(base().notify_threshold(Percent::from_whole(101)).build().is_err());
        assert!(base().credit_limit(Money::from_major(-1)).build().is_err());
        assert!(Card::builder().name("Visa").due_day(5).build().is_err());
        assert!(Card::builder().family(Uuid::new_v4()).name("V").due_day(5).build().is_err());
    }

    #[test]
    fn test_billing_day_clamped_to_month() {
        let card = base().billing_day(31).build().unwrap();
        let feb = ReferenceMonth::new(2023, 2).unwrap();
        assert_eq!(card.billing_date_in(feb), NaiveDate::from_ymd_opt(2023, 2, 28));

        let without = base().build().unwrap();
        assert_eq!(without.billing_date_in(feb), None);
    }

    #[test]
    fn test_alert_settings_require_limit_and_threshold() {
        let no_limit = base().build().unwrap();
        assert!(no_limit.alert_settings().is_none());

        let muted = base()
            .credit_limit(Money::from_major(1_000))
            .without_limit_alerts()
            .build()
            .unwrap();
        assert!(muted.alert_settings().is_none());

        let zero_limit = base().credit_limit(Money::ZERO).build().unwrap();
        assert!(zero_limit.alert_settings().is_none());
    }

    #[test]
    fn test_limit_available_never_negative() {
        let card = base().credit_limit(Money::from_major(1_000)).build().unwrap();
        assert_eq!(card.limit_available(Money::from_major(250)), Some(Money::from_major(750)));
        assert_eq!(card.limit_available(Money::from_major(1_200)), Some(Money::ZERO));
        assert_eq!(base().build().unwrap().limit_available(Money::from_major(10)), None);
    }

    #[test]
    fn test_blank_nickname_dropped() {
        let card = base().nickname("Roxinho").build().unwrap();
        assert_eq!(card.nickname.as_deref(), Some("Roxinho"));
        assert_eq!(base().nickname("  ").build().unwrap().nickname, None);
    }
}
