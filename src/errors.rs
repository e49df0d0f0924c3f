use thiserror::Error;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{CardId, StatementId, StatementStatus};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("invalid purchase amount: {amount}")]
    InvalidPurchaseAmount {
        amount: Money,
    },

    #[error("installment count {count} outside supported range {min}..={max}")]
    InvalidInstallmentCount {
        count: u32,
        min: u32,
        max: u32,
    },

    #[error("invalid date: {message}")]
    InvalidDate {
        message: String,
    },

    #[error("invalid configuration: {message}")]
    InvalidConfiguration {
        message: String,
    },

    #[error("invalid purchase details: {message}")]
    InvalidPurchaseDetails {
        message: String,
    },

    #[error("card not found: {id}")]
    CardNotFound {
        id: CardId,
    },

    #[error("statement not found: {id}")]
    StatementNotFound {
        id: StatementId,
    },

    #[error("invalid transition for statement {id}: {current} -> {target}")]
    InvalidTransition {
        id: StatementId,
        current: StatementStatus,
        target: StatementStatus,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// errors raised by the persistence collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation {
        constraint: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: Uuid,
    },

    #[error("foreign key violated on {entity} {id}")]
    ForeignKey {
        entity: &'static str,
        id: Uuid,
    },

    #[error("store unavailable: {message}")]
    Unavailable {
        message: String,
    },
}

/// errors raised while preparing or delivering a notification
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("delivery failed: {message}")]
    Delivery {
        message: String,
    },

    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, BillingError>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
