pub mod card;
pub mod config;
pub mod decimal;
pub mod engine;
pub mod errors;
pub mod events;
pub mod notifications;
pub mod schedule;
pub mod state;
pub mod statements;
pub mod store;
pub mod types;
pub mod views;

// re-export key types
pub use card::{Card, CardBuilder};
pub use config::{BillingConfig, CardPolicy, NotificationConfig, PurchaseLimits};
pub use decimal::{Money, Percent};
pub use engine::{parse_purchase_date, BillingEngine, Collaborators, CreatedPurchase, PurchaseRequest};
pub use errors::{BillingError, NotifyError, Result, StoreError};
pub use events::{BillingEvent, EventStore};
pub use notifications::{
    LogMessenger, Messenger, Notification, NotificationOutcome, Outbox, ReminderOptions,
};
pub use schedule::{BillingCycle, InstallmentSchedule, ScheduledInstallment, StatementPeriod};
pub use state::{
    CardUsage, Installment, Member, NewInstallment, NewPurchase, NewStatement, Purchase,
    PurchaseDetails, Statement, StatementTotals,
};
pub use statements::{LifecycleManager, StatementRepository, StatusUpdateOptions, TotalsReconciler};
pub use store::{BillingStore, MemberDirectory, MemoryStore, UsageAggregator};
pub use types::{
    CardId, CategoryId, FamilyId, InstallmentId, InstallmentStatus, MemberId, MemberRole,
    PurchaseId, ReferenceMonth, StatementId, StatementStatus,
};
pub use views::{CardSummary, StatementView};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
