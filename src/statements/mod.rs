//! statement grouping, totals and lifecycle.

pub mod lifecycle;
pub mod reconciler;
pub mod repository;

pub use lifecycle::{LifecycleManager, StatusUpdateOptions};
pub use reconciler::TotalsReconciler;
pub use repository::StatementRepository;
