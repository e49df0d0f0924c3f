/// statement lifecycle - close, pay and reopen a statement with controlled time
use card_billing_rs::{
    BillingConfig, BillingEngine, Card, Collaborators, LogMessenger, MemoryStore, Money,
    PurchaseRequest, SafeTimeProvider, StatementStatus, StatusUpdateOptions, TimeSource, Uuid,
};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let store = Arc::new(MemoryStore::new());
    let card = Card::builder()
        .family(Uuid::new_v4())
        .name("Itau Click")
        .due_day(31)
        .closing_offset_days(10)
        .credit_limit(Money::from_major(3_000))
        .build()?;
    store.insert_card(card.clone())?;

    let mut engine = BillingEngine::new(
        Collaborators::in_memory(store, Arc::new(LogMessenger)),
        BillingConfig::default(),
    )?;

    let purchase_date = time.now().date_naive();
    engine.create_purchase(card.id, PurchaseRequest::new(Money::from_major(1_200), 4, purchase_date), &time)?;
    engine.create_purchase(card.id, PurchaseRequest::new(Money::from_major(89), 1, purchase_date), &time)?;

    println!("=== statements ===");
    for statement in engine.list_statements(card.id)? {
        println!("{} due {} total {} [{}]", statement.reference_month, statement.due_date, statement.total_amount, statement.status);
    }

    let first = engine
        .list_statements(card.id)?
        .into_iter()
        .next()
        .ok_or("no statement")?;

    // the cycle closes ten days before the due date
    controller.advance(Duration::days(2));
    let closed = engine.update_statement_status(first.id, StatementStatus::Closed, StatusUpdateOptions::default(), &time)?;
    println!("\nclosed on {}: total {}", time.now().format("%Y-%m-%d"), closed.total_amount);

    let paid = engine.update_statement_status(
        first.id,
        StatementStatus::Paid,
        StatusUpdateOptions {
            paid_amount: Some(closed.total_amount),
            payment_date: NaiveDate::from_ymd_opt(2024, 1, 30),
        },
        &time,
    )?;
    println!("paid: {} of {}", paid.paid_amount, paid.total_amount);

    let reopened = engine.update_statement_status(first.id, StatementStatus::Open, StatusUpdateOptions::default(), &time)?;
    println!("reopened: paid {} [{}]", reopened.paid_amount, reopened.status);

    let summary = engine.card_summary(card.id)?;
    println!("\n{}", summary.to_json()?);

    println!("\n=== events ===");
    for event in engine.take_events() {
        println!("{:?}", event);
    }

    Ok(())
}
