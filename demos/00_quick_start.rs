/// quick start - one purchase split into installments
use card_billing_rs::{
    parse_purchase_date, BillingConfig, BillingEngine, Card, Collaborators, LogMessenger,
    MemoryStore, Money, PurchaseRequest, SafeTimeProvider, TimeSource, Uuid,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let store = Arc::new(MemoryStore::new());
    let card = Card::builder()
        .family(Uuid::new_v4())
        .name("Nubank")
        .due_day(10)
        .build()?;
    store.insert_card(card.clone())?;

    let collaborators = Collaborators::in_memory(store, Arc::new(LogMessenger));
    let mut engine = BillingEngine::new(collaborators, BillingConfig::default())?;
    let time = SafeTimeProvider::new(TimeSource::System);

    // R$ 1000.00 in 3x, bought on 2024-01-20
    let request = PurchaseRequest::new(Money::parse("1000.00")?, 3, parse_purchase_date("2024-01-20")?);
    let created = engine.create_purchase(card.id, request, &time)?;

    for installment in &created.installments {
        println!(
            "installment {}: {} due {}",
            installment.installment_number, installment.amount, installment.due_date
        );
    }
    for statement in &created.statements {
        println!(
            "statement {}: {}..={} total {}",
            statement.reference_month, statement.period_start, statement.period_end, statement.total_amount
        );
    }

    Ok(())
}
