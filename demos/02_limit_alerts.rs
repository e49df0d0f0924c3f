/// limit alerts - usage threshold, reminders and a failing mail relay
use card_billing_rs::{
    BillingConfig, BillingEngine, Card, Collaborators, Member, MemberRole, MemoryStore, Money,
    Outbox, Percent, PurchaseRequest, ReminderOptions, SafeTimeProvider, TimeSource, Uuid,
};
use chrono::{NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 20, 9, 0, 0).unwrap()
    ));
    let today = time.now().date_naive();

    let store = Arc::new(MemoryStore::new());
    let family = Uuid::new_v4();
    let owner = Member {
        id: Uuid::new_v4(),
        family_id: family,
        display_name: "Marina".to_string(),
        email: Some("marina@example.com".to_string()),
        role: MemberRole::Owner,
    };
    let teen = Member {
        id: Uuid::new_v4(),
        family_id: family,
        display_name: "Lucas".to_string(),
        email: Some("lucas@example.com".to_string()),
        role: MemberRole::Member,
    };
    store.insert_member(owner)?;
    store.insert_member(teen.clone())?;

    let card = Card::builder()
        .family(family)
        .owner(teen.id)
        .name("Cartao do Lucas")
        .due_day(10)
        .credit_limit(Money::from_major(1_000))
        .notify_threshold(Percent::from_whole(80))
        .build()?;
    store.insert_card(card.clone())?;

    let outbox = Arc::new(Outbox::new());
    let config = BillingConfig::from_json(r#"{ "notifications": { "app_base_url": "https://finance.example.com" } }"#)?;
    let mut engine = BillingEngine::new(Collaborators::in_memory(store.clone(), outbox.clone()), config)?;

    println!("=== credit limit ===");
    let first = engine.create_purchase(card.id, PurchaseRequest::new(Money::from_major(750), 1, today), &time)?;
    println!("after 750.00: {:?}", first.credit_limit);
    let second = engine.create_purchase(card.id, PurchaseRequest::new(Money::from_major(100), 1, today), &time)?;
    println!("after 100.00: {:?}", second.credit_limit);

    println!("\n=== reminders ===");
    let reminder_day = NaiveDate::from_ymd_opt(2024, 2, 6).ok_or("bad date")?;
    for statement in engine.statements_due_for_reminder(card.id, reminder_day)? {
        let outcome = engine.notify_statement_reminder(statement.id, ReminderOptions::default())?;
        println!("statement due {}: {:?}", statement.due_date, outcome);
    }

    for message in outbox.messages() {
        println!("{} -> {:?}", message.subject(), message.recipients());
        println!("{}", message.to_json()?);
    }

    println!("\n=== failing relay ===");
    let mut offline = BillingEngine::new(
        Collaborators::in_memory(store, Arc::new(Outbox::failing("relay unreachable"))),
        BillingConfig::default(),
    )?;
    let third = offline.create_purchase(card.id, PurchaseRequest::new(Money::from_major(20), 1, today), &time)?;
    println!("purchase {} recorded anyway: {:?}", third.purchase.id, third.credit_limit);

    Ok(())
}
