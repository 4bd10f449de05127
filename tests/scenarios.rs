//! End-to-end flows over the in-memory store.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;

use devis_core::audit::{serialize, ActionKind, AuditTrail, Auditable, EntityRef};
use devis_core::config::AuditSettings;
use devis_core::db::MemoryStore;
use devis_core::lifecycle;
use devis_core::models::{
    Actor, Deposit, DepositKind, DepositStatus, LineItem, LineOwner, Quote, QuoteRequest, ServiceType,
};
use devis_core::money::{aggregate_deposits, round_money, TaxRate};
use devis_core::orphans::{link_orphans_for_account, sweep_orphans, SweepOptions};

fn valid_until() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 31).unwrap()
}

fn quote_with_two_lines() -> Quote {
    let mut quote = Quote::new(1, "OR202500001", 1, 2, "Salon et couloir", valid_until(), Utc::now());
    quote
        .add_line(LineItem::new(LineOwner::Quote(1), "Murs salon", dec!(50), dec!(25.00), TaxRate::Standard).unwrap())
        .unwrap();
    quote
        .add_line(LineItem::new(LineOwner::Quote(1), "Plafond couloir", dec!(30), dec!(30.00), TaxRate::Standard).unwrap())
        .unwrap();
    quote
}

fn orphan(email: &str) -> QuoteRequest {
    QuoteRequest::new(
        "",
        "Claire Martin",
        email,
        ServiceType::InteriorPainting,
        "Peinture chambre",
        Utc.with_ymd_and_hms(2025, 2, 1, 10, 0, 0).unwrap(),
    )
}

#[test]
fn test_quote_totals_with_two_lines() {
    let mut quote = quote_with_two_lines();
    let totals = quote.recalculate().unwrap();

    assert_eq!(totals.subtotal_ht, dec!(2150.00));
    assert_eq!(totals.total_ttc, dec!(2580.00));
    assert_eq!(totals.tax_value, dec!(430.00));
    assert_eq!(quote.total_ttc, dec!(2580.00));
}

#[test]
fn test_thirty_percent_deposit_amounts() {
    let mut quote = quote_with_two_lines();
    quote.recalculate().unwrap();

    let deposit = quote
        .add_deposit(DepositKind::Initial, "Acompte à la commande", dec!(30), None)
        .unwrap();

    assert_eq!(deposit.amount_ht, dec!(645.00));
    assert_eq!(deposit.amount_ttc, dec!(774.00));
    assert_eq!(deposit.amount_tax, dec!(129.00));
}

#[test]
fn test_deposit_summary_paid_and_pending() {
    let total_ttc = dec!(2580.00);
    let deposits: Vec<Deposit> = [
        (dec!(500), DepositStatus::Paid),
        (dec!(300), DepositStatus::Paid),
        (dec!(200), DepositStatus::Pending),
    ]
    .into_iter()
    .map(|(ttc, status)| {
        let mut deposit = Deposit::new(1, DepositKind::Custom, "Échéance", dec!(10), None);
        deposit.amount_ttc = ttc;
        deposit.status = status;
        deposit
    })
    .collect();

    let summary = aggregate_deposits(&deposits, total_ttc).unwrap();

    assert_eq!(summary.total_paid_ttc, dec!(800));
    assert_eq!(summary.total_pending_ttc, dec!(200));
    assert_eq!(summary.percent_paid, round_money(dec!(800) / total_ttc * dec!(100), 2));
    assert_eq!(summary.paid_count, 2);
    assert_eq!(summary.pending_count, 1);
}

#[tokio::test]
async fn test_quote_edit_is_audited_with_field_diff() {
    let mut trail = AuditTrail::new(MemoryStore::new(), AuditSettings::default());
    let editor = Actor::new(2, "Marc Lopes", "marc@example.com").staff();

    let mut quote = Quote::new(4, "OR202500004", 1, 2, "A", valid_until(), Utc::now());
    let before = serialize(&quote).unwrap();
    quote.title = "B".to_string();
    quote.set_discount(dec!(5)).unwrap();
    let after = serialize(&quote).unwrap();

    let entry = trail
        .record_edit(Some(&editor), &quote, &before, &after, None)
        .await
        .unwrap();

    assert_eq!(entry.action, ActionKind::Edit);
    assert_eq!(entry.actor_id, Some(2));
    let changes = entry.changes.as_ref().unwrap();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes["title"].before.as_deref(), Some("A"));
    assert_eq!(changes["title"].after.as_deref(), Some("B"));
    assert_eq!(changes["discount"].before.as_deref(), Some("0"));
    assert_eq!(changes["discount"].after.as_deref(), Some("5"));

    let history = trail.history_for(quote.entity_ref(), None).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_new_account_links_its_orphan_requests_once() {
    let mut store = MemoryStore::new();
    store.add_request(orphan("x@example.com"));
    store.add_request(orphan("X@Example.com"));
    store.add_request(orphan("someone-else@example.com"));
    let account = Actor::new(10, "Claire Martin", "x@example.com");
    store.add_account(account.clone());
    let mut trail = AuditTrail::new(store, AuditSettings::default());

    let report = link_orphans_for_account(&mut trail, &account, None).await.unwrap();
    assert_eq!(report.total_processed, 2);
    assert_eq!(report.total_linked, 2);

    let entries = trail.store().entries();
    let linkages: Vec<_> = entries.iter().filter(|e| e.action == ActionKind::OrphanLinked).collect();
    let summaries: Vec<_> = entries.iter().filter(|e| e.action == ActionKind::BatchProcessed).collect();
    assert_eq!(linkages.len(), 2);
    assert_eq!(summaries.len(), 1);
    let summary = summaries[0].after.as_ref().unwrap();
    assert_eq!(summary["total_processed"], 2);
    assert_eq!(summary["total_linked"], 2);
    assert!(linkages.iter().all(|e| e.actor_id == Some(10)));

    let written = entries.len();
    for _ in 0..2 {
        let again = link_orphans_for_account(&mut trail, &account, None).await.unwrap();
        assert_eq!(again.total_linked, 0);
    }
    assert_eq!(trail.store().entries().len(), written);
    assert!(trail.store().requests().iter().filter(|r| r.client_id == Some(10)).count() == 2);
}

#[tokio::test]
async fn test_sweep_links_existing_accounts_and_reports_unmatched() {
    let mut store = MemoryStore::new()
        .with_accounts([Actor::new(1, "Admin", "admin@example.com").staff(), Actor::new(5, "Paul", "paul@example.com")]);
    store.add_request(orphan("paul@example.com"));
    store.add_request(orphan("ghost@example.com"));
    let mut trail = AuditTrail::new(store, AuditSettings::default());

    let dry = sweep_orphans(&mut trail, &SweepOptions { dry_run: true, ..SweepOptions::default() }, None)
        .await
        .unwrap();
    assert_eq!(dry.total_linked(), 1);
    assert!(trail.store().entries().is_empty());

    let report = sweep_orphans(&mut trail, &SweepOptions::default(), None).await.unwrap();
    assert_eq!(report.total_linked(), 1);
    assert!(report.unmatched_emails.contains("ghost@example.com"));

    let batch = trail
        .store()
        .entries()
        .iter()
        .find(|e| e.action == ActionKind::BatchProcessed)
        .unwrap();
    assert_eq!(batch.actor_id, Some(1));
    assert_eq!(batch.entity, EntityRef::account(1));
}

#[tokio::test]
async fn test_accepted_quote_becomes_invoice() {
    let mut trail = AuditTrail::new(MemoryStore::new(), AuditSettings::default());
    let mut quote = quote_with_two_lines();
    quote.recalculate().unwrap();

    lifecycle::send_quote(&mut trail, None, &mut quote, Utc::now(), None).await.unwrap();
    lifecycle::accept_quote(&mut trail, None, &mut quote, Utc::now(), None).await.unwrap();

    let issued = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let due = NaiveDate::from_ymd_opt(2025, 6, 30).unwrap();
    let invoice = lifecycle::issue_invoice(&mut trail, None, &quote, 1, "FA202500001", 3, issued, due)
        .await
        .unwrap();

    assert_eq!(invoice.total_ttc, dec!(2580.00));
    assert_eq!(invoice.lines.len(), 2);
    assert_eq!(trail.store().entries().len(), 3);
}
