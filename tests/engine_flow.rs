// End-to-end engine flows against SqliteStore and a failure-injecting store

mod common;

use chrono::Duration;
use common::{add_draw, create_test_clock, create_test_store, FlakyStore};
use draw_engine::audit::{ENTITY_DRAW_REQUEST, ENTITY_WIRE_BATCH};
use draw_engine::{
    transition_draw, verify_audit_chain, AuditLog, BatchRecords, BudgetLine, BudgetRecords, Clock,
    DrawRecords, DrawRequestLine, DrawStatus, FundingRequest, Invoice, InvoiceFlagReconciler,
    InvoiceLineMatcher, InvoiceRecords, InvoiceService, InvoiceStatus, LineFlag, SqliteStore,
    StuckInvoiceFilter, StuckProcessReconciler, WireBatchFunder,
};

#[test]
fn test_draw_lifecycle_from_draft_to_funded() {
    let store = create_test_store();
    let clock = create_test_clock();

    let budget = BudgetLine::new("project-1", "Rough Carpentry", 40000.0)
        .with_raw_category("Framing Labor");
    store.insert_budget_line(&budget).unwrap();

    let draw = add_draw(&store, DrawStatus::Draft, 1800.0);
    let line = DrawRequestLine::new(&draw.id, Some(&budget.id), 1800.0);
    store.insert_line(&line).unwrap();

    for next in [DrawStatus::Review, DrawStatus::Approved] {
        transition_draw(&store, &clock, "pm@builder", &draw.id, next).unwrap();
    }

    // Upload, worker completes, operator matches it to the framing line
    let invoices = InvoiceService::new(&store, &clock);
    let invoice = invoices
        .record_upload(&draw.id, Some("draws/framing.pdf".into()))
        .unwrap()
        .invoice;
    assert!(store.line(&line.id).unwrap().unwrap().has_flag(LineFlag::NoInvoice));

    clock.advance(Duration::minutes(3));
    invoices.complete_processing(&invoice.id).unwrap();

    let matcher = InvoiceLineMatcher::new(&store);
    let suggestion = matcher
        .suggest_line(&draw.id, "framing - labor")
        .unwrap()
        .unwrap();
    assert_eq!(suggestion.line_id, line.id);
    let applied = matcher
        .apply_match(&suggestion.line_id, &invoice.id, 1800.0, suggestion.score)
        .unwrap();
    assert!(applied.line.flags.is_empty());

    transition_draw(&store, &clock, "pm@builder", &draw.id, DrawStatus::Staged).unwrap();

    let result = WireBatchFunder::new(&store, &clock)
        .with_actor("treasury")
        .fund(&FundingRequest::new("builder-7", &[&draw.id], "2025-07-15"))
        .unwrap();
    assert!(result.is_complete());

    let funded = store.draw(&draw.id).unwrap().unwrap();
    assert_eq!(funded.status, DrawStatus::Funded);
    assert_eq!(funded.funded_at, Some(result.funded_at));

    let batch_draws = store.draws_for_batch(&result.batch_id).unwrap();
    assert_eq!(batch_draws.len(), 1);

    // 3 status changes + funded + batch summary
    let events = store.events_for_entity(ENTITY_DRAW_REQUEST, &draw.id).unwrap();
    assert_eq!(events.len(), 4);
    assert_eq!(events[3].actor, "treasury");
    let report = verify_audit_chain(&store).unwrap();
    assert!(report.is_intact());
    assert_eq!(report.events_checked, 5);
}

#[test]
fn test_funding_partial_failure_is_reported_and_audited() {
    let mut store = FlakyStore::new(create_test_store());
    let clock = create_test_clock();

    let ok = add_draw(&store, DrawStatus::Staged, 1000.0);
    let broken = add_draw(&store, DrawStatus::Staged, 2000.0);
    let raced = add_draw(&store, DrawStatus::Staged, 500.0);
    store.fail_fund.insert(broken.id.clone());
    store.lose_race.insert(raced.id.clone());

    let request = FundingRequest::new("builder-7", &[&ok.id, &broken.id, &raced.id], "2025-07-15");
    let result = WireBatchFunder::new(&store, &clock).fund(&request).unwrap();

    // batch total stays the requested sum; the mismatch is surfaced, not hidden
    assert_eq!(result.total_amount, 3500.0);
    assert_eq!(result.draw_count, 3);
    assert_eq!(result.funded_draw_ids, vec![ok.id.clone()]);
    let failed: Vec<&str> = result.failed_draws.iter().map(|f| f.draw_id.as_str()).collect();
    assert_eq!(failed, vec![broken.id.as_str(), raced.id.as_str()]);
    assert!(result.failed_draws[0].reason.contains("disk I/O"));

    assert_eq!(store.draw(&broken.id).unwrap().unwrap().status, DrawStatus::Staged);

    let batch_events = store
        .events_for_entity(ENTITY_WIRE_BATCH, &result.batch_id)
        .unwrap();
    let actions: Vec<&str> = batch_events.iter().map(|e| e.action.as_str()).collect();
    assert_eq!(actions, vec!["funding_incomplete", "created_and_funded"]);
    assert!(store
        .events_for_entity(ENTITY_DRAW_REQUEST, &broken.id)
        .unwrap()
        .is_empty());
    assert_eq!(store.all_events().unwrap().len(), 3);
}

#[test]
fn test_funding_survives_audit_outage() {
    let mut store = FlakyStore::new(create_test_store());
    let clock = create_test_clock();
    let draw = add_draw(&store, DrawStatus::Staged, 750.0);
    store.fail_audit = true;

    let result = WireBatchFunder::new(&store, &clock)
        .fund(&FundingRequest::new("builder-7", &[&draw.id], "2025-07-15"))
        .unwrap();

    assert!(result.is_complete());
    assert_eq!(store.draw(&draw.id).unwrap().unwrap().status, DrawStatus::Funded);
    assert!(store.all_events().unwrap().is_empty());
}

#[test]
fn test_draw_cannot_join_two_batches() {
    let store = create_test_store();
    let clock = create_test_clock();
    let draw = add_draw(&store, DrawStatus::Staged, 1000.0);
    let funder = WireBatchFunder::new(&store, &clock);

    funder
        .fund(&FundingRequest::new("builder-7", &[&draw.id], "2025-07-15"))
        .unwrap();
    let err = funder
        .fund(&FundingRequest::new("builder-7", &[&draw.id], "2025-07-16"))
        .unwrap_err();

    assert_eq!(err.reason(), "invalid_draw_status");
    assert_eq!(store.table_count("wire_batches").unwrap(), 1);
}

#[test]
fn test_stuck_invoice_update_failure_retried_next_run() {
    let mut store = FlakyStore::new(create_test_store());
    let clock = create_test_clock();

    let stuck = Invoice::uploaded("draw-1", None, clock.now());
    let other = Invoice::uploaded("draw-1", None, clock.now());
    store.insert_invoice(&stuck).unwrap();
    store.insert_invoice(&other).unwrap();
    store.fail_invoice_update.insert(stuck.id.clone());
    clock.advance(Duration::minutes(12));

    let first = StuckProcessReconciler::new(&store, &clock)
        .reconcile(&StuckInvoiceFilter::default())
        .unwrap();
    assert_eq!(first.scanned, 2);
    assert_eq!(first.marked_error, 1);
    assert_eq!(first.failed_ids, vec![stuck.id.clone()]);
    assert_eq!(
        store.invoice(&stuck.id).unwrap().unwrap().status,
        InvoiceStatus::Pending
    );

    store.fail_invoice_update.clear();
    let second = StuckProcessReconciler::new(&store, &clock)
        .reconcile(&StuckInvoiceFilter::default())
        .unwrap();
    assert_eq!(second.scanned, 1);
    assert_eq!(second.marked_ids, vec![stuck.id]);
}

#[test]
fn test_flag_update_failure_heals_on_rerun() {
    let mut store = FlakyStore::new(create_test_store());
    let draw = add_draw(&store, DrawStatus::Review, 600.0);
    let a = DrawRequestLine::new(&draw.id, None, 300.0);
    let b = DrawRequestLine::new(&draw.id, None, 300.0);
    store.insert_line(&a).unwrap();
    store.insert_line(&b).unwrap();
    store
        .insert_invoice(&Invoice::uploaded(&draw.id, None, common::t0()))
        .unwrap();
    store.fail_line_update.insert(a.id.clone());

    let first = InvoiceFlagReconciler::new(&store).reconcile(&draw.id).unwrap();
    assert_eq!(first.flagged, vec![b.id.clone()]);
    assert_eq!(first.failed, vec![a.id.clone()]);

    store.fail_line_update.clear();
    let second = InvoiceFlagReconciler::new(&store).reconcile(&draw.id).unwrap();
    assert_eq!(second.flagged, vec![a.id]);
    assert_eq!(second.writes(), 1);
}

#[test]
fn test_deleting_last_linked_invoice_reflags_line() {
    let store = create_test_store();
    let clock = create_test_clock();
    let draw = add_draw(&store, DrawStatus::Review, 900.0);
    let line = DrawRequestLine::new(&draw.id, None, 900.0);
    store.insert_line(&line).unwrap();

    let service = InvoiceService::new(&store, &clock);
    let linked = service.record_upload(&draw.id, None).unwrap().invoice;
    service.record_upload(&draw.id, None).unwrap();
    InvoiceLineMatcher::new(&store)
        .apply_match(&line.id, &linked.id, 900.0, 0.9)
        .unwrap();
    assert!(!store.line(&line.id).unwrap().unwrap().has_flag(LineFlag::NoInvoice));

    let change = service.delete_invoice(&linked.id).unwrap();

    assert_eq!(change.flags.flagged, vec![line.id.clone()]);
    let reloaded = store.line(&line.id).unwrap().unwrap();
    assert!(reloaded.invoice_id.is_none());
    assert!(reloaded.has_flag(LineFlag::NoInvoice));
}

#[test]
fn test_file_backed_store_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("draws.db");

    let draw_id = {
        let store = SqliteStore::open(&path).unwrap();
        add_draw(&store, DrawStatus::Staged, 250.0).id
    };

    let reopened = SqliteStore::open(&path).unwrap();
    let draw = reopened.draw(&draw_id).unwrap().unwrap();
    assert_eq!(draw.status, DrawStatus::Staged);
    assert_eq!(draw.total_amount, 250.0);
}
