mod common;

use common::*;
use curra_disbursement::{
    producer::{EmployeeBreakdown, FinalizeError},
    BatchReport, ConsumptionStatus, CurrencyCode, EventError, FinalizedPayrollRun, InMemoryStore, OutboxStore,
    PayrollFinalizer,
};

fn breakdown(emp: &str, net: i64) -> EmployeeBreakdown {
    EmployeeBreakdown {
        employee_id: emp.into(),
        beneficiary_name: format!("Employee {emp}"),
        net_minor: net,
        payout_beneficiary_account: "256700000009".into(),
        payout_beneficiary_country_code: "UG".into(),
        payout_destination_country_code: "UG".into(),
        payout_destination_network: "mobile_money".into(),
    }
}

fn finalized_run() -> FinalizedPayrollRun {
    FinalizedPayrollRun {
        tenant_id: TENANT.into(),
        payroll_run_id: "run-2026-09".into(),
        currency_code: CurrencyCode::parse("UGX").unwrap(),
        source_wallet: Some("UGX-PAYROLL".into()),
        employee_breakdowns: vec![breakdown("e1", 120_000), breakdown("e2", 0), breakdown("e3", 80_000)],
    }
}

#[tokio::test]
async fn replay_returns_the_existing_rows() {
    let store = InMemoryStore::new();
    let finalizer = PayrollFinalizer::new(store.clone());
    let run = finalized_run();

    let first = finalizer.publish_finalization(&run).await.unwrap();
    let replay = finalizer.publish_finalization(&run).await.unwrap();

    assert_eq!(store.outbox_len(), 2);
    assert_eq!(first.net_pay, replay.net_pay);
    assert_eq!(first.finalized, replay.finalized);
    assert_eq!(first.net_pay.idempotency_key, "run-2026-09:netpay:request:v1");
    assert_eq!(first.finalized.idempotency_key, "run-2026-09:finalized:v1");

    // rebuilding from the same snapshot yields identical bytes
    let rebuilt = curra_disbursement::producer::net_pay_disbursement_event(&run).unwrap();
    assert_eq!(
        serde_json::to_vec(&rebuilt.payload).unwrap(),
        serde_json::to_vec(&first.net_pay.payload).unwrap()
    );

    let payload = first.net_pay.net_pay_payload().unwrap();
    assert_eq!(payload.total_amount_minor, 200_000);
    assert_eq!(payload.line_items.len(), 2);
    assert_eq!(payload.source_wallet.as_deref(), Some("UGX-PAYROLL"));
}

#[tokio::test]
async fn worker_only_picks_up_net_pay_events() {
    let store = InMemoryStore::new();
    let gw = ScriptedGateway::new();
    let finalizer = PayrollFinalizer::new(store.clone());
    let published = finalizer.publish_finalization(&finalized_run()).await.unwrap();

    let pending = store.list_pending_net_pay_events(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_id, published.net_pay.event_id);

    let worker = worker(&store, gw.clone());
    assert_eq!(
        worker.process_batch(10).await.unwrap(),
        BatchReport { processed: 1, skipped: 0, failed: 0 }
    );
    assert_eq!(gw.payout_keys(), vec!["run-2026-09:e1:netpay:v1", "run-2026-09:e3:netpay:v1"]);
    assert_eq!(
        store.consumption_record(CONSUMER, published.net_pay.event_id).unwrap().status,
        ConsumptionStatus::Succeeded
    );
    // the notification is not ours to publish
    assert!(!store.event(published.finalized.event_id).unwrap().is_published());

    // replay after disbursement changes nothing
    finalizer.publish_finalization(&finalized_run()).await.unwrap();
    assert_eq!(worker.process_batch(10).await.unwrap(), BatchReport::default());
    assert_eq!(gw.payouts().len(), 2);
}

#[tokio::test]
async fn negative_net_pay_never_reaches_the_outbox() {
    let store = InMemoryStore::new();
    let finalizer = PayrollFinalizer::new(store.clone());
    let mut run = finalized_run();
    run.employee_breakdowns.push(breakdown("e4", -1));

    let err = finalizer.publish_finalization(&run).await.unwrap_err();
    assert!(matches!(err, FinalizeError::Event(EventError::Validation(_))));
    assert_eq!(store.outbox_len(), 0);
}
