#![allow(dead_code)]

use curra_disbursement::{
    errors::PayoutResult,
    ids::{line_item_key, line_item_reference, net_pay_request_key},
    model::NET_PAY_DISBURSEMENT_REQUESTED,
    CurrencyCode, DisbursementWorker, InMemoryStore, LineItem, NetPayDisbursementRequestedPayload, OutboxEvent,
    PayoutError, PayoutGateway, PayoutReceipt, PayoutRequest, PayoutStatus, QuotationReceipt, QuotationRequest,
};
use parking_lot::Mutex;
use serde_json::json;
use std::{collections::HashSet, sync::Arc};

pub const CONSUMER: &str = "netpay-disbursement-worker";
pub const TENANT: &str = "tenant-1";

pub fn ugx() -> CurrencyCode {
    CurrencyCode::parse("UGX").unwrap()
}

pub fn line_item(run: &str, employee: &str, amount_minor: i64) -> LineItem {
    LineItem {
        employee_id: employee.to_string(),
        beneficiary_name: format!("Employee {employee}"),
        beneficiary_account: "256700000001".to_string(),
        beneficiary_country_code: "UG".to_string(),
        destination_country_code: "UG".to_string(),
        destination_network: "mobile_money".to_string(),
        amount_minor,
        currency_code: ugx(),
        reference: line_item_reference(run, employee),
        idempotency_key: line_item_key(run, employee),
    }
}

pub fn net_pay_event(run: &str, items: Vec<LineItem>) -> OutboxEvent {
    net_pay_event_with_wallet(run, items, None)
}

pub fn net_pay_event_with_wallet(run: &str, items: Vec<LineItem>, wallet: Option<&str>) -> OutboxEvent {
    let payload = NetPayDisbursementRequestedPayload {
        payroll_run_id: run.to_string(),
        currency_code: ugx(),
        source_wallet: wallet.map(str::to_string),
        total_amount_minor: items.iter().map(|i| i.amount_minor).sum(),
        line_items: items,
    };
    OutboxEvent::new(
        TENANT,
        NET_PAY_DISBURSEMENT_REQUESTED,
        run,
        net_pay_request_key(run),
        serde_json::to_value(payload).unwrap(),
    )
}

/// Gateway double that records every call and fails the payout calls it is told to.
#[derive(Default)]
pub struct ScriptedGateway {
    quotations: Mutex<Vec<QuotationRequest>>,
    payouts: Mutex<Vec<PayoutRequest>>,
    // 1-based payout call numbers that fail
    failing_payout_calls: Mutex<HashSet<usize>>,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_payout_call(&self, n: usize) {
        self.failing_payout_calls.lock().insert(n);
    }

    pub fn payouts(&self) -> Vec<PayoutRequest> {
        self.payouts.lock().clone()
    }

    pub fn quotations(&self) -> Vec<QuotationRequest> {
        self.quotations.lock().clone()
    }

    pub fn payout_keys(&self) -> Vec<String> {
        self.payouts.lock().iter().map(|p| p.idempotency_key.clone()).collect()
    }
}

#[async_trait::async_trait]
impl PayoutGateway for ScriptedGateway {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn create_payout_quotation(&self, req: &QuotationRequest) -> PayoutResult<QuotationReceipt> {
        self.quotations.lock().push(req.clone());
        Ok(QuotationReceipt {
            provider: "scripted",
            raw: json!({ "quotation": "ok" }),
        })
    }

    async fn create_payout(&self, req: &PayoutRequest) -> PayoutResult<PayoutReceipt> {
        let call = {
            let mut payouts = self.payouts.lock();
            payouts.push(req.clone());
            payouts.len()
        };
        if self.failing_payout_calls.lock().contains(&call) {
            return Err(PayoutError::provider("scripted payout", Some(503), "provider unavailable"));
        }
        Ok(PayoutReceipt {
            provider: "scripted",
            status: PayoutStatus::Submitted,
            raw: json!({ "call": call }),
        })
    }
}

pub fn worker(store: &InMemoryStore, gateway: Arc<dyn PayoutGateway>) -> DisbursementWorker<InMemoryStore, InMemoryStore> {
    DisbursementWorker::new(store.clone(), store.clone(), gateway, CONSUMER)
}

/// Every published event must have a succeeded consumption row.
pub fn assert_published_implies_succeeded(store: &InMemoryStore) {
    for ev in store.events() {
        if ev.is_published() {
            let rec = store
                .consumption_record(CONSUMER, ev.event_id)
                .unwrap_or_else(|| panic!("published event {} has no consumption row", ev.event_id));
            assert_eq!(
                rec.status,
                curra_disbursement::ConsumptionStatus::Succeeded,
                "published event {} is {:?}",
                ev.event_id,
                rec.status
            );
        }
    }
}
