use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    errors::{EventError, StoreError},
    ids::{line_item_key, line_item_reference, net_pay_request_key, run_finalized_key},
    model::{LineItem, NetPayDisbursementRequestedPayload, OutboxEvent, StoredEvent, NET_PAY_DISBURSEMENT_REQUESTED, PAYROLL_RUN_FINALIZED},
    money::{CurrencyCode, Money},
    outbox::OutboxStore,
};

/// Frozen per-employee figures captured at finalization time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeBreakdown {
    pub employee_id: String,
    pub beneficiary_name: String,
    pub net_minor: i64,
    pub payout_beneficiary_account: String,
    pub payout_beneficiary_country_code: String,
    pub payout_destination_country_code: String,
    pub payout_destination_network: String,
}

/// A payroll run after finalization. The snapshot never changes afterwards,
/// so everything derived from it here is reproducible byte for byte.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizedPayrollRun {
    pub tenant_id: String,
    pub payroll_run_id: String,
    pub currency_code: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_wallet: Option<String>,
    pub employee_breakdowns: Vec<EmployeeBreakdown>,
}

pub fn net_pay_line_items(run: &FinalizedPayrollRun) -> Result<Vec<LineItem>, EventError> {
    let mut items = Vec::with_capacity(run.employee_breakdowns.len());
    for b in &run.employee_breakdowns {
        if b.net_minor < 0 {
            return Err(EventError::Validation(format!(
                "employee {} has negative net pay {}",
                b.employee_id, b.net_minor
            )));
        }
        // nothing to pay out
        if b.net_minor == 0 {
            continue;
        }
        items.push(LineItem {
            employee_id: b.employee_id.clone(),
            beneficiary_name: b.beneficiary_name.clone(),
            beneficiary_account: b.payout_beneficiary_account.clone(),
            beneficiary_country_code: b.payout_beneficiary_country_code.clone(),
            destination_country_code: b.payout_destination_country_code.clone(),
            destination_network: b.payout_destination_network.clone(),
            amount_minor: b.net_minor,
            currency_code: run.currency_code.clone(),
            reference: line_item_reference(&run.payroll_run_id, &b.employee_id),
            idempotency_key: line_item_key(&run.payroll_run_id, &b.employee_id),
        });
    }
    Ok(items)
}

pub fn net_pay_disbursement_event(run: &FinalizedPayrollRun) -> Result<OutboxEvent, EventError> {
    let line_items = net_pay_line_items(run)?;

    let total = line_items
        .iter()
        .try_fold(Money::zero(run.currency_code.clone()), |acc, li| {
            acc.checked_add(&Money::new(li.amount_minor, li.currency_code.clone()))
        })
        .map_err(|e| EventError::Validation(e.to_string()))?;

    let payload = NetPayDisbursementRequestedPayload {
        payroll_run_id: run.payroll_run_id.clone(),
        currency_code: run.currency_code.clone(),
        source_wallet: run.source_wallet.clone(),
        total_amount_minor: total.amount_minor,
        line_items,
    };

    Ok(OutboxEvent::new(
        run.tenant_id.clone(),
        NET_PAY_DISBURSEMENT_REQUESTED,
        run.payroll_run_id.clone(),
        net_pay_request_key(&run.payroll_run_id),
        serde_json::to_value(&payload)?,
    ))
}

pub fn payroll_run_finalized_event(run: &FinalizedPayrollRun) -> Result<OutboxEvent, EventError> {
    let payload = serde_json::json!({
        "payrollRunId": run.payroll_run_id,
        "currencyCode": run.currency_code,
        "employeeCount": run.employee_breakdowns.len(),
    });
    Ok(OutboxEvent::new(
        run.tenant_id.clone(),
        PAYROLL_RUN_FINALIZED,
        run.payroll_run_id.clone(),
        run_finalized_key(&run.payroll_run_id),
        payload,
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error(transparent)]
    Event(#[from] EventError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Debug)]
pub struct PublishedFinalization {
    pub net_pay: StoredEvent,
    pub finalized: StoredEvent,
}

/// Writes a finalized run's events to the outbox. Safe to call again for the
/// same run: both keys dedup and the existing rows come back.
pub struct PayrollFinalizer<O> {
    outbox: O,
}

impl<O: OutboxStore> PayrollFinalizer<O> {
    pub fn new(outbox: O) -> Self {
        Self { outbox }
    }

    pub async fn publish_finalization(&self, run: &FinalizedPayrollRun) -> Result<PublishedFinalization, FinalizeError> {
        let net_pay_event = net_pay_disbursement_event(run)?;
        let finalized_event = payroll_run_finalized_event(run)?;

        let net_pay = self.outbox.enqueue(net_pay_event).await?;
        let finalized = self.outbox.enqueue(finalized_event).await?;

        info!(
            tenant = %run.tenant_id,
            payroll_run = %run.payroll_run_id,
            event_id = %net_pay.event_id,
            "net pay disbursement enqueued"
        );
        Ok(PublishedFinalization { net_pay, finalized })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(emp: &str, net: i64) -> EmployeeBreakdown {
        EmployeeBreakdown {
            employee_id: emp.into(),
            beneficiary_name: format!("Employee {emp}"),
            net_minor: net,
            payout_beneficiary_account: "256700000001".into(),
            payout_beneficiary_country_code: "UG".into(),
            payout_destination_country_code: "UG".into(),
            payout_destination_network: "mobile_money".into(),
        }
    }

    fn run(breakdowns: Vec<EmployeeBreakdown>) -> FinalizedPayrollRun {
        FinalizedPayrollRun {
            tenant_id: "tenant-1".into(),
            payroll_run_id: "run-7".into(),
            currency_code: CurrencyCode::parse("ugx").unwrap(),
            source_wallet: None,
            employee_breakdowns: breakdowns,
        }
    }

    #[test]
    fn line_items_carry_stable_keys_and_skip_zero_net() {
        let items = net_pay_line_items(&run(vec![breakdown("e1", 1000), breakdown("e2", 0), breakdown("e3", 250)])).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].idempotency_key, "run-7:e1:netpay:v1");
        assert_eq!(items[0].reference, "PAYROLL-run-7-e1");
        assert_eq!(items[1].employee_id, "e3");
        assert_eq!(items[1].currency_code.as_str(), "UGX");
    }

    #[test]
    fn negative_net_pay_is_rejected() {
        let err = net_pay_line_items(&run(vec![breakdown("e1", -5)])).unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
    }

    #[test]
    fn event_totals_and_keys() {
        let ev = net_pay_disbursement_event(&run(vec![breakdown("e1", 1000), breakdown("e2", 250)])).unwrap();
        assert_eq!(ev.event_type, NET_PAY_DISBURSEMENT_REQUESTED);
        assert_eq!(ev.idempotency_key, "run-7:netpay:request:v1");
        assert_eq!(ev.correlation_id, "run-7");
        assert_eq!(ev.payload["totalAmountMinor"], 1250);
        assert!(ev.payload.get("sourceWallet").is_none());

        let fin = payroll_run_finalized_event(&run(vec![])).unwrap();
        assert_eq!(fin.idempotency_key, "run-7:finalized:v1");
        assert_eq!(fin.event_type, PAYROLL_RUN_FINALIZED);
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let err = net_pay_disbursement_event(&run(vec![breakdown("e1", i64::MAX), breakdown("e2", 1)])).unwrap_err();
        assert!(matches!(err, EventError::Validation(_)));
    }
}
