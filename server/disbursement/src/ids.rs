use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub Uuid);

impl EventId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Outbox event-level dedup key for a payroll run's net-pay request.
pub fn net_pay_request_key(payroll_run_id: &str) -> String {
    format!("{payroll_run_id}:netpay:request:v1")
}

/// Outbox key for the run-finalized notification.
pub fn run_finalized_key(payroll_run_id: &str) -> String {
    format!("{payroll_run_id}:finalized:v1")
}

/// Per-employee payout key; stable across retries so the provider can dedup.
pub fn line_item_key(payroll_run_id: &str, employee_id: &str) -> String {
    format!("{payroll_run_id}:{employee_id}:netpay:v1")
}

pub fn line_item_reference(payroll_run_id: &str, employee_id: &str) -> String {
    format!("PAYROLL-{payroll_run_id}-{employee_id}")
}
