use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{errors::StoreError, ids::EventId, money::CurrencyCode};

pub const NET_PAY_DISBURSEMENT_REQUESTED: &str = "NetPayDisbursementRequested";
pub const PAYROLL_RUN_FINALIZED: &str = "PayrollRunFinalized";
pub const EVENT_VERSION_V1: &str = "1.0.0";

/// Outbox event to be persisted (producer side)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_id: EventId,
    pub tenant_id: String,
    pub event_type: String,
    pub event_version: String,
    pub payload: Json,
    pub correlation_id: String,
    pub idempotency_key: String,
}

impl OutboxEvent {
    pub fn new(
        tenant_id: impl Into<String>,
        event_type: impl Into<String>,
        correlation_id: impl Into<String>,
        idempotency_key: impl Into<String>,
        payload: Json,
    ) -> Self {
        Self {
            event_id: EventId::new(),
            tenant_id: tenant_id.into(),
            event_type: event_type.into(),
            event_version: EVENT_VERSION_V1.to_string(),
            payload,
            correlation_id: correlation_id.into(),
            idempotency_key: idempotency_key.into(),
        }
    }
}

/// Outbox row as stored; `published_at` is the only field that ever changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub tenant_id: String,
    pub event_type: String,
    pub event_version: String,
    pub payload: Json,
    pub correlation_id: String,
    pub idempotency_key: String,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl StoredEvent {
    pub fn is_published(&self) -> bool {
        self.published_at.is_some()
    }

    pub fn net_pay_payload(&self) -> Result<NetPayDisbursementRequestedPayload, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumptionStatus {
    Processing,
    Succeeded,
    Failed,
}

impl ConsumptionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(StoreError::InvalidValue(format!("consumption status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Per-(consumer, event) processing ledger row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionRecord {
    pub consumer_name: String,
    pub event_id: EventId,
    pub tenant_id: String,
    pub event_type: String,
    pub status: ConsumptionStatus,
    pub attempt_count: i32,
    pub last_attempt_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Body of a `NetPayDisbursementRequested` event. Field names on the wire are camelCase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetPayDisbursementRequestedPayload {
    pub payroll_run_id: String,
    pub currency_code: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_wallet: Option<String>,
    pub total_amount_minor: i64,
    pub line_items: Vec<LineItem>,
}

impl NetPayDisbursementRequestedPayload {
    /// Explicit per-event wallet, else the event currency code.
    pub fn effective_source_wallet(&self) -> String {
        match self.source_wallet.as_deref().map(str::trim) {
            Some(w) if !w.is_empty() => w.to_string(),
            _ => self.currency_code.to_string(),
        }
    }
}

/// One employee's disbursement instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub employee_id: String,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub beneficiary_country_code: String,
    pub destination_country_code: String,
    pub destination_network: String,
    pub amount_minor: i64,
    pub currency_code: CurrencyCode,
    pub reference: String,
    pub idempotency_key: String,
}
