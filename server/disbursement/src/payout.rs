use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::{errors::PayoutResult, money::CurrencyCode};

/// Quotation locks a rate/route for one line item before the payout runs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationRequest {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_wallet: Option<String>,
    pub destination_country_code: String,
    pub destination_network: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRequest {
    pub amount_minor: i64,
    pub currency: CurrencyCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_wallet: Option<String>,
    pub beneficiary_name: String,
    pub beneficiary_account: String,
    pub beneficiary_country_code: String,
    pub reference: String,
    /// Stable per line item; the provider dedups on it.
    pub idempotency_key: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    PendingManualExecution,
    Submitted,
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuotationReceipt {
    pub provider: &'static str,
    pub raw: Json,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PayoutReceipt {
    pub provider: &'static str,
    pub status: PayoutStatus,
    pub raw: Json,
}

/// Payment rail behind the disbursement worker.
///
/// Both calls reject a non-positive amount with `PayoutError::InvalidRequest`
/// before doing any I/O. Every wire-side failure, timeouts included, is a
/// `PayoutError::Provider` carrying the status and body.
#[async_trait::async_trait]
pub trait PayoutGateway: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_payout_quotation(&self, req: &QuotationRequest) -> PayoutResult<QuotationReceipt>;

    async fn create_payout(&self, req: &PayoutRequest) -> PayoutResult<PayoutReceipt>;
}
