use serde_json::json;
use tracing::info;

use crate::{
    errors::PayoutResult,
    money::ensure_positive_minor,
    payout::{PayoutGateway, PayoutReceipt, PayoutRequest, PayoutStatus, QuotationReceipt, QuotationRequest},
};

/// Records requests for a human to execute. Used when no live rail is configured.
#[derive(Clone, Debug, Default)]
pub struct ManualPayoutGateway;

impl ManualPayoutGateway {
    pub const NAME: &'static str = "manual";

    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PayoutGateway for ManualPayoutGateway {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn create_payout_quotation(&self, req: &QuotationRequest) -> PayoutResult<QuotationReceipt> {
        ensure_positive_minor(req.amount_minor)?;
        Ok(QuotationReceipt {
            provider: Self::NAME,
            raw: json!({
                "provider": Self::NAME,
                "action": "quotation_recorded",
                "request": req,
                "requiresHumanApproval": true,
            }),
        })
    }

    async fn create_payout(&self, req: &PayoutRequest) -> PayoutResult<PayoutReceipt> {
        ensure_positive_minor(req.amount_minor)?;
        info!(
            reference = %req.reference,
            idempotency_key = %req.idempotency_key,
            amount_minor = req.amount_minor,
            currency = %req.currency,
            "payout recorded for manual execution"
        );
        Ok(PayoutReceipt {
            provider: Self::NAME,
            status: PayoutStatus::PendingManualExecution,
            raw: json!({
                "provider": Self::NAME,
                "action": "payout_recorded",
                "request": req,
                "status": "pending_manual_execution",
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::PayoutError, money::CurrencyCode};

    fn ugx() -> CurrencyCode {
        CurrencyCode::parse("UGX").unwrap()
    }

    #[tokio::test]
    async fn records_quotation_and_payout() {
        let gw = ManualPayoutGateway::new();
        let q = gw
            .create_payout_quotation(&QuotationRequest {
                amount_minor: 1000,
                currency: ugx(),
                source_wallet: None,
                destination_country_code: "UG".into(),
                destination_network: "mobile_money".into(),
            })
            .await
            .unwrap();
        assert_eq!(q.raw["provider"], "manual");
        assert_eq!(q.raw["requiresHumanApproval"], true);

        let p = gw
            .create_payout(&PayoutRequest {
                amount_minor: 1000,
                currency: ugx(),
                source_wallet: None,
                beneficiary_name: "Demo".into(),
                beneficiary_account: "256700000004".into(),
                beneficiary_country_code: "UG".into(),
                reference: "ref-1".into(),
                idempotency_key: "idem-1".into(),
            })
            .await
            .unwrap();
        assert_eq!(p.status, PayoutStatus::PendingManualExecution);
        assert_eq!(p.raw["status"], "pending_manual_execution");
        assert_eq!(p.raw["request"]["idempotencyKey"], "idem-1");
    }

    #[tokio::test]
    async fn zero_amount_is_a_caller_bug() {
        let err = ManualPayoutGateway::new()
            .create_payout_quotation(&QuotationRequest {
                amount_minor: 0,
                currency: ugx(),
                source_wallet: None,
                destination_country_code: "UG".into(),
                destination_network: "mobile_money".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PayoutError::InvalidRequest(_)));
    }
}
