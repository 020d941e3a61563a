use std::sync::Arc;
use tracing::{debug, warn};

use crate::{
    consumption::{Acquisition, ConsumptionLog},
    errors::{EventError, StoreResult},
    model::{LineItem, StoredEvent},
    outbox::OutboxStore,
    payout::{PayoutGateway, PayoutRequest, QuotationRequest},
};

/// Aggregate counts for one `process_batch` call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub processed: u32,
    /// No gateway call made: already succeeded earlier, or leased by another worker.
    pub skipped: u32,
    pub failed: u32,
}

impl BatchReport {
    pub fn is_idle(&self) -> bool {
        self.processed == 0 && self.skipped == 0 && self.failed == 0
    }

    fn record(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Processed => self.processed += 1,
            EventOutcome::Skipped => self.skipped += 1,
            EventOutcome::Failed => self.failed += 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum EventOutcome {
    Processed,
    Skipped,
    Failed,
}

/// Drives pending net-pay events through the payout gateway.
///
/// Each event is all-or-nothing: the first line item that fails aborts the
/// rest, the event is marked failed and stays unpublished, and the next batch
/// starts it again from the first line item. Line-item idempotency keys are
/// stable so the provider collapses the repeats.
pub struct DisbursementWorker<O, C> {
    outbox: O,
    log: C,
    gateway: Arc<dyn PayoutGateway>,
    consumer_name: String,
}

impl<O: OutboxStore, C: ConsumptionLog> DisbursementWorker<O, C> {
    pub fn new(outbox: O, log: C, gateway: Arc<dyn PayoutGateway>, consumer_name: impl Into<String>) -> Self {
        Self {
            outbox,
            log,
            gateway,
            consumer_name: consumer_name.into(),
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Storage errors abort the batch. Anything an event does wrong is
    /// recorded on the consumption log and counted as failed.
    pub async fn process_batch(&self, limit: i64) -> StoreResult<BatchReport> {
        let events = self.outbox.list_pending_net_pay_events(limit).await?;

        let mut report = BatchReport::default();
        for event in &events {
            report.record(self.process_event(event).await?);
        }
        Ok(report)
    }

    async fn process_event(&self, event: &StoredEvent) -> StoreResult<EventOutcome> {
        match self.log.acquire(&self.consumer_name, event).await? {
            Acquisition::AlreadySucceeded => {
                // finished earlier but crashed before the outbox marker
                self.outbox.mark_published(event.event_id).await?;
                debug!(event_id = %event.event_id, "already succeeded; marked published");
                return Ok(EventOutcome::Skipped);
            }
            Acquisition::HeldElsewhere => {
                debug!(event_id = %event.event_id, "lease held by another worker");
                return Ok(EventOutcome::Skipped);
            }
            Acquisition::Acquired => {}
        }

        match self.disburse(event).await {
            Ok(()) => {
                self.log.mark_succeeded(&self.consumer_name, event.event_id).await?;
                self.outbox.mark_published(event.event_id).await?;
                Ok(EventOutcome::Processed)
            }
            Err(e) => {
                let message = e.to_string();
                warn!(
                    event_id = %event.event_id,
                    tenant = %event.tenant_id,
                    consumer = %self.consumer_name,
                    "disbursement failed: {}",
                    message
                );
                self.log
                    .mark_failed(&self.consumer_name, event.event_id, &message)
                    .await?;
                Ok(EventOutcome::Failed)
            }
        }
    }

    async fn disburse(&self, event: &StoredEvent) -> Result<(), EventError> {
        let payload = event.net_pay_payload()?;
        let source_wallet = payload.effective_source_wallet();

        for item in &payload.line_items {
            self.pay_line_item(item, &source_wallet).await?;
        }
        Ok(())
    }

    async fn pay_line_item(&self, item: &LineItem, source_wallet: &str) -> Result<(), EventError> {
        if item.beneficiary_account.trim().is_empty() {
            return Err(EventError::Validation(format!(
                "Missing beneficiary account for employee {}.",
                item.employee_id
            )));
        }

        self.gateway
            .create_payout_quotation(&QuotationRequest {
                amount_minor: item.amount_minor,
                currency: item.currency_code.clone(),
                source_wallet: Some(source_wallet.to_string()),
                destination_country_code: item.destination_country_code.clone(),
                destination_network: item.destination_network.clone(),
            })
            .await?;

        self.gateway
            .create_payout(&PayoutRequest {
                amount_minor: item.amount_minor,
                currency: item.currency_code.clone(),
                source_wallet: Some(source_wallet.to_string()),
                beneficiary_name: item.beneficiary_name.clone(),
                beneficiary_account: item.beneficiary_account.clone(),
                beneficiary_country_code: item.beneficiary_country_code.clone(),
                reference: item.reference.clone(),
                idempotency_key: item.idempotency_key.clone(),
            })
            .await?;

        Ok(())
    }
}
