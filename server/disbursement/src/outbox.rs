use crate::{
    errors::StoreResult,
    ids::EventId,
    model::{OutboxEvent, StoredEvent},
};

/// Append-only event log, deduplicated per `(tenant_id, idempotency_key)`.
#[async_trait::async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert-or-fetch: a second event with the same tenant and key returns
    /// the row that already exists.
    async fn enqueue(&self, event: OutboxEvent) -> StoreResult<StoredEvent>;

    /// Unpublished `NetPayDisbursementRequested` events, oldest first.
    async fn list_pending_net_pay_events(&self, limit: i64) -> StoreResult<Vec<StoredEvent>>;

    /// Idempotent; an already-published event keeps its first timestamp.
    async fn mark_published(&self, event_id: EventId) -> StoreResult<()>;
}
