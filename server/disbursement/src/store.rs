use chrono::Utc;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};

use crate::{
    consumption::{Acquisition, ConsumptionLog, LeasePolicy},
    errors::{StoreError, StoreResult},
    ids::EventId,
    model::{ConsumptionRecord, ConsumptionStatus, OutboxEvent, StoredEvent, NET_PAY_DISBURSEMENT_REQUESTED},
    outbox::OutboxStore,
};

/// Reference implementation of both store contracts, for tests and local runs.
///
/// Every operation runs under one write lock, which gives the same
/// row-level atomicity the Postgres statements rely on.
#[derive(Clone)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
    lease: LeasePolicy,
}

#[derive(Default)]
struct Inner {
    // insertion order doubles as creation order
    events: Vec<StoredEvent>,
    by_tenant_key: HashMap<(String, String), usize>,
    by_id: HashMap<EventId, usize>,
    consumption: HashMap<(String, EventId), ConsumptionRecord>,
    storage_down: bool,
}

impl Inner {
    fn check_up(&self) -> StoreResult<()> {
        if self.storage_down {
            return Err(StoreError::Unavailable("in-memory store switched off"));
        }
        Ok(())
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_lease(LeasePolicy::default())
    }

    pub fn with_lease(lease: LeasePolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            lease,
        }
    }

    /// Simulate an outage: every call fails until switched back.
    pub fn fail_storage(&self, down: bool) {
        self.inner.write().storage_down = down;
    }

    pub fn outbox_len(&self) -> usize {
        self.inner.read().events.len()
    }

    pub fn event(&self, event_id: EventId) -> Option<StoredEvent> {
        let g = self.inner.read();
        g.by_id.get(&event_id).map(|&i| g.events[i].clone())
    }

    pub fn events(&self) -> Vec<StoredEvent> {
        self.inner.read().events.clone()
    }

    pub fn consumption_record(&self, consumer_name: &str, event_id: EventId) -> Option<ConsumptionRecord> {
        self.inner
            .read()
            .consumption
            .get(&(consumer_name.to_string(), event_id))
            .cloned()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl OutboxStore for InMemoryStore {
    async fn enqueue(&self, ev: OutboxEvent) -> StoreResult<StoredEvent> {
        let mut g = self.inner.write();
        g.check_up()?;

        let key = (ev.tenant_id.clone(), ev.idempotency_key.clone());
        if let Some(&i) = g.by_tenant_key.get(&key) {
            return Ok(g.events[i].clone());
        }

        let stored = StoredEvent {
            event_id: ev.event_id,
            tenant_id: ev.tenant_id,
            event_type: ev.event_type,
            event_version: ev.event_version,
            payload: ev.payload,
            correlation_id: ev.correlation_id,
            idempotency_key: ev.idempotency_key,
            created_at: Utc::now(),
            published_at: None,
        };
        if g.by_id.contains_key(&stored.event_id) {
            return Err(StoreError::InvalidValue(format!("duplicate event id {}", stored.event_id)));
        }

        let idx = g.events.len();
        g.by_tenant_key.insert(key, idx);
        g.by_id.insert(stored.event_id, idx);
        g.events.push(stored.clone());
        Ok(stored)
    }

    async fn list_pending_net_pay_events(&self, limit: i64) -> StoreResult<Vec<StoredEvent>> {
        let g = self.inner.read();
        g.check_up()?;

        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(g.events
            .iter()
            .filter(|e| e.event_type == NET_PAY_DISBURSEMENT_REQUESTED && e.published_at.is_none())
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_published(&self, event_id: EventId) -> StoreResult<()> {
        let mut g = self.inner.write();
        g.check_up()?;

        let idx = g.by_id.get(&event_id).copied();
        if let Some(i) = idx {
            let ev = &mut g.events[i];
            if ev.published_at.is_none() {
                ev.published_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConsumptionLog for InMemoryStore {
    async fn acquire(&self, consumer_name: &str, event: &StoredEvent) -> StoreResult<Acquisition> {
        let mut g = self.inner.write();
        g.check_up()?;

        let now = Utc::now();
        let key = (consumer_name.to_string(), event.event_id);
        match g.consumption.get_mut(&key) {
            None => {
                g.consumption.insert(
                    key,
                    ConsumptionRecord {
                        consumer_name: consumer_name.to_string(),
                        event_id: event.event_id,
                        tenant_id: event.tenant_id.clone(),
                        event_type: event.event_type.clone(),
                        status: ConsumptionStatus::Processing,
                        attempt_count: 1,
                        last_attempt_at: now,
                        last_error: None,
                        processed_at: None,
                    },
                );
                Ok(Acquisition::Acquired)
            }
            Some(rec) => {
                if let Some(outcome) = self.lease.classify(rec.status, rec.last_attempt_at, now) {
                    return Ok(outcome);
                }
                rec.status = ConsumptionStatus::Processing;
                rec.attempt_count += 1;
                rec.last_attempt_at = now;
                Ok(Acquisition::Acquired)
            }
        }
    }

    async fn mark_succeeded(&self, consumer_name: &str, event_id: EventId) -> StoreResult<()> {
        let mut g = self.inner.write();
        g.check_up()?;

        if let Some(rec) = g.consumption.get_mut(&(consumer_name.to_string(), event_id)) {
            let now = Utc::now();
            rec.status = ConsumptionStatus::Succeeded;
            rec.processed_at = Some(now);
            rec.last_attempt_at = now;
            rec.last_error = None;
        }
        Ok(())
    }

    async fn mark_failed(&self, consumer_name: &str, event_id: EventId, error_message: &str) -> StoreResult<()> {
        let mut g = self.inner.write();
        g.check_up()?;

        if let Some(rec) = g.consumption.get_mut(&(consumer_name.to_string(), event_id)) {
            if rec.status.is_terminal() {
                return Ok(());
            }
            rec.status = ConsumptionStatus::Failed;
            rec.last_error = Some(error_message.to_string());
            rec.last_attempt_at = Utc::now();
        }
        Ok(())
    }

    async fn get(&self, consumer_name: &str, event_id: EventId) -> StoreResult<Option<ConsumptionRecord>> {
        let g = self.inner.read();
        g.check_up()?;
        Ok(g.consumption.get(&(consumer_name.to_string(), event_id)).cloned())
    }
}
