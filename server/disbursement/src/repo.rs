use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as Json;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::{
    consumption::{Acquisition, ConsumptionLog, LeasePolicy},
    errors::{StoreError, StoreResult},
    ids::EventId,
    model::{ConsumptionRecord, ConsumptionStatus, OutboxEvent, StoredEvent, NET_PAY_DISBURSEMENT_REQUESTED},
    outbox::OutboxStore,
};

#[derive(Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn event_from_row(r: &PgRow) -> StoreResult<StoredEvent> {
    Ok(StoredEvent {
        event_id: EventId(r.try_get::<Uuid, _>("id")?),
        tenant_id: r.try_get::<String, _>("tenant_id")?,
        event_type: r.try_get::<String, _>("event_type")?,
        event_version: r.try_get::<String, _>("event_version")?,
        payload: r.try_get::<Json, _>("payload")?,
        correlation_id: r.try_get::<String, _>("correlation_id")?,
        idempotency_key: r.try_get::<String, _>("idempotency_key")?,
        created_at: r.try_get::<DateTime<Utc>, _>("created_at")?,
        published_at: r.try_get::<Option<DateTime<Utc>>, _>("published_at")?,
    })
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn enqueue(&self, ev: OutboxEvent) -> StoreResult<StoredEvent> {
        // The no-op DO UPDATE makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(
            r#"
            INSERT INTO event_outbox
                (id, tenant_id, event_type, event_version, payload, correlation_id, idempotency_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (tenant_id, idempotency_key)
            DO UPDATE SET idempotency_key = EXCLUDED.idempotency_key
            RETURNING id, tenant_id, event_type, event_version, payload, correlation_id,
                      idempotency_key, created_at, published_at
            "#,
        )
        .bind(ev.event_id.0)
        .bind(&ev.tenant_id)
        .bind(&ev.event_type)
        .bind(&ev.event_version)
        .bind(&ev.payload)
        .bind(&ev.correlation_id)
        .bind(&ev.idempotency_key)
        .fetch_one(&self.pool)
        .await?;

        event_from_row(&row)
    }

    async fn list_pending_net_pay_events(&self, limit: i64) -> StoreResult<Vec<StoredEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, event_type, event_version, payload, correlation_id,
                   idempotency_key, created_at, published_at
            FROM event_outbox
            WHERE event_type = $1
              AND published_at IS NULL
            ORDER BY created_at ASC, id ASC
            LIMIT $2
            "#,
        )
        .bind(NET_PAY_DISBURSEMENT_REQUESTED)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(event_from_row).collect()
    }

    async fn mark_published(&self, event_id: EventId) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE event_outbox
            SET published_at = NOW()
            WHERE id = $1
              AND published_at IS NULL
            "#,
        )
        .bind(event_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct PgConsumptionLog {
    pool: PgPool,
    lease: LeasePolicy,
}

impl PgConsumptionLog {
    pub fn new(pool: PgPool, lease: LeasePolicy) -> Self {
        Self { pool, lease }
    }

    fn lease_seconds(&self) -> f64 {
        self.lease.ttl.num_milliseconds() as f64 / 1000.0
    }
}

#[async_trait]
impl ConsumptionLog for PgConsumptionLog {
    async fn acquire(&self, consumer_name: &str, event: &StoredEvent) -> StoreResult<Acquisition> {
        // Single conditional upsert: the unique key on (consumer_name, event_id)
        // is the mutual-exclusion point between worker processes.
        let taken = sqlx::query(
            r#"
            INSERT INTO event_consumption_log
                (consumer_name, event_id, tenant_id, event_type, status, attempt_count,
                 last_attempt_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'processing', 1, NOW(), NOW(), NOW())
            ON CONFLICT (consumer_name, event_id)
            DO UPDATE SET
              status = 'processing',
              attempt_count = event_consumption_log.attempt_count + 1,
              last_attempt_at = NOW(),
              updated_at = NOW()
            WHERE event_consumption_log.status = 'failed'
               OR (event_consumption_log.status = 'processing'
                   AND ($5::float8 <= 0
                        OR event_consumption_log.last_attempt_at < NOW() - make_interval(secs => $5::float8)))
            RETURNING attempt_count
            "#,
        )
        .bind(consumer_name)
        .bind(event.event_id.0)
        .bind(&event.tenant_id)
        .bind(&event.event_type)
        .bind(self.lease_seconds())
        .fetch_optional(&self.pool)
        .await?;

        if taken.is_some() {
            return Ok(Acquisition::Acquired);
        }

        let row = sqlx::query(
            r#"
            SELECT status
            FROM event_consumption_log
            WHERE consumer_name = $1
              AND event_id = $2
            "#,
        )
        .bind(consumer_name)
        .bind(event.event_id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::InvalidValue(format!("consumption row vanished for event {}", event.event_id)))?;

        match ConsumptionStatus::parse(&row.try_get::<String, _>("status")?)? {
            ConsumptionStatus::Succeeded => Ok(Acquisition::AlreadySucceeded),
            // lost the race to a concurrent acquirer
            ConsumptionStatus::Processing | ConsumptionStatus::Failed => Ok(Acquisition::HeldElsewhere),
        }
    }

    async fn mark_succeeded(&self, consumer_name: &str, event_id: EventId) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE event_consumption_log
            SET status = 'succeeded',
                processed_at = NOW(),
                last_attempt_at = NOW(),
                updated_at = NOW(),
                last_error = NULL
            WHERE consumer_name = $1
              AND event_id = $2
            "#,
        )
        .bind(consumer_name)
        .bind(event_id.0)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, consumer_name: &str, event_id: EventId, error_message: &str) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE event_consumption_log
            SET status = 'failed',
                last_error = $3,
                last_attempt_at = NOW(),
                updated_at = NOW()
            WHERE consumer_name = $1
              AND event_id = $2
              AND status <> 'succeeded'
            "#,
        )
        .bind(consumer_name)
        .bind(event_id.0)
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, consumer_name: &str, event_id: EventId) -> StoreResult<Option<ConsumptionRecord>> {
        let row = sqlx::query(
            r#"
            SELECT consumer_name, event_id, tenant_id, event_type, status, attempt_count,
                   last_attempt_at, last_error, processed_at
            FROM event_consumption_log
            WHERE consumer_name = $1
              AND event_id = $2
            "#,
        )
        .bind(consumer_name)
        .bind(event_id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        Ok(Some(ConsumptionRecord {
            consumer_name: r.try_get::<String, _>("consumer_name")?,
            event_id: EventId(r.try_get::<Uuid, _>("event_id")?),
            tenant_id: r.try_get::<String, _>("tenant_id")?,
            event_type: r.try_get::<String, _>("event_type")?,
            status: ConsumptionStatus::parse(&r.try_get::<String, _>("status")?)?,
            attempt_count: r.try_get::<i32, _>("attempt_count")?,
            last_attempt_at: r.try_get::<DateTime<Utc>, _>("last_attempt_at")?,
            last_error: r.try_get::<Option<String>, _>("last_error")?,
            processed_at: r.try_get::<Option<DateTime<Utc>>, _>("processed_at")?,
        }))
    }
}
