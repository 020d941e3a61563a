use chrono::{DateTime, Duration, Utc};

use crate::{
    errors::StoreResult,
    ids::EventId,
    model::{ConsumptionRecord, ConsumptionStatus, StoredEvent},
};

/// Result of trying to take the processing lease for an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquisition {
    /// The caller owns the event for this attempt.
    Acquired,
    /// A previous attempt finished; only the outbox marker is left to set.
    AlreadySucceeded,
    /// Another worker took the lease and it has not gone stale yet.
    HeldElsewhere,
}

/// How long a `processing` lease protects an event before another
/// acquirer may take it over. Zero means it never does.
#[derive(Clone, Copy, Debug)]
pub struct LeasePolicy {
    pub ttl: Duration,
}

impl LeasePolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    pub fn unguarded() -> Self {
        Self { ttl: Duration::zero() }
    }

    /// Decide the transition for an existing row. `None` means "take it".
    pub fn classify(&self, status: ConsumptionStatus, last_attempt_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<Acquisition> {
        match status {
            ConsumptionStatus::Succeeded => Some(Acquisition::AlreadySucceeded),
            ConsumptionStatus::Failed => None,
            ConsumptionStatus::Processing => {
                if self.ttl > Duration::zero() && now - last_attempt_at < self.ttl {
                    Some(Acquisition::HeldElsewhere)
                } else {
                    None
                }
            }
        }
    }
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self::new(Duration::minutes(15))
    }
}

/// Processing-state ledger keyed by `(consumer_name, event_id)`.
///
/// States: absent -> processing -> {succeeded, failed}; failed -> processing.
/// `succeeded` is terminal. Owned by the worker subsystem.
#[async_trait::async_trait]
pub trait ConsumptionLog: Send + Sync {
    async fn acquire(&self, consumer_name: &str, event: &StoredEvent) -> StoreResult<Acquisition>;

    async fn mark_succeeded(&self, consumer_name: &str, event_id: EventId) -> StoreResult<()>;

    async fn mark_failed(&self, consumer_name: &str, event_id: EventId, error_message: &str) -> StoreResult<()>;

    async fn get(&self, consumer_name: &str, event_id: EventId) -> StoreResult<Option<ConsumptionRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn succeeded_is_terminal_regardless_of_age() {
        let now = Utc::now();
        let p = LeasePolicy::default();
        assert_eq!(
            p.classify(ConsumptionStatus::Succeeded, now - Duration::days(30), now),
            Some(Acquisition::AlreadySucceeded)
        );
    }

    #[test]
    fn failed_is_always_retaken() {
        let now = Utc::now();
        assert_eq!(LeasePolicy::default().classify(ConsumptionStatus::Failed, now, now), None);
    }

    #[test]
    fn fresh_processing_lease_is_held() {
        let now = Utc::now();
        let p = LeasePolicy::new(Duration::seconds(60));
        assert_eq!(
            p.classify(ConsumptionStatus::Processing, now - Duration::seconds(10), now),
            Some(Acquisition::HeldElsewhere)
        );
        assert_eq!(p.classify(ConsumptionStatus::Processing, now - Duration::seconds(61), now), None);
    }

    #[test]
    fn unguarded_policy_retakes_processing() {
        let now = Utc::now();
        assert_eq!(LeasePolicy::unguarded().classify(ConsumptionStatus::Processing, now, now), None);
    }
}
