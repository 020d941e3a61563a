use std::time::Duration;

use crate::consumption::LeasePolicy;

pub const DEFAULT_CONSUMER_NAME: &str = "netpay-disbursement-worker";

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub consumer_name: String,
    pub batch_size: i64,
    pub poll_interval: Duration,
    pub lease: LeasePolicy,
    /// Upper bound on the scheduling delay after failing ticks.
    pub backoff_max: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            consumer_name: DEFAULT_CONSUMER_NAME.to_string(),
            batch_size: 20,
            poll_interval: Duration::from_millis(5_000),
            lease: LeasePolicy::default(),
            backoff_max: Duration::from_millis(300_000),
        }
    }
}
