use std::{sync::Arc, time::Duration};

use curra_disbursement::BatchReport;
use curra_metrics::DisbursementMetrics;

use crate::dispatch::TickMetrics;

pub fn disbursement_metrics(namespace: &'static str) -> Arc<dyn TickMetrics> {
    Arc::new(WorkerDisbursementMetrics {
        inner: DisbursementMetrics::new(namespace),
    })
}

struct WorkerDisbursementMetrics {
    inner: DisbursementMetrics,
}

impl TickMetrics for WorkerDisbursementMetrics {
    fn batch_completed(&self, report: &BatchReport, elapsed: Duration) {
        self.inner.events("processed", report.processed.into());
        self.inner.events("skipped", report.skipped.into());
        self.inner.events("failed", report.failed.into());
        self.inner.batch_seconds(elapsed.as_secs_f64());
    }
    fn tick_skipped(&self) {
        self.inner.tick_skipped();
    }
    fn storage_error(&self) {
        self.inner.storage_error();
    }
}
