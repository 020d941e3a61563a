use metrics::{counter, histogram};

/// Metric set for the net-pay disbursement worker.
#[derive(Clone, Debug)]
pub struct DisbursementMetrics {
    ns: &'static str,
}

impl DisbursementMetrics {
    pub fn new(namespace: &'static str) -> Self {
        Self { ns: namespace }
    }

    /// `outcome` is one of processed, skipped, failed.
    pub fn events(&self, outcome: &'static str, n: u64) {
        if n == 0 {
            return;
        }
        counter!(format!("{}_disbursement_events_total", self.ns), "outcome" => outcome).increment(n);
    }

    pub fn batch_seconds(&self, seconds: f64) {
        histogram!(format!("{}_disbursement_batch_seconds", self.ns)).record(seconds);
    }

    /// A tick fired while the previous one was still running.
    #[inline]
    pub fn tick_skipped(&self) {
        counter!(format!("{}_disbursement_ticks_skipped_total", self.ns)).increment(1);
    }

    #[inline]
    pub fn storage_error(&self) {
        counter!(format!("{}_disbursement_storage_errors_total", self.ns)).increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusBuilder;

    #[test]
    fn counters_render_with_namespace_and_outcome() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let m = DisbursementMetrics::new("curra");
            m.events("processed", 2);
            m.events("failed", 1);
            m.events("skipped", 0);
            m.tick_skipped();
            m.storage_error();
        });

        let out = handle.render();
        assert!(out.contains(r#"curra_disbursement_events_total{outcome="processed"} 2"#));
        assert!(out.contains(r#"curra_disbursement_events_total{outcome="failed"} 1"#));
        assert!(!out.contains(r#"outcome="skipped""#));
        assert!(out.contains("curra_disbursement_ticks_skipped_total 1"));
        assert!(out.contains("curra_disbursement_storage_errors_total 1"));
    }
}
