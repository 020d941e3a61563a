use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::{task::JoinHandle, time::sleep};
use tracing::{debug, error, info, warn};

use curra_disbursement::{BatchReport, ConsumptionLog, DisbursementWorker, OutboxStore, WorkerConfig};

pub trait TickMetrics: Send + Sync {
    fn batch_completed(&self, report: &BatchReport, elapsed: Duration);
    fn tick_skipped(&self);
    fn storage_error(&self);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Ran(BatchReport),
    /// Previous tick still running.
    Skipped,
    StorageError,
}

/// Delay before the next tick. Grows while ticks keep failing.
#[derive(Clone, Debug)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failing_ticks: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failing_ticks: 0,
        }
    }

    pub fn observe(&mut self, outcome: &TickOutcome) {
        match outcome {
            TickOutcome::Ran(r) if r.failed == 0 => self.failing_ticks = 0,
            TickOutcome::Ran(_) | TickOutcome::StorageError => {
                self.failing_ticks = self.failing_ticks.saturating_add(1)
            }
            TickOutcome::Skipped => {}
        }
    }

    /// Un-jittered delay: base * 2^(n-1) for n consecutive failing ticks, capped.
    pub fn ceiling(&self) -> Duration {
        if self.failing_ticks == 0 {
            return self.base;
        }
        let exp = (self.failing_ticks - 1).min(20);
        self.base.saturating_mul(1u32 << exp).min(self.max)
    }

    pub fn next_delay(&self) -> Duration {
        if self.failing_ticks == 0 {
            return self.base;
        }
        // +/- 20%
        let factor = 0.8 + 0.4 * rand::random::<f64>();
        self.ceiling().mul_f64(factor)
    }
}

pub struct Dispatcher<O, C> {
    worker: Arc<DisbursementWorker<O, C>>,
    metrics: Arc<dyn TickMetrics>,
    in_flight: Arc<AtomicBool>,
    batch_size: i64,
    poll_interval: Duration,
    backoff_max: Duration,
}

impl<O, C> Clone for Dispatcher<O, C> {
    fn clone(&self) -> Self {
        Self {
            worker: self.worker.clone(),
            metrics: self.metrics.clone(),
            in_flight: self.in_flight.clone(),
            batch_size: self.batch_size,
            poll_interval: self.poll_interval,
            backoff_max: self.backoff_max,
        }
    }
}

impl<O, C> Dispatcher<O, C>
where
    O: OutboxStore + 'static,
    C: ConsumptionLog + 'static,
{
    pub fn new(worker: DisbursementWorker<O, C>, metrics: Arc<dyn TickMetrics>, cfg: &WorkerConfig) -> Self {
        Self {
            worker: Arc::new(worker),
            metrics,
            in_flight: Arc::new(AtomicBool::new(false)),
            batch_size: cfg.batch_size,
            poll_interval: cfg.poll_interval,
            backoff_max: cfg.backoff_max,
        }
    }

    /// One batch, unless another is already running on this instance.
    pub async fn run_tick(&self) -> TickOutcome {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            self.metrics.tick_skipped();
            debug!("previous disbursement tick still running; skipping");
            return TickOutcome::Skipped;
        }
        let flag = self.in_flight.clone();
        let _reset = scopeguard::guard((), move |_| flag.store(false, Ordering::Release));

        let started = Instant::now();
        match self.worker.process_batch(self.batch_size).await {
            Ok(report) => {
                self.metrics.batch_completed(&report, started.elapsed());
                if !report.is_idle() {
                    info!(
                        consumer = %self.worker.consumer_name(),
                        processed = report.processed,
                        skipped = report.skipped,
                        failed = report.failed,
                        "disbursement tick"
                    );
                }
                TickOutcome::Ran(report)
            }
            Err(e) => {
                self.metrics.storage_error();
                error!("disbursement batch aborted: {}", e);
                TickOutcome::StorageError
            }
        }
    }

    /// Fires a tick every poll interval (longer while ticks fail) until
    /// `shutdown` resolves, then waits for the tick in flight.
    pub async fn run_polling<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut backoff = Backoff::new(self.poll_interval, self.backoff_max);
        let mut pending: Option<JoinHandle<TickOutcome>> = None;
        let mut delay = Duration::ZERO;

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = sleep(delay) => {}
            }

            if pending.as_ref().is_some_and(JoinHandle::is_finished) {
                if let Some(done) = pending.take() {
                    match done.await {
                        Ok(outcome) => backoff.observe(&outcome),
                        Err(e) => warn!("disbursement tick task failed: {}", e),
                    }
                }
            }

            let d = self.clone();
            let tick = tokio::spawn(async move { d.run_tick().await });
            // a tick spawned over a running one only trips the guard
            if pending.is_none() {
                pending = Some(tick);
            }

            delay = backoff.next_delay();
            if delay > self.poll_interval {
                debug!(delay_ms = delay.as_millis() as u64, "backing off after failing ticks");
            }
        }

        if let Some(running) = pending {
            info!("waiting for in-flight disbursement tick");
            if let Err(e) = running.await {
                warn!("disbursement tick task failed: {}", e);
            }
        }
    }
}
