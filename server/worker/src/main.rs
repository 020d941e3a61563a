mod config;
mod dispatch;
mod metrics_adapter;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;

use curra_disbursement::{select_provider, Db, DisbursementWorker, PgConsumptionLog, PgOutboxStore};
use curra_metrics::{MetricsConfig, MetricsServer};

use crate::config::{Config, Mode};
use crate::dispatch::{Dispatcher, TickOutcome};
use crate::metrics_adapter::disbursement_metrics;

const METRICS_NAMESPACE: &str = "curra";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let cfg = Config::parse();
    let worker_cfg = cfg.worker();

    // Provider first: strict mode must fail before touching the database.
    let selection = select_provider(&cfg.provider()).context("payout provider")?;
    if selection.is_degraded() {
        warn!(provider = %selection.kind, meta = %selection.meta, "payout provider unavailable; recording payouts for manual execution");
    } else {
        info!(provider = %selection.kind, meta = %selection.meta, "payout provider selected");
    }

    if let Some(listen) = cfg.metrics_listen.clone() {
        let ms = MetricsServer::install(MetricsConfig {
            listen,
            namespace: METRICS_NAMESPACE,
        })?;
        tokio::spawn(async move {
            if let Err(e) = ms.serve().await {
                warn!("metrics server stopped: {:#}", e);
            }
        });
    }

    let db = Db::connect(&cfg.database_url, cfg.db_max_connections)
        .await
        .context("connect postgres")?;
    db.migrate().await.context("migrate")?;

    let worker = DisbursementWorker::new(
        PgOutboxStore::new(db.pool.clone()),
        PgConsumptionLog::new(db.pool.clone(), worker_cfg.lease),
        selection.gateway,
        worker_cfg.consumer_name.clone(),
    );
    let dispatcher = Dispatcher::new(worker, disbursement_metrics(METRICS_NAMESPACE), &worker_cfg);

    match cfg.mode {
        Mode::Oneshot => {
            let outcome = dispatcher.run_tick().await;
            db.close().await;
            if outcome == TickOutcome::StorageError {
                bail!("one-shot disbursement batch hit a storage error");
            }
            info!("completed_oneshot");
        }
        Mode::Polling => {
            info!(
                consumer = %worker_cfg.consumer_name,
                poll_interval_ms = worker_cfg.poll_interval.as_millis() as u64,
                batch_size = worker_cfg.batch_size,
                lease_ttl_s = worker_cfg.lease.ttl.num_seconds(),
                "disbursement worker ready"
            );
            dispatcher
                .run_polling(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!("ctrl-c handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                    info!("shutdown");
                })
                .await;
            db.close().await;
        }
    }

    Ok(())
}
