use clap::{Parser, ValueEnum};
use std::time::Duration;

use curra_disbursement::{config::DEFAULT_CONSUMER_NAME, EversendConfig, LeasePolicy, ProviderConfig, WorkerConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Poll on a fixed interval until interrupted
    Polling,
    /// Run one batch and exit
    Oneshot,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "curra-worker", about = "Net pay disbursement worker")]
pub struct Config {
    /// Postgres connection string
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "CURRA_DB_MAX_CONNECTIONS", default_value_t = 8)]
    pub db_max_connections: u32,

    #[arg(long, env = "CURRA_WORKER_MODE", value_enum, ignore_case = true, default_value_t = Mode::Polling)]
    pub mode: Mode,

    /// Payout provider: eversend | manual
    #[arg(long, env = "CURRA_PAYOUT_PROVIDER", default_value = "eversend")]
    pub payout_provider: String,

    /// Fail startup on bad provider config instead of degrading to manual payouts
    #[arg(long, env = "CURRA_REQUIRE_EXTERNALS", default_value_t = false, action = clap::ArgAction::Set)]
    pub require_externals: bool,

    #[arg(long, env = "CURRA_DISBURSEMENT_CONSUMER_NAME", default_value = DEFAULT_CONSUMER_NAME)]
    pub consumer_name: String,

    #[arg(long, env = "CURRA_DISBURSEMENT_POLL_INTERVAL_MS", default_value_t = 5_000)]
    pub poll_interval_ms: u64,

    /// Max events per batch
    #[arg(long, env = "CURRA_DISBURSEMENT_BATCH_SIZE", default_value_t = 20)]
    pub batch_size: i64,

    /// How long a processing lease blocks other workers; 0 disables the guard
    #[arg(long, env = "CURRA_DISBURSEMENT_LEASE_TTL_S", default_value_t = 900)]
    pub lease_ttl_s: i64,

    /// Cap for the delay after consecutive failing ticks
    #[arg(long, env = "CURRA_DISBURSEMENT_BACKOFF_MAX_MS", default_value_t = 300_000)]
    pub backoff_max_ms: u64,

    #[arg(long, env = "EVERSEND_BASE_URL", default_value = curra_disbursement::eversend::DEFAULT_BASE_URL)]
    pub eversend_base_url: String,

    #[arg(long, env = "EVERSEND_CLIENT_ID", default_value = "", hide_env_values = true)]
    pub eversend_client_id: String,

    #[arg(long, env = "EVERSEND_CLIENT_SECRET", default_value = "", hide_env_values = true)]
    pub eversend_client_secret: String,

    #[arg(long, env = "EVERSEND_WEBHOOK_SECRET", default_value = "", hide_env_values = true)]
    pub eversend_webhook_secret: String,

    /// Wallet used when an event carries none
    #[arg(long, env = "EVERSEND_SOURCE_WALLET", default_value = "")]
    pub eversend_source_wallet: String,

    #[arg(long, env = "EVERSEND_TIMEOUT_MS", default_value_t = 15_000)]
    pub eversend_timeout_ms: u64,

    /// Prometheus scrape address, e.g. 0.0.0.0:9100 (disabled if unset)
    #[arg(long, env = "CURRA_METRICS_LISTEN")]
    pub metrics_listen: Option<String>,
}

impl Config {
    pub fn provider(&self) -> ProviderConfig {
        let wallet = self.eversend_source_wallet.trim();
        ProviderConfig {
            provider: self.payout_provider.clone(),
            strict: self.require_externals,
            eversend: EversendConfig {
                base_url: self.eversend_base_url.clone(),
                client_id: self.eversend_client_id.clone(),
                client_secret: self.eversend_client_secret.clone(),
                webhook_secret: self.eversend_webhook_secret.clone(),
                source_wallet_default: (!wallet.is_empty()).then(|| wallet.to_string()),
                timeout: Duration::from_millis(self.eversend_timeout_ms),
            },
        }
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            consumer_name: self.consumer_name.clone(),
            batch_size: self.batch_size.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            lease: LeasePolicy::new(chrono::Duration::seconds(self.lease_ttl_s.max(0))),
            backoff_max: Duration::from_millis(self.backoff_max_ms.max(self.poll_interval_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_contract() {
        let cfg = Config::try_parse_from(["curra-worker", "--database-url", "postgres://localhost/curra"]).unwrap();
        assert_eq!(cfg.mode, Mode::Polling);
        assert_eq!(cfg.payout_provider, "eversend");
        assert!(!cfg.require_externals);

        let w = cfg.worker();
        assert_eq!(w.consumer_name, "netpay-disbursement-worker");
        assert_eq!(w.batch_size, 20);
        assert_eq!(w.poll_interval, Duration::from_millis(5_000));
        assert_eq!(w.lease.ttl, chrono::Duration::seconds(900));

        let p = cfg.provider();
        assert!(!p.strict);
        assert_eq!(p.eversend.base_url, "https://api.eversend.co/v1");
        assert_eq!(p.eversend.source_wallet_default, None);
        assert_eq!(p.eversend.timeout, Duration::from_millis(15_000));
    }

    #[test]
    fn flags_override_defaults() {
        let cfg = Config::try_parse_from([
            "curra-worker",
            "--database-url",
            "postgres://db/curra",
            "--mode",
            "ONESHOT",
            "--payout-provider",
            "manual",
            "--require-externals",
            "true",
            "--eversend-source-wallet",
            " UGX ",
            "--batch-size",
            "0",
        ])
        .unwrap();
        assert_eq!(cfg.mode, Mode::Oneshot);
        assert!(cfg.provider().strict);
        assert_eq!(cfg.provider().eversend.source_wallet_default.as_deref(), Some("UGX"));
        assert_eq!(cfg.worker().batch_size, 1);
    }
}
