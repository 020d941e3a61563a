pub mod config;
pub mod consumption;
pub mod db;
pub mod errors;
pub mod eversend;
pub mod ids;
pub mod manual;
pub mod model;
pub mod money;
pub mod outbox;
pub mod payout;
pub mod producer;
pub mod provider;
pub mod repo;
pub mod store;
pub mod worker;

pub use config::WorkerConfig;
pub use consumption::{Acquisition, ConsumptionLog, LeasePolicy};
pub use db::Db;
pub use errors::{ConfigError, EventError, MoneyError, PayoutError, StoreError, StoreResult};
pub use eversend::{EversendConfig, EversendGateway};
pub use ids::EventId;
pub use manual::ManualPayoutGateway;
pub use model::{ConsumptionRecord, ConsumptionStatus, LineItem, NetPayDisbursementRequestedPayload, OutboxEvent, StoredEvent};
pub use money::{CurrencyCode, Money};
pub use outbox::OutboxStore;
pub use payout::{PayoutGateway, PayoutReceipt, PayoutRequest, PayoutStatus, QuotationReceipt, QuotationRequest};
pub use producer::{FinalizedPayrollRun, PayrollFinalizer};
pub use provider::{select_provider, ProviderConfig, ProviderKind, ProviderSelection};
pub use repo::{PgConsumptionLog, PgOutboxStore};
pub use store::InMemoryStore;
pub use worker::{BatchReport, DisbursementWorker};
