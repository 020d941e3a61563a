pub mod config;
pub mod disbursement;
pub mod http;

pub use config::MetricsConfig;
pub use disbursement::DisbursementMetrics;
pub use http::MetricsServer;
