use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;
pub type PayoutResult<T> = Result<T, PayoutError>;
pub type MoneyResult<T> = Result<T, MoneyError>;

/// Storage-layer failure. Fatal to the batch that hit it.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid stored value: {0}")]
    InvalidValue(String),

    #[error("storage unavailable: {0}")]
    Unavailable(&'static str),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("amount overflow")]
    Overflow,

    #[error("amount must be a positive integer minor unit value, got {0}")]
    NotPositive(i64),
}

/// Gateway failure. Everything that went wrong on the wire collapses into
/// `Provider`; `InvalidRequest` is raised before any I/O.
#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("invalid payout request: {0}")]
    InvalidRequest(String),

    #[error("{operation} failed with status {}: {body}", display_status(.status))]
    Provider {
        operation: &'static str,
        status: Option<u16>,
        body: String,
    },
}

impl PayoutError {
    pub fn provider(operation: &'static str, status: Option<u16>, body: impl Into<String>) -> Self {
        Self::Provider { operation, status, body: body.into() }
    }

    pub fn is_credential_rejection(&self) -> bool {
        matches!(self, Self::Provider { status: Some(401 | 403), .. })
    }
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    }
}

impl From<MoneyError> for PayoutError {
    fn from(e: MoneyError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

/// Startup configuration failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unsupported payout provider '{0}'. Set CURRA_PAYOUT_PROVIDER=eversend|manual.")]
    UnsupportedProvider(String),

    #[error("{0} is required.")]
    MissingSetting(&'static str),

    #[error("http client: {0}")]
    HttpClient(String),
}

/// Per-event failure. Recorded on the consumption log and never propagated.
#[derive(Error, Debug)]
pub enum EventError {
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Payout(#[from] PayoutError),
}
