use reqwest::{Client, Response};
use ring::hmac;
use serde::Deserialize;
use serde_json::{json, Value as Json};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    errors::{ConfigError, PayoutError, PayoutResult},
    money::ensure_positive_minor,
    payout::{PayoutGateway, PayoutReceipt, PayoutRequest, PayoutStatus, QuotationReceipt, QuotationRequest},
};

pub const DEFAULT_BASE_URL: &str = "https://api.eversend.co/v1";

const OP_TOKEN: &str = "Eversend token request";
const OP_QUOTATION: &str = "Eversend payout quotation";
const OP_PAYOUT: &str = "Eversend payout";

#[derive(Clone, Debug)]
pub struct EversendConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub webhook_secret: String,
    pub source_wallet_default: Option<String>,
    pub timeout: Duration,
}

impl Default for EversendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            webhook_secret: String::new(),
            source_wallet_default: None,
            timeout: Duration::from_millis(15_000),
        }
    }
}

impl EversendConfig {
    /// First credential that is blank, named by its environment variable.
    pub fn missing_credential(&self) -> Option<&'static str> {
        if self.client_id.trim().is_empty() {
            Some("EVERSEND_CLIENT_ID")
        } else if self.client_secret.trim().is_empty() {
            Some("EVERSEND_CLIENT_SECRET")
        } else if self.webhook_secret.trim().is_empty() {
            Some("EVERSEND_WEBHOOK_SECRET")
        } else {
            None
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenEnvelope {
    Wrapped { data: TokenBody },
    Bare(TokenBody),
}

#[derive(Deserialize)]
struct TokenBody {
    #[serde(default)]
    token: Option<String>,
}

/// Eversend remittance API adapter.
///
/// The bearer token is fetched once and reused. Eversend does not tell us when
/// it expires, so any 401/403 drops the cached token and the next call
/// authenticates again.
pub struct EversendGateway {
    cfg: EversendConfig,
    http: Client,
    token: RwLock<Option<String>>,
}

impl EversendGateway {
    pub const NAME: &'static str = "eversend";

    pub fn new(mut cfg: EversendConfig) -> Result<Self, ConfigError> {
        cfg.base_url = cfg.base_url.trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            cfg,
            http,
            token: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.cfg.base_url
    }

    async fn token(&self) -> PayoutResult<String> {
        if let Some(t) = self.token.read().await.as_ref() {
            return Ok(t.clone());
        }

        let mut slot = self.token.write().await;
        // another caller may have filled it while we waited
        if let Some(t) = slot.as_ref() {
            return Ok(t.clone());
        }

        let resp = self
            .http
            .get(format!("{}/auth/token", self.cfg.base_url))
            .header("clientid", &self.cfg.client_id)
            .header("clientsecret", &self.cfg.client_secret)
            .send()
            .await
            .map_err(|e| transport(OP_TOKEN, e))?;
        let body = read_ok(OP_TOKEN, resp).await?;

        let token = match serde_json::from_value::<TokenEnvelope>(body) {
            Ok(TokenEnvelope::Wrapped { data }) => data.token,
            Ok(TokenEnvelope::Bare(b)) => b.token,
            Err(_) => None,
        }
        .filter(|t| !t.is_empty())
        .ok_or_else(|| PayoutError::provider(OP_TOKEN, None, "Eversend token response did not include token."))?;

        debug!("eversend token refreshed");
        *slot = Some(token.clone());
        Ok(token)
    }

    async fn post(&self, operation: &'static str, path: &str, body: Json) -> PayoutResult<Json> {
        let token = self.token().await?;
        let resp = self
            .http
            .post(format!("{}{}", self.cfg.base_url, path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport(operation, e))?;

        match read_ok(operation, resp).await {
            Err(e) if e.is_credential_rejection() => {
                warn!(operation, "eversend rejected credentials; dropping cached token");
                *self.token.write().await = None;
                Err(e)
            }
            other => other,
        }
    }

    fn source_wallet(&self, requested: Option<&str>, operation: &'static str) -> PayoutResult<String> {
        non_blank(requested)
            .or_else(|| non_blank(self.cfg.source_wallet_default.as_deref()))
            .map(str::to_string)
            .ok_or_else(|| PayoutError::InvalidRequest(format!("sourceWallet is required for {operation}.")))
    }

    /// HMAC-SHA512 over the raw body, hex encoded, compared in constant time.
    pub fn verify_webhook_signature(&self, raw_body: &[u8], signature_hex: &str) -> bool {
        verify_signature(self.cfg.webhook_secret.as_bytes(), raw_body, signature_hex)
    }
}

pub fn verify_signature(secret: &[u8], raw_body: &[u8], signature_hex: &str) -> bool {
    let signature_hex = signature_hex.trim();
    if signature_hex.is_empty() {
        return false;
    }
    let Ok(tag) = hex::decode(signature_hex) else {
        return false;
    };
    let key = hmac::Key::new(hmac::HMAC_SHA512, secret);
    hmac::verify(&key, raw_body, &tag).is_ok()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn payout_type(network: &str) -> &str {
    match network {
        "mobile_money" => "momo",
        other => other,
    }
}

fn transport(operation: &'static str, e: reqwest::Error) -> PayoutError {
    PayoutError::provider(operation, e.status().map(|s| s.as_u16()), e.to_string())
}

async fn read_ok(operation: &'static str, resp: Response) -> PayoutResult<Json> {
    let status = resp.status();
    let text = resp.text().await.map_err(|e| transport(operation, e))?;
    if !status.is_success() {
        return Err(PayoutError::provider(operation, Some(status.as_u16()), text));
    }
    if text.trim().is_empty() {
        return Ok(Json::Null);
    }
    serde_json::from_str(&text).map_err(|e| {
        PayoutError::provider(operation, Some(status.as_u16()), format!("unreadable response ({e}): {text}"))
    })
}

#[async_trait::async_trait]
impl PayoutGateway for EversendGateway {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn create_payout_quotation(&self, req: &QuotationRequest) -> PayoutResult<QuotationReceipt> {
        ensure_positive_minor(req.amount_minor)?;
        let wallet = self.source_wallet(req.source_wallet.as_deref(), "Eversend payout quotation")?;

        let raw = self
            .post(
                OP_QUOTATION,
                "/payouts/quotation",
                json!({
                    "sourceWallet": wallet,
                    "amount": req.amount_minor,
                    "type": payout_type(&req.destination_network),
                    "destinationCountry": req.destination_country_code,
                    "destinationCurrency": req.currency,
                    "amountType": "SOURCE",
                }),
            )
            .await?;
        Ok(QuotationReceipt { provider: Self::NAME, raw })
    }

    async fn create_payout(&self, req: &PayoutRequest) -> PayoutResult<PayoutReceipt> {
        ensure_positive_minor(req.amount_minor)?;
        let wallet = self.source_wallet(req.source_wallet.as_deref(), "Eversend payout")?;

        let raw = self
            .post(
                OP_PAYOUT,
                "/payouts",
                json!({
                    "sourceWallet": wallet,
                    "amount": req.amount_minor,
                    "destinationCurrency": req.currency,
                    "beneficiary": {
                        "name": req.beneficiary_name,
                        "account": req.beneficiary_account,
                        "countryCode": req.beneficiary_country_code,
                    },
                    "reference": req.reference,
                    "metadata": { "idempotencyKey": req.idempotency_key },
                }),
            )
            .await?;
        Ok(PayoutReceipt {
            provider: Self::NAME,
            status: PayoutStatus::Submitted,
            raw,
        })
    }
}
