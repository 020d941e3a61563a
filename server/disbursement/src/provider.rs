use serde_json::{json, Value as Json};
use std::{fmt, sync::Arc};

use crate::{
    errors::ConfigError,
    eversend::{EversendConfig, EversendGateway},
    manual::ManualPayoutGateway,
    payout::PayoutGateway,
};

pub const DEFAULT_PROVIDER: &str = "eversend";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    Manual,
    Eversend,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => ManualPayoutGateway::NAME,
            Self::Eversend => EversendGateway::NAME,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Raw provider name, e.g. from `CURRA_PAYOUT_PROVIDER`.
    pub provider: String,
    /// Strict: bad provider config fails startup. Otherwise fall back to manual.
    pub strict: bool,
    pub eversend: EversendConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_PROVIDER.to_string(),
            strict: false,
            eversend: EversendConfig::default(),
        }
    }
}

pub struct ProviderSelection {
    pub kind: ProviderKind,
    pub gateway: Arc<dyn PayoutGateway>,
    pub meta: Json,
}

impl ProviderSelection {
    pub fn is_degraded(&self) -> bool {
        self.meta.get("degraded").and_then(Json::as_bool).unwrap_or(false)
    }

    fn manual(meta: Json) -> Self {
        Self {
            kind: ProviderKind::Manual,
            gateway: Arc::new(ManualPayoutGateway::new()),
            meta,
        }
    }
}

/// Pick the payout gateway once, at startup.
pub fn select_provider(cfg: &ProviderConfig) -> Result<ProviderSelection, ConfigError> {
    let name = cfg.provider.trim().to_ascii_lowercase();

    let problem = match name.as_str() {
        "manual" => return Ok(ProviderSelection::manual(json!({ "mode": "stub" }))),
        "eversend" => match cfg.eversend.missing_credential() {
            None => {
                let gw = EversendGateway::new(cfg.eversend.clone())?;
                let meta = json!({ "baseUrl": gw.base_url() });
                return Ok(ProviderSelection {
                    kind: ProviderKind::Eversend,
                    gateway: Arc::new(gw),
                    meta,
                });
            }
            Some(setting) => ConfigError::MissingSetting(setting),
        },
        _ => ConfigError::UnsupportedProvider(name.clone()),
    };

    if cfg.strict {
        return Err(problem);
    }

    Ok(ProviderSelection::manual(json!({
        "mode": "stub",
        "degraded": true,
        "requested": name,
        "reason": problem.to_string(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(provider: &str, strict: bool) -> ProviderConfig {
        ProviderConfig {
            provider: provider.to_string(),
            strict,
            eversend: EversendConfig::default(),
        }
    }

    fn eversend_ready() -> EversendConfig {
        EversendConfig {
            client_id: "id".into(),
            client_secret: "secret".into(),
            webhook_secret: "wh".into(),
            ..EversendConfig::default()
        }
    }

    #[test]
    fn manual_is_selected_case_insensitively() {
        let sel = select_provider(&cfg("  Manual ", true)).unwrap();
        assert_eq!(sel.kind, ProviderKind::Manual);
        assert_eq!(sel.gateway.name(), "manual");
        assert_eq!(sel.meta, json!({ "mode": "stub" }));
        assert!(!sel.is_degraded());
    }

    #[test]
    fn eversend_with_credentials() {
        let sel = select_provider(&ProviderConfig {
            provider: "EVERSEND".into(),
            strict: true,
            eversend: eversend_ready(),
        })
        .unwrap();
        assert_eq!(sel.kind, ProviderKind::Eversend);
        assert_eq!(sel.meta["baseUrl"], "https://api.eversend.co/v1");
    }

    #[test]
    fn strict_mode_rejects_unsupported_provider() {
        let err = select_provider(&cfg("unsupported", true)).err().unwrap();
        assert!(matches!(err, ConfigError::UnsupportedProvider(ref n) if n == "unsupported"));
        assert!(err.to_string().contains("Unsupported payout provider"));
    }

    #[test]
    fn strict_mode_rejects_missing_credentials() {
        let err = select_provider(&cfg("eversend", true)).err().unwrap();
        assert!(matches!(err, ConfigError::MissingSetting("EVERSEND_CLIENT_ID")));
    }

    #[test]
    fn permissive_mode_degrades_to_manual() {
        let sel = select_provider(&cfg("eversend", false)).unwrap();
        assert_eq!(sel.kind, ProviderKind::Manual);
        assert!(sel.is_degraded());
        assert_eq!(sel.meta["requested"], "eversend");
        assert_eq!(sel.meta["reason"], "EVERSEND_CLIENT_ID is required.");

        let sel = select_provider(&cfg("paypal", false)).unwrap();
        assert_eq!(sel.kind, ProviderKind::Manual);
        assert!(sel.is_degraded());
    }
}
