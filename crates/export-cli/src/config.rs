//! Environment Configuration

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCliConfig {
    /// REST root, e.g. `https://shop.example/wp-json`
    pub api_base: String,

    pub api_nonce: Option<String>,

    /// Creation endpoint relative to `api_base`, filters included
    pub export_request_path: String,

    /// Availability endpoint relative to `api_base`
    pub availability_endpoint: String,

    pub user_email: Option<String>,

    pub export_dir: PathBuf,

    pub poll_interval: Duration,
}

impl ExportCliConfig {
    /// Load from `WCPAY_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.is_empty())
                .with_context(|| format!("{key} not set"))
        };
        let optional = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let poll_interval_ms = match optional("WCPAY_EXPORT_POLL_INTERVAL_MS") {
            Some(ms) => ms
                .parse()
                .with_context(|| format!("WCPAY_EXPORT_POLL_INTERVAL_MS '{ms}' is not a number"))?,
            None => DEFAULT_POLL_INTERVAL_MS,
        };

        Ok(Self {
            api_base: required("WCPAY_API_BASE")?,
            api_nonce: optional("WCPAY_API_NONCE"),
            export_request_path: required("WCPAY_EXPORT_REQUEST_PATH")?,
            availability_endpoint: required("WCPAY_EXPORT_AVAILABILITY_ENDPOINT")?,
            user_email: optional("WCPAY_EXPORT_USER_EMAIL"),
            export_dir: optional("WCPAY_EXPORT_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from),
            poll_interval: Duration::from_millis(poll_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("WCPAY_API_BASE", "https://shop.example/wp-json"),
        ("WCPAY_EXPORT_REQUEST_PATH", "/wc/v3/payments/transactions/download"),
        ("WCPAY_EXPORT_AVAILABILITY_ENDPOINT", "/wc/v3/payments/transactions/download"),
    ];

    #[test]
    fn test_defaults() {
        let vars = env(&REQUIRED);
        let config = ExportCliConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.api_nonce, None);
        assert_eq!(config.user_email, None);
        assert_eq!(config.export_dir, PathBuf::from("."));
        assert_eq!(config.poll_interval, Duration::from_millis(1000));
    }

    #[test]
    fn test_overrides() {
        let mut vars = env(&REQUIRED);
        vars.extend(env(&[
            ("WCPAY_API_NONCE", "n0nce"),
            ("WCPAY_EXPORT_USER_EMAIL", "owner@shop.example"),
            ("WCPAY_EXPORT_DIR", "/tmp/exports"),
            ("WCPAY_EXPORT_POLL_INTERVAL_MS", "250"),
        ]));
        let config = ExportCliConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.api_nonce.as_deref(), Some("n0nce"));
        assert_eq!(config.user_email.as_deref(), Some("owner@shop.example"));
        assert_eq!(config.export_dir, PathBuf::from("/tmp/exports"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_and_invalid() {
        let vars = env(&REQUIRED[..2]);
        let err = ExportCliConfig::from_lookup(|k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("WCPAY_EXPORT_AVAILABILITY_ENDPOINT"));

        let mut vars = env(&REQUIRED);
        vars.insert("WCPAY_EXPORT_POLL_INTERVAL_MS".into(), "soon".into());
        assert!(ExportCliConfig::from_lookup(|k| vars.get(k).cloned()).is_err());
    }
}
