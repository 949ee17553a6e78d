// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use hec_tls::CertificateValidation;
use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    COLLECTOR_PATH, DEFAULT_BATCH_COUNT, DEFAULT_BATCH_INTERVAL, DEFAULT_BATCH_SIZE_BYTES,
    DEFAULT_REQUEST_TIMEOUT,
};
use crate::error::HecError;

/// How batches reach the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendMode {
    /// One request in flight at a time, in submission order.
    #[default]
    Sequential,
    /// Requests may overlap and be indexed out of order.
    Parallel,
}

impl FromStr for SendMode {
    type Err = HecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sequential" => Ok(Self::Sequential),
            "parallel" => Ok(Self::Parallel),
            other => Err(HecError::UnknownSendMode(other.to_string())),
        }
    }
}

/// Metadata attached to every outgoing event envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventMetadata {
    pub host: Option<String>,
    pub index: Option<String>,
    pub source: Option<String>,
    pub sourcetype: Option<String>,
}

/// Delivery configuration, immutable once the sender is built.
#[derive(Clone)]
pub struct HecConfig {
    /// Collector base url, e.g. `https://splunk.example.com:8088`.
    pub url: String,
    pub token: String,
    /// Timer period; zero disables the timer.
    pub batch_interval: Duration,
    /// Event count threshold; zero means unset.
    pub batch_count: usize,
    /// Estimated size threshold in bytes; zero means unset.
    pub batch_size_bytes: usize,
    pub send_mode: SendMode,
    pub certificate_validation: CertificateValidation,
    pub metadata: EventMetadata,
    /// Resend attempts after a transport failure; zero installs no resend stage.
    pub retries_on_error: u32,
    pub request_timeout: Duration,
}

impl Default for HecConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            token: String::new(),
            batch_interval: DEFAULT_BATCH_INTERVAL,
            batch_count: DEFAULT_BATCH_COUNT,
            batch_size_bytes: DEFAULT_BATCH_SIZE_BYTES,
            send_mode: SendMode::default(),
            certificate_validation: CertificateValidation::default(),
            metadata: EventMetadata::default(),
            retries_on_error: 0,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for HecConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HecConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("batch_interval", &self.batch_interval)
            .field("batch_count", &self.batch_count)
            .field("batch_size_bytes", &self.batch_size_bytes)
            .field("send_mode", &self.send_mode)
            .field("certificate_validation", &self.certificate_validation)
            .field("metadata", &self.metadata)
            .field("retries_on_error", &self.retries_on_error)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Property keys understood by [`HecConfig::from_properties`].
pub mod keys {
    pub const URL: &str = "url";
    pub const TOKEN: &str = "token";
    pub const HOST: &str = "host";
    pub const INDEX: &str = "index";
    pub const SOURCE: &str = "source";
    pub const SOURCETYPE: &str = "sourcetype";
    pub const BATCH_INTERVAL: &str = "batch_interval";
    pub const BATCH_SIZE_COUNT: &str = "batch_size_count";
    pub const BATCH_SIZE_BYTES: &str = "batch_size_bytes";
    pub const RETRIES_ON_ERROR: &str = "retries_on_error";
    pub const SEND_MODE: &str = "send_mode";
    pub const DISABLE_CERTIFICATE_VALIDATION: &str = "disableCertificateValidation";
}

const ENV_KEYS: [(&str, &str); 12] = [
    ("HEC_URL", keys::URL),
    ("HEC_TOKEN", keys::TOKEN),
    ("HEC_HOST", keys::HOST),
    ("HEC_INDEX", keys::INDEX),
    ("HEC_SOURCE", keys::SOURCE),
    ("HEC_SOURCETYPE", keys::SOURCETYPE),
    ("HEC_BATCH_INTERVAL_MS", keys::BATCH_INTERVAL),
    ("HEC_BATCH_SIZE_COUNT", keys::BATCH_SIZE_COUNT),
    ("HEC_BATCH_SIZE_BYTES", keys::BATCH_SIZE_BYTES),
    ("HEC_RETRIES_ON_ERROR", keys::RETRIES_ON_ERROR),
    ("HEC_SEND_MODE", keys::SEND_MODE),
    (
        "HEC_DISABLE_CERTIFICATE_VALIDATION",
        keys::DISABLE_CERTIFICATE_VALIDATION,
    ),
];

impl HecConfig {
    /// Configuration with default batching for the given collector.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            ..Default::default()
        }
    }

    /// Builds a configuration from the string properties handed over by a
    /// logging-framework adapter.
    ///
    /// Absent numeric properties are unset (zero). Present but unparsable
    /// ones fall back to the batching defaults (10 s, 10 events, 10 KB, no
    /// retries). An unknown `send_mode` is fatal.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, HecError> {
        let get = |key: &str| properties.get(key).map(|v| v.trim().to_string());

        let send_mode = match get(keys::SEND_MODE) {
            Some(mode) => mode.parse()?,
            None => SendMode::default(),
        };
        let disable_validation = get(keys::DISABLE_CERTIFICATE_VALIDATION)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"));

        let batch_interval_ms = parse_or(
            get(keys::BATCH_INTERVAL),
            DEFAULT_BATCH_INTERVAL.as_millis() as u64,
        );

        let config = Self {
            url: get(keys::URL).unwrap_or_default(),
            token: get(keys::TOKEN).unwrap_or_default(),
            batch_interval: Duration::from_millis(batch_interval_ms),
            batch_count: parse_or(get(keys::BATCH_SIZE_COUNT), DEFAULT_BATCH_COUNT),
            batch_size_bytes: parse_or(get(keys::BATCH_SIZE_BYTES), DEFAULT_BATCH_SIZE_BYTES),
            send_mode,
            certificate_validation: CertificateValidation::from_disable_flag(disable_validation),
            metadata: EventMetadata {
                host: get(keys::HOST),
                index: get(keys::INDEX),
                source: get(keys::SOURCE),
                sourcetype: get(keys::SOURCETYPE),
            },
            retries_on_error: parse_or(get(keys::RETRIES_ON_ERROR), 0),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        };

        config.validate()?;
        Ok(config)
    }

    /// Create configuration from `HEC_*` environment variables
    pub fn from_env() -> Result<Self, HecError> {
        let properties: HashMap<String, String> = ENV_KEYS
            .iter()
            .filter_map(|(var, key)| env::var(var).ok().map(|v| (key.to_string(), v)))
            .collect();

        let mut config = Self::from_properties(&properties)?;
        if let Some(secs) = env::var("HEC_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), HecError> {
        if self.url.trim().is_empty() {
            return Err(HecError::InvalidConfig("url cannot be empty".to_string()));
        }

        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(HecError::InvalidConfig(format!(
                "url '{}' must start with http:// or https://",
                self.url
            )));
        }

        if self.token.trim().is_empty() {
            return Err(HecError::InvalidConfig("token cannot be empty".to_string()));
        }

        Ok(())
    }

    /// Full endpoint the transport posts to.
    #[must_use]
    pub fn collector_url(&self) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), COLLECTOR_PATH)
    }

    /// Returns `(max_count, max_size)` with unset thresholds widened to
    /// `usize::MAX`. A lone zero threshold never means "flush every event";
    /// with both unset only the timer or an explicit flush sends.
    #[must_use]
    pub fn effective_thresholds(&self) -> (usize, usize) {
        let max_count = if self.batch_count == 0 {
            usize::MAX
        } else {
            self.batch_count
        };
        let max_size = if self.batch_size_bytes == 0 {
            usize::MAX
        } else {
            self.batch_size_bytes
        };
        (max_count, max_size)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, default: T) -> T
where
    T: Default,
{
    match value {
        None => T::default(),
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            debug!("HEC | Unparsable numeric property '{raw}', using default");
            default
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn base() -> Vec<(&'static str, &'static str)> {
        vec![("url", "https://splunk.example.com:8088"), ("token", "abc-123")]
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = HecConfig::new("https://splunk.example.com:8088", "s3cr3t-token");
        let printed = format!("{config:?}");
        assert!(!printed.contains("s3cr3t-token"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("splunk.example.com"));
    }

    #[test]
    fn test_send_mode_parse() {
        assert_eq!("sequential".parse::<SendMode>().unwrap(), SendMode::Sequential);
        assert_eq!("parallel".parse::<SendMode>().unwrap(), SendMode::Parallel);
        assert!(matches!(
            "Parallel".parse::<SendMode>(),
            Err(HecError::UnknownSendMode(mode)) if mode == "Parallel"
        ));
    }

    #[test]
    fn test_from_properties_full() {
        let mut pairs = base();
        pairs.extend([
            ("host", "web-1"),
            ("index", "main"),
            ("source", "app"),
            ("sourcetype", "log4j"),
            ("batch_interval", "500"),
            ("batch_size_count", "100"),
            ("batch_size_bytes", "2048"),
            ("retries_on_error", "3"),
            ("send_mode", "parallel"),
            ("disableCertificateValidation", "TRUE"),
        ]);

        let config = HecConfig::from_properties(&properties(&pairs)).unwrap();

        assert_eq!(config.batch_interval, Duration::from_millis(500));
        assert_eq!(config.batch_count, 100);
        assert_eq!(config.batch_size_bytes, 2048);
        assert_eq!(config.retries_on_error, 3);
        assert_eq!(config.send_mode, SendMode::Parallel);
        assert_eq!(config.certificate_validation, CertificateValidation::Disable);
        assert_eq!(config.metadata.host.as_deref(), Some("web-1"));
        assert_eq!(config.metadata.sourcetype.as_deref(), Some("log4j"));
        assert_eq!(
            config.collector_url(),
            "https://splunk.example.com:8088/services/collector"
        );
    }

    #[test]
    fn test_from_properties_absent_numbers_are_unset() {
        let config = HecConfig::from_properties(&properties(&base())).unwrap();

        assert_eq!(config.batch_interval, Duration::ZERO);
        assert_eq!(config.batch_count, 0);
        assert_eq!(config.batch_size_bytes, 0);
        assert_eq!(config.retries_on_error, 0);
        assert_eq!(config.send_mode, SendMode::Sequential);
        assert_eq!(config.certificate_validation, CertificateValidation::Enforce);
    }

    #[test]
    fn test_from_properties_unparsable_numbers_use_defaults() {
        let mut pairs = base();
        pairs.extend([
            ("batch_interval", "soon"),
            ("batch_size_count", "many"),
            ("batch_size_bytes", "-1"),
            ("retries_on_error", "x"),
        ]);

        let config = HecConfig::from_properties(&properties(&pairs)).unwrap();

        assert_eq!(config.batch_interval, DEFAULT_BATCH_INTERVAL);
        assert_eq!(config.batch_count, DEFAULT_BATCH_COUNT);
        assert_eq!(config.batch_size_bytes, DEFAULT_BATCH_SIZE_BYTES);
        assert_eq!(config.retries_on_error, 0);
    }

    #[test]
    fn test_from_properties_unknown_send_mode_is_fatal() {
        let mut pairs = base();
        pairs.push(("send_mode", "async"));

        let result = HecConfig::from_properties(&properties(&pairs));

        assert!(matches!(result, Err(HecError::UnknownSendMode(_))));
    }

    #[test]
    fn test_validate() {
        assert!(HecConfig::new("https://splunk:8088", "t").validate().is_ok());
        assert!(HecConfig::new("", "t").validate().is_err());
        assert!(HecConfig::new("splunk:8088", "t").validate().is_err());
        assert!(HecConfig::new("http://splunk:8088", "  ").validate().is_err());
    }

    #[test]
    fn test_effective_thresholds() {
        let mut config = HecConfig::new("https://splunk:8088", "t");

        config.batch_count = 0;
        config.batch_size_bytes = 1024;
        assert_eq!(config.effective_thresholds(), (usize::MAX, 1024));

        config.batch_count = 5;
        config.batch_size_bytes = 0;
        assert_eq!(config.effective_thresholds(), (5, usize::MAX));

        config.batch_count = 0;
        config.batch_size_bytes = 0;
        assert_eq!(config.effective_thresholds(), (usize::MAX, usize::MAX));

        config.batch_count = 5;
        config.batch_size_bytes = 1024;
        assert_eq!(config.effective_thresholds(), (5, 1024));
    }

    #[test]
    fn test_collector_url_trims_trailing_slash() {
        let config = HecConfig::new("http://localhost:8088/", "t");
        assert_eq!(config.collector_url(), "http://localhost:8088/services/collector");
    }
}
