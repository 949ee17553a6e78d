// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport posting batches to `<url>/services/collector`.
//!
//! The client is built lazily on the first send, from the configured TLS
//! policy. In sequential mode a single request slot is held for the whole
//! request/response exchange, so at most one request is ever on the wire.

use async_trait::async_trait;
use hec_tls::create_reqwest_client_builder;
use reqwest::header;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, Semaphore};
use tracing::debug;

use crate::batch::Batch;
use crate::config::{HecConfig, SendMode};
use crate::constants::{AUTHORIZATION_SCHEME, CONTENT_TYPE};
use crate::error::HecError;
use crate::middleware::{HecResponse, HttpSender};

pub struct HecTransport {
    config: Arc<HecConfig>,
    endpoint: String,
    authorization: String,
    client: OnceCell<reqwest::Client>,
    request_slot: Option<Semaphore>,
}

impl HecTransport {
    #[must_use]
    pub fn new(config: Arc<HecConfig>) -> Self {
        let endpoint = config.collector_url();
        let authorization = format!("{AUTHORIZATION_SCHEME} {}", config.token);
        let request_slot = match config.send_mode {
            SendMode::Sequential => Some(Semaphore::new(1)),
            SendMode::Parallel => None,
        };
        Self {
            config,
            endpoint,
            authorization,
            client: OnceCell::new(),
            request_slot,
        }
    }

    /// Whether the HTTP client has been created yet.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.client.initialized()
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn get_client(&self) -> Result<&reqwest::Client, HecError> {
        self.client
            .get_or_try_init(|| async { build_client(&self.config) })
            .await
    }
}

fn build_client(config: &HecConfig) -> Result<reqwest::Client, HecError> {
    let mut builder = create_reqwest_client_builder(config.certificate_validation)
        .map_err(|e| HecError::Client(e.to_string()))?
        .timeout(config.request_timeout)
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if config.send_mode == SendMode::Sequential {
        builder = builder.pool_max_idle_per_host(1);
    }

    debug!(
        "HEC | Starting HTTP client for {} ({:?} mode)",
        config.collector_url(),
        config.send_mode
    );
    builder.build().map_err(|e| HecError::Client(e.to_string()))
}

#[async_trait]
impl HttpSender for HecTransport {
    async fn post_events(&self, events: Arc<Batch>) -> Result<HecResponse, HecError> {
        let client = self.get_client().await?;
        let body = events.to_payload(&self.config.metadata)?;

        let _permit = match &self.request_slot {
            Some(slot) => Some(
                slot.acquire()
                    .await
                    .map_err(|e| HecError::Transport(Box::new(e)))?,
            ),
            None => None,
        };

        debug!(
            "HEC | Posting {} events ({} bytes) to {}",
            events.len(),
            body.len(),
            self.endpoint
        );
        let response = client
            .post(&self.endpoint)
            .header(header::AUTHORIZATION, &self.authorization)
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let reply = if status.is_success() {
            String::new()
        } else {
            response.text().await.unwrap_or_else(|e| e.to_string())
        };
        Ok(HecResponse { status, reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_is_lazy() {
        let transport = HecTransport::new(Arc::new(HecConfig::new(
            "https://splunk.example.com:8088/",
            "abc",
        )));
        assert!(!transport.is_started());
        assert_eq!(
            transport.endpoint(),
            "https://splunk.example.com:8088/services/collector"
        );
        assert_eq!(transport.authorization, "Splunk abc");
    }

    #[test]
    fn test_request_slot_only_in_sequential_mode() {
        let mut config = HecConfig::new("http://localhost:8088", "abc");
        assert!(HecTransport::new(Arc::new(config.clone()))
            .request_slot
            .is_some());

        config.send_mode = SendMode::Parallel;
        assert!(HecTransport::new(Arc::new(config)).request_slot.is_none());
    }
}
