// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resend stage: retries a batch after transport failures with exponential
//! backoff.
//!
//! A response from the collector is never resent, whatever its status. Only
//! failures where no response arrived (connection refused, TLS failure,
//! timeout) are retried, up to `retries_on_error` times. Waiting between
//! attempts is a tokio sleep, so no worker thread is held while backing off.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::batch::Batch;
use crate::constants::{DEFAULT_RETRY_DELAY, DEFAULT_RETRY_DELAY_CEILING};
use crate::error::{HecError, ServerError};
use crate::middleware::{HecResponse, Middleware, Next};

/// Backoff policy between resend attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Wait before the first resend.
    pub initial_delay: Duration,
    /// Upper bound for any single wait.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_RETRY_DELAY,
            max_delay: DEFAULT_RETRY_DELAY_CEILING,
        }
    }
}

/// Delay sequence for a single batch: initial, doubled after each wait, capped.
#[derive(Debug)]
pub struct BackoffState {
    config: BackoffConfig,
    next_delay: Duration,
}

impl BackoffState {
    #[must_use]
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            next_delay: config.initial_delay.min(config.max_delay),
        }
    }

    /// Returns the wait before the next attempt and advances the sequence.
    pub fn register_error(&mut self) -> Duration {
        let delay = self.next_delay;
        self.next_delay = delay.saturating_mul(2).min(self.config.max_delay);
        delay
    }
}

/// Middleware that resends a batch after transport failures.
#[derive(Debug, Clone)]
pub struct ResendMiddleware {
    retries_on_error: u32,
    backoff: BackoffConfig,
    interrupt: CancellationToken,
}

impl ResendMiddleware {
    #[must_use]
    pub fn new(retries_on_error: u32) -> Self {
        Self {
            retries_on_error,
            backoff: BackoffConfig::default(),
            interrupt: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cancelling `token` aborts any wait in progress; the batch then
    /// completes with [`HecError::Interrupted`].
    #[must_use]
    pub fn with_interrupt(mut self, token: CancellationToken) -> Self {
        self.interrupt = token;
        self
    }

    #[must_use]
    pub fn retries_on_error(&self) -> u32 {
        self.retries_on_error
    }
}

#[async_trait]
impl Middleware for ResendMiddleware {
    async fn post_events(
        &self,
        events: Arc<Batch>,
        next: Next<'_>,
    ) -> Result<HecResponse, HecError> {
        if self.retries_on_error == 0 {
            return next.run(events).await;
        }

        let mut backoff = BackoffState::new(self.backoff);
        let mut retries = 0;
        loop {
            match next.run(Arc::clone(&events)).await {
                Ok(response) if response.is_success() => {
                    if retries > 0 {
                        debug!(
                            "HEC | Batch of {} events delivered after {} resends",
                            events.len(),
                            retries
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    return Err(HecError::Server(ServerError::from_reply(response.reply)));
                }
                Err(err) if err.is_retryable() && retries < self.retries_on_error => {
                    retries += 1;
                    let delay = backoff.register_error();
                    warn!(
                        "HEC | Failed to send batch of {} events ({}), resending in {:?} ({}/{})",
                        events.len(),
                        err,
                        delay,
                        retries,
                        self.retries_on_error
                    );
                    tokio::select! {
                        biased;
                        () = self.interrupt.cancelled() => {
                            warn!("HEC | Resend interrupted, giving up on batch of {} events", events.len());
                            return Err(HecError::Interrupted(Box::new(err)));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}
