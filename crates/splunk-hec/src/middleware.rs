// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Delivery middleware: ordered stages wrapped around the transport.
//!
//! Stages are registered at configuration time and the chain is immutable
//! afterwards. The most recently registered stage runs first; each stage
//! either returns a result itself or forwards through [`Next::run`]. Since
//! every stage returns exactly one result per call, a batch can never be
//! completed twice or silently dropped by the chain.
//!
//! ```text
//!   register(A); register(B)
//!   dispatch ──▶ B ──next──▶ A ──next──▶ HttpSender
//! ```

use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;

use crate::batch::Batch;
use crate::error::HecError;

/// A response received from the collector, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HecResponse {
    pub status: StatusCode,
    /// Body, only read when the status is not a success.
    pub reply: String,
}

impl HecResponse {
    pub fn new(status: StatusCode, reply: impl Into<String>) -> Self {
        Self {
            status,
            reply: reply.into(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Base of the chain: performs one delivery attempt.
///
/// `Ok` means a response arrived (whatever its status); `Err` means none did.
#[async_trait]
pub trait HttpSender: Send + Sync {
    async fn post_events(&self, events: Arc<Batch>) -> Result<HecResponse, HecError>;
}

#[async_trait]
pub trait Middleware: Send + Sync {
    /// Handles one delivery of `events`. Forward with `next.run(events)` to
    /// reach the rest of the chain; `next` is `Copy` so it may be run again.
    async fn post_events(&self, events: Arc<Batch>, next: Next<'_>)
        -> Result<HecResponse, HecError>;
}

/// Handle on the remainder of the chain below the running stage.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn Middleware>],
    sender: &'a dyn HttpSender,
}

impl Next<'_> {
    pub async fn run(self, events: Arc<Batch>) -> Result<HecResponse, HecError> {
        match self.stages.split_last() {
            Some((stage, rest)) => {
                let next = Next {
                    stages: rest,
                    sender: self.sender,
                };
                stage.post_events(events, next).await
            }
            None => self.sender.post_events(events).await,
        }
    }
}

/// Immutable list of stages in registration order.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    stages: Arc<[Arc<dyn Middleware>]>,
}

impl MiddlewareChain {
    #[must_use]
    pub fn builder() -> MiddlewareChainBuilder {
        MiddlewareChainBuilder::default()
    }

    /// Runs the last registered stage, or `sender` directly when the chain is empty.
    pub async fn dispatch(
        &self,
        events: Arc<Batch>,
        sender: &dyn HttpSender,
    ) -> Result<HecResponse, HecError> {
        Next {
            stages: &self.stages,
            sender,
        }
        .run(events)
        .await
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("stages", &self.stages.len())
            .finish()
    }
}

#[derive(Default)]
pub struct MiddlewareChainBuilder {
    stages: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChainBuilder {
    /// Registers `stage` in front of every stage registered so far.
    #[must_use]
    pub fn register(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn build(self) -> MiddlewareChain {
        MiddlewareChain {
            stages: self.stages.into(),
        }
    }
}
