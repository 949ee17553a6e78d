// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batching, retrying delivery of structured log events to a Splunk HTTP
//! Event Collector (HEC).
//!
//! ```text
//!   producers ──send()──▶ HecSender (batch under lock)
//!                              │ count / size threshold, timer tick, flush()
//!                              ▼
//!                        MiddlewareChain  (last registered stage runs first)
//!                              │
//!                        ResendMiddleware (exponential backoff on transport failure)
//!                              │
//!                        HecTransport ──POST /services/collector──▶ Splunk
//!                              │
//!                        ErrorHandler (single registered callback)
//! ```
//!
//! Producers never block on the network: a flush detaches the pending batch
//! and hands it to a tokio task. Unsent events live only in memory.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batch;
pub mod config;
pub mod constants;
pub mod error;
pub mod error_handler;
pub mod event;
pub mod middleware;
pub mod resend;
pub mod sender;
pub mod transport;

#[cfg(test)]
mod test_support;

pub use batch::Batch;
pub use config::{EventMetadata, HecConfig, SendMode};
pub use error::{HecError, ServerError};
pub use error_handler::{ErrorCallback, ErrorHandler};
pub use event::EventInfo;
pub use hec_tls::{prepare_client_provider, CertificateValidation};
pub use middleware::{
    HecResponse, HttpSender, Middleware, MiddlewareChain, MiddlewareChainBuilder, Next,
};
pub use resend::{BackoffConfig, BackoffState, ResendMiddleware};
pub use sender::{HecSender, HecSenderBuilder};
pub use transport::HecTransport;
