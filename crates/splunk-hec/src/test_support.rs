// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process [`HttpSender`] doubles for unit tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::batch::Batch;
use crate::error::HecError;
use crate::middleware::{HecResponse, HttpSender};

type Outcome = Result<HecResponse, HecError>;

/// Returns scripted outcomes in order, then repeats `fallback` forever.
pub(crate) struct ScriptedSender {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Box<dyn Fn() -> Outcome + Send + Sync>,
    latency: Duration,
    attempts: Mutex<Vec<Instant>>,
    batches: Mutex<Vec<Arc<Batch>>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSender {
    fn with_fallback(fallback: Box<dyn Fn() -> Outcome + Send + Sync>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            latency: Duration::ZERO,
            attempts: Mutex::new(Vec::new()),
            batches: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn always_ok() -> Self {
        Self::with_fallback(Box::new(|| Ok(HecResponse::new(StatusCode::OK, ""))))
    }

    pub(crate) fn always_failing() -> Self {
        Self::with_fallback(Box::new(|| {
            Err(HecError::Transport("connection refused".into()))
        }))
    }

    pub(crate) fn always_status(status: StatusCode, reply: &'static str) -> Self {
        Self::with_fallback(Box::new(move || Ok(HecResponse::new(status, reply))))
    }

    /// Queues `outcome` ahead of the fallback.
    pub(crate) fn push(&self, outcome: Outcome) {
        self.script.lock().unwrap().push_back(outcome);
    }

    /// Every request takes `latency` of (tokio) time to answer.
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    pub(crate) fn attempt_times(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    pub(crate) fn batches(&self) -> Vec<Arc<Batch>> {
        self.batches.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpSender for ScriptedSender {
    async fn post_events(&self, events: Arc<Batch>) -> Outcome {
        self.attempts.lock().unwrap().push(Instant::now());
        self.batches.lock().unwrap().push(events);

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| (self.fallback)())
    }
}
