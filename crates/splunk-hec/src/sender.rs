// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch accumulator and dispatcher.
//!
//! Producers append events under a short lock. When a count or size
//! threshold is reached, on every timer tick, and on explicit flush the
//! pending batch is detached and handed to the middleware chain on a tokio
//! task; the producer never waits for the network.
//!
//! In sequential mode detached batches go through a single delivery worker
//! in submission order, so a batch being resent holds back later batches.
//! In parallel mode each batch gets its own task.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::batch::Batch;
use crate::config::{HecConfig, SendMode};
use crate::error::{HecError, ServerError};
use crate::error_handler::{ErrorCallback, ErrorHandler};
use crate::event::EventInfo;
use crate::middleware::{HttpSender, Middleware, MiddlewareChain};
use crate::resend::{BackoffConfig, ResendMiddleware};
use crate::transport::HecTransport;

/// Runs a detached batch through the chain and reports the final outcome.
struct Delivery {
    chain: MiddlewareChain,
    sender: Arc<dyn HttpSender>,
    error_handler: Arc<ErrorHandler>,
}

impl Delivery {
    async fn deliver(&self, events: Arc<Batch>) {
        match self
            .chain
            .dispatch(Arc::clone(&events), self.sender.as_ref())
            .await
        {
            Ok(response) if response.is_success() => {
                debug!("HEC | Delivered batch of {} events", events.len());
            }
            Ok(response) => {
                let err = HecError::Server(ServerError::from_reply(response.reply));
                self.error_handler.report(events.events(), &err);
            }
            Err(err) => self.error_handler.report(events.events(), &err),
        }
    }
}

/// Feeds detached batches to a worker task on the runtime.
///
/// Sequential workers deliver one batch at a time; parallel workers spawn a
/// delivery task per batch. Once the runtime is gone the channel is closed
/// and the batch comes back to the caller.
struct Dispatcher {
    tx: mpsc::UnboundedSender<Arc<Batch>>,
}

impl Dispatcher {
    fn start(mode: SendMode, runtime: &Handle, delivery: Arc<Delivery>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Arc<Batch>>();
        runtime.spawn(async move {
            while let Some(batch) = rx.recv().await {
                match mode {
                    SendMode::Sequential => delivery.deliver(batch).await,
                    SendMode::Parallel => {
                        let delivery = Arc::clone(&delivery);
                        tokio::spawn(async move { delivery.deliver(batch).await });
                    }
                }
            }
            debug!("HEC | Delivery worker stopped");
        });
        Self { tx }
    }

    /// Returns the batch when no worker is left to take it.
    fn dispatch(&self, batch: Arc<Batch>) -> Result<(), Arc<Batch>> {
        self.tx
            .send(batch)
            .map_err(|mpsc::error::SendError(batch)| batch)
    }
}

struct Inner {
    batch: Mutex<Batch>,
    max_count: usize,
    max_size: usize,
    dispatcher: Dispatcher,
    error_handler: Arc<ErrorHandler>,
}

impl Inner {
    #[allow(clippy::expect_used)]
    fn lock(&self) -> MutexGuard<'_, Batch> {
        self.batch.lock().expect("lock poisoned")
    }

    fn append(&self, event: EventInfo) {
        let undelivered = {
            let mut batch = self.lock();
            batch.push(event);
            if batch.len() >= self.max_count || batch.estimated_size() > self.max_size {
                self.flush_locked(&mut batch)
            } else {
                None
            }
        };
        self.report_undelivered(undelivered);
    }

    fn flush(&self) {
        let undelivered = self.flush_locked(&mut self.lock());
        self.report_undelivered(undelivered);
    }

    /// Timer flush. Checked under the lock so that no tick flushes once
    /// `close` has taken the lock and cancelled `shutdown`.
    fn tick(&self, shutdown: &CancellationToken) -> bool {
        let undelivered = {
            let mut batch = self.lock();
            if shutdown.is_cancelled() {
                return false;
            }
            self.flush_locked(&mut batch)
        };
        self.report_undelivered(undelivered);
        true
    }

    fn close(&self, shutdown: &CancellationToken) {
        let undelivered = {
            let mut batch = self.lock();
            shutdown.cancel();
            self.flush_locked(&mut batch)
        };
        self.report_undelivered(undelivered);
    }

    // Dispatch happens under the lock so batches reach the worker in the
    // order they were detached. Reporting does not, since the error callback
    // may append to this sender again.
    fn flush_locked(&self, batch: &mut Batch) -> Option<Arc<Batch>> {
        if batch.is_empty() {
            return None;
        }
        let detached = Arc::new(std::mem::take(batch));
        debug!(
            "HEC | Flushing batch of {} events (~{} bytes)",
            detached.len(),
            detached.estimated_size()
        );
        self.dispatcher.dispatch(detached).err()
    }

    fn report_undelivered(&self, undelivered: Option<Arc<Batch>>) {
        if let Some(batch) = undelivered {
            let err = HecError::Transport("delivery worker is not running".into());
            self.error_handler.report(batch.events(), &err);
        }
    }
}

/// Entry point for producers: accumulates events and ships them in batches.
///
/// Must be created from within a tokio runtime (or given one through
/// [`HecSenderBuilder::runtime`]); afterwards every method may be called
/// from any thread. Pending events are lost unless [`HecSender::close`] is
/// called before the sender is dropped.
pub struct HecSender {
    inner: Arc<Inner>,
    config: Arc<HecConfig>,
    shutdown: CancellationToken,
}

impl HecSender {
    /// Sender posting to the configured collector, with a resend stage when
    /// `retries_on_error` is non-zero.
    pub fn new(config: HecConfig) -> Result<Self, HecError> {
        Self::builder(config).build()
    }

    #[must_use]
    pub fn builder(config: HecConfig) -> HecSenderBuilder {
        HecSenderBuilder {
            config,
            middleware: Vec::new(),
            http_sender: None,
            backoff: BackoffConfig::default(),
            resend_interrupt: CancellationToken::new(),
            runtime: None,
        }
    }

    /// Appends `event`; flushes before returning if a threshold is reached.
    pub fn send(&self, event: EventInfo) {
        self.inner.append(event);
    }

    /// Appends a message with empty severity.
    pub fn send_message(&self, message: &str) {
        self.send(EventInfo::new("", message));
    }

    /// Full form used by logging-framework adapters. Empty optional fields
    /// are dropped from the event; a `None` message is rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        severity: &str,
        message: Option<&str>,
        logger_name: Option<&str>,
        thread_name: Option<&str>,
        properties: Option<BTreeMap<String, String>>,
        exception_message: Option<&str>,
        marker: Option<&dyn Display>,
    ) -> Result<(), HecError> {
        let Some(message) = message else {
            error!("HEC | Event has no message text, the layout is probably incorrect");
            return Err(HecError::MissingMessage);
        };

        let mut event = EventInfo::new(severity, message);
        if let Some(logger_name) = logger_name {
            event = event.with_logger_name(logger_name);
        }
        if let Some(thread_name) = thread_name {
            event = event.with_thread_name(thread_name);
        }
        if let Some(properties) = properties {
            event = event.with_properties(properties);
        }
        if let Some(exception_message) = exception_message {
            event = event.with_exception_message(exception_message);
        }
        if let Some(marker) = marker {
            event = event.with_marker(marker);
        }

        self.send(event);
        Ok(())
    }

    /// Detaches and dispatches the pending batch; no-op when it is empty.
    pub fn flush(&self) {
        self.inner.flush();
    }

    /// Stops the timer, then flushes what is pending. Delivery of the final
    /// batch continues in the background.
    pub fn close(&self) {
        debug!("HEC | Closing sender");
        self.inner.close(&self.shutdown);
    }

    /// Replaces the error callback. Only the latest registration is invoked.
    pub fn on_error(&self, callback: ErrorCallback) {
        self.inner.error_handler.on_error(callback);
    }

    #[must_use]
    pub fn error_handler(&self) -> &ErrorHandler {
        &self.inner.error_handler
    }

    #[must_use]
    pub fn config(&self) -> &HecConfig {
        &self.config
    }

    /// Number of events waiting in the pending batch.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn pending_estimated_size(&self) -> usize {
        self.inner.lock().estimated_size()
    }
}

impl Drop for HecSender {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for HecSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HecSender")
            .field("url", &self.config.url)
            .field("send_mode", &self.config.send_mode)
            .field("pending", &self.pending_len())
            .finish_non_exhaustive()
    }
}

/// Assembles a [`HecSender`] with extra middleware or a custom base sender.
pub struct HecSenderBuilder {
    config: HecConfig,
    middleware: Vec<Arc<dyn Middleware>>,
    http_sender: Option<Arc<dyn HttpSender>>,
    backoff: BackoffConfig,
    resend_interrupt: CancellationToken,
    runtime: Option<Handle>,
}

impl HecSenderBuilder {
    /// Registers a stage. Stages added here sit below the resend stage, so
    /// they see every resend attempt.
    #[must_use]
    pub fn middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.middleware.push(stage);
        self
    }

    /// Replaces the HTTP transport at the base of the chain.
    #[must_use]
    pub fn http_sender(mut self, sender: Arc<dyn HttpSender>) -> Self {
        self.http_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cancelling `token` abandons batches currently waiting to be resent.
    /// `close` leaves resends running.
    #[must_use]
    pub fn resend_interrupt(mut self, token: CancellationToken) -> Self {
        self.resend_interrupt = token;
        self
    }

    /// Runtime used for the timer and delivery tasks. Defaults to the
    /// runtime the builder is called from.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn build(self) -> Result<HecSender, HecError> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                HecError::InvalidConfig(format!("HecSender needs a tokio runtime: {e}"))
            })?,
        };

        let config = Arc::new(self.config);
        let shutdown = CancellationToken::new();

        let mut chain = MiddlewareChain::builder();
        for stage in self.middleware {
            chain = chain.register(stage);
        }
        if config.retries_on_error > 0 {
            let resend = ResendMiddleware::new(config.retries_on_error)
                .with_backoff(self.backoff)
                .with_interrupt(self.resend_interrupt);
            chain = chain.register(Arc::new(resend));
        }

        let sender = self
            .http_sender
            .unwrap_or_else(|| Arc::new(HecTransport::new(Arc::clone(&config))));
        let error_handler = Arc::new(ErrorHandler::new());
        let delivery = Arc::new(Delivery {
            chain: chain.build(),
            sender,
            error_handler: Arc::clone(&error_handler),
        });

        let (max_count, max_size) = config.effective_thresholds();
        let inner = Arc::new(Inner {
            batch: Mutex::new(Batch::new()),
            max_count,
            max_size,
            dispatcher: Dispatcher::start(config.send_mode, &runtime, delivery),
            error_handler,
        });

        if !config.batch_interval.is_zero() {
            spawn_flush_timer(&runtime, &inner, &config, shutdown.clone());
        }

        debug!(
            "HEC | Sender ready for {} (count {}, size {}, interval {:?}, {:?} mode, {} retries)",
            config.collector_url(),
            config.batch_count,
            config.batch_size_bytes,
            config.batch_interval,
            config.send_mode,
            config.retries_on_error
        );

        Ok(HecSender {
            inner,
            config,
            shutdown,
        })
    }
}

fn spawn_flush_timer(
    runtime: &Handle,
    inner: &Arc<Inner>,
    config: &HecConfig,
    shutdown: CancellationToken,
) {
    let inner = Arc::clone(inner);
    let period = config.batch_interval;
    runtime.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if !inner.tick(&shutdown) {
                        break;
                    }
                }
            }
        }
        debug!("HEC | Flush timer stopped");
    });
}
