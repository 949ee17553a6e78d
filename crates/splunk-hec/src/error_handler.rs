// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use arc_swap::ArcSwapOption;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::error;

use crate::error::HecError;
use crate::event::EventInfo;

/// Receives the events of a batch that could not be delivered and the
/// terminal error.
pub type ErrorCallback = Arc<dyn Fn(&[EventInfo], &HecError) + Send + Sync>;

/// Holds at most one error callback; the last registration wins.
///
/// Owned by a [`crate::HecSender`] rather than being process-wide, so two
/// senders never observe each other's failures.
pub struct ErrorHandler {
    callback: ArcSwapOption<ErrorCallback>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self {
            callback: ArcSwapOption::empty(),
        }
    }
}

impl ErrorHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback`, replacing any previous one.
    pub fn on_error(&self, callback: ErrorCallback) {
        self.callback.store(Some(Arc::new(callback)));
    }

    pub fn clear(&self) {
        self.callback.store(None);
    }

    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.callback.load().is_some()
    }

    /// Reports a terminal delivery failure for `events`.
    pub fn report(&self, events: &[EventInfo], err: &HecError) {
        error!(
            "HEC | Failed to deliver batch of {} events: {}",
            events.len(),
            err
        );
        if let Some(callback) = self.callback.load_full() {
            (callback)(events, err);
        }
    }
}

impl Debug for ErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorHandler")
            .field("registered", &self.is_registered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_report_without_callback_does_not_panic() {
        let handler = ErrorHandler::new();
        assert!(!handler.is_registered());
        handler.report(&[EventInfo::new("INFO", "x")], &HecError::MissingMessage);
    }

    #[test]
    fn test_report_invokes_callback_with_batch_and_error() {
        let handler = ErrorHandler::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        handler.on_error(Arc::new(move |events: &[EventInfo], err: &HecError| {
            seen_clone
                .lock()
                .unwrap()
                .push((events.len(), err.to_string()));
        }));

        let events = vec![EventInfo::new("INFO", "a"), EventInfo::new("INFO", "b")];
        handler.report(&events, &HecError::Transport("connection reset".into()));

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(2, "Transport failure: connection reset".to_string())]
        );
    }

    #[test]
    fn test_last_registration_wins() {
        let handler = ErrorHandler::new();
        let first = Arc::new(Mutex::new(0));
        let second = Arc::new(Mutex::new(0));

        let first_clone = Arc::clone(&first);
        handler.on_error(Arc::new(move |_: &[EventInfo], _: &HecError| {
            *first_clone.lock().unwrap() += 1;
        }));
        let second_clone = Arc::clone(&second);
        handler.on_error(Arc::new(move |_: &[EventInfo], _: &HecError| {
            *second_clone.lock().unwrap() += 1;
        }));

        handler.report(&[], &HecError::MissingMessage);

        assert_eq!(*first.lock().unwrap(), 0);
        assert_eq!(*second.lock().unwrap(), 1);

        handler.clear();
        handler.report(&[], &HecError::MissingMessage);
        assert_eq!(*second.lock().unwrap(), 1);
    }
}
