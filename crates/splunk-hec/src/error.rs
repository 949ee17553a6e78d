// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde_json::Value;

/// Errors produced while configuring the pipeline or delivering a batch.
#[derive(Debug, thiserror::Error)]
pub enum HecError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Delivery mode string other than `sequential` or `parallel`.
    #[error("Unknown send mode: {0}")]
    UnknownSendMode(String),

    /// The adapter's layout produced no message text for an event.
    #[error("Event has no message text, the layout is probably incorrect")]
    MissingMessage,

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No response was received (connection, TLS, timeout).
    #[error("Transport failure: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The collector answered with a non-success status.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// A resend wait was cancelled; carries the failure that triggered the wait.
    #[error("Resend interrupted after: {0}")]
    Interrupted(#[source] Box<HecError>),
}

impl HecError {
    /// Only failures where no response arrived are worth resending.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for HecError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Box::new(err))
    }
}

/// Error reply returned by the collector, e.g. `{"text":"Invalid token","code":4}`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{reply}")]
pub struct ServerError {
    reply: String,
    code: i64,
    text: String,
}

impl ServerError {
    /// Extracts `code` and `text` from the reply body. A body that is not a
    /// JSON object keeps code `-1` and uses the raw body as text.
    pub fn from_reply(reply: impl Into<String>) -> Self {
        let reply = reply.into();
        let (code, text) = match serde_json::from_str::<Value>(&reply) {
            Ok(json) if json.is_object() => (
                json.get("code").and_then(Value::as_i64).unwrap_or(-1),
                json.get("text")
                    .and_then(Value::as_str)
                    .map_or_else(|| "unknown error".to_string(), str::to_string),
            ),
            _ => (-1, reply.clone()),
        };
        Self { reply, code, text }
    }

    /// Raw reply body.
    #[must_use]
    pub fn reply(&self) -> &str {
        &self.reply
    }

    #[must_use]
    pub fn code(&self) -> i64 {
        self.code
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }
}
