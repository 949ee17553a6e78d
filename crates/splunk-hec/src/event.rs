// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A single captured log occurrence and its HEC JSON form.
//!
//! Each event is written as an envelope carrying the timestamp and the
//! configured metadata, wrapping the event body:
//!
//! ```json
//! {"time":1700000000.123,"host":"web-1","event":{"severity":"INFO","message":"hello"}}
//! ```
//!
//! Empty strings and absent values are left out of both objects.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::EventMetadata;

#[derive(Debug, Clone, PartialEq)]
pub struct EventInfo {
    /// Seconds since the Unix epoch, millisecond precision.
    time: f64,
    severity: String,
    message: String,
    logger_name: Option<String>,
    thread_name: Option<String>,
    properties: Option<BTreeMap<String, String>>,
    exception_message: Option<String>,
    marker: Option<String>,
}

impl EventInfo {
    /// Captures an event stamped with the current wall-clock time.
    pub fn new(severity: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            time: now_epoch_seconds(),
            severity: severity.into(),
            message: message.into(),
            logger_name: None,
            thread_name: None,
            properties: None,
            exception_message: None,
            marker: None,
        }
    }

    /// Overrides the capture time, e.g. with the logging framework's own timestamp.
    #[must_use]
    pub fn with_time(mut self, epoch_seconds: f64) -> Self {
        self.time = round_to_millis(epoch_seconds);
        self
    }

    #[must_use]
    pub fn with_logger_name(mut self, logger_name: impl Into<String>) -> Self {
        self.logger_name = Some(logger_name.into());
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = Some(thread_name.into());
        self
    }

    #[must_use]
    pub fn with_properties(mut self, properties: BTreeMap<String, String>) -> Self {
        self.properties = Some(properties);
        self
    }

    #[must_use]
    pub fn with_exception_message(mut self, exception_message: impl Into<String>) -> Self {
        self.exception_message = Some(exception_message.into());
        self
    }

    #[must_use]
    pub fn with_marker(mut self, marker: impl Display) -> Self {
        self.marker = Some(marker.to_string());
        self
    }

    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    #[must_use]
    pub fn severity(&self) -> &str {
        &self.severity
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn logger_name(&self) -> Option<&str> {
        self.logger_name.as_deref()
    }

    #[must_use]
    pub fn thread_name(&self) -> Option<&str> {
        self.thread_name.as_deref()
    }

    #[must_use]
    pub fn properties(&self) -> Option<&BTreeMap<String, String>> {
        self.properties.as_ref()
    }

    #[must_use]
    pub fn exception_message(&self) -> Option<&str> {
        self.exception_message.as_deref()
    }

    #[must_use]
    pub fn marker(&self) -> Option<&str> {
        self.marker.as_deref()
    }

    /// Contribution to the batch size estimate: severity plus message length.
    /// This undercounts the serialized payload on purpose; it only drives the
    /// soft size threshold.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.severity.len() + self.message.len()
    }

    /// Appends this event's JSON document to `out`, without any separator.
    pub fn write_json<W: Write>(
        &self,
        metadata: &EventMetadata,
        out: W,
    ) -> Result<(), serde_json::Error> {
        let envelope = Envelope {
            time: self.time,
            host: metadata.host.as_deref().and_then(non_empty),
            index: metadata.index.as_deref().and_then(non_empty),
            source: metadata.source.as_deref().and_then(non_empty),
            sourcetype: metadata.sourcetype.as_deref().and_then(non_empty),
            event: Body {
                severity: non_empty(&self.severity),
                message: non_empty(&self.message),
                logger: self.logger_name.as_deref().and_then(non_empty),
                thread: self.thread_name.as_deref().and_then(non_empty),
                exception: self.exception_message.as_deref().and_then(non_empty),
                properties: self.properties.as_ref().filter(|p| !p.is_empty()),
                marker: self.marker.as_deref().and_then(non_empty),
            },
        };
        serde_json::to_writer(out, &envelope)
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    host: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sourcetype: Option<&'a str>,
    event: Body<'a>,
}

#[derive(Serialize)]
struct Body<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    severity: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logger: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thread: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<&'a BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    marker: Option<&'a str>,
}

fn non_empty(value: &str) -> Option<&str> {
    (!value.is_empty()).then_some(value)
}

fn now_epoch_seconds() -> f64 {
    // A clock before 1970 is treated as the epoch itself.
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    millis as f64 / 1000.0
}

fn round_to_millis(epoch_seconds: f64) -> f64 {
    (epoch_seconds * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn to_value(event: &EventInfo, metadata: &EventMetadata) -> Value {
        let mut buf = Vec::new();
        event.write_json(metadata, &mut buf).unwrap();
        serde_json::from_slice(&buf).unwrap()
    }

    #[test]
    fn test_minimal_event_has_only_time_severity_and_message() {
        let event = EventInfo::new("INFO", "hello").with_time(1_700_000_000.123);

        let value = to_value(&event, &EventMetadata::default());

        assert_eq!(
            value,
            json!({"time": 1_700_000_000.123, "event": {"severity": "INFO", "message": "hello"}})
        );
    }

    #[test]
    fn test_full_event_and_metadata() {
        let mut properties = BTreeMap::new();
        properties.insert("request_id".to_string(), "abc".to_string());
        let event = EventInfo::new("ERROR", "boom")
            .with_time(12.5)
            .with_logger_name("app.db")
            .with_thread_name("worker-1")
            .with_properties(properties)
            .with_exception_message("java.io.IOException: disk full")
            .with_marker("AUDIT");
        let metadata = EventMetadata {
            host: Some("web-1".to_string()),
            index: Some("main".to_string()),
            source: Some("app".to_string()),
            sourcetype: Some("log4j".to_string()),
        };

        let value = to_value(&event, &metadata);

        assert_eq!(
            value,
            json!({
                "time": 12.5,
                "host": "web-1",
                "index": "main",
                "source": "app",
                "sourcetype": "log4j",
                "event": {
                    "severity": "ERROR",
                    "message": "boom",
                    "logger": "app.db",
                    "thread": "worker-1",
                    "exception": "java.io.IOException: disk full",
                    "properties": {"request_id": "abc"},
                    "marker": "AUDIT"
                }
            })
        );
    }

    #[test]
    fn test_empty_values_are_omitted() {
        let event = EventInfo::new("", "only message")
            .with_logger_name("")
            .with_thread_name("")
            .with_properties(BTreeMap::new())
            .with_marker("");
        let metadata = EventMetadata {
            host: Some(String::new()),
            ..Default::default()
        };

        let value = to_value(&event, &metadata);

        assert!(value.get("host").is_none());
        assert_eq!(value["event"], json!({"message": "only message"}));
    }

    #[test]
    fn test_estimated_size_counts_severity_and_message() {
        let event = EventInfo::new("WARN", "disk almost full").with_logger_name("very.long.logger");
        assert_eq!(event.estimated_size(), 4 + 16);
    }

    #[test]
    fn test_time_has_millisecond_precision() {
        let event = EventInfo::new("INFO", "x").with_time(1.23456);
        assert!((event.time() - 1.235).abs() < f64::EPSILON);

        let now = EventInfo::new("INFO", "x").time();
        assert!(now > 1_600_000_000.0);
        assert!(((now * 1000.0).round() - now * 1000.0).abs() < 1e-3);
    }
}
