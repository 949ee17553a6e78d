// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wire constants and batching defaults for the HTTP Event Collector.

use std::time::Duration;

/// Path appended to the configured base url.
pub const COLLECTOR_PATH: &str = "/services/collector";

/// Authorization scheme; the header value is `Splunk <token>`.
pub const AUTHORIZATION_SCHEME: &str = "Splunk";

pub const CONTENT_TYPE: &str = "application/json; profile=urn:splunk:event:1.0; charset=utf-8";

/// Envelope keys.
pub const METADATA_TIME_TAG: &str = "time";
pub const METADATA_HOST_TAG: &str = "host";
pub const METADATA_INDEX_TAG: &str = "index";
pub const METADATA_SOURCE_TAG: &str = "source";
pub const METADATA_SOURCETYPE_TAG: &str = "sourcetype";

/// Fallback batch interval when the configured value cannot be parsed.
pub const DEFAULT_BATCH_INTERVAL: Duration = Duration::from_secs(10);

/// Fallback batch size (estimated bytes) when the configured value cannot be parsed.
pub const DEFAULT_BATCH_SIZE_BYTES: usize = 10 * 1_024;

/// Fallback batch count when the configured value cannot be parsed.
pub const DEFAULT_BATCH_COUNT: usize = 10;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// First resend delay; doubled after every retry.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the resend delay.
pub const DEFAULT_RETRY_DELAY_CEILING: Duration = Duration::from_secs(60);
