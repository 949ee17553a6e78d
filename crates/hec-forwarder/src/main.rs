// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, sync::Arc};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use splunk_hec::{prepare_client_provider, EventInfo, HecConfig, HecError, HecSender};

const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
const SEVERITIES: [&str; 6] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "FATAL"];

#[tokio::main]
pub async fn main() {
    let log_level = env::var("HEC_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    if let Err(e) = prepare_client_provider() {
        error!("Error preparing TLS crypto provider: {e}");
        return;
    }

    let config = match HecConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating HEC configuration: {e}");
            return;
        }
    };
    let default_severity = env::var("HEC_FORWARDER_SEVERITY").unwrap_or("INFO".to_string());
    let logger_name = env::var("HEC_FORWARDER_LOGGER").ok();
    let shutdown_grace = env::var("HEC_SHUTDOWN_GRACE_MS")
        .ok()
        .and_then(|ms| ms.parse::<u64>().ok())
        .map_or(DEFAULT_SHUTDOWN_GRACE, Duration::from_millis);

    let sender = match HecSender::new(config) {
        Ok(s) => s,
        Err(e) => {
            error!("Error starting HEC sender: {e}");
            return;
        }
    };
    sender.on_error(Arc::new(|events: &[EventInfo], err: &HecError| {
        if let HecError::Server(server) = err {
            error!(
                "Collector rejected {} events with code {}: {}",
                events.len(),
                server.code(),
                server.text()
            );
        }
    }));

    info!("Forwarding stdin to {}", sender.config().collector_url());

    let mut lines = BufReader::new(stdin()).lines();
    let mut forwarded: u64 = 0;
    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let (severity, message) = split_severity(&line, &default_severity);
                    let event = EventInfo::new(severity, message);
                    let event = match &logger_name {
                        Some(name) => event.with_logger_name(name.as_str()),
                        None => event,
                    };
                    sender.send(event);
                    forwarded += 1;
                }
                Ok(None) => break,
                Err(e) => {
                    error!("Error reading stdin: {e}");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    sender.close();
    debug!("Forwarded {forwarded} lines, waiting {shutdown_grace:?} for delivery");
    sleep(shutdown_grace).await;
}

/// Splits a leading severity word such as `ERROR` off the line.
fn split_severity<'a>(line: &'a str, default_severity: &'a str) -> (&'a str, &'a str) {
    if let Some((head, rest)) = line.split_once(' ') {
        let head = head.trim_end_matches(':');
        if let Some(severity) = SEVERITIES.iter().find(|s| s.eq_ignore_ascii_case(head)) {
            return (*severity, rest.trim_start());
        }
    }
    (default_severity, line)
}
