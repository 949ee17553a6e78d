// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::config::EventMetadata;
use crate::error::HecError;
use crate::event::EventInfo;

/// Ordered events waiting to be sent, with a running size estimate.
///
/// Once handed to the middleware chain a batch is shared read-only
/// (`Arc<Batch>`) so resends post exactly the same events.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    events: Vec<EventInfo>,
    estimated_size: usize,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: EventInfo) {
        self.estimated_size += event.estimated_size();
        self.events.push(event);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Sum of severity and message lengths, not the serialized size.
    #[must_use]
    pub fn estimated_size(&self) -> usize {
        self.estimated_size
    }

    #[must_use]
    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    /// Serializes every event as a whole JSON document, back to back with no
    /// separator and no enclosing array.
    pub fn to_payload(&self, metadata: &EventMetadata) -> Result<Vec<u8>, HecError> {
        let mut buf = Vec::with_capacity(self.estimated_size + self.events.len() * 64);
        for event in &self.events {
            event.write_json(metadata, &mut buf)?;
        }
        Ok(buf)
    }
}

impl FromIterator<EventInfo> for Batch {
    fn from_iter<I: IntoIterator<Item = EventInfo>>(iter: I) -> Self {
        let mut batch = Batch::new();
        for event in iter {
            batch.push(event);
        }
        batch
    }
}
