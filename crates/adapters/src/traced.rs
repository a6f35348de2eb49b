// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability.

use crate::sink::{ProcessedEventSink, SinkError};
use async_trait::async_trait;
use tracing::Instrument;
use udevbroker_core::Event;

/// Wrapper that adds tracing to any [`ProcessedEventSink`].
#[derive(Clone)]
pub struct TracedSink<S> {
    inner: S,
}

impl<S> TracedSink<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: ProcessedEventSink> ProcessedEventSink for TracedSink<S> {
    async fn publish(&self, event: &Event) -> Result<(), SinkError> {
        let span = tracing::info_span!(
            "sink.publish",
            seqnum = event.seqnum,
            devpath = %event.devpath,
        );
        async {
            let start = std::time::Instant::now();
            let result = self.inner.publish(event).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::debug!(elapsed_ms, "published"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "publish failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
