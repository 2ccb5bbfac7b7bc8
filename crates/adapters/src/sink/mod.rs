// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event sink adapters

mod log;

pub use self::log::LogEventSink;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeEventSink;

use async_trait::async_trait;
use uniq_core::Event;

/// Receives every lock lifecycle event
#[async_trait]
pub trait EventSink: Clone + Send + Sync + 'static {
    async fn emit(&self, event: &Event);
}

/// Sink that discards events
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpEventSink;

impl NoOpEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: &Event) {}
}
