// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake event sink for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::EventSink;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use uniq_core::Event;

/// Fake event sink that records every event
#[derive(Clone, Default)]
pub struct FakeEventSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl FakeEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Names of recorded events, in order
    pub fn names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(Event::name)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().into_iter().filter(|n| *n == name).count()
    }
}

#[async_trait]
impl EventSink for FakeEventSink {
    async fn emit(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
