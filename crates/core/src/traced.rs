// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracing infrastructure for lock effects

use crate::strategy::LockEffect;

/// Trait for operations that should be traced
///
/// Provides consistent naming and structured fields for logging.
pub trait TracedEffect {
    /// Effect name for log spans (e.g., "acquire", "release")
    fn name(&self) -> &'static str;

    /// Key-value pairs for structured logging
    fn fields(&self) -> Vec<(&'static str, String)>;
}

impl TracedEffect for LockEffect {
    fn name(&self) -> &'static str {
        match self {
            LockEffect::Acquire { .. } => "acquire",
            LockEffect::Release { .. } => "release",
            LockEffect::Emit(_) => "emit",
        }
    }

    fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            LockEffect::Acquire { key, scope } => {
                vec![("key", key.clone()), ("scope", scope.to_string())]
            }
            LockEffect::Release { ticket } => vec![
                ("key", ticket.key.clone()),
                ("token", ticket.token.to_string()),
                ("scope", ticket.scope.to_string()),
            ],
            LockEffect::Emit(event) => vec![
                ("event", event.name().to_string()),
                ("key", event.key().to_string()),
            ],
        }
    }
}
