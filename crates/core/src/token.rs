// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Owner (fencing) tokens
//!
//! Every acquisition attempt writes a fresh token as the lock value. Extend and
//! release only touch a node whose stored value equals that token, so a process
//! whose lock expired cannot disturb the next owner.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Value stored at the lock nodes identifying one acquisition
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerToken(pub String);

impl OwnerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OwnerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Generates owner tokens
pub trait TokenGen: Clone + Send + Sync + 'static {
    fn next(&self) -> OwnerToken;
}

/// Random UUID v4 tokens
#[derive(Clone, Debug, Default)]
pub struct UuidTokenGen;

impl TokenGen for UuidTokenGen {
    fn next(&self) -> OwnerToken {
        OwnerToken(uuid::Uuid::new_v4().to_string())
    }
}

/// Predictable tokens for tests
#[derive(Clone, Debug)]
pub struct SequentialTokenGen {
    prefix: String,
    counter: Arc<AtomicU64>,
}

impl SequentialTokenGen {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: Arc::new(AtomicU64::new(1)),
        }
    }
}

impl Default for SequentialTokenGen {
    fn default() -> Self {
        Self::new("token")
    }
}

impl TokenGen for SequentialTokenGen {
    fn next(&self) -> OwnerToken {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        OwnerToken(format!("{}-{}", self.prefix, n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uuid_tokens_are_unique() {
        let tokens = UuidTokenGen;
        let a = tokens.next();
        let b = tokens.next();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn sequential_tokens_share_a_counter_across_clones() {
        let tokens = SequentialTokenGen::new("owner");
        let clone = tokens.clone();
        assert_eq!(tokens.next().as_str(), "owner-1");
        assert_eq!(clone.next().as_str(), "owner-2");
        assert_eq!(tokens.next().as_str(), "owner-3");
    }

    #[test]
    fn token_serializes_as_plain_string() {
        let json = serde_json::to_string(&OwnerToken::new("abc")).unwrap();
        assert_eq!(json, "\"abc\"");
    }
}
