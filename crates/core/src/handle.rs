// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local view of a held lock

use crate::clock::Clock;
use crate::strategy::{LockScope, LockTicket};
use crate::token::OwnerToken;
use std::time::{Duration, Instant};

/// A lock granted by a quorum of nodes
///
/// `validity` is the TTL minus acquisition time and clock drift: the window
/// during which the holder may assume exclusivity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockHandle {
    pub ticket: LockTicket,
    pub acquired_at: Instant,
    pub ttl: Duration,
    pub validity: Duration,
}

impl LockHandle {
    /// Handle for a ticket carried in from another process; validity unknown
    pub fn adopt(ticket: LockTicket, ttl: Duration, now: Instant) -> Self {
        Self {
            ticket,
            acquired_at: now,
            ttl,
            validity: Duration::ZERO,
        }
    }

    pub fn key(&self) -> &str {
        &self.ticket.key
    }

    pub fn token(&self) -> &OwnerToken {
        &self.ticket.token
    }

    pub fn scope(&self) -> LockScope {
        self.ticket.scope
    }

    pub fn expires_at(&self) -> Instant {
        self.acquired_at + self.validity
    }

    pub fn is_expired(&self, clock: &impl Clock) -> bool {
        clock.has_passed(self.expires_at())
    }

    /// Validity left before exclusivity can no longer be assumed
    pub fn remaining(&self, clock: &impl Clock) -> Duration {
        self.expires_at().saturating_duration_since(clock.now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;

    fn handle(clock: &FakeClock) -> LockHandle {
        LockHandle {
            ticket: LockTicket {
                key: "uniq:Sync:abc".to_string(),
                token: OwnerToken::new("t-1"),
                scope: LockScope::Enqueue,
            },
            acquired_at: clock.now(),
            ttl: Duration::from_secs(10),
            validity: Duration::from_millis(9_800),
        }
    }

    #[test]
    fn expires_after_validity_not_ttl() {
        let clock = FakeClock::new();
        let handle = handle(&clock);
        assert!(!handle.is_expired(&clock));

        clock.advance(Duration::from_millis(9_700));
        assert_eq!(handle.remaining(&clock), Duration::from_millis(100));

        clock.advance(Duration::from_millis(100));
        assert!(handle.is_expired(&clock));
        assert_eq!(handle.remaining(&clock), Duration::ZERO);
    }

    #[test]
    fn adopted_handle_has_no_validity() {
        let clock = FakeClock::new();
        let ticket = handle(&clock).ticket;
        let adopted = LockHandle::adopt(ticket, Duration::from_secs(10), clock.now());
        assert!(adopted.is_expired(&clock));
        assert_eq!(adopted.key(), "uniq:Sync:abc");
        assert_eq!(adopted.token().as_str(), "t-1");
    }
}
