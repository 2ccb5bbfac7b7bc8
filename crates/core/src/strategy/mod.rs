// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniqueness strategies and the per-job lock state machine
//!
//! A [`LockStrategy`] says which lock steps happen at each lifecycle event.
//! [`JobLock`] applies those steps to one job instance as a pure transition
//! function: the caller executes the returned [`LockEffect`]s against the lock
//! nodes and feeds the outcome back in as a [`LockInput`].
//!
//! ```text
//! Idle ──► Requested ──► Held ──► Released
//!              │           └────► Lost
//!              ├─► Conflicted
//!              ├─► Failed
//!              └─► Unprotected
//! ```

use crate::digest::LockKey;
use crate::event::Event;
use crate::token::OwnerToken;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// When in a job's life exclusivity is enforced
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockStrategy {
    /// Locked from enqueue until execution starts
    UntilExecuting,
    /// Locked from enqueue until execution finishes
    #[default]
    UntilExecuted,
    /// Enqueue lock until execution starts, then a runtime lock until it finishes
    UntilAndWhileExecuting,
    /// Runtime lock only; duplicate enqueues are allowed
    WhileExecuting,
}

impl LockStrategy {
    pub const ALL: [LockStrategy; 4] = [
        LockStrategy::UntilExecuting,
        LockStrategy::UntilExecuted,
        LockStrategy::UntilAndWhileExecuting,
        LockStrategy::WhileExecuting,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LockStrategy::UntilExecuting => "until_executing",
            LockStrategy::UntilExecuted => "until_executed",
            LockStrategy::UntilAndWhileExecuting => "until_and_while_executing",
            LockStrategy::WhileExecuting => "while_executing",
        }
    }

    /// Lock steps to run, in order, when `event` happens
    pub fn plan(&self, event: LifecycleEvent) -> Vec<LockStep> {
        use LifecycleEvent as E;
        use LockScope::{Enqueue, Runtime};
        use LockStep::{Acquire, Release};

        match (self, event) {
            (LockStrategy::UntilExecuting, E::Enqueue) => vec![Acquire(Enqueue)],
            (LockStrategy::UntilExecuting, E::ExecutionStart) => vec![Release(Enqueue)],
            (LockStrategy::UntilExecuting, E::ExecutionEnd) => vec![],

            (LockStrategy::UntilExecuted, E::Enqueue) => vec![Acquire(Enqueue)],
            (LockStrategy::UntilExecuted, E::ExecutionStart) => vec![],
            (LockStrategy::UntilExecuted, E::ExecutionEnd) => vec![Release(Enqueue)],

            (LockStrategy::UntilAndWhileExecuting, E::Enqueue) => vec![Acquire(Enqueue)],
            (LockStrategy::UntilAndWhileExecuting, E::ExecutionStart) => {
                vec![Release(Enqueue), Acquire(Runtime)]
            }
            (LockStrategy::UntilAndWhileExecuting, E::ExecutionEnd) => vec![Release(Runtime)],

            (LockStrategy::WhileExecuting, E::Enqueue) => vec![],
            (LockStrategy::WhileExecuting, E::ExecutionStart) => vec![Acquire(Runtime)],
            (LockStrategy::WhileExecuting, E::ExecutionEnd) => vec![Release(Runtime)],
        }
    }

    /// Whether the strategy holds any lock while the job runs
    pub fn locks_during_execution(&self) -> bool {
        !matches!(self, LockStrategy::UntilExecuting)
    }
}

impl std::fmt::Display for LockStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LockStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LockStrategy::ALL
            .into_iter()
            .find(|strategy| strategy.name() == s)
            .ok_or_else(|| format!("unknown lock strategy: {s}"))
    }
}

/// Which of a job's two keys a lock step refers to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockScope {
    Enqueue,
    Runtime,
}

impl std::fmt::Display for LockScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockScope::Enqueue => f.write_str("enqueue"),
            LockScope::Runtime => f.write_str("runtime"),
        }
    }
}

/// Job framework lifecycle events
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Enqueue,
    ExecutionStart,
    ExecutionEnd,
}

/// A single lock operation requested by a strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockStep {
    Acquire(LockScope),
    Release(LockScope),
}

/// Serializable proof of a held lock; travels with the job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockTicket {
    /// Key at the lock nodes (scope suffix included)
    pub key: String,
    pub token: OwnerToken,
    pub scope: LockScope,
}

/// Lock lifecycle of one job instance
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockState {
    #[default]
    Idle,
    /// Acquisition in flight
    Requested { scope: LockScope },
    Held { ticket: LockTicket },
    /// Terminal: lock given back (or never needed again)
    Released,
    /// Terminal for this attempt: another instance holds the lock
    Conflicted { scope: LockScope },
    /// Terminal for this attempt: backend unreachable and the handler failed closed
    Failed { scope: LockScope },
    /// Backend unreachable and the handler chose to run without a lock
    Unprotected { scope: LockScope },
    /// Terminal for this attempt: an extend showed the lock expired or was reclaimed
    Lost { scope: LockScope },
}

impl LockState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LockState::Released
                | LockState::Conflicted { .. }
                | LockState::Failed { .. }
                | LockState::Lost { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            LockState::Idle => "idle",
            LockState::Requested { .. } => "requested",
            LockState::Held { .. } => "held",
            LockState::Released => "released",
            LockState::Conflicted { .. } => "conflicted",
            LockState::Failed { .. } => "failed",
            LockState::Unprotected { .. } => "unprotected",
            LockState::Lost { .. } => "lost",
        }
    }

    /// Every state but `Held` may ask for a lock again. A job retried by the
    /// framework after a conflict, an outage or a lost lock carries that state
    /// with it and must not run unlocked.
    fn can_request(&self) -> bool {
        !matches!(self, LockState::Held { .. })
    }
}

/// Inputs driving a [`JobLock`]
#[derive(Clone, Debug)]
pub enum LockInput {
    Lifecycle(LifecycleEvent),
    /// Quorum granted the lock
    Granted { ticket: LockTicket },
    /// Conflict resolved to "do not run"
    Denied,
    /// Backend unreachable; `proceed` is the connection handler's decision
    Unreachable { proceed: bool, cause: String },
    /// The held lock could not be extended
    Lost,
}

/// Work for the caller to perform
#[derive(Clone, Debug, PartialEq)]
pub enum LockEffect {
    Acquire { key: String, scope: LockScope },
    Release { ticket: LockTicket },
    Emit(Event),
}

/// Fixed facts for a job's transitions
#[derive(Clone, Copy, Debug)]
pub struct LockContext<'a> {
    pub strategy: LockStrategy,
    pub key: &'a LockKey,
}

/// Lock state carried with a job instance
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLock {
    #[serde(flatten)]
    pub state: LockState,
}

impl JobLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticket of the lock currently held, if any
    pub fn ticket(&self) -> Option<&LockTicket> {
        match &self.state {
            LockState::Held { ticket } => Some(ticket),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Pure state transition function
    pub fn transition(
        &self,
        ctx: &LockContext<'_>,
        input: LockInput,
    ) -> (JobLock, Vec<LockEffect>) {
        let mut next = self.clone();
        let mut effects = Vec::new();
        let class = ctx.key.class.clone();

        match input {
            LockInput::Lifecycle(event) => {
                for step in ctx.strategy.plan(event) {
                    match step {
                        LockStep::Release(scope) => match &next.state {
                            LockState::Held { ticket } if ticket.scope == scope => {
                                effects.push(LockEffect::Release {
                                    ticket: ticket.clone(),
                                });
                                effects.push(LockEffect::Emit(Event::LockReleased {
                                    key: ticket.key.clone(),
                                    class: class.clone(),
                                    scope,
                                }));
                                next.state = LockState::Released;
                            }
                            LockState::Unprotected { scope: s } if *s == scope => {
                                next.state = LockState::Released;
                            }
                            _ => {
                                // Not holding this scope, nothing to give back
                            }
                        },
                        LockStep::Acquire(scope) => {
                            if next.state.can_request() {
                                next.state = LockState::Requested { scope };
                                effects.push(LockEffect::Acquire {
                                    key: ctx.key.for_scope(scope),
                                    scope,
                                });
                            }
                        }
                    }
                }
            }

            LockInput::Granted { ticket } => match &self.state {
                LockState::Requested { scope } if *scope == ticket.scope => {
                    effects.push(LockEffect::Emit(Event::LockAcquired {
                        key: ticket.key.clone(),
                        class,
                        scope: *scope,
                    }));
                    next.state = LockState::Held { ticket };
                }
                _ => {
                    // Stale grant for a request we are no longer waiting on
                }
            },

            LockInput::Denied => {
                if let LockState::Requested { scope } = &self.state {
                    effects.push(LockEffect::Emit(Event::LockConflict {
                        key: ctx.key.for_scope(*scope),
                        class,
                        scope: *scope,
                    }));
                    next.state = LockState::Conflicted { scope: *scope };
                }
            }

            LockInput::Unreachable { proceed, cause } => {
                if let LockState::Requested { scope } = &self.state {
                    let key = ctx.key.for_scope(*scope);
                    effects.push(LockEffect::Emit(Event::ConnectionFailed {
                        key: key.clone(),
                        class: class.clone(),
                        cause,
                    }));
                    if proceed {
                        effects.push(LockEffect::Emit(Event::ProceededWithoutLock {
                            key,
                            class,
                            scope: *scope,
                        }));
                        next.state = LockState::Unprotected { scope: *scope };
                    } else {
                        next.state = LockState::Failed { scope: *scope };
                    }
                }
            }

            LockInput::Lost => {
                if let LockState::Held { ticket } = &self.state {
                    effects.push(LockEffect::Emit(Event::LockLost {
                        key: ticket.key.clone(),
                        class,
                    }));
                    next.state = LockState::Lost {
                        scope: ticket.scope,
                    };
                }
            }
        }

        (next, effects)
    }
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
