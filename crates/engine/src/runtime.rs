// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniqueness runtime: the lifecycle hooks a job framework calls
//!
//! Each hook digests the job into its lock key, feeds the lifecycle event into
//! the job's [`JobLock`](uniq_core::JobLock) and executes the resulting effects.
//! Failed acquisitions are routed to the conflict action or the connection-error
//! action depending on why they failed, never both.

use crate::error::QuorumError;
use crate::executor::{Executed, Executor};
use crate::keeper::{KeeperStatus, LockKeeper};
use crate::quorum::QuorumClient;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tracing::Instrument;
use uniq_adapters::{EventSink, LockNode, LogEventSink, MemoryNode, TracedLockNode};
use uniq_core::{
    Clock, ConfigError, ConflictDecision, ConflictEvent, ConnectionDecision, ConnectionErrorEvent,
    Event, Job, JobIdentity, JobPolicy, KeyDigester, LifecycleEvent, LockContext, LockHandle,
    LockInput, LockKey, LockScope, LockTicket, OwnerToken, SystemClock, TokenGen,
    UniquenessConfig, UniquenessError, UuidTokenGen,
};

/// Runtime adapter dependencies
pub struct UniquenessDeps<N, S, G, C> {
    pub nodes: Vec<N>,
    pub sink: S,
    pub tokens: G,
    pub clock: C,
}

/// Whether the job framework should go ahead with the job
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Skip quietly: a duplicate was dropped
    Deny,
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allow)
    }
}

/// Result of driving a job's lock through one input
struct Driven {
    verdict: Verdict,
    acquired: Option<LockHandle>,
}

/// How a failed or successful acquisition feeds back into the state machine
struct Settled {
    input: LockInput,
    outcome: Result<Verdict, UniquenessError>,
    acquired: Option<LockHandle>,
}

/// Job uniqueness coordinator
pub struct Uniqueness<N, S, G = UuidTokenGen, C = SystemClock> {
    config: Arc<UniquenessConfig>,
    digester: KeyDigester,
    client: Arc<QuorumClient<TracedLockNode<N>, G, C>>,
    executor: Executor<TracedLockNode<N>, G, C, S>,
    sink: S,
    /// Keepers of locks held by running jobs, keyed by owner token
    keepers: Mutex<HashMap<OwnerToken, LockKeeper>>,
}

impl Uniqueness<MemoryNode, LogEventSink> {
    /// Single-process runtime over in-memory nodes, one per configured address
    ///
    /// The nodes live inside this process, so duplicates are only detected
    /// among jobs sharing this `Uniqueness`. Meant for tests, local development
    /// and single-worker deployments; workers in separate processes need a
    /// shared [`LockNode`] backend passed to [`Uniqueness::new`].
    pub fn in_memory(config: Arc<UniquenessConfig>) -> Result<Self, UniquenessError> {
        let nodes = config.redlock_servers.iter().map(MemoryNode::new).collect();
        Self::new(
            config,
            UniquenessDeps {
                nodes,
                sink: LogEventSink,
                tokens: UuidTokenGen,
                clock: SystemClock,
            },
        )
    }
}

impl<N, S, G, C> Uniqueness<N, S, G, C>
where
    N: LockNode,
    S: EventSink,
    G: TokenGen,
    C: Clock,
{
    /// Create a new runtime; fails on any configuration problem
    pub fn new(
        config: Arc<UniquenessConfig>,
        deps: UniquenessDeps<N, S, G, C>,
    ) -> Result<Self, UniquenessError> {
        config.validate()?;
        if deps.nodes.is_empty() {
            return Err(ConfigError::NoServers.into());
        }
        config.redlock_options.validate(deps.nodes.len())?;

        let nodes = deps.nodes.into_iter().map(TracedLockNode::new).collect();
        let client = Arc::new(QuorumClient::new(
            nodes,
            config.redlock_options.clone(),
            deps.tokens,
            deps.clock,
        ));
        tracing::info!(
            nodes = client.node_count(),
            quorum = client.quorum(),
            prefix = %config.lock_prefix,
            default_strategy = %config.default_strategy,
            "uniqueness runtime ready"
        );

        Ok(Self {
            digester: config.digester(),
            executor: Executor::new(Arc::clone(&client), deps.sink.clone()),
            client,
            sink: deps.sink,
            config,
            keepers: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &UniquenessConfig {
        &self.config
    }

    pub fn lock_key(&self, job: &JobIdentity) -> LockKey {
        self.digester.digest(job)
    }

    /// Number of locks currently being kept alive
    pub fn active_keepers(&self) -> usize {
        self.keepers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Called before the job is pushed to the queue
    pub async fn on_enqueue(&self, job: &mut Job) -> Result<Verdict, UniquenessError> {
        let driven = self
            .drive(job, LockInput::Lifecycle(LifecycleEvent::Enqueue))
            .await?;
        Ok(driven.verdict)
    }

    /// Called by the worker before running the job
    pub async fn on_execution_start(&self, job: &mut Job) -> Result<Verdict, UniquenessError> {
        let driven = self
            .drive(job, LockInput::Lifecycle(LifecycleEvent::ExecutionStart))
            .await?;

        if driven.verdict.is_allowed() && self.config.auto_extend {
            if let Some(ticket) = job.lock.ticket() {
                let handle = match driven.acquired {
                    Some(handle) if handle.ticket == *ticket => handle,
                    // Held since enqueue, possibly by another process
                    _ => {
                        let ttl = self.config.policy_for(job.class()).ttl(ticket.scope);
                        LockHandle::adopt(ticket.clone(), ttl, self.client.clock().now())
                    }
                };
                self.start_keeper(handle);
            }
        }
        Ok(driven.verdict)
    }

    /// Called by the worker once the job finished, successfully or not
    pub async fn on_execution_end(&self, job: &mut Job) -> Result<(), UniquenessError> {
        if let Some(KeeperStatus::Lost { reason }) = self.stop_keeper(job) {
            let ticket = job.lock.ticket().cloned();
            let key = ticket
                .as_ref()
                .map(|ticket| ticket.key.clone())
                .unwrap_or_default();
            tracing::error!(key, job = %job.identity, reason, "job finished without its lock");
            // Nodes cut off during the loss may still carry our token
            if let Some(ticket) = &ticket {
                if let Err(e) = self.client.release(ticket).await {
                    tracing::warn!(
                        key,
                        error = %e,
                        "release after loss failed, lock will expire"
                    );
                }
            }
            self.drive(job, LockInput::Lost).await?;
            return Err(UniquenessError::LockLost {
                key,
                job: job.identity.clone(),
            });
        }

        self.drive(job, LockInput::Lifecycle(LifecycleEvent::ExecutionEnd))
            .await?;
        Ok(())
    }

    /// Run `work` between the start and end hooks
    ///
    /// Returns `Ok(None)` when the job was skipped as a duplicate. A per-class
    /// execution timeout abandons `work` and releases the job's locks. If this
    /// future is dropped or `work` panics before the end hook runs, the lock
    /// keeper is stopped and the lock released in the background.
    pub async fn perform<F, Fut, T>(
        &self,
        job: &mut Job,
        work: F,
    ) -> Result<Option<T>, UniquenessError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if !self.on_execution_start(job).await?.is_allowed() {
            return Ok(None);
        }

        let guard = ExecutionGuard {
            uniq: self,
            ticket: job.lock.ticket().cloned(),
        };

        let timeout = self.config.policy_for(job.class()).execution_timeout;
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, work()).await.map_err(|_| limit),
            None => Ok(work().await),
        };
        let ended = self.on_execution_end(job).await;
        guard.disarm();

        match (output, ended) {
            (Ok(value), ended) => ended.map(|()| Some(value)),
            (Err(limit), Err(lost @ UniquenessError::LockLost { .. })) => {
                tracing::error!(
                    job = %job.identity,
                    timeout_ms = limit.as_millis() as u64,
                    "execution timed out after its lock was lost"
                );
                Err(lost)
            }
            (Err(limit), ended) => {
                if let Err(e) = ended {
                    tracing::warn!(job = %job.identity, error = %e, "cleanup after timeout failed");
                }
                Err(UniquenessError::ExecutionTimeout {
                    job: job.identity.clone(),
                    timeout: limit,
                })
            }
        }
    }

    /// Remove locks regardless of owner
    ///
    /// With `arguments`, removes the enqueue and runtime locks of that one
    /// identity; without, every lock of `class`. Returns how many were removed.
    pub async fn unlock(
        &self,
        class: &str,
        arguments: Option<&[Value]>,
    ) -> Result<u64, UniquenessError> {
        let (pattern, removed) = match arguments {
            Some(arguments) => {
                let identity = JobIdentity::new(class, arguments.to_vec());
                let key = self.digester.digest(&identity);
                let mut removed = 0;
                for scope in [LockScope::Enqueue, LockScope::Runtime] {
                    let found = self
                        .client
                        .force_unlock(&key.for_scope(scope))
                        .await
                        .map_err(|e| unlock_failure(e, &identity, scope))?;
                    if found {
                        removed += 1;
                    }
                }
                (key.to_string(), removed)
            }
            None => {
                let pattern = LockKey::class_pattern(self.digester.prefix(), class);
                let removed = self
                    .client
                    .unlock_prefix(&pattern)
                    .await
                    .map_err(|e| {
                        unlock_failure(e, &JobIdentity::new(class, Vec::new()), LockScope::Enqueue)
                    })?;
                (pattern, removed)
            }
        };

        tracing::info!(pattern, removed, "locks removed by operator");
        self.sink.emit(&Event::Unlocked { pattern, removed }).await;
        Ok(removed)
    }

    async fn drive(&self, job: &mut Job, input: LockInput) -> Result<Driven, UniquenessError> {
        let policy = self.config.policy_for(job.class());
        let key = self.digester.digest(&job.identity);
        let span = tracing::info_span!(
            "uniqueness",
            job = %job.identity,
            strategy = %policy.strategy,
            ?input
        );

        async {
            let ctx = LockContext {
                strategy: policy.strategy,
                key: &key,
            };
            let mut inputs = VecDeque::from([input]);
            let mut outcome = Ok(Verdict::Allow);
            let mut acquired = None;

            while let Some(input) = inputs.pop_front() {
                let (next, effects) = job.lock.transition(&ctx, input);
                tracing::debug!(
                    from = job.lock.state.name(),
                    to = next.state.name(),
                    effects = effects.len(),
                    "lock transition"
                );
                job.lock = next;

                for effect in effects {
                    let executed = self.executor.execute(effect, &policy).await;
                    let Some(settled) = self.settle(executed, &job.identity, &policy).await
                    else {
                        continue;
                    };
                    inputs.push_back(settled.input);
                    if settled.acquired.is_some() {
                        acquired = settled.acquired;
                    }
                    // The first non-allow outcome decides
                    if matches!(outcome, Ok(Verdict::Allow)) {
                        outcome = settled.outcome;
                    }
                }
            }

            outcome.map(|verdict| Driven { verdict, acquired })
        }
        .instrument(span)
        .await
    }

    /// Turn an acquisition result into the next state machine input
    async fn settle(
        &self,
        executed: Executed,
        job: &JobIdentity,
        policy: &JobPolicy,
    ) -> Option<Settled> {
        let mut executed = executed;
        let mut attempt = 1;
        loop {
            match executed {
                Executed::Done => return None,

                Executed::Acquired(handle) => {
                    return Some(Settled {
                        input: LockInput::Granted {
                            ticket: handle.ticket.clone(),
                        },
                        outcome: Ok(Verdict::Allow),
                        acquired: Some(handle),
                    });
                }

                Executed::AcquireFailed {
                    key,
                    scope,
                    error: QuorumError::Conflict { .. },
                } => {
                    let event = ConflictEvent {
                        key,
                        job: job.clone(),
                        scope,
                        attempt,
                    };
                    match policy.conflict_action(scope).resolve(&event) {
                        ConflictDecision::Retry { delay } => {
                            tracing::debug!(
                                key = event.key,
                                attempt,
                                delay_ms = delay.as_millis() as u64,
                                "conflict handler requested retry"
                            );
                            tokio::time::sleep(delay).await;
                            attempt += 1;
                            executed = self
                                .executor
                                .acquire(event.key, scope, policy.ttl(scope))
                                .await;
                        }
                        ConflictDecision::Drop => {
                            return Some(Settled {
                                input: LockInput::Denied,
                                outcome: Ok(Verdict::Deny),
                                acquired: None,
                            });
                        }
                        ConflictDecision::Fail => {
                            return Some(Settled {
                                input: LockInput::Denied,
                                outcome: Err(UniquenessError::Conflict {
                                    key: event.key,
                                    job: event.job,
                                    scope,
                                }),
                                acquired: None,
                            });
                        }
                    }
                }

                Executed::AcquireFailed { key, scope, error } => {
                    let event = ConnectionErrorEvent {
                        key,
                        job: job.clone(),
                        scope,
                        cause: error.cause(),
                    };
                    let proceed = policy.on_connection_error.resolve(&event)
                        == ConnectionDecision::ProceedWithoutLock;
                    let outcome = if proceed {
                        Ok(Verdict::Allow)
                    } else {
                        Err(UniquenessError::ConnectionFailure {
                            key: event.key,
                            job: event.job,
                            scope,
                            cause: event.cause.clone(),
                        })
                    };
                    return Some(Settled {
                        input: LockInput::Unreachable {
                            proceed,
                            cause: event.cause,
                        },
                        outcome,
                        acquired: None,
                    });
                }
            }
        }
    }

    fn start_keeper(&self, handle: LockHandle) {
        let interval = self.config.extend_interval_for(handle.ttl);
        let token = handle.token().clone();
        let keeper = LockKeeper::spawn(
            Arc::clone(&self.client),
            self.sink.clone(),
            handle,
            interval,
        );
        self.keepers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(token, keeper);
    }

    /// Stop keeping `ticket` and give it back without waiting
    fn abandon(&self, ticket: LockTicket) {
        let keeper = self
            .keepers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&ticket.token);
        if let Some(keeper) = keeper {
            let _ = keeper.stop();
        }
        tracing::warn!(key = ticket.key, "execution abandoned before its end hook");

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(key = ticket.key, "no runtime to release on, lock will expire");
            return;
        };
        let client = Arc::clone(&self.client);
        runtime.spawn(
            async move {
                if let Err(e) = client.release(&ticket).await {
                    tracing::warn!(
                        key = ticket.key,
                        error = %e,
                        "release failed, lock will expire"
                    );
                }
            }
            .in_current_span(),
        );
    }

    fn stop_keeper(&self, job: &Job) -> Option<KeeperStatus> {
        let token = &job.lock.ticket()?.token;
        let keeper = self
            .keepers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(token)?;
        Some(keeper.stop())
    }
}

/// Runs [`Uniqueness::abandon`] unless `perform` reached its end hook
struct ExecutionGuard<'a, N, S, G, C>
where
    N: LockNode,
    S: EventSink,
    G: TokenGen,
    C: Clock,
{
    uniq: &'a Uniqueness<N, S, G, C>,
    ticket: Option<LockTicket>,
}

impl<N, S, G, C> ExecutionGuard<'_, N, S, G, C>
where
    N: LockNode,
    S: EventSink,
    G: TokenGen,
    C: Clock,
{
    fn disarm(mut self) {
        self.ticket = None;
    }
}

impl<N, S, G, C> Drop for ExecutionGuard<'_, N, S, G, C>
where
    N: LockNode,
    S: EventSink,
    G: TokenGen,
    C: Clock,
{
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            self.uniq.abandon(ticket);
        }
    }
}

fn unlock_failure(error: QuorumError, job: &JobIdentity, scope: LockScope) -> UniquenessError {
    UniquenessError::ConnectionFailure {
        key: error.key().to_string(),
        job: job.clone(),
        scope,
        cause: error.cause(),
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
