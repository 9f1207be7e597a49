//! Stabilization polling
//!
//! After an asynchronous create or update the entity is re-read until its
//! status lands in a target set. Only the read is repeated; the mutating
//! call that started provisioning is never retried here.

use crate::config::PollSettings;
use crate::error::{ReconcileError, Result};
use crate::model::EntityKind;
use crate::state::{Identifier, LifecycleStatus};
use std::future::Future;
use std::time::Duration;
use tokio::time::{Instant, sleep};

/// Statuses an asynchronously provisioned kind moves through
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSets {
    /// Still provisioning
    pub pending: Vec<LifecycleStatus>,

    /// Provisioning finished
    pub target: Vec<LifecycleStatus>,
}

/// Everything one stabilization wait needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StabilizationPolicy {
    pub sets: StatusSets,
    pub delay: Duration,
    pub min_interval: Duration,
    pub continuous_target_occurrence: u32,
    pub timeout: Duration,
}

impl StabilizationPolicy {
    pub fn new(sets: StatusSets, poll: &PollSettings, timeout: Duration) -> Self {
        Self {
            sets,
            delay: poll.delay(),
            min_interval: poll.min_interval(),
            continuous_target_occurrence: poll.continuous_target_occurrence.max(1),
            timeout,
        }
    }
}

/// Verdict after observing one status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Target reached often enough
    Stable,
    /// Keep polling
    Wait,
    /// Status is in neither set
    Unexpected,
}

/// Pure transition function of the poll state machine
#[derive(Debug)]
pub struct StatusWaiter<'a> {
    policy: &'a StabilizationPolicy,
    target_hits: u32,
    last: LifecycleStatus,
}

impl<'a> StatusWaiter<'a> {
    pub fn new(policy: &'a StabilizationPolicy) -> Self {
        Self {
            policy,
            target_hits: 0,
            last: LifecycleStatus::Unknown,
        }
    }

    pub fn last(&self) -> LifecycleStatus {
        self.last
    }

    pub fn observe(&mut self, status: LifecycleStatus) -> PollStep {
        self.last = status;
        if self.policy.sets.target.contains(&status) {
            self.target_hits += 1;
            if self.target_hits >= self.policy.continuous_target_occurrence {
                PollStep::Stable
            } else {
                PollStep::Wait
            }
        } else if self.policy.sets.pending.contains(&status) {
            self.target_hits = 0;
            PollStep::Wait
        } else {
            PollStep::Unexpected
        }
    }
}

/// Re-read until the status is stable, the budget runs out, or the read
/// fails. Returns the value from the final read.
///
/// The deadline is checked before every read, so once it passes no further
/// remote calls are made.
pub async fn wait_for_status<T, F, Fut>(
    policy: &StabilizationPolicy,
    kind: EntityKind,
    id: &Identifier,
    mut refresh: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(T, LifecycleStatus)>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut waiter = StatusWaiter::new(policy);

    tracing::debug!(%kind, %id, "Waiting {:?} before first status check", policy.delay);
    sleep(policy.delay).await;

    loop {
        if Instant::now() >= deadline {
            return Err(ReconcileError::Timeout {
                kind: kind.to_string(),
                id: id.to_string(),
                elapsed_secs: started.elapsed().as_secs(),
                last_status: waiter.last(),
            });
        }

        let (value, status) = refresh().await?;
        match waiter.observe(status) {
            PollStep::Stable => {
                tracing::debug!(%kind, %id, %status, "Entity is stable");
                return Ok(value);
            }
            PollStep::Wait => {
                tracing::debug!(%kind, %id, %status, "Still provisioning");
            }
            PollStep::Unexpected => {
                return Err(ReconcileError::UnexpectedStatus {
                    kind: kind.to_string(),
                    id: id.to_string(),
                    status,
                });
            }
        }

        sleep(policy.min_interval).await;
    }
}
