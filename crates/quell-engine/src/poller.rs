//! Readiness poller.
//!
//! The editor gives no reliable "ready" signal, so readiness is detected by
//! re-evaluating a predicate on a fixed interval with a bounded attempt
//! budget. Exhaustion is an outcome, not an error: callers decide whether to
//! continue optimistically.

use quell_common::error::StabilizationError;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

/// Interval and attempt budget for one kind of wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollPolicy {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Attempts actually made; a zero budget still evaluates once.
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Upper bound on the time a session under this policy can take.
    pub fn budget(&self) -> Duration {
        self.interval() * self.attempts()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Satisfied { attempts: u32 },
    Exhausted { attempts: u32 },
}

impl PollOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, PollOutcome::Satisfied { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            PollOutcome::Satisfied { attempts } | PollOutcome::Exhausted { attempts } => *attempts,
        }
    }

    /// Promote exhaustion to [`StabilizationError::DetectionExhausted`].
    pub fn into_result(self, condition: &str) -> Result<u32, StabilizationError> {
        match self {
            PollOutcome::Satisfied { attempts } => Ok(attempts),
            PollOutcome::Exhausted { attempts } => Err(StabilizationError::DetectionExhausted {
                condition: condition.to_string(),
                attempts,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    Satisfied,
    Exhausted,
}

/// State of a single bounded wait.
#[derive(Debug)]
pub struct PollingSession<'a> {
    label: &'a str,
    policy: PollPolicy,
    attempts: u32,
    state: SessionState,
}

impl<'a> PollingSession<'a> {
    pub fn new(label: &'a str, policy: PollPolicy) -> Self {
        Self {
            label,
            policy,
            attempts: 0,
            state: SessionState::Pending,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record one predicate evaluation. Errors count as a miss.
    pub fn record<E: Display>(&mut self, evaluation: Result<bool, E>) -> SessionState {
        if self.state != SessionState::Pending {
            return self.state;
        }
        self.attempts += 1;
        let satisfied = match evaluation {
            Ok(value) => value,
            Err(e) => {
                debug!(
                    "{}: predicate error on attempt {} (treated as miss): {}",
                    self.label, self.attempts, e
                );
                false
            }
        };
        self.state = if satisfied {
            SessionState::Satisfied
        } else if self.attempts >= self.policy.attempts() {
            SessionState::Exhausted
        } else {
            SessionState::Pending
        };
        self.state
    }

    fn outcome(&self) -> Option<PollOutcome> {
        match self.state {
            SessionState::Pending => None,
            SessionState::Satisfied => Some(PollOutcome::Satisfied {
                attempts: self.attempts,
            }),
            SessionState::Exhausted => Some(PollOutcome::Exhausted {
                attempts: self.attempts,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    policy: PollPolicy,
}

impl Poller {
    pub fn new(policy: PollPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Evaluate `predicate` once per interval until it holds or the budget is
    /// spent. Attempt `k` runs `k * interval` after the call.
    pub async fn await_condition<F, Fut, E>(&self, label: &str, mut predicate: F) -> PollOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
        E: Display,
    {
        let mut session = PollingSession::new(label, self.policy);
        loop {
            tokio::time::sleep(self.policy.interval()).await;
            session.record(predicate().await);
            if let Some(outcome) = session.outcome() {
                match outcome {
                    PollOutcome::Satisfied { attempts } => {
                        debug!("{}: satisfied after {} attempts", label, attempts)
                    }
                    PollOutcome::Exhausted { attempts } => info!(
                        "{}: not detected after {} attempts, continuing anyway",
                        label, attempts
                    ),
                }
                return outcome;
            }
        }
    }
}

/// One-shot form of [`Poller::await_condition`].
pub async fn await_condition<F, Fut, E>(label: &str, policy: PollPolicy, predicate: F) -> PollOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: Display,
{
    Poller::new(policy).await_condition(label, predicate).await
}
