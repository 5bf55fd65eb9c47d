//! Write Response Handler
//!
//! Counts replica acknowledgments for one write and wakes the coordinator
//! once enough of them have arrived.
//!
//! Which acknowledgments count is a pluggable [`ResponsePolicy`]:
//! - [`AllResponses`]: every replica counts
//! - [`LocalDatacenter`]: only replicas in the coordinator's datacenter
//!   count (local quorum); the rest are still recorded

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Result, RingError};

use super::{ConsistencyLevel, EndpointSnitch, Message};

/// Decides whether an acknowledgment counts toward `block_for`
pub trait ResponsePolicy: Send + Sync + std::fmt::Debug {
    fn counts(&self, message: &Message) -> Result<bool>;
}

/// Every acknowledgment counts
#[derive(Debug, Default, Clone, Copy)]
pub struct AllResponses;

impl ResponsePolicy for AllResponses {
    fn counts(&self, _message: &Message) -> Result<bool> {
        Ok(true)
    }
}

/// Only acknowledgments from the local datacenter count
#[derive(Debug, Clone)]
pub struct LocalDatacenter {
    snitch: Arc<dyn EndpointSnitch>,
    local_endpoint: IpAddr,
}

impl LocalDatacenter {
    pub fn new(snitch: Arc<dyn EndpointSnitch>, local_endpoint: IpAddr) -> Self {
        Self {
            snitch,
            local_endpoint,
        }
    }
}

impl ResponsePolicy for LocalDatacenter {
    fn counts(&self, message: &Message) -> Result<bool> {
        self.snitch
            .is_in_same_datacenter(self.local_endpoint, message.from())
    }
}

/// Acknowledgment tracker for a single write
///
/// ## Concurrency:
/// - `response()` may be called from any number of network threads
/// - `await_completion()` is typically called by one coordinator thread
/// - `state`: Protected by Mutex; `condition` fires once, when the
///   remaining count first drops to zero or below
///
/// A handler whose wait timed out is not reset and may still complete
/// later; coordinators discard it instead of reusing it.
#[derive(Debug)]
pub struct WriteResponseHandler {
    block_for: i64,
    policy: Box<dyn ResponsePolicy>,
    state: Mutex<HandlerState>,
    condition: Condvar,
}

#[derive(Debug)]
struct HandlerState {
    /// Counted acknowledgments still required
    remaining: i64,
    /// Every acknowledgment received, counted or not
    responses: Vec<Message>,
    signaled: bool,
}

impl WriteResponseHandler {
    /// Handler where every acknowledgment counts
    pub fn new(block_for: i64) -> Self {
        Self::with_policy(block_for, AllResponses)
    }

    /// Handler counting only acknowledgments from `local_endpoint`'s datacenter
    pub fn local_datacenter(
        block_for: i64,
        snitch: Arc<dyn EndpointSnitch>,
        local_endpoint: IpAddr,
    ) -> Self {
        Self::with_policy(block_for, LocalDatacenter::new(snitch, local_endpoint))
    }

    /// Handler for a write at `level`
    pub fn for_consistency(
        level: ConsistencyLevel,
        replication_factor: usize,
        local_replication_factor: usize,
        snitch: Arc<dyn EndpointSnitch>,
        local_endpoint: IpAddr,
    ) -> Self {
        let block_for = level.block_for(replication_factor, local_replication_factor);
        if level.is_datacenter_local() {
            Self::local_datacenter(block_for, snitch, local_endpoint)
        } else {
            Self::new(block_for)
        }
    }

    /// Handler with a custom counting policy.
    ///
    /// A `block_for` of zero or less is satisfied on construction.
    pub fn with_policy(block_for: i64, policy: impl ResponsePolicy + 'static) -> Self {
        Self {
            block_for,
            policy: Box::new(policy),
            state: Mutex::new(HandlerState {
                remaining: block_for,
                responses: Vec::new(),
                signaled: block_for <= 0,
            }),
            condition: Condvar::new(),
        }
    }

    /// Account for one acknowledgment.
    ///
    /// After completion messages are only recorded. An error from the
    /// policy (an endpoint the snitch cannot place) leaves the handler
    /// untouched and is returned to the caller, not to the waiter.
    pub fn response(&self, message: Message) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.signaled {
                state.responses.push(message);
                return Ok(());
            }
        }

        let counts = self.policy.counts(&message)?;
        tracing::debug!("Processed Message: {} (counted={})", message, counts);

        let mut state = self.state.lock();
        state.responses.push(message);
        if state.signaled {
            return Ok(());
        }
        if counts {
            state.remaining -= 1;
        }
        if state.remaining <= 0 {
            state.signaled = true;
            self.condition.notify_all();
            tracing::info!(
                "Write acknowledged by {} of {} required replicas ({} responses)",
                self.block_for - state.remaining,
                self.block_for,
                state.responses.len()
            );
        }
        Ok(())
    }

    /// Block until enough acknowledgments arrived or `timeout` elapses
    pub fn await_completion(&self, timeout: Duration) -> Result<()> {
        let started = Instant::now();
        // too far out to represent: wait without a deadline
        let deadline = started.checked_add(timeout);
        let mut state = self.state.lock();
        while !state.signaled {
            let Some(deadline) = deadline else {
                self.condition.wait(&mut state);
                continue;
            };
            if self.condition.wait_until(&mut state, deadline).timed_out() && !state.signaled {
                return Err(RingError::Timeout {
                    waited_ms: started.elapsed().as_millis() as u64,
                    received: state.responses.len(),
                    remaining: state.remaining,
                });
            }
        }
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.state.lock().signaled
    }

    pub fn block_for(&self) -> i64 {
        self.block_for
    }

    /// Counted acknowledgments still required
    pub fn remaining(&self) -> i64 {
        self.state.lock().remaining
    }

    /// Snapshot of every acknowledgment received so far
    pub fn responses(&self) -> Vec<Message> {
        self.state.lock().responses.clone()
    }
}
