//! Execution-context checks and the cross-context presence hop.
//!
//! The cache tier may only be touched from the host's primary thread, and only
//! for players that are currently online. [`ContextGate`] answers both questions.
//! Off the primary thread, presence is checked by submitting a task to the
//! primary thread and blocking on its one-shot reply.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, select, Receiver, RecvError, Sender};
use serde::Deserialize;

use crate::interrupt;
use crate::model::PlayerId;

/// Work submitted to the primary thread.
pub type PrimaryTask<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Contract of the host scheduler that owns the primary thread.
pub trait PrimaryScheduler: Send + Sync {
    fn is_primary_thread(&self) -> bool;

    /// Live population lookup. Only valid on the primary thread.
    fn is_online(&self, player: PlayerId) -> bool;

    /// Queues `task` on the primary thread. Never call and wait from the primary
    /// thread itself.
    fn call_sync(&self, task: PrimaryTask<bool>) -> PendingCall<bool>;
}

// ==================== ONE-SHOT COMPLETION ====================

/// A task failed while running on the primary thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFault {
    pub message: String,
}

impl TaskFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            (*text).to_string()
        } else if let Some(text) = payload.downcast_ref::<String>() {
            text.clone()
        } else {
            "task panicked".to_string()
        };
        Self { message }
    }
}

impl fmt::Display for TaskFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Why a [`PendingCall`] produced no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitError {
    /// The waiting thread was interrupted. Its interrupt status has been cleared.
    Interrupted,
    Execution(TaskFault),
    /// The task was dropped without running, e.g. the main loop shut down.
    Cancelled,
    TimedOut,
}

/// Sending half of a [`PendingCall`]. Dropping it without completing cancels the call.
#[derive(Debug)]
pub struct Completer<T> {
    tx: Sender<Result<T, TaskFault>>,
}

impl<T> Completer<T> {
    pub fn complete(self, outcome: Result<T, TaskFault>) {
        // The waiter may have given up already.
        let _ = self.tx.send(outcome);
    }
}

/// Result of a task queued on another thread.
#[derive(Debug)]
pub struct PendingCall<T> {
    rx: Receiver<Result<T, TaskFault>>,
}

impl<T> PendingCall<T> {
    pub fn channel() -> (Completer<T>, PendingCall<T>) {
        let (tx, rx) = bounded(1);
        (Completer { tx }, PendingCall { rx })
    }

    /// Blocks until the task completes, the calling thread is interrupted, the task
    /// is cancelled, or `timeout` elapses.
    pub fn wait(self, timeout: Option<Duration>) -> Result<T, WaitError> {
        let interrupter = interrupt::current();
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        loop {
            if interrupter.take() {
                return Err(WaitError::Interrupted);
            }
            let outcome = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    select! {
                        recv(self.rx) -> outcome => Some(Self::resolve(outcome)),
                        recv(interrupter.wakeups()) -> _ => None,
                        default(remaining) => Some(Err(WaitError::TimedOut)),
                    }
                }
                None => select! {
                    recv(self.rx) -> outcome => Some(Self::resolve(outcome)),
                    recv(interrupter.wakeups()) -> _ => None,
                },
            };
            // `None` means a wake-up; the status is re-checked at the top.
            if let Some(outcome) = outcome {
                return outcome;
            }
        }
    }

    fn resolve(outcome: Result<Result<T, TaskFault>, RecvError>) -> Result<T, WaitError> {
        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(fault)) => Err(WaitError::Execution(fault)),
            Err(RecvError) => Err(WaitError::Cancelled),
        }
    }
}

// ==================== CONTEXT GATE ====================

/// Presence assumed when a cross-context check cannot complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceFallback {
    /// Fail open: keep treating the player as online.
    #[default]
    Online,
    Offline,
}

impl PresenceFallback {
    fn as_bool(self) -> bool {
        matches!(self, PresenceFallback::Online)
    }
}

#[derive(Clone)]
pub struct ContextGate {
    scheduler: Arc<dyn PrimaryScheduler>,
    timeout: Option<Duration>,
    fallback: PresenceFallback,
}

impl ContextGate {
    pub fn new(scheduler: Arc<dyn PrimaryScheduler>) -> Self {
        Self {
            scheduler,
            timeout: None,
            fallback: PresenceFallback::Online,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_fallback(mut self, fallback: PresenceFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn is_primary_context(&self) -> bool {
        self.scheduler.is_primary_thread()
    }

    /// Whether the player is online, asking the primary thread if needed.
    pub fn is_present(&self, player: PlayerId) -> bool {
        if self.scheduler.is_primary_thread() {
            return self.scheduler.is_online(player);
        }

        let host = Arc::clone(&self.scheduler);
        let pending = self
            .scheduler
            .call_sync(Box::new(move || host.is_online(player)));

        match pending.wait(self.timeout) {
            Ok(online) => online,
            Err(WaitError::Interrupted) => {
                log::error!(
                    "[PRESENCE] thread interrupted while checking whether player {} is online",
                    player
                );
                interrupt::current().interrupt();
                self.fallback.as_bool()
            }
            Err(WaitError::Execution(fault)) => {
                log::error!(
                    "[PRESENCE] unexpected failure while checking whether player {} is online: {}",
                    player,
                    fault
                );
                self.fallback.as_bool()
            }
            // Happens while the host is shutting down.
            Err(WaitError::Cancelled) => self.fallback.as_bool(),
            Err(WaitError::TimedOut) => {
                log::warn!(
                    "[PRESENCE] timed out checking whether player {} is online",
                    player
                );
                self.fallback.as_bool()
            }
        }
    }
}

impl fmt::Debug for ContextGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGate")
            .field("timeout", &self.timeout)
            .field("fallback", &self.fallback)
            .finish()
    }
}
