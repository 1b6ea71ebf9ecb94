//! Per-thread interrupt status.
//!
//! Every thread owns one [`Interrupter`]. Another thread can raise it to wake
//! the owner out of a blocking wait; the wait clears the status and reports the
//! interruption, and the caller decides whether to raise it again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam::channel::{bounded, Receiver, Sender};

thread_local! {
    static CURRENT: Interrupter = Interrupter::new();
}

/// Handle to the interrupt status of the current thread.
pub fn current() -> Interrupter {
    CURRENT.with(Interrupter::clone)
}

#[derive(Clone, Debug)]
pub struct Interrupter {
    inner: Arc<State>,
}

#[derive(Debug)]
struct State {
    flag: AtomicBool,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
}

impl Interrupter {
    fn new() -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            inner: Arc::new(State {
                flag: AtomicBool::new(false),
                wake_tx,
                wake_rx,
            }),
        }
    }

    /// Sets the status and wakes the owning thread if it is blocked in a wait.
    pub fn interrupt(&self) {
        self.inner.flag.store(true, Ordering::Release);
        // A full channel already holds a pending wake-up.
        let _ = self.inner.wake_tx.try_send(());
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    /// Tests and clears the status.
    pub fn take(&self) -> bool {
        let was_set = self.inner.flag.swap(false, Ordering::AcqRel);
        while self.inner.wake_rx.try_recv().is_ok() {}
        was_set
    }

    pub(crate) fn wakeups(&self) -> &Receiver<()> {
        &self.inner.wake_rx
    }
}
