//! Values owned by a single thread.
//!
//! A [`Confined`] value is stored in its owner thread's local storage. The
//! handle itself can be shared freely, but only the owner thread can reach the
//! value; everyone else gets [`OffContext`]. No lock is involved.

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, ThreadId};

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static SLOTS: RefCell<HashMap<u64, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Access attempted from a thread that does not own the value, or re-entrantly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffContext;

impl fmt::Display for OffContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("confined value accessed off its owner thread")
    }
}

impl std::error::Error for OffContext {}

pub struct Confined<T: 'static> {
    owner: ThreadId,
    slot: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: 'static> Confined<T> {
    /// Moves `value` into the current thread's storage; the current thread becomes the owner.
    pub fn new(value: T) -> Self {
        let slot = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
        SLOTS.with(|slots| slots.borrow_mut().insert(slot, Box::new(value)));
        Self {
            owner: thread::current().id(),
            slot,
            _marker: PhantomData,
        }
    }

    pub fn is_owner(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Runs `f` against the value. The value is lent out for the duration of the call,
    /// so a nested `with` on the same handle fails instead of aliasing.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, OffContext> {
        if !self.is_owner() {
            return Err(OffContext);
        }
        let boxed = SLOTS
            .with(|slots| slots.borrow_mut().remove(&self.slot))
            .ok_or(OffContext)?;
        let mut lent = Lent {
            slot: self.slot,
            value: Some(boxed),
        };
        let value = lent
            .value
            .as_mut()
            .and_then(|boxed| boxed.downcast_mut::<T>())
            .ok_or(OffContext)?;
        Ok(f(value))
    }
}

/// Puts a lent value back into its slot, also when the borrower panics.
struct Lent {
    slot: u64,
    value: Option<Box<dyn Any>>,
}

impl Drop for Lent {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            let _ = SLOTS.try_with(|slots| slots.borrow_mut().insert(self.slot, value));
        }
    }
}

impl<T: 'static> Drop for Confined<T> {
    fn drop(&mut self) {
        // Off-owner drops leave the value to be released when the owner thread exits.
        if self.is_owner() {
            let _ = SLOTS.try_with(|slots| {
                if let Ok(mut slots) = slots.try_borrow_mut() {
                    slots.remove(&self.slot);
                }
            });
        }
    }
}

impl<T: 'static> fmt::Debug for Confined<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Confined")
            .field("owner", &self.owner)
            .field("slot", &self.slot)
            .finish()
    }
}
