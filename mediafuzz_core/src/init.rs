//! One-shot process setup.
//!
//! Entry points are called repeatedly from a single driver thread, never
//! concurrently. Two threads racing through the first call are outside that
//! contract and may both run setup.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
pub struct InitGuard {
    initialized: AtomicBool,
}

impl InitGuard {
    pub const fn new() -> Self {
        Self {
            initialized: AtomicBool::new(false),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Runs `setup` unless it already succeeded once. A failed setup leaves
    /// the guard unset. Returns whether `setup` ran.
    pub fn ensure<E>(&self, setup: impl FnOnce() -> Result<(), E>) -> Result<bool, E> {
        if self.is_initialized() {
            return Ok(false);
        }
        setup()?;
        self.initialized.store(true, Ordering::Release);
        Ok(true)
    }
}
