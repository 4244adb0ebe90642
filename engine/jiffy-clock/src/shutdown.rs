//! Cooperative shutdown flag shared by every hot loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide shutdown request, set once by a signal handler (or a test)
/// and polled by the clock loop, the session day loop, and ring consumers.
///
/// Once set it never resets. Workers observe it read-only; in-flight ring
/// writes and datagram sends are allowed to complete, but no new ticks are
/// scheduled after the flag is seen.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<AtomicBool>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Idempotent.
    pub fn request(&self) {
        self.inner.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Relaxed)
    }

    /// The backing atomic, for registration with OS signal handlers.
    pub fn as_atomic(&self) -> Arc<AtomicBool> {
        self.inner.clone()
    }
}
