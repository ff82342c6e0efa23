//! # Acknowledge channel
//! The local "stop" request from the acknowledge button. The button side only ever sets the flag, the main cycle
//! only ever takes it. Taking is a single atomic swap, so a press that lands between reading and clearing cannot
//! get lost.
//!
//! There is room for exactly one outstanding request. Pressing twice before the cycle looks is the same as pressing
//! once.

use portable_atomic::{AtomicBool, Ordering};

/// Single-writer, single-reader acknowledge flag
pub struct AckChannel {
    /// Set by the button, cleared by the main cycle
    pending: AtomicBool,
}

impl AckChannel {
    /// Create a new `AckChannel` with nothing pending
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
        }
    }

    /// Request the alarm to stop. Safe to call from any execution context.
    pub fn request_stop(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Read and clear the flag in one step, returning whether a stop was requested
    pub fn take_and_clear(&self) -> bool {
        self.pending.swap(false, Ordering::AcqRel)
    }

    /// Peek at the flag without consuming it
    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for AckChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn nothing_pending_initially() {
        let ack = AckChannel::new();
        assert!(!ack.is_pending());
        assert!(!ack.take_and_clear());
    }

    #[test]
    fn request_is_observed_exactly_once() {
        let ack = AckChannel::new();
        ack.request_stop();
        assert!(ack.is_pending());
        assert!(ack.take_and_clear());
        assert!(!ack.take_and_clear());
    }

    #[test]
    fn repeated_requests_collapse() {
        let ack = AckChannel::new();
        ack.request_stop();
        ack.request_stop();
        assert!(ack.take_and_clear());
        assert!(!ack.take_and_clear());
    }

    #[test]
    fn no_request_is_lost_across_threads() {
        let ack = Arc::new(AckChannel::new());
        let writer = {
            let ack = Arc::clone(&ack);
            thread::spawn(move || {
                for _ in 0..10_000 {
                    ack.request_stop();
                }
            })
        };
        let mut observed = false;
        for _ in 0..10_000 {
            observed |= ack.take_and_clear();
        }
        writer.join().unwrap();
        // whatever the reader did not see during the race is still pending afterwards
        observed |= ack.take_and_clear();
        assert!(observed);
        assert!(!ack.is_pending());
    }
}
