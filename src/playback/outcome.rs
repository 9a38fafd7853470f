//! Segment outcomes and the resolve-once guard.
//!
//! The platform's end callback and the segment timer race to settle the same
//! attempt. Both hold a clone of one [`ResolveOnce`]; the first `resolve`
//! wins and every later call is ignored.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::oneshot;

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of playing one segment.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The platform finished speaking the segment.
    Completed,
    /// Genuine synthesis failure; retryable.
    Failed(String),
    /// Neither end nor failure arrived inside the playback window; retryable.
    TimedOut,
    /// The utterance was cancelled. Never retried, never reported.
    Interrupted,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Failed(_) => "failed",
            Outcome::TimedOut => "timed out",
            Outcome::Interrupted => "interrupted",
        }
    }
}

// ---------------------------------------------------------------------------
// ResolveOnce
// ---------------------------------------------------------------------------

/// One-shot settle point shared by several competing signal sources.
pub struct ResolveOnce<T> {
    tx: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> ResolveOnce<T> {
    /// Create a guard and the receiver that yields the winning value.
    pub fn new() -> (Arc<Self>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let guard = Arc::new(Self {
            tx: Mutex::new(Some(tx)),
        });
        (guard, rx)
    }

    /// Settle with `value`. Returns `true` only for the call that won.
    pub fn resolve(&self, value: T) -> bool {
        let taken = self
            .tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match taken {
            // A dropped receiver still counts as settled.
            Some(tx) => {
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
