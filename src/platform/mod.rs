//! Platform speech-synthesis capability.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                 SpeechPlatform (trait)                    │
//! │                                                           │
//! │  voices() ──────────────▶ Vec<Voice>   (may be empty)     │
//! │  voices_changed() ──────▶ watch::Receiver<u64>            │
//! │  speak(Utterance) ──────▶ mpsc::UnboundedReceiver<        │
//! │                              UtteranceEvent>              │
//! │  cancel() / is_busy() / rate_range()                      │
//! └───────────────┬───────────────────────────┬───────────────┘
//!                 │                           │
//!          CommandSynth                 MockPlatform
//!        (espeak-ng process)            (tests only)
//! ```
//!
//! Everything above this trait (catalog, segment player, coordinator) is
//! platform-agnostic; platform quirks are expressed as [`PlatformPolicy`]
//! values selected by [`PlatformClass`].

pub mod command;
pub mod policy;

#[cfg(test)]
pub mod mock;

use std::ops::RangeInclusive;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::voice::Voice;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use command::CommandSynth;
pub use policy::{PlatformClass, PlatformPolicy, TimerRole};

#[cfg(test)]
pub use mock::{MockBehavior, MockPlatform};

// ---------------------------------------------------------------------------
// SynthError
// ---------------------------------------------------------------------------

/// Errors reported by a platform for a single utterance.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SynthError {
    /// The utterance was cancelled on purpose. Never a fault.
    #[error("utterance interrupted")]
    Interrupted,

    /// The engine could not synthesize the text.
    #[error("synthesis failed: {0}")]
    Synthesis(String),

    /// The engine itself could not be reached (missing binary, dead daemon).
    #[error("speech engine unavailable: {0}")]
    Unavailable(String),
}

// ---------------------------------------------------------------------------
// Utterance
// ---------------------------------------------------------------------------

/// One platform-level request to speak a piece of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// Speed multiplier, already clamped to [`SpeechPlatform::rate_range`].
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Volume between 0.0 and 1.0.
    pub volume: f32,
    /// Voice identifier; `None` lets the platform choose.
    pub voice: Option<String>,
}

/// Callbacks delivered for one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum UtteranceEvent {
    Started,
    Ended,
    Failed(SynthError),
}

// ---------------------------------------------------------------------------
// SpeechPlatform trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to a device speech engine.
///
/// # Contract
///
/// - At most one utterance is in flight; callers cancel before speaking.
/// - [`cancel`](Self::cancel) makes the in-flight utterance report
///   `Failed(SynthError::Interrupted)` (possibly asynchronously).
/// - Dropping the receiver returned by [`speak`](Self::speak) does not stop
///   speech; only `cancel` does.
pub trait SpeechPlatform: Send + Sync {
    /// Reliability class used to pick a [`PlatformPolicy`].
    fn class(&self) -> PlatformClass;

    /// Voices currently known to the engine. Empty while still loading.
    fn voices(&self) -> Vec<Voice>;

    /// Generation counter bumped every time the voice set changes.
    fn voices_changed(&self) -> watch::Receiver<u64>;

    /// Submit one utterance and return its event stream.
    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent>;

    /// Cancel any in-flight speech.
    fn cancel(&self);

    /// `true` while speaking or while an utterance is pending.
    fn is_busy(&self) -> bool;

    /// Supported speed multipliers.
    fn rate_range(&self) -> RangeInclusive<f32> {
        0.1..=10.0
    }
}

// Compile-time assertion: Box<dyn SpeechPlatform> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechPlatform>) {}
};
