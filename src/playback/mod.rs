//! Playback engine: one coordinator driving one segment player.
//!
//! # Architecture
//!
//! ```text
//! caller ──play(text, options)──▶ PlaybackCoordinator
//!                                   │  text::split ──▶ Vec<Segment>
//!                                   │  VoiceCatalog::select_best_voice
//!                                   ▼
//!                            driver task (one per session)
//!                                   │  for each segment, in order:
//!                                   │    Progress event
//!                                   │    SegmentSpeaker::play_one ──▶ Outcome
//!                                   │    advance / retry / replay / skip
//!                                   ▼
//!              mpsc::UnboundedReceiver<PlaybackEvent>  ◀── Started / Progress /
//!                                                          Completed / Failed
//! ```
//!
//! `stop()` and a superseding `play()` invalidate the session under the
//! coordinator lock, so nothing from the old session is emitted once they
//! return.

pub mod coordinator;
pub mod outcome;
pub mod player;
pub mod state;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use coordinator::PlaybackCoordinator;
pub use outcome::{Outcome, ResolveOnce};
pub use player::{PlaybackOptions, SegmentPlayer, SegmentSpeaker, SpeechParams};
pub use state::{PlaybackStatus, SessionSnapshot};

// ---------------------------------------------------------------------------
// PlaybackError
// ---------------------------------------------------------------------------

/// Errors surfaced by, or used inside, the playback engine.
///
/// Only `SegmentTimedOut`, `SegmentSynthesisFailed` (for the final segment)
/// and `SegmentationFailed` ever reach [`PlaybackEvent::Failed`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    /// No voice matched; speech continues with the platform default.
    #[error("no usable voice, speaking with the platform default")]
    VoiceUnavailable,

    #[error("segment {index} timed out")]
    SegmentTimedOut { index: usize },

    #[error("segment {index} failed: {reason}")]
    SegmentSynthesisFailed { index: usize, reason: String },

    /// A result arrived for a session that is no longer current.
    #[error("session superseded")]
    SessionSuperseded,

    #[error("text produced no speakable segments")]
    SegmentationFailed,
}

// ---------------------------------------------------------------------------
// PlaybackEvent
// ---------------------------------------------------------------------------

/// Notifications emitted by [`PlaybackCoordinator`], tagged with the session
/// that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started {
        session: u64,
    },
    /// Fired once per segment, before it is spoken.
    Progress {
        session: u64,
        index: usize,
        total: usize,
        text: String,
    },
    Completed {
        session: u64,
    },
    Failed {
        session: u64,
        error: PlaybackError,
    },
}

impl PlaybackEvent {
    pub fn session(&self) -> u64 {
        match self {
            PlaybackEvent::Started { session }
            | PlaybackEvent::Progress { session, .. }
            | PlaybackEvent::Completed { session }
            | PlaybackEvent::Failed { session, .. } => *session,
        }
    }

    /// `true` for `Completed` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackEvent::Completed { .. } | PlaybackEvent::Failed { .. }
        )
    }
}
