//! Session status and the read-only snapshot handed to callers.

use crate::voice::Voice;

// ---------------------------------------------------------------------------
// PlaybackStatus
// ---------------------------------------------------------------------------

/// Lifecycle of one playback session.
///
/// ```text
/// Idle ──play()──▶ Playing ──last segment done──────────▶ Completed
///                          ──last segment out of retries─▶ Failed
/// Idle / Playing ──stop() or superseding play()──▶ Stopped
/// ```
///
/// `Stopped`, `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    /// No session has started yet.
    #[default]
    Idle,

    /// Segments are being spoken.
    Playing,

    /// Cancelled by the caller or replaced by a newer session.
    Stopped,

    /// Every segment was spoken or skipped.
    Completed,

    /// The final segment exhausted its retries, or the text could not be
    /// segmented.
    Failed,
}

impl PlaybackStatus {
    /// `true` only while segments are being spoken.
    ///
    /// ```
    /// use read_aloud::playback::PlaybackStatus;
    ///
    /// assert!(PlaybackStatus::Playing.is_running());
    /// assert!(!PlaybackStatus::Idle.is_running());
    /// assert!(!PlaybackStatus::Stopped.is_running());
    /// assert!(!PlaybackStatus::Completed.is_running());
    /// assert!(!PlaybackStatus::Failed.is_running());
    /// ```
    pub fn is_running(&self) -> bool {
        matches!(self, PlaybackStatus::Playing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlaybackStatus::Stopped | PlaybackStatus::Completed | PlaybackStatus::Failed
        )
    }

    /// A short human-readable label for status lines and logs.
    pub fn label(&self) -> &'static str {
        match self {
            PlaybackStatus::Idle => "Idle",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Completed => "Completed",
            PlaybackStatus::Failed => "Failed",
        }
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Point-in-time copy of the coordinator's session bookkeeping.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SessionSnapshot {
    /// `0` before the first `play()`.
    pub session: u64,
    pub status: PlaybackStatus,
    /// Segment being spoken; equals `total` once completed.
    pub current_index: usize,
    /// Retries spent on the current segment.
    pub retry_count: u32,
    pub total: usize,
    /// Voice bound for the session, if any.
    pub voice: Option<Voice>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_idle() {
        assert_eq!(PlaybackStatus::default(), PlaybackStatus::Idle);
        let snapshot = SessionSnapshot::default();
        assert_eq!(snapshot.session, 0);
        assert_eq!(snapshot.status, PlaybackStatus::Idle);
    }

    #[test]
    fn terminal_states() {
        assert!(!PlaybackStatus::Idle.is_terminal());
        assert!(!PlaybackStatus::Playing.is_terminal());
        assert!(PlaybackStatus::Stopped.is_terminal());
        assert!(PlaybackStatus::Completed.is_terminal());
        assert!(PlaybackStatus::Failed.is_terminal());
    }

    #[test]
    fn labels_are_distinct() {
        let labels = [
            PlaybackStatus::Idle,
            PlaybackStatus::Playing,
            PlaybackStatus::Stopped,
            PlaybackStatus::Completed,
            PlaybackStatus::Failed,
        ]
        .map(|s| s.label());
        for (i, a) in labels.iter().enumerate() {
            for b in &labels[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
