//! Platform classes and the per-class playback policy.
//!
//! Speech engines differ wildly in how reliably they report completion.
//! Rather than keeping separate playback code paths per platform, every
//! platform-specific tuning value lives in [`PlatformPolicy`] and is selected
//! by [`PlatformClass`].
//!
//! | Value                  | Desktop | Mobile |
//! |------------------------|---------|--------|
//! | Timer role             | Backup  | Authoritative |
//! | Extra retries          | 0       | 3      |
//! | Inter-segment pause    | 50 ms   | 300 ms |
//! | Settle after cancel    | 50 ms   | 250 ms |
//! | Voice enumeration wait | 1 s     | 3 s    |

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PlatformClass
// ---------------------------------------------------------------------------

/// Coarse grouping of platforms by speech completion reliability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlatformClass {
    /// Desktop engines — the end callback is reliable.
    Desktop,
    /// Touch / mobile engines — the end callback is delayed or lost.
    Mobile,
}

impl PlatformClass {
    /// Classify the compile target.
    ///
    /// ```
    /// use read_aloud::platform::PlatformClass;
    ///
    /// assert_eq!(PlatformClass::from_os("android"), PlatformClass::Mobile);
    /// assert_eq!(PlatformClass::from_os("linux"), PlatformClass::Desktop);
    /// ```
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Classify an OS name as reported by `std::env::consts::OS`.
    pub fn from_os(os: &str) -> Self {
        match os {
            "android" | "ios" => PlatformClass::Mobile,
            _ => PlatformClass::Desktop,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlatformClass::Desktop => "desktop",
            PlatformClass::Mobile => "mobile",
        }
    }
}

impl Default for PlatformClass {
    fn default() -> Self {
        Self::detect()
    }
}

// ---------------------------------------------------------------------------
// TimerRole
// ---------------------------------------------------------------------------

/// How the per-segment timer relates to the platform's end callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerRole {
    /// The end callback is trusted; timer expiry means the segment hung.
    Backup,
    /// The end callback may never arrive; when the timer expires and the
    /// platform has gone quiet, the segment is treated as finished.
    Authoritative,
}

// ---------------------------------------------------------------------------
// PlatformPolicy
// ---------------------------------------------------------------------------

/// Timeout, retry and delay values for one platform class.
///
/// The word-count heuristics are empirical; every field can be overridden in
/// `settings.toml` under `[policy.desktop]` / `[policy.mobile]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformPolicy {
    /// Fixed part of the playback window.
    pub timeout_base_ms: u64,
    /// Additional window per estimated word at rate 1.0.
    pub timeout_per_word_ms: u64,
    /// Lower bound of the playback window.
    pub timeout_floor_ms: u64,
    /// Upper bound of the playback window.
    pub timeout_ceiling_ms: u64,
    /// Whether timer expiry is a fault or the completion signal.
    pub timer_role: TimerRole,
    /// Retries of a timed-out / failed segment before it is skipped.
    pub max_retries: u32,
    /// Pause before retrying the same segment.
    pub retry_delay_ms: u64,
    /// Pause between two successfully spoken segments.
    pub inter_segment_delay_ms: u64,
    /// Pause after cancelling leftover speech before a new utterance.
    pub settle_delay_ms: u64,
    /// How long voice enumeration waits for a "voices changed" notification.
    pub voice_wait_ms: u64,
    /// Unrequested interruptions tolerated per segment before skipping it.
    pub max_interrupt_replays: u32,
}

impl PlatformPolicy {
    /// Defaults tuned for desktop engines.
    pub fn desktop() -> Self {
        Self {
            timeout_base_ms: 2_000,
            timeout_per_word_ms: 450,
            timeout_floor_ms: 3_000,
            timeout_ceiling_ms: 30_000,
            timer_role: TimerRole::Backup,
            max_retries: 0,
            retry_delay_ms: 250,
            inter_segment_delay_ms: 50,
            settle_delay_ms: 50,
            voice_wait_ms: 1_000,
            max_interrupt_replays: 2,
        }
    }

    /// Defaults tuned for touch / mobile engines.
    pub fn mobile() -> Self {
        Self {
            timeout_base_ms: 3_000,
            timeout_per_word_ms: 600,
            timeout_floor_ms: 5_000,
            timeout_ceiling_ms: 60_000,
            timer_role: TimerRole::Authoritative,
            max_retries: 3,
            retry_delay_ms: 500,
            inter_segment_delay_ms: 300,
            settle_delay_ms: 250,
            voice_wait_ms: 3_000,
            max_interrupt_replays: 2,
        }
    }

    pub fn for_class(class: PlatformClass) -> Self {
        match class {
            PlatformClass::Desktop => Self::desktop(),
            PlatformClass::Mobile => Self::mobile(),
        }
    }

    /// Allowed playback window for a segment of `words` words spoken at
    /// `rate` (1.0 = normal speed).
    ///
    /// ```
    /// use std::time::Duration;
    /// use read_aloud::platform::PlatformPolicy;
    ///
    /// let p = PlatformPolicy::desktop();
    /// assert_eq!(p.segment_window(0, 1.0), Duration::from_millis(3_000));
    /// assert_eq!(p.segment_window(10_000, 1.0), Duration::from_millis(30_000));
    /// ```
    pub fn segment_window(&self, words: usize, rate: f32) -> Duration {
        let rate = f64::from(rate.max(0.1));
        let speaking = words as f64 * self.timeout_per_word_ms as f64 / rate;
        let raw = self.timeout_base_ms as f64 + speaking;
        let floor = self.timeout_floor_ms as f64;
        let ceiling = (self.timeout_ceiling_ms as f64).max(floor);
        Duration::from_millis(raw.clamp(floor, ceiling).round() as u64)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn inter_segment_delay(&self) -> Duration {
        Duration::from_millis(self.inter_segment_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn voice_wait(&self) -> Duration {
        Duration::from_millis(self.voice_wait_ms)
    }
}

impl Default for PlatformPolicy {
    fn default() -> Self {
        Self::for_class(PlatformClass::detect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mobile_os_names_classify_as_mobile() {
        assert_eq!(PlatformClass::from_os("ios"), PlatformClass::Mobile);
        assert_eq!(PlatformClass::from_os("android"), PlatformClass::Mobile);
    }

    #[test]
    fn desktop_os_names_classify_as_desktop() {
        for os in ["linux", "macos", "windows", "freebsd"] {
            assert_eq!(PlatformClass::from_os(os), PlatformClass::Desktop, "{os}");
        }
    }

    #[test]
    fn mobile_is_more_patient_than_desktop() {
        let d = PlatformPolicy::desktop();
        let m = PlatformPolicy::mobile();
        assert!(m.segment_window(20, 1.0) > d.segment_window(20, 1.0));
        assert!(m.inter_segment_delay() > d.inter_segment_delay());
        assert!(m.settle_delay() > d.settle_delay());
        assert!(m.voice_wait() > d.voice_wait());
        assert!(m.max_retries > d.max_retries);
    }

    #[test]
    fn retry_budget_defaults() {
        assert_eq!(PlatformPolicy::mobile().max_retries, 3);
        assert_eq!(PlatformPolicy::desktop().max_retries, 0);
    }

    #[test]
    fn window_scales_with_words_between_bounds() {
        let p = PlatformPolicy::desktop();
        // 2000 + 20 * 450 = 11 000 ms
        assert_eq!(p.segment_window(20, 1.0), Duration::from_millis(11_000));
    }

    #[test]
    fn faster_rate_shrinks_window() {
        let p = PlatformPolicy::desktop();
        // 2000 + 20 * 450 / 2 = 6 500 ms
        assert_eq!(p.segment_window(20, 2.0), Duration::from_millis(6_500));
        assert!(p.segment_window(20, 0.5) > p.segment_window(20, 1.0));
    }

    #[test]
    fn window_never_leaves_floor_and_ceiling() {
        let p = PlatformPolicy::mobile();
        assert_eq!(p.segment_window(0, 10.0), Duration::from_millis(5_000));
        assert_eq!(p.segment_window(1_000, 0.1), Duration::from_millis(60_000));
    }

    #[test]
    fn inverted_bounds_fall_back_to_floor() {
        let mut p = PlatformPolicy::desktop();
        p.timeout_ceiling_ms = 100;
        assert_eq!(p.segment_window(50, 1.0), Duration::from_millis(3_000));
    }

    #[test]
    fn zero_rate_does_not_divide_by_zero() {
        let p = PlatformPolicy::desktop();
        assert_eq!(p.segment_window(5, 0.0), p.segment_window(5, 0.1));
    }
}
