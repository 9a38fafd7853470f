//! Single-segment playback.
//!
//! [`SegmentPlayer::play_one`] speaks exactly one [`Segment`] and resolves
//! with an [`Outcome`]. It knows nothing about sessions, indices or retries.
//!
//! ```text
//! platform busy? ──yes──▶ cancel + settle delay
//!        │
//!        ▼
//! speak(utterance) ──▶ event listener ──┐
//!                                       ├──▶ ResolveOnce ──▶ Outcome
//! segment window   ──▶ timer ───────────┘
//! ```

use std::ops::RangeInclusive;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::platform::{
    PlatformPolicy, SpeechPlatform, SynthError, TimerRole, Utterance, UtteranceEvent,
};
use crate::text::{Segment, SegmentationPolicy};
use crate::voice::Voice;

use super::outcome::{Outcome, ResolveOnce};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Caller-facing options for one `play` call.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackOptions {
    /// Speed multiplier. `None` keeps the coordinator's current rate.
    pub rate: Option<f32>,
    pub pitch: f32,
    pub volume: f32,
    pub segmentation: SegmentationPolicy,
    /// Voice identifier to prefer; matched exactly, then fuzzily.
    pub preferred_voice_id: Option<String>,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            rate: None,
            pitch: 1.0,
            volume: 1.0,
            segmentation: SegmentationPolicy::Sentence,
            preferred_voice_id: None,
        }
    }
}

/// Resolved speech parameters handed to the player for one attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeechParams {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeechParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SegmentSpeaker trait
// ---------------------------------------------------------------------------

/// What the coordinator needs from a segment player.
#[async_trait]
pub trait SegmentSpeaker: Send + Sync {
    /// Speak one segment and report how it ended.
    ///
    /// Dropping the returned future abandons the attempt without cancelling
    /// platform speech; call [`cancel`](Self::cancel) for that.
    async fn play_one(
        &self,
        segment: &Segment,
        voice: Option<&Voice>,
        params: &SpeechParams,
    ) -> Outcome;

    /// Cancel any in-flight utterance.
    fn cancel(&self);
}

// Compile-time assertion: Box<dyn SegmentSpeaker> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SegmentSpeaker>) {}
};

// ---------------------------------------------------------------------------
// SegmentPlayer
// ---------------------------------------------------------------------------

/// [`SegmentSpeaker`] backed by a [`SpeechPlatform`].
pub struct SegmentPlayer {
    platform: Arc<dyn SpeechPlatform>,
    policy: PlatformPolicy,
}

/// Aborts the attempt's helper tasks when the attempt ends or is dropped.
struct AttemptTasks(Vec<JoinHandle<()>>);

impl Drop for AttemptTasks {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

fn clamp_rate(rate: f32, range: &RangeInclusive<f32>) -> f32 {
    let (lo, hi) = (*range.start(), *range.end());
    if rate.is_nan() {
        return 1.0_f32.clamp(lo, hi.max(lo));
    }
    rate.clamp(lo, hi.max(lo))
}

impl SegmentPlayer {
    pub fn new(platform: Arc<dyn SpeechPlatform>, policy: PlatformPolicy) -> Self {
        Self { platform, policy }
    }

    pub fn policy(&self) -> &PlatformPolicy {
        &self.policy
    }

    /// Play `segment` and wait for whichever of end callback, failure or
    /// timer settles first.
    pub async fn play_one(
        &self,
        segment: &Segment,
        voice: Option<&Voice>,
        params: &SpeechParams,
    ) -> Outcome {
        if self.platform.is_busy() {
            log::debug!(
                "player: platform busy before segment {}; cancelling and settling for {:?}",
                segment.index,
                self.policy.settle_delay()
            );
            self.platform.cancel();
            tokio::time::sleep(self.policy.settle_delay()).await;
        }

        let rate = clamp_rate(params.rate, &self.platform.rate_range());
        let window = self.policy.segment_window(segment.word_count, rate);
        let utterance = Utterance {
            text: segment.text.clone(),
            rate,
            pitch: params.pitch,
            volume: params.volume,
            voice: voice.map(|v| v.identifier.clone()),
        };

        log::debug!(
            "player: segment {} ({} words) at rate {rate:.2}, window {window:?}",
            segment.index,
            segment.word_count
        );

        let mut events = self.platform.speak(utterance);
        let (guard, settled) = ResolveOnce::new();

        let listener = {
            let guard = Arc::clone(&guard);
            tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    let outcome = match event {
                        UtteranceEvent::Started => continue,
                        UtteranceEvent::Ended => Outcome::Completed,
                        UtteranceEvent::Failed(SynthError::Interrupted) => Outcome::Interrupted,
                        UtteranceEvent::Failed(e) => Outcome::Failed(e.to_string()),
                    };
                    guard.resolve(outcome);
                    return;
                }
                // Stream closed without a verdict: the timer decides.
            })
        };

        let timer = {
            let guard = Arc::clone(&guard);
            let platform = Arc::clone(&self.platform);
            let role = self.policy.timer_role;
            tokio::spawn(async move {
                tokio::time::sleep(window).await;
                let outcome = match role {
                    TimerRole::Backup => Outcome::TimedOut,
                    TimerRole::Authoritative if !platform.is_busy() => Outcome::Completed,
                    TimerRole::Authoritative => Outcome::TimedOut,
                };
                guard.resolve(outcome);
            })
        };

        let tasks = AttemptTasks(vec![listener, timer]);
        let outcome = settled.await.unwrap_or(Outcome::TimedOut);
        drop(tasks);

        match &outcome {
            Outcome::TimedOut => {
                log::warn!("player: segment {} timed out after {window:?}", segment.index);
                if self.platform.is_busy() {
                    self.platform.cancel();
                }
            }
            Outcome::Failed(reason) => {
                log::warn!("player: segment {} failed: {reason}", segment.index);
            }
            other => log::debug!("player: segment {} {}", segment.index, other.label()),
        }
        outcome
    }
}

#[async_trait]
impl SegmentSpeaker for SegmentPlayer {
    async fn play_one(
        &self,
        segment: &Segment,
        voice: Option<&Voice>,
        params: &SpeechParams,
    ) -> Outcome {
        SegmentPlayer::play_one(self, segment, voice, params).await
    }

    fn cancel(&self) {
        self.platform.cancel();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
