//! Session state machine.
//!
//! [`PlaybackCoordinator`] owns at most one live session. Each `play()` call
//! creates a session with a fresh id and spawns one driver task for it. The
//! driver walks the segments in order, one utterance at a time:
//!
//! ```text
//! ┌─▶ begin attempt ── Progress (first attempt of an index only)
//! │        │
//! │        ▼
//! │   play_one ◀── raced against the session's wake channel
//! │        │
//! │        ▼
//! │   settle:  Completed ─────────▶ advance ─▶ inter-segment pause ─┐
//! │            Interrupted ───────▶ replay (bounded), else advance  │
//! │            TimedOut / Failed ─▶ retry after delay               │
//! │                                 else skip (advance)             │
//! │                                 else, on the last segment, Failed
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every state change and every event happens under one mutex, after
//! checking the session id and status. A result from a stopped or replaced
//! session therefore finds nothing to act on and is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::platform::{PlatformPolicy, SpeechPlatform};
use crate::text::{self, Segment};
use crate::voice::{Voice, VoiceCatalog};

use super::outcome::Outcome;
use super::player::{PlaybackOptions, SegmentPlayer, SegmentSpeaker, SpeechParams};
use super::state::{PlaybackStatus, SessionSnapshot};
use super::{PlaybackError, PlaybackEvent};

const DEFAULT_RATE: f32 = 1.0;

// ---------------------------------------------------------------------------
// Session bookkeeping
// ---------------------------------------------------------------------------

struct Session {
    id: u64,
    status: PlaybackStatus,
    segments: Arc<Vec<Segment>>,
    current_index: usize,
    retry_count: u32,
    interrupt_replays: u32,
    /// Highest index whose Progress event has been sent.
    announced: Option<usize>,
    /// Bumped by `set_rate`; an attempt started under an older value is
    /// replayed instead of settled.
    attempt: u64,
    voice: Option<Voice>,
    pitch: f32,
    volume: f32,
    /// Wakes the driver out of `play_one` or a pause.
    wake: watch::Sender<u64>,
}

impl Session {
    fn idle() -> Self {
        Self::new(0, Vec::new(), &PlaybackOptions::default()).0
    }

    fn new(
        id: u64,
        segments: Vec<Segment>,
        options: &PlaybackOptions,
    ) -> (Self, watch::Receiver<u64>) {
        let (wake, woken) = watch::channel(0);
        let session = Self {
            id,
            status: PlaybackStatus::Idle,
            segments: Arc::new(segments),
            current_index: 0,
            retry_count: 0,
            interrupt_replays: 0,
            announced: None,
            attempt: 0,
            voice: None,
            pitch: options.pitch,
            volume: options.volume,
            wake,
        };
        (session, woken)
    }

    fn wake(&self) {
        self.wake.send_modify(|n| *n = n.wrapping_add(1));
    }
}

struct State {
    next_id: u64,
    rate: f32,
    session: Session,
}

impl State {
    /// The session `id`, if it is still current and playing.
    fn active_mut(&mut self, id: u64) -> Option<&mut Session> {
        let live = self.session.id == id && self.session.status.is_running();
        live.then_some(&mut self.session)
    }
}

/// One segment attempt as captured at the moment it started.
struct Attempt {
    segment: Segment,
    voice: Option<Voice>,
    params: SpeechParams,
    attempt: u64,
}

/// What the driver does after settling an attempt.
enum Next {
    Speak,
    Pause(Duration),
    Finished,
}

struct Shared {
    speaker: Arc<dyn SegmentSpeaker>,
    catalog: VoiceCatalog,
    policy: PlatformPolicy,
    events: mpsc::UnboundedSender<PlaybackEvent>,
    state: Mutex<State>,
}

// ---------------------------------------------------------------------------
// PlaybackCoordinator
// ---------------------------------------------------------------------------

/// Handle to the playback state machine.
///
/// Cloning is cheap; every clone controls the same session, so a UI can keep
/// one to call [`stop`](Self::stop) while another part of the program plays.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    shared: Arc<Shared>,
}

impl PlaybackCoordinator {
    /// Create a coordinator and the receiver for its [`PlaybackEvent`]s.
    pub fn new(
        speaker: Arc<dyn SegmentSpeaker>,
        catalog: VoiceCatalog,
        policy: PlatformPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            shared: Arc::new(Shared {
                speaker,
                catalog,
                policy,
                events,
                state: Mutex::new(State {
                    next_id: 0,
                    rate: DEFAULT_RATE,
                    session: Session::idle(),
                }),
            }),
        };
        (coordinator, rx)
    }

    /// Create a coordinator that speaks through a [`SegmentPlayer`] on
    /// `platform`.
    pub fn with_platform(
        platform: Arc<dyn SpeechPlatform>,
        catalog: VoiceCatalog,
        policy: PlatformPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let player = SegmentPlayer::new(platform, policy.clone());
        Self::new(Arc::new(player), catalog, policy)
    }

    /// Start a new session for `text` and return its id.
    ///
    /// Any running session is stopped first. Whitespace-only text completes
    /// immediately without a `Started` event. Must be called from inside a
    /// tokio runtime.
    pub fn play(&self, text: &str, options: PlaybackOptions) -> u64 {
        let segments = text::split(text, options.segmentation);
        let shared = &self.shared;

        let mut state = shared.lock();
        if shared.halt(&mut state.session) {
            log::info!(
                "coordinator: session {} superseded by a new play()",
                state.session.id
            );
        }

        state.next_id += 1;
        let id = state.next_id;
        if let Some(rate) = options.rate {
            state.rate = rate;
        }

        let (mut session, woken) = Session::new(id, segments, &options);

        if session.segments.is_empty() {
            if text.split_whitespace().next().is_none() {
                session.status = PlaybackStatus::Completed;
                state.session = session;
                log::info!("coordinator: session {id}: nothing to speak");
                shared.emit(PlaybackEvent::Completed { session: id });
            } else {
                session.status = PlaybackStatus::Failed;
                state.session = session;
                let error = PlaybackError::SegmentationFailed;
                log::error!("coordinator: session {id} failed: {error}");
                shared.emit(PlaybackEvent::Failed { session: id, error });
            }
            return id;
        }

        session.status = PlaybackStatus::Playing;
        shared.emit(PlaybackEvent::Started { session: id });

        session.voice = shared
            .catalog
            .select_best_voice(options.preferred_voice_id.as_deref());
        match &session.voice {
            Some(voice) => log::info!(
                "coordinator: session {id} started: {} segments, voice {} ({})",
                session.segments.len(),
                voice.identifier,
                voice.language_tag
            ),
            None => {
                log::info!(
                    "coordinator: session {id} started: {} segments",
                    session.segments.len()
                );
                log::warn!("coordinator: {}", PlaybackError::VoiceUnavailable);
            }
        }

        state.session = session;
        tokio::spawn(drive(Arc::clone(shared), id, woken));
        id
    }

    /// Stop the running session, if any. Safe to call at any time and any
    /// number of times.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        if self.shared.halt(&mut state.session) {
            log::info!("coordinator: session {} stopped", state.session.id);
        }
    }

    /// Change the speaking rate.
    ///
    /// While playing, the current segment is cancelled and replayed at the
    /// new rate without counting as a retry. Otherwise the rate is kept for
    /// the next `play()` that does not set one.
    pub fn set_rate(&self, rate: f32) {
        if !rate.is_finite() || rate <= 0.0 {
            log::warn!("coordinator: ignoring invalid rate {rate}");
            return;
        }

        let mut state = self.shared.lock();
        state.rate = rate;
        let session = &mut state.session;
        if session.status.is_running() {
            log::debug!(
                "coordinator: rate {rate:.2}, replaying segment {}",
                session.current_index
            );
            session.attempt += 1;
            session.wake();
            self.shared.speaker.cancel();
        }
    }

    pub fn is_running(&self) -> bool {
        self.status().is_running()
    }

    pub fn status(&self) -> PlaybackStatus {
        self.shared.lock().session.status
    }

    /// Rate used for the running session, or the next one.
    pub fn rate(&self) -> f32 {
        self.shared.lock().rate
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock();
        let session = &state.session;
        SessionSnapshot {
            session: session.id,
            status: session.status,
            current_index: session.current_index,
            retry_count: session.retry_count,
            total: session.segments.len(),
            voice: session.voice.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

async fn drive(shared: Arc<Shared>, id: u64, mut woken: watch::Receiver<u64>) {
    loop {
        let Some(attempt) = shared.begin_attempt(id) else {
            return;
        };

        // A closed wake channel means the session was replaced.
        let outcome = tokio::select! {
            biased;
            _ = woken.changed() => None,
            outcome = shared.speaker.play_one(
                &attempt.segment,
                attempt.voice.as_ref(),
                &attempt.params,
            ) => Some(outcome),
        };

        match shared.settle(id, &attempt, outcome) {
            Next::Speak => {}
            Next::Pause(delay) => {
                tokio::select! {
                    biased;
                    _ = woken.changed() => {}
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            Next::Finished => return,
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaybackEvent) {
        // Nobody listening is not an error.
        let _ = self.events.send(event);
    }

    /// Move an idle or playing session to `Stopped`. Returns `true` when a
    /// playing session was interrupted.
    fn halt(&self, session: &mut Session) -> bool {
        match session.status {
            PlaybackStatus::Playing => {
                session.status = PlaybackStatus::Stopped;
                session.wake();
                self.speaker.cancel();
                true
            }
            PlaybackStatus::Idle => {
                session.status = PlaybackStatus::Stopped;
                false
            }
            _ => false,
        }
    }

    fn begin_attempt(&self, id: u64) -> Option<Attempt> {
        let mut state = self.lock();
        let rate = state.rate;
        let session = state.active_mut(id)?;

        let index = session.current_index;
        let segment = session.segments.get(index)?.clone();
        if session.announced != Some(index) {
            session.announced = Some(index);
            self.emit(PlaybackEvent::Progress {
                session: id,
                index,
                total: session.segments.len(),
                text: segment.text.clone(),
            });
        }

        Some(Attempt {
            segment,
            voice: session.voice.clone(),
            params: SpeechParams {
                rate,
                pitch: session.pitch,
                volume: session.volume,
            },
            attempt: session.attempt,
        })
    }

    fn settle(&self, id: u64, attempt: &Attempt, outcome: Option<Outcome>) -> Next {
        let mut state = self.lock();
        let Some(session) = state.active_mut(id) else {
            // stop() may have cancelled before the dropped attempt reached
            // the platform, leaving its utterance running.
            if outcome.is_none() && state.session.id == id {
                self.speaker.cancel();
            }
            log::debug!(
                "coordinator: dropping result for segment {}: {}",
                attempt.segment.index,
                PlaybackError::SessionSuperseded
            );
            return Next::Finished;
        };

        if session.attempt != attempt.attempt {
            return Next::Speak;
        }
        let Some(outcome) = outcome else {
            return Next::Speak;
        };

        let index = session.current_index;
        match outcome {
            Outcome::Completed => self.advance(session),
            Outcome::Interrupted => {
                if session.interrupt_replays < self.policy.max_interrupt_replays {
                    session.interrupt_replays += 1;
                    log::info!(
                        "coordinator: segment {index} interrupted, replaying ({}/{})",
                        session.interrupt_replays,
                        self.policy.max_interrupt_replays
                    );
                    Next::Speak
                } else {
                    log::warn!("coordinator: segment {index} keeps being interrupted, skipping");
                    self.advance(session)
                }
            }
            Outcome::TimedOut => {
                self.retry_or_give_up(session, PlaybackError::SegmentTimedOut { index })
            }
            Outcome::Failed(reason) => self.retry_or_give_up(
                session,
                PlaybackError::SegmentSynthesisFailed { index, reason },
            ),
        }
    }

    fn advance(&self, session: &mut Session) -> Next {
        session.current_index += 1;
        session.retry_count = 0;
        session.interrupt_replays = 0;

        if session.current_index < session.segments.len() {
            return Next::Pause(self.policy.inter_segment_delay());
        }

        session.status = PlaybackStatus::Completed;
        log::info!(
            "coordinator: session {} completed ({} segments)",
            session.id,
            session.segments.len()
        );
        self.emit(PlaybackEvent::Completed {
            session: session.id,
        });
        Next::Finished
    }

    fn retry_or_give_up(&self, session: &mut Session, error: PlaybackError) -> Next {
        if session.retry_count < self.policy.max_retries {
            session.retry_count += 1;
            log::warn!(
                "coordinator: {error}; retry {}/{}",
                session.retry_count,
                self.policy.max_retries
            );
            return Next::Pause(self.policy.retry_delay());
        }

        if session.current_index + 1 < session.segments.len() {
            log::warn!("coordinator: {error}; skipping segment");
            return self.advance(session);
        }

        session.status = PlaybackStatus::Failed;
        log::error!("coordinator: session {} failed: {error}", session.id);
        self.emit(PlaybackEvent::Failed {
            session: session.id,
            error,
        });
        Next::Finished
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
