//! Scripted [`SpeechPlatform`] test double.
//!
//! Each call to `speak` pops the next [`MockBehavior`] from the script
//! (falling back to a short successful utterance) and plays it out on the
//! tokio clock, so tests run under `start_paused = true` without real time
//! passing.

use std::collections::VecDeque;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{PlatformClass, SpeechPlatform, SynthError, Utterance, UtteranceEvent};
use crate::voice::Voice;

/// What the mock engine does with one utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Speak for the given time, then report `Ended`.
    Finish(Duration),
    /// Speak for the given time, then go quiet without reporting `Ended`.
    FinishSilently(Duration),
    /// Report a synthesis failure immediately.
    Fail(String),
    /// Report `Interrupted` immediately, as if another app took the channel.
    Interrupt,
    /// Never finish; only `cancel` ends the utterance.
    Hang,
}

struct InFlight {
    id: u64,
    tx: mpsc::UnboundedSender<UtteranceEvent>,
    task: Option<JoinHandle<()>>,
}

pub struct MockPlatform {
    class: PlatformClass,
    voices: Mutex<Vec<Voice>>,
    voice_queries: AtomicUsize,
    voices_tx: watch::Sender<u64>,
    script: Mutex<VecDeque<MockBehavior>>,
    spoken: Mutex<Vec<Utterance>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
    cancels: AtomicUsize,
    overlaps: AtomicUsize,
    external_busy: AtomicBool,
    busy_hook: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::with_voices(vec![Voice::new("Samantha", "en-US", true)])
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let (voices_tx, _) = watch::channel(0);
        Self {
            class: PlatformClass::Desktop,
            voices: Mutex::new(voices),
            voice_queries: AtomicUsize::new(0),
            voices_tx,
            script: Mutex::new(VecDeque::new()),
            spoken: Mutex::new(Vec::new()),
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
            cancels: AtomicUsize::new(0),
            overlaps: AtomicUsize::new(0),
            external_busy: AtomicBool::new(false),
            busy_hook: Mutex::new(None),
        }
    }

    pub fn mobile(mut self) -> Self {
        self.class = PlatformClass::Mobile;
        self
    }

    /// Queue behaviours for the next utterances, in order.
    pub fn script(&self, behaviors: impl IntoIterator<Item = MockBehavior>) {
        self.script.lock().unwrap().extend(behaviors);
    }

    /// Replace the voice set and fire the change notification.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        *self.voices.lock().unwrap() = voices;
        self.voices_tx.send_modify(|generation| *generation += 1);
    }

    /// Pretend some other utterance is still playing.
    pub fn set_busy(&self, busy: bool) {
        self.external_busy.store(busy, Ordering::SeqCst);
    }

    /// Run `hook` once, inside the next `is_busy` query.
    pub fn on_next_busy_check(&self, hook: impl FnOnce() + Send + 'static) {
        *self.busy_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn voice_queries(&self) -> usize {
        self.voice_queries.load(Ordering::SeqCst)
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Utterances submitted while another one was still in flight.
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    fn finish_after(&self, id: u64, after: Duration, report: bool) -> JoinHandle<()> {
        let in_flight = Arc::clone(&self.in_flight);
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut slot = in_flight.lock().unwrap();
            if slot.as_ref().is_some_and(|f| f.id == id) {
                if let Some(done) = slot.take() {
                    if report {
                        let _ = done.tx.send(UtteranceEvent::Ended);
                    }
                }
            }
        })
    }
}

impl SpeechPlatform for MockPlatform {
    fn class(&self) -> PlatformClass {
        self.class
    }

    fn voices(&self) -> Vec<Voice> {
        self.voice_queries.fetch_add(1, Ordering::SeqCst);
        self.voices.lock().unwrap().clone()
    }

    fn voices_changed(&self) -> watch::Receiver<u64> {
        self.voices_tx.subscribe()
    }

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent> {
        self.spoken.lock().unwrap().push(utterance);
        if self.is_busy() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(UtteranceEvent::Started);

        let behavior = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(MockBehavior::Finish(Duration::from_millis(10)));

        let task = match behavior {
            MockBehavior::Fail(reason) => {
                let _ = tx.send(UtteranceEvent::Failed(SynthError::Synthesis(reason)));
                return rx;
            }
            MockBehavior::Interrupt => {
                let _ = tx.send(UtteranceEvent::Failed(SynthError::Interrupted));
                return rx;
            }
            MockBehavior::Finish(after) => Some(self.finish_after(id, after, true)),
            MockBehavior::FinishSilently(after) => Some(self.finish_after(id, after, false)),
            MockBehavior::Hang => None,
        };

        *self.in_flight.lock().unwrap() = Some(InFlight { id, tx, task });
        rx
    }

    fn cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        self.external_busy.store(false, Ordering::SeqCst);
        if let Some(flight) = self.in_flight.lock().unwrap().take() {
            if let Some(task) = flight.task {
                task.abort();
            }
            let _ = flight.tx.send(UtteranceEvent::Failed(SynthError::Interrupted));
        }
    }

    fn is_busy(&self) -> bool {
        let hook = self.busy_hook.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
        self.external_busy.load(Ordering::SeqCst) || self.in_flight.lock().unwrap().is_some()
    }

    fn rate_range(&self) -> RangeInclusive<f32> {
        0.5..=4.0
    }
}
