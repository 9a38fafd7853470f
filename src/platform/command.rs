//! `espeak-ng` backend driven through `tokio::process`.
//!
//! One child process per utterance. Completion is the process exit;
//! cancellation kills the child and reports [`SynthError::Interrupted`].
//! Voices are listed in the background (`espeak-ng --voices`) so the catalog
//! sees an empty list first and a change notification later.

use std::ops::RangeInclusive;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::SynthConfig;
use crate::voice::Voice;

use super::{PlatformClass, SpeechPlatform, SynthError, Utterance, UtteranceEvent};

/// espeak-ng accepts 80–450 words per minute.
const MIN_WPM: f32 = 80.0;
const MAX_WPM: f32 = 450.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A listed voice plus the `-v` argument that selects it.
#[derive(Debug, Clone, PartialEq)]
struct ListedVoice {
    voice: Voice,
    selector: String,
}

/// The utterance whose child process has not been reaped yet.
struct InFlight {
    id: u64,
    /// Taken by `cancel`; the entry stays until the child has exited.
    kill: Option<oneshot::Sender<()>>,
}

// ---------------------------------------------------------------------------
// CommandSynth
// ---------------------------------------------------------------------------

pub struct CommandSynth {
    config: SynthConfig,
    class: PlatformClass,
    voices: Arc<Mutex<Vec<ListedVoice>>>,
    voices_tx: Arc<watch::Sender<u64>>,
    in_flight: Arc<Mutex<Option<InFlight>>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for CommandSynth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSynth")
            .field("program", &self.config.program)
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

impl CommandSynth {
    /// Create the backend and start listing voices in the background.
    ///
    /// Must be called from inside a tokio runtime.
    pub fn spawn(config: &SynthConfig) -> Self {
        let synth = Self {
            config: config.clone(),
            class: PlatformClass::detect(),
            voices: Arc::new(Mutex::new(Vec::new())),
            voices_tx: Arc::new(watch::channel(0).0),
            in_flight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        };
        synth.load_voices_in_background();
        synth
    }

    /// Override the detected platform class.
    pub fn with_class(mut self, class: PlatformClass) -> Self {
        self.class = class;
        self
    }

    fn load_voices_in_background(&self) {
        let program = self.config.program.clone();
        let default_voice = self.config.default_voice.clone();
        let voices = Arc::clone(&self.voices);
        let voices_tx = Arc::clone(&self.voices_tx);

        tokio::spawn(async move {
            let output = tokio::process::Command::new(&program)
                .arg("--voices")
                .stdin(Stdio::null())
                .stderr(Stdio::null())
                .output()
                .await;

            match output {
                Ok(out) if out.status.success() => {
                    let listing = String::from_utf8_lossy(&out.stdout);
                    let listed = parse_voice_list(&listing, &default_voice);
                    log::debug!("{program}: listed {} voices", listed.len());
                    *lock(&voices) = listed;
                    voices_tx.send_modify(|generation| *generation += 1);
                }
                Ok(out) => log::warn!("{program} --voices exited with {}", out.status),
                Err(e) => log::warn!("could not run {program} to list voices: {e}"),
            }
        });
    }

    fn selector_for(&self, identifier: &str) -> Option<String> {
        lock(&self.voices)
            .iter()
            .find(|l| l.voice.identifier == identifier)
            .map(|l| l.selector.clone())
    }

    fn build_args(&self, utterance: &Utterance, selector: Option<&str>) -> Vec<String> {
        let wpm = (self.config.base_wpm as f32 * utterance.rate)
            .clamp(MIN_WPM, MAX_WPM)
            .round() as u32;
        let pitch = (utterance.pitch * 50.0).clamp(0.0, 99.0).round() as u32;
        let amplitude = (utterance.volume * 100.0).clamp(0.0, 200.0).round() as u32;

        let mut args = vec![
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
            "-a".to_string(),
            amplitude.to_string(),
        ];
        if let Some(selector) = selector {
            args.push("-v".to_string());
            args.push(selector.to_string());
        }
        // Text is fed on stdin so leading dashes are never parsed as flags.
        args.push("--stdin".to_string());
        args
    }
}

impl SpeechPlatform for CommandSynth {
    fn class(&self) -> PlatformClass {
        self.class
    }

    fn voices(&self) -> Vec<Voice> {
        lock(&self.voices).iter().map(|l| l.voice.clone()).collect()
    }

    fn voices_changed(&self) -> watch::Receiver<u64> {
        self.voices_tx.subscribe()
    }

    fn speak(&self, utterance: Utterance) -> mpsc::UnboundedReceiver<UtteranceEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let selector = utterance
            .voice
            .as_deref()
            .and_then(|id| self.selector_for(id));
        let args = self.build_args(&utterance, selector.as_deref());

        let spawned = tokio::process::Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                let _ = tx.send(UtteranceEvent::Failed(SynthError::Unavailable(format!(
                    "{}: {e}",
                    self.config.program
                ))));
                return rx;
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (kill_tx, kill_rx) = oneshot::channel();
        // Replacing an in-flight entry drops its kill sender, which stops it.
        *lock(&self.in_flight) = Some(InFlight {
            id,
            kill: Some(kill_tx),
        });
        let _ = tx.send(UtteranceEvent::Started);

        let in_flight = Arc::clone(&self.in_flight);
        let program = self.config.program.clone();
        let text = utterance.text;

        tokio::spawn(async move {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    log::debug!("{program}: writing utterance text failed: {e}");
                }
            }

            let finished = tokio::select! {
                status = child.wait() => Some(status),
                _ = kill_rx => None,
            };

            let event = match finished {
                Some(Ok(status)) if status.success() => UtteranceEvent::Ended,
                Some(Ok(status)) => UtteranceEvent::Failed(SynthError::Synthesis(format!(
                    "{program} exited with {status}"
                ))),
                Some(Err(e)) => UtteranceEvent::Failed(SynthError::Synthesis(e.to_string())),
                None => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    UtteranceEvent::Failed(SynthError::Interrupted)
                }
            };

            {
                let mut slot = lock(&in_flight);
                if slot.as_ref().is_some_and(|f| f.id == id) {
                    *slot = None;
                }
            }
            let _ = tx.send(event);
        });

        rx
    }

    fn cancel(&self) {
        let mut slot = lock(&self.in_flight);
        let Some(flight) = slot.as_mut() else {
            return;
        };
        if let Some(kill) = flight.kill.take() {
            log::debug!("{}: cancelling utterance {}", self.config.program, flight.id);
            let _ = kill.send(());
        }
    }

    fn is_busy(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    fn rate_range(&self) -> RangeInclusive<f32> {
        let base = self.config.base_wpm.max(1) as f32;
        (MIN_WPM / base)..=(MAX_WPM / base)
    }
}

// ---------------------------------------------------------------------------
// Voice listing
// ---------------------------------------------------------------------------

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File          Other Languages
///  5  en-gb           --/M      English_(Great_Britain) gmw/en
///  5  en-us           --/M      English_(America)  gmw/en-US
/// ```
///
/// The voice named (or whose language equals) `default_voice` is marked as
/// the platform default.
fn parse_voice_list(listing: &str, default_voice: &str) -> Vec<ListedVoice> {
    listing
        .lines()
        .filter_map(|line| {
            let mut cols = line.split_whitespace();
            let _priority = cols.next()?.parse::<u32>().ok()?;
            let language = cols.next()?;
            let _age_gender = cols.next()?;
            let name = cols.next()?;

            let identifier = name.replace('_', " ");
            let is_default = language.eq_ignore_ascii_case(default_voice)
                || identifier.eq_ignore_ascii_case(default_voice);

            Some(ListedVoice {
                voice: Voice::new(identifier, language, is_default),
                selector: language.to_string(),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
