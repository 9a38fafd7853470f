//! Voice catalog — enumerates platform voices and publishes ranked snapshots.
//!
//! Platforms enumerate voices in one of three ways: synchronously, only
//! after firing a "voices changed" notification, or never. [`VoiceCatalog`]
//! handles all three:
//!
//! ```text
//! initialize()
//!   ├─ platform.voices() non-empty ──────────────▶ publish snapshot
//!   └─ empty ─▶ wait for voices_changed() or voice_wait timeout
//!                └─▶ publish whatever is there (possibly empty)
//!
//! background watcher: every later voices_changed() ─▶ publish snapshot
//! ```
//!
//! Snapshots are replaced wholesale and never diffed. Enumeration never
//! fails; "no voices" is an empty snapshot and callers speak unvoiced.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::VoiceConfig;
use crate::platform::{PlatformPolicy, SpeechPlatform};

use super::rank::{rank_voices, select_best};
use super::{LanguageTag, Voice};

/// Ranked, immutable voice list. Cheap to clone.
pub type VoiceSnapshot = Arc<Vec<Voice>>;

type Listener = Arc<dyn Fn(&VoiceSnapshot) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, Listener)>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// Handle returned by [`VoiceCatalog::subscribe`].
///
/// Dropping it does **not** unsubscribe; call [`unsubscribe`](Self::unsubscribe).
/// Unsubscribing is idempotent and may be done from inside the callback.
pub struct Subscription {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// VoiceCatalog
// ---------------------------------------------------------------------------

/// Shared handle to the device's ranked voice list.
///
/// Cloning is cheap; all clones see the same snapshot and subscribers.
#[derive(Clone)]
pub struct VoiceCatalog {
    inner: Arc<CatalogInner>,
}

struct CatalogInner {
    platform: Arc<dyn SpeechPlatform>,
    target: LanguageTag,
    include_other_languages: bool,
    voice_wait: Duration,
    snapshot: Mutex<Option<VoiceSnapshot>>,
    listeners: Arc<Mutex<Listeners>>,
    /// Serialises enumeration attempts.
    init_lock: tokio::sync::Mutex<()>,
    /// Bumped when an attempt finishes; lets waiters detect they were coalesced.
    completed_attempts: AtomicU64,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl VoiceCatalog {
    pub fn new(
        platform: Arc<dyn SpeechPlatform>,
        config: &VoiceConfig,
        policy: &PlatformPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(CatalogInner {
                platform,
                target: LanguageTag::parse(&config.language),
                include_other_languages: config.include_other_languages,
                voice_wait: policy.voice_wait(),
                snapshot: Mutex::new(None),
                listeners: Arc::new(Mutex::new(Listeners::default())),
                init_lock: tokio::sync::Mutex::new(()),
                completed_attempts: AtomicU64::new(0),
                watcher: Mutex::new(None),
            }),
        }
    }

    /// Language family the snapshot is filtered to.
    pub fn target(&self) -> &LanguageTag {
        &self.inner.target
    }

    /// Enumerate voices and publish the first snapshot.
    ///
    /// Calls made while an attempt is running wait for it and return without
    /// enumerating again. Never fails; see the module docs.
    pub async fn initialize(&self) {
        let inner = &self.inner;
        let seen = inner.completed_attempts.load(Ordering::SeqCst);
        let _guard = inner.init_lock.lock().await;
        if inner.completed_attempts.load(Ordering::SeqCst) != seen {
            log::debug!("voice catalog: joined in-flight enumeration");
            return;
        }

        let mut changed = inner.platform.voices_changed();
        changed.borrow_and_update();

        let mut voices = inner.platform.voices();
        if voices.is_empty() {
            log::debug!(
                "voice catalog: no voices yet, waiting up to {:?} for the platform",
                inner.voice_wait
            );
            match tokio::time::timeout(inner.voice_wait, changed.changed()).await {
                Ok(Ok(())) => {
                    changed.borrow_and_update();
                }
                Ok(Err(_)) => log::debug!("voice catalog: platform closed its voice feed"),
                Err(_) => log::warn!(
                    "voice catalog: no voice notification within {:?}, continuing",
                    inner.voice_wait
                ),
            }
            voices = inner.platform.voices();
        }

        inner.publish(voices);
        inner.completed_attempts.fetch_add(1, Ordering::SeqCst);
        self.ensure_watcher(changed);
    }

    /// Last ranked snapshot; empty if never loaded.
    pub fn get_voices(&self) -> VoiceSnapshot {
        lock(&self.inner.snapshot).clone().unwrap_or_default()
    }

    /// `true` once a snapshot has been published (even an empty one).
    pub fn is_loaded(&self) -> bool {
        lock(&self.inner.snapshot).is_some()
    }

    /// Register `callback` for every new snapshot.
    ///
    /// If a snapshot already exists the callback runs immediately, before
    /// this method returns.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&VoiceSnapshot) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(callback);
        // Registering and reading under the listeners lock orders this call
        // wholly before or after any publish, so no snapshot arrives twice.
        let (id, current) = {
            let mut listeners = lock(&self.inner.listeners);
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Arc::clone(&listener)));
            (id, lock(&self.inner.snapshot).clone())
        };

        if let Some(snapshot) = current {
            listener(&snapshot);
        }

        Subscription {
            id,
            listeners: Arc::downgrade(&self.inner.listeners),
        }
    }

    /// Resolve the voice to speak with; see [`select_best`] for the order.
    pub fn select_best_voice(&self, preferred: Option<&str>) -> Option<Voice> {
        let voices = self.get_voices();
        select_best(&voices, &self.inner.target, preferred).cloned()
    }

    fn ensure_watcher(&self, mut changed: watch::Receiver<u64>) {
        let mut slot = lock(&self.inner.watcher);
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            while changed.changed().await.is_ok() {
                let Some(inner) = weak.upgrade() else { break };
                log::debug!("voice catalog: platform reported a voice change");
                inner.publish(inner.platform.voices());
            }
        }));
    }
}

impl CatalogInner {
    fn publish(&self, voices: Vec<Voice>) {
        let enumerated = voices.len();
        let ranked: VoiceSnapshot = Arc::new(rank_voices(
            voices,
            &self.target,
            self.include_other_languages,
        ));

        if ranked.is_empty() {
            log::warn!(
                "voice catalog: no usable {} voices ({enumerated} enumerated); speaking unvoiced",
                self.target
            );
        } else {
            log::info!(
                "voice catalog: {} {} voices ({enumerated} enumerated)",
                ranked.len(),
                self.target
            );
        }

        // Call listeners outside the lock so they may unsubscribe.
        let listeners: Vec<Listener> = {
            let listeners = lock(&self.listeners);
            *lock(&self.snapshot) = Some(Arc::clone(&ranked));
            listeners.entries.iter().map(|(_, l)| Arc::clone(l)).collect()
        };
        for listener in listeners {
            listener(&ranked);
        }
    }
}

impl Drop for CatalogInner {
    fn drop(&mut self) {
        if let Some(handle) = lock(&self.watcher).take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
