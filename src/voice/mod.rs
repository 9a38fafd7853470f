//! Voice discovery and selection.
//!
//! This module provides:
//! * [`Voice`] — one immutable synthesis voice as enumerated by the platform.
//! * [`LanguageTag`] — a parsed `language[-REGION]` tag.
//! * [`rank_voices`] / [`select_best`] — the pure ranking and selection rules.
//! * [`VoiceCatalog`] — enumerates voices (sync, async or not at all), keeps
//!   the latest ranked snapshot and notifies subscribers.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use read_aloud::config::AppConfig;
//! use read_aloud::platform::{CommandSynth, PlatformPolicy, SpeechPlatform};
//! use read_aloud::voice::VoiceCatalog;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let platform: Arc<dyn SpeechPlatform> = Arc::new(CommandSynth::spawn(&config.synth));
//!     let policy = PlatformPolicy::for_class(platform.class());
//!
//!     let catalog = VoiceCatalog::new(platform, &config.voice, &policy);
//!     catalog.initialize().await;
//!
//!     let _sub = catalog.subscribe(|voices| println!("{} voices", voices.len()));
//!     println!("{:?}", catalog.select_best_voice(Some("Alex")));
//! }
//! ```

pub mod catalog;
pub mod rank;

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use catalog::{Subscription, VoiceCatalog, VoiceSnapshot};
pub use rank::{rank_voices, select_best, MatchTier};

// ---------------------------------------------------------------------------
// Voice
// ---------------------------------------------------------------------------

/// A synthesis voice. Never mutated after enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Voice {
    /// Platform-assigned name, e.g. `"Alex (Enhanced)"`.
    pub identifier: String,
    /// BCP-47 style tag, e.g. `"en-US"`.
    pub language_tag: String,
    /// Whether the platform reports this as its default voice.
    pub is_platform_default: bool,
}

impl Voice {
    pub fn new(
        identifier: impl Into<String>,
        language_tag: impl Into<String>,
        is_platform_default: bool,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            language_tag: language_tag.into(),
            is_platform_default,
        }
    }

    /// Parsed form of [`language_tag`](Self::language_tag).
    pub fn language(&self) -> LanguageTag {
        LanguageTag::parse(&self.language_tag)
    }
}

// ---------------------------------------------------------------------------
// LanguageTag
// ---------------------------------------------------------------------------

/// A `language[-REGION]` tag, normalised to lowercase language and uppercase
/// region. Accepts `_` as separator (`en_US`) since some engines use it.
///
/// ```
/// use read_aloud::voice::LanguageTag;
///
/// let tag = LanguageTag::parse("en_us");
/// assert_eq!(tag.language(), "en");
/// assert_eq!(tag.region(), Some("US"));
/// assert_eq!(tag.to_string(), "en-US");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LanguageTag {
    language: String,
    region: Option<String>,
}

impl LanguageTag {
    pub fn parse(tag: &str) -> Self {
        let mut parts = tag
            .trim()
            .split(['-', '_'])
            .filter(|p| !p.is_empty());

        let language = parts.next().unwrap_or_default().to_ascii_lowercase();

        // The region is the first 2-letter or 3-digit subtag; script and
        // variant subtags (e.g. `Hant`, `fonipa`) are skipped.
        let region = parts
            .find(|p| {
                (p.len() == 2 && p.chars().all(|c| c.is_ascii_alphabetic()))
                    || (p.len() == 3 && p.chars().all(|c| c.is_ascii_digit()))
            })
            .map(|p| p.to_ascii_uppercase());

        Self { language, region }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Same language, ignoring region.
    pub fn same_family(&self, other: &LanguageTag) -> bool {
        !self.language.is_empty() && self.language == other.language
    }
}

impl fmt::Display for LanguageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.region {
            Some(region) => write!(f, "{}-{}", self.language, region),
            None => write!(f, "{}", self.language),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
