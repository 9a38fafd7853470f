//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files. Every section is
//! optional in the file; missing sections and keys take their defaults.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::platform::{PlatformClass, PlatformPolicy, TimerRole};
use crate::playback::PlaybackOptions;
use crate::text::SegmentationPolicy;

use super::AppPaths;

// ---------------------------------------------------------------------------
// SegmentationConfig
// ---------------------------------------------------------------------------

/// How text is cut into segments.
///
/// | Variant    | Segment unit                                       |
/// |------------|----------------------------------------------------|
/// | `Sentence` | one sentence                                       |
/// | `Chunk`    | at most `max_words` words, ending early on a sentence |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationMode {
    Sentence,
    Chunk,
}

impl Default for SegmentationMode {
    fn default() -> Self {
        Self::Sentence
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    pub mode: SegmentationMode,
    /// Word limit per chunk; ignored in `Sentence` mode.
    pub max_words: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            mode: SegmentationMode::default(),
            max_words: 30,
        }
    }
}

impl SegmentationConfig {
    pub fn policy(&self) -> SegmentationPolicy {
        match self.mode {
            SegmentationMode::Sentence => SegmentationPolicy::Sentence,
            SegmentationMode::Chunk => SegmentationPolicy::BoundedChunk {
                max_words: self.max_words,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Default speech parameters for `read-aloud speak`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Speed multiplier (1.0 = normal).
    pub rate: f32,
    /// Pitch multiplier (1.0 = engine default).
    pub pitch: f32,
    /// Volume between 0.0 and 1.0.
    pub volume: f32,
    /// Voice identifier to prefer; prefix and substring matches count.
    pub preferred_voice: Option<String>,
    pub segmentation: SegmentationConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            preferred_voice: None,
            segmentation: SegmentationConfig::default(),
        }
    }
}

impl PlaybackConfig {
    /// Options for one `play()` call using these settings.
    pub fn options(&self) -> PlaybackOptions {
        PlaybackOptions {
            rate: Some(self.rate),
            pitch: self.pitch,
            volume: self.volume,
            segmentation: self.segmentation.policy(),
            preferred_voice_id: self.preferred_voice.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// VoiceConfig
// ---------------------------------------------------------------------------

/// Which voices the catalog keeps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// Target language tag (e.g. `"en-US"`, `"de"`).
    pub language: String,
    /// Keep voices of other languages, ranked after the target family.
    pub include_other_languages: bool,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            language: "en-US".into(),
            include_other_languages: false,
        }
    }
}

// ---------------------------------------------------------------------------
// PolicyConfig
// ---------------------------------------------------------------------------

/// Per-class timing tables.
///
/// A table in the file may name only the keys it changes; the rest come from
/// that class's built-in defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PolicyFile")]
pub struct PolicyConfig {
    pub desktop: PlatformPolicy,
    pub mobile: PlatformPolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            desktop: PlatformPolicy::desktop(),
            mobile: PlatformPolicy::mobile(),
        }
    }
}

impl PolicyConfig {
    pub fn for_class(&self, class: PlatformClass) -> &PlatformPolicy {
        match class {
            PlatformClass::Desktop => &self.desktop,
            PlatformClass::Mobile => &self.mobile,
        }
    }
}

/// `[policy]` as written in the file.
#[derive(Default, Deserialize)]
#[serde(default)]
struct PolicyFile {
    desktop: PolicyOverrides,
    mobile: PolicyOverrides,
}

impl From<PolicyFile> for PolicyConfig {
    fn from(file: PolicyFile) -> Self {
        Self {
            desktop: file.desktop.apply(PlatformPolicy::desktop()),
            mobile: file.mobile.apply(PlatformPolicy::mobile()),
        }
    }
}

/// One `[policy.<class>]` table; absent keys keep the class default.
#[derive(Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PolicyOverrides {
    timeout_base_ms: Option<u64>,
    timeout_per_word_ms: Option<u64>,
    timeout_floor_ms: Option<u64>,
    timeout_ceiling_ms: Option<u64>,
    timer_role: Option<TimerRole>,
    max_retries: Option<u32>,
    retry_delay_ms: Option<u64>,
    inter_segment_delay_ms: Option<u64>,
    settle_delay_ms: Option<u64>,
    voice_wait_ms: Option<u64>,
    max_interrupt_replays: Option<u32>,
}

impl PolicyOverrides {
    fn apply(self, base: PlatformPolicy) -> PlatformPolicy {
        PlatformPolicy {
            timeout_base_ms: self.timeout_base_ms.unwrap_or(base.timeout_base_ms),
            timeout_per_word_ms: self.timeout_per_word_ms.unwrap_or(base.timeout_per_word_ms),
            timeout_floor_ms: self.timeout_floor_ms.unwrap_or(base.timeout_floor_ms),
            timeout_ceiling_ms: self.timeout_ceiling_ms.unwrap_or(base.timeout_ceiling_ms),
            timer_role: self.timer_role.unwrap_or(base.timer_role),
            max_retries: self.max_retries.unwrap_or(base.max_retries),
            retry_delay_ms: self.retry_delay_ms.unwrap_or(base.retry_delay_ms),
            inter_segment_delay_ms: self
                .inter_segment_delay_ms
                .unwrap_or(base.inter_segment_delay_ms),
            settle_delay_ms: self.settle_delay_ms.unwrap_or(base.settle_delay_ms),
            voice_wait_ms: self.voice_wait_ms.unwrap_or(base.voice_wait_ms),
            max_interrupt_replays: self
                .max_interrupt_replays
                .unwrap_or(base.max_interrupt_replays),
        }
    }
}

// ---------------------------------------------------------------------------
// SynthConfig
// ---------------------------------------------------------------------------

/// Settings for the `espeak-ng` process backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    /// Program name or path.
    pub program: String,
    /// Words per minute at rate 1.0.
    pub base_wpm: u32,
    /// espeak-ng voice reported as the platform default.
    pub default_voice: String,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".into(),
            base_wpm: 175,
            default_voice: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig
// ---------------------------------------------------------------------------

/// Top-level configuration, persisted as `settings.toml`.
///
/// ```rust,no_run
/// use read_aloud::config::AppConfig;
///
/// let config = AppConfig::load().unwrap_or_default();
/// println!("speaking at {}x", config.playback.rate);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Force a platform class instead of detecting it from the OS.
    pub platform_class: Option<PlatformClass>,
    /// Speech parameters and segmentation.
    pub playback: PlaybackConfig,
    /// Voice catalog filtering.
    pub voice: VoiceConfig,
    /// Timing and retry tables.
    pub policy: PolicyConfig,
    /// Speech engine process settings.
    pub synth: SynthConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests and `--config`).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured override, else the class detected for this OS.
    pub fn platform_class(&self) -> PlatformClass {
        self.platform_class.unwrap_or_else(PlatformClass::detect)
    }

    /// Timing table for the effective platform class.
    pub fn platform_policy(&self) -> PlatformPolicy {
        self.policy.for_class(self.platform_class()).clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trip_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");

        let mut original = AppConfig::default();
        original.platform_class = Some(PlatformClass::Mobile);
        original.playback.preferred_voice = Some("Alex".into());
        original.playback.segmentation.mode = SegmentationMode::Chunk;
        original.policy.mobile.max_retries = 5;
        original.save_to(&path).expect("save");

        let loaded = AppConfig::load_from(&path).expect("load");
        assert_eq!(original, loaded);
    }

    /// `load_from` on a non-existent path must return `Default` without error.
    #[test]
    fn load_missing_returns_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nonexistent.toml");

        let config = AppConfig::load_from(&path).expect("should not error");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[playback]\nrate = 1.25\n\n[voice]\nlanguage = \"de-DE\"\n",
        )
        .expect("write");

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.playback.rate, 1.25);
        assert_eq!(config.playback.pitch, 1.0);
        assert_eq!(config.voice.language, "de-DE");
        assert!(!config.voice.include_other_languages);
        assert_eq!(config.synth, SynthConfig::default());
        assert_eq!(config.policy, PolicyConfig::default());
    }

    #[test]
    fn partial_policy_table_keeps_class_defaults() {
        let config: AppConfig =
            toml::from_str("[policy.mobile]\nmax_retries = 5\n").expect("parse");

        assert_eq!(config.policy.mobile.max_retries, 5);
        assert_eq!(
            config.policy.mobile,
            PlatformPolicy {
                max_retries: 5,
                ..PlatformPolicy::mobile()
            }
        );
        assert_eq!(config.policy.desktop, PlatformPolicy::desktop());
    }

    #[test]
    fn unknown_policy_key_is_an_error() {
        assert!(toml::from_str::<AppConfig>("[policy.desktop]\nmax_retrys = 1\n").is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[playback\nrate = ").expect("write");

        assert!(AppConfig::load_from(&path).is_err());
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("deeper").join("settings.toml");

        AppConfig::default().save_to(&path).expect("save");
        assert!(path.exists());
    }

    #[test]
    fn default_values() {
        let cfg = AppConfig::default();

        assert!(cfg.platform_class.is_none());
        assert_eq!(cfg.playback.rate, 1.0);
        assert_eq!(cfg.playback.segmentation.mode, SegmentationMode::Sentence);
        assert_eq!(cfg.playback.segmentation.max_words, 30);
        assert_eq!(cfg.voice.language, "en-US");
        assert_eq!(cfg.synth.program, "espeak-ng");
        assert_eq!(cfg.synth.base_wpm, 175);
        assert_eq!(cfg.synth.default_voice, "en");
        assert_eq!(cfg.policy.desktop.timer_role, TimerRole::Backup);
        assert_eq!(cfg.policy.mobile.timer_role, TimerRole::Authoritative);
        assert_eq!(cfg.policy.mobile.max_retries, 3);
    }

    #[test]
    fn platform_override_selects_policy_table() {
        let cfg = AppConfig {
            platform_class: Some(PlatformClass::Mobile),
            ..AppConfig::default()
        };
        assert_eq!(cfg.platform_class(), PlatformClass::Mobile);
        assert_eq!(cfg.platform_policy(), PlatformPolicy::mobile());

        let cfg = AppConfig {
            platform_class: Some(PlatformClass::Desktop),
            ..AppConfig::default()
        };
        assert_eq!(cfg.platform_policy(), PlatformPolicy::desktop());
    }

    #[test]
    fn playback_options_follow_config() {
        let mut playback = PlaybackConfig::default();
        playback.rate = 1.5;
        playback.preferred_voice = Some("Daniel".into());
        playback.segmentation = SegmentationConfig {
            mode: SegmentationMode::Chunk,
            max_words: 12,
        };

        let options = playback.options();
        assert_eq!(options.rate, Some(1.5));
        assert_eq!(options.preferred_voice_id.as_deref(), Some("Daniel"));
        assert_eq!(
            options.segmentation,
            SegmentationPolicy::BoundedChunk { max_words: 12 }
        );
    }
}
