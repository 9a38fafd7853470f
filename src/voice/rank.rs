//! Voice ranking and best-voice selection.
//!
//! Ranking order (stable and total, test suites rely on it):
//!
//! 1. language-region exactness: target region > same language > other
//! 2. platform default first
//! 3. identifier, case-insensitive, then byte order

use std::cmp::Ordering;
use std::collections::HashSet;

use super::{LanguageTag, Voice};

// ---------------------------------------------------------------------------
// MatchTier
// ---------------------------------------------------------------------------

/// How closely a voice's language matches the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Same language and region (or the target names no region).
    Exact,
    /// Same language, different or missing region.
    Family,
    /// Different language.
    Other,
}

impl MatchTier {
    pub fn of(voice: &Voice, target: &LanguageTag) -> Self {
        let tag = voice.language();
        if !tag.same_family(target) {
            return MatchTier::Other;
        }
        match target.region() {
            None => MatchTier::Exact,
            Some(region) if tag.region() == Some(region) => MatchTier::Exact,
            Some(_) => MatchTier::Family,
        }
    }
}

fn compare(a: &Voice, b: &Voice, target: &LanguageTag) -> Ordering {
    MatchTier::of(a, target)
        .cmp(&MatchTier::of(b, target))
        .then_with(|| b.is_platform_default.cmp(&a.is_platform_default))
        .then_with(|| {
            a.identifier
                .to_lowercase()
                .cmp(&b.identifier.to_lowercase())
        })
        .then_with(|| a.identifier.cmp(&b.identifier))
        .then_with(|| a.language_tag.cmp(&b.language_tag))
}

// ---------------------------------------------------------------------------
// rank_voices
// ---------------------------------------------------------------------------

/// Filter, deduplicate and sort an enumerated voice list.
///
/// Voices outside the target language family are dropped unless
/// `include_other_languages` is set, in which case they rank last. When the
/// platform reports the same identifier twice, the better-ranked entry wins.
///
/// ```
/// use read_aloud::voice::{rank_voices, LanguageTag, Voice};
///
/// let ranked = rank_voices(
///     vec![
///         Voice::new("Daniel", "en-GB", false),
///         Voice::new("Thomas", "fr-FR", false),
///         Voice::new("Samantha", "en-US", false),
///     ],
///     &LanguageTag::parse("en-US"),
///     false,
/// );
/// let names: Vec<_> = ranked.iter().map(|v| v.identifier.as_str()).collect();
/// assert_eq!(names, ["Samantha", "Daniel"]);
/// ```
pub fn rank_voices(
    voices: Vec<Voice>,
    target: &LanguageTag,
    include_other_languages: bool,
) -> Vec<Voice> {
    let mut voices: Vec<Voice> = voices
        .into_iter()
        .filter(|v| !v.identifier.trim().is_empty())
        .filter(|v| include_other_languages || MatchTier::of(v, target) != MatchTier::Other)
        .collect();

    voices.sort_by(|a, b| compare(a, b, target));

    let mut seen = HashSet::new();
    voices.retain(|v| seen.insert(v.identifier.clone()));
    voices
}

// ---------------------------------------------------------------------------
// select_best
// ---------------------------------------------------------------------------

/// Pick the voice to speak with from a ranked list.
///
/// Resolution order:
/// 1. exact identifier match on `preferred`
/// 2. fuzzy match: one identifier is a case-insensitive prefix of the other
///    (platforms rename voices across OS versions, e.g. `"Alex"` →
///    `"Alex (Enhanced)"`), then case-insensitive substring
/// 3. platform default within the target language family
/// 4. first ranked voice
/// 5. `None` for an empty list
pub fn select_best<'a>(
    ranked: &'a [Voice],
    target: &LanguageTag,
    preferred: Option<&str>,
) -> Option<&'a Voice> {
    let preferred = preferred.map(str::trim).filter(|p| !p.is_empty());

    if let Some(wanted) = preferred {
        if let Some(v) = ranked.iter().find(|v| v.identifier == wanted) {
            return Some(v);
        }

        let wanted = wanted.to_lowercase();
        let prefix = ranked.iter().find(|v| {
            let id = v.identifier.to_lowercase();
            id.starts_with(&wanted) || wanted.starts_with(&id)
        });
        if let Some(v) = prefix {
            log::debug!("voice: '{wanted}' resolved by prefix to '{}'", v.identifier);
            return Some(v);
        }

        let substring = ranked
            .iter()
            .find(|v| v.identifier.to_lowercase().contains(&wanted));
        if let Some(v) = substring {
            log::debug!("voice: '{wanted}' resolved by substring to '{}'", v.identifier);
            return Some(v);
        }

        log::debug!("voice: no match for '{wanted}', using default policy");
    }

    ranked
        .iter()
        .find(|v| v.is_platform_default && MatchTier::of(v, target) != MatchTier::Other)
        .or_else(|| ranked.first())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
