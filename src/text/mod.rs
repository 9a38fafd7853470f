//! Text segmentation — raw text → ordered, speakable [`Segment`]s.
//!
//! Two policies, chosen by the caller:
//!
//! | Policy         | Unit                                                    |
//! |----------------|---------------------------------------------------------|
//! | `Sentence`     | one sentence per segment, split at `.` `!` `?` (and CJK) |
//! | `BoundedChunk` | at most `max_words` words, cut early at a sentence end   |
//! |                | falling in the last 30 % of the chunk                    |
//!
//! Splitting is punctuation-driven only; abbreviations such as "Dr." end a
//! sentence like any other full stop. `.` `!` `?` and `…` end a sentence
//! only when whitespace or the end of the text follows, so "3.14" or
//! "example.com" stay whole. The full-width `。` `！` `？` split immediately.
//!
//! ```
//! use read_aloud::text::{split, SegmentationPolicy};
//!
//! let segments = split("Ask Dr. Lee. Pi is 3.14 today.", SegmentationPolicy::Sentence);
//! let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
//! assert_eq!(texts, ["Ask Dr.", "Lee.", "Pi is 3.14 today."]);
//! ```
//!
//! ```
//! use read_aloud::text::{split, SegmentationPolicy};
//!
//! let segments = split("Hello world. How are you? I am fine.", SegmentationPolicy::Sentence);
//! let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
//! assert_eq!(texts, ["Hello world.", "How are you?", "I am fine."]);
//! assert_eq!(segments[1].index, 1);
//! assert_eq!(segments[1].word_count, 3);
//! ```

pub mod segmenter;

pub use segmenter::{collapse_whitespace, split, word_count};

// ---------------------------------------------------------------------------
// Segment
// ---------------------------------------------------------------------------

/// One ordered, speakable unit of text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Trimmed, never empty.
    pub text: String,
    /// Position in reading order, gapless from 0.
    pub index: usize,
    /// Whitespace-separated token count, used for timeout estimation.
    pub word_count: usize,
}

// ---------------------------------------------------------------------------
// SegmentationPolicy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentationPolicy {
    /// One segment per sentence.
    Sentence,
    /// Word-bounded chunks that prefer to end on a sentence boundary.
    BoundedChunk { max_words: usize },
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        Self::Sentence
    }
}
