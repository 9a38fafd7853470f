//! Sentence and bounded-chunk splitting.

use super::{Segment, SegmentationPolicy};

/// Share of a chunk (from its end) in which a sentence boundary cuts the
/// chunk short, in tenths.
const TRAILING_WINDOW_TENTHS: usize = 3;

/// Terminators that end a sentence only when followed by whitespace or the
/// end of the text.
fn is_spaced_terminal(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '…')
}

/// Full-width terminators that end a sentence on their own.
fn is_fullwidth_terminal(c: char) -> bool {
    matches!(c, '。' | '！' | '？')
}

/// Closing marks that stay attached to the sentence they end.
fn is_closing(c: char) -> bool {
    matches!(c, '"' | '\'' | '”' | '’' | ')' | ']' | '」' | '』')
}

/// Replace every whitespace run with a single space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Number of non-empty whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` under `policy`. Empty or whitespace-only input yields no
/// segments.
pub fn split(text: &str, policy: SegmentationPolicy) -> Vec<Segment> {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return Vec::new();
    }

    let pieces = match policy {
        SegmentationPolicy::Sentence => split_sentences(&collapsed),
        SegmentationPolicy::BoundedChunk { max_words } => split_chunks(&collapsed, max_words),
    };

    // Ordinals are assigned after dropping empty candidates.
    pieces
        .into_iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .enumerate()
        .map(|(index, text)| Segment {
            word_count: word_count(&text),
            text,
            index,
        })
        .collect()
}

fn split_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        current.push(c);
        i += 1;

        let spaced = is_spaced_terminal(c);
        if !spaced && !is_fullwidth_terminal(c) {
            continue;
        }

        // Absorb runs like "?!", "..." and closing quotes.
        while i < chars.len()
            && (is_spaced_terminal(chars[i])
                || is_fullwidth_terminal(chars[i])
                || is_closing(chars[i]))
        {
            current.push(chars[i]);
            i += 1;
        }

        let at_break = i >= chars.len() || chars[i].is_whitespace();
        if at_break || !spaced {
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// `true` when `word` ends a sentence (closing marks ignored).
fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(is_closing)
        .chars()
        .next_back()
        .is_some_and(|c| is_spaced_terminal(c) || is_fullwidth_terminal(c))
}

fn split_chunks(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    // Cut at a boundary once the chunk holds more than 70 % of max_words.
    let window_start = max_words - max_words * TRAILING_WINDOW_TENTHS / 10;

    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::with_capacity(max_words);

    for word in text.split(' ') {
        current.push(word);
        let full = current.len() >= max_words;
        let boundary = current.len() >= window_start && ends_sentence(word);
        if full || boundary {
            chunks.push(current.join(" "));
            current.clear();
        }
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }
    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    fn words_in_order(segments: &[Segment]) -> Vec<String> {
        segments
            .iter()
            .flat_map(|s| s.text.split_whitespace().map(str::to_string))
            .collect()
    }

    const ARTICLE: &str = "The river rose overnight. By morning, the bridge was closed!  \
        Nobody knew why the warnings had come so late? Officials promised an inquiry. \
        Meanwhile the town waited\n\n for the water to fall, and for answers to arrive.";

    // ---- sentence policy ---

    #[test]
    fn example_sentences() {
        let segments = split("Hello world. How are you? I am fine.", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["Hello world.", "How are you?", "I am fine."]);
        let indices: Vec<_> = segments.iter().map(|s| s.index).collect();
        assert_eq!(indices, [0, 1, 2]);
    }

    #[test]
    fn empty_and_whitespace_input_yield_nothing() {
        assert!(split("", SegmentationPolicy::Sentence).is_empty());
        assert!(split(" \n\t  ", SegmentationPolicy::Sentence).is_empty());
        assert!(split("   ", SegmentationPolicy::BoundedChunk { max_words: 5 }).is_empty());
    }

    #[test]
    fn text_without_terminal_punctuation_is_one_sentence() {
        let segments = split("just a fragment  without   an ending", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["just a fragment without an ending"]);
        assert_eq!(segments[0].word_count, 6);
    }

    #[test]
    fn whitespace_is_collapsed() {
        let segments = split("One.\n\n   Two\tthree.", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["One.", "Two three."]);
    }

    #[test]
    fn abbreviations_are_not_special_cased() {
        let segments = split("Dr. Smith arrived.", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["Dr.", "Smith arrived."]);
    }

    #[test]
    fn punctuation_runs_and_quotes_stay_attached() {
        let segments = split("Really?! \"Yes.\" Wait... ok", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["Really?!", "\"Yes.\"", "Wait...", "ok"]);
    }

    #[test]
    fn decimal_points_do_not_split() {
        let segments = split("Pi is 3.14 roughly. Yes.", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["Pi is 3.14 roughly.", "Yes."]);
    }

    #[test]
    fn fullwidth_terminators_split_without_spaces() {
        let segments = split("你好。再见！", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), ["你好。", "再见！"]);
    }

    #[test]
    fn punctuation_only_candidates_still_count() {
        let segments = split(". . Hi.", SegmentationPolicy::Sentence);
        assert_eq!(texts(&segments), [".", ".", "Hi."]);
        assert_eq!(segments[2].index, 2);
    }

    #[test]
    fn sentence_round_trip_preserves_reading_order() {
        let segments = split(ARTICLE, SegmentationPolicy::Sentence);
        assert_eq!(segments.len(), 5);
        assert_eq!(
            words_in_order(&segments),
            ARTICLE.split_whitespace().map(str::to_string).collect::<Vec<_>>()
        );
        let rejoined = texts(&segments).join(" ");
        assert_eq!(rejoined, collapse_whitespace(ARTICLE));
    }

    // ---- bounded-chunk policy ---

    #[test]
    fn chunks_never_exceed_max_words() {
        for max_words in [1, 2, 3, 5, 7, 10, 40] {
            let segments = split(ARTICLE, SegmentationPolicy::BoundedChunk { max_words });
            assert!(
                segments.iter().all(|s| s.word_count <= max_words),
                "max_words={max_words}: {:?}",
                texts(&segments)
            );
            assert_eq!(
                words_in_order(&segments),
                ARTICLE.split_whitespace().map(str::to_string).collect::<Vec<_>>(),
                "max_words={max_words}"
            );
        }
    }

    #[test]
    fn chunk_cut_short_at_boundary_in_trailing_window() {
        // Sentence ends at word 8 of 10: inside the last 30 %.
        let text = "one two three four five six seven eight. nine ten eleven twelve";
        let segments = split(text, SegmentationPolicy::BoundedChunk { max_words: 10 });
        assert_eq!(
            texts(&segments),
            ["one two three four five six seven eight.", "nine ten eleven twelve"]
        );
    }

    #[test]
    fn early_boundary_does_not_cut_chunk() {
        // Sentence ends at word 3 of 10: outside the trailing window.
        let text = "one two three. four five six seven eight nine ten eleven";
        let segments = split(text, SegmentationPolicy::BoundedChunk { max_words: 10 });
        assert_eq!(
            texts(&segments),
            ["one two three. four five six seven eight nine ten", "eleven"]
        );
    }

    #[test]
    fn boundary_at_window_edge_cuts() {
        // 70 % of 10 is 7: a sentence ending at word 7 is inside the window.
        let text = "a b c d e f g. h i j k";
        let segments = split(text, SegmentationPolicy::BoundedChunk { max_words: 10 });
        assert_eq!(texts(&segments), ["a b c d e f g.", "h i j k"]);
    }

    #[test]
    fn boundary_just_before_window_does_not_cut() {
        let text = "a b c d e f. g h i j k";
        let segments = split(text, SegmentationPolicy::BoundedChunk { max_words: 10 });
        assert_eq!(texts(&segments), ["a b c d e f. g h i j", "k"]);
    }

    #[test]
    fn zero_max_words_behaves_as_one() {
        let segments = split("a b c", SegmentationPolicy::BoundedChunk { max_words: 0 });
        assert_eq!(texts(&segments), ["a", "b", "c"]);
    }

    #[test]
    fn chunk_ordinals_are_gapless() {
        let segments = split(ARTICLE, SegmentationPolicy::BoundedChunk { max_words: 4 });
        for (expected, s) in segments.iter().enumerate() {
            assert_eq!(s.index, expected);
            assert!(!s.text.is_empty());
        }
    }

    // ---- helpers ---

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(word_count("  a  b\n c "), 3);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn ends_sentence_sees_through_closing_marks() {
        assert!(ends_sentence("done.\""));
        assert!(ends_sentence("what?)"));
        assert!(!ends_sentence("maybe,"));
        assert!(!ends_sentence("\""));
    }
}
