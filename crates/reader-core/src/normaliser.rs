//! Text normalisation — markdown/non-speech stripping, sentence splitting,
//! speakability filtering, and paragraph-block segmentation.
//!
//! Pure functions, no I/O.

use regex::Regex;
use std::sync::LazyLock;

// ─── Markdown / non-speech stripping ───────────────────────────────────────

static RE_TABLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)(?:^|\n)(\|[^\n]+\|(?:\n\|[^\n]+\|)*)").unwrap());
static RE_FENCED_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)```.*?```").unwrap());
static RE_INLINE_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`[^`]+`").unwrap());
static RE_HR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[\s]*[-*_]{3,}[\s]*$").unwrap());
static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static RE_HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"#{1,6}\s*").unwrap());
static RE_LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]+\)").unwrap());
static RE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[\s]*[-*]\s+").unwrap());
static RE_NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[\s]*\d+\.\s+").unwrap());
static RE_LEADING_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\.\s*").unwrap());
static RE_DOUBLE_DOT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.\s*\.").unwrap());
static RE_MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// Strip markdown formatting so text reads naturally when spoken.
pub fn strip_markdown(text: &str) -> String {
    let mut c = text.to_string();
    c = RE_TABLE
        .replace_all(&c, "\nSee the table in our conversation.\n")
        .into_owned();
    c = RE_FENCED_CODE
        .replace_all(&c, " See the code in our conversation. ")
        .into_owned();
    c = RE_INLINE_CODE.replace_all(&c, "").into_owned();
    c = RE_HR.replace_all(&c, "").into_owned();
    c = RE_BOLD.replace_all(&c, "$1").into_owned();
    c = RE_ITALIC.replace_all(&c, "$1").into_owned();
    c = RE_HEADING.replace_all(&c, "").into_owned();
    c = RE_LINK.replace_all(&c, "$1").into_owned();
    c = RE_BULLET.replace_all(&c, ". ").into_owned();
    c = RE_NUMBERED.replace_all(&c, ". ").into_owned();
    c = RE_LEADING_DOT.replace(&c, "").into_owned();
    c = RE_DOUBLE_DOT.replace_all(&c, ".").into_owned();
    c = RE_MULTI_SPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}

static RE_HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static RE_DATA_URI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"data:[a-zA-Z0-9/+.-]+;base64,[A-Za-z0-9+/=]+").unwrap());
static RE_MD_IMAGE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static RE_IMAGE_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[Image:[^\]]*\](?:\([^)]*\))?").unwrap());
static RE_IMAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://\S+\.(?:png|jpe?g|gif|webp|svg|bmp|avif)\b").unwrap()
});
static RE_LONG_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://\S{80,}").unwrap());

/// Removes content that is not safe or useful to speak: HTML tag substrings,
/// data-URI tokens, markdown image syntax, bracketed image references, raw
/// image URLs, and any bare `http(s)://` token 80 characters or longer.
/// Collapses internal whitespace and trims.
pub fn strip_non_speech(text: &str) -> String {
    let mut c = text.to_string();
    c = RE_DATA_URI.replace_all(&c, "").into_owned();
    c = RE_MD_IMAGE.replace_all(&c, "").into_owned();
    c = RE_IMAGE_REF.replace_all(&c, "").into_owned();
    c = RE_IMAGE_URL.replace_all(&c, "").into_owned();
    c = RE_LONG_URL.replace_all(&c, "").into_owned();
    c = RE_HTML_TAG.replace_all(&c, "").into_owned();
    c = RE_MULTI_SPACE.replace_all(&c, " ").into_owned();
    c.trim().to_string()
}

// ─── Speakability filter ───────────────────────────────────────────────────

// Unicode letters cover Latin plus the common accented ranges (Latin-1
// Supplement, Latin Extended-A/B) without having to enumerate them.
static RE_WORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\p{L}{2,}").unwrap());

/// A paragraph is speakable iff it contains at least three distinct
/// word-like tokens (runs of two or more Unicode letters).
pub fn is_speakable(text: &str) -> bool {
    let mut distinct = std::collections::HashSet::new();
    for m in RE_WORD_TOKEN.find_iter(text) {
        distinct.insert(m.as_str().to_lowercase());
        if distinct.len() >= 3 {
            return true;
        }
    }
    false
}

// ─── Sentence splitting ────────────────────────────────────────────────────

/// Minimum length (chars) before a sentence is eligible for short-sentence
/// merging with its neighbour.
pub const MIN_SENTENCE_LENGTH: usize = 40;
/// Hard cap on a single utterance after merging.
pub const MAX_UTTERANCE_LENGTH: usize = 200;
/// Minimum length (chars) for a normaliser-produced paragraph.
pub const MIN_PARAGRAPH_LENGTH: usize = 20;
/// Consumer-side (TTS-layer) block-merge flush threshold.
pub const MIN_TTS_PARAGRAPH: usize = 80;

/// Default maximum chunk length for [`split_text`].
pub const DEFAULT_MAX_CHUNK_LEN: usize = 200;

const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "prof", "sr", "jr", "st", "mt", "ft", "vs", "etc", "inc", "ltd",
    "co", "corp", "gen", "rev", "capt", "col", "cmdr", "lt", "sgt", "gov", "rep", "sen", "pres",
    "jan", "feb", "mar", "apr", "jun", "jul", "aug", "sep", "sept", "oct", "nov", "dec", "ph",
    "no", "vol", "pp", "approx", "ave", "blvd", "dept", "est", "fig",
];

fn ends_with_abbreviation(piece: &str) -> bool {
    let trimmed = piece.trim_end();
    let Some(word_start) = trimmed
        .rfind(|c: char| c.is_whitespace() || c == '(' || c == '"')
        .map(|i| i + 1)
    else {
        return last_word_is_abbreviation(trimmed);
    };
    last_word_is_abbreviation(&trimmed[word_start..])
}

fn last_word_is_abbreviation(word: &str) -> bool {
    let word = word.trim_end_matches('.');
    ABBREVIATIONS.contains(&word.to_lowercase().as_str())
}

fn starts_with_uppercase(s: &str) -> bool {
    s.chars()
        .next()
        .map(|c| c.is_uppercase())
        .unwrap_or(false)
}

fn ends_with_digit_dot(s: &str) -> bool {
    let s = s.trim_end();
    s.ends_with('.') && s[..s.len() - 1].chars().last().is_some_and(|c| c.is_ascii_digit())
}

fn starts_with_digit(s: &str) -> bool {
    s.trim_start().chars().next().is_some_and(|c| c.is_ascii_digit())
}

/// Raw split on sentence-ending punctuation followed by whitespace, or a
/// paragraph break (`\n\n+`); retains the punctuation with the preceding
/// piece. No lookbehind available in this engine's regex dialect, so this
/// walks bytes directly rather than using a lookbehind-based pattern.
fn split_raw(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut i = 0;

    while i < len {
        if bytes[i] == b'\n' && i + 1 < len && bytes[i + 1] == b'\n' {
            let chunk = text[start..i].trim();
            if !chunk.is_empty() {
                sentences.push(chunk.to_string());
            }
            while i < len && bytes[i] == b'\n' {
                i += 1;
            }
            start = i;
            continue;
        }

        if (bytes[i] == b'.' || bytes[i] == b'!' || bytes[i] == b'?')
            && i + 1 < len
            && bytes[i + 1].is_ascii_whitespace()
        {
            let chunk = text[start..=i].trim();
            if !chunk.is_empty() {
                sentences.push(chunk.to_string());
            }
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() && bytes[i] != b'\n' {
                i += 1;
            }
            start = i;
            continue;
        }

        i += 1;
    }

    if start < len {
        let chunk = text[start..].trim();
        if !chunk.is_empty() {
            sentences.push(chunk.to_string());
        }
    }

    sentences
}

/// Walks the raw split left-to-right, merging `next` into `current` when:
/// `current` ends in a recognised abbreviation, `current` ends in
/// digit-dot and `next` starts with a digit (a decimal number), or `next`
/// does not start with an uppercase letter (a false sentence break).
fn merge_false_breaks(pieces: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for next in pieces {
        if let Some(current) = out.last_mut() {
            let should_merge = ends_with_abbreviation(current)
                || (ends_with_digit_dot(current) && starts_with_digit(&next))
                || !starts_with_uppercase(&next);
            if should_merge {
                current.push(' ');
                current.push_str(&next);
                continue;
            }
        }
        out.push(next);
    }
    out
}

/// Short-sentence merging: a `current` shorter than [`MIN_SENTENCE_LENGTH`]
/// is folded into the next piece as long as the combined length stays
/// within [`MAX_UTTERANCE_LENGTH`]; otherwise it is emitted as-is. The
/// final accumulator is always emitted.
fn merge_short_sentences(pieces: Vec<String>) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Option<String> = None;

    for next in pieces {
        match current.take() {
            None => current = Some(next),
            Some(cur) => {
                if cur.len() < MIN_SENTENCE_LENGTH && cur.len() + 1 + next.len() <= MAX_UTTERANCE_LENGTH
                {
                    current = Some(format!("{cur} {next}"));
                } else {
                    out.push(cur);
                    current = Some(next);
                }
            }
        }
    }
    if let Some(cur) = current {
        out.push(cur);
    }
    out
}

/// Splits a paragraph into sentences: raw split, false-break merge
/// (abbreviations/decimals/lowercase-continuation), then short-sentence
/// merge. Always returns at least one non-empty element for non-empty
/// input.
pub fn split_sentences(text: &str) -> Vec<String> {
    let raw = split_raw(text);
    let merged = merge_false_breaks(raw);
    merge_short_sentences(merged)
}

/// Split text into chunks of roughly `max_len` chars, preferring sentence
/// boundaries, then word boundaries, then a hard split. Chunks shorter
/// than 2 chars are discarded.
pub fn split_text(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut result = Vec::new();
    let mut remaining = text;

    while remaining.len() > max_len {
        let window = &remaining[..max_len];

        let split_at = if let Some(pos) = window.rfind(". ") {
            if pos >= max_len / 2 {
                pos + 1
            } else {
                word_boundary_or_hard(window, max_len)
            }
        } else {
            word_boundary_or_hard(window, max_len)
        };

        let chunk = remaining[..split_at].trim_end();
        if !chunk.is_empty() {
            result.push(chunk.to_string());
        }
        remaining = remaining[split_at..].trim_start();
    }

    if remaining.len() >= 2 {
        result.push(remaining.to_string());
    }

    result
}

fn word_boundary_or_hard(window: &str, max_len: usize) -> usize {
    if let Some(pos) = window.rfind(' ') {
        if pos >= max_len / 3 {
            return pos;
        }
    }
    max_len
}

// ─── Paragraph block segmentation ──────────────────────────────────────────

fn blank_line_split(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .collect()
}

fn single_line_split(text: &str) -> Vec<String> {
    text.lines()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Groups sentences three at a time into paragraphs. Used as the last
/// resort when a document carries no paragraph structure at all.
///
/// Per the open question on short final groups (see `DESIGN.md`): a
/// trailing group of fewer than three sentences is still emitted here and
/// left to the speakability/length filter to decide its fate, rather than
/// silently dropped by the grouping step itself.
pub fn sentence_group_fallback(text: &str) -> Vec<String> {
    let sentences = split_raw(text);
    sentences
        .chunks(3)
        .map(|chunk| chunk.join(" "))
        .collect()
}

fn finish_block(raw_block: &str) -> Option<String> {
    let stripped = strip_non_speech(&strip_markdown(raw_block));
    if stripped.len() < MIN_PARAGRAPH_LENGTH || !is_speakable(&stripped) {
        return None;
    }
    Some(stripped)
}

/// Splits already-Markdown text into filtered, speakable paragraphs:
/// blank-line split, strip markdown/non-speech per block, then filter.
pub fn paragraphs_from_markdown(markdown: &str) -> Vec<String> {
    blank_line_split(markdown)
        .into_iter()
        .filter_map(|b| finish_block(&b))
        .collect()
}

/// Plain-text mode's three-tier fallback: blank-line split first; if at
/// most one block survives filtering, try single-line split; if still at
/// most one, fall back to grouping every three sentences.
pub fn paragraphs_from_plain_text(text: &str) -> Vec<String> {
    let by_blank_line: Vec<String> = blank_line_split(text)
        .into_iter()
        .filter_map(|b| finish_block(&b))
        .collect();
    if by_blank_line.len() > 1 {
        return by_blank_line;
    }

    let by_line: Vec<String> = single_line_split(text)
        .into_iter()
        .filter_map(|b| finish_block(&b))
        .collect();
    if by_line.len() > 1 {
        return by_line;
    }

    sentence_group_fallback(text)
        .into_iter()
        .filter_map(|b| finish_block(&b))
        .collect()
}

/// Consumer-side TTS-layer block merging: accumulates rendered-view block
/// text into a pending buffer, flushing it as one paragraph once its
/// length reaches [`MIN_TTS_PARAGRAPH`]. Each input block carries its own
/// index (`None` for skipped block types such as code blocks or
/// image-only figures, which contribute no text); every flushed paragraph
/// is returned together with the set of block indices that composed it.
pub fn merge_tts_blocks(blocks: &[(Option<usize>, String)]) -> Vec<(Vec<usize>, String)> {
    let mut out = Vec::new();
    let mut pending_text = String::new();
    let mut pending_indices: Vec<usize> = Vec::new();

    for (idx, text) in blocks {
        let Some(idx) = *idx else { continue };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !pending_text.is_empty() {
            pending_text.push(' ');
        }
        pending_text.push_str(text);
        pending_indices.push(idx);

        if pending_text.len() >= MIN_TTS_PARAGRAPH {
            out.push((std::mem::take(&mut pending_indices), std::mem::take(&mut pending_text)));
        }
    }
    if !pending_text.is_empty() {
        out.push((pending_indices, pending_text));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── strip_markdown ──────────────────────────────────────────

    #[test]
    fn strips_fenced_code_blocks() {
        let input = "before ```rust\nfn main() {}\n``` after";
        assert_eq!(
            strip_markdown(input),
            "before See the code in our conversation. after"
        );
    }

    #[test]
    fn strips_tables() {
        let input = "intro\n| a | b |\n| 1 | 2 |\nafter";
        let result = strip_markdown(input);
        assert!(result.contains("See the table in our conversation."));
        assert!(result.contains("after"));
    }

    #[test]
    fn strips_bold_and_italic() {
        assert_eq!(strip_markdown("this is **bold** text"), "this is bold text");
        assert_eq!(strip_markdown("this is *italic* text"), "this is italic text");
    }

    #[test]
    fn strips_headings_and_links() {
        assert_eq!(strip_markdown("## Hello World"), "Hello World");
        assert_eq!(
            strip_markdown("click [here](https://example.com) now"),
            "click here now"
        );
    }

    // ── strip_non_speech ─────────────────────────────────────────

    #[test]
    fn strips_html_tags() {
        assert_eq!(strip_non_speech("<b>hello</b> world"), "hello world");
    }

    #[test]
    fn strips_data_uri() {
        let input = "see image data:image/png;base64,AAAABBBB here";
        assert_eq!(strip_non_speech(input), "see image here");
    }

    #[test]
    fn strips_markdown_image_and_bracket_ref() {
        assert_eq!(
            strip_non_speech("before ![alt](pic.png) [Image: a cat](url) after"),
            "before after"
        );
    }

    #[test]
    fn strips_raw_image_url_and_long_url() {
        let input = format!(
            "see https://example.com/pic.jpg and https://example.com/{}",
            "x".repeat(90)
        );
        let result = strip_non_speech(&input);
        assert!(!result.contains("http"));
        assert!(result.contains("see"));
        assert!(result.contains("and"));
    }

    // ── is_speakable ─────────────────────────────────────────────

    #[test]
    fn speakable_requires_three_distinct_words() {
        assert!(is_speakable("This is a real sentence"));
        assert!(!is_speakable("a a a"));
        assert!(!is_speakable("1234 !!! ??"));
    }

    // ── split_sentences ────────────────────────────────────────

    #[test]
    fn split_sentences_basic() {
        let s = split_sentences("Hello world. How are you? I am fine!");
        assert_eq!(s, vec!["Hello world. How are you? I am fine!"]);
    }

    #[test]
    fn split_sentences_merges_abbreviations() {
        let s = split_sentences("I spoke with Dr. Smith yesterday. It went fine.");
        assert_eq!(s.len(), 1);
        assert!(s[0].contains("Dr. Smith"));
    }

    #[test]
    fn split_sentences_merges_decimal_numbers() {
        let s = split_sentences("The value was 3.14 according to the paper released today for review.");
        assert!(s.iter().any(|p| p.contains("3.14")));
    }

    #[test]
    fn split_sentences_merges_lowercase_continuation() {
        // "etc." followed by lowercase continuation should merge (false break).
        let s = split_sentences("We packed apples, oranges, etc. into the box for the long trip home.");
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn split_sentences_keeps_real_boundaries_with_uppercase_next() {
        let long_first = "A".repeat(45);
        let long_second = "B".repeat(45);
        let text = format!("{long_first}. {long_second}.");
        let s = split_sentences(&text);
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn split_sentences_short_sentence_merge_respects_cap() {
        // Many short fragments that would exceed MAX_UTTERANCE_LENGTH if all
        // merged together must still split into more than one utterance.
        let frag = "Hi. ".repeat(30);
        let s = split_sentences(frag.trim());
        assert!(s.len() > 1);
        for sentence in &s {
            assert!(sentence.len() <= MAX_UTTERANCE_LENGTH);
        }
    }

    #[test]
    fn split_sentences_never_empty_for_nonempty_input() {
        let s = split_sentences("just one fragment without terminal punctuation");
        assert_eq!(s.len(), 1);
    }

    // ── split_text ──────────────────────────────────────────────

    #[test]
    fn short_text_not_split() {
        assert_eq!(split_text("Hello world.", 200), vec!["Hello world."]);
    }

    #[test]
    fn hard_splits_long_word() {
        let text = "a".repeat(300);
        let chunks = split_text(&text, 100);
        assert_eq!(chunks.len(), 3);
    }

    // ── paragraph segmentation ───────────────────────────────────

    #[test]
    fn markdown_paragraphs_split_on_blank_lines() {
        let md = "First paragraph has enough real words to pass filtering easily.\n\nSecond paragraph also has enough real words in it to pass.";
        let paras = paragraphs_from_markdown(md);
        assert_eq!(paras.len(), 2);
    }

    #[test]
    fn plain_text_falls_back_through_tiers() {
        // No blank lines, no newlines at all: must fall through to the
        // sentence-group fallback.
        let text = "This is one sentence that is sufficiently long. Here is another complete sentence. And a third full sentence with real content. Fourth in the series for good measure. Fifth sentence closes the block nicely. Sixth sentence starts the second group. Seventh rolls on.";
        let paras = paragraphs_from_plain_text(text);
        assert!(!paras.is_empty());
        assert!(paras.len() <= 3);
    }

    #[test]
    fn plain_text_all_unspeakable_yields_empty() {
        let text = "A. B. C. D. E. F. G.";
        let paras = paragraphs_from_plain_text(text);
        assert!(paras.is_empty());
    }

    #[test]
    fn sentence_group_fallback_groups_by_three() {
        let text = "One real sentence here. Two real sentence here. Three real sentence here. Four real sentence here.";
        let groups = sentence_group_fallback(text);
        assert_eq!(groups.len(), 2);
    }

    // ── merge_tts_blocks ─────────────────────────────────────────

    #[test]
    fn merge_tts_blocks_flushes_at_threshold() {
        let blocks = vec![
            (Some(0), "Byline by someone.".to_string()),
            (Some(1), "x".repeat(100)),
            (None, "code block text ignored".to_string()),
            (Some(2), "short tail".to_string()),
        ];
        let merged = merge_tts_blocks(&blocks);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].0, vec![0, 1]);
        assert_eq!(merged[1].0, vec![2]);
    }
}
