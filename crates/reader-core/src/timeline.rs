//! Timeline estimator — character-count-based duration/position reporting.
//!
//! Not bit-exact timing; reported positions are estimates derived from
//! sentence character counts, not measured audio positions.

use crate::types::Cursor;

/// Characters per second at 1x playback rate.
pub const CPS_1: f32 = 14.0;

fn sentence_duration(text: &str, rate: f32) -> f32 {
    text.chars().count() as f32 / (CPS_1 * rate)
}

/// Total estimated duration of the article at the given rate.
pub fn duration(paragraphs_sentences: &[Vec<String>], rate: f32) -> f32 {
    paragraphs_sentences
        .iter()
        .flatten()
        .map(|s| sentence_duration(s, rate))
        .sum()
}

/// Estimated elapsed time to reach (but not including) the sentence at
/// `cursor`.
pub fn position(paragraphs_sentences: &[Vec<String>], cursor: Cursor, rate: f32) -> f32 {
    let mut total = 0.0;
    for (p, sentences) in paragraphs_sentences.iter().enumerate() {
        for (s, text) in sentences.iter().enumerate() {
            if p > cursor.p || (p == cursor.p && s >= cursor.s) {
                return total;
            }
            total += sentence_duration(text, rate);
        }
    }
    total
}

/// Inverse of [`position`]: walks paragraphs in order accumulating
/// character-seconds, stopping at the first cursor whose accumulated
/// character count meets or exceeds `seconds * CPS_1 * rate`. Clamps to
/// the last paragraph if `seconds` is past the end of the article.
pub fn seek_to_time(paragraphs_sentences: &[Vec<String>], seconds: f32, rate: f32) -> Cursor {
    let target_chars = seconds * CPS_1 * rate;
    let mut accumulated = 0.0;
    let mut last = Cursor::START;

    for (p, sentences) in paragraphs_sentences.iter().enumerate() {
        for (s, text) in sentences.iter().enumerate() {
            last = Cursor { p, s };
            if accumulated >= target_chars {
                return last;
            }
            accumulated += text.chars().count() as f32;
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow() -> Vec<Vec<String>> {
        vec![
            vec!["a".repeat(14), "b".repeat(14)],
            vec!["c".repeat(28)],
        ]
    }

    #[test]
    fn duration_sums_all_sentences_at_rate_one() {
        // 14+14+28 = 56 chars / 14 cps = 4.0s
        assert!((duration(&shadow(), 1.0) - 4.0).abs() < 1e-6);
    }

    #[test]
    fn duration_scales_inversely_with_rate() {
        assert!((duration(&shadow(), 2.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn position_at_start_is_zero() {
        assert_eq!(position(&shadow(), Cursor { p: 0, s: 0 }, 1.0), 0.0);
    }

    #[test]
    fn position_advances_by_elapsed_sentences() {
        // Position at (0,1) = duration of sentence (0,0) = 14/14 = 1.0s
        assert!((position(&shadow(), Cursor { p: 0, s: 1 }, 1.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn seek_to_time_roundtrips_within_one_sentence() {
        let total = duration(&shadow(), 1.0);
        let target = total / 2.0;
        let cursor = seek_to_time(&shadow(), target, 1.0);
        let observed = position(&shadow(), cursor, 1.0);
        assert!((observed - target).abs() <= 2.0); // within ~one sentence
    }

    #[test]
    fn seek_past_end_clamps_to_last_cursor() {
        let cursor = seek_to_time(&shadow(), 9999.0, 1.0);
        assert_eq!(cursor, Cursor { p: 1, s: 0 });
    }
}
