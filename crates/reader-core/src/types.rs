//! Shared types for the reader engine ecosystem.
//!
//! Kept free of tokio/rodio/reqwest so downstream consumers can depend on
//! just the data model without pulling in the async/audio stack.

use serde::{Deserialize, Serialize};

/// Language the article is written in. Affects voice selection and the
/// request encoding used against the remote proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    En,
    Ro,
}

impl Default for Lang {
    fn default() -> Self {
        Lang::En
    }
}

impl Lang {
    /// The short code used in proxy request query strings (`lang=en`).
    pub fn as_str(self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ro => "ro",
        }
    }
}

/// The canonical normalised document the Normaliser produces and the
/// Playback Engine consumes immutably.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Each element is a "TTS paragraph": a unit of playback whose fine
    /// structure is a non-empty ordered sequence of sentences. Never empty.
    pub paragraphs: Vec<String>,
    /// Rendering source for a reading view. May be empty.
    pub markdown: String,
    pub lang: Lang,
    pub html_lang: Option<String>,
    pub site_name: Option<String>,
    pub excerpt: Option<String>,
    pub word_count: usize,
    pub estimated_minutes: f32,
    /// Empty denotes a non-remote item (pasted/file/EPUB/PDF).
    pub resolved_url: String,
}

impl Article {
    /// Splits every paragraph into sentences, producing the two-level
    /// shadow the Playback Engine drives its cursor over. Built once at
    /// load time; the Article itself is never mutated afterward.
    pub fn sentence_shadow(&self, split: impl Fn(&str) -> Vec<String>) -> Vec<Vec<String>> {
        self.paragraphs.iter().map(|p| split(p)).collect()
    }
}

/// A `(paragraph, sentence)` pair naming the next (or currently playing)
/// sentence. `0 ≤ p < total_paragraphs` and `0 ≤ s < sentences_in[p]`,
/// except transiently inside `speak_current` right before end-of-article.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cursor {
    pub p: usize,
    pub s: usize,
}

impl Cursor {
    pub const START: Cursor = Cursor { p: 0, s: 0 };
}

/// The four reachable playback states. `Done` is bit-identical to `Idle`
/// but is distinguished so callers can tell "never started" from
/// "reached the end of the article".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    Idle,
    Playing,
    Paused,
    Done,
}

impl PlaybackState {
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing)
    }

    pub fn is_paused(self) -> bool {
        matches!(self, PlaybackState::Paused)
    }

    pub fn is_stopped(self) -> bool {
        matches!(self, PlaybackState::Idle | PlaybackState::Done)
    }
}

/// One queued item. The `id` is opaque and stable; persistence keys use it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    /// Empty for local (non-URL) items.
    pub url: String,
    pub title: String,
    pub site_name: Option<String>,
    pub estimated_minutes: f32,
    pub added_at: u64,
}

impl QueueItem {
    pub fn is_local(&self) -> bool {
        self.url.is_empty()
    }
}

/// Validated, persisted playback configuration. §4.10 in full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub rate: f32,
    pub lang: LangPreference,
    pub voice_name: String,
    pub voice_gender: VoiceGender,
    pub wake_lock: bool,
    pub theme: Theme,
    pub device_voice_only: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LangPreference {
    Auto,
    En,
    Ro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceGender {
    Auto,
    Male,
    Female,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Dark,
    Light,
    Khaki,
}

pub const RATE_MIN: f32 = 0.5;
pub const RATE_MAX: f32 = 3.0;

impl Default for Settings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            lang: LangPreference::Auto,
            voice_name: String::new(),
            voice_gender: VoiceGender::Auto,
            wake_lock: true,
            theme: Theme::Dark,
            device_voice_only: false,
        }
    }
}

impl Settings {
    /// Per-field validate-with-fallback-to-default, applied on load so an
    /// obsolete or corrupt persisted value never propagates. Idempotent:
    /// `validate(validate(s)) == validate(s)`.
    pub fn validated(mut self) -> Self {
        if !(RATE_MIN..=RATE_MAX).contains(&self.rate) || !self.rate.is_finite() {
            self.rate = Settings::default().rate;
        }
        self
    }

    /// Lenient deserialization from a persisted JSON record: each field is
    /// decoded independently, so one obsolete enum value (e.g. a dropped
    /// `Theme` variant) falls back to its own default instead of discarding
    /// every other field in the record. Falls back to [`Settings::default`]
    /// entirely only if the text isn't valid JSON at all.
    pub fn from_persisted(text: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return Settings::default(),
        };
        let default = Settings::default();
        let field = |key: &str| value.get(key).cloned().unwrap_or(serde_json::Value::Null);
        let take = |key: &str, fallback| serde_json::from_value(field(key)).unwrap_or(fallback);

        Settings {
            rate: take("rate", default.rate),
            lang: take("lang", default.lang),
            voice_name: take("voice_name", default.voice_name),
            voice_gender: take("voice_gender", default.voice_gender),
            wake_lock: take("wake_lock", default.wake_lock),
            theme: take("theme", default.theme),
            device_voice_only: take("device_voice_only", default.device_voice_only),
        }
        .validated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_validation_clamps_out_of_range_rate() {
        let s = Settings {
            rate: 99.0,
            ..Settings::default()
        };
        let v = s.validated();
        assert_eq!(v.rate, 1.0);
    }

    #[test]
    fn settings_validation_is_idempotent() {
        let s = Settings {
            rate: 0.1,
            ..Settings::default()
        };
        let once = s.clone().validated();
        let twice = once.clone().validated();
        assert_eq!(once, twice);
    }

    #[test]
    fn settings_validation_accepts_in_range_rate() {
        let s = Settings {
            rate: 2.0,
            ..Settings::default()
        };
        assert_eq!(s.validated().rate, 2.0);
    }

    #[test]
    fn from_persisted_keeps_valid_fields_when_one_is_obsolete() {
        let json = r#"{"rate":2.0,"lang":"en","voice_name":"Nova","voice_gender":"female","wake_lock":false,"theme":"sunset","device_voice_only":true}"#;
        let s = Settings::from_persisted(json);
        assert_eq!(s.rate, 2.0);
        assert_eq!(s.voice_name, "Nova");
        assert!(s.device_voice_only);
        assert_eq!(s.theme, Settings::default().theme);
    }

    #[test]
    fn from_persisted_falls_back_fully_on_non_json() {
        assert_eq!(Settings::from_persisted("not json"), Settings::default());
    }

    #[test]
    fn queue_item_local_detection() {
        let local = QueueItem {
            id: "a".into(),
            url: String::new(),
            title: "t".into(),
            site_name: None,
            estimated_minutes: 1.0,
            added_at: 0,
        };
        assert!(local.is_local());
        let remote = QueueItem { url: "https://x".into(), ..local };
        assert!(!remote.is_local());
    }
}
