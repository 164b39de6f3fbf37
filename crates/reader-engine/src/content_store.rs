//! Content Store — durable `id → Article`-shaped record mapping for
//! reopenable local (non-URL) queue items.
//!
//! No example in the pack persists arbitrary documents this way; built
//! fresh in `nayru-lib`'s general persistence idiom (`Result<_, String>`
//! internally), but every public operation is fallible-but-forgiving per
//! §4.9: storage failures silently no-op rather than propagate, since a
//! non-replayable local item is a UX inconvenience, not a correctness fault.

use std::collections::HashMap;
use std::path::PathBuf;

use reader_core::types::Article;
use tracing::warn;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredRecord {
    title: String,
    markdown: String,
    paragraphs: Vec<String>,
    lang: reader_core::types::Lang,
    html_lang: Option<String>,
    site_name: Option<String>,
    excerpt: Option<String>,
    word_count: usize,
    estimated_minutes: f32,
}

impl From<&Article> for StoredRecord {
    fn from(a: &Article) -> Self {
        Self {
            title: a.title.clone(),
            markdown: a.markdown.clone(),
            paragraphs: a.paragraphs.clone(),
            lang: a.lang,
            html_lang: a.html_lang.clone(),
            site_name: a.site_name.clone(),
            excerpt: a.excerpt.clone(),
            word_count: a.word_count,
            estimated_minutes: a.estimated_minutes,
        }
    }
}

impl StoredRecord {
    fn into_article(self) -> Article {
        Article {
            title: self.title,
            paragraphs: self.paragraphs,
            markdown: self.markdown,
            lang: self.lang,
            html_lang: self.html_lang,
            site_name: self.site_name,
            excerpt: self.excerpt,
            word_count: self.word_count,
            estimated_minutes: self.estimated_minutes,
            resolved_url: String::new(),
        }
    }
}

pub struct ContentStore {
    path: PathBuf,
}

impl ContentStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_all(&self) -> HashMap<String, StoredRecord> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn write_all(&self, records: &HashMap<String, StoredRecord>) {
        if let Some(parent) = self.path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                warn!("content store: could not create {parent:?}, write skipped");
                return;
            }
        }
        match serde_json::to_string(records) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.path, json) {
                    warn!("content store: write failed: {e}");
                }
            }
            Err(e) => warn!("content store: serialize failed: {e}"),
        }
    }

    /// Saves an article under `id`. Fails silently.
    pub fn save(&self, id: &str, article: &Article) {
        let mut records = self.load_all();
        records.insert(id.to_string(), StoredRecord::from(article));
        self.write_all(&records);
    }

    /// Loads the article stored under `id`, or `None` if absent or corrupt.
    pub fn load(&self, id: &str) -> Option<Article> {
        self.load_all().remove(id).map(StoredRecord::into_article)
    }

    /// Deletes the record under `id`. Fails silently if absent.
    pub fn delete(&self, id: &str) {
        let mut records = self.load_all();
        if records.remove(id).is_some() {
            self.write_all(&records);
        }
    }

    /// Clears every stored record.
    pub fn clear(&self) {
        self.write_all(&HashMap::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reader_core::types::Lang;

    fn sample_article() -> Article {
        Article {
            title: "Title".into(),
            paragraphs: vec!["Paragraph one.".into()],
            markdown: "Paragraph one.".into(),
            lang: Lang::En,
            html_lang: None,
            site_name: None,
            excerpt: None,
            word_count: 2,
            estimated_minutes: 0.1,
            resolved_url: String::new(),
        }
    }

    #[test]
    fn save_then_load_roundtrips() {
        let dir = std::env::temp_dir().join(format!("reader-content-store-test-{}", std::process::id()));
        let store = ContentStore::new(dir.join("content.json"));
        store.save("abc", &sample_article());
        let loaded = store.load("abc").unwrap();
        assert_eq!(loaded.title, "Title");
        store.delete("abc");
        assert!(store.load("abc").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_of_missing_id_is_none() {
        let dir = std::env::temp_dir().join(format!("reader-content-store-test-missing-{}", std::process::id()));
        let store = ContentStore::new(dir.join("content.json"));
        assert!(store.load("nonexistent").is_none());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
