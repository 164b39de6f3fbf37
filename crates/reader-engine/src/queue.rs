//! Queue Controller — ordered playlist with persistence, auto-advance, and
//! Content Store coordination, per §4.8.
//!
//! `currentIndex`'s `-1` sentinel is the direct structural template from
//! `Hardcoreprawn-music-minder/src/player/queue.rs`'s `PlayQueue{items,
//! position: i32, ...}`, generalised from that queue's filesystem-path
//! track addressing to this spec's opaque persisted `id` + Content Store
//! pairing (`PlayQueue` never needs a second store since it addresses
//! tracks directly by path).

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reader_core::error::ReaderError;
use reader_core::types::{Article, Lang, QueueItem};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::content_store::ContentStore;
use crate::engine::PlaybackEngine;

const AUTO_ADVANCE_DELAY: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone)]
pub enum QueueNotification {
    UpNext(String),
}

struct QueueState {
    items: Vec<QueueItem>,
    current_index: i32,
    is_loading_item: bool,
    auto_advance: Option<JoinHandle<()>>,
}

pub struct QueueController {
    state: Mutex<QueueState>,
    content_store: ContentStore,
    persist_path: PathBuf,
    client: reqwest::Client,
    proxy_base: String,
    proxy_key: Option<String>,
    engine: PlaybackEngine,
    runtime: tokio::runtime::Handle,
    notify_tx: UnboundedSender<QueueNotification>,
}

impl QueueController {
    pub fn new(
        persist_path: PathBuf,
        content_store: ContentStore,
        proxy_base: String,
        proxy_key: Option<String>,
        engine: PlaybackEngine,
        runtime: tokio::runtime::Handle,
        notify_tx: UnboundedSender<QueueNotification>,
    ) -> Arc<Self> {
        let items = load_items(&persist_path);
        Arc::new(Self {
            state: Mutex::new(QueueState { items, current_index: -1, is_loading_item: false, auto_advance: None }),
            content_store,
            persist_path,
            client: reqwest::Client::new(),
            proxy_base,
            proxy_key,
            engine,
            runtime,
            notify_tx,
        })
    }

    pub fn items(&self) -> Vec<QueueItem> {
        self.state.lock().unwrap().items.clone()
    }

    pub fn current_index(&self) -> i32 {
        self.state.lock().unwrap().current_index
    }

    pub fn is_loading_item(&self) -> bool {
        self.state.lock().unwrap().is_loading_item
    }

    fn persist(&self, items: &[QueueItem]) {
        if let Some(parent) = self.persist_path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                warn!("queue: could not create {parent:?}, persist skipped");
                return;
            }
        }
        match serde_json::to_string(items) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.persist_path, json) {
                    warn!("queue: persist failed: {e}");
                }
            }
            Err(e) => warn!("queue: serialize failed: {e}"),
        }
    }

    pub fn add_article(&self, article: &Article) -> QueueItem {
        let item = QueueItem {
            id: new_id(),
            url: article.resolved_url.clone(),
            title: article.title.clone(),
            site_name: article.site_name.clone(),
            estimated_minutes: article.estimated_minutes,
            added_at: unix_now(),
        };
        {
            let mut state = self.state.lock().unwrap();
            state.items.push(item.clone());
            self.persist(&state.items);
        }
        if item.is_local() {
            self.content_store.save(&item.id, article);
        }
        item
    }

    pub fn remove_item(&self, id: &str) {
        let mut state = self.state.lock().unwrap();
        let Some(pos) = state.items.iter().position(|i| i.id == id) else { return };
        let removed = state.items.remove(pos);
        self.persist(&state.items);

        if removed.is_local() {
            self.content_store.delete(id);
        }

        if state.current_index == pos as i32 {
            state.current_index = -1;
            drop(state);
            self.engine.stop();
        } else if (pos as i32) < state.current_index {
            state.current_index -= 1;
        }
    }

    /// Replaces the list order, recovering `current_index` by locating the
    /// previously-current item's id rather than trusting ordinal position.
    pub fn reorder(&self, new_order: &[String]) {
        let mut state = self.state.lock().unwrap();
        let current_id = if state.current_index >= 0 {
            state.items.get(state.current_index as usize).map(|i| i.id.clone())
        } else {
            None
        };

        let mut reordered = Vec::with_capacity(new_order.len());
        for id in new_order {
            if let Some(item) = state.items.iter().find(|i| &i.id == id) {
                reordered.push(item.clone());
            }
        }
        state.items = reordered;
        state.current_index = current_id
            .and_then(|id| state.items.iter().position(|i| i.id == id))
            .map(|p| p as i32)
            .unwrap_or(-1);
        self.persist(&state.items);
    }

    pub fn clear_all(&self) {
        self.engine.stop();
        let mut state = self.state.lock().unwrap();
        state.items.clear();
        state.current_index = -1;
        self.persist(&state.items);
        drop(state);
        self.content_store.clear();
    }

    /// Loads `id`'s article via URL or the Content Store and sets
    /// `current_index`. Does not call `Engine.play` — callers do that
    /// separately, per §4.8.
    pub async fn play_item(&self, id: &str) -> Result<(), ReaderError> {
        self.cancel_auto_advance();

        let item = {
            let state = self.state.lock().unwrap();
            state.items.iter().find(|i| i.id == id).cloned()
        };
        let Some(item) = item else { return Err(ReaderError::ParseEmpty) };

        {
            let mut state = self.state.lock().unwrap();
            state.is_loading_item = true;
            state.current_index = state
                .items
                .iter()
                .position(|i| i.id == id)
                .map(|p| p as i32)
                .unwrap_or(-1);
        }

        let result = self.load_article_for(&item).await;
        self.state.lock().unwrap().is_loading_item = false;

        let article = result?;
        self.engine.load(article.paragraphs, article.lang, article.title);
        Ok(())
    }

    pub async fn play_next(self: &Arc<Self>) -> Result<(), ReaderError> {
        let next_id = {
            let state = self.state.lock().unwrap();
            state.items.get((state.current_index + 1).max(0) as usize).map(|i| i.id.clone())
        };
        let Some(id) = next_id else { return Ok(()) };
        self.play_item(&id).await?;
        self.engine.play();
        Ok(())
    }

    pub async fn play_previous(self: &Arc<Self>) -> Result<(), ReaderError> {
        let prev_id = {
            let state = self.state.lock().unwrap();
            if state.current_index <= 0 {
                None
            } else {
                state.items.get((state.current_index - 1) as usize).map(|i| i.id.clone())
            }
        };
        let Some(id) = prev_id else { return Ok(()) };
        self.play_item(&id).await?;
        self.engine.play();
        Ok(())
    }

    /// Called when the Engine reaches end-of-article. Emits an "up next"
    /// notification immediately and schedules `play_next` after
    /// `AUTO_ADVANCE_DELAY`.
    pub fn handle_article_end(self: &Arc<Self>) {
        let next_title = {
            let state = self.state.lock().unwrap();
            state.items.get((state.current_index + 1) as usize).map(|i| i.title.clone())
        };
        let Some(title) = next_title else { return };
        let _ = self.notify_tx.send(QueueNotification::UpNext(title));

        let this = self.clone();
        let handle = self.runtime.spawn(async move {
            tokio::time::sleep(AUTO_ADVANCE_DELAY).await;
            let _ = this.play_next().await;
        });
        self.state.lock().unwrap().auto_advance = Some(handle);
    }

    pub fn cancel_auto_advance(&self) {
        if let Some(handle) = self.state.lock().unwrap().auto_advance.take() {
            handle.abort();
        }
    }

    /// Forces the scheduled auto-advance transition to happen now.
    pub fn skip_to_next(self: &Arc<Self>) {
        self.cancel_auto_advance();
        let this = self.clone();
        self.runtime.spawn(async move {
            let _ = this.play_next().await;
        });
    }

    async fn load_article_for(&self, item: &QueueItem) -> Result<Article, ReaderError> {
        if item.is_local() {
            self.content_store.load(&item.id).ok_or(ReaderError::ParseEmpty)
        } else {
            self.fetch_and_normalise(&item.url).await
        }
    }

    /// Fetches page content through the remote proxy (§6.3) and normalises
    /// it. Title extraction here is a minimal fallback — full reader-view
    /// metadata extraction is UI-shell plumbing out of scope per §1.
    async fn fetch_and_normalise(&self, url: &str) -> Result<Article, ReaderError> {
        let mut req = self.client.get(&self.proxy_base).query(&[("url", url)]);
        if let Some(key) = &self.proxy_key {
            req = req.header("X-Proxy-Key", key);
        }

        let resp = req.send().await.map_err(|_| ReaderError::FetchFailed)?;
        let status = resp.status().as_u16();
        if status != 200 {
            let retry_after = resp
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok());
            return Err(ReaderError::from_proxy_status(status, retry_after));
        }

        let final_url = resp
            .headers()
            .get("X-Final-URL")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
            .unwrap_or_else(|| url.to_string());

        let body = resp.text().await.map_err(|_| ReaderError::FetchFailed)?;
        if body.len() > reader_core::extract::HTML_SIZE_CAP {
            return Err(ReaderError::TooLarge);
        }

        let paragraphs = reader_core::extract::from_html(&body)?;
        let word_count = paragraphs.iter().map(|p| p.split_whitespace().count()).sum();

        Ok(Article {
            title: paragraphs.first().cloned().unwrap_or_else(|| url.to_string()),
            paragraphs,
            markdown: String::new(),
            lang: Lang::En,
            html_lang: None,
            site_name: None,
            excerpt: None,
            word_count,
            estimated_minutes: word_count as f32 / 200.0,
            resolved_url: final_url,
        })
    }
}

fn load_items(path: &PathBuf) -> Vec<QueueItem> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
        Err(_) => Vec::new(),
    }
}

fn new_id() -> String {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_nanos();
    format!("{nanos:x}")
}

fn unix_now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}
