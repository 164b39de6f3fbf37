//! reader-engine — Playback Engine, Queue Controller, Content Store, and
//! Settings Store.
//!
//! Depends on reader-core for pure types and text processing.

pub mod backend;
pub mod content_store;
pub mod engine;
pub mod fetch_backend;
pub mod media_session;
pub mod platform_backend;
pub mod queue;
pub mod server;
pub mod settings_store;

pub use reader_core;

use std::path::PathBuf;
use std::sync::Arc;

use reader_core::types::Settings;
use tokio::sync::mpsc::UnboundedSender;

use content_store::ContentStore;
use engine::PlaybackEngine;
use fetch_backend::FetchBackend;
use platform_backend::PlatformBackend;
use queue::{QueueController, QueueNotification};
use settings_store::SettingsStore;

/// Everything the command-line front end (or any other caller) needs,
/// wired up according to §4.8's Engine/Queue Controller boundary: the
/// Queue Controller holds the Engine handle, and registers itself on the
/// Engine's end-of-article hook so neither knows about the other's types.
pub struct Reader {
    pub engine: PlaybackEngine,
    pub queue: Arc<QueueController>,
    pub settings_store: SettingsStore,
}

pub struct ReaderConfig {
    pub proxy_base: String,
    pub proxy_key: Option<String>,
    pub data_dir: PathBuf,
}

impl ReaderConfig {
    /// Resolves a default configuration rooted at `dirs::data_dir()`. The
    /// proxy base must still be supplied by the caller (there is no
    /// sensible default remote endpoint to bake in).
    pub fn new(proxy_base: String, proxy_key: Option<String>) -> Self {
        let data_dir = dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("reader");
        Self { proxy_base, proxy_key, data_dir }
    }
}

impl Reader {
    pub fn new(config: ReaderConfig, runtime: tokio::runtime::Handle, notify_tx: UnboundedSender<QueueNotification>) -> Self {
        let fetch_backend =
            Some(FetchBackend::new(config.proxy_base.clone(), config.proxy_key.clone(), runtime.clone()));
        let platform_backend = PlatformBackend::new(runtime.clone());

        let engine = PlaybackEngine::new(fetch_backend, platform_backend, runtime.clone());

        let content_store = ContentStore::new(config.data_dir.join("content.json"));
        let queue = QueueController::new(
            config.data_dir.join("queue.json"),
            content_store,
            config.proxy_base,
            config.proxy_key,
            engine.clone(),
            runtime,
            notify_tx,
        );

        let hook_queue = queue.clone();
        engine.article_end_hook().set(move || hook_queue.handle_article_end());

        let settings_path = SettingsStore::default_path().unwrap_or_else(|| config.data_dir.join("settings.json"));
        let settings_store = SettingsStore::new(settings_path);

        Self { engine, queue, settings_store }
    }

    pub fn load_settings(&self) -> Settings {
        self.settings_store.load()
    }

    pub fn save_settings(&self, settings: &Settings) {
        self.settings_store.save(settings);
    }
}
