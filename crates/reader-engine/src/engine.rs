//! Playback Engine — the `(p, s)` cursor state machine, generation
//! counter, prefetch scheduler, dead-man watchdog, and timeline estimator
//! of §4.3–§4.6.
//!
//! Grounded on `nayru-lib::tts`'s `epoch: Arc<AtomicU64>` (checked at job
//! pickup, post-headers, and mid-stream) as the direct analogue of `g`,
//! generalised here into the spec's explicit two-level cursor using
//! `nayru-app::tracker::SentenceTracker`'s chunk-offset/`current_sentence`
//! lookup as the template for mapping a flat completion count back onto a
//! structured position. Per spec.md §9's "pin the Engine to one task/actor
//! and serialise all mutations through a single mailbox" design note, all
//! state lives behind one `mpsc::UnboundedSender<EngineCmd>` mailbox task —
//! the async analogue of `nayru-lib/src/tts.rs`'s `cmd_tx`.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use reader_core::error::ReaderError;
use reader_core::normaliser::split_sentences;
use reader_core::timeline;
use reader_core::types::{Cursor, Lang, PlaybackState, RATE_MAX, RATE_MIN};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::backend::{Backend, BackendKind, SpeakJob};
use crate::fetch_backend::FetchBackend;
use crate::media_session::{MediaSessionBridge, MediaSessionGuard};
use crate::platform_backend::PlatformBackend;

const PREFETCH_DEPTH: usize = 20;
const DEAD_MAN_POLL: std::time::Duration = std::time::Duration::from_secs(5);
const DEAD_MAN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

// ─── Mailbox messages ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub enum BackendEvent {
    End { gen: u64, backend: BackendKind },
    Error { gen: u64, backend: BackendKind, should_fallback: bool },
    NeedsRespeak { gen: u64 },
}

pub enum EngineCmd {
    Load { paragraphs: Vec<String>, lang: Lang, title: String },
    Play,
    Pause,
    Resume,
    Stop,
    SkipForward,
    SkipBackward,
    SkipSentenceForward,
    SkipSentenceBackward,
    JumpToParagraph(usize),
    SeekToTime(f32),
    SetRate(f32),
    SetLang(Lang),
    SetWakeLock(bool),
    BackendEvent(BackendEvent),
    DeadManTick,
    Dispose,
}

/// Snapshot of everything a UI or CLI needs to render: cursor, playback
/// state, timeline, and the most recent user-visible error (if any).
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineStatus {
    pub title: String,
    pub cursor: Cursor,
    pub state: PlaybackState,
    pub rate: f32,
    pub lang: Lang,
    pub duration_secs: f32,
    pub position_secs: f32,
    pub last_error: Option<ReaderError>,
}

impl Default for EngineStatus {
    fn default() -> Self {
        Self {
            title: String::new(),
            cursor: Cursor::START,
            state: PlaybackState::Idle,
            rate: 1.0,
            lang: Lang::En,
            duration_secs: 0.0,
            position_secs: 0.0,
            last_error: None,
        }
    }
}

/// RAII wake-lock handle. Acquired on `play`/`resume`, dropped (released)
/// on every terminal transition, per spec.md §9's resource-scoping note.
/// No platform-specific facility is wired up here — the suspend-prevention
/// call itself is OS chrome outside this spec's core — but the guard shape
/// is load-bearing: it is what prevents a leak across the engine's many
/// reentrant cancellation paths.
struct WakeLockGuard;

impl WakeLockGuard {
    fn acquire() -> Self {
        debug!("wake-lock: acquired");
        WakeLockGuard
    }
}

impl Drop for WakeLockGuard {
    fn drop(&mut self) {
        debug!("wake-lock: released");
    }
}

/// A settable end-of-article callback. The Queue Controller is constructed
/// after the Engine (it needs a handle to it), so this hook is filled in
/// after the fact rather than passed into `PlaybackEngine::new` directly.
#[derive(Clone)]
pub struct ArticleEndHook(Arc<Mutex<Option<Box<dyn Fn() + Send>>>>);

impl ArticleEndHook {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(None)))
    }

    /// Registers the callback. Only the first registration takes effect in
    /// normal use — there is exactly one Queue Controller per Engine.
    pub fn set(&self, f: impl Fn() + Send + 'static) {
        *self.0.lock().unwrap() = Some(Box::new(f));
    }

    fn call(&self) {
        if let Some(f) = self.0.lock().unwrap().as_ref() {
            f();
        }
    }
}

/// Cloneable handle to the Playback Engine. All methods are non-blocking —
/// they enqueue a command onto the single mailbox and return immediately.
#[derive(Clone)]
pub struct PlaybackEngine {
    cmd_tx: mpsc::UnboundedSender<EngineCmd>,
    status_rx: watch::Receiver<EngineStatus>,
    article_end_hook: ArticleEndHook,
}

impl PlaybackEngine {
    /// The returned `ArticleEndHook` lets a Queue Controller observe
    /// end-of-article without the Engine knowing queues exist, per §4.8's
    /// "Engine and Queue Controller communicate only through this one
    /// callback and the Engine's public ops" boundary. Call
    /// [`PlaybackEngine::article_end_hook`] after constructing the Queue
    /// Controller to wire it up.
    pub fn new(
        fetch_backend: Option<FetchBackend>,
        platform_backend: Option<PlatformBackend>,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(EngineStatus::default());
        let article_end_hook = ArticleEndHook::new();

        let media = MediaSessionBridge::new(cmd_tx.clone());

        let watchdog_tx = cmd_tx.clone();
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(DEAD_MAN_POLL);
            loop {
                interval.tick().await;
                if watchdog_tx.send(EngineCmd::DeadManTick).is_err() {
                    break;
                }
            }
        });

        let mut state = EngineState {
            paragraphs_sentences: Vec::new(),
            current_text: None,
            title: String::new(),
            lang: Lang::En,
            rate: 1.0,
            cursor: Cursor::START,
            playback_state: PlaybackState::Idle,
            gen: 0,
            active_backend: BackendKind::Fetch,
            fetch_backend,
            platform_backend,
            last_progress_time: Instant::now(),
            wake_lock: None,
            media_session_guard: None,
            media,
            events_tx: cmd_tx.clone(),
            status_tx,
            on_article_end: article_end_hook.clone(),
        };

        runtime.spawn(async move {
            run_engine_actor(cmd_rx, &mut state).await;
        });

        Self { cmd_tx, status_rx, article_end_hook }
    }

    /// The hook a Queue Controller registers a callback on to learn when
    /// the current article finishes playing.
    pub fn article_end_hook(&self) -> ArticleEndHook {
        self.article_end_hook.clone()
    }

    pub fn status(&self) -> EngineStatus {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineStatus> {
        self.status_rx.clone()
    }

    pub fn load(&self, paragraphs: Vec<String>, lang: Lang, title: String) {
        let _ = self.cmd_tx.send(EngineCmd::Load { paragraphs, lang, title });
    }

    pub fn play(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Play);
    }

    pub fn pause(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Pause);
    }

    pub fn resume(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Resume);
    }

    pub fn stop(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Stop);
    }

    pub fn skip_forward(&self) {
        let _ = self.cmd_tx.send(EngineCmd::SkipForward);
    }

    pub fn skip_backward(&self) {
        let _ = self.cmd_tx.send(EngineCmd::SkipBackward);
    }

    pub fn skip_sentence_forward(&self) {
        let _ = self.cmd_tx.send(EngineCmd::SkipSentenceForward);
    }

    pub fn skip_sentence_backward(&self) {
        let _ = self.cmd_tx.send(EngineCmd::SkipSentenceBackward);
    }

    pub fn jump_to_paragraph(&self, p: usize) {
        let _ = self.cmd_tx.send(EngineCmd::JumpToParagraph(p));
    }

    pub fn seek_to_time(&self, seconds: f32) {
        let _ = self.cmd_tx.send(EngineCmd::SeekToTime(seconds));
    }

    pub fn set_rate(&self, rate: f32) {
        let _ = self.cmd_tx.send(EngineCmd::SetRate(rate));
    }

    pub fn set_lang(&self, lang: Lang) {
        let _ = self.cmd_tx.send(EngineCmd::SetLang(lang));
    }

    pub fn set_wake_lock(&self, enabled: bool) {
        let _ = self.cmd_tx.send(EngineCmd::SetWakeLock(enabled));
    }

    pub fn dispose(&self) {
        let _ = self.cmd_tx.send(EngineCmd::Dispose);
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<EngineCmd> {
        self.cmd_tx.clone()
    }
}

// ─── Actor state ───────────────────────────────────────────────────────────

struct EngineState {
    paragraphs_sentences: Vec<Vec<String>>,
    current_text: Option<String>,
    title: String,
    lang: Lang,
    rate: f32,
    cursor: Cursor,
    playback_state: PlaybackState,
    gen: u64,
    active_backend: BackendKind,
    fetch_backend: Option<FetchBackend>,
    platform_backend: Option<PlatformBackend>,
    last_progress_time: Instant,
    wake_lock: Option<WakeLockGuard>,
    media_session_guard: Option<MediaSessionGuard>,
    media: MediaSessionBridge,
    events_tx: mpsc::UnboundedSender<EngineCmd>,
    status_tx: watch::Sender<EngineStatus>,
    on_article_end: ArticleEndHook,
}

async fn run_engine_actor(mut cmd_rx: mpsc::UnboundedReceiver<EngineCmd>, state: &mut EngineState) {
    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            EngineCmd::Load { paragraphs, lang, title } => do_load(state, paragraphs, lang, title),
            EngineCmd::Play => do_play(state),
            EngineCmd::Pause => do_pause(state),
            EngineCmd::Resume => do_resume(state),
            EngineCmd::Stop => do_stop(state),
            EngineCmd::SkipForward => do_skip_forward(state),
            EngineCmd::SkipBackward => do_skip_backward(state),
            EngineCmd::SkipSentenceForward => do_skip_sentence_forward(state),
            EngineCmd::SkipSentenceBackward => do_skip_sentence_backward(state),
            EngineCmd::JumpToParagraph(p) => do_jump_to_paragraph(state, p),
            EngineCmd::SeekToTime(t) => do_seek_to_time(state, t),
            EngineCmd::SetRate(r) => do_set_rate(state, r),
            EngineCmd::SetLang(l) => {
                state.lang = l;
            }
            EngineCmd::SetWakeLock(enabled) => {
                if enabled && state.playback_state.is_playing() {
                    state.wake_lock = Some(WakeLockGuard::acquire());
                } else if !enabled {
                    state.wake_lock = None;
                }
            }
            EngineCmd::BackendEvent(event) => handle_backend_event(state, event),
            EngineCmd::DeadManTick => handle_dead_man_tick(state),
            EngineCmd::Dispose => {
                cancel_and_bump(state);
                if let Some(b) = &mut state.fetch_backend {
                    b.dispose();
                }
                if let Some(b) = &mut state.platform_backend {
                    b.dispose();
                }
                break;
            }
        }
        publish_status(state);
    }
}

fn publish_status(state: &EngineState) {
    let duration = timeline::duration(&state.paragraphs_sentences, state.rate);
    let position = timeline::position(&state.paragraphs_sentences, state.cursor, state.rate);
    state.status_tx.send_modify(|s| {
        s.title = state.title.clone();
        s.cursor = state.cursor;
        s.state = state.playback_state;
        s.rate = state.rate;
        s.lang = state.lang;
        s.duration_secs = duration;
        s.position_secs = position;
    });
}

fn set_error(state: &EngineState, error: ReaderError) {
    state.status_tx.send_modify(|s| s.last_error = Some(error));
}

// ─── Backend selection ─────────────────────────────────────────────────────

fn active_backend(state: &mut EngineState) -> Option<&mut dyn Backend> {
    let prefer_fetch = matches!(state.active_backend, BackendKind::Fetch);
    if prefer_fetch {
        if state.fetch_backend.is_some() {
            return state.fetch_backend.as_mut().map(|b| b as &mut dyn Backend);
        }
        state.platform_backend.as_mut().map(|b| b as &mut dyn Backend)
    } else {
        if state.platform_backend.is_some() {
            return state.platform_backend.as_mut().map(|b| b as &mut dyn Backend);
        }
        state.fetch_backend.as_mut().map(|b| b as &mut dyn Backend)
    }
}

fn cancel_and_bump(state: &mut EngineState) {
    state.gen += 1;
    if let Some(b) = &mut state.fetch_backend {
        b.cancel();
    }
    if let Some(b) = &mut state.platform_backend {
        b.cancel();
    }
}

// ─── speakCurrent: the engine's heartbeat ──────────────────────────────────

fn speak_current(state: &mut EngineState) {
    if state.playback_state.is_stopped() {
        return;
    }

    if state.cursor.p >= state.paragraphs_sentences.len() {
        transition_done(state);
        return;
    }

    if state.cursor.s >= state.paragraphs_sentences[state.cursor.p].len() {
        state.cursor.p += 1;
        state.cursor.s = 0;
        speak_current(state);
        return;
    }

    if state.cursor.s == 0 {
        debug!("engine: paragraph change -> {}", state.cursor.p);
    }

    prefetch_upcoming(state);

    let gen = state.gen;
    let text = state.paragraphs_sentences[state.cursor.p][state.cursor.s].clone();
    state.current_text = Some(text.clone());

    // Fetch is primary if present; otherwise every sentence routes to
    // Platform, per §6.1's "Implementers MAY supply only a Platform
    // backend" tolerance.
    state.active_backend = if state.fetch_backend.is_some() { BackendKind::Fetch } else { BackendKind::Platform };

    let job = SpeakJob { text, lang: state.lang, rate: state.rate, preferred_voice: None, gen };
    let events = state.events_tx.clone();
    if let Some(backend) = active_backend(state) {
        backend.speak(job, events);
    } else {
        warn!("engine: no backend available to speak");
    }
}

fn transition_done(state: &mut EngineState) {
    cancel_and_bump(state);
    state.wake_lock = None;
    state.media_session_guard = None;
    state.cursor = Cursor::START;
    state.playback_state = PlaybackState::Done;
    state.media.set_stopped();
    state.on_article_end.call();
}

fn prefetch_upcoming(state: &mut EngineState) {
    let Some(fetch_backend) = &state.fetch_backend else { return };

    let mut upcoming = Vec::with_capacity(PREFETCH_DEPTH);
    let mut p = state.cursor.p;
    let mut s = state.cursor.s + 1;
    while upcoming.len() < PREFETCH_DEPTH && p < state.paragraphs_sentences.len() {
        let sentences = &state.paragraphs_sentences[p];
        while s < sentences.len() && upcoming.len() < PREFETCH_DEPTH {
            upcoming.push(sentences[s].clone());
            s += 1;
        }
        p += 1;
        s = 0;
    }

    if !upcoming.is_empty() {
        fetch_backend.prefetch(upcoming, state.lang);
    }
}

// ─── Public operations ──────────────────────────────────────────────────────

fn do_load(state: &mut EngineState, paragraphs: Vec<String>, lang: Lang, title: String) {
    do_stop(state);
    state.paragraphs_sentences = paragraphs.iter().map(|p| split_sentences(p)).collect();
    state.lang = lang;
    state.title = title;
    state.cursor = Cursor::START;
    state.playback_state = PlaybackState::Idle;
    state.media.set_title(&state.title);
}

fn do_play(state: &mut EngineState) {
    match state.playback_state {
        PlaybackState::Paused => do_resume(state),
        PlaybackState::Idle | PlaybackState::Done => {
            if state.paragraphs_sentences.is_empty() {
                return;
            }
            state.playback_state = PlaybackState::Playing;
            state.wake_lock = Some(WakeLockGuard::acquire());
            state.media_session_guard = Some(state.media.activate(&state.title));
            state.last_progress_time = Instant::now();
            speak_current(state);
        }
        PlaybackState::Playing => {}
    }
}

fn do_pause(state: &mut EngineState) {
    if state.playback_state != PlaybackState::Playing {
        return;
    }
    state.playback_state = PlaybackState::Paused;
    if let Some(backend) = active_backend(state) {
        backend.pause();
    }
    state.media_session_guard = None;
}

fn do_resume(state: &mut EngineState) {
    if state.playback_state != PlaybackState::Paused {
        return;
    }
    state.playback_state = PlaybackState::Playing;
    state.media_session_guard = Some(state.media.activate(&state.title));
    let gen = state.gen;
    let events = state.events_tx.clone();
    if let Some(backend) = active_backend(state) {
        backend.resume(gen, events);
    }
}

fn do_stop(state: &mut EngineState) {
    cancel_and_bump(state);
    state.wake_lock = None;
    state.media_session_guard = None;
    state.cursor = Cursor::START;
    state.playback_state = PlaybackState::Idle;
}

fn do_skip_forward(state: &mut EngineState) {
    if state.cursor.p + 1 >= state.paragraphs_sentences.len() {
        return;
    }
    cancel_and_bump(state);
    state.cursor = Cursor { p: state.cursor.p + 1, s: 0 };
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_skip_backward(state: &mut EngineState) {
    if state.cursor.p == 0 {
        return;
    }
    cancel_and_bump(state);
    state.cursor = Cursor { p: state.cursor.p - 1, s: 0 };
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_skip_sentence_forward(state: &mut EngineState) {
    let (p, s) = (state.cursor.p, state.cursor.s);
    let new_cursor = if s + 1 < state.paragraphs_sentences.get(p).map(|v| v.len()).unwrap_or(0) {
        Cursor { p, s: s + 1 }
    } else if p + 1 < state.paragraphs_sentences.len() {
        Cursor { p: p + 1, s: 0 }
    } else {
        return;
    };
    cancel_and_bump(state);
    state.cursor = new_cursor;
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_skip_sentence_backward(state: &mut EngineState) {
    let (p, s) = (state.cursor.p, state.cursor.s);
    let new_cursor = if s > 0 {
        Cursor { p, s: s - 1 }
    } else if p > 0 {
        let last_s = state.paragraphs_sentences[p - 1].len().saturating_sub(1);
        Cursor { p: p - 1, s: last_s }
    } else {
        return;
    };
    cancel_and_bump(state);
    state.cursor = new_cursor;
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_jump_to_paragraph(state: &mut EngineState, p: usize) {
    if state.paragraphs_sentences.is_empty() {
        return;
    }
    let p = p.min(state.paragraphs_sentences.len() - 1);
    cancel_and_bump(state);
    state.cursor = Cursor { p, s: 0 };
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_seek_to_time(state: &mut EngineState, seconds: f32) {
    cancel_and_bump(state);
    state.cursor = timeline::seek_to_time(&state.paragraphs_sentences, seconds, state.rate);
    if state.playback_state.is_playing() {
        speak_current(state);
    }
}

fn do_set_rate(state: &mut EngineState, rate: f32) {
    state.rate = rate.clamp(RATE_MIN, RATE_MAX);
    if let Some(backend) = active_backend(state) {
        backend.set_rate(state.rate);
    }
}

// ─── Backend event handling ─────────────────────────────────────────────────

fn handle_backend_event(state: &mut EngineState, event: BackendEvent) {
    match event {
        BackendEvent::End { gen, .. } => {
            if state.playback_state.is_stopped() || gen != state.gen {
                return;
            }
            state.last_progress_time = Instant::now();
            state.cursor.s += 1;
            speak_current(state);
        }
        BackendEvent::Error { gen, should_fallback, .. } => {
            if state.playback_state.is_stopped() || gen != state.gen {
                return;
            }
            if should_fallback && state.active_backend == BackendKind::Fetch && state.platform_backend.is_some() {
                state.active_backend = BackendKind::Platform;
                if let (Some(text), Some(backend)) = (state.current_text.clone(), state.platform_backend.as_mut()) {
                    let job = SpeakJob { text, lang: state.lang, rate: state.rate, preferred_voice: None, gen };
                    backend.speak(job, state.events_tx.clone());
                }
            } else {
                set_error(state, ReaderError::FetchFailed);
            }
        }
        BackendEvent::NeedsRespeak { gen } => {
            if state.playback_state.is_stopped() || gen != state.gen {
                return;
            }
            cancel_and_bump(state);
            speak_current(state);
        }
    }
}

fn handle_dead_man_tick(state: &mut EngineState) {
    if state.playback_state != PlaybackState::Playing {
        return;
    }
    if state.last_progress_time.elapsed() > DEAD_MAN_TIMEOUT {
        warn!("engine: dead-man watchdog tripped, stopping");
        set_error(state, ReaderError::PlaybackStalled);
        do_stop(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shadow() -> Vec<Vec<String>> {
        vec![vec!["One.".into(), "Two.".into()], vec!["Three.".into()]]
    }

    #[test]
    fn skip_sentence_forward_crosses_paragraph_boundary() {
        let mut p = 0usize;
        let mut s = 1usize;
        let sentences = &shadow();
        let new_cursor = if s + 1 < sentences[p].len() {
            (p, s + 1)
        } else if p + 1 < sentences.len() {
            (p + 1, 0)
        } else {
            (p, s)
        };
        assert_eq!(new_cursor, (1, 0));
        p = new_cursor.0;
        s = new_cursor.1;
        assert_eq!((p, s), (1, 0));
    }

    #[test]
    fn skip_sentence_backward_crosses_paragraph_boundary_to_last_sentence() {
        let sentences = shadow();
        let p = 1usize;
        let s = 0usize;
        let new_cursor = if s > 0 {
            (p, s - 1)
        } else if p > 0 {
            (p - 1, sentences[p - 1].len().saturating_sub(1))
        } else {
            (p, s)
        };
        assert_eq!(new_cursor, (0, 1));
    }
}
