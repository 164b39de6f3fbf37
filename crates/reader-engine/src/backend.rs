//! The Engine's backend capability set — a tagged variant over `{Fetch,
//! Platform}` rather than a trait object, per spec's "do not entangle
//! backend-specific fields into the Engine" design note.
//!
//! Backends never reach back into the Engine directly. Each speak job is
//! stamped with the generation it was issued under and reports completion
//! by sending an [`EngineCmd`](crate::engine::EngineCmd) back through the
//! Engine's own mailbox — the same shape as `nayru-lib::tts`'s
//! `epoch`-stamped `FetchJob`/`PlayCmd` pair, generalised to two backend
//! kinds instead of one.

use reader_core::types::Lang;
use tokio::sync::mpsc::UnboundedSender;

use crate::engine::EngineCmd;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Fetch,
    Platform,
}

/// One dispatch of `backend.speak(...)`.
#[derive(Debug, Clone)]
pub struct SpeakJob {
    pub text: String,
    pub lang: Lang,
    pub rate: f32,
    pub preferred_voice: Option<String>,
    pub gen: u64,
}

/// The capability set every backend implements. Methods are fire-and-forget;
/// completion is reported asynchronously via `events`.
pub trait Backend: Send {
    fn speak(&mut self, job: SpeakJob, events: UnboundedSender<EngineCmd>);
    fn pause(&mut self);
    /// Resume the suspended clip. `gen` is the generation active when resume
    /// was requested — if the backend cannot confirm it resumed within its
    /// watchdog window, it sends `EngineCmd::NeedsRespeak(gen)`.
    fn resume(&mut self, gen: u64, events: UnboundedSender<EngineCmd>);
    fn cancel(&mut self);
    fn set_rate(&mut self, rate: f32);
    fn dispose(&mut self);
}
