//! Platform backend — fallback that hands text to the host's speech
//! facility via the `tts` crate (SAPI / NSSpeechSynthesizer / speech-dispatcher
//! depending on platform). No example in the pack needs OS-level speech
//! synthesis (`nayru-lib::tts` only ever talks to a network TTS service), so
//! this crate is an enrichment pulled in from outside the corpus for this
//! one fallback path — see `DESIGN.md`.
//!
//! Host-emitted "interrupted"/"canceled" error kinds are treated as normal
//! per §4.2; any other error surfaces as a terminal `onError(false)`. The
//! resume watchdog (500 ms) is the backend-specific quirk the Fetch backend
//! does not need, since a local `rodio::Sink` resumes reliably.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tracing::warn;

use crate::backend::{Backend, BackendKind, SpeakJob};
use crate::engine::{BackendEvent, EngineCmd};

struct CurrentUtterance {
    gen: u64,
    events: UnboundedSender<EngineCmd>,
}

pub struct PlatformBackend {
    tts: Arc<Mutex<tts::Tts>>,
    current: Arc<Mutex<Option<CurrentUtterance>>>,
    runtime: tokio::runtime::Handle,
}

impl PlatformBackend {
    pub fn new(runtime: tokio::runtime::Handle) -> Option<Self> {
        let mut host = match tts::Tts::default() {
            Ok(t) => t,
            Err(e) => {
                warn!("platform backend: no host speech facility available: {e}");
                return None;
            }
        };

        let current: Arc<Mutex<Option<CurrentUtterance>>> = Arc::new(Mutex::new(None));

        let on_end_state = current.clone();
        let _ = host.on_utterance_end(Some(Box::new(move |_id| {
            if let Some(cur) = on_end_state.lock().unwrap().take() {
                let _ = cur.events.send(EngineCmd::BackendEvent(BackendEvent::End {
                    gen: cur.gen,
                    backend: BackendKind::Platform,
                }));
            }
        })));

        Some(Self {
            tts: Arc::new(Mutex::new(host)),
            current,
            runtime,
        })
    }
}

fn is_interrupted_or_canceled(message: &str) -> bool {
    let lower = message.to_lowercase();
    lower.contains("interrupt") || lower.contains("cancel")
}

impl Backend for PlatformBackend {
    fn speak(&mut self, job: SpeakJob, events: UnboundedSender<EngineCmd>) {
        *self.current.lock().unwrap() = Some(CurrentUtterance { gen: job.gen, events: events.clone() });

        let mut host = self.tts.lock().unwrap();
        let _ = host.set_rate(job.rate);
        if let Some(voice) = job.preferred_voice.as_deref() {
            let _ = host.voices().ok().and_then(|voices| {
                voices.into_iter().find(|v| v.name() == voice).map(|v| host.set_voice(&v))
            });
        }

        if let Err(e) = host.speak(&job.text, true) {
            let message = e.to_string();
            drop(host);
            if !is_interrupted_or_canceled(&message) {
                self.current.lock().unwrap().take();
                let _ = events.send(EngineCmd::BackendEvent(BackendEvent::Error {
                    gen: job.gen,
                    backend: BackendKind::Platform,
                    should_fallback: false,
                }));
            }
        }
    }

    fn pause(&mut self) {
        let _ = self.tts.lock().unwrap().pause();
    }

    fn resume(&mut self, gen: u64, events: UnboundedSender<EngineCmd>) {
        let _ = self.tts.lock().unwrap().resume();

        let tts = self.tts.clone();
        self.runtime.spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let still_speaking = tts.lock().unwrap().is_speaking().unwrap_or(false);
            if !still_speaking {
                let _ = events.send(EngineCmd::BackendEvent(BackendEvent::NeedsRespeak { gen }));
            }
        });
    }

    fn cancel(&mut self) {
        self.current.lock().unwrap().take();
        let _ = self.tts.lock().unwrap().stop();
    }

    fn set_rate(&mut self, rate: f32) {
        let _ = self.tts.lock().unwrap().set_rate(rate);
    }

    fn dispose(&mut self) {
        self.current.lock().unwrap().take();
        let _ = self.tts.lock().unwrap().stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupted_and_canceled_are_recognised_case_insensitively() {
        assert!(is_interrupted_or_canceled("Speech Interrupted"));
        assert!(is_interrupted_or_canceled("operation CANCELED"));
        assert!(!is_interrupted_or_canceled("device not found"));
    }
}
