//! Media-Session Bridge — mirrors Engine state to the OS now-playing
//! surface and forwards transport actions back to the Engine.
//!
//! The action-handler/now-playing half is grounded on
//! `Hardcoreprawn-music-minder/src/player/media_controls.rs`'s `souvlaki`
//! integration: a dedicated OS thread owns the platform media-control
//! object (Windows in particular needs its own message-pump thread) and
//! communicates over `std::sync::mpsc` command/update channels. The
//! keep-alive/inaudible-track half has no desktop analogue in the pack (it
//! is a browser-backgrounding concept); here it is a plain `tokio::time`
//! interval that simply re-asserts transport state, since a desktop process
//! is not suspended the way a backgrounded browser tab is.

use std::sync::mpsc as std_mpsc;
use std::time::Duration;

use souvlaki::{MediaControlEvent, MediaControls, MediaMetadata, MediaPlayback, PlatformConfig};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::engine::EngineCmd;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(5);

enum ControlCmd {
    SetMetadata { title: String },
    SetPlayback(MediaPlayback),
    Dispose,
}

/// A cloneable handle to the OS media-session bridge.
pub struct MediaSessionBridge {
    control_tx: std_mpsc::Sender<ControlCmd>,
}

impl MediaSessionBridge {
    /// Spawns the dedicated control thread and wires its action events back
    /// to the Engine's own mailbox.
    pub fn new(engine_cmd_tx: UnboundedSender<EngineCmd>) -> Self {
        let (control_tx, control_rx) = std_mpsc::channel();

        std::thread::Builder::new()
            .name("reader-media-session".into())
            .spawn(move || run_media_session(control_rx, engine_cmd_tx))
            .expect("failed to spawn media session thread");

        Self { control_tx }
    }

    pub fn set_title(&self, title: &str) {
        let _ = self.control_tx.send(ControlCmd::SetMetadata { title: title.to_string() });
    }

    pub fn set_playing(&self) {
        let _ = self.control_tx.send(ControlCmd::SetPlayback(MediaPlayback::Playing { progress: None }));
    }

    pub fn set_paused(&self) {
        let _ = self.control_tx.send(ControlCmd::SetPlayback(MediaPlayback::Paused { progress: None }));
    }

    pub fn set_stopped(&self) {
        let _ = self.control_tx.send(ControlCmd::SetPlayback(MediaPlayback::Stopped));
    }

    /// Activates the bridge for the duration of playback. Dropping the
    /// returned guard deactivates it — the RAII pattern spec.md §9
    /// recommends for scope-guarded resources.
    pub fn activate(&self, title: &str) -> MediaSessionGuard {
        self.set_title(title);
        self.set_playing();
        MediaSessionGuard { bridge: self.clone_handle() }
    }

    fn clone_handle(&self) -> MediaSessionBridge {
        MediaSessionBridge { control_tx: self.control_tx.clone() }
    }
}

/// RAII guard: holding one means the bridge is active and the keep-alive
/// loop is asserting transport state; dropping it deactivates.
pub struct MediaSessionGuard {
    bridge: MediaSessionBridge,
}

impl Drop for MediaSessionGuard {
    fn drop(&mut self) {
        self.bridge.set_stopped();
    }
}

fn run_media_session(control_rx: std_mpsc::Receiver<ControlCmd>, engine_cmd_tx: UnboundedSender<EngineCmd>) {
    let config = PlatformConfig {
        dbus_name: "reader",
        display_name: "Reader",
        hwnd: None,
    };

    let mut controls = match MediaControls::new(config) {
        Ok(c) => c,
        Err(e) => {
            warn!("media session: failed to initialize platform controls: {e:?}");
            return;
        }
    };

    let event_tx = engine_cmd_tx.clone();
    let attach = controls.attach(move |event: MediaControlEvent| {
        let cmd = match event {
            MediaControlEvent::Play => Some(EngineCmd::Play),
            MediaControlEvent::Pause => Some(EngineCmd::Pause),
            MediaControlEvent::Stop => Some(EngineCmd::Stop),
            MediaControlEvent::Next => Some(EngineCmd::SkipForward),
            MediaControlEvent::Previous => Some(EngineCmd::SkipBackward),
            MediaControlEvent::SeekBy(dir, _amount) => Some(if matches!(dir, souvlaki::SeekDirection::Forward) {
                EngineCmd::SkipSentenceForward
            } else {
                EngineCmd::SkipSentenceBackward
            }),
            MediaControlEvent::SetPosition(pos) => Some(EngineCmd::SeekToTime(pos.0.as_secs_f32())),
            _ => None,
        };
        if let Some(cmd) = cmd {
            let _ = event_tx.send(cmd);
        }
    });
    if let Err(e) = attach {
        warn!("media session: failed to attach event handler: {e:?}");
    }

    let mut last_title = String::new();
    let mut keep_alive = std::time::Instant::now();

    loop {
        match control_rx.recv_timeout(KEEP_ALIVE_INTERVAL) {
            Ok(ControlCmd::SetMetadata { title }) => {
                last_title = title.clone();
                let _ = controls.set_metadata(MediaMetadata {
                    title: Some(&title),
                    ..Default::default()
                });
            }
            Ok(ControlCmd::SetPlayback(playback)) => {
                let _ = controls.set_playback(playback);
            }
            Ok(ControlCmd::Dispose) => break,
            Err(std_mpsc::RecvTimeoutError::Timeout) => {
                // Keep-alive: re-assert metadata so the OS session doesn't
                // expire it during long periods with no state change.
                if keep_alive.elapsed() >= KEEP_ALIVE_INTERVAL && !last_title.is_empty() {
                    debug!("media session: keep-alive re-assert for {last_title}");
                    let _ = controls.set_metadata(MediaMetadata {
                        title: Some(&last_title),
                        ..Default::default()
                    });
                    keep_alive = std::time::Instant::now();
                }
            }
            Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
