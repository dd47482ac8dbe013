//! Fire-and-forget audio cues.
//!
//! The focus flow only talks to [`Feedback`]. Without the `sound` feature the
//! cues are logged; with it, [`AudioEngineHandle`] plays them on a dedicated
//! thread that owns the non-`Send` output stream.

#[cfg(feature = "sound")]
pub mod beep;

use log::debug;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cue {
    Warning,
    PhoneJail,
    UserAway,
    RestComplete,
    SessionComplete,
}

/// Best-effort audio side effects. Implementations must not block.
pub trait Feedback: Send + Sync {
    fn cue(&self, cue: Cue);

    /// Cut off anything still playing.
    fn silence(&self);
}

/// Logs cues instead of playing them.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentFeedback;

impl Feedback for SilentFeedback {
    fn cue(&self, cue: Cue) {
        debug!("cue: {cue:?}");
    }

    fn silence(&self) {
        debug!("cue: silence");
    }
}

#[cfg(feature = "sound")]
pub use engine::AudioEngineHandle;

#[cfg(feature = "sound")]
mod engine {
    use std::sync::{
        mpsc::{self, Sender},
        Mutex, PoisonError,
    };
    use std::thread;

    use log::{debug, warn};
    use rodio::{OutputStream, Sink};

    use super::{beep::Beep, Cue, Feedback};

    enum AudioCommand {
        Play(Cue),
        Stop,
    }

    pub struct AudioEngineHandle {
        tx: Mutex<Option<Sender<AudioCommand>>>,
    }

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self {
                tx: Mutex::new(None),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<AudioCommand>, String> {
            let mut guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(tx) = guard.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<AudioCommand>();

            // The output stream is not Send, so it lives on its own thread.
            thread::Builder::new()
                .name("audio-engine".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    fn ensure_sink(
                        stream: &mut Option<OutputStream>,
                        sink: &mut Option<Sink>,
                    ) -> Result<(), String> {
                        if sink.is_none() {
                            let (s, handle) = OutputStream::try_default().map_err(|e| {
                                format!("Failed to create audio output stream: {}", e)
                            })?;
                            let new_sink = Sink::try_new(&handle)
                                .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                            *stream = Some(s);
                            *sink = Some(new_sink);
                        }
                        Ok(())
                    }

                    while let Ok(cmd) = rx.recv() {
                        match cmd {
                            AudioCommand::Play(cue) => {
                                debug!("playing cue {cue:?}");
                                if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                                    warn!("{err}");
                                    continue;
                                }
                                if let Some(ref s) = sink {
                                    s.append(Beep::new());
                                }
                            }
                            AudioCommand::Stop => {
                                if let Some(s_old) = sink.take() {
                                    s_old.stop();
                                }
                                _stream = None;
                            }
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            *guard = Some(tx.clone());
            Ok(tx)
        }

        fn send(&self, command: AudioCommand) {
            let result = self
                .ensure_thread()
                .and_then(|tx| tx.send(command).map_err(|e| e.to_string()));
            if let Err(err) = result {
                warn!("Audio cue dropped: {err}");
            }
        }
    }

    impl Default for AudioEngineHandle {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Feedback for AudioEngineHandle {
        fn cue(&self, cue: Cue) {
            self.send(AudioCommand::Play(cue));
        }

        fn silence(&self) {
            // Nothing to cut off if the thread never started.
            let started = self
                .tx
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_some();
            if started {
                self.send(AudioCommand::Stop);
            }
        }
    }
}
