use anyhow::{anyhow, Result};
use log::{error, warn};
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::sync::{
    mpsc::{self, Sender},
    Mutex,
};
use std::thread;

use super::{tone::Tone, Cue, CuePlayer};

enum AudioCommand {
    Play(Cue),
}

/// Plays cues on a dedicated thread holding the non-Send output stream.
pub struct ToneEngineHandle {
    tx: Mutex<Option<Sender<AudioCommand>>>,
}

impl ToneEngineHandle {
    pub fn new() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    fn ensure_thread(&self) -> Result<Sender<AudioCommand>> {
        let mut guard = self.tx.lock().map_err(|e| anyhow!(e.to_string()))?;
        if let Some(tx) = guard.as_ref() {
            return Ok(tx.clone());
        }

        let (tx, rx) = mpsc::channel::<AudioCommand>();

        thread::Builder::new()
            .name("mirror-audio".to_string())
            .spawn(move || {
                let mut output: Option<(OutputStream, OutputStreamHandle)> = None;

                while let Ok(cmd) = rx.recv() {
                    match cmd {
                        AudioCommand::Play(cue) => {
                            if output.is_none() {
                                match OutputStream::try_default() {
                                    Ok(pair) => output = Some(pair),
                                    Err(err) => {
                                        warn!("No audio output for {:?}: {}", cue, err);
                                        continue;
                                    }
                                }
                            }
                            let Some((_, handle)) = output.as_ref() else {
                                continue;
                            };
                            match Sink::try_new(handle) {
                                Ok(sink) => {
                                    sink.append(Tone::new(cue.tone()));
                                    sink.detach();
                                }
                                Err(err) => error!("Failed to create audio sink: {}", err),
                            }
                        }
                    }
                }
            })?;

        *guard = Some(tx.clone());
        Ok(tx)
    }
}

impl Default for ToneEngineHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CuePlayer for ToneEngineHandle {
    fn play(&self, cue: Cue) {
        let result = self
            .ensure_thread()
            .and_then(|tx| tx.send(AudioCommand::Play(cue)).map_err(|e| anyhow!(e.to_string())));
        if let Err(err) = result {
            error!("Failed to play {:?}: {}", cue, err);
        }
    }
}
