//! Short feedback tones.
//!
//! The mirror only ever plays three cues. Without the `audio` feature they
//! are logged; with it they are synthesized on a dedicated rodio thread.

#[cfg(feature = "audio")]
mod engine;
#[cfg(feature = "audio")]
pub mod tone;

#[cfg(feature = "audio")]
pub use engine::ToneEngineHandle;

use log::info;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Cue {
    /// Focus countdown reached zero.
    Complete,
    /// A new notification arrived.
    Notification,
    /// Agenda opened or closed.
    Swipe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Sawtooth,
}

/// Synthesis parameters for a cue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub waveform: Waveform,
    pub frequency: f32,
    pub gain: f32,
    pub duration: Duration,
}

impl Cue {
    pub fn tone(&self) -> ToneSpec {
        match self {
            Cue::Complete => ToneSpec {
                waveform: Waveform::Sine,
                frequency: 523.25,
                gain: 0.1,
                duration: Duration::from_millis(800),
            },
            Cue::Notification => ToneSpec {
                waveform: Waveform::Triangle,
                frequency: 800.0,
                gain: 0.05,
                duration: Duration::from_millis(300),
            },
            Cue::Swipe => ToneSpec {
                waveform: Waveform::Sawtooth,
                frequency: 200.0,
                gain: 0.05,
                duration: Duration::from_millis(300),
            },
        }
    }
}

/// Sink for cues. Playback is fire-and-forget; failures are logged by the
/// implementation and never reach the caller.
pub trait CuePlayer: Send + Sync {
    fn play(&self, cue: Cue);
}

/// Default player for headless runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogCuePlayer;

impl CuePlayer for LogCuePlayer {
    fn play(&self, cue: Cue) {
        info!("Cue: {:?}", cue);
    }
}

#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingCuePlayer {
    played: std::sync::Mutex<Vec<Cue>>,
}

#[cfg(test)]
impl RecordingCuePlayer {
    pub(crate) fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl CuePlayer for RecordingCuePlayer {
    fn play(&self, cue: Cue) {
        self.played.lock().unwrap().push(cue);
    }
}
