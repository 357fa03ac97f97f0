use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

use super::{ToneSpec, Waveform};

const SAMPLE_RATE: u32 = 44_100;

/// Finite mono oscillator with a short linear fade-out.
pub struct Tone {
    spec: ToneSpec,
    total_samples: usize,
    num_sample: usize,
}

impl Tone {
    pub fn new(spec: ToneSpec) -> Self {
        Self {
            total_samples: (spec.duration.as_secs_f32() * SAMPLE_RATE as f32) as usize,
            spec,
            num_sample: 0,
        }
    }

    fn oscillate(&self, t: f32) -> f32 {
        let phase = (self.spec.frequency * t).fract();
        match self.spec.waveform {
            Waveform::Sine => (2.0 * PI * phase).sin(),
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

impl Iterator for Tone {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples {
            return None;
        }
        let t = self.num_sample as f32 / SAMPLE_RATE as f32;
        let remaining = (self.total_samples - self.num_sample) as f32;
        // Last 10ms fade out to avoid a click.
        let fade = (remaining / (SAMPLE_RATE as f32 * 0.01)).min(1.0);
        self.num_sample += 1;
        Some(self.oscillate(t) * self.spec.gain * fade)
    }
}

impl Source for Tone {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples - self.num_sample)
    }

    fn channels(&self) -> u16 {
        1
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(self.spec.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Cue;

    #[test]
    fn test_tone_is_finite_and_bounded() {
        let spec = Cue::Notification.tone();
        let samples: Vec<f32> = Tone::new(spec).collect();
        assert_eq!(samples.len(), (0.3 * SAMPLE_RATE as f32) as usize);
        assert!(samples.iter().all(|s| s.abs() <= spec.gain + 1e-6));
    }
}
