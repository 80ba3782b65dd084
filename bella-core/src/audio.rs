//! Voice feature extraction from raw audio samples

use crate::types::Emotion;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoiceFeatures {
    /// Normalized RMS energy
    pub energy: f32,
    /// Normalized zero-crossing rate
    pub speech_rate: f32,
}

impl VoiceFeatures {
    /// Extract features from mono PCM samples in [-1, 1]
    pub fn extract(samples: &[f32], sample_rate: u32) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
        let rms = (sum_squares / samples.len() as f32).sqrt();

        let crossings = samples
            .windows(2)
            .filter(|pair| (pair[0] < 0.0) != (pair[1] < 0.0))
            .count();
        let crossings_hz = crossings as f32 / samples.len() as f32 * sample_rate as f32;

        Self {
            energy: (rms * 10.0).min(1.0),
            speech_rate: (crossings_hz / 1000.0).min(1.0),
        }
    }

    pub fn is_silent(&self) -> bool {
        self.energy < 0.05
    }
}

/// Maps classifier confidence to displayed intensity for one emotion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IntensityCurve {
    pub min: f32,
    pub max: f32,
    pub falloff: f32,
}

impl IntensityCurve {
    pub fn for_emotion(emotion: Emotion) -> Self {
        let (min, max, falloff) = match emotion {
            Emotion::Happy => (0.6, 1.0, 0.8),
            Emotion::Sad => (0.5, 1.0, 0.9),
            Emotion::Angry => (0.7, 1.0, 0.85),
            Emotion::Surprised => (0.5, 0.95, 0.7),
            Emotion::Afraid => (0.6, 0.95, 0.88),
            Emotion::Confused => (0.55, 1.0, 0.87),
            Emotion::Calm | Emotion::Neutral => (0.0, 0.4, 0.6),
        };
        Self { min, max, falloff }
    }

    /// Flat below 0.3 confidence and above 0.8, power curve between
    pub fn apply(&self, confidence: f32) -> f32 {
        if confidence < 0.3 {
            return self.min;
        }
        if confidence > 0.8 {
            return self.max;
        }
        let t = (confidence - 0.3) / 0.5;
        self.min + (self.max - self.min) * t.powf(self.falloff)
    }
}
