//! Facial morph-target influences

use crate::audio::VoiceFeatures;
use crate::types::Emotion;
use std::collections::BTreeMap;

/// Morph target name to influence in [0, 1]
pub type Expression = BTreeMap<String, f32>;

fn pattern(emotion: Emotion) -> &'static [(&'static str, f32)] {
    match emotion {
        Emotion::Happy => &[
            ("eyesSmile", 1.0),
            ("mouthSmile", 0.8),
            ("jawDrop", 0.3),
            ("browRaise", 0.5),
            ("cheekRaise", 0.6),
        ],
        Emotion::Sad => &[
            ("mouthFrown", 0.8),
            ("eyeDropped", 0.6),
            ("browLower", 0.7),
            ("jawDrop", 0.2),
            ("cheekDrop", 0.5),
        ],
        Emotion::Angry => &[
            ("browLower", 0.9),
            ("eyeNarrow", 0.8),
            ("mouthFrown", 0.6),
            ("jawTighten", 0.7),
            ("nosFlare", 0.5),
        ],
        Emotion::Surprised => &[
            ("eyeOpen", 0.95),
            ("jawDrop", 0.85),
            ("browRaise", 0.9),
            ("mouthSmile", 0.3),
            ("eyebrowSeparation", 0.8),
        ],
        Emotion::Afraid => &[
            ("eyeOpen", 0.8),
            ("browRaise", 0.7),
            ("mouthFrown", 0.4),
            ("jawDrop", 0.3),
            ("eyebrowSeparation", 0.6),
        ],
        Emotion::Confused => &[
            ("browLower", 0.4),
            ("browRaise", 0.3),
            ("eyeNarrow", 0.3),
            ("mouthFrown", 0.2),
        ],
        Emotion::Calm | Emotion::Neutral => &[
            ("eyesSmile", 0.0),
            ("mouthSmile", 0.0),
            ("jawDrop", 0.0),
            ("browRaise", 0.0),
            ("cheekRaise", 0.0),
        ],
    }
}

/// Morph targets for an emotion scaled by intensity
pub fn morph_targets(emotion: Emotion, intensity: f32) -> Expression {
    let intensity = if intensity.is_finite() { intensity.clamp(0.0, 1.0) } else { 0.0 };
    pattern(emotion)
        .iter()
        .map(|(name, weight)| ((*name).to_string(), (weight * intensity).clamp(0.0, 1.0)))
        .collect()
}

/// Blend over the union of targets; missing targets count as zero.
/// `factor` 0 yields `from`, 1 yields `to`.
pub fn blend_expressions(from: &Expression, to: &Expression, factor: f32) -> Expression {
    let factor = factor.clamp(0.0, 1.0);
    from.keys()
        .chain(to.keys())
        .map(|name| {
            let a = from.get(name).copied().unwrap_or(0.0);
            let b = to.get(name).copied().unwrap_or(0.0);
            (name.clone(), (a * (1.0 - factor) + b * factor).clamp(0.0, 1.0))
        })
        .collect()
}

/// Mouth targets driven by live voice energy and rate
pub fn mouth_targets(features: &VoiceFeatures) -> Expression {
    let energy = features.energy.clamp(0.0, 1.0);
    let rate = features.speech_rate.clamp(0.0, 1.0);
    let mut targets = Expression::new();
    targets.insert("jawDrop".to_string(), energy * 0.7);
    targets.insert("lipPucker".to_string(), (1.0 - energy) * rate * 0.4);
    targets.insert("lipStretch".to_string(), energy * rate * 0.5);
    targets.insert("tongueOut".to_string(), energy * 0.1);
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_targets_scale_with_intensity() {
        let targets = morph_targets(Emotion::Happy, 0.5);
        assert!((targets["mouthSmile"] - 0.4).abs() < 1e-6);
        assert!((targets["eyesSmile"] - 0.5).abs() < 1e-6);
        assert!(morph_targets(Emotion::Neutral, 1.0).values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_blend_covers_union() {
        let happy = morph_targets(Emotion::Happy, 1.0);
        let sad = morph_targets(Emotion::Sad, 1.0);
        let mid = blend_expressions(&happy, &sad, 0.5);
        assert!((mid["mouthSmile"] - 0.4).abs() < 1e-6);
        assert!((mid["mouthFrown"] - 0.4).abs() < 1e-6);
        assert!((mid["jawDrop"] - 0.25).abs() < 1e-6);
        assert_eq!(blend_expressions(&happy, &sad, 0.0)["mouthFrown"], 0.0);
    }

    #[test]
    fn test_mouth_follows_energy() {
        let quiet = mouth_targets(&VoiceFeatures { energy: 0.0, speech_rate: 0.0 });
        let loud = mouth_targets(&VoiceFeatures { energy: 1.0, speech_rate: 0.5 });
        assert_eq!(quiet["jawDrop"], 0.0);
        assert!(loud["jawDrop"] > quiet["jawDrop"]);
        assert!(loud.values().all(|v| (0.0..=1.0).contains(v)));
    }
}
