//! Text-driven lip-sync frames

use serde::{Deserialize, Serialize};

/// Frame slot in milliseconds
pub const FRAME_MS: u32 = 25;

/// Longest utterance frames are generated for (10 minutes)
pub const MAX_UTTERANCE_MS: u32 = 600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Viseme {
    Closed,
    Teeth,
    Open,
    Rounded,
    Neutral,
}

impl Viseme {
    pub fn from_letter(letter: char) -> Self {
        match letter.to_ascii_lowercase() {
            'p' | 'b' | 'm' => Viseme::Closed,
            'f' | 'v' | 't' | 'd' | 's' | 'z' | 'n' | 'l' => Viseme::Teeth,
            'a' | 'e' | 'i' | 'o' | 'u' | 'j' | 'y' => Viseme::Open,
            'r' | 'w' => Viseme::Rounded,
            _ => Viseme::Neutral,
        }
    }

    pub fn shape(&self) -> MouthShape {
        let (scale_x, scale_y) = match self {
            Viseme::Closed => (0.8, 0.3),
            Viseme::Open => (0.9, 0.8),
            Viseme::Teeth => (0.7, 0.5),
            Viseme::Rounded => (0.5, 0.6),
            Viseme::Neutral => (0.8, 0.4),
        };
        MouthShape { scale_x, scale_y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MouthShape {
    pub scale_x: f32,
    pub scale_y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisemeFrame {
    pub index: usize,
    pub viseme: Viseme,
    pub shape: MouthShape,
    pub intensity: f32,
    /// Offset from the start of the utterance in milliseconds
    pub offset_ms: u32,
}

/// Frames covering `duration_ms`, one per letter slot, padded with neutral.
///
/// Durations beyond [`MAX_UTTERANCE_MS`] are truncated to it.
pub fn generate_frames(text: &str, duration_ms: u32) -> Vec<VisemeFrame> {
    let duration_ms = duration_ms.min(MAX_UTTERANCE_MS);
    let phonemes: Vec<Viseme> = text
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(Viseme::from_letter)
        .collect();
    let total = duration_ms.div_ceil(FRAME_MS) as usize;
    let mut frames = Vec::with_capacity(total);
    if total == 0 {
        return frames;
    }

    let per_phoneme = (total / phonemes.len().max(1)).max(1);
    for (n, viseme) in phonemes.iter().enumerate() {
        let slot = if n == 0 {
            per_phoneme
        } else {
            (per_phoneme as f32 * 0.7).ceil() as usize
        };
        for step in 0..slot {
            if frames.len() >= total {
                break;
            }
            let index = frames.len();
            frames.push(VisemeFrame {
                index,
                viseme: *viseme,
                shape: viseme.shape(),
                intensity: ((step + 1) as f32 / slot as f32).min(1.0),
                offset_ms: index as u32 * FRAME_MS,
            });
        }
    }

    while frames.len() < total {
        let index = frames.len();
        frames.push(VisemeFrame {
            index,
            viseme: Viseme::Neutral,
            shape: Viseme::Neutral.shape(),
            intensity: 0.5,
            offset_ms: index as u32 * FRAME_MS,
        });
    }
    frames
}

pub fn blend_visemes(from: Viseme, to: Viseme, factor: f32) -> MouthShape {
    let factor = factor.clamp(0.0, 1.0);
    let a = from.shape();
    let b = to.shape();
    MouthShape {
        scale_x: a.scale_x + (b.scale_x - a.scale_x) * factor,
        scale_y: a.scale_y + (b.scale_y - a.scale_y) * factor,
    }
}

/// Problems found in a frame sequence, empty when valid
pub fn validate_frames(frames: &[VisemeFrame]) -> Vec<String> {
    if frames.is_empty() {
        return vec!["No frames provided".to_string()];
    }
    frames
        .iter()
        .enumerate()
        .filter(|(_, frame)| !(0.0..=1.0).contains(&frame.intensity))
        .map(|(i, _)| format!("Frame {}: invalid intensity", i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count_matches_duration() {
        let frames = generate_frames("hello", 500);
        assert_eq!(frames.len(), 20);
        assert_eq!(frames[0].viseme, Viseme::Neutral);
        assert_eq!(frames[4].viseme, Viseme::Open);
        assert_eq!(frames.last().unwrap().offset_ms, 19 * FRAME_MS);
        assert!(validate_frames(&frames).is_empty());
    }

    #[test]
    fn test_first_phoneme_ramps_over_full_slot() {
        let frames = generate_frames("ma", 200);
        // 8 frames, 4 per phoneme; the second ramps over ceil(2.8) = 3
        assert_eq!(frames.iter().filter(|f| f.viseme == Viseme::Closed).count(), 4);
        assert_eq!(frames.iter().filter(|f| f.viseme == Viseme::Open).count(), 3);
        assert_eq!(frames[3].intensity, 1.0);
        assert_eq!(frames[7].viseme, Viseme::Neutral);
    }

    #[test]
    fn test_empty_text_is_all_neutral() {
        let frames = generate_frames("123", 100);
        assert_eq!(frames.len(), 4);
        assert!(frames.iter().all(|f| f.viseme == Viseme::Neutral));
        assert!(generate_frames("abc", 0).is_empty());
    }

    #[test]
    fn test_oversized_duration_is_capped() {
        let frames = generate_frames("hello", u32::MAX);
        assert_eq!(frames.len(), (MAX_UTTERANCE_MS / FRAME_MS) as usize);
        assert_eq!(frames.last().unwrap().offset_ms, MAX_UTTERANCE_MS - FRAME_MS);
    }

    #[test]
    fn test_blend_and_validate() {
        let mid = blend_visemes(Viseme::Closed, Viseme::Open, 0.5);
        assert!((mid.scale_y - 0.55).abs() < 1e-6);

        let mut frames = generate_frames("a", 50);
        frames[0].intensity = 1.5;
        assert_eq!(validate_frames(&frames).len(), 1);
        assert_eq!(validate_frames(&[]), vec!["No frames provided".to_string()]);
    }
}
