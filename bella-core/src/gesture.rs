//! Gesture selection, phasing and compatibility rules

use crate::config::GestureConfig;
use crate::error::{Error, Result};
use crate::types::Emotion;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BodyPart {
    Head,
    Torso,
    BothArms,
    LeftArm,
    RightArm,
    LeftHand,
    RightHand,
    BothHands,
    Hands,
    Shoulders,
    Arms,
    Hand,
    Chin,
    Face,
}

impl BodyPart {
    /// Parts that may not be driven by two gestures at once
    pub fn is_critical(&self) -> bool {
        matches!(self, BodyPart::Head | BodyPart::Torso | BodyPart::BothArms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Easing {
    EaseIn,
    EaseInOut,
    EaseOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseKind {
    Intro,
    Main,
    Outro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GesturePhase {
    pub kind: PhaseKind,
    /// Seconds
    pub duration: f32,
    pub easing: Easing,
    pub intensity: f32,
}

/// Discourse category of an utterance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscourseType {
    Question,
    Emphasis,
    Confirmation,
    Denial,
    Greeting,
    Neutral,
}

impl DiscourseType {
    /// Punctuation first, then whole-word cues
    pub fn classify(text: &str) -> Self {
        if text.contains('?') {
            return DiscourseType::Question;
        }
        if text.contains('!') {
            return DiscourseType::Emphasis;
        }

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();
        let has_any = |cues: &[&str]| words.iter().any(|w| cues.contains(&w.as_str()));

        if has_any(&["yes", "definitely", "agree"]) {
            DiscourseType::Confirmation
        } else if has_any(&["no", "not", "disagree"]) {
            DiscourseType::Denial
        } else if has_any(&["hello", "hi", "welcome"]) {
            DiscourseType::Greeting
        } else {
            DiscourseType::Neutral
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SpeechContext {
    pub text: String,
    pub is_speaking: bool,
}

/// Fully phased gesture, read-only once returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureDescriptor {
    pub name: String,
    pub duration: f32,
    pub intensity: f32,
    pub body_parts: BTreeSet<BodyPart>,
    pub phases: Vec<GesturePhase>,
    pub context: Option<DiscourseType>,
}

impl GestureDescriptor {
    fn build(name: String, duration: f32, intensity: f32, body_parts: BTreeSet<BodyPart>) -> Self {
        let intensity = intensity.clamp(0.0, 1.0);
        let phases = vec![
            GesturePhase {
                kind: PhaseKind::Intro,
                duration: duration * 0.2,
                easing: Easing::EaseIn,
                intensity: intensity * 0.3,
            },
            GesturePhase {
                kind: PhaseKind::Main,
                duration: duration * 0.6,
                easing: Easing::EaseInOut,
                intensity,
            },
            GesturePhase {
                kind: PhaseKind::Outro,
                duration: duration * 0.2,
                easing: Easing::EaseOut,
                intensity: intensity * 0.3,
            },
        ];
        Self {
            name,
            duration,
            intensity,
            body_parts,
            phases,
            context: None,
        }
    }

    /// Same gesture with a new intensity, phases rescaled
    pub fn with_intensity(&self, intensity: f32) -> Self {
        let mut scaled = Self::build(self.name.clone(), self.duration, intensity, self.body_parts.clone());
        scaled.context = self.context;
        scaled
    }
}

/// Idle movement with its start delay in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct IdleMovement {
    pub gesture: GestureDescriptor,
    pub delay: f32,
}

struct LibraryEntry {
    name: &'static str,
    duration: f32,
    intensity: f32,
    parts: &'static [BodyPart],
    description: &'static str,
}

const LIBRARY: &[LibraryEntry] = &[
    LibraryEntry {
        name: "wave",
        duration: 1.5,
        intensity: 0.6,
        parts: &[BodyPart::LeftArm, BodyPart::LeftHand],
        description: "Friendly wave with hand",
    },
    LibraryEntry {
        name: "point",
        duration: 0.8,
        intensity: 0.7,
        parts: &[BodyPart::RightArm, BodyPart::RightHand],
        description: "Pointing gesture",
    },
    LibraryEntry {
        name: "thumbsUp",
        duration: 1.0,
        intensity: 0.5,
        parts: &[BodyPart::RightArm, BodyPart::RightHand],
        description: "Thumbs up approval",
    },
    LibraryEntry {
        name: "handsClapTogether",
        duration: 0.6,
        intensity: 0.8,
        parts: &[BodyPart::LeftArm, BodyPart::RightArm, BodyPart::Hands],
        description: "Clapping hands",
    },
    LibraryEntry {
        name: "shrug",
        duration: 0.8,
        intensity: 0.6,
        parts: &[BodyPart::Shoulders, BodyPart::Arms],
        description: "Shoulder shrug",
    },
    LibraryEntry {
        name: "nod",
        duration: 0.6,
        intensity: 0.5,
        parts: &[BodyPart::Head],
        description: "Head nodding",
    },
    LibraryEntry {
        name: "headShake",
        duration: 0.8,
        intensity: 0.6,
        parts: &[BodyPart::Head],
        description: "Head shaking (no)",
    },
    LibraryEntry {
        name: "thinking",
        duration: 1.5,
        intensity: 0.4,
        parts: &[BodyPart::Hand, BodyPart::Chin],
        description: "Thoughtful pose",
    },
    LibraryEntry {
        name: "handToFace",
        duration: 1.0,
        intensity: 0.5,
        parts: &[BodyPart::RightHand, BodyPart::Face],
        description: "Hand to face",
    },
    LibraryEntry {
        name: "openPalms",
        duration: 0.8,
        intensity: 0.7,
        parts: &[BodyPart::BothArms, BodyPart::BothHands],
        description: "Open palms gesture",
    },
];

fn lookup(name: &str) -> Option<&'static LibraryEntry> {
    LIBRARY.iter().find(|entry| entry.name == name)
}

fn emotion_candidates(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => &["wave", "thumbsUp", "handsClapTogether"],
        Emotion::Sad => &["headShake", "thinking"],
        Emotion::Angry => &["point", "openPalms"],
        Emotion::Surprised => &["openPalms", "handToFace"],
        Emotion::Afraid => &["shrug", "thinking"],
        Emotion::Confused => &["thinking", "shrug"],
        Emotion::Calm | Emotion::Neutral => &["nod"],
    }
}

fn discourse_candidates(kind: DiscourseType) -> &'static [&'static str] {
    match kind {
        DiscourseType::Emphasis => &["point", "openPalms"],
        DiscourseType::Question => &["nod", "thinking"],
        DiscourseType::Confirmation => &["thumbsUp", "nod"],
        DiscourseType::Denial => &["headShake", "shrug"],
        DiscourseType::Greeting => &["wave"],
        DiscourseType::Neutral => &["nod"],
    }
}

const IDLE_GESTURES: &[&str] = &["nod", "thinking", "shrug"];

struct GeneratorState<R> {
    rng: R,
    queue: VecDeque<GestureDescriptor>,
}

/// Chooses gestures from emotion or speech context.
///
/// Selection is random by design; pass a seed in `GestureConfig` or an RNG
/// via `with_rng` for reproducible output.
pub struct GestureGenerator<R = StdRng> {
    jitter: f32,
    state: Mutex<GeneratorState<R>>,
}

impl GestureGenerator<StdRng> {
    pub fn new(config: GestureConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl Default for GestureGenerator<StdRng> {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl<R: Rng> GestureGenerator<R> {
    pub fn with_rng(config: GestureConfig, rng: R) -> Self {
        Self {
            jitter: config.intensity_jitter.clamp(0.0, 1.0),
            state: Mutex::new(GeneratorState {
                rng,
                queue: VecDeque::new(),
            }),
        }
    }

    /// Names of every gesture in the library
    pub fn names(&self) -> impl Iterator<Item = &'static str> {
        LIBRARY.iter().map(|entry| entry.name)
    }

    /// Validated lookup at the gesture's base intensity
    pub fn gesture(&self, name: &str) -> Result<GestureDescriptor> {
        match lookup(name) {
            Some(entry) => Ok(Self::describe(entry, entry.intensity)),
            None => {
                warn!(gesture = name, "Unknown gesture requested");
                Err(Error::UnknownGesture(name.to_string()))
            }
        }
    }

    pub fn description(&self, name: &str) -> Result<&'static str> {
        lookup(name)
            .map(|entry| entry.description)
            .ok_or_else(|| Error::UnknownGesture(name.to_string()))
    }

    fn describe(entry: &LibraryEntry, intensity: f32) -> GestureDescriptor {
        GestureDescriptor::build(
            entry.name.to_string(),
            entry.duration,
            intensity,
            entry.parts.iter().copied().collect(),
        )
    }

    fn pick(&self, candidates: &'static [&'static str]) -> Option<&'static LibraryEntry> {
        let mut state = self.state.lock();
        candidates.choose(&mut state.rng).and_then(|name| lookup(name))
    }

    /// Random candidate for the emotion with jittered intensity
    pub fn generate(&self, emotion: Emotion, intensity: f32) -> Option<GestureDescriptor> {
        let entry = self.pick(emotion_candidates(emotion))?;
        let boost: f32 = self.state.lock().rng.gen::<f32>() * self.jitter;
        let base = if intensity.is_finite() { intensity.max(0.0) } else { 0.0 };
        Some(Self::describe(entry, (base * (1.0 + boost)).min(1.0)))
    }

    /// Gesture matching the discourse type of an utterance, none when silent
    pub fn generate_from_speech(&self, context: &SpeechContext) -> Option<GestureDescriptor> {
        if !context.is_speaking {
            return None;
        }
        let kind = DiscourseType::classify(&context.text);
        let entry = self.pick(discourse_candidates(kind))?;
        let mut descriptor = Self::describe(entry, entry.intensity);
        descriptor.context = Some(kind);
        Some(descriptor)
    }

    /// Two gestures conflict only when they share a critical body part
    pub fn is_compatible(&self, a: &GestureDescriptor, b: &GestureDescriptor) -> bool {
        !a.body_parts
            .intersection(&b.body_parts)
            .any(|part| part.is_critical())
    }

    /// Weighted blend; `factor` weights the first gesture
    pub fn blend(&self, a: &GestureDescriptor, b: &GestureDescriptor, factor: f32) -> GestureDescriptor {
        let factor = factor.clamp(0.0, 1.0);
        GestureDescriptor::build(
            format!("{}-{}-blend", a.name, b.name),
            (a.duration + b.duration) / 2.0,
            a.intensity * factor + b.intensity * (1.0 - factor),
            a.body_parts.union(&b.body_parts).copied().collect(),
        )
    }

    pub fn scale_intensity(&self, gesture: &GestureDescriptor, factor: f32) -> GestureDescriptor {
        gesture.with_intensity((gesture.intensity * factor.max(0.0)).min(1.0))
    }

    pub fn enqueue(&self, gesture: GestureDescriptor) {
        self.state.lock().queue.push_back(gesture);
    }

    pub fn next_queued(&self) -> Option<GestureDescriptor> {
        self.state.lock().queue.pop_front()
    }

    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn clear_queue(&self) {
        self.state.lock().queue.clear();
    }

    /// Low-intensity idle movements covering `duration` seconds
    pub fn idle_sequence(&self, duration: f32) -> Vec<IdleMovement> {
        let mut movements = Vec::new();
        if !duration.is_finite() || duration <= 0.0 {
            return movements;
        }

        let mut state = self.state.lock();
        let mut covered = 0.0;
        while covered < duration {
            let Some(entry) = IDLE_GESTURES.choose(&mut state.rng).and_then(|name| lookup(name)) else {
                break;
            };
            let delay = state.rng.gen::<f32>() * 0.5;
            let intensity = 0.3 + state.rng.gen::<f32>() * 0.3;
            covered += delay + entry.duration;
            movements.push(IdleMovement {
                gesture: Self::describe(entry, intensity),
                delay,
            });
        }
        movements
    }
}
