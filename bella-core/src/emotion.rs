//! Keyword emotion classification with a smoothing ring

use crate::config::ClassifierConfig;
use crate::observer::{ObserverList, SubscriptionId};
use crate::types::Emotion;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

const HAPPY_WORDS: &[&str] = &[
    "happy", "joy", "joyful", "cheerful", "great", "wonderful", "amazing", "fantastic",
    "excellent", "love", "blessed", "grateful", "proud", "excited", "thrilled", "delighted",
    "pleased", "satisfied",
];

const SAD_WORDS: &[&str] = &[
    "sad", "unhappy", "depressed", "disappointed", "sorrowful", "grief", "sorry", "regret",
    "miss", "lonely", "heartbroken", "devastated", "miserable", "awful", "terrible", "worse",
    "lost", "troubled",
];

const ANGRY_WORDS: &[&str] = &[
    "angry", "furious", "rage", "mad", "irritated", "frustrated", "annoyed", "enraged", "livid",
    "upset", "aggravated", "bitter", "resentful", "disgusted", "hateful", "hostile",
];

const SURPRISED_WORDS: &[&str] = &[
    "surprised", "shocked", "amazed", "astonished", "stunned", "wow", "unexpected",
    "unbelievable", "incredible", "surprising", "startled", "astounded",
];

const CONFUSED_WORDS: &[&str] = &[
    "confused", "bewildered", "perplexed", "puzzled", "uncertain", "unsure", "unclear", "lost",
    "questioning", "disoriented", "foggy", "hazy", "ambiguous",
];

const AFRAID_WORDS: &[&str] = &[
    "afraid", "scared", "terrified", "frightened", "fear", "anxious", "nervous", "worried",
    "panic", "dread", "uneasy", "apprehensive", "intimidated", "startled",
];

const CALM_WORDS: &[&str] = &[
    "calm", "peaceful", "serene", "tranquil", "relaxed", "cool", "composed", "patient",
    "understanding", "thoughtful", "mindful",
];

const NEGATIONS: &[&str] = &[
    "not", "no", "never", "nor", "neither", "none", "nothing", "nowhere", "isn't", "doesn't",
    "didn't", "won't", "can't",
];

fn keywords(emotion: Emotion) -> &'static [&'static str] {
    match emotion {
        Emotion::Happy => HAPPY_WORDS,
        Emotion::Sad => SAD_WORDS,
        Emotion::Angry => ANGRY_WORDS,
        Emotion::Surprised => SURPRISED_WORDS,
        Emotion::Confused => CONFUSED_WORDS,
        Emotion::Afraid => AFRAID_WORDS,
        Emotion::Calm => CALM_WORDS,
        Emotion::Neutral => &[],
    }
}

fn intensifier(word: &str) -> Option<f32> {
    match word {
        "very" | "so" => Some(1.2),
        "extremely" | "incredibly" => Some(1.4),
        "absolutely" => Some(1.5),
        "really" | "quite" | "rather" => Some(1.1),
        "somewhat" => Some(0.8),
        "slightly" => Some(0.7),
        _ => None,
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|raw| {
            raw.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .to_lowercase()
        })
        .filter(|word| !word.is_empty())
        .collect()
}

fn category_score(words: &[String], keywords: &[&str]) -> f32 {
    let mut score = 0.0;
    let mut negated = false;
    let mut multiplier = 1.0;

    for word in words {
        if let Some(m) = intensifier(word) {
            multiplier = m;
            continue;
        }
        if NEGATIONS.contains(&word.as_str()) {
            negated = true;
            multiplier = 1.0;
            continue;
        }
        if keywords.contains(&word.as_str()) {
            let mut hit = multiplier;
            if negated {
                hit *= -0.5;
                negated = false;
            }
            score += hit;
            multiplier = 1.0;
        }
    }

    score.max(0.0)
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// One classification outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionResult {
    pub emotion: Emotion,
    pub confidence: f32,
    pub intensity: f32,
    pub timestamp: DateTime<Utc>,
}

impl EmotionResult {
    pub fn new(emotion: Emotion, confidence: f32, intensity: f32) -> Self {
        Self {
            emotion,
            confidence: clamp_unit(confidence),
            intensity: clamp_unit(intensity),
            timestamp: Utc::now(),
        }
    }

    pub fn neutral() -> Self {
        Self::new(Emotion::Neutral, 0.5, 0.0)
    }

    /// Human-readable label such as "Very Happy"
    pub fn label(&self) -> String {
        let prefix = if self.intensity < 0.3 {
            "Slightly"
        } else if self.intensity < 0.6 {
            "Moderately"
        } else if self.intensity < 0.85 {
            "Very"
        } else {
            "Extremely"
        };
        let name = self.emotion.as_str();
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{} {}", prefix, capitalized)
    }
}

/// Fired when the smoothed emotion changes
#[derive(Debug, Clone, PartialEq)]
pub struct EmotionChange {
    pub previous: Emotion,
    pub current: Emotion,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

/// Aggregate view over a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionTrend {
    pub dominant: Emotion,
    pub distribution: BTreeMap<Emotion, usize>,
    pub average_intensity: f32,
    pub sequence: Vec<Emotion>,
    pub direction: TrendDirection,
}

struct SmoothingState {
    ring: VecDeque<EmotionResult>,
    last_smoothed: Emotion,
}

/// Keyword-based classifier.
///
/// `classify` is pure. `detect` additionally feeds the smoothing ring and
/// notifies change observers when the smoothed emotion moves.
pub struct EmotionClassifier {
    window: usize,
    state: Mutex<SmoothingState>,
    observers: ObserverList<EmotionChange>,
}

impl EmotionClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let window = config.smoothing_window.max(1);
        Self {
            window,
            state: Mutex::new(SmoothingState {
                ring: VecDeque::with_capacity(window),
                last_smoothed: Emotion::Neutral,
            }),
            observers: ObserverList::new("emotion"),
        }
    }

    /// Raw per-category scores after intensifiers and negation
    pub fn scores(&self, text: &str) -> BTreeMap<Emotion, f32> {
        let words = tokenize(text);
        Emotion::ALL
            .iter()
            .filter(|e| **e != Emotion::Neutral)
            .map(|e| (*e, category_score(&words, keywords(*e))))
            .collect()
    }

    /// Classify a single utterance. Empty or absent text yields neutral at 0.5.
    pub fn classify<'a>(&self, text: impl Into<Option<&'a str>>) -> EmotionResult {
        let text = match text.into() {
            Some(t) if !t.trim().is_empty() => t,
            _ => return EmotionResult::neutral(),
        };

        let words = tokenize(text);
        let mut dominant = Emotion::Neutral;
        let mut best = 0.0_f32;
        let mut total = 0.0_f32;
        for emotion in Emotion::ALL {
            if emotion == Emotion::Neutral {
                continue;
            }
            let score = category_score(&words, keywords(emotion));
            total += score;
            if score > best {
                best = score;
                dominant = emotion;
            }
        }

        if dominant == Emotion::Neutral {
            return EmotionResult::new(Emotion::Neutral, 0.5, Self::intensity(text, &words, dominant));
        }

        let confidence = (best / total.max(1.0)).min(1.0);
        EmotionResult::new(dominant, confidence, Self::intensity(text, &words, dominant))
    }

    fn intensity(raw: &str, words: &[String], emotion: Emotion) -> f32 {
        let list = keywords(emotion);
        let hits = words.iter().filter(|w| list.contains(&w.as_str())).count() as f32;
        let exclamations = raw.matches('!').count() as f32;
        let questions = raw.matches('?').count() as f32;
        let alphabetic = raw.chars().filter(|c| c.is_alphabetic()).count();
        let uppercase = raw.chars().filter(|c| c.is_uppercase()).count();
        let caps_ratio = if alphabetic == 0 {
            0.0
        } else {
            uppercase as f32 / alphabetic as f32
        };

        clamp_unit(hits * 0.3 + exclamations * 0.2 + questions * 0.1 + caps_ratio * 0.2 + 0.2)
    }

    /// Classify, push into the smoothing ring and notify on smoothed change
    pub fn detect<'a>(&self, text: impl Into<Option<&'a str>>) -> EmotionResult {
        let result = self.classify(text);

        let change = {
            let mut state = self.state.lock();
            state.ring.push_back(result.clone());
            while state.ring.len() > self.window {
                state.ring.pop_front();
            }
            let smoothed = Self::smooth(&state.ring);
            if smoothed.emotion != state.last_smoothed {
                let previous = state.last_smoothed;
                state.last_smoothed = smoothed.emotion;
                Some(EmotionChange {
                    previous,
                    current: smoothed.emotion,
                    confidence: smoothed.confidence,
                })
            } else {
                None
            }
        };

        if let Some(change) = change {
            debug!(from = %change.previous, to = %change.current, "Smoothed emotion changed");
            self.observers.notify(&change);
        }
        result
    }

    /// Emotion with the highest accumulated confidence across the ring
    pub fn smoothed(&self) -> EmotionResult {
        Self::smooth(&self.state.lock().ring)
    }

    fn smooth(ring: &VecDeque<EmotionResult>) -> EmotionResult {
        if ring.is_empty() {
            return EmotionResult::neutral();
        }

        let mut totals: BTreeMap<Emotion, f32> = BTreeMap::new();
        for entry in ring {
            *totals.entry(entry.emotion).or_insert(0.0) += entry.confidence;
        }

        let mut winner = Emotion::Neutral;
        let mut best = f32::MIN;
        for emotion in Emotion::ALL {
            if let Some(sum) = totals.get(&emotion) {
                if *sum > best {
                    best = *sum;
                    winner = emotion;
                }
            }
        }

        let matching: Vec<f32> = ring
            .iter()
            .filter(|e| e.emotion == winner)
            .map(|e| e.intensity)
            .collect();
        let intensity = matching.iter().sum::<f32>() / matching.len().max(1) as f32;

        EmotionResult::new(winner, best / ring.len() as f32, intensity)
    }

    pub fn history_len(&self) -> usize {
        self.state.lock().ring.len()
    }

    pub fn clear_history(&self) {
        let mut state = self.state.lock();
        state.ring.clear();
        state.last_smoothed = Emotion::Neutral;
    }

    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&EmotionChange) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    /// Summarize a sequence of utterances
    pub fn analyze_trend<S: AsRef<str>>(&self, texts: &[S]) -> EmotionTrend {
        let results: Vec<EmotionResult> = texts.iter().map(|t| self.classify(t.as_ref())).collect();
        let sequence: Vec<Emotion> = results.iter().map(|r| r.emotion).collect();

        let mut distribution = BTreeMap::new();
        for emotion in &sequence {
            *distribution.entry(*emotion).or_insert(0usize) += 1;
        }

        let mut dominant = Emotion::Neutral;
        let mut best = 0;
        for emotion in Emotion::ALL {
            let count = distribution.get(&emotion).copied().unwrap_or(0);
            if count > best {
                best = count;
                dominant = emotion;
            }
        }

        let average_intensity = if results.is_empty() {
            0.0
        } else {
            results.iter().map(|r| r.intensity).sum::<f32>() / results.len() as f32
        };

        let half = sequence.len() / 2;
        let positives = |slice: &[Emotion]| slice.iter().filter(|e| e.is_positive()).count();
        let early = positives(&sequence[..half]);
        let late = positives(&sequence[half..]);
        let direction = if late > early {
            TrendDirection::Improving
        } else if late < early {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        };

        EmotionTrend {
            dominant,
            distribution,
            average_intensity,
            sequence,
            direction,
        }
    }
}

impl Default for EmotionClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}
