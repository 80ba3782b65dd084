//! Animation clip registry and emotion-to-animation mapping

use crate::error::{Error, Result};
use crate::types::Emotion;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::warn;

const DEFAULT_CLIPS: &[&str] = &[
    "idle",
    "greeting",
    "thinking",
    "happy",
    "nodding",
    "encouraging",
    "sad",
    "waving",
    "peace",
    "elegant_sway",
];

const CLIP_ROOT: &str = "/bella/videos";

/// Named animation clips resolved to asset paths
#[derive(Debug, Clone)]
pub struct AnimationRegistry {
    clips: HashMap<String, String>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }

    /// Registry preloaded with the stock clip set
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for name in DEFAULT_CLIPS {
            registry
                .clips
                .insert((*name).to_string(), format!("{}/{}.mp4", CLIP_ROOT, name));
        }
        registry
    }

    pub fn register(&mut self, name: impl Into<String>, path: impl Into<String>) -> Result<()> {
        let name = name.into();
        let path = path.into();
        if name.trim().is_empty() {
            return Err(Error::InvalidInput("Animation name must not be empty".to_string()));
        }
        if path.trim().is_empty() {
            return Err(Error::InvalidInput(format!("Animation '{}' has an empty path", name)));
        }
        self.clips.insert(name, path);
        Ok(())
    }

    /// Resolve a clip name, or accept a key that already looks like an asset path
    pub fn resolve(&self, key: &str) -> Result<String> {
        if let Some(path) = self.clips.get(key) {
            return Ok(path.clone());
        }
        if Self::looks_like_path(key) {
            return Ok(key.to_string());
        }
        warn!(key, "Unknown animation key");
        Err(Error::UnknownAnimation(key.to_string()))
    }

    fn looks_like_path(key: &str) -> bool {
        if !key.contains('/') {
            return false;
        }
        let file = key.rsplit('/').next().unwrap_or_default();
        match file.rsplit_once('.') {
            Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
            None => false,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.clips.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.clips.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl Default for AnimationRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Which clip expresses each emotion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmotionAnimationMap {
    overrides: BTreeMap<Emotion, String>,
}

impl EmotionAnimationMap {
    pub fn new(overrides: BTreeMap<Emotion, String>) -> Self {
        Self { overrides }
    }

    pub fn set(&mut self, emotion: Emotion, animation: impl Into<String>) {
        self.overrides.insert(emotion, animation.into());
    }

    pub fn animation_for(&self, emotion: Emotion) -> &str {
        if let Some(name) = self.overrides.get(&emotion) {
            return name;
        }
        match emotion {
            Emotion::Happy | Emotion::Surprised => "happy",
            Emotion::Sad | Emotion::Angry | Emotion::Afraid => "sad",
            Emotion::Confused => "thinking",
            Emotion::Calm | Emotion::Neutral => "idle",
        }
    }
}
