//! Configuration for the avatar runtime

use crate::error::AvatarError;
use bella_core::{
    AdaptiveConfig, ClassifierConfig, Emotion, GestureConfig, HubConfig, SamplerConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Animation playback engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Cross-fade duration in milliseconds (default 300)
    pub crossfade_ms: u64,

    /// Opacity steps per cross-fade
    pub fade_steps: u32,

    /// Upper bound on a single asset load (default 10 s)
    pub load_timeout_ms: u64,

    /// Pending command capacity of the engine task
    pub command_buffer: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: 300,
            fade_steps: 10,
            load_timeout_ms: 10_000,
            command_buffer: 64,
        }
    }
}

impl PlaybackConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.crossfade_ms > 10_000 {
            return Err("Cross-fade duration too long (max 10000 ms)".to_string());
        }
        if self.fade_steps == 0 || self.fade_steps > 1000 {
            return Err("Fade steps must be between 1 and 1000".to_string());
        }
        if self.load_timeout_ms == 0 {
            return Err("Load timeout must be greater than 0".to_string());
        }
        if self.command_buffer == 0 {
            return Err("Command buffer must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn crossfade(&self) -> Duration {
        Duration::from_millis(self.crossfade_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

/// Avatar runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvatarConfig {
    /// Classify LLM responses and drive emotion animations
    pub enable_emotion_detection: bool,

    /// Overlay gestures while speaking
    pub enable_gestures: bool,

    /// Produce viseme frames for spoken responses
    pub enable_lip_sync: bool,

    /// Clip played while the user is speaking
    pub listening_animation: String,

    /// Clip played while the response is being generated
    pub processing_animation: String,

    /// Clip returned to after a response completes
    pub idle_animation: String,

    /// Per-emotion clip overrides
    pub emotion_animations: BTreeMap<Emotion, String>,

    /// Live audio analysis period in milliseconds (default 500)
    pub audio_tick_ms: u64,

    /// Capacity of the avatar event broadcast channel
    pub event_buffer: usize,

    pub classifier: ClassifierConfig,
    pub gestures: GestureConfig,
    pub playback: PlaybackConfig,
    pub sampler: SamplerConfig,
    pub hub: HubConfig,
    pub adaptive: AdaptiveConfig,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            enable_emotion_detection: true,
            enable_gestures: true,
            enable_lip_sync: true,
            listening_animation: "thinking".to_string(),
            processing_animation: "thinking".to_string(),
            idle_animation: "idle".to_string(),
            emotion_animations: BTreeMap::new(),
            audio_tick_ms: 500,
            event_buffer: 1000,
            classifier: ClassifierConfig::default(),
            gestures: GestureConfig::default(),
            playback: PlaybackConfig::default(),
            sampler: SamplerConfig::default(),
            hub: HubConfig::default(),
            adaptive: AdaptiveConfig::default(),
        }
    }
}

impl AvatarConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        for (label, name) in [
            ("Listening", &self.listening_animation),
            ("Processing", &self.processing_animation),
            ("Idle", &self.idle_animation),
        ] {
            if name.trim().is_empty() {
                return Err(format!("{} animation cannot be empty", label));
            }
        }

        if self.emotion_animations.values().any(|name| name.trim().is_empty()) {
            return Err("Emotion animation overrides cannot be empty".to_string());
        }

        if self.audio_tick_ms == 0 {
            return Err("Audio tick must be greater than 0".to_string());
        }

        if self.event_buffer == 0 || self.event_buffer > 100_000 {
            return Err("Event buffer must be between 1 and 100000".to_string());
        }

        self.classifier.validate()?;
        self.gestures.validate()?;
        self.playback.validate()?;
        self.sampler.validate()?;
        self.hub.validate()?;
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, AvatarError> {
        let config: AvatarConfig = toml::from_str(source)?;
        config.validate().map_err(AvatarError::Config)?;
        Ok(config)
    }

    pub fn audio_tick(&self) -> Duration {
        Duration::from_millis(self.audio_tick_ms)
    }
}
