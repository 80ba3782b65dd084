//! Configuration for the behavior components

use crate::types::{NetworkProfile, PerformanceProfile, RenderMode};
use serde::{Deserialize, Serialize};

/// Emotion classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Number of recent results kept for smoothing (default 5)
    pub smoothing_window: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self { smoothing_window: 5 }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.smoothing_window == 0 {
            return Err("Smoothing window must be greater than 0".to_string());
        }
        if self.smoothing_window > 1000 {
            return Err("Smoothing window too large (max 1000)".to_string());
        }
        Ok(())
    }
}

/// Gesture generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Upper bound of the random intensity boost (0.0-1.0, default 0.3)
    pub intensity_jitter: f32,

    /// Fixed RNG seed; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            intensity_jitter: 0.3,
            seed: None,
        }
    }
}

impl GestureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !self.intensity_jitter.is_finite() || !(0.0..=1.0).contains(&self.intensity_jitter) {
            return Err("Intensity jitter must be between 0.0 and 1.0".to_string());
        }
        Ok(())
    }
}

/// Limits checked by the performance sampler once per aggregation interval
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceThresholds {
    pub min_fps: f32,
    pub max_frame_time_ms: f32,
    pub max_gpu_load: f32,
    pub max_cpu_load: f32,
    pub max_memory_usage: f32,
    pub max_audio_latency_ms: f32,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        Self {
            min_fps: 30.0,
            max_frame_time_ms: 33.0,
            max_gpu_load: 0.9,
            max_cpu_load: 0.85,
            max_memory_usage: 0.9,
            max_audio_latency_ms: 50.0,
        }
    }
}

/// Performance sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Samples kept per metric (default 300, about 5 s at 60 Hz)
    pub max_history: usize,

    /// FPS aggregation and threshold check period in milliseconds
    pub aggregation_interval_ms: u64,

    pub thresholds: PerformanceThresholds,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_history: 300,
            aggregation_interval_ms: 1000,
            thresholds: PerformanceThresholds::default(),
        }
    }
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_history == 0 {
            return Err("Sampler history must be greater than 0".to_string());
        }
        if self.aggregation_interval_ms == 0 {
            return Err("Aggregation interval must be greater than 0".to_string());
        }
        let t = &self.thresholds;
        let values = [
            t.min_fps,
            t.max_frame_time_ms,
            t.max_gpu_load,
            t.max_cpu_load,
            t.max_memory_usage,
            t.max_audio_latency_ms,
        ];
        if values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("Performance thresholds must be finite and non-negative".to_string());
        }
        Ok(())
    }
}

/// State hub configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Snapshots kept in history (default 100)
    pub max_history: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self { max_history: 100 }
    }
}

impl HubConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_history == 0 {
            return Err("Hub history must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Adaptive mode controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub initial_performance: PerformanceProfile,
    pub initial_network: NetworkProfile,

    /// Operator override applied at startup
    pub forced_mode: Option<RenderMode>,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            initial_performance: PerformanceProfile::High,
            initial_network: NetworkProfile::Good,
            forced_mode: None,
        }
    }
}
