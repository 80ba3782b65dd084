//! Frame performance sampling, threshold checks and profile derivation

use crate::config::{PerformanceThresholds, SamplerConfig};
use crate::error::{Error, Result};
use crate::observer::{ObserverList, SubscriptionId};
use crate::types::PerformanceProfile;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Frame budget at 60 Hz, used to estimate GPU/CPU load
const FRAME_BUDGET_MS: f32 = 16.67;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Fps,
    FrameTime,
    RenderTime,
    UpdateTime,
    GpuLoad,
    CpuLoad,
    MemoryUsage,
    AudioLatency,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSample {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub render_time_ms: f32,
    pub update_time_ms: f32,
    pub gpu_load: f32,
    pub cpu_load: f32,
    pub memory_usage: f32,
    pub audio_latency_ms: f32,
    pub timestamp: DateTime<Utc>,
}

impl Default for PerformanceSample {
    fn default() -> Self {
        Self {
            fps: 60.0,
            frame_time_ms: FRAME_BUDGET_MS,
            render_time_ms: 0.0,
            update_time_ms: 0.0,
            gpu_load: 0.0,
            cpu_load: 0.0,
            memory_usage: 0.0,
            audio_latency_ms: 0.0,
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    LowFps,
    HighFrameTime,
    HighGpuLoad,
    HighCpuLoad,
    HighMemoryUsage,
    HighAudioLatency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceIssue {
    pub kind: IssueKind,
    pub value: f32,
    pub threshold: f32,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PerformanceEvent {
    /// Threshold violations found at an aggregation boundary
    Issues(Vec<PerformanceIssue>),
    ProfileChanged {
        previous: PerformanceProfile,
        current: PerformanceProfile,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricSummary {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window_secs: u64,
    pub fps: MetricSummary,
    pub frame_time_ms: MetricSummary,
    pub gpu_load: MetricSummary,
    pub cpu_load: MetricSummary,
    pub memory_usage: MetricSummary,
    pub audio_latency_ms: MetricSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub score: f32,
    pub profile: PerformanceProfile,
    pub current: PerformanceSample,
    pub windows: Vec<WindowReport>,
}

struct SamplerState {
    current: PerformanceSample,
    thresholds: PerformanceThresholds,
    history: HashMap<Metric, VecDeque<(Instant, f32)>>,
    frame_count: u32,
    window_start: Option<Instant>,
    last_frame: Option<Instant>,
    now: Instant,
    profile: PerformanceProfile,
}

impl SamplerState {
    fn new(thresholds: PerformanceThresholds) -> Self {
        Self {
            current: PerformanceSample::default(),
            thresholds,
            history: HashMap::new(),
            frame_count: 0,
            window_start: None,
            last_frame: None,
            now: Instant::now(),
            profile: PerformanceProfile::High,
        }
    }

    fn record(&mut self, metric: Metric, value: f32, cap: usize) {
        let at = self.now;
        let series = self.history.entry(metric).or_default();
        series.push_back((at, value));
        while series.len() > cap {
            series.pop_front();
        }
    }

    fn window(&self, metric: Metric, window: Duration) -> Vec<f32> {
        let Some(series) = self.history.get(&metric) else {
            return Vec::new();
        };
        let cutoff = self.now.checked_sub(window);
        series
            .iter()
            .filter(|(at, _)| cutoff.map_or(true, |c| *at >= c))
            .map(|(_, value)| *value)
            .collect()
    }

    fn score(&self) -> f32 {
        let c = &self.current;
        let fps_part = (c.fps / 60.0 * 25.0).clamp(0.0, 25.0);
        let gpu_part = ((1.0 - c.gpu_load) * 25.0).max(0.0);
        let cpu_part = ((1.0 - c.cpu_load) * 25.0).max(0.0);
        let memory_part = ((1.0 - c.memory_usage) * 25.0).max(0.0);
        let score = 100.0 - (25.0 - fps_part) - (25.0 - gpu_part) - (25.0 - cpu_part) - (25.0 - memory_part);
        score.clamp(0.0, 100.0)
    }

    fn check_thresholds(&self) -> Vec<PerformanceIssue> {
        let c = &self.current;
        let t = &self.thresholds;
        let mut issues = Vec::new();
        let mut push = |kind, value, threshold, severity| {
            issues.push(PerformanceIssue {
                kind,
                value,
                threshold,
                severity,
            })
        };

        if c.fps < t.min_fps {
            push(IssueKind::LowFps, c.fps, t.min_fps, Severity::High);
        }
        if c.frame_time_ms > t.max_frame_time_ms {
            push(IssueKind::HighFrameTime, c.frame_time_ms, t.max_frame_time_ms, Severity::High);
        }
        if c.gpu_load > t.max_gpu_load {
            push(IssueKind::HighGpuLoad, c.gpu_load, t.max_gpu_load, Severity::Medium);
        }
        if c.cpu_load > t.max_cpu_load {
            push(IssueKind::HighCpuLoad, c.cpu_load, t.max_cpu_load, Severity::Medium);
        }
        if c.memory_usage > t.max_memory_usage {
            push(IssueKind::HighMemoryUsage, c.memory_usage, t.max_memory_usage, Severity::Warning);
        }
        if c.audio_latency_ms > t.max_audio_latency_ms {
            push(IssueKind::HighAudioLatency, c.audio_latency_ms, t.max_audio_latency_ms, Severity::Medium);
        }
        issues
    }

    fn derive_profile(&self) -> PerformanceProfile {
        let fps = self.current.fps;
        if fps < 30.0 {
            PerformanceProfile::Low
        } else if fps < 50.0 {
            PerformanceProfile::Medium
        } else if fps >= 55.0 && self.score() >= 90.0 {
            PerformanceProfile::Ultra
        } else {
            PerformanceProfile::High
        }
    }
}

fn summarize(values: &[f32]) -> MetricSummary {
    if values.is_empty() {
        return MetricSummary::default();
    }
    let sum: f32 = values.iter().sum();
    MetricSummary {
        avg: sum / values.len() as f32,
        min: values.iter().copied().fold(f32::INFINITY, f32::min),
        max: values.iter().copied().fold(f32::NEG_INFINITY, f32::max),
    }
}

/// Samples frame timing once per render tick.
///
/// The caller drives `tick` from its per-frame callback and passes the frame
/// instant, which keeps the sampler deterministic under test.
pub struct PerformanceSampler {
    max_history: usize,
    interval: Duration,
    state: Mutex<SamplerState>,
    sample_observers: ObserverList<PerformanceSample>,
    event_observers: ObserverList<PerformanceEvent>,
}

impl PerformanceSampler {
    pub fn new(config: SamplerConfig) -> Self {
        info!(
            max_history = config.max_history,
            interval_ms = config.aggregation_interval_ms,
            "Performance sampler created"
        );
        Self {
            max_history: config.max_history.max(1),
            interval: Duration::from_millis(config.aggregation_interval_ms.max(1)),
            state: Mutex::new(SamplerState::new(config.thresholds)),
            sample_observers: ObserverList::new("performance-sample"),
            event_observers: ObserverList::new("performance-event"),
        }
    }

    /// Record one rendered frame; returns the events raised by this tick
    pub fn tick(&self, now: Instant) -> Vec<PerformanceEvent> {
        let mut events = Vec::new();
        let sample = {
            let mut state = self.state.lock();
            state.now = now;

            match state.last_frame {
                Some(last) => {
                    let frame_time = now.saturating_duration_since(last).as_secs_f32() * 1000.0;
                    state.current.frame_time_ms = frame_time;
                    state.record(Metric::FrameTime, frame_time, self.max_history);
                    state.frame_count += 1;
                }
                None => state.window_start = Some(now),
            }
            state.last_frame = Some(now);

            let gpu = (state.current.render_time_ms / FRAME_BUDGET_MS).min(1.0);
            let cpu = (state.current.update_time_ms / FRAME_BUDGET_MS).min(1.0);
            state.current.gpu_load = gpu;
            state.current.cpu_load = cpu;
            state.record(Metric::GpuLoad, gpu, self.max_history);
            state.record(Metric::CpuLoad, cpu, self.max_history);

            let window_start = state.window_start.unwrap_or(now);
            let elapsed = now.saturating_duration_since(window_start);
            if elapsed >= self.interval {
                let fps = state.frame_count as f32 / elapsed.as_secs_f32();
                state.current.fps = fps;
                state.record(Metric::Fps, fps, self.max_history);
                state.frame_count = 0;
                state.window_start = Some(now);

                let issues = state.check_thresholds();
                if !issues.is_empty() {
                    warn!(count = issues.len(), fps, "Performance thresholds exceeded");
                    events.push(PerformanceEvent::Issues(issues));
                }

                let profile = state.derive_profile();
                if profile != state.profile {
                    debug!(from = ?state.profile, to = ?profile, "Performance profile changed");
                    events.push(PerformanceEvent::ProfileChanged {
                        previous: state.profile,
                        current: profile,
                    });
                    state.profile = profile;
                }
            }

            state.current.timestamp = Utc::now();
            state.current.clone()
        };

        self.sample_observers.notify(&sample);
        for event in &events {
            self.event_observers.notify(event);
        }
        events
    }

    pub fn record_render_time(&self, ms: f32) {
        let mut state = self.state.lock();
        state.current.render_time_ms = ms.max(0.0);
        state.record(Metric::RenderTime, ms.max(0.0), self.max_history);
    }

    pub fn record_update_time(&self, ms: f32) {
        let mut state = self.state.lock();
        state.current.update_time_ms = ms.max(0.0);
        state.record(Metric::UpdateTime, ms.max(0.0), self.max_history);
    }

    pub fn record_audio_latency(&self, ms: f32) {
        let mut state = self.state.lock();
        state.current.audio_latency_ms = ms.max(0.0);
        state.record(Metric::AudioLatency, ms.max(0.0), self.max_history);
    }

    /// Memory usage as a fraction of the budget
    pub fn record_memory_usage(&self, ratio: f32) {
        let ratio = ratio.clamp(0.0, 1.0);
        let mut state = self.state.lock();
        state.current.memory_usage = ratio;
        state.record(Metric::MemoryUsage, ratio, self.max_history);
    }

    pub fn current(&self) -> PerformanceSample {
        self.state.lock().current.clone()
    }

    pub fn profile(&self) -> PerformanceProfile {
        self.state.lock().profile
    }

    /// Composite score in [0, 100], 25 points each for fps, gpu, cpu and memory
    pub fn score(&self) -> f32 {
        self.state.lock().score()
    }

    pub fn history(&self, metric: Metric) -> Vec<f32> {
        self.state
            .lock()
            .history
            .get(&metric)
            .map(|series| series.iter().map(|(_, v)| *v).collect())
            .unwrap_or_default()
    }

    /// Mean over the trailing window, 0 without samples
    pub fn average(&self, metric: Metric, window: Duration) -> f32 {
        summarize(&self.state.lock().window(metric, window)).avg
    }

    pub fn min(&self, metric: Metric, window: Duration) -> f32 {
        summarize(&self.state.lock().window(metric, window)).min
    }

    pub fn max(&self, metric: Metric, window: Duration) -> f32 {
        summarize(&self.state.lock().window(metric, window)).max
    }

    pub fn report(&self) -> PerformanceReport {
        let state = self.state.lock();
        let windows = [1u64, 5, 30]
            .into_iter()
            .map(|secs| {
                let window = Duration::from_secs(secs);
                WindowReport {
                    window_secs: secs,
                    fps: summarize(&state.window(Metric::Fps, window)),
                    frame_time_ms: summarize(&state.window(Metric::FrameTime, window)),
                    gpu_load: summarize(&state.window(Metric::GpuLoad, window)),
                    cpu_load: summarize(&state.window(Metric::CpuLoad, window)),
                    memory_usage: summarize(&state.window(Metric::MemoryUsage, window)),
                    audio_latency_ms: summarize(&state.window(Metric::AudioLatency, window)),
                }
            })
            .collect();

        PerformanceReport {
            score: state.score(),
            profile: state.profile,
            current: state.current.clone(),
            windows,
        }
    }

    pub fn thresholds(&self) -> PerformanceThresholds {
        self.state.lock().thresholds.clone()
    }

    /// Replace one threshold; metrics without a threshold are rejected
    pub fn set_threshold(&self, metric: Metric, value: f32) -> Result<()> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::InvalidInput(format!("Invalid threshold value {}", value)));
        }
        let mut state = self.state.lock();
        let t = &mut state.thresholds;
        match metric {
            Metric::Fps => t.min_fps = value,
            Metric::FrameTime => t.max_frame_time_ms = value,
            Metric::GpuLoad => t.max_gpu_load = value,
            Metric::CpuLoad => t.max_cpu_load = value,
            Metric::MemoryUsage => t.max_memory_usage = value,
            Metric::AudioLatency => t.max_audio_latency_ms = value,
            Metric::RenderTime | Metric::UpdateTime => {
                return Err(Error::InvalidInput(format!("No threshold for {:?}", metric)));
            }
        }
        Ok(())
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// Back to initial metrics and profile, keeping thresholds and observers
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let thresholds = state.thresholds.clone();
        *state = SamplerState::new(thresholds);
    }

    pub fn on_sample<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PerformanceSample) + Send + Sync + 'static,
    {
        self.sample_observers.subscribe(callback)
    }

    pub fn on_event<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PerformanceEvent) + Send + Sync + 'static,
    {
        self.event_observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.sample_observers.unsubscribe(id) || self.event_observers.unsubscribe(id)
    }
}

impl Default for PerformanceSampler {
    fn default() -> Self {
        Self::new(SamplerConfig::default())
    }
}
