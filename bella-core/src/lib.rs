//! bella-core: behavior building blocks for the Bella avatar
//!
//! Provides:
//! - Keyword emotion classification with a smoothing ring
//! - Emotion and speech driven gesture generation with phased sequencing
//! - Animation clip registry and emotion-to-animation mapping
//! - Facial morph targets, lip-sync visemes and voice feature extraction
//! - Frame performance sampling and adaptive render-mode selection
//! - A state synchronization hub with bounded, time-ordered history
//!
//! Everything here is runtime-free and synchronous; the async playback engine
//! and orchestration live in `bella-me`.

pub mod error;
pub mod types;
pub mod config;
pub mod observer;
pub mod emotion;
pub mod gesture;
pub mod animation;
pub mod expression;
pub mod lipsync;
pub mod audio;
pub mod performance;
pub mod adaptive;
pub mod hub;

pub use error::{Error, Result};
pub use types::{Emotion, NetworkProfile, PerformanceProfile, RenderMode, Vec3};
pub use config::{
    AdaptiveConfig, ClassifierConfig, GestureConfig, HubConfig, PerformanceThresholds, SamplerConfig,
};
pub use observer::{ObserverList, SubscriptionId};
pub use emotion::{EmotionChange, EmotionClassifier, EmotionResult, EmotionTrend, TrendDirection};
pub use gesture::{
    BodyPart, DiscourseType, Easing, GestureDescriptor, GestureGenerator, GesturePhase, IdleMovement,
    PhaseKind, SpeechContext,
};
pub use animation::{AnimationRegistry, EmotionAnimationMap};
pub use expression::{blend_expressions, morph_targets, mouth_targets, Expression};
pub use lipsync::{
    blend_visemes, generate_frames, validate_frames, MouthShape, Viseme, VisemeFrame, MAX_UTTERANCE_MS,
};
pub use audio::{IntensityCurve, VoiceFeatures};
pub use performance::{
    IssueKind, Metric, MetricSummary, PerformanceEvent, PerformanceIssue, PerformanceReport,
    PerformanceSample, PerformanceSampler, Severity, WindowReport,
};
pub use adaptive::{resolve_mode, AdaptiveModeController, ModeChange};
pub use hub::{AvatarState, HubSnapshot, HubStatistics, StateChange, StateField, StateSnapshot, StateSyncHub};
