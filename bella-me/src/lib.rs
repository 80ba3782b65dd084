//! bella-me: async avatar behavior layer
//!
//! Drives a virtual avatar on top of the `bella-core` components:
//! - Two-layer cross-fade animation engine running as a tokio task
//! - Orchestrator translating voice/LLM events into emotion, gestures and clips
//! - Render surface, voice agent and network probe collaborator traits
//! - Adaptive render mode fed by frame timing and network probes

pub mod error;
pub mod config;
pub mod surface;
pub mod playback;
pub mod voice;
pub mod network;
pub mod orchestrator;

pub use error::AvatarError;
pub use config::{AvatarConfig, PlaybackConfig};
pub use surface::{HeadlessSurface, Layer, RenderSurface};
pub use playback::{AnimationEngine, PlaybackEvent, PlaybackState, PlaybackStatus, PlaybackTicket};
pub use voice::{estimate_speech_ms, SpokenAudio, VoiceAgent, VoiceState};
pub use network::{classify_network, spawn_network_monitor, NetworkProbe};
pub use orchestrator::{
    AudioFrame, AvatarEvent, ConversationTurn, Orchestrator, OrchestratorState, ResponsePlan,
};
