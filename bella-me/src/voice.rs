//! Voice/LLM collaborator contract

use crate::error::AvatarError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Conversation phase reported by the voice pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceState {
    #[default]
    Idle,
    Listening,
    Processing,
    Speaking,
}

impl fmt::Display for VoiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VoiceState::Idle => "idle",
            VoiceState::Listening => "listening",
            VoiceState::Processing => "processing",
            VoiceState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Synthesized speech returned by `VoiceAgent::speak`
#[derive(Debug, Clone, Default)]
pub struct SpokenAudio {
    pub data: Bytes,
    /// Playback length, when the synthesizer knows it
    pub duration_ms: Option<u64>,
}

/// Trait for LLM/TTS backends.
///
/// Both calls are black boxes to the avatar: `think` turns a transcript into
/// a reply and `speak` turns the reply into audio.
#[async_trait]
pub trait VoiceAgent: Send + Sync {
    async fn think(&self, transcript: &str) -> Result<String, AvatarError>;
    async fn speak(&self, text: &str) -> Result<SpokenAudio, AvatarError>;
    fn agent_name(&self) -> &str;
}

/// Speaking time estimate used when the synthesizer gives no duration
pub fn estimate_speech_ms(text: &str) -> u64 {
    // roughly 150 words per minute
    let words = text.split_whitespace().count() as u64;
    (words * 400).max(500)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_state_serializes_lowercase() {
        let json = serde_json::to_string(&VoiceState::Speaking).unwrap();
        assert_eq!(json, "\"speaking\"");
        assert_eq!(VoiceState::default(), VoiceState::Idle);
    }

    #[test]
    fn test_speech_estimate_has_floor() {
        assert_eq!(estimate_speech_ms(""), 500);
        assert_eq!(estimate_speech_ms("one two three"), 1200);
    }
}
