//! Basic avatar example

use async_trait::async_trait;
use bella_me::{
    AvatarConfig, AvatarError, AvatarEvent, HeadlessSurface, Orchestrator, SpokenAudio, VoiceAgent,
};
use bella_core::{NetworkProfile, RenderMode};
use bytes::Bytes;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// Agent that answers from a fixed script
struct ScriptedAgent;

#[async_trait]
impl VoiceAgent for ScriptedAgent {
    async fn think(&self, transcript: &str) -> Result<String, AvatarError> {
        if transcript.contains('?') {
            Ok("Great question! I am really happy you asked.".to_string())
        } else {
            Ok("Hello there, nice to meet you.".to_string())
        }
    }

    async fn speak(&self, text: &str) -> Result<SpokenAudio, AvatarError> {
        Ok(SpokenAudio {
            data: Bytes::from(text.as_bytes().to_vec()),
            duration_ms: Some(800),
        })
    }

    fn agent_name(&self) -> &str {
        "scripted"
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("Creating avatar orchestrator...");
    let config = AvatarConfig::from_toml_str(
        r#"
        idle_animation = "elegant_sway"

        [playback]
        crossfade_ms = 200

        [gestures]
        seed = 7
        "#,
    )?;
    let orchestrator = Arc::new(Orchestrator::new(config, Arc::new(HeadlessSurface))?);

    let mut events = orchestrator.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                AvatarEvent::AnimationStarted { key, looping } => {
                    println!("  ▶ animation {} (loop: {})", key, looping)
                }
                AvatarEvent::EmotionDetected(result) => {
                    println!("  ☺ {} ({})", result.emotion, result.label())
                }
                AvatarEvent::ModeChanged(change) => {
                    println!("  ⇄ render mode {} -> {}", change.previous, change.current)
                }
                AvatarEvent::GestureStarted(gesture) => println!("  ✋ gesture {}", gesture.name),
                _ => {}
            }
        }
    });

    println!("\nConversing...");
    let turn = orchestrator
        .converse(&ScriptedAgent, "Can you tell me something nice?")
        .await?;
    println!("✓ Reply: {}", turn.reply);

    println!("\nSimulating a slow device...");
    let start = Instant::now();
    for frame in 0..=80u32 {
        orchestrator.frame(start + Duration::from_millis(u64::from(frame) * 25));
    }
    println!("  Mode after slow frames: {}", orchestrator.mode());

    orchestrator.set_network_profile(NetworkProfile::Poor);
    orchestrator.set_forced_mode(Some(RenderMode::Hybrid));
    println!("  Forced mode: {}", orchestrator.mode());

    let trend = orchestrator.analyze_sentiment_trend(&[
        "I am so sad today",
        "Things are getting better",
        "Now I am really happy!",
    ]);
    println!("\nSentiment trend: {:?} (dominant {})", trend.direction, trend.dominant);

    orchestrator.shutdown().await?;
    printer.abort();
    println!("\nExample completed!");
    Ok(())
}
