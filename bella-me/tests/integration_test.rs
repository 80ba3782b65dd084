//! End-to-end avatar session tests

mod common;

use async_trait::async_trait;
use bella_core::{Emotion, RenderMode, StateField};
use bella_me::{AvatarConfig, AvatarError, AvatarEvent, Orchestrator, SpokenAudio, VoiceAgent};
use common::{drain, wait_for_event, RecordingSurface};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct EchoAgent;

#[async_trait]
impl VoiceAgent for EchoAgent {
    async fn think(&self, transcript: &str) -> Result<String, AvatarError> {
        Ok(format!("You said: {}", transcript))
    }

    async fn speak(&self, _text: &str) -> Result<SpokenAudio, AvatarError> {
        Ok(SpokenAudio::default())
    }

    fn agent_name(&self) -> &str {
        "echo"
    }
}

#[tokio::test(start_paused = true)]
async fn test_session_from_toml_config() {
    let config = AvatarConfig::from_toml_str(
        r#"
        idle_animation = "elegant_sway"
        enable_lip_sync = false

        [emotion_animations]
        happy = "peace"

        [gestures]
        seed = 11

        [adaptive]
        forced_mode = "video"
        "#,
    )
    .unwrap();
    let surface = Arc::new(RecordingSurface::new());
    let orchestrator = Orchestrator::new(config, surface.clone()).unwrap();
    assert_eq!(orchestrator.mode(), RenderMode::Video);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    orchestrator.hub().subscribe(StateField::Animation, move |change| {
        sink.lock().push(change.state.animation.clone());
    });

    let mut events = orchestrator.subscribe_events();
    let turn = orchestrator
        .converse(&EchoAgent, "I am so happy, this is wonderful")
        .await
        .unwrap();
    assert_eq!(turn.emotion.emotion, Emotion::Happy);
    assert_eq!(turn.animation, "peace");

    wait_for_event(&mut events, |e| {
        matches!(e, AvatarEvent::AnimationStarted { key, .. } if key == "elegant_sway")
    })
    .await;
    assert_eq!(seen.lock().last().cloned().flatten().as_deref(), Some("elegant_sway"));
    assert!(surface.loaded_paths().contains(&common::clip("elegant_sway")));
}

#[tokio::test(start_paused = true)]
async fn test_response_without_lip_sync_or_gestures() {
    let mut config = AvatarConfig::default();
    config.enable_lip_sync = false;
    config.enable_gestures = false;
    let orchestrator = Orchestrator::new(config, Arc::new(RecordingSurface::new())).unwrap();

    let plan = orchestrator.on_response("Hello! Great to see you", None).await.unwrap();
    assert!(plan.visemes.is_empty());
    assert!(plan.gesture.is_none());
    assert!(!plan.looping);
    assert!(orchestrator.hub().state().gesture.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_reported_audio_duration_is_bounded() {
    let orchestrator = Orchestrator::new(AvatarConfig::default(), Arc::new(RecordingSurface::new())).unwrap();

    let plan = orchestrator.on_response("Thanks for waiting", Some(u64::MAX)).await.unwrap();
    assert!(plan.looping);
    assert_eq!(
        plan.visemes.len(),
        (bella_core::MAX_UTTERANCE_MS / bella_core::lipsync::FRAME_MS) as usize
    );
}

#[tokio::test(start_paused = true)]
async fn test_performance_issues_reach_subscribers() {
    let orchestrator = Orchestrator::new(AvatarConfig::default(), Arc::new(RecordingSurface::new())).unwrap();
    let mut events = orchestrator.subscribe_events();

    // 20 fps
    let start = Instant::now();
    for frame in 0..=20u64 {
        orchestrator.frame(start + Duration::from_millis(frame * 50));
    }

    let events = drain(&mut events);
    let issues = events
        .iter()
        .find_map(|e| match e {
            AvatarEvent::PerformanceIssues(issues) => Some(issues.clone()),
            _ => None,
        })
        .unwrap();
    assert!(issues.iter().any(|i| i.kind == bella_core::IssueKind::LowFps));
    assert!(events.iter().any(|e| matches!(
        e,
        AvatarEvent::ModeChanged(change) if change.current == RenderMode::Video
    )));
    assert_eq!(orchestrator.sampler().profile(), bella_core::PerformanceProfile::Low);
}

#[tokio::test(start_paused = true)]
async fn test_smoothed_emotion_change_is_broadcast() {
    let orchestrator = Orchestrator::new(AvatarConfig::default(), Arc::new(RecordingSurface::new())).unwrap();
    let mut events = orchestrator.subscribe_events();

    orchestrator.on_processing("I feel so sad and lonely").await.unwrap();

    let change = drain(&mut events)
        .into_iter()
        .find_map(|e| match e {
            AvatarEvent::EmotionChanged(change) => Some(change),
            _ => None,
        })
        .unwrap();
    assert_eq!(change.previous, Emotion::Neutral);
    assert_eq!(change.current, Emotion::Sad);
}
