//! Error handling tests for bella-me

mod common;

use bella_core::{AnimationRegistry, Error as CoreError, StateField};
use bella_me::error::AvatarError;
use bella_me::{AnimationEngine, AvatarConfig, HeadlessSurface, Orchestrator, PlaybackConfig, RenderSurface};
use common::{seeded_config, RecordingSurface};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_invalid_config_errors() {
    let mut config = AvatarConfig::default();
    config.event_buffer = 0;
    assert!(matches!(
        Orchestrator::new(config, Arc::new(HeadlessSurface)),
        Err(AvatarError::Config(_))
    ));

    let mut config = AvatarConfig::default();
    config.playback.fade_steps = 0;
    assert!(Orchestrator::new(config, Arc::new(HeadlessSurface)).is_err());

    let mut config = AvatarConfig::default();
    config.classifier.smoothing_window = 0;
    assert!(Orchestrator::new(config, Arc::new(HeadlessSurface)).is_err());

    let bad_playback = PlaybackConfig {
        load_timeout_ms: 0,
        ..PlaybackConfig::default()
    };
    let surface: Arc<dyn RenderSurface> = Arc::new(HeadlessSurface);
    assert!(AnimationEngine::spawn(surface, AnimationRegistry::with_defaults(), bad_playback).is_err());
}

#[tokio::test]
async fn test_toml_errors_are_typed() {
    assert!(matches!(
        AvatarConfig::from_toml_str("idle_animation = 3"),
        Err(AvatarError::Toml(_))
    ));
    assert!(matches!(
        AvatarConfig::from_toml_str("[hub]\nmax_history = 0"),
        Err(AvatarError::Config(_))
    ));
}

#[tokio::test]
async fn test_unknown_keys_surface_as_core_errors() {
    let orchestrator = Orchestrator::new(seeded_config(), Arc::new(HeadlessSurface)).unwrap();

    let err = orchestrator.engine().play("not-a-clip", false).await.unwrap_err();
    let core: CoreError = err.into();
    assert!(matches!(core, CoreError::UnknownAnimation(ref key) if key == "not-a-clip"));

    let err = orchestrator.apply_manual_gesture("backflip").unwrap_err();
    assert!(matches!(err, AvatarError::Core(CoreError::UnknownGesture(_))));
    assert!(orchestrator.hub().state().gesture.is_none());
}

#[tokio::test]
async fn test_misconfigured_idle_clip_is_reported() {
    let mut config = seeded_config();
    config.idle_animation = "missing_clip".to_string();
    let orchestrator = Orchestrator::new(config, Arc::new(HeadlessSurface)).unwrap();

    let result = orchestrator.on_complete().await;
    assert!(matches!(
        result,
        Err(AvatarError::Core(CoreError::UnknownAnimation(_)))
    ));
    // voice state still settles
    assert_eq!(orchestrator.voice_state(), bella_me::VoiceState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_subscriber_is_isolated() {
    let surface = Arc::new(RecordingSurface::new());
    let orchestrator = Orchestrator::new(seeded_config(), surface).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    orchestrator.hub().subscribe(StateField::Emotion, |_| panic!("subscriber bug"));
    let counter = calls.clone();
    orchestrator.hub().subscribe(StateField::Emotion, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    orchestrator
        .trigger_emotion(bella_core::Emotion::Happy, 0.7)
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.hub().state().emotion, bella_core::Emotion::Happy);
}

#[tokio::test(start_paused = true)]
async fn test_closed_engine_rejects_commands() {
    let surface: Arc<dyn RenderSurface> = Arc::new(HeadlessSurface);
    let engine = AnimationEngine::spawn(surface, AnimationRegistry::with_defaults(), PlaybackConfig::default()).unwrap();

    engine.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(engine.is_closed());
    assert!(matches!(engine.play("idle", true).await, Err(AvatarError::EngineClosed)));
    assert!(matches!(engine.stop().await, Err(AvatarError::EngineClosed)));
}

#[tokio::test(start_paused = true)]
async fn test_orchestrator_shutdown_is_repeatable() {
    let orchestrator = Orchestrator::new(seeded_config(), Arc::new(HeadlessSurface)).unwrap();
    orchestrator.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    orchestrator.shutdown().await.unwrap();
}
