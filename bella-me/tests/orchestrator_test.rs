//! Orchestrator tests

mod common;

use async_trait::async_trait;
use bella_core::{Emotion, NetworkProfile, RenderMode, TrendDirection};
use bella_me::{
    AudioFrame, AvatarConfig, AvatarError, AvatarEvent, NetworkProbe, Orchestrator, PlaybackState,
    SpokenAudio, VoiceAgent, VoiceState,
};
use bytes::Bytes;
use common::{
    drain, seeded_config, settle_into, tone, wait_for_event, wait_for_status, RecordingSurface,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

fn orchestrator(config: AvatarConfig) -> (Orchestrator, Arc<RecordingSurface>) {
    let surface = Arc::new(RecordingSurface::new());
    let orchestrator = Orchestrator::new(config, surface.clone()).unwrap();
    (orchestrator, surface)
}

fn jaw(orchestrator: &Orchestrator) -> f32 {
    orchestrator
        .hub()
        .state()
        .expression
        .get("jawDrop")
        .copied()
        .unwrap_or(0.0)
}

struct FakeAgent {
    reply: &'static str,
    fail_think: bool,
    fail_speak: bool,
}

impl FakeAgent {
    fn replying(reply: &'static str) -> Self {
        Self {
            reply,
            fail_think: false,
            fail_speak: false,
        }
    }
}

#[async_trait]
impl VoiceAgent for FakeAgent {
    async fn think(&self, _transcript: &str) -> Result<String, AvatarError> {
        if self.fail_think {
            return Err(AvatarError::Voice("model unavailable".to_string()));
        }
        Ok(self.reply.to_string())
    }

    async fn speak(&self, _text: &str) -> Result<SpokenAudio, AvatarError> {
        if self.fail_speak {
            return Err(AvatarError::Voice("tts unavailable".to_string()));
        }
        Ok(SpokenAudio {
            data: Bytes::from_static(b"pcm"),
            duration_ms: Some(600),
        })
    }

    fn agent_name(&self) -> &str {
        "fake"
    }
}

struct FixedProbe(NetworkProfile);

#[async_trait]
impl NetworkProbe for FixedProbe {
    async fn probe(&self) -> Result<NetworkProfile, AvatarError> {
        Ok(self.0)
    }

    fn probe_name(&self) -> &str {
        "fixed"
    }
}

#[tokio::test(start_paused = true)]
async fn test_voice_events_drive_avatar() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let mut events = orchestrator.subscribe_events();

    orchestrator.on_listening_start().await.unwrap();
    assert_eq!(orchestrator.voice_state(), VoiceState::Listening);

    orchestrator
        .on_processing("I am so happy and excited today")
        .await
        .unwrap();
    assert_eq!(orchestrator.voice_state(), VoiceState::Processing);
    assert_eq!(orchestrator.current_emotion(), Emotion::Happy);
    assert_eq!(orchestrator.hub().state().emotion, Emotion::Happy);
    assert!(!orchestrator.hub().state().expression.is_empty());

    let plan = orchestrator
        .on_response("Do you love this great idea?", Some(1200))
        .await
        .unwrap();
    assert_eq!(orchestrator.voice_state(), VoiceState::Speaking);
    assert_eq!(plan.emotion.emotion, Emotion::Happy);
    assert_eq!(plan.animation, "happy");
    assert!(plan.looping);
    assert_eq!(plan.visemes.len(), 48);
    let gesture = plan.gesture.clone().unwrap();
    assert!(gesture.name == "nod" || gesture.name == "thinking");
    assert_eq!(orchestrator.hub().state().gesture, Some(gesture));

    orchestrator.on_complete().await.unwrap();
    assert_eq!(orchestrator.voice_state(), VoiceState::Idle);
    assert!(orchestrator.hub().state().gesture.is_none());

    // the clip still fading in when the reply ended has to finish first
    settle_into(orchestrator.engine(), "idle").await;
    wait_for_event(&mut events, |e| {
        matches!(e, AvatarEvent::AnimationStarted { key, looping: true } if key == "idle")
    })
    .await;
    assert_eq!(orchestrator.hub().state().animation.as_deref(), Some("idle"));

    let status = orchestrator.engine().status();
    assert_eq!(status.state, PlaybackState::Looping);
    assert_eq!(status.queue_len, 0);
}

#[tokio::test(start_paused = true)]
async fn test_voice_state_changes_are_broadcast() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let mut events = orchestrator.subscribe_events();

    orchestrator.on_listening_start().await.unwrap();
    orchestrator.on_processing("").await.unwrap();
    orchestrator.on_response("Sure.", None).await.unwrap();
    orchestrator.on_complete().await.unwrap();

    let transitions: Vec<(VoiceState, VoiceState)> = drain(&mut events)
        .into_iter()
        .filter_map(|e| match e {
            AvatarEvent::VoiceStateChanged { previous, current } => Some((previous, current)),
            _ => None,
        })
        .collect();
    assert_eq!(
        transitions,
        vec![
            (VoiceState::Idle, VoiceState::Listening),
            (VoiceState::Listening, VoiceState::Processing),
            (VoiceState::Processing, VoiceState::Speaking),
            (VoiceState::Speaking, VoiceState::Idle),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_processing_without_detection_uses_processing_clip() {
    let mut config = seeded_config();
    config.enable_emotion_detection = false;
    config.processing_animation = "nodding".to_string();
    let (orchestrator, surface) = orchestrator(config);

    orchestrator.on_processing("I am furious").await.unwrap();
    assert_eq!(orchestrator.current_emotion(), Emotion::Neutral);

    wait_for_status(orchestrator.engine(), |s| s.active.as_deref() == Some("nodding")).await;
    assert_eq!(surface.loaded_paths(), vec![common::clip("nodding")]);
}

#[tokio::test(start_paused = true)]
async fn test_converse_runs_full_exchange() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    let turn = orchestrator
        .converse(&FakeAgent::replying("Hello! I am so happy to see you"), "hi there")
        .await
        .unwrap();
    assert_eq!(turn.reply, "Hello! I am so happy to see you");
    assert_eq!(turn.emotion.emotion, Emotion::Happy);
    assert_eq!(turn.animation, "happy");
    assert_eq!(turn.audio.and_then(|a| a.duration_ms), Some(600));
    assert_eq!(orchestrator.voice_state(), VoiceState::Idle);

    wait_for_status(orchestrator.engine(), |s| {
        s.state == PlaybackState::Looping && s.active.as_deref() == Some("idle")
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_converse_degrades_on_agent_failures() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    let thinking_fails = FakeAgent {
        reply: "",
        fail_think: true,
        fail_speak: false,
    };
    let result = orchestrator.converse(&thinking_fails, "hello").await;
    assert!(matches!(result, Err(AvatarError::Voice(_))));
    assert_eq!(orchestrator.voice_state(), VoiceState::Idle);

    let speaking_fails = FakeAgent {
        reply: "I am so sorry about that",
        fail_think: false,
        fail_speak: true,
    };
    let turn = orchestrator.converse(&speaking_fails, "hello").await.unwrap();
    assert!(turn.audio.is_none());
    assert_eq!(turn.emotion.emotion, Emotion::Sad);
}

#[tokio::test(start_paused = true)]
async fn test_manual_gesture_respects_compatibility() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    assert!(orchestrator.apply_manual_gesture("nod").unwrap());
    // both use the head
    assert!(!orchestrator.apply_manual_gesture("headShake").unwrap());
    assert_eq!(orchestrator.hub().state().gesture.unwrap().name, "nod");

    assert!(orchestrator.apply_manual_gesture("wave").unwrap());
    assert_eq!(orchestrator.hub().state().gesture.unwrap().name, "wave");

    let result = orchestrator.apply_manual_gesture("moonwalk");
    assert!(matches!(
        result,
        Err(AvatarError::Core(bella_core::Error::UnknownGesture(_)))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_emotion_and_overrides() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let mut events = orchestrator.subscribe_events();

    orchestrator.trigger_emotion(Emotion::Sad, 0.8).await.unwrap();
    let state = orchestrator.hub().state();
    assert_eq!(state.emotion, Emotion::Sad);
    assert!((state.emotion_intensity - 0.8).abs() < 1e-6);
    wait_for_event(&mut events, |e| {
        matches!(e, AvatarEvent::AnimationStarted { key, .. } if key == "sad")
    })
    .await;

    orchestrator.set_emotion_animation(Emotion::Happy, "waving").unwrap();
    assert!(orchestrator.set_emotion_animation(Emotion::Happy, "nope").is_err());
    orchestrator.trigger_emotion(Emotion::Happy, 2.0).await.unwrap();
    assert_eq!(orchestrator.hub().state().emotion_intensity, 1.0);
    wait_for_event(&mut events, |e| {
        matches!(e, AvatarEvent::AnimationStarted { key, .. } if key == "waving")
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_slow_frames_switch_to_video() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let mut events = orchestrator.subscribe_events();
    assert_eq!(orchestrator.mode(), RenderMode::Hybrid);

    let start = Instant::now();
    for frame in 0..=40u64 {
        orchestrator.frame(start + Duration::from_millis(frame * 25));
    }
    assert_eq!(orchestrator.mode(), RenderMode::Video);

    let change = drain(&mut events)
        .into_iter()
        .find_map(|e| match e {
            AvatarEvent::ModeChanged(change) => Some(change),
            _ => None,
        })
        .unwrap();
    assert_eq!(change.previous, RenderMode::Hybrid);
    assert_eq!(change.current, RenderMode::Video);
}

#[tokio::test(start_paused = true)]
async fn test_forced_mode_and_network_profile() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    let change = orchestrator.set_network_profile(NetworkProfile::Poor).unwrap();
    assert_eq!(change.current, RenderMode::ThreeD);

    orchestrator.set_forced_mode(Some(RenderMode::Video));
    assert_eq!(orchestrator.mode(), RenderMode::Video);
    assert!(orchestrator.set_network_profile(NetworkProfile::Excellent).is_none());

    orchestrator.set_forced_mode(None);
    assert_eq!(orchestrator.mode(), RenderMode::Hybrid);
    assert_eq!(orchestrator.state().mode, RenderMode::Hybrid);
}

#[tokio::test(start_paused = true)]
async fn test_network_monitor_feeds_mode() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    orchestrator.monitor_network(Arc::new(FixedProbe(NetworkProfile::Critical)), Duration::from_millis(100));
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert_eq!(orchestrator.controller().network_profile(), NetworkProfile::Critical);
    assert_eq!(orchestrator.mode(), RenderMode::Video);
    orchestrator.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_audio_drives_mouth_only_while_speaking() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let samples = tone(1600, 16_000);

    let features = orchestrator.process_audio(&samples, 16_000);
    assert!(!features.is_silent());
    assert_eq!(jaw(&orchestrator), 0.0);

    orchestrator.on_response("Okay then", None).await.unwrap();
    assert_eq!(jaw(&orchestrator), 0.0);
    orchestrator.process_audio(&samples, 16_000);
    assert!(jaw(&orchestrator) > 0.5);

    let silent = orchestrator.process_audio(&[0.0; 256], 16_000);
    assert!(silent.is_silent());
}

#[tokio::test(start_paused = true)]
async fn test_audio_analysis_task_samples_each_tick() {
    let (orchestrator, _surface) = orchestrator(seeded_config());
    let orchestrator = Arc::new(orchestrator);
    orchestrator.on_response("Okay then", None).await.unwrap();
    let before = orchestrator.hub().history_len();

    let (frames_tx, frames_rx) = watch::channel(AudioFrame::default());
    let task = orchestrator.spawn_audio_analysis(frames_rx);

    frames_tx
        .send(AudioFrame {
            samples: tone(1600, 16_000),
            sample_rate: 16_000,
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(jaw(&orchestrator) > 0.5);
    assert!(orchestrator.hub().history_len() > before);

    drop(frames_tx);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_sentiment_trend_and_reset() {
    let (orchestrator, _surface) = orchestrator(seeded_config());

    let trend = orchestrator.analyze_sentiment_trend(&[
        "I am sad",
        "I feel so lonely",
        "That is great",
        "I am really happy now",
    ]);
    assert_eq!(trend.direction, TrendDirection::Improving);
    assert_eq!(trend.sequence.len(), 4);

    let mut events = orchestrator.subscribe_events();
    orchestrator.trigger_emotion(Emotion::Angry, 0.9).await.unwrap();
    wait_for_event(&mut events, |e| matches!(e, AvatarEvent::AnimationStarted { .. })).await;
    orchestrator.reset().await.unwrap();

    assert_eq!(orchestrator.current_emotion(), Emotion::Neutral);
    assert_eq!(orchestrator.hub().state().emotion, Emotion::Neutral);
    assert_eq!(orchestrator.hub().history_len(), 0);
    assert_eq!(orchestrator.engine().state(), PlaybackState::Idle);
}
