//! Orchestrator - coordinates voice events, emotion, gestures and playback

use crate::config::AvatarConfig;
use crate::error::AvatarError;
use crate::network::{spawn_network_monitor, NetworkProbe};
use crate::playback::{AnimationEngine, PlaybackEvent, PlaybackStatus, PlaybackTicket};
use crate::surface::RenderSurface;
use crate::voice::{estimate_speech_ms, SpokenAudio, VoiceAgent, VoiceState};
use bella_core::{
    generate_frames, morph_targets, mouth_targets, AdaptiveModeController, AnimationRegistry,
    Emotion, EmotionAnimationMap, EmotionChange, EmotionClassifier, EmotionResult, EmotionTrend,
    GestureDescriptor, GestureGenerator, IntensityCurve, ModeChange, NetworkProfile,
    PerformanceEvent, PerformanceIssue, PerformanceSampler, RenderMode, SpeechContext,
    StateSyncHub, SubscriptionId, VisemeFrame, VoiceFeatures, MAX_UTTERANCE_MS,
};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything the avatar layer reports to its consumers
#[derive(Debug, Clone)]
pub enum AvatarEvent {
    VoiceStateChanged {
        previous: VoiceState,
        current: VoiceState,
    },
    EmotionDetected(EmotionResult),
    /// Smoothed emotion moved
    EmotionChanged(EmotionChange),
    ModeChanged(ModeChange),
    PerformanceIssues(Vec<PerformanceIssue>),
    GestureStarted(GestureDescriptor),
    AnimationStarted { key: String, looping: bool },
    AnimationFailed { key: String, reason: String },
}

/// What the avatar does for one spoken response
#[derive(Debug)]
pub struct ResponsePlan {
    pub emotion: EmotionResult,
    pub animation: String,
    pub looping: bool,
    pub gesture: Option<GestureDescriptor>,
    pub visemes: Vec<VisemeFrame>,
    pub ticket: PlaybackTicket,
}

/// Outcome of `Orchestrator::converse`
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub transcript: String,
    pub reply: String,
    pub emotion: EmotionResult,
    pub animation: String,
    pub gesture: Option<GestureDescriptor>,
    pub audio: Option<SpokenAudio>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorState {
    pub voice_state: VoiceState,
    pub current_emotion: Emotion,
    pub mode: RenderMode,
    pub playback: PlaybackStatus,
}

/// Raw audio handed to the periodic analysis task
#[derive(Debug, Clone, Default)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy)]
struct Subscriptions {
    emotion: SubscriptionId,
    mode: SubscriptionId,
    performance: SubscriptionId,
}

#[derive(Debug, Clone, Copy)]
struct Session {
    voice_state: VoiceState,
    current_emotion: Emotion,
}

/// Top-level coordinator owning one instance of every component
pub struct Orchestrator {
    config: AvatarConfig,
    classifier: Arc<EmotionClassifier>,
    gestures: Arc<GestureGenerator>,
    engine: AnimationEngine,
    sampler: Arc<PerformanceSampler>,
    controller: Arc<AdaptiveModeController>,
    hub: Arc<StateSyncHub>,
    animations: RwLock<EmotionAnimationMap>,
    session: RwLock<Session>,
    events: broadcast::Sender<AvatarEvent>,
    subscriptions: Subscriptions,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Build every component and wire their observers.
    ///
    /// Must be called inside a tokio runtime; the playback engine is spawned
    /// here.
    pub fn new(config: AvatarConfig, surface: Arc<dyn RenderSurface>) -> Result<Self, AvatarError> {
        config.validate().map_err(AvatarError::Config)?;

        let (events, _) = broadcast::channel(config.event_buffer);
        let classifier = Arc::new(EmotionClassifier::new(config.classifier.clone()));
        let gestures = Arc::new(GestureGenerator::new(config.gestures.clone()));
        let sampler = Arc::new(PerformanceSampler::new(config.sampler.clone()));
        let controller = Arc::new(AdaptiveModeController::new(config.adaptive.clone()));
        let hub = Arc::new(StateSyncHub::new(config.hub.clone()));
        let engine = AnimationEngine::spawn(
            surface,
            AnimationRegistry::with_defaults(),
            config.playback.clone(),
        )?;

        let tx = events.clone();
        let emotion = classifier.on_change(move |change| {
            let _ = tx.send(AvatarEvent::EmotionChanged(change.clone()));
        });

        let tx = events.clone();
        let mode = controller.on_change(move |change| {
            let _ = tx.send(AvatarEvent::ModeChanged(*change));
        });

        let tx = events.clone();
        let mode_controller = Arc::clone(&controller);
        let performance = sampler.on_event(move |event| {
            if let PerformanceEvent::Issues(issues) = event {
                let _ = tx.send(AvatarEvent::PerformanceIssues(issues.clone()));
            }
            mode_controller.handle_performance_event(event);
        });
        let subscriptions = Subscriptions {
            emotion,
            mode,
            performance,
        };

        let forwarder = spawn_playback_forwarder(
            engine.subscribe_events(),
            engine.subscribe_status(),
            Arc::clone(&hub),
            events.clone(),
        );

        info!(
            mode = %controller.mode(),
            emotion_detection = config.enable_emotion_detection,
            gestures = config.enable_gestures,
            lip_sync = config.enable_lip_sync,
            "Avatar orchestrator ready"
        );

        Ok(Self {
            animations: RwLock::new(EmotionAnimationMap::new(config.emotion_animations.clone())),
            config,
            classifier,
            gestures,
            engine,
            sampler,
            controller,
            hub,
            session: RwLock::new(Session {
                voice_state: VoiceState::Idle,
                current_emotion: Emotion::Neutral,
            }),
            events,
            subscriptions,
            tasks: Mutex::new(vec![forwarder]),
        })
    }

    fn set_voice_state(&self, state: VoiceState) {
        let previous = {
            let mut session = self.session.write();
            std::mem::replace(&mut session.voice_state, state)
        };
        if previous != state {
            debug!(from = %previous, to = %state, "Voice state changed");
            let _ = self.events.send(AvatarEvent::VoiceStateChanged { previous, current: state });
        }
    }

    /// Push an emotion into the hub with its display intensity and face
    fn express(&self, emotion: Emotion, intensity: f32) {
        self.session.write().current_emotion = emotion;
        self.hub.set_emotion(emotion, intensity);
        self.hub.set_expression(morph_targets(emotion, intensity));
    }

    fn animation_for(&self, emotion: Emotion) -> String {
        self.animations.read().animation_for(emotion).to_string()
    }

    /// The user started speaking
    pub async fn on_listening_start(&self) -> Result<PlaybackTicket, AvatarError> {
        self.set_voice_state(VoiceState::Listening);
        self.engine.play(&self.config.listening_animation, false).await
    }

    /// A transcript is being answered; react to its emotion when enabled
    pub async fn on_processing(&self, transcript: &str) -> Result<PlaybackTicket, AvatarError> {
        self.set_voice_state(VoiceState::Processing);

        if self.config.enable_emotion_detection && !transcript.trim().is_empty() {
            let result = self.classifier.detect(transcript);
            let _ = self.events.send(AvatarEvent::EmotionDetected(result.clone()));
            self.express(result.emotion, result.intensity);
            let animation = self.animation_for(result.emotion);
            self.engine.play(&animation, false).await
        } else {
            self.engine.play(&self.config.processing_animation, false).await
        }
    }

    /// The reply is about to be spoken.
    ///
    /// With a known audio duration the clip loops until `on_complete`.
    pub async fn on_response(
        &self,
        text: &str,
        audio_duration_ms: Option<u64>,
    ) -> Result<ResponsePlan, AvatarError> {
        self.set_voice_state(VoiceState::Speaking);

        let emotion = if self.config.enable_emotion_detection {
            let result = self.classifier.detect(text);
            let _ = self.events.send(AvatarEvent::EmotionDetected(result.clone()));
            result
        } else {
            EmotionResult::new(self.current_emotion(), 0.5, 0.5)
        };
        let intensity = IntensityCurve::for_emotion(emotion.emotion).apply(emotion.confidence);
        self.express(emotion.emotion, intensity);

        let gesture = if self.config.enable_gestures {
            let context = SpeechContext {
                text: text.to_string(),
                is_speaking: true,
            };
            self.gestures
                .generate_from_speech(&context)
                .or_else(|| self.gestures.generate(emotion.emotion, intensity))
        } else {
            None
        };
        if let Some(gesture) = &gesture {
            self.hub.set_gesture(Some(gesture.clone()));
            let _ = self.events.send(AvatarEvent::GestureStarted(gesture.clone()));
        }

        let visemes = if self.config.enable_lip_sync {
            let duration = audio_duration_ms.unwrap_or_else(|| estimate_speech_ms(text));
            let duration = duration.min(u64::from(MAX_UTTERANCE_MS)) as u32;
            generate_frames(text, duration)
        } else {
            Vec::new()
        };

        let animation = self.animation_for(emotion.emotion);
        let looping = audio_duration_ms.is_some();
        let ticket = self.engine.play(&animation, looping).await?;

        Ok(ResponsePlan {
            emotion,
            animation,
            looping,
            gesture,
            visemes,
            ticket,
        })
    }

    /// The interaction finished; drop pending clips and settle into idle
    pub async fn on_complete(&self) -> Result<PlaybackTicket, AvatarError> {
        self.set_voice_state(VoiceState::Idle);
        self.engine.clear_queue().await?;
        self.hub.set_gesture(None);
        self.engine.play(&self.config.idle_animation, true).await
    }

    /// Run one full exchange with a voice agent.
    ///
    /// Waits for the spoken reply to finish before returning to idle. A
    /// failing `speak` still animates the reply, just without audio.
    pub async fn converse(
        &self,
        agent: &dyn VoiceAgent,
        transcript: &str,
    ) -> Result<ConversationTurn, AvatarError> {
        self.on_listening_start().await?;
        self.on_processing(transcript).await?;

        let reply = match agent.think(transcript).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(agent = agent.agent_name(), "Voice agent failed to answer: {}", e);
                self.on_complete().await?;
                return Err(e);
            }
        };

        let audio = match agent.speak(&reply).await {
            Ok(audio) => Some(audio),
            Err(e) => {
                warn!(agent = agent.agent_name(), "Speech synthesis failed: {}", e);
                None
            }
        };
        let duration_ms = audio.as_ref().and_then(|a| a.duration_ms);

        let plan = self.on_response(&reply, duration_ms).await?;
        let speaking = duration_ms.unwrap_or_else(|| estimate_speech_ms(&reply));
        tokio::time::sleep(Duration::from_millis(speaking)).await;
        self.on_complete().await?;

        Ok(ConversationTurn {
            transcript: transcript.to_string(),
            reply,
            emotion: plan.emotion,
            animation: plan.animation,
            gesture: plan.gesture,
            audio,
        })
    }

    /// Overlay a named gesture on whatever the avatar is doing.
    ///
    /// Returns `Ok(false)` when it collides with the active gesture on a
    /// critical body part.
    pub fn apply_manual_gesture(&self, name: &str) -> Result<bool, AvatarError> {
        let gesture = self.gestures.gesture(name).map_err(|e| {
            warn!("Manual gesture rejected: {}", e);
            e
        })?;

        if let Some(active) = self.hub.state().gesture {
            if !self.gestures.is_compatible(&active, &gesture) {
                warn!(active = %active.name, requested = %gesture.name, "Gesture conflicts with active gesture");
                return Ok(false);
            }
        }

        self.hub.set_gesture(Some(gesture.clone()));
        let _ = self.events.send(AvatarEvent::GestureStarted(gesture));
        Ok(true)
    }

    /// Express an emotion directly, bypassing classification
    pub async fn trigger_emotion(
        &self,
        emotion: Emotion,
        intensity: f32,
    ) -> Result<PlaybackTicket, AvatarError> {
        let intensity = intensity.clamp(0.0, 1.0);
        self.express(emotion, intensity);
        let animation = self.animation_for(emotion);
        self.engine.play(&animation, false).await
    }

    /// Analyze one block of live audio; while speaking, drive the mouth
    pub fn process_audio(&self, samples: &[f32], sample_rate: u32) -> VoiceFeatures {
        let features = VoiceFeatures::extract(samples, sample_rate);
        if self.voice_state() == VoiceState::Speaking && !features.is_silent() {
            let mut expression = self.hub.state().expression;
            expression.extend(mouth_targets(&features));
            self.hub.set_expression(expression);
        }
        features
    }

    /// Analyze the latest audio frame once per audio tick
    pub fn spawn_audio_analysis(self: &Arc<Self>, mut frames: watch::Receiver<AudioFrame>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let period = self.config.audio_tick();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                match frames.has_changed() {
                    Ok(true) => {
                        let frame = frames.borrow_and_update().clone();
                        orchestrator.process_audio(&frame.samples, frame.sample_rate);
                    }
                    Ok(false) => {}
                    Err(_) => {
                        debug!("Audio source closed");
                        break;
                    }
                }
            }
        })
    }

    /// Per-frame hook for the render loop
    pub fn frame(&self, now: Instant) -> Vec<PerformanceEvent> {
        self.sampler.tick(now)
    }

    pub fn set_network_profile(&self, profile: NetworkProfile) -> Option<ModeChange> {
        self.controller.set_network_profile(profile)
    }

    /// Operator override; `None` returns to the decision table
    pub fn set_forced_mode(&self, mode: Option<RenderMode>) -> Option<ModeChange> {
        self.controller.set_forced_mode(mode)
    }

    pub fn mode(&self) -> RenderMode {
        self.controller.mode()
    }

    /// Poll `probe` in the background; stopped with the orchestrator
    pub fn monitor_network(&self, probe: Arc<dyn NetworkProbe>, interval: Duration) {
        let handle = spawn_network_monitor(Arc::clone(&self.controller), probe, interval);
        self.tasks.lock().push(handle);
    }

    pub fn set_emotion_animation(&self, emotion: Emotion, animation: &str) -> Result<(), AvatarError> {
        self.engine.resolve(animation)?;
        self.animations.write().set(emotion, animation);
        Ok(())
    }

    pub fn analyze_sentiment_trend<S: AsRef<str>>(&self, conversation: &[S]) -> EmotionTrend {
        self.classifier.analyze_trend(conversation)
    }

    pub fn voice_state(&self) -> VoiceState {
        self.session.read().voice_state
    }

    pub fn current_emotion(&self) -> Emotion {
        self.session.read().current_emotion
    }

    pub fn state(&self) -> OrchestratorState {
        let session = *self.session.read();
        OrchestratorState {
            voice_state: session.voice_state,
            current_emotion: session.current_emotion,
            mode: self.controller.mode(),
            playback: self.engine.status(),
        }
    }

    /// Back to a neutral, idle avatar with empty history
    pub async fn reset(&self) -> Result<(), AvatarError> {
        self.engine.stop().await?;
        self.set_voice_state(VoiceState::Idle);
        self.session.write().current_emotion = Emotion::Neutral;
        self.classifier.clear_history();
        self.gestures.clear_queue();
        self.hub.reset();
        self.hub.clear_history();
        Ok(())
    }

    /// Stop the engine and every background task
    pub async fn shutdown(&self) -> Result<(), AvatarError> {
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        if !self.engine.is_closed() {
            self.engine.stop().await?;
            self.engine.shutdown().await?;
        }
        info!("Avatar orchestrator stopped");
        Ok(())
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AvatarEvent> {
        self.events.subscribe()
    }

    pub fn hub(&self) -> &Arc<StateSyncHub> {
        &self.hub
    }

    pub fn engine(&self) -> &AnimationEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &Arc<EmotionClassifier> {
        &self.classifier
    }

    pub fn gestures(&self) -> &Arc<GestureGenerator> {
        &self.gestures
    }

    pub fn sampler(&self) -> &Arc<PerformanceSampler> {
        &self.sampler
    }

    pub fn controller(&self) -> &Arc<AdaptiveModeController> {
        &self.controller
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        for task in self.tasks.get_mut().drain(..) {
            task.abort();
        }
        // observers hold clones of the event sender
        self.classifier.unsubscribe(self.subscriptions.emotion);
        self.controller.unsubscribe(self.subscriptions.mode);
        self.sampler.unsubscribe(self.subscriptions.performance);
    }
}

/// Mirror visible playback changes into the hub and the event stream
fn spawn_playback_forwarder(
    mut playback: broadcast::Receiver<PlaybackEvent>,
    status: watch::Receiver<PlaybackStatus>,
    hub: Arc<StateSyncHub>,
    events: broadcast::Sender<AvatarEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match playback.recv().await {
                Ok(PlaybackEvent::Started { key, looping }) => {
                    hub.set_animation(Some(key.clone()));
                    let _ = events.send(AvatarEvent::AnimationStarted { key, looping });
                }
                Ok(PlaybackEvent::Failed { key, reason }) => {
                    let _ = events.send(AvatarEvent::AnimationFailed { key, reason });
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Playback event forwarder lagged, resyncing animation");
                    let active = status.borrow().active.clone();
                    if hub.state().animation != active {
                        hub.set_animation(active);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
