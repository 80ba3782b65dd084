//! Two-layer cross-fade animation playback engine
//!
//! The engine runs as a single tokio task that owns the playback state, the
//! request queue and the in-flight transition. Handles talk to it over a
//! command channel, so every state change happens in one place and at most
//! one load or cross-fade is ever in flight.

use crate::config::PlaybackConfig;
use crate::error::AvatarError;
use crate::surface::{Layer, RenderSurface};
use bella_core::AnimationRegistry;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Idle,
    Loading,
    CrossFading,
    Playing,
    Looping,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Loading => "loading",
            PlaybackState::CrossFading => "crossfading",
            PlaybackState::Playing => "playing",
            PlaybackState::Looping => "looping",
        };
        f.write_str(name)
    }
}

/// Snapshot published after every engine change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Clip currently visible on the front layer
    pub active: Option<String>,
    /// Clip being loaded or faded in
    pub pending: Option<String>,
    pub front: Layer,
    pub queue_len: usize,
    pub looping: bool,
    pub paused: bool,
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self {
            state: PlaybackState::Idle,
            active: None,
            pending: None,
            front: Layer::A,
            queue_len: 0,
            looping: false,
            paused: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    StateChanged {
        state: PlaybackState,
        key: Option<String>,
    },
    /// Cross-fade finished and the clip is now on the front layer
    Started { key: String, looping: bool },
    Completed { key: String },
    Failed { key: String, reason: String },
    /// Replaced or discarded before completing
    Superseded { key: String },
}

/// Completion handle for one play request.
///
/// Resolves to `true` when the clip plays to its natural end and `false`
/// when it is superseded, stopped, cleared or fails to load. A looping clip
/// only ever resolves to `false`.
#[derive(Debug)]
pub struct PlaybackTicket {
    id: Uuid,
    key: String,
    done: oneshot::Receiver<()>,
}

impl PlaybackTicket {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn completed(self) -> bool {
        self.done.await.is_ok()
    }
}

struct Request {
    id: Uuid,
    key: String,
    path: String,
    looping: bool,
    done: oneshot::Sender<()>,
}

enum Command {
    Play(Request),
    Stop(oneshot::Sender<()>),
    ClipEnded(Layer),
    Pause,
    Resume,
    ClearQueue,
    SetCrossfade(Duration),
    Shutdown,
}

/// Cloneable handle to the engine task
#[derive(Clone)]
pub struct AnimationEngine {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,
    registry: Arc<RwLock<AnimationRegistry>>,
}

impl AnimationEngine {
    /// Spawn the engine task on the current tokio runtime
    pub fn spawn(
        surface: Arc<dyn RenderSurface>,
        registry: AnimationRegistry,
        config: PlaybackConfig,
    ) -> Result<Self, AvatarError> {
        config.validate().map_err(AvatarError::Config)?;

        let (command_tx, command_rx) = mpsc::channel(config.command_buffer);
        let (status_tx, status_rx) = watch::channel(PlaybackStatus::default());
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);

        info!(surface = surface.surface_name(), "Animation engine starting");
        let actor = EngineActor {
            surface,
            commands: command_rx,
            status: status_tx,
            events: event_tx.clone(),
            crossfade: config.crossfade(),
            fade_steps: config.fade_steps.max(1),
            load_timeout: config.load_timeout(),
            state: PlaybackState::Idle,
            front: Layer::A,
            active: None,
            pending: None,
            queue: VecDeque::new(),
            transition: None,
            paused: false,
        };
        tokio::spawn(actor.run());

        Ok(Self {
            commands: command_tx,
            status: status_rx,
            events: event_tx,
            registry: Arc::new(RwLock::new(registry)),
        })
    }

    async fn send(&self, command: Command) -> Result<(), AvatarError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| AvatarError::EngineClosed)
    }

    /// Request a clip by registered name or asset path.
    ///
    /// Unknown keys are rejected here and never reach the queue.
    pub async fn play(&self, key: &str, looping: bool) -> Result<PlaybackTicket, AvatarError> {
        let path = self.registry.read().resolve(key)?;
        let (done_tx, done_rx) = oneshot::channel();
        let id = Uuid::new_v4();
        self.send(Command::Play(Request {
            id,
            key: key.to_string(),
            path,
            looping,
            done: done_tx,
        }))
        .await?;
        Ok(PlaybackTicket {
            id,
            key: key.to_string(),
            done: done_rx,
        })
    }

    /// Pause both layers, discard the queue and return to idle.
    /// Safe to call repeatedly.
    pub async fn stop(&self) -> Result<(), AvatarError> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.send(Command::Stop(ack_tx)).await?;
        ack_rx.await.map_err(|_| AvatarError::EngineClosed)
    }

    /// Report natural end of the clip on `layer`
    pub async fn clip_ended(&self, layer: Layer) -> Result<(), AvatarError> {
        self.send(Command::ClipEnded(layer)).await
    }

    pub async fn pause(&self) -> Result<(), AvatarError> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> Result<(), AvatarError> {
        self.send(Command::Resume).await
    }

    pub async fn clear_queue(&self) -> Result<(), AvatarError> {
        self.send(Command::ClearQueue).await
    }

    /// Applies from the next cross-fade on
    pub async fn set_crossfade_duration(&self, duration: Duration) -> Result<(), AvatarError> {
        self.send(Command::SetCrossfade(duration)).await
    }

    pub async fn shutdown(&self) -> Result<(), AvatarError> {
        self.send(Command::Shutdown).await
    }

    pub fn register_animation(&self, name: &str, path: &str) -> Result<(), AvatarError> {
        self.registry.write().register(name, path)?;
        Ok(())
    }

    pub fn resolve(&self, key: &str) -> Result<String, AvatarError> {
        Ok(self.registry.read().resolve(key)?)
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status.borrow().clone()
    }

    pub fn state(&self) -> PlaybackState {
        self.status.borrow().state
    }

    pub fn subscribe_status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status.clone()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

struct ActiveClip {
    key: String,
    looping: bool,
    done: Option<oneshot::Sender<()>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Loading,
    Fading,
}

struct Transition {
    stage: Stage,
    layer: Layer,
    work: BoxFuture<'static, Result<(), AvatarError>>,
}

struct EngineActor {
    surface: Arc<dyn RenderSurface>,
    commands: mpsc::Receiver<Command>,
    status: watch::Sender<PlaybackStatus>,
    events: broadcast::Sender<PlaybackEvent>,
    crossfade: Duration,
    fade_steps: u32,
    load_timeout: Duration,
    state: PlaybackState,
    front: Layer,
    active: Option<ActiveClip>,
    pending: Option<Request>,
    queue: VecDeque<Request>,
    transition: Option<Transition>,
    paused: bool,
}

async fn next_outcome(transition: &mut Option<Transition>) -> Result<(), AvatarError> {
    match transition {
        Some(transition) => (&mut transition.work).await,
        None => std::future::pending().await,
    }
}

impl EngineActor {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Shutdown) | None => break,
                        Some(command) => self.handle(command).await,
                    }
                }
                outcome = next_outcome(&mut self.transition), if self.transition.is_some() => {
                    self.on_transition_done(outcome).await;
                }
            }
        }
        self.halt().await;
        info!("Animation engine stopped");
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Play(request) => self.on_play(request),
            Command::Stop(ack) => {
                self.halt().await;
                let _ = ack.send(());
            }
            Command::ClipEnded(layer) => self.on_clip_ended(layer),
            Command::Pause => {
                if self.active.is_some() && !self.paused {
                    if let Err(e) = self.surface.pause(self.front).await {
                        warn!("Failed to pause layer {:?}: {}", self.front, e);
                    }
                    self.paused = true;
                    self.publish();
                }
            }
            Command::Resume => {
                if let (Some(active), true) = (&self.active, self.paused) {
                    if let Err(e) = self.surface.play(self.front, active.looping).await {
                        warn!("Failed to resume layer {:?}: {}", self.front, e);
                    }
                    self.paused = false;
                    self.publish();
                }
            }
            Command::ClearQueue => {
                for request in self.queue.drain(..) {
                    let _ = self.events.send(PlaybackEvent::Superseded { key: request.key });
                }
                self.publish();
            }
            Command::SetCrossfade(duration) => {
                debug!(ms = duration.as_millis() as u64, "Cross-fade duration updated");
                self.crossfade = duration;
            }
            Command::Shutdown => {}
        }
    }

    fn on_play(&mut self, request: Request) {
        let busy = matches!(self.state, PlaybackState::Loading | PlaybackState::CrossFading);
        if busy || !self.queue.is_empty() {
            debug!(key = %request.key, state = %self.state, "Queueing animation request");
            self.queue.push_back(request);
            self.publish();
        } else {
            self.begin(request);
        }
    }

    /// Start loading `request` on the hidden layer
    fn begin(&mut self, request: Request) {
        let layer = self.front.other();
        let surface = Arc::clone(&self.surface);
        let path = request.path.clone();
        let timeout = self.load_timeout;

        let work: BoxFuture<'static, Result<(), AvatarError>> = Box::pin(async move {
            surface.set_opacity(layer, 0.0).await?;
            match tokio::time::timeout(timeout, surface.load_asset(layer, &path)).await {
                Ok(result) => result,
                Err(_) => Err(AvatarError::Timeout(format!(
                    "loading {} exceeded {} ms",
                    path,
                    timeout.as_millis()
                ))),
            }
        });

        debug!(key = %request.key, ?layer, "Loading animation");
        self.transition = Some(Transition {
            stage: Stage::Loading,
            layer,
            work,
        });
        self.pending = Some(request);
        self.set_state(PlaybackState::Loading);
    }

    fn start_fade(&mut self, layer: Layer, looping: bool) {
        let surface = Arc::clone(&self.surface);
        let outgoing = self.front;
        let steps = self.fade_steps;
        let step = self.crossfade / steps;

        let work: BoxFuture<'static, Result<(), AvatarError>> = Box::pin(async move {
            surface.play(layer, looping).await?;
            for i in 1..=steps {
                if !step.is_zero() {
                    tokio::time::sleep(step).await;
                }
                let t = i as f32 / steps as f32;
                surface.set_opacity(layer, t).await?;
                surface.set_opacity(outgoing, 1.0 - t).await?;
            }
            Ok(())
        });

        self.transition = Some(Transition {
            stage: Stage::Fading,
            layer,
            work,
        });
        self.set_state(PlaybackState::CrossFading);
    }

    async fn on_transition_done(&mut self, outcome: Result<(), AvatarError>) {
        let Some(transition) = self.transition.take() else {
            return;
        };

        if let Err(e) = outcome {
            self.on_transition_failed(transition.layer, e).await;
            return;
        }

        match transition.stage {
            Stage::Loading => {
                let looping = self.pending.as_ref().map_or(false, |r| r.looping);
                self.start_fade(transition.layer, looping);
            }
            Stage::Fading => self.finish_fade(transition.layer).await,
        }
    }

    async fn finish_fade(&mut self, layer: Layer) {
        let Some(request) = self.pending.take() else {
            self.set_state(PlaybackState::Idle);
            return;
        };

        let old_front = self.front;
        self.front = layer;
        // the old front may still hold the last frame of an ended or stopped clip
        if let Err(e) = self.surface.pause(old_front).await {
            warn!("Failed to pause layer {:?}: {}", old_front, e);
        }
        if let Err(e) = self.surface.set_opacity(old_front, 0.0).await {
            warn!("Failed to hide layer {:?}: {}", old_front, e);
        }
        if let Some(previous) = self.active.take() {
            debug!(key = %previous.key, "Animation superseded");
            let _ = self.events.send(PlaybackEvent::Superseded { key: previous.key });
        }

        let looping = request.looping;
        let key = request.key.clone();
        debug!(key = %key, id = %request.id, looping, "Animation on front layer");
        self.active = Some(ActiveClip {
            key: request.key,
            looping,
            done: Some(request.done),
        });
        self.paused = false;
        let _ = self.events.send(PlaybackEvent::Started { key, looping });
        self.set_state(if looping {
            PlaybackState::Looping
        } else {
            PlaybackState::Playing
        });

        // a looping clip never ends on its own, so waiting requests go next
        if looping {
            self.start_next();
        }
    }

    async fn on_transition_failed(&mut self, layer: Layer, error: AvatarError) {
        let key = self.pending.as_ref().map(|r| r.key.clone()).unwrap_or_default();
        warn!(key = %key, "Animation failed to start: {}", error);

        if let Err(e) = self.surface.pause(layer).await {
            debug!("Failed to pause layer {:?} after error: {}", layer, e);
        }
        if let Err(e) = self.surface.set_opacity(layer, 0.0).await {
            debug!("Failed to hide layer {:?} after error: {}", layer, e);
        }
        if let Err(e) = self.surface.set_opacity(self.front, 1.0).await {
            debug!("Failed to restore layer {:?}: {}", self.front, e);
        }

        // dropping the request resolves its ticket as not completed
        self.pending = None;
        let _ = self.events.send(PlaybackEvent::Failed {
            key,
            reason: error.to_string(),
        });

        self.settle();
        if self.state != PlaybackState::Playing {
            self.start_next();
        }
    }

    fn on_clip_ended(&mut self, layer: Layer) {
        if layer != self.front {
            return;
        }
        let ended = match &self.active {
            Some(active) if !active.looping => true,
            _ => false,
        };
        if !ended {
            return;
        }

        if let Some(mut active) = self.active.take() {
            if let Some(done) = active.done.take() {
                let _ = done.send(());
            }
            debug!(key = %active.key, "Animation completed");
            let _ = self.events.send(PlaybackEvent::Completed { key: active.key });
        }

        if self.state == PlaybackState::Playing {
            self.set_state(PlaybackState::Idle);
            self.start_next();
        }
    }

    /// State after a transition ends without a new clip
    fn settle(&mut self) {
        let state = match &self.active {
            Some(active) if active.looping => PlaybackState::Looping,
            Some(_) => PlaybackState::Playing,
            None => PlaybackState::Idle,
        };
        self.set_state(state);
    }

    fn start_next(&mut self) {
        if self.transition.is_some() {
            return;
        }
        if let Some(next) = self.queue.pop_front() {
            self.begin(next);
        }
    }

    async fn halt(&mut self) {
        self.transition = None;
        let dropped = self.queue.len() + usize::from(self.pending.is_some());
        self.pending = None;
        self.queue.clear();

        if let Some(active) = self.active.take() {
            let _ = self.events.send(PlaybackEvent::Superseded { key: active.key });
        }
        for layer in [Layer::A, Layer::B] {
            if let Err(e) = self.surface.pause(layer).await {
                warn!("Failed to pause layer {:?}: {}", layer, e);
            }
        }
        // an interrupted fade leaves both layers partly visible
        for (layer, opacity) in [(self.front, 1.0), (self.front.other(), 0.0)] {
            if let Err(e) = self.surface.set_opacity(layer, opacity).await {
                warn!("Failed to reset opacity of layer {:?}: {}", layer, e);
            }
        }
        if dropped > 0 {
            debug!(dropped, "Discarded pending animation requests");
        }
        self.paused = false;
        self.set_state(PlaybackState::Idle);
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Playback transition");
            self.state = state;
            let key = match state {
                PlaybackState::Loading | PlaybackState::CrossFading => {
                    self.pending.as_ref().map(|r| r.key.clone())
                }
                _ => self.active.as_ref().map(|a| a.key.clone()),
            };
            let _ = self.events.send(PlaybackEvent::StateChanged { state, key });
        }
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(PlaybackStatus {
            state: self.state,
            active: self.active.as_ref().map(|a| a.key.clone()),
            pending: self.pending.as_ref().map(|r| r.key.clone()),
            front: self.front,
            queue_len: self.queue.len(),
            looping: self.active.as_ref().map_or(false, |a| a.looping),
            paused: self.paused,
        });
    }
}
