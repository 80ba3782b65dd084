//! Shared helpers for bella-me integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use bella_me::{AnimationEngine, AvatarError, Layer, PlaybackStatus, RenderSurface};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Load(Layer, String),
    Opacity(Layer, f32),
    Play(Layer, bool),
    Pause(Layer),
}

/// Surface that records every command and can fail or stall chosen assets
#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    failing: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    load_delay: Option<Duration>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            load_delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn fail_on(&self, path: &str) {
        self.failing.lock().insert(path.to_string());
    }

    /// Loads of `path` never resolve
    pub fn hang_on(&self, path: &str) {
        self.hanging.lock().insert(path.to_string());
    }

    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().clone()
    }

    pub fn loaded_paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                SurfaceCall::Load(_, path) => Some(path.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl RenderSurface for RecordingSurface {
    async fn load_asset(&self, layer: Layer, path: &str) -> Result<(), AvatarError> {
        self.calls.lock().push(SurfaceCall::Load(layer, path.to_string()));
        if let Some(delay) = self.load_delay {
            tokio::time::sleep(delay).await;
        }
        let hang = self.hanging.lock().contains(path);
        if hang {
            std::future::pending::<()>().await;
        }
        let fail = self.failing.lock().contains(path);
        if fail {
            return Err(AvatarError::AssetLoad(format!("cannot decode {}", path)));
        }
        Ok(())
    }

    async fn set_opacity(&self, layer: Layer, opacity: f32) -> Result<(), AvatarError> {
        self.calls.lock().push(SurfaceCall::Opacity(layer, opacity));
        Ok(())
    }

    async fn play(&self, layer: Layer, looping: bool) -> Result<(), AvatarError> {
        self.calls.lock().push(SurfaceCall::Play(layer, looping));
        Ok(())
    }

    async fn pause(&self, layer: Layer) -> Result<(), AvatarError> {
        self.calls.lock().push(SurfaceCall::Pause(layer));
        Ok(())
    }

    fn surface_name(&self) -> &str {
        "recording"
    }
}

/// Asset path the default registry assigns to `name`
pub fn clip(name: &str) -> String {
    format!("/bella/videos/{}.mp4", name)
}

/// Wait until the engine status satisfies `predicate`
pub async fn wait_for_status<F>(engine: &AnimationEngine, predicate: F) -> PlaybackStatus
where
    F: FnMut(&PlaybackStatus) -> bool,
{
    let mut status = engine.subscribe_status();
    let result = tokio::time::timeout(Duration::from_secs(60), status.wait_for(predicate))
        .await
        .expect("timed out waiting for playback status");
    let current = result.expect("engine closed").clone();
    current
}

/// Everything buffered on a broadcast receiver
pub fn drain<T: Clone>(receiver: &mut broadcast::Receiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = receiver.try_recv() {
        items.push(item);
    }
    items
}

/// Wait for the first avatar event matching `predicate`
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<bella_me::AvatarEvent>,
    mut predicate: F,
) -> bella_me::AvatarEvent
where
    F: FnMut(&bella_me::AvatarEvent) -> bool,
{
    let search = async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event stream closed"),
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(60), search)
        .await
        .expect("timed out waiting for avatar event")
}

/// Config with a fixed gesture seed
pub fn seeded_config() -> bella_me::AvatarConfig {
    let mut config = bella_me::AvatarConfig::default();
    config.gestures.seed = Some(42);
    config
}

/// Loud 440 Hz tone
pub fn tone(samples: usize, sample_rate: u32) -> Vec<f32> {
    (0..samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            0.5 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

/// Let non-looping clips end until `key` is looping on the front layer
pub async fn settle_into(engine: &AnimationEngine, key: &str) -> PlaybackStatus {
    loop {
        let status = wait_for_status(engine, |s| {
            s.pending.is_none()
                && matches!(
                    s.state,
                    bella_me::PlaybackState::Playing | bella_me::PlaybackState::Looping
                )
        })
        .await;
        if status.state == bella_me::PlaybackState::Looping && status.active.as_deref() == Some(key) {
            return status;
        }
        if status.state == bella_me::PlaybackState::Playing {
            engine.clip_ended(status.front).await.expect("engine closed");
        }
        tokio::task::yield_now().await;
    }
}
