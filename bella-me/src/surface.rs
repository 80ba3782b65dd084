//! Render surface contract used by the playback engine

use crate::error::AvatarError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One of the two stacked video layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    A,
    B,
}

impl Layer {
    pub fn other(&self) -> Layer {
        match self {
            Layer::A => Layer::B,
            Layer::B => Layer::A,
        }
    }
}

/// Trait for render targets.
///
/// The engine never renders; it only issues these commands. End of a clip is
/// reported back through `AnimationEngine::clip_ended`.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    /// Prepare an asset on a layer; resolves once it can play
    async fn load_asset(&self, layer: Layer, path: &str) -> Result<(), AvatarError>;
    async fn set_opacity(&self, layer: Layer, opacity: f32) -> Result<(), AvatarError>;
    async fn play(&self, layer: Layer, looping: bool) -> Result<(), AvatarError>;
    async fn pause(&self, layer: Layer) -> Result<(), AvatarError>;
    fn surface_name(&self) -> &str;
}

/// Surface that accepts every command and only logs it
#[derive(Debug, Default, Clone)]
pub struct HeadlessSurface;

#[async_trait]
impl RenderSurface for HeadlessSurface {
    async fn load_asset(&self, layer: Layer, path: &str) -> Result<(), AvatarError> {
        debug!(?layer, path, "headless load");
        Ok(())
    }

    async fn set_opacity(&self, _layer: Layer, _opacity: f32) -> Result<(), AvatarError> {
        Ok(())
    }

    async fn play(&self, layer: Layer, looping: bool) -> Result<(), AvatarError> {
        debug!(?layer, looping, "headless play");
        Ok(())
    }

    async fn pause(&self, layer: Layer) -> Result<(), AvatarError> {
        debug!(?layer, "headless pause");
        Ok(())
    }

    fn surface_name(&self) -> &str {
        "headless"
    }
}
