//! Render-mode selection from performance and network profiles

use crate::config::AdaptiveConfig;
use crate::observer::{ObserverList, SubscriptionId};
use crate::performance::PerformanceEvent;
use crate::types::{NetworkProfile, PerformanceProfile, RenderMode};
use parking_lot::RwLock;
use tracing::info;

/// Decision table. A forced mode always wins.
pub fn resolve_mode(
    forced: Option<RenderMode>,
    performance: PerformanceProfile,
    network: NetworkProfile,
) -> RenderMode {
    if let Some(mode) = forced {
        return mode;
    }
    if network == NetworkProfile::Critical {
        return RenderMode::Video;
    }
    match performance {
        PerformanceProfile::Low => match network {
            NetworkProfile::Excellent | NetworkProfile::Good => RenderMode::Video,
            _ => RenderMode::ThreeD,
        },
        PerformanceProfile::Medium => RenderMode::Video,
        PerformanceProfile::High | PerformanceProfile::Ultra => match network {
            NetworkProfile::Poor => RenderMode::ThreeD,
            _ => RenderMode::Hybrid,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub previous: RenderMode,
    pub current: RenderMode,
    pub performance: PerformanceProfile,
    pub network: NetworkProfile,
    pub forced: bool,
}

#[derive(Debug, Clone, Copy)]
struct Inputs {
    performance: PerformanceProfile,
    network: NetworkProfile,
    forced: Option<RenderMode>,
    mode: RenderMode,
}

/// Holds the two profiles and the override; the mode is always recomputed
pub struct AdaptiveModeController {
    inputs: RwLock<Inputs>,
    observers: ObserverList<ModeChange>,
}

impl AdaptiveModeController {
    pub fn new(config: AdaptiveConfig) -> Self {
        let mode = resolve_mode(config.forced_mode, config.initial_performance, config.initial_network);
        Self {
            inputs: RwLock::new(Inputs {
                performance: config.initial_performance,
                network: config.initial_network,
                forced: config.forced_mode,
                mode,
            }),
            observers: ObserverList::new("adaptive-mode"),
        }
    }

    pub fn mode(&self) -> RenderMode {
        self.inputs.read().mode
    }

    pub fn performance_profile(&self) -> PerformanceProfile {
        self.inputs.read().performance
    }

    pub fn network_profile(&self) -> NetworkProfile {
        self.inputs.read().network
    }

    pub fn forced_mode(&self) -> Option<RenderMode> {
        self.inputs.read().forced
    }

    pub fn set_performance_profile(&self, profile: PerformanceProfile) -> Option<ModeChange> {
        self.update(|inputs| inputs.performance = profile)
    }

    pub fn set_network_profile(&self, profile: NetworkProfile) -> Option<ModeChange> {
        self.update(|inputs| inputs.network = profile)
    }

    /// `None` clears the override
    pub fn set_forced_mode(&self, mode: Option<RenderMode>) -> Option<ModeChange> {
        self.update(|inputs| inputs.forced = mode)
    }

    /// Follow profile changes reported by the performance sampler
    pub fn handle_performance_event(&self, event: &PerformanceEvent) -> Option<ModeChange> {
        match event {
            PerformanceEvent::ProfileChanged { current, .. } => self.set_performance_profile(*current),
            PerformanceEvent::Issues(_) => None,
        }
    }

    fn update<F: FnOnce(&mut Inputs)>(&self, apply: F) -> Option<ModeChange> {
        let change = {
            let mut inputs = self.inputs.write();
            apply(&mut inputs);
            let next = resolve_mode(inputs.forced, inputs.performance, inputs.network);
            if next == inputs.mode {
                None
            } else {
                let change = ModeChange {
                    previous: inputs.mode,
                    current: next,
                    performance: inputs.performance,
                    network: inputs.network,
                    forced: inputs.forced.is_some(),
                };
                inputs.mode = next;
                Some(change)
            }
        };

        if let Some(change) = &change {
            info!(
                from = %change.previous,
                to = %change.current,
                performance = ?change.performance,
                network = ?change.network,
                "Render mode changed"
            );
            self.observers.notify(change);
        }
        change
    }

    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ModeChange) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }
}

impl Default for AdaptiveModeController {
    fn default() -> Self {
        Self::new(AdaptiveConfig::default())
    }
}
