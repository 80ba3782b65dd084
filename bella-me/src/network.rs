//! Network-quality probing feeding the adaptive mode controller

use crate::error::AvatarError;
use async_trait::async_trait;
use bella_core::{AdaptiveModeController, NetworkProfile};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Trait for network-quality sources
#[async_trait]
pub trait NetworkProbe: Send + Sync {
    async fn probe(&self) -> Result<NetworkProfile, AvatarError>;
    fn probe_name(&self) -> &str;
}

/// Bucket a measured round trip and loss rate into a profile
pub fn classify_network(round_trip: Duration, packet_loss: f32) -> NetworkProfile {
    let rtt = round_trip.as_millis();
    if packet_loss >= 0.1 || rtt >= 1000 {
        NetworkProfile::Critical
    } else if packet_loss >= 0.03 || rtt >= 300 {
        NetworkProfile::Poor
    } else if rtt >= 100 {
        NetworkProfile::Good
    } else {
        NetworkProfile::Excellent
    }
}

/// Poll `probe` every `interval` and push the result into `controller`.
///
/// Probe failures keep the last known profile. The task runs until aborted.
pub fn spawn_network_monitor(
    controller: Arc<AdaptiveModeController>,
    probe: Arc<dyn NetworkProbe>,
    interval: Duration,
) -> JoinHandle<()> {
    info!(probe = probe.probe_name(), "Network monitor starting");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match probe.probe().await {
                Ok(profile) => {
                    if let Some(change) = controller.set_network_profile(profile) {
                        debug!(?profile, mode = %change.current, "Network profile moved render mode");
                    }
                }
                Err(e) => warn!(probe = probe.probe_name(), "Network probe failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_network_buckets() {
        assert_eq!(classify_network(Duration::from_millis(40), 0.0), NetworkProfile::Excellent);
        assert_eq!(classify_network(Duration::from_millis(150), 0.01), NetworkProfile::Good);
        assert_eq!(classify_network(Duration::from_millis(150), 0.05), NetworkProfile::Poor);
        assert_eq!(classify_network(Duration::from_millis(2000), 0.0), NetworkProfile::Critical);
    }
}
