//! Connectivity oracle driven by the host application.

use async_trait::async_trait;
use courier_core::ConnectivityOracle;
use courier_domain::LinkQuality;
use parking_lot::RwLock;
use tracing::info;

/// Oracle whose state is pushed in by platform callbacks (network reachability
/// notifications, an app-level "offline mode" switch, and so on).
///
/// Starts online with [`LinkQuality::Unknown`].
#[derive(Debug)]
pub struct ManualConnectivity {
    state: RwLock<LinkState>,
}

#[derive(Debug, Clone, Copy)]
struct LinkState {
    online: bool,
    quality: LinkQuality,
}

impl Default for ManualConnectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let quality = if online { LinkQuality::Unknown } else { LinkQuality::Offline };
        Self { state: RwLock::new(LinkState { online, quality }) }
    }

    /// Flip reachability. Going offline forces quality to `Offline`; coming
    /// back online resets it to `Unknown` until a measurement arrives.
    pub fn set_online(&self, online: bool) {
        let mut state = self.state.write();
        if state.online == online {
            return;
        }
        state.online = online;
        state.quality = if online { LinkQuality::Unknown } else { LinkQuality::Offline };
        info!(online, "connectivity changed");
    }

    /// Record a quality measurement. `Offline` also marks the link down.
    pub fn set_quality(&self, quality: LinkQuality) {
        let mut state = self.state.write();
        state.quality = quality;
        state.online = quality != LinkQuality::Offline;
    }
}

#[async_trait]
impl ConnectivityOracle for ManualConnectivity {
    async fn is_online(&self) -> bool {
        self.state.read().online
    }

    async fn quality(&self) -> LinkQuality {
        self.state.read().quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_defaults_to_online_unknown() {
        let oracle = ManualConnectivity::default();
        assert!(oracle.is_online().await);
        assert_eq!(oracle.quality().await, LinkQuality::Unknown);
    }

    #[tokio::test]
    async fn test_offline_transitions() {
        let oracle = ManualConnectivity::new(true);
        oracle.set_quality(LinkQuality::Good);

        oracle.set_online(false);
        assert!(!oracle.is_online().await);
        assert_eq!(oracle.quality().await, LinkQuality::Offline);

        oracle.set_online(true);
        assert_eq!(oracle.quality().await, LinkQuality::Unknown);

        oracle.set_quality(LinkQuality::Offline);
        assert!(!oracle.is_online().await);

        oracle.set_quality(LinkQuality::Poor);
        assert!(oracle.is_online().await);
    }
}
