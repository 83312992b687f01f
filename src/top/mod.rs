//! Top / Connection multiplexer: owns the three per-endpoint connection
//! objects and exposes a single send/receive surface to the processor,
//! §4.4.

pub mod device;
pub mod platform;
pub mod uhost;

use tracing::warn;

pub use device::DeviceConnection;
pub use platform::PlatformConnection;
pub use uhost::{InMemoryBroker, MessagingClient, UhostConnection};

use crate::address::Endpoint;

/// Connection status gating outbound routing, §4.4: frames addressed to a
/// connection not in `Success` are dropped and logged rather than queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Success,
    Failed,
}

pub struct TopLayer {
    pub device: DeviceConnection,
    pub uhost: UhostConnection,
    pub platform: PlatformConnection,
}

impl TopLayer {
    pub fn new(device: DeviceConnection, uhost: UhostConnection, platform: PlatformConnection) -> Self {
        TopLayer {
            device,
            uhost,
            platform,
        }
    }

    /// Dispatches to the connection selected by `destination`. Drops (with
    /// a warning log) when that connection is not in `Success` state.
    pub fn send(&self, destination: Endpoint, body: Vec<u8>) -> bool {
        let (status, sent) = match destination {
            Endpoint::Device => (self.device.status(), self.device.send(body)),
            Endpoint::Uhost => (self.uhost.status(), self.uhost.send(body)),
            Endpoint::Platform => (self.platform.status(), self.platform.send(body)),
            Endpoint::Utim => return false,
        };
        if status != ConnectionStatus::Success {
            warn!(endpoint = %destination, "top: dropping frame, connection not in SUCCESS state");
            return false;
        }
        sent
    }

    /// Polls every active connection in turn, stamping the endpoint tag.
    pub async fn receive(&self) -> Option<(Endpoint, Vec<u8>)> {
        if let Some(body) = self.device.receive().await {
            return Some((Endpoint::Device, body));
        }
        if let Some(body) = self.uhost.receive().await {
            return Some((Endpoint::Uhost, body));
        }
        if let Some(body) = self.platform.receive().await {
            return Some((Endpoint::Platform, body));
        }
        None
    }
}
