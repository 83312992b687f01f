//! Platform connection: structural stub only. No platform-facing transport
//! is implemented in this crate — PLATFORM-destined traffic has no peer to
//! reach, so this connection never leaves `Connecting`, §4.4/§4.5.3.

use super::ConnectionStatus;

pub struct PlatformConnection;

impl PlatformConnection {
    pub fn new() -> Self {
        PlatformConnection
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Connecting
    }

    pub fn send(&self, _body: Vec<u8>) -> bool {
        false
    }

    pub async fn receive(&self) -> Option<Vec<u8>> {
        None
    }
}

impl Default for PlatformConnection {
    fn default() -> Self {
        Self::new()
    }
}
