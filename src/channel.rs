//! Typed capability interface a layer needs from the tier beneath it.
//!
//! Replaces the source's runtime check that the lower-tier object merely
//! "has send/receive methods" with a trait bound (§9 Design Notes).

use async_trait::async_trait;

#[async_trait]
pub trait ByteChannel: Send + Sync {
    fn send(&self, bytes: Vec<u8>) -> bool;
    async fn receive(&self) -> Option<Vec<u8>>;
}

#[async_trait]
impl ByteChannel for crate::datalink::DataLinkManager {
    fn send(&self, bytes: Vec<u8>) -> bool {
        crate::datalink::DataLinkManager::send(self, bytes)
    }

    async fn receive(&self) -> Option<Vec<u8>> {
        crate::datalink::DataLinkManager::receive(self).await
    }
}
