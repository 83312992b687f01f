//! In-process queue-pair DataLink backend, used for testing and for
//! composing a UTIM entirely in-process without a physical transport.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::DataLinkBackend;

const CHANNEL_CAPACITY: usize = 256;

/// One half of an in-process byte-stream pair. `QueueBackend::pair()`
/// returns two instances wired tx-to-rx so that bytes sent on one side
/// appear on the other's `receive()`.
pub struct QueueBackend {
    tx: mpsc::Sender<Vec<u8>>,
    rx: mpsc::Receiver<Vec<u8>>,
}

impl QueueBackend {
    /// Builds two linked endpoints: `(near, far)`.
    pub fn pair() -> (QueueBackend, QueueBackend) {
        let (tx_a, rx_a) = mpsc::channel(CHANNEL_CAPACITY);
        let (tx_b, rx_b) = mpsc::channel(CHANNEL_CAPACITY);
        (QueueBackend { tx: tx_a, rx: rx_b }, QueueBackend { tx: tx_b, rx: rx_a })
    }
}

#[async_trait]
impl DataLinkBackend for QueueBackend {
    async fn send(&mut self, bytes: Vec<u8>) -> bool {
        self.tx.try_send(bytes).is_ok()
    }

    async fn receive(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }

    async fn stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pair_delivers_bytes_in_both_directions() {
        let (mut near, mut far) = QueueBackend::pair();

        assert!(near.send(vec![1, 2, 3]).await);
        assert_eq!(far.receive().await, Some(vec![1, 2, 3]));

        assert!(far.send(vec![9]).await);
        assert_eq!(near.receive().await, Some(vec![9]));
    }

    #[tokio::test]
    async fn receive_returns_none_when_empty() {
        let (_near, mut far) = QueueBackend::pair();
        assert_eq!(far.receive().await, None);
    }
}
