//! Network tier: TLV framing over a [`ByteChannel`], demultiplexed by
//! destination tag into DEVICE / UHOST / PLATFORM queues, §4.2.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::address::Endpoint;
use crate::channel::ByteChannel;
use crate::framing;
use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;

const CHANNEL_CAPACITY: usize = 256;

pub struct NetworkLayer {
    outbound_tx: mpsc::Sender<(Endpoint, Vec<u8>)>,
    device_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    uhost_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    platform_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    run: RunFlag,
    inbound_worker: tokio::task::JoinHandle<()>,
    outbound_worker: tokio::task::JoinHandle<()>,
}

impl NetworkLayer {
    pub fn new<L: ByteChannel + 'static>(lower: Arc<L>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<(Endpoint, Vec<u8>)>(CHANNEL_CAPACITY);
        let (device_tx, device_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (uhost_tx, uhost_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (platform_tx, platform_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = RunFlag::new();
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let inbound_worker = {
            let lower = lower.clone();
            spawn_worker(run.clone(), move || {
                let lower = lower.clone();
                let device_tx = device_tx.clone();
                let uhost_tx = uhost_tx.clone();
                let platform_tx = platform_tx.clone();
                pump_step!({
                    match lower.receive().await {
                        Some(block) => {
                            match framing::decode(&block) {
                                Some(decoded) => match Endpoint::from_wire_tag(decoded.tag) {
                                    Some(Endpoint::Device) => {
                                        let _ = device_tx.send(decoded.payload.to_vec()).await;
                                    }
                                    Some(Endpoint::Uhost) => {
                                        let _ = uhost_tx.send(decoded.payload.to_vec()).await;
                                    }
                                    Some(Endpoint::Platform) => {
                                        let _ = platform_tx.send(decoded.payload.to_vec()).await;
                                    }
                                    _ => debug!(tag = decoded.tag, "network: unknown endpoint tag, dropping"),
                                },
                                None => debug!("network: under-length frame, dropping"),
                            }
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        let outbound_worker = {
            let lower = lower.clone();
            let outbound_rx = outbound_rx.clone();
            spawn_worker(run.clone(), move || {
                let lower = lower.clone();
                let outbound_rx = outbound_rx.clone();
                pump_step!({
                    let item = outbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some((destination, body)) => {
                            if let Some(tag) = destination.wire_tag() {
                                if let Ok(frame) = framing::encode(tag, &body) {
                                    lower.send(frame);
                                }
                            }
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        NetworkLayer {
            outbound_tx,
            device_rx: Mutex::new(device_rx),
            uhost_rx: Mutex::new(uhost_rx),
            platform_rx: Mutex::new(platform_rx),
            run,
            inbound_worker,
            outbound_worker,
        }
    }

    pub fn send(&self, destination: Endpoint, body: Vec<u8>) -> bool {
        self.outbound_tx.try_send((destination, body)).is_ok()
    }

    pub async fn receive(&self, endpoint: Endpoint) -> Option<Vec<u8>> {
        match endpoint {
            Endpoint::Device => self.device_rx.lock().await.try_recv().ok(),
            Endpoint::Uhost => self.uhost_rx.lock().await.try_recv().ok(),
            Endpoint::Platform => self.platform_rx.lock().await.try_recv().ok(),
            Endpoint::Utim => None,
        }
    }

    pub async fn stop(self) {
        self.run.stop();
        let _ = self.inbound_worker.await;
        let _ = self.outbound_worker.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datalink::{DataLinkBackend, DataLinkManager, QueueBackend};

    #[tokio::test]
    async fn routes_inbound_frames_by_destination_tag() {
        let (near, far) = QueueBackend::pair();
        let lower = Arc::new(DataLinkManager::new(Box::new(near)));
        let network = NetworkLayer::new(lower);

        let mut far = far;
        let frame = framing::encode(Endpoint::Uhost.wire_tag().unwrap(), b"hello").unwrap();
        far.send(frame).await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(network.receive(Endpoint::Uhost).await, Some(b"hello".to_vec()));
        assert_eq!(network.receive(Endpoint::Device).await, None);
    }

    #[tokio::test]
    async fn frames_outbound_sends_with_destination_tag() {
        let (near, far) = QueueBackend::pair();
        let lower = Arc::new(DataLinkManager::new(Box::new(near)));
        let network = NetworkLayer::new(lower);

        assert!(network.send(Endpoint::Device, b"payload".to_vec()));

        let mut far = far;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        let received = far.receive().await.expect("frame should arrive at the far end");
        let decoded = framing::decode(&received).unwrap();
        assert_eq!(decoded.tag, Endpoint::Device.wire_tag().unwrap());
        assert_eq!(decoded.payload, b"payload");
    }
}
