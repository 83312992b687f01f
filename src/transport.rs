//! Transport tier: re-frames the Network layer's DEVICE traffic with a
//! parallel endpoint enumeration, fusing it into one inbound stream for the
//! Top layer's device connection, §4.3.
//!
//! The Network-layer socket helpers the original implementation carries
//! alongside this tier are ancillary and stay out of core scope here too.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::address::{Endpoint, TransportEndpoint};
use crate::framing;
use crate::network::NetworkLayer;
use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;

const CHANNEL_CAPACITY: usize = 256;

/// Capability interface Transport needs from the layer beneath it: just the
/// Network layer's DEVICE-tagged channel.
#[async_trait]
pub trait NetworkDeviceChannel: Send + Sync {
    async fn receive_device(&self) -> Option<Vec<u8>>;
    fn send_device(&self, bytes: Vec<u8>) -> bool;
}

#[async_trait]
impl NetworkDeviceChannel for NetworkLayer {
    async fn receive_device(&self) -> Option<Vec<u8>> {
        self.receive(Endpoint::Device).await
    }

    fn send_device(&self, bytes: Vec<u8>) -> bool {
        self.send(Endpoint::Device, bytes)
    }
}

pub struct TransportLayer {
    outbound_tx: mpsc::Sender<(TransportEndpoint, Vec<u8>)>,
    inbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    run: RunFlag,
    inbound_worker: tokio::task::JoinHandle<()>,
    outbound_worker: tokio::task::JoinHandle<()>,
}

impl TransportLayer {
    pub fn new<L: NetworkDeviceChannel + 'static>(lower: Arc<L>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<(TransportEndpoint, Vec<u8>)>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = RunFlag::new();
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let inbound_worker = {
            let lower = lower.clone();
            spawn_worker(run.clone(), move || {
                let lower = lower.clone();
                let inbound_tx = inbound_tx.clone();
                pump_step!({
                    match lower.receive_device().await {
                        Some(block) => {
                            match framing::decode(&block) {
                                Some(decoded) if TransportEndpoint::from_wire_tag(decoded.tag).is_some() => {
                                    let _ = inbound_tx.send(decoded.payload.to_vec()).await;
                                }
                                Some(decoded) => {
                                    debug!(tag = decoded.tag, "transport: unknown endpoint tag, dropping")
                                }
                                None => debug!("transport: under-length frame, dropping"),
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
                            if let Ok(frame) = framing::encode(destination.wire_tag(), &body) {
                                lower.send_device(frame);
                            }
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        TransportLayer {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            run,
            inbound_worker,
            outbound_worker,
        }
    }

    pub fn send(&self, destination: TransportEndpoint, body: Vec<u8>) -> bool {
        self.outbound_tx.try_send((destination, body)).is_ok()
    }

    pub async fn receive(&self) -> Option<Vec<u8>> {
        self.inbound_rx.lock().await.try_recv().ok()
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
    async fn unwraps_device_tagged_frames_into_a_single_inbound_stream() {
        let (near, far) = QueueBackend::pair();
        let datalink = Arc::new(DataLinkManager::new(Box::new(near)));
        let network = Arc::new(NetworkLayer::new(datalink));
        let transport = TransportLayer::new(network);

        let network_frame = framing::encode(Endpoint::Device.wire_tag().unwrap(), &{
            framing::encode(TransportEndpoint::Device.wire_tag(), b"device says hi").unwrap()
        })
        .unwrap();

        let mut far = far;
        far.send(network_frame).await;

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(transport.receive().await, Some(b"device says hi".to_vec()));
    }
}
