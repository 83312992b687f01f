//! Device connection: a thin adapter over Transport's send/receive, with
//! its own pair of FIFO queues and worker threads mirroring the structure
//! of the lower tiers, §4.4.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};

use super::ConnectionStatus;
use crate::address::TransportEndpoint;
use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;
use crate::transport::TransportLayer;

const CHANNEL_CAPACITY: usize = 256;

pub struct DeviceConnection {
    outbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    run: RunFlag,
    inbound_worker: tokio::task::JoinHandle<()>,
    outbound_worker: tokio::task::JoinHandle<()>,
}

impl DeviceConnection {
    pub fn new(transport: Arc<TransportLayer>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = RunFlag::new();
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let inbound_worker = {
            let transport = transport.clone();
            spawn_worker(run.clone(), move || {
                let transport = transport.clone();
                let inbound_tx = inbound_tx.clone();
                pump_step!({
                    match transport.receive().await {
                        Some(body) => inbound_tx.send(body).await.is_ok(),
                        None => false,
                    }
                })
            })
        };

        let outbound_worker = {
            let transport = transport.clone();
            let outbound_rx = outbound_rx.clone();
            spawn_worker(run.clone(), move || {
                let transport = transport.clone();
                let outbound_rx = outbound_rx.clone();
                pump_step!({
                    let item = outbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some(body) => {
                            transport.send(TransportEndpoint::Device, body);
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        DeviceConnection {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            run,
            inbound_worker,
            outbound_worker,
        }
    }

    /// A queue-backed device connection, always ready, for tests and the
    /// demonstration binary's in-process wiring.
    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::Success
    }

    pub fn send(&self, body: Vec<u8>) -> bool {
        self.outbound_tx.try_send(body).is_ok()
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
