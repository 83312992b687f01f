//! DataLink tier: raw byte transport, one concrete backend per instance, §4.1.

pub mod queue;
pub mod uart;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;

pub use queue::QueueBackend;
pub use uart::UartBackend;

const CHANNEL_CAPACITY: usize = 256;

/// Capability interface a concrete byte transport must satisfy. Replaces
/// the source's runtime duck-typing with a typed trait (§9 Design Notes).
#[async_trait]
pub trait DataLinkBackend: Send + Sync {
    /// Non-blocking send; `false` signals transient back-pressure.
    async fn send(&mut self, bytes: Vec<u8>) -> bool;
    /// Non-blocking receive; `None` when nothing is available.
    async fn receive(&mut self) -> Option<Vec<u8>>;
    async fn stop(&mut self);
}

/// Wraps a [`DataLinkBackend`] and owns the two background workers that
/// copy between it and the manager's own inbound/outbound queues, so upper
/// tiers see only queues (§4.1).
pub struct DataLinkManager {
    outbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    run: RunFlag,
    inbound_worker: tokio::task::JoinHandle<()>,
    outbound_worker: tokio::task::JoinHandle<()>,
}

impl DataLinkManager {
    pub fn new(backend: Box<dyn DataLinkBackend>) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let run = RunFlag::new();
        let backend = Arc::new(Mutex::new(backend));
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let inbound_worker = {
            let backend = backend.clone();
            let inbound_tx = inbound_tx.clone();
            spawn_worker(run.clone(), move || {
                let backend = backend.clone();
                let inbound_tx = inbound_tx.clone();
                pump_step!({
                    match backend.lock().await.receive().await {
                        Some(bytes) => inbound_tx.send(bytes).await.is_ok(),
                        None => false,
                    }
                })
            })
        };

        let outbound_worker = {
            let backend = backend.clone();
            let outbound_rx = outbound_rx.clone();
            spawn_worker(run.clone(), move || {
                let backend = backend.clone();
                let outbound_rx = outbound_rx.clone();
                pump_step!({
                    let item = outbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some(bytes) => {
                            backend.lock().await.send(bytes).await;
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        DataLinkManager {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            run,
            inbound_worker,
            outbound_worker,
        }
    }

    /// Enqueues `bytes` for the outbound worker. Rejects non-byte inputs at
    /// the type level rather than at runtime, per §4.1.
    pub fn send(&self, bytes: Vec<u8>) -> bool {
        self.outbound_tx.try_send(bytes).is_ok()
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
