//! Uhost connection: wraps a brokered messaging client (MQTT or AMQP,
//! selected by configuration) behind a capability trait. No broker wire
//! protocol is implemented in this crate (§1 Out of scope) — only the
//! interface and the reconnect/pacing shape the design specifies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};

use super::ConnectionStatus;
use crate::error::UtimError;
use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;

const CHANNEL_CAPACITY: usize = 256;
/// Pace between publish batches, matching the publisher's 1-second
/// broker-flooding guard, §5.
const PUBLISH_PACE: Duration = Duration::from_secs(1);

/// Capability interface for a brokered messaging client. `subscribe`
/// is called once at connection time; `publish`/`next_message` drive the
/// background publisher/subscriber workers.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<(), UtimError>;
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), UtimError>;
    async fn next_message(&self, topic: &str) -> Option<Vec<u8>>;
}

/// In-memory broker stand-in used by tests and the demonstration binary in
/// place of a live MQTT/AMQP client library: topic name to a FIFO of
/// pending messages.
#[derive(Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, mpsc::Receiver<Vec<u8>>>>,
    senders: Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(InMemoryBroker::default())
    }

    async fn sender_for(&self, topic: &str) -> mpsc::Sender<Vec<u8>> {
        let mut topics = self.topics.lock().await;
        let mut senders = self.senders.lock().await;
        if let Some(tx) = senders.get(topic) {
            return tx.clone();
        }
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        topics.insert(topic.to_string(), rx);
        senders.insert(topic.to_string(), tx.clone());
        tx
    }

    /// Test/demo helper: inject a message as if published by a peer.
    pub async fn inject(&self, topic: &str, payload: Vec<u8>) {
        let tx = self.sender_for(topic).await;
        let _ = tx.send(payload).await;
    }
}

#[async_trait]
impl MessagingClient for InMemoryBroker {
    async fn subscribe(&self, topic: &str) -> Result<(), UtimError> {
        let _ = self.sender_for(topic).await;
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), UtimError> {
        let tx = self.sender_for(topic).await;
        tx.send(payload)
            .await
            .map_err(|_| UtimError::Connection {
                endpoint: "UHOST",
                message: format!("broker topic '{topic}' closed"),
            })
    }

    async fn next_message(&self, topic: &str) -> Option<Vec<u8>> {
        let mut topics = self.topics.lock().await;
        match topics.get_mut(topic) {
            Some(rx) => rx.try_recv().ok(),
            None => None,
        }
    }
}

pub struct UhostConnection {
    outbound_tx: mpsc::Sender<Vec<u8>>,
    inbound_rx: Mutex<mpsc::Receiver<Vec<u8>>>,
    status: Arc<Mutex<ConnectionStatus>>,
    run: RunFlag,
    inbound_worker: tokio::task::JoinHandle<()>,
    outbound_worker: tokio::task::JoinHandle<()>,
}

impl UhostConnection {
    /// Connects by subscribing to the topic/queue named by `utim_name`;
    /// publishes go to the topic named after `uhost_name`. Reflects §4.4's
    /// "subscribe to utim_name, publish to uhost_name" binding.
    pub async fn connect<C: MessagingClient + 'static>(
        client: Arc<C>,
        utim_name: String,
        uhost_name: String,
    ) -> Result<Self, UtimError> {
        let status = Arc::new(Mutex::new(ConnectionStatus::Connecting));
        if let Err(err) = client.subscribe(&utim_name).await {
            *status.lock().await = ConnectionStatus::Failed;
            return Err(err);
        }
        *status.lock().await = ConnectionStatus::Success;

        let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(CHANNEL_CAPACITY);
        let (inbound_tx, inbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let run = RunFlag::new();
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let inbound_worker = {
            let client = client.clone();
            let utim_name = utim_name.clone();
            spawn_worker(run.clone(), move || {
                let client = client.clone();
                let utim_name = utim_name.clone();
                let inbound_tx = inbound_tx.clone();
                pump_step!({
                    match client.next_message(&utim_name).await {
                        Some(bytes) => inbound_tx.send(bytes).await.is_ok(),
                        None => false,
                    }
                })
            })
        };

        let outbound_worker = {
            let client = client.clone();
            let outbound_rx = outbound_rx.clone();
            let uhost_name = uhost_name.clone();
            spawn_worker(run.clone(), move || {
                let client = client.clone();
                let outbound_rx = outbound_rx.clone();
                let uhost_name = uhost_name.clone();
                pump_step!({
                    let item = outbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some(payload) => {
                            if let Err(err) = client.publish(&uhost_name, payload).await {
                                error!(%err, "uhost: publish failed");
                            }
                            tokio::time::sleep(PUBLISH_PACE).await;
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        info!(topic = %utim_name, "uhost: subscribed");

        Ok(UhostConnection {
            outbound_tx,
            inbound_rx: Mutex::new(inbound_rx),
            status,
            run,
            inbound_worker,
            outbound_worker,
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
            .try_lock()
            .map(|guard| *guard)
            .unwrap_or(ConnectionStatus::Connecting)
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
