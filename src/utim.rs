//! The UTIM instance itself: wires DataLink → Network → Transport → Top →
//! Processor together and owns the session-state lifecycle, §3 Lifecycle.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use crate::address::{Endpoint, TransportEndpoint};
use crate::datalink::{DataLinkBackend, DataLinkManager};
use crate::error::UtimError;
use crate::framing;
use crate::network::NetworkLayer;
use crate::processor::{self, SessionState};
use crate::pump::{spawn_worker, RunFlag};
use crate::pump_step;
use crate::top::{DeviceConnection, MessagingClient, PlatformConnection, TopLayer, UhostConnection};
use crate::transport::TransportLayer;

const CHANNEL_CAPACITY: usize = 256;

/// A running UTIM instance. Construction wires the full stack and starts
/// the two bridging workers plus the processor worker (§5: "UTIM itself
/// runs two more [...]; the processor runs one").
pub struct Utim {
    top: Arc<TopLayer>,
    state: Arc<Mutex<SessionState>>,
    run: RunFlag,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

impl Utim {
    /// Wires the stack over `backend` (DataLink) and `uhost_client`
    /// (messaging client), and starts every worker. `master_key` must be
    /// present (a precondition for startup, §3).
    pub async fn connect<B, C>(
        backend: B,
        uhost_client: Arc<C>,
        utim_name: String,
        uhost_name: String,
        master_key: Vec<u8>,
    ) -> Result<Self, UtimError>
    where
        B: DataLinkBackend + 'static,
        C: MessagingClient + 'static,
    {
        let datalink = Arc::new(DataLinkManager::new(Box::new(backend)));
        let network = Arc::new(NetworkLayer::new(datalink));
        let transport = Arc::new(TransportLayer::new(network));
        let device = DeviceConnection::new(transport);
        let uhost = UhostConnection::connect(uhost_client, utim_name.clone(), uhost_name).await?;
        let platform = PlatformConnection::new();
        let top = Arc::new(TopLayer::new(device, uhost, platform));

        let state = Arc::new(Mutex::new(SessionState::new(utim_name, master_key)));
        let run = RunFlag::new();

        let (inbound_tx, inbound_rx) = mpsc::channel::<(Endpoint, Vec<u8>)>(CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel::<(Endpoint, Vec<u8>)>(CHANNEL_CAPACITY);
        let inbound_rx = Arc::new(Mutex::new(inbound_rx));
        let outbound_rx = Arc::new(Mutex::new(outbound_rx));

        let bridge_in = {
            let top = top.clone();
            spawn_worker(run.clone(), move || {
                let top = top.clone();
                let inbound_tx = inbound_tx.clone();
                pump_step!({
                    match top.receive().await {
                        Some(pair) => inbound_tx.send(pair).await.is_ok(),
                        None => false,
                    }
                })
            })
        };

        let processor_worker = {
            let state = state.clone();
            let inbound_rx = inbound_rx.clone();
            spawn_worker(run.clone(), move || {
                let state = state.clone();
                let inbound_rx = inbound_rx.clone();
                let outbound_tx = outbound_tx.clone();
                pump_step!({
                    let item = inbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some((source, body)) => {
                            let outcome = {
                                let mut guard = state.lock().await;
                                processor::process(&mut guard, source, body)
                            };
                            if let Some(pair) = outcome {
                                let _ = outbound_tx.send(pair).await;
                            }
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        let bridge_out = {
            let top = top.clone();
            spawn_worker(run.clone(), move || {
                let top = top.clone();
                let outbound_rx = outbound_rx.clone();
                pump_step!({
                    let item = outbound_rx.lock().await.try_recv().ok();
                    match item {
                        Some((destination, body)) => {
                            if !top.send(destination, body) {
                                debug!(endpoint = %destination, "utim: outbound frame dropped");
                            }
                            true
                        }
                        None => false,
                    }
                })
            })
        };

        info!("utim: stack wired and running");

        Ok(Utim {
            top,
            state,
            run,
            workers: vec![bridge_in, processor_worker, bridge_out],
        })
    }

    /// The derived session key, once the SRP handshake has completed.
    pub async fn session_key(&self) -> Option<[u8; 32]> {
        self.state.lock().await.session_key
    }

    pub async fn stop(self) {
        self.run.stop();
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

/// Wraps `body` as a Network/Transport-framed DEVICE uplink, ready to hand
/// to the far end of a [`crate::datalink::QueueBackend`] pair standing in
/// for the physical device peer.
pub fn encode_device_uplink(body: &[u8]) -> Result<Vec<u8>, UtimError> {
    let transport_frame = framing::encode(TransportEndpoint::Device.wire_tag(), body)?;
    framing::encode(
        Endpoint::Device.wire_tag().expect("DEVICE always has a wire tag"),
        &transport_frame,
    )
}

/// Inverse of [`encode_device_uplink`], for reading a DEVICE-bound reply
/// off the far end of the same queue pair.
pub fn decode_device_downlink(wire: &[u8]) -> Option<Vec<u8>> {
    let network_decoded = framing::decode(wire)?;
    let transport_decoded = framing::decode(network_decoded.payload)?;
    Some(transport_decoded.payload.to_vec())
}
