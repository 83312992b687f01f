//! Demonstration binary: wires a `Utim` over an in-process DataLink and an
//! in-memory Uhost broker, drives an SRP handshake against a `Verifier`
//! playing the Uhost role, and prints the derived session key — mirroring
//! the original implementation's example SSH-password-authentication
//! launcher, §6.3.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{filter::LevelFilter, prelude::*, Layer};

use utim_core::config::UtimConfig;
use utim_core::crypto;
use utim_core::datalink::{DataLinkBackend, QueueBackend};
use utim_core::framing;
use utim_core::srp::Verifier;
use utim_core::tag;
use utim_core::top::{InMemoryBroker, MessagingClient};
use utim_core::utim::{decode_device_downlink, encode_device_uplink, Utim};

mod logging;
use logging::ColorizedFormatter;

/// Runs the UTIM demonstration end to end and prints the derived session
/// key, to be used as, e.g., an SSH password on the device side.
#[derive(Parser, Debug)]
#[command(name = "utim-demo", about = "Drives a UTIM session end to end")]
struct Args {
    /// Verbosity: repeat for more detail (-v, -vv, ...).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = match args.verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .event_format(ColorizedFormatter)
                .with_filter(log_level),
        )
        .init();

    let config = UtimConfig::load().unwrap_or_else(|err| {
        warn!(%err, "utim-demo: no usable configuration found, using built-in demo defaults");
        demo_config_fallback()
    });

    info!(utim_name = %config.utim_name, "utim-demo: starting");

    let (device_near, device_far) = QueueBackend::pair();
    let broker = InMemoryBroker::new();

    let uhost_peer = tokio::spawn(run_uhost_peer(
        broker.clone(),
        config.utim_name.clone(),
        config.uhost_name.clone(),
        config.master_key.clone(),
    ));

    let utim = Utim::connect(
        device_near,
        broker,
        config.utim_name.clone(),
        config.uhost_name.clone(),
        config.master_key.clone(),
    )
    .await
    .context("failed to bring the UTIM stack up")?;

    let mut device_far = device_far;
    let network_ready = encode_device_uplink(&[tag::device_in::NETWORK_READY])?;
    device_far.send(network_ready).await;
    info!("utim-demo: injected NETWORK_READY on behalf of the device");

    let session_key = loop {
        if let Some(wire) = device_far.receive().await {
            if let Some(body) = decode_device_downlink(&wire) {
                if body.len() == 32 {
                    break body;
                }
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    };

    println!("derived session key: {}", hex::encode(&session_key));

    utim.stop().await;
    uhost_peer.abort();
    Ok(())
}

fn demo_config_fallback() -> UtimConfig {
    UtimConfig {
        utim_name: "DEMOUTIM01".to_string(),
        uhost_name: "DEMOUHOST01".to_string(),
        messaging_protocol: utim_core::config::MessagingProtocol::Mqtt,
        broker_hostname: "localhost".to_string(),
        broker_username: "demo".to_string(),
        broker_password: "demo".to_string(),
        reconnect_time: 60,
        master_key: b"correct horse battery staple".to_vec(),
    }
}

/// Plays the Uhost role against the UTIM's SRP client, using a `Verifier`
/// instead of a real broker-connected host. Exists only to make this
/// binary runnable standalone; not part of the library's public surface.
async fn run_uhost_peer(broker: Arc<InMemoryBroker>, utim_name: String, uhost_name: String, master_key: Vec<u8>) {
    broker.subscribe(&uhost_name).await.ok();

    let hello_wire = loop {
        if let Some(bytes) = broker.next_message(&uhost_name).await {
            break bytes;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    };
    let hello_cleartext = match unwrap(None, &hello_wire) {
        Some(c) => c,
        None => return,
    };
    let Some(hello) = framing::decode(&hello_cleartext) else { return };
    if hello.tag != tag::uhost::HELLO {
        return;
    }
    let a_pub = hello.payload.to_vec();

    let (salt, verifier_bytes) = Verifier::generate_salt_and_verifier(utim_name.as_bytes(), &master_key);
    let mut verifier = Verifier::new(utim_name.as_bytes().to_vec(), salt, verifier_bytes, &a_pub);
    let Some((s, b_pub)) = verifier.challenge() else { return };

    let mut try_cleartext = framing::encode(tag::uhost::TRY_FIRST, &s).unwrap_or_default();
    try_cleartext.extend(framing::encode(tag::uhost::TRY_SECOND, &b_pub).unwrap_or_default());
    broker.inject(&utim_name, wrap(None, &try_cleartext)).await;

    let check_wire = loop {
        if let Some(bytes) = broker.next_message(&uhost_name).await {
            break bytes;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    };
    let Some(check_cleartext) = unwrap(None, &check_wire) else { return };
    let Some(check) = framing::decode(&check_cleartext) else { return };
    let Some(h_amk) = verifier.verify_session(check.payload) else { return };

    let init_cleartext = framing::encode(tag::uhost::INIT, &h_amk).unwrap_or_default();
    broker.inject(&utim_name, wrap(None, &init_cleartext)).await;

    let Some(session_key) = verifier.session_key() else { return };
    let authentic_cleartext = framing::encode(tag::uhost::AUTHENTIC, &[]).unwrap_or_default();
    broker.inject(&utim_name, wrap(Some(&session_key), &authentic_cleartext)).await;
}

fn unwrap(key: Option<&[u8]>, wire: &[u8]) -> Option<Vec<u8>> {
    let unsigned = crypto::unsign(key, wire)?;
    crypto::decrypt(key, &unsigned)
}

fn wrap(key: Option<&[u8]>, cleartext: &[u8]) -> Vec<u8> {
    crypto::sign(key, &crypto::encrypt(key, cleartext))
}
