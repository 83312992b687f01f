//! End-to-end: brings a `Utim` up over an in-process DataLink and an
//! in-memory broker, drives a full SRP handshake against a `Verifier`
//! standing in for Uhost, and confirms the device side receives the
//! derived session key.

use std::time::Duration;

use utim_core::crypto;
use utim_core::datalink::{DataLinkBackend, QueueBackend};
use utim_core::framing;
use utim_core::srp::Verifier;
use utim_core::tag;
use utim_core::top::{InMemoryBroker, MessagingClient};
use utim_core::utim::{decode_device_downlink, encode_device_uplink, Utim};

const UTIM_NAME: &str = "UTIM01";
const UHOST_NAME: &str = "UHOST01";
const MASTER_KEY: &[u8] = b"correct horse battery staple";

async fn next_broker_message(broker: &InMemoryBroker, topic: &str) -> Vec<u8> {
    loop {
        if let Some(bytes) = broker.next_message(topic).await {
            return bytes;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn unwrap_envelope(key: Option<&[u8]>, wire: &[u8]) -> Option<Vec<u8>> {
    let unsigned = crypto::unsign(key, wire)?;
    crypto::decrypt(key, &unsigned)
}

fn wrap_envelope(key: Option<&[u8]>, cleartext: &[u8]) -> Vec<u8> {
    crypto::sign(key, &crypto::encrypt(key, cleartext))
}

#[tokio::test]
async fn full_handshake_delivers_session_key_to_device() {
    let (device_near, mut device_far) = QueueBackend::pair();
    let broker = InMemoryBroker::new();
    broker.subscribe(UHOST_NAME).await.unwrap();

    let uhost_peer = tokio::spawn({
        let broker = broker.clone();
        async move {
            let hello_wire = next_broker_message(&broker, UHOST_NAME).await;
            let hello_cleartext = unwrap_envelope(None, &hello_wire).unwrap();
            let hello = framing::decode(&hello_cleartext).unwrap();
            assert_eq!(hello.tag, tag::uhost::HELLO);
            let a_pub = hello.payload.to_vec();

            let (salt, verifier_bytes) = Verifier::generate_salt_and_verifier(UTIM_NAME.as_bytes(), MASTER_KEY);
            let mut verifier = Verifier::new(UTIM_NAME.as_bytes().to_vec(), salt, verifier_bytes, &a_pub);
            let (s, b_pub) = verifier.challenge().unwrap();

            let mut try_cleartext = framing::encode(tag::uhost::TRY_FIRST, &s).unwrap();
            try_cleartext.extend(framing::encode(tag::uhost::TRY_SECOND, &b_pub).unwrap());
            broker.inject(UTIM_NAME, wrap_envelope(None, &try_cleartext)).await;

            let check_wire = next_broker_message(&broker, UHOST_NAME).await;
            let check_cleartext = unwrap_envelope(None, &check_wire).unwrap();
            let check = framing::decode(&check_cleartext).unwrap();
            let h_amk = verifier.verify_session(check.payload).unwrap();

            let init_cleartext = framing::encode(tag::uhost::INIT, &h_amk).unwrap();
            broker.inject(UTIM_NAME, wrap_envelope(None, &init_cleartext)).await;

            let session_key = verifier.session_key().unwrap();
            let authentic_cleartext = framing::encode(tag::uhost::AUTHENTIC, &[]).unwrap();
            broker
                .inject(UTIM_NAME, wrap_envelope(Some(&session_key), &authentic_cleartext))
                .await;

            session_key
        }
    });

    let utim = Utim::connect(
        device_near,
        broker,
        UTIM_NAME.to_string(),
        UHOST_NAME.to_string(),
        MASTER_KEY.to_vec(),
    )
    .await
    .expect("stack must wire up");

    let network_ready = encode_device_uplink(&[tag::device_in::NETWORK_READY]).unwrap();
    device_far.send(network_ready).await;

    let device_session_key = loop {
        if let Some(wire) = device_far.receive().await {
            if let Some(body) = decode_device_downlink(&wire) {
                if body.len() == 32 {
                    break body;
                }
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };

    let verifier_session_key = uhost_peer.await.expect("uhost peer task must not panic");
    assert_eq!(device_session_key, verifier_session_key.to_vec());
    assert_eq!(utim.session_key().await, Some(verifier_session_key));

    utim.stop().await;
}
