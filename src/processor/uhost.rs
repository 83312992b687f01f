//! `ProcessUhost`: the cryptographic envelope plus SRP/session command
//! dispatch, §4.5.2 and §4.6.
//!
//! Applies only to frames that originated at UHOST: unsign, decrypt, then
//! dispatch on the first TLV's tag. UHOST commands are TLV-framed (unlike
//! device commands) since several of them carry a second concatenated TLV
//! (`TRY`) and all of them echo the same shape SRP uses on the wire.

use rand::RngCore;
use tracing::warn;

use crate::address::{Endpoint, Status};
use crate::crypto;
use crate::framing;
use crate::srp;
use crate::tag;

use super::{Frame, SessionState};

/// Starts the SRP handshake: creates the client, sends `HELLO(A)`. Invoked
/// by `ProcessDevice` on `NETWORK_READY` (§4.6 state 1).
pub(crate) fn start_srp(state: &mut SessionState, source: Endpoint) -> Frame {
    let identity = state.utim_name.as_bytes().to_vec();
    let password = state.master_key.clone();
    let client = srp::User::new(identity, password);
    let (_identity, a_pub) = client.start_authentication();
    state.srp_client = Some(client);
    state.srp_step = Some(1);
    reply(source, tag::uhost::HELLO, &a_pub)
}

pub fn process(state: &mut SessionState, frame: Frame) -> Frame {
    if frame.source != Endpoint::Uhost {
        return finalize(frame.source);
    }

    let key = state.session_key.as_ref().map(|k| k.as_slice());
    let unsigned = match crypto::unsign(key, &frame.body) {
        Some(body) => body,
        None => return finalize(Endpoint::Uhost),
    };
    let cleartext = match crypto::decrypt(key, &unsigned) {
        Some(body) => body,
        None => return finalize(Endpoint::Uhost),
    };

    let records = framing::decode_all(&cleartext);
    let Some((tag_byte, first_payload)) = records.first().cloned() else {
        return finalize(Endpoint::Uhost);
    };

    match tag_byte {
        t if t == tag::uhost::TRY_FIRST => handle_try(state, &records),
        t if t == tag::uhost::INIT => handle_init(state, &first_payload),
        t if t == tag::uhost::CONNECTION_STRING => Frame {
            source: Endpoint::Uhost,
            destination: Endpoint::Platform,
            status: Status::ToSend,
            body: first_payload,
        },
        t if t == tag::uhost::TEST_PLATFORM_DATA => finalize(Endpoint::Uhost),
        t if t == tag::uhost::AUTHENTIC => Frame {
            source: Endpoint::Uhost,
            destination: Endpoint::Device,
            status: Status::ToSend,
            body: state.session_key.map(|k| k.to_vec()).unwrap_or_default(),
        },
        t if t == tag::uhost::ERROR => handle_error(state, &first_payload),
        t if t == tag::uhost::KEEPALIVE => reply(Endpoint::Uhost, tag::uhost::KEEPALIVE_ANSWER, &[]),
        t if t == tag::uhost::DIE => {
            warn!("uhost: DIE received, tearing down session");
            state.srp_step = None;
            state.session_key = None;
            state.srp_client = None;
            finalize(Endpoint::Uhost)
        }
        _ => finalize(Endpoint::Uhost),
    }
}

fn handle_try(state: &mut SessionState, records: &[(u8, Vec<u8>)]) -> Frame {
    let salt = records.iter().find(|(t, _)| *t == tag::uhost::TRY_FIRST).map(|(_, v)| v.clone());
    let b_pub = records.iter().find(|(t, _)| *t == tag::uhost::TRY_SECOND).map(|(_, v)| v.clone());
    let (salt, b_pub) = match (salt, b_pub) {
        (Some(s), Some(b)) => (s, b),
        _ => return error_reply(b"try processing"),
    };

    let client = match state.srp_client.as_mut() {
        Some(c) => c,
        None => return error_reply(b"try processing"),
    };

    match client.process_challenge(&salt, &b_pub) {
        Some(m) => {
            state.srp_step = Some(2);
            reply(Endpoint::Uhost, tag::uhost::CHECK, &m)
        }
        None => error_reply(b"try processing"),
    }
}

fn handle_init(state: &mut SessionState, host_h_amk: &[u8]) -> Frame {
    let client = match state.srp_client.as_mut() {
        Some(c) => c,
        None => return error_reply(b"init processing"),
    };
    client.verify_session(host_h_amk);

    match client.session_key() {
        Some(key) => {
            state.session_key = Some(key);
            let mut random32 = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut random32);
            reply(Endpoint::Uhost, tag::uhost::TRUSTED, &random32)
        }
        None => error_reply(b"init processing"),
    }
}

fn handle_error(state: &mut SessionState, payload: &[u8]) -> Frame {
    let text = String::from_utf8_lossy(payload).to_lowercase();
    if tag::ERROR_RESET_PREFIXES.iter().any(|prefix| text.starts_with(prefix)) {
        warn!(message = %text, "uhost: ERROR reset SRP state");
        state.srp_step = None;
        state.srp_client = None;
    } else {
        warn!(message = %text, "uhost: ERROR received");
    }
    finalize(Endpoint::Uhost)
}

fn error_reply(message: &[u8]) -> Frame {
    reply(Endpoint::Uhost, tag::uhost::ERROR, message)
}

fn reply(source: Endpoint, tag_byte: u8, payload: &[u8]) -> Frame {
    let body = framing::encode(tag_byte, payload).unwrap_or_else(|_| payload.to_vec());
    Frame {
        source,
        destination: Endpoint::Uhost,
        status: Status::ToSend,
        body,
    }
}

fn finalize(source: Endpoint) -> Frame {
    Frame {
        source,
        destination: Endpoint::Utim,
        status: Status::Finalized,
        body: Vec::new(),
    }
}
