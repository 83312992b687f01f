//! State-driven message processor: per-source subprocessor dispatch plus
//! the bounded re-entry loop, §4.5.
//!
//! The processor is the sole owner of UTIM session state (§5
//! Shared-resource policy). Every other layer exchanges data with it only
//! through queues.

pub mod device;
pub mod platform;
pub mod uhost;

use std::collections::HashMap;

use tracing::warn;

use crate::address::{Endpoint, Status};
use crate::crypto;
use crate::srp;

/// Hard cap on the re-entry loop; exceeding it finalizes the frame with a
/// logged protocol error rather than looping indefinitely (§4.5, §9 Open
/// Questions).
pub const MAX_REENTRY: usize = 8;

/// Session state threaded through every frame, mutated only here.
pub struct SessionState {
    pub utim_name: String,
    pub master_key: Vec<u8>,
    pub srp_client: Option<srp::User>,
    pub srp_step: Option<u8>,
    pub session_key: Option<[u8; 32]>,
    pub platform_config: Option<HashMap<String, Vec<u8>>>,
}

impl SessionState {
    pub fn new(utim_name: String, master_key: Vec<u8>) -> Self {
        SessionState {
            utim_name,
            master_key,
            srp_client: None,
            srp_step: None,
            session_key: None,
            platform_config: None,
        }
    }
}

/// The processor's internal 4-tuple, §3 Data model.
#[derive(Debug, Clone)]
pub struct Frame {
    pub source: Endpoint,
    pub destination: Endpoint,
    pub status: Status,
    pub body: Vec<u8>,
}

/// Runs one inbound `(source, body)` pair through the subprocessor chain.
/// Returns at most one outbound `(destination, body)` pair (§8 invariant 5).
pub fn process(state: &mut SessionState, source: Endpoint, body: Vec<u8>) -> Option<(Endpoint, Vec<u8>)> {
    let mut frame = Frame {
        source,
        destination: Endpoint::Utim,
        status: Status::Process,
        body,
    };
    let mut active = source;
    let mut settled = false;

    for _ in 0..MAX_REENTRY {
        frame = dispatch(active, state, frame);
        if frame.status != Status::Process {
            settled = true;
            break;
        }
        active = if frame.source != Endpoint::Utim {
            frame.source
        } else {
            frame.destination
        };
    }

    if !settled {
        warn!(cap = MAX_REENTRY, "processor: re-entry cap exceeded, finalizing frame");
        frame.status = Status::Finalized;
    }

    // Invariant 2: any frame emitted to UHOST is encrypt-then-sign wrapped,
    // regardless of which subprocessor produced it.
    if frame.destination == Endpoint::Uhost && frame.status != Status::Finalized {
        let key = state.session_key.as_ref().map(|k| k.as_slice());
        let encrypted = crypto::encrypt(key, &frame.body);
        frame.body = crypto::sign(key, &encrypted);
    }

    if frame.destination != Endpoint::Utim && frame.status != Status::Finalized {
        Some((frame.destination, frame.body))
    } else {
        None
    }
}

fn dispatch(active: Endpoint, state: &mut SessionState, frame: Frame) -> Frame {
    match active {
        Endpoint::Device => device::process(state, frame),
        Endpoint::Uhost => uhost::process(state, frame),
        Endpoint::Platform => platform::process(frame),
        Endpoint::Utim => Frame {
            destination: Endpoint::Utim,
            status: Status::Finalized,
            ..frame
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing;
    use crate::srp::Verifier;
    use crate::tag;

    fn fresh_state() -> SessionState {
        SessionState::new("UTIM01".to_string(), b"correct horse battery staple".to_vec())
    }

    fn network_ready_frame() -> Vec<u8> {
        vec![tag::device_in::NETWORK_READY]
    }

    fn unwrap_none(wire: &[u8]) -> Vec<u8> {
        let unsigned = crypto::unsign(None, wire).expect("mode=none SIGNED envelope");
        crypto::decrypt(None, &unsigned).expect("mode=none ENCRYPTED envelope")
    }

    fn wrap_none(cleartext: &[u8]) -> Vec<u8> {
        crypto::sign(None, &crypto::encrypt(None, cleartext))
    }

    /// Drives S1 and S2, returning the verifier (now past `challenge`) and
    /// the still-mutating session state, so S3/S4/S5 tests can continue
    /// from an authenticated-pending session.
    fn drive_through_check(state: &mut SessionState) -> Verifier {
        let a_pub = network_ready_and_extract_a_pub(state);

        let (salt, verifier_bytes) =
            Verifier::generate_salt_and_verifier(state.utim_name.as_bytes(), &state.master_key);
        let mut verifier = Verifier::new(state.utim_name.as_bytes().to_vec(), salt, verifier_bytes, &a_pub);
        let (s, b_pub) = verifier.challenge().expect("safety check passes for honest peers");

        let mut try_cleartext = framing::encode(tag::uhost::TRY_FIRST, &s).unwrap();
        try_cleartext.extend(framing::encode(tag::uhost::TRY_SECOND, &b_pub).unwrap());

        let (destination, check_wire) = process(state, Endpoint::Uhost, wrap_none(&try_cleartext))
            .expect("TRY must produce a CHECK outbound");
        assert_eq!(destination, Endpoint::Uhost);
        assert_eq!(state.srp_step, Some(2));

        let check = framing::decode(&unwrap_none(&check_wire)).expect("CHECK is a single TLV");
        assert_eq!(check.tag, tag::uhost::CHECK);

        verifier.verify_session(check.payload).expect("verifier must accept matching M");
        verifier
    }

    fn network_ready_and_extract_a_pub(state: &mut SessionState) -> Vec<u8> {
        let (destination, hello_wire) = process(state, Endpoint::Device, network_ready_frame())
            .expect("NETWORK_READY must produce a HELLO outbound");
        assert_eq!(destination, Endpoint::Uhost);
        assert_eq!(state.srp_step, Some(1));

        let hello = framing::decode(&unwrap_none(&hello_wire)).expect("HELLO is a single TLV");
        assert_eq!(hello.tag, tag::uhost::HELLO);
        hello.payload.to_vec()
    }

    #[test]
    fn s1_network_ready_starts_srp() {
        let mut state = fresh_state();
        network_ready_and_extract_a_pub(&mut state);
    }

    #[test]
    fn s2_try_produces_check() {
        let mut state = fresh_state();
        drive_through_check(&mut state);
    }

    #[test]
    fn s3_init_completes_srp() {
        let mut state = fresh_state();
        let mut verifier = drive_through_check(&mut state);

        let h_amk_host = verifier.verify_session(&state.srp_client.as_ref().unwrap().m.unwrap()).unwrap();
        let init_cleartext = framing::encode(tag::uhost::INIT, &h_amk_host).unwrap();

        let (destination, trusted_wire) = process(&mut state, Endpoint::Uhost, wrap_none(&init_cleartext))
            .expect("INIT must produce a TRUSTED outbound");
        assert_eq!(destination, Endpoint::Uhost);
        assert_eq!(state.session_key, Some(verifier.session_key().unwrap()));

        let key = state.session_key.unwrap();
        let unsigned = crypto::unsign(Some(&key), &trusted_wire).expect("TRUSTED is signed with the new key");
        let trusted = framing::decode(&crypto::decrypt(Some(&key), &unsigned).unwrap()).unwrap();
        assert_eq!(trusted.tag, tag::uhost::TRUSTED);
        assert_eq!(trusted.payload.len(), 32);
    }

    #[test]
    fn s4_authentic_relays_key_to_device() {
        let mut state = fresh_state();
        let mut verifier = drive_through_check(&mut state);
        let h_amk_host = verifier.verify_session(&state.srp_client.as_ref().unwrap().m.unwrap()).unwrap();
        let init_cleartext = framing::encode(tag::uhost::INIT, &h_amk_host).unwrap();
        process(&mut state, Endpoint::Uhost, wrap_none(&init_cleartext)).unwrap();
        let key = state.session_key.unwrap();

        let authentic_cleartext = framing::encode(tag::uhost::AUTHENTIC, &[]).unwrap();
        let authentic_wire = crypto::sign(Some(&key), &crypto::encrypt(Some(&key), &authentic_cleartext));

        let (destination, body) = process(&mut state, Endpoint::Uhost, authentic_wire)
            .expect("AUTHENTIC must relay the session key to the device");
        assert_eq!(destination, Endpoint::Device);
        assert_eq!(body, key.to_vec());
    }

    #[test]
    fn s5_bad_signature_drops_with_no_outbound_and_unchanged_session_key() {
        let mut state = fresh_state();
        let mut verifier = drive_through_check(&mut state);
        let h_amk_host = verifier.verify_session(&state.srp_client.as_ref().unwrap().m.unwrap()).unwrap();
        let init_cleartext = framing::encode(tag::uhost::INIT, &h_amk_host).unwrap();
        process(&mut state, Endpoint::Uhost, wrap_none(&init_cleartext)).unwrap();
        let key = state.session_key.unwrap();

        let mut tampered = crypto::sign(Some(&key), &crypto::encrypt(Some(&key), b"whatever"));
        let last = tampered.len() - 1;
        tampered[last] ^= 0xff;

        assert_eq!(process(&mut state, Endpoint::Uhost, tampered), None);
        assert_eq!(state.session_key, Some(key));
    }

    #[test]
    fn s6_error_resets_srp_before_completion() {
        let mut state = fresh_state();
        network_ready_and_extract_a_pub(&mut state);

        let error_cleartext = framing::encode(tag::uhost::ERROR, b"hello: bad").unwrap();
        assert_eq!(process(&mut state, Endpoint::Uhost, wrap_none(&error_cleartext)), None);
        assert_eq!(state.srp_step, None);

        // A subsequent NETWORK_READY re-runs S1 from scratch.
        network_ready_and_extract_a_pub(&mut state);
    }

    #[test]
    fn invariant_processor_emits_at_most_one_outbound_frame() {
        let mut state = fresh_state();
        let outbound = process(&mut state, Endpoint::Device, vec![0xff]);
        assert_eq!(outbound, None);
    }

    #[test]
    fn invariant_finalized_frames_never_emit() {
        let mut state = fresh_state();
        // An unknown device tag finalizes immediately.
        assert_eq!(process(&mut state, Endpoint::Device, vec![0x77, 1, 2, 3]), None);
    }

    #[test]
    fn re_entry_cap_finalizes_adversarial_loop() {
        // DEVICE and PLATFORM never set active to a source other than
        // themselves in this implementation, so an artificial cap breach is
        // exercised indirectly via an unknown tag: status goes straight to
        // FINALIZED rather than looping, confirming the loop terminates.
        let mut state = fresh_state();
        for _ in 0..(MAX_REENTRY + 2) {
            assert_eq!(process(&mut state, Endpoint::Device, vec![0xaa]), None);
        }
    }
}
