//! `ProcessDevice`: the device-origin subprocessor, §4.5.1.
//!
//! Device command bodies are not TLV-framed — a single byte-block from
//! Transport already carries one complete command, so the first body byte
//! alone is the dispatch tag.

use crate::address::{Endpoint, Status};
use crate::tag;

use super::{uhost, Frame, SessionState};

pub fn process(state: &mut SessionState, frame: Frame) -> Frame {
    if frame.source != Endpoint::Device {
        return finalize(frame);
    }
    if frame.body.is_empty() {
        return finalize(frame);
    }

    let tag_byte = frame.body[0];
    let payload = frame.body[1..].to_vec();

    match tag_byte {
        t if t == tag::device_in::DATA_TO_PLATFORM => Frame {
            source: Endpoint::Device,
            destination: Endpoint::Platform,
            status: Status::ToSend,
            body: payload,
        },
        t if t == tag::device_in::NETWORK_READY => uhost::start_srp(state, Endpoint::Device),
        t if t == tag::device_in::GET_UTIM_STATUS => {
            let status_byte = if state.session_key.is_some() {
                tag::device_out::OK_STATUS
            } else {
                0x00
            };
            Frame {
                source: Endpoint::Device,
                destination: Endpoint::Device,
                status: Status::ToSend,
                body: vec![status_byte],
            }
        }
        t if t == tag::device_in::DATA_FROM_NETWORK || t == tag::device_in::DATA_TO_SIGN => Frame {
            source: Endpoint::Device,
            destination: Endpoint::Uhost,
            status: Status::ToSend,
            body: payload,
        },
        _ => finalize(Frame { source: Endpoint::Device, ..frame }),
    }
}

fn finalize(frame: Frame) -> Frame {
    Frame {
        destination: Endpoint::Utim,
        status: Status::Finalized,
        body: Vec::new(),
        ..frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> SessionState {
        SessionState::new("UTIM01".into(), b"secret".to_vec())
    }

    #[test]
    fn data_to_platform_strips_the_tag_byte() {
        let mut s = state();
        let frame = Frame {
            source: Endpoint::Device,
            destination: Endpoint::Utim,
            status: Status::Process,
            body: {
                let mut b = vec![tag::device_in::DATA_TO_PLATFORM];
                b.extend_from_slice(b"payload");
                b
            },
        };
        let out = process(&mut s, frame);
        assert_eq!(out.destination, Endpoint::Platform);
        assert_eq!(out.status, Status::ToSend);
        assert_eq!(out.body, b"payload");
    }

    #[test]
    fn get_utim_status_reports_not_ready_without_a_session_key() {
        let mut s = state();
        let frame = Frame {
            source: Endpoint::Device,
            destination: Endpoint::Utim,
            status: Status::Process,
            body: vec![tag::device_in::GET_UTIM_STATUS],
        };
        let out = process(&mut s, frame);
        assert_eq!(out.destination, Endpoint::Device);
        assert_eq!(out.body, vec![0x00]);
    }

    #[test]
    fn get_utim_status_reports_ok_with_a_session_key() {
        let mut s = state();
        s.session_key = Some([7u8; 32]);
        let frame = Frame {
            source: Endpoint::Device,
            destination: Endpoint::Utim,
            status: Status::Process,
            body: vec![tag::device_in::GET_UTIM_STATUS],
        };
        let out = process(&mut s, frame);
        assert_eq!(out.body, vec![tag::device_out::OK_STATUS]);
    }

    #[test]
    fn unknown_tag_finalizes() {
        let mut s = state();
        let frame = Frame {
            source: Endpoint::Device,
            destination: Endpoint::Utim,
            status: Status::Process,
            body: vec![0x77],
        };
        let out = process(&mut s, frame);
        assert_eq!(out.status, Status::Finalized);
    }
}
