//! TLV (Tag-Length-Value) codec shared by the Network and Transport tiers.
//!
//! On wire: one tag byte, two big-endian length bytes, then exactly `length`
//! payload bytes. Multiple TLVs may be concatenated back to back (used by
//! `try` and `signed` commands).

use crate::error::UtimError;

/// Maximum payload length representable in the 2-byte length field.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Encode a single TLV record: `tag (1B) ‖ len(payload) (2B BE) ‖ payload`.
pub fn encode(tag: u8, payload: &[u8]) -> Result<Vec<u8>, UtimError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(UtimError::Resource(format!(
            "payload of {} bytes exceeds TLV length field",
            payload.len()
        )));
    }
    let mut out = Vec::with_capacity(3 + payload.len());
    out.push(tag);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
    Ok(out)
}

/// A single decoded TLV record plus the number of bytes it consumed.
pub struct Decoded<'a> {
    pub tag: u8,
    pub payload: &'a [u8],
    pub consumed: usize,
}

/// Decode one TLV record from the front of `bytes`.
///
/// Returns `None` when fewer than 3 header bytes are available, or when the
/// declared length exceeds the bytes actually available — both cases are
/// "under-length" framing errors that the caller logs and drops (§3
/// invariant 3), not an error return, since no exception propagates past
/// the Network/Transport tier.
pub fn decode(bytes: &[u8]) -> Option<Decoded<'_>> {
    if bytes.len() < 3 {
        return None;
    }
    let tag = bytes[0];
    let len = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
    if bytes.len() < 3 + len {
        return None;
    }
    Some(Decoded {
        tag,
        payload: &bytes[3..3 + len],
        consumed: 3 + len,
    })
}

/// Decode every concatenated TLV record in `bytes`, stopping at the first
/// malformed trailing fragment (if any). Used for multi-TLV bodies such as
/// the `try` command's `(s, B)` pair.
pub fn decode_all(mut bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    while let Some(decoded) = decode(bytes) {
        out.push((decoded.tag, decoded.payload.to_vec()));
        bytes = &bytes[decoded.consumed..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_payload() {
        let payload = vec![0xAB; 1200];
        let encoded = encode(0x42, &payload).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.tag, 0x42);
        assert_eq!(decoded.payload, payload.as_slice());
        assert_eq!(decoded.consumed, encoded.len());
    }

    #[test]
    fn round_trips_empty_payload() {
        let encoded = encode(0x00, &[]).unwrap();
        let decoded = decode(&encoded).unwrap();
        assert_eq!(decoded.payload.len(), 0);
    }

    #[test]
    fn rejects_oversized_payload() {
        let huge = vec![0u8; MAX_PAYLOAD_LEN + 1];
        assert!(encode(0x00, &huge).is_err());
    }

    #[test]
    fn decode_returns_none_on_truncated_header() {
        assert!(decode(&[0x01, 0x00]).is_none());
    }

    #[test]
    fn decode_returns_none_when_declared_length_exceeds_available_bytes() {
        let mut bytes = vec![0x01, 0x00, 0x10];
        bytes.extend_from_slice(&[0u8; 4]);
        assert!(decode(&bytes).is_none());
    }

    #[test]
    fn decode_all_parses_concatenated_records() {
        let mut bytes = encode(0xb1, b"salt").unwrap();
        bytes.extend(encode(0xb2, b"B-value").unwrap());
        let records = decode_all(&bytes);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], (0xb1, b"salt".to_vec()));
        assert_eq!(records[1], (0xb2, b"B-value".to_vec()));
    }
}
