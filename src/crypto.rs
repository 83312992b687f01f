//! Cryptographic envelope: AES-CFB encryption and HMAC-SHA1 signing, §4.7.
//!
//! Two 2-byte-prefixed envelope shapes, each independently switched between
//! "none" and "algorithm" by a mode byte:
//!
//! - `ENCRYPTED`: `0x81 ‖ mode ‖ ciphertext`
//! - `SIGNED`:    `0x82 ‖ mode ‖ payload ‖ mac` (mac present only when mode = algorithm)
//!
//! With no session key, only `mode = 0x00` (none) is accepted on decode, and
//! the opposite holds once a key is established: the keyed side only
//! accepts `mode = 0x01`. Any other combination is a verification failure.

use aes::Aes256;
use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use subtle::ConstantTimeEq;

use crate::tag;

type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;
type HmacSha1 = Hmac<Sha1>;

/// Fixed 16-byte IV used for every AES-CFB operation.
///
/// This is a known, documented wire-compatibility constraint: reusing a
/// fixed IV under a fixed key permits multi-message cryptanalysis. It is
/// preserved exactly as the wire format requires rather than "fixed",
/// per the design's explicit instruction not to silently change it.
pub const FIXED_IV: [u8; 16] = [0u8; 16];

const HMAC_LEN: usize = 20;

/// Encrypt `payload` under `key` (32 bytes) and wrap it in the `ENCRYPTED`
/// envelope. With `key = None`, the envelope carries the payload unmodified
/// under `mode = none`.
pub fn encrypt(key: Option<&[u8]>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + payload.len());
    out.push(tag::crypto::ENCRYPTED);
    match key {
        None => {
            out.push(tag::crypto::MODE_NONE);
            out.extend_from_slice(payload);
        }
        Some(key) => {
            out.push(tag::crypto::MODE_ALGORITHM);
            let mut buf = payload.to_vec();
            let key: &[u8; 32] = key.try_into().expect("session key must be 32 bytes");
            Aes256CfbEnc::new(key.into(), (&FIXED_IV).into()).encrypt(&mut buf);
            out.extend_from_slice(&buf);
        }
    }
    out
}

/// Inverse of [`encrypt`]. Returns `None` (a verification failure, per the
/// design's "any other combination" rule) when the envelope tag or mode
/// byte does not match what `key` allows.
pub fn decrypt(key: Option<&[u8]>, envelope: &[u8]) -> Option<Vec<u8>> {
    if envelope.len() < 2 || envelope[0] != tag::crypto::ENCRYPTED {
        return None;
    }
    let mode = envelope[1];
    let ciphertext = &envelope[2..];
    match (key, mode) {
        (None, tag::crypto::MODE_NONE) => Some(ciphertext.to_vec()),
        (Some(key), tag::crypto::MODE_ALGORITHM) => {
            let key: &[u8; 32] = key.try_into().ok()?;
            let mut buf = ciphertext.to_vec();
            Aes256CfbDec::new(key.into(), (&FIXED_IV).into()).decrypt(&mut buf);
            Some(buf)
        }
        _ => None,
    }
}

/// Sign `payload` under `key` and wrap it in the `SIGNED` envelope. With
/// `key = None`, produces `0x82 ‖ 0x00 ‖ payload` with no MAC appended.
pub fn sign(key: Option<&[u8]>, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + payload.len() + HMAC_LEN);
    out.push(tag::crypto::SIGNED);
    match key {
        None => {
            out.push(tag::crypto::MODE_NONE);
            out.extend_from_slice(payload);
        }
        Some(key) => {
            out.push(tag::crypto::MODE_ALGORITHM);
            out.extend_from_slice(payload);
            let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(payload);
            out.extend_from_slice(&mac.finalize().into_bytes());
        }
    }
    out
}

/// Inverse of [`sign`]. Recomputes the MAC and compares constant-time;
/// returns `None` on any mismatch or malformed envelope.
pub fn unsign(key: Option<&[u8]>, envelope: &[u8]) -> Option<Vec<u8>> {
    if envelope.len() < 2 || envelope[0] != tag::crypto::SIGNED {
        return None;
    }
    let mode = envelope[1];
    let body = &envelope[2..];
    match (key, mode) {
        (None, tag::crypto::MODE_NONE) => Some(body.to_vec()),
        (Some(key), tag::crypto::MODE_ALGORITHM) => {
            if body.len() < HMAC_LEN {
                return None;
            }
            let (payload, mac_bytes) = body.split_at(body.len() - HMAC_LEN);
            let mut mac = HmacSha1::new_from_slice(key).expect("HMAC accepts any key length");
            mac.update(payload);
            let expected = mac.finalize().into_bytes();
            if expected.as_slice().ct_eq(mac_bytes).into() {
                Some(payload.to_vec())
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> [u8; 32] {
        let mut k = [0u8; 32];
        for (i, b) in k.iter_mut().enumerate() {
            *b = i as u8;
        }
        k
    }

    #[test]
    fn sign_unsign_round_trip_with_key() {
        let k = key();
        let payload = b"hello uhost";
        let signed = sign(Some(&k), payload);
        assert_eq!(unsign(Some(&k), &signed).unwrap(), payload);
    }

    #[test]
    fn encrypt_decrypt_round_trip_with_key() {
        let k = key();
        let payload = b"session traffic";
        let encrypted = encrypt(Some(&k), payload);
        assert_eq!(decrypt(Some(&k), &encrypted).unwrap(), payload);
    }

    #[test]
    fn none_mode_round_trips_without_key() {
        let payload = b"pre-auth hello";
        let signed = sign(None, payload);
        assert_eq!(signed, [&[tag::crypto::SIGNED, 0x00][..], payload].concat());
        assert_eq!(unsign(None, &signed).unwrap(), payload);

        let encrypted = encrypt(None, payload);
        assert_eq!(decrypt(None, &encrypted).unwrap(), payload);
    }

    #[test]
    fn unsign_rejects_tampered_mac() {
        let k = key();
        let mut signed = sign(Some(&k), b"trusted payload");
        let last = signed.len() - 1;
        signed[last] ^= 0xff;
        assert!(unsign(Some(&k), &signed).is_none());
    }

    #[test]
    fn unsign_rejects_mode_mismatch() {
        let k = key();
        let signed_without_key = sign(None, b"x");
        assert!(unsign(Some(&k), &signed_without_key).is_none());

        let signed_with_key = sign(Some(&k), b"y");
        assert!(unsign(None, &signed_with_key).is_none());
    }
}
