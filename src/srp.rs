//! SRP-6a client (`User`) and test-only server (`Verifier`) math, §4.6.
//!
//! Fixed 1024-bit safe prime group, generator 2, SHA-256 hash. The UTIM
//! plays the `User` (client) role in production; `Verifier` exists so the
//! test suite can exercise a full handshake (§8 invariant 4, scenarios
//! S1–S6) without a live Uhost peer.

use num_bigint::BigUint;
use rand::RngCore;
use sha2::{Digest, Sha256};

const N_HEX: &str = "\
EEAF0AB9ADB38DD69C33F80AFA8FC5E86072618775FF3C0B9EA2314C9C256576D674DF7496\
EA81D3383B4813D692C6E0E0D5D8E250B98BE48E495C1D6089DAD15DC7D7B46154D6B6CE8E\
F4AD69B15D4982559B297BCF1885C529F566660E57EC68EDBC3C05726CC02FD4CBF4976EAA\
9AFD5138FE8376435B9FC61D2FC0EB06E3";
const G: u32 = 2;

fn group() -> (BigUint, BigUint) {
    (BigUint::parse_bytes(N_HEX.as_bytes(), 16).expect("static group prime is valid hex"), BigUint::from(G))
}

/// Big-endian minimal encoding, matching the wire representation used at
/// every SRP tag (§4.6) — no fixed-width left-padding.
fn long_to_bytes(n: &BigUint) -> Vec<u8> {
    n.to_bytes_be()
}

fn sha256(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn h_int(parts: &[&[u8]]) -> BigUint {
    BigUint::from_bytes_be(&sha256(parts))
}

fn hn_xor_hg(n: &BigUint, g: &BigUint) -> [u8; 32] {
    let hn = sha256(&[&long_to_bytes(n)]);
    let hg = sha256(&[&long_to_bytes(g)]);
    let mut out = [0u8; 32];
    for i in 0..32 {
        out[i] = hn[i] ^ hg[i];
    }
    out
}

fn gen_x(salt: &[u8], username: &[u8], password: &[u8]) -> BigUint {
    let inner = sha256(&[username, b":", password]);
    h_int(&[salt, &inner])
}

fn calculate_m(n: &BigUint, g: &BigUint, identity: &[u8], s: &[u8], a: &BigUint, b: &BigUint, k: &[u8]) -> [u8; 32] {
    sha256(&[
        &hn_xor_hg(n, g),
        &sha256(&[identity]),
        s,
        &long_to_bytes(a),
        &long_to_bytes(b),
        k,
    ])
}

fn calculate_h_amk(a: &BigUint, m: &[u8], k: &[u8]) -> [u8; 32] {
    sha256(&[&long_to_bytes(a), m, k])
}

/// 32 cryptographically-random bytes with the high bit set, per §4.6.
fn random_ephemeral_secret() -> BigUint {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes[0] |= 0x80;
    BigUint::from_bytes_be(&bytes)
}

/// The SRP client role, played by the UTIM itself.
pub struct User {
    identity: Vec<u8>,
    password: Vec<u8>,
    n: BigUint,
    g: BigUint,
    k: BigUint,
    a: BigUint,
    pub a_pub: BigUint,
    s: Option<BigUint>,
    b_pub: Option<BigUint>,
    pub m: Option<[u8; 32]>,
    pub k_session: Option<[u8; 32]>,
    h_amk: Option<[u8; 32]>,
    authenticated: bool,
}

impl User {
    pub fn new(identity: Vec<u8>, password: Vec<u8>) -> Self {
        let (n, g) = group();
        let k = h_int(&[&long_to_bytes(&n), &long_to_bytes(&g)]);
        let a = random_ephemeral_secret();
        let a_pub = g.modpow(&a, &n);
        User {
            identity,
            password,
            n,
            g,
            k,
            a,
            a_pub,
            s: None,
            b_pub: None,
            m: None,
            k_session: None,
            h_amk: None,
            authenticated: false,
        }
    }

    /// `(I, A)` to send as the `HELLO` body.
    pub fn start_authentication(&self) -> (Vec<u8>, Vec<u8>) {
        (self.identity.clone(), long_to_bytes(&self.a_pub))
    }

    /// Processes the `(s, B)` challenge. Returns `M` on success, `None` on
    /// an SRP-6a safety-check violation (`B mod N = 0` or `u = 0`).
    pub fn process_challenge(&mut self, salt: &[u8], b_pub_bytes: &[u8]) -> Option<[u8; 32]> {
        let s = BigUint::from_bytes_be(salt);
        let b_pub = BigUint::from_bytes_be(b_pub_bytes);

        if (&b_pub % &self.n) == BigUint::from(0u32) {
            return None;
        }

        let u = h_int(&[&long_to_bytes(&self.a_pub), &long_to_bytes(&b_pub)]);
        if u == BigUint::from(0u32) {
            return None;
        }

        let x = gen_x(salt, &self.identity, &self.password);
        let v = self.g.modpow(&x, &self.n);

        let kv = (&self.k * &v) % &self.n;
        let base = mod_sub(&b_pub, &kv, &self.n);
        let exponent = &self.a + &u * &x;
        let shared = base.modpow(&exponent, &self.n);

        let session_secret = sha256(&[&long_to_bytes(&shared)]);
        let m = calculate_m(&self.n, &self.g, &self.identity, salt, &self.a_pub, &b_pub, &session_secret);
        let h_amk = calculate_h_amk(&self.a_pub, &m, &session_secret);

        self.s = Some(s);
        self.b_pub = Some(b_pub);
        self.k_session = Some(session_secret);
        self.m = Some(m);
        self.h_amk = Some(h_amk);
        Some(m)
    }

    /// Verifies the host's `H_AMK`. Side-effect only (matches the
    /// reference implementation): sets the authenticated flag, no return
    /// value. `session_key()` reflects authentication state.
    pub fn verify_session(&mut self, host_h_amk: &[u8]) {
        if self.h_amk.map(|v| v.as_slice() == host_h_amk).unwrap_or(false) {
            self.authenticated = true;
        }
    }

    pub fn session_key(&self) -> Option<[u8; 32]> {
        if self.authenticated {
            self.k_session
        } else {
            None
        }
    }
}

/// The SRP server role. Test-only: exercises a full handshake against
/// [`User`] without a live Uhost peer.
pub struct Verifier {
    identity: Vec<u8>,
    n: BigUint,
    g: BigUint,
    s: BigUint,
    v: BigUint,
    a_pub: BigUint,
    b: BigUint,
    pub b_pub: BigUint,
    safety_failed: bool,
    m: Option<[u8; 32]>,
    k_session: Option<[u8; 32]>,
    h_amk: Option<[u8; 32]>,
    authenticated: bool,
}

impl Verifier {
    /// Derive `(s, v)` for a given identity/password pair, as a setup step
    /// that would in production be performed once out of band.
    pub fn generate_salt_and_verifier(identity: &[u8], password: &[u8]) -> (Vec<u8>, Vec<u8>) {
        let (n, g) = group();
        let mut salt_bytes = [0u8; 4];
        rand::thread_rng().fill_bytes(&mut salt_bytes);
        let x = gen_x(&salt_bytes, identity, password);
        let v = g.modpow(&x, &n);
        (salt_bytes.to_vec(), long_to_bytes(&v))
    }

    pub fn new(identity: Vec<u8>, salt: Vec<u8>, verifier: Vec<u8>, a_pub_bytes: &[u8]) -> Self {
        let (n, g) = group();
        let k = h_int(&[&long_to_bytes(&n), &long_to_bytes(&g)]);
        let s = BigUint::from_bytes_be(&salt);
        let v = BigUint::from_bytes_be(&verifier);
        let a_pub = BigUint::from_bytes_be(a_pub_bytes);
        let safety_failed = (&a_pub % &n) == BigUint::from(0u32);

        let b = random_ephemeral_secret();
        let b_pub = (&k * &v + g.modpow(&b, &n)) % &n;

        let mut verifier = Verifier {
            identity,
            n,
            g,
            s,
            v,
            a_pub,
            b,
            b_pub,
            safety_failed,
            m: None,
            k_session: None,
            h_amk: None,
            authenticated: false,
        };
        if !verifier.safety_failed {
            verifier.finish_challenge();
        }
        verifier
    }

    fn finish_challenge(&mut self) {
        let u = h_int(&[&long_to_bytes(&self.a_pub), &long_to_bytes(&self.b_pub)]);
        let shared = (&self.a_pub * self.v.modpow(&u, &self.n) % &self.n).modpow(&self.b, &self.n);
        let session_secret = sha256(&[&long_to_bytes(&shared)]);
        let m = calculate_m(&self.n, &self.g, &self.identity, &long_to_bytes(&self.s), &self.a_pub, &self.b_pub, &session_secret);
        let h_amk = calculate_h_amk(&self.a_pub, &m, &session_secret);
        self.k_session = Some(session_secret);
        self.m = Some(m);
        self.h_amk = Some(h_amk);
    }

    /// `(s, B)` to hand back as the `TRY` challenge, or `None` if the
    /// SRP-6a safety check failed.
    pub fn challenge(&self) -> Option<(Vec<u8>, Vec<u8>)> {
        if self.safety_failed {
            None
        } else {
            Some((long_to_bytes(&self.s), long_to_bytes(&self.b_pub)))
        }
    }

    /// Verifies the user's `M`. Returns `H_AMK` on success.
    pub fn verify_session(&mut self, user_m: &[u8]) -> Option<[u8; 32]> {
        if !self.safety_failed && self.m.map(|m| m.as_slice() == user_m).unwrap_or(false) {
            self.authenticated = true;
            self.h_amk
        } else {
            None
        }
    }

    pub fn session_key(&self) -> Option<[u8; 32]> {
        if self.authenticated {
            self.k_session
        } else {
            None
        }
    }
}

fn mod_sub(a: &BigUint, b: &BigUint, modulus: &BigUint) -> BigUint {
    if a >= b {
        (a - b) % modulus
    } else {
        (modulus - ((b - a) % modulus)) % modulus
    }
}
