//! TLS 1.2 pseudorandom function.
//!
//! # References
//!
//! * [RFC 5246 Section 5](https://datatracker.ietf.org/doc/html/rfc5246#section-5)

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn hmac_sha256(secret: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = HmacSha256::new_from_slice(secret).unwrap();
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// `P_SHA256` data expansion.
///
/// ```text
/// P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) +
///                        HMAC_hash(secret, A(2) + seed) +
///                        HMAC_hash(secret, A(3) + seed) + ...
///
/// A(0) = seed
/// A(i) = HMAC_hash(secret, A(i-1))
/// ```
///
/// Output is truncated to `out.len()`, which makes every shorter output a
/// prefix of every longer one.
fn p_sha256(secret: &[u8], seed: &[u8], out: &mut [u8]) {
    let mut a: [u8; 32] = hmac_sha256(secret, seed);

    let mut written: usize = 0;
    while written < out.len() {
        let mut mac = HmacSha256::new_from_slice(secret).unwrap();
        mac.update(&a);
        mac.update(seed);
        let chunk: [u8; 32] = mac.finalize().into_bytes().into();

        let n: usize = chunk.len().min(out.len() - written);
        out[written..written + n].copy_from_slice(&chunk[..n]);
        written += n;

        a = hmac_sha256(secret, &a);
    }
}

/// `PRF(secret, label, seed) = P_SHA256(secret, label + seed)`
///
/// Fills all of `out`.
pub(crate) fn prf(secret: &[u8], label: &[u8], seed: &[u8], out: &mut [u8]) {
    let mut label_seed: Vec<u8> = Vec::with_capacity(label.len() + seed.len());
    label_seed.extend_from_slice(label);
    label_seed.extend_from_slice(seed);
    p_sha256(secret, &label_seed, out)
}
