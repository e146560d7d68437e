//! AES-128-CBC with HMAC-SHA1 record protection.
//!
//! MAC-then-encrypt with an explicit IV, as used by
//! `TLS_RSA_WITH_AES_128_CBC_SHA` under TLS 1.2.
//!
//! # References
//!
//! * [RFC 5246 Section 6.2.3.2](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.3.2)

use crate::{alert::AlertDescription, record::ContentType, PROTOCOL_VERSION};
use aes::{
    cipher::{
        block_padding::NoPadding, generic_array::GenericArray, BlockDecryptMut, BlockEncrypt,
        BlockEncryptMut, KeyInit, KeyIvInit,
    },
    Aes128,
};
use hmac::{Hmac, Mac};
use log::error;
use sha1::Sha1;
use subtle::{Choice, ConstantTimeEq};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

pub(crate) const KEY_LEN: usize = 16;
pub(crate) const MAC_LEN: usize = 20;
pub(crate) const BLOCK_LEN: usize = 16;

/// 64-bit record sequence number.
///
/// One instance exists per direction.  Each use emits the pre-increment
/// value; running out of sequence numbers is fatal to the connection.
///
/// # References
///
/// * [RFC 5246 Section 6.1](https://datatracker.ietf.org/doc/html/rfc5246#section-6.1)
#[derive(Debug, Default)]
pub(crate) struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn fetch_increment(&mut self) -> Result<u64, AlertDescription> {
        let current: u64 = self.0;
        self.0 = self.0.checked_add(1).ok_or_else(|| {
            error!("record sequence number overflow");
            AlertDescription::InternalError
        })?;
        Ok(current)
    }
}

/// `MAC(MAC_write_key, seq_num + type + version + length + fragment)`
fn record_mac(
    mac_key: &[u8; MAC_LEN],
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> [u8; MAC_LEN] {
    let mut mac = <Hmac<Sha1> as Mac>::new_from_slice(mac_key).unwrap();
    mac.update(&seq.to_be_bytes());
    mac.update(&[content_type.into()]);
    mac.update(&PROTOCOL_VERSION);
    mac.update(&(fragment.len() as u16).to_be_bytes());
    mac.update(fragment);
    mac.finalize().into_bytes().into()
}

/// Derive the explicit IV for one outgoing record by encrypting a counter:
/// the write sequence number is folded into the trailing octets of the IV
/// seed block and the result is passed through the write key's AES
/// permutation.  Distinct sequence numbers give distinct IVs, and the IV is
/// independent of the plaintext.
fn derive_iv(key: &[u8; KEY_LEN], seed: &[u8; BLOCK_LEN], seq: u64) -> [u8; BLOCK_LEN] {
    let mut block: [u8; BLOCK_LEN] = *seed;
    seq.to_be_bytes()
        .iter()
        .enumerate()
        .for_each(|(idx, byte)| block[idx + 8] ^= byte);

    let cipher = Aes128::new((&*key).into());
    let mut block = aes::Block::from(block);
    cipher.encrypt_block(&mut block);
    block.into()
}

/// Write-direction record protection.
///
/// Installed when the client sends ChangeCipherSpec; immutable afterwards
/// apart from the sequence number.
pub(crate) struct Encryptor {
    key: [u8; KEY_LEN],
    mac_key: [u8; MAC_LEN],
    iv_seed: [u8; BLOCK_LEN],
    seq: SequenceNumber,
}

impl Encryptor {
    pub fn new(key: [u8; KEY_LEN], mac_key: [u8; MAC_LEN], iv_seed: [u8; BLOCK_LEN]) -> Self {
        Self {
            key,
            mac_key,
            iv_seed,
            seq: SequenceNumber::default(),
        }
    }

    /// Protect one record fragment.
    ///
    /// Returns `IV + AES-128-CBC(fragment + MAC + padding)`.
    pub fn encrypt(
        &mut self,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<Vec<u8>, AlertDescription> {
        let seq: u64 = self.seq.fetch_increment()?;
        let mac: [u8; MAC_LEN] = record_mac(&self.mac_key, seq, content_type, fragment);
        let iv: [u8; BLOCK_LEN] = derive_iv(&self.key, &self.iv_seed, seq);

        // every padding octet, the trailing length octet included, equals
        // pad_len - 1
        let pad_len: usize = BLOCK_LEN - ((fragment.len() + MAC_LEN) % BLOCK_LEN);

        let mut out: Vec<u8> =
            Vec::with_capacity(BLOCK_LEN + fragment.len() + MAC_LEN + pad_len);
        out.extend_from_slice(&iv);
        out.extend_from_slice(fragment);
        out.extend_from_slice(&mac);
        out.resize(out.len() + pad_len, (pad_len - 1) as u8);

        let ct_len: usize = out.len() - BLOCK_LEN;
        Aes128CbcEnc::new((&self.key).into(), (&iv).into())
            .encrypt_padded_mut::<NoPadding>(&mut out[BLOCK_LEN..], ct_len)
            .map_err(|_| AlertDescription::InternalError)?;

        Ok(out)
    }
}

/// Read-direction record protection.
///
/// Installed when the server's ChangeCipherSpec is received.
pub(crate) struct Decryptor {
    key: [u8; KEY_LEN],
    mac_key: [u8; MAC_LEN],
    seq: SequenceNumber,
}

impl Decryptor {
    pub fn new(key: [u8; KEY_LEN], mac_key: [u8; MAC_LEN]) -> Self {
        Self {
            key,
            mac_key,
            seq: SequenceNumber::default(),
        }
    }

    /// Deprotect one record payload (`IV + ciphertext`).
    ///
    /// Padding and MAC verdicts are combined into a single comparison so
    /// that both failures are indistinguishable in timing and error code.
    pub fn decrypt(
        &mut self,
        content_type: ContentType,
        payload: &[u8],
    ) -> Result<Vec<u8>, AlertDescription> {
        // shortest valid payload: IV + MAC and padding rounded up to blocks
        if payload.len() < 3 * BLOCK_LEN || payload.len() % BLOCK_LEN != 0 {
            error!("ciphertext length {} is malformed", payload.len());
            return Err(AlertDescription::BadRecordMac);
        }

        let (iv, ciphertext): (&[u8], &[u8]) = payload.split_at(BLOCK_LEN);
        let mut dec: Vec<u8> = ciphertext.to_vec();
        Aes128CbcDec::new((&self.key).into(), GenericArray::from_slice(iv))
            .decrypt_padded_mut::<NoPadding>(&mut dec)
            .map_err(|_| AlertDescription::BadRecordMac)?;

        let seq: u64 = self.seq.fetch_increment()?;

        let pad_len: usize = usize::from(dec[dec.len() - 1]) + 1;
        let pad_in_range: bool = pad_len + MAC_LEN <= dec.len();
        // clamp out-of-range padding so the MAC is still computed; the
        // in-range flag is folded into the final verdict
        let clamped: usize = if pad_in_range { pad_len } else { 1 };

        let mut pad_ok: Choice = Choice::from(u8::from(pad_in_range));
        let pad_byte: u8 = (clamped - 1) as u8;
        for byte in &dec[dec.len() - clamped..] {
            pad_ok &= byte.ct_eq(&pad_byte);
        }

        let fragment_len: usize = dec.len() - clamped - MAC_LEN;
        let expected: [u8; MAC_LEN] =
            record_mac(&self.mac_key, seq, content_type, &dec[..fragment_len]);
        let mac_ok: Choice = dec[fragment_len..fragment_len + MAC_LEN].ct_eq(&expected);

        if bool::from(pad_ok & mac_ok) {
            dec.truncate(fragment_len);
            Ok(dec)
        } else {
            error!("record deprotection failed");
            Err(AlertDescription::BadRecordMac)
        }
    }
}

impl ::core::fmt::Debug for Encryptor {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> Result<(), ::core::fmt::Error> {
        write!(f, "Encryptor {{ ... }}")
    }
}

impl ::core::fmt::Debug for Decryptor {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> Result<(), ::core::fmt::Error> {
        write!(f, "Decryptor {{ ... }}")
    }
}
