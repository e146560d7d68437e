//! TLS 1.2 key schedule.
//!
//! # References
//!
//! * [RFC 5246 Section 6.3](https://datatracker.ietf.org/doc/html/rfc5246#section-6.3)
//! * [RFC 5246 Section 8.1](https://datatracker.ietf.org/doc/html/rfc5246#section-8.1)

use crate::{
    alert::AlertDescription,
    crypto::{prf, MAC_LEN},
};
use log::error;
use rand_core::{CryptoRng, RngCore};
use sha2::{Digest, Sha256};

pub(crate) const RANDOM_LEN: usize = 32;
pub(crate) const PRE_MASTER_SECRET_LEN: usize = 48;
pub(crate) const MASTER_SECRET_LEN: usize = 48;
pub(crate) const VERIFY_DATA_LEN: usize = 12;

const WRITE_KEY_LEN: usize = 16;
const IV_SEED_LEN: usize = 16;

/// `key_block` expansion, partitioned by direction and purpose.
///
/// ```text
/// key_block = PRF(SecurityParameters.master_secret,
///                 "key expansion",
///                 SecurityParameters.server_random +
///                 SecurityParameters.client_random);
/// ```
///
/// The 16 octets expanded past the four keys seed the per-record explicit
/// IV derivation on the write side.
pub(crate) struct KeyBlock {
    pub client_mac_key: [u8; MAC_LEN],
    pub server_mac_key: [u8; MAC_LEN],
    pub client_key: [u8; WRITE_KEY_LEN],
    pub server_key: [u8; WRITE_KEY_LEN],
    pub iv_seed: [u8; IV_SEED_LEN],
}

const KEY_BLOCK_LEN: usize = 2 * MAC_LEN + 2 * WRITE_KEY_LEN + IV_SEED_LEN;

/// Per-connection handshake secrets and transcript.
///
/// The invariant chain: the key block exists only if the master secret
/// exists, which exists only if both randoms are present.  Neither the
/// pre-master secret nor the master secret survives into a new connection.
pub(crate) struct KeySchedule {
    client_random: [u8; RANDOM_LEN],
    server_random: Option<[u8; RANDOM_LEN]>,
    pre_master_secret: Option<[u8; PRE_MASTER_SECRET_LEN]>,
    master_secret: Option<[u8; MASTER_SECRET_LEN]>,

    // https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.8
    // The transcript is the concatenation of every handshake message sent
    // or received, in order, excluding HelloRequest.  It is kept as raw
    // octets rather than a running hash because the CertificateVerify
    // signer consumes the bytes themselves.
    transcript: Vec<u8>,
}

impl Default for KeySchedule {
    fn default() -> Self {
        Self {
            client_random: [0; RANDOM_LEN],
            server_random: None,
            pre_master_secret: None,
            master_secret: None,
            transcript: Vec::new(),
        }
    }
}

impl KeySchedule {
    /// Generate the client random and pre-master secret.
    ///
    /// Called exactly once, at connection start.
    pub fn initialize<R: RngCore + CryptoRng>(&mut self, rng: &mut R) {
        rng.fill_bytes(&mut self.client_random);

        // https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.7.1
        // pre_master_secret = client_version + 46 random octets
        let mut pre_master_secret: [u8; PRE_MASTER_SECRET_LEN] = [0; PRE_MASTER_SECRET_LEN];
        pre_master_secret[..2].copy_from_slice(&crate::PROTOCOL_VERSION);
        rng.fill_bytes(&mut pre_master_secret[2..]);
        self.pre_master_secret = Some(pre_master_secret);
    }

    pub fn client_random(&self) -> &[u8; RANDOM_LEN] {
        &self.client_random
    }

    pub fn set_server_random(&mut self, random: [u8; RANDOM_LEN]) {
        self.server_random = Some(random);
    }

    pub fn pre_master_secret(&self) -> Result<&[u8; PRE_MASTER_SECRET_LEN], AlertDescription> {
        self.pre_master_secret.as_ref().ok_or_else(|| {
            error!("pre-master secret is not available");
            AlertDescription::InternalError
        })
    }

    pub fn append_transcript(&mut self, msg: &[u8]) {
        self.transcript.extend_from_slice(msg);
    }

    /// The raw transcript octets, as consumed by the CertificateVerify
    /// signer.
    pub fn transcript(&self) -> &[u8] {
        &self.transcript
    }

    fn transcript_hash(&self) -> [u8; 32] {
        Sha256::digest(&self.transcript).into()
    }

    /// `master_secret = PRF(pre_master_secret, "master secret",
    ///                      ClientHello.random + ServerHello.random)[0..47]`
    ///
    /// Consumes the pre-master secret.
    pub fn derive_master_secret(&mut self) -> Result<(), AlertDescription> {
        let pre_master_secret: [u8; PRE_MASTER_SECRET_LEN] =
            self.pre_master_secret.take().ok_or_else(|| {
                error!("master secret derivation without a pre-master secret");
                AlertDescription::InternalError
            })?;
        let server_random: [u8; RANDOM_LEN] = self.server_random.ok_or_else(|| {
            error!("master secret derivation without the server random");
            AlertDescription::InternalError
        })?;

        let mut seed: [u8; 2 * RANDOM_LEN] = [0; 2 * RANDOM_LEN];
        seed[..RANDOM_LEN].copy_from_slice(&self.client_random);
        seed[RANDOM_LEN..].copy_from_slice(&server_random);

        let mut master_secret: [u8; MASTER_SECRET_LEN] = [0; MASTER_SECRET_LEN];
        prf(&pre_master_secret, b"master secret", &seed, &mut master_secret);
        self.master_secret = Some(master_secret);
        Ok(())
    }

    pub fn key_block(&self) -> Result<KeyBlock, AlertDescription> {
        let master_secret: &[u8; MASTER_SECRET_LEN] = self.master_secret()?;
        let server_random: [u8; RANDOM_LEN] = self.server_random.ok_or_else(|| {
            error!("key block expansion without the server random");
            AlertDescription::InternalError
        })?;

        // key expansion seeds with the randoms swapped relative to the
        // master secret derivation
        let mut seed: [u8; 2 * RANDOM_LEN] = [0; 2 * RANDOM_LEN];
        seed[..RANDOM_LEN].copy_from_slice(&server_random);
        seed[RANDOM_LEN..].copy_from_slice(&self.client_random);

        let mut block: [u8; KEY_BLOCK_LEN] = [0; KEY_BLOCK_LEN];
        prf(master_secret, b"key expansion", &seed, &mut block);

        let (client_mac_key, rest) = block.split_at(MAC_LEN);
        let (server_mac_key, rest) = rest.split_at(MAC_LEN);
        let (client_key, rest) = rest.split_at(WRITE_KEY_LEN);
        let (server_key, iv_seed) = rest.split_at(WRITE_KEY_LEN);

        Ok(KeyBlock {
            client_mac_key: client_mac_key.try_into().unwrap(),
            server_mac_key: server_mac_key.try_into().unwrap(),
            client_key: client_key.try_into().unwrap(),
            server_key: server_key.try_into().unwrap(),
            iv_seed: iv_seed.try_into().unwrap(),
        })
    }

    /// `verify_data = PRF(master_secret, "client finished",
    ///                    Hash(handshake_messages))[0..11]`
    pub fn client_verify_data(&self) -> Result<[u8; VERIFY_DATA_LEN], AlertDescription> {
        self.verify_data(b"client finished")
    }

    /// As [`client_verify_data`](Self::client_verify_data), with the
    /// transcript extended through the client Finished message.
    pub fn server_verify_data(&self) -> Result<[u8; VERIFY_DATA_LEN], AlertDescription> {
        self.verify_data(b"server finished")
    }

    fn verify_data(&self, label: &[u8]) -> Result<[u8; VERIFY_DATA_LEN], AlertDescription> {
        let master_secret: &[u8; MASTER_SECRET_LEN] = self.master_secret()?;
        let mut out: [u8; VERIFY_DATA_LEN] = [0; VERIFY_DATA_LEN];
        prf(master_secret, label, &self.transcript_hash(), &mut out);
        Ok(out)
    }

    fn master_secret(&self) -> Result<&[u8; MASTER_SECRET_LEN], AlertDescription> {
        self.master_secret.as_ref().ok_or_else(|| {
            error!("master secret is not available");
            AlertDescription::InternalError
        })
    }

    /// Drop everything the established connection no longer needs.
    ///
    /// The installed record keys are owned by the cipher handles; after
    /// the handshake the transcript and secrets only add memory pressure.
    pub fn discard(&mut self) {
        self.pre_master_secret = None;
        self.master_secret = None;
        self.transcript = Vec::new();
    }
}

impl ::core::fmt::Debug for KeySchedule {
    fn fmt(&self, f: &mut ::core::fmt::Formatter) -> Result<(), ::core::fmt::Error> {
        write!(f, "KeySchedule {{ ... }}")
    }
}
