//! Minimal mutually-authenticated TLS v1.2 client.
//!
//! This crate implements the record layer, handshake state machine, and
//! key schedule for a TLS 1.2 client that authenticates with a client
//! certificate and exchanges application data under
//! `TLS_RSA_WITH_AES_128_CBC_SHA`.
//!
//! The client owns the TLS framing but not the socket: it sits above any
//! reliable byte stream.  Outbound records are written to a caller-borrowed
//! [`std::io::Write`]; inbound bytes are fed to [`Client::recv`] in
//! whatever chunks the transport delivers.
//!
//! Two operations leave the core: X.509 chain verification and signing of
//! the CertificateVerify transcript.  Both are modeled as capabilities
//! ([`ChainVerifier`], [`HandshakeSigner`]) that may complete inline or
//! report [`Pending`](Verification::Pending) and deliver their result later
//! through [`Client::server_certificates_verified`] and
//! [`Client::handshake_messages_signed`].  While a capability is
//! outstanding the connection keeps buffering transport bytes but delivers
//! no records, so no handler ever runs out of order.
//!
//! # Warning
//!
//! ⚠️ This is not a general purpose TLS stack ⚠️
//!
//! CBC cipher suites with HMAC-SHA1 are obsolete; this profile exists for
//! interoperability with a fixed peer, not for new deployments.
//!
//! # Limitations
//!
//! * Cipher: `TLS_RSA_WITH_AES_128_CBC_SHA` only
//! * Key exchange: RSA key transport only
//! * Does not support session resumption or renegotiation
//! * Does not support ALPN or SNI
//! * Does not parse X.509; certificates are opaque octet strings
//! * Does not support TLS 1.3 or DTLS
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod alert;
mod cipher_suites;
mod crypto;
mod handshake;
mod key_schedule;
mod record;
mod state;

pub use alert::{Alert, AlertDescription, AlertLevel};
pub use handshake::SignatureScheme;
pub use rand_core;
pub use rsa;

use crypto::{Decryptor, Encryptor};
use handshake::{
    certificate, certificate_request, certificate_verify, client_hello, client_key_exchange,
    finished, server_hello, HandshakeHeader, HandshakeType,
};
use key_schedule::{KeyBlock, KeySchedule, VERIFY_DATA_LEN};
use log::{debug, error, info, warn};
use rand_core::{CryptoRng, RngCore};
use record::{ContentType, Deframer, FragmentBuffer, Message, RecordHeader, MAX_FRAGMENT_LEN};
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use state::{transition_path, Node};
use std::io::Write;
use subtle::ConstantTimeEq;

pub(crate) const PROTOCOL_VERSION: [u8; 2] = [0x03, 0x03];

/// TLS errors.
///
/// Every error is fatal to the connection.  When the failure is detected
/// locally a matching fatal alert is sent to the server on a best-effort
/// basis before the error is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Alert raised by this client; the description names the failure.
    Client(Alert),
    /// Fatal alert received from the server.
    Server(Alert),
    /// Tried to [`Client::write`] before the handshake completed.
    NotReady,
    /// The connection already finished, by `close_notify` in either
    /// direction or an earlier fatal error.
    Closed,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Error::Client(alert) => write!(f, "client alert: {:?}", alert.description),
            Error::Server(alert) => write!(f, "server alert: {:?}", alert.description),
            Error::NotReady => write!(f, "connection is not established"),
            Error::Closed => write!(f, "connection is closed"),
        }
    }
}

impl std::error::Error for Error {}

/// TLS events.
///
/// Returned by [`Client::recv`] and the capability callbacks, in the order
/// they occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The handshake finished; application data can be read and written.
    Connected,
    /// New application data was received; drain it with [`Client::read`].
    ApplicationData,
    /// The server sent `close_notify`.
    Disconnected,
}

/// Outcome of starting a chain verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// The chain is trusted; the handshake continues immediately.
    Verified,
    /// Verification completes out-of-band; the caller will invoke
    /// [`Client::server_certificates_verified`] exactly once on success.
    Pending,
}

/// Outcome of starting a transcript signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signing {
    /// The signature is ready.
    Signed {
        /// Signature and hash algorithm pair, sent on the wire.
        scheme: SignatureScheme,
        /// PKCS#1 signature octets.
        signature: Vec<u8>,
    },
    /// Signing completes out-of-band; the caller will invoke
    /// [`Client::handshake_messages_signed`] exactly once on success.
    Pending,
}

/// X.509 chain verification capability.
///
/// The core treats certificates as opaque DER blobs; everything that
/// requires ASN.1 lives behind this trait.
pub trait ChainVerifier {
    /// Extract the RSA subject public key from the end-entity certificate.
    ///
    /// Invoked once, when the server Certificate message arrives.  The key
    /// encrypts the pre-master secret.
    fn subject_public_key(&mut self, cert: &[u8]) -> Result<RsaPublicKey, AlertDescription>;

    /// Start verification of the server chain, ordered end-entity first.
    ///
    /// Reject the chain by returning an error; `BadCertificate` is the
    /// conventional description.
    fn verify_chain(&mut self, certs: &[Vec<u8>]) -> Result<Verification, AlertDescription>;
}

/// CertificateVerify signing capability.
///
/// `transcript` is the concatenation of every handshake message exchanged
/// so far, in wire order; the signature proves possession of the client
/// certificate's private key.
pub trait HandshakeSigner {
    /// Start signing the handshake transcript.
    fn sign(&mut self, transcript: &[u8]) -> Result<Signing, AlertDescription>;
}

/// The default in-process signer: RSASSA-PKCS1-v1_5 over SHA-256.
pub struct Pkcs1Signer {
    key: RsaPrivateKey,
}

impl Pkcs1Signer {
    /// Create a signer from the client certificate's private key.
    pub fn new(key: RsaPrivateKey) -> Self {
        Self { key }
    }
}

impl HandshakeSigner for Pkcs1Signer {
    fn sign(&mut self, transcript: &[u8]) -> Result<Signing, AlertDescription> {
        let digest = Sha256::digest(transcript);
        match self.key.sign(Pkcs1v15Sign::new::<Sha256>(), &digest) {
            Ok(signature) => Ok(Signing::Signed {
                scheme: SignatureScheme::RsaPkcs1Sha256,
                signature,
            }),
            Err(e) => {
                error!("RSA signing failed: {e}");
                Err(AlertDescription::DecryptError)
            }
        }
    }
}

/// TLS client connection.
///
/// One `Client` drives one connection from ClientHello to close.  All
/// record parsing, state transitions, and cryptography run inline on the
/// calling thread; the only suspension points are the two external
/// capabilities.
///
/// The type parameters are the capabilities: `V` verifies the server
/// chain, `S` signs the CertificateVerify transcript.
pub struct Client<V, S> {
    verifier: V,
    signer: S,
    client_certificates: Vec<Vec<u8>>,

    state: Node,
    keys: KeySchedule,
    server_certificates: Vec<Vec<u8>>,
    server_public_key: Option<RsaPublicKey>,
    key_block: Option<KeyBlock>,

    encryptor: Option<Encryptor>,
    decryptor: Option<Decryptor>,

    deframer: Deframer,
    fragments: FragmentBuffer,
    plaintext: Vec<u8>,
    closed: bool,
}

impl<V: ChainVerifier, S: HandshakeSigner> Client<V, S> {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `verifier` - Chain verification capability.
    /// * `signer` - Transcript signing capability; [`Pkcs1Signer`] is the
    ///   in-process default.
    /// * `client_certificates` - DER certificates presented to the server,
    ///   end-entity first.  May be empty; a Certificate message is sent
    ///   regardless.
    pub fn new(verifier: V, signer: S, client_certificates: Vec<Vec<u8>>) -> Self {
        Self {
            verifier,
            signer,
            client_certificates,
            state: Node::Root,
            keys: KeySchedule::default(),
            server_certificates: Vec::new(),
            server_public_key: None,
            key_block: None,
            encryptor: None,
            decryptor: None,
            deframer: Deframer::default(),
            fragments: FragmentBuffer::default(),
            plaintext: Vec::new(),
            closed: false,
        }
    }

    /// Start the handshake by sending ClientHello.
    ///
    /// Generates the client random and the pre-master secret.  Must be
    /// called exactly once, immediately after transport establishment.
    pub fn connect<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
    ) -> Result<(), Error> {
        if self.state != Node::Root {
            error!("connect called twice");
            return Err(self.fail(transport, AlertDescription::InternalError));
        }
        self.keys.initialize(rng);

        let mut events: Vec<Event> = Vec::new();
        self.transition(transport, &mut events, Node::Start)
            .map_err(|description| self.fail(transport, description))
    }

    /// Feed bytes received from the transport.
    ///
    /// Drives the record layer and handshake; returns the events that
    /// occurred, in order.  Input after the connection finished is
    /// discarded.
    pub fn recv<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
        data: &[u8],
    ) -> Result<Vec<Event>, Error> {
        let mut events: Vec<Event> = Vec::new();
        if self.closed {
            debug!("discarding {} bytes received after close", data.len());
            return Ok(events);
        }
        self.deframer.extend(data);
        self.pump(transport, rng, &mut events)?;
        Ok(events)
    }

    /// Drain the application data received so far.
    pub fn read(&mut self) -> Vec<u8> {
        core::mem::take(&mut self.plaintext)
    }

    /// Send application data.
    ///
    /// Fails with [`Error::NotReady`] until [`Event::Connected`] has been
    /// emitted.  Data longer than one record is split transparently.
    pub fn write<W: Write>(&mut self, transport: &mut W, data: &[u8]) -> Result<(), Error> {
        if self.closed {
            return Err(Error::Closed);
        }
        if self.state != Node::Established {
            return Err(Error::NotReady);
        }
        for chunk in data.chunks(MAX_FRAGMENT_LEN) {
            if let Err(description) =
                self.socket_write(transport, ContentType::ApplicationData, chunk)
            {
                return Err(self.fail(transport, description));
            }
        }
        Ok(())
    }

    /// Close the connection gracefully by sending `close_notify`.
    ///
    /// The caller tears down the transport afterwards.  Closing twice is a
    /// no-op.
    pub fn close<W: Write>(&mut self, transport: &mut W) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }
        let alert: Alert = Alert::new_warning(AlertDescription::CloseNotify);
        // best effort, the connection is finished either way
        let _ = self.socket_write(
            transport,
            ContentType::Alert,
            &[alert.level.into(), alert.description.into()],
        );
        self.closed = true;
        Ok(())
    }

    /// Returns `true` once the handshake has completed and the connection
    /// is still open.
    pub fn connected(&self) -> bool {
        self.state == Node::Established && !self.closed
    }

    /// Deliver a successful chain verification.
    ///
    /// Invoked by the external verifier after it reported
    /// [`Verification::Pending`].  Ignored unless the connection is
    /// actually suspended on verification, so late or duplicate callbacks
    /// are harmless.
    pub fn server_certificates_verified<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
    ) -> Result<Vec<Event>, Error> {
        let mut events: Vec<Event> = Vec::new();
        if self.state != Node::VerifyServerCertificate {
            warn!(
                "ignoring certificate verification callback in state {:?}",
                self.state
            );
            return Ok(events);
        }
        self.certificates_verified(transport, &mut events)
            .map_err(|description| self.fail(transport, description))?;
        self.pump(transport, rng, &mut events)?;
        Ok(events)
    }

    /// Deliver a completed transcript signature.
    ///
    /// Invoked by the external signer after it reported
    /// [`Signing::Pending`].  Ignored unless the connection is suspended
    /// on signing.
    pub fn handshake_messages_signed<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
        scheme: SignatureScheme,
        signature: &[u8],
    ) -> Result<Vec<Event>, Error> {
        let mut events: Vec<Event> = Vec::new();
        if self.state != Node::CertificateVerify {
            warn!("ignoring signature callback in state {:?}", self.state);
            return Ok(events);
        }
        self.signed(transport, &mut events, scheme, signature)
            .map_err(|description| self.fail(transport, description))?;
        self.pump(transport, rng, &mut events)?;
        Ok(events)
    }

    /// Decode and dispatch everything the buffers can currently yield.
    ///
    /// Stops at the first incomplete record, on suspension, and on close.
    fn pump<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
        events: &mut Vec<Event>,
    ) -> Result<(), Error> {
        loop {
            if self.closed || self.state.is_suspended() {
                return Ok(());
            }

            // staged messages first: a record may carry several
            match self.fragments.next_message() {
                Err(description) => return Err(self.fail(transport, description)),
                Ok(Some(message)) => {
                    self.dispatch(transport, rng, events, message)?;
                    continue;
                }
                Ok(None) => (),
            }

            match self.deframer.next_record() {
                Err(description) => return Err(self.fail(transport, description)),
                Ok(None) => return Ok(()),
                Ok(Some((content_type, payload))) => {
                    let fragment: Vec<u8> = match self.decryptor.as_mut() {
                        Some(decryptor) => match decryptor.decrypt(content_type, &payload) {
                            Ok(fragment) => fragment,
                            Err(description) => return Err(self.fail(transport, description)),
                        },
                        None => payload,
                    };
                    if let Err(description) = self.fragments.push(content_type, &fragment) {
                        return Err(self.fail(transport, description));
                    }
                }
            }
        }
    }

    fn dispatch<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
        events: &mut Vec<Event>,
        message: Message,
    ) -> Result<(), Error> {
        let result: Result<(), AlertDescription> = match message {
            Message::Alert(alert) => return self.handle_alert(alert, events),
            Message::ChangeCipherSpec => self.handle_change_cipher_spec(transport, events),
            Message::Handshake(msg) => self.handle_handshake(transport, rng, events, msg),
            Message::ApplicationData(data) => self.handle_application_data(data, events),
        };
        result.map_err(|description| self.fail(transport, description))
    }

    fn handle_alert(&mut self, alert: Alert, events: &mut Vec<Event>) -> Result<(), Error> {
        if alert.description == AlertDescription::CloseNotify {
            info!("close_notify received");
            self.closed = true;
            self.deframer.clear();
            self.fragments.clear();
            events.push(Event::Disconnected);
            Ok(())
        } else if alert.level == AlertLevel::Warning {
            warn!("ignoring warning alert {:?}", alert.description);
            Ok(())
        } else {
            error!("fatal alert from server: {:?}", alert.description);
            self.closed = true;
            self.deframer.clear();
            self.fragments.clear();
            Err(Error::Server(alert))
        }
    }

    fn handle_change_cipher_spec<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
    ) -> Result<(), AlertDescription> {
        if self.state != Node::ChangeCipherSpec {
            error!("unexpected ChangeCipherSpec in state {:?}", self.state);
            return Err(AlertDescription::UnexpectedMessage);
        }
        let key_block: &KeyBlock = self
            .key_block
            .as_ref()
            .ok_or(AlertDescription::InternalError)?;
        self.decryptor = Some(Decryptor::new(
            key_block.server_key,
            key_block.server_mac_key,
        ));
        self.transition(transport, events, Node::ServerFinished)
    }

    fn handle_application_data(
        &mut self,
        data: Vec<u8>,
        events: &mut Vec<Event>,
    ) -> Result<(), AlertDescription> {
        if self.state != Node::Established {
            error!("application data in state {:?}", self.state);
            return Err(AlertDescription::UnexpectedMessage);
        }
        if !data.is_empty() {
            self.plaintext.extend_from_slice(&data);
            events.push(Event::ApplicationData);
        }
        Ok(())
    }

    fn handle_handshake<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
        events: &mut Vec<Event>,
        msg: Vec<u8>,
    ) -> Result<(), AlertDescription> {
        let header = HandshakeHeader::from(
            <[u8; HandshakeHeader::LEN]>::try_from(&msg[..HandshakeHeader::LEN]).unwrap(),
        );
        let msg_type: HandshakeType = match header.msg_type() {
            Ok(msg_type) => msg_type,
            Err(value) => {
                error!("invalid handshake type {}", value);
                return Err(AlertDescription::UnexpectedMessage);
            }
        };

        // https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.1
        // HelloRequest may arrive at any time and is never hashed
        if msg_type == HandshakeType::HelloRequest {
            debug!("ignoring HelloRequest");
            return Ok(());
        }

        // the inbound Finished is verified against the transcript that
        // precedes it, so it is appended only after verification
        if msg_type != HandshakeType::Finished {
            self.keys.append_transcript(&msg);
        }

        let body: &[u8] = &msg[HandshakeHeader::LEN..];
        match (self.state, msg_type) {
            (Node::Start, HandshakeType::ServerHello) => {
                let hello: server_hello::ServerHello = server_hello::parse(body)?;
                self.keys.set_server_random(hello.random);
                self.transition(transport, events, Node::ServerCertificate)
            }
            (Node::ServerCertificate, HandshakeType::Certificate) => {
                let certificates: Vec<Vec<u8>> = certificate::parse(body)?;
                let end_entity: &Vec<u8> = certificates.first().ok_or_else(|| {
                    error!("server sent an empty certificate list");
                    AlertDescription::BadCertificate
                })?;
                self.server_public_key = Some(self.verifier.subject_public_key(end_entity)?);
                self.server_certificates = certificates;
                self.transition(transport, events, Node::CertificateRequest)
            }
            (Node::CertificateRequest, HandshakeType::CertificateRequest) => {
                certificate_request::parse(body)?;
                self.transition(transport, events, Node::ServerHelloDone)
            }
            (Node::ServerHelloDone, HandshakeType::ServerHelloDone) => {
                if !body.is_empty() {
                    error!("ServerHelloDone with a {} octet body", body.len());
                    return Err(AlertDescription::DecodeError);
                }
                self.send_client_certificate(transport)?;
                self.send_client_key_exchange(transport, rng)?;
                self.transition(transport, events, Node::VerifyServerCertificate)
            }
            (Node::ServerFinished, HandshakeType::Finished) => {
                self.handle_server_finished(transport, events, &msg)
            }
            (state, msg_type) => {
                error!("unexpected {:?} in state {:?}", msg_type, state);
                Err(AlertDescription::UnexpectedMessage)
            }
        }
    }

    fn handle_server_finished<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
        msg: &[u8],
    ) -> Result<(), AlertDescription> {
        let body: &[u8] = &msg[HandshakeHeader::LEN..];
        if body.len() != VERIFY_DATA_LEN {
            error!(
                "expected verify_data length {} got {}",
                VERIFY_DATA_LEN,
                body.len()
            );
            return Err(AlertDescription::DecodeError);
        }

        let expected: [u8; VERIFY_DATA_LEN] = self.keys.server_verify_data()?;
        if !bool::from(body.ct_eq(expected.as_slice())) {
            error!("server Finished verify_data mismatch");
            return Err(AlertDescription::DecryptError);
        }

        self.keys.append_transcript(msg);
        self.transition(transport, events, Node::Established)
    }

    /// Chain verification succeeded; move on to signing.
    fn certificates_verified<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
    ) -> Result<(), AlertDescription> {
        self.transition(transport, events, Node::CertificateVerify)
    }

    /// The transcript signature is ready: send CertificateVerify, switch
    /// to the negotiated cipher, and prove the handshake with Finished.
    fn signed<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
        scheme: SignatureScheme,
        signature: &[u8],
    ) -> Result<(), AlertDescription> {
        let msg: Vec<u8> = certificate_verify::ser(scheme, signature);
        self.send_handshake(transport, &msg)?;

        self.change_cipher_spec(transport)?;

        let verify_data: [u8; VERIFY_DATA_LEN] = self.keys.client_verify_data()?;
        let msg: [u8; VERIFY_DATA_LEN + 4] = finished::ser(&verify_data);
        self.send_handshake(transport, &msg)?;

        self.transition(transport, events, Node::ChangeCipherSpec)
    }

    /// Derive the connection keys, send ChangeCipherSpec, and install the
    /// write cipher.  Every record sent afterwards is protected.
    fn change_cipher_spec<W: Write>(&mut self, transport: &mut W) -> Result<(), AlertDescription> {
        self.keys.derive_master_secret()?;
        let key_block: KeyBlock = self.keys.key_block()?;

        self.socket_write(transport, ContentType::ChangeCipherSpec, &[0x01])?;

        self.encryptor = Some(Encryptor::new(
            key_block.client_key,
            key_block.client_mac_key,
            key_block.iv_seed,
        ));
        self.key_block = Some(key_block);
        Ok(())
    }

    fn send_client_certificate<W: Write>(
        &mut self,
        transport: &mut W,
    ) -> Result<(), AlertDescription> {
        let msg: Vec<u8> = certificate::ser(&self.client_certificates);
        self.send_handshake(transport, &msg)
    }

    fn send_client_key_exchange<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        transport: &mut W,
        rng: &mut R,
    ) -> Result<(), AlertDescription> {
        let public_key: &RsaPublicKey = self
            .server_public_key
            .as_ref()
            .ok_or(AlertDescription::InternalError)?;
        let pre_master_secret: &[u8] = self.keys.pre_master_secret()?;

        let encrypted: Vec<u8> = public_key
            .encrypt(rng, Pkcs1v15Encrypt, pre_master_secret)
            .map_err(|e| {
                error!("RSA encryption of the pre-master secret failed: {e}");
                AlertDescription::InternalError
            })?;

        let msg: Vec<u8> = client_key_exchange::ser(&encrypted);
        self.send_handshake(transport, &msg)
    }

    /// Append an outbound handshake message to the transcript and write it
    /// as one record.
    fn send_handshake<W: Write>(
        &mut self,
        transport: &mut W,
        msg: &[u8],
    ) -> Result<(), AlertDescription> {
        self.keys.append_transcript(msg);
        self.socket_write(transport, ContentType::Handshake, msg)
    }

    /// Write exactly one record, protected when the write cipher is
    /// installed.
    fn socket_write<W: Write>(
        &mut self,
        transport: &mut W,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<(), AlertDescription> {
        debug_assert!(fragment.len() <= MAX_FRAGMENT_LEN);

        let protected: Vec<u8>;
        let payload: &[u8] = match self.encryptor.as_mut() {
            Some(encryptor) => {
                protected = encryptor.encrypt(content_type, fragment)?;
                &protected
            }
            None => fragment,
        };

        let header: RecordHeader = RecordHeader::ser(content_type, payload.len() as u16);
        let mut record: Vec<u8> = Vec::with_capacity(RecordHeader::LEN + payload.len());
        record.extend_from_slice(header.as_bytes());
        record.extend_from_slice(payload);

        // one write per record, so records never interleave
        transport.write_all(&record).map_err(|e| {
            error!("transport write failed: {e}");
            AlertDescription::InternalError
        })
    }

    /// Move to `next`, running exit hooks up to the common ancestor and
    /// enter hooks down to the destination.
    fn transition<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
        next: Node,
    ) -> Result<(), AlertDescription> {
        let (exits, enters): (Vec<Node>, Vec<Node>) = transition_path(self.state, next);
        for node in exits {
            self.on_exit(node);
        }
        self.state = next;
        for node in enters {
            self.on_enter(transport, events, node)?;
        }
        Ok(())
    }

    fn on_exit(&mut self, node: Node) {
        if node == Node::Handshake {
            // long-lived connections keep only the record keys
            self.keys.discard();
            self.server_certificates = Vec::new();
            self.server_public_key = None;
            self.key_block = None;
        }
    }

    fn on_enter<W: Write>(
        &mut self,
        transport: &mut W,
        events: &mut Vec<Event>,
        node: Node,
    ) -> Result<(), AlertDescription> {
        match node {
            Node::Start => {
                let msg: Vec<u8> = client_hello::ser(self.keys.client_random());
                self.send_handshake(transport, &msg)
            }
            Node::VerifyServerCertificate => {
                match self.verifier.verify_chain(&self.server_certificates)? {
                    Verification::Verified => self.certificates_verified(transport, events),
                    Verification::Pending => {
                        debug!("waiting for the chain verifier");
                        Ok(())
                    }
                }
            }
            Node::CertificateVerify => match self.signer.sign(self.keys.transcript())? {
                Signing::Signed { scheme, signature } => {
                    self.signed(transport, events, scheme, &signature)
                }
                Signing::Pending => {
                    debug!("waiting for the handshake signer");
                    Ok(())
                }
            },
            Node::Established => {
                info!("handshake finished");
                events.push(Event::Connected);
                Ok(())
            }
            Node::Root
            | Node::Handshake
            | Node::ServerCertificate
            | Node::CertificateRequest
            | Node::ServerHelloDone
            | Node::ChangeCipherSpec
            | Node::ServerFinished => Ok(()),
        }
    }

    /// Record a local fatal failure: send the matching alert on a best
    /// effort basis and finish the connection.
    fn fail<W: Write>(&mut self, transport: &mut W, description: AlertDescription) -> Error {
        let alert: Alert = Alert::new_fatal(description);
        if !self.closed {
            let _ = self.socket_write(
                transport,
                ContentType::Alert,
                &[alert.level.into(), alert.description.into()],
            );
        }
        self.closed = true;
        self.deframer.clear();
        self.fragments.clear();
        Error::Client(alert)
    }
}

impl<V, S> core::fmt::Debug for Client<V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> Result<(), core::fmt::Error> {
        f.debug_struct("Client")
            .field("state", &self.state)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::prf;
    use rand_core::OsRng;

    struct TestVerifier {
        key: RsaPublicKey,
        pending: bool,
    }

    impl ChainVerifier for TestVerifier {
        fn subject_public_key(&mut self, _cert: &[u8]) -> Result<RsaPublicKey, AlertDescription> {
            Ok(self.key.clone())
        }

        fn verify_chain(&mut self, certs: &[Vec<u8>]) -> Result<Verification, AlertDescription> {
            assert!(!certs.is_empty());
            if self.pending {
                Ok(Verification::Pending)
            } else {
                Ok(Verification::Verified)
            }
        }
    }

    struct PendingSigner;

    impl HandshakeSigner for PendingSigner {
        fn sign(&mut self, _transcript: &[u8]) -> Result<Signing, AlertDescription> {
            Ok(Signing::Pending)
        }
    }

    const SERVER_RANDOM: [u8; 32] = [0x5A; 32];
    const SERVER_CERT: [u8; 16] = [0xDE; 16];
    const RSA_BITS: usize = 1024;

    fn record(content_type: ContentType, payload: &[u8]) -> Vec<u8> {
        let mut bytes: Vec<u8> = vec![
            content_type.into(),
            0x03,
            0x03,
            (payload.len() >> 8) as u8,
            payload.len() as u8,
        ];
        bytes.extend_from_slice(payload);
        bytes
    }

    fn split_records(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut records: Vec<(u8, Vec<u8>)> = Vec::new();
        let mut rest: &[u8] = bytes;
        while !rest.is_empty() {
            assert_eq!(rest[1..3], [0x03, 0x03]);
            let len: usize = u16::from_be_bytes([rest[3], rest[4]]).into();
            records.push((rest[0], rest[5..5 + len].to_vec()));
            rest = &rest[5 + len..];
        }
        records
    }

    fn server_hello_msg() -> Vec<u8> {
        let mut body: Vec<u8> = vec![0x03, 0x03];
        body.extend_from_slice(&SERVER_RANDOM);
        body.push(0);
        body.extend_from_slice(&[0x00, 0x2F, 0x00]);
        handshake::message(HandshakeType::ServerHello, &body)
    }

    fn certificate_request_msg() -> Vec<u8> {
        handshake::message(
            HandshakeType::CertificateRequest,
            &[1, 0x01, 0x00, 0x02, 0x04, 0x01, 0x00, 0x00],
        )
    }

    fn server_flight() -> Vec<Vec<u8>> {
        vec![
            server_hello_msg(),
            certificate::ser(&[SERVER_CERT.to_vec()]),
            certificate_request_msg(),
            handshake::message(HandshakeType::ServerHelloDone, &[]),
        ]
    }

    /// Everything the scripted server derives once it has decrypted the
    /// pre-master secret.
    struct ServerKeys {
        master_secret: [u8; 48],
        client_mac_key: [u8; 20],
        server_mac_key: [u8; 20],
        client_key: [u8; 16],
        server_key: [u8; 16],
    }

    fn derive_server_keys(pre_master_secret: &[u8], client_random: &[u8; 32]) -> ServerKeys {
        let mut seed: [u8; 64] = [0; 64];
        seed[..32].copy_from_slice(client_random);
        seed[32..].copy_from_slice(&SERVER_RANDOM);
        let mut master_secret: [u8; 48] = [0; 48];
        prf(pre_master_secret, b"master secret", &seed, &mut master_secret);

        seed[..32].copy_from_slice(&SERVER_RANDOM);
        seed[32..].copy_from_slice(client_random);
        let mut block: [u8; 88] = [0; 88];
        prf(&master_secret, b"key expansion", &seed, &mut block);

        ServerKeys {
            master_secret,
            client_mac_key: block[..20].try_into().unwrap(),
            server_mac_key: block[20..40].try_into().unwrap(),
            client_key: block[40..56].try_into().unwrap(),
            server_key: block[56..72].try_into().unwrap(),
        }
    }

    fn verify_data(master_secret: &[u8; 48], label: &[u8], transcript: &[u8]) -> [u8; 12] {
        let mut out: [u8; 12] = [0; 12];
        prf(master_secret, label, &Sha256::digest(transcript), &mut out);
        out
    }

    enum ServerFinishedMode {
        Good,
        WrongVerifyData,
        FlippedCiphertext,
    }

    /// Drive a full handshake against a scripted server, replaying the
    /// client flight through the server-side key derivation.
    fn run_handshake(
        mode: ServerFinishedMode,
    ) -> (
        Client<TestVerifier, Pkcs1Signer>,
        Result<Vec<Event>, Error>,
        Vec<u8>,
        ServerKeys,
        Decryptor,
        Encryptor,
    ) {
        let server_rsa: RsaPrivateKey = RsaPrivateKey::new(&mut OsRng, RSA_BITS).unwrap();
        let client_rsa: RsaPrivateKey = RsaPrivateKey::new(&mut OsRng, RSA_BITS).unwrap();
        let client_rsa_public: RsaPublicKey = client_rsa.to_public_key();

        let mut client: Client<TestVerifier, Pkcs1Signer> = Client::new(
            TestVerifier {
                key: server_rsa.to_public_key(),
                pending: false,
            },
            Pkcs1Signer::new(client_rsa),
            vec![vec![0xC1; 24]],
        );

        let mut out: Vec<u8> = Vec::new();
        client.connect(&mut out, &mut OsRng).unwrap();

        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 22);
        let client_hello: Vec<u8> = records[0].1.clone();
        assert_eq!(client_hello[0], 1);
        let client_random: [u8; 32] = client_hello[6..38].try_into().unwrap();

        let mut transcript: Vec<u8> = client_hello;
        let mut flight: Vec<u8> = Vec::new();
        for msg in server_flight() {
            flight.extend_from_slice(&record(ContentType::Handshake, &msg));
            transcript.extend_from_slice(&msg);
        }

        out.clear();
        let events: Vec<Event> = client.recv(&mut out, &mut OsRng, &flight).unwrap();
        assert!(events.is_empty());

        // Certificate, ClientKeyExchange, CertificateVerify, CCS, Finished
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(records.len(), 5);
        assert_eq!(
            records.iter().map(|r| r.0).collect::<Vec<u8>>(),
            [22, 22, 22, 20, 22]
        );

        // client Certificate carries the configured chain
        assert_eq!(records[0].1[0], 11);
        transcript.extend_from_slice(&records[0].1);

        // recover the pre-master secret with the server's private key
        let client_key_exchange: &[u8] = &records[1].1;
        assert_eq!(client_key_exchange[0], 16);
        let encrypted: &[u8] = &client_key_exchange[6..];
        assert_eq!(
            u16::from_be_bytes([client_key_exchange[4], client_key_exchange[5]]) as usize,
            encrypted.len()
        );
        let pre_master_secret: Vec<u8> =
            server_rsa.decrypt(Pkcs1v15Encrypt, encrypted).unwrap();
        assert_eq!(pre_master_secret.len(), 48);
        assert_eq!(&pre_master_secret[..2], &[0x03, 0x03]);
        transcript.extend_from_slice(&records[1].1);

        // CertificateVerify signs the transcript up to ClientKeyExchange
        let certificate_verify: &[u8] = &records[2].1;
        assert_eq!(certificate_verify[0], 15);
        assert_eq!(&certificate_verify[4..6], &[0x04, 0x01]);
        let signature: &[u8] = &certificate_verify[8..];
        let to_be_signed: &[u8] = &transcript;
        client_rsa_public
            .verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(to_be_signed),
                signature,
            )
            .unwrap();
        transcript.extend_from_slice(&records[2].1);

        // ChangeCipherSpec
        assert_eq!(records[3].1, [0x01]);

        let keys: ServerKeys = derive_server_keys(&pre_master_secret, &client_random);
        let mut client_write_decryptor = Decryptor::new(keys.client_key, keys.client_mac_key);

        // client Finished decrypts and verifies under the client write keys
        let finished: Vec<u8> = client_write_decryptor
            .decrypt(ContentType::Handshake, &records[4].1)
            .unwrap();
        assert_eq!(&finished[..4], &[20, 0, 0, 12]);
        let expected: [u8; 12] = verify_data(&keys.master_secret, b"client finished", &transcript);
        assert_eq!(&finished[4..], &expected);
        transcript.extend_from_slice(&finished);

        // server ChangeCipherSpec and Finished
        let mut server_write_encryptor =
            Encryptor::new(keys.server_key, keys.server_mac_key, [0x3C; 16]);
        let mut server_verify_data: [u8; 12] =
            verify_data(&keys.master_secret, b"server finished", &transcript);
        if matches!(mode, ServerFinishedMode::WrongVerifyData) {
            server_verify_data[11] ^= 0x01;
        }
        let mut finished_payload: Vec<u8> = server_write_encryptor
            .encrypt(ContentType::Handshake, &finished::ser(&server_verify_data))
            .unwrap();
        if matches!(mode, ServerFinishedMode::FlippedCiphertext) {
            let last: usize = finished_payload.len() - 1;
            finished_payload[last] ^= 0x01;
        }

        let mut flight: Vec<u8> = record(ContentType::ChangeCipherSpec, &[0x01]);
        flight.extend_from_slice(&record(ContentType::Handshake, &finished_payload));

        out.clear();
        let result: Result<Vec<Event>, Error> = client.recv(&mut out, &mut OsRng, &flight);
        (
            client,
            result,
            out,
            keys,
            client_write_decryptor,
            server_write_encryptor,
        )
    }

    #[test]
    fn handshake_happy_path() {
        let (mut client, result, _, _, mut client_write_decryptor, mut server_write_encryptor) =
            run_handshake(ServerFinishedMode::Good);
        assert_eq!(result.unwrap(), vec![Event::Connected]);
        assert!(client.connected());

        // client to server application data
        let mut out: Vec<u8> = Vec::new();
        client.write(&mut out, b"ping").unwrap();
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 23);
        let plaintext: Vec<u8> = client_write_decryptor
            .decrypt(ContentType::ApplicationData, &records[0].1)
            .unwrap();
        assert_eq!(plaintext, b"ping");

        // server to client application data
        let payload: Vec<u8> = server_write_encryptor
            .encrypt(ContentType::ApplicationData, b"pong")
            .unwrap();
        out.clear();
        let events: Vec<Event> = client
            .recv(&mut out, &mut OsRng, &record(ContentType::ApplicationData, &payload))
            .unwrap();
        assert_eq!(events, vec![Event::ApplicationData]);
        assert_eq!(client.read(), b"pong");
        assert!(client.read().is_empty());

        // graceful shutdown from the server
        let payload: Vec<u8> = server_write_encryptor
            .encrypt(ContentType::Alert, &[1, 0])
            .unwrap();
        let events: Vec<Event> = client
            .recv(&mut out, &mut OsRng, &record(ContentType::Alert, &payload))
            .unwrap();
        assert_eq!(events, vec![Event::Disconnected]);
        assert!(!client.connected());
        assert_eq!(client.write(&mut out, b"late").unwrap_err(), Error::Closed);
    }

    #[test]
    fn server_finished_tamper_fails_decrypt_error() {
        let (client, result, out, _, mut client_write_decryptor, _) =
            run_handshake(ServerFinishedMode::WrongVerifyData);
        assert_eq!(
            result.unwrap_err(),
            Error::Client(Alert::new_fatal(AlertDescription::DecryptError))
        );
        assert!(!client.connected());

        // the outgoing fatal alert is protected with the client write keys;
        // the returned decryptor already consumed the Finished sequence number
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 21);
        let alert: Vec<u8> = client_write_decryptor
            .decrypt(ContentType::Alert, &records[0].1)
            .unwrap();
        assert_eq!(alert, [2, 51]);
    }

    #[test]
    fn server_finished_bit_flip_fails_bad_record_mac() {
        let (client, result, _, _, _, _) = run_handshake(ServerFinishedMode::FlippedCiphertext);
        assert_eq!(
            result.unwrap_err(),
            Error::Client(Alert::new_fatal(AlertDescription::BadRecordMac))
        );
        assert!(!client.connected());
    }

    #[test]
    fn deferred_capabilities_and_buffered_records() {
        let server_rsa: RsaPrivateKey = RsaPrivateKey::new(&mut OsRng, RSA_BITS).unwrap();

        let mut client: Client<TestVerifier, PendingSigner> = Client::new(
            TestVerifier {
                key: server_rsa.to_public_key(),
                pending: true,
            },
            PendingSigner,
            Vec::new(),
        );

        let mut out: Vec<u8> = Vec::new();
        client.connect(&mut out, &mut OsRng).unwrap();

        let mut flight: Vec<u8> = Vec::new();
        for msg in server_flight() {
            flight.extend_from_slice(&record(ContentType::Handshake, &msg));
        }
        out.clear();
        let events: Vec<Event> = client.recv(&mut out, &mut OsRng, &flight).unwrap();
        assert!(events.is_empty());

        // suspended on the verifier after emitting Certificate and
        // ClientKeyExchange
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(
            records.iter().map(|r| r.0).collect::<Vec<u8>>(),
            [22, 22]
        );

        // records arriving during suspension are buffered, not dispatched
        let events: Vec<Event> = client
            .recv(&mut out, &mut OsRng, &record(ContentType::ChangeCipherSpec, &[0x01]))
            .unwrap();
        assert!(events.is_empty());

        // verification completes; now suspended on the signer
        out.clear();
        let events: Vec<Event> = client
            .server_certificates_verified(&mut out, &mut OsRng)
            .unwrap();
        assert!(events.is_empty());
        assert!(split_records(&out).is_empty());

        // signature completes; the client flight flushes and the buffered
        // ChangeCipherSpec is finally delivered
        let events: Vec<Event> = client
            .handshake_messages_signed(
                &mut out,
                &mut OsRng,
                SignatureScheme::RsaPkcs1Sha256,
                &[0xA7; 128],
            )
            .unwrap();
        assert!(events.is_empty());
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(
            records.iter().map(|r| r.0).collect::<Vec<u8>>(),
            [22, 20, 22]
        );

        // late callbacks are ignored
        assert!(client
            .server_certificates_verified(&mut out, &mut OsRng)
            .unwrap()
            .is_empty());
        assert!(client
            .handshake_messages_signed(
                &mut out,
                &mut OsRng,
                SignatureScheme::RsaPkcs1Sha256,
                &[0xA7; 128]
            )
            .unwrap()
            .is_empty());
    }

    #[test]
    fn unexpected_message_is_fatal() {
        let server_rsa: RsaPrivateKey = RsaPrivateKey::new(&mut OsRng, RSA_BITS).unwrap();
        let mut client: Client<TestVerifier, PendingSigner> = Client::new(
            TestVerifier {
                key: server_rsa.to_public_key(),
                pending: false,
            },
            PendingSigner,
            Vec::new(),
        );

        let mut out: Vec<u8> = Vec::new();
        client.connect(&mut out, &mut OsRng).unwrap();

        // Certificate before ServerHello
        let msg: Vec<u8> = certificate::ser(&[SERVER_CERT.to_vec()]);
        out.clear();
        let result = client.recv(&mut out, &mut OsRng, &record(ContentType::Handshake, &msg));
        assert_eq!(
            result.unwrap_err(),
            Error::Client(Alert::new_fatal(AlertDescription::UnexpectedMessage))
        );

        // the fatal alert went out in the clear
        let records: Vec<(u8, Vec<u8>)> = split_records(&out);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0, 21);
        assert_eq!(records[0].1, [2, 10]);
    }
}
