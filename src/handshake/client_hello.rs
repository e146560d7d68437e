use super::{message, HandshakeType};
use crate::{cipher_suites::CipherSuite, key_schedule::RANDOM_LEN, PROTOCOL_VERSION};

/// Serialize the ClientHello message.
///
/// A fixed offer: one cipher suite, null compression, no session to
/// resume, and no extensions.
///
/// # References
///
/// * [RFC 5246 Section 7.4.1.2](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.2)
///
/// ```text
/// struct {
///     ProtocolVersion client_version;
///     Random random;
///     SessionID session_id;
///     CipherSuite cipher_suites<2..2^16-2>;
///     CompressionMethod compression_methods<1..2^8-1>;
/// } ClientHello;
/// ```
pub(crate) fn ser(client_random: &[u8; RANDOM_LEN]) -> Vec<u8> {
    const CIPHER_SUITES: [u8; 2] = CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA.value();

    let mut body: Vec<u8> = Vec::with_capacity(41);
    body.extend_from_slice(&PROTOCOL_VERSION);
    body.extend_from_slice(client_random);
    // empty session_id
    body.push(0);
    // cipher_suites, one entry
    body.extend_from_slice(&(CIPHER_SUITES.len() as u16).to_be_bytes());
    body.extend_from_slice(&CIPHER_SUITES);
    // compression_methods, null only
    body.push(1);
    body.push(0);

    message(HandshakeType::ClientHello, &body)
}
