use super::{message, HandshakeType};

/// Serialize the ClientKeyExchange message for RSA key transport.
///
/// The body is the PKCS#1 v1.5 encryption of the pre-master secret under
/// the server's public key, wrapped in a 2 octet length.
///
/// # References
///
/// * [RFC 5246 Section 7.4.7.1](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.7.1)
///
/// ```text
/// struct {
///     public-key-encrypted PreMasterSecret pre_master_secret;
/// } EncryptedPreMasterSecret;
/// ```
pub(crate) fn ser(encrypted_pre_master_secret: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(2 + encrypted_pre_master_secret.len());
    body.extend_from_slice(&(encrypted_pre_master_secret.len() as u16).to_be_bytes());
    body.extend_from_slice(encrypted_pre_master_secret);
    message(HandshakeType::ClientKeyExchange, &body)
}
