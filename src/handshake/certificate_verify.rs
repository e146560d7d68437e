use super::{message, HandshakeType, SignatureScheme};

/// Serialize the CertificateVerify message.
///
/// The signature covers every handshake message exchanged so far, in wire
/// order; producing it is the external signer's job.
///
/// # References
///
/// * [RFC 5246 Section 7.4.8](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.8)
///
/// ```text
/// struct {
///     SignatureAndHashAlgorithm algorithm;
///     opaque signature<0..2^16-1>;
/// } DigitallySigned;
/// ```
pub(crate) fn ser(scheme: SignatureScheme, signature: &[u8]) -> Vec<u8> {
    let mut body: Vec<u8> = Vec::with_capacity(4 + signature.len());
    body.extend_from_slice(&scheme.value());
    body.extend_from_slice(&(signature.len() as u16).to_be_bytes());
    body.extend_from_slice(signature);
    message(HandshakeType::CertificateVerify, &body)
}
