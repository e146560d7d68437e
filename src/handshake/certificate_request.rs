use super::Reader;
use crate::alert::AlertDescription;
use log::{debug, error};

/// Parse the CertificateRequest message body.
///
/// The request is always answered with the caller's certificate list, so
/// only the framing is validated: the certificate types and distinguished
/// names are parsed past and discarded.
///
/// # References
///
/// * [RFC 5246 Section 7.4.4](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.4)
///
/// ```text
/// struct {
///     ClientCertificateType certificate_types<1..2^8-1>;
///     SignatureAndHashAlgorithm supported_signature_algorithms<2..2^16-2>;
///     DistinguishedName certificate_authorities<0..2^16-1>;
/// } CertificateRequest;
/// ```
pub(crate) fn parse(body: &[u8]) -> Result<(), AlertDescription> {
    let mut reader: Reader = Reader::new(body);

    let types_len: usize = reader.next_u8()?.into();
    reader.skip(types_len)?;

    let algorithms_len: usize = reader.next_u16()?.into();
    if algorithms_len % 2 != 0 {
        error!(
            "supported_signature_algorithms length {} is odd",
            algorithms_len
        );
        return Err(AlertDescription::DecodeError);
    }
    reader.skip(algorithms_len)?;

    debug!(
        "ignoring {} octets of distinguished names",
        reader.remaining()
    );
    Ok(())
}
