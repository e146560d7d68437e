use super::{message, uint24, HandshakeType, Reader};
use crate::alert::AlertDescription;
use log::error;

/// Parse a Certificate message body into the ordered list of DER blobs.
///
/// Certificates are opaque to this client; chain validation and key
/// extraction belong to the external verifier.
///
/// # References
///
/// * [RFC 5246 Section 7.4.2](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.2)
///
/// ```text
/// struct {
///     ASN.1Cert certificate_list<0..2^24-1>;
/// } Certificate;
/// ```
pub(crate) fn parse(body: &[u8]) -> Result<Vec<Vec<u8>>, AlertDescription> {
    let mut reader: Reader = Reader::new(body);

    let total: usize = reader.next_u24()?;
    if total != reader.remaining() {
        error!(
            "certificate_list length {} != remaining {}",
            total,
            reader.remaining()
        );
        return Err(AlertDescription::DecodeError);
    }

    let mut certificates: Vec<Vec<u8>> = Vec::new();
    while !reader.is_empty() {
        let len: usize = reader.next_u24()?;
        certificates.push(reader.next_slice(len)?.to_vec());
    }

    Ok(certificates)
}

/// Serialize the client Certificate message.
///
/// Always sent in this profile, possibly with zero entries when the caller
/// holds no client certificate.
pub(crate) fn ser(certificates: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = certificates.iter().map(|cert| 3 + cert.len()).sum();

    let mut body: Vec<u8> = Vec::with_capacity(3 + total);
    body.extend_from_slice(&uint24(total));
    for cert in certificates {
        body.extend_from_slice(&uint24(cert.len()));
        body.extend_from_slice(cert);
    }

    message(HandshakeType::Certificate, &body)
}

#[cfg(test)]
mod tests {
    use super::{parse, ser};
    use crate::alert::AlertDescription;

    #[test]
    fn ser_parse_round_trip() {
        let certificates: Vec<Vec<u8>> = vec![vec![0x30, 0x82, 0x01], vec![0x30; 300]];
        let msg: Vec<u8> = ser(&certificates);
        assert_eq!(parse(&msg[4..]).unwrap(), certificates);
    }

    #[test]
    fn empty_list() {
        let msg: Vec<u8> = ser(&[]);
        assert_eq!(msg, &[11, 0, 0, 3, 0, 0, 0]);
        assert!(parse(&msg[4..]).unwrap().is_empty());
    }

    #[test]
    fn total_length_mismatch() {
        // claims 4 octets but carries 3
        assert_eq!(
            parse(&[0, 0, 4, 0, 0, 0]).unwrap_err(),
            AlertDescription::DecodeError
        );
    }

    #[test]
    fn truncated_entry() {
        // entry claims 2 octets but only 1 remains
        assert_eq!(
            parse(&[0, 0, 4, 0, 0, 2, 0xAA]).unwrap_err(),
            AlertDescription::DecodeError
        );
    }
}
