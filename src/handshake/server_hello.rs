use super::Reader;
use crate::{
    alert::AlertDescription,
    cipher_suites::CipherSuite,
    key_schedule::RANDOM_LEN,
    PROTOCOL_VERSION,
};
use log::{debug, error};

const MAX_SESSION_ID_LEN: usize = 32;

#[derive(Debug)]
pub(crate) struct ServerHello {
    pub random: [u8; RANDOM_LEN],
    /// Echoed session identifier; parsed but otherwise unused because this
    /// client never resumes sessions.
    #[allow(dead_code)]
    pub session_id: Vec<u8>,
}

/// Parse the ServerHello message body.
///
/// # References
///
/// * [RFC 5246 Section 7.4.1.3](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.1.3)
///
/// ```text
/// struct {
///     ProtocolVersion server_version;
///     Random random;
///     SessionID session_id;
///     CipherSuite cipher_suite;
///     CompressionMethod compression_method;
///     select (extensions_present) { ... };
/// } ServerHello;
/// ```
pub(crate) fn parse(body: &[u8]) -> Result<ServerHello, AlertDescription> {
    let mut reader: Reader = Reader::new(body);

    let version: [u8; 2] = reader.next_n()?;
    if version != PROTOCOL_VERSION {
        error!(
            "expected server_version {:02X}{:02X} got {:02X}{:02X}",
            PROTOCOL_VERSION[0], PROTOCOL_VERSION[1], version[0], version[1]
        );
        return Err(AlertDescription::ProtocolVersion);
    }

    let random: [u8; RANDOM_LEN] = reader.next_n()?;

    let session_id_len: usize = reader.next_u8()?.into();
    if session_id_len > MAX_SESSION_ID_LEN {
        error!("session_id length {} exceeds 32", session_id_len);
        return Err(AlertDescription::DecodeError);
    }
    let session_id: Vec<u8> = reader.next_slice(session_id_len)?.to_vec();

    let cipher_suite: [u8; 2] = reader.next_n()?;
    match CipherSuite::try_from(cipher_suite) {
        Ok(CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA) => (),
        Ok(suite) => {
            error!("server selected unsupported cipher suite {:?}", suite);
            return Err(AlertDescription::HandshakeFailure);
        }
        Err(value) => {
            error!(
                "server selected unknown cipher suite {:02X}{:02X}",
                value[0], value[1]
            );
            return Err(AlertDescription::HandshakeFailure);
        }
    }

    let compression_method: u8 = reader.next_u8()?;
    if compression_method != 0 {
        error!("server selected compression method {}", compression_method);
        return Err(AlertDescription::HandshakeFailure);
    }

    // extensions were not offered; anything echoed back is irrelevant
    if !reader.is_empty() {
        debug!("ignoring {} octets of extensions", reader.remaining());
    }

    Ok(ServerHello { random, session_id })
}
