/// Alert level.
///
/// # References
///
/// * [RFC 5246 Section 7.2](https://datatracker.ietf.org/doc/html/rfc5246#section-7.2)
///
/// ```text
/// enum { warning(1), fatal(2), (255) } AlertLevel;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[non_exhaustive]
pub enum AlertLevel {
    /// Warning.
    Warning = 1,
    /// Fatal.
    ///
    /// Also used for unknown [`AlertLevel`] values.
    Fatal = 2,
}

impl From<AlertLevel> for u8 {
    #[inline]
    fn from(alert_level: AlertLevel) -> Self {
        alert_level as u8
    }
}

impl TryFrom<u8> for AlertLevel {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::Warning as u8) => Ok(Self::Warning),
            x if x == (Self::Fatal as u8) => Ok(Self::Fatal),
            _ => Err(value),
        }
    }
}

/// Alert description.
///
/// # References
///
/// * [RFC 5246 Section 7.2](https://datatracker.ietf.org/doc/html/rfc5246#section-7.2)
///
/// ```text
/// enum {
///     close_notify(0),
///     unexpected_message(10),
///     bad_record_mac(20),
///     record_overflow(22),
///     decompression_failure(30),
///     handshake_failure(40),
///     bad_certificate(42),
///     unsupported_certificate(43),
///     certificate_revoked(44),
///     certificate_expired(45),
///     certificate_unknown(46),
///     illegal_parameter(47),
///     unknown_ca(48),
///     access_denied(49),
///     decode_error(50),
///     decrypt_error(51),
///     protocol_version(70),
///     insufficient_security(71),
///     internal_error(80),
///     user_canceled(90),
///     no_renegotiation(100),
///     unsupported_extension(110),
///     (255)
/// } AlertDescription;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum AlertDescription {
    /// The sender will not send any more messages on this connection.
    CloseNotify = 0,
    /// An inappropriate message was received, such as the wrong handshake
    /// message for the current state, or premature application data.
    UnexpectedMessage = 10,
    /// A record arrived whose MAC is incorrect, or whose CBC padding is
    /// malformed.  Both failures use this description.
    BadRecordMac = 20,
    /// A record exceeded the maximum permitted length.
    RecordOverflow = 22,
    /// The decompression function received improper input.
    DecompressionFailure = 30,
    /// No acceptable set of security parameters could be negotiated,
    /// for example an unsupported cipher suite or compression method.
    HandshakeFailure = 40,
    /// A certificate was corrupt or failed verification.
    BadCertificate = 42,
    /// A certificate was of an unsupported type.
    UnsupportedCertificate = 43,
    /// A certificate was revoked by its signer.
    CertificateRevoked = 44,
    /// A certificate has expired or is not currently valid.
    CertificateExpired = 45,
    /// Some other issue arose in processing the certificate.
    CertificateUnknown = 46,
    /// A handshake field was out of range or inconsistent with other fields.
    IllegalParameter = 47,
    /// The CA certificate could not be located or matched with a trust
    /// anchor.
    UnknownCa = 48,
    /// A valid certificate was received, but access control denied it.
    AccessDenied = 49,
    /// A message could not be decoded: a length field was out of range or
    /// the message was truncated.
    DecodeError = 50,
    /// A handshake cryptographic operation failed, including a Finished
    /// message that did not verify or a signature that could not be
    /// produced.
    DecryptError = 51,
    /// The protocol version the peer attempted to negotiate is not
    /// supported.
    ProtocolVersion = 70,
    /// The server requires parameters more secure than the client supports.
    InsufficientSecurity = 71,
    /// An internal error unrelated to the peer, such as a sequence number
    /// that can no longer be incremented.
    InternalError = 80,
    /// The handshake is being canceled for a reason unrelated to a protocol
    /// failure.
    UserCanceled = 90,
    /// Renegotiation is not appropriate.
    NoRenegotiation = 100,
    /// A handshake message contained an extension known to be prohibited.
    UnsupportedExtension = 110,
}

impl From<AlertDescription> for u8 {
    #[inline]
    fn from(alert_description: AlertDescription) -> Self {
        alert_description as u8
    }
}

impl TryFrom<u8> for AlertDescription {
    type Error = u8;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::CloseNotify as u8) => Ok(Self::CloseNotify),
            x if x == (Self::UnexpectedMessage as u8) => Ok(Self::UnexpectedMessage),
            x if x == (Self::BadRecordMac as u8) => Ok(Self::BadRecordMac),
            x if x == (Self::RecordOverflow as u8) => Ok(Self::RecordOverflow),
            x if x == (Self::DecompressionFailure as u8) => Ok(Self::DecompressionFailure),
            x if x == (Self::HandshakeFailure as u8) => Ok(Self::HandshakeFailure),
            x if x == (Self::BadCertificate as u8) => Ok(Self::BadCertificate),
            x if x == (Self::UnsupportedCertificate as u8) => Ok(Self::UnsupportedCertificate),
            x if x == (Self::CertificateRevoked as u8) => Ok(Self::CertificateRevoked),
            x if x == (Self::CertificateExpired as u8) => Ok(Self::CertificateExpired),
            x if x == (Self::CertificateUnknown as u8) => Ok(Self::CertificateUnknown),
            x if x == (Self::IllegalParameter as u8) => Ok(Self::IllegalParameter),
            x if x == (Self::UnknownCa as u8) => Ok(Self::UnknownCa),
            x if x == (Self::AccessDenied as u8) => Ok(Self::AccessDenied),
            x if x == (Self::DecodeError as u8) => Ok(Self::DecodeError),
            x if x == (Self::DecryptError as u8) => Ok(Self::DecryptError),
            x if x == (Self::ProtocolVersion as u8) => Ok(Self::ProtocolVersion),
            x if x == (Self::InsufficientSecurity as u8) => Ok(Self::InsufficientSecurity),
            x if x == (Self::InternalError as u8) => Ok(Self::InternalError),
            x if x == (Self::UserCanceled as u8) => Ok(Self::UserCanceled),
            x if x == (Self::NoRenegotiation as u8) => Ok(Self::NoRenegotiation),
            x if x == (Self::UnsupportedExtension as u8) => Ok(Self::UnsupportedExtension),
            _ => Err(value),
        }
    }
}

/// TLS Alert.
///
/// See [`AlertLevel`] and [`AlertDescription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    /// Alert level.
    pub level: AlertLevel,
    /// Alert description.
    pub description: AlertDescription,
}

impl Alert {
    pub(crate) fn new_fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub(crate) fn new_warning(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Warning,
            description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Alert, AlertDescription, AlertLevel};

    #[test]
    fn description_byte_round_trip() {
        for byte in 0..=u8::MAX {
            if let Ok(description) = AlertDescription::try_from(byte) {
                assert_eq!(u8::from(description), byte);
            }
        }
    }

    #[test]
    fn level_byte_round_trip() {
        assert_eq!(AlertLevel::try_from(1), Ok(AlertLevel::Warning));
        assert_eq!(AlertLevel::try_from(2), Ok(AlertLevel::Fatal));
        assert_eq!(AlertLevel::try_from(0), Err(0));
        assert_eq!(AlertLevel::try_from(3), Err(3));
    }

    #[test]
    fn constructors() {
        let fatal: Alert = Alert::new_fatal(AlertDescription::DecodeError);
        assert_eq!(fatal.level, AlertLevel::Fatal);
        let warning: Alert = Alert::new_warning(AlertDescription::CloseNotify);
        assert_eq!(warning.level, AlertLevel::Warning);
    }
}
