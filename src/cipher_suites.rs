/// Cipher Suites.
///
/// Only `TLS_RSA_WITH_AES_128_CBC_SHA` is ever offered or accepted; the
/// remaining mandatory-to-implement RSA suites are listed so a server's
/// selection can be reported by name.
///
/// # References
///
/// * [RFC 5246 Appendix A.5](https://datatracker.ietf.org/doc/html/rfc5246#appendix-A.5)
///
/// +-------------------------------+----------------+
/// | Description                   | Value          |
/// +-------------------------------+----------------+
/// | TLS_RSA_WITH_AES_128_CBC_SHA  | `[0x00, 0x2F]` |
/// | TLS_RSA_WITH_AES_256_CBC_SHA  | `[0x00, 0x35]` |
/// | TLS_RSA_WITH_AES_128_CBC_SHA256 | `[0x00, 0x3C]` |
/// | TLS_RSA_WITH_AES_256_CBC_SHA256 | `[0x00, 0x3D]` |
/// +-------------------------------+----------------+
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
#[allow(non_camel_case_types)]
pub enum CipherSuite {
    /// The only suite this client negotiates.
    TLS_RSA_WITH_AES_128_CBC_SHA,
    TLS_RSA_WITH_AES_256_CBC_SHA,
    TLS_RSA_WITH_AES_128_CBC_SHA256,
    TLS_RSA_WITH_AES_256_CBC_SHA256,
}

impl CipherSuite {
    pub const fn value(&self) -> [u8; 2] {
        match self {
            Self::TLS_RSA_WITH_AES_128_CBC_SHA => [0x00, 0x2F],
            Self::TLS_RSA_WITH_AES_256_CBC_SHA => [0x00, 0x35],
            Self::TLS_RSA_WITH_AES_128_CBC_SHA256 => [0x00, 0x3C],
            Self::TLS_RSA_WITH_AES_256_CBC_SHA256 => [0x00, 0x3D],
        }
    }
}

impl From<CipherSuite> for [u8; 2] {
    #[inline]
    fn from(cipher_suite: CipherSuite) -> Self {
        cipher_suite.value()
    }
}

impl TryFrom<[u8; 2]> for CipherSuite {
    type Error = [u8; 2];

    fn try_from(value: [u8; 2]) -> Result<Self, Self::Error> {
        match value {
            [0x00, 0x2F] => Ok(Self::TLS_RSA_WITH_AES_128_CBC_SHA),
            [0x00, 0x35] => Ok(Self::TLS_RSA_WITH_AES_256_CBC_SHA),
            [0x00, 0x3C] => Ok(Self::TLS_RSA_WITH_AES_128_CBC_SHA256),
            [0x00, 0x3D] => Ok(Self::TLS_RSA_WITH_AES_256_CBC_SHA256),
            _ => Err(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CipherSuite;

    #[test]
    fn value_round_trip() {
        for suite in [
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
            CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
            CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256,
        ] {
            assert_eq!(CipherSuite::try_from(suite.value()), Ok(suite));
        }
        assert_eq!(CipherSuite::try_from([0x13, 0x01]), Err([0x13, 0x01]));
    }
}
