use super::HandshakeType;
use crate::key_schedule::VERIFY_DATA_LEN;

/// Serialize a Finished message (not including the record header).
///
/// # References
///
/// * [RFC 5246 Section 7.4.9](https://datatracker.ietf.org/doc/html/rfc5246#section-7.4.9)
pub(crate) fn ser(verify_data: &[u8; VERIFY_DATA_LEN]) -> [u8; VERIFY_DATA_LEN + 4] {
    let mut buf: [u8; VERIFY_DATA_LEN + 4] = [0; VERIFY_DATA_LEN + 4];
    buf[0] = HandshakeType::Finished.into();
    buf[3] = VERIFY_DATA_LEN as u8;
    buf[4..].copy_from_slice(verify_data);
    buf
}

#[cfg(test)]
mod tests {
    use super::ser;

    #[test]
    fn layout() {
        let msg: [u8; 16] = ser(&[0x42; 12]);
        assert_eq!(msg[..4], [20, 0, 0, 12]);
        assert_eq!(msg[4..], [0x42; 12]);
    }
}
