use crate::{
    alert::{Alert, AlertDescription, AlertLevel},
    handshake::HandshakeHeader,
    PROTOCOL_VERSION,
};
use log::{error, warn};

/// Maximum length of a record fragment before encryption.
///
/// # References
///
/// * [RFC 5246 Section 6.2.1](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.1)
pub(crate) const MAX_FRAGMENT_LEN: usize = 1 << 14;

/// Maximum length of an encrypted record fragment.
///
/// # References
///
/// * [RFC 5246 Section 6.2.3](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.3)
pub(crate) const MAX_CIPHERTEXT_LEN: usize = MAX_FRAGMENT_LEN + 2048;

/// Content Type.
///
/// # References
///
/// * [RFC 5246 Section 6.2.1](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.1)
///
/// ```text
/// enum {
///     change_cipher_spec(20),
///     alert(21),
///     handshake(22),
///     application_data(23),
///     (255)
/// } ContentType;
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl From<ContentType> for u8 {
    #[inline]
    fn from(content_type: ContentType) -> Self {
        content_type as u8
    }
}

impl TryFrom<u8> for ContentType {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            x if x == (Self::ChangeCipherSpec as u8) => Ok(Self::ChangeCipherSpec),
            x if x == (Self::Alert as u8) => Ok(Self::Alert),
            x if x == (Self::Handshake as u8) => Ok(Self::Handshake),
            x if x == (Self::ApplicationData as u8) => Ok(Self::ApplicationData),
            _ => Err(value),
        }
    }
}

/// # References
///
/// * [RFC 5246 Section 6.2.1](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.1)
///
/// ```text
/// struct {
///     ContentType type;
///     ProtocolVersion version;
///     uint16 length;
///     opaque fragment[TLSPlaintext.length];
/// } TLSPlaintext;
/// ```
#[derive(Debug)]
pub(crate) struct RecordHeader {
    buf: [u8; Self::LEN],
}

impl RecordHeader {
    pub const LEN: usize = 5;

    pub fn content_type(&self) -> ContentType {
        // validated in deser - will never panic
        ContentType::try_from(self.buf[0]).unwrap()
    }

    pub fn length(&self) -> u16 {
        u16::from_be_bytes(self.buf[3..5].try_into().unwrap())
    }

    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.buf
    }

    pub fn ser(content_type: ContentType, data_len: u16) -> Self {
        RecordHeader {
            buf: [
                content_type.into(),
                PROTOCOL_VERSION[0],
                PROTOCOL_VERSION[1],
                (data_len >> 8) as u8,
                data_len as u8,
            ],
        }
    }

    pub fn deser(buf: [u8; Self::LEN]) -> Result<Self, AlertDescription> {
        if let Err(value) = ContentType::try_from(buf[0]) {
            error!("invalid ContentType value: 0x{:02X}", value);
            return Err(AlertDescription::UnexpectedMessage);
        }

        if buf[1..3] != PROTOCOL_VERSION {
            error!(
                "expected record version {:02X}{:02X} got {:02X}{:02X}",
                PROTOCOL_VERSION[0], PROTOCOL_VERSION[1], buf[1], buf[2]
            );
            return Err(AlertDescription::ProtocolVersion);
        }

        Ok(Self { buf })
    }
}

/// Accumulates raw transport bytes and detaches whole records.
///
/// The transport may deliver any slicing of the byte stream; a record is
/// only released once its header and full payload have arrived.
#[derive(Default)]
pub(crate) struct Deframer {
    buf: Vec<u8>,
}

impl Deframer {
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Detach the next complete record, or `None` if more bytes are needed.
    pub fn next_record(&mut self) -> Result<Option<(ContentType, Vec<u8>)>, AlertDescription> {
        if self.buf.len() < RecordHeader::LEN {
            return Ok(None);
        }

        let header: RecordHeader =
            RecordHeader::deser(self.buf[..RecordHeader::LEN].try_into().unwrap())?;

        let length: usize = header.length().into();
        if length > MAX_CIPHERTEXT_LEN {
            error!("record length {} exceeds maximum", length);
            return Err(AlertDescription::RecordOverflow);
        }

        if self.buf.len() < RecordHeader::LEN + length {
            return Ok(None);
        }

        let mut record: Vec<u8> = self.buf.split_off(RecordHeader::LEN + length);
        core::mem::swap(&mut record, &mut self.buf);
        record.drain(..RecordHeader::LEN);

        Ok(Some((header.content_type(), record)))
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

/// A complete protocol message extracted from staged record fragments.
#[derive(Debug)]
pub(crate) enum Message {
    ChangeCipherSpec,
    Alert(Alert),
    /// Full handshake message, including the 4 octet handshake header.
    Handshake(Vec<u8>),
    ApplicationData(Vec<u8>),
}

/// Reassembles protocol messages from record fragments.
///
/// A handshake message may span multiple records, and one record may hold
/// multiple messages.  Fragments of different content types must not
/// interleave while a message is incomplete.
///
/// # References
///
/// * [RFC 5246 Section 6.2.1](https://datatracker.ietf.org/doc/html/rfc5246#section-6.2.1)
#[derive(Default)]
pub(crate) struct FragmentBuffer {
    staged: Vec<u8>,
    content_type: Option<ContentType>,
}

impl FragmentBuffer {
    pub fn push(
        &mut self,
        content_type: ContentType,
        fragment: &[u8],
    ) -> Result<(), AlertDescription> {
        if !self.staged.is_empty() && self.content_type != Some(content_type) {
            error!(
                "fragment type mismatch: staged {:?} got {:?}",
                self.content_type, content_type
            );
            return Err(AlertDescription::UnexpectedMessage);
        }
        self.content_type = Some(content_type);
        self.staged.extend_from_slice(fragment);
        Ok(())
    }

    /// Extract the next complete message of the staged content type.
    ///
    /// Returns `None` when the staged bytes cannot yet form a message.
    pub fn next_message(&mut self) -> Result<Option<Message>, AlertDescription> {
        let content_type: ContentType = match self.content_type {
            Some(content_type) if !self.staged.is_empty() => content_type,
            _ => return Ok(None),
        };

        match content_type {
            ContentType::ChangeCipherSpec => {
                let value: u8 = self.detach(1)[0];
                // https://datatracker.ietf.org/doc/html/rfc5246#section-7.1
                // The message consists of a single byte of value 1.
                if value != 0x01 {
                    error!("ChangeCipherSpec value {:#04X} is not 0x01", value);
                    Err(AlertDescription::UnexpectedMessage)
                } else {
                    Ok(Some(Message::ChangeCipherSpec))
                }
            }
            ContentType::Alert => {
                if self.staged.len() < 2 {
                    return Ok(None);
                }
                let bytes: Vec<u8> = self.detach(2);
                let level: AlertLevel = match AlertLevel::try_from(bytes[0]) {
                    Ok(level) => level,
                    Err(value) => {
                        warn!("illegal alert level {}", value);
                        AlertLevel::Fatal
                    }
                };
                let description: AlertDescription = match AlertDescription::try_from(bytes[1]) {
                    Ok(description) => description,
                    Err(value) => {
                        error!("unknown alert description {}", value);
                        return Err(AlertDescription::DecodeError);
                    }
                };
                Ok(Some(Message::Alert(Alert { level, description })))
            }
            ContentType::Handshake => {
                if self.staged.len() < HandshakeHeader::LEN {
                    return Ok(None);
                }
                let header = HandshakeHeader::from(
                    <[u8; HandshakeHeader::LEN]>::try_from(&self.staged[..HandshakeHeader::LEN])
                        .unwrap(),
                );
                let length: usize = header.length() as usize;
                if self.staged.len() < HandshakeHeader::LEN + length {
                    return Ok(None);
                }
                Ok(Some(Message::Handshake(
                    self.detach(HandshakeHeader::LEN + length),
                )))
            }
            ContentType::ApplicationData => {
                let len: usize = self.staged.len();
                Ok(Some(Message::ApplicationData(self.detach(len))))
            }
        }
    }

    fn detach(&mut self, n: usize) -> Vec<u8> {
        let rest: Vec<u8> = self.staged.split_off(n);
        let msg: Vec<u8> = core::mem::replace(&mut self.staged, rest);
        if self.staged.is_empty() {
            self.content_type = None;
        }
        msg
    }

    pub fn clear(&mut self) {
        self.staged.clear();
        self.content_type = None;
    }

    #[cfg(test)]
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }
}
