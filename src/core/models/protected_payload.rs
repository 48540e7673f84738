use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use uuid::Uuid;

use crate::core::errors::{ProtectorError, Result};
use crate::core::models::key_material::FINGERPRINT_LEN;

/// Current wire format version, written as the first byte.
pub const FORMAT_VERSION: u8 = 0x01;

/// Length of an authentication tag.
pub const TAG_LEN: usize = 16;

const KEY_ID_LEN: usize = 16;

/// Output of `protect`.
///
/// Binary layout (all integers big-endian):
///
/// ```text
/// version:u8 | key_id:16 | fingerprint:16 | nonce_len:u8 | nonce
///            | ciphertext_len:u32 | ciphertext | tag:16
/// ```
///
/// Everything before `ciphertext_len` is the header, which is passed to
/// the AEAD as associated data so the tag covers it together with the
/// ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedPayload {
    pub key_id: Uuid,
    pub purpose_fingerprint: [u8; FINGERPRINT_LEN],
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl ProtectedPayload {
    /// Associated data for a payload with the given header fields.
    pub fn header_bytes(
        key_id: &Uuid,
        purpose_fingerprint: &[u8; FINGERPRINT_LEN],
        nonce: &[u8],
    ) -> Result<Vec<u8>> {
        let nonce_len = u8::try_from(nonce.len())
            .map_err(|_| ProtectorError::tampered("nonce longer than 255 bytes"))?;

        let mut out = Vec::with_capacity(1 + KEY_ID_LEN + FINGERPRINT_LEN + 1 + nonce.len());
        out.push(FORMAT_VERSION);
        out.extend_from_slice(key_id.as_bytes());
        out.extend_from_slice(purpose_fingerprint);
        out.push(nonce_len);
        out.extend_from_slice(nonce);
        Ok(out)
    }

    /// Associated data for this payload.
    pub fn aad(&self) -> Result<Vec<u8>> {
        Self::header_bytes(&self.key_id, &self.purpose_fingerprint, &self.nonce)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let ct_len = u32::try_from(self.ciphertext.len())
            .map_err(|_| ProtectorError::tampered("ciphertext larger than 4 GiB"))?;

        let mut out = self.aad()?;
        out.reserve(4 + self.ciphertext.len() + TAG_LEN);
        out.extend_from_slice(&ct_len.to_be_bytes());
        out.extend_from_slice(&self.ciphertext);
        out.extend_from_slice(&self.tag);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader::new(bytes);

        let version = reader.u8()?;
        if version != FORMAT_VERSION {
            return Err(ProtectorError::tampered(format!(
                "unsupported payload version {version:#04x}"
            )));
        }

        let key_id = Uuid::from_bytes(reader.array::<KEY_ID_LEN>()?);
        let purpose_fingerprint = reader.array::<FINGERPRINT_LEN>()?;
        let nonce_len = reader.u8()? as usize;
        let nonce = reader.take(nonce_len)?.to_vec();
        let ct_len = u32::from_be_bytes(reader.array::<4>()?) as usize;
        let ciphertext = reader.take(ct_len)?.to_vec();
        let tag = reader.array::<TAG_LEN>()?;

        if !reader.is_empty() {
            return Err(ProtectorError::tampered("trailing bytes after tag"));
        }

        Ok(Self {
            key_id,
            purpose_fingerprint,
            nonce,
            ciphertext,
            tag,
        })
    }

    /// URL-safe base64 text form, suitable for terminals and URLs.
    pub fn encode(&self) -> Result<String> {
        Ok(URL_SAFE_NO_PAD.encode(self.to_bytes()?))
    }

    pub fn decode(text: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(text.trim())
            .map_err(|e| ProtectorError::tampered(format!("invalid base64url: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

/// Bounds-checked cursor over a byte slice.
struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < n {
            return Err(ProtectorError::tampered("payload truncated"));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
