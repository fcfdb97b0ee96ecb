//! Framed byte format for packed objects.
//!
//! A packed object is a 32-byte header followed by a postcard-encoded
//! payload, optionally zstd-compressed.
//!
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       4     Magic ("NTAB")
//! 4       1     Version major
//! 5       1     Version minor
//! 6       1     Object kind
//! 7       1     Reserved
//! 8       2     Flags (bitfield)
//! 10      2     Reserved
//! 12      4     Payload size (bytes, as stored)
//! 16      4     CRC32 of the stored payload
//! 20      8     Element count (informational)
//! 28      4     Reserved
//! ```
//!
//! All integers are little-endian.

use std::io::{Read, Write};

use bon::Builder;
use thiserror::Error;

/// Magic bytes opening every packed object.
pub const MAGIC: &[u8; 4] = b"NTAB";

pub const CURRENT_VERSION_MAJOR: u8 = 1;

pub const CURRENT_VERSION_MINOR: u8 = 0;

pub const HEADER_SIZE: usize = 32;

/// Payloads at least this large are compressed when enabled.
#[cfg(feature = "compression")]
pub const COMPRESSION_THRESHOLD: usize = 32 * 1024;

/// Default cap on the size of a decompressed payload (4 GiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u64 = u32::MAX as u64;

// ============================================================================
// Object kind
// ============================================================================

/// Kind of object stored in a packed byte sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ObjectKind {
    HomogenTable = 0,
    SoaTable = 1,
    AosTable = 2,
    PackedTriangular = 3,
    RowMergedTable = 4,
    MergedTable = 5,
    Tensor = 6,
    Collection = 7,
    KeyedCollection = 8,
}

impl ObjectKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => Self::HomogenTable,
            1 => Self::SoaTable,
            2 => Self::AosTable,
            3 => Self::PackedTriangular,
            4 => Self::RowMergedTable,
            5 => Self::MergedTable,
            6 => Self::Tensor,
            7 => Self::Collection,
            8 => Self::KeyedCollection,
            _ => return None,
        })
    }

    pub fn is_table(self) -> bool {
        (self as u8) <= (Self::MergedTable as u8)
    }
}

// ============================================================================
// Flags
// ============================================================================

/// Header flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FormatFlags(u16);

impl FormatFlags {
    /// Payload is zstd-compressed.
    pub const COMPRESSED: u16 = 1 << 0;

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, flag: u16) -> bool {
        (self.0 & flag) != 0
    }

    pub fn set(&mut self, flag: u16) {
        self.0 |= flag;
    }
}

// ============================================================================
// Header
// ============================================================================

/// Parsed form of the 32-byte header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatHeader {
    pub version_major: u8,
    pub version_minor: u8,
    pub kind: ObjectKind,
    pub flags: FormatFlags,
    pub payload_size: u32,
    pub checksum: u32,
    pub element_count: u64,
}

impl FormatHeader {
    pub fn new(kind: ObjectKind, element_count: u64) -> Self {
        Self {
            version_major: CURRENT_VERSION_MAJOR,
            version_minor: CURRENT_VERSION_MINOR,
            kind,
            flags: FormatFlags::empty(),
            payload_size: 0,
            checksum: 0,
            element_count,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = self.version_major;
        buf[5] = self.version_minor;
        buf[6] = self.kind as u8;
        buf[8..10].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.checksum.to_le_bytes());
        buf[20..28].copy_from_slice(&self.element_count.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Result<Self, DeserializeError> {
        if &buf[0..4] != MAGIC {
            return Err(DeserializeError::NotAnObject);
        }
        let version_major = buf[4];
        let version_minor = buf[5];
        if version_major > CURRENT_VERSION_MAJOR {
            return Err(DeserializeError::UnsupportedVersion {
                major: version_major,
                minor: version_minor,
            });
        }
        let kind = ObjectKind::from_u8(buf[6])
            .ok_or_else(|| DeserializeError::CorruptPayload(format!("unknown object kind {}", buf[6])))?;

        let u32_at = |at: usize| u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]]);
        let mut count = [0u8; 8];
        count.copy_from_slice(&buf[20..28]);

        Ok(Self {
            version_major,
            version_minor,
            kind,
            flags: FormatFlags::from_bits(u16::from_le_bytes([buf[8], buf[9]])),
            payload_size: u32_at(12),
            checksum: u32_at(16),
            element_count: u64::from_le_bytes(count),
        })
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Failure while encoding an object.
#[derive(Debug, Error)]
pub enum SerializeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] postcard::Error),

    /// Encoded payload exceeds the 4 GiB header limit.
    #[error("payload of {0} bytes is too large")]
    PayloadTooLarge(usize),

    #[cfg(feature = "compression")]
    #[error("compression error: {0}")]
    Compression(std::io::Error),
}

/// Failure while decoding a packed object.
#[derive(Debug, Error)]
pub enum DeserializeError {
    /// Wrong magic bytes.
    #[error("not a packed numtab object")]
    NotAnObject,

    #[error("object requires format {major}.{minor} or later")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("input truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Payload decoded but describes an inconsistent object.
    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding error: {0}")]
    Decoding(#[from] postcard::Error),

    #[cfg(feature = "compression")]
    #[error("decompression error: {0}")]
    Decompression(std::io::Error),

    #[error("decompressed payload exceeds {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// A table was requested but the payload holds another kind of object.
    #[error("expected a table, got {0:?}")]
    NotATable(ObjectKind),

    /// Bytes hold a different kind of object than requested.
    #[error("object kind mismatch: expected {expected:?}, got {actual:?}")]
    KindMismatch { expected: ObjectKind, actual: ObjectKind },
}

// ============================================================================
// Codec
// ============================================================================

/// Encoding options used by pack and unpack.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct CodecConfig {
    /// Verify the payload CRC32 on decode (default: true).
    #[builder(default = true)]
    pub verify_checksum: bool,

    /// Compress large payloads with zstd (default: true). Ignored without
    /// the `compression` feature.
    #[builder(default = true)]
    pub compress: bool,

    /// zstd level, clamped to 1..=22 (default: 3).
    #[builder(default = 3)]
    pub compression_level: i32,

    /// Upper bound on a decompressed payload, in bytes
    /// (default: [`DEFAULT_MAX_PAYLOAD_SIZE`]).
    #[builder(default = DEFAULT_MAX_PAYLOAD_SIZE)]
    pub max_payload_size: u64,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Frames payload bytes with a header, checksum and optional compression.
#[derive(Debug, Clone, Default)]
pub struct NativeCodec {
    config: CodecConfig,
}

impl NativeCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Write header and payload; fills in size, checksum and flags.
    pub fn write_to<W: Write>(
        &self,
        writer: &mut W,
        header: &mut FormatHeader,
        payload: &[u8],
    ) -> Result<(), SerializeError> {
        #[cfg(feature = "compression")]
        let stored: std::borrow::Cow<'_, [u8]> =
            if self.config.compress && payload.len() >= COMPRESSION_THRESHOLD {
                let level = self.config.compression_level.clamp(1, 22);
                let compressed =
                    zstd::encode_all(payload, level).map_err(SerializeError::Compression)?;
                header.flags.set(FormatFlags::COMPRESSED);
                compressed.into()
            } else {
                payload.into()
            };

        #[cfg(not(feature = "compression"))]
        let stored: std::borrow::Cow<'_, [u8]> = payload.into();

        header.payload_size =
            u32::try_from(stored.len()).map_err(|_| SerializeError::PayloadTooLarge(stored.len()))?;
        header.checksum = crc32fast::hash(&stored);

        writer.write_all(&header.to_bytes())?;
        writer.write_all(&stored)?;
        Ok(())
    }

    /// Read header and payload, verifying and decompressing the payload.
    pub fn read_from<R: Read>(&self, reader: &mut R) -> Result<(FormatHeader, Vec<u8>), DeserializeError> {
        let mut header_buf = [0u8; HEADER_SIZE];
        let got = read_up_to(reader, &mut header_buf)?;
        if got < HEADER_SIZE {
            return Err(DeserializeError::Truncated {
                expected: HEADER_SIZE,
                actual: got,
            });
        }
        let header = FormatHeader::from_bytes(&header_buf)?;

        // read through `take` so a corrupt size cannot force a huge allocation
        let expected = header.payload_size as usize;
        let mut payload = Vec::new();
        reader.take(expected as u64).read_to_end(&mut payload)?;
        if payload.len() < expected {
            return Err(DeserializeError::Truncated {
                expected,
                actual: payload.len(),
            });
        }

        if self.config.verify_checksum {
            let actual = crc32fast::hash(&payload);
            if actual != header.checksum {
                return Err(DeserializeError::ChecksumMismatch {
                    expected: header.checksum,
                    actual,
                });
            }
        }

        #[cfg(feature = "compression")]
        let payload = if header.flags.contains(FormatFlags::COMPRESSED) {
            decompress(&payload, self.config.max_payload_size)?
        } else {
            payload
        };

        #[cfg(not(feature = "compression"))]
        if header.flags.contains(FormatFlags::COMPRESSED) {
            return Err(DeserializeError::CorruptPayload(
                "payload is compressed but the compression feature is not enabled".into(),
            ));
        }

        Ok((header, payload))
    }

    /// Encode `payload` with postcard and frame it.
    pub fn serialize<T: serde::Serialize>(
        &self,
        kind: ObjectKind,
        element_count: u64,
        payload: &T,
    ) -> Result<Vec<u8>, SerializeError> {
        let payload_bytes = postcard::to_allocvec(payload)?;
        let mut header = FormatHeader::new(kind, element_count);
        let mut output = Vec::with_capacity(HEADER_SIZE + payload_bytes.len());
        self.write_to(&mut output, &mut header, &payload_bytes)?;
        Ok(output)
    }

    /// Unframe and decode a payload.
    pub fn deserialize<T: for<'de> serde::Deserialize<'de>>(
        &self,
        mut bytes: &[u8],
    ) -> Result<(FormatHeader, T), DeserializeError> {
        let (header, payload_bytes) = self.read_from(&mut bytes)?;
        let payload = postcard::from_bytes(&payload_bytes)?;
        Ok((header, payload))
    }
}

/// Inflate a zstd payload, failing once the output passes `limit` bytes.
#[cfg(feature = "compression")]
fn decompress(stored: &[u8], limit: u64) -> Result<Vec<u8>, DeserializeError> {
    let decoder = zstd::stream::read::Decoder::new(stored).map_err(DeserializeError::Decompression)?;
    let mut payload = Vec::new();
    decoder
        .take(limit.saturating_add(1))
        .read_to_end(&mut payload)
        .map_err(DeserializeError::Decompression)?;
    if payload.len() as u64 > limit {
        return Err(DeserializeError::PayloadTooLarge { limit });
    }
    Ok(payload)
}

/// Fill `buf` as far as the reader allows, returning the byte count.
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, DeserializeError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn framed(payload: &[u8]) -> Vec<u8> {
        let codec = NativeCodec::default();
        let mut header = FormatHeader::new(ObjectKind::Tensor, 7);
        let mut buffer = Vec::new();
        codec.write_to(&mut buffer, &mut header, payload).unwrap();
        buffer
    }

    #[test]
    fn header_roundtrip() {
        let header = FormatHeader {
            version_major: 1,
            version_minor: 3,
            kind: ObjectKind::AosTable,
            flags: FormatFlags::from_bits(FormatFlags::COMPRESSED),
            payload_size: 4096,
            checksum: 0xCAFEBABE,
            element_count: 1 << 40,
        };
        let bytes = header.to_bytes();
        assert_eq!(&bytes[0..4], b"NTAB");
        assert_eq!(FormatHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn rejects_foreign_and_future_headers() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(b"BSTR");
        assert!(matches!(FormatHeader::from_bytes(&buf), Err(DeserializeError::NotAnObject)));

        let mut header = FormatHeader::new(ObjectKind::Collection, 0);
        header.version_major = CURRENT_VERSION_MAJOR + 1;
        assert!(matches!(
            FormatHeader::from_bytes(&header.to_bytes()),
            Err(DeserializeError::UnsupportedVersion { .. })
        ));

        let mut bytes = FormatHeader::new(ObjectKind::Tensor, 0).to_bytes();
        bytes[6] = 200;
        assert!(matches!(
            FormatHeader::from_bytes(&bytes),
            Err(DeserializeError::CorruptPayload(_))
        ));
    }

    #[test]
    fn write_read_roundtrip() {
        let buffer = framed(b"payload bytes");
        let (header, payload) = NativeCodec::default().read_from(&mut buffer.as_slice()).unwrap();
        assert_eq!(header.kind, ObjectKind::Tensor);
        assert_eq!(header.element_count, 7);
        assert_eq!(payload, b"payload bytes");
    }

    #[test]
    fn detects_corruption_unless_disabled() {
        let mut buffer = framed(b"some object data");
        buffer[HEADER_SIZE + 3] ^= 0xFF;
        let result = NativeCodec::default().read_from(&mut buffer.as_slice());
        assert!(matches!(result, Err(DeserializeError::ChecksumMismatch { .. })));

        let lenient = NativeCodec::new(CodecConfig::builder().verify_checksum(false).build());
        assert!(lenient.read_from(&mut buffer.as_slice()).is_ok());
    }

    #[test]
    fn detects_truncation() {
        let buffer = framed(b"0123456789");
        let codec = NativeCodec::default();
        assert!(matches!(
            codec.read_from(&mut &buffer[..HEADER_SIZE + 4]),
            Err(DeserializeError::Truncated { expected: 10, actual: 4 })
        ));
        assert!(matches!(
            codec.read_from(&mut &buffer[..10]),
            Err(DeserializeError::Truncated { expected: HEADER_SIZE, actual: 10 })
        ));
    }

    #[cfg(feature = "compression")]
    #[test]
    fn large_payloads_are_compressed() {
        let payload = vec![7u8; COMPRESSION_THRESHOLD * 2];
        let buffer = framed(&payload);
        assert!(buffer.len() < payload.len());
        let (header, decoded) = NativeCodec::default().read_from(&mut buffer.as_slice()).unwrap();
        assert!(header.flags.contains(FormatFlags::COMPRESSED));
        assert_eq!(decoded, payload);
    }

    #[cfg(feature = "compression")]
    #[test]
    fn decompressed_size_is_capped() {
        let payload = vec![7u8; COMPRESSION_THRESHOLD * 2];
        let buffer = framed(&payload);
        let capped = NativeCodec::new(
            CodecConfig::builder()
                .max_payload_size(COMPRESSION_THRESHOLD as u64)
                .build(),
        );
        assert!(matches!(
            capped.read_from(&mut buffer.as_slice()),
            Err(DeserializeError::PayloadTooLarge { limit }) if limit == COMPRESSION_THRESHOLD as u64
        ));

        let exact = NativeCodec::new(
            CodecConfig::builder()
                .max_payload_size(payload.len() as u64)
                .build(),
        );
        assert_eq!(exact.read_from(&mut buffer.as_slice()).unwrap().1, payload);
    }

    #[test]
    fn object_kind_bytes() {
        assert_eq!(ObjectKind::from_u8(4), Some(ObjectKind::RowMergedTable));
        assert_eq!(ObjectKind::from_u8(9), None);
        assert!(ObjectKind::MergedTable.is_table());
        assert!(!ObjectKind::Tensor.is_table());
    }

    #[test]
    fn config_defaults() {
        let config = CodecConfig::default();
        assert!(config.verify_checksum);
        assert!(config.compress);
        assert_eq!(config.compression_level, 3);
    }
}
