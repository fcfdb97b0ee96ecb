//! Byte representation of serializable objects.
//!
//! [`to_bytes`] and [`from_bytes`] convert any [`Serializable`] object to
//! and from a framed byte sequence (see [`native`] for the layout). Pack
//! and unpack in [`crate::serialization`] are built on these.
//!
//! # Feature Flags
//!
//! - `compression`: zstd compression of payloads of 32 KiB and more

mod convert;
pub mod native;
pub mod payload;

pub use native::{
    CodecConfig, DeserializeError, FormatFlags, FormatHeader, NativeCodec, ObjectKind,
    SerializeError, CURRENT_VERSION_MAJOR, CURRENT_VERSION_MINOR, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE,
    MAGIC,
};
pub use payload::{
    CollectionPayload, KeyedCollectionPayload, ObjectPayload, Payload, TablePayload, TensorPayload,
};

pub(crate) use convert::kind_mismatch;

use crate::error::Result;
use crate::serialization::Serializable;

/// Encode `object` into a framed byte sequence.
pub fn to_bytes<S: Serializable>(object: &S, config: &CodecConfig) -> Result<Vec<u8>> {
    let payload = Payload::V1(object.to_payload()?);
    let codec = NativeCodec::new(config.clone());
    Ok(codec.serialize(object.object_kind(), object.element_count(), &payload)?)
}

/// Decode an object previously written by [`to_bytes`].
pub fn from_bytes<S: Serializable>(bytes: &[u8], config: &CodecConfig) -> Result<S> {
    let codec = NativeCodec::new(config.clone());
    let (header, Payload::V1(payload)) = codec.deserialize::<Payload>(bytes)?;
    if payload.kind() != header.kind {
        return Err(DeserializeError::CorruptPayload(format!(
            "header declares {:?}, payload holds {:?}",
            header.kind,
            payload.kind()
        ))
        .into());
    }
    S::from_payload(payload)
}

/// Read only the header of a framed byte sequence.
pub fn peek_header(bytes: &[u8]) -> Result<FormatHeader> {
    let header: &[u8; HEADER_SIZE] = bytes
        .get(..HEADER_SIZE)
        .and_then(|b| b.try_into().ok())
        .ok_or(DeserializeError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        })?;
    Ok(FormatHeader::from_bytes(header)?)
}
