//! CBOR encoding and zstd stream compression of stores.

use std::io::{Read, Write};

use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};

use crate::error::PersistError;

/// zstd level used unless configured otherwise.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compress into an in-memory buffer.
pub fn compress(data: &[u8], level: i32) -> Result<Vec<u8>, PersistError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), level).map_err(PersistError::Compression)?;
    encoder.write_all(data).map_err(PersistError::Compression)?;
    encoder.finish().map_err(PersistError::Compression)
}

pub fn decompress(data: &[u8]) -> Result<Vec<u8>, PersistError> {
    let mut decoder = zstd::Decoder::new(data).map_err(PersistError::Compression)?;
    let mut buf = Vec::new();
    decoder
        .read_to_end(&mut buf)
        .map_err(PersistError::Compression)?;
    Ok(buf)
}

pub fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, PersistError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| PersistError::CborEncode(e.to_string()))?;
    Ok(buf)
}

pub fn cbor_deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T, PersistError> {
    ciborium::from_reader(data).map_err(|e| PersistError::CborDecode(e.to_string()))
}

/// CBOR-encode then compress.
pub fn encode_compressed<T: Serialize + ?Sized>(value: &T, level: i32) -> Result<Vec<u8>, PersistError> {
    compress(&cbor_serialize(value)?, level)
}

pub fn decode_compressed<T: DeserializeOwned>(data: &[u8]) -> Result<T, PersistError> {
    cbor_deserialize(&decompress(data)?)
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
