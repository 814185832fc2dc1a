// SPDX-License-Identifier: MIT OR Apache-2.0

//! CBOR encoding of headers, anchors, links and record bodies.
//!
//! Addresses are calculated over the encoded bytes, so every record has exactly one encoding.
use ciborium::de::Error as DeserializeError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>, EncodeError> {
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(value, &mut bytes).map_err(|err| EncodeError(err.to_string()))?;
    Ok(bytes)
}

pub fn decode_cbor<T: for<'a> Deserialize<'a>>(bytes: &[u8]) -> Result<T, DecodeError> {
    ciborium::from_reader(bytes).map_err(|err| match err {
        DeserializeError::Syntax(offset) => DecodeError::Syntax(offset),
        DeserializeError::Semantic(_, description) => DecodeError::Value(description),
        DeserializeError::Io(err) => DecodeError::Value(err.to_string()),
        DeserializeError::RecursionLimitExceeded => {
            DecodeError::Value("recursion limit exceeded".to_string())
        }
    })
}

/// A value could not be serialized.
#[derive(Debug, Error)]
#[error("could not serialize value: {0}")]
pub struct EncodeError(String);

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed bytes at position {0}")]
    Syntax(usize),

    /// Bytes are well-formed but don't describe the expected value.
    #[error("unexpected value: {0}")]
    Value(String),
}
