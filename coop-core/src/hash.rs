// SPDX-License-Identifier: MIT OR Apache-2.0

//! BLAKE3 content addresses.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Size of an address in bytes.
pub const HASH_LEN: usize = blake3::OUT_LEN;

/// 32-byte BLAKE3 hash, used as the address of every entry, anchor and link.
///
/// Equality is byte-exact and hashes are totally ordered by their bytes, which gives resolution
/// algorithms a stable order to break ties with.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash(blake3::Hash);

impl Hash {
    /// Calculate the hash of the provided bytes.
    pub fn new(buf: impl AsRef<[u8]>) -> Self {
        Self(blake3::hash(buf.as_ref()))
    }

    /// Create a `Hash` from its raw bytes representation.
    pub const fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(blake3::Hash::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        self.0.to_hex().to_string()
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl From<[u8; HASH_LEN]> for Hash {
    fn from(value: [u8; HASH_LEN]) -> Self {
        Self::from_bytes(value)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = HashError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let checked_value: [u8; HASH_LEN] = value
            .try_into()
            .map_err(|_| HashError::InvalidLength(value.len(), HASH_LEN))?;
        Ok(Self::from_bytes(checked_value))
    }
}

impl FromStr for Hash {
    type Err = HashError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl PartialOrd for Hash {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Hash {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hash").field(&self.to_hex()).finish()
    }
}

#[derive(Error, Debug)]
pub enum HashError {
    #[error("invalid hash length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    #[error("invalid hex encoding in hash string")]
    InvalidHexEncoding(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{Hash, HashError};

    #[test]
    fn hashing() {
        let hash = Hash::new([1, 2, 3]);

        assert_eq!(
            hash.as_bytes(),
            &[
                177, 119, 236, 27, 242, 109, 251, 59, 112, 16, 212, 115, 230, 212, 71, 19, 178,
                155, 118, 91, 153, 198, 230, 14, 203, 250, 231, 66, 222, 73, 101, 67
            ]
        );
    }

    #[test]
    fn serde_formats() {
        let hash = Hash::new([1, 2, 3]);

        // CBOR uses plain bytes.
        let bytes = crate::cbor::encode_cbor(&hash).unwrap();
        assert_eq!(bytes[..2], [88, 32]);
        assert_eq!(bytes[2..], hash.as_bytes()[..]);
        let decoded: Hash = crate::cbor::decode_cbor(&bytes[..]).unwrap();
        assert_eq!(decoded, hash);

        // JSON uses hex strings.
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(
            json,
            "\"b177ec1bf26dfb3b7010d473e6d44713b29b765b99c6e60ecbfae742de496543\""
        );
    }

    #[test]
    fn ordering_is_bytewise() {
        let low = Hash::from_bytes([0; 32]);
        let high = Hash::from_bytes([255; 32]);
        assert!(low < high);
        assert_eq!(std::cmp::max(low, high), high);
    }

    #[test]
    fn invalid_length() {
        let result: Result<Hash, HashError> = Hash::try_from([1u8, 2, 3].as_slice());
        assert!(matches!(result, Err(HashError::InvalidLength(3, 32))));

        let result = Hash::from_str("zz");
        assert!(matches!(result, Err(HashError::InvalidHexEncoding(_))));
    }
}
