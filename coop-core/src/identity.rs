// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ed25519 identities of the principals taking part in a group.
use std::fmt;
use std::hash::Hash as StdHash;
use std::str::FromStr;

use ed25519_dalek::{SECRET_KEY_LENGTH, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::hash::Hash;

pub const PUBLIC_KEY_LEN: usize = ed25519_dalek::PUBLIC_KEY_LENGTH;

pub const SIGNATURE_LEN: usize = ed25519_dalek::SIGNATURE_LENGTH;

/// Private ed25519 key used for signing.
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    /// Generates a new private key using the systems random number generator (CSPRNG) as a seed.
    pub fn new() -> Self {
        let mut csprng: OsRng = OsRng;
        Self(SigningKey::generate(&mut csprng))
    }

    pub fn from_bytes(bytes: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self(SigningKey::from_bytes(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_LENGTH] {
        self.0.as_bytes()
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key())
    }

    pub fn sign(&self, bytes: &[u8]) -> Signature {
        Signature(self.0.sign(bytes))
    }
}

impl Default for PrivateKey {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<&[u8]> for PrivateKey {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SECRET_KEY_LENGTH] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value.len(), SECRET_KEY_LENGTH))?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PrivateKey").field(&"***").finish()
    }
}

/// Public ed25519 key, the stable identity of a principal.
#[derive(Clone, Copy, PartialEq, Eq, StdHash)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, IdentityError> {
        let key = VerifyingKey::from_bytes(bytes)?;
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        self.0.as_bytes()
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }

    /// Verify a signature over the given bytes.
    pub fn verify(&self, bytes: &[u8], signature: &Signature) -> bool {
        self.0.verify(bytes, &signature.0).is_ok()
    }
}

/// Address of a principal in the graph index.
///
/// Keys and hashes have the same length, so a principal can be used directly as the source of
/// an index edge ("agent address").
impl From<PublicKey> for Hash {
    fn from(value: PublicKey) -> Self {
        Hash::from_bytes(*value.as_bytes())
    }
}

impl From<&PublicKey> for Hash {
    fn from(value: &PublicKey) -> Self {
        Hash::from_bytes(*value.as_bytes())
    }
}

impl TryFrom<&[u8]> for PublicKey {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; PUBLIC_KEY_LEN] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value.len(), PUBLIC_KEY_LEN))?;
        Self::from_bytes(&bytes)
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::try_from(hex::decode(value)?.as_slice())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey").field(&self.to_hex()).finish()
    }
}

/// Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(ed25519_dalek::Signature);

impl Signature {
    pub fn from_bytes(bytes: &[u8; SIGNATURE_LEN]) -> Self {
        Self(ed25519_dalek::Signature::from_bytes(bytes))
    }

    pub fn to_bytes(&self) -> [u8; SIGNATURE_LEN] {
        self.0.to_bytes()
    }
}

impl TryFrom<&[u8]> for Signature {
    type Error = IdentityError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; SIGNATURE_LEN] = value
            .try_into()
            .map_err(|_| IdentityError::InvalidLength(value.len(), SIGNATURE_LEN))?;
        Ok(Self::from_bytes(&bytes))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature")
            .field(&hex::encode(self.to_bytes()))
            .finish()
    }
}

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("invalid length {0} bytes, expected {1} bytes")]
    InvalidLength(usize, usize),

    #[error("invalid hex encoding in string")]
    InvalidHexEncoding(#[from] hex::FromHexError),

    #[error(transparent)]
    InvalidKey(#[from] ed25519_dalek::SignatureError),
}

#[cfg(test)]
mod tests {
    use crate::Hash;

    use super::{PrivateKey, PublicKey};

    #[test]
    fn sign_and_verify() {
        let private_key = PrivateKey::new();
        let public_key = private_key.public_key();

        let signature = private_key.sign(b"hello, group");
        assert!(public_key.verify(b"hello, group", &signature));
        assert!(!public_key.verify(b"hello, world", &signature));

        let other = PrivateKey::new().public_key();
        assert!(!other.verify(b"hello, group", &signature));
    }

    #[test]
    fn agent_address() {
        let public_key = PrivateKey::new().public_key();
        let address: Hash = public_key.into();
        assert_eq!(address.as_bytes(), public_key.as_bytes());
    }

    #[test]
    fn from_hex_string() {
        let public_key = PrivateKey::new().public_key();
        let parsed: PublicKey = public_key.to_hex().parse().unwrap();
        assert_eq!(parsed, public_key);
    }
}
