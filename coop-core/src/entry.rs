// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signed entries of a principal's append-only history.
//!
//! An [`Entry`] consists of a [`Header`] and a [`Body`]. The header carries the author, a
//! signature, the hash and size of the body and the position of the entry in the author's log
//! (`seq_num` and `backlink`). The address of an entry is the hash of its signed header bytes.
//!
//! Entries are never mutated. An [`Action::Update`] entry supersedes an earlier entry by pointing
//! at it as its `base`, following these pointers back leads to the original [`Action::Create`]
//! entry.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cbor::{DecodeError, decode_cbor, encode_cbor};
use crate::hash::Hash;
use crate::identity::{PrivateKey, PublicKey, Signature};
use crate::serde::{deserialize_hex, serialize_hex};
use crate::timestamp::Timestamp;

/// Latest supported entry version.
pub const ENTRY_VERSION: u64 = 1;

/// Create or update linkage of an entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Create,
    Update { base: Hash },
}

impl Action {
    /// Address of the superseded entry, if this is an update.
    pub fn base(&self) -> Option<Hash> {
        match self {
            Action::Create => None,
            Action::Update { base } => Some(*base),
        }
    }

    pub fn is_create(&self) -> bool {
        matches!(self, Action::Create)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u64,
    pub public_key: PublicKey,
    pub signature: Option<Signature>,
    pub entry_type: String,
    pub action: Action,
    pub payload_hash: Hash,
    pub payload_size: u64,
    pub timestamp: Timestamp,
    pub seq_num: u64,
    pub backlink: Option<Hash>,
}

impl Header {
    pub fn to_bytes(&self) -> Vec<u8> {
        // All header fields are serializable and we write into memory, encoding can't fail.
        encode_cbor(self).expect("CBOR encoder failed due to a critical IO error")
    }

    pub fn sign(&mut self, private_key: &PrivateKey) {
        // Make sure the signature is not already set before we encode.
        self.signature = None;
        let bytes = self.to_bytes();
        self.signature = Some(private_key.sign(&bytes));
    }

    pub fn verify(&self) -> bool {
        match self.signature {
            Some(claimed_signature) => {
                let mut unsigned_header = self.clone();
                unsigned_header.signature = None;
                let unsigned_bytes = unsigned_header.to_bytes();
                self.public_key.verify(&unsigned_bytes, &claimed_signature)
            }
            None => false,
        }
    }

    pub fn hash(&self) -> Hash {
        Hash::new(self.to_bytes())
    }
}

/// Payload of an entry, usually a CBOR-encoded record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Body(
    #[serde(serialize_with = "serialize_hex", deserialize_with = "deserialize_hex")] Vec<u8>,
);

impl Body {
    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    /// Encode a serializable record as the body.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self, crate::cbor::EncodeError> {
        Ok(Self(encode_cbor(record)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.clone()
    }

    pub fn hash(&self) -> Hash {
        Hash::new(&self.0)
    }

    pub fn size(&self) -> u64 {
        self.0.len() as u64
    }

    /// Decode the body as a CBOR-encoded record.
    pub fn decode<T: for<'a> Deserialize<'a>>(&self) -> Result<T, DecodeError> {
        decode_cbor(&self.0[..])
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Entry {
    pub hash: Hash,
    pub header: Header,
    pub body: Body,
}

impl Entry {
    pub fn author(&self) -> PublicKey {
        self.header.public_key
    }

    pub fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    pub fn entry_type(&self) -> &str {
        &self.header.entry_type
    }

    pub fn action(&self) -> &Action {
        &self.header.action
    }
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.hash.eq(&other.hash)
    }
}

impl Eq for Entry {}

/// Assembles and signs a new entry on top of the author's latest entry.
#[derive(Clone, Debug)]
pub struct EntryBuilder {
    entry_type: String,
    action: Action,
    body: Body,
    timestamp: Option<Timestamp>,
    after: Option<Timestamp>,
}

impl EntryBuilder {
    pub fn new(entry_type: &str, action: Action, body: Body) -> Self {
        Self {
            entry_type: entry_type.to_string(),
            action,
            body,
            timestamp: None,
            after: None,
        }
    }

    /// Use this timestamp instead of the current system time.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Order the entry strictly after an entry it references.
    pub fn after(mut self, timestamp: Timestamp) -> Self {
        self.after = Some(self.after.map_or(timestamp, |after| after.max(timestamp)));
        self
    }

    /// Sign the entry. `latest` is the author's latest entry, `None` if this is the first one.
    pub fn sign(self, private_key: &PrivateKey, latest: Option<&Entry>) -> Entry {
        let mut timestamp = self.timestamp.unwrap_or_else(Timestamp::now);
        if let Some(after) = self.after {
            timestamp = timestamp.max(after.next());
        }
        if let Some(latest) = latest {
            timestamp = timestamp.max(latest.timestamp().next());
        }

        let mut header = Header {
            version: ENTRY_VERSION,
            public_key: private_key.public_key(),
            signature: None,
            entry_type: self.entry_type,
            action: self.action,
            payload_hash: self.body.hash(),
            payload_size: self.body.size(),
            timestamp,
            seq_num: latest.map_or(0, |latest| latest.header.seq_num + 1),
            backlink: latest.map(|latest| latest.hash),
        };
        header.sign(private_key);

        Entry {
            hash: header.hash(),
            header,
            body: self.body,
        }
    }
}

/// Check the integrity of an entry.
///
/// This does not check whether the entry fits into the author's log, stores need to compare
/// `seq_num` and `backlink` with their latest known entry.
pub fn validate_entry(entry: &Entry) -> Result<(), EntryError> {
    let header = &entry.header;

    if header.version != ENTRY_VERSION {
        return Err(EntryError::UnsupportedVersion(header.version, ENTRY_VERSION));
    }

    if header.signature.is_none() {
        return Err(EntryError::MissingSignature);
    }

    if !header.verify() {
        return Err(EntryError::SignatureMismatch);
    }

    if header.hash() != entry.hash {
        return Err(EntryError::HashMismatch(entry.hash));
    }

    if header.payload_hash != entry.body.hash() || header.payload_size != entry.body.size() {
        return Err(EntryError::PayloadMismatch);
    }

    match (header.seq_num, header.backlink) {
        (0, None) => (),
        (0, Some(_)) | (_, None) => return Err(EntryError::SeqNumMismatch),
        _ => (),
    }

    Ok(())
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("entry version {0} is not supported, needs to be {1}")]
    UnsupportedVersion(u64, u64),

    #[error("entry needs to be signed")]
    MissingSignature,

    #[error("signature does not match claimed public key")]
    SignatureMismatch,

    #[error("claimed address {0} does not match header")]
    HashMismatch(Hash),

    #[error("payload hash and size do not match given body")]
    PayloadMismatch,

    #[error("backlink needs to be given if and only if sequence number is not 0")]
    SeqNumMismatch,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mock_instant::thread_local::MockClock;

    use crate::identity::PrivateKey;
    use crate::timestamp::Timestamp;

    use super::{Action, Body, EntryBuilder, EntryError, validate_entry};

    #[test]
    fn sign_and_validate() {
        let private_key = PrivateKey::new();
        let body = Body::new(b"hello");

        let entry = EntryBuilder::new("test", Action::Create, body.clone()).sign(&private_key, None);
        assert!(validate_entry(&entry).is_ok());
        assert_eq!(entry.header.seq_num, 0);
        assert_eq!(entry.header.backlink, None);
        assert_eq!(entry.header.payload_hash, body.hash());
        assert_eq!(entry.author(), private_key.public_key());

        let update = EntryBuilder::new(
            "test",
            Action::Update { base: entry.hash },
            Body::new(b"hello again"),
        )
        .sign(&private_key, Some(&entry));
        assert!(validate_entry(&update).is_ok());
        assert_eq!(update.header.seq_num, 1);
        assert_eq!(update.header.backlink, Some(entry.hash));
        assert_eq!(update.action().base(), Some(entry.hash));
    }

    #[test]
    fn timestamps_are_monotonic_and_causal() {
        MockClock::set_system_time(Duration::from_secs(10));
        let private_key = PrivateKey::new();

        let first = EntryBuilder::new("test", Action::Create, Body::new(b"1"))
            .sign(&private_key, None);
        // Clock did not move, timestamp still advances along the log.
        let second = EntryBuilder::new("test", Action::Create, Body::new(b"2"))
            .sign(&private_key, Some(&first));
        assert!(second.timestamp() > first.timestamp());

        let referenced = Timestamp::new(99_000_000);
        let third = EntryBuilder::new("test", Action::Create, Body::new(b"3"))
            .after(referenced)
            .sign(&private_key, Some(&second));
        assert!(third.timestamp() > referenced);
    }

    #[test]
    fn tampered_entries() {
        let private_key = PrivateKey::new();
        let entry = EntryBuilder::new("test", Action::Create, Body::new(b"hello"))
            .sign(&private_key, None);

        let mut wrong_body = entry.clone();
        wrong_body.body = Body::new(b"bye");
        assert!(matches!(
            validate_entry(&wrong_body),
            Err(EntryError::PayloadMismatch)
        ));

        let mut wrong_type = entry.clone();
        wrong_type.header.entry_type = "other".into();
        assert!(matches!(
            validate_entry(&wrong_type),
            Err(EntryError::SignatureMismatch)
        ));

        let mut wrong_hash = entry.clone();
        wrong_hash.hash = crate::Hash::new(b"something else");
        assert!(matches!(
            validate_entry(&wrong_hash),
            Err(EntryError::HashMismatch(_))
        ));

        let mut unsigned = entry;
        unsigned.header.signature = None;
        assert!(matches!(
            validate_entry(&unsigned),
            Err(EntryError::MissingSignature)
        ));
    }
}
