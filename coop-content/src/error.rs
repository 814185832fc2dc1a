// SPDX-License-Identifier: MIT OR Apache-2.0

use coop_core::cbor::{DecodeError, EncodeError};
use coop_core::{EntryError, Hash, PublicKey};
use coop_store::StoreError;
use thiserror::Error;

/// Terminal rejections of an operation.
///
/// Validation errors are never retried, an operation failing with one of them is not committed.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("address {0} does not resolve to a known record")]
    NotFound(Hash),

    #[error("{principal} is not in the authority set of group revision {revision}")]
    Unauthorized { principal: PublicKey, revision: Hash },

    #[error("changing the admins of group revision {0} requires counter-signatures of all admins")]
    RequiresCounterSigning(Hash),

    #[error("group id of content can't be changed from {expected} to {given}")]
    ImmutableGroupId { expected: Hash, given: Hash },

    #[error("group revision {rev} does not trace back to group {id}")]
    InvalidGroupRef { id: Hash, rev: Hash },

    #[error("link base {0} does not resolve to the expected anchor or group")]
    MalformedLinkBase(Hash),

    #[error("group needs at least one admin")]
    EmptyAdminSet,

    #[error("group revision {0} is marked as deleted")]
    GroupDeleted(Hash),

    #[error("entry {hash} has type '{found}', expected '{expected}'")]
    UnexpectedEntryType {
        hash: Hash,
        expected: &'static str,
        found: String,
    },

    #[error("entry {0} has unknown type '{1}'")]
    UnknownEntryType(Hash, String),

    #[error("invalid tag on link to {0}")]
    InvalidLinkTag(Hash),

    #[error(transparent)]
    InvalidEntry(#[from] EntryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not decode record: {0}")]
    Decode(#[from] DecodeError),

    #[error("could not encode record: {0}")]
    Encode(#[from] EncodeError),
}

/// Errors returned by group and content operations.
#[derive(Debug, Error)]
pub enum CoopError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("could not encode record: {0}")]
    Encode(#[from] EncodeError),

    #[error("could not decode record: {0}")]
    Decode(#[from] DecodeError),
}
