// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core data types for group-scoped cooperative content.
//!
//! Every participant keeps an append-only history of signed [`Entry`] records. Entries are
//! addressed by the BLAKE3 [`Hash`] of their header and either create a new record or update an
//! earlier one. Headers are encoded in [CBOR] before they are hashed or signed, which makes
//! addresses deterministic across peers.
//!
//! [CBOR]: https://cbor.io/
pub mod cbor;
pub mod entry;
pub mod hash;
pub mod identity;
mod serde;
pub mod timestamp;

pub use entry::{Action, Body, Entry, EntryBuilder, EntryError, Header, validate_entry};
pub use hash::{Hash, HashError};
pub use identity::{IdentityError, PrivateKey, PublicKey, Signature};
pub use timestamp::Timestamp;
