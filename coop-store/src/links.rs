// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt::Debug;

use coop_core::cbor::{EncodeError, encode_cbor};
use coop_core::{Hash, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Identifies the kind of an index edge.
///
/// Applications define their own edge types, usually as a fieldless enum.
pub trait LinkType:
    Copy + Clone + Debug + Eq + Ord + std::hash::Hash + Serialize + for<'a> Deserialize<'a>
{
}

impl<T> LinkType for T where
    T: Copy + Clone + Debug + Eq + Ord + std::hash::Hash + Serialize + for<'a> Deserialize<'a>
{
}

/// Directed, typed and tagged edge between two addresses in the graph index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Link<T: LinkType> {
    pub author: PublicKey,
    pub source: Hash,
    pub link_type: T,
    #[serde(with = "serde_bytes")]
    pub tag: Vec<u8>,
    pub target: Hash,
    pub timestamp: Timestamp,
}

impl<T: LinkType> Link<T> {
    /// Address of this edge. Identical edges have identical addresses.
    pub fn hash(&self) -> Result<Hash, EncodeError> {
        Ok(Hash::new(encode_cbor(self)?))
    }
}
