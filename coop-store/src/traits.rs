// SPDX-License-Identifier: MIT OR Apache-2.0

use coop_core::cbor::EncodeError;
use coop_core::{Body, Entry, EntryError, Hash, PublicKey};
use thiserror::Error;

use crate::links::{Link, LinkType};

/// Look up signed entries and the logs of their authors.
pub trait EntryStore {
    /// Get an entry by its address.
    fn get_entry(&self, hash: &Hash) -> Result<Option<Entry>, StoreError>;

    fn has_entry(&self, hash: &Hash) -> Result<bool, StoreError>;

    /// Get the entry with the highest sequence number of an author.
    fn latest_entry(&self, public_key: &PublicKey) -> Result<Option<Entry>, StoreError>;

    /// Get all entries of an author, ordered by sequence number.
    fn get_log(&self, public_key: &PublicKey) -> Result<Vec<Entry>, StoreError>;

    /// Get all entries which update the given entry, ordered by timestamp and address.
    fn get_updates(&self, base: &Hash) -> Result<Vec<Entry>, StoreError>;
}

/// Look up header-less, content-addressed records.
pub trait PayloadStore {
    fn get_payload(&self, hash: &Hash) -> Result<Option<Body>, StoreError>;
}

/// Look up index edges.
pub trait LinkStore<T: LinkType> {
    /// Get all edges of a type starting at `source`, ordered by timestamp and edge address.
    ///
    /// Absence of edges is not an error, the result is empty then.
    fn get_links(&self, source: &Hash, link_type: &T) -> Result<Vec<Link<T>>, StoreError>;
}

pub trait WritableStore<T: LinkType> {
    /// Commit all records and edges of a batch.
    ///
    /// Either the whole batch is written or nothing is. Records and edges which already exist
    /// are skipped.
    fn commit(&mut self, batch: WriteBatch<T>) -> Result<(), StoreError>;
}

/// Capability to read from and write to the content-addressed graph store.
///
/// Every engine operation receives the store handle explicitly.
pub trait StoreHandle<T: LinkType>:
    EntryStore + PayloadStore + LinkStore<T> + WritableStore<T>
{
}

impl<S, T> StoreHandle<T> for S
where
    T: LinkType,
    S: EntryStore + PayloadStore + LinkStore<T> + WritableStore<T>,
{
}

/// Records and edges which are committed together.
#[derive(Clone, Debug)]
pub struct WriteBatch<T: LinkType> {
    pub(crate) entries: Vec<Entry>,
    pub(crate) payloads: Vec<Body>,
    pub(crate) links: Vec<(Hash, Link<T>)>,
}

impl<T: LinkType> WriteBatch<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            payloads: Vec::new(),
            links: Vec::new(),
        }
    }

    pub fn put_entry(&mut self, entry: Entry) -> Hash {
        let hash = entry.hash;
        self.entries.push(entry);
        hash
    }

    pub fn put_payload(&mut self, body: Body) -> Hash {
        let hash = body.hash();
        self.payloads.push(body);
        hash
    }

    pub fn put_link(&mut self, link: Link<T>) -> Result<Hash, StoreError> {
        let hash = link.hash()?;
        self.links.push((hash, link));
        Ok(hash)
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn links(&self) -> impl Iterator<Item = &Link<T>> {
        self.links.iter().map(|(_, link)| link)
    }

    pub fn payloads(&self) -> &[Body] {
        &self.payloads
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.payloads.is_empty() && self.links.is_empty()
    }
}

impl<T: LinkType> Default for WriteBatch<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid entry {0}: {1}")]
    InvalidEntry(Hash, EntryError),

    #[error("entry {hash} does not continue log of {public_key}: expected seq_num {expected}")]
    LogMismatch {
        hash: Hash,
        public_key: PublicKey,
        expected: u64,
    },

    #[error(transparent)]
    Encode(#[from] EncodeError),
}
