// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory persistence for entries, anchors and index edges.
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use coop_core::{Body, Entry, Hash, PublicKey, Timestamp, validate_entry};
use tracing::{debug, trace};

use crate::links::{Link, LinkType};
use crate::traits::{
    EntryStore, LinkStore, PayloadStore, StoreError, WritableStore, WriteBatch,
};

type SeqNum = u64;

type LogMeta = (Timestamp, Hash);

#[derive(Clone, Debug)]
pub struct InnerMemoryStore<T: LinkType> {
    entries: HashMap<Hash, Entry>,
    logs: HashMap<PublicKey, BTreeMap<SeqNum, Hash>>,
    updates: HashMap<Hash, BTreeSet<LogMeta>>,
    payloads: HashMap<Hash, Body>,
    links: HashMap<(Hash, T), BTreeSet<LogMeta>>,
    link_data: HashMap<Hash, Link<T>>,
}

/// An in-memory store for entries, payloads and links.
///
/// `MemoryStore` wraps an `InnerMemoryStore` with an `RwLock` and `Arc`, clones share the same
/// data. This allows multiple principals to act against the same graph, similar to peers which
/// are fully synchronised.
///
/// This does not persist data permanently, use it only in development or test contexts.
#[derive(Clone, Debug)]
pub struct MemoryStore<T: LinkType> {
    inner: Arc<RwLock<InnerMemoryStore<T>>>,
}

impl<T: LinkType> MemoryStore<T> {
    pub fn new() -> Self {
        let inner = InnerMemoryStore {
            entries: HashMap::new(),
            logs: HashMap::new(),
            updates: HashMap::new(),
            payloads: HashMap::new(),
            links: HashMap::new(),
            link_data: HashMap::new(),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Obtain a read-lock on the store.
    pub fn read_store(&self) -> RwLockReadGuard<'_, InnerMemoryStore<T>> {
        self.inner
            .read()
            .expect("acquire shared read access on store")
    }

    /// Obtain a write-lock on the store.
    pub fn write_store(&self) -> RwLockWriteGuard<'_, InnerMemoryStore<T>> {
        self.inner
            .write()
            .expect("acquire exclusive write access on store")
    }

    /// Number of stored entries, payloads and links.
    pub fn counts(&self) -> (usize, usize, usize) {
        let store = self.read_store();
        (
            store.entries.len(),
            store.payloads.len(),
            store.link_data.len(),
        )
    }
}

impl<T: LinkType> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: LinkType> EntryStore for MemoryStore<T> {
    fn get_entry(&self, hash: &Hash) -> Result<Option<Entry>, StoreError> {
        Ok(self.read_store().entries.get(hash).cloned())
    }

    fn has_entry(&self, hash: &Hash) -> Result<bool, StoreError> {
        Ok(self.read_store().entries.contains_key(hash))
    }

    fn latest_entry(&self, public_key: &PublicKey) -> Result<Option<Entry>, StoreError> {
        let store = self.read_store();
        let latest = store
            .logs
            .get(public_key)
            .and_then(|log| log.last_key_value())
            .and_then(|(_, hash)| store.entries.get(hash))
            .cloned();
        Ok(latest)
    }

    fn get_log(&self, public_key: &PublicKey) -> Result<Vec<Entry>, StoreError> {
        let store = self.read_store();
        let log = match store.logs.get(public_key) {
            Some(log) => log
                .values()
                .filter_map(|hash| store.entries.get(hash))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(log)
    }

    fn get_updates(&self, base: &Hash) -> Result<Vec<Entry>, StoreError> {
        let store = self.read_store();
        let updates = match store.updates.get(base) {
            Some(updates) => updates
                .iter()
                .filter_map(|(_, hash)| store.entries.get(hash))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(updates)
    }
}

impl<T: LinkType> PayloadStore for MemoryStore<T> {
    fn get_payload(&self, hash: &Hash) -> Result<Option<Body>, StoreError> {
        Ok(self.read_store().payloads.get(hash).cloned())
    }
}

impl<T: LinkType> LinkStore<T> for MemoryStore<T> {
    fn get_links(&self, source: &Hash, link_type: &T) -> Result<Vec<Link<T>>, StoreError> {
        let store = self.read_store();
        let links = match store.links.get(&(*source, *link_type)) {
            Some(links) => links
                .iter()
                .filter_map(|(_, hash)| store.link_data.get(hash))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(links)
    }
}

impl<T: LinkType> WritableStore<T> for MemoryStore<T> {
    fn commit(&mut self, batch: WriteBatch<T>) -> Result<(), StoreError> {
        let mut store = self.write_store();

        // Check all entries before anything gets written. Entries of the same author inside one
        // batch need to continue each other.
        let mut pending: HashMap<PublicKey, (SeqNum, Hash)> = HashMap::new();
        for entry in &batch.entries {
            if store.entries.contains_key(&entry.hash) {
                continue;
            }

            validate_entry(entry).map_err(|err| StoreError::InvalidEntry(entry.hash, err))?;

            let author = entry.author();
            let latest = match pending.get(&author) {
                Some(latest) => Some(*latest),
                None => store
                    .logs
                    .get(&author)
                    .and_then(|log| log.last_key_value())
                    .map(|(seq_num, hash)| (*seq_num, *hash)),
            };

            let (expected_seq_num, expected_backlink) = match latest {
                Some((seq_num, hash)) => (seq_num + 1, Some(hash)),
                None => (0, None),
            };

            if entry.header.seq_num != expected_seq_num
                || entry.header.backlink != expected_backlink
            {
                return Err(StoreError::LogMismatch {
                    hash: entry.hash,
                    public_key: author,
                    expected: expected_seq_num,
                });
            }

            pending.insert(author, (entry.header.seq_num, entry.hash));
        }

        let WriteBatch {
            entries,
            payloads,
            links,
        } = batch;

        for entry in entries {
            if store.entries.contains_key(&entry.hash) {
                continue;
            }

            trace!(hash = %entry.hash, author = %entry.author(), "insert entry");
            store
                .logs
                .entry(entry.author())
                .or_default()
                .insert(entry.header.seq_num, entry.hash);
            if let Some(base) = entry.action().base() {
                store
                    .updates
                    .entry(base)
                    .or_default()
                    .insert((entry.timestamp(), entry.hash));
            }
            store.entries.insert(entry.hash, entry);
        }

        for body in payloads {
            store.payloads.entry(body.hash()).or_insert(body);
        }

        let mut new_links = 0;
        for (hash, link) in links {
            if store.link_data.contains_key(&hash) {
                continue;
            }

            store
                .links
                .entry((link.source, link.link_type))
                .or_default()
                .insert((link.timestamp, hash));
            store.link_data.insert(hash, link);
            new_links += 1;
        }

        debug!(new_links, "committed write batch");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use coop_core::{Action, Body, EntryBuilder, Hash, PrivateKey, Timestamp};
    use serde::{Deserialize, Serialize};

    use crate::links::Link;
    use crate::traits::{EntryStore, LinkStore, PayloadStore, StoreError, WritableStore, WriteBatch};

    use super::MemoryStore;

    #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
    enum TestLink {
        Index,
        Other,
    }

    fn link(author: &PrivateKey, source: Hash, target: Hash, timestamp: u64) -> Link<TestLink> {
        Link {
            author: author.public_key(),
            source,
            link_type: TestLink::Index,
            tag: b"tag".to_vec(),
            target,
            timestamp: Timestamp::new(timestamp),
        }
    }

    #[test]
    fn insert_and_get_entries() {
        let mut store = MemoryStore::<TestLink>::new();
        let private_key = PrivateKey::new();

        let create =
            EntryBuilder::new("test", Action::Create, Body::new(b"1")).sign(&private_key, None);
        let update = EntryBuilder::new("test", Action::Update { base: create.hash }, Body::new(b"2"))
            .sign(&private_key, Some(&create));

        let mut batch = WriteBatch::new();
        batch.put_entry(create.clone());
        batch.put_entry(update.clone());
        store.commit(batch).unwrap();

        assert_eq!(store.get_entry(&create.hash).unwrap(), Some(create.clone()));
        assert!(store.has_entry(&update.hash).unwrap());
        assert_eq!(
            store.latest_entry(&private_key.public_key()).unwrap(),
            Some(update.clone())
        );
        assert_eq!(store.get_log(&private_key.public_key()).unwrap().len(), 2);
        assert_eq!(store.get_updates(&create.hash).unwrap(), vec![update]);
        assert!(store.get_updates(&Hash::new(b"nothing")).unwrap().is_empty());
    }

    #[test]
    fn failed_commit_writes_nothing() {
        let mut store = MemoryStore::<TestLink>::new();
        let private_key = PrivateKey::new();

        let first =
            EntryBuilder::new("test", Action::Create, Body::new(b"1")).sign(&private_key, None);
        // Skips a sequence number.
        let second =
            EntryBuilder::new("test", Action::Create, Body::new(b"2")).sign(&private_key, Some(&first));
        let third = EntryBuilder::new("test", Action::Create, Body::new(b"3"))
            .sign(&private_key, Some(&second));

        let mut batch = WriteBatch::new();
        batch.put_entry(first.clone());
        batch.put_entry(third);
        let payload = batch.put_payload(Body::new(b"anchor"));
        batch
            .put_link(link(&private_key, payload, first.hash, 1))
            .unwrap();

        let result = store.commit(batch);
        assert!(matches!(result, Err(StoreError::LogMismatch { expected: 1, .. })));
        assert_eq!(store.counts(), (0, 0, 0));
    }

    #[test]
    fn links_are_idempotent_and_ordered() {
        let mut store = MemoryStore::<TestLink>::new();
        let private_key = PrivateKey::new();
        let source = Hash::new(b"source");

        let mut batch = WriteBatch::new();
        batch
            .put_link(link(&private_key, source, Hash::new(b"b"), 2))
            .unwrap();
        batch
            .put_link(link(&private_key, source, Hash::new(b"a"), 1))
            .unwrap();
        // Same edge twice.
        batch
            .put_link(link(&private_key, source, Hash::new(b"a"), 1))
            .unwrap();
        store.commit(batch).unwrap();

        let links = store.get_links(&source, &TestLink::Index).unwrap();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target, Hash::new(b"a"));
        assert_eq!(links[1].target, Hash::new(b"b"));
        assert!(store.get_links(&source, &TestLink::Other).unwrap().is_empty());
    }

    #[test]
    fn payloads() {
        let mut store = MemoryStore::<TestLink>::new();
        let body = Body::new(b"anchor");

        let mut batch = WriteBatch::new();
        let hash = batch.put_payload(body.clone());
        batch.put_payload(body.clone());
        store.commit(batch).unwrap();

        assert_eq!(store.get_payload(&hash).unwrap(), Some(body));
        assert_eq!(store.counts(), (0, 1, 0));
    }

    #[test]
    fn shared_between_clones() {
        let mut store = MemoryStore::<TestLink>::new();
        let other = store.clone();

        let mut batch = WriteBatch::new();
        let hash = batch.put_payload(Body::new(b"shared"));
        store.commit(batch).unwrap();

        assert!(other.get_payload(&hash).unwrap().is_some());
    }
}
