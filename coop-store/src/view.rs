// SPDX-License-Identifier: MIT OR Apache-2.0

use coop_core::{Body, Entry, Hash, PublicKey};

use crate::links::{Link, LinkType};
use crate::traits::{EntryStore, LinkStore, PayloadStore, StoreError, WriteBatch};

/// Read-only view of a store as if a write batch was already committed.
///
/// Used to validate records and edges of a batch which reference each other before anything is
/// written.
pub struct StagedView<'a, S, T: LinkType> {
    store: &'a S,
    batch: &'a WriteBatch<T>,
}

impl<'a, S, T: LinkType> StagedView<'a, S, T> {
    pub fn new(store: &'a S, batch: &'a WriteBatch<T>) -> Self {
        Self { store, batch }
    }

    fn staged_entry(&self, hash: &Hash) -> Option<&Entry> {
        self.batch.entries.iter().find(|entry| entry.hash == *hash)
    }
}

impl<S: EntryStore, T: LinkType> EntryStore for StagedView<'_, S, T> {
    fn get_entry(&self, hash: &Hash) -> Result<Option<Entry>, StoreError> {
        match self.staged_entry(hash) {
            Some(entry) => Ok(Some(entry.clone())),
            None => self.store.get_entry(hash),
        }
    }

    fn has_entry(&self, hash: &Hash) -> Result<bool, StoreError> {
        Ok(self.staged_entry(hash).is_some() || self.store.has_entry(hash)?)
    }

    fn latest_entry(&self, public_key: &PublicKey) -> Result<Option<Entry>, StoreError> {
        let staged = self
            .batch
            .entries
            .iter()
            .filter(|entry| entry.author() == *public_key)
            .max_by_key(|entry| entry.header.seq_num);
        match staged {
            Some(entry) => Ok(Some(entry.clone())),
            None => self.store.latest_entry(public_key),
        }
    }

    fn get_log(&self, public_key: &PublicKey) -> Result<Vec<Entry>, StoreError> {
        let mut log = self.store.get_log(public_key)?;
        for entry in &self.batch.entries {
            if entry.author() == *public_key && !log.contains(entry) {
                log.push(entry.clone());
            }
        }
        log.sort_by_key(|entry| entry.header.seq_num);
        Ok(log)
    }

    fn get_updates(&self, base: &Hash) -> Result<Vec<Entry>, StoreError> {
        let mut updates = self.store.get_updates(base)?;
        for entry in &self.batch.entries {
            if entry.action().base() == Some(*base) && !updates.contains(entry) {
                updates.push(entry.clone());
            }
        }
        updates.sort_by_key(|entry| (entry.timestamp(), entry.hash));
        Ok(updates)
    }
}

impl<S: PayloadStore, T: LinkType> PayloadStore for StagedView<'_, S, T> {
    fn get_payload(&self, hash: &Hash) -> Result<Option<Body>, StoreError> {
        match self.batch.payloads.iter().find(|body| body.hash() == *hash) {
            Some(body) => Ok(Some(body.clone())),
            None => self.store.get_payload(hash),
        }
    }
}

impl<S: LinkStore<T>, T: LinkType> LinkStore<T> for StagedView<'_, S, T> {
    fn get_links(&self, source: &Hash, link_type: &T) -> Result<Vec<Link<T>>, StoreError> {
        let mut links = Vec::new();
        for link in self.store.get_links(source, link_type)? {
            links.push((link.timestamp, link.hash()?, link));
        }
        for (hash, link) in &self.batch.links {
            if link.source == *source && link.link_type == *link_type {
                links.push((link.timestamp, *hash, link.clone()));
            }
        }
        links.sort_by_key(|(timestamp, hash, _)| (*timestamp, *hash));
        links.dedup_by_key(|(_, hash, _)| *hash);
        Ok(links.into_iter().map(|(_, _, link)| link).collect())
    }
}
