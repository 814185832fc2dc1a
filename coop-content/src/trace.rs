// SPDX-License-Identifier: MIT OR Apache-2.0

//! Walking the create/update chains of entries.
//!
//! Every update entry names the entry it supersedes as its `base`. Walking these pointers
//! backwards always ends at exactly one create entry (the origin). Walking forwards can branch
//! when several principals update the same base concurrently. Forks are resolved by picking the
//! update with the earliest timestamp, equal timestamps are decided by the smaller address.
use std::collections::{BTreeSet, VecDeque};

use coop_core::{Action, Entry, Hash};
use coop_store::EntryStore;
use tracing::trace;

use crate::error::ValidationError;

/// Get an entry and make sure it is of the expected type.
pub(crate) fn get_typed_entry<S: EntryStore>(
    store: &S,
    hash: &Hash,
    entry_type: &'static str,
) -> Result<Entry, ValidationError> {
    let entry = store
        .get_entry(hash)?
        .ok_or(ValidationError::NotFound(*hash))?;

    if entry.entry_type() != entry_type {
        return Err(ValidationError::UnexpectedEntryType {
            hash: *hash,
            expected: entry_type,
            found: entry.entry_type().to_string(),
        });
    }

    Ok(entry)
}

/// Follow `base` pointers back to the create entry and return its address.
pub fn trace_origin<S: EntryStore>(
    store: &S,
    hash: &Hash,
    entry_type: &'static str,
) -> Result<Hash, ValidationError> {
    let mut current = get_typed_entry(store, hash, entry_type)?;
    while let Action::Update { base } = current.header.action {
        current = get_typed_entry(store, &base, entry_type)?;
    }
    Ok(current.hash)
}

/// Returns true if `hash` is `ancestor` or one of its (transitive) updates.
pub fn is_descendant<S: EntryStore>(
    store: &S,
    ancestor: &Hash,
    hash: &Hash,
    entry_type: &'static str,
) -> Result<bool, ValidationError> {
    let mut current = get_typed_entry(store, hash, entry_type)?;
    loop {
        if current.hash == *ancestor {
            return Ok(true);
        }

        match current.header.action {
            Action::Create => return Ok(false),
            Action::Update { base } => {
                current = get_typed_entry(store, &base, entry_type)?;
            }
        }
    }
}

/// Direct update of an entry which wins over all concurrent ones.
pub(crate) fn next_update<S: EntryStore>(
    store: &S,
    hash: &Hash,
    entry_type: &'static str,
) -> Result<Option<Entry>, ValidationError> {
    let next = store
        .get_updates(hash)?
        .into_iter()
        .filter(|entry| entry.entry_type() == entry_type)
        .min_by_key(|entry| (entry.timestamp(), entry.hash));
    Ok(next)
}

/// Follow updates forwards from `hash` until no more are known.
///
/// Stops after `max_depth` steps and returns the last address reached.
pub fn trace_latest<S: EntryStore>(
    store: &S,
    hash: &Hash,
    entry_type: &'static str,
    max_depth: usize,
) -> Result<Hash, ValidationError> {
    let mut current = get_typed_entry(store, hash, entry_type)?.hash;
    for _ in 0..max_depth {
        match next_update(store, &current, entry_type)? {
            Some(next) => {
                trace!(from = %current, to = %next.hash, "follow update");
                current = next.hash;
            }
            None => return Ok(current),
        }
    }
    trace!(%current, max_depth, "reached maximum trace depth");
    Ok(current)
}

/// All entries reachable from `hash` by following updates, including the entry itself.
///
/// Entries are returned in breadth-first order, with all forks included.
pub(crate) fn descendants<S: EntryStore>(
    store: &S,
    hash: &Hash,
    entry_type: &'static str,
) -> Result<Vec<Entry>, ValidationError> {
    let root = get_typed_entry(store, hash, entry_type)?;

    let mut visited = BTreeSet::from([root.hash]);
    let mut queue = VecDeque::from([root]);
    let mut result = Vec::new();

    while let Some(entry) = queue.pop_front() {
        for update in store.get_updates(&entry.hash)? {
            if update.entry_type() == entry_type && visited.insert(update.hash) {
                queue.push_back(update);
            }
        }
        result.push(entry);
    }

    Ok(result)
}
