// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconstructing the current state of group content from scattered update edges.
//!
//! Resolution starts at the latest revision of a group (or every revision, with `full_trace`),
//! collects the contribution and archive anchors it links to and reads their edges:
//! `Contribution` edges name the origins of objects, `ContributionUpdate` edges form an update
//! graph from each base to its successor. Every origin is then followed through this graph until
//! no successor is known or an exception address is reached.
//!
//! The graph can be incomplete at any time, edges from other principals arrive eventually.
//! Resolution is deterministic for a given snapshot: when several updates share a base, the one
//! with the earliest timestamp wins, equal timestamps are decided by the smaller address.
use std::collections::{BTreeSet, HashMap, HashSet};

use coop_core::{Hash, Timestamp};
use petgraph::Direction;
use petgraph::graphmap::DiGraphMap;
use tracing::{debug, trace};

use crate::ReadStore;
use crate::anchor::{Anchor, get_anchor};
use crate::config::Config;
use crate::content::{CONTENT_ENTRY_TYPE, ContentRecord, get_content_record};
use crate::error::{CoopError, ValidationError};
use crate::group::GROUP_ENTRY_TYPE;
use crate::link::{ContributionTag, LinkKind, UpdateTag};
use crate::trace::{descendants, trace_latest, trace_origin};

/// Which content of a group to resolve and how.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupContentQuery {
    /// Id of the group, any revision of the group is accepted as well.
    pub group_id: Hash,

    pub content_type: Option<String>,

    pub content_base: Option<String>,

    /// Collect anchors from every revision of the group instead of only the latest one.
    pub full_trace: bool,

    /// Addresses where resolution stops, even if later updates are known.
    pub exceptions: BTreeSet<Hash>,

    /// Overrides `Config::include_archives` when set.
    pub include_archives: Option<bool>,
}

impl GroupContentQuery {
    pub fn new(group_id: Hash) -> Self {
        Self {
            group_id,
            content_type: None,
            content_base: None,
            full_trace: false,
            exceptions: BTreeSet::new(),
            include_archives: None,
        }
    }

    pub fn content_type(mut self, content_type: &str) -> Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn content_base(mut self, content_base: &str) -> Self {
        self.content_base = Some(content_base.to_string());
        self
    }

    pub fn full_trace(mut self, full_trace: bool) -> Self {
        self.full_trace = full_trace;
        self
    }

    pub fn exceptions(mut self, exceptions: impl IntoIterator<Item = Hash>) -> Self {
        self.exceptions = exceptions.into_iter().collect();
        self
    }

    pub fn include_archives(mut self, include_archives: bool) -> Self {
        self.include_archives = Some(include_archives);
        self
    }
}

/// Resolved state of one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHead {
    /// Address of the create entry, the stable identity of the object.
    pub origin: Hash,

    /// Address of the resolved latest (or pinned) version.
    pub head: Hash,

    pub record: ContentRecord,
}

/// Origins and update graph collected from the anchors of a group.
#[derive(Default)]
struct Evolutions {
    origins: BTreeSet<Hash>,
    updates: DiGraphMap<Hash, ()>,
    timestamps: HashMap<Hash, Timestamp>,
}

impl Evolutions {
    fn collect<S: ReadStore>(
        store: &S,
        config: &Config,
        query: &GroupContentQuery,
    ) -> Result<Self, CoopError> {
        // Anything but a group revision is an unknown group.
        let group_id = trace_origin(store, &query.group_id, GROUP_ENTRY_TYPE).map_err(
            |err| match err {
                ValidationError::UnexpectedEntryType { hash, .. } => ValidationError::NotFound(hash),
                err => err,
            },
        )?;

        let revisions = if query.full_trace {
            descendants(store, &group_id, GROUP_ENTRY_TYPE)?
                .into_iter()
                .map(|entry| entry.hash)
                .collect()
        } else {
            vec![trace_latest(
                store,
                &group_id,
                GROUP_ENTRY_TYPE,
                config.max_trace_depth,
            )?]
        };

        let include_archives = query.include_archives.unwrap_or(config.include_archives);

        let mut anchors = BTreeSet::new();
        for revision in &revisions {
            for link in store.get_links(revision, &LinkKind::GroupAuth)? {
                anchors.insert(link.target);
            }
            if include_archives {
                for link in store.get_links(revision, &LinkKind::GroupAuthArchive)? {
                    anchors.insert(link.target);

                    // Writes of a removed principal which were published before its removal can
                    // arrive after the archive was made, they are only found on its contribution
                    // anchor.
                    let Ok(Anchor::Archive { principal, .. }) = get_anchor(store, &link.target)
                    else {
                        continue;
                    };
                    anchors.insert(Anchor::contribution(group_id, principal).address()?);
                }
            }
        }

        let mut evolutions = Self::default();
        for anchor in &anchors {
            for link in store.get_links(anchor, &LinkKind::Contribution)? {
                let Ok(tag) = ContributionTag::from_bytes(&link.tag) else {
                    trace!(%anchor, target = %link.target, "skip contribution with invalid tag");
                    continue;
                };

                if tag.matches(query.content_type.as_deref(), query.content_base.as_deref()) {
                    evolutions.origins.insert(link.target);
                }
            }

            for link in store.get_links(anchor, &LinkKind::ContributionUpdate)? {
                let Ok(tag) = UpdateTag::from_bytes(&link.tag) else {
                    trace!(%anchor, target = %link.target, "skip update with invalid tag");
                    continue;
                };

                // Updates we can't resolve yet are ignored.
                let Some(entry) = store.get_entry(&link.target)? else {
                    continue;
                };
                if entry.entry_type() != CONTENT_ENTRY_TYPE
                    || entry.action().base() != Some(tag.base)
                {
                    trace!(%anchor, target = %link.target, "skip update not matching its tag");
                    continue;
                }

                evolutions.timestamps.insert(link.target, entry.timestamp());
                evolutions.updates.add_edge(tag.base, link.target, ());
            }
        }

        debug!(
            %group_id,
            revisions = revisions.len(),
            anchors = anchors.len(),
            origins = evolutions.origins.len(),
            updates = evolutions.updates.edge_count(),
            "collected group content"
        );

        Ok(evolutions)
    }

    /// Successor of an address, earliest update wins.
    fn next(&self, current: Hash) -> Option<Hash> {
        if !self.updates.contains_node(current) {
            return None;
        }

        self.updates
            .neighbors_directed(current, Direction::Outgoing)
            .min_by_key(|next| {
                (
                    self.timestamps.get(next).copied().unwrap_or_default(),
                    *next,
                )
            })
    }

    /// Path from an origin to its head.
    fn follow(&self, origin: Hash, exceptions: &BTreeSet<Hash>, max_depth: usize) -> Vec<Hash> {
        let mut path = vec![origin];
        let mut visited = HashSet::from([origin]);
        let mut current = origin;

        while path.len() <= max_depth {
            if exceptions.contains(&current) {
                trace!(%origin, %current, "stop at exception");
                break;
            }

            let Some(next) = self.next(current) else {
                break;
            };

            if !visited.insert(next) {
                break;
            }

            path.push(next);
            current = next;
        }

        path
    }
}

/// Resolve the head of every object contributed to a group.
///
/// Results are ordered by origin. Objects whose records are not known locally yet are left out,
/// an unknown group fails with `NotFound`.
pub fn get_group_content<S: ReadStore>(
    store: &S,
    config: &Config,
    query: &GroupContentQuery,
) -> Result<Vec<ContentHead>, CoopError> {
    let evolutions = Evolutions::collect(store, config, query)?;

    let mut result = Vec::with_capacity(evolutions.origins.len());
    for origin in &evolutions.origins {
        let path = evolutions.follow(*origin, &query.exceptions, config.max_trace_depth);
        if let Some(head) = resolve_head(store, *origin, &path)? {
            result.push(head);
        }
    }

    Ok(result)
}

/// Full update path of every object contributed to a group, from origin to head.
pub fn get_group_content_evolutions<S: ReadStore>(
    store: &S,
    config: &Config,
    query: &GroupContentQuery,
) -> Result<Vec<(Hash, Vec<Hash>)>, CoopError> {
    let evolutions = Evolutions::collect(store, config, query)?;

    Ok(evolutions
        .origins
        .iter()
        .map(|origin| {
            (
                *origin,
                evolutions.follow(*origin, &query.exceptions, config.max_trace_depth),
            )
        })
        .collect())
}

/// Resolve the head of a single object contributed to a group.
pub fn get_group_content_latest<S: ReadStore>(
    store: &S,
    config: &Config,
    query: &GroupContentQuery,
    origin: &Hash,
) -> Result<ContentHead, CoopError> {
    let evolutions = Evolutions::collect(store, config, query)?;

    if !evolutions.origins.contains(origin) {
        return Err(ValidationError::NotFound(*origin).into());
    }

    let path = evolutions.follow(*origin, &query.exceptions, config.max_trace_depth);
    resolve_head(store, *origin, &path)?.ok_or_else(|| ValidationError::NotFound(*origin).into())
}

fn resolve_head<S: ReadStore>(
    store: &S,
    origin: Hash,
    path: &[Hash],
) -> Result<Option<ContentHead>, CoopError> {
    let Some(head) = path.last().copied() else {
        return Ok(None);
    };

    if !store.has_entry(&origin)? {
        trace!(%origin, "skip unknown origin");
        return Ok(None);
    }

    let record = match get_content_record(store, &head) {
        Ok((_, record)) => record,
        Err(
            ValidationError::NotFound(_)
            | ValidationError::UnexpectedEntryType { .. }
            | ValidationError::Decode(_),
        ) => {
            trace!(%origin, %head, "skip object without content record");
            return Ok(None);
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Some(ContentHead {
        origin,
        head,
        record,
    }))
}
