// SPDX-License-Identifier: MIT OR Apache-2.0

//! Group-scoped content authorization and evolution tracing.
//!
//! Principals publish immutable, signed entries into a shared graph: group revisions which define
//! who may contribute (admins and members), and tracked content which is created once and then
//! superseded by updates. Every write is authorized against the specific group revision it
//! declares, so writes remain verifiable without knowing the latest state of the group.
//!
//! Reading walks the index edges of a group: each revision links the anchors of its authorities
//! (and the archive anchors of removed principals), anchors link the content and updates of
//! their principal. [`get_group_content`] reconstructs the current head of every object from
//! these edges.
//!
//! All operations receive the store explicitly, there is no global state:
//!
//! ```
//! use std::collections::BTreeSet;
//!
//! use coop_content::{
//!     Config, ContentRecord, GroupContentQuery, GroupRef, GroupRevision, LinkKind,
//!     create_content, create_group, get_group_content,
//! };
//! use coop_core::PrivateKey;
//! use coop_store::MemoryStore;
//!
//! let mut store = MemoryStore::<LinkKind>::new();
//! let alice = PrivateKey::new();
//!
//! let group_id = create_group(
//!     &mut store,
//!     &alice,
//!     GroupRevision::new(BTreeSet::from([alice.public_key()]), BTreeSet::new()),
//! )?;
//!
//! let record = ContentRecord::new(GroupRef::new(group_id, group_id), "post", b"hello");
//! let origin = create_content(&mut store, &alice, record)?;
//!
//! let content = get_group_content(&store, &Config::default(), &GroupContentQuery::new(group_id))?;
//! assert_eq!(content[0].origin, origin);
//! assert_eq!(content[0].head, origin);
//! # Ok::<(), coop_content::CoopError>(())
//! ```
pub mod anchor;
pub mod authorization;
mod config;
pub mod content;
mod error;
pub mod group;
pub mod link;
pub mod operation;
pub mod resolver;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
pub mod trace;

use coop_store::{EntryStore, LinkStore, PayloadStore};

pub use anchor::{Anchor, group_auth_anchor_address, group_auth_archive_anchor_address};
pub use authorization::{CounterSignatures, JointAuthorization};
pub use config::Config;
pub use content::{ContentRecord, GroupRef, create_content, get_content_record, update_content};
pub use error::{CoopError, ValidationError};
pub use group::{
    AuthorityDiff, GroupChanges, GroupRecord, GroupRevision, create_group, get_group, get_groups,
    propose_group_update, update_group, update_group_with_proof,
};
pub use link::{ContributionTag, IndexLink, LinkKind, UpdateTag};
pub use operation::{Operation, validate};
pub use resolver::{
    ContentHead, GroupContentQuery, get_group_content, get_group_content_evolutions,
    get_group_content_latest,
};

/// Read access to entries, anchors and index edges.
pub trait ReadStore: EntryStore + PayloadStore + LinkStore<LinkKind> {}

impl<S> ReadStore for S where S: EntryStore + PayloadStore + LinkStore<LinkKind> {}
