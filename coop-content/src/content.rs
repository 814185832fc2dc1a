// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tracked objects contributed to a group.
//!
//! Content is never mutated. A create entry establishes the origin of an object and every update
//! entry supersedes a `base`. Next to the entry, each write adds an edge from the author's
//! contribution anchor so readers can discover the object (or its update) through the group.
use coop_core::{Action, Body, Entry, EntryBuilder, Hash, PrivateKey, Timestamp};
use coop_store::{EntryStore, StoreHandle, WriteBatch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anchor::Anchor;
use crate::error::{CoopError, ValidationError};
use crate::group::GROUP_ENTRY_TYPE;
use crate::link::{ContributionTag, LinkKind, UpdateTag, new_link};
use crate::operation::commit_validated;
use crate::trace::{get_typed_entry, trace_origin};

pub const CONTENT_ENTRY_TYPE: &str = "coop/content";

/// Group and group revision a record is published under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRef {
    /// Origin revision of the group. Fixed for the whole lifetime of an object.
    pub id: Hash,

    /// Revision whose authority set authorizes the write.
    pub rev: Hash,
}

impl GroupRef {
    pub fn new(id: Hash, rev: Hash) -> Self {
        Self { id, rev }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub group_ref: GroupRef,
    pub content_type: String,

    /// Optional address or path this content belongs to, for example the subject of a comment.
    pub content_base: Option<String>,

    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,

    pub published_at: Timestamp,
    pub last_updated: Timestamp,
}

impl ContentRecord {
    pub fn new(group_ref: GroupRef, content_type: &str, payload: &[u8]) -> Self {
        let now = Timestamp::now();
        Self {
            group_ref,
            content_type: content_type.to_string(),
            content_base: None,
            payload: payload.to_vec(),
            published_at: now,
            last_updated: now,
        }
    }

    pub fn with_content_base(mut self, content_base: &str) -> Self {
        self.content_base = Some(content_base.to_string());
        self
    }

    /// Declare another revision of the group.
    pub fn with_group_rev(mut self, rev: Hash) -> Self {
        self.group_ref.rev = rev;
        self
    }

    /// Next version of this record with a new payload.
    pub fn revise(&self, payload: &[u8]) -> Self {
        Self {
            payload: payload.to_vec(),
            last_updated: Timestamp::now().max(self.last_updated.next()),
            ..self.clone()
        }
    }

    pub fn tag(&self) -> ContributionTag {
        ContributionTag {
            content_type: self.content_type.clone(),
            content_base: self.content_base.clone(),
        }
    }
}

/// Look up a content entry and decode it.
pub fn get_content_record<S: EntryStore>(
    store: &S,
    hash: &Hash,
) -> Result<(Entry, ContentRecord), ValidationError> {
    let entry = get_typed_entry(store, hash, CONTENT_ENTRY_TYPE)?;
    let record: ContentRecord = entry.body.decode()?;
    Ok((entry, record))
}

/// Publish a new object. Returns its origin address.
///
/// The signer needs to be an authority of the declared group revision.
pub fn create_content<S: StoreHandle<LinkKind>>(
    store: &mut S,
    signer: &PrivateKey,
    record: ContentRecord,
) -> Result<Hash, CoopError> {
    let rev_entry = get_typed_entry(store, &record.group_ref.rev, GROUP_ENTRY_TYPE)?;

    let latest = store.latest_entry(&signer.public_key())?;
    let entry = EntryBuilder::new(CONTENT_ENTRY_TYPE, Action::Create, Body::from_record(&record)?)
        .after(rev_entry.timestamp())
        .sign(signer, latest.as_ref());
    let author = entry.author();
    let timestamp = entry.timestamp();

    let mut batch = WriteBatch::new();
    let origin = batch.put_entry(entry);

    let anchor = Anchor::contribution(record.group_ref.id, author);
    let anchor_address = batch.put_payload(anchor.to_body()?);
    batch.put_link(new_link(
        author,
        anchor_address,
        LinkKind::Contribution,
        record.tag().to_bytes()?,
        origin,
        timestamp,
    ))?;
    batch.put_link(new_link(
        author,
        author.into(),
        LinkKind::Authored,
        Vec::new(),
        origin,
        timestamp,
    ))?;

    commit_validated(store, batch)?;
    debug!(%origin, %author, group_id = %record.group_ref.id, "created content");

    Ok(origin)
}

/// Publish a new version of an object, superseding `base`.
///
/// `base` can be the origin or any later version. The new record needs to keep the group id and
/// may declare a later revision of the group.
pub fn update_content<S: StoreHandle<LinkKind>>(
    store: &mut S,
    signer: &PrivateKey,
    base: &Hash,
    record: ContentRecord,
) -> Result<Hash, CoopError> {
    let (base_entry, _) = get_content_record(store, base)?;
    let origin = trace_origin(store, base, CONTENT_ENTRY_TYPE)?;
    let rev_entry = get_typed_entry(store, &record.group_ref.rev, GROUP_ENTRY_TYPE)?;

    let latest = store.latest_entry(&signer.public_key())?;
    let entry = EntryBuilder::new(
        CONTENT_ENTRY_TYPE,
        Action::Update { base: *base },
        Body::from_record(&record)?,
    )
    .after(base_entry.timestamp().max(rev_entry.timestamp()))
    .sign(signer, latest.as_ref());
    let author = entry.author();
    let timestamp = entry.timestamp();

    let mut batch = WriteBatch::new();
    let address = batch.put_entry(entry);

    let anchor = Anchor::contribution(record.group_ref.id, author);
    let anchor_address = batch.put_payload(anchor.to_body()?);
    let tag = UpdateTag {
        origin,
        base: *base,
    };
    batch.put_link(new_link(
        author,
        anchor_address,
        LinkKind::ContributionUpdate,
        tag.to_bytes()?,
        address,
        timestamp,
    ))?;

    commit_validated(store, batch)?;
    debug!(%origin, %base, %address, %author, "updated content");

    Ok(address)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use coop_core::{Hash, PrivateKey};
    use coop_store::{EntryStore, LinkStore, MemoryStore};

    use crate::anchor::group_auth_anchor_address;
    use crate::group::{GroupRevision, create_group};
    use crate::link::{ContributionTag, LinkKind, UpdateTag};
    use crate::test_utils::setup_logging;

    use super::{ContentRecord, GroupRef, create_content, get_content_record, update_content};

    #[test]
    fn revise_keeps_group() {
        let group_ref = GroupRef::new(Hash::new(b"group"), Hash::new(b"rev"));
        let record = ContentRecord::new(group_ref, "post", b"v0").with_content_base("thread");
        let revised = record.revise(b"v1");

        assert_eq!(revised.group_ref, group_ref);
        assert_eq!(revised.content_base.as_deref(), Some("thread"));
        assert_eq!(revised.published_at, record.published_at);
        assert!(revised.last_updated > record.last_updated);
        assert_eq!(
            revised.tag(),
            ContributionTag {
                content_type: "post".to_string(),
                content_base: Some("thread".to_string()),
            }
        );
    }

    #[test]
    fn writes_index_edges() {
        setup_logging();
        let mut store = MemoryStore::<LinkKind>::new();
        let alice = PrivateKey::new();

        let group_id = create_group(
            &mut store,
            &alice,
            GroupRevision::new(BTreeSet::from([alice.public_key()]), BTreeSet::new()),
        )
        .unwrap();

        let record = ContentRecord::new(GroupRef::new(group_id, group_id), "post", b"v0");
        let origin = create_content(&mut store, &alice, record.clone()).unwrap();
        let update = update_content(&mut store, &alice, &origin, record.revise(b"v1")).unwrap();

        let anchor = group_auth_anchor_address(group_id, alice.public_key()).unwrap();

        let contributions = store.get_links(&anchor, &LinkKind::Contribution).unwrap();
        assert_eq!(contributions.len(), 1);
        assert_eq!(contributions[0].target, origin);
        assert_eq!(
            ContributionTag::from_bytes(&contributions[0].tag).unwrap(),
            record.tag()
        );

        let updates = store
            .get_links(&anchor, &LinkKind::ContributionUpdate)
            .unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].target, update);
        assert_eq!(
            UpdateTag::from_bytes(&updates[0].tag).unwrap(),
            UpdateTag {
                origin,
                base: origin
            }
        );

        let authored = store
            .get_links(&alice.public_key().into(), &LinkKind::Authored)
            .unwrap();
        assert_eq!(authored.len(), 1);
        assert_eq!(authored[0].target, origin);

        let (entry, record) = get_content_record(&store, &update).unwrap();
        assert_eq!(entry.action().base(), Some(origin));
        assert_eq!(record.payload, b"v1");
        assert!(entry.timestamp() > store.get_entry(&origin).unwrap().unwrap().timestamp());
    }
}
