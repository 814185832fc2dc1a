// SPDX-License-Identifier: MIT OR Apache-2.0

//! Groups as append-only chains of immutable revisions.
//!
//! A group is identified by the address of its first revision (the origin). Every later revision
//! is an update entry pointing at its predecessor. The authority set of a revision (admins and
//! members) decides who may contribute content declaring that revision.
use std::collections::{BTreeMap, BTreeSet};

use coop_core::{Action, Body, Entry, EntryBuilder, Hash, PrivateKey, PublicKey, Timestamp};
use coop_store::{EntryStore, LinkStore, StoreHandle, WriteBatch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::anchor::{Anchor, archive_contributions};
use crate::authorization::CounterSignatures;
use crate::error::{CoopError, ValidationError};
use crate::link::{LinkKind, new_link};
use crate::operation::commit_validated;
use crate::trace::{descendants, get_typed_entry, trace_latest, trace_origin};

pub const GROUP_ENTRY_TYPE: &str = "coop/group";

/// Immutable revision of a group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRevision {
    pub admins: BTreeSet<PublicKey>,
    pub members: BTreeSet<PublicKey>,

    /// Groups can't be removed, they can only be marked as deleted (requires the same joint
    /// authorization as changing admins). Deleted groups accept no more content.
    pub deleted: bool,

    pub metadata: BTreeMap<String, String>,
    pub published_at: Timestamp,
    pub last_updated: Timestamp,
}

impl GroupRevision {
    pub fn new(admins: BTreeSet<PublicKey>, members: BTreeSet<PublicKey>) -> Self {
        let now = Timestamp::now();
        Self {
            admins,
            members,
            deleted: false,
            metadata: BTreeMap::new(),
            published_at: now,
            last_updated: now,
        }
    }

    pub fn with_admins(mut self, admins: impl IntoIterator<Item = PublicKey>) -> Self {
        self.admins = admins.into_iter().collect();
        self
    }

    pub fn with_members(mut self, members: impl IntoIterator<Item = PublicKey>) -> Self {
        self.members = members.into_iter().collect();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Admins and members of this revision.
    pub fn authorities(&self) -> BTreeSet<PublicKey> {
        self.admins.union(&self.members).copied().collect()
    }

    pub fn is_admin(&self, principal: &PublicKey) -> bool {
        self.admins.contains(principal)
    }

    pub fn is_authority(&self, principal: &PublicKey) -> bool {
        self.admins.contains(principal) || self.members.contains(principal)
    }

    /// Next revision with the given changes applied.
    pub fn apply(&self, changes: &GroupChanges) -> Self {
        Self {
            admins: changes.admins.clone().unwrap_or_else(|| self.admins.clone()),
            members: changes.members.clone().unwrap_or_else(|| self.members.clone()),
            deleted: changes.deleted.unwrap_or(self.deleted),
            metadata: changes
                .metadata
                .clone()
                .unwrap_or_else(|| self.metadata.clone()),
            published_at: self.published_at,
            last_updated: Timestamp::now().max(self.last_updated.next()),
        }
    }

    /// Returns true if replacing this revision with `next` needs the consent of all admins.
    pub fn requires_joint_authorization(&self, next: &GroupRevision) -> bool {
        self.admins != next.admins || self.deleted != next.deleted
    }
}

/// Changes to a group, fields which are `None` are kept.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GroupChanges {
    pub admins: Option<BTreeSet<PublicKey>>,
    pub members: Option<BTreeSet<PublicKey>>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub deleted: Option<bool>,
}

impl GroupChanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admins(mut self, admins: impl IntoIterator<Item = PublicKey>) -> Self {
        self.admins = Some(admins.into_iter().collect());
        self
    }

    pub fn members(mut self, members: impl IntoIterator<Item = PublicKey>) -> Self {
        self.members = Some(members.into_iter().collect());
        self
    }

    pub fn metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn deleted(mut self, deleted: bool) -> Self {
        self.deleted = Some(deleted);
        self
    }
}

/// Authority changes between two revisions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorityDiff {
    /// Authorities of the new revision which were not part of the old one.
    pub added: BTreeSet<PublicKey>,

    /// Authorities of the old revision which are not part of the new one.
    pub removed: BTreeSet<PublicKey>,

    /// Authorities of both revisions.
    pub intersection: BTreeSet<PublicKey>,
}

impl AuthorityDiff {
    pub fn new(old: &GroupRevision, new: &GroupRevision) -> Self {
        let old = old.authorities();
        let new = new.authorities();
        Self {
            added: new.difference(&old).copied().collect(),
            removed: old.difference(&new).copied().collect(),
            intersection: old.intersection(&new).copied().collect(),
        }
    }

    /// Principals which are added or removed.
    pub fn symmetric_difference(&self) -> BTreeSet<PublicKey> {
        self.added.union(&self.removed).copied().collect()
    }
}

/// Body of a group entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    pub revision: GroupRevision,

    /// Proof of consent of co-admins, empty if not needed.
    pub counter_signatures: CounterSignatures,
}

/// Look up a group revision entry and decode it.
pub fn get_group_record<S: EntryStore>(
    store: &S,
    hash: &Hash,
) -> Result<(Entry, GroupRecord), ValidationError> {
    let entry = get_typed_entry(store, hash, GROUP_ENTRY_TYPE)?;
    let record: GroupRecord = entry.body.decode()?;
    Ok((entry, record))
}

/// Latest revision of a group.
///
/// `id` can be the origin or any revision of the group, concurrent revisions are decided by the
/// earliest timestamp.
pub fn get_group<S: EntryStore>(
    store: &S,
    id: &Hash,
) -> Result<(Hash, GroupRevision), ValidationError> {
    let latest = trace_latest(store, id, GROUP_ENTRY_TYPE, usize::MAX)?;
    let (_, record) = get_group_record(store, &latest)?;
    Ok((latest, record.revision))
}

/// Check that a principal may contribute to a group while declaring revision `rev`.
///
/// The principal needs to be an authority of `rev`. Declaring an outdated revision is fine, unless
/// a later revision which was published at or before `timestamp` removed the principal again or
/// marked the group as deleted.
pub fn check_authority<S: EntryStore>(
    store: &S,
    rev: &Hash,
    principal: &PublicKey,
    timestamp: Timestamp,
) -> Result<(), ValidationError> {
    let (_, record) = get_group_record(store, rev)?;

    if !record.revision.is_authority(principal) {
        return Err(ValidationError::Unauthorized {
            principal: *principal,
            revision: *rev,
        });
    }

    if record.revision.deleted {
        return Err(ValidationError::GroupDeleted(*rev));
    }

    if let Some(deleted_in) =
        find_revocation(store, rev, timestamp, None, |revision| revision.deleted)?
    {
        debug!(%principal, %rev, %deleted_in, "group was deleted");
        return Err(ValidationError::GroupDeleted(deleted_in));
    }

    if let Some(revoked_in) = find_revocation(store, rev, timestamp, None, |revision| {
        !revision.is_authority(principal)
    })? {
        debug!(%principal, %rev, %revoked_in, "authority was revoked");
        return Err(ValidationError::Unauthorized {
            principal: *principal,
            revision: revoked_in,
        });
    }

    Ok(())
}

/// Find a later revision of `rev`, published at or before `timestamp`, which matches `revoked`.
pub(crate) fn find_revocation<S: EntryStore>(
    store: &S,
    rev: &Hash,
    timestamp: Timestamp,
    exclude: Option<&Hash>,
    revoked: impl Fn(&GroupRevision) -> bool,
) -> Result<Option<Hash>, ValidationError> {
    for entry in descendants(store, rev, GROUP_ENTRY_TYPE)?.into_iter().skip(1) {
        if entry.timestamp() > timestamp || Some(&entry.hash) == exclude {
            continue;
        }

        let record: GroupRecord = entry.body.decode()?;
        if revoked(&record.revision) {
            return Ok(Some(entry.hash));
        }
    }
    Ok(None)
}

/// Ids of all groups a principal published revisions for.
pub fn get_groups<S: EntryStore + LinkStore<LinkKind>>(
    store: &S,
    principal: &PublicKey,
) -> Result<BTreeSet<Hash>, ValidationError> {
    let mut groups = BTreeSet::new();
    for link in store.get_links(&principal.into(), &LinkKind::Group)? {
        match trace_origin(store, &link.target, GROUP_ENTRY_TYPE) {
            Ok(group_id) => {
                groups.insert(group_id);
            }
            // Revision is not known yet.
            Err(ValidationError::NotFound(_)) => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(groups)
}

/// Create a new group, the signer needs to be one of its admins.
///
/// Returns the address of the origin revision, which is the id of the group.
pub fn create_group<S: StoreHandle<LinkKind>>(
    store: &mut S,
    signer: &PrivateKey,
    revision: GroupRevision,
) -> Result<Hash, CoopError> {
    let record = GroupRecord {
        revision,
        counter_signatures: CounterSignatures::new(),
    };

    let latest = store.latest_entry(&signer.public_key())?;
    let entry = EntryBuilder::new(GROUP_ENTRY_TYPE, Action::Create, Body::from_record(&record)?)
        .sign(signer, latest.as_ref());
    let author = entry.author();
    let timestamp = entry.timestamp();

    let mut batch = WriteBatch::new();
    let group_id = batch.put_entry(entry);

    for principal in record.revision.authorities() {
        link_contribution_anchor(&mut batch, group_id, group_id, principal, author, timestamp)?;
    }

    batch.put_link(new_link(
        author,
        author.into(),
        LinkKind::Group,
        Vec::new(),
        group_id,
        timestamp,
    ))?;

    commit_validated(store, batch)?;
    debug!(%group_id, %author, "created group");

    Ok(group_id)
}

/// Build the revision which `update_group` would publish, for co-admins to counter-sign.
pub fn propose_group_update<S: EntryStore>(
    store: &S,
    base: &Hash,
    changes: &GroupChanges,
) -> Result<GroupRevision, CoopError> {
    let (_, record) = get_group_record(store, base)?;
    Ok(record.revision.apply(changes))
}

/// Publish a new revision of a group on top of `base`.
///
/// Changing the admins fails with `RequiresCounterSigning` unless `base` has a single admin, use
/// [`update_group_with_proof`] in that case.
pub fn update_group<S: StoreHandle<LinkKind>>(
    store: &mut S,
    signer: &PrivateKey,
    base: &Hash,
    changes: &GroupChanges,
) -> Result<Hash, CoopError> {
    let revision = propose_group_update(store, base, changes)?;
    update_group_with_proof(store, signer, base, revision, CounterSignatures::new())
}

/// Publish a new revision of a group with a proof of joint authorization by the co-admins.
pub fn update_group_with_proof<S: StoreHandle<LinkKind>>(
    store: &mut S,
    signer: &PrivateKey,
    base: &Hash,
    revision: GroupRevision,
    proof: CounterSignatures,
) -> Result<Hash, CoopError> {
    let (base_entry, base_record) = get_group_record(store, base)?;
    let group_id = trace_origin(store, base, GROUP_ENTRY_TYPE)?;

    let record = GroupRecord {
        revision,
        counter_signatures: proof,
    };

    let latest = store.latest_entry(&signer.public_key())?;
    let entry = EntryBuilder::new(
        GROUP_ENTRY_TYPE,
        Action::Update { base: *base },
        Body::from_record(&record)?,
    )
    .after(base_entry.timestamp())
    .sign(signer, latest.as_ref());
    let author = entry.author();
    let timestamp = entry.timestamp();

    let mut batch = WriteBatch::new();
    let revision_address = batch.put_entry(entry);

    // Archives of earlier removals stay reachable from every later revision.
    for link in store.get_links(base, &LinkKind::GroupAuthArchive)? {
        batch.put_link(new_link(
            author,
            revision_address,
            LinkKind::GroupAuthArchive,
            Vec::new(),
            link.target,
            timestamp,
        ))?;
    }

    let diff = AuthorityDiff::new(&base_record.revision, &record.revision);

    for principal in &diff.removed {
        let archive_address =
            archive_contributions(store, &mut batch, group_id, *principal, author)?;
        batch.put_link(new_link(
            author,
            revision_address,
            LinkKind::GroupAuthArchive,
            Vec::new(),
            archive_address,
            timestamp,
        ))?;
    }

    for principal in diff.added.iter().chain(diff.intersection.iter()) {
        link_contribution_anchor(
            &mut batch,
            group_id,
            revision_address,
            *principal,
            author,
            timestamp,
        )?;
    }

    batch.put_link(new_link(
        author,
        author.into(),
        LinkKind::Group,
        Vec::new(),
        revision_address,
        timestamp,
    ))?;

    commit_validated(store, batch)?;
    debug!(
        %group_id,
        %revision_address,
        %author,
        added = diff.added.len(),
        removed = diff.removed.len(),
        "updated group"
    );

    Ok(revision_address)
}

/// Add the contribution anchor of a principal and link it from a revision.
fn link_contribution_anchor(
    batch: &mut WriteBatch<LinkKind>,
    group_id: Hash,
    revision: Hash,
    principal: PublicKey,
    author: PublicKey,
    timestamp: Timestamp,
) -> Result<(), CoopError> {
    let anchor = Anchor::contribution(group_id, principal);
    let anchor_address = batch.put_payload(anchor.to_body()?);
    batch.put_link(new_link(
        author,
        revision,
        LinkKind::GroupAuth,
        Vec::new(),
        anchor_address,
        timestamp,
    ))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use assert_matches::assert_matches;
    use coop_core::PrivateKey;
    use coop_store::{LinkStore, MemoryStore};

    use crate::anchor::{group_auth_anchor_address, group_auth_archive_anchor_address};
    use crate::authorization::CounterSignatures;
    use crate::error::{CoopError, ValidationError};
    use crate::link::LinkKind;
    use crate::test_utils::setup_logging;

    use super::{
        AuthorityDiff, GroupChanges, GroupRevision, create_group, get_group, get_groups,
        propose_group_update, update_group, update_group_with_proof,
    };

    #[test]
    fn authority_diff() {
        let alice = PrivateKey::new().public_key();
        let bob = PrivateKey::new().public_key();
        let carol = PrivateKey::new().public_key();

        let old = GroupRevision::new(BTreeSet::from([alice]), BTreeSet::from([bob]));
        let new = old.clone().with_members([carol]);

        let diff = AuthorityDiff::new(&old, &new);
        assert_eq!(diff.added, BTreeSet::from([carol]));
        assert_eq!(diff.removed, BTreeSet::from([bob]));
        assert_eq!(diff.intersection, BTreeSet::from([alice]));
        assert_eq!(diff.symmetric_difference(), BTreeSet::from([bob, carol]));

        // Promoting a member to admin doesn't change the authority set.
        let promoted = old.clone().with_admins([alice, bob]).with_members([]);
        let diff = AuthorityDiff::new(&old, &promoted);
        assert!(diff.added.is_empty());
        assert!(diff.removed.is_empty());
        assert_eq!(diff.intersection, BTreeSet::from([alice, bob]));
    }

    #[test]
    fn create_and_get() {
        setup_logging();
        let mut store = MemoryStore::new();
        let alice = PrivateKey::new();
        let bob = PrivateKey::new();

        let revision = GroupRevision::new(
            BTreeSet::from([alice.public_key()]),
            BTreeSet::from([bob.public_key()]),
        )
        .with_metadata("name", "garden club");
        let group_id = create_group(&mut store, &alice, revision.clone()).unwrap();

        let (latest, fetched) = get_group(&store, &group_id).unwrap();
        assert_eq!(latest, group_id);
        assert_eq!(fetched, revision);

        // Every authority got an anchor linked from the origin revision.
        let anchors: BTreeSet<_> = store
            .get_links(&group_id, &LinkKind::GroupAuth)
            .unwrap()
            .into_iter()
            .map(|link| link.target)
            .collect();
        assert_eq!(
            anchors,
            BTreeSet::from([
                group_auth_anchor_address(group_id, alice.public_key()).unwrap(),
                group_auth_anchor_address(group_id, bob.public_key()).unwrap(),
            ])
        );

        assert_eq!(
            get_groups(&store, &alice.public_key()).unwrap(),
            BTreeSet::from([group_id])
        );
        assert!(get_groups(&store, &bob.public_key()).unwrap().is_empty());
    }

    #[test]
    fn creator_must_be_admin() {
        let mut store = MemoryStore::new();
        let alice = PrivateKey::new();
        let bob = PrivateKey::new();

        let result = create_group(
            &mut store,
            &bob,
            GroupRevision::new(
                BTreeSet::from([alice.public_key()]),
                BTreeSet::from([bob.public_key()]),
            ),
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::Unauthorized { .. }))
        );

        let result = create_group(
            &mut store,
            &alice,
            GroupRevision::new(BTreeSet::new(), BTreeSet::from([alice.public_key()])),
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::EmptyAdminSet))
        );
    }

    #[test]
    fn update_members() {
        let mut store = MemoryStore::new();
        let alice = PrivateKey::new();
        let bob = PrivateKey::new();
        let carol = PrivateKey::new();

        let group_id = create_group(
            &mut store,
            &alice,
            GroupRevision::new(
                BTreeSet::from([alice.public_key()]),
                BTreeSet::from([bob.public_key()]),
            ),
        )
        .unwrap();

        let changes = GroupChanges::new().members([carol.public_key()]);
        let revision = update_group(&mut store, &alice, &group_id, &changes).unwrap();

        let (latest, fetched) = get_group(&store, &group_id).unwrap();
        assert_eq!(latest, revision);
        assert_eq!(fetched.members, BTreeSet::from([carol.public_key()]));

        // Bob's contributions moved to an archive which the new revision links to.
        let archives: Vec<_> = store
            .get_links(&revision, &LinkKind::GroupAuthArchive)
            .unwrap()
            .into_iter()
            .map(|link| link.target)
            .collect();
        assert_eq!(
            archives,
            vec![group_auth_archive_anchor_address(group_id, bob.public_key()).unwrap()]
        );

        // Archive edges carry over to later revisions.
        let changes = GroupChanges::new().metadata(BTreeMap::from([(
            "name".to_string(),
            "new name".to_string(),
        )]));
        let next = update_group(&mut store, &alice, &revision, &changes).unwrap();
        assert_eq!(
            store
                .get_links(&next, &LinkKind::GroupAuthArchive)
                .unwrap()
                .len(),
            1
        );

        // Members can't update the group.
        let result = update_group(
            &mut store,
            &carol,
            &next,
            &GroupChanges::new().members([]),
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::Unauthorized { .. }))
        );
    }

    #[test]
    fn admin_changes() {
        let mut store = MemoryStore::new();
        let alice = PrivateKey::new();
        let bob = PrivateKey::new();
        let carol = PrivateKey::new();

        let group_id = create_group(
            &mut store,
            &alice,
            GroupRevision::new(BTreeSet::from([alice.public_key()]), BTreeSet::new()),
        )
        .unwrap();

        // Sole admin may change admins alone.
        let two_admins = update_group(
            &mut store,
            &alice,
            &group_id,
            &GroupChanges::new().admins([alice.public_key(), bob.public_key()]),
        )
        .unwrap();

        // Now it needs bob's consent.
        let changes = GroupChanges::new().admins([alice.public_key(), carol.public_key()]);
        let result = update_group(&mut store, &alice, &two_admins, &changes);
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::RequiresCounterSigning(base))) if base == two_admins
        );

        // Removing all admins is never allowed.
        let result = update_group(
            &mut store,
            &alice,
            &group_id,
            &GroupChanges::new().admins([]),
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::EmptyAdminSet))
        );

        let proposal = propose_group_update(&store, &two_admins, &changes).unwrap();

        // A signature over a different proposal doesn't count.
        let mut wrong_proof = CounterSignatures::new();
        wrong_proof.sign(&bob, &group_id, &proposal).unwrap();
        let result = update_group_with_proof(
            &mut store,
            &alice,
            &two_admins,
            proposal.clone(),
            wrong_proof,
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::RequiresCounterSigning(_)))
        );

        let mut proof = CounterSignatures::new();
        proof.sign(&bob, &two_admins, &proposal).unwrap();
        let revision =
            update_group_with_proof(&mut store, &alice, &two_admins, proposal, proof).unwrap();

        let (latest, fetched) = get_group(&store, &group_id).unwrap();
        assert_eq!(latest, revision);
        assert_eq!(
            fetched.admins,
            BTreeSet::from([alice.public_key(), carol.public_key()])
        );
    }

    #[test]
    fn unknown_base() {
        let mut store = MemoryStore::new();
        let alice = PrivateKey::new();

        let result = update_group(
            &mut store,
            &alice,
            &coop_core::Hash::new(b"nothing"),
            &GroupChanges::new(),
        );
        assert_matches!(
            result,
            Err(CoopError::Validation(ValidationError::NotFound(_)))
        );
    }
}
