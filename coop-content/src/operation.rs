// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation of every record and edge before it gets committed.
//!
//! Each write of the engine is expressed as a set of [`Operation`]s which are checked against the
//! store (including the other records of the same write) before anything is committed. Records
//! received from other peers can be checked with the same [`validate`] function.
use coop_core::{Action, Entry, Hash, validate_entry};
use coop_store::{StagedView, StoreHandle, WriteBatch};
use tracing::{debug, trace};

use crate::ReadStore;
use crate::anchor::{Anchor, get_anchor};
use crate::authorization::JointAuthorization;
use crate::content::{CONTENT_ENTRY_TYPE, ContentRecord, get_content_record};
use crate::error::{CoopError, ValidationError};
use crate::group::{
    GROUP_ENTRY_TYPE, GroupRecord, GroupRevision, check_authority, find_revocation,
    get_group_record,
};
use crate::link::{ContributionTag, IndexLink, LinkKind, UpdateTag};
use crate::trace::{descendants, is_descendant, trace_origin};

#[derive(Clone, Debug)]
pub enum Operation {
    CreateGroup {
        entry: Entry,
        record: GroupRecord,
    },
    UpdateGroup {
        entry: Entry,
        base: Hash,
        record: GroupRecord,
    },
    CreateContent {
        entry: Entry,
        record: ContentRecord,
    },
    UpdateContent {
        entry: Entry,
        base: Hash,
        record: ContentRecord,
    },
    CreateLink {
        link: IndexLink,
    },
}

impl Operation {
    /// Decode an entry into the operation it represents.
    pub fn from_entry(entry: Entry) -> Result<Self, ValidationError> {
        let entry_type = entry.entry_type().to_string();
        let action = entry.action().clone();
        match (entry_type.as_str(), action) {
            (GROUP_ENTRY_TYPE, Action::Create) => {
                let record = entry.body.decode()?;
                Ok(Operation::CreateGroup { entry, record })
            }
            (GROUP_ENTRY_TYPE, Action::Update { base }) => {
                let record = entry.body.decode()?;
                Ok(Operation::UpdateGroup {
                    entry,
                    base,
                    record,
                })
            }
            (CONTENT_ENTRY_TYPE, Action::Create) => {
                let record = entry.body.decode()?;
                Ok(Operation::CreateContent { entry, record })
            }
            (CONTENT_ENTRY_TYPE, Action::Update { base }) => {
                let record = entry.body.decode()?;
                Ok(Operation::UpdateContent {
                    entry,
                    base,
                    record,
                })
            }
            (entry_type, _) => Err(ValidationError::UnknownEntryType(
                entry.hash,
                entry_type.to_string(),
            )),
        }
    }
}

/// Check an operation against the current state of the store.
pub fn validate<S: ReadStore>(operation: &Operation, store: &S) -> Result<(), ValidationError> {
    match operation {
        Operation::CreateGroup { entry, record } => {
            validate_entry(entry)?;
            validate_create_group(entry, record)
        }
        Operation::UpdateGroup {
            entry,
            base,
            record,
        } => {
            validate_entry(entry)?;
            validate_update_group(store, entry, base, record)
        }
        Operation::CreateContent { entry, record } => {
            validate_entry(entry)?;
            validate_create_content(store, entry, record)
        }
        Operation::UpdateContent {
            entry,
            base,
            record,
        } => {
            validate_entry(entry)?;
            validate_update_content(store, entry, base, record)
        }
        Operation::CreateLink { link } => validate_link(store, link),
    }
}

fn validate_create_group(entry: &Entry, record: &GroupRecord) -> Result<(), ValidationError> {
    let revision = &record.revision;

    if revision.admins.is_empty() {
        return Err(ValidationError::EmptyAdminSet);
    }

    if !revision.is_admin(&entry.author()) {
        return Err(ValidationError::Unauthorized {
            principal: entry.author(),
            revision: entry.hash,
        });
    }

    Ok(())
}

fn validate_update_group<S: ReadStore>(
    store: &S,
    entry: &Entry,
    base: &Hash,
    record: &GroupRecord,
) -> Result<(), ValidationError> {
    let (_, base_record) = get_group_record(store, base)?;
    let author = entry.author();
    let old = &base_record.revision;
    let new = &record.revision;

    if !old.is_admin(&author) {
        return Err(ValidationError::Unauthorized {
            principal: author,
            revision: *base,
        });
    }

    if let Some(revoked_in) = find_revocation(
        store,
        base,
        entry.timestamp(),
        Some(&entry.hash),
        |revision| !revision.is_admin(&author),
    )? {
        return Err(ValidationError::Unauthorized {
            principal: author,
            revision: revoked_in,
        });
    }

    if new.admins.is_empty() {
        return Err(ValidationError::EmptyAdminSet);
    }

    if old.requires_joint_authorization(new) && old.admins.len() > 1 {
        let co_admins = old.admins.iter().filter(|admin| **admin != author);
        if !record.counter_signatures.certifies_all(base, new, co_admins) {
            debug!(%base, %author, "admin change without counter-signatures of all admins");
            return Err(ValidationError::RequiresCounterSigning(*base));
        }
    }

    Ok(())
}

fn validate_create_content<S: ReadStore>(
    store: &S,
    entry: &Entry,
    record: &ContentRecord,
) -> Result<(), ValidationError> {
    let group_ref = record.group_ref;

    if trace_origin(store, &group_ref.rev, GROUP_ENTRY_TYPE)? != group_ref.id {
        return Err(ValidationError::InvalidGroupRef {
            id: group_ref.id,
            rev: group_ref.rev,
        });
    }

    check_authority(store, &group_ref.rev, &entry.author(), entry.timestamp())
}

fn validate_update_content<S: ReadStore>(
    store: &S,
    entry: &Entry,
    base: &Hash,
    record: &ContentRecord,
) -> Result<(), ValidationError> {
    let (_, base_record) = get_content_record(store, base)?;
    let group_ref = record.group_ref;

    if group_ref.id != base_record.group_ref.id {
        return Err(ValidationError::ImmutableGroupId {
            expected: base_record.group_ref.id,
            given: group_ref.id,
        });
    }

    if trace_origin(store, &group_ref.rev, GROUP_ENTRY_TYPE)? != group_ref.id {
        return Err(ValidationError::InvalidGroupRef {
            id: group_ref.id,
            rev: group_ref.rev,
        });
    }

    // The declared revision may move forwards, never backwards.
    if !is_descendant(
        store,
        &base_record.group_ref.rev,
        &group_ref.rev,
        GROUP_ENTRY_TYPE,
    )? {
        return Err(ValidationError::InvalidGroupRef {
            id: group_ref.id,
            rev: group_ref.rev,
        });
    }

    check_authority(store, &group_ref.rev, &entry.author(), entry.timestamp())
}

fn validate_link<S: ReadStore>(store: &S, link: &IndexLink) -> Result<(), ValidationError> {
    trace!(link_type = ?link.link_type, source = %link.source, target = %link.target, "validate link");

    match link.link_type {
        LinkKind::Group => {
            if link.source != Hash::from(link.author) {
                return Err(ValidationError::MalformedLinkBase(link.source));
            }

            let (entry, _) = get_group_record(store, &link.target)?;
            if entry.author() != link.author {
                return Err(ValidationError::Unauthorized {
                    principal: link.author,
                    revision: link.target,
                });
            }
        }
        LinkKind::Authored => {
            if link.source != Hash::from(link.author) {
                return Err(ValidationError::MalformedLinkBase(link.source));
            }

            let (entry, record) = get_content_record(store, &link.target)?;
            if entry.author() != link.author {
                return Err(ValidationError::Unauthorized {
                    principal: link.author,
                    revision: record.group_ref.rev,
                });
            }
        }
        LinkKind::GroupAuth | LinkKind::GroupAuthArchive => {
            let (revision_entry, revision_record) = get_group_record(store, &link.source)
                .map_err(|err| match err {
                    ValidationError::UnexpectedEntryType { .. } | ValidationError::Decode(_) => {
                        ValidationError::MalformedLinkBase(link.source)
                    }
                    err => err,
                })?;

            if revision_entry.author() != link.author {
                return Err(ValidationError::Unauthorized {
                    principal: link.author,
                    revision: link.source,
                });
            }

            let group_id = trace_origin(store, &link.source, GROUP_ENTRY_TYPE)?;
            let anchor = get_anchor(store, &link.target)?;
            if anchor.group_id() != group_id {
                return Err(ValidationError::InvalidGroupRef {
                    id: anchor.group_id(),
                    rev: link.source,
                });
            }

            match (link.link_type, anchor) {
                (LinkKind::GroupAuth, Anchor::Contribution { principal, .. }) => {
                    if !revision_record.revision.is_authority(&principal) {
                        return Err(ValidationError::Unauthorized {
                            principal,
                            revision: link.source,
                        });
                    }
                }
                (LinkKind::GroupAuthArchive, Anchor::Archive { principal, .. }) => {
                    let was_authority =
                        was_in_group(store, &group_id, |revision| revision.is_authority(&principal))?;
                    if !was_authority {
                        return Err(ValidationError::Unauthorized {
                            principal,
                            revision: link.source,
                        });
                    }
                }
                _ => return Err(ValidationError::MalformedLinkBase(link.target)),
            }
        }
        LinkKind::Contribution | LinkKind::ContributionUpdate => {
            let anchor = get_anchor(store, &link.source)?;

            match anchor {
                Anchor::Contribution { principal, .. } => {
                    if link.author != principal {
                        return Err(ValidationError::Unauthorized {
                            principal: link.author,
                            revision: anchor.group_id(),
                        });
                    }
                }
                Anchor::Archive { group_id, .. } => {
                    let was_admin =
                        was_in_group(store, &group_id, |revision| revision.is_admin(&link.author))?;
                    if !was_admin {
                        return Err(ValidationError::Unauthorized {
                            principal: link.author,
                            revision: group_id,
                        });
                    }
                }
            }

            let (target_entry, target_record) = get_content_record(store, &link.target)?;
            if target_entry.author() != anchor.principal() {
                return Err(ValidationError::Unauthorized {
                    principal: target_entry.author(),
                    revision: target_record.group_ref.rev,
                });
            }

            if target_record.group_ref.id != anchor.group_id() {
                return Err(ValidationError::InvalidGroupRef {
                    id: anchor.group_id(),
                    rev: target_record.group_ref.rev,
                });
            }

            if link.link_type == LinkKind::Contribution {
                let tag = ContributionTag::from_bytes(&link.tag)
                    .map_err(|_| ValidationError::InvalidLinkTag(link.target))?;
                if !target_entry.action().is_create() || tag != target_record.tag() {
                    return Err(ValidationError::InvalidLinkTag(link.target));
                }
            } else {
                let tag = UpdateTag::from_bytes(&link.tag)
                    .map_err(|_| ValidationError::InvalidLinkTag(link.target))?;
                let origin = trace_origin(store, &link.target, CONTENT_ENTRY_TYPE)?;
                if target_entry.action().base() != Some(tag.base) || tag.origin != origin {
                    return Err(ValidationError::InvalidLinkTag(link.target));
                }
            }
        }
    }

    Ok(())
}

/// Returns true if any known revision of the group matches.
fn was_in_group<S: ReadStore>(
    store: &S,
    group_id: &Hash,
    matches: impl Fn(&GroupRevision) -> bool,
) -> Result<bool, ValidationError> {
    for entry in descendants(store, group_id, GROUP_ENTRY_TYPE)? {
        let record: GroupRecord = entry.body.decode()?;
        if matches(&record.revision) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Validate all records and edges of a batch, then commit it.
pub(crate) fn commit_validated<S: StoreHandle<LinkKind>>(
    store: &mut S,
    batch: WriteBatch<LinkKind>,
) -> Result<(), CoopError> {
    {
        let view = StagedView::new(&*store, &batch);
        for entry in batch.entries() {
            validate(&Operation::from_entry(entry.clone())?, &view)?;
        }
        for link in batch.links() {
            validate(&Operation::CreateLink { link: link.clone() }, &view)?;
        }
    }

    store.commit(batch)?;
    Ok(())
}
