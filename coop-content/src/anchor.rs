// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic markers which index the contributions of a principal to a group.
//!
//! Anchors carry no meaning on their own, they only exist as sources of `Contribution` and
//! `ContributionUpdate` edges. Their address is the hash of their encoding, so every peer derives
//! the same address for the same `(group, principal)` pair without looking anything up.
//!
//! A contribution anchor is keyed by the group id, so a principal indexes all of its content for a
//! group under the same address, regardless of which revision it declared. Every revision links
//! the contribution anchors of its current authorities with `GroupAuth` edges.
//!
//! When a principal gets removed from a group its edges are copied over to an archive anchor,
//! which the new revision links with a `GroupAuthArchive` edge. The original edges remain, the
//! store is append-only.
use coop_core::cbor::{DecodeError, EncodeError};
use coop_core::{Body, Hash, PublicKey};
use coop_store::{LinkStore, PayloadStore, WriteBatch};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoopError, ValidationError};
use crate::link::{LinkKind, new_link};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Anchor {
    Contribution { group_id: Hash, principal: PublicKey },
    Archive { group_id: Hash, principal: PublicKey },
}

impl Anchor {
    pub fn contribution(group_id: Hash, principal: PublicKey) -> Self {
        Self::Contribution {
            group_id,
            principal,
        }
    }

    pub fn archive(group_id: Hash, principal: PublicKey) -> Self {
        Self::Archive {
            group_id,
            principal,
        }
    }

    pub fn group_id(&self) -> Hash {
        match self {
            Anchor::Contribution { group_id, .. } | Anchor::Archive { group_id, .. } => *group_id,
        }
    }

    pub fn principal(&self) -> PublicKey {
        match self {
            Anchor::Contribution { principal, .. } | Anchor::Archive { principal, .. } => {
                *principal
            }
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, Anchor::Archive { .. })
    }

    pub fn to_body(&self) -> Result<Body, EncodeError> {
        Body::from_record(self)
    }

    pub fn from_body(body: &Body) -> Result<Self, DecodeError> {
        body.decode()
    }

    pub fn address(&self) -> Result<Hash, EncodeError> {
        Ok(self.to_body()?.hash())
    }
}

/// Address of the contribution anchor of a principal in a group.
pub fn group_auth_anchor_address(group_id: Hash, principal: PublicKey) -> Result<Hash, EncodeError> {
    Anchor::contribution(group_id, principal).address()
}

/// Address of the archive anchor of a principal in a group.
pub fn group_auth_archive_anchor_address(
    group_id: Hash,
    principal: PublicKey,
) -> Result<Hash, EncodeError> {
    Anchor::archive(group_id, principal).address()
}

/// Look up and decode an anchor.
pub(crate) fn get_anchor<S: PayloadStore>(store: &S, address: &Hash) -> Result<Anchor, ValidationError> {
    let body = store
        .get_payload(address)?
        .ok_or(ValidationError::NotFound(*address))?;
    Anchor::from_body(&body).map_err(|_| ValidationError::MalformedLinkBase(*address))
}

/// Copy all contribution edges of a removed principal onto its archive anchor.
///
/// Edges keep their tags, targets and timestamps, repeating the migration yields the same edges.
/// Returns the address of the archive anchor, which is added to the batch.
pub(crate) fn archive_contributions<S: LinkStore<LinkKind>>(
    store: &S,
    batch: &mut WriteBatch<LinkKind>,
    group_id: Hash,
    principal: PublicKey,
    author: PublicKey,
) -> Result<Hash, CoopError> {
    let contribution_address = group_auth_anchor_address(group_id, principal)?;
    let archive = Anchor::archive(group_id, principal);
    let archive_address = batch.put_payload(archive.to_body()?);

    let mut copied = 0;
    for link_type in [LinkKind::Contribution, LinkKind::ContributionUpdate] {
        for link in store.get_links(&contribution_address, &link_type)? {
            batch.put_link(new_link(
                author,
                archive_address,
                link_type,
                link.tag,
                link.target,
                link.timestamp,
            ))?;
            copied += 1;
        }
    }

    debug!(%group_id, %principal, copied, "archived contributions");

    Ok(archive_address)
}

#[cfg(test)]
mod tests {
    use coop_core::{Hash, PrivateKey};

    use super::{Anchor, group_auth_anchor_address, group_auth_archive_anchor_address};

    #[test]
    fn deterministic_addresses() {
        let group_id = Hash::new(b"group");
        let alice = PrivateKey::new().public_key();
        let bob = PrivateKey::new().public_key();

        let address = group_auth_anchor_address(group_id, alice).unwrap();
        assert_eq!(address, group_auth_anchor_address(group_id, alice).unwrap());
        assert_ne!(address, group_auth_anchor_address(group_id, bob).unwrap());
        assert_ne!(
            address,
            group_auth_anchor_address(Hash::new(b"other group"), alice).unwrap()
        );
        assert_ne!(
            address,
            group_auth_archive_anchor_address(group_id, alice).unwrap()
        );
    }

    #[test]
    fn decode_from_body() {
        let anchor = Anchor::archive(Hash::new(b"group"), PrivateKey::new().public_key());
        let body = anchor.to_body().unwrap();
        let decoded = Anchor::from_body(&body).unwrap();
        assert_eq!(decoded, anchor);
        assert!(decoded.is_archive());
        assert_eq!(body.hash(), anchor.address().unwrap());
    }
}
