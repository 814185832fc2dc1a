// SPDX-License-Identifier: MIT OR Apache-2.0

//! Index edges between principals, group revisions, anchors and content.
use coop_core::cbor::{DecodeError, EncodeError, decode_cbor, encode_cbor};
use coop_core::{Hash, PublicKey, Timestamp};
use coop_store::Link;
use serde::{Deserialize, Serialize};

/// Kinds of index edges.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Principal (agent address) to a group revision it authored.
    Group,

    /// Group revision to the contribution anchor of one of its authorities.
    GroupAuth,

    /// Group revision to the archive anchor of a removed principal.
    GroupAuthArchive,

    /// Anchor to the origin of a tracked object.
    Contribution,

    /// Anchor to an update of a tracked object, tagged with origin and base.
    ContributionUpdate,

    /// Principal (agent address) to the origin of a tracked object it created.
    Authored,
}

pub type IndexLink = Link<LinkKind>;

pub(crate) fn new_link(
    author: PublicKey,
    source: Hash,
    link_type: LinkKind,
    tag: Vec<u8>,
    target: Hash,
    timestamp: Timestamp,
) -> IndexLink {
    Link {
        author,
        source,
        link_type,
        tag,
        target,
        timestamp,
    }
}

/// Tag of a `Contribution` edge, used to filter content without resolving it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionTag {
    pub content_type: String,
    pub content_base: Option<String>,
}

impl ContributionTag {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        encode_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_cbor(bytes)
    }

    /// Returns true if the tag passes both (optional) filters.
    pub fn matches(&self, content_type: Option<&str>, content_base: Option<&str>) -> bool {
        let type_matches = content_type.is_none_or(|content_type| self.content_type == content_type);
        let base_matches =
            content_base.is_none_or(|content_base| self.content_base.as_deref() == Some(content_base));
        type_matches && base_matches
    }
}

/// Tag of a `ContributionUpdate` edge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTag {
    /// Origin of the updated object.
    pub origin: Hash,

    /// Address which got superseded by the edge target.
    pub base: Hash,
}

impl UpdateTag {
    pub fn to_bytes(&self) -> Result<Vec<u8>, EncodeError> {
        encode_cbor(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_cbor(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::ContributionTag;

    #[test]
    fn tag_filters() {
        let tag = ContributionTag {
            content_type: "comment".into(),
            content_base: Some("post-1".into()),
        };

        assert!(tag.matches(None, None));
        assert!(tag.matches(Some("comment"), None));
        assert!(tag.matches(Some("comment"), Some("post-1")));
        assert!(!tag.matches(Some("post"), None));
        assert!(!tag.matches(None, Some("post-2")));

        let untagged = ContributionTag {
            content_type: "post".into(),
            content_base: None,
        };
        assert!(!untagged.matches(None, Some("post-1")));
    }
}
