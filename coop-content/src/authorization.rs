// SPDX-License-Identifier: MIT OR Apache-2.0

//! Proofs that several admins jointly authorized a group update.
//!
//! Changing the admin set of a group (or marking it as deleted) needs the consent of every admin
//! of the base revision. How co-admins exchange the proposed revision is up to the application,
//! the engine only checks the resulting proof.
use std::collections::BTreeMap;

use coop_core::cbor::{EncodeError, encode_cbor};
use coop_core::{Hash, PrivateKey, PublicKey, Signature};
use serde::{Deserialize, Serialize};

use crate::group::GroupRevision;

/// Capability to certify principals as co-authors of a group update.
pub trait JointAuthorization {
    /// Returns true if `principal` consented to replacing `base` with `revision`.
    fn certifies(&self, base: &Hash, revision: &GroupRevision, principal: &PublicKey) -> bool;

    /// Returns true if all given principals consented.
    fn certifies_all<'a>(
        &self,
        base: &Hash,
        revision: &GroupRevision,
        principals: impl IntoIterator<Item = &'a PublicKey>,
    ) -> bool {
        principals
            .into_iter()
            .all(|principal| self.certifies(base, revision, principal))
    }
}

/// Bytes co-admins sign to consent to a proposed revision.
pub fn counter_signing_payload(
    base: &Hash,
    revision: &GroupRevision,
) -> Result<Vec<u8>, EncodeError> {
    encode_cbor(&(base, revision))
}

/// Ed25519 signatures of co-admins over a proposed revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSignatures(BTreeMap<PublicKey, Signature>);

impl CounterSignatures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sign the proposed revision and add the signature.
    pub fn sign(
        &mut self,
        private_key: &PrivateKey,
        base: &Hash,
        revision: &GroupRevision,
    ) -> Result<(), EncodeError> {
        let payload = counter_signing_payload(base, revision)?;
        self.0
            .insert(private_key.public_key(), private_key.sign(&payload));
        Ok(())
    }

    /// Add a signature which was created elsewhere.
    pub fn insert(&mut self, public_key: PublicKey, signature: Signature) {
        self.0.insert(public_key, signature);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl JointAuthorization for CounterSignatures {
    fn certifies(&self, base: &Hash, revision: &GroupRevision, principal: &PublicKey) -> bool {
        let Some(signature) = self.0.get(principal) else {
            return false;
        };

        match counter_signing_payload(base, revision) {
            Ok(payload) => principal.verify(&payload, signature),
            Err(_) => false,
        }
    }
}
