// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpers to set up principals and a shared store in tests.
use std::collections::BTreeSet;
use std::time::Duration;

use coop_core::{Hash, PrivateKey, PublicKey};
use coop_store::MemoryStore;
use mock_instant::thread_local::MockClock;

use crate::config::Config;
use crate::content::{ContentRecord, GroupRef, create_content, update_content};
use crate::error::CoopError;
use crate::group::{GroupChanges, GroupRevision, create_group, update_group};
use crate::link::LinkKind;
use crate::resolver::{ContentHead, GroupContentQuery, get_group_content};

pub type TestStore = MemoryStore<LinkKind>;

pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_ok() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    }
}

/// Move the mock clock of this thread forwards by one second.
pub fn advance_clock() {
    MockClock::advance_system_time(Duration::from_secs(1));
}

/// Principal acting on a store which is shared with all other test peers.
#[derive(Clone, Debug)]
pub struct TestPeer {
    pub private_key: PrivateKey,
    pub store: TestStore,
    pub config: Config,
}

impl TestPeer {
    pub fn new(store: &TestStore) -> Self {
        Self {
            private_key: PrivateKey::new(),
            store: store.clone(),
            config: Config::default(),
        }
    }

    pub fn id(&self) -> PublicKey {
        self.private_key.public_key()
    }

    pub fn create_group(&mut self, admins: &[PublicKey], members: &[PublicKey]) -> Result<Hash, CoopError> {
        let revision = GroupRevision::new(
            admins.iter().copied().collect(),
            members.iter().copied().collect::<BTreeSet<_>>(),
        );
        create_group(&mut self.store, &self.private_key, revision)
    }

    pub fn update_group(&mut self, base: &Hash, changes: GroupChanges) -> Result<Hash, CoopError> {
        update_group(&mut self.store, &self.private_key, base, &changes)
    }

    pub fn create_content(
        &mut self,
        group_id: &Hash,
        rev: &Hash,
        payload: &str,
    ) -> Result<Hash, CoopError> {
        let record = ContentRecord::new(GroupRef::new(*group_id, *rev), "post", payload.as_bytes());
        create_content(&mut self.store, &self.private_key, record)
    }

    /// Update content with a new payload, declaring the given revision.
    pub fn update_content(
        &mut self,
        base: &Hash,
        rev: &Hash,
        payload: &str,
    ) -> Result<Hash, CoopError> {
        let (_, record) = crate::content::get_content_record(&self.store, base)?;
        let record = record.revise(payload.as_bytes()).with_group_rev(*rev);
        update_content(&mut self.store, &self.private_key, base, record)
    }

    pub fn group_content(&self, query: &GroupContentQuery) -> Result<Vec<ContentHead>, CoopError> {
        get_group_content(&self.store, &self.config, query)
    }

    /// Resolved heads as `(origin, head)` pairs.
    pub fn heads(&self, group_id: &Hash) -> Vec<(Hash, Hash)> {
        self.group_content(&GroupContentQuery::new(*group_id))
            .expect("resolve group content")
            .into_iter()
            .map(|content| (content.origin, content.head))
            .collect()
    }
}
