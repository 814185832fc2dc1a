// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interfaces and implementations of persistence layers for entries, anchors and index edges.
//!
//! The engine only ever talks to a [`StoreHandle`]: a capability which can look up immutable
//! records by address, list directed, typed and tagged edges ([`Link`]) by source and commit new
//! records and edges atomically in a [`WriteBatch`]. Stores are append-only, nothing is ever
//! deleted.
mod links;
#[cfg(feature = "memory")]
pub mod memory;
mod traits;
mod view;

pub use links::{Link, LinkType};
#[cfg(feature = "memory")]
pub use memory::MemoryStore;
pub use traits::{
    EntryStore, LinkStore, PayloadStore, StoreError, StoreHandle, WritableStore, WriteBatch,
};
pub use view::StagedView;
