// SPDX-License-Identifier: MIT

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! annobatch-storage: durable, crash-safe persistence for the batch
//! annotation orchestrator's processing state.

pub mod atomic;
pub mod error;
pub mod lockfile;
pub mod manifest_store;
pub mod snapshot_store;

pub use atomic::{save_atomic, AtomicWriter, FsAtomicWriter};
pub use error::StorageError;
pub use lockfile::DirectoryLock;
pub use manifest_store::ManifestStore;
pub use snapshot_store::SnapshotStore;
