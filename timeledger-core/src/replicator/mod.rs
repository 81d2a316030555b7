//! One-way workspace replication.
//!
//! The local database is authoritative. Every workspace mutation marks the
//! user dirty; the replicator waits out a debounce window, reads the whole
//! workspace back and pushes it to the remote store as one document. The
//! remote is best-effort: failures surface in a status banner and are
//! retried by the next local edit, never by rolling anything back.

pub mod handlers;
pub mod push;
pub mod remote;
pub mod types;


pub use push::{build_document, Replicator, SyncNotifier};
pub use remote::{HttpRemoteStore, RemoteStore, RemoteStoreError};
pub use types::{SyncStatus, WorkspaceDocument};
