//! smile-sync: remote synchronization for the City Smile portfolio.
//!
//! Connects the in-memory portfolio store to the hosted document store:
//! anonymous identity bootstrap, a live subscription that overwrites local
//! state wholesale, and an optimistic save path for admin mutations.
//!
//! The reconciliation is one-way and last-writer-wins, with no merge or
//! conflict resolution. The remote write is not verified against its echo,
//! so a silently revoked permission can leave the optimistic local state
//! diverged until reload; accepted for a single-operator tool.

pub mod config;
pub mod document;
pub mod firestore;
pub mod identity;
pub mod reconciler;
pub mod status;

pub use config::*;
pub use document::*;
pub use firestore::*;
pub use identity::*;
pub use reconciler::*;
pub use status::*;
