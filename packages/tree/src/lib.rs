//! # docstore-tree
//!
//! An in-memory mirror of part of the document store, or of a local
//! directory, that is filled in lazily and drives bulk transfers between the
//! two.
//!
//! Roots come from a service record, a UUID, a service path or an absolute
//! local path. From a root you can:
//!
//! - explore its direct children or its whole subtree, following the
//!   service's pagination
//! - search the subtree for names matching a regular expression
//! - upload a local subtree into a project or folder
//! - download a remote subtree to disk
//!
//! All entities live in an [`EntityTree`] and are addressed by [`EntityId`]
//! handles. Service access goes through the [`StorageGateway`] bound to the
//! tree.
//!
//! [`StorageGateway`]: docstore_gateway::StorageGateway

mod content_type;
mod entity;
mod error;
mod explore;
mod transfer;
mod walk;

pub use content_type::{guess_content_type, DEFAULT_CONTENT_TYPE, NOTEBOOK_CONTENT_TYPE};
pub use entity::{Entity, EntityId, EntityTree, Provenance};
pub use error::Error;
pub use transfer::Destination;

pub use docstore_gateway::{EntityKind, CHUNK_SIZE};
