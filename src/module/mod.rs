//! Module records and the identities that key them.
//!
//! A [`ModuleRecord`] describes one binary module of a dependency closure. The module has
//! three sources:
//! - it is compiled in this run;
//! - it is unpacked from a binary metadata reference;
//! - it is supplied directly by the caller.
//!
//! All three sources share the same record type, distinguished only by a [`Provenance`] tag.
//! The [`IdentityTracker`] works on the identity string alone, so de-duplication never
//! depends on where a module came from.
//!
//! # Key Components
//!
//! - [`ModuleRecord`] - Immutable module description with shared image bytes
//! - [`OutputKind`] - Container kind and its file extension
//! - [`AssemblyIdentity`] - Display-name parsing and rendering
//! - [`IdentityTracker`] - Case-insensitive identity set
//! - [`Token`] - Metadata tokens reported by verifiers and debug documents

pub mod identity;
pub mod record;
pub mod token;
pub mod tracker;

pub use identity::{AssemblyIdentity, AssemblyVersion};
pub use record::{ModuleRecord, OutputKind, Provenance};
pub use token::Token;
pub use tracker::IdentityTracker;
