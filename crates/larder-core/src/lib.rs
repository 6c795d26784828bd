//! Core types for the Larder allergen and expiry decision pipeline.
//!
//! This crate holds the shared vocabulary (source authority, risk tiers,
//! conflicts, profiles) and the immutable ontology snapshot. It has no
//! HTTP or I/O; every other crate depends on it.

pub mod conflict;
pub mod error;
pub mod handle;
pub mod ontology;
pub mod profile;
pub mod risk;
pub mod snapshot;
pub mod source;

pub use error::{Error, Result};
pub use handle::SnapshotHandle;
pub use snapshot::OntologySnapshot;
