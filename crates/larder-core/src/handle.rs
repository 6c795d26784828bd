//! A process-wide, swappable reference to the current ontology snapshot.
//!
//! Readers take an [`Arc`] clone and keep using it for the whole request, so
//! a decision that started against one snapshot finishes against the same
//! one. [`SnapshotHandle::replace`] publishes a fully built snapshot in one
//! pointer swap; a partially built snapshot is never observable.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::{Error, Result, snapshot::OntologySnapshot};

#[derive(Debug, Default)]
pub struct SnapshotHandle {
  current: RwLock<Option<Arc<OntologySnapshot>>>,
}

impl SnapshotHandle {
  /// A handle with no snapshot loaded yet.
  pub fn empty() -> Self { Self::default() }

  pub fn new(snapshot: OntologySnapshot) -> Self {
    Self {
      current: RwLock::new(Some(Arc::new(snapshot))),
    }
  }

  /// The snapshot in effect right now.
  ///
  /// Fails with [`Error::SnapshotUninitialized`] before the first load.
  pub fn current(&self) -> Result<Arc<OntologySnapshot>> {
    self
      .current
      .read()
      .clone()
      .ok_or(Error::SnapshotUninitialized)
  }

  /// Publish `snapshot`, returning the one it replaced (if any).
  pub fn replace(
    &self,
    snapshot: OntologySnapshot,
  ) -> Option<Arc<OntologySnapshot>> {
    let next = Arc::new(snapshot);
    self.current.write().replace(next)
  }

  pub fn is_loaded(&self) -> bool {
    self.current.read().is_some()
  }
}
