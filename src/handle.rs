/// Resource handle manager
///
/// Image bytes live in memory exactly once, behind short process-local string
/// tokens. The editor holds tokens, not bytes, so a session full of large
/// renditions does not exhaust process memory through accidental copies.
///
/// Ownership rules:
/// - `mint` transfers the blob into the manager and returns a token.
/// - `resolve` hands back a cheap `Arc` clone of the backing bytes.
/// - `release` must be called exactly once when a handle is discarded
///   (superseded image, deleted version, dropped reference, shot removal).
///   Resolving or releasing after release is a caller bug and yields
///   `StaleHandle`, never stale bytes.
/// - The same token may be referenced from several shot fields at once
///   (e.g. `current_image` and an entry in `versions`); release happens on
///   explicit delete only, never on reassignment.
///
/// Failing to release leaks the backing allocation until process exit. The
/// set of currently displayed handles is tracked by the editor layer, and a
/// leak is recoverable where a premature free is not.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::error::{PersistError, Result};
use crate::shot::{ImageBlob, ImageSource};

/// A process-local token referencing an in-memory image blob.
///
/// Meaningless outside the process that minted it; never persisted as-is.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHandle(String);

impl ImageHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Mints, resolves and releases image handles.
///
/// Cheap to clone; clones share the same backing table so the autosave task
/// can resolve handles minted by the editor.
#[derive(Debug, Clone, Default)]
pub struct HandleManager {
    blobs: Arc<Mutex<HashMap<String, Arc<ImageBlob>>>>,
}

impl HandleManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a blob and return a fresh handle for it.
    pub fn mint(&self, blob: ImageBlob) -> ImageHandle {
        let token = format!("img-{}", Uuid::new_v4());
        let mut blobs = self.blobs.lock().expect("handle table poisoned");
        blobs.insert(token.clone(), Arc::new(blob));
        ImageHandle(token)
    }

    /// Look up the bytes behind a handle.
    pub fn resolve(&self, handle: &ImageHandle) -> Result<Arc<ImageBlob>> {
        let blobs = self.blobs.lock().expect("handle table poisoned");
        blobs
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| PersistError::StaleHandle(handle.0.clone()))
    }

    /// Free the bytes behind a handle. Exactly once per handle.
    pub fn release(&self, handle: &ImageHandle) -> Result<()> {
        let mut blobs = self.blobs.lock().expect("handle table poisoned");
        match blobs.remove(&handle.0) {
            Some(_) => Ok(()),
            None => Err(PersistError::StaleHandle(handle.0.clone())),
        }
    }

    /// Number of live handles. Used by leak checks in tests and by the
    /// editor's debug overlay.
    pub fn live_count(&self) -> usize {
        self.blobs.lock().expect("handle table poisoned").len()
    }

    /// Release every distinct handle among the given image sources.
    ///
    /// Call when a shot is removed from the live list. The same handle may
    /// be referenced by `current_image` and by an entry in `versions`; it is
    /// released once. Data URIs hold no backing memory and are skipped.
    pub fn release_sources<'a>(&self, sources: impl Iterator<Item = &'a ImageSource>) {
        let mut seen = HashSet::new();
        for source in sources {
            if let ImageSource::Handle(handle) = source {
                if seen.insert(handle.clone()) {
                    if let Err(e) = self.release(handle) {
                        // Caller bug, but a shot teardown must not panic
                        tracing::warn!("releasing removed shot: {e}");
                    }
                }
            }
        }
    }
}
