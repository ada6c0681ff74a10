/// Error taxonomy for the persistence core
///
/// Every failure the storage layer can produce is one of these variants.
/// All of them are recoverable from the caller's point of view: the autosave
/// boundary logs them and keeps the in-memory session alive. None of them
/// should ever panic the hosting process.

use thiserror::Error;

/// Errors produced by the persistence core.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The store could not be opened (missing directory, quota, another
    /// process holding an incompatible schema version). Persistence is dead
    /// for this session but the in-memory session continues unsaved.
    #[error("storage unavailable: {0}")]
    StoreUnavailable(String),

    /// A write transaction aborted. No partial rows from the batch are
    /// visible. Retried on the next natural debounce cycle, never
    /// immediately.
    #[error("commit failed: {0}")]
    Commit(String),

    /// A data URI (or bare base64 payload) could not be decoded.
    #[error("malformed image encoding: {0}")]
    MalformedEncoding(String),

    /// One image field of a shot could not be converted to durable form.
    /// The field is dropped from the durable write; the rest of the shot
    /// persists.
    #[error("shot {shot_id}: could not serialize {field}")]
    PartialSerialization { shot_id: String, field: String },

    /// A handle was resolved or released after its release. This is a
    /// programming error in the caller, surfaced as an error rather than
    /// stale bytes.
    #[error("stale image handle: {0}")]
    StaleHandle(String),

    /// The legacy fallback store could not be opened or read.
    #[error("legacy fallback store error: {0}")]
    LegacyStore(#[from] sled::Error),

    /// A stored metadata blob did not parse as the expected JSON shape.
    #[error("corrupt stored record: {0}")]
    CorruptRecord(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PersistError>;
