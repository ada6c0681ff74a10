/// Legacy data migration
///
/// Two one-shot, idempotent paths bring old sessions forward losslessly:
///
/// 1. Cross-store: the earliest builds kept the whole session as one JSON
///    blob under the key `shots` in a sled key-value store. On startup,
///    before the first `get_all` is trusted, that blob is parsed, written
///    through the current store, and the key deleted.
/// 2. In-store: the v1 SQLite schema kept the whole session in a single
///    sentinel row. `ShotStore::get_all` expands it at load time and the
///    next successful `put_all` clears the sentinel; nothing to do here.
///
/// Both paths are no-ops when there is nothing to migrate.

use std::path::{Path, PathBuf};

use crate::durable::{DurableShot, LegacyShotRecord};
use crate::error::{PersistError, Result};
use crate::store::ShotStore;

/// Key the pre-SQLite builds stored the session under.
const FALLBACK_KEY: &str = "shots";

/// Default location of the pre-SQLite fallback store.
pub fn default_fallback_path() -> Option<PathBuf> {
    let mut path = dirs::data_dir().or_else(dirs::home_dir)?;
    path.push("shot-studio");
    path.push("session.sled");
    Some(path)
}

/// Migrate a legacy sled fallback store into `store`, deleting the legacy
/// key on success. Returns the number of shots migrated (0 = nothing to do).
pub fn migrate_fallback_store(store: &mut ShotStore, fallback_path: &Path) -> Result<usize> {
    if !fallback_path.exists() {
        // Never create a sled directory just to find it empty
        return Ok(0);
    }

    let db = sled::open(fallback_path)?;
    let Some(raw) = db.get(FALLBACK_KEY)? else {
        return Ok(0);
    };

    let text = std::str::from_utf8(&raw).map_err(|e| {
        PersistError::MalformedEncoding(format!("fallback blob is not UTF-8: {e}"))
    })?;
    let records: Vec<LegacyShotRecord> = serde_json::from_str(text)?;
    let shots: Vec<DurableShot> = records.into_iter().map(DurableShot::from_legacy).collect();

    tracing::info!(
        "migrating {} shot(s) from fallback store at {}",
        shots.len(),
        fallback_path.display()
    );

    // Write-through first; the legacy key is only dropped once the new
    // store has durably accepted the data.
    store.put_all(&shots)?;
    db.remove(FALLBACK_KEY)?;
    db.flush()?;

    Ok(shots.len())
}

/// Run all startup migrations, treating failures as non-fatal.
///
/// A corrupt fallback blob must not take the whole session down: the error
/// is logged, the legacy data stays where it is for inspection, and the
/// session continues from whatever the current store holds.
pub fn run_startup_migrations(store: &mut ShotStore, fallback_path: &Path) {
    match migrate_fallback_store(store, fallback_path) {
        Ok(0) => {}
        Ok(n) => tracing::info!("fallback migration complete: {n} shot(s)"),
        Err(e) => tracing::error!("fallback migration failed, continuing: {e}"),
    }
}
