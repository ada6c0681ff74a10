/// Persistent shot store
///
/// SQLite-backed catalog of durable shots, one logical row per shot. The
/// scalar fields of a shot live as a JSON blob in the `shots` table; its
/// image payloads live as raw BLOBs in the `shot_images` child table so
/// large renditions are never text-encoded on disk.
///
/// The schema is versioned through `PRAGMA user_version` and upgraded by an
/// idempotent callback on every open (create-if-absent, never destructive).
/// Writes go through `put_all`, which commits a whole batch in one
/// transaction: all rows become durable together or none do.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use crate::durable::{DurableShot, LegacyShotRecord, ShotMeta, StoredRow, LEGACY_SENTINEL_ID};
use crate::error::{PersistError, Result};
use crate::shot::ImageBlob;

/// Current on-disk schema version.
///
/// 1 = single sentinel record holding the whole list as JSON text.
/// 2 = one row per shot, image payloads split into `shot_images`.
const SCHEMA_VERSION: i32 = 2;

/// Image slot names in `shot_images`.
const SLOT_CURRENT: &str = "current";
const SLOT_VERSION: &str = "version";
const SLOT_REFERENCE: &str = "reference";

/// The shot catalog database.
pub struct ShotStore {
    conn: Connection,
}

impl ShotStore {
    /// Open (or create) the store at the default platform location:
    /// - Linux: ~/.local/share/shot-studio/session.db
    /// - macOS: ~/Library/Application Support/shot-studio/session.db
    /// - Windows: %APPDATA%\shot-studio\session.db
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path()?)
    }

    /// Open (or create) the store at a specific path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        tracing::debug!("shot catalog opened at {}", path.display());
        Self::from_connection(conn)
    }

    /// In-memory store for unit tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        let mut store = ShotStore { conn };
        store.upgrade_schema()?;
        Ok(store)
    }

    fn default_path() -> Result<PathBuf> {
        let mut path = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| {
                PersistError::StoreUnavailable("no user data directory".to_string())
            })?;
        path.push("shot-studio");
        path.push("session.db");
        Ok(path)
    }

    /// Bring the on-disk schema up to [`SCHEMA_VERSION`].
    ///
    /// Safe to run on every open. A database written by a *newer* build is
    /// refused rather than touched, so two app versions sharing one profile
    /// cannot corrupt each other.
    fn upgrade_schema(&mut self) -> Result<()> {
        let on_disk: i32 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        if on_disk > SCHEMA_VERSION {
            return Err(PersistError::StoreUnavailable(format!(
                "database schema v{on_disk} is newer than supported v{SCHEMA_VERSION}"
            )));
        }

        // Both tables are create-if-absent: a v1 database keeps its sentinel
        // row in `shots` untouched and is migrated on the next put_all.
        self.conn
            .execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS shots (
                    id          TEXT PRIMARY KEY,
                    meta        TEXT NOT NULL,
                    updated_at  INTEGER NOT NULL
                );
                CREATE TABLE IF NOT EXISTS shot_images (
                    shot_id     TEXT NOT NULL REFERENCES shots(id) ON DELETE CASCADE,
                    slot        TEXT NOT NULL,
                    idx         INTEGER NOT NULL,
                    mime        TEXT NOT NULL,
                    bytes       BLOB NOT NULL,
                    PRIMARY KEY (shot_id, slot, idx)
                );
                PRAGMA user_version = {SCHEMA_VERSION};"
            ))
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Commit a batch of durable shots in one transaction.
    ///
    /// Upsert per row: shots absent from the batch are left alone, so two
    /// processes editing different shot ids never clobber each other. The
    /// legacy sentinel row is cleared in the same transaction, which is what
    /// completes the in-store schema migration.
    pub fn put_all(&mut self, shots: &[DurableShot]) -> Result<()> {
        let now = Utc::now().timestamp_millis();

        let tx = self
            .conn
            .transaction()
            .map_err(|e| PersistError::Commit(e.to_string()))?;

        tx.execute("DELETE FROM shots WHERE id = ?1", params![LEGACY_SENTINEL_ID])
            .map_err(|e| PersistError::Commit(e.to_string()))?;

        for shot in shots {
            if shot.id == LEGACY_SENTINEL_ID {
                // Reserved for migration detection; writing a shot under it
                // would corrupt shape detection on the next load.
                return Err(PersistError::Commit(format!(
                    "shot id {LEGACY_SENTINEL_ID} is reserved"
                )));
            }

            let meta = serde_json::to_string(&shot.meta())?;
            tx.execute(
                "INSERT INTO shots (id, meta, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET meta = ?2, updated_at = ?3",
                params![shot.id, meta, now],
            )
            .map_err(|e| PersistError::Commit(e.to_string()))?;

            // Rewrite the image set wholesale; diffing blobs is not worth it
            tx.execute(
                "DELETE FROM shot_images WHERE shot_id = ?1",
                params![shot.id],
            )
            .map_err(|e| PersistError::Commit(e.to_string()))?;

            let mut insert = |slot: &str, idx: usize, blob: &ImageBlob| {
                tx.execute(
                    "INSERT INTO shot_images (shot_id, slot, idx, mime, bytes)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![shot.id, slot, idx as i64, blob.mime, blob.bytes],
                )
                .map_err(|e| PersistError::Commit(e.to_string()))
                .map(|_| ())
            };

            if let Some(blob) = &shot.current_image {
                insert(SLOT_CURRENT, 0, blob)?;
            }
            for (i, blob) in shot.versions.iter().enumerate() {
                insert(SLOT_VERSION, i, blob)?;
            }
            for (i, blob) in shot.reference_images.iter().enumerate() {
                insert(SLOT_REFERENCE, i, blob)?;
            }
        }

        tx.commit().map_err(|e| PersistError::Commit(e.to_string()))?;
        tracing::debug!("committed {} shot(s)", shots.len());
        Ok(())
    }

    /// Read every stored shot. Order is not significant; the editor
    /// reconstructs its own order from shot fields.
    ///
    /// Rows are tag-decoded once here: a sentinel row from the v1 schema is
    /// expanded into its shot list for this session (ids already present as
    /// per-row records win). The sentinel itself is removed by the next
    /// successful `put_all`, not here; loading stays read-only.
    pub fn get_all(&self) -> Result<Vec<DurableShot>> {
        let mut shots: Vec<DurableShot> = Vec::new();
        let mut legacy: Vec<DurableShot> = Vec::new();

        for row in self.load_rows()? {
            match row {
                StoredRow::Current(shot) => shots.push(shot),
                StoredRow::Legacy(list) => {
                    tracing::info!("found v1 sentinel row with {} shot(s)", list.len());
                    legacy.extend(list);
                }
            }
        }

        for shot in legacy {
            if !shots.iter().any(|s| s.id == shot.id) {
                shots.push(shot);
            }
        }

        Ok(shots)
    }

    /// Destroy durable rows by id. Rows are never destroyed by expiry and
    /// never by `put_all`; this is the only deletion path.
    pub fn remove(&mut self, ids: &[String]) -> Result<()> {
        let tx = self
            .conn
            .transaction()
            .map_err(|e| PersistError::Commit(e.to_string()))?;
        for id in ids {
            tx.execute("DELETE FROM shots WHERE id = ?1", params![id])
                .map_err(|e| PersistError::Commit(e.to_string()))?;
        }
        tx.commit().map_err(|e| PersistError::Commit(e.to_string()))
    }

    fn load_rows(&self) -> Result<Vec<StoredRow>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, meta FROM shots")
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        let metas: Vec<(String, String)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        let mut rows = Vec::with_capacity(metas.len());
        for (id, meta) in metas {
            if id == LEGACY_SENTINEL_ID {
                let records: Vec<LegacyShotRecord> = serde_json::from_str(&meta)?;
                rows.push(StoredRow::Legacy(
                    records.into_iter().map(DurableShot::from_legacy).collect(),
                ));
            } else {
                let meta: ShotMeta = serde_json::from_str(&meta)?;
                let mut shot = DurableShot::from_meta(meta);
                self.load_images(&mut shot)?;
                rows.push(StoredRow::Current(shot));
            }
        }

        Ok(rows)
    }

    fn load_images(&self, shot: &mut DurableShot) -> Result<()> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT slot, mime, bytes FROM shot_images
                 WHERE shot_id = ?1 ORDER BY idx ASC",
            )
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        let images: Vec<(String, String, Vec<u8>)> = stmt
            .query_map(params![shot.id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;

        for (slot, mime, bytes) in images {
            let blob = ImageBlob::new(mime, bytes);
            match slot.as_str() {
                SLOT_CURRENT => shot.current_image = Some(blob),
                SLOT_VERSION => shot.versions.push(blob),
                SLOT_REFERENCE => shot.reference_images.push(blob),
                other => tracing::warn!("shot {}: unknown image slot '{other}'", shot.id),
            }
        }

        Ok(())
    }

    /// Seed a v1 sentinel row directly. Test and migration-tooling hook;
    /// the app itself only ever writes the current schema.
    #[doc(hidden)]
    pub fn seed_legacy_row(&mut self, records_json: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO shots (id, meta, updated_at) VALUES (?1, ?2, ?3)",
                params![LEGACY_SENTINEL_ID, records_json, Utc::now().timestamp_millis()],
            )
            .map_err(|e| PersistError::Commit(e.to_string()))?;
        Ok(())
    }

    /// True if the sentinel row is still present (pre-migration state).
    pub fn has_legacy_row(&self) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM shots WHERE id = ?1",
                params![LEGACY_SENTINEL_ID],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))?;
        Ok(found.is_some())
    }

    /// Number of shots stored under the current schema.
    pub fn shot_count(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM shots WHERE id <> ?1",
                params![LEGACY_SENTINEL_ID],
                |row| row.get(0),
            )
            .map_err(|e| PersistError::StoreUnavailable(e.to_string()))
    }
}

impl std::fmt::Debug for ShotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShotStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::shot::{AspectRatio, CameraParams};

    fn durable(id: &str) -> DurableShot {
        DurableShot {
            id: id.to_string(),
            name: format!("Shot {id}"),
            script: "Interior, day".into(),
            enhanced_script: String::new(),
            prompt_en: "a quiet kitchen".into(),
            prompt_cn: String::new(),
            aspect_ratio: AspectRatio::Wide,
            camera_params: CameraParams::default(),
            seed: 7,
            model: "turbo-v2".into(),
            is_grid: false,
            current_image: None,
            versions: Vec::new(),
            reference_images: Vec::new(),
        }
    }

    #[test]
    fn test_empty_store_loads_empty() {
        let store = ShotStore::open_in_memory().unwrap();
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_put_get_round_trip_with_images() {
        let mut store = ShotStore::open_in_memory().unwrap();

        let mut shot = durable("s1");
        shot.current_image = Some(ImageBlob::new("image/png", vec![1, 2, 3]));
        shot.versions = vec![
            ImageBlob::new("image/png", vec![1, 2, 3]),
            ImageBlob::new("image/png", vec![4, 5]),
            ImageBlob::new("image/webp", vec![6]),
        ];
        shot.reference_images = vec![ImageBlob::new("image/jpeg", vec![7, 8])];

        store.put_all(std::slice::from_ref(&shot)).unwrap();

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], shot);
    }

    #[test]
    fn test_upsert_replaces_row_and_images() {
        let mut store = ShotStore::open_in_memory().unwrap();

        let mut shot = durable("s1");
        shot.versions = vec![ImageBlob::new("image/png", vec![1])];
        store.put_all(std::slice::from_ref(&shot)).unwrap();

        shot.name = "renamed".into();
        shot.versions = vec![ImageBlob::new("image/png", vec![2, 2])];
        store.put_all(std::slice::from_ref(&shot)).unwrap();

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "renamed");
        assert_eq!(loaded[0].versions, vec![ImageBlob::new("image/png", vec![2, 2])]);
    }

    #[test]
    fn test_put_all_does_not_touch_absent_rows() {
        let mut store = ShotStore::open_in_memory().unwrap();
        store.put_all(&[durable("a"), durable("b")]).unwrap();

        // A second process writing only "b" must leave "a" alone
        let mut b = durable("b");
        b.name = "edited elsewhere".into();
        store.put_all(std::slice::from_ref(&b)).unwrap();

        let mut ids: Vec<String> = store.get_all().unwrap().into_iter().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_failed_batch_is_invisible() {
        let mut store = ShotStore::open_in_memory().unwrap();
        store.put_all(&[durable("old")]).unwrap();

        // Second row uses the reserved sentinel id, failing the batch after
        // the first row was already written inside the transaction
        let batch = vec![durable("new"), durable(LEGACY_SENTINEL_ID)];
        assert!(matches!(
            store.put_all(&batch),
            Err(PersistError::Commit(_))
        ));

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "old");
    }

    #[test]
    fn test_remove_destroys_row_and_images() {
        let mut store = ShotStore::open_in_memory().unwrap();
        let mut shot = durable("gone");
        shot.versions = vec![ImageBlob::new("image/png", vec![1])];
        store.put_all(&[shot, durable("kept")]).unwrap();

        store.remove(&["gone".to_string()]).unwrap();

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "kept");

        let orphans: i64 = store
            .conn
            .query_row("SELECT COUNT(*) FROM shot_images", [], |r| r.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[test]
    fn test_legacy_sentinel_row_is_expanded() {
        let mut store = ShotStore::open_in_memory().unwrap();
        let uri = codec::encode(&[9, 9], "image/png");
        store
            .seed_legacy_row(&format!(
                r#"[{{"id":"l1","name":"one","versions":["{uri}"]}},{{"id":"l2"}}]"#
            ))
            .unwrap();

        let loaded = store.get_all().unwrap();
        assert_eq!(loaded.len(), 2);
        let l1 = loaded.iter().find(|s| s.id == "l1").unwrap();
        assert_eq!(l1.versions[0].bytes, vec![9, 9]);

        // Loading alone is read-only: the sentinel survives until put_all
        assert!(store.has_legacy_row().unwrap());
    }

    #[test]
    fn test_put_all_clears_sentinel() {
        let mut store = ShotStore::open_in_memory().unwrap();
        store.seed_legacy_row(r#"[{"id":"l1"},{"id":"l2"}]"#).unwrap();

        let shots = store.get_all().unwrap();
        store.put_all(&shots).unwrap();

        assert!(!store.has_legacy_row().unwrap());
        let reloaded = store.get_all().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(store.shot_count().unwrap(), 2);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");

        {
            let mut store = ShotStore::open(&path).unwrap();
            store.put_all(&[durable("s1")]).unwrap();
        }
        // Second open runs the same upgrade callback against existing tables
        let store = ShotStore::open(&path).unwrap();
        assert_eq!(store.get_all().unwrap().len(), 1);
    }
}
