//! Local-first session persistence for an AI storyboard studio.
//!
//! Durably holds a user's creative session (a list of [`Shot`]s carrying
//! large binary image payloads) across restarts and across concurrent
//! processes over the same database, while the in-memory representation
//! uses short-lived, explicitly-released [`handle::ImageHandle`]s so image
//! bytes are never duplicated or text-encoded in memory.
//!
//! Typical wiring:
//!
//! ```no_run
//! use shot_studio::{autosave, migrate, HandleManager, ShotStore};
//!
//! # async fn wire() -> Result<(), shot_studio::PersistError> {
//! let handles = HandleManager::new();
//! let mut store = ShotStore::open_default()?;
//!
//! let fallback = migrate::default_fallback_path();
//! let shots = shot_studio::load_session(&mut store, &handles, fallback.as_deref())?;
//!
//! let scheduler = autosave::AutosaveScheduler::spawn(
//!     store,
//!     handles.clone(),
//!     autosave::DEFAULT_QUIET_PERIOD,
//! );
//! // on every mutation batch:
//! scheduler.notify_mutation(shots.clone());
//! # Ok(())
//! # }
//! ```

pub mod autosave;
pub mod codec;
pub mod durable;
pub mod error;
pub mod handle;
pub mod migrate;
pub mod serialize;
pub mod shot;
pub mod store;

pub use error::PersistError;
pub use handle::HandleManager;
pub use shot::{AspectRatio, CameraParams, ImageBlob, Shot};
pub use store::ShotStore;

use std::path::Path;

/// Load the session: run startup migrations, read every durable shot and
/// reconstitute the live list, minting fresh handles for all image payloads.
///
/// Migration failures are non-fatal (logged, legacy data left in place);
/// a store read failure is returned because there is no session without it.
pub fn load_session(
    store: &mut ShotStore,
    handles: &HandleManager,
    fallback_path: Option<&Path>,
) -> error::Result<Vec<Shot>> {
    if let Some(path) = fallback_path {
        migrate::run_startup_migrations(store, path);
    }

    let durables = store.get_all()?;
    tracing::info!("session loaded: {} shot(s)", durables.len());
    Ok(durables
        .into_iter()
        .map(|durable| serialize::from_durable(durable, handles))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shot::ImageSource;

    #[test]
    fn test_empty_session_loads_empty() {
        let handles = HandleManager::new();
        let mut store = ShotStore::open_in_memory().unwrap();

        let shots = load_session(&mut store, &handles, None).unwrap();
        assert!(shots.is_empty());
        assert_eq!(handles.live_count(), 0);
    }

    #[test]
    fn test_session_survives_reload_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.db");
        let handles = HandleManager::new();

        // Build a shot with 3 versions and 1 reference image, save it
        let shot_id;
        {
            let mut store = ShotStore::open(&path).unwrap();
            let mut shot = Shot::new("Shot 1");
            shot.is_generating = true;
            let v1 = handles.mint(ImageBlob::new("image/png", vec![1; 64]));
            let v2 = handles.mint(ImageBlob::new("image/png", vec![2; 64]));
            let v3 = handles.mint(ImageBlob::new("image/webp", vec![3; 64]));
            shot.current_image = Some(ImageSource::Handle(v3.clone()));
            shot.versions = vec![v1.into(), v2.into(), v3.into()];
            shot.reference_images = vec![ImageSource::Handle(
                handles.mint(ImageBlob::new("image/jpeg", vec![9, 8, 7])),
            )];
            shot_id = shot.id.clone();

            let (durable, skipped) = serialize::to_durable(&shot, &handles);
            assert!(skipped.is_empty());
            store.put_all(&[durable]).unwrap();
        }

        // Fresh process: new handle manager, new store connection
        let handles2 = HandleManager::new();
        let mut store = ShotStore::open(&path).unwrap();
        let shots = load_session(&mut store, &handles2, None).unwrap();

        assert_eq!(shots.len(), 1);
        let shot = &shots[0];
        assert_eq!(shot.id, shot_id);
        assert!(!shot.is_generating);
        assert_eq!(shot.versions.len(), 3);
        assert_eq!(shot.reference_images.len(), 1);

        let resolve = |source: &ImageSource| match source {
            ImageSource::Handle(h) => handles2.resolve(h).unwrap(),
            ImageSource::DataUri(_) => panic!("reload must mint handles"),
        };
        assert_eq!(resolve(&shot.versions[0]).bytes, vec![1; 64]);
        assert_eq!(resolve(&shot.versions[1]).bytes, vec![2; 64]);
        assert_eq!(resolve(&shot.versions[2]).bytes, vec![3; 64]);
        assert_eq!(resolve(&shot.reference_images[0]).bytes, vec![9, 8, 7]);
        assert_eq!(
            resolve(shot.current_image.as_ref().unwrap()).bytes,
            vec![3; 64]
        );
    }

    #[test]
    fn test_removed_shot_releases_every_handle_once() {
        let handles = HandleManager::new();
        let mut shot = Shot::new("doomed");

        let shared = handles.mint(ImageBlob::new("image/png", vec![1]));
        shot.current_image = Some(ImageSource::Handle(shared.clone()));
        shot.versions = vec![
            ImageSource::Handle(shared),
            ImageSource::Handle(handles.mint(ImageBlob::new("image/png", vec![2]))),
        ];
        assert_eq!(handles.live_count(), 2);

        handles.release_sources(shot.image_sources());
        assert_eq!(handles.live_count(), 0);
    }

    #[test]
    fn test_load_session_runs_fallback_migration_first() {
        let dir = tempfile::tempdir().unwrap();
        let sled_path = dir.path().join("session.sled");
        {
            let db = sled::open(&sled_path).unwrap();
            db.insert("shots", r#"[{"id":"legacy-1","name":"old"}]"#.as_bytes())
                .unwrap();
            db.flush().unwrap();
        }

        let handles = HandleManager::new();
        let mut store = ShotStore::open_in_memory().unwrap();
        let shots = load_session(&mut store, &handles, Some(&sled_path)).unwrap();

        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].id, "legacy-1");
    }
}
