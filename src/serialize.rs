/// Shot serializer / deserializer
///
/// Bridges the live model (handles, data URIs) and the durable model (raw
/// bytes). Serialization is partial-failure tolerant: one bad image never
/// blocks the autosave of an entire session.

use crate::codec;
use crate::durable::DurableShot;
use crate::error::PersistError;
use crate::handle::HandleManager;
use crate::shot::{ImageBlob, ImageSource, Shot};

/// Convert one live image reference to bytes.
fn source_to_blob(
    source: &ImageSource,
    handles: &HandleManager,
) -> Result<ImageBlob, PersistError> {
    match source {
        ImageSource::Handle(handle) => handles.resolve(handle).map(|blob| (*blob).clone()),
        // A freshly uploaded reference image that was never minted
        ImageSource::DataUri(uri) => codec::decode(uri),
    }
}

/// Convert a live shot to durable form.
///
/// Works on a copy; the live shot is untouched. Each image field that cannot
/// be resolved (stale handle, malformed upload, a reference whose fetch never
/// completed) is dropped from the durable form and reported in the returned
/// error list; the rest of the shot persists.
pub fn to_durable(shot: &Shot, handles: &HandleManager) -> (DurableShot, Vec<PersistError>) {
    let mut skipped = Vec::new();

    let mut skip = |field: String, err: PersistError| {
        tracing::debug!("shot {}: {field} not serializable: {err}", shot.id);
        skipped.push(PersistError::PartialSerialization {
            shot_id: shot.id.clone(),
            field,
        });
    };

    let current_image = match &shot.current_image {
        None => None,
        Some(source) => match source_to_blob(source, handles) {
            Ok(blob) => Some(blob),
            Err(e) => {
                skip("currentImage".to_string(), e);
                None
            }
        },
    };

    let mut versions = Vec::with_capacity(shot.versions.len());
    for (i, source) in shot.versions.iter().enumerate() {
        match source_to_blob(source, handles) {
            Ok(blob) => versions.push(blob),
            Err(e) => skip(format!("versions[{i}]"), e),
        }
    }

    let mut reference_images = Vec::with_capacity(shot.reference_images.len());
    for (i, source) in shot.reference_images.iter().enumerate() {
        match source_to_blob(source, handles) {
            Ok(blob) => reference_images.push(blob),
            Err(e) => skip(format!("referenceImages[{i}]"), e),
        }
    }

    let durable = DurableShot {
        id: shot.id.clone(),
        name: shot.name.clone(),
        script: shot.script.clone(),
        enhanced_script: shot.enhanced_script.clone(),
        prompt_en: shot.prompt_en.clone(),
        prompt_cn: shot.prompt_cn.clone(),
        aspect_ratio: shot.aspect_ratio,
        camera_params: shot.camera_params,
        seed: shot.seed,
        model: shot.model.clone(),
        is_grid: shot.is_grid,
        current_image,
        versions,
        reference_images,
    };

    (durable, skipped)
}

/// Reconstitute a live shot from its durable form, minting a fresh handle
/// for every image payload. `is_generating` never survives a reload.
pub fn from_durable(durable: DurableShot, handles: &HandleManager) -> Shot {
    let mint = |blob: ImageBlob| ImageSource::Handle(handles.mint(blob));

    Shot {
        id: durable.id,
        name: durable.name,
        script: durable.script,
        enhanced_script: durable.enhanced_script,
        prompt_en: durable.prompt_en,
        prompt_cn: durable.prompt_cn,
        aspect_ratio: durable.aspect_ratio,
        camera_params: durable.camera_params,
        seed: durable.seed,
        model: durable.model,
        is_grid: durable.is_grid,
        current_image: durable.current_image.map(mint),
        versions: durable.versions.into_iter().map(mint).collect(),
        reference_images: durable.reference_images.into_iter().map(mint).collect(),
        is_generating: false,
    }
}
