/// Durable shot representations
///
/// The on-disk side of the model. A durable shot carries raw image bytes
/// instead of process-local handles; its scalar fields are stored as one
/// JSON metadata blob per row (camelCase names, matching what every schema
/// version of this app has written).
///
/// Two shapes exist on disk:
/// - Current: one row per shot, image payloads as raw BLOBs.
/// - Legacy: a single sentinel row whose sole field is the entire shot list
///   as JSON text with data-URI images.
/// The store decodes rows into [`StoredRow`] exactly once at load time;
/// nothing downstream ever sniffs shapes per field.

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::shot::{AspectRatio, CameraParams, ImageBlob};

/// Primary key of the superseded single-record schema.
pub const LEGACY_SENTINEL_ID: &str = "__shots__";

/// A shot in durable form: scalars plus raw image payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct DurableShot {
    pub id: String,
    pub name: String,
    pub script: String,
    pub enhanced_script: String,
    pub prompt_en: String,
    pub prompt_cn: String,
    pub aspect_ratio: AspectRatio,
    pub camera_params: CameraParams,
    pub seed: u32,
    pub model: String,
    pub is_grid: bool,
    pub current_image: Option<ImageBlob>,
    pub versions: Vec<ImageBlob>,
    pub reference_images: Vec<ImageBlob>,
}

/// Scalar fields of a current-schema row, stored as JSON in the `meta`
/// column. Image payloads live in the `shot_images` table, not here.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ShotMeta {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub enhanced_script: String,
    #[serde(default)]
    pub prompt_en: String,
    #[serde(default)]
    pub prompt_cn: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub camera_params: CameraParams,
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub is_grid: bool,
}

/// One element of the legacy sentinel row's shot list. Image fields are
/// data-URI text; every field is defaulted because early versions of the
/// app added fields release by release.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct LegacyShotRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script: String,
    #[serde(default)]
    pub enhanced_script: String,
    #[serde(default)]
    pub prompt_en: String,
    #[serde(default)]
    pub prompt_cn: String,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub camera_params: CameraParams,
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub is_grid: bool,
    #[serde(default)]
    pub current_image: Option<String>,
    #[serde(default)]
    pub versions: Vec<String>,
    #[serde(default)]
    pub reference_images: Vec<String>,
}

/// A row as decoded at the store boundary.
#[derive(Debug)]
pub enum StoredRow {
    /// One shot under the current per-row schema.
    Current(DurableShot),
    /// The entire pre-migration shot list from the sentinel row.
    Legacy(Vec<DurableShot>),
}

impl DurableShot {
    pub fn meta(&self) -> ShotMeta {
        ShotMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            script: self.script.clone(),
            enhanced_script: self.enhanced_script.clone(),
            prompt_en: self.prompt_en.clone(),
            prompt_cn: self.prompt_cn.clone(),
            aspect_ratio: self.aspect_ratio,
            camera_params: self.camera_params,
            seed: self.seed,
            model: self.model.clone(),
            is_grid: self.is_grid,
        }
    }

    pub fn from_meta(meta: ShotMeta) -> Self {
        Self {
            id: meta.id,
            name: meta.name,
            script: meta.script,
            enhanced_script: meta.enhanced_script,
            prompt_en: meta.prompt_en,
            prompt_cn: meta.prompt_cn,
            aspect_ratio: meta.aspect_ratio,
            camera_params: meta.camera_params,
            seed: meta.seed,
            model: meta.model,
            is_grid: meta.is_grid,
            current_image: None,
            versions: Vec::new(),
            reference_images: Vec::new(),
        }
    }

    /// Convert a legacy record, decoding its data-URI images.
    ///
    /// Decode failures degrade to empty blobs rather than dropping the
    /// record: a session from 2023 with one truncated payload still loads.
    pub fn from_legacy(record: LegacyShotRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            script: record.script,
            enhanced_script: record.enhanced_script,
            prompt_en: record.prompt_en,
            prompt_cn: record.prompt_cn,
            aspect_ratio: record.aspect_ratio,
            camera_params: record.camera_params,
            seed: record.seed,
            model: record.model,
            is_grid: record.is_grid,
            current_image: record.current_image.as_deref().map(codec::decode_or_empty),
            versions: record
                .versions
                .iter()
                .map(|uri| codec::decode_or_empty(uri))
                .collect(),
            reference_images: record
                .reference_images
                .iter()
                .map(|uri| codec::decode_or_empty(uri))
                .collect(),
        }
    }
}
