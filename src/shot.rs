/// Shot data model
///
/// A Shot is one storyboard panel's full editable state: script, prompts,
/// camera parameters, and image history. This is the "live" representation
/// used by the editor: image fields hold process-local handles (or a data
/// URI for a freshly uploaded reference image that was never minted), never
/// raw bytes and never persisted text encodings.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::handle::ImageHandle;

/// A raw binary image payload plus its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageBlob {
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Placeholder blob used when a malformed payload is dropped.
    pub fn empty() -> Self {
        Self {
            mime: "image/png".to_string(),
            bytes: Vec::new(),
        }
    }
}

/// A live image reference held by a Shot field.
///
/// Generated renditions are minted as handles as soon as their bytes arrive.
/// A reference image the user just dropped in arrives as a data URI and stays
/// in that form until the next serialization pass converts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Handle(ImageHandle),
    DataUri(String),
}

impl From<ImageHandle> for ImageSource {
    fn from(handle: ImageHandle) -> Self {
        ImageSource::Handle(handle)
    }
}

/// Output aspect ratio, fixed set supported by the generation backend.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    #[default]
    Wide,
    #[serde(rename = "9:16")]
    Tall,
    #[serde(rename = "4:3")]
    Classic,
    #[serde(rename = "3:4")]
    Portrait,
}

/// Virtual camera placement for a shot
///
/// These values drive the camera gizmo in the editor and are passed to the
/// generation backend as conditioning.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct CameraParams {
    /// Horizontal orbit angle in degrees (0.0 to 360.0, wraps)
    pub azimuth: f32,

    /// Vertical angle in degrees (-30.0 to +90.0)
    /// - Negative values look up from below
    /// - +90.0 = straight down
    pub elevation: f32,

    /// Dolly distance factor (0.5 to 2.0)
    /// - 0.5 = close-up, 1.0 = neutral, 2.0 = wide
    pub distance: f32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            azimuth: 0.0,
            elevation: 15.0,
            distance: 1.0,
        }
    }
}

impl CameraParams {
    /// Clamp all fields into their documented ranges.
    pub fn clamped(self) -> Self {
        Self {
            azimuth: self.azimuth.rem_euclid(360.0),
            elevation: self.elevation.clamp(-30.0, 90.0),
            distance: self.distance.clamp(0.5, 2.0),
        }
    }
}

/// One storyboard panel's full editable state.
#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    /// Opaque unique identifier, primary key of the store
    pub id: String,
    /// Display label, not guaranteed unique
    pub name: String,
    /// Scene description as written by the user
    pub script: String,
    /// AI-polished version of the script
    pub enhanced_script: String,
    /// Generation prompt, English
    pub prompt_en: String,
    /// Generation prompt, Chinese
    pub prompt_cn: String,
    pub aspect_ratio: AspectRatio,
    pub camera_params: CameraParams,
    /// Seed for reproducible generation
    pub seed: u32,
    /// Backend model variant to invoke
    pub model: String,
    /// The active rendition shown in the editor
    pub current_image: Option<ImageSource>,
    /// Full history of generated renditions, append-only except for
    /// explicit deletion
    pub versions: Vec<ImageSource>,
    /// User-supplied conditioning images, insertion-ordered
    pub reference_images: Vec<ImageSource>,
    /// True while a generation request is in flight. Transient: always
    /// false after a reload.
    pub is_generating: bool,
    /// Marks that `current_image` is a 3x3 contact sheet rather than a
    /// single rendition
    pub is_grid: bool,
}

impl Shot {
    /// Create a blank shot with a fresh id and seed.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            script: String::new(),
            enhanced_script: String::new(),
            prompt_en: String::new(),
            prompt_cn: String::new(),
            aspect_ratio: AspectRatio::default(),
            camera_params: CameraParams::default(),
            seed: rand::random::<u32>(),
            model: String::new(),
            current_image: None,
            versions: Vec::new(),
            reference_images: Vec::new(),
            is_generating: false,
            is_grid: false,
        }
    }

    /// Every live image reference of this shot, for bulk release on removal.
    pub fn image_sources(&self) -> impl Iterator<Item = &ImageSource> {
        self.current_image
            .iter()
            .chain(self.versions.iter())
            .chain(self.reference_images.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_shot_is_blank() {
        let shot = Shot::new("Shot 1");
        assert!(shot.versions.is_empty());
        assert!(shot.reference_images.is_empty());
        assert!(shot.current_image.is_none());
        assert!(!shot.is_generating);
        assert!(!shot.id.is_empty());
    }

    #[test]
    fn test_fresh_ids_are_unique() {
        let a = Shot::new("a");
        let b = Shot::new("b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_camera_clamp() {
        let params = CameraParams {
            azimuth: 400.0,
            elevation: -60.0,
            distance: 3.0,
        }
        .clamped();

        assert!((params.azimuth - 40.0).abs() < 1e-3);
        assert_eq!(params.elevation, -30.0);
        assert_eq!(params.distance, 2.0);
    }

    #[test]
    fn test_aspect_ratio_tags() {
        let json = serde_json::to_string(&AspectRatio::Tall).unwrap();
        assert_eq!(json, "\"9:16\"");
        let back: AspectRatio = serde_json::from_str("\"4:3\"").unwrap();
        assert_eq!(back, AspectRatio::Classic);
    }
}
