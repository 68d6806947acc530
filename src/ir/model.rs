//! Value shapes exchanged between the codecs and the converters.
//!
//! Everything here is built fresh for a single conversion call and dropped
//! once the output has been encoded.

use serde::{Deserialize, Serialize};

use super::bbox::PixelBox;

/// Channel count written to VOC `<size><depth>` when nothing else is known.
pub const DEFAULT_IMAGE_DEPTH: u32 = 3;

/// Image-level metadata carried by VOC trees and COCO image records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    /// Width of the image in pixels.
    pub width: u32,

    /// Height of the image in pixels.
    pub height: u32,

    /// Channel count. Always 3 (RGB) unless the caller says otherwise.
    #[serde(default = "default_depth")]
    pub depth: u32,

    /// Image file name. Absent when a tree is built from YOLO labels,
    /// required when a tree is turned into a COCO record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

fn default_depth() -> u32 {
    DEFAULT_IMAGE_DEPTH
}

impl ImageMeta {
    /// Creates image metadata with the default depth and no file name.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: DEFAULT_IMAGE_DEPTH,
            file_name: None,
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = depth;
        self
    }
}

/// What a decoder does with an input that holds no boxes at all.
///
/// The same policy applies to YOLO files without label lines, VOC trees
/// without `<object>` nodes and COCO records without annotations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPolicy {
    /// Fail with [`BoxconvError::EmptyInput`](crate::BoxconvError::EmptyInput).
    #[default]
    Reject,
    /// Treat the input as an image with no objects.
    Allow,
}

/// A pixel-space box tagged with its class.
///
/// `L` is a [`ClassId`](super::ClassId) for boxes decoded from YOLO text
/// and a class name (`String`) for boxes decoded from a VOC tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabeledBox<L> {
    pub label: L,
    pub bbox: PixelBox,
}

impl<L> LabeledBox<L> {
    pub fn new(label: L, bbox: PixelBox) -> Self {
        Self { label, bbox }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_meta_defaults_to_rgb_without_file_name() {
        let image = ImageMeta::new(640, 480);
        assert_eq!(image.depth, 3);
        assert!(image.file_name.is_none());
    }

    #[test]
    fn image_meta_deserializes_missing_depth_as_default() {
        let image: ImageMeta =
            serde_json::from_str(r#"{"width": 10, "height": 20}"#).expect("parse image meta");
        assert_eq!(image, ImageMeta::new(10, 20));
    }
}
