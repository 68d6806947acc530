//! COCO JSON reader and writer.
//!
//! A [`DatasetRecord`] holds three tables linked by integer ids: images,
//! annotations and categories. Boxes are `[x, y, width, height]` with
//! `(x, y)` the top-left corner in absolute pixels.
//!
//! # Output
//!
//! Keys are written in a fixed order (`images`, `annotations`,
//! `categories`) and pretty-printed with 4-space indentation. Whole-number
//! `bbox` and `area` values are written as JSON integers, so a box built
//! from VOC corners reads `[40, 30, 20, 40]` rather than `[40.0, ...]`.
//!
//! # Input
//!
//! Unknown keys (`info`, `licenses`, `segmentation`, ...) are ignored.
//! A missing required key is reported as
//! [`BoxconvError::MissingField`] naming the record it was missing from.
//! Image `file_name` is optional, and image `width`/`height` may be written
//! as whole-number floats (`640.0`).

use std::fs;
use std::path::{Path, PathBuf};

use serde::ser::SerializeTuple;
use serde::{Deserialize, Serialize, Serializer};

use super::model::EmptyPolicy;
use super::{AnnotationId, CategoryId, ImageId};
use crate::error::BoxconvError;

const MEMORY_PATH: &str = "<memory>";
const INDENT: &[u8] = b"    ";

// ============================================================================
// Record types
// ============================================================================

/// A COCO dataset record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetRecord {
    pub images: Vec<DatasetImage>,
    pub annotations: Vec<DatasetAnnotation>,
    pub categories: Vec<DatasetCategory>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatasetImage {
    pub id: ImageId,
    pub width: u32,
    pub height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DatasetCategory {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DatasetAnnotation {
    pub id: AnnotationId,
    pub image_id: ImageId,
    pub category_id: CategoryId,

    /// `[x, y, width, height]`, top-left corner plus dimensions.
    #[serde(serialize_with = "serialize_bbox")]
    pub bbox: [f64; 4],

    #[serde(serialize_with = "serialize_number")]
    pub area: f64,

    pub iscrowd: u8,
}

impl DatasetRecord {
    pub fn image(&self, id: ImageId) -> Option<&DatasetImage> {
        self.images.iter().find(|image| image.id == id)
    }
}

/// Encoder-side values that the source formats never carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CocoWriteOptions {
    /// Id given to the single image record. Defaults to 1.
    pub image_id: ImageId,
    /// `iscrowd` written on every annotation. Defaults to 0.
    pub iscrowd: u8,
}

impl Default for CocoWriteOptions {
    fn default() -> Self {
        Self {
            image_id: ImageId::new(1),
            iscrowd: 0,
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Reads a dataset record from a COCO JSON file.
pub fn read_coco_json(path: &Path, empty: EmptyPolicy) -> Result<DatasetRecord, BoxconvError> {
    let data = fs::read(path).map_err(BoxconvError::Io)?;
    let record = parse_coco_slice(&data, path, empty)?;
    log::debug!(
        "parsed COCO record with {} image(s), {} categor(ies), {} annotation(s) from {}",
        record.images.len(),
        record.categories.len(),
        record.annotations.len(),
        path.display()
    );
    Ok(record)
}

/// Writes a dataset record to a COCO JSON file.
///
/// The whole document is serialized before the file is touched.
pub fn write_coco_json(path: &Path, record: &DatasetRecord) -> Result<(), BoxconvError> {
    let json = to_coco_string(record).map_err(|source| BoxconvError::JsonWrite {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, json).map_err(BoxconvError::Io)
}

/// Parses a COCO JSON string.
pub fn from_coco_str(json: &str, empty: EmptyPolicy) -> Result<DatasetRecord, BoxconvError> {
    parse_coco_slice(json.as_bytes(), Path::new(MEMORY_PATH), empty)
}

/// Parses a COCO JSON byte slice.
pub fn from_coco_slice(bytes: &[u8], empty: EmptyPolicy) -> Result<DatasetRecord, BoxconvError> {
    parse_coco_slice(bytes, Path::new(MEMORY_PATH), empty)
}

/// Serializes a record as pretty-printed COCO JSON.
pub fn to_coco_string(record: &DatasetRecord) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    record.serialize(&mut serializer)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

// ============================================================================
// Parsing: raw JSON -> record
// ============================================================================

// Required keys are optional here so their absence can be reported as
// MissingField with the offending record's position.

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    images: Vec<RawImage>,
    annotations: Option<Vec<RawAnnotation>>,
    #[serde(default)]
    categories: Vec<RawCategory>,
}

#[derive(Debug, Deserialize)]
struct RawImage {
    id: Option<u64>,
    width: Option<f64>,
    height: Option<f64>,
    file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawCategory {
    id: Option<u64>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAnnotation {
    id: Option<u64>,
    image_id: Option<u64>,
    category_id: Option<u64>,
    bbox: Option<Vec<f64>>,
    area: Option<f64>,
    iscrowd: Option<u8>,
}

fn parse_coco_slice(
    bytes: &[u8],
    path: &Path,
    empty: EmptyPolicy,
) -> Result<DatasetRecord, BoxconvError> {
    let raw: RawRecord =
        serde_json::from_slice(bytes).map_err(|source| BoxconvError::JsonParse {
            path: path.to_path_buf(),
            source,
        })?;

    let fields = FieldReader { path };

    let images = raw
        .images
        .into_iter()
        .enumerate()
        .map(|(idx, image)| {
            let context = format!("images[{idx}]");
            Ok(DatasetImage {
                id: ImageId::new(fields.require(image.id, "id", &context)?),
                width: fields.require_pixels(image.width, "width", &context)?,
                height: fields.require_pixels(image.height, "height", &context)?,
                file_name: image.file_name,
            })
        })
        .collect::<Result<Vec<_>, BoxconvError>>()?;

    let categories = raw
        .categories
        .into_iter()
        .enumerate()
        .map(|(idx, category)| {
            let context = format!("categories[{idx}]");
            Ok(DatasetCategory {
                id: CategoryId::new(fields.require(category.id, "id", &context)?),
                name: fields.require(category.name, "name", &context)?,
            })
        })
        .collect::<Result<Vec<_>, BoxconvError>>()?;

    let annotations = fields
        .require(raw.annotations, "annotations", "top-level object")?
        .into_iter()
        .enumerate()
        .map(|(idx, annotation)| {
            let context = format!("annotations[{idx}]");
            let raw_bbox = fields.require(annotation.bbox, "bbox", &context)?;
            let bbox: [f64; 4] =
                raw_bbox
                    .as_slice()
                    .try_into()
                    .map_err(|_| BoxconvError::InvalidField {
                        path: fields.path.to_path_buf(),
                        field: "bbox".to_string(),
                        value: format!("{raw_bbox:?}"),
                        context: context.clone(),
                        expected: "4 numbers [x, y, width, height]",
                    })?;
            Ok(DatasetAnnotation {
                id: AnnotationId::new(fields.require(annotation.id, "id", &context)?),
                image_id: ImageId::new(fields.require(annotation.image_id, "image_id", &context)?),
                category_id: CategoryId::new(fields.require(
                    annotation.category_id,
                    "category_id",
                    &context,
                )?),
                bbox,
                area: annotation.area.unwrap_or(bbox[2] * bbox[3]),
                iscrowd: annotation.iscrowd.unwrap_or(0),
            })
        })
        .collect::<Result<Vec<_>, BoxconvError>>()?;

    if annotations.is_empty() && empty == EmptyPolicy::Reject {
        return Err(BoxconvError::EmptyInput {
            path: path.to_path_buf(),
        });
    }

    Ok(DatasetRecord {
        images,
        annotations,
        categories,
    })
}

struct FieldReader<'a> {
    path: &'a Path,
}

impl FieldReader<'_> {
    fn require<T>(&self, value: Option<T>, field: &str, context: &str) -> Result<T, BoxconvError> {
        value.ok_or_else(|| BoxconvError::MissingField {
            path: PathBuf::from(self.path),
            field: field.to_string(),
            context: context.to_string(),
        })
    }

    /// A required pixel count. Accepts `640` and `640.0`, rejects `640.5`.
    fn require_pixels(
        &self,
        value: Option<f64>,
        field: &str,
        context: &str,
    ) -> Result<u32, BoxconvError> {
        let value = self.require(value, field, context)?;
        if value.is_finite() && value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
            Ok(value as u32)
        } else {
            Err(BoxconvError::InvalidField {
                path: PathBuf::from(self.path),
                field: field.to_string(),
                value: value.to_string(),
                context: context.to_string(),
                expected: "whole number of pixels",
            })
        }
    }
}

// ============================================================================
// Serialization helpers
// ============================================================================

/// Whole numbers that fit losslessly in an f64 mantissa are written as integers.
struct JsonNumber(f64);

impl Serialize for JsonNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
        let value = self.0;
        if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
            serializer.serialize_i64(value as i64)
        } else {
            serializer.serialize_f64(value)
        }
    }
}

fn serialize_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    JsonNumber(*value).serialize(serializer)
}

fn serialize_bbox<S: Serializer>(bbox: &[f64; 4], serializer: S) -> Result<S::Ok, S::Error> {
    let mut tuple = serializer.serialize_tuple(4)?;
    for value in bbox {
        tuple.serialize_element(&JsonNumber(*value))?;
    }
    tuple.end()
}

// ============================================================================
// Tests
// ============================================================================
