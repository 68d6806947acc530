//! Coordinate and schema transforms between the decoded formats.
//!
//! The functions here are pure: they take one codec's decoded value and
//! return another's, ready for encoding. File handling lives in
//! [`pipeline`], which also builds a [`ConversionReport`] per call.
//!
//! ```text
//!            normalized_to_tree            tree_to_dataset
//!   YOLO  ───────────────────────▶  VOC  ───────────────────▶  COCO
//!     ▲   ◀───────────────────────                                │
//!     │        tree_to_normalized                                 │
//!     └───────────────────────────────────────────────────────────┘
//!                         dataset_to_normalized
//! ```
//!
//! Errors raised here carry the `<memory>` path; the pipeline functions
//! re-attach the input file path before returning them.

pub mod pipeline;
pub mod report;

pub use pipeline::{
    coco_to_yolo, pascal_voc_to_coco, pascal_voc_to_yolo, yolo_to_pascal_voc, CocoToYoloOptions,
    VocToCocoOptions, VocToYoloOptions, YoloToVocOptions,
};
pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::BoxconvError;
use crate::ir::io_coco_json::{
    CocoWriteOptions, DatasetAnnotation, DatasetCategory, DatasetImage, DatasetRecord,
};
use crate::ir::io_voc_xml::{build_tree, VocDocument, VocObjectDefaults};
use crate::ir::io_yolo::{decode_normalized, YoloRow};
use crate::ir::{
    AnnotationId, CategoryId, ClassId, ClassTable, ImageMeta, LabeledBox, NormalizedBox,
};

const MEMORY_PATH: &str = "<memory>";

/// Where [`dataset_to_normalized`] takes the image size from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DimensionSource {
    /// Caller-supplied size, applied to every annotation. This allows
    /// re-exporting labels for a resized image.
    Explicit { width: u32, height: u32 },
    /// The `width`/`height` of the image record each annotation's
    /// `image_id` points at.
    FromRecord,
}

/// How COCO category ids are turned back into YOLO class ids.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMapping {
    /// `class_id = category_id - 1`. Correct for records written by
    /// [`tree_to_dataset`], whose category ids are dense `1..=N`.
    #[default]
    Offset,
    /// `class_id` is the rank of the category id among the record's
    /// categories sorted by id. Use for external records with sparse or
    /// reordered category ids.
    Ordinal,
}

/// Builds a VOC tree for one image from YOLO rows.
///
/// Class ids are resolved to names through `classes`; an id outside the
/// table fails with [`BoxconvError::IndexOutOfRange`]. A zero image
/// dimension fails with [`BoxconvError::InvalidField`].
pub fn normalized_to_tree(
    rows: &[YoloRow],
    image: &ImageMeta,
    classes: &ClassTable,
    defaults: &VocObjectDefaults,
) -> Result<VocDocument, BoxconvError> {
    image_size(image.width, image.height, "image size")?;
    let boxes = decode_normalized(rows, image.width, image.height)
        .into_iter()
        .map(|labeled| {
            let name = classes
                .name_of(labeled.label)
                .ok_or_else(|| BoxconvError::IndexOutOfRange {
                    path: PathBuf::from(MEMORY_PATH),
                    class_id: labeled.label.as_usize(),
                    class_count: classes.len(),
                })?;
            Ok(LabeledBox::new(name.to_string(), labeled.bbox))
        })
        .collect::<Result<Vec<_>, BoxconvError>>()?;

    Ok(build_tree(image, &boxes, defaults))
}

/// Turns a VOC tree back into YOLO rows, normalizing by the tree's own
/// `<size>`.
pub fn tree_to_normalized(
    document: &VocDocument,
    classes: &ClassTable,
) -> Result<Vec<YoloRow>, BoxconvError> {
    let (width, height) = image_size(document.image.width, document.image.height, "<size>")?;

    document
        .objects
        .iter()
        .map(|object| {
            let class_id = resolve_class(classes, &object.name)?;
            Ok(YoloRow::new(class_id, object.bbox.to_normalized(width, height)))
        })
        .collect()
}

/// Builds a single-image COCO record from a VOC tree.
///
/// Every class in `classes` becomes a category (`id = index + 1`) whether
/// or not this image uses it. Annotation ids count from 1 in object order.
/// The tree must carry a `<filename>`.
pub fn tree_to_dataset(
    document: &VocDocument,
    classes: &ClassTable,
    options: &CocoWriteOptions,
) -> Result<DatasetRecord, BoxconvError> {
    let categories = classes
        .iter()
        .map(|(class_id, name)| DatasetCategory {
            id: class_id.to_category_id(),
            name: name.to_string(),
        })
        .collect();

    let annotations = document
        .objects
        .iter()
        .enumerate()
        .map(|(idx, object)| {
            let category_id = resolve_class(classes, &object.name)?.to_category_id();
            Ok(DatasetAnnotation {
                id: AnnotationId::new(idx as u64 + 1),
                image_id: options.image_id,
                category_id,
                bbox: object.bbox.to_xywh().map(|v| v as f64),
                area: object.bbox.area() as f64,
                iscrowd: options.iscrowd,
            })
        })
        .collect::<Result<Vec<_>, BoxconvError>>()?;

    let file_name =
        document
            .image
            .file_name
            .clone()
            .ok_or_else(|| BoxconvError::MissingField {
                path: PathBuf::from(MEMORY_PATH),
                field: "<filename>".to_string(),
                context: "<annotation>".to_string(),
            })?;

    Ok(DatasetRecord {
        images: vec![DatasetImage {
            id: options.image_id,
            width: document.image.width,
            height: document.image.height,
            file_name: Some(file_name),
        }],
        annotations,
        categories,
    })
}

/// Turns a COCO record into YOLO rows, one per annotation in stored order.
pub fn dataset_to_normalized(
    record: &DatasetRecord,
    dimensions: DimensionSource,
    mapping: CategoryMapping,
) -> Result<Vec<YoloRow>, BoxconvError> {
    let ordinal: BTreeMap<CategoryId, ClassId> = match mapping {
        CategoryMapping::Offset => BTreeMap::new(),
        CategoryMapping::Ordinal => {
            let mut ids: Vec<CategoryId> = record.categories.iter().map(|c| c.id).collect();
            ids.sort();
            ids.dedup();
            ids.into_iter()
                .enumerate()
                .map(|(idx, id)| (id, ClassId::new(idx)))
                .collect()
        }
    };

    record
        .annotations
        .iter()
        .enumerate()
        .map(|(idx, annotation)| {
            let class_id = match mapping {
                CategoryMapping::Offset => annotation.category_id.to_class_id(),
                CategoryMapping::Ordinal => ordinal.get(&annotation.category_id).copied(),
            }
            .ok_or_else(|| BoxconvError::UnknownCategory {
                path: PathBuf::from(MEMORY_PATH),
                annotation_id: annotation.id.as_u64(),
                category_id: annotation.category_id.as_u64(),
            })?;

            let (width, height) = match dimensions {
                DimensionSource::Explicit { width, height } => {
                    image_size(width, height, "explicit image size")?
                }
                DimensionSource::FromRecord => {
                    let image = record.image(annotation.image_id).ok_or_else(|| {
                        BoxconvError::MissingField {
                            path: PathBuf::from(MEMORY_PATH),
                            field: format!("image record with id {}", annotation.image_id),
                            context: format!("annotations[{idx}]"),
                        }
                    })?;
                    image_size(
                        image.width,
                        image.height,
                        &format!("images entry {}", image.id),
                    )?
                }
            };

            let [x, y, w, h] = annotation.bbox;
            Ok(YoloRow::new(
                class_id,
                NormalizedBox::from_xywh(x, y, w, h, width, height),
            ))
        })
        .collect()
}

/// Image dimensions as normalization divisors. Zero is rejected.
fn image_size(width: u32, height: u32, context: &str) -> Result<(f64, f64), BoxconvError> {
    for (field, value) in [("width", width), ("height", height)] {
        if value == 0 {
            return Err(BoxconvError::InvalidField {
                path: PathBuf::from(MEMORY_PATH),
                field: field.to_string(),
                value: value.to_string(),
                context: context.to_string(),
                expected: "non-zero pixel count",
            });
        }
    }
    Ok((width as f64, height as f64))
}

fn resolve_class(classes: &ClassTable, name: &str) -> Result<ClassId, BoxconvError> {
    classes
        .class_id_of(name)
        .ok_or_else(|| BoxconvError::UnknownClass {
            path: PathBuf::from(MEMORY_PATH),
            name: name.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::io_yolo::{emit_normalized, from_yolo_str, YoloWriteOptions};
    use crate::ir::{EmptyPolicy, ImageId, PixelBox};

    fn cat_table() -> ClassTable {
        ClassTable::new(["cat"]).expect("class table")
    }

    fn cat_scenario_tree() -> VocDocument {
        let rows = from_yolo_str("0 0.5 0.5 0.2 0.4", EmptyPolicy::Reject).expect("parse rows");
        let image = ImageMeta::new(100, 100).with_file_name("cat.jpg");
        normalized_to_tree(&rows, &image, &cat_table(), &VocObjectDefaults::default())
            .expect("build tree")
    }

    #[test]
    fn normalized_to_tree_resolves_names_and_corners() {
        let tree = cat_scenario_tree();
        assert_eq!(tree.objects.len(), 1);
        assert_eq!(tree.objects[0].name, "cat");
        assert_eq!(tree.objects[0].bbox, PixelBox::from_xyxy(40, 30, 60, 70));
        assert_eq!(tree.image.depth, 3);
    }

    #[test]
    fn normalized_to_tree_rejects_class_outside_table() {
        let rows = from_yolo_str("1 0.5 0.5 0.2 0.4", EmptyPolicy::Reject).expect("parse rows");
        let err = normalized_to_tree(
            &rows,
            &ImageMeta::new(100, 100),
            &cat_table(),
            &VocObjectDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BoxconvError::IndexOutOfRange {
                class_id: 1,
                class_count: 1,
                ..
            }
        ));
    }

    #[test]
    fn tree_to_dataset_builds_single_image_record() {
        let record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");

        assert_eq!(record.images.len(), 1);
        assert_eq!(record.images[0].id, ImageId::new(1));
        assert_eq!(record.images[0].file_name.as_deref(), Some("cat.jpg"));
        assert_eq!(record.categories.len(), 1);
        assert_eq!(record.categories[0].id, CategoryId::new(1));

        let ann = &record.annotations[0];
        assert_eq!(ann.id, AnnotationId::new(1));
        assert_eq!(ann.image_id, ImageId::new(1));
        assert_eq!(ann.category_id, CategoryId::new(1));
        assert_eq!(ann.bbox, [40.0, 30.0, 20.0, 40.0]);
        assert_eq!(ann.area, 800.0);
        assert_eq!(ann.iscrowd, 0);
    }

    #[test]
    fn tree_to_dataset_lists_every_class_as_a_category() {
        let classes = ClassTable::new(["dog", "cat", "bird"]).expect("class table");
        let record = tree_to_dataset(&cat_scenario_tree(), &classes, &CocoWriteOptions::default())
            .expect("build record");
        let names: Vec<&str> = record.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["dog", "cat", "bird"]);
        assert_eq!(record.annotations[0].category_id, CategoryId::new(2));
    }

    #[test]
    fn tree_to_dataset_honours_caller_image_id_and_iscrowd() {
        let options = CocoWriteOptions {
            image_id: ImageId::new(42),
            iscrowd: 1,
        };
        let record = tree_to_dataset(&cat_scenario_tree(), &cat_table(), &options)
            .expect("build record");
        assert_eq!(record.images[0].id, ImageId::new(42));
        assert_eq!(record.annotations[0].image_id, ImageId::new(42));
        assert_eq!(record.annotations[0].iscrowd, 1);
    }

    #[test]
    fn tree_to_dataset_requires_known_class() {
        let classes = ClassTable::new(["dog"]).expect("class table");
        let err = tree_to_dataset(&cat_scenario_tree(), &classes, &CocoWriteOptions::default())
            .unwrap_err();
        assert!(matches!(err, BoxconvError::UnknownClass { ref name, .. } if name == "cat"));
    }

    #[test]
    fn tree_to_dataset_requires_file_name() {
        let mut tree = cat_scenario_tree();
        tree.image.file_name = None;
        let err =
            tree_to_dataset(&tree, &cat_table(), &CocoWriteOptions::default()).unwrap_err();
        assert!(matches!(err, BoxconvError::MissingField { ref field, .. } if field == "<filename>"));
    }

    #[test]
    fn dataset_to_normalized_recovers_the_original_line() {
        let record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        let rows = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 100,
                height: 100,
            },
            CategoryMapping::Offset,
        )
        .expect("convert back");
        assert_eq!(
            emit_normalized(&rows, &YoloWriteOptions::default()),
            "0 0.5 0.5 0.2 0.4"
        );
    }

    #[test]
    fn dataset_to_normalized_can_use_record_dimensions() {
        let mut record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        record.images[0].width = 200;

        let explicit = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 100,
                height: 100,
            },
            CategoryMapping::Offset,
        )
        .expect("explicit dims");
        let from_record =
            dataset_to_normalized(&record, DimensionSource::FromRecord, CategoryMapping::Offset)
                .expect("record dims");

        assert_eq!(explicit[0].bbox.cx, 0.5);
        assert_eq!(from_record[0].bbox.cx, 0.25);
    }

    #[test]
    fn dataset_to_normalized_from_record_needs_the_image() {
        let mut record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        record.images.clear();
        let err =
            dataset_to_normalized(&record, DimensionSource::FromRecord, CategoryMapping::Offset)
                .unwrap_err();
        assert!(matches!(err, BoxconvError::MissingField { .. }));
    }

    #[test]
    fn offset_mapping_rejects_category_zero() {
        let mut record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        record.annotations[0].category_id = CategoryId::new(0);
        let err = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 10,
                height: 10,
            },
            CategoryMapping::Offset,
        )
        .unwrap_err();
        assert!(matches!(err, BoxconvError::UnknownCategory { category_id: 0, .. }));
    }

    #[test]
    fn ordinal_mapping_handles_sparse_category_ids() {
        let record = DatasetRecord {
            images: vec![],
            categories: vec![
                DatasetCategory {
                    id: CategoryId::new(90),
                    name: "toothbrush".to_string(),
                },
                DatasetCategory {
                    id: CategoryId::new(18),
                    name: "dog".to_string(),
                },
            ],
            annotations: vec![
                DatasetAnnotation {
                    id: AnnotationId::new(1),
                    image_id: ImageId::new(1),
                    category_id: CategoryId::new(90),
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    area: 100.0,
                    iscrowd: 0,
                },
                DatasetAnnotation {
                    id: AnnotationId::new(2),
                    image_id: ImageId::new(1),
                    category_id: CategoryId::new(18),
                    bbox: [0.0, 0.0, 10.0, 10.0],
                    area: 100.0,
                    iscrowd: 0,
                },
            ],
        };
        let dims = DimensionSource::Explicit {
            width: 10,
            height: 10,
        };

        let rows = dataset_to_normalized(&record, dims, CategoryMapping::Ordinal).expect("map");
        assert_eq!(rows[0].class_id, ClassId::new(1));
        assert_eq!(rows[1].class_id, ClassId::new(0));

        let offset = dataset_to_normalized(&record, dims, CategoryMapping::Offset).expect("map");
        assert_eq!(offset[0].class_id, ClassId::new(89));
    }

    #[test]
    fn ordinal_mapping_rejects_unlisted_category() {
        let mut record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        record.categories.clear();
        let err = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 10,
                height: 10,
            },
            CategoryMapping::Ordinal,
        )
        .unwrap_err();
        assert!(matches!(err, BoxconvError::UnknownCategory { .. }));
    }

    fn assert_zero_dimension(err: BoxconvError, expected_field: &str, expected_context: &str) {
        match err {
            BoxconvError::InvalidField {
                field,
                value,
                context,
                ..
            } => {
                assert_eq!(field, expected_field);
                assert_eq!(value, "0");
                assert_eq!(context, expected_context);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn normalized_to_tree_rejects_zero_image_size() {
        let rows = from_yolo_str("0 0.5 0.5 0.2 0.4", EmptyPolicy::Reject).expect("parse rows");
        let err = normalized_to_tree(
            &rows,
            &ImageMeta::new(100, 0),
            &cat_table(),
            &VocObjectDefaults::default(),
        )
        .unwrap_err();
        assert_zero_dimension(err, "height", "image size");
    }

    #[test]
    fn tree_to_normalized_rejects_zero_size_element() {
        let mut tree = cat_scenario_tree();
        tree.image.width = 0;
        tree.image.height = 0;
        let err = tree_to_normalized(&tree, &cat_table()).unwrap_err();
        assert_zero_dimension(err, "width", "<size>");
    }

    #[test]
    fn dataset_to_normalized_rejects_zero_explicit_size() {
        let record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        let err = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 0,
                height: 100,
            },
            CategoryMapping::Offset,
        )
        .unwrap_err();
        assert_zero_dimension(err, "width", "explicit image size");
    }

    #[test]
    fn dataset_to_normalized_rejects_zero_record_size() {
        let mut record = tree_to_dataset(
            &cat_scenario_tree(),
            &cat_table(),
            &CocoWriteOptions::default(),
        )
        .expect("build record");
        record.images[0].height = 0;
        let err =
            dataset_to_normalized(&record, DimensionSource::FromRecord, CategoryMapping::Offset)
                .unwrap_err();
        assert_zero_dimension(err, "height", "images entry 1");
    }

    #[test]
    fn tree_to_normalized_inverts_normalized_to_tree() {
        let rows = tree_to_normalized(&cat_scenario_tree(), &cat_table()).expect("invert");
        assert_eq!(
            emit_normalized(&rows, &YoloWriteOptions::default()),
            "0 0.5 0.5 0.2 0.4"
        );
    }

    #[test]
    fn every_step_preserves_box_count() {
        let classes = ClassTable::new(["a", "b", "c"]).expect("class table");
        let text = "0 0.1 0.1 0.1 0.1\n1 0.5 0.5 0.3 0.2\n2 0.9 0.2 0.05 0.1\n0 0.5 0.5 1 1";
        let rows = from_yolo_str(text, EmptyPolicy::Reject).expect("parse rows");
        let image = ImageMeta::new(640, 480).with_file_name("img.jpg");

        let tree = normalized_to_tree(&rows, &image, &classes, &VocObjectDefaults::default())
            .expect("to tree");
        let record =
            tree_to_dataset(&tree, &classes, &CocoWriteOptions::default()).expect("to record");
        let back = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 640,
                height: 480,
            },
            CategoryMapping::Offset,
        )
        .expect("to rows");

        assert_eq!(tree.objects.len(), 4);
        assert_eq!(record.annotations.len(), 4);
        assert_eq!(back.len(), 4);
        for (before, after) in rows.iter().zip(&back) {
            assert_eq!(before.class_id, after.class_id);
        }
    }
}
