//! File-to-file conversions.
//!
//! Each function reads its whole input, converts in memory, and writes the
//! output only once every box has converted. A failing call leaves the
//! output path untouched.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::report::{ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport};
use super::{
    dataset_to_normalized, normalized_to_tree, tree_to_dataset, tree_to_normalized,
    CategoryMapping, DimensionSource,
};
use crate::error::BoxconvError;
use crate::ir::io_coco_json::{read_coco_json, write_coco_json, CocoWriteOptions, DatasetRecord};
use crate::ir::io_voc_xml::{read_voc_xml, write_voc_xml, VocDocument, VocObjectDefaults};
use crate::ir::io_yolo::{read_yolo_txt, write_yolo_txt, YoloRow, YoloWriteOptions};
use crate::ir::{CategoryId, ClassTable, EmptyPolicy, ImageMeta, DEFAULT_IMAGE_DEPTH};

/// Options for [`yolo_to_pascal_voc`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloToVocOptions {
    /// Written as `<filename>`. Needed if the tree is later converted to COCO.
    pub file_name: Option<String>,
    /// Written as `<size><depth>`.
    pub depth: u32,
    pub objects: VocObjectDefaults,
    pub empty: EmptyPolicy,
}

impl Default for YoloToVocOptions {
    fn default() -> Self {
        Self {
            file_name: None,
            depth: DEFAULT_IMAGE_DEPTH,
            objects: VocObjectDefaults::default(),
            empty: EmptyPolicy::default(),
        }
    }
}

/// Options for [`pascal_voc_to_coco`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocToCocoOptions {
    pub coco: CocoWriteOptions,
    pub empty: EmptyPolicy,
}

/// Options for [`coco_to_yolo`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CocoToYoloOptions {
    pub category_mapping: CategoryMapping,
    pub yolo: YoloWriteOptions,
    pub empty: EmptyPolicy,
}

/// Options for [`pascal_voc_to_yolo`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocToYoloOptions {
    pub yolo: YoloWriteOptions,
    pub empty: EmptyPolicy,
}

/// Converts a YOLO label file to a Pascal VOC XML file.
pub fn yolo_to_pascal_voc(
    input: &Path,
    image_width: u32,
    image_height: u32,
    classes: &ClassTable,
    output: &Path,
    options: &YoloToVocOptions,
) -> Result<ConversionReport, BoxconvError> {
    let rows = read_yolo_txt(input, options.empty)?;

    let mut image = ImageMeta::new(image_width, image_height).with_depth(options.depth);
    if let Some(file_name) = &options.file_name {
        image = image.with_file_name(file_name.clone());
    }

    let document = normalized_to_tree(&rows, &image, classes, &options.objects)
        .map_err(|e| e.at_path(input))?;
    write_voc_xml(output, &document)?;

    let mut report = ConversionReport::new("yolo", "voc");
    report.input = yolo_counts(&rows);
    report.output = voc_counts(&document);

    if rows
        .iter()
        .any(|row| has_fractional_corner(row, image_width, image_height))
    {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::PixelTruncation,
            "sub-pixel box corners were truncated to whole pixels",
        ));
    }
    if !document.objects.is_empty() {
        let d = &options.objects;
        report.add(ConversionIssue::info(
            ConversionIssueCode::PlaceholderObjectFields,
            format!(
                "every object written with pose '{}', truncated {}, difficult {}",
                d.pose, d.truncated, d.difficult
            ),
        ));
    }
    if document.image.file_name.is_none() {
        report.add(ConversionIssue::info(
            ConversionIssueCode::MissingFileName,
            "no <filename> written; set one before converting this file to COCO",
        ));
    }

    log::info!(
        "converted {} YOLO row(s) from {} to VOC {}",
        rows.len(),
        input.display(),
        output.display()
    );
    Ok(report)
}

/// Converts a Pascal VOC XML file to a single-image COCO JSON file.
pub fn pascal_voc_to_coco(
    input: &Path,
    classes: &ClassTable,
    output: &Path,
    options: &VocToCocoOptions,
) -> Result<ConversionReport, BoxconvError> {
    let document = read_voc_xml(input, options.empty)?;
    let record =
        tree_to_dataset(&document, classes, &options.coco).map_err(|e| e.at_path(input))?;
    write_coco_json(output, &record)?;

    let mut report = ConversionReport::new("voc", "coco");
    report.input = voc_counts(&document);
    report.output = coco_counts(&record);

    add_dropped_object_fields(&mut report, &document, "COCO");
    if document.image.depth != DEFAULT_IMAGE_DEPTH {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropImageDepth,
            format!(
                "image depth {} has no COCO field and was dropped",
                document.image.depth
            ),
        ));
    }
    let unused = record.categories.len().saturating_sub(report.input.categories);
    if unused > 0 {
        report.add(ConversionIssue::info(
            ConversionIssueCode::UnusedCategories,
            format!("{unused} of {} categories are not used by this image", record.categories.len()),
        ));
    }
    report.add(ConversionIssue::info(
        ConversionIssueCode::FixedImageId,
        format!("image and annotations use image_id {}", options.coco.image_id),
    ));

    log::info!(
        "converted {} VOC object(s) from {} to COCO {}",
        document.objects.len(),
        input.display(),
        output.display()
    );
    Ok(report)
}

/// Converts a COCO JSON file to one YOLO label file.
///
/// All annotations in the record land in the output, whatever image they
/// reference.
pub fn coco_to_yolo(
    input: &Path,
    dimensions: DimensionSource,
    output: &Path,
    options: &CocoToYoloOptions,
) -> Result<ConversionReport, BoxconvError> {
    let record = read_coco_json(input, options.empty)?;
    let rows = dataset_to_normalized(&record, dimensions, options.category_mapping)
        .map_err(|e| e.at_path(input))?;
    write_yolo_txt(output, &rows, &options.yolo)?;

    let mut report = ConversionReport::new("coco", "yolo");
    report.input = coco_counts(&record);
    report.output = yolo_counts(&rows);

    let referenced: BTreeSet<_> = record.annotations.iter().map(|a| a.image_id).collect();

    if let DimensionSource::Explicit { width, height } = dimensions {
        for image in record
            .images
            .iter()
            .filter(|image| referenced.contains(&image.id))
        {
            if image.width != width || image.height != height {
                report.add(ConversionIssue::warning(
                    ConversionIssueCode::DimensionMismatch,
                    format!(
                        "image {} is {}x{} in the record but was normalized as {}x{}",
                        image.id, image.width, image.height, width, height
                    ),
                ));
            }
        }
    }
    if referenced.len() > 1 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::MergedImages,
            format!(
                "annotations of {} images were written to a single label file",
                referenced.len()
            ),
        ));
    }
    match options.category_mapping {
        CategoryMapping::Offset if !has_dense_category_ids(&record) => {
            report.add(ConversionIssue::warning(
                ConversionIssueCode::SparseCategoryIds,
                "category ids are not 1..=N; class ids follow category_id - 1 \
                 (use the ordinal mapping to renumber)",
            ));
        }
        CategoryMapping::Offset => {}
        CategoryMapping::Ordinal => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::OrdinalCategoryMapping,
                "class ids assigned by rank of sorted category id",
            ));
        }
    }
    let crowd = record.annotations.iter().filter(|a| a.iscrowd != 0).count();
    if crowd > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropCocoAnnotationFields,
            format!("iscrowd flag of {crowd} annotation(s) has no YOLO field"),
        ));
    }
    add_precision_note(&mut report, &options.yolo);

    log::info!(
        "converted {} COCO annotation(s) from {} to YOLO {}",
        record.annotations.len(),
        input.display(),
        output.display()
    );
    Ok(report)
}

/// Converts a Pascal VOC XML file to a YOLO label file.
pub fn pascal_voc_to_yolo(
    input: &Path,
    classes: &ClassTable,
    output: &Path,
    options: &VocToYoloOptions,
) -> Result<ConversionReport, BoxconvError> {
    let document = read_voc_xml(input, options.empty)?;
    let rows = tree_to_normalized(&document, classes).map_err(|e| e.at_path(input))?;
    write_yolo_txt(output, &rows, &options.yolo)?;

    let mut report = ConversionReport::new("voc", "yolo");
    report.input = voc_counts(&document);
    report.output = yolo_counts(&rows);

    add_dropped_object_fields(&mut report, &document, "YOLO");
    add_precision_note(&mut report, &options.yolo);

    log::info!(
        "converted {} VOC object(s) from {} to YOLO {}",
        document.objects.len(),
        input.display(),
        output.display()
    );
    Ok(report)
}

fn yolo_counts(rows: &[YoloRow]) -> ConversionCounts {
    ConversionCounts {
        images: 1,
        categories: rows
            .iter()
            .map(|row| row.class_id)
            .collect::<BTreeSet<_>>()
            .len(),
        boxes: rows.len(),
    }
}

fn voc_counts(document: &VocDocument) -> ConversionCounts {
    ConversionCounts {
        images: 1,
        categories: document
            .objects
            .iter()
            .map(|object| object.name.as_str())
            .collect::<BTreeSet<_>>()
            .len(),
        boxes: document.objects.len(),
    }
}

fn coco_counts(record: &DatasetRecord) -> ConversionCounts {
    ConversionCounts {
        images: record.images.len(),
        categories: record.categories.len(),
        boxes: record.annotations.len(),
    }
}

// Larger than the rounding noise of `c * W`, smaller than any real fraction.
const CORNER_EPSILON: f64 = 1e-9;

fn has_fractional_corner(row: &YoloRow, image_width: u32, image_height: u32) -> bool {
    let (w, h) = (image_width as f64, image_height as f64);
    let b = &row.bbox;
    let half_w = b.w * w / 2.0;
    let half_h = b.h * h / 2.0;
    [
        b.cx * w - half_w,
        b.cy * h - half_h,
        b.cx * w + half_w,
        b.cy * h + half_h,
    ]
    .iter()
    .any(|corner| (corner - corner.trunc()).abs() > CORNER_EPSILON)
}

fn has_dense_category_ids(record: &DatasetRecord) -> bool {
    let ids: BTreeSet<CategoryId> = record.categories.iter().map(|c| c.id).collect();
    ids.len() == record.categories.len()
        && ids
            .iter()
            .zip(1u64..)
            .all(|(id, expected)| id.as_u64() == expected)
}

fn add_dropped_object_fields(report: &mut ConversionReport, document: &VocDocument, target: &str) {
    let placeholder = VocObjectDefaults::default();
    let informative = document
        .objects
        .iter()
        .filter(|object| {
            object.pose.as_deref().is_some_and(|p| p != placeholder.pose)
                || object.truncated.is_some_and(|t| t != placeholder.truncated)
                || object.difficult.is_some_and(|d| d != placeholder.difficult)
        })
        .count();
    if informative > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropVocObjectFields,
            format!(
                "pose/truncated/difficult of {informative} object(s) have no {target} field"
            ),
        ));
    }
}

fn add_precision_note(report: &mut ConversionReport, options: &YoloWriteOptions) {
    if let Some(precision) = options.precision {
        report.add(ConversionIssue::info(
            ConversionIssueCode::FixedPrecision,
            format!("coordinates written with {precision} decimal place(s)"),
        ));
    }
}
