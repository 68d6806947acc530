#![allow(dead_code)]

use boxconv::ir::io_yolo::YoloRow;
use boxconv::ir::{ClassId, ClassTable, NormalizedBox, PixelBox};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// Corner drift allowed after a pixel -> normalized -> pixel trip.
pub const TRUNCATION_SLACK_PX: i64 = 1;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

pub fn arb_image_dims() -> BoxedStrategy<(u32, u32)> {
    (1u32..=4096, 1u32..=4096).boxed()
}

/// An ordered integer box inside a `width` x `height` image.
pub fn arb_pixel_box(width: u32, height: u32) -> BoxedStrategy<PixelBox> {
    let (w, h) = (width as i64, height as i64);
    (0..=w, 0..=w, 0..=h, 0..=h)
        .prop_map(|(x1, x2, y1, y2)| {
            PixelBox::from_xyxy(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2))
        })
        .boxed()
}

/// Image dims plus up to `max_boxes` boxes inside it.
pub fn arb_image_with_boxes(max_boxes: usize) -> BoxedStrategy<((u32, u32), Vec<PixelBox>)> {
    arb_image_dims()
        .prop_flat_map(move |(w, h)| {
            (
                Just((w, h)),
                prop::collection::vec(arb_pixel_box(w, h), 0..=max_boxes),
            )
        })
        .boxed()
}

/// Distinct class names, including characters that need XML escaping.
pub fn arb_class_table(max_classes: usize) -> BoxedStrategy<ClassTable> {
    prop::collection::btree_set("[a-z][a-z0-9_&<>'\"]{0,10}", 1..=max_classes)
        .prop_map(|names| ClassTable::new(names).expect("distinct non-empty names"))
        .boxed()
}

/// A class table plus YOLO rows whose class ids all fall inside it.
pub fn arb_rows_for_table(
    max_classes: usize,
    max_rows: usize,
) -> BoxedStrategy<(ClassTable, Vec<YoloRow>)> {
    arb_class_table(max_classes)
        .prop_flat_map(move |classes| {
            let class_count = classes.len();
            let row = (
                0..class_count,
                0.0f64..=1.0,
                0.0f64..=1.0,
                0.0f64..=1.0,
                0.0f64..=1.0,
            )
                .prop_map(|(class_id, cx, cy, w, h)| {
                    YoloRow::new(ClassId::new(class_id), NormalizedBox::new(cx, cy, w, h))
                });
            (Just(classes), prop::collection::vec(row, 1..=max_rows))
        })
        .boxed()
}

pub fn corners_within(a: &PixelBox, b: &PixelBox, slack: i64) -> bool {
    (a.xmin - b.xmin).abs() <= slack
        && (a.ymin - b.ymin).abs() <= slack
        && (a.xmax - b.xmax).abs() <= slack
        && (a.ymax - b.ymax).abs() <= slack
}
