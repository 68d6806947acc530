//! Value types and codecs for the three annotation formats.
//!
//! Each `io_*` module decodes one wire format into plain Rust values and
//! encodes those values back. The codecs never depend on each other; the
//! [`conversion`](crate::conversion) module composes them.
//!
//! # Coordinate shapes
//!
//! | Type              | Form                         | Used by |
//! |-------------------|------------------------------|---------|
//! | [`NormalizedBox`] | center + size, fractions     | YOLO    |
//! | [`PixelBox`]      | two corners, integer pixels  | VOC, pivot |
//! | `[x, y, w, h]`    | corner + size, pixels        | COCO    |
//!
//! # Example
//!
//! ```
//! use boxconv::ir::{ClassTable, EmptyPolicy, PixelBox};
//! use boxconv::ir::io_yolo::parse_normalized;
//!
//! let classes = ClassTable::new(["cat"]).unwrap();
//! let boxes = parse_normalized("0 0.5 0.5 0.2 0.4", 100, 100, EmptyPolicy::Reject).unwrap();
//!
//! assert_eq!(classes.name_of(boxes[0].label), Some("cat"));
//! assert_eq!(boxes[0].bbox, PixelBox::from_xyxy(40, 30, 60, 70));
//! ```

mod bbox;
mod class_table;
mod ids;
pub mod io_coco_json;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;

pub use bbox::{NormalizedBox, PixelBox};
pub use class_table::ClassTable;
pub use ids::{AnnotationId, CategoryId, ClassId, ImageId};
pub use model::{EmptyPolicy, ImageMeta, LabeledBox, DEFAULT_IMAGE_DEPTH};
