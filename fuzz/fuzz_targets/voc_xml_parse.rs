//! Fuzz target for VOC XML parsing and the VOC -> YOLO/COCO transforms.
//!
//! Run with:
//!   cargo +nightly fuzz run voc_xml_parse

#![no_main]

use boxconv::conversion::{tree_to_dataset, tree_to_normalized};
use boxconv::ir::io_coco_json::CocoWriteOptions;
use boxconv::ir::io_voc_xml::from_voc_xml_slice;
use boxconv::ir::{ClassTable, EmptyPolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(document) = from_voc_xml_slice(data, EmptyPolicy::Allow) else {
        return;
    };

    // Every name the tree uses, in first-seen order.
    let mut names: Vec<&str> = Vec::new();
    for object in &document.objects {
        if !names.contains(&object.name.as_str()) {
            names.push(&object.name);
        }
    }
    let Ok(classes) = ClassTable::new(names) else {
        return;
    };

    let _ = tree_to_normalized(&document, &classes);
    let _ = tree_to_dataset(&document, &classes, &CocoWriteOptions::default());
});
