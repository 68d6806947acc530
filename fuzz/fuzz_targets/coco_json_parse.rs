//! Fuzz target for COCO JSON parsing and the COCO -> YOLO transform.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse
//!
//! Or with a corpus:
//!   cargo +nightly fuzz run coco_json_parse fuzz/corpus/coco_json_parse/

#![no_main]

use boxconv::conversion::{dataset_to_normalized, CategoryMapping, DimensionSource};
use boxconv::ir::io_coco_json::from_coco_slice;
use boxconv::ir::EmptyPolicy;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(record) = from_coco_slice(data, EmptyPolicy::Allow) else {
        return;
    };

    for mapping in [CategoryMapping::Offset, CategoryMapping::Ordinal] {
        let _ = dataset_to_normalized(&record, DimensionSource::FromRecord, mapping);
        let _ = dataset_to_normalized(
            &record,
            DimensionSource::Explicit {
                width: 640,
                height: 480,
            },
            mapping,
        );
    }
});
