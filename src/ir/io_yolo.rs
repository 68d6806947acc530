//! YOLO label-file reader and writer.
//!
//! One box per line: `class_id x_center y_center width height`, the four
//! geometry fields normalized to the image width/height the caller
//! supplies. Files on disk carry no image size, so decoding to pixels
//! always needs it passed in.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::model::{EmptyPolicy, LabeledBox};
use super::{ClassId, NormalizedBox};
use crate::error::BoxconvError;

const MEMORY_PATH: &str = "<memory>";

/// One parsed YOLO label line.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct YoloRow {
    pub class_id: ClassId,
    pub bbox: NormalizedBox,
}

impl YoloRow {
    pub fn new(class_id: ClassId, bbox: NormalizedBox) -> Self {
        Self { class_id, bbox }
    }
}

/// Options for [`emit_normalized`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloWriteOptions {
    /// Fixed number of decimals for the coordinate fields. `None` writes the
    /// shortest representation that round-trips (`0.5`, `0.2`).
    pub precision: Option<usize>,
}

/// Reads and parses a YOLO label file.
pub fn read_yolo_txt(path: &Path, empty: EmptyPolicy) -> Result<Vec<YoloRow>, BoxconvError> {
    let content = fs::read_to_string(path).map_err(BoxconvError::Io)?;
    let rows = parse_yolo_str(&content, path, empty)?;
    log::debug!("parsed {} YOLO row(s) from {}", rows.len(), path.display());
    Ok(rows)
}

/// Parses YOLO label text held in memory.
pub fn from_yolo_str(text: &str, empty: EmptyPolicy) -> Result<Vec<YoloRow>, BoxconvError> {
    parse_yolo_str(text, Path::new(MEMORY_PATH), empty)
}

/// Parses label text and converts every row to pixel corners.
///
/// This is the full normalized -> absolute decode: the class id is kept
/// as given (0-based) and corners are truncated as described on
/// [`NormalizedBox::to_pixel`].
pub fn parse_normalized(
    text: &str,
    image_width: u32,
    image_height: u32,
    empty: EmptyPolicy,
) -> Result<Vec<LabeledBox<ClassId>>, BoxconvError> {
    let rows = from_yolo_str(text, empty)?;
    Ok(decode_normalized(&rows, image_width, image_height))
}

/// Converts parsed rows to pixel-space boxes for an image of the given size.
pub fn decode_normalized(
    rows: &[YoloRow],
    image_width: u32,
    image_height: u32,
) -> Vec<LabeledBox<ClassId>> {
    rows.iter()
        .map(|row| {
            LabeledBox::new(
                row.class_id,
                row.bbox.to_pixel(image_width as f64, image_height as f64),
            )
        })
        .collect()
}

/// Encodes rows as label text: one line per row joined by `\n`, with no
/// trailing newline. Coordinates are written as given, without any
/// bounds check.
pub fn emit_normalized(rows: &[YoloRow], options: &YoloWriteOptions) -> String {
    let mut out = String::new();
    for (idx, row) in rows.iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        let b = &row.bbox;
        // Writing to a String cannot fail.
        let _ = match options.precision {
            Some(p) => write!(
                out,
                "{} {:.p$} {:.p$} {:.p$} {:.p$}",
                row.class_id, b.cx, b.cy, b.w, b.h
            ),
            None => write!(out, "{} {} {} {} {}", row.class_id, b.cx, b.cy, b.w, b.h),
        };
    }
    out
}

/// Writes rows to a YOLO label file.
pub fn write_yolo_txt(
    path: &Path,
    rows: &[YoloRow],
    options: &YoloWriteOptions,
) -> Result<(), BoxconvError> {
    fs::write(path, emit_normalized(rows, options)).map_err(BoxconvError::Io)
}

fn parse_yolo_str(
    text: &str,
    path: &Path,
    empty: EmptyPolicy,
) -> Result<Vec<YoloRow>, BoxconvError> {
    let mut rows = Vec::new();
    for (line_idx, line) in text.lines().enumerate() {
        if let Some(row) = parse_label_line(line, path, line_idx + 1)? {
            rows.push(row);
        }
    }

    if rows.is_empty() && empty == EmptyPolicy::Reject {
        return Err(BoxconvError::EmptyInput {
            path: path.to_path_buf(),
        });
    }
    Ok(rows)
}

fn parse_label_line(
    line: &str,
    path: &Path,
    line_num: usize,
) -> Result<Option<YoloRow>, BoxconvError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // At most 6 tokens: enough to tell "too many" apart without allocating
    // for arbitrarily long lines.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() != 5 {
        let message = if tokens.len() > 5 {
            "expected 5 tokens, found more; segmentation and pose rows are not supported"
                .to_string()
        } else {
            format!("expected 5 tokens, found {}", tokens.len())
        };
        return Err(BoxconvError::MalformedLine {
            path: path.to_path_buf(),
            line: line_num,
            message,
        });
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| BoxconvError::MalformedLine {
            path: path.to_path_buf(),
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;

    let cx = parse_f64_token(tokens[1], "x_center", path, line_num)?;
    let cy = parse_f64_token(tokens[2], "y_center", path, line_num)?;
    let w = parse_f64_token(tokens[3], "width", path, line_num)?;
    let h = parse_f64_token(tokens[4], "height", path, line_num)?;

    Ok(Some(YoloRow::new(
        ClassId::new(class_id),
        NormalizedBox::new(cx, cy, w, h),
    )))
}

/// Fuzz-only entrypoint for YOLO single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), BoxconvError> {
    let _ = parse_label_line(input, Path::new("<fuzz>"), 1)?;
    Ok(())
}

fn parse_f64_token(
    raw: &str,
    field_name: &str,
    path: &Path,
    line_num: usize,
) -> Result<f64, BoxconvError> {
    raw.parse::<f64>().map_err(|_| BoxconvError::MalformedLine {
        path: path.to_path_buf(),
        line: line_num,
        message: format!("invalid {field_name} '{raw}'; expected floating-point number"),
    })
}
