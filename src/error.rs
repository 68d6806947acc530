use std::path::{Path, PathBuf};
use thiserror::Error;

/// The main error type for boxconv operations.
///
/// Every decode failure aborts the whole conversion; nothing is written
/// to the output path once one of these is returned.
#[derive(Debug, Error)]
pub enum BoxconvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed YOLO label at {}:{line}: {message}", .path.display())]
    MalformedLine {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Input {} contains no annotations", .path.display())]
    EmptyInput { path: PathBuf },

    #[error("Missing {field} in {context} ({})", .path.display())]
    MissingField {
        path: PathBuf,
        field: String,
        context: String,
    },

    #[error("Invalid {field} value '{value}' in {context} ({}); expected {expected}", .path.display())]
    InvalidField {
        path: PathBuf,
        field: String,
        value: String,
        context: String,
        expected: &'static str,
    },

    #[error("Class '{name}' in {} is not present in the class table", .path.display())]
    UnknownClass { path: PathBuf, name: String },

    #[error("Annotation {annotation_id} in {} references unknown category {category_id}", .path.display())]
    UnknownCategory {
        path: PathBuf,
        annotation_id: u64,
        category_id: u64,
    },

    #[error("class_id {class_id} in {} is out of range for a class table with {class_count} class(es)", .path.display())]
    IndexOutOfRange {
        path: PathBuf,
        class_id: usize,
        class_count: usize,
    },

    #[error("Invalid class table: {0}")]
    InvalidClassTable(String),

    #[error("Failed to parse class file {}: {source}", .path.display())]
    ClassFileParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse VOC XML from {}: {source}", .path.display())]
    XmlParse {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Failed to parse COCO JSON from {}: {source}", .path.display())]
    JsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write COCO JSON to {}: {source}", .path.display())]
    JsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl BoxconvError {
    /// Replaces the `<memory>` placeholder path of a converter error with
    /// the file the converted value was read from.
    pub(crate) fn at_path(self, file: &Path) -> Self {
        match self {
            Self::MissingField {
                path,
                field,
                context,
            } if is_memory(&path) => Self::MissingField {
                path: file.to_path_buf(),
                field,
                context,
            },
            Self::InvalidField {
                path,
                field,
                value,
                context,
                expected,
            } if is_memory(&path) => Self::InvalidField {
                path: file.to_path_buf(),
                field,
                value,
                context,
                expected,
            },
            Self::UnknownClass { path, name } if is_memory(&path) => Self::UnknownClass {
                path: file.to_path_buf(),
                name,
            },
            Self::UnknownCategory {
                path,
                annotation_id,
                category_id,
            } if is_memory(&path) => Self::UnknownCategory {
                path: file.to_path_buf(),
                annotation_id,
                category_id,
            },
            Self::IndexOutOfRange {
                path,
                class_id,
                class_count,
            } if is_memory(&path) => Self::IndexOutOfRange {
                path: file.to_path_buf(),
                class_id,
                class_count,
            },
            other => other,
        }
    }
}

fn is_memory(path: &Path) -> bool {
    path == Path::new("<memory>")
}
