//! Conversion report types for tracking lossiness and policy decisions.
//!
//! Every file-level conversion returns a [`ConversionReport`] next to the
//! file it wrote. Warnings mark information the target format could not
//! carry; info notes record defaults the converter filled in.

use serde::Serialize;
use std::fmt;

/// A report generated during format conversion.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ConversionReport {
    /// Source format name.
    pub from: String,
    /// Target format name.
    pub to: String,
    /// Counts from the decoded input.
    pub input: ConversionCounts,
    /// Counts in the written output.
    pub output: ConversionCounts,
    /// Issues discovered during conversion.
    pub issues: Vec<ConversionIssue>,
}

impl ConversionReport {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            ..Default::default()
        }
    }

    pub fn add(&mut self, issue: ConversionIssue) {
        self.issues.push(issue);
    }

    /// Count of warning-level issues (true lossiness).
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Warning)
            .count()
    }

    /// Count of info-level issues (policy decisions, notes).
    pub fn info_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == ConversionSeverity::Info)
            .count()
    }

    /// Returns true if any warning-level issue was recorded.
    pub fn is_lossy(&self) -> bool {
        self.warning_count() > 0
    }

    /// Returns true if an issue with `code` was recorded.
    pub fn has(&self, code: ConversionIssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ConversionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} -> {}", self.from, self.to)?;
        writeln!(
            f,
            "  {} image(s), {} categories, {} box(es)",
            self.input.images, self.input.categories, self.input.boxes
        )?;

        if self.output != self.input {
            writeln!(
                f,
                "  output: {} image(s), {} categories, {} box(es)",
                self.output.images, self.output.categories, self.output.boxes
            )?;
        }

        let warnings = self.warning_count();
        if warnings > 0 {
            writeln!(f)?;
            writeln!(f, "Warnings ({}):", warnings)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Warning)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        let infos = self.info_count();
        if infos > 0 {
            writeln!(f)?;
            writeln!(f, "Notes ({}):", infos)?;
            for issue in self
                .issues
                .iter()
                .filter(|i| i.severity == ConversionSeverity::Info)
            {
                writeln!(f, "  - {}", issue.message)?;
            }
        }

        Ok(())
    }
}

/// Element counts on one side of a conversion.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ConversionCounts {
    pub images: usize,
    /// Distinct classes referenced (YOLO, VOC) or listed (COCO).
    pub categories: usize,
    pub boxes: usize,
}

/// A single issue discovered during conversion.
#[derive(Clone, Debug, Serialize)]
pub struct ConversionIssue {
    pub severity: ConversionSeverity,
    pub code: ConversionIssueCode,
    pub message: String,
}

impl ConversionIssue {
    pub fn warning(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Warning,
            code,
            message: message.into(),
        }
    }

    pub fn info(code: ConversionIssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: ConversionSeverity::Info,
            code,
            message: message.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionSeverity {
    /// Information in the input has no place in the output.
    Warning,
    /// A default or policy the converter applied.
    Info,
}

/// Stable issue codes for programmatic consumption.
///
/// These codes are part of the JSON report and should remain stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionIssueCode {
    // YOLO -> VOC
    /// Normalized coordinates were truncated to integer pixel corners.
    PixelTruncation,
    /// `pose`/`truncated`/`difficult` were filled with placeholder values.
    PlaceholderObjectFields,
    /// No `<filename>` was given, so the tree cannot feed a COCO record.
    MissingFileName,

    // VOC -> COCO
    /// Per-object `pose`/`truncated`/`difficult` have no COCO field.
    DropVocObjectFields,
    /// Image `depth` has no COCO field.
    DropImageDepth,
    /// Categories were emitted for classes this image does not use.
    UnusedCategories,
    /// The record's single image id came from the caller, not the input.
    FixedImageId,

    // COCO -> YOLO
    /// Explicit dimensions differ from the image record's own size.
    DimensionMismatch,
    /// Annotations of several images were merged into one label file.
    MergedImages,
    /// Category ids are not the dense `1..=N` range the offset mapping assumes.
    SparseCategoryIds,
    /// Class ids were assigned by rank of sorted category id.
    OrdinalCategoryMapping,
    /// `iscrowd`, `area` and annotation ids have no YOLO field.
    DropCocoAnnotationFields,

    // Any -> YOLO
    /// Coordinates were written with a fixed number of decimals.
    FixedPrecision,
}
