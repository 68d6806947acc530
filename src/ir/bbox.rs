//! Bounding box geometry shared by the codecs.
//!
//! [`PixelBox`] is the pivot between formats: integer pixel corners
//! (XYXY), the shape VOC stores directly. [`NormalizedBox`] is the YOLO
//! center/size form expressed as fractions of the image dimensions.

use serde::{Deserialize, Serialize};

/// An axis-aligned box in absolute pixel corners (xmin, ymin, xmax, ymax).
///
/// Like the rest of the IR this does not enforce `min <= max`; boxes are
/// carried as given and [`PixelBox::is_ordered`] reports the invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl PixelBox {
    #[inline]
    pub fn from_xyxy(xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Width in pixels. Negative when the box is malformed.
    #[inline]
    pub fn width(&self) -> i64 {
        self.xmax.saturating_sub(self.xmin)
    }

    /// Height in pixels. Negative when the box is malformed.
    #[inline]
    pub fn height(&self) -> i64 {
        self.ymax.saturating_sub(self.ymin)
    }

    /// Saturates instead of overflowing for corners parsed from hostile input.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width().saturating_mul(self.height())
    }

    #[inline]
    pub fn is_ordered(&self) -> bool {
        self.xmin <= self.xmax && self.ymin <= self.ymax
    }

    /// Corner + dimensions form `[x, y, width, height]`, as COCO stores it.
    #[inline]
    pub fn to_xywh(&self) -> [i64; 4] {
        [self.xmin, self.ymin, self.width(), self.height()]
    }

    /// Normalized center/size form relative to an image of the given size.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> NormalizedBox {
        let [x, y, w, h] = self.to_xywh().map(|v| v as f64);
        NormalizedBox::from_xywh(x, y, w, h, image_width, image_height)
    }
}

/// A YOLO-style box: center and size as fractions of the image dimensions.
///
/// Values are conventionally in `[0, 1]` but nothing enforces it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedBox {
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
}

impl NormalizedBox {
    #[inline]
    pub fn new(cx: f64, cy: f64, w: f64, h: f64) -> Self {
        Self { cx, cy, w, h }
    }

    /// Builds a normalized box from an absolute `[x, y, width, height]` box.
    ///
    /// The inputs stay floating point so COCO files with sub-pixel boxes
    /// are normalized without loss.
    pub fn from_xywh(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        image_width: f64,
        image_height: f64,
    ) -> Self {
        Self {
            cx: (x + width / 2.0) / image_width,
            cy: (y + height / 2.0) / image_height,
            w: width / image_width,
            h: height / image_height,
        }
    }

    /// Converts to integer pixel corners.
    ///
    /// Each corner is `center ± span/2` truncated toward zero. Truncation
    /// (not rounding) means a pixel -> normalized -> pixel trip can land
    /// one pixel short on either corner.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> PixelBox {
        let x_center = self.cx * image_width;
        let y_center = self.cy * image_height;
        let width = self.w * image_width;
        let height = self.h * image_height;

        PixelBox {
            xmin: truncate(x_center - width / 2.0),
            ymin: truncate(y_center - height / 2.0),
            xmax: truncate(x_center + width / 2.0),
            ymax: truncate(y_center + height / 2.0),
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.cx.is_finite() && self.cy.is_finite() && self.w.is_finite() && self.h.is_finite()
    }
}

// `as` truncates toward zero and saturates out-of-range values (NaN -> 0).
#[inline]
fn truncate(value: f64) -> i64 {
    value as i64
}
