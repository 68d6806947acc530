//! Pascal VOC XML reader and writer for a single image.
//!
//! ```text
//! annotation
//! ├── filename          (optional on read, written when known)
//! ├── size { width, height, depth }
//! └── object*  { name, pose, truncated, difficult, bndbox { xmin, ymin, xmax, ymax } }
//! ```
//!
//! Corners are integer pixels. `pose`, `truncated` and `difficult` are not
//! derived from anything when a tree is built; they are filled from
//! [`VocObjectDefaults`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use serde::{Deserialize, Serialize};

use super::model::{EmptyPolicy, ImageMeta, LabeledBox, DEFAULT_IMAGE_DEPTH};
use super::PixelBox;
use crate::error::BoxconvError;

const MEMORY_PATH: &str = "<memory>";

/// A decoded (or freshly built) VOC annotation tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocDocument {
    pub image: ImageMeta,
    pub objects: Vec<VocObject>,
}

/// One `<object>` node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocObject {
    pub name: String,
    pub pose: Option<String>,
    pub truncated: Option<u8>,
    pub difficult: Option<u8>,
    pub bbox: PixelBox,
}

impl VocDocument {
    /// The objects as class-name labeled boxes.
    pub fn labeled_boxes(&self) -> Vec<LabeledBox<String>> {
        self.objects
            .iter()
            .map(|object| LabeledBox::new(object.name.clone(), object.bbox))
            .collect()
    }
}

/// Placeholder values written into every `<object>` by [`build_tree`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VocObjectDefaults {
    /// Defaults to `"Unspecified"`.
    pub pose: String,
    /// Defaults to `0`.
    pub truncated: u8,
    /// Defaults to `0`.
    pub difficult: u8,
}

impl Default for VocObjectDefaults {
    fn default() -> Self {
        Self {
            pose: "Unspecified".to_string(),
            truncated: 0,
            difficult: 0,
        }
    }
}

/// Builds a tree for one image from class-name labeled boxes.
///
/// The box order is kept, so N boxes give exactly N `<object>` nodes.
pub fn build_tree(
    image: &ImageMeta,
    boxes: &[LabeledBox<String>],
    defaults: &VocObjectDefaults,
) -> VocDocument {
    let objects = boxes
        .iter()
        .map(|labeled| VocObject {
            name: labeled.label.clone(),
            pose: Some(defaults.pose.clone()),
            truncated: Some(defaults.truncated),
            difficult: Some(defaults.difficult),
            bbox: labeled.bbox,
        })
        .collect();

    VocDocument {
        image: image.clone(),
        objects,
    }
}

/// Reads and parses a VOC XML file.
pub fn read_voc_xml(path: &Path, empty: EmptyPolicy) -> Result<VocDocument, BoxconvError> {
    let xml = fs::read_to_string(path).map_err(BoxconvError::Io)?;
    let document = parse_voc_xml_str(&xml, path, empty)?;
    log::debug!(
        "parsed VOC tree with {} object(s) from {}",
        document.objects.len(),
        path.display()
    );
    Ok(document)
}

/// Parses VOC XML held in memory.
pub fn from_voc_xml_str(xml: &str, empty: EmptyPolicy) -> Result<VocDocument, BoxconvError> {
    parse_voc_xml_str(xml, Path::new(MEMORY_PATH), empty)
}

/// Parses VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8], empty: EmptyPolicy) -> Result<VocDocument, BoxconvError> {
    let xml = std::str::from_utf8(bytes).map_err(|_| BoxconvError::InvalidField {
        path: PathBuf::from(MEMORY_PATH),
        field: "document".to_string(),
        value: "<non-UTF-8 bytes>".to_string(),
        context: "input".to_string(),
        expected: "UTF-8 text",
    })?;
    from_voc_xml_str(xml, empty)
}

/// Serializes a tree as an XML document.
pub fn to_voc_xml_string(document: &VocDocument) -> String {
    VocXml(document).to_string()
}

/// Writes a tree to `path`.
pub fn write_voc_xml(path: &Path, document: &VocDocument) -> Result<(), BoxconvError> {
    fs::write(path, to_voc_xml_string(document)).map_err(BoxconvError::Io)
}

fn parse_voc_xml_str(
    xml: &str,
    path: &Path,
    empty: EmptyPolicy,
) -> Result<VocDocument, BoxconvError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| BoxconvError::XmlParse {
        path: path.to_path_buf(),
        source,
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(missing(path, "<annotation>", "document root"));
    }

    let file_name = optional_child_text(annotation, "filename");

    let size = child_element(annotation, "size")
        .ok_or_else(|| missing(path, "<size>", "<annotation>"))?;
    let width = parse_required::<u32>(size, "width", path, "<size>", "u32")?;
    let height = parse_required::<u32>(size, "height", path, "<size>", "u32")?;
    let depth = parse_optional::<u32>(size, "depth", path, "<size>", "u32")?
        .unwrap_or(DEFAULT_IMAGE_DEPTH);

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name = optional_child_text(object, "name")
            .ok_or_else(|| missing(path, "<name>", "<object>"))?;
        let bndbox = child_element(object, "bndbox")
            .ok_or_else(|| missing(path, "<bndbox>", "<object>"))?;

        let xmin = parse_required::<i64>(bndbox, "xmin", path, "<bndbox>", "integer")?;
        let ymin = parse_required::<i64>(bndbox, "ymin", path, "<bndbox>", "integer")?;
        let xmax = parse_required::<i64>(bndbox, "xmax", path, "<bndbox>", "integer")?;
        let ymax = parse_required::<i64>(bndbox, "ymax", path, "<bndbox>", "integer")?;

        objects.push(VocObject {
            name,
            pose: optional_child_text(object, "pose"),
            truncated: parse_optional::<u8>(object, "truncated", path, "<object>", "0 or 1")?,
            difficult: parse_optional::<u8>(object, "difficult", path, "<object>", "0 or 1")?,
            bbox: PixelBox::from_xyxy(xmin, ymin, xmax, ymax),
        });
    }

    if objects.is_empty() && empty == EmptyPolicy::Reject {
        return Err(BoxconvError::EmptyInput {
            path: path.to_path_buf(),
        });
    }

    Ok(VocDocument {
        image: ImageMeta {
            width,
            height,
            depth,
            file_name,
        },
        objects,
    })
}

fn missing(path: &Path, field: &str, context: &str) -> BoxconvError {
    BoxconvError::MissingField {
        path: path.to_path_buf(),
        field: field.to_string(),
        context: context.to_string(),
    }
}

fn parse_required<T: std::str::FromStr>(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
    expected: &'static str,
) -> Result<T, BoxconvError> {
    parse_optional(node, tag, path, context, expected)?
        .ok_or_else(|| missing(path, &format!("<{tag}>"), context))
}

fn parse_optional<T: std::str::FromStr>(
    node: Node<'_, '_>,
    tag: &str,
    path: &Path,
    context: &str,
    expected: &'static str,
) -> Result<Option<T>, BoxconvError> {
    optional_child_text(node, tag)
        .map(|raw| {
            raw.parse::<T>().map_err(|_| BoxconvError::InvalidField {
                path: path.to_path_buf(),
                field: format!("<{tag}>"),
                value: raw.clone(),
                context: context.to_string(),
                expected,
            })
        })
        .transpose()
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

struct VocXml<'a>(&'a VocDocument);

impl fmt::Display for VocXml<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let VocXml(document) = self;
        let image = &document.image;

        writeln!(f, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
        writeln!(f, "<annotation>")?;
        if let Some(file_name) = &image.file_name {
            writeln!(f, "  <filename>{}</filename>", xml_escape(file_name))?;
        }
        writeln!(f, "  <size>")?;
        writeln!(f, "    <width>{}</width>", image.width)?;
        writeln!(f, "    <height>{}</height>", image.height)?;
        writeln!(f, "    <depth>{}</depth>", image.depth)?;
        writeln!(f, "  </size>")?;

        for object in &document.objects {
            writeln!(f, "  <object>")?;
            writeln!(f, "    <name>{}</name>", xml_escape(&object.name))?;
            if let Some(pose) = &object.pose {
                writeln!(f, "    <pose>{}</pose>", xml_escape(pose))?;
            }
            if let Some(truncated) = object.truncated {
                writeln!(f, "    <truncated>{truncated}</truncated>")?;
            }
            if let Some(difficult) = object.difficult {
                writeln!(f, "    <difficult>{difficult}</difficult>")?;
            }
            writeln!(f, "    <bndbox>")?;
            writeln!(f, "      <xmin>{}</xmin>", object.bbox.xmin)?;
            writeln!(f, "      <ymin>{}</ymin>", object.bbox.ymin)?;
            writeln!(f, "      <xmax>{}</xmax>", object.bbox.xmax)?;
            writeln!(f, "      <ymax>{}</ymax>", object.bbox.ymax)?;
            writeln!(f, "    </bndbox>")?;
            writeln!(f, "  </object>")?;
        }

        writeln!(f, "</annotation>")
    }
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
