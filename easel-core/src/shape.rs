//! Shape records - the building blocks of a document.
//!
//! Field names serialize in camelCase so project files stay compatible with
//! the editor front end.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default placement for shapes inserted from panels.
const INSERT_X: f64 = 100.0;
const INSERT_Y: f64 = 100.0;

/// Unique identifier for a shape.
///
/// New shapes get a UUID v4; loaded projects may contain any string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(String);

impl ShapeId {
    /// Create a new unique shape ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShapeId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for ShapeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ShapeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for ShapeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The type of a shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    /// Rectangle.
    Rect,
    /// Circle.
    Circle,
    /// Text label.
    Text,
    /// Raster or vector image referenced by URL.
    Image,
}

impl ShapeKind {
    /// Lowercase name as used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rect => "rect",
            Self::Circle => "circle",
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Fill color given to freshly inserted shapes of this kind.
    #[must_use]
    pub fn default_fill(self) -> Option<&'static str> {
        match self {
            Self::Rect => Some("#ff0000"),
            Self::Circle => Some("#00ff00"),
            Self::Text => Some("#000000"),
            Self::Image => None,
        }
    }
}

/// Where an inserted image came from. Determines its initial size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Icon search result.
    Icon,
    /// Photo search result.
    Photo,
    /// AI generated image.
    Generated,
}

impl ImageSource {
    /// Initial `(width, height)` for an image from this source.
    #[must_use]
    pub fn initial_size(self) -> (f64, f64) {
        match self {
            Self::Icon => (100.0, 100.0),
            Self::Photo => (400.0, 300.0),
            Self::Generated => (512.0, 512.0),
        }
    }
}

/// A shape record as stored in documents and project files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shape {
    /// Unique identifier.
    pub id: ShapeId,
    /// Shape type.
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// X position (pixels from left).
    pub x: f64,
    /// Y position (pixels from top).
    pub y: f64,
    /// Width in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Height in pixels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// Stroke color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// Text content (text shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Font size in pixels (text shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// Image URL (image shapes).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// Rotation in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}

impl Shape {
    /// Create a bare shape of the given kind at a position.
    #[must_use]
    pub fn new(kind: ShapeKind, x: f64, y: f64) -> Self {
        Self {
            id: ShapeId::new(),
            kind,
            x,
            y,
            width: None,
            height: None,
            fill: None,
            stroke: None,
            text: None,
            font_size: None,
            src: None,
            rotation: None,
        }
    }

    /// Create a toolbar shape with the editor's insertion defaults.
    ///
    /// 100x100 at (100, 100), kind-specific fill, font size 24 and the
    /// placeholder text "Hello" for text shapes.
    #[must_use]
    pub fn inserted(kind: ShapeKind) -> Self {
        let mut shape = Self::new(kind, INSERT_X, INSERT_Y).with_size(100.0, 100.0);
        shape.fill = kind.default_fill().map(str::to_string);
        shape.font_size = Some(24.0);
        if kind == ShapeKind::Text {
            shape.text = Some("Hello".to_string());
        }
        shape
    }

    /// Create an image shape for a search or generation result.
    #[must_use]
    pub fn image(src: impl Into<String>, source: ImageSource) -> Self {
        let (width, height) = source.initial_size();
        let mut shape = Self::new(ShapeKind::Image, INSERT_X, INSERT_Y).with_size(width, height);
        shape.src = Some(src.into());
        shape
    }

    /// Set width and height.
    #[must_use]
    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    /// Label shown in the layer list: the text content, or the type name.
    #[must_use]
    pub fn label(&self) -> &str {
        match self.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => self.kind.as_str(),
        }
    }

    /// Merge the fields present in `patch` into this shape.
    ///
    /// The ID is never changed by a patch.
    pub fn apply(&mut self, patch: ShapePatch) {
        let ShapePatch {
            kind,
            x,
            y,
            width,
            height,
            fill,
            stroke,
            text,
            font_size,
            src,
            rotation,
        } = patch;

        if let Some(kind) = kind {
            self.kind = kind;
        }
        if let Some(x) = x {
            self.x = x;
        }
        if let Some(y) = y {
            self.y = y;
        }
        merge(&mut self.width, width);
        merge(&mut self.height, height);
        merge(&mut self.fill, fill);
        merge(&mut self.stroke, stroke);
        merge(&mut self.text, text);
        merge(&mut self.font_size, font_size);
        merge(&mut self.src, src);
        merge(&mut self.rotation, rotation);
    }
}

fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

/// Partial update for a shape. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapePatch {
    /// New shape type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ShapeKind>,
    /// New X position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// New Y position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// New width.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// New height.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// New fill color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    /// New stroke color.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    /// New text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// New font size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f64>,
    /// New image URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    /// New rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f64>,
}
