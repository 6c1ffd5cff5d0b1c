//! Editor document: ordered shapes, selection and stage transform.

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult, Shape, ShapeId, ShapePatch};

/// Stage (viewport) transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Zoom level (1.0 = 100%).
    pub scale: f64,
    /// Pan offset X.
    pub x: f64,
    /// Pan offset Y.
    pub y: f64,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            x: 0.0,
            y: 0.0,
        }
    }
}

/// The shapes being edited. Index 0 is the bottom layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    shapes: Vec<Shape>,
    selected: Option<ShapeId>,
    stage: StageConfig,
}

impl Document {
    /// Create an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a shape on top of the stack.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::DuplicateShape`] if a shape with the same ID exists.
    pub fn add_shape(&mut self, shape: Shape) -> CoreResult<ShapeId> {
        if self.index_of(&shape.id).is_some() {
            return Err(CoreError::DuplicateShape(shape.id.to_string()));
        }
        let id = shape.id.clone();
        tracing::debug!(shape_id = %id, kind = shape.kind.as_str(), "Adding shape");
        self.shapes.push(shape);
        Ok(id)
    }

    /// Merge a partial update into the shape with the given ID.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeNotFound`] if no shape has that ID.
    pub fn update_shape(&mut self, id: &ShapeId, patch: ShapePatch) -> CoreResult<&Shape> {
        let index = self
            .index_of(id)
            .ok_or_else(|| CoreError::ShapeNotFound(id.to_string()))?;
        let shape = &mut self.shapes[index];
        shape.apply(patch);
        Ok(&*shape)
    }

    /// Remove a shape, clearing the selection if it pointed at it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeNotFound`] if no shape has that ID.
    pub fn remove_shape(&mut self, id: &ShapeId) -> CoreResult<Shape> {
        let index = self
            .index_of(id)
            .ok_or_else(|| CoreError::ShapeNotFound(id.to_string()))?;
        if self.selected.as_ref() == Some(id) {
            self.selected = None;
        }
        Ok(self.shapes.remove(index))
    }

    /// Select a shape, or clear the selection with `None`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ShapeNotFound`] if the ID is not in the document.
    pub fn select_shape(&mut self, id: Option<ShapeId>) -> CoreResult<()> {
        if let Some(ref id) = id {
            if self.index_of(id).is_none() {
                return Err(CoreError::ShapeNotFound(id.to_string()));
            }
        }
        self.selected = id;
        Ok(())
    }

    /// Currently selected shape.
    #[must_use]
    pub fn selected(&self) -> Option<&Shape> {
        let id = self.selected.as_ref()?;
        self.get(id)
    }

    /// Replace all shapes, e.g. after loading a project.
    ///
    /// The selection is kept only if the selected shape is still present.
    pub fn set_shapes(&mut self, shapes: Vec<Shape>) {
        self.shapes = shapes;
        if let Some(id) = self.selected.clone() {
            if self.index_of(&id).is_none() {
                self.selected = None;
            }
        }
    }

    /// Move a layer from one stack position to another (0 = bottom).
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LayerOutOfRange`] if either index is out of range.
    pub fn move_layer(&mut self, from: usize, to: usize) -> CoreResult<()> {
        let len = self.shapes.len();
        if from >= len || to >= len {
            return Err(CoreError::LayerOutOfRange(from.max(to)));
        }
        let shape = self.shapes.remove(from);
        self.shapes.insert(to, shape);
        Ok(())
    }

    /// Set the stage transform.
    pub fn set_stage(&mut self, stage: StageConfig) {
        self.stage = stage;
    }

    /// Current stage transform.
    #[must_use]
    pub fn stage(&self) -> StageConfig {
        self.stage
    }

    /// Shapes bottom to top.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Shapes top to bottom, as shown in the layer list.
    pub fn layers(&self) -> impl Iterator<Item = &Shape> {
        self.shapes.iter().rev()
    }

    /// Look up a shape by ID.
    #[must_use]
    pub fn get(&self, id: &ShapeId) -> Option<&Shape> {
        self.shapes.iter().find(|s| &s.id == id)
    }

    /// Number of shapes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when the document has no shapes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    fn index_of(&self, id: &ShapeId) -> Option<usize> {
        self.shapes.iter().position(|s| &s.id == id)
    }
}
