use crate::math::{Point3F, Transform};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransformOperation {
    Translate { x: f32, y: f32, z: f32 },
    Scale { x: f32, y: f32, z: f32 },
    Rotate { axis: Point3F, degrees: f32 },
    Skew { x_degrees: f32, y_degrees: f32 },
    Perspective { depth: f32 },
    Matrix(Transform),
}

/// Ordered list of transform functions; the first operation is outermost.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TransformOperations {
    operations: Vec<TransformOperation>,
}

impl TransformOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, operation: TransformOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn push(&mut self, operation: TransformOperation) {
        self.operations.push(operation);
    }

    pub fn operations(&self) -> &[TransformOperation] {
        &self.operations
    }

    pub fn is_translation(&self) -> bool {
        self.operations
            .iter()
            .all(|operation| matches!(operation, TransformOperation::Translate { .. }))
    }

    pub fn is_translate_or_scale(&self) -> bool {
        self.operations.iter().all(|operation| {
            matches!(
                operation,
                TransformOperation::Translate { .. } | TransformOperation::Scale { .. }
            )
        })
    }

    /// Largest 2D scale these operations produce, or `None` when they include
    /// anything besides translation and scale.
    pub fn maximum_scale(&self) -> Option<f32> {
        if !self.is_translate_or_scale() {
            return None;
        }
        let mut x_scale = 1.0_f32;
        let mut y_scale = 1.0_f32;
        for operation in &self.operations {
            if let TransformOperation::Scale { x, y, .. } = operation {
                x_scale *= x.abs();
                y_scale *= y.abs();
            }
        }
        Some(x_scale.max(y_scale))
    }
}
