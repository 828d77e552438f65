mod keyframes;
mod transform_operations;
pub use keyframes::*;
pub use transform_operations::*;

use crate::layer::FilterOperations;

pub type TransformAnimation = KeyframeAnimation<TransformOperations>;
pub type OpacityAnimation = KeyframeAnimation<f32>;
pub type FilterAnimation = KeyframeAnimation<FilterOperations>;

impl TransformAnimation {
    /// False when every keyframe is a pure translation.
    pub fn affects_scale(&self) -> bool {
        !self
            .keyframes()
            .iter()
            .all(|keyframe| keyframe.value.is_translation())
    }

    pub fn is_translation(&self) -> bool {
        !self.affects_scale()
    }

    /// Largest 2D scale reached over all keyframes, or `None` when any
    /// keyframe uses rotation, skew, perspective or a raw matrix.
    pub fn maximum_scale(&self) -> Option<f32> {
        let mut maximum = 0.0_f32;
        for keyframe in self.keyframes() {
            maximum = maximum.max(keyframe.value.maximum_scale()?);
        }
        Some(maximum)
    }
}
