use crate::math::RectF;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterOperation {
    Blur {
        radius: f32,
    },
    DropShadow {
        offset_x: f32,
        offset_y: f32,
        blur_radius: f32,
        spread: f32,
    },
    Opacity(f32),
    Brightness(f32),
    Contrast(f32),
    Grayscale(f32),
    Saturate(f32),
    Sepia(f32),
    Invert(f32),
    HueRotate {
        degrees: f32,
    },
}

/// Distances a filter chain can grow content on each side.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FilterOutsets {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl FilterOutsets {
    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.top == 0.0 && self.right == 0.0 && self.bottom == 0.0
    }

    pub fn expand(&self, rect: RectF) -> RectF {
        rect.outset(self.left, self.top, self.right, self.bottom)
    }

    /// Per-side maximum of both outsets.
    pub fn union(self, other: FilterOutsets) -> FilterOutsets {
        FilterOutsets {
            left: self.left.max(other.left),
            top: self.top.max(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FilterOperations {
    operations: Vec<FilterOperation>,
}

impl FilterOperations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, operation: FilterOperation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn push(&mut self, operation: FilterOperation) {
        self.operations.push(operation);
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn operations(&self) -> &[FilterOperation] {
        &self.operations
    }

    /// Conservative outsets for the whole chain with lengths multiplied by
    /// `scale`. Blurs grow three radii per side and accumulate; a drop shadow
    /// unions its shifted copy with the bounds so far.
    pub fn outsets(&self, scale: f32) -> FilterOutsets {
        let mut outsets = FilterOutsets::default();
        for operation in &self.operations {
            match *operation {
                FilterOperation::Blur { radius } => {
                    let delta = (radius * scale).abs() * 3.0;
                    outsets.left += delta;
                    outsets.top += delta;
                    outsets.right += delta;
                    outsets.bottom += delta;
                }
                FilterOperation::DropShadow {
                    offset_x,
                    offset_y,
                    blur_radius,
                    spread,
                } => {
                    let dx = offset_x * scale;
                    let dy = offset_y * scale;
                    let delta = ((blur_radius * scale).abs() * 3.0 + spread * scale).max(0.0);
                    outsets.left = outsets.left.max(outsets.left + delta - dx);
                    outsets.top = outsets.top.max(outsets.top + delta - dy);
                    outsets.right = outsets.right.max(outsets.right + delta + dx);
                    outsets.bottom = outsets.bottom.max(outsets.bottom + delta + dy);
                }
                _ => {}
            }
        }
        FilterOutsets {
            left: outsets.left.max(0.0),
            top: outsets.top.max(0.0),
            right: outsets.right.max(0.0),
            bottom: outsets.bottom.max(0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_outsets_accumulate_three_radii() {
        let filters = FilterOperations::new()
            .with(FilterOperation::Blur { radius: 2.0 })
            .with(FilterOperation::Grayscale(1.0))
            .with(FilterOperation::Blur { radius: 1.0 });
        let outsets = filters.outsets(1.0);
        assert_eq!(outsets.left, 9.0);
        assert_eq!(outsets.bottom, 9.0);
        assert_eq!(filters.outsets(2.0).top, 18.0);
    }

    #[test]
    fn drop_shadow_unions_with_source() {
        let filters = FilterOperations::new().with(FilterOperation::DropShadow {
            offset_x: 5.0,
            offset_y: -3.0,
            blur_radius: 0.0,
            spread: 0.0,
        });
        let outsets = filters.outsets(1.0);
        assert_eq!(
            outsets,
            FilterOutsets {
                left: 0.0,
                top: 3.0,
                right: 5.0,
                bottom: 0.0,
            }
        );
        let grown = outsets.expand(RectF::new(0.0, 0.0, 10.0, 10.0));
        assert_eq!(grown, RectF::new(0.0, -3.0, 15.0, 13.0));
    }

    #[test]
    fn color_filters_stay_in_bounds() {
        let filters = FilterOperations::new()
            .with(FilterOperation::Opacity(0.5))
            .with(FilterOperation::Sepia(1.0));
        assert!(filters.outsets(1.0).is_zero());
    }
}
