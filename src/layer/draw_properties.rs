use super::LayerId;
use crate::math::{Rect, Transform};

/// Per-layer output of [`calculate_draw_properties`](crate::calculate_draw_properties).
///
/// Rebuilt from scratch on every traversal. Layers the traversal skips keep
/// the default state: identity transforms, empty rects and no render target.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawProperties {
    /// Layer content space to the space of `render_target`'s surface.
    pub target_space_transform: Transform,
    /// Layer content space to device (root surface) space.
    pub screen_space_transform: Transform,
    pub target_space_transform_is_animating: bool,
    pub screen_space_transform_is_animating: bool,

    /// Opacity applied when drawing into the render target. A layer that
    /// owns a surface draws at 1; its opacity moves to the surface.
    pub draw_opacity: f32,
    pub opacity_is_animating: bool,

    pub clip_rect: Rect,
    pub is_clipped: bool,
    /// Part of the layer bounds, in layer space, that can end up on screen.
    pub visible_layer_rect: Rect,
    /// Footprint in target space, clipped by `clip_rect` when `is_clipped`.
    pub drawable_content_rect: Rect,
    /// Target-space rect that is fully covered by opaque content.
    pub opaque_content_rect: Rect,

    pub render_target: Option<LayerId>,
    pub can_use_lcd_text: bool,
    /// Raster scale at which the content maps 1:1 to screen pixels.
    pub ideal_contents_scale: f32,
    /// Largest scale an active transform animation can reach, 0 if unknown.
    pub maximum_animation_contents_scale: f32,
    pub num_unclipped_descendants: usize,
}

impl Default for DrawProperties {
    fn default() -> Self {
        Self {
            target_space_transform: Transform::identity(),
            screen_space_transform: Transform::identity(),
            target_space_transform_is_animating: false,
            screen_space_transform_is_animating: false,
            draw_opacity: 1.0,
            opacity_is_animating: false,
            clip_rect: Rect::default(),
            is_clipped: false,
            visible_layer_rect: Rect::default(),
            drawable_content_rect: Rect::default(),
            opaque_content_rect: Rect::default(),
            render_target: None,
            can_use_lcd_text: false,
            ideal_contents_scale: 1.0,
            maximum_animation_contents_scale: 0.0,
            num_unclipped_descendants: 0,
        }
    }
}

impl DrawProperties {
    /// Alias used by painters: content space to render target space.
    pub fn draw_transform(&self) -> &Transform {
        &self.target_space_transform
    }
}
