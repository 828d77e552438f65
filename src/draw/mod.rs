//! Draw properties computation for a [`LayerTree`].
//!
//! One call walks the attached tree in four steps: a pre-pass collecting
//! subtree aggregates, a top-down pass for transforms and surface promotion,
//! clip resolution by layer id, and a paint-order walk that fills render
//! surfaces and visible rects. The results are then committed to the layers.

mod clips;
mod meta;
mod property_trees;
mod surface_order;
mod transforms;
mod visible_rect;
mod walk;


use log::debug;

pub use property_trees::{ClipNode, EffectNode, PropertyTrees, TransformNode};
pub use visible_rect::calculate_visible_rect;

use crate::layer::{LayerId, LayerRelations, LayerTree, RenderSurfaceList};
use crate::math::{Rect, Size, Transform};

/// Frame-level configuration of a draw properties computation.
#[derive(Clone, Debug, PartialEq)]
pub struct CalcDrawPropsInputs {
    pub device_viewport_size: Size,
    /// Applied above the device scale, e.g. for a rotated display.
    pub device_transform: Transform,
    pub device_scale_factor: f32,
    pub page_scale_factor: f32,
    pub page_scale_layer: Option<LayerId>,
    pub inner_viewport_scroll_layer: Option<LayerId>,
    pub outer_viewport_scroll_layer: Option<LayerId>,
    /// Largest width or height a surface's content rect may have.
    pub max_texture_size: i32,
    pub can_use_lcd_text: bool,
    pub layers_always_allowed_lcd_text: bool,
    /// When false only the root owns a render surface.
    pub can_render_to_separate_surface: bool,
    /// Rasterize surfaces at the scale of their transform instead of the
    /// device and page scale.
    pub can_adjust_raster_scales: bool,
}

impl Default for CalcDrawPropsInputs {
    fn default() -> Self {
        Self {
            device_viewport_size: Size::new(1, 1),
            device_transform: Transform::identity(),
            device_scale_factor: 1.0,
            page_scale_factor: 1.0,
            page_scale_layer: None,
            inner_viewport_scroll_layer: None,
            outer_viewport_scroll_layer: None,
            max_texture_size: i32::MAX,
            can_use_lcd_text: false,
            layers_always_allowed_lcd_text: false,
            can_render_to_separate_surface: true,
            can_adjust_raster_scales: false,
        }
    }
}

impl CalcDrawPropsInputs {
    pub fn new(device_viewport_size: Size) -> Self {
        Self {
            device_viewport_size,
            ..Self::default()
        }
    }

    pub fn with_device_transform(mut self, transform: Transform) -> Self {
        self.device_transform = transform;
        self
    }

    pub fn with_device_scale_factor(mut self, scale: f32) -> Self {
        self.device_scale_factor = scale;
        self
    }

    pub fn with_page_scale(mut self, layer: Option<LayerId>, scale: f32) -> Self {
        self.page_scale_layer = layer;
        self.page_scale_factor = scale;
        self
    }

    pub fn with_viewport_scroll_layers(mut self, inner: Option<LayerId>, outer: Option<LayerId>) -> Self {
        self.inner_viewport_scroll_layer = inner;
        self.outer_viewport_scroll_layer = outer;
        self
    }

    pub fn with_max_texture_size(mut self, size: i32) -> Self {
        self.max_texture_size = size;
        self
    }

    pub fn with_lcd_text(mut self, can_use_lcd_text: bool, layers_always_allowed: bool) -> Self {
        self.can_use_lcd_text = can_use_lcd_text;
        self.layers_always_allowed_lcd_text = layers_always_allowed;
        self
    }

    pub fn with_separate_surfaces(mut self, enabled: bool) -> Self {
        self.can_render_to_separate_surface = enabled;
        self
    }

    pub fn with_raster_scale_adjustment(mut self, enabled: bool) -> Self {
        self.can_adjust_raster_scales = enabled;
        self
    }

    pub fn viewport_rect(&self) -> Rect {
        Rect::from_size(self.device_viewport_size)
    }

    /// Copy with scale factors forced positive and finite and a usable
    /// texture limit.
    fn sanitized(&self) -> Self {
        let positive = |value: f32| {
            if value.is_finite() && value > 0.0 {
                value
            } else {
                1.0
            }
        };
        let mut inputs = self.clone();
        inputs.device_scale_factor = positive(self.device_scale_factor);
        inputs.page_scale_factor = positive(self.page_scale_factor);
        inputs.max_texture_size = self.max_texture_size.max(1);
        if !inputs.device_transform.is_finite() {
            inputs.device_transform = Transform::identity();
        }
        inputs
    }
}

/// Computes draw properties and render surfaces for every layer attached to
/// `tree`, resolving scroll and clip parents from the tree itself.
///
/// When nothing changed since the previous call with equal inputs, the
/// previous result is returned without walking the tree.
pub fn calculate_draw_properties(tree: &mut LayerTree, inputs: &CalcDrawPropsInputs) -> RenderSurfaceList {
    let inputs = inputs.sanitized();
    if !tree.needs_update() {
        if let Some((last_inputs, list)) = &tree.last_frame {
            if *last_inputs == inputs {
                debug!("layer tree unchanged; reusing {} render surfaces", list.len());
                return list.clone();
            }
        }
    }
    let list = run(tree, &inputs, None);
    tree.last_frame = Some((inputs, list.clone()));
    list
}

/// Like [`calculate_draw_properties`], with scroll and clip parents looked up
/// through `relations` instead of the tree. The result is never reused by a
/// later call.
pub fn calculate_draw_properties_with_relations(
    tree: &mut LayerTree,
    inputs: &CalcDrawPropsInputs,
    relations: &dyn LayerRelations,
) -> RenderSurfaceList {
    let inputs = inputs.sanitized();
    let list = run(tree, &inputs, Some(relations));
    tree.last_frame = None;
    list
}

fn run(
    tree: &mut LayerTree,
    inputs: &CalcDrawPropsInputs,
    relations: Option<&dyn LayerRelations>,
) -> RenderSurfaceList {
    let relations: &dyn LayerRelations = match relations {
        Some(relations) => relations,
        None => &*tree,
    };
    let meta = meta::MetaInformation::collect(tree, relations);
    let mut transforms = transforms::compute_transforms(tree, inputs, &meta);
    let mut clips = clips::resolve_clips(tree, inputs, &meta, &mut transforms);
    let output = walk::walk(tree, inputs, &meta, &mut transforms, &mut clips);

    let mut property_trees = std::mem::take(&mut tree.property_trees);
    let assignment = property_trees.refresh(tree, inputs, &meta, &transforms, &clips, tree.needs_rebuild());
    tree.property_trees = property_trees;

    walk::commit(tree, transforms, output.draw_properties, &assignment);
    tree.clear_invalidation();

    let list = RenderSurfaceList::from_vec(output.render_surface_list);
    debug!(
        "computed draw properties for {} layers; {} render surfaces",
        meta.order.len(),
        list.len()
    );
    list
}
