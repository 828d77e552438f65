mod draw_properties;
mod filters;
mod render_surface;
mod tree;
pub use draw_properties::*;
pub use filters::*;
pub use render_surface::*;
pub use tree::*;

use crate::animation::{FilterAnimation, OpacityAnimation, TransformAnimation};
use crate::math::{Point3F, PointF, Rect, Size, Transform, Vector2dF};

slotmap::new_key_type! {
    /// Stable handle of a layer inside a [`LayerTree`].
    pub struct LayerId;
}

/// Value of a property tree index that is not assigned, e.g. after the layer
/// was detached from its tree.
pub const INVALID_PROPERTY_TREE_INDEX: i32 = -1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendMode {
    #[default]
    Normal,
    Multiply,
    Screen,
    Overlay,
    Darken,
    Lighten,
    ColorDodge,
    ColorBurn,
    HardLight,
    SoftLight,
    Difference,
    Exclusion,
    Hue,
    Saturation,
    Color,
    Luminosity,
}

/// Fixed-position behavior of a layer relative to its nearest
/// fixed-position container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PositionConstraint {
    pub is_fixed_position: bool,
    pub is_fixed_to_right_edge: bool,
    pub is_fixed_to_bottom_edge: bool,
}

impl PositionConstraint {
    pub const fn fixed() -> Self {
        Self {
            is_fixed_position: true,
            is_fixed_to_right_edge: false,
            is_fixed_to_bottom_edge: false,
        }
    }

    pub const fn fixed_to_edges(right: bool, bottom: bool) -> Self {
        Self {
            is_fixed_position: true,
            is_fixed_to_right_edge: right,
            is_fixed_to_bottom_edge: bottom,
        }
    }
}

/// Pending request to read back the pixels of a layer's subtree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyRequest {
    /// Sub-area in layer space; `None` copies everything.
    pub area: Option<Rect>,
}

/// Looks up out-of-tree relations by layer id.
///
/// [`LayerTree`] implements this from the relations stored on its layers; a
/// caller may also provide an external index.
pub trait LayerRelations {
    fn scroll_parent(&self, layer: LayerId) -> Option<LayerId>;
    fn clip_parent(&self, layer: LayerId) -> Option<LayerId>;
}

/// One node of the layer tree. Mutation goes through [`LayerTree`] so that it
/// can track relations and invalidation.
#[derive(Clone, Debug)]
pub struct Layer {
    pub(crate) id: LayerId,
    pub(crate) parent: Option<LayerId>,
    pub(crate) children: Vec<LayerId>,
    pub(crate) mask_layer: Option<LayerId>,
    pub(crate) replica_layer: Option<LayerId>,
    /// Set on masks and replicas: the layer that references this one.
    pub(crate) owner: Option<LayerId>,
    pub(crate) scroll_parent: Option<LayerId>,
    pub(crate) scroll_children: Vec<LayerId>,
    pub(crate) clip_parent: Option<LayerId>,
    pub(crate) clip_children: Vec<LayerId>,

    pub(crate) transform: Transform,
    pub(crate) transform_origin: Point3F,
    pub(crate) position: PointF,
    pub(crate) bounds: Size,
    pub(crate) sorting_context_id: i32,
    pub(crate) should_flatten_transform: bool,
    pub(crate) double_sided: bool,

    pub(crate) opacity: f32,
    pub(crate) blend_mode: BlendMode,
    pub(crate) masks_to_bounds: bool,
    pub(crate) hide_layer_and_subtree: bool,
    pub(crate) force_render_surface: bool,
    pub(crate) filters: FilterOperations,
    pub(crate) contents_opaque: bool,
    pub(crate) draws_content: bool,
    pub(crate) has_input_handler: bool,
    pub(crate) copy_requests: Vec<CopyRequest>,

    pub(crate) scroll_offset: Vector2dF,
    pub(crate) scroll_delta: Vector2dF,
    pub(crate) scroll_clip_layer: Option<LayerId>,
    pub(crate) is_container_for_fixed_position_layers: bool,
    pub(crate) position_constraint: PositionConstraint,
    pub(crate) bounds_delta: Vector2dF,

    pub(crate) transform_animation: Option<TransformAnimation>,
    pub(crate) opacity_animation: Option<OpacityAnimation>,
    pub(crate) filter_animation: Option<FilterAnimation>,

    pub(crate) draw_properties: DrawProperties,
    pub(crate) render_surface: Option<RenderSurface>,
    pub(crate) transform_tree_index: i32,
    pub(crate) clip_tree_index: i32,
    pub(crate) effect_tree_index: i32,
}

impl Layer {
    pub(crate) fn new(id: LayerId) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            mask_layer: None,
            replica_layer: None,
            owner: None,
            scroll_parent: None,
            scroll_children: Vec::new(),
            clip_parent: None,
            clip_children: Vec::new(),
            transform: Transform::identity(),
            transform_origin: Point3F::default(),
            position: PointF::default(),
            bounds: Size::default(),
            sorting_context_id: 0,
            should_flatten_transform: true,
            double_sided: true,
            opacity: 1.0,
            blend_mode: BlendMode::Normal,
            masks_to_bounds: false,
            hide_layer_and_subtree: false,
            force_render_surface: false,
            filters: FilterOperations::default(),
            contents_opaque: false,
            draws_content: false,
            has_input_handler: false,
            copy_requests: Vec::new(),
            scroll_offset: Vector2dF::default(),
            scroll_delta: Vector2dF::default(),
            scroll_clip_layer: None,
            is_container_for_fixed_position_layers: false,
            position_constraint: PositionConstraint::default(),
            bounds_delta: Vector2dF::default(),
            transform_animation: None,
            opacity_animation: None,
            filter_animation: None,
            draw_properties: DrawProperties::default(),
            render_surface: None,
            transform_tree_index: INVALID_PROPERTY_TREE_INDEX,
            clip_tree_index: INVALID_PROPERTY_TREE_INDEX,
            effect_tree_index: INVALID_PROPERTY_TREE_INDEX,
        }
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn parent(&self) -> Option<LayerId> {
        self.parent
    }

    pub fn children(&self) -> &[LayerId] {
        &self.children
    }

    pub fn mask_layer(&self) -> Option<LayerId> {
        self.mask_layer
    }

    pub fn replica_layer(&self) -> Option<LayerId> {
        self.replica_layer
    }

    pub fn scroll_parent(&self) -> Option<LayerId> {
        self.scroll_parent
    }

    pub fn scroll_children(&self) -> &[LayerId] {
        &self.scroll_children
    }

    pub fn clip_parent(&self) -> Option<LayerId> {
        self.clip_parent
    }

    pub fn clip_children(&self) -> &[LayerId] {
        &self.clip_children
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn transform_origin(&self) -> Point3F {
        self.transform_origin
    }

    pub fn position(&self) -> PointF {
        self.position
    }

    pub fn bounds(&self) -> Size {
        self.bounds
    }

    pub fn sorting_context_id(&self) -> i32 {
        self.sorting_context_id
    }

    pub fn is_3d_sorted(&self) -> bool {
        self.sorting_context_id != 0
    }

    pub fn should_flatten_transform(&self) -> bool {
        self.should_flatten_transform
    }

    pub fn double_sided(&self) -> bool {
        self.double_sided
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    pub fn masks_to_bounds(&self) -> bool {
        self.masks_to_bounds
    }

    pub fn hide_layer_and_subtree(&self) -> bool {
        self.hide_layer_and_subtree
    }

    pub fn force_render_surface(&self) -> bool {
        self.force_render_surface
    }

    pub fn filters(&self) -> &FilterOperations {
        &self.filters
    }

    pub fn contents_opaque(&self) -> bool {
        self.contents_opaque
    }

    pub fn draws_content(&self) -> bool {
        self.draws_content
    }

    pub fn has_input_handler(&self) -> bool {
        self.has_input_handler
    }

    pub fn has_copy_request(&self) -> bool {
        !self.copy_requests.is_empty()
    }

    pub fn scroll_offset(&self) -> Vector2dF {
        self.scroll_offset
    }

    pub fn scroll_delta(&self) -> Vector2dF {
        self.scroll_delta
    }

    /// Offset plus the not yet committed delta.
    pub fn total_scroll_offset(&self) -> Vector2dF {
        self.scroll_offset + self.scroll_delta
    }

    pub fn scroll_clip_layer(&self) -> Option<LayerId> {
        self.scroll_clip_layer
    }

    pub fn scrollable(&self) -> bool {
        self.scroll_clip_layer.is_some()
    }

    pub fn is_container_for_fixed_position_layers(&self) -> bool {
        self.is_container_for_fixed_position_layers
    }

    pub fn position_constraint(&self) -> PositionConstraint {
        self.position_constraint
    }

    pub fn bounds_delta(&self) -> Vector2dF {
        self.bounds_delta
    }

    pub fn transform_animation(&self) -> Option<&TransformAnimation> {
        self.transform_animation.as_ref()
    }

    pub fn opacity_animation(&self) -> Option<&OpacityAnimation> {
        self.opacity_animation.as_ref()
    }

    pub fn filter_animation(&self) -> Option<&FilterAnimation> {
        self.filter_animation.as_ref()
    }

    pub fn transform_is_animating(&self) -> bool {
        self.transform_animation
            .as_ref()
            .is_some_and(|animation| animation.is_active())
    }

    pub fn opacity_is_animating(&self) -> bool {
        self.opacity_animation
            .as_ref()
            .is_some_and(|animation| animation.is_active())
    }

    pub fn filter_is_animating(&self) -> bool {
        self.filter_animation
            .as_ref()
            .is_some_and(|animation| animation.is_active())
    }

    /// True unless an active transform animation can change more than the
    /// translation.
    pub fn has_only_translation_transforms(&self) -> bool {
        self.transform_animation
            .as_ref()
            .filter(|animation| animation.is_active())
            .is_none_or(|animation| animation.is_translation())
    }

    pub fn draw_properties(&self) -> &DrawProperties {
        &self.draw_properties
    }

    pub fn render_surface(&self) -> Option<&RenderSurface> {
        self.render_surface.as_ref()
    }

    pub fn transform_tree_index(&self) -> i32 {
        self.transform_tree_index
    }

    pub fn clip_tree_index(&self) -> i32 {
        self.clip_tree_index
    }

    pub fn effect_tree_index(&self) -> i32 {
        self.effect_tree_index
    }

    pub fn bounds_rect(&self) -> Rect {
        Rect::from_size(self.bounds)
    }

    /// `T(origin) * transform * T(-origin)`, without position or scroll.
    pub fn transform_about_origin(&self) -> Transform {
        let origin = self.transform_origin;
        let mut local = Transform::identity();
        local.translate3d(origin.x, origin.y, origin.z);
        local.pre_concat(&self.transform);
        local.translate3d(-origin.x, -origin.y, -origin.z);
        local
    }

    pub(crate) fn reset_property_tree_indices(&mut self) {
        self.transform_tree_index = INVALID_PROPERTY_TREE_INDEX;
        self.clip_tree_index = INVALID_PROPERTY_TREE_INDEX;
        self.effect_tree_index = INVALID_PROPERTY_TREE_INDEX;
    }
}
