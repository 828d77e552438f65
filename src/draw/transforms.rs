//! Top-down transform phase: draw and screen space transforms, opacity,
//! animation flags and render surface promotion.

use log::trace;
use rustc_hash::FxHashMap;

use super::CalcDrawPropsInputs;
use super::meta::MetaInformation;
use crate::animation::TransformAnimation;
use crate::layer::{BlendMode, FilterOutsets, Layer, LayerId, LayerTree, RenderSurface, SurfaceReasons};
use crate::math::{Transform, Vector2dF};

const MIN_SUBLAYER_SCALE: f32 = 1e-6;

/// Per-layer result of the transform phase.
#[derive(Clone, Debug)]
pub(crate) struct LayerGeometry {
    /// Set for layers the walk leaves out, together with their subtree.
    pub(crate) skipped: bool,
    /// Owner of the surface this layer draws into; itself for surface owners.
    pub(crate) target: LayerId,
    pub(crate) local_transform: Transform,
    /// Layer space to the space its parent's children are placed in.
    pub(crate) combined: Transform,
    pub(crate) draw_transform: Transform,
    pub(crate) screen_space_transform: Transform,
    pub(crate) draw_transform_is_animating: bool,
    pub(crate) screen_space_transform_is_animating: bool,
    pub(crate) draw_opacity: f32,
    pub(crate) draw_opacity_is_animating: bool,
    pub(crate) can_use_lcd_text: bool,
    pub(crate) ideal_contents_scale: f32,
    pub(crate) maximum_animation_contents_scale: f32,
    /// Shares a 3D sorting context with its parent.
    pub(crate) in_existing_3d_context: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TransformPhase {
    pub(crate) layers: FxHashMap<LayerId, LayerGeometry>,
    pub(crate) surfaces: FxHashMap<LayerId, RenderSurface>,
    /// Layers drawing into each surface, keyed by surface owner.
    pub(crate) members: FxHashMap<LayerId, Vec<LayerId>>,
}

impl TransformPhase {
    pub(crate) fn geometry(&self, layer: LayerId) -> Option<&LayerGeometry> {
        self.layers.get(&layer)
    }

    pub(crate) fn owns_surface(&self, layer: LayerId) -> bool {
        self.surfaces.contains_key(&layer)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct FixedPositionState {
    /// Scroll delta accumulated since the nearest fixed-position container.
    scroll_delta: Vector2dF,
    /// Bounds growth of that container.
    bounds_delta: Vector2dF,
}

#[derive(Clone, Copy, Debug, Default)]
struct AnimationScale {
    is_animating_scale: bool,
    maximum: f32,
}

/// State a layer hands down to its children.
#[derive(Clone, Debug)]
struct SubtreeContext {
    parent_matrix: Transform,
    target: LayerId,
    target_screen: Transform,
    opacity: f32,
    opacity_is_animating: bool,
    draw_is_animating: bool,
    screen_is_animating: bool,
    can_use_lcd_text: bool,
    in_page_scale_subtree: bool,
    ancestor_screen: Transform,
    animation_scale: AnimationScale,
    fixed: FixedPositionState,
    skipped: bool,
}

impl SubtreeContext {
    fn for_root(root: LayerId, inputs: &CalcDrawPropsInputs) -> Self {
        let mut parent_matrix = inputs.device_transform;
        parent_matrix.scale(inputs.device_scale_factor, inputs.device_scale_factor);
        Self {
            parent_matrix,
            target: root,
            target_screen: Transform::identity(),
            opacity: 1.0,
            opacity_is_animating: false,
            draw_is_animating: false,
            screen_is_animating: false,
            can_use_lcd_text: true,
            in_page_scale_subtree: false,
            ancestor_screen: parent_matrix,
            animation_scale: AnimationScale::default(),
            fixed: FixedPositionState::default(),
            skipped: false,
        }
    }
}

pub(crate) fn compute_transforms(
    tree: &LayerTree,
    inputs: &CalcDrawPropsInputs,
    meta: &MetaInformation,
) -> TransformPhase {
    let mut phase = TransformPhase::default();
    let Some(root) = tree.root() else {
        return phase;
    };

    let mut contexts: FxHashMap<LayerId, SubtreeContext> = FxHashMap::default();
    for &id in &meta.order {
        let layer = &tree[id];
        let context = match layer.parent().and_then(|parent| contexts.get(&parent)) {
            Some(context) => context.clone(),
            None => SubtreeContext::for_root(root, inputs),
        };
        let child_context = phase.visit(tree, inputs, meta, layer, context, id == root);
        if !layer.children().is_empty() {
            contexts.insert(id, child_context);
        }
    }
    phase
}

impl TransformPhase {
    fn visit(
        &mut self,
        tree: &LayerTree,
        inputs: &CalcDrawPropsInputs,
        meta: &MetaInformation,
        layer: &Layer,
        context: SubtreeContext,
        is_root: bool,
    ) -> SubtreeContext {
        let id = layer.id();
        let parent = layer.parent().and_then(|parent| tree.layer(parent));
        let skipped = context.skipped || (!is_root && layer_should_skip_subtree(layer, meta));

        let local_transform = local_transform(tree, meta, layer, &context.fixed);
        let mut combined = context.parent_matrix * local_transform;
        let is_page_scale_layer = inputs.page_scale_layer == Some(id);
        if is_page_scale_layer {
            combined.scale(inputs.page_scale_factor, inputs.page_scale_factor);
        }
        let in_page_scale_subtree = context.in_page_scale_subtree || is_page_scale_layer;
        let fallback_scale = if in_page_scale_subtree {
            inputs.device_scale_factor * inputs.page_scale_factor
        } else {
            inputs.device_scale_factor
        };
        let in_existing_3d_context = parent.is_some_and(|parent| {
            layer.is_3d_sorted() && parent.sorting_context_id() == layer.sorting_context_id()
        });

        let reasons = if skipped {
            SurfaceReasons::empty()
        } else if is_root {
            SurfaceReasons::ROOT
        } else {
            surface_reasons(tree, meta, inputs, layer, &combined, in_existing_3d_context)
        };
        if !reasons.is_empty() {
            trace!("{id:?} owns a render surface: {reasons:?}");
        }

        let layer_screen = context.target_screen * combined;
        let animation_scale = animation_contents_scale(layer, &context, &layer_screen);
        let transform_is_animating = layer.transform_is_animating();
        let opacity_is_animating = layer.opacity_is_animating();

        let mut geometry = LayerGeometry {
            skipped,
            target: context.target,
            local_transform,
            combined,
            draw_transform: combined,
            screen_space_transform: layer_screen,
            draw_transform_is_animating: context.draw_is_animating || transform_is_animating,
            screen_space_transform_is_animating: context.screen_is_animating || transform_is_animating,
            draw_opacity: context.opacity * layer.opacity(),
            draw_opacity_is_animating: context.opacity_is_animating || opacity_is_animating,
            can_use_lcd_text: false,
            ideal_contents_scale: layer_screen.max_scale_2d(fallback_scale),
            maximum_animation_contents_scale: animation_scale.maximum,
            in_existing_3d_context,
        };

        let mut children = SubtreeContext {
            parent_matrix: if layer.should_flatten_transform() {
                combined.flattened()
            } else {
                combined
            },
            target: context.target,
            target_screen: context.target_screen,
            opacity: geometry.draw_opacity,
            opacity_is_animating: geometry.draw_opacity_is_animating,
            draw_is_animating: geometry.draw_transform_is_animating,
            screen_is_animating: geometry.screen_space_transform_is_animating,
            can_use_lcd_text: context.can_use_lcd_text
                && geometry.draw_opacity == 1.0
                && !geometry.draw_opacity_is_animating
                && !geometry.draw_transform_is_animating,
            in_page_scale_subtree,
            ancestor_screen: if layer.should_flatten_transform() {
                layer_screen.flattened()
            } else {
                layer_screen
            },
            animation_scale,
            fixed: fixed_position_state_for_children(inputs, layer, &context.fixed, is_root),
            skipped,
        };

        if is_root {
            let mut surface = RenderSurface::new(id, None, reasons);
            surface.draw_opacity = layer.opacity();
            surface.draw_opacity_is_animating = opacity_is_animating;
            surface.filter_outsets = filter_outsets(layer, 1.0);
            replica_transforms(tree, layer, &mut surface);

            geometry.target = id;
            geometry.draw_opacity = 1.0;
            geometry.draw_opacity_is_animating = false;
            children.target = id;
            children.target_screen = Transform::identity();
            children.opacity = 1.0;
            children.opacity_is_animating = false;
            children.can_use_lcd_text = surface.draw_opacity == 1.0 && !surface.draw_opacity_is_animating;
            self.surfaces.insert(id, surface);
        } else if !reasons.is_empty() {
            let scale = sublayer_scale(inputs, &combined, fallback_scale);
            let mut surface = RenderSurface::new(id, Some(context.target), reasons);
            surface.sublayer_scale = scale;
            surface.draw_transform = combined;
            surface.draw_transform.scale(1.0 / scale, 1.0 / scale);
            surface.screen_space_transform = context.target_screen * surface.draw_transform;
            surface.target_surface_transforms_are_animating = geometry.draw_transform_is_animating;
            surface.screen_space_transforms_are_animating = geometry.screen_space_transform_is_animating;
            surface.draw_opacity = geometry.draw_opacity;
            surface.draw_opacity_is_animating = geometry.draw_opacity_is_animating;
            surface.filter_outsets = filter_outsets(layer, scale);
            replica_transforms(tree, layer, &mut surface);

            let sublayer = Transform::scaling(scale, scale);
            geometry.target = id;
            geometry.draw_transform = sublayer;
            geometry.screen_space_transform = surface.screen_space_transform * sublayer;
            geometry.draw_transform_is_animating = false;
            geometry.screen_space_transform_is_animating = surface.screen_space_transforms_are_animating;
            geometry.draw_opacity = 1.0;
            geometry.draw_opacity_is_animating = false;

            children.parent_matrix = sublayer;
            children.target = id;
            children.target_screen = if layer.should_flatten_transform() {
                surface.screen_space_transform.flattened()
            } else {
                surface.screen_space_transform
            };
            children.opacity = 1.0;
            children.opacity_is_animating = false;
            children.draw_is_animating = false;
            children.screen_is_animating = surface.screen_space_transforms_are_animating;
            children.can_use_lcd_text = surface.draw_opacity == 1.0
                && surface.draw_transform.is_identity_or_integer_translation()
                && !surface.draw_opacity_is_animating
                && !surface.target_surface_transforms_are_animating
                && !surface.screen_space_transforms_are_animating;
            self.surfaces.insert(id, surface);
        }

        let subtree_allows_lcd = if self.owns_surface(id) {
            children.can_use_lcd_text
        } else {
            context.can_use_lcd_text
        };
        geometry.can_use_lcd_text = layer_can_use_lcd_text(inputs, layer, subtree_allows_lcd, &geometry);

        if !skipped {
            self.members.entry(geometry.target).or_default().push(id);
        }
        self.layers.insert(id, geometry);
        children
    }
}

/// `T(position - scroll + fixed compensation) * T(origin) * transform * T(-origin)`.
/// A scroll parent outside the ancestor chain also contributes its scroll.
fn local_transform(
    tree: &LayerTree,
    meta: &MetaInformation,
    layer: &Layer,
    fixed: &FixedPositionState,
) -> Transform {
    let position = layer.position();
    let mut offset = Vector2dF::new(position.x, position.y) - layer.total_scroll_offset();
    let constraint = layer.position_constraint();
    if constraint.is_fixed_position {
        offset = offset + fixed.scroll_delta;
        if constraint.is_fixed_to_right_edge {
            offset.x += fixed.bounds_delta.x;
        }
        if constraint.is_fixed_to_bottom_edge {
            offset.y += fixed.bounds_delta.y;
        }
    }
    if let Some(scroll_parent) = meta.relations.scroll_parent(layer.id()) {
        if !tree.is_ancestor_or_self(scroll_parent, layer.id()) {
            offset = offset - tree[scroll_parent].total_scroll_offset();
        }
    }

    let mut local = Transform::translation(offset.x, offset.y);
    local.pre_concat(&layer.transform_about_origin());
    local
}

fn fixed_position_state_for_children(
    inputs: &CalcDrawPropsInputs,
    layer: &Layer,
    inherited: &FixedPositionState,
    is_root: bool,
) -> FixedPositionState {
    let id = Some(layer.id());
    let is_container = is_root
        || layer.is_container_for_fixed_position_layers()
        || inputs.inner_viewport_scroll_layer == id
        || inputs.outer_viewport_scroll_layer == id;
    if is_container {
        FixedPositionState {
            scroll_delta: layer.scroll_delta(),
            bounds_delta: layer.bounds_delta(),
        }
    } else if layer.position_constraint().is_fixed_position {
        FixedPositionState {
            scroll_delta: layer.scroll_delta(),
            bounds_delta: inherited.bounds_delta,
        }
    } else {
        FixedPositionState {
            scroll_delta: inherited.scroll_delta + layer.scroll_delta(),
            bounds_delta: inherited.bounds_delta,
        }
    }
}

fn layer_should_skip_subtree(layer: &Layer, meta: &MetaInformation) -> bool {
    if !layer.transform().is_invertible() && !layer.transform_is_animating() {
        return true;
    }
    let subtree = meta.subtree(layer.id());
    if subtree.has_copy_request_in_subtree {
        return false;
    }
    if layer.hide_layer_and_subtree() {
        return true;
    }
    layer.opacity() == 0.0 && !layer.opacity_is_animating() && !subtree.has_input_handler_in_subtree
}

fn surface_reasons(
    tree: &LayerTree,
    meta: &MetaInformation,
    inputs: &CalcDrawPropsInputs,
    layer: &Layer,
    combined: &Transform,
    in_existing_3d_context: bool,
) -> SurfaceReasons {
    let mut reasons = SurfaceReasons::empty();
    if !inputs.can_render_to_separate_surface {
        return reasons;
    }

    let subtree = meta.subtree(layer.id());
    let draws_descendants = subtree.num_descendants_that_draw_content > 0;
    let has_mask = layer
        .mask_layer()
        .and_then(|mask| tree.layer(mask))
        .is_some_and(|mask| !mask.bounds().is_empty());

    reasons.set(SurfaceReasons::FORCED, layer.force_render_surface());
    reasons.set(SurfaceReasons::COPY_REQUEST, layer.has_copy_request());
    reasons.set(SurfaceReasons::MASK, has_mask);
    reasons.set(SurfaceReasons::REPLICA, layer.replica_layer().is_some());
    reasons.set(
        SurfaceReasons::FILTERS,
        !layer.filters().is_empty() || layer.filter_is_animating(),
    );
    reasons.set(SurfaceReasons::BLEND_MODE, layer.blend_mode() != BlendMode::Normal);
    reasons.set(
        SurfaceReasons::FLATTENS_3D_CONTEXT,
        in_existing_3d_context && layer.should_flatten_transform() && draws_descendants,
    );
    reasons.set(
        SurfaceReasons::NON_AXIS_ALIGNED_CLIP,
        layer.masks_to_bounds() && !combined.preserves_2d_axis_alignment() && draws_descendants,
    );
    reasons.set(
        SurfaceReasons::CLIP_CHILDREN,
        meta.relations.is_clip_parent(layer.id()) && draws_descendants,
    );
    reasons.set(
        SurfaceReasons::OPACITY,
        (layer.opacity() < 1.0 || layer.opacity_is_animating())
            && (layer.draws_content() || draws_descendants),
    );
    reasons
}

fn sublayer_scale(inputs: &CalcDrawPropsInputs, combined: &Transform, fallback: f32) -> f32 {
    let scale = if inputs.can_adjust_raster_scales {
        combined.max_scale_2d(fallback)
    } else {
        fallback
    };
    if scale.is_finite() {
        scale.max(MIN_SUBLAYER_SCALE)
    } else {
        1.0
    }
}

/// Outsets of the static filters and of every keyframe of an active filter
/// animation.
fn filter_outsets(layer: &Layer, scale: f32) -> FilterOutsets {
    let mut outsets = layer.filters().outsets(scale);
    if let Some(animation) = layer.filter_animation().filter(|animation| animation.is_active()) {
        for keyframe in animation.keyframes() {
            outsets = outsets.union(keyframe.value.outsets(scale));
        }
    }
    outsets
}

/// Replica placement: `S * T(position + origin) * transform * T(-origin) * S^-1`
/// with `S` the sublayer scale, applied after the surface transforms.
fn replica_transforms(tree: &LayerTree, layer: &Layer, surface: &mut RenderSurface) {
    let Some(replica) = layer.replica_layer().and_then(|replica| tree.layer(replica)) else {
        return;
    };
    let scale = surface.sublayer_scale;
    let origin = replica.transform_origin();
    let position = replica.position();

    let mut surface_to_replica = Transform::scaling(scale, scale);
    surface_to_replica.translate(position.x + origin.x, position.y + origin.y);
    surface_to_replica.pre_concat(replica.transform());
    surface_to_replica.translate(-origin.x, -origin.y);
    surface_to_replica.scale(1.0 / scale, 1.0 / scale);

    surface.replica_draw_transform = Some(surface.draw_transform * surface_to_replica);
    surface.replica_screen_space_transform = Some(surface.screen_space_transform * surface_to_replica);
}

/// Maximum scale an active transform animation can reach in screen space.
/// Only one animating node per ancestor chain is accounted for; two nested
/// scale animations, or anything beyond scale and translation, report 0.
fn animation_contents_scale(layer: &Layer, context: &SubtreeContext, screen: &Transform) -> AnimationScale {
    let ancestor = context.animation_scale;
    let layer_is_animating_scale = !layer.has_only_translation_transforms();
    if !layer_is_animating_scale && !ancestor.is_animating_scale {
        return AnimationScale::default();
    }
    if !screen.is_scale_or_translation() {
        return AnimationScale::default();
    }
    if layer_is_animating_scale && ancestor.is_animating_scale {
        return AnimationScale::default();
    }

    if !layer_is_animating_scale {
        return AnimationScale {
            is_animating_scale: true,
            maximum: ancestor.maximum * layer.transform().max_scale_2d(0.0),
        };
    }
    let maximum = layer
        .transform_animation()
        .and_then(TransformAnimation::maximum_scale)
        .map(|scale| scale * context.ancestor_screen.max_scale_2d(0.0))
        .unwrap_or(0.0);
    AnimationScale {
        is_animating_scale: true,
        maximum,
    }
}

fn layer_can_use_lcd_text(
    inputs: &CalcDrawPropsInputs,
    layer: &Layer,
    subtree_allows: bool,
    geometry: &LayerGeometry,
) -> bool {
    if inputs.layers_always_allowed_lcd_text {
        return true;
    }
    inputs.can_use_lcd_text
        && subtree_allows
        && layer.contents_opaque()
        && geometry.draw_opacity == 1.0
        && !geometry.draw_opacity_is_animating
        && !geometry.draw_transform_is_animating
        && !geometry.screen_space_transform_is_animating
        && geometry.draw_transform.is_identity_or_integer_translation()
        && geometry.screen_space_transform.is_identity_or_integer_translation()
}
