//! Paint-order walk over the resolved transforms and clips. Builds the render
//! surface list, fills each surface's layer list and content rect, and turns
//! everything into per-layer [`DrawProperties`].

use log::{trace, warn};
use rustc_hash::FxHashMap;

use super::CalcDrawPropsInputs;
use super::clips::{ClipPhase, ClipState};
use super::meta::MetaInformation;
use super::property_trees::NodeAssignment;
use super::surface_order::stable_topological_order;
use super::transforms::{LayerGeometry, TransformPhase};
use super::visible_rect::calculate_visible_rect;
use crate::layer::{DrawProperties, Layer, LayerId, LayerTree, RenderSurface, SurfaceReasons};
use crate::math::{Rect, Transform, map_enclosed_rect_with_2d_axis_aligned_transform, map_enclosing_clipped_rect};

pub(crate) struct WalkOutput {
    /// Surface owners, each target before the surfaces drawing into it.
    pub(crate) render_surface_list: Vec<LayerId>,
    pub(crate) draw_properties: FxHashMap<LayerId, DrawProperties>,
}

pub(crate) fn walk(
    tree: &LayerTree,
    inputs: &CalcDrawPropsInputs,
    meta: &MetaInformation,
    phase: &mut TransformPhase,
    clips: &mut ClipPhase,
) -> WalkOutput {
    let mut walker = Walker {
        tree,
        inputs,
        meta,
        phase,
        clips,
        list: Vec::new(),
        accumulated: FxHashMap::default(),
    };
    if let Some(root) = tree.root() {
        walker.visit(root, true);
    }
    let render_surface_list = walker.sorted_list();
    let visible = walker.visible_rects(&render_surface_list);
    let draw_properties = walker.draw_properties(&visible, &render_surface_list);
    WalkOutput {
        render_surface_list,
        draw_properties,
    }
}

struct Walker<'a> {
    tree: &'a LayerTree,
    inputs: &'a CalcDrawPropsInputs,
    meta: &'a MetaInformation,
    phase: &'a mut TransformPhase,
    clips: &'a mut ClipPhase,
    list: Vec<LayerId>,
    /// Union of the drawable content drawn into each surface so far.
    accumulated: FxHashMap<LayerId, Rect>,
}

impl Walker<'_> {
    fn visit(&mut self, id: LayerId, from_ancestor_visible: bool) {
        let tree = self.tree;
        let Some(geometry) = self.phase.geometry(id).cloned() else {
            return;
        };
        if geometry.skipped {
            return;
        }

        let layer = &tree[id];
        let subtree_visible = from_ancestor_visible && !layer.hide_layer_and_subtree();
        let owns_surface = self.phase.owns_surface(id);
        let copy_requested = owns_surface && layer.has_copy_request();
        if owns_surface {
            self.list.push(id);
        }

        if (subtree_visible || copy_requested) && !layer_should_be_skipped(layer, &geometry) {
            let clip = self.clips.layer_clip(id);
            let drawable = drawable_content_rect(layer, &geometry, clip);
            self.add_to_target(geometry.target, id, drawable);
        }

        let children_visible = subtree_visible || copy_requested;
        for &child in layer.children() {
            self.visit(child, children_visible);
        }

        if owns_surface {
            self.finish_surface(layer, &geometry, subtree_visible);
        }
    }

    fn add_to_target(&mut self, target: LayerId, layer: LayerId, drawable: Rect) {
        if let Some(surface) = self.phase.surfaces.get_mut(&target) {
            surface.layer_list.push(layer);
            let content = self.accumulated.entry(target).or_default();
            *content = content.union(drawable);
        }
    }

    fn finish_surface(&mut self, layer: &Layer, geometry: &LayerGeometry, subtree_visible: bool) {
        let id = layer.id();
        let is_root = self.tree.root() == Some(id);
        let unclipped_descendants = self.meta.subtree(id).num_unclipped_descendants;
        let Some(surface) = self.phase.surfaces.get_mut(&id) else {
            return;
        };

        let mut content = if is_root {
            self.inputs.viewport_rect()
        } else {
            self.accumulated.get(&id).copied().unwrap_or_default()
        };
        if let Some(parent) = surface.target {
            if surface.replica_draw_transform.is_none()
                && !surface.target_surface_transforms_are_animating
                && unclipped_descendants == 0
            {
                let mut clip = self.clips.target_clip(parent);
                if surface.is_clipped {
                    clip = Some(clip.map_or(surface.clip_rect, |clip| clip.intersect(surface.clip_rect)));
                }
                if let Some(clip) = clip {
                    content = content.intersect(calculate_visible_rect(clip, content, &surface.draw_transform));
                }
            }
        }
        let max_texture_size = self.inputs.max_texture_size;
        content.width = content.width.min(max_texture_size);
        content.height = content.height.min(max_texture_size);
        surface.content_rect = content;

        let back_face_culled = !layer.double_sided() && surface_back_face_visible(layer, geometry);
        if !is_root && !layer.has_copy_request() && (content.is_empty() || back_face_culled) {
            trace!("{id:?} draws nothing; dropping its render surface");
            self.remove_surface(id);
            return;
        }

        if subtree_visible {
            if let Some(parent) = surface.target {
                let drawable = surface.drawable_content_rect().to_enclosing_rect();
                self.add_to_target(parent, id, drawable);
            }
        }
    }

    /// Takes `id` and the surfaces listed after it out of the list. Surfaces
    /// with copy requests stay listed.
    fn remove_surface(&mut self, id: LayerId) {
        let Some(position) = self.list.iter().rposition(|&surface| surface == id) else {
            return;
        };
        let removed = self.list.split_off(position);
        let mut dropped = vec![id];
        for &later in &removed[1..] {
            if self.tree[later].has_copy_request() {
                self.list.push(later);
            } else {
                dropped.push(later);
            }
        }
        for &surface in dropped.iter().rev() {
            self.discard_surface(surface);
        }
    }

    /// Forced surfaces survive outside the list. Any other surface goes away
    /// and whatever drew into it is moved to its target.
    fn discard_surface(&mut self, id: LayerId) {
        let forced = self
            .phase
            .surfaces
            .get(&id)
            .is_some_and(|surface| surface.reasons.contains(SurfaceReasons::FORCED));
        if forced {
            return;
        }
        let Some(surface) = self.phase.surfaces.remove(&id) else {
            return;
        };
        let Some(parent) = surface.target else {
            return;
        };

        for member in self.phase.members.remove(&id).unwrap_or_default() {
            if let Some(geometry) = self.phase.layers.get_mut(&member) {
                geometry.target = parent;
                geometry.draw_transform = surface.draw_transform * geometry.draw_transform;
                geometry.draw_opacity *= surface.draw_opacity;
                geometry.draw_transform_is_animating |= surface.target_surface_transforms_are_animating;
                geometry.draw_opacity_is_animating |= surface.draw_opacity_is_animating;
            }
            if let Some(clip) = self.clips.layer_clip(member) {
                self.clips.set_layer_clip(member, clip_in_target(&surface, clip, parent));
            }
            self.phase.members.entry(parent).or_default().push(member);
        }

        for other in self.phase.surfaces.values_mut() {
            if other.target != Some(id) {
                continue;
            }
            other.target = Some(parent);
            other.draw_transform = surface.draw_transform * other.draw_transform;
            other.replica_draw_transform = other
                .replica_draw_transform
                .map(|replica| surface.draw_transform * replica);
            other.target_surface_transforms_are_animating |= surface.target_surface_transforms_are_animating;
            other.draw_opacity *= surface.draw_opacity;
            let clip = ClipState {
                rect: other.clip_rect,
                clipped: other.is_clipped,
                space: id,
            };
            let clip = clip_in_target(&surface, clip, parent);
            other.clip_rect = clip.rect;
            other.is_clipped = clip.clipped;
        }
    }

    fn sorted_list(&self) -> Vec<LayerId> {
        let index: FxHashMap<LayerId, usize> = self
            .list
            .iter()
            .enumerate()
            .map(|(position, &id)| (id, position))
            .collect();
        let edges = self.list.iter().enumerate().filter_map(|(position, id)| {
            let target = self.phase.surfaces.get(id)?.target?;
            Some((*index.get(&target)?, position))
        });
        match stable_topological_order(self.list.len(), edges) {
            Some(order) => order.into_iter().map(|position| self.list[position]).collect(),
            None => {
                warn!("render surface targets form a cycle; keeping traversal order");
                self.list.clone()
            }
        }
    }

    /// Visible rects of layers drawing directly into listed surfaces. Other
    /// layers see nothing.
    fn visible_rects(&self, list: &[LayerId]) -> FxHashMap<LayerId, Rect> {
        let mut visible = FxHashMap::default();
        for &surface_id in list {
            let Some(surface) = self.phase.surfaces.get(&surface_id) else {
                continue;
            };
            let mut surface_rect = surface.content_rect;
            if let Some(clip) = self.clips.target_clip(surface_id) {
                surface_rect = surface_rect.intersect(clip);
            }
            for &layer_id in &surface.layer_list {
                if surface.contributes_as_surface(layer_id, self.phase.owns_surface(layer_id)) {
                    continue;
                }
                let Some(geometry) = self.phase.geometry(layer_id) else {
                    continue;
                };
                let mut target_rect = surface_rect;
                if let Some(clip) = self.clips.layer_clip(layer_id).filter(|clip| clip.clipped) {
                    target_rect = target_rect.intersect(clip.rect);
                }
                let bounds = self.tree[layer_id].bounds_rect();
                visible.insert(
                    layer_id,
                    calculate_visible_rect(target_rect, bounds, &geometry.draw_transform),
                );
            }
        }
        visible
    }

    fn draw_properties(
        &self,
        visible: &FxHashMap<LayerId, Rect>,
        list: &[LayerId],
    ) -> FxHashMap<LayerId, DrawProperties> {
        let mut out = FxHashMap::default();
        for &id in &self.meta.order {
            let Some(geometry) = self.phase.geometry(id).filter(|geometry| !geometry.skipped) else {
                continue;
            };
            let layer = &self.tree[id];
            let clip = self.clips.layer_clip(id);
            let bounds = layer.bounds_rect();
            let opaque_content_rect = if layer.contents_opaque() && geometry.draw_opacity == 1.0 {
                let opaque = map_enclosed_rect_with_2d_axis_aligned_transform(&geometry.draw_transform, bounds);
                clip_rect_if_clipped(opaque, clip)
            } else {
                Rect::default()
            };
            let clip = clip.unwrap_or(ClipState::unclipped(geometry.target));

            out.insert(
                id,
                DrawProperties {
                    target_space_transform: geometry.draw_transform,
                    screen_space_transform: geometry.screen_space_transform,
                    target_space_transform_is_animating: geometry.draw_transform_is_animating,
                    screen_space_transform_is_animating: geometry.screen_space_transform_is_animating,
                    draw_opacity: geometry.draw_opacity,
                    opacity_is_animating: geometry.draw_opacity_is_animating,
                    clip_rect: if clip.clipped { clip.rect } else { Rect::default() },
                    is_clipped: clip.clipped,
                    visible_layer_rect: visible.get(&id).copied().unwrap_or_default(),
                    drawable_content_rect: drawable_content_rect(layer, geometry, Some(clip)),
                    opaque_content_rect,
                    render_target: Some(geometry.target),
                    can_use_lcd_text: geometry.can_use_lcd_text,
                    ideal_contents_scale: geometry.ideal_contents_scale,
                    maximum_animation_contents_scale: geometry.maximum_animation_contents_scale,
                    num_unclipped_descendants: self.meta.subtree(id).num_unclipped_descendants,
                },
            );
        }

        for &surface_id in list {
            let (Some(surface), Some(owner_geometry)) =
                (self.phase.surfaces.get(&surface_id), self.phase.geometry(surface_id))
            else {
                continue;
            };
            let owner = &self.tree[surface_id];
            if let Some(mask) = owner.mask_layer().and_then(|mask| self.tree.layer(mask)) {
                out.insert(
                    mask.id(),
                    attached_layer_properties(
                        mask,
                        owner_geometry.draw_transform,
                        owner_geometry.screen_space_transform,
                        surface_id,
                    ),
                );
            }

            let Some(replica) = owner.replica_layer().and_then(|replica| self.tree.layer(replica)) else {
                continue;
            };
            let (Some(draw), Some(screen), Some(target)) = (
                surface.replica_draw_transform,
                surface.replica_screen_space_transform,
                surface.target,
            ) else {
                continue;
            };
            out.insert(replica.id(), attached_layer_properties(replica, draw, screen, target));
            if let Some(mask) = replica.mask_layer().and_then(|mask| self.tree.layer(mask)) {
                out.insert(mask.id(), attached_layer_properties(mask, draw, screen, target));
            }
        }
        out
    }
}

/// Writes the walk's results to the layers. Layers the walk did not reach
/// are reset to the default state.
pub(crate) fn commit(
    tree: &mut LayerTree,
    phase: TransformPhase,
    mut draw_properties: FxHashMap<LayerId, DrawProperties>,
    assignment: &NodeAssignment,
) {
    let ids: Vec<LayerId> = tree.layers().map(Layer::id).collect();
    for id in ids {
        let Some(layer) = tree.layer_mut_unchecked(id) else {
            continue;
        };
        layer.draw_properties = draw_properties.remove(&id).unwrap_or_default();
        layer.render_surface = None;
        match assignment.get(&id) {
            Some(indices) => {
                layer.transform_tree_index = indices.transform;
                layer.clip_tree_index = indices.clip;
                layer.effect_tree_index = indices.effect;
            }
            None => layer.reset_property_tree_indices(),
        }
    }
    for (owner, surface) in phase.surfaces {
        if let Some(layer) = tree.layer_mut_unchecked(owner) {
            layer.render_surface = Some(surface);
        }
    }
}

fn layer_should_be_skipped(layer: &Layer, geometry: &LayerGeometry) -> bool {
    !layer.draws_content() || layer.bounds().is_empty() || is_back_face_culled(layer, geometry)
}

/// Single-sided layers facing away are not drawn. Inside a shared 3D context
/// the accumulated transform decides; elsewhere the layer's own transform.
fn is_back_face_culled(layer: &Layer, geometry: &LayerGeometry) -> bool {
    if layer.double_sided() || geometry.screen_space_transform_is_animating {
        return false;
    }
    if geometry.in_existing_3d_context {
        geometry.draw_transform.is_back_face_visible()
    } else {
        layer.transform().is_back_face_visible()
    }
}

fn surface_back_face_visible(layer: &Layer, geometry: &LayerGeometry) -> bool {
    if geometry.in_existing_3d_context {
        geometry.combined.is_back_face_visible()
    } else if layer.is_3d_sorted() {
        layer.transform().is_back_face_visible()
    } else {
        false
    }
}

fn drawable_content_rect(layer: &Layer, geometry: &LayerGeometry, clip: Option<ClipState>) -> Rect {
    let rect = map_enclosing_clipped_rect(&geometry.draw_transform, layer.bounds_rect());
    clip_rect_if_clipped(rect, clip)
}

fn clip_rect_if_clipped(rect: Rect, clip: Option<ClipState>) -> Rect {
    match clip {
        Some(clip) if clip.clipped => rect.intersect(clip.rect),
        _ => rect,
    }
}

/// Clip of something drawn into `surface`, moved into the surface's target
/// after the surface was dropped.
fn clip_in_target(surface: &RenderSurface, clip: ClipState, target: LayerId) -> ClipState {
    let mut state = if clip.clipped {
        ClipState {
            rect: map_enclosing_clipped_rect(&surface.draw_transform, clip.rect),
            clipped: true,
            space: target,
        }
    } else {
        ClipState::unclipped(target)
    };
    if surface.is_clipped {
        state = state.intersect_rect(surface.clip_rect);
    }
    state
}

/// Masks and replicas cover their whole bounds and are placed by the surface
/// they belong to.
fn attached_layer_properties(layer: &Layer, draw: Transform, screen: Transform, target: LayerId) -> DrawProperties {
    let bounds = layer.bounds_rect();
    DrawProperties {
        target_space_transform: draw,
        screen_space_transform: screen,
        visible_layer_rect: bounds,
        drawable_content_rect: map_enclosing_clipped_rect(&draw, bounds),
        render_target: Some(target),
        ..DrawProperties::default()
    }
}
