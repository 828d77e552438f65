use slotmap::SlotMap;

use super::{
    BlendMode, CopyRequest, FilterOperations, Layer, LayerId, LayerRelations, PositionConstraint,
    RenderSurfaceList,
};
use crate::animation::{FilterAnimation, OpacityAnimation, TransformAnimation};
use crate::draw::{CalcDrawPropsInputs, PropertyTrees};
use crate::error::{LayerTreeError, Result};
use crate::math::{Point3F, PointF, Size, Transform, Vector2dF};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Invalidation {
    /// Values changed; the structure of surfaces and property trees holds.
    Update,
    /// Topology or an axis-alignment relevant property changed.
    Rebuild,
}

/// Arena owning every layer of one scene. Children are owned through their
/// parent's child list; masks, replicas and scroll/clip relations are plain
/// ids resolved through the arena.
#[derive(Debug, Default)]
pub struct LayerTree {
    layers: SlotMap<LayerId, Layer>,
    root: Option<LayerId>,
    needs_rebuild: bool,
    needs_update: bool,
    pub(crate) property_trees: PropertyTrees,
    pub(crate) last_frame: Option<(CalcDrawPropsInputs, RenderSurfaceList)>,
}

impl LayerTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_layer(&mut self) -> LayerId {
        self.layers.insert_with_key(Layer::new)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.values()
    }

    pub fn root(&self) -> Option<LayerId> {
        self.root
    }

    pub fn needs_rebuild(&self) -> bool {
        self.needs_rebuild
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update || self.needs_rebuild
    }

    pub fn property_trees(&self) -> &PropertyTrees {
        &self.property_trees
    }

    pub(crate) fn clear_invalidation(&mut self) {
        self.needs_rebuild = false;
        self.needs_update = false;
    }

    pub(crate) fn layer_mut_unchecked(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.get_mut(id)
    }

    fn get(&self, id: LayerId) -> Result<&Layer> {
        self.layers.get(id).ok_or(LayerTreeError::UnknownLayer(id))
    }

    fn layer_mut(&mut self, id: LayerId) -> Result<&mut Layer> {
        self.layers
            .get_mut(id)
            .ok_or(LayerTreeError::UnknownLayer(id))
    }

    fn invalidate(&mut self, invalidation: Invalidation) {
        self.needs_update = true;
        if invalidation == Invalidation::Rebuild {
            self.needs_rebuild = true;
        }
    }

    /// Whether `ancestor` is `layer` or lies on its parent chain.
    pub fn is_ancestor_or_self(&self, ancestor: LayerId, layer: LayerId) -> bool {
        let mut current = Some(layer);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.layers.get(id).and_then(|layer| layer.parent);
        }
        false
    }

    /// Pre-order list of `id` and its descendants. Masks and replicas are not
    /// part of the child hierarchy and are not listed.
    pub fn subtree(&self, id: LayerId) -> Vec<LayerId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(layer) = self.layers.get(current) else {
                continue;
            };
            out.push(current);
            stack.extend(layer.children.iter().rev());
        }
        out
    }

    pub fn set_root(&mut self, root: Option<LayerId>) -> Result<()> {
        if let Some(id) = root {
            let layer = self.get(id)?;
            if layer.parent.is_some() || layer.owner.is_some() {
                return Err(LayerTreeError::AlreadyAttached { layer: id });
            }
        }
        if self.root == root {
            return Ok(());
        }
        if let Some(old) = self.root {
            self.reset_subtree(old);
        }
        self.root = root;
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    pub fn add_child(&mut self, parent: LayerId, child: LayerId) -> Result<()> {
        let index = self.get(parent)?.children.len();
        self.insert_child(parent, child, index)
    }

    /// Inserts `child` at `index` (clamped) in `parent`'s child list, first
    /// detaching it from any previous parent.
    pub fn insert_child(&mut self, parent: LayerId, child: LayerId, index: usize) -> Result<()> {
        self.check_attachable(parent, child)?;
        if self.get(child)?.parent.is_some() {
            self.remove_from_parent(child)?;
        }
        let parent_layer = self.layer_mut(parent)?;
        let index = index.min(parent_layer.children.len());
        parent_layer.children.insert(index, child);
        self.layer_mut(child)?.parent = Some(parent);
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    fn check_attachable(&self, parent: LayerId, child: LayerId) -> Result<()> {
        self.get(parent)?;
        let child_layer = self.get(child)?;
        if parent == child {
            return Err(LayerTreeError::SelfReference {
                layer: child,
                relation: "child",
            });
        }
        if child_layer.owner.is_some() || self.root == Some(child) {
            return Err(LayerTreeError::AlreadyAttached { layer: child });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(LayerTreeError::Cycle { parent, child });
        }
        Ok(())
    }

    /// Detaches `child` and its subtree. The layers stay in the arena and can
    /// be attached again.
    pub fn remove_from_parent(&mut self, child: LayerId) -> Result<()> {
        let Some(parent) = self.get(child)?.parent else {
            return Ok(());
        };
        if let Some(parent_layer) = self.layers.get_mut(parent) {
            parent_layer.children.retain(|&id| id != child);
        }
        self.layer_mut(child)?.parent = None;
        self.reset_subtree(child);
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    pub fn replace_child(&mut self, parent: LayerId, old: LayerId, new: LayerId) -> Result<()> {
        let index = self
            .get(parent)?
            .children
            .iter()
            .position(|&id| id == old)
            .ok_or(LayerTreeError::NotAChild { parent, child: old })?;
        if old == new {
            return Ok(());
        }
        self.check_attachable(parent, new)?;
        self.remove_from_parent(old)?;
        // Detaching `new` from this same parent may shift `old`'s slot.
        let index = if self.get(new)?.parent == Some(parent) {
            let new_index = self.get(parent)?.children.iter().position(|&id| id == new);
            match new_index {
                Some(new_index) if new_index < index => index - 1,
                _ => index,
            }
        } else {
            index
        };
        self.insert_child(parent, new, index)
    }

    /// Removes `id` with its subtree, masks and replicas from the arena.
    /// Relations that pointed at removed layers are cleared.
    pub fn destroy_layer(&mut self, id: LayerId) -> Result<()> {
        let layer = self.get(id)?;
        let owner = layer.owner;
        self.remove_from_parent(id)?;
        if let Some(owner_layer) = owner.and_then(|owner| self.layers.get_mut(owner)) {
            if owner_layer.mask_layer == Some(id) {
                owner_layer.mask_layer = None;
            }
            if owner_layer.replica_layer == Some(id) {
                owner_layer.replica_layer = None;
            }
        }
        if self.root == Some(id) {
            self.root = None;
        }

        let mut doomed = Vec::new();
        self.collect_owned(id, &mut doomed);
        let removed: Vec<Layer> = doomed
            .iter()
            .filter_map(|&doomed_id| self.layers.remove(doomed_id))
            .collect();
        for layer in &removed {
            if let Some(scroll_parent) = layer.scroll_parent.and_then(|p| self.layers.get_mut(p)) {
                scroll_parent.scroll_children.retain(|&c| c != layer.id);
            }
            if let Some(clip_parent) = layer.clip_parent.and_then(|p| self.layers.get_mut(p)) {
                clip_parent.clip_children.retain(|&c| c != layer.id);
            }
            for &child in &layer.scroll_children {
                if let Some(child) = self.layers.get_mut(child) {
                    child.scroll_parent = None;
                }
            }
            for &child in &layer.clip_children {
                if let Some(child) = self.layers.get_mut(child) {
                    child.clip_parent = None;
                }
            }
        }
        for survivor in self.layers.values_mut() {
            if survivor
                .scroll_clip_layer
                .is_some_and(|clip| doomed.contains(&clip))
            {
                survivor.scroll_clip_layer = None;
            }
        }
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    fn collect_owned(&self, id: LayerId, out: &mut Vec<LayerId>) {
        let Some(layer) = self.layers.get(id) else {
            return;
        };
        out.push(id);
        for &child in &layer.children {
            self.collect_owned(child, out);
        }
        for attached in [layer.mask_layer, layer.replica_layer].into_iter().flatten() {
            self.collect_owned(attached, out);
        }
    }

    /// Drops cached traversal state of a detached subtree.
    fn reset_subtree(&mut self, id: LayerId) {
        let mut owned = Vec::new();
        self.collect_owned(id, &mut owned);
        for id in owned {
            if let Some(layer) = self.layers.get_mut(id) {
                layer.reset_property_tree_indices();
                layer.draw_properties = Default::default();
                layer.render_surface = None;
            }
        }
    }

    pub fn set_mask_layer(&mut self, id: LayerId, mask: Option<LayerId>) -> Result<()> {
        self.set_attached_layer(id, mask, "mask", |layer| &mut layer.mask_layer)
    }

    pub fn set_replica_layer(&mut self, id: LayerId, replica: Option<LayerId>) -> Result<()> {
        self.set_attached_layer(id, replica, "replica", |layer| &mut layer.replica_layer)
    }

    fn set_attached_layer(
        &mut self,
        id: LayerId,
        attached: Option<LayerId>,
        relation: &'static str,
        slot: fn(&mut Layer) -> &mut Option<LayerId>,
    ) -> Result<()> {
        let current = *slot(self.layer_mut(id)?);
        if current == attached {
            return Ok(());
        }
        if let Some(new) = attached {
            if new == id {
                return Err(LayerTreeError::SelfReference { layer: id, relation });
            }
            let layer = self.get(new)?;
            if layer.parent.is_some() || layer.owner.is_some() || self.root == Some(new) {
                return Err(LayerTreeError::AlreadyAttached { layer: new });
            }
            if self.is_ancestor_or_self(new, id) {
                return Err(LayerTreeError::Cycle {
                    parent: id,
                    child: new,
                });
            }
        }
        if let Some(old) = current {
            if let Some(old_layer) = self.layers.get_mut(old) {
                old_layer.owner = None;
            }
            self.reset_subtree(old);
        }
        *slot(self.layer_mut(id)?) = attached;
        if let Some(new) = attached {
            self.layer_mut(new)?.owner = Some(id);
        }
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    /// Makes `id` scroll with `scroll_parent` even though it is not a
    /// descendant of it.
    pub fn set_scroll_parent(&mut self, id: LayerId, scroll_parent: Option<LayerId>) -> Result<()> {
        self.set_relation(
            id,
            scroll_parent,
            "scroll parent",
            |layer| &mut layer.scroll_parent,
            |layer| &mut layer.scroll_children,
        )
    }

    /// Makes `id` clipped by `clip_parent` instead of its tree ancestors.
    pub fn set_clip_parent(&mut self, id: LayerId, clip_parent: Option<LayerId>) -> Result<()> {
        self.set_relation(
            id,
            clip_parent,
            "clip parent",
            |layer| &mut layer.clip_parent,
            |layer| &mut layer.clip_children,
        )
    }

    fn set_relation(
        &mut self,
        id: LayerId,
        target: Option<LayerId>,
        relation: &'static str,
        forward: fn(&mut Layer) -> &mut Option<LayerId>,
        backward: fn(&mut Layer) -> &mut Vec<LayerId>,
    ) -> Result<()> {
        let current = *forward(self.layer_mut(id)?);
        if current == target {
            return Ok(());
        }
        if let Some(new) = target {
            if new == id {
                return Err(LayerTreeError::SelfReference { layer: id, relation });
            }
            self.get(new)?;
        }
        if let Some(old) = current.and_then(|old| self.layers.get_mut(old)) {
            backward(old).retain(|&child| child != id);
        }
        *forward(self.layer_mut(id)?) = target;
        if let Some(new) = target {
            backward(self.layer_mut(new)?).push(id);
        }
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    pub fn set_scroll_clip_layer(&mut self, id: LayerId, clip_layer: Option<LayerId>) -> Result<()> {
        if let Some(clip) = clip_layer {
            if clip == id {
                return Err(LayerTreeError::SelfReference {
                    layer: id,
                    relation: "scroll clip layer",
                });
            }
            self.get(clip)?;
        }
        let layer = self.layer_mut(id)?;
        if layer.scroll_clip_layer != clip_layer {
            layer.scroll_clip_layer = clip_layer;
            self.invalidate(Invalidation::Update);
        }
        Ok(())
    }

    /// Translation-only changes keep the property tree structure.
    pub fn set_transform(&mut self, id: LayerId, transform: Transform) -> Result<()> {
        let layer = self.layer_mut(id)?;
        if layer.transform == transform {
            return Ok(());
        }
        let translation_only =
            layer.transform.is_identity_or_translation() && transform.is_identity_or_translation();
        layer.transform = transform;
        self.invalidate(if translation_only {
            Invalidation::Update
        } else {
            Invalidation::Rebuild
        });
        Ok(())
    }

    /// Opacity is clamped to `[0, 1]`; NaN counts as opaque.
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> Result<()> {
        let opacity = if opacity.is_nan() {
            1.0
        } else {
            opacity.clamp(0.0, 1.0)
        };
        let layer = self.layer_mut(id)?;
        if layer.opacity == opacity {
            return Ok(());
        }
        let old = layer.opacity;
        layer.opacity = opacity;
        // Crossing 1 can promote a surface, crossing 0 can skip a subtree.
        let structural = (old < 1.0) != (opacity < 1.0) || (old == 0.0) != (opacity == 0.0);
        self.invalidate(if structural {
            Invalidation::Rebuild
        } else {
            Invalidation::Update
        });
        Ok(())
    }

    pub fn set_bounds(&mut self, id: LayerId, bounds: Size) -> Result<()> {
        let layer = self.layer_mut(id)?;
        if layer.bounds == bounds {
            return Ok(());
        }
        let structural = layer.bounds.is_empty() != bounds.is_empty();
        layer.bounds = bounds;
        self.invalidate(if structural {
            Invalidation::Rebuild
        } else {
            Invalidation::Update
        });
        Ok(())
    }

    pub fn request_copy(&mut self, id: LayerId, request: CopyRequest) -> Result<()> {
        self.layer_mut(id)?.copy_requests.push(request);
        self.invalidate(Invalidation::Rebuild);
        Ok(())
    }

    /// Hands pending copy requests to the caller, typically once the frame
    /// that serves them has been drawn.
    pub fn take_copy_requests(&mut self, id: LayerId) -> Result<Vec<CopyRequest>> {
        let requests = std::mem::take(&mut self.layer_mut(id)?.copy_requests);
        if !requests.is_empty() {
            self.invalidate(Invalidation::Rebuild);
        }
        Ok(requests)
    }

    /// How far `id` can scroll inside its scroll clip layer. Zero for layers
    /// that are not scrollable.
    pub fn max_scroll_offset(&self, id: LayerId) -> Result<Vector2dF> {
        let layer = self.get(id)?;
        let Some(clip) = layer.scroll_clip_layer.and_then(|clip| self.layers.get(clip)) else {
            return Ok(Vector2dF::default());
        };
        let viewport_width = clip.bounds.width as f32 + clip.bounds_delta.x;
        let viewport_height = clip.bounds.height as f32 + clip.bounds_delta.y;
        Ok(Vector2dF::new(
            (layer.bounds.width as f32 - viewport_width).max(0.0),
            (layer.bounds.height as f32 - viewport_height).max(0.0),
        ))
    }

    /// Scrolls by `delta` within `[0, max_scroll_offset]` and returns the part
    /// of the delta that could not be applied.
    pub fn scroll_by(&mut self, id: LayerId, delta: Vector2dF) -> Result<Vector2dF> {
        let max = self.max_scroll_offset(id)?;
        let layer = self.layer_mut(id)?;
        if layer.scroll_clip_layer.is_none() || !(delta.x.is_finite() && delta.y.is_finite()) {
            return Ok(delta);
        }
        let current = layer.total_scroll_offset();
        let wanted = current + delta;
        let clamped = Vector2dF::new(wanted.x.clamp(0.0, max.x), wanted.y.clamp(0.0, max.y));
        if clamped != current {
            layer.scroll_delta = clamped - layer.scroll_offset;
            self.invalidate(Invalidation::Update);
        }
        Ok(wanted - clamped)
    }

    /// Folds the scroll delta into the scroll offset.
    pub fn commit_scroll_delta(&mut self, id: LayerId) -> Result<()> {
        let layer = self.layer_mut(id)?;
        if layer.scroll_delta.is_zero() {
            return Ok(());
        }
        layer.scroll_offset = layer.total_scroll_offset();
        layer.scroll_delta = Vector2dF::default();
        Ok(())
    }
}

macro_rules! property_setters {
    ($($(#[$meta:meta])* $setter:ident($field:ident: $ty:ty) => $invalidation:ident;)*) => {
        impl LayerTree {
            $(
                $(#[$meta])*
                pub fn $setter(&mut self, id: LayerId, value: $ty) -> Result<()> {
                    let layer = self.layer_mut(id)?;
                    if layer.$field == value {
                        return Ok(());
                    }
                    layer.$field = value;
                    self.invalidate(Invalidation::$invalidation);
                    Ok(())
                }
            )*
        }
    };
}

property_setters! {
    set_transform_origin(transform_origin: Point3F) => Update;
    set_position(position: PointF) => Update;
    set_sorting_context_id(sorting_context_id: i32) => Rebuild;
    set_should_flatten_transform(should_flatten_transform: bool) => Rebuild;
    set_double_sided(double_sided: bool) => Update;
    set_blend_mode(blend_mode: BlendMode) => Rebuild;
    set_masks_to_bounds(masks_to_bounds: bool) => Rebuild;
    set_hide_layer_and_subtree(hide_layer_and_subtree: bool) => Rebuild;
    set_force_render_surface(force_render_surface: bool) => Rebuild;
    set_filters(filters: FilterOperations) => Rebuild;
    set_contents_opaque(contents_opaque: bool) => Update;
    set_draws_content(draws_content: bool) => Rebuild;
    /// Layers with input handlers stay hit-testable when fully transparent.
    set_has_input_handler(has_input_handler: bool) => Rebuild;
    set_scroll_offset(scroll_offset: Vector2dF) => Update;
    set_scroll_delta(scroll_delta: Vector2dF) => Update;
    set_is_container_for_fixed_position_layers(is_container_for_fixed_position_layers: bool) => Update;
    set_position_constraint(position_constraint: PositionConstraint) => Update;
    /// Growth of the layer's bounds not yet committed, e.g. while the
    /// viewport resizes.
    set_bounds_delta(bounds_delta: Vector2dF) => Update;
    set_transform_animation(transform_animation: Option<TransformAnimation>) => Rebuild;
    set_opacity_animation(opacity_animation: Option<OpacityAnimation>) => Rebuild;
    set_filter_animation(filter_animation: Option<FilterAnimation>) => Rebuild;
}

impl std::ops::Index<LayerId> for LayerTree {
    type Output = Layer;

    fn index(&self, id: LayerId) -> &Layer {
        &self.layers[id]
    }
}

impl LayerRelations for LayerTree {
    fn scroll_parent(&self, layer: LayerId) -> Option<LayerId> {
        self.layers.get(layer).and_then(|layer| layer.scroll_parent)
    }

    fn clip_parent(&self, layer: LayerId) -> Option<LayerId> {
        self.layers.get(layer).and_then(|layer| layer.clip_parent)
    }
}

impl LayerTree {
    /// Layers reachable from the root through child lists, in pre-order.
    pub(crate) fn attached_layers(&self) -> Vec<LayerId> {
        match self.root {
            Some(root) => self.subtree(root),
            None => Vec::new(),
        }
    }
}
