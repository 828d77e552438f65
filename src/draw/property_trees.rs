//! Compact transform, clip and effect trees mirroring the layer tree.
//!
//! A layer gets a node in a tree only when it changes that property relative
//! to its parent; other layers share their parent's node index.

use log::debug;
use rustc_hash::FxHashMap;

use super::CalcDrawPropsInputs;
use super::clips::ClipPhase;
use super::meta::MetaInformation;
use super::transforms::TransformPhase;
use crate::layer::{INVALID_PROPERTY_TREE_INDEX, Layer, LayerId, LayerTree};
use crate::math::{Rect, Transform};

#[derive(Clone, Debug, PartialEq)]
pub struct TransformNode {
    pub id: i32,
    pub parent_id: i32,
    pub owner: LayerId,
    /// Owner's transform relative to its parent, scroll and position included.
    pub local: Transform,
    pub to_screen: Transform,
    pub flattens_inherited_transform: bool,
    pub sorting_context_id: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClipNode {
    pub id: i32,
    pub parent_id: i32,
    pub owner: LayerId,
    /// Clip handed to the owner's descendants, in the space of `target`.
    pub clip: Rect,
    pub is_clipped: bool,
    pub target: LayerId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EffectNode {
    pub id: i32,
    pub parent_id: i32,
    pub owner: LayerId,
    pub opacity: f32,
    pub screen_space_opacity: f32,
    pub has_render_surface: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PropertyTrees {
    transform_nodes: Vec<TransformNode>,
    clip_nodes: Vec<ClipNode>,
    effect_nodes: Vec<EffectNode>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct PropertyTreeIndices {
    pub(crate) transform: i32,
    pub(crate) clip: i32,
    pub(crate) effect: i32,
}

pub(crate) type NodeAssignment = FxHashMap<LayerId, PropertyTreeIndices>;

/// Which layers own nodes and how the nodes nest, without node values.
#[derive(Debug, Default)]
struct NodeLayout {
    transform: Vec<(LayerId, i32)>,
    clip: Vec<(LayerId, i32)>,
    effect: Vec<(LayerId, i32)>,
    assignment: NodeAssignment,
}

impl PropertyTrees {
    pub fn is_empty(&self) -> bool {
        self.transform_nodes.is_empty()
    }

    pub fn transform_nodes(&self) -> &[TransformNode] {
        &self.transform_nodes
    }

    pub fn clip_nodes(&self) -> &[ClipNode] {
        &self.clip_nodes
    }

    pub fn effect_nodes(&self) -> &[EffectNode] {
        &self.effect_nodes
    }

    pub fn transform_node(&self, index: i32) -> Option<&TransformNode> {
        usize::try_from(index).ok().and_then(|index| self.transform_nodes.get(index))
    }

    pub fn clip_node(&self, index: i32) -> Option<&ClipNode> {
        usize::try_from(index).ok().and_then(|index| self.clip_nodes.get(index))
    }

    pub fn effect_node(&self, index: i32) -> Option<&EffectNode> {
        usize::try_from(index).ok().and_then(|index| self.effect_nodes.get(index))
    }

    /// Restructures the trees when asked to or when the set of node owners
    /// changed, then refreshes every node's values.
    pub(crate) fn refresh(
        &mut self,
        tree: &LayerTree,
        inputs: &CalcDrawPropsInputs,
        meta: &MetaInformation,
        phase: &TransformPhase,
        clips: &ClipPhase,
        needs_rebuild: bool,
    ) -> NodeAssignment {
        let layout = NodeLayout::collect(tree, inputs, meta, phase);
        if needs_rebuild || self.is_empty() || !self.matches(&layout) {
            debug!(
                "rebuilding property trees: {} transform, {} clip, {} effect nodes",
                layout.transform.len(),
                layout.clip.len(),
                layout.effect.len()
            );
            self.rebuild(&layout);
        }
        self.update_values(tree, phase, clips);
        layout.assignment
    }

    fn matches(&self, layout: &NodeLayout) -> bool {
        let same = |owners: &[(LayerId, i32)], nodes: Vec<(LayerId, i32)>| owners == nodes.as_slice();
        same(
            &layout.transform,
            self.transform_nodes.iter().map(|node| (node.owner, node.parent_id)).collect(),
        ) && same(
            &layout.clip,
            self.clip_nodes.iter().map(|node| (node.owner, node.parent_id)).collect(),
        ) && same(
            &layout.effect,
            self.effect_nodes.iter().map(|node| (node.owner, node.parent_id)).collect(),
        )
    }

    fn rebuild(&mut self, layout: &NodeLayout) {
        self.transform_nodes = layout
            .transform
            .iter()
            .enumerate()
            .map(|(id, &(owner, parent_id))| TransformNode {
                id: id as i32,
                parent_id,
                owner,
                local: Transform::identity(),
                to_screen: Transform::identity(),
                flattens_inherited_transform: true,
                sorting_context_id: 0,
            })
            .collect();
        self.clip_nodes = layout
            .clip
            .iter()
            .enumerate()
            .map(|(id, &(owner, parent_id))| ClipNode {
                id: id as i32,
                parent_id,
                owner,
                clip: Rect::default(),
                is_clipped: false,
                target: owner,
            })
            .collect();
        self.effect_nodes = layout
            .effect
            .iter()
            .enumerate()
            .map(|(id, &(owner, parent_id))| EffectNode {
                id: id as i32,
                parent_id,
                owner,
                opacity: 1.0,
                screen_space_opacity: 1.0,
                has_render_surface: false,
            })
            .collect();
    }

    fn update_values(&mut self, tree: &LayerTree, phase: &TransformPhase, clips: &ClipPhase) {
        for node in &mut self.transform_nodes {
            let Some(geometry) = phase.geometry(node.owner) else {
                continue;
            };
            let owner = &tree[node.owner];
            node.local = geometry.local_transform;
            node.to_screen = geometry.screen_space_transform;
            node.flattens_inherited_transform = owner
                .parent()
                .is_none_or(|parent| tree[parent].should_flatten_transform());
            node.sorting_context_id = owner.sorting_context_id();
        }

        for node in &mut self.clip_nodes {
            let target = phase.geometry(node.owner).map_or(node.owner, |geometry| geometry.target);
            match clips.children_clip(node.owner) {
                Some(clip) => {
                    node.clip = if clip.clipped { clip.rect } else { Rect::default() };
                    node.is_clipped = clip.clipped;
                    node.target = clip.space;
                }
                None => {
                    node.clip = Rect::default();
                    node.is_clipped = false;
                    node.target = target;
                }
            }
        }

        for index in 0..self.effect_nodes.len() {
            let parent_opacity = usize::try_from(self.effect_nodes[index].parent_id)
                .ok()
                .and_then(|parent| self.effect_nodes.get(parent))
                .map_or(1.0, |parent| parent.screen_space_opacity);
            let node = &mut self.effect_nodes[index];
            let opacity = tree[node.owner].opacity();
            node.opacity = opacity;
            node.screen_space_opacity = parent_opacity * opacity;
            node.has_render_surface = phase.owns_surface(node.owner);
        }
    }
}

impl NodeLayout {
    fn collect(
        tree: &LayerTree,
        inputs: &CalcDrawPropsInputs,
        meta: &MetaInformation,
        phase: &TransformPhase,
    ) -> Self {
        let mut layout = NodeLayout::default();
        let unassigned = PropertyTreeIndices {
            transform: INVALID_PROPERTY_TREE_INDEX,
            clip: INVALID_PROPERTY_TREE_INDEX,
            effect: INVALID_PROPERTY_TREE_INDEX,
        };

        for &id in &meta.order {
            let layer = &tree[id];
            let is_root = tree.root() == Some(id);
            let owns_surface = phase.owns_surface(id);
            let inherited = layer
                .parent()
                .and_then(|parent| layout.assignment.get(&parent).copied())
                .unwrap_or(unassigned);
            let mut indices = inherited;

            if is_root || owns_surface || creates_transform_node(layer, inputs) {
                indices.transform = layout.transform.len() as i32;
                layout.transform.push((id, inherited.transform));
            }
            if is_root || owns_surface || layer.masks_to_bounds() || meta.relations.has_relation(id) {
                indices.clip = layout.clip.len() as i32;
                layout.clip.push((id, INVALID_PROPERTY_TREE_INDEX));
            }
            if is_root || owns_surface || layer.opacity() != 1.0 || layer.opacity_is_animating() {
                indices.effect = layout.effect.len() as i32;
                layout.effect.push((id, inherited.effect));
            }
            layout.assignment.insert(id, indices);
        }

        layout.link_clip_nodes(tree, meta);
        layout
    }

    /// Clip nodes hang under the node of their clip source, which may come
    /// later in paint order. A link that would close a loop falls back to the
    /// tree parent.
    fn link_clip_nodes(&mut self, tree: &LayerTree, meta: &MetaInformation) {
        for index in 0..self.clip.len() {
            let owner = self.clip[index].0;
            let tree_parent = tree[owner]
                .parent()
                .and_then(|parent| self.assignment.get(&parent))
                .map_or(INVALID_PROPERTY_TREE_INDEX, |indices| indices.clip);
            let source = meta
                .relations
                .clip_source(owner)
                .and_then(|source| self.assignment.get(&source))
                .map(|indices| indices.clip);

            let parent = source
                .into_iter()
                .chain(std::iter::once(tree_parent))
                .find(|&parent| !self.reaches(parent, index as i32))
                .unwrap_or(INVALID_PROPERTY_TREE_INDEX);
            self.clip[index].1 = parent;
        }
    }

    /// Whether following clip parents from `from` arrives at `node`.
    fn reaches(&self, from: i32, node: i32) -> bool {
        let mut current = from;
        for _ in 0..=self.clip.len() {
            if current == node {
                return true;
            }
            match usize::try_from(current).ok().and_then(|index| self.clip.get(index)) {
                Some(&(_, parent)) => current = parent,
                None => return false,
            }
        }
        true
    }
}

fn creates_transform_node(layer: &Layer, inputs: &CalcDrawPropsInputs) -> bool {
    !layer.transform().is_identity_or_translation()
        || inputs.page_scale_layer == Some(layer.id())
        || layer.is_3d_sorted()
        || !layer.should_flatten_transform()
}
