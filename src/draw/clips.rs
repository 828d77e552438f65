//! Clip resolution. Each layer's clip is looked up by id through its clip
//! source (clip parent, scroll parent or tree parent) instead of being
//! carried down the walk, so relations pointing later in paint order resolve
//! the same way as ones pointing earlier.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use super::CalcDrawPropsInputs;
use super::meta::MetaInformation;
use super::transforms::TransformPhase;
use crate::layer::{LayerId, LayerTree};
use crate::math::{Rect, map_enclosing_clipped_rect, project_enclosing_clipped_rect};

/// A clip rect together with the surface space it is expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ClipState {
    pub(crate) rect: Rect,
    pub(crate) clipped: bool,
    /// Owner of the render surface whose space `rect` is in.
    pub(crate) space: LayerId,
}

impl ClipState {
    pub(crate) fn unclipped(space: LayerId) -> Self {
        Self {
            rect: Rect::default(),
            clipped: false,
            space,
        }
    }

    pub(crate) fn intersect_rect(self, rect: Rect) -> Self {
        let rect = if self.clipped { self.rect.intersect(rect) } else { rect };
        Self {
            rect,
            clipped: true,
            space: self.space,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct ClipPhase {
    /// Clip applied to each layer's own content, in its target's space.
    layer_clips: FxHashMap<LayerId, ClipState>,
    /// Clip handed to each layer's children.
    children_clips: FxHashMap<LayerId, ClipState>,
    /// Region of each surface that can reach the screen, in surface space.
    /// `None` when nothing bounds it.
    target_clips: FxHashMap<LayerId, Option<Rect>>,
}

impl ClipPhase {
    pub(crate) fn layer_clip(&self, layer: LayerId) -> Option<ClipState> {
        self.layer_clips.get(&layer).copied()
    }

    pub(crate) fn set_layer_clip(&mut self, layer: LayerId, clip: ClipState) {
        self.layer_clips.insert(layer, clip);
    }

    pub(crate) fn children_clip(&self, layer: LayerId) -> Option<ClipState> {
        self.children_clips.get(&layer).copied()
    }

    pub(crate) fn target_clip(&self, surface: LayerId) -> Option<Rect> {
        self.target_clips.get(&surface).copied().flatten()
    }
}

pub(crate) fn resolve_clips(
    tree: &LayerTree,
    inputs: &CalcDrawPropsInputs,
    meta: &MetaInformation,
    phase: &mut TransformPhase,
) -> ClipPhase {
    let mut resolver = ClipResolver {
        tree,
        meta,
        phase: &*phase,
        incoming: FxHashMap::default(),
        children: FxHashMap::default(),
        in_progress: FxHashSet::default(),
    };

    let mut layer_clips = FxHashMap::default();
    let mut surface_clips = Vec::new();
    for &id in &meta.order {
        if resolver.phase.geometry(id).is_none_or(|geometry| geometry.skipped) {
            continue;
        }
        let incoming = resolver.incoming(id);
        resolver.children_clip(id);
        let layer_clip = if resolver.phase.owns_surface(id) {
            let clipped = resolver.surface_is_clipped(id);
            surface_clips.push((id, incoming.rect, clipped));
            if clipped {
                ClipState::unclipped(id)
            } else {
                resolver.convert(incoming, id)
            }
        } else {
            incoming
        };
        layer_clips.insert(id, layer_clip);
    }
    let children_clips = resolver.children;

    for (id, rect, clipped) in surface_clips {
        if let Some(surface) = phase.surfaces.get_mut(&id) {
            surface.is_clipped = clipped;
            surface.clip_rect = if clipped { rect } else { Rect::default() };
        }
    }

    let mut target_clips: FxHashMap<LayerId, Option<Rect>> = FxHashMap::default();
    for &id in &meta.order {
        let Some(surface) = phase.surfaces.get(&id) else {
            continue;
        };
        let clip = match surface.target {
            None => Some(inputs.viewport_rect()),
            Some(parent) => {
                let mut clip = target_clips.get(&parent).copied().flatten();
                if surface.is_clipped {
                    clip = Some(clip.map_or(surface.clip_rect, |clip| clip.intersect(surface.clip_rect)));
                }
                clip.and_then(|clip| {
                    surface
                        .draw_transform
                        .inverse()
                        .map(|inverse| project_enclosing_clipped_rect(&inverse, clip))
                })
            }
        };
        target_clips.insert(id, clip);
    }

    ClipPhase {
        layer_clips,
        children_clips,
        target_clips,
    }
}

struct ClipResolver<'a> {
    tree: &'a LayerTree,
    meta: &'a MetaInformation,
    phase: &'a TransformPhase,
    incoming: FxHashMap<LayerId, ClipState>,
    children: FxHashMap<LayerId, ClipState>,
    in_progress: FxHashSet<LayerId>,
}

impl ClipResolver<'_> {
    /// Space in which `layer`'s children are laid out.
    fn children_space(&self, layer: LayerId) -> LayerId {
        if self.phase.owns_surface(layer) {
            return layer;
        }
        self.phase.geometry(layer).map_or(layer, |geometry| geometry.target)
    }

    /// Clip reaching `layer` from its clip source, in the space of its tree
    /// parent's children.
    fn incoming(&mut self, layer: LayerId) -> ClipState {
        if let Some(&state) = self.incoming.get(&layer) {
            return state;
        }
        let Some(parent) = self.tree[layer].parent() else {
            return ClipState::unclipped(layer);
        };
        let space = self.children_space(parent);
        let source_clip = match self.meta.relations.clip_source(layer) {
            Some(source) => self.children_clip(source).or_else(|| {
                warn!("clip of {layer:?} depends on itself through {source:?}; using its parent's clip");
                self.children_clip(parent)
            }),
            None => self.children_clip(parent),
        };
        let state = match source_clip {
            Some(state) => self.convert(state, space),
            None => {
                warn!("clip of {layer:?} is cyclic; leaving it unclipped");
                ClipState::unclipped(space)
            }
        };
        self.incoming.insert(layer, state);
        state
    }

    /// A surface clips as a whole unless some descendant takes its clip from
    /// outside the surface's subtree.
    fn surface_is_clipped(&mut self, layer: LayerId) -> bool {
        self.incoming(layer).clipped && self.meta.subtree(layer).num_unclipped_descendants == 0
    }

    /// `None` while `layer` is already being resolved further up the stack.
    fn children_clip(&mut self, layer: LayerId) -> Option<ClipState> {
        if let Some(&state) = self.children.get(&layer) {
            return Some(state);
        }
        if !self.in_progress.insert(layer) {
            return None;
        }

        let mut state = if self.tree.root() == Some(layer) {
            ClipState::unclipped(layer)
        } else if self.phase.owns_surface(layer) {
            if self.surface_is_clipped(layer) {
                ClipState::unclipped(layer)
            } else {
                let incoming = self.incoming(layer);
                self.convert(incoming, layer)
            }
        } else {
            self.incoming(layer)
        };

        let owner = &self.tree[layer];
        if owner.masks_to_bounds() {
            if let Some(geometry) = self.phase.geometry(layer) {
                let bounds = map_enclosing_clipped_rect(&geometry.draw_transform, owner.bounds_rect());
                state = state.intersect_rect(bounds);
            }
        }

        self.in_progress.remove(&layer);
        self.children.insert(layer, state);
        Some(state)
    }

    /// Re-expresses `state` in the space of the surface owned by `space`.
    /// Anything that cannot be mapped becomes unclipped.
    fn convert(&self, state: ClipState, space: LayerId) -> ClipState {
        if state.space == space {
            return state;
        }
        if !state.clipped {
            return ClipState::unclipped(space);
        }
        let Some(destination) = self.phase.surfaces.get(&space) else {
            return ClipState::unclipped(space);
        };

        let rect = if destination.target == Some(state.space) {
            destination
                .draw_transform
                .inverse()
                .map(|inverse| project_enclosing_clipped_rect(&inverse, state.rect))
        } else {
            self.phase.surfaces.get(&state.space).and_then(|source| {
                let in_screen = map_enclosing_clipped_rect(&source.screen_space_transform, state.rect);
                destination
                    .screen_space_transform
                    .inverse()
                    .map(|inverse| project_enclosing_clipped_rect(&inverse, in_screen))
            })
        };

        match rect {
            Some(rect) => ClipState {
                rect,
                clipped: true,
                space,
            },
            None => ClipState::unclipped(space),
        }
    }
}
