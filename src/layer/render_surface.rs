use bitflags::bitflags;

use super::{FilterOutsets, LayerId};
use crate::math::{Rect, RectF, Transform, map_clipped_rect};

bitflags! {
    /// Why a layer was promoted to its own render surface.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SurfaceReasons: u32 {
        const ROOT = 1 << 0;
        const FORCED = 1 << 1;
        const COPY_REQUEST = 1 << 2;
        const MASK = 1 << 3;
        const REPLICA = 1 << 4;
        const FILTERS = 1 << 5;
        const BLEND_MODE = 1 << 6;
        const FLATTENS_3D_CONTEXT = 1 << 7;
        const NON_AXIS_ALIGNED_CLIP = 1 << 8;
        const CLIP_CHILDREN = 1 << 9;
        const OPACITY = 1 << 10;
    }
}

/// Offscreen target owned by a promoted layer for one traversal.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSurface {
    pub owner: LayerId,
    /// Surface that this one composites into; `None` for the root surface.
    pub target: Option<LayerId>,
    pub reasons: SurfaceReasons,

    /// Surface space to the target surface's space.
    pub draw_transform: Transform,
    pub screen_space_transform: Transform,
    pub replica_draw_transform: Option<Transform>,
    pub replica_screen_space_transform: Option<Transform>,
    pub target_surface_transforms_are_animating: bool,
    pub screen_space_transforms_are_animating: bool,
    /// Scale factored out of the owner's transform; content is rasterized at
    /// this scale and `draw_transform` applies the rest.
    pub sublayer_scale: f32,

    pub draw_opacity: f32,
    pub draw_opacity_is_animating: bool,

    /// Bounds, in surface space, of everything drawn into the surface.
    pub content_rect: Rect,
    /// Clip in the target's space, meaningful when `is_clipped`.
    pub clip_rect: Rect,
    pub is_clipped: bool,
    pub filter_outsets: FilterOutsets,

    /// Layers drawing into this surface, in paint order. Entries that own
    /// a surface themselves (other than `owner`) stand for that surface.
    pub layer_list: Vec<LayerId>,
}

impl RenderSurface {
    pub(crate) fn new(owner: LayerId, target: Option<LayerId>, reasons: SurfaceReasons) -> Self {
        Self {
            owner,
            target,
            reasons,
            draw_transform: Transform::identity(),
            screen_space_transform: Transform::identity(),
            replica_draw_transform: None,
            replica_screen_space_transform: None,
            target_surface_transforms_are_animating: false,
            screen_space_transforms_are_animating: false,
            sublayer_scale: 1.0,
            draw_opacity: 1.0,
            draw_opacity_is_animating: false,
            content_rect: Rect::default(),
            clip_rect: Rect::default(),
            is_clipped: false,
            filter_outsets: FilterOutsets::default(),
            layer_list: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.target.is_none()
    }

    /// Footprint of the surface, and of its replica, in the target's space.
    /// Filter outsets are included and the clip is applied when set.
    pub fn drawable_content_rect(&self) -> RectF {
        let content = self.filter_outsets.expand(self.content_rect.to_rect_f());
        let mut rect = map_clipped_rect(&self.draw_transform, content);
        if let Some(replica) = &self.replica_draw_transform {
            rect = rect.union(map_clipped_rect(replica, content));
        }
        if self.is_clipped {
            rect = rect.intersect(self.clip_rect.to_rect_f());
        }
        rect
    }

    /// Whether `layer` in `layer_list` stands for a child surface rather than
    /// content drawn directly.
    pub fn contributes_as_surface(&self, layer: LayerId, owns_surface: bool) -> bool {
        layer != self.owner && owns_surface
    }
}

/// Render surfaces produced by one traversal, identified by their owners.
///
/// Targets precede the surfaces that draw into them. A painter that renders
/// children before compositing them into parents walks
/// [`paint_order`](Self::paint_order).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderSurfaceList {
    surfaces: Vec<LayerId>,
}

impl RenderSurfaceList {
    pub(crate) fn from_vec(surfaces: Vec<LayerId>) -> Self {
        Self { surfaces }
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn as_slice(&self) -> &[LayerId] {
        &self.surfaces
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = LayerId> + '_ {
        self.surfaces.iter().copied()
    }

    pub fn contains(&self, layer: LayerId) -> bool {
        self.surfaces.contains(&layer)
    }

    pub fn position(&self, layer: LayerId) -> Option<usize> {
        self.surfaces.iter().position(|&surface| surface == layer)
    }

    /// Contributors before the targets they draw into.
    pub fn paint_order(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.surfaces.iter().rev().copied()
    }
}

impl<'a> IntoIterator for &'a RenderSurfaceList {
    type Item = &'a LayerId;
    type IntoIter = std::slice::Iter<'a, LayerId>;

    fn into_iter(self) -> Self::IntoIter {
        self.surfaces.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn drawable_content_rect_includes_replica_and_outsets() {
        let mut keys: SlotMap<LayerId, ()> = SlotMap::with_key();
        let owner = keys.insert(());
        let mut surface = RenderSurface::new(owner, None, SurfaceReasons::ROOT);
        surface.content_rect = Rect::new(0, 0, 10, 10);
        surface.draw_transform = Transform::translation(5.0, 0.0);
        assert_eq!(surface.drawable_content_rect(), RectF::new(5.0, 0.0, 10.0, 10.0));

        surface.replica_draw_transform = Some(Transform::translation(5.0, 20.0));
        assert_eq!(surface.drawable_content_rect(), RectF::new(5.0, 0.0, 10.0, 30.0));

        surface.filter_outsets = FilterOutsets {
            left: 1.0,
            top: 0.0,
            right: 0.0,
            bottom: 0.0,
        };
        surface.is_clipped = true;
        surface.clip_rect = Rect::new(0, 0, 100, 15);
        assert_eq!(surface.drawable_content_rect(), RectF::new(4.0, 0.0, 11.0, 15.0));
    }

    #[test]
    fn paint_order_reverses_the_list() {
        let mut keys: SlotMap<LayerId, ()> = SlotMap::with_key();
        let a = keys.insert(());
        let b = keys.insert(());
        let list = RenderSurfaceList::from_vec(vec![a, b]);
        assert_eq!(list.paint_order().collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(list.position(b), Some(1));
        assert!(list.contains(a));
    }
}
