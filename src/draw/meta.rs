//! Pre-pass over the attached tree: relation resolution, subtree aggregates
//! and the sibling order that puts scroll parents before their scroll
//! children.

use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};

use super::surface_order::stable_topological_order;
use crate::layer::{LayerId, LayerRelations, LayerTree};

/// Scroll and clip parents that point at attached layers other than the
/// layer itself. Anything else is dropped here and treated as absent.
#[derive(Debug, Default)]
pub(crate) struct ResolvedRelations {
    scroll_parent: FxHashMap<LayerId, LayerId>,
    clip_parent: FxHashMap<LayerId, LayerId>,
    clip_parents: FxHashSet<LayerId>,
}

impl ResolvedRelations {
    fn resolve(order: &[LayerId], attached: &FxHashSet<LayerId>, relations: &dyn LayerRelations) -> Self {
        let mut resolved = Self::default();
        let usable = |layer: LayerId, target: LayerId, relation: &str| {
            if target == layer {
                warn!("{relation} of {layer:?} points at itself; ignoring it");
                false
            } else if !attached.contains(&target) {
                warn!("{relation} {target:?} of {layer:?} is not in the tree; ignoring it");
                false
            } else {
                true
            }
        };
        for &layer in order {
            if let Some(target) = relations.scroll_parent(layer) {
                if usable(layer, target, "scroll parent") {
                    resolved.scroll_parent.insert(layer, target);
                }
            }
            if let Some(target) = relations.clip_parent(layer) {
                if usable(layer, target, "clip parent") {
                    resolved.clip_parent.insert(layer, target);
                    resolved.clip_parents.insert(target);
                }
            }
        }
        resolved
    }

    pub(crate) fn scroll_parent(&self, layer: LayerId) -> Option<LayerId> {
        self.scroll_parent.get(&layer).copied()
    }

    pub(crate) fn clip_parent(&self, layer: LayerId) -> Option<LayerId> {
        self.clip_parent.get(&layer).copied()
    }

    /// Layer whose clip `layer` inherits instead of its tree parent's.
    pub(crate) fn clip_source(&self, layer: LayerId) -> Option<LayerId> {
        self.clip_parent(layer).or_else(|| self.scroll_parent(layer))
    }

    pub(crate) fn is_clip_parent(&self, layer: LayerId) -> bool {
        self.clip_parents.contains(&layer)
    }

    pub(crate) fn has_relation(&self, layer: LayerId) -> bool {
        self.scroll_parent.contains_key(&layer) || self.clip_parent.contains_key(&layer)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct SubtreeMeta {
    pub(crate) num_descendants: usize,
    pub(crate) num_descendants_that_draw_content: usize,
    /// Descendants whose clip comes from outside this layer's subtree.
    pub(crate) num_unclipped_descendants: usize,
    pub(crate) has_copy_request_in_subtree: bool,
    pub(crate) has_input_handler_in_subtree: bool,
}

/// Everything the walk phases need to know about the tree before any
/// property is computed.
#[derive(Debug)]
pub(crate) struct MetaInformation {
    /// Attached layers in pre-order, siblings in paint order.
    pub(crate) order: Vec<LayerId>,
    pub(crate) relations: ResolvedRelations,
    subtree: FxHashMap<LayerId, SubtreeMeta>,
    child_order: FxHashMap<LayerId, Vec<LayerId>>,
}

impl MetaInformation {
    pub(crate) fn collect(tree: &LayerTree, relations: &dyn LayerRelations) -> Self {
        let attached_order = tree.attached_layers();
        let attached: FxHashSet<LayerId> = attached_order.iter().copied().collect();
        let resolved = ResolvedRelations::resolve(&attached_order, &attached, relations);

        let mut subtree: FxHashMap<LayerId, SubtreeMeta> = attached_order
            .iter()
            .map(|&id| {
                let layer = &tree[id];
                let meta = SubtreeMeta {
                    has_copy_request_in_subtree: layer.has_copy_request(),
                    has_input_handler_in_subtree: layer.has_input_handler(),
                    ..SubtreeMeta::default()
                };
                (id, meta)
            })
            .collect();

        for &id in attached_order.iter().rev() {
            let layer = &tree[id];
            let Some(parent) = layer.parent() else {
                continue;
            };
            let child = subtree.get(&id).copied().unwrap_or_default();
            if let Some(meta) = subtree.get_mut(&parent) {
                meta.num_descendants += child.num_descendants + 1;
                meta.num_descendants_that_draw_content +=
                    child.num_descendants_that_draw_content + usize::from(layer.draws_content());
                meta.has_copy_request_in_subtree |= child.has_copy_request_in_subtree;
                meta.has_input_handler_in_subtree |= child.has_input_handler_in_subtree;
            }
        }

        for &id in &attached_order {
            let Some(source) = resolved.clip_source(id) else {
                continue;
            };
            let mut current = tree[id].parent();
            while let Some(ancestor) = current {
                if tree.is_ancestor_or_self(ancestor, source) {
                    break;
                }
                if let Some(meta) = subtree.get_mut(&ancestor) {
                    meta.num_unclipped_descendants += 1;
                }
                current = tree[ancestor].parent();
            }
        }

        let child_order = scroll_parent_first_order(tree, &attached_order, &resolved);

        let mut meta = Self {
            order: Vec::with_capacity(attached_order.len()),
            relations: resolved,
            subtree,
            child_order,
        };
        if let Some(root) = tree.root() {
            let mut stack = vec![root];
            while let Some(id) = stack.pop() {
                meta.order.push(id);
                stack.extend(meta.children_in_paint_order(tree, id).iter().rev());
            }
        }
        meta
    }

    pub(crate) fn subtree(&self, layer: LayerId) -> SubtreeMeta {
        self.subtree.get(&layer).copied().unwrap_or_default()
    }

    pub(crate) fn children_in_paint_order<'a>(&'a self, tree: &'a LayerTree, layer: LayerId) -> &'a [LayerId] {
        match self.child_order.get(&layer) {
            Some(children) => children,
            None => tree[layer].children(),
        }
    }
}

/// Sibling orders in which the subtree holding a scroll parent comes before
/// the subtree holding its scroll child. Only parents whose order actually
/// changes get an entry.
fn scroll_parent_first_order(
    tree: &LayerTree,
    order: &[LayerId],
    relations: &ResolvedRelations,
) -> FxHashMap<LayerId, Vec<LayerId>> {
    let mut constraints: FxHashMap<LayerId, Vec<(LayerId, LayerId)>> = FxHashMap::default();

    for &child in order {
        let Some(scroll_parent) = relations.scroll_parent(child) else {
            continue;
        };
        if tree.is_ancestor_or_self(scroll_parent, child) || tree.is_ancestor_or_self(child, scroll_parent) {
            continue;
        }
        if let Some((ancestor, first, second)) = diverging_siblings(tree, scroll_parent, child) {
            constraints.entry(ancestor).or_default().push((first, second));
        }
    }

    let mut child_order = FxHashMap::default();
    for (parent, pairs) in constraints {
        let children = tree[parent].children();
        let index_of = |id: LayerId| children.iter().position(|&child| child == id);
        let edges = pairs
            .iter()
            .filter_map(|&(first, second)| Some((index_of(first)?, index_of(second)?)));
        match stable_topological_order(children.len(), edges) {
            Some(indices) => {
                let reordered: Vec<LayerId> = indices.into_iter().map(|index| children[index]).collect();
                if reordered.as_slice() != children {
                    child_order.insert(parent, reordered);
                }
            }
            None => warn!("scroll parents under {parent:?} form a cycle; keeping the tree order"),
        }
    }
    child_order
}

/// Lowest common ancestor of `a` and `b`, with the children of it that lead
/// to `a` and to `b`.
fn diverging_siblings(tree: &LayerTree, a: LayerId, b: LayerId) -> Option<(LayerId, LayerId, LayerId)> {
    let mut path_a = FxHashMap::default();
    let mut previous = None;
    let mut current = Some(a);
    while let Some(id) = current {
        path_a.insert(id, previous);
        previous = Some(id);
        current = tree[id].parent();
    }

    let mut previous = None;
    let mut current = Some(b);
    while let Some(id) = current {
        if let Some(&below_a) = path_a.get(&id) {
            return Some((id, below_a?, previous?));
        }
        previous = Some(id);
        current = tree[id].parent();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Size;

    fn drawing_layer(tree: &mut LayerTree) -> LayerId {
        let id = tree.create_layer();
        tree.set_bounds(id, Size::new(10, 10)).expect("layer");
        tree.set_draws_content(id, true).expect("layer");
        id
    }

    #[test]
    fn aggregates_counts_and_flags() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_root(Some(root)).expect("root");
        let a = drawing_layer(&mut tree);
        let b = drawing_layer(&mut tree);
        let c = tree.create_layer();
        tree.add_child(root, a).expect("add");
        tree.add_child(a, b).expect("add");
        tree.add_child(a, c).expect("add");
        tree.set_has_input_handler(c, true).expect("layer");

        let meta = MetaInformation::collect(&tree, &tree);
        assert_eq!(meta.subtree(root).num_descendants, 3);
        assert_eq!(meta.subtree(root).num_descendants_that_draw_content, 2);
        assert_eq!(meta.subtree(a).num_descendants_that_draw_content, 1);
        assert!(meta.subtree(root).has_input_handler_in_subtree);
        assert!(meta.subtree(c).has_input_handler_in_subtree);
        assert!(!meta.subtree(b).has_input_handler_in_subtree);
        assert_eq!(meta.order, vec![root, a, b, c]);
    }

    #[test]
    fn counts_descendants_escaping_their_clip() {
        // root -> clip -> scroll_child ; root -> scroller
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_root(Some(root)).expect("root");
        let clip = tree.create_layer();
        let scroll_child = tree.create_layer();
        let scroller = tree.create_layer();
        tree.add_child(root, clip).expect("add");
        tree.add_child(clip, scroll_child).expect("add");
        tree.add_child(root, scroller).expect("add");
        tree.set_scroll_parent(scroll_child, Some(scroller)).expect("relation");

        let meta = MetaInformation::collect(&tree, &tree);
        assert_eq!(meta.subtree(clip).num_unclipped_descendants, 1);
        assert_eq!(meta.subtree(root).num_unclipped_descendants, 0);
        assert_eq!(meta.relations.clip_source(scroll_child), Some(scroller));
    }

    #[test]
    fn scroll_parent_subtree_is_visited_first() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_root(Some(root)).expect("root");
        let clip = tree.create_layer();
        let scroll_child = tree.create_layer();
        let scroller = tree.create_layer();
        tree.add_child(root, clip).expect("add");
        tree.add_child(clip, scroll_child).expect("add");
        tree.add_child(root, scroller).expect("add");
        tree.set_scroll_parent(scroll_child, Some(scroller)).expect("relation");

        let meta = MetaInformation::collect(&tree, &tree);
        assert_eq!(meta.children_in_paint_order(&tree, root), &[scroller, clip]);
        assert_eq!(meta.order, vec![root, scroller, clip, scroll_child]);
    }

    struct External(FxHashMap<LayerId, LayerId>);

    impl LayerRelations for External {
        fn scroll_parent(&self, layer: LayerId) -> Option<LayerId> {
            self.0.get(&layer).copied()
        }

        fn clip_parent(&self, _layer: LayerId) -> Option<LayerId> {
            None
        }
    }

    #[test]
    fn dangling_and_self_relations_are_dropped() {
        let mut tree = LayerTree::new();
        let root = tree.create_layer();
        tree.set_root(Some(root)).expect("root");
        let child = tree.create_layer();
        let detached = tree.create_layer();
        tree.add_child(root, child).expect("add");

        let mut relations = FxHashMap::default();
        relations.insert(child, detached);
        relations.insert(root, root);
        let meta = MetaInformation::collect(&tree, &External(relations));
        assert_eq!(meta.relations.scroll_parent(child), None);
        assert_eq!(meta.relations.scroll_parent(root), None);
        assert!(!meta.relations.has_relation(child));
    }
}
