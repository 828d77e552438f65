use crate::math::{Rect, Transform, map_enclosing_clipped_rect, project_enclosing_clipped_rect};

/// Part of `layer_bound_rect` (layer space) that lands inside `target_rect`
/// (target space) under `transform`.
///
/// A layer whose image in target space has no area sees nothing. When the
/// transform cannot be inverted but the image does have area, the whole layer
/// is reported visible since the clip cannot be proven to exclude any of it.
pub fn calculate_visible_rect(target_rect: Rect, layer_bound_rect: Rect, transform: &Transform) -> Rect {
    if layer_bound_rect.is_empty() {
        return Rect::default();
    }
    let layer_in_target = map_enclosing_clipped_rect(transform, layer_bound_rect);
    calculate_visible_rect_with_layer_rect(target_rect, layer_bound_rect, layer_in_target, transform)
}

/// Same as [`calculate_visible_rect`] with the target-space footprint of the
/// layer already known.
pub(crate) fn calculate_visible_rect_with_layer_rect(
    target_rect: Rect,
    layer_bound_rect: Rect,
    layer_in_target: Rect,
    transform: &Transform,
) -> Rect {
    if layer_in_target.is_empty() {
        return Rect::default();
    }
    if target_rect.contains(layer_in_target) {
        return layer_bound_rect;
    }

    let minimal_rect = target_rect.intersect(layer_in_target);
    if minimal_rect.is_empty() {
        return Rect::default();
    }

    let Some(surface_to_layer) = transform.inverse() else {
        return layer_bound_rect;
    };
    project_enclosing_clipped_rect(&surface_to_layer, minimal_rect).intersect(layer_bound_rect)
}
