//! Homogeneous mapping and projection of points, quads and rects.
//!
//! Mapping sends a layer-space point (z = 0) through a transform. Projection
//! goes the other way: it finds the point on the destination plane (z = 0 after
//! the transform) that lines up with a given 2D point. Either may produce
//! homogeneous coordinates with w <= 0, which lie behind the viewer; those are
//! clipped against the w = 0 plane before the perspective divide.

use glam::Vec4;

use super::geometry::{BoundsAccumulator, PointF, QuadF, Rect, RectF};
use super::transform::Transform;

/// w assigned to points produced by clipping an edge against the w = 0 plane.
const CLIPPED_W: f32 = 0.00001;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HomogeneousCoordinate(pub Vec4);

impl HomogeneousCoordinate {
    pub fn should_be_clipped(&self) -> bool {
        // NaN w is also rejected.
        !(self.0.w > 0.0)
    }

    pub fn cartesian_point_2d(&self) -> PointF {
        let v = self.0;
        if v.w == 1.0 {
            return PointF::new(v.x, v.y);
        }
        let inv_w = 1.0 / v.w;
        PointF::new(v.x * inv_w, v.y * inv_w)
    }
}

pub fn map_homogeneous_point(transform: &Transform, point: PointF) -> HomogeneousCoordinate {
    HomogeneousCoordinate(transform.map_homogeneous(Vec4::new(point.x, point.y, 0.0, 1.0)))
}

pub fn project_homogeneous_point(transform: &Transform, point: PointF) -> HomogeneousCoordinate {
    let m22 = transform.get(2, 2);
    if m22 == 0.0 {
        // The destination plane is edge-on to the viewer.
        return HomogeneousCoordinate(Vec4::new(0.0, 0.0, 0.0, 1.0));
    }
    let z = -(transform.get(2, 0) * point.x + transform.get(2, 1) * point.y + transform.get(2, 3))
        / m22;
    HomogeneousCoordinate(transform.map_homogeneous(Vec4::new(point.x, point.y, z, 1.0)))
}

fn clipped_point_for_edge(h1: HomogeneousCoordinate, h2: HomogeneousCoordinate) -> PointF {
    let t = (CLIPPED_W - h1.0.w) / (h2.0.w - h1.0.w);
    HomogeneousCoordinate(h1.0 + (h2.0 - h1.0) * t).cartesian_point_2d()
}

fn add_point(bounds: &mut Option<BoundsAccumulator>, point: PointF) {
    match bounds {
        Some(bounds) => bounds.add(point),
        None => *bounds = Some(BoundsAccumulator::new(point)),
    }
}

/// Bounds of the polygon described by four homogeneous points after clipping
/// it against the w = 0 plane.
pub fn compute_enclosing_clipped_rect(points: &[HomogeneousCoordinate; 4]) -> RectF {
    if points.iter().all(HomogeneousCoordinate::should_be_clipped) {
        return RectF::default();
    }
    let mut bounds = None;
    for index in 0..4 {
        let h1 = points[index];
        let h2 = points[(index + 1) % 4];
        if !h1.should_be_clipped() {
            add_point(&mut bounds, h1.cartesian_point_2d());
        }
        if h1.should_be_clipped() != h2.should_be_clipped() {
            add_point(&mut bounds, clipped_point_for_edge(h1, h2));
        }
    }
    bounds.map(BoundsAccumulator::to_rect).unwrap_or_default()
}

/// Maps a point, reporting whether it landed behind the viewer.
pub fn map_point(transform: &Transform, point: PointF) -> (PointF, bool) {
    let h = map_homogeneous_point(transform, point);
    if h.should_be_clipped() {
        return (PointF::default(), true);
    }
    (h.cartesian_point_2d(), false)
}

/// Projects a point onto the destination plane, reporting whether the
/// projection fell behind the viewer.
pub fn project_point(transform: &Transform, point: PointF) -> (PointF, bool) {
    let h = project_homogeneous_point(transform, point);
    if h.should_be_clipped() {
        return (PointF::default(), true);
    }
    (h.cartesian_point_2d(), false)
}

/// Maps each vertex of `quad`. The flag is true when any vertex had w <= 0, in
/// which case the returned quad is not meaningful and callers should use
/// [`map_clipped_rect`] instead.
pub fn map_quad(transform: &Transform, quad: QuadF) -> (QuadF, bool) {
    if transform.is_identity_or_translation() {
        let offset = transform.translation_2d();
        let moved = quad
            .points()
            .map(|point| PointF::new(point.x + offset.x, point.y + offset.y));
        return (QuadF::new(moved[0], moved[1], moved[2], moved[3]), false);
    }
    let h = quad.points().map(|point| map_homogeneous_point(transform, point));
    let clipped = h.iter().any(HomogeneousCoordinate::should_be_clipped);
    let mapped = h.map(|point| point.cartesian_point_2d());
    (QuadF::new(mapped[0], mapped[1], mapped[2], mapped[3]), clipped)
}

pub fn map_clipped_rect(transform: &Transform, rect: RectF) -> RectF {
    if transform.is_identity_or_translation() {
        let offset = transform.translation_2d();
        return rect.offset(offset.x, offset.y);
    }
    let h = rect.corners().map(|point| map_homogeneous_point(transform, point));
    if !h.iter().any(HomogeneousCoordinate::should_be_clipped) {
        let points = h.map(|point| point.cartesian_point_2d());
        return super::geometry::enclosing_rect_of_vertices(&points);
    }
    compute_enclosing_clipped_rect(&h)
}

pub fn project_clipped_rect(transform: &Transform, rect: RectF) -> RectF {
    if transform.is_identity_or_translation() {
        let offset = transform.translation_2d();
        return rect.offset(offset.x, offset.y);
    }
    let h = rect.corners().map(|point| project_homogeneous_point(transform, point));
    compute_enclosing_clipped_rect(&h)
}

pub fn map_enclosing_clipped_rect(transform: &Transform, rect: Rect) -> Rect {
    if transform.is_identity_or_integer_translation() {
        let offset = transform.translation_2d();
        return rect.offset(offset.x as i32, offset.y as i32);
    }
    map_clipped_rect(transform, rect.to_rect_f()).to_enclosing_rect()
}

pub fn project_enclosing_clipped_rect(transform: &Transform, rect: Rect) -> Rect {
    if transform.is_identity_or_integer_translation() {
        let offset = transform.translation_2d();
        return rect.offset(offset.x as i32, offset.y as i32);
    }
    project_clipped_rect(transform, rect.to_rect_f()).to_enclosing_rect()
}

/// Largest integer rect guaranteed to be covered by `rect` after mapping.
/// Transforms that do not keep the rect axis-aligned, or that push part of it
/// behind the viewer, cover no provable rect and yield an empty one.
pub fn map_enclosed_rect_with_2d_axis_aligned_transform(transform: &Transform, rect: Rect) -> Rect {
    if rect.is_empty() {
        return Rect::default();
    }
    if transform.is_identity_or_integer_translation() {
        let offset = transform.translation_2d();
        return rect.offset(offset.x as i32, offset.y as i32);
    }
    let (quad, clipped) = map_quad(transform, QuadF::from_rect(rect.to_rect_f()));
    if clipped {
        return Rect::default();
    }
    if transform.preserves_2d_axis_alignment() || quad.is_rectilinear() {
        return quad.bounding_box().to_enclosed_rect();
    }
    Rect::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perspective_behind_camera() -> Transform {
        let mut transform = Transform::identity();
        transform.apply_perspective_depth(1.0);
        transform.translate3d(-2.0, 0.0, 1.0);
        transform.rotate_about_y_axis(45.0);
        transform
    }

    #[test]
    fn map_quad_reports_points_behind_viewer() {
        let (_, clipped) = map_quad(
            &perspective_behind_camera(),
            QuadF::from_rect(RectF::new(-10.0, -1.0, 20.0, 2.0)),
        );
        assert!(clipped);

        let (_, clipped) = map_quad(
            &Transform::scaling(2.0, 3.0),
            QuadF::from_rect(RectF::new(-10.0, -1.0, 20.0, 2.0)),
        );
        assert!(!clipped);
    }

    #[test]
    fn clipped_rect_keeps_only_the_front_half() {
        let mapped = map_clipped_rect(&perspective_behind_camera(), RectF::new(-10.0, -1.0, 20.0, 2.0));
        // x = 10 maps to (10 * cos45 - 2) / (10 * sin45).
        let right = (10.0 * 45f32.to_radians().cos() - 2.0) / (10.0 * 45f32.to_radians().sin());
        assert!((mapped.right() - right).abs() < 1e-3, "{mapped:?}");
        // The clipped edge runs off toward the horizon.
        assert!(mapped.x < -1000.0);
        assert!(mapped.height > 1000.0);
    }

    #[test]
    fn fully_behind_viewer_maps_to_empty() {
        let mut transform = Transform::identity();
        transform.apply_perspective_depth(1.0);
        transform.translate3d(0.0, 0.0, 2.0);
        let mapped = map_clipped_rect(&transform, RectF::new(0.0, 0.0, 10.0, 10.0));
        assert!(mapped.is_empty());
    }

    #[test]
    fn projection_undoes_mapping_for_invertible_plane() {
        let mut transform = Transform::identity();
        transform.apply_perspective_depth(100.0);
        transform.rotate_about_y_axis(30.0);
        let inverse = transform.inverse().expect("invertible");
        let rect = RectF::new(0.0, 0.0, 20.0, 10.0);
        let mapped = map_clipped_rect(&transform, rect);
        let back = project_clipped_rect(&inverse, mapped);
        assert!((back.x - rect.x).abs() < 1e-2, "{back:?}");
        assert!((back.right() - rect.right()).abs() < 1e-2, "{back:?}");
    }

    #[test]
    fn enclosing_mapping_rounds_outward() {
        let mut transform = Transform::identity();
        transform.translate(0.5, 0.25);
        let mapped = map_enclosing_clipped_rect(&transform, Rect::new(0, 0, 10, 10));
        assert_eq!(mapped, Rect::new(0, 0, 11, 11));
        let moved = map_enclosing_clipped_rect(&Transform::translation(3.0, -2.0), Rect::new(1, 1, 2, 2));
        assert_eq!(moved, Rect::new(4, -1, 2, 2));
    }

    #[test]
    fn enclosed_mapping_handles_axis_aligned_and_rotated() {
        let mut scale = Transform::identity();
        scale.translate(0.5, 0.0);
        scale.scale(2.0, 2.0);
        let enclosed = map_enclosed_rect_with_2d_axis_aligned_transform(&scale, Rect::new(0, 0, 10, 10));
        assert_eq!(enclosed, Rect::new(1, 0, 19, 20));

        let mut quarter = Transform::identity();
        quarter.rotate(90.0);
        let rotated = map_enclosed_rect_with_2d_axis_aligned_transform(&quarter, Rect::new(0, 0, 10, 20));
        assert_eq!(rotated.width, 20);
        assert_eq!(rotated.height, 10);

        let mut tilted = Transform::identity();
        tilted.rotate(45.0);
        assert!(map_enclosed_rect_with_2d_axis_aligned_transform(&tilted, Rect::new(0, 0, 10, 10)).is_empty());
    }

    #[test]
    fn edge_on_plane_projects_to_origin() {
        let mut transform = Transform::identity();
        transform.rotate_about_y_axis(90.0);
        transform.set(2, 2, 0.0);
        let (point, clipped) = project_point(&transform, PointF::new(5.0, 5.0));
        assert!(!clipped);
        assert_eq!(point, PointF::default());
    }
}
