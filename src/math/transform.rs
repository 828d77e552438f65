use glam::{Mat4, Vec3, Vec4};

use super::geometry::{Point3F, PointF, Vector2dF};

const AXIS_EPSILON: f32 = 1e-6;
const MIN_DETERMINANT: f32 = 1e-12;

/// 4x4 homogeneous transform. Builder methods post-multiply, so the most
/// recently applied operation is the first one a point goes through.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    matrix: Mat4,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub const fn identity() -> Self {
        Self {
            matrix: Mat4::IDENTITY,
        }
    }

    pub const fn from_mat4(matrix: Mat4) -> Self {
        Self { matrix }
    }

    /// Builds a transform from row-major entries.
    pub fn from_rows(rows: [[f32; 4]; 4]) -> Self {
        Self {
            matrix: Mat4::from_cols_array_2d(&rows).transpose(),
        }
    }

    pub fn translation(x: f32, y: f32) -> Self {
        let mut transform = Self::identity();
        transform.translate(x, y);
        transform
    }

    pub fn scaling(x: f32, y: f32) -> Self {
        let mut transform = Self::identity();
        transform.scale(x, y);
        transform
    }

    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.matrix.col(col)[row]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        self.matrix.col_mut(col)[row] = value;
    }

    pub fn translate(&mut self, x: f32, y: f32) {
        self.translate3d(x, y, 0.0);
    }

    pub fn translate3d(&mut self, x: f32, y: f32, z: f32) {
        self.matrix *= Mat4::from_translation(Vec3::new(x, y, z));
    }

    pub fn scale(&mut self, x: f32, y: f32) {
        self.scale3d(x, y, 1.0);
    }

    pub fn scale3d(&mut self, x: f32, y: f32, z: f32) {
        self.matrix *= Mat4::from_scale(Vec3::new(x, y, z));
    }

    pub fn rotate(&mut self, degrees: f32) {
        self.rotate_about_z_axis(degrees);
    }

    pub fn rotate_about_x_axis(&mut self, degrees: f32) {
        self.matrix *= Mat4::from_rotation_x(degrees.to_radians());
    }

    pub fn rotate_about_y_axis(&mut self, degrees: f32) {
        self.matrix *= Mat4::from_rotation_y(degrees.to_radians());
    }

    pub fn rotate_about_z_axis(&mut self, degrees: f32) {
        self.matrix *= Mat4::from_rotation_z(degrees.to_radians());
    }

    /// Rotation about an arbitrary axis. A zero-length axis leaves the
    /// transform unchanged.
    pub fn rotate_about(&mut self, axis: Point3F, degrees: f32) {
        let axis = Vec3::new(axis.x, axis.y, axis.z);
        let length = axis.length();
        if !(length > 0.0) {
            return;
        }
        self.matrix *= Mat4::from_axis_angle(axis / length, degrees.to_radians());
    }

    pub fn skew_x(&mut self, degrees: f32) {
        let mut skew = Transform::identity();
        skew.set(0, 1, degrees.to_radians().tan());
        self.pre_concat(&skew);
    }

    pub fn skew_y(&mut self, degrees: f32) {
        let mut skew = Transform::identity();
        skew.set(1, 0, degrees.to_radians().tan());
        self.pre_concat(&skew);
    }

    /// Applies a perspective projection with the viewer at `depth` on the z axis.
    pub fn apply_perspective_depth(&mut self, depth: f32) {
        if depth == 0.0 {
            return;
        }
        let mut perspective = Transform::identity();
        perspective.set(3, 2, -1.0 / depth);
        self.pre_concat(&perspective);
    }

    /// `self = self * other`: `other` is applied to points first.
    pub fn pre_concat(&mut self, other: &Transform) {
        self.matrix *= other.matrix;
    }

    /// `self = other * self`: `other` is applied to points last.
    pub fn concat(&mut self, other: &Transform) {
        self.matrix = other.matrix * self.matrix;
    }

    pub fn then(mut self, other: &Transform) -> Transform {
        self.concat(other);
        self
    }

    pub fn is_identity(&self) -> bool {
        self.matrix == Mat4::IDENTITY
    }

    pub fn is_identity_or_translation(&self) -> bool {
        let m = &self.matrix;
        let upper = Mat4::from_cols(
            Vec4::new(m.x_axis.x, m.x_axis.y, m.x_axis.z, m.x_axis.w),
            Vec4::new(m.y_axis.x, m.y_axis.y, m.y_axis.z, m.y_axis.w),
            Vec4::new(m.z_axis.x, m.z_axis.y, m.z_axis.z, m.z_axis.w),
            Vec4::new(0.0, 0.0, 0.0, m.w_axis.w),
        );
        upper == Mat4::IDENTITY
    }

    pub fn is_identity_or_integer_translation(&self) -> bool {
        if !self.is_identity_or_translation() {
            return false;
        }
        let t = self.matrix.w_axis;
        t.x.fract() == 0.0 && t.y.fract() == 0.0 && t.z.fract() == 0.0
    }

    /// True for transforms made only of scale and translation (no rotation,
    /// skew or perspective).
    pub fn is_scale_or_translation(&self) -> bool {
        for row in 0..4 {
            for col in 0..3 {
                if row != col && self.get(row, col) != 0.0 {
                    return false;
                }
            }
        }
        self.get(3, 3) == 1.0
    }

    pub fn has_perspective(&self) -> bool {
        self.get(3, 0) != 0.0 || self.get(3, 1) != 0.0 || self.get(3, 2) != 0.0 || self.get(3, 3) != 1.0
    }

    /// True when the transform neither reads nor writes z.
    pub fn is_flat(&self) -> bool {
        self.get(2, 0) == 0.0
            && self.get(2, 1) == 0.0
            && self.get(0, 2) == 0.0
            && self.get(1, 2) == 0.0
            && self.get(2, 2) == 1.0
            && self.get(3, 2) == 0.0
            && self.get(2, 3) == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.is_finite()
    }

    pub fn determinant(&self) -> f32 {
        self.matrix.determinant()
    }

    pub fn is_invertible(&self) -> bool {
        let det = self.determinant();
        det.is_finite() && det.abs() > MIN_DETERMINANT
    }

    pub fn inverse(&self) -> Option<Transform> {
        if !self.is_invertible() {
            return None;
        }
        let inverse = self.matrix.inverse();
        inverse.is_finite().then_some(Transform { matrix: inverse })
    }

    /// Whether an axis-aligned 2D rect stays axis-aligned after mapping (with
    /// z dropped). Only scales and multiples of 90 degree rotations qualify.
    pub fn preserves_2d_axis_alignment(&self) -> bool {
        if self.get(3, 0).abs() > AXIS_EPSILON || self.get(3, 1).abs() > AXIS_EPSILON {
            return false;
        }
        let non_zero = |value: f32| value.abs() > AXIS_EPSILON;
        let mut in_row_0 = 0;
        let mut in_row_1 = 0;
        let mut in_col_0 = 0;
        let mut in_col_1 = 0;
        if non_zero(self.get(0, 0)) {
            in_row_0 += 1;
            in_col_0 += 1;
        }
        if non_zero(self.get(0, 1)) {
            in_row_0 += 1;
            in_col_1 += 1;
        }
        if non_zero(self.get(1, 0)) {
            in_row_1 += 1;
            in_col_0 += 1;
        }
        if non_zero(self.get(1, 1)) {
            in_row_1 += 1;
            in_col_1 += 1;
        }
        in_row_0 <= 1 && in_row_1 <= 1 && in_col_0 <= 1 && in_col_1 <= 1
    }

    /// Per-axis 2D scale factors, or `None` when perspective makes them
    /// position dependent.
    pub fn scale_components_2d(&self) -> Option<Vector2dF> {
        if self.has_perspective() {
            return None;
        }
        let x = self.get(0, 0).hypot(self.get(1, 0));
        let y = self.get(0, 1).hypot(self.get(1, 1));
        (x.is_finite() && y.is_finite()).then_some(Vector2dF::new(x, y))
    }

    pub fn max_scale_2d(&self, fallback: f32) -> f32 {
        self.scale_components_2d()
            .map(|scale| scale.x.max(scale.y))
            .unwrap_or(fallback)
    }

    /// Drops every contribution to and from z.
    pub fn flatten_to_2d(&mut self) {
        self.set(2, 0, 0.0);
        self.set(2, 1, 0.0);
        self.set(0, 2, 0.0);
        self.set(1, 2, 0.0);
        self.set(2, 2, 1.0);
        self.set(3, 2, 0.0);
        self.set(2, 3, 0.0);
    }

    pub fn flattened(mut self) -> Transform {
        self.flatten_to_2d();
        self
    }

    /// Whether the back of a plane facing +z would be visible after mapping.
    /// Uses the z entry of the inverse-transpose applied to the plane normal.
    pub fn is_back_face_visible(&self) -> bool {
        if self.is_identity() {
            return false;
        }
        match self.inverse() {
            Some(inverse) => inverse.get(2, 2) < 0.0,
            None => false,
        }
    }

    pub fn translation_2d(&self) -> Vector2dF {
        Vector2dF::new(self.get(0, 3), self.get(1, 3))
    }

    pub fn map_homogeneous(&self, point: Vec4) -> Vec4 {
        self.matrix * point
    }

    /// Maps a point with perspective divide. A point landing on w == 0 maps to
    /// its undivided coordinates.
    pub fn map_point(&self, point: PointF) -> PointF {
        let mapped = self.map_homogeneous(Vec4::new(point.x, point.y, 0.0, 1.0));
        if mapped.w == 1.0 || mapped.w == 0.0 {
            return PointF::new(mapped.x, mapped.y);
        }
        PointF::new(mapped.x / mapped.w, mapped.y / mapped.w)
    }

    pub fn map_point_3d(&self, point: Point3F) -> Point3F {
        let mapped = self.map_homogeneous(Vec4::new(point.x, point.y, point.z, 1.0));
        if mapped.w == 1.0 || mapped.w == 0.0 {
            return Point3F::new(mapped.x, mapped.y, mapped.z);
        }
        Point3F::new(mapped.x / mapped.w, mapped.y / mapped.w, mapped.z / mapped.w)
    }
}

impl std::ops::Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        Transform {
            matrix: self.matrix * rhs.matrix,
        }
    }
}

#[cfg(test)]
pub(crate) fn assert_transform_near(actual: &Transform, expected: &Transform, tolerance: f32) {
    for row in 0..4 {
        for col in 0..4 {
            let a = actual.get(row, col);
            let e = expected.get(row, col);
            assert!(
                (a - e).abs() <= tolerance,
                "entry ({row}, {col}) differs: {a} vs {e}\nactual: {actual:?}\nexpected: {expected:?}"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_then_scale_applies_scale_first() {
        let mut transform = Transform::identity();
        transform.translate(10.0, 0.0);
        transform.scale(2.0, 2.0);
        let mapped = transform.map_point(PointF::new(1.0, 1.0));
        assert_eq!(mapped, PointF::new(12.0, 2.0));
    }

    #[test]
    fn concat_and_pre_concat_differ_in_order() {
        let translate = Transform::translation(5.0, 0.0);
        let scale = Transform::scaling(2.0, 2.0);

        let mut pre = translate;
        pre.pre_concat(&scale);
        let mut post = translate;
        post.concat(&scale);

        assert_eq!(pre.map_point(PointF::new(1.0, 0.0)), PointF::new(7.0, 0.0));
        assert_eq!(post.map_point(PointF::new(1.0, 0.0)), PointF::new(12.0, 0.0));
    }

    #[test]
    fn singular_transform_has_no_inverse() {
        let singular = Transform::scaling(0.0, 1.0);
        assert!(!singular.is_invertible());
        assert!(singular.inverse().is_none());

        let mut flat_z = Transform::identity();
        flat_z.scale3d(1.0, 1.0, 0.0);
        assert!(flat_z.inverse().is_none());

        let nan = Transform::from_rows([[f32::NAN, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]]);
        assert!(nan.inverse().is_none());
    }

    #[test]
    fn inverse_round_trips() {
        let mut transform = Transform::identity();
        transform.translate(3.0, -4.0);
        transform.rotate(30.0);
        transform.scale(2.0, 0.5);
        let inverse = transform.inverse().expect("invertible");
        assert_transform_near(&(transform * inverse), &Transform::identity(), 1e-5);
    }

    #[test]
    fn axis_alignment_accepts_scale_and_quarter_turns_only() {
        let mut quarter = Transform::identity();
        quarter.rotate(90.0);
        assert!(quarter.preserves_2d_axis_alignment());
        assert!(Transform::scaling(3.0, -2.0).preserves_2d_axis_alignment());

        let mut tilted = Transform::identity();
        tilted.rotate(30.0);
        assert!(!tilted.preserves_2d_axis_alignment());

        let mut perspective = Transform::identity();
        perspective.apply_perspective_depth(100.0);
        perspective.rotate_about_y_axis(30.0);
        assert!(!perspective.preserves_2d_axis_alignment());
    }

    #[test]
    fn scale_components_report_per_axis_and_max() {
        let mut transform = Transform::identity();
        transform.rotate(90.0);
        transform.scale(3.0, 4.0);
        let scale = transform.scale_components_2d().expect("no perspective");
        assert!((scale.x - 3.0).abs() < 1e-5);
        assert!((scale.y - 4.0).abs() < 1e-5);
        assert!((transform.max_scale_2d(0.0) - 4.0).abs() < 1e-5);

        let mut perspective = Transform::identity();
        perspective.apply_perspective_depth(10.0);
        assert_eq!(perspective.max_scale_2d(7.0), 7.0);
    }

    #[test]
    fn flatten_drops_z() {
        let mut transform = Transform::identity();
        transform.rotate_about_y_axis(45.0);
        transform.translate3d(0.0, 0.0, 10.0);
        assert!(!transform.is_flat());
        let flat = transform.flattened();
        assert!(flat.is_flat());
        let mapped = flat.map_point_3d(Point3F::new(1.0, 0.0, 5.0));
        assert_eq!(mapped.z, 0.0);
    }

    #[test]
    fn back_face_visible_after_half_turn() {
        let mut half_turn = Transform::identity();
        half_turn.rotate_about_y_axis(180.0);
        assert!(half_turn.is_back_face_visible());

        let mut quarter = Transform::identity();
        quarter.rotate_about_y_axis(45.0);
        assert!(!quarter.is_back_face_visible());
        assert!(!Transform::identity().is_back_face_visible());
    }

    #[test]
    fn integer_translation_detection() {
        assert!(Transform::translation(3.0, 4.0).is_identity_or_integer_translation());
        assert!(!Transform::translation(3.5, 4.0).is_identity_or_integer_translation());
        assert!(!Transform::scaling(2.0, 2.0).is_identity_or_translation());
        assert!(Transform::scaling(2.0, 2.0).is_scale_or_translation());
    }
}
