#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointF {
    pub x: f32,
    pub y: f32,
}

impl PointF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point3F {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3F {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2dF {
    pub x: f32,
    pub y: f32,
}

impl Vector2dF {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl std::ops::Add for Vector2dF {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vector2dF {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Neg for Vector2dF {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SizeF {
    pub width: f32,
    pub height: f32,
}

impl SizeF {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    // NaN sizes count as empty.
    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// Integer rect in pixel space. Width and height below zero are treated as empty.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width.max(0), size.height.max(0))
    }

    pub fn right(self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(self, other: Rect) -> bool {
        !other.is_empty()
            && self.x <= other.x
            && self.y <= other.y
            && self.right() >= other.right()
            && self.bottom() >= other.bottom()
    }

    pub fn intersect(self, other: Rect) -> Rect {
        if self.is_empty() || other.is_empty() {
            return Rect::default();
        }
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= left || bottom <= top {
            return Rect::default();
        }
        Rect::from_ltrb(left, top, right, bottom)
    }

    pub fn union(self, other: Rect) -> Rect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        Rect::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Rect {
        Rect::new(
            left,
            top,
            right.saturating_sub(left).max(0),
            bottom.saturating_sub(top).max(0),
        )
    }

    pub fn offset(self, dx: i32, dy: i32) -> Rect {
        Rect::new(
            self.x.saturating_add(dx),
            self.y.saturating_add(dy),
            self.width,
            self.height,
        )
    }

    pub fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn to_rect_f(self) -> RectF {
        RectF::new(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RectF {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl RectF {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: SizeF) -> Self {
        Self::new(0.0, 0.0, size.width.max(0.0), size.height.max(0.0))
    }

    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, (right - left).max(0.0), (bottom - top).max(0.0))
    }

    pub fn right(self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(self) -> f32 {
        self.y + self.height
    }

    pub fn is_empty(self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn origin(self) -> PointF {
        PointF::new(self.x, self.y)
    }

    pub fn intersect(self, other: RectF) -> RectF {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if !(right > left && bottom > top) {
            return RectF::default();
        }
        RectF::from_ltrb(left, top, right, bottom)
    }

    pub fn union(self, other: RectF) -> RectF {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        RectF::from_ltrb(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    pub fn offset(self, dx: f32, dy: f32) -> RectF {
        RectF::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn outset(self, left: f32, top: f32, right: f32, bottom: f32) -> RectF {
        RectF::from_ltrb(
            self.x - left,
            self.y - top,
            self.right() + right,
            self.bottom() + bottom,
        )
    }

    /// Smallest integer rect containing this rect. Coordinates saturate at the
    /// i32 range and NaN collapses to zero.
    pub fn to_enclosing_rect(self) -> Rect {
        let left = saturate(self.x.floor());
        let top = saturate(self.y.floor());
        let right = saturate(self.right().ceil());
        let bottom = saturate(self.bottom().ceil());
        Rect::from_ltrb(left, top, right, bottom)
    }

    /// Largest integer rect contained in this rect.
    pub fn to_enclosed_rect(self) -> Rect {
        let left = saturate(self.x.ceil());
        let top = saturate(self.y.ceil());
        let right = saturate(self.right().floor());
        let bottom = saturate(self.bottom().floor());
        Rect::from_ltrb(left, top, right, bottom)
    }

    pub fn corners(self) -> [PointF; 4] {
        [
            PointF::new(self.x, self.y),
            PointF::new(self.right(), self.y),
            PointF::new(self.right(), self.bottom()),
            PointF::new(self.x, self.bottom()),
        ]
    }
}

fn saturate(value: f32) -> i32 {
    // `as` saturates at the i32 bounds and maps NaN to 0.
    value as i32
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct QuadF {
    pub p1: PointF,
    pub p2: PointF,
    pub p3: PointF,
    pub p4: PointF,
}

impl QuadF {
    pub const fn new(p1: PointF, p2: PointF, p3: PointF, p4: PointF) -> Self {
        Self { p1, p2, p3, p4 }
    }

    pub fn from_rect(rect: RectF) -> Self {
        let [p1, p2, p3, p4] = rect.corners();
        Self { p1, p2, p3, p4 }
    }

    pub fn points(&self) -> [PointF; 4] {
        [self.p1, self.p2, self.p3, self.p4]
    }

    pub fn bounding_box(&self) -> RectF {
        enclosing_rect_of_vertices(&self.points())
    }

    /// True when the quad's edges are all horizontal or vertical.
    pub fn is_rectilinear(&self) -> bool {
        const EPSILON: f32 = 1e-5;
        let near = |a: f32, b: f32| (a - b).abs() < EPSILON;
        (near(self.p1.x, self.p2.x)
            && near(self.p2.y, self.p3.y)
            && near(self.p3.x, self.p4.x)
            && near(self.p4.y, self.p1.y))
            || (near(self.p1.y, self.p2.y)
                && near(self.p2.x, self.p3.x)
                && near(self.p3.y, self.p4.y)
                && near(self.p4.x, self.p1.x))
    }
}

/// Tightest axis-aligned rect around `vertices`. Bounds start at the first
/// vertex so all-negative inputs are not pulled toward the origin.
pub fn enclosing_rect_of_vertices(vertices: &[PointF]) -> RectF {
    let Some(first) = vertices.first() else {
        return RectF::default();
    };
    let mut bounds = BoundsAccumulator::new(*first);
    for vertex in &vertices[1..] {
        bounds.add(*vertex);
    }
    bounds.to_rect()
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct BoundsAccumulator {
    min_x: f32,
    min_y: f32,
    max_x: f32,
    max_y: f32,
}

impl BoundsAccumulator {
    pub(crate) fn new(first: PointF) -> Self {
        Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        }
    }

    pub(crate) fn add(&mut self, point: PointF) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    pub(crate) fn to_rect(self) -> RectF {
        RectF::new(
            self.min_x,
            self.min_y,
            self.max_x - self.min_x,
            self.max_y - self.min_y,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enclosing_rect_of_negative_vertices_does_not_snap_to_origin() {
        let rect = enclosing_rect_of_vertices(&[
            PointF::new(-10.0, -20.0),
            PointF::new(-5.0, -30.0),
            PointF::new(-7.0, -25.0),
        ]);
        assert_eq!(rect, RectF::new(-10.0, -30.0, 5.0, 10.0));
    }

    #[test]
    fn enclosing_rect_of_no_vertices_is_empty() {
        assert!(enclosing_rect_of_vertices(&[]).is_empty());
    }

    #[test]
    fn enclosing_rect_rounds_outward_and_saturates() {
        let rect = RectF::new(-0.5, 1.2, 2.0, 1.0).to_enclosing_rect();
        assert_eq!(rect, Rect::new(-1, 1, 3, 2));

        let huge = RectF::new(-1e30, 0.0, 2e30, f32::NAN).to_enclosing_rect();
        assert_eq!(huge.x, i32::MIN);
        assert!(huge.is_empty());
    }

    #[test]
    fn enclosed_rect_rounds_inward() {
        let rect = RectF::new(0.5, 0.5, 3.0, 2.0).to_enclosed_rect();
        assert_eq!(rect, Rect::new(1, 1, 2, 1));
    }

    #[test]
    fn rect_intersect_and_union() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(80, 80, 30, 30);
        assert_eq!(a.intersect(b), Rect::new(80, 80, 20, 20));
        assert!(a.intersect(Rect::new(120, 120, 30, 30)).is_empty());
        assert_eq!(a.union(b), Rect::new(0, 0, 110, 110));
        assert_eq!(Rect::default().union(b), b);
        assert!(a.contains(Rect::new(10, 10, 5, 5)));
        assert!(!a.contains(b));
    }

    #[test]
    fn rotated_quad_is_not_rectilinear() {
        let quad = QuadF::new(
            PointF::new(0.0, 5.0),
            PointF::new(5.0, 0.0),
            PointF::new(10.0, 5.0),
            PointF::new(5.0, 10.0),
        );
        assert!(!quad.is_rectilinear());
        assert!(QuadF::from_rect(RectF::new(1.0, 2.0, 3.0, 4.0)).is_rectilinear());
        assert_eq!(quad.bounding_box(), RectF::new(0.0, 0.0, 10.0, 10.0));
    }
}
