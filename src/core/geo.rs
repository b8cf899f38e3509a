use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Represents a point in page, local or pyramid coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn subtract(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn multiply(&self, scalar: f64) -> Point {
        Point::new(self.x * scalar, self.y * scalar)
    }

    pub fn negate(&self) -> Point {
        Point::new(-self.x, -self.y)
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn length(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Unit vector in the same direction, or the zero vector for zero input.
    pub fn normalize(&self) -> Point {
        let len = self.length();
        if len == 0.0 {
            return Point::default();
        }
        self.multiply(1.0 / len)
    }

    pub fn mean(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Angle of the vector pointing from `other` to `self`.
    pub fn angle_to(&self, other: &Point) -> f64 {
        (self.y - other.y).atan2(self.x - other.x)
    }

    /// Rotate around the origin by `radians`.
    pub fn rotate(&self, radians: f64) -> Point {
        let (sin, cos) = radians.sin_cos();
        Point::new(cos * self.x - sin * self.y, sin * self.x + cos * self.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::new(0.0, 0.0)
    }
}

/// Static helpers for angles in radians
pub struct Angle;

impl Angle {
    /// Wraps an angle into `[-PI, PI]`.
    pub fn normalize(angle: f64) -> f64 {
        let two_pi = PI * 2.0;
        let mut angle = angle;
        while angle > PI {
            angle -= two_pi;
        }
        while angle < -PI {
            angle += two_pi;
        }
        angle
    }

    /// Signed smallest difference `a - b`.
    pub fn diff(a: f64, b: f64) -> f64 {
        Self::normalize((a - b).sin().atan2((a - b).cos()))
    }

    pub fn degree_to_radian(degree: f64) -> f64 {
        PI * degree / 180.0
    }

    pub fn radian_to_degree(rad: f64) -> f64 {
        180.0 / PI * rad
    }
}

/// Axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, p: &Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.width && p.y >= self.y && p.y <= self.y + self.height
    }

    /// Grow the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Corners in clockwise order starting top-left.
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y),
            Point::new(self.x + self.width, self.y + self.height),
            Point::new(self.x, self.y + self.height),
        ]
    }

    pub fn to_polygon(&self) -> Polygon {
        let mut polygon = Polygon::new(self.center());
        for corner in self.corners() {
            polygon.add_absolute_point(corner);
        }
        polygon
    }
}

/// Result of a separating-axis test between two polygons
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Intersection {
    /// Smallest overlap along any tested axis
    pub overlap: f64,
    /// The axis of smallest overlap
    pub axis: Point,
}

/// Convex polygon stored as center-relative vertices
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub center: Point,
    pub points: Vec<Point>,
}

impl Polygon {
    pub fn new(center: Point) -> Self {
        Self {
            center,
            points: Vec::new(),
        }
    }

    /// Add a vertex given relative to the center.
    pub fn add_point(&mut self, p: Point) {
        self.points.push(p);
    }

    /// Add a vertex given in absolute coordinates.
    pub fn add_absolute_point(&mut self, p: Point) {
        self.points.push(p.subtract(&self.center));
    }

    pub fn rotate(&mut self, radians: f64) {
        for p in self.points.iter_mut() {
            *p = p.rotate(radians);
        }
    }

    pub fn absolute_points(&self) -> Vec<Point> {
        self.points.iter().map(|p| p.add(&self.center)).collect()
    }

    /// Even-odd point-in-polygon test.
    pub fn contains_point(&self, pnt: &Point) -> bool {
        let vertices = self.absolute_points();
        let n = vertices.len();
        if n < 3 {
            return false;
        }
        let mut inside = false;
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (vertices[i], vertices[j]);
            if (vi.y > pnt.y) != (vj.y > pnt.y)
                && pnt.x < (vj.x - vi.x) * (pnt.y - vi.y) / (vj.y - vi.y) + vi.x
            {
                inside = !inside;
            }
            j = i;
        }
        inside
    }

    /// Axis-aligned bounding box of the absolute vertices.
    pub fn bounding_rect(&self) -> Rect {
        let vertices = self.absolute_points();
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for v in &vertices {
            min_x = min_x.min(v.x);
            min_y = min_y.min(v.y);
            max_x = max_x.max(v.x);
            max_y = max_y.max(v.y);
        }
        if vertices.is_empty() {
            return Rect::new(self.center.x, self.center.y, 0.0, 0.0);
        }
        Rect::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    fn edge_axes(&self) -> Vec<Point> {
        let n = self.points.len();
        (0..n)
            .map(|side| {
                let prev = self.points[(side + n - 1) % n];
                let cur = self.points[side];
                Point::new(prev.y - cur.y, cur.x - prev.x).normalize()
            })
            .collect()
    }

    fn project(&self, axis: &Point) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for p in &self.points {
            let d = p.x * axis.x + p.y * axis.y;
            min = min.min(d);
            max = max.max(d);
        }
        let offset = self.center.x * axis.x + self.center.y * axis.y;
        (min + offset, max + offset)
    }

    /// Separating axis test. `None` if the polygons do not intersect, otherwise
    /// the smallest overlap and its axis.
    pub fn intersects_with(&self, other: &Polygon) -> Option<Intersection> {
        if self.points.len() < 3 || other.points.len() < 3 {
            return None;
        }
        let mut smallest = Intersection {
            overlap: f64::MAX,
            axis: Point::default(),
        };
        for axis in self.edge_axes().into_iter().chain(other.edge_axes()) {
            let (min_a, max_a) = self.project(&axis);
            let (min_b, max_b) = other.project(&axis);
            if max_a < min_b || min_a > max_b {
                return None;
            }
            let overlap = if max_a > max_b {
                max_b - min_a
            } else {
                max_a - min_b
            };
            if overlap < smallest.overlap {
                smallest = Intersection { overlap, axis };
            }
        }
        Some(smallest)
    }
}
