//! Convex polygons in the plane.
//!
//! Support polygons (one per foot, or the hull of both feet in double support)
//! are small convex polygons, typically four to eight vertices. Vertices are
//! stored counter-clockwise, so the interior is on the left of every edge.
//!
//! The shrink operation clips the polygon against each edge moved inward by
//! the margin:
//!
//! ```text
//! shrink(P, d) = P ∩ { x : n_i · x <= b_i - d }   for every edge i
//! ```
//!
//! where `n_i` is the outward unit normal and `b_i = n_i · v_i`. When the
//! margin is too large for the polygon the result collapses to the centroid.

use nalgebra::{Isometry2, Point2, Vector2};

use crate::error::GeometryError;

const EPSILON: f64 = 1e-12;

/// Convex polygon with counter-clockwise vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexPolygon2 {
    vertices: Vec<Point2<f64>>,
}

impl ConvexPolygon2 {
    /// Convex hull of `points` (Andrew's monotone chain).
    ///
    /// Duplicate and collinear points are dropped. A single point or a
    /// segment is a valid (degenerate) polygon.
    pub fn from_points(points: &[Point2<f64>]) -> Result<Self, GeometryError> {
        if points.is_empty() {
            return Err(GeometryError::EmptyPolygon);
        }
        if let Some(index) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(GeometryError::NonFiniteVertex(index));
        }

        let mut sorted = points.to_vec();
        sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
        sorted.dedup_by(|a, b| (*a - *b).norm() < EPSILON);
        if sorted.len() < 3 {
            return Ok(Self { vertices: sorted });
        }

        let mut hull: Vec<Point2<f64>> = Vec::with_capacity(sorted.len() * 2);
        push_chain(&mut hull, sorted.iter());
        push_chain(&mut hull, sorted.iter().rev());
        Ok(Self { vertices: hull })
    }

    /// Axis-aligned rectangle centered at `center`.
    pub fn rectangle(center: Point2<f64>, length: f64, width: f64) -> Self {
        let hx = 0.5 * length.abs();
        let hy = 0.5 * width.abs();
        Self {
            vertices: vec![
                Point2::new(center.x - hx, center.y - hy),
                Point2::new(center.x + hx, center.y - hy),
                Point2::new(center.x + hx, center.y + hy),
                Point2::new(center.x - hx, center.y + hy),
            ],
        }
    }

    pub fn vertices(&self) -> &[Point2<f64>] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterate edges as `(start, end)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[i], self.vertices[(i + 1) % n]))
    }

    pub fn area(&self) -> f64 {
        if self.vertices.len() < 3 {
            return 0.0;
        }
        0.5 * self
            .edges()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
    }

    /// Area-weighted centroid, or the vertex mean for degenerate polygons.
    pub fn centroid(&self) -> Point2<f64> {
        let area = self.area();
        if area.abs() < EPSILON {
            let sum = self
                .vertices
                .iter()
                .fold(Vector2::zeros(), |acc, v| acc + v.coords);
            return Point2::from(sum / self.vertices.len().max(1) as f64);
        }
        let mut c = Vector2::zeros();
        for (a, b) in self.edges() {
            let w = a.x * b.y - b.x * a.y;
            c += (a.coords + b.coords) * w;
        }
        Point2::from(c / (6.0 * area))
    }

    /// True when `p` is inside or on the boundary.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        match self.vertices.len() {
            0 => false,
            1 => (p - self.vertices[0]).norm() <= 1e-9,
            2 => distance_to_segment(p, &self.vertices[0], &self.vertices[1]) <= 1e-9,
            _ => self.edges().all(|(a, b)| cross(&a, &b, p) >= -1e-9),
        }
    }

    /// Signed distance to the boundary: positive inside, negative outside.
    pub fn distance_inside(&self, p: &Point2<f64>) -> f64 {
        if self.vertices.len() < 3 {
            return -(p - self.orthogonal_projection(p)).norm();
        }
        if self.contains(p) {
            self.edges()
                .map(|(a, b)| distance_to_segment(p, &a, &b))
                .fold(f64::INFINITY, f64::min)
        } else {
            -(p - self.orthogonal_projection(p)).norm()
        }
    }

    /// Closest point of the polygon to `p`; `p` itself when inside.
    pub fn orthogonal_projection(&self, p: &Point2<f64>) -> Point2<f64> {
        match self.vertices.len() {
            0 => *p,
            1 => self.vertices[0],
            _ => {
                if self.vertices.len() >= 3 && self.contains(p) {
                    return *p;
                }
                let mut best = self.vertices[0];
                let mut best_dist = f64::INFINITY;
                for (a, b) in self.edges() {
                    let q = project_onto_segment(p, &a, &b);
                    let d = (p - q).norm_squared();
                    if d < best_dist {
                        best_dist = d;
                        best = q;
                    }
                }
                best
            }
        }
    }

    /// Polygon moved inward by `margin` on every edge.
    pub fn shrink(&self, margin: f64) -> Self {
        if margin <= 0.0 || self.vertices.len() < 3 {
            return self.clone();
        }
        let mut clipped = self.vertices.clone();
        for (a, b) in self.edges() {
            let Some(normal) = outward_normal(&a, &b) else {
                continue;
            };
            let offset = normal.dot(&a.coords) - margin;
            clipped = clip_half_plane(&clipped, &normal, offset);
            if clipped.is_empty() {
                break;
            }
        }
        if clipped.is_empty() {
            return Self {
                vertices: vec![self.centroid()],
            };
        }
        Self::from_points(&clipped).unwrap_or_else(|_| Self {
            vertices: vec![self.centroid()],
        })
    }

    /// Apply a rigid transform to every vertex.
    pub fn transform(&self, pose: &Isometry2<f64>) -> Self {
        Self {
            vertices: self.vertices.iter().map(|v| pose * v).collect(),
        }
    }

    /// Convex hull of both polygons.
    pub fn combine(&self, other: &Self) -> Result<Self, GeometryError> {
        let mut points = self.vertices.clone();
        points.extend_from_slice(&other.vertices);
        Self::from_points(&points)
    }

    /// Half-plane representation `n · x <= b`, one per edge, `n` outward unit.
    pub fn half_planes(&self) -> Vec<(Vector2<f64>, f64)> {
        self.edges()
            .filter_map(|(a, b)| outward_normal(&a, &b).map(|n| (n, n.dot(&a.coords))))
            .collect()
    }

    /// Smallest and largest vertex x coordinate.
    pub fn x_bounds(&self) -> (f64, f64) {
        self.vertices
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v.x), hi.max(v.x))
            })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// z component of `(b - a) x (p - a)`; positive when `p` is left of `a -> b`.
fn cross(a: &Point2<f64>, b: &Point2<f64>, p: &Point2<f64>) -> f64 {
    let ab = b - a;
    let ap = p - a;
    ab.x * ap.y - ab.y * ap.x
}

/// Append one monotone chain (lower or upper hull) to `hull`.
fn push_chain<'a>(
    hull: &mut Vec<Point2<f64>>,
    points: impl Iterator<Item = &'a Point2<f64>>,
) {
    let start = hull.len();
    for p in points {
        while hull.len() >= start + 2
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= EPSILON
        {
            hull.pop();
        }
        hull.push(*p);
    }
    // The chain end is the start of the next chain.
    hull.pop();
}

fn outward_normal(a: &Point2<f64>, b: &Point2<f64>) -> Option<Vector2<f64>> {
    let edge = b - a;
    let len = edge.norm();
    (len > EPSILON).then(|| Vector2::new(edge.y, -edge.x) / len)
}

fn project_onto_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> Point2<f64> {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 < EPSILON {
        return *a;
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    a + ab * t
}

fn distance_to_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    (p - project_onto_segment(p, a, b)).norm()
}

/// Sutherland-Hodgman clip of a convex vertex loop against `n · x <= offset`.
fn clip_half_plane(
    vertices: &[Point2<f64>],
    normal: &Vector2<f64>,
    offset: f64,
) -> Vec<Point2<f64>> {
    let n = vertices.len();
    let mut out = Vec::with_capacity(n + 1);
    for i in 0..n {
        let current = vertices[i];
        let next = vertices[(i + 1) % n];
        let dc = normal.dot(&current.coords) - offset;
        let dn = normal.dot(&next.coords) - offset;
        if dc <= 0.0 {
            out.push(current);
        }
        if (dc < 0.0 && dn > 0.0) || (dc > 0.0 && dn < 0.0) {
            let t = dc / (dc - dn);
            out.push(current + (next - current) * t);
        }
    }
    out
}
